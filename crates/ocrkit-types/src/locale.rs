use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocaleParseError {
    #[error("locale identifier is empty")]
    Empty,
    #[error("invalid language subtag '{subtag}' in locale '{value}'")]
    InvalidLanguage { value: String, subtag: String },
    #[error("unexpected subtag '{subtag}' in locale '{value}'")]
    UnexpectedSubtag { value: String, subtag: String },
}

/// Canonical `language[-Script][-REGION]` identifier.
///
/// Subtags are normalized on construction (lowercase language, titlecase
/// script, uppercase region), so the derived equality, ordering and hashing
/// all operate on the canonical form regardless of how the identifier was
/// spelled by its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleIdentifier {
    language: String,
    script: Option<String>,
    region: Option<String>,
}

impl LocaleIdentifier {
    pub fn parse(value: &str) -> Result<Self, LocaleParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LocaleParseError::Empty);
        }

        let mut subtags = trimmed.split(['-', '_']);
        let language = subtags.next().unwrap_or_default();
        let mut locale = Self::new(language).map_err(|_| LocaleParseError::InvalidLanguage {
            value: value.to_string(),
            subtag: language.to_string(),
        })?;

        let unexpected = |subtag: &str| LocaleParseError::UnexpectedSubtag {
            value: value.to_string(),
            subtag: subtag.to_string(),
        };

        let mut next = subtags.next();
        if let Some(subtag) = next.filter(|s| is_script(s)) {
            locale.script = Some(titlecase(subtag));
            next = subtags.next();
        }
        if let Some(subtag) = next {
            if !is_region(subtag) {
                return Err(unexpected(subtag));
            }
            locale.region = Some(subtag.to_ascii_uppercase());
        }
        if let Some(subtag) = subtags.next() {
            return Err(unexpected(subtag));
        }
        Ok(locale)
    }

    /// Builds a language-only identifier from a 2 or 3 letter subtag.
    pub fn new(language: &str) -> Result<Self, LocaleParseError> {
        if !is_language(language) {
            return Err(LocaleParseError::InvalidLanguage {
                value: language.to_string(),
                subtag: language.to_string(),
            });
        }
        Ok(Self {
            language: language.to_ascii_lowercase(),
            script: None,
            region: None,
        })
    }

    pub fn with_script(mut self, script: &str) -> Result<Self, LocaleParseError> {
        if !is_script(script) {
            return Err(LocaleParseError::UnexpectedSubtag {
                value: self.to_string(),
                subtag: script.to_string(),
            });
        }
        self.script = Some(titlecase(script));
        Ok(self)
    }

    pub fn with_region(mut self, region: &str) -> Result<Self, LocaleParseError> {
        if !is_region(region) {
            return Err(LocaleParseError::UnexpectedSubtag {
                value: self.to_string(),
                subtag: region.to_string(),
            });
        }
        self.region = Some(region.to_ascii_uppercase());
        Ok(self)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn without_region(&self) -> Self {
        Self {
            language: self.language.clone(),
            script: self.script.clone(),
            region: None,
        }
    }
}

fn is_language(subtag: &str) -> bool {
    (2..=3).contains(&subtag.len()) && subtag.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_script(subtag: &str) -> bool {
    subtag.len() == 4 && subtag.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_region(subtag: &str) -> bool {
    (subtag.len() == 2 && subtag.bytes().all(|b| b.is_ascii_alphabetic()))
        || (subtag.len() == 3 && subtag.bytes().all(|b| b.is_ascii_digit()))
}

fn titlecase(subtag: &str) -> String {
    let lower = subtag.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

impl fmt::Display for LocaleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if let Some(script) = &self.script {
            write!(f, "-{script}")?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{region}")?;
        }
        Ok(())
    }
}

impl FromStr for LocaleIdentifier {
    type Err = LocaleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LocaleIdentifier {
    type Error = LocaleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LocaleIdentifier> for String {
    fn from(value: LocaleIdentifier) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_subtags() {
        let locale = LocaleIdentifier::parse("ZH_hans_cn").unwrap();
        assert_eq!(locale.language(), "zh");
        assert_eq!(locale.script(), Some("Hans"));
        assert_eq!(locale.region(), Some("CN"));
        assert_eq!(locale.to_string(), "zh-Hans-CN");
    }

    #[test]
    fn equality_uses_canonical_form() {
        let a: LocaleIdentifier = "en_us".parse().unwrap();
        let b: LocaleIdentifier = " EN-US ".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.without_region(), LocaleIdentifier::new("en").unwrap());
    }

    #[test]
    fn numeric_region_is_accepted() {
        let locale = LocaleIdentifier::parse("es-419").unwrap();
        assert_eq!(locale.region(), Some("419"));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert_eq!(LocaleIdentifier::parse("  "), Err(LocaleParseError::Empty));
        assert!(matches!(
            LocaleIdentifier::parse("english"),
            Err(LocaleParseError::InvalidLanguage { .. })
        ));
        assert!(matches!(
            LocaleIdentifier::parse("en-US-x"),
            Err(LocaleParseError::UnexpectedSubtag { .. })
        ));
        assert!(matches!(
            LocaleIdentifier::parse("en-1"),
            Err(LocaleParseError::UnexpectedSubtag { .. })
        ));
    }

    #[test]
    fn serializes_as_canonical_string() {
        let locale = LocaleIdentifier::parse("sr_latn").unwrap();
        let json = serde_json::to_string(&locale).unwrap();
        assert_eq!(json, "\"sr-Latn\"");
        let back: LocaleIdentifier = serde_json::from_str("\"sr-latn\"").unwrap();
        assert_eq!(back, locale);
        assert!(serde_json::from_str::<LocaleIdentifier>("\"???\"").is_err());
    }
}
