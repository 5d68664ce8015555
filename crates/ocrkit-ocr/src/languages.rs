use std::collections::{BTreeMap, BTreeSet};

use ocrkit_types::LocaleIdentifier;
use tracing::debug;

use crate::error::OcrError;
use crate::locale;

/// Supported languages of one engine, keyed by canonical locale.
#[derive(Debug, Clone, Default)]
pub struct LanguageIndex {
    by_locale: BTreeMap<LocaleIdentifier, String>,
    skipped: usize,
}

impl LanguageIndex {
    /// Builds the index from the codes reported by a backend. Codes that do
    /// not resolve are dropped; when several codes resolve to the same
    /// locale the first one reported is kept.
    pub fn from_native_codes<I, S>(engine: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for code in codes {
            let code = code.as_ref();
            match locale::resolve(code) {
                Ok(locale) => {
                    index
                        .by_locale
                        .entry(locale)
                        .or_insert_with(|| code.trim().to_string());
                }
                Err(err) => {
                    debug!(engine, code = err.code.as_str(), "skipping unrecognized language");
                    index.skipped += 1;
                }
            }
        }
        index
    }

    pub fn locales(&self) -> BTreeSet<LocaleIdentifier> {
        self.by_locale.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_locale.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_locale.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Translates a requested locale back into the backend's native code,
    /// falling back to the region-less locale (`en-US` -> `eng`).
    pub fn native_code(&self, engine: &str, locale: &LocaleIdentifier) -> Result<&str, OcrError> {
        if let Some(code) = self.by_locale.get(locale) {
            return Ok(code.as_str());
        }
        if locale.region().is_some() {
            if let Some(code) = self.by_locale.get(&locale.without_region()) {
                return Ok(code.as_str());
            }
        }
        Err(OcrError::unsupported_language(engine, locale.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(value: &str) -> LocaleIdentifier {
        LocaleIdentifier::parse(value).unwrap()
    }

    #[test]
    fn drops_unresolvable_codes() {
        let index =
            LanguageIndex::from_native_codes("test", ["eng", "osd", "deu", "equ", "ita_old"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.skipped(), 3);
        let locales = index.locales();
        assert!(locales.contains(&locale("en")));
        assert!(locales.contains(&locale("de")));
    }

    #[test]
    fn every_locale_comes_from_a_resolvable_code() {
        let codes = ["eng", "chi_sim", "xyz", "srp_latn", "", "fra"];
        let index = LanguageIndex::from_native_codes("test", codes);
        for locale in index.locales() {
            let code = index.native_code("test", &locale).unwrap();
            assert_eq!(crate::locale::resolve(code).unwrap(), locale);
        }
    }

    #[test]
    fn first_duplicate_wins() {
        let index = LanguageIndex::from_native_codes("test", ["fas", "per"]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.native_code("test", &locale("fa")).unwrap(), "fas");
    }

    #[test]
    fn native_code_falls_back_to_language_without_region() {
        let index = LanguageIndex::from_native_codes("test", ["eng", "chi_tra"]);
        assert_eq!(index.native_code("test", &locale("en-GB")).unwrap(), "eng");
        assert_eq!(index.native_code("test", &locale("zh-Hant-TW")).unwrap(), "chi_tra");
    }

    #[test]
    fn missing_language_is_unsupported() {
        let index = LanguageIndex::from_native_codes("test", ["eng"]);
        let err = index.native_code("test", &locale("xxx")).unwrap_err();
        assert!(matches!(
            err,
            OcrError::UnsupportedLanguage { ref engine, ref language }
                if engine == "test" && language.to_string() == "xxx"
        ));
        // Script-qualified requests never match a plain language entry.
        assert!(index.native_code("test", &locale("en-Latn")).is_err());
    }
}
