use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use ocrkit_ocr::{EngineConfig, MockOcrConfig};
#[cfg(feature = "engine-tesseract")]
use ocrkit_ocr::TesseractConfig;
use ocrkit_types::LocaleIdentifier;
use serde::Deserialize;

use crate::cli::{CliArgs, CliSources};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    engine: Option<String>,
    language: Option<String>,
    tesseract: Option<TesseractFileConfig>,
    mock: Option<MockFileConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct TesseractFileConfig {
    payload_dir: Option<String>,
    library: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct MockFileConfig {
    enable: Option<bool>,
    text: Option<String>,
    languages: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct EffectiveSettings {
    /// Engine requested by name; `None` picks the first available one.
    pub engine: Option<String>,
    pub language: LocaleIdentifier,
    pub engines: EngineConfig,
    pub config_dir: Option<PathBuf>,
}

const LOCAL_CONFIG_FILE: &str = "ocrkit.toml";
const DEFAULT_MOCK_TEXT: &str = "hello";
const DEFAULT_MOCK_LANGUAGES: &[&str] = &["eng"];

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let config = read_config(&path)?;
        return Ok((config, Some(path)));
    }

    for candidate in [local_config_path(), default_config_path()]
        .into_iter()
        .flatten()
    {
        if candidate.exists() {
            let config = read_config(&candidate)?;
            return Ok((config, Some(candidate)));
        }
    }

    Ok((FileConfig::default(), None))
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

    let FileConfig {
        engine: file_engine,
        language: file_language,
        tesseract: file_tesseract,
        mock: file_mock,
    } = file;

    let mut engine = normalize_string(cli.engine.clone());
    if engine.is_none() {
        engine = normalize_string(file_engine);
    }

    let language = if sources.language_from_cli {
        parse_language(&cli.language, None)?
    } else if let Some(value) = normalize_string(file_language) {
        parse_language(&value, config_path.as_ref())?
    } else {
        parse_language(&cli.language, None)?
    };

    #[cfg(feature = "engine-tesseract")]
    let tesseract = {
        let section = file_tesseract.unwrap_or_default();
        TesseractConfig {
            payload_dir: normalize_string(section.payload_dir)
                .and_then(|value| resolve_path_from_config(value, config_dir.as_deref())),
            library: normalize_string(section.library)
                .and_then(|value| resolve_path_from_config(value, config_dir.as_deref())),
            policy: None,
        }
    };
    #[cfg(not(feature = "engine-tesseract"))]
    let _ = file_tesseract;

    let file_mock = file_mock.unwrap_or_default();
    let mock_enabled = (sources.mock_from_cli && cli.mock) || file_mock.enable.unwrap_or(false);
    let mock = if mock_enabled {
        let text = file_mock
            .text
            .unwrap_or_else(|| DEFAULT_MOCK_TEXT.to_string());
        let languages: Vec<String> = match file_mock.languages {
            Some(languages) if !languages.is_empty() => languages,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    path: config_path,
                    field: "mock.languages",
                    value: "[]".to_string(),
                });
            }
            None => DEFAULT_MOCK_LANGUAGES.iter().map(|code| code.to_string()).collect(),
        };
        let codes: Vec<&str> = languages.iter().map(String::as_str).collect();
        Some(MockOcrConfig::fixed(text, &codes))
    } else {
        None
    };

    Ok(EffectiveSettings {
        engine,
        language,
        engines: EngineConfig {
            #[cfg(feature = "engine-tesseract")]
            tesseract,
            mock,
        },
        config_dir,
    })
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "ocrkit", "ocrkit").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn local_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join(LOCAL_CONFIG_FILE))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

fn parse_language(value: &str, path: Option<&PathBuf>) -> Result<LocaleIdentifier, ConfigError> {
    LocaleIdentifier::parse(value).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field: "language",
        value: value.to_string(),
    })
}
