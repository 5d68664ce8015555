use ocrkit_types::{LocaleIdentifier, RequestError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine '{engine}' is not available")]
    EngineUnavailable { engine: String },
    #[error("OCR engine '{engine}' does not support language '{language}'")]
    UnsupportedLanguage {
        engine: String,
        language: LocaleIdentifier,
    },
    #[error("OCR engine '{engine}' failed: {message}")]
    NativeRecognitionFailure { engine: String, message: String },
    #[error("no OCR engine named '{name}' is registered")]
    UnknownEngine { name: String },
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl OcrError {
    pub fn unavailable(engine: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
        }
    }

    pub fn unsupported_language(engine: impl Into<String>, language: LocaleIdentifier) -> Self {
        Self::UnsupportedLanguage {
            engine: engine.into(),
            language,
        }
    }

    pub fn native(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NativeRecognitionFailure {
            engine: engine.into(),
            message: message.into(),
        }
    }
}
