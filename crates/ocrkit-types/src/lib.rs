//! Shared domain models for the ocrkit workspace.
//!
//! This crate centralizes the request/result protocol and the canonical
//! locale identifier used across the OCR core and the CLI host. Keep it
//! backend-agnostic and free of native dependencies so every crate can depend
//! on it without pulling an OCR library.

mod locale;
mod request;

pub use locale::{LocaleIdentifier, LocaleParseError};
pub use request::{
    BYTES_PER_PIXEL, Cookie, RecognitionRequest, RecognitionResult, RequestError,
};
