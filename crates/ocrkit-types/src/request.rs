use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locale::LocaleIdentifier;

/// Requests always carry tightly packed RGBA pixels.
pub const BYTES_PER_PIXEL: usize = 4;

static NEXT_COOKIE: AtomicU64 = AtomicU64::new(1);

/// Opaque correlation token echoed back in every [`RecognitionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cookie(u64);

impl Cookie {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns a cookie that is unique within this process.
    pub fn next() -> Self {
        Self(NEXT_COOKIE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("image dimensions must be non-zero (width={width}, height={height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("image dimensions overflowed while computing buffer size (width={width}, height={height})")]
    DimensionOverflow { width: u32, height: u32 },
    #[error("RGBA buffer length {provided} does not match width * height * 4 ({required})")]
    BufferLength { provided: usize, required: usize },
}

/// A single OCR invocation over a decoded RGBA image.
#[derive(Clone)]
pub struct RecognitionRequest {
    image_data: Arc<[u8]>,
    width: u32,
    height: u32,
    language: LocaleIdentifier,
    cookie: Cookie,
}

impl RecognitionRequest {
    pub fn new(
        image_data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        language: LocaleIdentifier,
        cookie: Cookie,
    ) -> Result<Self, RequestError> {
        if width == 0 || height == 0 {
            return Err(RequestError::ZeroDimension { width, height });
        }
        let required = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or(RequestError::DimensionOverflow { width, height })?;
        let image_data = image_data.into();
        if image_data.len() != required {
            return Err(RequestError::BufferLength {
                provided: image_data.len(),
                required,
            });
        }
        Ok(Self {
            image_data,
            width,
            height,
            language,
            cookie,
        })
    }

    pub fn image_data(&self) -> &[u8] {
        &self.image_data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn language(&self) -> &LocaleIdentifier {
        &self.language
    }

    pub fn cookie(&self) -> Cookie {
        self.cookie
    }
}

impl fmt::Debug for RecognitionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionRequest")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.image_data.len())
            .field("language", &self.language)
            .field("cookie", &self.cookie)
            .finish()
    }
}

/// Recognized text for one request, carrying the request's cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionResult {
    pub recognized_text: String,
    pub cookie: Cookie,
}

impl RecognitionResult {
    pub fn new(recognized_text: String, cookie: Cookie) -> Self {
        Self {
            recognized_text,
            cookie,
        }
    }
}
