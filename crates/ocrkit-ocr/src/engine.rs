use std::collections::BTreeSet;

use image::{ImageBuffer, Rgba};
use ocrkit_types::{LocaleIdentifier, RecognitionRequest, RecognitionResult};

use crate::error::OcrError;
use crate::probe::ProbeState;

/// Borrowed RGBA view over a request's pixel buffer.
pub type RgbaView<'a> = ImageBuffer<Rgba<u8>, &'a [u8]>;

/// Common interface for all OCR engines.
pub trait OcrEngine: Send + Sync {
    /// Stable identifier used for engine selection.
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Probes the backend on first use and returns the memoized outcome.
    fn check(&self) -> bool;

    fn probe_state(&self) -> ProbeState;

    fn version(&self) -> Option<String> {
        None
    }

    /// Languages the backend can recognize. Requires a successful
    /// [`OcrEngine::check`].
    fn supported_languages(&self) -> Result<BTreeSet<LocaleIdentifier>, OcrError>;

    /// Recognizes the request's image. Blocking; requires a successful
    /// [`OcrEngine::check`].
    fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResult, OcrError>;
}

/// Rebuilds the structured image described by a request.
pub fn rgba_view<'a>(engine: &str, request: &'a RecognitionRequest) -> Result<RgbaView<'a>, OcrError> {
    ImageBuffer::from_raw(request.width(), request.height(), request.image_data()).ok_or_else(|| {
        OcrError::native(
            engine,
            format!(
                "pixel buffer of {} bytes does not describe a {}x{} RGBA image",
                request.image_data().len(),
                request.width(),
                request.height()
            ),
        )
    })
}
