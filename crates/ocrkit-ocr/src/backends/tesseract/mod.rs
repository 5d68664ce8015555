mod ffi;

use std::collections::BTreeSet;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use image::RgbImage;
use image::buffer::ConvertBuffer;
use ocrkit_types::{LocaleIdentifier, RecognitionRequest, RecognitionResult};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use self::ffi::{TesseractLibrary, library_candidates, parse_version};
use crate::bootstrap::{BootstrapPolicy, PlatformBootstrap, bundled_payload_dir};
use crate::engine::{OcrEngine, rgba_view};
use crate::error::OcrError;
use crate::languages::LanguageIndex;
use crate::probe::{CapabilityProbe, ProbeState};

const NAME: &str = "tesseract_ocr";
const PAYLOAD_DIR_NAME: &str = "tesseract_ocr";
const TESSDATA_SUBDIR: &str = "tessdata";
const TESSDATA_ENV: &str = "TESSDATA_PREFIX";
const LIBRARY_ENV: &str = "LIBTESSERACT";
/// The C API of releases before 3.03 is known to crash.
const MIN_VERSION: (u32, u32) = (3, 3);

#[derive(Debug, Clone, Default)]
pub struct TesseractConfig {
    /// Bundled payload directory; defaults to `tesseract_ocr` next to the
    /// executable.
    pub payload_dir: Option<PathBuf>,
    /// Library to load instead of the platform defaults. Falls back to the
    /// `LIBTESSERACT` environment variable.
    pub library: Option<PathBuf>,
    /// Overrides the platform's bootstrap policy.
    pub policy: Option<BootstrapPolicy>,
}

struct TesseractBinding {
    library: Mutex<TesseractLibrary>,
    version: String,
    languages: OnceCell<LanguageIndex>,
}

pub struct TesseractOcrEngine {
    bootstrap: PlatformBootstrap,
    library: Option<OsString>,
    probe: CapabilityProbe<TesseractBinding>,
}

impl TesseractOcrEngine {
    pub fn new() -> Self {
        Self::with_config(TesseractConfig::default())
    }

    pub fn with_config(config: TesseractConfig) -> Self {
        let payload_dir = config
            .payload_dir
            .or_else(|| bundled_payload_dir(PAYLOAD_DIR_NAME));
        let policy = config
            .policy
            .unwrap_or_else(BootstrapPolicy::for_current_platform);
        let library = config
            .library
            .map(PathBuf::into_os_string)
            .or_else(|| env::var_os(LIBRARY_ENV).filter(|value| !value.is_empty()));
        Self {
            bootstrap: PlatformBootstrap::new(policy, payload_dir, TESSDATA_SUBDIR, TESSDATA_ENV),
            library,
            probe: CapabilityProbe::new(NAME),
        }
    }

    fn probe_native(&self) -> Option<TesseractBinding> {
        if !self.bootstrap.prepare_environment() {
            info!(
                engine = NAME,
                payload = ?self.bootstrap.payload_dir(),
                "bundled tesseract payload missing; engine disabled"
            );
            return None;
        }

        let candidates = library_candidates(self.library.as_ref(), self.bootstrap.library_dirs());
        let library = match TesseractLibrary::load(&candidates) {
            Ok(library) => library,
            Err(err) => {
                info!(engine = NAME, "libtesseract could not be loaded: {err}");
                return None;
            }
        };

        let Some(version) = library.version() else {
            warn!(engine = NAME, "libtesseract did not report a version");
            return None;
        };
        match parse_version(&version) {
            Some(parsed) if parsed >= MIN_VERSION => {}
            _ => {
                warn!(engine = NAME, %version, "unsupported libtesseract version");
                return None;
            }
        }

        info!(engine = NAME, %version, library = ?library.path(), "tesseract available");
        Some(TesseractBinding {
            library: Mutex::new(library),
            version,
            languages: OnceCell::new(),
        })
    }

    fn languages<'a>(&self, binding: &'a TesseractBinding) -> Result<&'a LanguageIndex, OcrError> {
        binding.languages.get_or_try_init(|| {
            let library = binding.library.lock();
            let api = library
                .init(None)
                .map_err(|message| OcrError::native(NAME, message))?;
            let codes = api.available_languages();
            let index = LanguageIndex::from_native_codes(NAME, &codes);
            debug!(
                engine = NAME,
                reported = codes.len(),
                supported = index.len(),
                skipped = index.skipped(),
                "enumerated tesseract languages"
            );
            Ok(index)
        })
    }
}

impl Default for TesseractOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcrEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Tesseract OCR Engine"
    }

    fn check(&self) -> bool {
        self.probe.check_with(|| self.probe_native())
    }

    fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    fn version(&self) -> Option<String> {
        self.probe.bound().ok().map(|binding| binding.version.clone())
    }

    fn supported_languages(&self) -> Result<BTreeSet<LocaleIdentifier>, OcrError> {
        let binding = self.probe.bound()?;
        Ok(self.languages(binding)?.locales())
    }

    fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResult, OcrError> {
        let binding = self.probe.bound()?;
        let rgba = rgba_view(NAME, request)?;
        let language = self.languages(binding)?.native_code(NAME, request.language())?;
        let rgb: RgbImage = rgba.convert();

        let library = binding.library.lock();
        let api = library
            .init(Some(language))
            .map_err(|message| OcrError::native(NAME, message))?;
        let recognized_text = api
            .image_to_string(rgb.as_raw(), rgb.width(), rgb.height(), 3)
            .map_err(|message| OcrError::native(NAME, message))?;
        drop(api);
        drop(library);

        debug!(
            engine = NAME,
            language,
            cookie = request.cookie().value(),
            chars = recognized_text.chars().count(),
            "recognition finished"
        );
        Ok(RecognitionResult::new(recognized_text, request.cookie()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrkit_types::Cookie;

    fn missing_payload_engine() -> (tempfile::TempDir, TesseractOcrEngine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = TesseractOcrEngine::with_config(TesseractConfig {
            payload_dir: Some(dir.path().join("tesseract_ocr")),
            library: None,
            policy: Some(BootstrapPolicy::RequireBundled),
        });
        (dir, engine)
    }

    #[test]
    fn missing_bundled_payload_disables_engine() {
        let (_dir, engine) = missing_payload_engine();
        assert_eq!(engine.probe_state(), ProbeState::Unknown);
        assert!(!engine.check());
        assert!(!engine.check());
        assert_eq!(engine.probe_state(), ProbeState::Unavailable);
        assert!(engine.version().is_none());
        assert!(matches!(
            engine.supported_languages(),
            Err(OcrError::EngineUnavailable { .. })
        ));

        let request = RecognitionRequest::new(
            vec![255u8; 400],
            10,
            10,
            LocaleIdentifier::new("en").unwrap(),
            Cookie::new(3),
        )
        .unwrap();
        assert!(matches!(
            engine.recognize(&request),
            Err(OcrError::EngineUnavailable { engine }) if engine == NAME
        ));
    }

    #[test]
    fn unloadable_library_disables_engine() {
        let engine = TesseractOcrEngine::with_config(TesseractConfig {
            payload_dir: None,
            library: Some(PathBuf::from("/nonexistent/ocrkit/libtesseract.so")),
            policy: Some(BootstrapPolicy::SystemDiscovery),
        });
        assert!(!engine.check());
        assert_eq!(engine.probe_state(), ProbeState::Unavailable);
    }

    #[test]
    fn unprobed_engine_refuses_work() {
        let (_dir, engine) = missing_payload_engine();
        assert!(matches!(
            engine.supported_languages(),
            Err(OcrError::EngineUnavailable { .. })
        ));
        // Asking for languages must not probe implicitly.
        assert_eq!(engine.probe_state(), ProbeState::Unknown);
    }
}
