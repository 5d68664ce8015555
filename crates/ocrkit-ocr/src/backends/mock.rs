//! Scripted engine for tests, CI hosts and demos.
//!
//! It goes through the same probe, language index and serialization path as
//! the native backends; only the "native" calls are replaced by closures.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ocrkit_types::{LocaleIdentifier, RecognitionRequest, RecognitionResult};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::{OcrEngine, RgbaView, rgba_view};
use crate::error::OcrError;
use crate::languages::LanguageIndex;
use crate::probe::{CapabilityProbe, ProbeState};

pub type MockResponder =
    Arc<dyn Fn(&RgbaView<'_>, &str) -> Result<String, String> + Send + Sync>;

const NAME: &str = "mock_ocr";

#[derive(Clone)]
pub struct MockOcrConfig {
    pub available: bool,
    pub native_languages: Vec<String>,
    pub responder: MockResponder,
}

impl MockOcrConfig {
    /// Available engine answering every request with `text`.
    pub fn fixed(text: impl Into<String>, native_languages: &[&str]) -> Self {
        let text = text.into();
        Self {
            available: true,
            native_languages: native_languages.iter().map(|code| code.to_string()).collect(),
            responder: Arc::new(move |_, _| Ok(text.clone())),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            native_languages: Vec::new(),
            responder: Arc::new(|_, _| Err("mock engine is unavailable".into())),
        }
    }

    pub fn with_responder(
        mut self,
        responder: impl Fn(&RgbaView<'_>, &str) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Arc::new(responder);
        self
    }
}

impl fmt::Debug for MockOcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockOcrConfig")
            .field("available", &self.available)
            .field("native_languages", &self.native_languages)
            .finish_non_exhaustive()
    }
}

struct MockBinding {
    native_languages: Vec<String>,
    responder: MockResponder,
    languages: OnceCell<LanguageIndex>,
    call_lock: Mutex<()>,
}

pub struct MockOcrEngine {
    config: MockOcrConfig,
    probe: CapabilityProbe<MockBinding>,
    probes: AtomicUsize,
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(config: MockOcrConfig) -> Self {
        Self {
            config,
            probe: CapabilityProbe::new(NAME),
            probes: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
        }
    }

    /// Number of times the backend was actually probed.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of native calls that started while another was still running.
    pub fn overlapping_calls(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn languages<'a>(&self, binding: &'a MockBinding) -> &'a LanguageIndex {
        binding
            .languages
            .get_or_init(|| LanguageIndex::from_native_codes(NAME, &binding.native_languages))
    }
}

impl fmt::Debug for MockOcrEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockOcrEngine")
            .field("config", &self.config)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Mock OCR Engine"
    }

    fn check(&self) -> bool {
        self.probe.check_with(|| {
            self.probes.fetch_add(1, Ordering::SeqCst);
            debug!(engine = NAME, available = self.config.available, "probing mock engine");
            self.config.available.then(|| MockBinding {
                native_languages: self.config.native_languages.clone(),
                responder: Arc::clone(&self.config.responder),
                languages: OnceCell::new(),
                call_lock: Mutex::new(()),
            })
        })
    }

    fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    fn version(&self) -> Option<String> {
        self.probe.bound().ok().map(|_| env!("CARGO_PKG_VERSION").to_string())
    }

    fn supported_languages(&self) -> Result<BTreeSet<LocaleIdentifier>, OcrError> {
        let binding = self.probe.bound()?;
        Ok(self.languages(binding).locales())
    }

    fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResult, OcrError> {
        let binding = self.probe.bound()?;
        let image = rgba_view(NAME, request)?;
        let language = self.languages(binding).native_code(NAME, request.language())?;

        let _guard = binding.call_lock.lock();
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let outcome = (binding.responder)(&image, language);
        self.in_flight.store(false, Ordering::SeqCst);

        let recognized_text = outcome.map_err(|message| OcrError::native(NAME, message))?;
        Ok(RecognitionResult::new(recognized_text, request.cookie()))
    }
}
