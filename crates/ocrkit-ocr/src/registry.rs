use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ocrkit_types::{LocaleIdentifier, RecognitionRequest, RecognitionResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backends::mock::{MockOcrConfig, MockOcrEngine};
#[cfg(feature = "engine-tesseract")]
use crate::backends::tesseract::{TesseractConfig, TesseractOcrEngine};
use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::probe::ProbeState;

/// Snapshot of one registered engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineDescriptor {
    pub name: String,
    pub display_name: String,
    pub probe_result: ProbeState,
    pub version: Option<String>,
    pub supported_languages: BTreeSet<LocaleIdentifier>,
}

impl EngineDescriptor {
    fn unprobed(engine: &dyn OcrEngine) -> Self {
        Self {
            name: engine.name().to_string(),
            display_name: engine.display_name().to_string(),
            probe_result: ProbeState::Unknown,
            version: None,
            supported_languages: BTreeSet::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.probe_result.is_available()
    }
}

/// Name pair exposed to hosts for engine selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    pub name: String,
    pub display_name: String,
}

/// Engines the default registry is built from.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    #[cfg(feature = "engine-tesseract")]
    pub tesseract: TesseractConfig,
    /// Registers the scripted engine when set.
    pub mock: Option<MockOcrConfig>,
}

struct Entry {
    engine: Arc<dyn OcrEngine>,
    descriptor: EngineDescriptor,
}

#[derive(Default)]
pub struct EngineRegistry {
    entries: Vec<Entry>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "engine-tesseract")]
        registry.register(Arc::new(TesseractOcrEngine::with_config(
            config.tesseract.clone(),
        )));
        if let Some(mock) = &config.mock {
            registry.register(Arc::new(MockOcrEngine::new(mock.clone())));
        }
        registry
    }

    /// Adds an engine. An engine registered under an existing name replaces
    /// the previous one in place.
    pub fn register(&mut self, engine: Arc<dyn OcrEngine>) {
        let descriptor = EngineDescriptor::unprobed(engine.as_ref());
        let entry = Entry { engine, descriptor };
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.descriptor.name == entry.descriptor.name)
        {
            Some(existing) => {
                debug!(engine = entry.descriptor.name.as_str(), "replacing registered engine");
                *existing = entry;
            }
            None => self.entries.push(entry),
        }
    }

    /// Probes every engine and refreshes its descriptor. Probing is memoized
    /// by the engines, so calling this again only rebuilds the snapshots.
    pub fn probe_all(&mut self) {
        for entry in &mut self.entries {
            let engine = entry.engine.as_ref();
            let available = engine.check();
            let supported_languages = if available {
                engine.supported_languages().unwrap_or_else(|err| {
                    warn!(engine = engine.name(), "failed to enumerate languages: {err}");
                    BTreeSet::new()
                })
            } else {
                BTreeSet::new()
            };

            entry.descriptor = EngineDescriptor {
                probe_result: engine.probe_state(),
                version: engine.version(),
                supported_languages,
                ..EngineDescriptor::unprobed(engine)
            };
            info!(
                engine = engine.name(),
                state = %entry.descriptor.probe_result,
                version = entry.descriptor.version.as_deref().unwrap_or("-"),
                languages = entry.descriptor.supported_languages.len(),
                "probed OCR engine"
            );
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &EngineDescriptor> {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    pub fn descriptor(&self, name: &str) -> Option<&EngineDescriptor> {
        self.entry(name).map(|entry| &entry.descriptor)
    }

    pub fn engine(&self, name: &str) -> Option<Arc<dyn OcrEngine>> {
        self.entry(name).map(|entry| Arc::clone(&entry.engine))
    }

    /// Descriptors of the engines whose probe succeeded, in registration
    /// order. Reflects the last [`EngineRegistry::probe_all`].
    pub fn available_engines(&self) -> Vec<&EngineDescriptor> {
        self.descriptors()
            .filter(|descriptor| descriptor.is_available())
            .collect()
    }

    pub fn list_available_engines(&self) -> Vec<EngineSummary> {
        self.available_engines()
            .into_iter()
            .map(|descriptor| EngineSummary {
                name: descriptor.name.clone(),
                display_name: descriptor.display_name.clone(),
            })
            .collect()
    }

    pub fn list_supported_languages(&self, name: &str) -> Result<Vec<LocaleIdentifier>, OcrError> {
        let entry = self.entry(name).ok_or_else(|| unknown(name))?;
        Ok(entry.engine.supported_languages()?.into_iter().collect())
    }

    /// Runs one recognition on the named engine. Blocking. Never falls back
    /// to another engine.
    pub fn recognize(
        &self,
        name: &str,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, OcrError> {
        let entry = self.entry(name).ok_or_else(|| unknown(name))?;
        if !entry.engine.probe_state().is_available() {
            return Err(OcrError::unavailable(entry.engine.name()));
        }
        entry.engine.recognize(request)
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.descriptor.name == name)
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptors()).finish()
    }
}

fn unknown(name: &str) -> OcrError {
    OcrError::UnknownEngine {
        name: name.to_string(),
    }
}
