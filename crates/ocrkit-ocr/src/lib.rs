mod backends;
mod bootstrap;
mod engine;
mod error;
mod languages;
mod locale;
mod probe;
mod registry;

pub use backends::mock::{MockOcrConfig, MockOcrEngine, MockResponder};
#[cfg(feature = "engine-tesseract")]
pub use backends::tesseract::{TesseractConfig, TesseractOcrEngine};
pub use bootstrap::{BootstrapPolicy, PlatformBootstrap, bundled_payload_dir};
pub use engine::{OcrEngine, RgbaView, rgba_view};
pub use error::OcrError;
pub use languages::LanguageIndex;
pub use locale::{UnrecognizedLocale, resolve as resolve_locale};
pub use probe::{CapabilityProbe, ProbeState};
pub use registry::{EngineConfig, EngineDescriptor, EngineRegistry, EngineSummary};
