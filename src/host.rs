use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocrkit_ocr::{EngineConfig, EngineRegistry, OcrError};
use ocrkit_types::{Cookie, LocaleIdentifier, RecognitionRequest, RecognitionResult, RequestError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::{CliArgs, CliSources};
use crate::settings::{ConfigError, resolve_settings};

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no OCR engine is available on this machine")]
    NoEngine,
    #[error("no input image given; pass a path or use --list-engines")]
    MissingInput,
    #[error("blocking worker failed: {0}")]
    Join(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// JSON shape of one recognition.
#[derive(Debug, Serialize)]
pub struct RecognitionOutput {
    pub engine: String,
    pub language: LocaleIdentifier,
    pub cookie: Cookie,
    pub text: String,
}

pub async fn run(args: CliArgs, sources: CliSources) -> Result<(), HostError> {
    let settings = resolve_settings(&args, &sources)?;
    debug!(
        config_dir = ?settings.config_dir,
        engine = settings.engine.as_deref().unwrap_or("auto"),
        engine_from_cli = sources.engine_from_cli,
        language = %settings.language,
        "resolved settings"
    );
    let registry = Arc::new(probe_registry(settings.engines.clone()).await?);
    let mut stdout = io::stdout();

    if args.list_engines {
        writeln!(stdout, "{}", render_engines(&registry, args.json)?)?;
        return Ok(());
    }
    if let Some(engine) = args.list_languages.as_deref() {
        writeln!(stdout, "{}", render_languages(&registry, engine, args.json)?)?;
        return Ok(());
    }

    let input = args.input.as_deref().ok_or(HostError::MissingInput)?;
    let engine = select_engine(&registry, settings.engine.as_deref())?;
    let request = load_request(input, settings.language.clone())?;
    info!(
        engine = engine.as_str(),
        input = %input.display(),
        cookie = request.cookie().value(),
        "starting recognition"
    );
    let result = recognize(Arc::clone(&registry), engine.clone(), request).await?;

    if args.json {
        let output = RecognitionOutput {
            engine,
            language: settings.language,
            cookie: result.cookie,
            text: result.recognized_text,
        };
        writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        writeln!(stdout, "{}", result.recognized_text.trim_end())?;
    }
    Ok(())
}

/// Builds the registry and probes every engine once. Blocking: probing
/// loads native libraries.
pub fn build_registry(config: &EngineConfig) -> EngineRegistry {
    let mut registry = EngineRegistry::from_config(config);
    registry.probe_all();
    registry
}

/// Runs [`build_registry`] on tokio's blocking pool.
pub async fn probe_registry(config: EngineConfig) -> Result<EngineRegistry, HostError> {
    tokio::task::spawn_blocking(move || build_registry(&config))
        .await
        .map_err(|err| HostError::Join(err.to_string()))
}

pub fn render_engines(registry: &EngineRegistry, json: bool) -> Result<String, HostError> {
    let engines = registry.list_available_engines();
    if json {
        return Ok(serde_json::to_string_pretty(&engines)?);
    }
    if engines.is_empty() {
        return Ok("no OCR engines available".to_string());
    }
    Ok(engines
        .iter()
        .map(|engine| format!("{}\t{}", engine.name, engine.display_name))
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn render_languages(
    registry: &EngineRegistry,
    engine: &str,
    json: bool,
) -> Result<String, HostError> {
    let languages = registry.list_supported_languages(engine)?;
    if json {
        return Ok(serde_json::to_string_pretty(&languages)?);
    }
    Ok(languages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// An explicitly requested engine is used as-is so that the registry can
/// report why it cannot run; otherwise the first available engine wins.
pub fn select_engine(registry: &EngineRegistry, preferred: Option<&str>) -> Result<String, HostError> {
    if let Some(name) = preferred {
        return Ok(name.to_string());
    }
    registry
        .list_available_engines()
        .into_iter()
        .next()
        .map(|summary| summary.name)
        .ok_or(HostError::NoEngine)
}

/// Decodes an image file into an RGBA request.
pub fn load_request(path: &Path, language: LocaleIdentifier) -> Result<RecognitionRequest, HostError> {
    let image = image::open(path).map_err(|source| HostError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(RecognitionRequest::new(
        rgba.into_raw(),
        width,
        height,
        language,
        Cookie::next(),
    )?)
}

/// Runs the blocking recognition on tokio's blocking pool.
pub async fn recognize(
    registry: Arc<EngineRegistry>,
    engine: String,
    request: RecognitionRequest,
) -> Result<RecognitionResult, HostError> {
    let result = tokio::task::spawn_blocking(move || registry.recognize(&engine, &request))
        .await
        .map_err(|err| HostError::Join(err.to_string()))??;
    Ok(result)
}
