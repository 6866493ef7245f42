use std::env;
use std::time::Duration;

use ehon_contracts::models::{Capability, ModelSelector};
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 90.0;
pub const DEFAULT_TRANSPORT_RETRIES: usize = 0;
pub const DEFAULT_RETRY_BACKOFF_SECS: f64 = 1.2;

/// Model names requested on the command line; `None` keeps the registry default.
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub vision: Option<String>,
    pub chat: Option<String>,
    pub speech: Option<String>,
    pub transcription: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: String,
    pub api_base: String,
    pub vision_model: String,
    pub chat_model: String,
    pub speech_model: String,
    pub transcription_model: String,
    pub request_timeout: Duration,
    pub transport_retries: usize,
    pub retry_backoff: Duration,
}

impl EngineConfig {
    /// Reads the credential and transport settings from the process
    /// environment. A missing credential is fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("GOOGLE_API_KEY"))
            .ok_or(ConfigError::MissingCredential)?;
        let api_base = non_empty("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs = parse_bounded(
            "EHON_REQUEST_TIMEOUT_SECS",
            non_empty("EHON_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
            5.0,
            600.0,
        )?;
        let retries = parse_bounded(
            "EHON_TRANSPORT_RETRIES",
            non_empty("EHON_TRANSPORT_RETRIES"),
            DEFAULT_TRANSPORT_RETRIES as f64,
            0.0,
            4.0,
        )?;

        let mut config = Self {
            api_key,
            api_base,
            vision_model: String::new(),
            chat_model: String::new(),
            speech_model: String::new(),
            transcription_model: String::new(),
            request_timeout: Duration::from_secs_f64(timeout_secs),
            transport_retries: retries.round() as usize,
            retry_backoff: Duration::from_secs_f64(DEFAULT_RETRY_BACKOFF_SECS),
        };
        config.apply_models(&ModelOverrides::default())?;
        Ok(config)
    }

    /// Resolves each capability's model through the registry.
    ///
    /// A name the registry does not know is used as given; a known model
    /// that lacks the capability falls back to the registry default.
    pub fn apply_models(&mut self, overrides: &ModelOverrides) -> Result<(), ConfigError> {
        let selector = ModelSelector::new(None);
        self.vision_model = resolve_model(&selector, overrides.vision.as_deref(), Capability::Vision)?;
        self.chat_model = resolve_model(&selector, overrides.chat.as_deref(), Capability::Chat)?;
        self.speech_model = resolve_model(&selector, overrides.speech.as_deref(), Capability::Speech)?;
        self.transcription_model = resolve_model(
            &selector,
            overrides.transcription.as_deref(),
            Capability::Transcription,
        )?;
        Ok(())
    }
}

fn resolve_model(
    selector: &ModelSelector,
    requested: Option<&str>,
    capability: Capability,
) -> Result<String, ConfigError> {
    let requested = requested.map(str::trim).filter(|value| !value.is_empty());
    if let Some(name) = requested {
        if selector.registry.get(name).is_none() {
            warn!(
                model = name,
                capability = capability.as_str(),
                "model not in registry; using as given"
            );
            return Ok(name.trim_start_matches("models/").to_string());
        }
    }
    let selection = selector
        .select(requested, capability)
        .map_err(ConfigError::NoModel)?;
    if let Some(reason) = selection.fallback_reason.as_deref() {
        warn!(model = %selection.model.name, "{reason}");
    }
    Ok(selection.model.name)
}

fn parse_bounded(
    key: &'static str,
    raw: Option<String>,
    default: f64,
    min: f64,
    max: f64,
) -> Result<f64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let parsed = raw
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        })?;
    Ok(parsed.clamp(min, max))
}
