use std::path::PathBuf;

/// Startup configuration problems. These are the only fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY (or GOOGLE_API_KEY) is not set")]
    MissingCredential,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("no model available: {0}")]
    NoModel(String),
}

/// Failure of a single hosted-model call.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{model} request failed: {source}")]
    Transport {
        model: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{model} request failed ({status}): {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },

    #[error("{model} returned an invalid payload: {detail}")]
    Payload { model: String, detail: String },

    #[error("{model} returned no {what}")]
    Empty { model: String, what: &'static str },
}

impl ModelError {
    /// Timeouts and connection failures; HTTP error statuses are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("nothing to synthesize")]
    EmptyText,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed writing {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("failed reading recording {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("recording produced an empty transcript")]
    EmptyTranscript,
}

/// Errors that are logged and turned into a softened reply instead of
/// ending the conversation.
#[derive(Debug, thiserror::Error)]
pub enum RecoveredError {
    #[error("persona extraction failed: {0}")]
    Extraction(#[source] ModelError),

    #[error("chat reply failed: {0}")]
    Chat(#[source] ModelError),

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] SpeechError),

    #[error("speech recognition failed: {0}")]
    Recognition(#[source] RecognitionError),
}

impl RecoveredError {
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveredError::Extraction(_) => "extraction",
            RecoveredError::Chat(_) => "chat",
            RecoveredError::Synthesis(_) => "synthesis",
            RecoveredError::Recognition(_) => "recognition",
        }
    }
}
