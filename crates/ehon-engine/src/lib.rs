pub mod capabilities;
pub mod config;
pub mod derive;
pub mod error;
pub mod gemini;
pub mod image_input;
pub mod prompts;
pub mod session;
pub mod speech;
pub mod story;
pub mod transcribe;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, ModelOverrides};
pub use derive::{Derivation, PersonaDeriver};
pub use error::{ConfigError, ModelError, RecoveredError};
pub use image_input::ImageInput;
pub use session::{ReplyOutcome, SessionManager, SessionState};
pub use story::{Capabilities, StoryEngine, TurnResult};
