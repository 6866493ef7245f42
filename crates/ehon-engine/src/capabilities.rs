//! Hosted-model capabilities the conversation core depends on.
//!
//! The session state machine only sees these traits, so tests drive it with
//! scripted stand-ins instead of the network.

use ehon_contracts::persona::Voice;

use crate::error::ModelError;
use crate::image_input::ImageInput;
use crate::session::ChatTurn;

pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;
    /// Returns the model's free-text answer to `instruction` about `image`.
    fn describe_image(&self, instruction: &str, image: &ImageInput) -> Result<String, ModelError>;
}

pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    /// Sends `message` after replaying `history`; the caller owns the history.
    fn send(&self, history: &[ChatTurn], message: &str) -> Result<String, ModelError>;
}

pub trait SpeechModel: Send + Sync {
    fn name(&self) -> &str;
    /// Returns raw mono s16le PCM at 24 kHz.
    fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, ModelError>;
}

pub trait TranscriptionModel: Send + Sync {
    fn name(&self) -> &str;
    fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ModelError>;
}
