use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::capabilities::TranscriptionModel;
use crate::error::RecognitionError;

pub const RECORDING_MIME: &str = "audio/wav";

/// Turns a spoken WAV recording into the utterance text.
pub struct RecognitionAdapter {
    model: Box<dyn TranscriptionModel>,
    recording_slot: PathBuf,
}

impl RecognitionAdapter {
    /// `recording_slot` is the reusable copy every recording is written to
    /// before upload.
    pub fn new(model: Box<dyn TranscriptionModel>, recording_slot: impl Into<PathBuf>) -> Self {
        Self {
            model,
            recording_slot: recording_slot.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn recording_slot(&self) -> &Path {
        &self.recording_slot
    }

    pub fn transcribe(&self, recording: &Path) -> Result<String, RecognitionError> {
        let audio = fs::read(recording).map_err(|source| RecognitionError::Io {
            path: recording.to_path_buf(),
            source,
        })?;
        if recording != self.recording_slot {
            if let Some(parent) = self.recording_slot.parent() {
                fs::create_dir_all(parent).map_err(|source| RecognitionError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&self.recording_slot, &audio).map_err(|source| RecognitionError::Io {
                path: self.recording_slot.clone(),
                source,
            })?;
            debug!(slot = %self.recording_slot.display(), "stored recording");
        }

        let transcript = self.model.transcribe(&audio, RECORDING_MIME)?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(RecognitionError::EmptyTranscript);
        }
        info!(chars = transcript.chars().count(), "transcribed recording");
        Ok(transcript.to_string())
    }
}
