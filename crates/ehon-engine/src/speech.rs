use std::fs;
use std::path::{Path, PathBuf};

use ehon_contracts::persona::Voice;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};

use crate::capabilities::SpeechModel;
use crate::error::SpeechError;

pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Writes reply text to a WAV file with the speech model.
pub struct SpeechAdapter {
    model: Box<dyn SpeechModel>,
}

impl SpeechAdapter {
    pub fn new(model: Box<dyn SpeechModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Returns the written path, or `None` after logging why nothing was
    /// written.
    pub fn synthesize_to_wav(&self, text: &str, path: &Path, voice: Voice) -> Option<PathBuf> {
        match self.try_synthesize_to_wav(text, path, voice) {
            Ok(path) => Some(path),
            Err(SpeechError::EmptyText) => {
                debug!("skipping speech for empty text");
                None
            }
            Err(err) => {
                warn!(voice = voice.as_str(), "speech synthesis failed: {err}");
                None
            }
        }
    }

    pub fn try_synthesize_to_wav(
        &self,
        text: &str,
        path: &Path,
        voice: Voice,
    ) -> Result<PathBuf, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }
        let pcm = self.model.synthesize(text, voice)?;
        write_wav(path, &pcm)?;
        info!(
            path = %path.display(),
            voice = voice.as_str(),
            samples = pcm.len() / 2,
            "wrote reply audio"
        );
        Ok(path.to_path_buf())
    }
}

/// Wraps raw mono s16le PCM in a WAV container. The writer is finalized
/// before returning so the header carries the real data length.
pub fn write_wav(path: &Path, pcm: &[u8]) -> Result<(), SpeechError> {
    let wav_err = |source| SpeechError::Wav {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| wav_err(hound::Error::IoError(err)))?;
    }
    if pcm.len() % 2 != 0 {
        debug!(bytes = pcm.len(), "dropping trailing odd PCM byte");
    }

    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for chunk in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
            .map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}
