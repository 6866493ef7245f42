//! Scripted capability stand-ins for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ehon_contracts::persona::Voice;

use crate::capabilities::{ChatModel, SpeechModel, TranscriptionModel, VisionModel};
use crate::error::ModelError;
use crate::image_input::ImageInput;
use crate::session::ChatTurn;

pub(crate) fn model_failure(model: &str, detail: &str) -> ModelError {
    ModelError::Payload {
        model: model.to_string(),
        detail: detail.to_string(),
    }
}

pub(crate) fn page(label: &str) -> ImageInput {
    ImageInput::from_bytes(vec![0xff, 0xd8, 0xff], "image/jpeg", label)
}

/// Answers queued in order; an exhausted queue fails the call.
#[derive(Clone, Default)]
pub(crate) struct ScriptedVision {
    answers: Arc<Mutex<VecDeque<Result<String, ModelError>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedVision {
    pub fn answering(answer: &str) -> Self {
        let vision = Self::default();
        vision.push(Ok(answer.to_string()));
        vision
    }

    pub fn push(&self, answer: Result<String, ModelError>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl VisionModel for ScriptedVision {
    fn name(&self) -> &str {
        "scripted-vision"
    }

    fn describe_image(&self, instruction: &str, image: &ImageInput) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}|{}", image.label, instruction));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(model_failure("scripted-vision", "no scripted answer")))
    }
}

/// Records every call with the history it saw. Replies are queued; when the
/// queue is empty it echoes `reply to: <message>`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedChat {
    replies: Arc<Mutex<VecDeque<Result<String, ModelError>>>>,
    pub calls: Arc<Mutex<Vec<(Vec<ChatTurn>, String)>>>,
}

impl ScriptedChat {
    pub fn push(&self, reply: Result<String, ModelError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(Vec<ChatTurn>, String)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted-chat"
    }

    fn send(&self, history: &[ChatTurn], message: &str) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((history.to_vec(), message.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("reply to: {message}")))
    }
}

/// Returns fixed PCM bytes, or fails when `pcm` is `None`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSpeech {
    pub pcm: Option<Vec<u8>>,
    pub calls: Arc<Mutex<Vec<(String, Voice)>>>,
}

impl ScriptedSpeech {
    pub fn with_pcm(pcm: Vec<u8>) -> Self {
        Self {
            pcm: Some(pcm),
            calls: Arc::default(),
        }
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, voice)| *voice)
            .collect()
    }
}

impl SpeechModel for ScriptedSpeech {
    fn name(&self) -> &str {
        "scripted-speech"
    }

    fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, ModelError> {
        self.calls.lock().unwrap().push((text.to_string(), voice));
        self.pcm
            .clone()
            .ok_or_else(|| model_failure("scripted-speech", "speech quota exceeded"))
    }
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedTranscriber {
    pub transcript: Option<String>,
    pub calls: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ScriptedTranscriber {
    pub fn hearing(text: &str) -> Self {
        Self {
            transcript: Some(text.to_string()),
            calls: Arc::default(),
        }
    }
}

impl TranscriptionModel for ScriptedTranscriber {
    fn name(&self) -> &str {
        "scripted-transcriber"
    }

    fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((audio.len(), mime_type.to_string()));
        self.transcript
            .clone()
            .ok_or_else(|| model_failure("scripted-transcriber", "audio too short"))
    }
}
