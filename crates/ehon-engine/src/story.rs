use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ehon_contracts::events::{EventPayload, EventWriter};
use ehon_contracts::persona::Voice;
use ehon_contracts::transcript::{write_transcript, Transcript};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::{ChatModel, SpeechModel, TranscriptionModel, VisionModel};
use crate::config::EngineConfig;
use crate::derive::{Derivation, PersonaDeriver};
use crate::error::{RecognitionError, RecoveredError, SpeechError};
use crate::gemini::{GeminiChat, GeminiClient, GeminiSpeech, GeminiTranscriber, GeminiVision};
use crate::image_input::ImageInput;
use crate::prompts::RECOGNITION_FAILED_REPLY;
use crate::session::{ReplyOutcome, SessionManager, SessionState};
use crate::speech::SpeechAdapter;
use crate::transcribe::RecognitionAdapter;

pub const REPLY_AUDIO_FILE: &str = "latest_output.wav";
pub const RECORDING_FILE: &str = "recorded_audio.wav";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const TRANSCRIPT_FILE: &str = "transcript.json";

#[derive(Debug, Clone)]
pub struct TurnResult {
    pub utterance: String,
    pub reply: String,
    pub outcome: ReplyOutcome,
    pub audio_path: Option<PathBuf>,
    pub display_text: String,
    pub session_id: Option<Uuid>,
    pub session_started: bool,
}

/// The four hosted capabilities the engine runs on.
pub struct Capabilities {
    pub vision: Box<dyn VisionModel>,
    pub chat: Box<dyn ChatModel>,
    pub speech: Box<dyn SpeechModel>,
    pub transcription: Box<dyn TranscriptionModel>,
}

impl Capabilities {
    pub fn gemini(config: &EngineConfig) -> Self {
        let client = GeminiClient::new(config);
        Self {
            vision: Box::new(GeminiVision::new(client.clone(), &config.vision_model)),
            chat: Box::new(GeminiChat::new(client.clone(), &config.chat_model)),
            speech: Box::new(GeminiSpeech::new(client.clone(), &config.speech_model)),
            transcription: Box::new(GeminiTranscriber::new(client, &config.transcription_model)),
        }
    }
}

/// Per-turn orchestration: image loading, the session state machine,
/// reply audio, the event log and the transcript.
pub struct StoryEngine {
    out_dir: PathBuf,
    events: EventWriter,
    sessions: SessionManager,
    speech: SpeechAdapter,
    recognition: RecognitionAdapter,
    transcript: Transcript,
}

impl StoryEngine {
    pub fn new(out_dir: &Path, capabilities: Capabilities) -> Result<Self> {
        Self::with_events_path(out_dir, &out_dir.join(EVENTS_FILE), capabilities)
    }

    pub fn with_events_path(out_dir: &Path, events_path: &Path, capabilities: Capabilities) -> Result<Self> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed creating output dir {}", out_dir.display()))?;
        let Capabilities {
            vision,
            chat,
            speech,
            transcription,
        } = capabilities;

        let events = EventWriter::new(events_path, "");
        events.emit(
            "engine_started",
            map_object(json!({
                "out_dir": out_dir.to_string_lossy().to_string(),
                "vision_model": vision.name(),
                "chat_model": chat.name(),
                "speech_model": speech.name(),
                "transcription_model": transcription.name(),
            })),
        )?;

        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            events,
            sessions: SessionManager::new(PersonaDeriver::new(vision), chat),
            speech: SpeechAdapter::new(speech),
            recognition: RecognitionAdapter::new(transcription, out_dir.join(RECORDING_FILE)),
            transcript: Transcript::new(),
        })
    }

    pub fn from_config(config: &EngineConfig, out_dir: &Path) -> Result<Self> {
        Self::new(out_dir, Capabilities::gemini(config))
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn reply_audio_path(&self) -> PathBuf {
        self.out_dir.join(REPLY_AUDIO_FILE)
    }

    pub fn event_writer(&self) -> EventWriter {
        self.events.clone()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn display_text(&self) -> &str {
        self.sessions.display_text()
    }

    pub fn voice(&self) -> Voice {
        self.sessions.voice()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Runs one turn. Only an unreadable image is returned as an error; model
    /// failures become the reply and event log failures are logged and skipped.
    pub fn turn(&mut self, utterance: &str, image_path: Option<&Path>) -> Result<TurnResult> {
        let image = image_path.map(ImageInput::from_path).transpose()?;
        let previous_session = self.sessions.session().map(|session| session.id());

        let reply = self.sessions.respond(utterance, image.as_ref());

        let session_id = self.sessions.session().map(|session| session.id());
        if session_id != previous_session {
            if let Some(id) = session_id {
                if let Err(err) = self.events.set_conversation_id(id.to_string()) {
                    warn!(session_id = %id, "failed tagging events with the session: {err:#}");
                }
                self.emit_logged(
                    "session_started",
                    json!({
                        "session_id": id.to_string(),
                        "kind": self.sessions.state().label(),
                    }),
                );
            }
        }

        if let Some(label) = reply.derivation {
            self.emit_derivation(label, image.as_ref());
        }
        for error in &reply.errors {
            self.emit_recovered(error);
        }
        self.emit_logged(
            "reply",
            json!({
                "utterance": utterance.trim(),
                "reply": reply.text,
                "outcome": reply.outcome.as_str(),
                "state": self.sessions.state().label(),
            }),
        );

        self.transcript.push_user(
            utterance.trim(),
            image_path.map(|path| path.to_string_lossy().to_string()),
        );
        self.finish_turn(utterance.trim(), reply.text, reply.outcome, reply.session_started)
    }

    /// Transcribes `recording` and runs a turn with it. When recognition
    /// fails the child is asked to try again and no model call is made.
    pub fn voice_turn(&mut self, recording: &Path, image_path: Option<&Path>) -> Result<TurnResult> {
        match self.recognition.transcribe(recording) {
            Ok(text) => {
                self.emit_logged(
                    "transcribed",
                    json!({
                        "recording": recording.to_string_lossy().to_string(),
                        "text": text,
                    }),
                );
                self.turn(&text, image_path)
            }
            Err(err) => {
                warn!(recording = %recording.display(), "speech recognition failed: {err}");
                self.emit_recovered(&RecoveredError::Recognition(err));
                self.transcript.push_user(
                    "",
                    image_path.map(|path| path.to_string_lossy().to_string()),
                );
                self.finish_turn(
                    "",
                    RECOGNITION_FAILED_REPLY.to_string(),
                    ReplyOutcome::RecognitionFailed,
                    false,
                )
            }
        }
    }

    /// One-shot extraction for a page; the live session is not touched.
    pub fn describe(&self, image_path: &Path) -> Result<Derivation> {
        let image = ImageInput::from_path(image_path)?;
        Ok(self.sessions.deriver().derive(&image))
    }

    /// Speaks `text` with the current persona's voice.
    pub fn say(&self, text: &str, out: Option<&Path>) -> Option<PathBuf> {
        let path = out.map(Path::to_path_buf).unwrap_or_else(|| self.reply_audio_path());
        self.speech.synthesize_to_wav(text, &path, self.voice())
    }

    pub fn transcribe(&self, recording: &Path) -> Result<String, RecognitionError> {
        self.recognition.transcribe(recording)
    }

    pub fn write_transcript(&self) -> Result<PathBuf> {
        let path = self.out_dir.join(TRANSCRIPT_FILE);
        let mut extra = Map::new();
        extra.insert(
            "display_text".to_string(),
            Value::String(self.display_text().to_string()),
        );
        extra.insert(
            "state".to_string(),
            Value::String(self.state().label().to_string()),
        );
        write_transcript(&path, &self.transcript, Some(&extra))?;
        Ok(path)
    }

    fn finish_turn(
        &mut self,
        utterance: &str,
        reply: String,
        outcome: ReplyOutcome,
        session_started: bool,
    ) -> Result<TurnResult> {
        let voice = self.voice();
        let target = self.reply_audio_path();
        let audio_path = match self.speech.try_synthesize_to_wav(&reply, &target, voice) {
            Ok(path) => {
                self.emit_logged(
                    "audio_written",
                    json!({
                        "path": path.to_string_lossy().to_string(),
                        "voice": voice.as_str(),
                    }),
                );
                Some(path)
            }
            Err(SpeechError::EmptyText) => {
                self.emit_logged(
                    "audio_skipped",
                    json!({ "voice": voice.as_str(), "reason": "empty_text" }),
                );
                None
            }
            Err(err) => {
                warn!(voice = voice.as_str(), "reply audio skipped: {err}");
                self.emit_recovered(&RecoveredError::Synthesis(err));
                None
            }
        };

        self.transcript.push_assistant(
            reply.clone(),
            audio_path
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        );
        info!(outcome = outcome.as_str(), state = self.state().label(), "turn finished");

        Ok(TurnResult {
            utterance: utterance.to_string(),
            reply,
            outcome,
            audio_path,
            display_text: self.display_text().to_string(),
            session_id: self.sessions.session().map(|session| session.id()),
            session_started,
        })
    }

    fn emit_derivation(&self, label: &str, image: Option<&ImageInput>) {
        let image_label = image.map(|image| image.label.clone()).unwrap_or_default();
        match label {
            "persona" => {
                let record = self.sessions.persona_metadata();
                let fields: Map<String, Value> = record
                    .iter()
                    .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                    .collect();
                self.emit_logged(
                    "persona_derived",
                    json!({
                        "image": image_label,
                        "name": record.name(),
                        "voice": self.voice().as_str(),
                        "fields": fields,
                    }),
                );
            }
            "no_character" => {
                self.emit_logged("no_character", json!({ "image": image_label }));
            }
            _ => {}
        }
    }

    fn emit_recovered(&self, error: &RecoveredError) {
        let event_type = match error {
            RecoveredError::Extraction(_) => "extraction_failed",
            RecoveredError::Chat(_) => "chat_failed",
            RecoveredError::Synthesis(_) => "audio_skipped",
            RecoveredError::Recognition(_) => "recognition_failed",
        };
        self.emit_logged(
            event_type,
            json!({
                "error_kind": error.kind(),
                "error": error.to_string(),
            }),
        );
    }

    /// Event log writes after a turn has run must not cost the child the reply.
    fn emit_logged(&self, event_type: &str, payload: Value) {
        if let Err(err) = self.events.emit(event_type, map_object(payload)) {
            warn!(event_type, "failed writing event: {err:#}");
        }
    }
}

fn map_object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
