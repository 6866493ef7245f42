use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ehon_contracts::persona::Voice;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::capabilities::{ChatModel, SpeechModel, TranscriptionModel, VisionModel};
use crate::config::EngineConfig;
use crate::error::ModelError;
use crate::image_input::ImageInput;
use crate::session::{ChatRole, ChatTurn};

const API_KEY_HEADER: &str = "x-goog-api-key";

const TRANSCRIPTION_INSTRUCTION: &str =
    "この音声を日本語で文字起こししてください。話された内容のテキストだけを返してください。";

/// Blocking `generateContent` transport shared by every capability.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    http: HttpClient,
    timeout: Duration,
    transport_retries: usize,
    retry_backoff: Duration,
}

impl GeminiClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http: HttpClient::new(),
            timeout: config.request_timeout,
            transport_retries: config.transport_retries,
            retry_backoff: config.retry_backoff,
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub fn generate_content(&self, model: &str, payload: &Value) -> Result<Value, ModelError> {
        let endpoint = self.endpoint_for_model(model);
        debug!(model, endpoint = %endpoint, "gemini generateContent");
        let response = self.post_with_transport_retries(model, &endpoint, payload)?;
        response_json_or_error(model, response)
    }

    fn post_with_transport_retries(
        &self,
        model: &str,
        endpoint: &str,
        payload: &Value,
    ) -> Result<HttpResponse, ModelError> {
        let mut attempt = 0;
        loop {
            let sent = self
                .http
                .post(endpoint)
                .header(API_KEY_HEADER, self.api_key.as_str())
                .timeout(self.timeout)
                .json(payload)
                .send();

            match sent {
                Ok(response) => return Ok(response),
                Err(source) => {
                    let err = transport_error(model, source);
                    if !err.is_retryable() || attempt >= self.transport_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(
                        model,
                        attempt,
                        max = self.transport_retries,
                        "gemini transport retry after transient failure: {err}"
                    );
                    thread::sleep(self.retry_backoff.mul_f64(attempt as f64));
                }
            }
        }
    }
}

/// reqwest errors carry the request URL; it is dropped so error text stays
/// safe to show and log.
fn transport_error(model: &str, source: reqwest::Error) -> ModelError {
    ModelError::Transport {
        model: model.to_string(),
        source: source.without_url(),
    }
}

fn response_json_or_error(model: &str, response: HttpResponse) -> Result<Value, ModelError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|source| transport_error(model, source))?;
    if !status.is_success() {
        return Err(ModelError::Status {
            model: model.to_string(),
            status: status.as_u16(),
            body: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body).map_err(|err| ModelError::Payload {
        model: model.to_string(),
        detail: err.to_string(),
    })
}

pub(crate) fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub(crate) fn inline_part(mime_type: &str, bytes: &[u8]) -> Value {
    json!({
        "inlineData": {
            "mimeType": mime_type,
            "data": BASE64.encode(bytes),
        }
    })
}

fn candidate_parts(payload: &Value) -> Vec<Value> {
    payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Joins the text parts of the first candidate.
pub(crate) fn extract_text(model: &str, payload: &Value) -> Result<String, ModelError> {
    let text = candidate_parts(payload)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("");
    if text.trim().is_empty() {
        if let Some(reason) = payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            return Err(ModelError::Payload {
                model: model.to_string(),
                detail: format!("prompt blocked ({reason})"),
            });
        }
        return Err(ModelError::Empty {
            model: model.to_string(),
            what: "text",
        });
    }
    Ok(text.trim().to_string())
}

/// Decodes the first inline data part (audio or image bytes).
pub(crate) fn extract_inline_data(model: &str, payload: &Value) -> Result<Vec<u8>, ModelError> {
    for part in candidate_parts(payload) {
        let data = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        return BASE64
            .decode(data.as_bytes())
            .map_err(|err| ModelError::Payload {
                model: model.to_string(),
                detail: format!("inline data base64 decode failed: {err}"),
            });
    }
    Err(ModelError::Empty {
        model: model.to_string(),
        what: "inline data",
    })
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    }
}

pub(crate) fn chat_contents(history: &[ChatTurn], message: &str) -> Vec<Value> {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": role_name(turn.role),
                "parts": [text_part(&turn.text)],
            })
        })
        .collect();
    contents.push(json!({
        "role": "user",
        "parts": [text_part(message)],
    }));
    contents
}

pub(crate) fn speech_payload(text: &str, voice: Voice) -> Value {
    let mut speech_config = Map::new();
    speech_config.insert(
        "voiceConfig".to_string(),
        json!({
            "prebuiltVoiceConfig": { "voiceName": voice.as_str() },
        }),
    );
    json!({
        "contents": [{ "role": "user", "parts": [text_part(text)] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": Value::Object(speech_config),
        },
    })
}

pub struct GeminiVision {
    client: GeminiClient,
    model: String,
}

impl GeminiVision {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl VisionModel for GeminiVision {
    fn name(&self) -> &str {
        &self.model
    }

    fn describe_image(&self, instruction: &str, image: &ImageInput) -> Result<String, ModelError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    text_part(instruction),
                    inline_part(&image.mime_type, &image.bytes),
                ],
            }],
        });
        let response = self.client.generate_content(&self.model, &payload)?;
        extract_text(&self.model, &response)
    }
}

pub struct GeminiChat {
    client: GeminiClient,
    model: String,
}

impl GeminiChat {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl ChatModel for GeminiChat {
    fn name(&self) -> &str {
        &self.model
    }

    fn send(&self, history: &[ChatTurn], message: &str) -> Result<String, ModelError> {
        let payload = json!({ "contents": chat_contents(history, message) });
        let response = self.client.generate_content(&self.model, &payload)?;
        extract_text(&self.model, &response)
    }
}

pub struct GeminiSpeech {
    client: GeminiClient,
    model: String,
}

impl GeminiSpeech {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl SpeechModel for GeminiSpeech {
    fn name(&self) -> &str {
        &self.model
    }

    fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, ModelError> {
        let response = self
            .client
            .generate_content(&self.model, &speech_payload(text, voice))?;
        extract_inline_data(&self.model, &response)
    }
}

pub struct GeminiTranscriber {
    client: GeminiClient,
    model: String,
}

impl GeminiTranscriber {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl TranscriptionModel for GeminiTranscriber {
    fn name(&self) -> &str {
        &self.model
    }

    fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ModelError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    text_part(TRANSCRIPTION_INSTRUCTION),
                    inline_part(mime_type, audio),
                ],
            }],
        });
        let response = self.client.generate_content(&self.model, &payload)?;
        extract_text(&self.model, &response)
    }
}
