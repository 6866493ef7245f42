use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One displayed message. Images and audio are referenced by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Speaker,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub ts: String,
}

/// Append-only message log kept by the presentation layer.
///
/// The chat model never reads this; its own session history is the
/// authoritative context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub started_at: String,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            started_at: now_utc_iso(),
            entries: Vec::new(),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>, image: Option<String>) {
        self.entries.push(TranscriptEntry {
            role: Speaker::User,
            text: text.into(),
            image,
            audio: None,
            ts: now_utc_iso(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, audio: Option<String>) {
        self.entries.push(TranscriptEntry {
            role: Speaker::Assistant,
            text: text.into(),
            image: None,
            audio,
            ts: now_utc_iso(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn write_transcript(
    path: &Path,
    transcript: &Transcript,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(transcript)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(
        "message_count".to_string(),
        Value::Number(transcript.len().into()),
    );
    payload.insert("written_at".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
