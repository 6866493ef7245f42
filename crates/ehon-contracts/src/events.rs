use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only writer for a conversation's `events.jsonl`.
///
/// Each line is one compact JSON object carrying `type`, `conversation_id`
/// and `ts`; the caller payload is merged last and may override them.
/// The conversation id can be switched when the chat session is replaced,
/// so later lines are attributed to the new session.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    conversation_id: Mutex<String>,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, conversation_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                conversation_id: Mutex::new(conversation_id.into()),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn conversation_id(&self) -> String {
        self.inner
            .conversation_id
            .lock()
            .map(|id| id.clone())
            .unwrap_or_default()
    }

    pub fn set_conversation_id(&self, conversation_id: impl Into<String>) -> anyhow::Result<()> {
        let mut current = self
            .inner
            .conversation_id
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer conversation id poisoned"))?;
        *current = conversation_id.into();
        Ok(())
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "conversation_id".to_string(),
            Value::String(self.conversation_id()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
