use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::runs::receipts::sanitize_payload;

pub type EventPayload = Map<String, Value>;

const RESERVED_KEYS: [&str; 4] = ["type", "session_id", "seq", "ts"];

#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    session_id: String,
    seq: AtomicU64,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Shared {
                path: path.into(),
                session_id: session_id.into(),
                seq: AtomicU64::new(0),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut record = match sanitize_payload(&Value::Object(payload)) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for key in RESERVED_KEYS {
            record.remove(key);
        }

        let mut guard = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        // seq is taken under the lock so file order and seq order agree.
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst);
        record.insert("type".to_string(), Value::String(event_type.to_string()));
        record.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        record.insert("seq".to_string(), Value::Number(seq.into()));
        record.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );

        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            file.write_all(&line)
                .with_context(|| format!("failed to append to {}", self.inner.path.display()))?;
        }
        Ok(Value::Object(record))
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed to open {}", self.inner.path.display()))
    }
}

pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}: line {} is not JSON", path.display(), idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{read_events, EventPayload, EventWriter};

    fn payload(value: Value) -> EventPayload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn records_carry_session_seq_and_timestamp() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let emitted = writer.emit("credential_checked", payload(json!({ "phase": "ready" })))?;
        let events = read_events(&path)?;

        assert_eq!(events, vec![emitted]);
        assert_eq!(events[0]["type"], "credential_checked");
        assert_eq!(events[0]["session_id"], "session-123");
        assert_eq!(events[0]["phase"], "ready");
        assert_eq!(events[0]["seq"], 0);
        DateTime::parse_from_rfc3339(events[0]["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_cannot_spoof_reserved_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-123");

        let emitted = writer.emit(
            "session_started",
            payload(json!({ "session_id": "other", "seq": 99, "type": "fake" })),
        )?;
        assert_eq!(emitted["session_id"], "session-123");
        assert_eq!(emitted["seq"], 0);
        assert_eq!(emitted["type"], "session_started");
        Ok(())
    }

    #[test]
    fn inline_image_data_never_reaches_the_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit(
            "generation_started",
            payload(json!({
                "part": { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
            })),
        )?;
        let raw = std::fs::read_to_string(&path)?;
        assert!(!raw.contains("QUJD"));
        assert!(raw.contains("image/png"));
        Ok(())
    }

    #[test]
    fn clones_share_file_and_counter() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit("one", EventPayload::new())?;
        writer.clone().emit("two", EventPayload::new())?;

        let events = read_events(&path)?;
        let seqs = events
            .iter()
            .map(|event| (event["type"].clone(), event["seq"].clone()))
            .collect::<Vec<_>>();
        assert_eq!(seqs, vec![(json!("one"), json!(0)), (json!("two"), json!(1))]);
        Ok(())
    }
}
