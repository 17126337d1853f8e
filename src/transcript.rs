use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::user::UserId;
use crate::validation::FieldErrors;

/// Append-only JSONL record of one session. A disabled transcript accepts
/// every event and writes nothing.
pub struct Transcript {
    pub path: Option<PathBuf>,
    session_id: String,
    file: Option<File>,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl Transcript {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open transcript {}", path.display()))?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            session_id: session_id.to_string(),
            file: Some(file),
        })
    }

    pub fn disabled(session_id: &str) -> Self {
        Self {
            path: None,
            session_id: session_id.to_string(),
            file: None,
        }
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    pub fn session_start(&mut self, collection_url: &str) -> Result<()> {
        self.log(
            "session_start",
            serde_json::json!({ "collection_url": collection_url }),
        )
    }

    pub fn list_loaded(&mut self, count: usize) -> Result<()> {
        self.log("list_loaded", serde_json::json!({ "count": count }))
    }

    /// Log a call that failed at the service boundary
    pub fn request_failed(&mut self, operation: &str, id: Option<UserId>, error: &str) -> Result<()> {
        self.log(
            "request_failed",
            serde_json::json!({
                "operation": operation,
                "id": id,
                "error": error,
            }),
        )
    }

    pub fn validation_failed(&mut self, errors: &FieldErrors) -> Result<()> {
        let fields: Vec<&str> = errors.fields().into_iter().map(|f| f.as_str()).collect();
        self.log(
            "validation_failed",
            serde_json::json!({ "fields": fields }),
        )
    }

    pub fn user_created(&mut self, id: Option<UserId>) -> Result<()> {
        self.log("user_created", serde_json::json!({ "id": id }))
    }

    pub fn user_updated(&mut self, id: Option<UserId>) -> Result<()> {
        self.log("user_updated", serde_json::json!({ "id": id }))
    }

    pub fn user_deleted(&mut self, id: UserId) -> Result<()> {
        self.log("user_deleted", serde_json::json!({ "id": id }))
    }
}
