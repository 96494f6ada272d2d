//! Append-only persistence for published chat messages
//!
//! The hub treats the store as best-effort: a failed append is logged and
//! the message is still delivered.

use crate::error::{HubError, Result};
use crate::types::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A persisted message with the id the store gave it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: u64,
    #[serde(flatten)]
    pub message: ChatMessage,
}

/// Sink for published messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message and return its id
    async fn append(&self, message: &ChatMessage) -> Result<u64>;

    /// The most recent `limit` messages (all when `None`), oldest first
    async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredMessage>>;
}

fn tail(mut entries: Vec<StoredMessage>, limit: Option<usize>) -> Vec<StoredMessage> {
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }
    entries
}

/// Store that lives only as long as the process
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let id = entries.len() as u64 + 1;
        entries.push(StoredMessage {
            id,
            message: message.clone(),
        });
        Ok(id)
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredMessage>> {
        let entries = self.entries.lock().await.clone();
        Ok(tail(entries, limit))
    }
}

struct JsonlWriter {
    file: File,
    next_id: u64,
}

/// JSON Lines file, one [`StoredMessage`] per line
pub struct JsonlStore {
    path: PathBuf,
    writer: Mutex<JsonlWriter>,
}

impl JsonlStore {
    /// Open (or create) the log at `path`. Ids continue after the highest
    /// id already in the file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(HubError::Persistence(format!("{}: {}", path.display(), e))),
        };
        let existing = parse_lines(&text);
        let next_id = existing.iter().map(|m| m.id).max().unwrap_or(0) + 1;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HubError::Persistence(format!("{}: {}", path.display(), e)))?;

        // A torn last line must not swallow the next record
        if !text.is_empty() && !text.ends_with('\n') {
            tracing::warn!("Message log {} ends mid-line, terminating it", path.display());
            file.write_all(b"\n")
                .await
                .map_err(|e| HubError::Persistence(format!("{}: {}", path.display(), e)))?;
        }

        tracing::info!(
            "Opened message log {} ({} existing messages)",
            path.display(),
            existing.len()
        );

        Ok(Self {
            path,
            writer: Mutex::new(JsonlWriter { file, next_id }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_lines(text: &str) -> Vec<StoredMessage> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Skipping unreadable message log line: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl MessageStore for JsonlStore {
    async fn append(&self, message: &ChatMessage) -> Result<u64> {
        let mut writer = self.writer.lock().await;
        let stored = StoredMessage {
            id: writer.next_id,
            message: message.clone(),
        };

        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');

        writer
            .file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| HubError::Persistence(e.to_string()))?;
        writer
            .file
            .flush()
            .await
            .map_err(|e| HubError::Persistence(e.to_string()))?;

        writer.next_id += 1;
        Ok(stored.id)
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredMessage>> {
        // Hold the writer so a half-written line is never read back
        let _writer = self.writer.lock().await;

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| HubError::Persistence(format!("{}: {}", self.path.display(), e)))?;

        Ok(tail(parse_lines(&text), limit))
    }
}
