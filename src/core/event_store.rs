//! Append-only project event log with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL) next to the project
//! directories they describe, so deleting a project deletes its history.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::error::WorkspaceResult;
use crate::domain::{ProjectEvent, ProjectEventType};

/// JSONL event log of a single project
pub struct ProjectEventLog {
    /// Path to the events.jsonl file
    events_path: PathBuf,
}

impl ProjectEventLog {
    /// Open the log at `events_path`; the file is created on first append
    pub fn open(events_path: impl Into<PathBuf>) -> Self {
        Self {
            events_path: events_path.into(),
        }
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &ProjectEvent) -> WorkspaceResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await?;

        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> WorkspaceResult<Vec<ProjectEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(
        &self,
        event_type: ProjectEventType,
    ) -> WorkspaceResult<Option<ProjectEvent>> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }
}
