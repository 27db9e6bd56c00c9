//! Project lifecycle events.
//!
//! Every state change of a project is appended to its `events.jsonl` log.
//! The project's current lifecycle state is derived by replaying it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;
use super::run::RunLocales;

/// A single entry in a project's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The project this event belongs to
    pub project_id: ProjectId,

    /// Type of event
    pub event_type: ProjectEventType,

    /// Human-readable summary
    pub summary: String,

    /// Locales of a run (RunStarted only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locales: Option<RunLocales>,

    /// Time taken in milliseconds (for finished runs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error message if a run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectEvent {
    /// Create a new event with the current timestamp
    pub fn new(project_id: ProjectId, event_type: ProjectEventType, summary: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            project_id,
            event_type,
            summary,
            locales: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_locales(mut self, locales: RunLocales) -> Self {
        self.locales = Some(locales);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Types of events in a project's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectEventType {
    /// Directory tree created
    ProjectCreated,

    /// Batch configuration installed (with overrides merged)
    ConfigurationInstalled,

    /// Previous configuration cleared ahead of a re-install
    ConfigurationRemoved,

    /// One or more input files added
    InputAdded,

    /// Pipeline Engine invoked
    RunStarted,

    /// Pipeline Engine returned without error
    RunCompleted,

    /// Pipeline Engine reported a failure
    RunFailed,
}
