//! Project identity and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::{ProjectEvent, ProjectEventType};
use super::run::RunLocales;
use crate::core::error::WorkspaceError;
use crate::core::layout::{CREATE_LOCK_FILE, PLUGINS_DIR};

/// Opaque project identifier, always a single safe path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Validate a caller-supplied identifier.
    ///
    /// Names reserved at the workspace root are never project ids.
    pub fn parse(raw: &str) -> Result<Self, WorkspaceError> {
        let valid = !raw.is_empty()
            && raw != "."
            && raw != ".."
            && raw != PLUGINS_DIR
            && raw != CREATE_LOCK_FILE
            && !raw
                .chars()
                .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control());

        if !valid {
            return Err(WorkspaceError::InvalidProjectId(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = WorkspaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Lifecycle state of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    /// Directory tree exists, nothing installed yet
    Created,

    /// Batch configuration installed
    Configured,

    /// Configured and input files added
    Populated,

    /// A run is in flight
    Executing,

    /// Last run returned without error
    Completed,

    /// Project directory no longer exists
    Deleted,
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProjectState::Created => "created",
            ProjectState::Configured => "configured",
            ProjectState::Populated => "populated",
            ProjectState::Executing => "executing",
            ProjectState::Completed => "completed",
            ProjectState::Deleted => "deleted",
        };
        write!(f, "{}", name)
    }
}

/// Project status reconstructed from its event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub id: ProjectId,

    pub state: ProjectState,

    /// When the project was created (if recorded)
    pub created_at: Option<DateTime<Utc>>,

    pub configured: bool,

    pub has_inputs: bool,

    /// Number of runs started
    pub runs: usize,

    /// Locales of the most recent run
    pub locales: Option<RunLocales>,

    /// Error of the most recent run, if it failed
    pub last_error: Option<String>,
}

impl ProjectStatus {
    /// Status of a project whose directory is gone
    pub fn deleted(id: ProjectId) -> Self {
        Self {
            id,
            state: ProjectState::Deleted,
            created_at: None,
            configured: false,
            has_inputs: false,
            runs: 0,
            locales: None,
            last_error: None,
        }
    }

    /// Reconstruct status by replaying events in order
    pub fn from_events(id: ProjectId, events: &[ProjectEvent]) -> Self {
        let mut status = Self {
            state: ProjectState::Created,
            ..Self::deleted(id)
        };

        for event in events {
            status.apply_event(event);
        }

        status
    }

    /// Apply a single event
    pub fn apply_event(&mut self, event: &ProjectEvent) {
        match event.event_type {
            ProjectEventType::ProjectCreated => {
                self.created_at = Some(event.timestamp);
                self.state = ProjectState::Created;
            }
            ProjectEventType::ConfigurationInstalled => {
                self.configured = true;
                self.state = self.settled_state();
            }
            ProjectEventType::ConfigurationRemoved => {
                self.configured = false;
                self.state = self.settled_state();
            }
            ProjectEventType::InputAdded => {
                self.has_inputs = true;
                if self.state != ProjectState::Executing {
                    self.state = self.settled_state();
                }
            }
            ProjectEventType::RunStarted => {
                self.runs += 1;
                self.locales = event.locales.clone();
                self.last_error = None;
                self.state = ProjectState::Executing;
            }
            ProjectEventType::RunCompleted => {
                self.state = ProjectState::Completed;
            }
            ProjectEventType::RunFailed => {
                self.last_error = event.error.clone();
                self.state = self.settled_state();
            }
        }
    }

    /// State the project rests in when no run is active
    fn settled_state(&self) -> ProjectState {
        match (self.configured, self.has_inputs) {
            (true, true) => ProjectState::Populated,
            (true, false) => ProjectState::Configured,
            _ => ProjectState::Created,
        }
    }
}
