//! Errors reported by workspace, installer and orchestrator operations.
//!
//! Nothing here is retried internally; every variant goes back to the
//! immediate caller, which decides how to report it.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::ProjectId;

/// Result type for workspace operations
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Could not allocate a free project id after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("Invalid project id: {0:?}")]
    InvalidProjectId(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Path escapes its root: {path}")]
    InvalidPath { path: String },

    #[error("File {} is outside root {}", path.display(), root.display())]
    ContainmentViolation { path: PathBuf, root: PathBuf },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Duplicate override for step '{step}'")]
    DuplicateOverride { step: String },

    #[error("Override targets step '{step}' which is not in the installed pipeline")]
    UnknownOverrideTarget { step: String },

    #[error("Project {project} has no installed configuration ({missing})")]
    MissingConfiguration {
        project: ProjectId,
        missing: &'static str,
    },

    #[error("Malformed extension mapping at line {line}: {content:?}")]
    MalformedMapping { line: usize, content: String },

    #[error("Pipeline definition error: {0}")]
    PipelineDefinition(#[from] serde_yaml::Error),

    #[error("Invalid locale: {0:?}")]
    InvalidLocale(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Project {0} has no output files")]
    EmptyOutput(ProjectId),

    #[error("Configuration install failed: {0}")]
    InstallFailed(String),

    #[error("Project {0} is already executing")]
    ExecutionInProgress(ProjectId),

    #[error("Pipeline execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Event log error: {0}")]
    EventLog(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for WorkspaceError {
    fn from(err: tokio::task::JoinError) -> Self {
        WorkspaceError::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

/// Run blocking filesystem work off the async executor
pub(crate) async fn blocking<T, F>(f: F) -> WorkspaceResult<T>
where
    F: FnOnce() -> WorkspaceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
