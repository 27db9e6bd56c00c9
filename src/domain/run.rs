//! Pipeline run requests and their inputs.
//!
//! A `PipelineRunRequest` is assembled fresh for every execution, handed to
//! the Pipeline Engine and discarded. It is never persisted.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::project::ProjectId;
use super::step::PipelineStep;
use crate::core::error::WorkspaceError;

/// How the engine should treat the project's input files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every input file is a document to process
    Document,

    /// A single translated package (or its manifest) is merged back
    Merge,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Document => write!(f, "document"),
            RunMode::Merge => write!(f, "merge"),
        }
    }
}

/// An input file registered with a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDocument {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Path relative to the input root (forward slashes)
    pub relative_path: String,

    /// Filter configuration resolved from the file extension
    pub filter_config: Option<String>,
}

/// Source and target locales for a run.
///
/// `None` fields mean "not provided by the caller".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLocales {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Target used by the pipeline itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Full target list (first entry equals `target`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

impl RunLocales {
    /// No locales; the project's previous ones stay in effect
    pub fn none() -> Self {
        Self::default()
    }

    /// Source plus a single target
    pub fn pair(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
            targets: None,
        }
    }

    /// Source plus several targets; the first drives the pipeline
    pub fn multi(source: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            source: Some(source.into()),
            target: targets.first().cloned(),
            targets: if targets.is_empty() { None } else { Some(targets) },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.target.is_none() && self.targets.is_none()
    }

    /// Normalize every locale code, rejecting malformed ones
    pub fn normalized(self) -> Result<Self, WorkspaceError> {
        Ok(Self {
            source: self.source.as_deref().map(normalize_locale).transpose()?,
            target: self.target.as_deref().map(normalize_locale).transpose()?,
            targets: self
                .targets
                .map(|list| {
                    list.iter()
                        .map(|l| normalize_locale(l))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?,
        })
    }

    /// Fill fields the caller left unset from a previous run's locales
    pub fn or_previous(self, previous: Option<&RunLocales>) -> Self {
        let Some(previous) = previous else {
            return self;
        };

        let keep_previous_targets = self.target.is_none() && self.targets.is_none();
        Self {
            source: self.source.or_else(|| previous.source.clone()),
            target: if keep_previous_targets {
                previous.target.clone()
            } else {
                self.target
            },
            targets: if keep_previous_targets {
                previous.targets.clone()
            } else {
                self.targets
            },
        }
    }
}

/// Normalize a locale code: `en_US` -> `en-us`
pub fn normalize_locale(code: &str) -> Result<String, WorkspaceError> {
    let trimmed = code.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(WorkspaceError::InvalidLocale(code.to_string()));
    }

    Ok(trimmed.replace('_', "-").to_ascii_lowercase())
}

/// Everything the Pipeline Engine needs for one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunRequest {
    pub project_id: ProjectId,

    pub mode: RunMode,

    /// Ordered steps with output parameters already rewritten
    pub steps: Vec<PipelineStep>,

    pub input_root: PathBuf,

    pub output_root: PathBuf,

    /// Directory holding installed filter configurations and plug-ins
    pub config_dir: PathBuf,

    pub documents: Vec<RunDocument>,

    #[serde(default)]
    pub locales: RunLocales,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub documents: usize,
    pub duration_ms: u64,
}
