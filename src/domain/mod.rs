//! Domain types for the project workspace.
//!
//! This module contains the core data structures:
//! - Project: identity and lifecycle state
//! - Events: append-only records of project state changes
//! - Step: installed pipeline steps and overrides
//! - Run: the request handed to the Pipeline Engine

pub mod events;
pub mod project;
pub mod run;
pub mod step;

// Re-export commonly used types
pub use events::{ProjectEvent, ProjectEventType};
pub use project::{ProjectId, ProjectState, ProjectStatus};
pub use run::{PipelineRunRequest, RunDocument, RunLocales, RunMode, RunOutcome};
pub use step::{PipelineDefinition, PipelineStep, StepKind, StepOverride};
