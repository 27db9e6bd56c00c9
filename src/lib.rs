//! locstage - Project workspace and execution orchestrator for localization pipelines
//!
//! Manages isolated, disk-backed projects: each one receives input documents
//! and a batch configuration, runs them through an external Pipeline Engine
//! and exposes the resulting output files.
//!
//! # Architecture
//!
//! - Every project owns a disjoint directory subtree under the workspace root
//! - Project state changes are recorded as events; status is derived by replay
//! - The Pipeline Engine is an external collaborator behind a trait
//!
//! # Modules
//!
//! - `adapters`: Pipeline Engine interface and subprocess engine
//! - `core`: Workspace, archive codec, installer and orchestrator
//! - `domain`: Data structures (ProjectId, ProjectEvent, PipelineStep, run requests)
//! - `config`: Workspace root, id strategy and engine settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a project and fill it
//! locstage project new
//! locstage input add-archive 1 site.zip
//! locstage config install 1 settings.bconf
//!
//! # Run and collect the results
//! locstage execute 1 --source en --target fr
//! locstage output archive 1 -o out.zip
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{CommandEngine, InstalledConfiguration, PipelineEngine};
pub use config::ResolvedConfig;
pub use core::{
    BatchConfigInstaller, IdStrategy, Orchestrator, Workspace, WorkspaceError, WorkspaceResult,
};
pub use domain::{
    PipelineDefinition, PipelineRunRequest, PipelineStep, ProjectId, ProjectState, ProjectStatus,
    RunLocales, RunMode, RunOutcome, StepKind, StepOverride,
};
