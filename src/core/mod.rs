//! Core workspace and orchestration logic.
//!
//! This module contains:
//! - Layout: Deterministic on-disk paths and file listing
//! - IdAllocator: Counter and token project id strategies
//! - Archive: Zip extraction and packing with containment checks
//! - Workspace: Project creation, deletion and file movement
//! - Installer: Batch configuration install with step overrides
//! - Orchestrator: Pipeline run assembly and execution

pub mod archive;
pub mod error;
pub mod event_store;
pub mod filter_map;
pub mod id_allocator;
pub mod installer;
pub mod layout;
pub mod orchestrator;
pub mod workspace;

// Re-export commonly used types
pub use error::{WorkspaceError, WorkspaceResult};
pub use event_store::ProjectEventLog;
pub use filter_map::ExtensionFilterMap;
pub use id_allocator::{CounterAllocator, IdStrategy, ProjectIdAllocator, TokenAllocator};
pub use installer::BatchConfigInstaller;
pub use layout::WorkspaceLayout;
pub use orchestrator::Orchestrator;
pub use workspace::Workspace;
