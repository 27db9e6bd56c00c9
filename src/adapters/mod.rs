//! Pipeline Engine interface.
//!
//! The engine does the actual document parsing and conversion. The core only
//! installs configurations through it and hands it fully assembled run
//! requests.

pub mod command;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{PipelineRunRequest, PipelineStep};

// Re-export the subprocess engine
pub use command::CommandEngine;

/// What a configuration install produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledConfiguration {
    /// Ordered pipeline steps, as found in the bundle
    pub steps: Vec<PipelineStep>,

    /// File extension to filter configuration id
    #[serde(default)]
    pub filter_mappings: BTreeMap<String, String>,
}

/// Trait for the external Pipeline Engine
#[async_trait]
pub trait PipelineEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Unpack a batch configuration bundle into `config_dir`
    async fn install_configuration(
        &self,
        bundle: &Path,
        config_dir: &Path,
    ) -> Result<InstalledConfiguration>;

    /// Run the pipeline to completion
    async fn execute(&self, request: &PipelineRunRequest) -> Result<()>;

    /// Check the engine is reachable
    async fn health_check(&self) -> Result<()>;
}
