//! Batch configuration installer.
//!
//! Copies an uploaded bundle into the project, has the Pipeline Engine unpack
//! it, merges caller overrides into the resulting step list and persists the
//! extension map and pipeline definition. Overrides are merged here and
//! nowhere else.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, instrument};

use super::error::{WorkspaceError, WorkspaceResult};
use super::filter_map::ExtensionFilterMap;
use super::workspace::Workspace;
use crate::adapters::PipelineEngine;
use crate::domain::{PipelineDefinition, ProjectEvent, ProjectEventType, ProjectId, StepOverride};

pub struct BatchConfigInstaller {
    workspace: Arc<Workspace>,
    engine: Arc<dyn PipelineEngine>,
}

impl BatchConfigInstaller {
    pub fn new(workspace: Arc<Workspace>, engine: Arc<dyn PipelineEngine>) -> Self {
        Self { workspace, engine }
    }

    /// Install `bundle` into the project, applying `overrides`.
    ///
    /// Returns the pipeline definition as persisted, with overrides merged
    /// and package steps pointed at the project's output directory. On any
    /// failure the project is left without an installed pipeline.
    #[instrument(skip(self, bundle, overrides), fields(project = %id, overrides = overrides.len()))]
    pub async fn install(
        &self,
        id: &ProjectId,
        bundle: &Path,
        overrides: &[StepOverride],
    ) -> WorkspaceResult<PipelineDefinition> {
        self.workspace.ensure_project(id)?;
        let override_map = index_overrides(overrides)?;

        if !fs::metadata(bundle).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(WorkspaceError::FileNotFound(bundle.to_path_buf()));
        }

        let layout = self.workspace.layout();
        let batch_file = layout.batch_config_file(id);
        let config_dir = layout.config_dir(id);
        let pipeline_file = layout.pipeline_definition_file(id);
        let mapping_file = layout.extension_mapping_file(id);

        if !same_file(bundle, &batch_file).await {
            fs::copy(bundle, &batch_file).await?;
        }

        // A previous install must not survive a failed one
        let removed_pipeline = remove_if_exists(&pipeline_file).await?;
        let removed_mapping = remove_if_exists(&mapping_file).await?;
        if removed_pipeline || removed_mapping {
            debug!("Removed previous configuration");
            self.workspace
                .record(ProjectEvent::new(
                    id.clone(),
                    ProjectEventType::ConfigurationRemoved,
                    "Previous configuration removed".to_string(),
                ))
                .await?;
        }
        fs::create_dir_all(&config_dir).await?;

        let installed = self
            .engine
            .install_configuration(&batch_file, &config_dir)
            .await
            .map_err(|e| WorkspaceError::InstallFailed(format!("{:#}", e)))?;

        let mut definition = PipelineDefinition::new(installed.steps);
        apply_overrides(&mut definition, &override_map)?;
        definition.redirect_outputs(&layout.output_dir(id));

        for step in &definition.steps {
            debug!(step = %step.identifier, kind = ?step.kind, params = %step.parameters, "Installed step");
        }

        let filter_map = ExtensionFilterMap::from_entries(installed.filter_mappings);
        filter_map.save(&mapping_file).await?;
        fs::write(&pipeline_file, definition.to_yaml()?).await?;

        self.workspace
            .record(ProjectEvent::new(
                id.clone(),
                ProjectEventType::ConfigurationInstalled,
                format!(
                    "Installed {} steps with {} overrides",
                    definition.steps.len(),
                    overrides.len()
                ),
            ))
            .await?;

        info!(
            engine = self.engine.name(),
            steps = definition.steps.len(),
            mappings = filter_map.len(),
            "Configuration installed"
        );
        Ok(definition)
    }
}

/// Map step identifier to override blob, rejecting duplicate identifiers
pub fn index_overrides(overrides: &[StepOverride]) -> WorkspaceResult<BTreeMap<&str, &str>> {
    let mut map = BTreeMap::new();
    for o in overrides {
        if map.insert(o.step.as_str(), o.parameters.as_str()).is_some() {
            return Err(WorkspaceError::DuplicateOverride {
                step: o.step.clone(),
            });
        }
    }
    Ok(map)
}

/// Replace the parameters of every overridden step.
///
/// Every override must name an installed step; nothing is changed otherwise.
pub fn apply_overrides(
    definition: &mut PipelineDefinition,
    overrides: &BTreeMap<&str, &str>,
) -> WorkspaceResult<()> {
    for step in overrides.keys() {
        if !definition.steps.iter().any(|s| s.identifier == *step) {
            return Err(WorkspaceError::UnknownOverrideTarget {
                step: step.to_string(),
            });
        }
    }

    for step in &mut definition.steps {
        if let Some(parameters) = overrides.get(step.identifier.as_str()) {
            debug!(step = %step.identifier, "Applying step override");
            step.parameters = parameters.to_string();
        }
    }

    Ok(())
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Remove `path`, reporting whether there was anything to remove
async fn remove_if_exists(path: &Path) -> WorkspaceResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
