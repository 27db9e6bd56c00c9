//! Execution orchestrator.
//!
//! Turns an installed, populated project into a `PipelineRunRequest`, hands
//! it to the Pipeline Engine and records the outcome in the project's event
//! log.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use super::error::{blocking, WorkspaceError, WorkspaceResult};
use super::filter_map::ExtensionFilterMap;
use super::layout::{self, EXTENSION_MAPPING_FILE, PIPELINE_DEFINITION_FILE};
use super::workspace::Workspace;
use crate::adapters::PipelineEngine;
use crate::domain::{
    PipelineDefinition, PipelineRunRequest, ProjectEvent, ProjectEventType, ProjectId,
    RunDocument, RunLocales, RunMode, RunOutcome,
};

/// Extension of a translation package
pub const PACKAGE_EXTENSION: &str = ".rkp";

/// Reserved manifest file name inside an unpacked package
pub const MANIFEST_FILE: &str = "manifest.rkm";

/// Runs installed pipelines against project inputs
pub struct Orchestrator {
    workspace: Arc<Workspace>,
    engine: Arc<dyn PipelineEngine>,
    /// Projects with a run in flight
    running: Mutex<HashSet<ProjectId>>,
}

/// Removes its project from the running set when dropped
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<ProjectId>>,
    id: ProjectId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.id);
    }
}

impl Orchestrator {
    pub fn new(workspace: Arc<Workspace>, engine: Arc<dyn PipelineEngine>) -> Self {
        Self {
            workspace,
            engine,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Run the project's installed pipeline over its input files.
    ///
    /// Locales left unset fall back to those of the project's previous run.
    #[instrument(skip(self, locales), fields(project = %id))]
    pub async fn execute_project(
        &self,
        id: &ProjectId,
        locales: RunLocales,
    ) -> WorkspaceResult<RunOutcome> {
        self.workspace.ensure_project(id)?;
        let locales = locales.normalized()?;
        let _guard = self.begin_run(id)?;

        let layout = self.workspace.layout();
        let filter_map = load_filter_map(id, &layout.extension_mapping_file(id)).await?;
        let mut definition = load_definition(id, &layout.pipeline_definition_file(id)).await?;

        let mode = if definition.has_merge_step() {
            RunMode::Merge
        } else {
            RunMode::Document
        };

        let output_root = layout.output_dir(id);
        definition.redirect_outputs(&output_root);

        info!(%mode, steps = definition.steps.len(), "Pipeline loaded");
        for (index, step) in definition.steps.iter().enumerate() {
            info!(index, step = %step.identifier, kind = ?step.kind, "Pipeline step");
            debug!(index, params = %step.parameters, "Pipeline step parameters");
        }

        let input_root = layout.input_dir(id);
        let documents = select_documents(mode, &input_root, &filter_map).await?;
        if mode == RunMode::Merge && documents.is_empty() {
            warn!("No package or manifest found in input; running with zero inputs");
        }

        let previous = self
            .workspace
            .event_log(id)
            .last_event_of_type(ProjectEventType::RunStarted)
            .await?
            .and_then(|e| e.locales);
        let locales = locales.or_previous(previous.as_ref());

        let request = PipelineRunRequest {
            project_id: id.clone(),
            mode,
            steps: definition.steps,
            input_root,
            output_root,
            config_dir: layout.config_dir(id),
            documents,
            locales: locales.clone(),
        };

        self.workspace
            .record(
                ProjectEvent::new(
                    id.clone(),
                    ProjectEventType::RunStarted,
                    format!("{} run with {} documents", mode, request.documents.len()),
                )
                .with_locales(locales),
            )
            .await?;

        info!(
            engine = self.engine.name(),
            documents = request.documents.len(),
            "Starting pipeline execution"
        );
        let started = Instant::now();
        let result = self.engine.execute(&request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.workspace
                    .record(
                        ProjectEvent::new(
                            id.clone(),
                            ProjectEventType::RunCompleted,
                            "Run completed".to_string(),
                        )
                        .with_duration(duration_ms),
                    )
                    .await?;

                info!(duration_ms, "Pipeline execution completed");
                Ok(RunOutcome {
                    mode,
                    documents: request.documents.len(),
                    duration_ms,
                })
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(error = %message, duration_ms, "Pipeline execution failed");

                let failed = ProjectEvent::new(
                    id.clone(),
                    ProjectEventType::RunFailed,
                    "Run failed".to_string(),
                )
                .with_duration(duration_ms)
                .with_error(message.clone());
                if let Err(log_err) = self.workspace.record(failed).await {
                    warn!(error = %log_err, "Failed to record run failure");
                }

                Err(WorkspaceError::ExecutionFailed(message))
            }
        }
    }

    fn begin_run(&self, id: &ProjectId) -> WorkspaceResult<RunGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(id.clone()) {
            return Err(WorkspaceError::ExecutionInProgress(id.clone()));
        }
        Ok(RunGuard {
            running: &self.running,
            id: id.clone(),
        })
    }
}

async fn load_filter_map(id: &ProjectId, path: &Path) -> WorkspaceResult<ExtensionFilterMap> {
    if !path.is_file() {
        return Err(WorkspaceError::MissingConfiguration {
            project: id.clone(),
            missing: EXTENSION_MAPPING_FILE,
        });
    }
    ExtensionFilterMap::load(path).await
}

async fn load_definition(id: &ProjectId, path: &Path) -> WorkspaceResult<PipelineDefinition> {
    if !path.is_file() {
        return Err(WorkspaceError::MissingConfiguration {
            project: id.clone(),
            missing: PIPELINE_DEFINITION_FILE,
        });
    }
    PipelineDefinition::from_yaml(&fs::read_to_string(path).await?)
}

/// Input files to register with a run, in listing order
async fn select_documents(
    mode: RunMode,
    input_root: &Path,
    filter_map: &ExtensionFilterMap,
) -> WorkspaceResult<Vec<RunDocument>> {
    let root = input_root.to_path_buf();
    let files = blocking(move || layout::list_file_paths(&root)).await?;

    let mut documents = Vec::new();
    for path in files {
        let relative_path = layout::relative_name(&path, input_root)?;
        if mode == RunMode::Merge && !is_package_file(&relative_path) {
            continue;
        }

        let filter_config = filter_map.filter_for(&relative_path).map(str::to_string);
        if filter_config.is_none() {
            debug!(file = %relative_path, "No filter mapped for extension");
        }
        documents.push(RunDocument {
            path,
            relative_path,
            filter_config,
        });

        // Merge runs take a single package
        if mode == RunMode::Merge {
            break;
        }
    }

    Ok(documents)
}

/// A translation package or its manifest
fn is_package_file(relative_path: &str) -> bool {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    name == MANIFEST_FILE || layout::file_extension(name).eq_ignore_ascii_case(PACKAGE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_file_detection() {
        assert!(is_package_file("pack1.rkp"));
        assert!(is_package_file("nested/PACK.RKP"));
        assert!(is_package_file("pack1/manifest.rkm"));
        assert!(!is_package_file("pack1/content/a.xlf"));
        assert!(!is_package_file("manifest.rkm.bak"));
    }
}
