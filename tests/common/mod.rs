//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;
use zip::write::FileOptions;
use zip::ZipWriter;

use locstage::domain::step::{EXTRACTION_STEP_ID, MERGING_STEP_ID};
use locstage::{
    BatchConfigInstaller, IdStrategy, InstalledConfiguration, PipelineEngine, PipelineRunRequest,
    PipelineStep, ProjectId, Workspace,
};

pub const LEVERAGING_STEP_ID: &str = "net.sf.okapi.steps.leveraging.LeveragingStep";

/// Pipeline Engine double that records what it is asked to do
pub struct FakeEngine {
    installed: InstalledConfiguration,
    install_error: Option<String>,
    execute_error: Option<String>,
    /// (started, release) pair used to hold a run open
    hold: Option<(Arc<Notify>, Arc<Notify>)>,
    pub install_calls: AtomicUsize,
    pub requests: Mutex<Vec<PipelineRunRequest>>,
}

impl FakeEngine {
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        let filter_mappings: BTreeMap<String, String> = [
            (".html".to_string(), "okf_html".to_string()),
            (".xlf".to_string(), "okf_xliff".to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            installed: InstalledConfiguration {
                steps,
                filter_mappings,
            },
            install_error: None,
            execute_error: None,
            hold: None,
            install_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Extraction pipeline: filter events, leveraging, package extraction
    pub fn extraction() -> Self {
        Self::new(vec![
            PipelineStep::new("net.sf.okapi.steps.common.RawDocumentToFilterEventsStep", "#v1"),
            PipelineStep::new(LEVERAGING_STEP_ID, "#v1\nleverage=true"),
            PipelineStep::new(
                EXTRACTION_STEP_ID,
                "#v1\npackageName=pack1\npackageDirectory=/somewhere/else",
            ),
        ])
    }

    /// Merge pipeline
    pub fn merging() -> Self {
        Self::new(vec![PipelineStep::new(MERGING_STEP_ID, "#v1\npreserveSegmentation=false")])
    }

    pub fn with_mapping(mut self, extension: &str, filter: &str) -> Self {
        self.installed
            .filter_mappings
            .insert(extension.to_string(), filter.to_string());
        self
    }

    pub fn failing_install(mut self, message: &str) -> Self {
        self.install_error = Some(message.to_string());
        self
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.execute_error = Some(message.to_string());
        self
    }

    pub fn held(mut self, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.hold = Some((started, release));
        self
    }

    pub fn install_count(&self) -> usize {
        self.install_calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<PipelineRunRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn install_configuration(
        &self,
        _bundle: &Path,
        _config_dir: &Path,
    ) -> Result<InstalledConfiguration> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.install_error {
            anyhow::bail!("{}", message);
        }
        Ok(self.installed.clone())
    }

    async fn execute(&self, request: &PipelineRunRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some((started, release)) = &self.hold {
            started.notify_one();
            release.notified().await;
        }

        if let Some(message) = &self.execute_error {
            anyhow::bail!("{}", message);
        }

        // Produce one output per document, mirroring the input layout
        for document in &request.documents {
            let target = request.output_root.join(&document.relative_path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, format!("translated {}", document.relative_path))?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Build an in-memory zip from (name, content) pairs
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Workspace under `root` using the counter strategy
pub fn counter_workspace(root: &Path) -> Arc<Workspace> {
    Arc::new(Workspace::new(root, IdStrategy::Counter))
}

/// Create a project and install a configuration through `engine`
pub async fn configured_project(
    workspace: &Arc<Workspace>,
    engine: &Arc<FakeEngine>,
    scratch: &Path,
) -> ProjectId {
    let id = workspace.create_project().await.unwrap();

    let bundle = scratch.join(format!("settings-{}.bconf", id));
    std::fs::write(&bundle, b"bconf-bytes").unwrap();

    BatchConfigInstaller::new(workspace.clone(), engine.clone())
        .install(&id, &bundle, &[])
        .await
        .unwrap();

    id
}
