//! Disk-backed project workspace.
//!
//! Every project owns a disjoint subtree under the workspace root. The
//! workspace creates and deletes those subtrees, moves files in and out of
//! them and keeps each project's event log.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::archive;
use super::error::{blocking, WorkspaceError, WorkspaceResult};
use super::event_store::ProjectEventLog;
use super::id_allocator::{IdStrategy, ProjectIdAllocator};
use super::layout::{self, WorkspaceLayout};
use crate::config::ResolvedConfig;
use crate::domain::{ProjectEvent, ProjectEventType, ProjectId, ProjectStatus};

pub struct Workspace {
    layout: WorkspaceLayout,
    allocator: Arc<dyn ProjectIdAllocator>,
    /// Serializes generate-then-create for allocators that need it
    create_lock: Mutex<()>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, strategy: IdStrategy) -> Self {
        Self::with_allocator(root, strategy.allocator())
    }

    pub fn with_allocator(root: impl Into<PathBuf>, allocator: Arc<dyn ProjectIdAllocator>) -> Self {
        Self {
            layout: WorkspaceLayout::new(root),
            allocator,
            create_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.workspace_root.clone(), config.id_strategy)
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn strategy(&self) -> IdStrategy {
        self.allocator.strategy()
    }

    /// Allocate an id and create the project's directory tree
    #[instrument(skip(self), fields(strategy = %self.strategy()))]
    pub async fn create_project(&self) -> WorkspaceResult<ProjectId> {
        fs::create_dir_all(self.layout.root()).await?;

        let layout = self.layout.clone();
        let allocator = Arc::clone(&self.allocator);

        let id = if allocator.requires_exclusive_creation() {
            let _guard = self.create_lock.lock().await;
            blocking(move || {
                with_creation_lock(&layout, || create_tree(&layout, allocator.as_ref()))
            })
            .await?
        } else {
            blocking(move || create_tree(&layout, allocator.as_ref())).await?
        };

        self.record(ProjectEvent::new(
            id.clone(),
            ProjectEventType::ProjectCreated,
            "Project created".to_string(),
        ))
        .await?;

        info!(project = %id, "Project created");
        Ok(id)
    }

    /// Remove the project's subtree; deleting a missing project is a no-op
    #[instrument(skip(self), fields(project = %id))]
    pub async fn delete_project(&self, id: &ProjectId) -> WorkspaceResult<()> {
        match fs::remove_dir_all(self.layout.project_dir(id)).await {
            Ok(()) => {
                info!("Project deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Project already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Project ids, oldest first
    pub async fn list_project_ids(&self) -> WorkspaceResult<Vec<ProjectId>> {
        let root = self.layout.root().to_path_buf();
        let names = blocking(move || layout::project_dir_names(&root)).await?;

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match ProjectId::parse(&name) {
                Ok(id) => ids.push(id),
                Err(_) => warn!(dir = %name, "Skipping directory that is not a valid project id"),
            }
        }
        Ok(ids)
    }

    pub fn project_exists(&self, id: &ProjectId) -> bool {
        self.layout.project_dir(id).is_dir()
    }

    /// Fail with `ProjectNotFound` unless the project directory exists
    pub fn ensure_project(&self, id: &ProjectId) -> WorkspaceResult<()> {
        if self.project_exists(id) {
            Ok(())
        } else {
            Err(WorkspaceError::ProjectNotFound(id.clone()))
        }
    }

    pub fn resolve_input_path(&self, id: &ProjectId, relative: &str) -> WorkspaceResult<PathBuf> {
        layout::resolve_within(&self.layout.input_dir(id), relative)
    }

    pub fn resolve_output_path(&self, id: &ProjectId, relative: &str) -> WorkspaceResult<PathBuf> {
        layout::resolve_within(&self.layout.output_dir(id), relative)
    }

    pub async fn list_input_files(&self, id: &ProjectId) -> WorkspaceResult<Vec<String>> {
        self.ensure_project(id)?;
        let root = self.layout.input_dir(id);
        blocking(move || layout::list_files(&root)).await
    }

    pub async fn list_output_files(&self, id: &ProjectId) -> WorkspaceResult<Vec<String>> {
        self.ensure_project(id)?;
        let root = self.layout.output_dir(id);
        blocking(move || layout::list_files(&root)).await
    }

    /// Copy `source` into the input subtree at `relative`.
    ///
    /// Returns the normalized relative name the file was stored under.
    #[instrument(skip(self, source), fields(project = %id))]
    pub async fn add_input_file(
        &self,
        id: &ProjectId,
        relative: &str,
        source: &Path,
    ) -> WorkspaceResult<String> {
        self.ensure_project(id)?;
        if !fs::metadata(source).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(WorkspaceError::FileNotFound(source.to_path_buf()));
        }

        let destination = self.prepare_input_destination(id, relative).await?;
        fs::copy(source, &destination).await?;

        self.input_added(id, &destination).await
    }

    /// Write `content` into the input subtree at `relative`
    #[instrument(skip(self, content), fields(project = %id))]
    pub async fn write_input_file(
        &self,
        id: &ProjectId,
        relative: &str,
        content: impl AsRef<[u8]>,
    ) -> WorkspaceResult<String> {
        self.ensure_project(id)?;

        let destination = self.prepare_input_destination(id, relative).await?;
        fs::write(&destination, content).await?;

        self.input_added(id, &destination).await
    }

    /// Extract a zip archive into the input subtree
    #[instrument(skip(self, archive_bytes), fields(project = %id, bytes = archive_bytes.len()))]
    pub async fn add_input_archive(
        &self,
        id: &ProjectId,
        archive_bytes: Vec<u8>,
    ) -> WorkspaceResult<Vec<String>> {
        self.ensure_project(id)?;

        let target = self.layout.input_dir(id);
        fs::create_dir_all(&target).await?;
        let written = blocking(move || archive::extract(&archive_bytes, &target)).await?;

        if !written.is_empty() {
            self.record(ProjectEvent::new(
                id.clone(),
                ProjectEventType::InputAdded,
                format!("Extracted {} input files", written.len()),
            ))
            .await?;
        }

        Ok(written)
    }

    /// Absolute path of an existing input file
    pub async fn input_file(&self, id: &ProjectId, relative: &str) -> WorkspaceResult<PathBuf> {
        self.ensure_project(id)?;
        existing_file(self.resolve_input_path(id, relative)?).await
    }

    /// Absolute path of an existing output file
    pub async fn output_file(&self, id: &ProjectId, relative: &str) -> WorkspaceResult<PathBuf> {
        self.ensure_project(id)?;
        existing_file(self.resolve_output_path(id, relative)?).await
    }

    /// Zip every output file, named relative to the output root
    #[instrument(skip(self), fields(project = %id))]
    pub async fn output_archive(&self, id: &ProjectId) -> WorkspaceResult<Vec<u8>> {
        self.ensure_project(id)?;

        let root = self.layout.output_dir(id);
        let listing_root = root.clone();
        let files = blocking(move || layout::list_file_paths(&listing_root)).await?;
        if files.is_empty() {
            return Err(WorkspaceError::EmptyOutput(id.clone()));
        }

        let count = files.len();
        let bytes = blocking(move || archive::pack(&files, &root)).await?;
        info!(files = count, bytes = bytes.len(), "Packed output archive");
        Ok(bytes)
    }

    /// Zip a single output file
    #[instrument(skip(self), fields(project = %id))]
    pub async fn output_file_archive(
        &self,
        id: &ProjectId,
        relative: &str,
    ) -> WorkspaceResult<Vec<u8>> {
        let file = self.output_file(id, relative).await?;
        let root = self.layout.output_dir(id);
        blocking(move || archive::pack(&[file], &root)).await
    }

    /// Lifecycle status replayed from the project's event log
    pub async fn project_status(&self, id: &ProjectId) -> WorkspaceResult<ProjectStatus> {
        if !self.project_exists(id) {
            return Ok(ProjectStatus::deleted(id.clone()));
        }

        let events = self.event_log(id).replay().await?;
        Ok(ProjectStatus::from_events(id.clone(), &events))
    }

    pub fn event_log(&self, id: &ProjectId) -> ProjectEventLog {
        ProjectEventLog::open(self.layout.events_file(id))
    }

    /// Append an event to its project's log
    pub async fn record(&self, event: ProjectEvent) -> WorkspaceResult<()> {
        debug!(project = %event.project_id, event_type = ?event.event_type, "Recording event");
        self.event_log(&event.project_id).append(&event).await
    }

    async fn prepare_input_destination(
        &self,
        id: &ProjectId,
        relative: &str,
    ) -> WorkspaceResult<PathBuf> {
        let destination = self.resolve_input_path(id, relative)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(destination)
    }

    async fn input_added(&self, id: &ProjectId, destination: &Path) -> WorkspaceResult<String> {
        let name = layout::relative_name(destination, &self.layout.input_dir(id))?;
        self.record(ProjectEvent::new(
            id.clone(),
            ProjectEventType::InputAdded,
            format!("Added input file {}", name),
        ))
        .await?;

        info!(file = %name, "Input file added");
        Ok(name)
    }
}

async fn existing_file(path: PathBuf) -> WorkspaceResult<PathBuf> {
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(WorkspaceError::FileNotFound(path)),
    }
}

/// Generate an id and create its directory tree
fn create_tree(
    layout: &WorkspaceLayout,
    allocator: &dyn ProjectIdAllocator,
) -> WorkspaceResult<ProjectId> {
    let id = allocator.generate_project_id(layout)?;

    std::fs::create_dir(layout.project_dir(&id))?;
    for dir in [
        layout.input_dir(&id),
        layout.config_dir(&id),
        layout.output_dir(&id),
    ] {
        std::fs::create_dir_all(dir)?;
    }

    Ok(id)
}

/// Run `f` while holding the cross-process creation lock under the root
fn with_creation_lock<T>(
    layout: &WorkspaceLayout,
    f: impl FnOnce() -> WorkspaceResult<T>,
) -> WorkspaceResult<T> {
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(layout.create_lock_file())?;

    FileExt::lock_exclusive(&lock_file)?;
    let result = f();
    let unlocked = FileExt::unlock(&lock_file);

    let value = result?;
    unlocked?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectState;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_project_builds_tree_and_logs() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().join("root"), IdStrategy::Counter);

        let id = workspace.create_project().await.unwrap();
        assert_eq!(id.as_str(), "1");

        let layout = workspace.layout();
        assert!(layout.input_dir(&id).is_dir());
        assert!(layout.config_dir(&id).is_dir());
        assert!(layout.output_dir(&id).is_dir());

        let status = workspace.project_status(&id).await.unwrap();
        assert_eq!(status.state, ProjectState::Created);
        assert!(status.created_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path(), IdStrategy::Uuid);

        let id = workspace.create_project().await.unwrap();
        workspace.delete_project(&id).await.unwrap();
        workspace.delete_project(&id).await.unwrap();

        assert!(!workspace.project_exists(&id));
        assert_eq!(
            workspace.project_status(&id).await.unwrap().state,
            ProjectState::Deleted
        );
    }

    #[tokio::test]
    async fn test_operations_on_missing_project() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path(), IdStrategy::Counter);
        let ghost = ProjectId::parse("404").unwrap();

        assert!(matches!(
            workspace.list_input_files(&ghost).await,
            Err(WorkspaceError::ProjectNotFound(_))
        ));
        assert!(matches!(
            workspace.write_input_file(&ghost, "a.txt", "a").await,
            Err(WorkspaceError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_write_input_file_rejects_escape() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path(), IdStrategy::Counter);
        let id = workspace.create_project().await.unwrap();

        let result = workspace.write_input_file(&id, "../config/pipeline.pln", "x").await;
        assert!(matches!(result, Err(WorkspaceError::InvalidPath { .. })));
        assert!(!workspace.layout().pipeline_definition_file(&id).exists());
    }

    #[tokio::test]
    async fn test_add_input_file_copies_and_normalizes_name() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upload.html");
        std::fs::write(&source, "<p>hi</p>").unwrap();

        let workspace = Workspace::new(temp.path().join("root"), IdStrategy::Counter);
        let id = workspace.create_project().await.unwrap();

        let name = workspace
            .add_input_file(&id, "site\\pages/./index.html", &source)
            .await
            .unwrap();
        assert_eq!(name, "site/pages/index.html");

        let stored = workspace.input_file(&id, &name).await.unwrap();
        assert_eq!(std::fs::read_to_string(stored).unwrap(), "<p>hi</p>");

        let missing = workspace
            .add_input_file(&id, "x.html", &temp.path().join("nope.html"))
            .await;
        assert!(matches!(missing, Err(WorkspaceError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_output_file_archive_single_entry() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path(), IdStrategy::Counter);
        let id = workspace.create_project().await.unwrap();

        let output = workspace.layout().output_dir(&id);
        std::fs::create_dir_all(output.join("sub")).unwrap();
        std::fs::write(output.join("sub/b.out.html"), "b").unwrap();
        std::fs::write(output.join("a.out.html"), "a").unwrap();

        let bytes = workspace.output_file_archive(&id, "sub/b.out.html").await.unwrap();
        let zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 1);
        assert_eq!(zip.file_names().next(), Some("sub/b.out.html"));

        assert!(matches!(
            workspace.output_file_archive(&id, "missing.html").await,
            Err(WorkspaceError::FileNotFound(_))
        ));
    }
}
