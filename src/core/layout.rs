//! On-disk layout of the workspace.
//!
//! ```text
//! {root}/
//! ├── .create.lock                  # Counter-strategy creation lock
//! ├── plugins/                      # Reserved, never a project
//! └── {project_id}/
//!     ├── events.jsonl              # Project event log
//!     ├── settings.bconf            # Uploaded batch configuration
//!     ├── input/                    # Documents to process
//!     ├── config/
//!     │   ├── extensions-mapping.txt
//!     │   └── pipeline.pln
//!     └── output/                   # Written by the Pipeline Engine only
//! ```

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::error::{WorkspaceError, WorkspaceResult};
use crate::domain::ProjectId;

/// Reserved plug-in cache directory under the root
pub const PLUGINS_DIR: &str = "plugins";
pub const INPUT_DIR: &str = "input";
pub const CONFIG_DIR: &str = "config";
pub const OUTPUT_DIR: &str = "output";
pub const BATCH_CONFIG_FILE: &str = "settings.bconf";
pub const EXTENSION_MAPPING_FILE: &str = "extensions-mapping.txt";
pub const PIPELINE_DEFINITION_FILE: &str = "pipeline.pln";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const CREATE_LOCK_FILE: &str = ".create.lock";

/// Deterministic mapping from a project id to its paths
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create_lock_file(&self) -> PathBuf {
        self.root.join(CREATE_LOCK_FILE)
    }

    pub fn project_dir(&self, id: &ProjectId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn input_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join(INPUT_DIR)
    }

    pub fn config_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join(CONFIG_DIR)
    }

    pub fn output_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join(OUTPUT_DIR)
    }

    pub fn batch_config_file(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join(BATCH_CONFIG_FILE)
    }

    pub fn extension_mapping_file(&self, id: &ProjectId) -> PathBuf {
        self.config_dir(id).join(EXTENSION_MAPPING_FILE)
    }

    pub fn pipeline_definition_file(&self, id: &ProjectId) -> PathBuf {
        self.config_dir(id).join(PIPELINE_DEFINITION_FILE)
    }

    pub fn events_file(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join(EVENTS_FILE)
    }
}

/// Names of the project directories under `root`, oldest first.
///
/// Skips the plug-in cache and anything that is not a directory. A missing
/// root yields an empty list.
pub fn project_dir_names(root: &Path) -> WorkspaceResult<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name == PLUGINS_DIR {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        dirs.push((modified, name));
    }

    dirs.sort();
    Ok(dirs.into_iter().map(|(_, name)| name).collect())
}

/// Split a relative path into normal segments.
///
/// Accepts both `/` and `\` as separators, drops `.` segments and resolves
/// `..` lexically. Fails if the path is absolute, names a drive, resolves to
/// nothing, or climbs above its root.
pub fn relative_segments(relative: &str) -> WorkspaceResult<Vec<String>> {
    let invalid = || WorkspaceError::InvalidPath {
        path: relative.to_string(),
    };

    if relative.starts_with('/') || relative.starts_with('\\') {
        return Err(invalid());
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in relative.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop().ok_or_else(invalid)?;
            }
            s if s.contains('\0') => return Err(invalid()),
            s if segments.is_empty() && is_drive_prefix(s) => return Err(invalid()),
            s => segments.push(s.to_string()),
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }

    Ok(segments)
}

/// `C:` style drive designator, optionally followed by a name
fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Join `relative` under `root`, failing if it would escape
pub fn resolve_within(root: &Path, relative: &str) -> WorkspaceResult<PathBuf> {
    let mut path = root.to_path_buf();
    path.extend(relative_segments(relative)?);
    Ok(path)
}

/// All regular files under `root`, sorted by absolute path string
pub fn list_file_paths(root: &Path) -> WorkspaceResult<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort_by_cached_key(|p| p.to_string_lossy().into_owned());
    Ok(files)
}

/// Path of `file` relative to `root`, with forward slashes
pub fn relative_name(file: &Path, root: &Path) -> WorkspaceResult<String> {
    let violation = || WorkspaceError::ContainmentViolation {
        path: file.to_path_buf(),
        root: root.to_path_buf(),
    };

    let stripped = file.strip_prefix(root).map_err(|_| violation())?;

    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(violation()),
        }
    }
    if parts.is_empty() {
        return Err(violation());
    }

    Ok(parts.join("/"))
}

/// Relative names of all regular files under `root`, in listing order
pub fn list_files(root: &Path) -> WorkspaceResult<Vec<String>> {
    list_file_paths(root)?
        .iter()
        .map(|file| relative_name(file, root))
        .collect()
}

/// Extension of a file name including the leading dot, or `""`
pub fn file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths_nest_under_project() {
        let layout = WorkspaceLayout::new("/srv/work");
        let id = ProjectId::parse("12").unwrap();

        assert_eq!(layout.input_dir(&id), PathBuf::from("/srv/work/12/input"));
        assert_eq!(layout.config_dir(&id), PathBuf::from("/srv/work/12/config"));
        assert_eq!(layout.output_dir(&id), PathBuf::from("/srv/work/12/output"));
        assert_eq!(
            layout.batch_config_file(&id),
            PathBuf::from("/srv/work/12/settings.bconf")
        );
        assert_eq!(
            layout.extension_mapping_file(&id),
            PathBuf::from("/srv/work/12/config/extensions-mapping.txt")
        );
        assert_eq!(
            layout.pipeline_definition_file(&id),
            PathBuf::from("/srv/work/12/config/pipeline.pln")
        );
    }

    #[test]
    fn test_relative_segments_normalize() {
        assert_eq!(relative_segments("a/b.html").unwrap(), vec!["a", "b.html"]);
        assert_eq!(relative_segments("a\\b.html").unwrap(), vec!["a", "b.html"]);
        assert_eq!(relative_segments("./a//x/../b.html").unwrap(), vec!["a", "b.html"]);
        assert_eq!(
            relative_segments("minutes/notes 10:30.txt").unwrap(),
            vec!["minutes", "notes 10:30.txt"]
        );
    }

    #[test]
    fn test_relative_segments_reject_escapes() {
        for bad in [
            "../a",
            "a/../../b",
            "/etc/passwd",
            "\\share\\x",
            "C:/x",
            "d:\\x",
            "x/../C:evil.txt",
            "",
            ".",
            "a/..",
        ] {
            assert!(
                matches!(relative_segments(bad), Err(WorkspaceError::InvalidPath { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_list_files_sorted_with_forward_slashes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("b.html"), "b").unwrap();
        std::fs::write(root.join("a.html"), "a").unwrap();
        std::fs::write(root.join("sub/deeper/c.html"), "c").unwrap();
        std::fs::write(root.join("sub/a.html"), "a").unwrap();

        let files = list_files(root).unwrap();
        assert_eq!(
            files,
            vec!["a.html", "b.html", "sub/a.html", "sub/deeper/c.html"]
        );

        // No caching between calls
        std::fs::write(root.join("0.txt"), "0").unwrap();
        assert_eq!(list_files(root).unwrap()[0], "0.txt");
    }

    #[test]
    fn test_list_files_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(list_files(&temp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a.html"), ".html");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension(".htaccess"), ".htaccess");
    }
}
