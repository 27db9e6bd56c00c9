//! Configuration for the locstage workspace.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LOCSTAGE_WORKDIR, LOCSTAGE_CONFIG)
//! 2. Config file (.locstage/config.yaml)
//! 3. Defaults (~/locstage-files, uuid project ids, `okapi-engine`)
//!
//! Config file discovery:
//! - `LOCSTAGE_CONFIG` names the file explicitly
//! - Otherwise searches the current directory and parents for .locstage/config.yaml,
//!   then falls back to ~/.locstage/config.yaml
//! - Paths in the config file are relative to the config file's directory
//!
//! The resolved value is constructed once by the caller and passed down;
//! nothing here is cached process-wide.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::IdStrategy;

pub const WORKDIR_ENV: &str = "LOCSTAGE_WORKDIR";
pub const CONFIG_ENV: &str = "LOCSTAGE_CONFIG";

const CONFIG_DIR_NAME: &str = ".locstage";
const CONFIG_FILE_NAME: &str = "config.yaml";
const DEFAULT_ROOT_NAME: &str = "locstage-files";
const DEFAULT_ENGINE_COMMAND: &str = "okapi-engine";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub engine: Option<EngineConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root (relative to the config file)
    pub root: Option<String>,
    /// Append `_M<version>` to the root
    #[serde(default)]
    pub unique_per_version: bool,
    /// `counter` or `uuid`
    pub project_id_strategy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute workspace root
    pub workspace_root: PathBuf,
    pub id_strategy: IdStrategy,
    pub engine: EngineSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// How to invoke the external Pipeline Engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_ENGINE_COMMAND.to_string(),
            args: Vec::new(),
        }
    }
}

/// Inputs to configuration resolution, gathered from the process environment
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Workspace root override
    pub workdir: Option<PathBuf>,
    /// Config file to read, if any
    pub config_file: Option<PathBuf>,
    pub home: Option<PathBuf>,
    /// Base for relative roots
    pub cwd: PathBuf,
}

impl ConfigSources {
    /// Gather sources from environment variables and the filesystem
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        let home = dirs::home_dir();

        let workdir = non_empty_env(WORKDIR_ENV).map(PathBuf::from);
        let config_file = match non_empty_env(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => find_config_file(&cwd, home.as_deref()),
        };

        Ok(Self {
            workdir,
            config_file,
            home,
            cwd,
        })
    }
}

impl ResolvedConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::resolve(ConfigSources::from_env()?)
    }

    /// Configuration for an explicit root, with default engine settings
    pub fn for_root(workspace_root: impl Into<PathBuf>, id_strategy: IdStrategy) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            id_strategy,
            engine: EngineSettings::default(),
            config_file: None,
        }
    }

    /// Resolve configuration from already-gathered sources
    pub fn resolve(sources: ConfigSources) -> Result<Self> {
        let file = match sources.config_file {
            Some(ref path) => Some(load_config_file(path)?),
            None => None,
        };
        let file_ref = file.as_ref();

        let id_strategy = match file_ref.and_then(|f| f.workspace.project_id_strategy.as_deref()) {
            Some(name) => name
                .parse::<IdStrategy>()
                .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?,
            None => IdStrategy::default(),
        };

        let mut workspace_root = if let Some(workdir) = sources.workdir {
            workdir
        } else if let Some(root) = file_ref.and_then(|f| f.workspace.root.as_deref()) {
            let config_dir = sources
                .config_file
                .as_deref()
                .and_then(Path::parent)
                .unwrap_or(Path::new("."));
            resolve_path(config_dir, root)
        } else {
            sources
                .home
                .as_deref()
                .context("Failed to determine home directory")?
                .join(DEFAULT_ROOT_NAME)
        };

        if !workspace_root.is_absolute() {
            workspace_root = sources.cwd.join(workspace_root);
        }

        if file_ref.map(|f| f.workspace.unique_per_version).unwrap_or(false) {
            workspace_root = versioned_root(&workspace_root);
        }

        let engine = match file_ref.and_then(|f| f.engine.clone()) {
            Some(engine) => EngineSettings {
                command: engine
                    .command
                    .unwrap_or_else(|| DEFAULT_ENGINE_COMMAND.to_string()),
                args: engine.args,
            },
            None => EngineSettings::default(),
        };

        Ok(Self {
            workspace_root,
            id_strategy,
            engine,
            config_file: sources.config_file,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Find config file by searching `start` and its parents, then the home directory
fn find_config_file(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    home.map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// `root` with `_M<version>` appended to its final component
fn versioned_root(root: &Path) -> PathBuf {
    let raw = root.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    PathBuf::from(format!("{}_M{}", trimmed, env!("CARGO_PKG_VERSION")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", content).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let config = ResolvedConfig::resolve(ConfigSources {
            home: Some(temp.path().to_path_buf()),
            cwd: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.workspace_root, temp.path().join("locstage-files"));
        assert_eq!(config.id_strategy, IdStrategy::Uuid);
        assert_eq!(config.engine, EngineSettings::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            r#"
version: "1.0"
workspace:
  root: ./files
  project_id_strategy: Counter
engine:
  command: /opt/okapi/engine
  args: ["--quiet"]
"#,
        );

        let config = ResolvedConfig::resolve(ConfigSources {
            config_file: Some(config_path.clone()),
            cwd: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            config.workspace_root,
            config_path.parent().unwrap().join("./files")
        );
        assert_eq!(config.id_strategy, IdStrategy::Counter);
        assert_eq!(config.engine.command, "/opt/okapi/engine");
        assert_eq!(config.engine.args, vec!["--quiet"]);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_workdir_override_wins_and_is_made_absolute() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "workspace:\n  root: /elsewhere\n");

        let config = ResolvedConfig::resolve(ConfigSources {
            workdir: Some(PathBuf::from("relative/work")),
            config_file: Some(config_path),
            cwd: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.workspace_root, temp.path().join("relative/work"));
    }

    #[test]
    fn test_unique_per_version_suffix() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            "workspace:\n  root: /srv/files/\n  unique_per_version: true\n",
        );

        let config = ResolvedConfig::resolve(ConfigSources {
            config_file: Some(config_path),
            cwd: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            config.workspace_root,
            PathBuf::from(format!("/srv/files_M{}", env!("CARGO_PKG_VERSION")))
        );
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            "workspace:\n  project_id_strategy: sequential\n",
        );

        let err = ResolvedConfig::resolve(ConfigSources {
            config_file: Some(config_path),
            home: Some(temp.path().to_path_buf()),
            cwd: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.to_string().contains("counter, uuid"));
    }

    #[test]
    fn test_find_config_file_in_parents() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "version: \"1.0\"");
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested, None), Some(config_path));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
