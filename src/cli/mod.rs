//! Command-line interface for locstage.
//!
//! Provides commands for managing projects, moving files in and out of
//! them, installing batch configurations and running pipelines.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tempfile::NamedTempFile;

use crate::adapters::{CommandEngine, PipelineEngine};
use crate::config::ResolvedConfig;
use crate::core::{BatchConfigInstaller, Orchestrator, Workspace};
use crate::domain::{ProjectId, RunLocales, StepOverride};

/// locstage - Project workspace and execution orchestrator
#[derive(Parser, Debug)]
#[command(name = "locstage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, list and delete projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage a project's input files
    Input {
        #[command(subcommand)]
        command: InputCommands,
    },

    /// Install batch configurations and inspect settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run the project's installed pipeline
    Execute(ExecuteArgs),

    /// Retrieve a project's output files
    Output {
        #[command(subcommand)]
        command: OutputCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a new project and print its ID
    New,

    /// List project IDs, oldest first
    List,

    /// Delete a project and everything in it
    Delete {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,
    },

    /// Show the lifecycle state of a project
    Status {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,
    },
}

#[derive(Subcommand, Debug)]
pub enum InputCommands {
    /// Add a single input file
    Add {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        /// File to upload
        file: PathBuf,

        /// Relative path inside the input directory (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Extract a zip archive into the input directory
    AddArchive {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        archive: PathBuf,
    },

    /// List input files
    List {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,
    },

    /// Copy an input file out of the project
    Get {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        relative_path: String,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Install a batch configuration into a project
    Install {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        /// Batch configuration bundle
        bundle: PathBuf,

        /// Replace a step's parameters: <step-id>=<params-file>
        #[arg(long = "override", value_parser = parse_override_arg)]
        overrides: Vec<(String, PathBuf)>,
    },

    /// Show resolved configuration (debug)
    Show,
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    #[arg(value_parser = parse_project_id)]
    pub id: ProjectId,

    /// Source locale
    #[arg(long)]
    pub source: Option<String>,

    /// Target locale; repeat for several (the first drives the pipeline)
    #[arg(long = "target")]
    pub targets: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum OutputCommands {
    /// List output files
    List {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,
    },

    /// Copy an output file out of the project
    Get {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        relative_path: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write all output files as a zip archive
    Archive {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a single output file as a zip archive
    ArchiveFile {
        #[arg(value_parser = parse_project_id)]
        id: ProjectId,

        relative_path: String,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_project_id(raw: &str) -> std::result::Result<ProjectId, String> {
    ProjectId::parse(raw).map_err(|e| e.to_string())
}

fn parse_override_arg(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((step, file)) if !step.trim().is_empty() && !file.trim().is_empty() => {
            Ok((step.trim().to_string(), PathBuf::from(file.trim())))
        }
        _ => Err(format!("expected <step-id>=<params-file>, got '{}'", raw)),
    }
}

/// Services wired from resolved configuration
struct App {
    config: ResolvedConfig,
    workspace: Arc<Workspace>,
    engine: Arc<CommandEngine>,
}

impl App {
    fn load() -> Result<Self> {
        let config = ResolvedConfig::load()?;
        let workspace = Arc::new(Workspace::from_config(&config));
        let engine = Arc::new(CommandEngine::from_settings(&config.engine));
        Ok(Self {
            config,
            workspace,
            engine,
        })
    }

    fn installer(&self) -> BatchConfigInstaller {
        BatchConfigInstaller::new(self.workspace.clone(), self.engine.clone())
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.workspace.clone(), self.engine.clone())
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let app = App::load()?;

        match self.command {
            Commands::Project { command } => execute_project_command(&app, command).await,
            Commands::Input { command } => execute_input_command(&app, command).await,
            Commands::Config { command } => execute_config_command(&app, command).await,
            Commands::Execute(args) => execute_run(&app, args).await,
            Commands::Output { command } => execute_output_command(&app, command).await,
        }
    }
}

async fn execute_project_command(app: &App, command: ProjectCommands) -> Result<()> {
    match command {
        ProjectCommands::New => {
            let id = app.workspace.create_project().await?;
            println!("{}", id);
        }
        ProjectCommands::List => {
            let ids = app.workspace.list_project_ids().await?;
            if ids.is_empty() {
                println!("No projects found");
            }
            for id in ids {
                println!("{}", id);
            }
        }
        ProjectCommands::Delete { id } => {
            app.workspace.delete_project(&id).await?;
            println!("Deleted project {}", id);
        }
        ProjectCommands::Status { id } => {
            let status = app.workspace.project_status(&id).await?;

            println!("Project: {}", status.id);
            println!("State: {}", status.state);
            if let Some(created) = status.created_at {
                println!("Created: {}", created);
            }
            println!("Configured: {}", status.configured);
            println!("Has inputs: {}", status.has_inputs);
            println!("Runs: {}", status.runs);
            if let Some(locales) = &status.locales {
                println!(
                    "Locales: {} -> {}",
                    locales.source.as_deref().unwrap_or("-"),
                    locales
                        .targets
                        .as_ref()
                        .map(|t| t.join(", "))
                        .or_else(|| locales.target.clone())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            if let Some(error) = &status.last_error {
                println!("Last error: {}", error);
            }
        }
    }
    Ok(())
}

async fn execute_input_command(app: &App, command: InputCommands) -> Result<()> {
    match command {
        InputCommands::Add { id, file, name } => {
            let relative = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("Cannot derive a name from {}", file.display()))?,
            };
            let stored = app.workspace.add_input_file(&id, &relative, &file).await?;
            println!("Added {}", stored);
        }
        InputCommands::AddArchive { id, archive } => {
            let bytes = tokio::fs::read(&archive)
                .await
                .with_context(|| format!("Failed to read archive: {}", archive.display()))?;
            let written = app.workspace.add_input_archive(&id, bytes).await?;
            println!("Extracted {} files", written.len());
        }
        InputCommands::List { id } => {
            for file in app.workspace.list_input_files(&id).await? {
                println!("{}", file);
            }
        }
        InputCommands::Get {
            id,
            relative_path,
            output,
        } => {
            let source = app.workspace.input_file(&id, &relative_path).await?;
            copy_out(&source, &output).await?;
        }
    }
    Ok(())
}

async fn execute_config_command(app: &App, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Install {
            id,
            bundle,
            overrides,
        } => {
            let mut step_overrides = Vec::with_capacity(overrides.len());
            for (step, file) in overrides {
                let parameters = tokio::fs::read_to_string(&file).await.with_context(|| {
                    format!("Failed to read override parameters: {}", file.display())
                })?;
                step_overrides.push(StepOverride::new(step, parameters));
            }

            let definition = app.installer().install(&id, &bundle, &step_overrides).await?;

            println!("Installed {} steps:", definition.steps.len());
            for step in &definition.steps {
                println!("  {}", step.identifier);
            }
        }
        ConfigCommands::Show => show_config(app).await?,
    }
    Ok(())
}

async fn show_config(app: &App) -> Result<()> {
    let cfg = &app.config;

    println!("locstage configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Workspace root: {}", cfg.workspace_root.display());
    println!("Project ID strategy: {}", cfg.id_strategy);
    println!();
    println!("Engine:");
    println!("  Command: {}", cfg.engine.command);
    println!("  Args:    {}", cfg.engine.args.join(" "));
    match app.engine.health_check().await {
        Ok(()) => println!("  Status:  available"),
        Err(e) => println!("  Status:  unavailable ({:#})", e),
    }

    Ok(())
}

async fn execute_run(app: &App, args: ExecuteArgs) -> Result<()> {
    let locales = RunLocales {
        source: args.source,
        target: args.targets.first().cloned(),
        targets: if args.targets.len() > 1 {
            Some(args.targets)
        } else {
            None
        },
    };

    let outcome = app.orchestrator().execute_project(&args.id, locales).await?;

    println!("Run completed");
    println!("  Mode:      {}", outcome.mode);
    println!("  Documents: {}", outcome.documents);
    println!("  Duration:  {}ms", outcome.duration_ms);
    Ok(())
}

async fn execute_output_command(app: &App, command: OutputCommands) -> Result<()> {
    match command {
        OutputCommands::List { id } => {
            for file in app.workspace.list_output_files(&id).await? {
                println!("{}", file);
            }
        }
        OutputCommands::Get {
            id,
            relative_path,
            output,
        } => {
            let source = app.workspace.output_file(&id, &relative_path).await?;
            copy_out(&source, &output).await?;
        }
        OutputCommands::Archive { id, output } => {
            let bytes = app.workspace.output_archive(&id).await?;
            write_archive(&output, &bytes)?;
            println!("Wrote {}", output.display());
        }
        OutputCommands::ArchiveFile {
            id,
            relative_path,
            output,
        } => {
            let bytes = app.workspace.output_file_archive(&id, &relative_path).await?;
            write_archive(&output, &bytes)?;
            println!("Wrote {}", output.display());
        }
    }
    Ok(())
}

async fn copy_out(source: &Path, destination: &Path) -> Result<()> {
    tokio::fs::copy(source, destination)
        .await
        .with_context(|| format!("Failed to write {}", destination.display()))?;
    println!("Wrote {}", destination.display());
    Ok(())
}

/// Write archive bytes through a temp file in the destination directory
fn write_archive(destination: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(bytes).context("Failed to write archive")?;
    temp.persist(destination)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    Ok(())
}
