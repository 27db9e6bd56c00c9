//! Pipeline steps as installed from a batch configuration.
//!
//! The Pipeline Engine owns the meaning of a step; this crate only sees an
//! identifier and an opaque parameter blob. The one exception is the step
//! kind, which decides package output paths and the execution mode.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::WorkspaceError;

/// Identifier of the package extraction step
pub const EXTRACTION_STEP_ID: &str = "net.sf.okapi.steps.rainbowkit.creation.ExtractionStep";

/// Identifier of the package merge step
pub const MERGING_STEP_ID: &str = "net.sf.okapi.steps.rainbowkit.postprocess.MergingStep";

/// Parameter the extraction step writes its package to
pub const PACKAGE_DIRECTORY_PARAM: &str = "packageDirectory";

/// Parameter the merge step writes merged documents to
pub const OVERRIDE_OUTPUT_PATH_PARAM: &str = "overrideOutputPath";

/// Header line of the engine's parameter format
const PARAMS_VERSION_HEADER: &str = "#v1";

/// What a step means to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Creates a translation package from documents
    Extraction,

    /// Merges a translated package back into documents
    Merging,

    /// Anything else; passed through untouched
    Other,
}

impl StepKind {
    /// Resolve the kind from a step identifier
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            EXTRACTION_STEP_ID => Self::Extraction,
            MERGING_STEP_ID => Self::Merging,
            _ => Self::Other,
        }
    }

    /// Parameter that must point at the project's output directory, if any
    pub fn output_parameter(&self) -> Option<&'static str> {
        match self {
            Self::Extraction => Some(PACKAGE_DIRECTORY_PARAM),
            Self::Merging => Some(OVERRIDE_OUTPUT_PATH_PARAM),
            Self::Other => None,
        }
    }
}

/// Serialized shape of a step (what the engine and the pipeline file exchange)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub identifier: String,
    #[serde(default)]
    pub parameters: String,
}

/// A single installed pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StepRecord", into = "StepRecord")]
pub struct PipelineStep {
    /// Step identifier (unique key for overrides)
    pub identifier: String,

    /// Opaque parameter blob
    pub parameters: String,

    /// Kind resolved from the identifier
    pub kind: StepKind,
}

impl PipelineStep {
    /// Create a step, resolving its kind
    pub fn new(identifier: impl Into<String>, parameters: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let kind = StepKind::from_identifier(&identifier);
        Self {
            identifier,
            parameters: parameters.into(),
            kind,
        }
    }

    /// Point the step's output parameter at `output_dir` (no-op for other steps)
    pub fn redirect_output(&mut self, output_dir: &Path) {
        if let Some(key) = self.kind.output_parameter() {
            self.parameters =
                set_parameter(&self.parameters, key, &output_dir.to_string_lossy());
        }
    }
}

impl From<StepRecord> for PipelineStep {
    fn from(record: StepRecord) -> Self {
        Self::new(record.identifier, record.parameters)
    }
}

impl From<PipelineStep> for StepRecord {
    fn from(step: PipelineStep) -> Self {
        Self {
            identifier: step.identifier,
            parameters: step.parameters,
        }
    }
}

/// Caller-supplied replacement for one installed step's parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOverride {
    /// Identifier of the step to override
    pub step: String,

    /// Replacement parameter blob
    pub parameters: String,
}

impl StepOverride {
    pub fn new(step: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            parameters: parameters.into(),
        }
    }
}

/// The persisted pipeline: an ordered step list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

impl PipelineDefinition {
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    /// Parse a definition from YAML content
    pub fn from_yaml(content: &str) -> Result<Self, WorkspaceError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serialize the definition to YAML
    pub fn to_yaml(&self) -> Result<String, WorkspaceError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// True if the pipeline merges a translated package
    pub fn has_merge_step(&self) -> bool {
        self.steps.iter().any(|s| s.kind == StepKind::Merging)
    }

    /// Rewrite every extraction/merge step to write into `output_dir`
    pub fn redirect_outputs(&mut self, output_dir: &Path) {
        for step in &mut self.steps {
            step.redirect_output(output_dir);
        }
    }
}

/// Set `key` to `value` in a `#v1` parameter blob.
///
/// Replaces the first line whose key matches, otherwise appends a new line.
/// All other lines keep their order and content.
pub fn set_parameter(blob: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = blob.lines().map(str::to_string).collect();
    if lines.is_empty() {
        lines.push(PARAMS_VERSION_HEADER.to_string());
    }

    let entry = format!("{}={}", key, value);
    let existing = lines.iter().position(|line| {
        line.split_once('=')
            .map(|(k, _)| k.trim() == key)
            .unwrap_or(false)
    });

    match existing {
        Some(idx) => lines[idx] = entry,
        None => lines.push(entry),
    }

    lines.join("\n")
}

/// Read `key` from a `#v1` parameter blob
pub fn get_parameter<'a>(blob: &'a str, key: &str) -> Option<&'a str> {
    blob.lines().find_map(|line| match line.split_once('=') {
        Some((k, v)) if k.trim() == key => Some(v),
        _ => None,
    })
}
