//! Project id allocation strategies.
//!
//! The strategy is chosen once from configuration and turned into a
//! concrete allocator that the workspace owns.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::{WorkspaceError, WorkspaceResult};
use super::layout::{project_dir_names, WorkspaceLayout};
use crate::domain::ProjectId;

/// Attempts the token strategy makes before giving up
pub const MAX_TOKEN_ATTEMPTS: u32 = 50;

/// Configured id allocation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Highest numeric project id plus one
    #[serde(alias = "Counter")]
    Counter,

    /// Time-ordered random UUID
    #[default]
    #[serde(alias = "UUID", alias = "token")]
    Uuid,
}

impl IdStrategy {
    /// Build the allocator for this strategy
    pub fn allocator(self) -> Arc<dyn ProjectIdAllocator> {
        match self {
            IdStrategy::Counter => Arc::new(CounterAllocator),
            IdStrategy::Uuid => Arc::new(TokenAllocator::new()),
        }
    }
}

impl std::str::FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counter" => Ok(IdStrategy::Counter),
            "uuid" | "token" => Ok(IdStrategy::Uuid),
            other => Err(format!(
                "unknown project id strategy '{}' (expected one of: counter, uuid)",
                other
            )),
        }
    }
}

impl fmt::Display for IdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdStrategy::Counter => write!(f, "counter"),
            IdStrategy::Uuid => write!(f, "uuid"),
        }
    }
}

/// Generates identifiers for new projects
pub trait ProjectIdAllocator: Send + Sync {
    /// Strategy this allocator implements
    fn strategy(&self) -> IdStrategy;

    /// Produce an id with no existing directory under the workspace root
    fn generate_project_id(&self, layout: &WorkspaceLayout) -> WorkspaceResult<ProjectId>;

    /// Whether generate-then-create must run as a single critical section
    fn requires_exclusive_creation(&self) -> bool;
}

/// Scans existing numeric project ids and returns the next one.
///
/// Not collision-free on its own: callers must hold the workspace creation
/// lock from generation until the directory exists.
#[derive(Debug, Default)]
pub struct CounterAllocator;

impl ProjectIdAllocator for CounterAllocator {
    fn strategy(&self) -> IdStrategy {
        IdStrategy::Counter
    }

    fn generate_project_id(&self, layout: &WorkspaceLayout) -> WorkspaceResult<ProjectId> {
        let highest = project_dir_names(layout.root())?
            .iter()
            .filter_map(|name| name.parse::<u64>().ok())
            .max();

        let next = match highest {
            Some(n) => n.checked_add(1).ok_or(WorkspaceError::AllocationExhausted { attempts: 1 })?,
            None => 1,
        };

        debug!(next, "Counter allocated project id");
        ProjectId::parse(&next.to_string())
    }

    fn requires_exclusive_creation(&self) -> bool {
        true
    }
}

type TokenGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Draws fresh time-ordered UUIDs until one is free
pub struct TokenAllocator {
    max_attempts: u32,
    generator: TokenGenerator,
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self {
            max_attempts: MAX_TOKEN_ATTEMPTS,
            generator: Box::new(|| Uuid::now_v7().to_string()),
        }
    }

    /// Allocator with a custom token source (used by tests)
    pub fn with_generator(
        max_attempts: u32,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_attempts,
            generator: Box::new(generator),
        }
    }
}

impl ProjectIdAllocator for TokenAllocator {
    fn strategy(&self) -> IdStrategy {
        IdStrategy::Uuid
    }

    fn generate_project_id(&self, layout: &WorkspaceLayout) -> WorkspaceResult<ProjectId> {
        for attempt in 1..=self.max_attempts {
            let id = ProjectId::parse(&(self.generator)())?;
            if !layout.project_dir(&id).exists() {
                return Ok(id);
            }
            debug!(attempt, %id, "Project id already taken, drawing another");
        }

        Err(WorkspaceError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }

    fn requires_exclusive_creation(&self) -> bool {
        false
    }
}
