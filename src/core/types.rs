//! Task, geometry, state-sidecar and event types.
//!
//! Task blocks are parsed from the line-oriented `.task` language; state and
//! event types derive Serialize/Deserialize for the YAML sidecar and the JSONL
//! event log.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

// ============================================================================
// Task files and blocks
// ============================================================================

/// A parsed `.task` file: ordered blocks sharing one base structure.
#[derive(Debug, Clone)]
pub struct TaskFile {
    /// Path of the `.task` file
    pub path: PathBuf,

    /// File stem; also the stem of the companion structure file
    pub base_name: String,

    /// Blocks in file order
    pub blocks: Vec<TaskBlock>,
}

impl TaskFile {
    /// Look up a block by its (unquoted) title.
    pub fn block(&self, title: &str) -> Option<&TaskBlock> {
        self.blocks.iter().find(|b| b.title == title)
    }
}

/// One declarative unit: a single solver run and its post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskBlock {
    /// Identifier and output subdirectory name
    pub title: String,

    /// Title was written as `$"title"`
    pub completed: bool,

    /// Where the geometry comes from
    pub source: Source,

    /// Primary solver or secondary (templated) solver
    pub variant: Variant,

    /// Text after `#`, reproduced verbatim into the route line
    pub keyword_template: Option<String>,

    /// `add =` block appended after the coordinates
    pub extra_keywords: Option<String>,

    /// `!` command words
    pub post_commands: Vec<String>,

    /// `%molecule=` / `%smiles=` identifier
    pub molecule_override: Option<String>,

    /// `%file=` structure path
    pub file_override: Option<String>,

    /// Lines consumed by this block (0-based, end exclusive)
    pub lines: Range<usize>,

    /// Line index of the `$title` line
    pub title_line: usize,

    /// BLAKE3 over the block's lines with title quoting removed
    pub definition_hash: String,
}

impl TaskBlock {
    /// Whether the block names a geometry override that bypasses its source.
    pub fn has_override(&self) -> bool {
        self.molecule_override.is_some() || self.file_override.is_some()
    }
}

/// Geometry source of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Base structure file of the task directory
    Origin,
    /// This block's own previous (failed or unfinished) run
    Restart,
    /// Completed output of the named sibling block
    Block(String),
}

impl Source {
    /// Parse the text after `%`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "origin" => Self::Origin,
            "restart" => Self::Restart,
            other => Self::Block(other.to_string()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin => write!(f, "origin"),
            Self::Restart => write!(f, "restart"),
            Self::Block(name) => write!(f, "{}", name),
        }
    }
}

/// Solver pathway of a block.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// Line-by-line rendered Gaussian input
    #[default]
    Primary,
    /// Template-and-placeholder ORCA input
    Secondary(SecondaryBlock),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary-solver"),
            Self::Secondary(_) => write!(f, "secondary-solver"),
        }
    }
}

/// Raw `-secondary-` sub-block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecondaryBlock {
    /// Parsed `key=value` control pairs from the `#` line
    pub control: IndexMap<String, String>,

    /// Sub-block lines, verbatim
    pub body: Vec<String>,
}

impl SecondaryBlock {
    /// Template name selected by the `job` control key.
    pub fn job(&self) -> Option<&str> {
        self.control.get("job").map(String::as_str)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Geometry handed over by the geometry collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    pub charge: i32,
    pub spin_multiplicity: u32,

    /// `"{element} {x} {y} {z}"` lines, in atom order
    pub coordinates: Vec<String>,

    /// Route section carried over from a previous solver run
    pub solver_keywords: Option<String>,
}

// ============================================================================
// Readiness
// ============================================================================

/// Per-pass decision for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Already generated; post commands may still be pending
    SkipDone { commands_pending: bool },
    /// Dependency not satisfied yet; retried next pass
    SkipUnready { reason: String },
    /// Geometry from base structure or an override
    RunOrigin,
    /// Geometry from a terminated sibling run
    RunChained { source: String },
    /// Geometry from this block's own previous run
    RunRestart,
}

impl Readiness {
    /// Whether the engine generates inputs for this block in this pass.
    pub fn runs(&self) -> bool {
        matches!(
            self,
            Self::RunOrigin | Self::RunChained { .. } | Self::RunRestart
        )
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipDone { .. } => write!(f, "SKIP_DONE"),
            Self::SkipUnready { .. } => write!(f, "SKIP_UNREADY"),
            Self::RunOrigin => write!(f, "RUN_ORIGIN"),
            Self::RunChained { .. } => write!(f, "RUN_CHAINED"),
            Self::RunRestart => write!(f, "RUN_RESTART"),
        }
    }
}

/// Readiness of one block, for display.
#[derive(Debug, Clone)]
pub struct PlannedBlock {
    pub title: String,
    pub readiness: Readiness,
}

/// Readiness of every block in a task file.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub task_file: PathBuf,
    pub blocks: Vec<PlannedBlock>,
    pub to_run: u32,
    pub done: u32,
    pub unready: u32,
}

// ============================================================================
// State sidecar
// ============================================================================

/// Per-task-file state sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Schema version
    pub schema: String,

    /// Base name of the task file this state belongs to
    pub task: String,

    /// When the sidecar was last written
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// Per-block state, in first-seen order
    pub blocks: IndexMap<String, BlockState>,
}

/// Per-block state entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockState {
    pub status: BlockStatus,

    /// Definition hash the status applies to
    pub definition_hash: String,

    #[serde(default)]
    pub generated_at: Option<String>,

    /// `comd` written for the block's post commands
    #[serde(default)]
    pub commands_emitted: bool,

    /// Last failure, if the most recent attempt failed
    #[serde(default)]
    pub error: Option<String>,

    /// Generated artifacts (path relative to the task dir → BLAKE3)
    #[serde(default)]
    pub artifacts: IndexMap<String, String>,
}

/// Generation status of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Pending,
    Done,
    Failed,
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Done => write!(f, "DONE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event for the per-directory JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    PassStarted {
        task: String,
        run_id: String,
        tasker_version: String,
    },
    BlockGenerated {
        task: String,
        block: String,
        route: String,
        artifacts: Vec<String>,
    },
    BlockFailed {
        task: String,
        block: String,
        error: String,
    },
    CommandsEmitted {
        task: String,
        block: String,
        lines: u32,
    },
    PassCompleted {
        task: String,
        run_id: String,
        generated: u32,
        skipped: u32,
        failed: u32,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: TaskEvent,
}

// ============================================================================
// Pass result
// ============================================================================

/// Result of one pass over a task directory.
#[derive(Debug, Clone)]
pub struct PassResult {
    pub task_file: PathBuf,
    pub generated: u32,
    pub skipped: u32,
    pub failed: u32,
    pub commands_emitted: u32,
    pub total_duration: std::time::Duration,
}

// ============================================================================
// Tests
// ============================================================================
