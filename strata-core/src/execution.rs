//! Pipeline execution records and status transitions
//!
//! A pipeline execution is one tracked run of one pipeline kind, from
//! start to terminal state. Stage executions record the named units of
//! work performed inside it, in call order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Create a new random execution ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four staged workflows the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Ingestion,
    Transformation,
    Validation,
    Deployment,
}

impl PipelineKind {
    /// Event topic prefix for this pipeline kind
    pub fn topic(&self) -> &'static str {
        match self {
            PipelineKind::Ingestion => "ingestion",
            PipelineKind::Transformation => "transformation",
            PipelineKind::Validation => "validation",
            PipelineKind::Deployment => "deployment",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.topic())
    }
}

/// State of a pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Execution has been created but not started
    Pending,

    /// Execution is running its stages
    Running,

    /// Execution finished successfully
    Completed,

    /// Execution failed
    Failed,

    /// Execution was cancelled before completion
    Cancelled,
}

impl PipelineStatus {
    /// Returns true for states an execution never leaves
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Completed | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }

    /// Check if a status transition is valid
    pub fn can_transition_to(&self, to: PipelineStatus) -> bool {
        use PipelineStatus::*;

        matches!(
            (self, to),
            (Pending, Running | Cancelled) | (Running, Completed | Failed | Cancelled)
        )
    }
}

impl From<PipelineStatus> for String {
    fn from(status: PipelineStatus) -> Self {
        match status {
            PipelineStatus::Pending => "pending".to_string(),
            PipelineStatus::Running => "running".to_string(),
            PipelineStatus::Completed => "completed".to_string(),
            PipelineStatus::Failed => "failed".to_string(),
            PipelineStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

impl std::convert::TryFrom<&str> for PipelineStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(PipelineStatus::Pending),
            "running" => Ok(PipelineStatus::Running),
            "completed" => Ok(PipelineStatus::Completed),
            "failed" => Ok(PipelineStatus::Failed),
            "cancelled" => Ok(PipelineStatus::Cancelled),
            _ => Err(format!("Unknown pipeline status: {}", s)),
        }
    }
}

/// State of one stage within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Coarse progress through an execution's units of work
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Units completed so far
    pub current: u64,

    /// Total units, when known up front
    pub total: u64,

    /// Name of the stage currently running
    pub stage: Option<String>,

    /// Free-form progress message
    pub message: Option<String>,
}

/// One named, awaited unit of work within a pipeline execution.
///
/// Stage names need not be unique within one execution; duplicates are
/// legal and preserve call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecution {
    /// Stage name
    pub name: String,

    /// Stage state
    pub status: StageStatus,

    /// When the stage started running
    pub started_at: Option<DateTime<Utc>>,

    /// When the stage reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Stage duration in milliseconds
    pub duration_ms: Option<i64>,

    /// Failure description, if the stage failed
    pub error: Option<String>,
}

impl StageExecution {
    /// Create a stage record in the running state, started now
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Running,
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Mark the stage completed, recording duration
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = StageStatus::Completed;
        self.duration_ms = self
            .started_at
            .map(|s| (now - s).num_milliseconds());
        self.completed_at = Some(now);
    }

    /// Mark the stage failed, recording the error and duration
    pub fn fail(&mut self, error: impl Into<String>) {
        let now = Utc::now();
        self.status = StageStatus::Failed;
        self.error = Some(error.into());
        self.duration_ms = self
            .started_at
            .map(|s| (now - s).num_milliseconds());
        self.completed_at = Some(now);
    }
}

/// One tracked run of one pipeline kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExecution {
    /// Unique identifier
    pub id: ExecutionId,

    /// Which pipeline this execution runs
    pub kind: PipelineKind,

    /// Current state
    pub status: PipelineStatus,

    /// Coarse progress
    pub progress: Progress,

    /// Stage records, in call order
    pub stages: Vec<StageExecution>,

    /// When the execution started
    pub started_at: DateTime<Utc>,

    /// When the execution reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Failure description, if the execution failed
    pub error: Option<String>,

    /// Pipeline-specific result payload
    pub result: Option<serde_json::Value>,
}

impl PipelineExecution {
    /// Create an execution in the running state, started now
    pub fn start(kind: PipelineKind) -> Self {
        Self {
            id: ExecutionId::new(),
            kind,
            status: PipelineStatus::Running,
            progress: Progress::default(),
            stages: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            result: None,
        }
    }

    /// Transition to a new status, rejecting invalid transitions.
    ///
    /// Completion timestamps are set when entering a terminal state.
    pub fn transition(&mut self, to: PipelineStatus) -> Result<(), String> {
        if !self.status.can_transition_to(to) {
            return Err(format!(
                "Invalid status transition from {:?} to {:?}",
                self.status, to
            ));
        }
        self.status = to;
        if to.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the execution completed
    pub fn complete(&mut self) {
        self.status = PipelineStatus::Completed;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Mark the execution failed with an error description
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = PipelineStatus::Failed;
        self.error = Some(error.into());
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Record progress through the execution's units of work
    pub fn set_progress(&mut self, current: u64, total: u64, stage: Option<String>) {
        self.progress.current = current;
        self.progress.total = total;
        self.progress.stage = stage;
    }
}
