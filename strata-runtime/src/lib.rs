//! # Strata Runtime
//!
//! The staged pipeline engine: ingestion, transformation, validation,
//! and deployment pipelines built on a shared stage executor, with
//! in-flight execution tracking and lifecycle event publication.

pub mod audit;
pub mod connector;
pub mod deploy;
pub mod events;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;
pub mod stage;
pub mod tracker;
pub mod transform;
pub mod validate;

// Re-export commonly used types
pub use audit::{ActionLog, ActionRecord, NoopActionLog};
pub use connector::{ConnectorProvider, SourceConnector, TargetConnector};
pub use deploy::{DeployOptions, DeployOutcome, DeploymentPipeline};
pub use events::{EventBus, EventSubscriber, PipelineEvent};
pub use ingest::{IngestOptions, IngestOutcome, IngestionPipeline};
pub use orchestrator::{PipelineRunOptions, PipelineRunResult, PipelineService};
pub use tracker::ExecutionTracker;
pub use transform::{
    RowSetTransform, TransformOptions, TransformOutcome, TransformRegistry,
    TransformationPipeline,
};
pub use validate::{ValidateOutcome, ValidationEngine};

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] strata_core::StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
