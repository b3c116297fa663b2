//! # Strata Core
//!
//! Core record types for the Strata pipeline engine: datasets and their
//! descriptors, transform rules, validation schemas and reports,
//! deployment targets, execution records, and the dataset store.

pub mod dataset;
pub mod deploy;
pub mod execution;
pub mod fingerprint;
pub mod rule;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use dataset::{
    DataFormat, DataSchema, DataSource, Dataset, DatasetBuilder, DatasetId, DatasetMetadata,
    FieldType, Row, SchemaField, SourceKind,
};
pub use deploy::{DeploymentStatus, DeploymentTarget, TargetKind};
pub use execution::{
    ExecutionId, PipelineExecution, PipelineKind, PipelineStatus, Progress, StageExecution,
    StageStatus,
};
pub use fingerprint::{fingerprint_rows, serialized_size};
pub use rule::{CompareOp, MapOp, Predicate, RuleError, RuleKind, TransformRule, sort_rules};
pub use store::{DatasetStore, StoreError};
pub use validation::{
    ErrorPolicy, RuleSeverity, ValidationKind, ValidationReport, ValidationRule, ValidationSchema,
    ValidationSummary, Violation,
};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
