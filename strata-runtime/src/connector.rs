//! Connector traits
//!
//! The engine only defines the stage boundary at which sources and
//! targets are invoked; the connectors that talk to real systems are
//! external collaborators resolved through a provider at execution time.
//! Every connector call is a suspension point — the engine never assumes
//! synchronous completion.

use async_trait::async_trait;
use std::sync::Arc;

use strata_core::{DataSource, Dataset, DeploymentTarget, Row};

use crate::Result;

/// Reads raw payloads from a source system
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Establish the connection
    async fn connect(&self) -> Result<()>;

    /// Read the full raw payload
    async fn read(&self) -> Result<Vec<u8>>;
}

/// Writes records to a target system
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// Establish the connection
    async fn connect(&self) -> Result<()>;

    /// Prepare the destination for the dataset (create/truncate/etc.)
    async fn prepare(&self, dataset: &Dataset, overwrite: bool) -> Result<()>;

    /// Write one batch of rows, returning the number written
    async fn write_batch(&self, rows: &[Row]) -> Result<u64>;
}

/// Resolves descriptors to concrete connectors
pub trait ConnectorProvider: Send + Sync {
    /// Resolve a source descriptor
    fn source_for(&self, source: &DataSource) -> Result<Arc<dyn SourceConnector>>;

    /// Resolve a target descriptor
    fn target_for(&self, target: &DeploymentTarget) -> Result<Arc<dyn TargetConnector>>;
}
