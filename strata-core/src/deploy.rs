//! Deployment target and status records

use serde::{Deserialize, Serialize};

/// Kind of system a dataset is deployed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A file on a local or mounted filesystem
    File,

    /// A database table
    Database,

    /// An HTTP API endpoint
    Api,

    /// An analytical warehouse table
    Warehouse,
}

/// Descriptor of a deployment destination.
///
/// Like sources, targets are descriptors only; the connector that talks
/// to the destination is resolved by the runtime at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Kind of target system
    pub kind: TargetKind,

    /// Deployment environment (e.g. "staging", "production")
    pub environment: String,

    /// Location within the target system (path, table, URL)
    pub location: String,

    /// Credential reference, if the connector needs one
    pub credentials: Option<String>,

    /// Connector-specific options, passed through opaquely
    pub options: serde_json::Value,
}

impl DeploymentTarget {
    /// Create a target descriptor with no credentials or options
    pub fn new(
        kind: TargetKind,
        environment: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            environment: environment.into(),
            location: location.into(),
            credentials: None,
            options: serde_json::Value::Null,
        }
    }

    /// Set the credential reference
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Set connector-specific options
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of a deployment call.
///
/// Deployment reports failures through this record rather than raising:
/// a failed stage yields `deployed: false` with `error` populated, while
/// the owning execution record is still marked failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    /// Whether records reached the target
    pub deployed: bool,

    /// Number of records written (or that would be written, for dry runs)
    pub records_deployed: u64,

    /// Wall-clock deployment time in milliseconds; zero for dry runs
    pub deployment_time_ms: i64,

    /// Whether the target retains enough state to roll back this write
    pub rollback_available: bool,

    /// Target location, populated on failure for postmortem inspection
    pub target: Option<String>,

    /// Failure description, if the deployment failed
    pub error: Option<String>,

    /// Whether this was a dry run that performed no external writes
    pub dry_run: bool,
}

impl DeploymentStatus {
    /// Status for a successful deployment
    pub fn deployed(records_deployed: u64, deployment_time_ms: i64) -> Self {
        Self {
            deployed: true,
            records_deployed,
            deployment_time_ms,
            rollback_available: true,
            target: None,
            error: None,
            dry_run: false,
        }
    }

    /// Status for a dry run: nothing written, nothing to roll back
    pub fn dry_run(records_deployed: u64) -> Self {
        Self {
            deployed: false,
            records_deployed,
            deployment_time_ms: 0,
            rollback_available: false,
            target: None,
            error: None,
            dry_run: true,
        }
    }

    /// Status for a failed deployment
    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            deployed: false,
            records_deployed: 0,
            deployment_time_ms: 0,
            rollback_available: false,
            target: Some(target.into()),
            error: Some(error.into()),
            dry_run: false,
        }
    }
}
