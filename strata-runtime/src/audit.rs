//! Action-log interface
//!
//! Successful ingestion and deployment send an audit record to an
//! external action-logging collaborator. Audit failures are swallowed: a
//! failed audit write is logged and never fails an otherwise-successful
//! pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;

/// Audit record sent to the action-log collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Acting component, e.g. "data-pipeline"
    pub agent: String,

    /// System the action touched
    pub system_targeted: String,

    /// Kind of action, e.g. "Write"
    pub action_type: String,

    /// Identifier of the affected record
    pub record_affected: String,

    /// Short description of the payload
    pub payload_summary: String,

    /// Confirmation detail returned by the targeted system
    pub response_confirmation: String,

    /// Outcome, e.g. "success"
    pub status: String,
}

impl ActionRecord {
    /// A successful write record from the pipeline agent
    pub fn write_success(
        system_targeted: impl Into<String>,
        record_affected: impl Into<String>,
        payload_summary: impl Into<String>,
        response_confirmation: impl Into<String>,
    ) -> Self {
        Self {
            agent: "data-pipeline".to_string(),
            system_targeted: system_targeted.into(),
            action_type: "Write".to_string(),
            record_affected: record_affected.into(),
            payload_summary: payload_summary.into(),
            response_confirmation: response_confirmation.into(),
            status: "success".to_string(),
        }
    }
}

/// External action-logging collaborator
#[async_trait]
pub trait ActionLog: Send + Sync {
    /// Record one action
    async fn record(&self, record: ActionRecord) -> Result<()>;
}

/// Action log that drops every record
pub struct NoopActionLog;

#[async_trait]
impl ActionLog for NoopActionLog {
    async fn record(&self, _record: ActionRecord) -> Result<()> {
        Ok(())
    }
}

/// Send an audit record, swallowing any collaborator failure.
pub(crate) async fn record_swallowing(log: &Arc<dyn ActionLog>, record: ActionRecord) {
    let affected = record.record_affected.clone();
    if let Err(e) = log.record(record).await {
        tracing::warn!(
            record_affected = %affected,
            error = %e,
            "Action log write failed; continuing"
        );
    }
}
