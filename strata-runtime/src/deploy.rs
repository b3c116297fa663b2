//! Deployment pipeline
//!
//! Ships a dataset's records to a target connector through connect →
//! prepare → deploy stages. Unlike the other pipelines, a stage failure
//! here is caught inside the call and returned as a status record: the
//! execution is still marked failed and the failure event still fires,
//! but the caller receives `deployed: false` with the error instead of a
//! propagated exception. A dry run performs no stages and no external
//! writes at all.

use std::sync::Arc;

use serde_json::json;

use strata_core::{
    Dataset, DeploymentStatus, DeploymentTarget, PipelineExecution, PipelineKind,
};

use crate::audit::{self, ActionLog, ActionRecord};
use crate::connector::ConnectorProvider;
use crate::events::{EventBus, PipelineEvent};
use crate::metrics::{PIPELINE_EXECUTIONS_TOTAL, ROWS_PROCESSED_TOTAL};
use crate::stage::run_stage;
use crate::tracker::ExecutionTracker;
use crate::{Error, Result};

/// Rows written per connector call when the caller does not say otherwise
const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options for a deployment call
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Rows per `write_batch` call; defaults to 1000
    pub batch_size: Option<usize>,

    /// Ask the target to replace existing data during prepare
    pub overwrite: bool,

    /// Report the outcome without performing any external writes
    pub dry_run: bool,
}

/// Result of a deployment call
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    /// Status record; `deployed: false` with `error` set on failure
    pub status: DeploymentStatus,

    /// Final execution record
    pub execution: PipelineExecution,
}

/// Staged deployment workflow
#[derive(Clone)]
pub struct DeploymentPipeline {
    tracker: ExecutionTracker,
    events: EventBus,
    audit: Arc<dyn ActionLog>,
    provider: Arc<dyn ConnectorProvider>,
}

impl DeploymentPipeline {
    pub fn new(
        tracker: ExecutionTracker,
        events: EventBus,
        audit: Arc<dyn ActionLog>,
        provider: Arc<dyn ConnectorProvider>,
    ) -> Self {
        Self {
            tracker,
            events,
            audit,
            provider,
        }
    }

    /// Deploy a dataset to a target.
    ///
    /// Always returns a status record; stage failures do not propagate.
    #[tracing::instrument(
        name = "deployment.deploy",
        skip(self, dataset, target, options),
        fields(
            dataset_id = %dataset.id,
            environment = %target.environment,
            location = %target.location,
            dry_run = options.dry_run,
        )
    )]
    pub async fn deploy(
        &self,
        dataset: &Dataset,
        target: &DeploymentTarget,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        let mut execution = PipelineExecution::start(PipelineKind::Deployment);
        self.tracker.insert(execution.clone()).await;
        self.events.emit(PipelineEvent::new(
            "deployment:started",
            execution.id,
            json!({
                "dataset_id": dataset.id.to_string(),
                "environment": target.environment,
                "location": target.location,
                "dry_run": options.dry_run,
            }),
        ));

        if options.dry_run {
            // No stages run and the target connector is never resolved.
            let status = DeploymentStatus::dry_run(dataset.metadata.row_count);
            execution.result = Some(json!({
                "deployed": false,
                "dry_run": true,
                "records": status.records_deployed,
            }));
            execution.complete();
            self.tracker.remove(execution.id).await;
            PIPELINE_EXECUTIONS_TOTAL
                .with_label_values(&["deployment", "completed"])
                .inc();
            self.events.emit(PipelineEvent::new(
                "deployment:completed",
                execution.id,
                json!({
                    "dataset_id": dataset.id.to_string(),
                    "dryRun": true,
                    "records_deployed": status.records_deployed,
                }),
            ));
            tracing::info!(execution_id = %execution.id, "Dry-run deployment completed");
            return Ok(DeployOutcome { status, execution });
        }

        let result = self
            .run_stages(&mut execution, dataset, target, &options)
            .await;

        match result {
            Ok(status) => {
                execution.result = Some(json!({
                    "deployed": true,
                    "records": status.records_deployed,
                    "deployment_time_ms": status.deployment_time_ms,
                }));
                execution.complete();
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["deployment", "completed"])
                    .inc();
                ROWS_PROCESSED_TOTAL
                    .with_label_values(&["deployment"])
                    .inc_by(status.records_deployed);

                self.events.emit(PipelineEvent::new(
                    "deployment:completed",
                    execution.id,
                    json!({
                        "dataset_id": dataset.id.to_string(),
                        "records_deployed": status.records_deployed,
                        "deployment_time_ms": status.deployment_time_ms,
                    }),
                ));

                audit::record_swallowing(
                    &self.audit,
                    ActionRecord::write_success(
                        target.location.clone(),
                        dataset.id.to_string(),
                        format!(
                            "{} rows deployed to {}",
                            status.records_deployed, target.environment
                        ),
                        "deployment confirmed",
                    ),
                )
                .await;

                tracing::info!(
                    execution_id = %execution.id,
                    records = status.records_deployed,
                    "Deployment completed"
                );

                Ok(DeployOutcome { status, execution })
            }
            Err(e) => {
                // Caught, not propagated: the caller gets a status record
                // while the execution record still reads as failed.
                execution.fail(e.to_string());
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["deployment", "failed"])
                    .inc();
                self.events.emit(PipelineEvent::new(
                    "deployment:failed",
                    execution.id,
                    json!({
                        "dataset_id": dataset.id.to_string(),
                        "error": e.to_string(),
                    }),
                ));
                tracing::error!(execution_id = %execution.id, error = %e, "Deployment failed");

                let status = DeploymentStatus::failed(target.location.clone(), e.to_string());
                Ok(DeployOutcome { status, execution })
            }
        }
    }

    async fn run_stages(
        &self,
        execution: &mut PipelineExecution,
        dataset: &Dataset,
        target: &DeploymentTarget,
        options: &DeployOptions,
    ) -> Result<DeploymentStatus> {
        let rows = dataset.rows.as_deref().ok_or_else(|| {
            Error::Execution(format!(
                "dataset {} has no materialized rows to deploy",
                dataset.id
            ))
        })?;
        let connector = self.provider.target_for(target)?;
        let start = std::time::Instant::now();

        execution.progress.total = 3;

        run_stage(&self.tracker, execution, "connect", || connector.connect()).await?;
        execution.progress.current = 1;

        let overwrite = options.overwrite;
        run_stage(&self.tracker, execution, "prepare", || {
            connector.prepare(dataset, overwrite)
        })
        .await?;
        execution.progress.current = 2;

        let batch_size = options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
        let connector_ref = &connector;
        let records_deployed = run_stage(&self.tracker, execution, "deploy", || async move {
            let mut written = 0u64;
            for batch in rows.chunks(batch_size) {
                written += connector_ref.write_batch(batch).await?;
            }
            Ok(written)
        })
        .await?;
        execution.progress.current = 3;

        Ok(DeploymentStatus::deployed(
            records_deployed,
            start.elapsed().as_millis() as i64,
        ))
    }
}
