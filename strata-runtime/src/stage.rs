//! Stage executor
//!
//! Runs one named unit of asynchronous work inside a pipeline execution,
//! recording timing and status on the execution's stage list and keeping
//! the tracker's snapshot current. Failures are captured on the stage
//! record and re-thrown; the owning pipeline is responsible for
//! transitioning the execution to failed and emitting the failure event.

use std::future::Future;

use strata_core::PipelineExecution;

use crate::metrics::STAGE_DURATION_SECONDS;
use crate::tracker::ExecutionTracker;
use crate::Result;

/// Run `op` as a named stage of `execution`.
///
/// Appends a running stage record before awaiting, then marks it
/// completed or failed afterwards. Stage names need not be unique within
/// one execution; call order is preserved.
pub async fn run_stage<T, F, Fut>(
    tracker: &ExecutionTracker,
    execution: &mut PipelineExecution,
    name: &str,
    op: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = std::time::Instant::now();
    let index = execution.stages.len();
    execution
        .stages
        .push(strata_core::StageExecution::running(name));
    execution.progress.stage = Some(name.to_string());
    tracker.update(execution.clone()).await;

    tracing::debug!(
        execution_id = %execution.id,
        pipeline = %execution.kind,
        stage = name,
        "Stage started"
    );

    let result = op().await;

    let elapsed = start.elapsed().as_secs_f64();
    STAGE_DURATION_SECONDS
        .with_label_values(&[execution.kind.topic(), name])
        .observe(elapsed);

    match &result {
        Ok(_) => {
            execution.stages[index].complete();
            tracing::debug!(
                execution_id = %execution.id,
                stage = name,
                duration_ms = execution.stages[index].duration_ms,
                "Stage completed"
            );
        }
        Err(e) => {
            execution.stages[index].fail(e.to_string());
            tracing::error!(
                execution_id = %execution.id,
                stage = name,
                error = %e,
                "Stage failed"
            );
        }
    }
    tracker.update(execution.clone()).await;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{PipelineKind, StageStatus};

    use crate::Error;

    #[tokio::test]
    async fn test_successful_stage_recorded() {
        let tracker = ExecutionTracker::new();
        let mut exec = PipelineExecution::start(PipelineKind::Ingestion);
        tracker.insert(exec.clone()).await;

        let out = run_stage(&tracker, &mut exec, "read", || async { Ok(41 + 1) }).await;

        assert_eq!(out.unwrap(), 42);
        assert_eq!(exec.stages.len(), 1);
        assert_eq!(exec.stages[0].name, "read");
        assert_eq!(exec.stages[0].status, StageStatus::Completed);
        assert!(exec.stages[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_stage_captures_error_and_rethrows() {
        let tracker = ExecutionTracker::new();
        let mut exec = PipelineExecution::start(PipelineKind::Deployment);
        tracker.insert(exec.clone()).await;

        let out: Result<()> = run_stage(&tracker, &mut exec, "connect", || async {
            Err(Error::Connector("refused".to_string()))
        })
        .await;

        assert!(out.is_err());
        assert_eq!(exec.stages[0].status, StageStatus::Failed);
        assert!(exec.stages[0].error.as_deref().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_duplicate_stage_names_preserve_call_order() {
        let tracker = ExecutionTracker::new();
        let mut exec = PipelineExecution::start(PipelineKind::Transformation);
        tracker.insert(exec.clone()).await;

        run_stage(&tracker, &mut exec, "transform-map", || async { Ok(()) })
            .await
            .unwrap();
        run_stage(&tracker, &mut exec, "transform-map", || async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(exec.stages.len(), 2);
        assert!(exec.stages.iter().all(|s| s.name == "transform-map"));
    }

    #[tokio::test]
    async fn test_tracker_snapshot_updated() {
        let tracker = ExecutionTracker::new();
        let mut exec = PipelineExecution::start(PipelineKind::Validation);
        tracker.insert(exec.clone()).await;

        run_stage(&tracker, &mut exec, "scan", || async { Ok(()) })
            .await
            .unwrap();

        let snapshot = tracker.get(exec.id).await.unwrap();
        assert_eq!(snapshot.stages.len(), 1);
        assert_eq!(snapshot.stages[0].status, StageStatus::Completed);
    }
}
