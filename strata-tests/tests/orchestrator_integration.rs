//! Integration tests for the pipeline service facade
//!
//! These tests exercise the composite `execute_pipeline` call, the read
//! accessors, and tracker behavior across concurrent invocations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use strata_core::{
    DataFormat, DeploymentTarget, ErrorPolicy, PipelineStatus, TargetKind,
};
use strata_runtime::{
    Error, IngestOptions, PipelineRunOptions, PipelineService,
};
use strata_tests::builders::{required_schema, set_const_rule};
use strata_tests::fixtures::{inline_source, json_payload};
use strata_tests::mocks::{drain_events, MockSource, MockTarget, RecordingSubscriber, StaticProvider};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn target() -> DeploymentTarget {
    DeploymentTarget::new(TargetKind::Warehouse, "staging", "analytics.events")
}

#[tokio::test]
async fn test_execute_pipeline_happy_path() {
    let provider = StaticProvider::with_payload(json_payload());
    let target_handle = provider.target.clone();
    let service = PipelineService::new(Arc::new(provider));

    let result = service
        .execute_pipeline(
            inline_source(),
            DataFormat::Json,
            vec![set_const_rule(1, "env", json!("prod"))],
            required_schema("id", ErrorPolicy::Skip),
            target(),
            PipelineRunOptions::default(),
        )
        .await
        .expect("composite run should succeed");

    assert!(result.validation_report.valid);
    assert!(result.deployment_status.deployed);
    assert_eq!(result.deployment_status.records_deployed, 3);
    assert_eq!(result.dataset.rows.as_ref().unwrap()[0]["env"], "prod");
    assert_eq!(target_handle.written_count(), 3);

    // Ingested original plus the derived transformed dataset.
    assert_eq!(service.list_datasets().len(), 2);
    assert!(service.get_active_executions().await.is_empty());
}

#[tokio::test]
async fn test_execute_pipeline_deploys_invalid_data_by_default() {
    let provider = StaticProvider::with_payload(json_payload());
    let target_handle = provider.target.clone();
    let service = PipelineService::new(Arc::new(provider));

    // No row carries this field, so every row is invalid.
    let result = service
        .execute_pipeline(
            inline_source(),
            DataFormat::Json,
            vec![],
            required_schema("missing_field", ErrorPolicy::Skip),
            target(),
            PipelineRunOptions::default(),
        )
        .await
        .unwrap();

    assert!(!result.validation_report.valid);
    // Deployment still ran against the invalid data.
    assert!(result.deployment_status.deployed);
    assert_eq!(target_handle.written_count(), 3);
}

#[tokio::test]
async fn test_execute_pipeline_stop_on_validation_error() {
    let provider = StaticProvider::with_payload(json_payload());
    let target_handle = provider.target.clone();
    let service = PipelineService::new(Arc::new(provider));

    let result = service
        .execute_pipeline(
            inline_source(),
            DataFormat::Json,
            vec![],
            required_schema("missing_field", ErrorPolicy::Skip),
            target(),
            PipelineRunOptions {
                stop_on_validation_error: true,
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(Error::ValidationFailed(_))));
    // Deployment never started.
    assert!(target_handle.untouched());
}

#[tokio::test]
async fn test_execute_pipeline_ingest_failure_short_circuits() {
    let provider = StaticProvider::new(
        MockSource::failing_on(json_payload(), "connect"),
        MockTarget::new(),
    );
    let target_handle = provider.target.clone();
    let service = PipelineService::new(Arc::new(provider));

    let result = service
        .execute_pipeline(
            inline_source(),
            DataFormat::Json,
            vec![],
            required_schema("id", ErrorPolicy::Skip),
            target(),
            PipelineRunOptions::default(),
        )
        .await;

    assert!(result.is_err());
    assert!(target_handle.untouched());
    assert!(service.list_datasets().is_empty());
    assert!(service.get_active_executions().await.is_empty());
}

#[tokio::test]
async fn test_terminal_events_fire_after_tracker_eviction() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe_all(subscriber);

    service
        .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
        .await
        .unwrap();

    settle().await;
    let active = service.get_active_executions().await;
    for event in drain_events(&mut rx) {
        if event.name.ends_with(":completed") || event.name.ends_with(":failed") {
            assert!(
                active.iter().all(|e| e.id != event.execution_id),
                "terminal event for {} but execution still active",
                event.execution_id
            );
        }
    }
}

#[tokio::test]
async fn test_dataset_accessors() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let outcome = service
        .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
        .await
        .unwrap();
    let id = outcome.dataset.id;

    assert!(service.get_dataset(id).is_some());
    assert_eq!(service.list_datasets().len(), 1);

    let deleted = service.delete_dataset(id).unwrap();
    assert_eq!(deleted.id, id);
    assert!(service.get_dataset(id).is_none());

    // Deleting again surfaces a not-found error, not a stage failure.
    assert!(matches!(
        service.delete_dataset(id),
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_ingests_do_not_collide() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let first = service.ingest(
        inline_source(),
        DataFormat::Json,
        IngestOptions {
            name: Some("first".to_string()),
            ..Default::default()
        },
    );
    let second = service.ingest(
        inline_source(),
        DataFormat::Json,
        IngestOptions {
            name: Some("second".to_string()),
            ..Default::default()
        },
    );

    let (a, b) = tokio::join!(first, second);
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.dataset.id, b.dataset.id);
    assert_eq!(service.list_datasets().len(), 2);
    assert!(service.get_active_executions().await.is_empty());
}

#[tokio::test]
async fn test_executions_visible_while_in_flight() {
    use async_trait::async_trait;
    use strata_runtime::{Result, SourceConnector};
    use tokio::sync::Notify;

    /// Source that parks in `read` until released, so the test can
    /// observe the execution mid-flight.
    struct ParkedSource {
        payload: Vec<u8>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl SourceConnector for ParkedSource {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn read(&self) -> Result<Vec<u8>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.payload.clone())
        }
    }

    struct ParkedProvider {
        source: Arc<ParkedSource>,
        target: Arc<MockTarget>,
    }

    impl strata_runtime::ConnectorProvider for ParkedProvider {
        fn source_for(
            &self,
            _source: &strata_core::DataSource,
        ) -> Result<Arc<dyn SourceConnector>> {
            Ok(self.source.clone())
        }

        fn target_for(
            &self,
            _target: &strata_core::DeploymentTarget,
        ) -> Result<Arc<dyn strata_runtime::TargetConnector>> {
            Ok(self.target.clone())
        }
    }

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let provider = ParkedProvider {
        source: Arc::new(ParkedSource {
            payload: json_payload(),
            entered: entered.clone(),
            release: release.clone(),
        }),
        target: Arc::new(MockTarget::new()),
    };
    let service = PipelineService::new(Arc::new(provider));

    let ingest_service = service.clone();
    let handle = tokio::spawn(async move {
        ingest_service
            .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
            .await
    });

    // Wait until the read stage is parked, then inspect the tracker.
    entered.notified().await;
    let active = service.get_active_executions().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, PipelineStatus::Running);
    assert_eq!(active[0].stages.last().unwrap().name, "read");

    release.notify_one();
    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.dataset.metadata.row_count, 3);
    assert!(service.get_active_executions().await.is_empty());
}
