//! Integration tests for the four staged pipelines
//!
//! Each test drives a pipeline through the public service API against
//! in-memory mock connectors and asserts on the returned records, the
//! dataset store, the execution tracker, emitted events, and audit
//! records.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use strata_core::{CompareOp, DataFormat, DeploymentTarget, ErrorPolicy, TargetKind};
use strata_runtime::{DeployOptions, IngestOptions, PipelineService, TransformOptions};
use strata_tests::assertions::{
    assert_all_stages_completed, assert_completed, assert_event_fired, assert_event_not_fired,
    assert_failed, assert_stage_names, count_events,
};
use strata_tests::builders::{custom_rule, filter_rule, rename_rule, required_schema, set_const_rule};
use strata_tests::fixtures::{dataset_with_rows, inline_source, json_payload, numbered_dataset, row};
use strata_tests::mocks::{drain_events, MockSource, MockTarget, RecordingActionLog,
    RecordingSubscriber, StaticProvider};

/// Give spawned event deliveries a chance to land.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn target() -> DeploymentTarget {
    DeploymentTarget::new(TargetKind::Warehouse, "staging", "analytics.orders")
}

// =========================================================================
// Ingestion
// =========================================================================

#[tokio::test]
async fn test_ingest_three_inline_records() {
    let provider = StaticProvider::with_payload(json_payload());
    let log = Arc::new(RecordingActionLog::new());
    let service = PipelineService::builder(Arc::new(provider))
        .action_log(log.clone())
        .build();
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe_all(subscriber);

    let outcome = service
        .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
        .await
        .expect("ingestion should succeed");

    let dataset = &outcome.dataset;
    assert_eq!(dataset.metadata.row_count, 3);
    assert!(dataset.metadata.size_bytes > 0);
    assert!(dataset.metadata.checksum.is_some());

    // Schema is inferred from the sample record's keys.
    let schema = dataset.schema.as_ref().expect("schema inferred");
    assert!(schema.inferred);
    let mut names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["amount", "id", "name"]);

    assert_stage_names(
        &outcome.execution,
        &["connect", "read", "parse", "infer-schema"],
    );
    assert_all_stages_completed(&outcome.execution);
    assert_completed(&outcome.execution);

    // Registered in the store, resolvable by id.
    assert_eq!(
        service.get_dataset(dataset.id).unwrap().metadata.row_count,
        3
    );

    settle().await;
    let events = drain_events(&mut rx);
    assert_event_fired(&events, "ingestion:started");
    assert_event_fired(&events, "ingestion:completed");

    // One success audit record from the pipeline agent.
    let records = log.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].agent, "data-pipeline");
    assert_eq!(records[0].action_type, "Write");
    assert_eq!(records[0].record_affected, dataset.id.to_string());
}

#[tokio::test]
async fn test_ingest_stage_failure_propagates() {
    let provider = StaticProvider::new(
        MockSource::failing_on(json_payload(), "read"),
        MockTarget::new(),
    );
    let log = Arc::new(RecordingActionLog::new());
    let service = PipelineService::builder(Arc::new(provider))
        .action_log(log.clone())
        .build();
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe_all(subscriber);

    let result = service
        .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
        .await;

    assert!(result.is_err());
    // Nothing registered, nothing left in flight, no audit record.
    assert!(service.list_datasets().is_empty());
    assert!(service.get_active_executions().await.is_empty());
    assert_eq!(log.count(), 0);

    settle().await;
    let events = drain_events(&mut rx);
    assert_event_fired(&events, "ingestion:failed");
    assert_event_not_fired(&events, "ingestion:completed");
}

#[tokio::test]
async fn test_ingest_csv_payload() {
    let payload = b"id,name\n1,alice\n2,bob\n".to_vec();
    let provider = StaticProvider::with_payload(payload);
    let service = PipelineService::new(Arc::new(provider));

    let outcome = service
        .ingest(inline_source(), DataFormat::csv(), IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.dataset.metadata.row_count, 2);
    let rows = outcome.dataset.rows.as_ref().unwrap();
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[1]["name"], "bob");
}

#[tokio::test]
async fn test_ingest_always_infers_over_declared_schema() {
    use strata_core::{DataSchema, FieldType, SchemaField};

    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    // Declare a schema that disagrees with the data entirely.
    let declared = DataSchema {
        fields: vec![SchemaField {
            name: "bogus".to_string(),
            field_type: FieldType::Boolean,
            nullable: false,
        }],
        inferred: false,
    };

    let outcome = service
        .ingest(
            inline_source(),
            DataFormat::Json,
            IngestOptions {
                schema: Some(declared),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let schema = outcome.dataset.schema.as_ref().unwrap();
    assert!(schema.inferred);
    assert!(schema.field("id").is_some());
    assert!(schema.field("bogus").is_none());
}

#[tokio::test]
async fn test_ingest_parse_failure_marks_parse_stage() {
    let provider = StaticProvider::with_payload(b"not json at all".to_vec());
    let service = PipelineService::new(Arc::new(provider));

    let result = service
        .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
        .await;

    assert!(result.is_err());
    assert!(service.list_datasets().is_empty());
}

// =========================================================================
// Transformation
// =========================================================================

#[tokio::test]
async fn test_transform_runs_rules_in_order_value_order() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let dataset = dataset_with_rows(
        "events",
        vec![row(json!({"v": 1})), row(json!({"v": 2})), row(json!({"v": 3}))],
    );
    service.store().register(dataset.clone()).unwrap();

    // The filter references the column the map introduces, so it only
    // works if the map runs first despite its later array position.
    let rules = vec![
        filter_rule(2, "n", CompareOp::Gte, json!(2)),
        rename_rule(1, "v", "n"),
    ];

    let outcome = service
        .transform(dataset, rules, TransformOptions::default())
        .await
        .expect("transformation should succeed");

    assert_stage_names(&outcome.execution, &["transform-map", "transform-filter"]);
    assert_eq!(outcome.dataset.metadata.row_count, 2);
    let rows = outcome.dataset.rows.as_ref().unwrap();
    assert!(rows.iter().all(|r| r.contains_key("n")));
}

#[tokio::test]
async fn test_transform_derives_without_mutating_original() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let original = dataset_with_rows("orders", vec![row(json!({"a": 1}))]);
    let original_id = original.id;
    service.store().register(original.clone()).unwrap();

    let outcome = service
        .transform(
            original.clone(),
            vec![set_const_rule(1, "env", json!("prod"))],
            TransformOptions::default(),
        )
        .await
        .unwrap();

    let derived = &outcome.dataset;
    assert_ne!(derived.id, original_id);
    assert_eq!(derived.name, "orders (transformed)");
    assert!(derived.metadata.tags.contains(&"transformed".to_string()));
    assert_eq!(derived.rows.as_ref().unwrap()[0]["env"], "prod");

    // The original is left untouched and still resolvable.
    let stored = service.get_dataset(original_id).unwrap();
    assert!(!stored.rows.as_ref().unwrap()[0].contains_key("env"));
    assert_eq!(service.list_datasets().len(), 2);
}

#[tokio::test]
async fn test_transform_in_place_keeps_id() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let dataset = dataset_with_rows("orders", vec![row(json!({"a": 1}))]);
    let id = dataset.id;
    let created_at = dataset.metadata.created_at;
    service.store().register(dataset.clone()).unwrap();

    let outcome = service
        .transform(
            dataset,
            vec![set_const_rule(1, "env", json!("prod"))],
            TransformOptions {
                in_place: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.dataset.id, id);
    assert_eq!(service.list_datasets().len(), 1);

    let stored = service.get_dataset(id).unwrap();
    assert_eq!(stored.rows.as_ref().unwrap()[0]["env"], "prod");
    assert!(stored.metadata.updated_at >= created_at);
}

#[tokio::test]
async fn test_transform_failure_keeps_applied_in_place_effects() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let dataset = dataset_with_rows("orders", vec![row(json!({"a": 1}))]);
    let id = dataset.id;
    service.store().register(dataset.clone()).unwrap();

    // First rule applies, second delegates to a collaborator that was
    // never registered.
    let rules = vec![
        set_const_rule(1, "env", json!("prod")),
        custom_rule(2, "missing-collaborator"),
    ];

    let result = service
        .transform(
            dataset,
            rules,
            TransformOptions {
                in_place: true,
                ..Default::default()
            },
        )
        .await;

    assert!(result.is_err());
    // The first rule's effect on the stored dataset is not rolled back.
    let stored = service.get_dataset(id).unwrap();
    assert_eq!(stored.rows.as_ref().unwrap()[0]["env"], "prod");
    assert!(service.get_active_executions().await.is_empty());
}

#[tokio::test]
async fn test_transform_emits_progress_per_rule() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe_all(subscriber);

    let dataset = dataset_with_rows("orders", vec![row(json!({"a": 1}))]);
    service.store().register(dataset.clone()).unwrap();

    service
        .transform(
            dataset,
            vec![
                set_const_rule(1, "x", json!(1)),
                set_const_rule(2, "y", json!(2)),
            ],
            TransformOptions::default(),
        )
        .await
        .unwrap();

    settle().await;
    let events = drain_events(&mut rx);
    assert_eq!(count_events(&events, "transformation:progress"), 2);
    let currents: Vec<u64> = events
        .iter()
        .filter(|e| e.name == "transformation:progress")
        .map(|e| e.payload["current"].as_u64().unwrap())
        .collect();
    assert!(currents.contains(&1) && currents.contains(&2));
}

// =========================================================================
// Validation
// =========================================================================

#[tokio::test]
async fn test_validation_stop_policy_halts_at_first_invalid_row() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    // Ten rows; the fourth is missing the required field.
    let mut rows = Vec::new();
    for i in 0..10 {
        if i == 3 {
            rows.push(row(json!({"other": i})));
        } else {
            rows.push(row(json!({"id": i})));
        }
    }
    let dataset = dataset_with_rows("scan", rows);

    let outcome = service
        .validate(&dataset, &required_schema("id", ErrorPolicy::Stop))
        .await
        .expect("validation itself should not raise");

    let report = &outcome.report;
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.summary.total_records, 10);
    assert_eq!(report.summary.valid_records, 3);
    assert_eq!(report.summary.invalid_records, 1);
    assert_eq!(report.summary.skipped_records, 6);

    // An invalid report is a completed execution, not a failed one.
    assert_completed(&outcome.execution);
}

#[tokio::test]
async fn test_validation_error_budget() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));

    let bad_rows = |count: usize| {
        dataset_with_rows(
            "budget",
            (0..count).map(|i| row(json!({"other": i}))).collect(),
        )
    };

    let schema = required_schema("id", ErrorPolicy::Log).with_max_errors(5);

    let at_budget = service.validate(&bad_rows(5), &schema).await.unwrap();
    assert!(at_budget.report.valid);
    assert_eq!(at_budget.report.errors.len(), 5);

    let over_budget = service.validate(&bad_rows(6), &schema).await.unwrap();
    assert!(!over_budget.report.valid);
    assert_eq!(over_budget.report.errors.len(), 6);
}

#[tokio::test]
async fn test_validation_emits_progress_during_scan() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::new(Arc::new(provider));
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe("validation:progress", subscriber);

    let dataset = numbered_dataset("large", 250);
    service
        .validate(&dataset, &required_schema("id", ErrorPolicy::Skip))
        .await
        .unwrap();

    settle().await;
    let events = drain_events(&mut rx);
    assert!(events.len() >= 2, "expected progress every 100 rows");
}

// =========================================================================
// Deployment
// =========================================================================

#[tokio::test]
async fn test_deploy_dry_run_never_touches_connector() {
    let provider = StaticProvider::with_payload(json_payload());
    let target_handle = provider.target.clone();
    let service = PipelineService::new(Arc::new(provider));
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe_all(subscriber);

    let dataset = numbered_dataset("orders", 7);
    let outcome = service
        .deploy(
            &dataset,
            &target(),
            DeployOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!outcome.status.deployed);
    assert!(outcome.status.dry_run);
    assert_eq!(outcome.status.records_deployed, 7);
    assert_eq!(outcome.status.deployment_time_ms, 0);
    assert!(!outcome.status.rollback_available);
    assert!(target_handle.untouched());

    // No stages ran, yet the execution completed.
    assert!(outcome.execution.stages.is_empty());
    assert_completed(&outcome.execution);

    settle().await;
    let events = drain_events(&mut rx);
    let completed: Vec<_> = events
        .iter()
        .filter(|e| e.name == "deployment:completed")
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].payload["dryRun"], true);
}

#[tokio::test]
async fn test_deploy_connect_failure_returns_status_not_error() {
    let provider = StaticProvider::new(
        MockSource::new(json_payload()),
        MockTarget::failing_on("connect"),
    );
    let service = PipelineService::new(Arc::new(provider));
    let (subscriber, mut rx) = RecordingSubscriber::channel();
    service.events().subscribe_all(subscriber);

    let dataset = numbered_dataset("orders", 3);
    let outcome = service
        .deploy(&dataset, &target(), DeployOptions::default())
        .await
        .expect("deploy returns a status instead of raising");

    assert!(!outcome.status.deployed);
    assert_eq!(outcome.status.target.as_deref(), Some("analytics.orders"));
    assert!(outcome
        .status
        .error
        .as_deref()
        .unwrap()
        .contains("connect"));

    // The execution record still reads as failed.
    assert_failed(&outcome.execution);
    assert!(service.get_active_executions().await.is_empty());

    settle().await;
    let events = drain_events(&mut rx);
    assert_event_fired(&events, "deployment:failed");
    assert_event_not_fired(&events, "deployment:completed");
}

#[tokio::test]
async fn test_deploy_success_batches_rows() {
    let provider = StaticProvider::with_payload(json_payload());
    let target_handle = provider.target.clone();
    let log = Arc::new(RecordingActionLog::new());
    let service = PipelineService::builder(Arc::new(provider))
        .action_log(log.clone())
        .build();

    let dataset = numbered_dataset("orders", 5);
    let outcome = service
        .deploy(
            &dataset,
            &target(),
            DeployOptions {
                batch_size: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(outcome.status.deployed);
    assert!(outcome.status.rollback_available);
    assert_eq!(outcome.status.records_deployed, 5);
    assert_eq!(
        target_handle
            .write_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        3
    );
    assert_eq!(target_handle.written_count(), 5);

    assert_stage_names(&outcome.execution, &["connect", "prepare", "deploy"]);
    assert_all_stages_completed(&outcome.execution);

    // Deployment success audits through the same collaborator as ingestion.
    assert_eq!(log.count(), 1);
    let records = log.records.lock().unwrap();
    assert_eq!(records[0].system_targeted, "analytics.orders");
}

#[tokio::test]
async fn test_audit_failure_never_fails_the_pipeline() {
    let provider = StaticProvider::with_payload(json_payload());
    let service = PipelineService::builder(Arc::new(provider))
        .action_log(Arc::new(RecordingActionLog::failing()))
        .build();

    let outcome = service
        .ingest(inline_source(), DataFormat::Json, IngestOptions::default())
        .await
        .expect("a failing audit sink must not fail ingestion");

    assert_eq!(outcome.dataset.metadata.row_count, 3);
    assert_completed(&outcome.execution);
}
