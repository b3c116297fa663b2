//! Transformation pipeline
//!
//! Applies an ordered rule chain to a dataset. Rules are stable-sorted
//! by `order` and applied strictly left-to-right; a later rule may
//! depend on a column a prior rule introduced, so rules never run in
//! parallel. Map and filter rules are executed by the engine itself;
//! aggregate, join, pivot, and custom rules delegate the row reshaping
//! to a registered collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use strata_core::{
    fingerprint_rows, serialized_size, sort_rules, CompareOp, DatasetStore, Dataset, MapOp,
    PipelineExecution, PipelineKind, Predicate, Row, RuleKind, TransformRule,
};

use crate::events::{EventBus, PipelineEvent};
use crate::metrics::{PIPELINE_EXECUTIONS_TOTAL, ROWS_PROCESSED_TOTAL};
use crate::stage::run_stage;
use crate::tracker::ExecutionTracker;
use crate::{Error, Result};

/// Collaborator that reshapes a whole row set for delegated rule kinds
#[async_trait]
pub trait RowSetTransform: Send + Sync {
    /// Apply the transform, consuming the input rows
    async fn apply(&self, rows: Vec<Row>, config: &serde_json::Value) -> Result<Vec<Row>>;
}

/// Registry of row-set collaborators, keyed by rule type name or, for
/// custom rules, by the rule's own name
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn RowSetTransform>>,
}

impl TransformRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator under a key
    pub fn register(&mut self, key: impl Into<String>, transform: Arc<dyn RowSetTransform>) {
        self.transforms.insert(key.into(), transform);
    }

    fn lookup(&self, rule: &TransformRule) -> Result<Arc<dyn RowSetTransform>> {
        let key = match &rule.kind {
            RuleKind::Custom { name, .. } => name.as_str(),
            other => other.type_name(),
        };
        self.transforms.get(key).cloned().ok_or_else(|| {
            Error::Execution(format!(
                "no transform registered for rule '{}'",
                key
            ))
        })
    }
}

/// Options for a transformation call
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Mutate the input dataset in place instead of deriving a new one
    pub in_place: bool,

    /// Accepted for interface parity; rules always run sequentially
    /// because later rules may depend on columns earlier rules introduced
    pub parallel: bool,
}

/// Result of a successful transformation call
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    /// The mutated or derived dataset
    pub dataset: Dataset,

    /// Final execution record
    pub execution: PipelineExecution,
}

/// Staged transformation workflow
#[derive(Clone)]
pub struct TransformationPipeline {
    store: DatasetStore,
    tracker: ExecutionTracker,
    events: EventBus,
    transforms: TransformRegistry,
}

impl TransformationPipeline {
    pub fn new(
        store: DatasetStore,
        tracker: ExecutionTracker,
        events: EventBus,
        transforms: TransformRegistry,
    ) -> Self {
        Self {
            store,
            tracker,
            events,
            transforms,
        }
    }

    /// Apply an ordered rule chain to a dataset.
    ///
    /// With `in_place` the same dataset id is mutated and returned; the
    /// store's copy is refreshed after every applied rule, so effects of
    /// rules that ran before a failure are not rolled back. Otherwise a
    /// new dataset is derived and registered and the original is left
    /// untouched.
    #[tracing::instrument(
        name = "transformation.transform",
        skip(self, dataset, rules, options),
        fields(dataset_id = %dataset.id, rules = rules.len(), in_place = options.in_place)
    )]
    pub async fn transform(
        &self,
        dataset: Dataset,
        rules: Vec<TransformRule>,
        options: TransformOptions,
    ) -> Result<TransformOutcome> {
        let mut execution = PipelineExecution::start(PipelineKind::Transformation);
        execution.progress.total = rules.len() as u64;
        self.tracker.insert(execution.clone()).await;
        self.events.emit(PipelineEvent::new(
            "transformation:started",
            execution.id,
            json!({
                "dataset_id": dataset.id.to_string(),
                "rules": rules.len(),
                "in_place": options.in_place,
            }),
        ));

        let result = self
            .run_rules(&mut execution, dataset, rules, &options)
            .await;

        match result {
            Ok(dataset) => {
                execution.result = Some(json!({
                    "dataset_id": dataset.id.to_string(),
                    "row_count": dataset.metadata.row_count,
                }));
                execution.complete();
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["transformation", "completed"])
                    .inc();
                ROWS_PROCESSED_TOTAL
                    .with_label_values(&["transformation"])
                    .inc_by(dataset.metadata.row_count);

                self.events.emit(PipelineEvent::new(
                    "transformation:completed",
                    execution.id,
                    json!({
                        "dataset_id": dataset.id.to_string(),
                        "row_count": dataset.metadata.row_count,
                    }),
                ));

                tracing::info!(
                    execution_id = %execution.id,
                    dataset_id = %dataset.id,
                    "Transformation completed"
                );

                Ok(TransformOutcome { dataset, execution })
            }
            Err(e) => {
                execution.fail(e.to_string());
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["transformation", "failed"])
                    .inc();
                self.events.emit(PipelineEvent::new(
                    "transformation:failed",
                    execution.id,
                    json!({"error": e.to_string()}),
                ));
                tracing::error!(execution_id = %execution.id, error = %e, "Transformation failed");
                Err(e)
            }
        }
    }

    async fn run_rules(
        &self,
        execution: &mut PipelineExecution,
        dataset: Dataset,
        rules: Vec<TransformRule>,
        options: &TransformOptions,
    ) -> Result<Dataset> {
        let rules = sort_rules(rules);
        let total = rules.len() as u64;

        let mut target = if options.in_place {
            dataset
        } else {
            derive_dataset(&dataset)
        };

        let mut rows = target.rows.clone().unwrap_or_default();

        for (index, rule) in rules.iter().enumerate() {
            let stage_name = format!("transform-{}", rule.rule_type());
            let input = std::mem::take(&mut rows);
            let transforms = &self.transforms;
            rows = run_stage(&self.tracker, execution, &stage_name, || async move {
                apply_rule(input, rule, transforms).await
            })
            .await?;

            if options.in_place {
                // Applied effects stay visible even if a later rule fails.
                refresh_rows(&mut target, rows.clone());
                let _ = self.store.update(target.clone());
            }

            execution.set_progress(index as u64 + 1, total, None);
            self.tracker.update(execution.clone()).await;
            self.events.emit(PipelineEvent::new(
                "transformation:progress",
                execution.id,
                json!({
                    "current": index + 1,
                    "total": total,
                    "rule": rule.rule_type(),
                }),
            ));
        }

        refresh_rows(&mut target, rows);
        if options.in_place {
            let _ = self.store.update(target.clone());
        } else {
            self.store.register(target.clone())?;
        }

        Ok(target)
    }
}

/// Derive a new dataset from `original` with a fresh id, a
/// derivation-marked name, and the `transformed` tag appended.
fn derive_dataset(original: &Dataset) -> Dataset {
    let mut derived = Dataset::builder(format!("{} (transformed)", original.name))
        .source(original.source.clone())
        .format(original.format.clone())
        .build();
    derived.schema = original.schema.clone();
    derived.rows = original.rows.clone();
    derived.metadata.row_count = original.metadata.row_count;
    derived.metadata.tags = original.metadata.tags.clone();
    derived.metadata.tags.push("transformed".to_string());
    derived
}

/// Write rows back to a dataset, recomputing count, size, and checksum.
fn refresh_rows(dataset: &mut Dataset, rows: Vec<Row>) {
    dataset.metadata.size_bytes = serialized_size(&rows);
    dataset.metadata.checksum = Some(fingerprint_rows(&rows));
    dataset.set_rows(rows);
}

/// Apply one rule to a row set.
async fn apply_rule(
    rows: Vec<Row>,
    rule: &TransformRule,
    transforms: &TransformRegistry,
) -> Result<Vec<Row>> {
    match &rule.kind {
        RuleKind::Map { operations } => Ok(rows
            .into_iter()
            .map(|row| apply_map_ops(row, operations))
            .collect()),
        RuleKind::Filter { predicate } => Ok(rows
            .into_iter()
            .filter(|row| matches_predicate(row, predicate))
            .collect()),
        RuleKind::Aggregate { config }
        | RuleKind::Join { config }
        | RuleKind::Pivot { config }
        | RuleKind::Custom { config, .. } => {
            let transform = transforms.lookup(rule)?;
            transform.apply(rows, config).await
        }
    }
}

/// Apply map operations to one row, 1:1.
fn apply_map_ops(mut row: Row, operations: &[MapOp]) -> Row {
    for op in operations {
        match op {
            MapOp::Rename { from, to } => {
                if let Some(value) = row.remove(from) {
                    row.insert(to.clone(), value);
                }
            }
            MapOp::Copy { from, to } => {
                if let Some(value) = row.get(from).cloned() {
                    row.insert(to.clone(), value);
                }
            }
            MapOp::Drop { field } => {
                row.remove(field);
            }
            MapOp::SetConst { field, value } => {
                row.insert(field.clone(), value.clone());
            }
        }
    }
    row
}

/// Evaluate a filter predicate against one row.
fn matches_predicate(row: &Row, predicate: &Predicate) -> bool {
    let field_value = row.get(&predicate.field);

    match predicate.op {
        CompareOp::Exists => return matches!(field_value, Some(v) if !v.is_null()),
        _ => {}
    }

    let Some(value) = field_value else {
        return false;
    };

    match predicate.op {
        CompareOp::Eq => json_eq(value, &predicate.value),
        CompareOp::Ne => !json_eq(value, &predicate.value),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            match (value.as_f64(), predicate.value.as_f64()) {
                (Some(lhs), Some(rhs)) => match predicate.op {
                    CompareOp::Gt => lhs > rhs,
                    CompareOp::Gte => lhs >= rhs,
                    CompareOp::Lt => lhs < rhs,
                    CompareOp::Lte => lhs <= rhs,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
        CompareOp::Contains => match (value.as_str(), predicate.value.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        CompareOp::Exists => unreachable!(),
    }
}

/// Value equality with numeric coercion, so 1 == 1.0.
fn json_eq(lhs: &serde_json::Value, rhs: &serde_json::Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => lhs == rhs,
    }
}
