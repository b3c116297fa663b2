//! Validation engine
//!
//! Scans a dataset's rows in index order, evaluating every schema rule
//! against each row. Violations are first-class data, never exceptions:
//! a rule that cannot be evaluated yields an error-severity violation
//! instead of aborting the scan. The schema's policy governs whether the
//! scan halts at the first invalid row or continues to the end.

use serde_json::json;

use strata_core::{
    Dataset, ErrorPolicy, FieldType, PipelineExecution, PipelineKind, Row, RuleSeverity,
    ValidationKind, ValidationReport, ValidationRule, ValidationSchema, ValidationSummary,
    Violation,
};

use crate::events::{EventBus, PipelineEvent};
use crate::metrics::{PIPELINE_EXECUTIONS_TOTAL, ROWS_PROCESSED_TOTAL};
use crate::stage::run_stage;
use crate::tracker::ExecutionTracker;
use crate::{Error, Result};

/// How often a progress event is emitted during the scan, in rows
const PROGRESS_INTERVAL: usize = 100;

/// Result of a validation call
#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    /// The assembled report
    pub report: ValidationReport,

    /// Final execution record
    pub execution: PipelineExecution,
}

/// Row-scanning validation workflow
#[derive(Clone)]
pub struct ValidationEngine {
    tracker: ExecutionTracker,
    events: EventBus,
}

impl ValidationEngine {
    pub fn new(tracker: ExecutionTracker, events: EventBus) -> Self {
        Self { tracker, events }
    }

    /// Validate a dataset against a schema.
    ///
    /// An invalid report is a normal result; only an engine failure
    /// (e.g. a dataset without materialized rows) propagates as an
    /// error.
    #[tracing::instrument(
        name = "validation.validate",
        skip(self, dataset, schema),
        fields(dataset_id = %dataset.id, rules = schema.rules.len(), policy = ?schema.error_handling)
    )]
    pub async fn validate(
        &self,
        dataset: &Dataset,
        schema: &ValidationSchema,
    ) -> Result<ValidateOutcome> {
        let mut execution = PipelineExecution::start(PipelineKind::Validation);
        execution.progress.total = dataset.metadata.row_count;
        self.tracker.insert(execution.clone()).await;
        self.events.emit(PipelineEvent::new(
            "validation:started",
            execution.id,
            json!({
                "dataset_id": dataset.id.to_string(),
                "row_count": dataset.metadata.row_count,
                "rules": schema.rules.len(),
            }),
        ));

        let result = self.run_scan(&mut execution, dataset, schema).await;

        match result {
            Ok(report) => {
                execution.result = Some(json!({
                    "valid": report.valid,
                    "errors": report.errors.len(),
                    "warnings": report.warnings.len(),
                }));
                execution.complete();
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["validation", "completed"])
                    .inc();
                ROWS_PROCESSED_TOTAL
                    .with_label_values(&["validation"])
                    .inc_by(report.summary.valid_records + report.summary.invalid_records);

                self.events.emit(PipelineEvent::new(
                    "validation:completed",
                    execution.id,
                    json!({
                        "dataset_id": dataset.id.to_string(),
                        "valid": report.valid,
                        "errors": report.errors.len(),
                        "warnings": report.warnings.len(),
                    }),
                ));

                tracing::info!(
                    execution_id = %execution.id,
                    valid = report.valid,
                    errors = report.errors.len(),
                    "Validation completed"
                );

                Ok(ValidateOutcome { report, execution })
            }
            Err(e) => {
                execution.fail(e.to_string());
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["validation", "failed"])
                    .inc();
                self.events.emit(PipelineEvent::new(
                    "validation:failed",
                    execution.id,
                    json!({"error": e.to_string()}),
                ));
                tracing::error!(execution_id = %execution.id, error = %e, "Validation failed");
                Err(e)
            }
        }
    }

    async fn run_scan(
        &self,
        execution: &mut PipelineExecution,
        dataset: &Dataset,
        schema: &ValidationSchema,
    ) -> Result<ValidationReport> {
        let rows = dataset.rows.as_deref().ok_or_else(|| {
            Error::Execution(format!(
                "dataset {} has no materialized rows to validate",
                dataset.id
            ))
        })?;
        let total_records = dataset.metadata.row_count;

        let events = &self.events;
        let execution_id = execution.id;
        let tracker = &self.tracker;
        run_stage(tracker, execution, "scan", || async move {
            Ok(scan_rows(rows, schema, total_records, |scanned| {
                events.emit(PipelineEvent::new(
                    "validation:progress",
                    execution_id,
                    json!({
                        "scanned": scanned,
                        "total": total_records,
                    }),
                ));
            }))
        })
        .await
    }
}

/// Scan rows against the schema, invoking `on_progress` at the
/// configured interval.
fn scan_rows(
    rows: &[Row],
    schema: &ValidationSchema,
    total_records: u64,
    mut on_progress: impl FnMut(usize),
) -> ValidationReport {
    let mut report = ValidationReport {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        summary: ValidationSummary {
            total_records,
            valid_records: 0,
            invalid_records: 0,
            skipped_records: 0,
        },
    };

    let mut scanned = 0usize;
    let mut stopped = false;

    for (index, row) in rows.iter().enumerate() {
        let mut row_invalid = false;

        for rule in &schema.rules {
            if let Some(violation) = evaluate_rule(rule, row, index) {
                if violation.severity.is_blocking() {
                    row_invalid = true;
                }
                report.add_violation(violation);
            }
        }

        scanned = index + 1;
        if row_invalid {
            report.summary.invalid_records += 1;
        } else {
            report.summary.valid_records += 1;
        }

        if scanned % PROGRESS_INTERVAL == 0 {
            on_progress(scanned);
        }

        if row_invalid && schema.error_handling == ErrorPolicy::Stop {
            stopped = true;
            break;
        }
    }

    report.summary.skipped_records = (rows.len() - scanned) as u64;

    report.valid = if stopped {
        false
    } else if report.errors.is_empty() {
        true
    } else {
        match schema.max_errors {
            // The error budget only applies when the scan ran to the end.
            Some(max) if schema.error_handling != ErrorPolicy::Stop => report.errors.len() <= max,
            _ => false,
        }
    };

    report
}

/// Evaluate one rule against one row, yielding zero or one violation.
fn evaluate_rule(rule: &ValidationRule, row: &Row, row_index: usize) -> Option<Violation> {
    let violation = |message: String| Violation {
        row_index,
        field: rule.field.clone(),
        rule_type: rule.kind.type_name().to_string(),
        severity: rule.severity,
        message,
    };

    let Some(field) = rule.field.as_deref() else {
        // Row-level rules need a field to inspect; treat a missing field
        // reference as an evaluation failure on the rule itself.
        return Some(Violation {
            severity: RuleSeverity::Error,
            ..violation("rule has no field to inspect".to_string())
        });
    };

    let value = row.get(field);

    match &rule.kind {
        ValidationKind::Required => {
            if value.is_none() {
                return Some(violation(format!("field '{}' is missing", field)));
            }
        }
        ValidationKind::NonNull => match value {
            None => return Some(violation(format!("field '{}' is missing", field))),
            Some(v) if v.is_null() => {
                return Some(violation(format!("field '{}' is null", field)))
            }
            _ => {}
        },
        ValidationKind::FieldType { expected } => {
            if let Some(v) = value {
                if !v.is_null() && !type_matches(v, *expected) {
                    return Some(violation(format!(
                        "field '{}' is {} but {} was expected",
                        field,
                        FieldType::of(v),
                        expected
                    )));
                }
            }
        }
        ValidationKind::Range { min, max } => {
            if let Some(v) = value {
                match v.as_f64() {
                    Some(n) => {
                        if min.map(|m| n < m).unwrap_or(false)
                            || max.map(|m| n > m).unwrap_or(false)
                        {
                            return Some(violation(format!(
                                "field '{}' value {} is out of range",
                                field, n
                            )));
                        }
                    }
                    None if !v.is_null() => {
                        return Some(violation(format!(
                            "field '{}' is not numeric",
                            field
                        )));
                    }
                    None => {}
                }
            }
        }
        ValidationKind::Pattern { pattern } => {
            if let Some(v) = value.and_then(|v| v.as_str()) {
                // A pattern that fails to compile is an evaluation
                // failure, captured as a violation rather than an abort.
                match regex::Regex::new(pattern) {
                    Ok(re) => {
                        if !re.is_match(v) {
                            return Some(violation(format!(
                                "field '{}' does not match pattern",
                                field
                            )));
                        }
                    }
                    Err(e) => {
                        return Some(Violation {
                            severity: RuleSeverity::Error,
                            ..violation(format!("invalid pattern: {}", e))
                        });
                    }
                }
            }
        }
        ValidationKind::AcceptedValues { values } => {
            if let Some(v) = value {
                if !v.is_null() && !values.contains(v) {
                    return Some(violation(format!(
                        "field '{}' has an unaccepted value",
                        field
                    )));
                }
            }
        }
        ValidationKind::MinLength { length } => {
            if let Some(s) = value.and_then(|v| v.as_str()) {
                if s.chars().count() < *length {
                    return Some(violation(format!(
                        "field '{}' is shorter than {}",
                        field, length
                    )));
                }
            }
        }
        ValidationKind::MaxLength { length } => {
            if let Some(s) = value.and_then(|v| v.as_str()) {
                if s.chars().count() > *length {
                    return Some(violation(format!(
                        "field '{}' is longer than {}",
                        field, length
                    )));
                }
            }
        }
    }

    None
}

fn type_matches(value: &serde_json::Value, expected: FieldType) -> bool {
    let actual = FieldType::of(value);
    if actual == expected {
        return true;
    }
    // An integer is acceptable where a float is expected.
    expected == FieldType::Float && actual == FieldType::Integer
}
