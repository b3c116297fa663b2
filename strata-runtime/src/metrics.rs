//! Prometheus metrics for pipeline operations

use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// Total number of pipeline executions by terminal status
    ///
    /// Labels:
    /// - pipeline: "ingestion", "transformation", "validation", "deployment"
    /// - status: "completed", "failed"
    pub static ref PIPELINE_EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "strata_pipeline_executions_total",
        "Total number of pipeline executions by terminal status",
        &["pipeline", "status"]
    )
    .expect("strata_pipeline_executions_total metric registration");

    /// Duration of individual stages in seconds
    ///
    /// Labels:
    /// - pipeline: owning pipeline kind
    /// - stage: stage name ("connect", "read", "parse", "transform-map", ...)
    pub static ref STAGE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "strata_stage_duration_seconds",
        "Duration of pipeline stages",
        &["pipeline", "stage"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .expect("strata_stage_duration_seconds metric registration");

    /// Rows moved through each pipeline
    ///
    /// Labels:
    /// - pipeline: pipeline kind that processed the rows
    pub static ref ROWS_PROCESSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "strata_rows_processed_total",
        "Rows moved through each pipeline",
        &["pipeline"]
    )
    .expect("strata_rows_processed_total metric registration");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Ensure all metrics are registered correctly by accessing them
        let _ = PIPELINE_EXECUTIONS_TOTAL.with_label_values(&["ingestion", "completed"]);
        let _ = STAGE_DURATION_SECONDS.with_label_values(&["ingestion", "parse"]);
        let _ = ROWS_PROCESSED_TOTAL.with_label_values(&["validation"]);
    }
}
