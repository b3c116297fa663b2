//! Pre-built test data

use serde_json::json;

use strata_core::{DataSource, Dataset, Row, SourceKind};

/// Convert a JSON object literal into a row
pub fn row(value: serde_json::Value) -> Row {
    value.as_object().expect("row literal must be an object").clone()
}

/// Three inline JSON records with id/name/amount fields
pub fn json_payload() -> Vec<u8> {
    br#"[
        {"id": 1, "name": "alpha", "amount": 10.5},
        {"id": 2, "name": "beta", "amount": 20.0},
        {"id": 3, "name": "gamma", "amount": 30.25}
    ]"#
    .to_vec()
}

/// The rows `json_payload` parses to
pub fn sample_rows() -> Vec<Row> {
    vec![
        row(json!({"id": 1, "name": "alpha", "amount": 10.5})),
        row(json!({"id": 2, "name": "beta", "amount": 20.0})),
        row(json!({"id": 3, "name": "gamma", "amount": 30.25})),
    ]
}

/// An inline source descriptor
pub fn inline_source() -> DataSource {
    DataSource::new(SourceKind::Inline, "test-source")
}

/// A dataset with materialized rows, not registered anywhere
pub fn dataset_with_rows(name: &str, rows: Vec<Row>) -> Dataset {
    Dataset::builder(name).source(inline_source()).rows(rows).build()
}

/// A dataset whose `count` rows all carry an `id` field
pub fn numbered_dataset(name: &str, count: usize) -> Dataset {
    let rows = (0..count).map(|i| row(json!({"id": i}))).collect();
    dataset_with_rows(name, rows)
}
