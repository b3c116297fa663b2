//! Ingestion pipeline
//!
//! Runs connect → read → parse → infer-schema against a source
//! connector, producing a fresh dataset registered in the dataset store.
//! The schema is always inferred from the parsed rows, even when the
//! caller declared one on the source side.

use std::sync::Arc;

use serde_json::json;

use strata_core::{
    fingerprint_rows, serialized_size, DataFormat, DataSchema, DataSource, Dataset, DatasetStore,
    PipelineExecution, PipelineKind, Row,
};

use crate::audit::{self, ActionLog, ActionRecord};
use crate::connector::ConnectorProvider;
use crate::events::{EventBus, PipelineEvent};
use crate::metrics::{PIPELINE_EXECUTIONS_TOTAL, ROWS_PROCESSED_TOTAL};
use crate::stage::run_stage;
use crate::tracker::ExecutionTracker;
use crate::{Error, Result};

/// Options for an ingestion call
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Name for the produced dataset; defaults to the source name
    pub name: Option<String>,

    /// Declared schema. The produced dataset always carries the schema
    /// inferred from the parsed rows; a declared schema is accepted but
    /// never trusted over inference.
    pub schema: Option<DataSchema>,

    /// Reserved batching hint, accepted for interface parity; parsing is
    /// single-pass
    pub batch_size: Option<usize>,

    /// Accepted for interface parity; stages within one ingestion run
    /// strictly sequentially
    pub parallel: bool,
}

/// Result of a successful ingestion call
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The registered dataset
    pub dataset: Dataset,

    /// Final execution record
    pub execution: PipelineExecution,
}

/// Staged ingestion workflow
#[derive(Clone)]
pub struct IngestionPipeline {
    store: DatasetStore,
    tracker: ExecutionTracker,
    events: EventBus,
    audit: Arc<dyn ActionLog>,
    provider: Arc<dyn ConnectorProvider>,
}

impl IngestionPipeline {
    pub fn new(
        store: DatasetStore,
        tracker: ExecutionTracker,
        events: EventBus,
        audit: Arc<dyn ActionLog>,
        provider: Arc<dyn ConnectorProvider>,
    ) -> Self {
        Self {
            store,
            tracker,
            events,
            audit,
            provider,
        }
    }

    /// Ingest a dataset from a source.
    ///
    /// On success the dataset is registered in the store and an
    /// `ingestion:completed` event fires. On any stage failure the
    /// execution is marked failed, `ingestion:failed` fires, the error
    /// propagates, and nothing is registered. The execution is evicted
    /// from the tracker on every exit path.
    #[tracing::instrument(
        name = "ingestion.ingest",
        skip(self, source, format, options),
        fields(source = %source.name, format = format.format_name())
    )]
    pub async fn ingest(
        &self,
        source: DataSource,
        format: DataFormat,
        options: IngestOptions,
    ) -> Result<IngestOutcome> {
        let mut execution = PipelineExecution::start(PipelineKind::Ingestion);
        self.tracker.insert(execution.clone()).await;
        self.events.emit(PipelineEvent::new(
            "ingestion:started",
            execution.id,
            json!({
                "source": source.name,
                "format": format.format_name(),
            }),
        ));

        let result = self
            .run_stages(&mut execution, &source, &format, &options)
            .await;

        match result {
            Ok(dataset) => {
                execution.result = Some(json!({
                    "dataset_id": dataset.id.to_string(),
                    "row_count": dataset.metadata.row_count,
                }));
                execution.set_progress(4, 4, None);
                execution.complete();
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["ingestion", "completed"])
                    .inc();
                ROWS_PROCESSED_TOTAL
                    .with_label_values(&["ingestion"])
                    .inc_by(dataset.metadata.row_count);

                self.events.emit(PipelineEvent::new(
                    "ingestion:completed",
                    execution.id,
                    json!({
                        "dataset_id": dataset.id.to_string(),
                        "row_count": dataset.metadata.row_count,
                        "size_bytes": dataset.metadata.size_bytes,
                    }),
                ));

                audit::record_swallowing(
                    &self.audit,
                    ActionRecord::write_success(
                        "dataset-store",
                        dataset.id.to_string(),
                        format!("{} rows ingested from {}", dataset.metadata.row_count, source.name),
                        "dataset registered",
                    ),
                )
                .await;

                tracing::info!(
                    execution_id = %execution.id,
                    dataset_id = %dataset.id,
                    row_count = dataset.metadata.row_count,
                    "Ingestion completed"
                );

                Ok(IngestOutcome { dataset, execution })
            }
            Err(e) => {
                execution.fail(e.to_string());
                self.tracker.remove(execution.id).await;
                PIPELINE_EXECUTIONS_TOTAL
                    .with_label_values(&["ingestion", "failed"])
                    .inc();
                self.events.emit(PipelineEvent::new(
                    "ingestion:failed",
                    execution.id,
                    json!({"error": e.to_string()}),
                ));
                tracing::error!(execution_id = %execution.id, error = %e, "Ingestion failed");
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        execution: &mut PipelineExecution,
        source: &DataSource,
        format: &DataFormat,
        options: &IngestOptions,
    ) -> Result<Dataset> {
        let connector = self.provider.source_for(source)?;

        execution.progress.total = 4;

        run_stage(&self.tracker, execution, "connect", || connector.connect()).await?;
        execution.progress.current = 1;

        let raw = run_stage(&self.tracker, execution, "read", || connector.read()).await?;
        execution.progress.current = 2;

        let format_for_parse = format.clone();
        let rows = run_stage(&self.tracker, execution, "parse", || async move {
            parse_rows(&raw, &format_for_parse)
        })
        .await?;
        execution.progress.current = 3;

        if options.schema.is_some() {
            tracing::debug!(
                execution_id = %execution.id,
                "Declared schema present; schema is still inferred from parsed rows"
            );
        }
        let rows_for_infer = rows.clone();
        let schema = run_stage(&self.tracker, execution, "infer-schema", || async move {
            Ok(DataSchema::infer(&rows_for_infer))
        })
        .await?;
        execution.progress.current = 4;

        let name = options
            .name
            .clone()
            .unwrap_or_else(|| source.name.clone());
        let mut dataset = Dataset::new(name, source.clone(), format.clone());
        dataset.metadata.size_bytes = serialized_size(&rows);
        dataset.metadata.checksum = Some(fingerprint_rows(&rows));
        dataset.schema = Some(schema);
        dataset.set_rows(rows);

        self.store.register(dataset.clone())?;

        Ok(dataset)
    }
}

/// Parse a raw payload into rows according to the declared format.
pub fn parse_rows(raw: &[u8], format: &DataFormat) -> Result<Vec<Row>> {
    match format {
        DataFormat::Json => {
            let value: serde_json::Value = serde_json::from_slice(raw)
                .map_err(|e| Error::Parse(format!("invalid JSON payload: {}", e)))?;
            let items = value
                .as_array()
                .ok_or_else(|| Error::Parse("JSON payload is not an array".to_string()))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_object().cloned().ok_or_else(|| {
                        Error::Parse(format!("JSON element {} is not an object", i))
                    })
                })
                .collect()
        }
        DataFormat::JsonLines => {
            let text = std::str::from_utf8(raw)
                .map_err(|e| Error::Parse(format!("payload is not valid UTF-8: {}", e)))?;
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    let value: serde_json::Value = serde_json::from_str(line)
                        .map_err(|e| Error::Parse(format!("invalid JSON on line {}: {}", i + 1, e)))?;
                    value
                        .as_object()
                        .cloned()
                        .ok_or_else(|| Error::Parse(format!("line {} is not an object", i + 1)))
                })
                .collect()
        }
        DataFormat::Csv {
            delimiter,
            has_header,
        } => {
            let mut reader = csv::ReaderBuilder::new()
                .delimiter(*delimiter)
                .has_headers(*has_header)
                .flexible(false)
                .from_reader(raw);

            let headers: Vec<String> = if *has_header {
                reader
                    .headers()
                    .map_err(|e| Error::Parse(format!("invalid CSV header: {}", e)))?
                    .iter()
                    .map(|h| h.to_string())
                    .collect()
            } else {
                Vec::new()
            };

            let mut rows = Vec::new();
            for (i, record) in reader.records().enumerate() {
                let record =
                    record.map_err(|e| Error::Parse(format!("invalid CSV record {}: {}", i + 1, e)))?;
                let mut row = Row::new();
                for (j, field) in record.iter().enumerate() {
                    let key = headers
                        .get(j)
                        .cloned()
                        .unwrap_or_else(|| format!("field_{}", j));
                    row.insert(key, csv_value(field));
                }
                rows.push(row);
            }
            Ok(rows)
        }
    }
}

/// Interpret a CSV field as the narrowest JSON value it parses to.
fn csv_value(field: &str) -> serde_json::Value {
    if field.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    match field {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let raw = br#"[{"id": 1}, {"id": 2}, {"id": 3}]"#;
        let rows = parse_rows(raw, &DataFormat::Json).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["id"], 1);
    }

    #[test]
    fn test_parse_json_rejects_non_array() {
        let raw = br#"{"id": 1}"#;
        assert!(matches!(
            parse_rows(raw, &DataFormat::Json),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_parse_json_rejects_non_object_element() {
        let raw = br#"[{"id": 1}, 42]"#;
        assert!(parse_rows(raw, &DataFormat::Json).is_err());
    }

    #[test]
    fn test_parse_json_lines() {
        let raw = b"{\"a\": 1}\n\n{\"a\": 2}\n";
        let rows = parse_rows(raw, &DataFormat::JsonLines).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], 2);
    }

    #[test]
    fn test_parse_csv_with_header() {
        let raw = b"id,name,active\n1,alice,true\n2,bob,false\n";
        let rows = parse_rows(raw, &DataFormat::csv()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["name"], "alice");
        assert_eq!(rows[0]["active"], true);
    }

    #[test]
    fn test_parse_csv_without_header() {
        let raw = b"1;x\n2;y\n";
        let format = DataFormat::Csv {
            delimiter: b';',
            has_header: false,
        };
        let rows = parse_rows(raw, &format).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["field_0"], 1);
        assert_eq!(rows[1]["field_1"], "y");
    }

    #[test]
    fn test_csv_value_typing() {
        assert_eq!(csv_value("7"), serde_json::Value::from(7));
        assert_eq!(csv_value("7.5"), serde_json::Value::from(7.5));
        assert_eq!(csv_value("true"), serde_json::Value::Bool(true));
        assert_eq!(csv_value(""), serde_json::Value::Null);
        assert_eq!(
            csv_value("plain"),
            serde_json::Value::String("plain".to_string())
        );
    }
}
