//! Dataset definitions and descriptors
//!
//! A dataset is a materialized, identifiable unit of record data moving
//! through the pipeline. This module provides the dataset record itself
//! plus the provenance and shape descriptors attached to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single record row: a JSON object keyed by field name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub Uuid);

impl DatasetId {
    /// Create a new random dataset ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DatasetId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Kind of system a dataset originates from.
///
/// This is a descriptor only; the connector that actually talks to the
/// system is resolved by the runtime at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Records supplied inline with the request
    Inline,

    /// A file on a local or mounted filesystem
    File,

    /// An HTTP endpoint
    Http,

    /// A database table or query
    Database,
}

/// Provenance descriptor for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// Kind of source system
    pub kind: SourceKind,

    /// Human-readable source name
    pub name: String,

    /// Location within the source system (path, URL, table), if any
    pub uri: Option<String>,

    /// Connector-specific options, passed through opaquely
    pub options: serde_json::Value,
}

impl DataSource {
    /// Create a source descriptor with no URI or options
    pub fn new(kind: SourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            uri: None,
            options: serde_json::Value::Null,
        }
    }

    /// Set the source URI
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set connector-specific options
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// Wire format of raw source payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataFormat {
    /// A JSON array of objects
    Json,

    /// One JSON object per line
    JsonLines,

    /// Delimiter-separated values
    Csv {
        /// Field delimiter byte
        delimiter: u8,
        /// Whether the first record is a header row
        has_header: bool,
    },
}

impl DataFormat {
    /// Comma-separated values with a header row
    pub fn csv() -> Self {
        Self::Csv {
            delimiter: b',',
            has_header: true,
        }
    }

    /// Format name for logging and events
    pub fn format_name(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::JsonLines => "json_lines",
            DataFormat::Csv { .. } => "csv",
        }
    }
}

/// Primitive type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    Null,
}

impl FieldType {
    /// Classify a JSON value
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldType::Null,
            serde_json::Value::Bool(_) => FieldType::Boolean,
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Integer,
            serde_json::Value::Number(_) => FieldType::Float,
            serde_json::Value::String(_) => FieldType::String,
            serde_json::Value::Array(_) => FieldType::Array,
            serde_json::Value::Object(_) => FieldType::Object,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Null => "null",
        };
        write!(f, "{}", name)
    }
}

/// One named field in a dataset schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name
    pub name: String,

    /// Field type
    pub field_type: FieldType,

    /// Whether the field may be null or absent
    pub nullable: bool,
}

/// Shape descriptor for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    /// Ordered field definitions
    pub fields: Vec<SchemaField>,

    /// Whether this schema was inferred from data rather than declared
    pub inferred: bool,
}

impl DataSchema {
    /// Infer a schema from a sample of rows.
    ///
    /// Field order follows the first row; a field is nullable if any
    /// sampled row lacks it or carries an explicit null. Types come from
    /// the first non-null value seen for each field.
    pub fn infer(rows: &[Row]) -> Self {
        let mut fields: Vec<SchemaField> = Vec::new();

        if let Some(first) = rows.first() {
            for (name, value) in first {
                fields.push(SchemaField {
                    name: name.clone(),
                    field_type: FieldType::of(value),
                    nullable: value.is_null(),
                });
            }
        }

        for row in rows.iter().skip(1) {
            for field in fields.iter_mut() {
                match row.get(&field.name) {
                    None => field.nullable = true,
                    Some(serde_json::Value::Null) => field.nullable = true,
                    Some(value) => {
                        if field.field_type == FieldType::Null {
                            field.field_type = FieldType::of(value);
                        }
                    }
                }
            }
        }

        Self {
            fields,
            inferred: true,
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Metadata about a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Number of records in the dataset
    pub row_count: u64,

    /// Serialized size of the records in bytes
    pub size_bytes: u64,

    /// Deterministic fingerprint of the records, if computed
    pub checksum: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Tags for categorization
    pub tags: Vec<String>,
}

impl DatasetMetadata {
    fn empty() -> Self {
        let now = Utc::now();
        Self {
            row_count: 0,
            size_bytes: 0,
            checksum: None,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }
}

/// A dataset is a materialized, identifiable unit of record data.
///
/// Rows are either carried inline (`rows`) or referenced externally
/// (`location`). When rows are materialized, `metadata.row_count` always
/// equals `rows.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique identifier, immutable once assigned
    pub id: DatasetId,

    /// Human-readable name
    pub name: String,

    /// Provenance descriptor
    pub source: DataSource,

    /// Wire format the records were parsed from
    pub format: DataFormat,

    /// Shape descriptor, possibly inferred post-hoc
    pub schema: Option<DataSchema>,

    /// Dataset metadata
    pub metadata: DatasetMetadata,

    /// Materialized records, if held inline
    pub rows: Option<Vec<Row>>,

    /// External location reference, if records are not materialized
    pub location: Option<String>,
}

impl Dataset {
    /// Create an empty dataset with the given name, source, and format
    pub fn new(name: impl Into<String>, source: DataSource, format: DataFormat) -> Self {
        Self {
            id: DatasetId::new(),
            name: name.into(),
            source,
            format,
            schema: None,
            metadata: DatasetMetadata::empty(),
            rows: None,
            location: None,
        }
    }

    /// Create a builder for constructing a dataset with a fluent API
    pub fn builder(name: impl Into<String>) -> DatasetBuilder {
        DatasetBuilder::new(name)
    }

    /// Replace the materialized rows, keeping row count in sync
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.metadata.row_count = rows.len() as u64;
        self.rows = Some(rows);
        self.touch();
    }

    /// Update the dataset's updated_at timestamp
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }

    /// Number of materialized rows, or the declared count for external data
    pub fn row_count(&self) -> u64 {
        self.metadata.row_count
    }
}

/// Builder for constructing datasets with a fluent API
pub struct DatasetBuilder {
    name: String,
    source: DataSource,
    format: DataFormat,
    schema: Option<DataSchema>,
    rows: Option<Vec<Row>>,
    location: Option<String>,
    tags: Vec<String>,
}

impl DatasetBuilder {
    /// Create a new dataset builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: DataSource::new(SourceKind::Inline, "inline"),
            format: DataFormat::Json,
            schema: None,
            rows: None,
            location: None,
            tags: Vec::new(),
        }
    }

    /// Set the source descriptor
    pub fn source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    /// Set the data format
    pub fn format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    /// Set a declared schema
    pub fn schema(mut self, schema: DataSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the materialized rows
    pub fn rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Set an external location reference
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Build the dataset
    pub fn build(self) -> Dataset {
        let now = Utc::now();
        let row_count = self.rows.as_ref().map(|r| r.len() as u64).unwrap_or(0);
        Dataset {
            id: DatasetId::new(),
            name: self.name,
            source: self.source,
            format: self.format,
            schema: self.schema,
            metadata: DatasetMetadata {
                row_count,
                size_bytes: 0,
                checksum: None,
                created_at: now,
                updated_at: now,
                tags: self.tags,
            },
            rows: self.rows,
            location: self.location,
        }
    }
}
