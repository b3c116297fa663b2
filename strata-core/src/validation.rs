//! Validation rule and report definitions
//!
//! A validation schema is a rule set plus a policy governing how scanning
//! reacts to violations. Rules are data; the runtime's validation engine
//! evaluates them row by row and assembles the report types defined here.

use serde::{Deserialize, Serialize};

use crate::dataset::FieldType;

/// Severity level for rule violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// Informational - collected but never affects row classification
    Info,

    /// Warning - collected prominently, row still counts as valid
    Warning,

    /// Error - marks the row invalid
    #[default]
    Error,
}

impl RuleSeverity {
    /// Returns true if a violation at this severity marks its row invalid
    pub fn is_blocking(&self) -> bool {
        matches!(self, RuleSeverity::Error)
    }
}

impl std::fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSeverity::Info => write!(f, "info"),
            RuleSeverity::Warning => write!(f, "warning"),
            RuleSeverity::Error => write!(f, "error"),
        }
    }
}

/// Typed configuration of a validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationKind {
    /// Field must be present (null is acceptable)
    Required,

    /// Field must be present and non-null
    NonNull,

    /// Field value must match the expected primitive type
    FieldType { expected: FieldType },

    /// Numeric field value must lie within the given bounds (inclusive)
    Range { min: Option<f64>, max: Option<f64> },

    /// String field value must match a regular expression
    Pattern { pattern: String },

    /// Field value must be one of a predefined set
    AcceptedValues { values: Vec<serde_json::Value> },

    /// String field value must have at least this many characters
    MinLength { length: usize },

    /// String field value must have at most this many characters
    MaxLength { length: usize },
}

impl ValidationKind {
    /// Get the rule type name for reports, metrics, and logging
    pub fn type_name(&self) -> &'static str {
        match self {
            ValidationKind::Required => "required",
            ValidationKind::NonNull => "non_null",
            ValidationKind::FieldType { .. } => "field_type",
            ValidationKind::Range { .. } => "range",
            ValidationKind::Pattern { .. } => "pattern",
            ValidationKind::AcceptedValues { .. } => "accepted_values",
            ValidationKind::MinLength { .. } => "min_length",
            ValidationKind::MaxLength { .. } => "max_length",
        }
    }
}

/// One rule applied to every scanned row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Field the rule inspects; rules without a field inspect the row as
    /// a whole
    pub field: Option<String>,

    /// Rule configuration
    pub kind: ValidationKind,

    /// Severity assigned to violations of this rule
    pub severity: RuleSeverity,
}

impl ValidationRule {
    /// Create an error-severity rule on a field
    pub fn new(field: impl Into<String>, kind: ValidationKind) -> Self {
        Self {
            field: Some(field.into()),
            kind,
            severity: RuleSeverity::default(),
        }
    }

    /// Set the rule severity
    pub fn with_severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Policy governing how the scan reacts to invalid rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Halt scanning at the first invalid row; the report is forced
    /// invalid and later rows are neither scanned nor counted
    Stop,

    /// Record the row invalid and continue to the end
    #[default]
    Skip,

    /// Identical scanning behavior to `Skip`; the distinction exists for
    /// how counts are surfaced to external observability
    Log,
}

/// A rule set plus the policy governing the scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSchema {
    /// Rules evaluated against each row
    pub rules: Vec<ValidationRule>,

    /// Scan reaction policy
    pub error_handling: ErrorPolicy,

    /// Error budget: when set (and the policy is not `Stop`), the report
    /// is valid as long as the error count does not exceed it
    pub max_errors: Option<usize>,
}

impl ValidationSchema {
    /// Create a schema with the default (`Skip`) policy
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self {
            rules,
            error_handling: ErrorPolicy::default(),
            max_errors: None,
        }
    }

    /// Set the error-handling policy
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_handling = policy;
        self
    }

    /// Set the error budget
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = Some(max_errors);
        self
    }
}

/// One recorded rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Index of the offending row in scan order
    pub row_index: usize,

    /// Field the violated rule inspected, if any
    pub field: Option<String>,

    /// Type name of the violated rule
    pub rule_type: String,

    /// Severity of the violation
    pub severity: RuleSeverity,

    /// Human-readable description
    pub message: String,
}

/// Aggregate counts for a validation scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// The dataset's declared row count at call time, regardless of an
    /// early stop
    pub total_records: u64,

    /// Rows scanned with no error-severity violation
    pub valid_records: u64,

    /// Rows with at least one error-severity violation
    pub invalid_records: u64,

    /// Rows not scanned because the policy halted early
    pub skipped_records: u64,
}

/// Result of validating a dataset against a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Overall verdict under the schema's policy and error budget
    pub valid: bool,

    /// Error-severity violations in scan order
    pub errors: Vec<Violation>,

    /// Warning- and info-severity violations in scan order
    pub warnings: Vec<Violation>,

    /// Aggregate counts
    pub summary: ValidationSummary,
}

impl ValidationReport {
    /// An empty passing report for a dataset with the given row count
    pub fn passing(total_records: u64) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            summary: ValidationSummary {
                total_records,
                valid_records: total_records,
                invalid_records: 0,
                skipped_records: 0,
            },
        }
    }

    /// Record a violation, routing it by severity
    pub fn add_violation(&mut self, violation: Violation) {
        if violation.severity.is_blocking() {
            self.errors.push(violation);
        } else {
            self.warnings.push(violation);
        }
    }
}
