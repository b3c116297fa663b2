//! Transform rule definitions
//!
//! A transform rule is an ordered, typed instruction for reshaping dataset
//! rows. Rule configuration is a closed tagged union validated at
//! construction, so a malformed rule is rejected before a pipeline ever
//! runs it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a transform rule
#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("Invalid rule: {0}")]
    Invalid(String),
}

/// One field-level operation inside a map rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapOp {
    /// Rename a field, dropping the old name
    Rename { from: String, to: String },

    /// Copy a field's value under an additional name
    Copy { from: String, to: String },

    /// Remove a field
    Drop { field: String },

    /// Set a field to a constant value, overwriting any existing value
    SetConst {
        field: String,
        value: serde_json::Value,
    },
}

impl MapOp {
    fn validate(&self) -> Result<(), RuleError> {
        let empty = match self {
            MapOp::Rename { from, to } | MapOp::Copy { from, to } => {
                from.is_empty() || to.is_empty()
            }
            MapOp::Drop { field } | MapOp::SetConst { field, .. } => field.is_empty(),
        };
        if empty {
            return Err(RuleError::Invalid(
                "map operation references an empty field name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Comparison operator for filter predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String containment (both operands coerced to strings)
    Contains,
    /// Field is present and non-null; the predicate value is ignored
    Exists,
}

/// A single-field predicate for filter rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field the predicate inspects
    pub field: String,

    /// Comparison operator
    pub op: CompareOp,

    /// Right-hand operand
    pub value: serde_json::Value,
}

/// Typed configuration for a transform rule.
///
/// `Map` and `Filter` are executed by the engine itself. The remaining
/// variants only define the stage boundary; the row-level reshaping is
/// delegated to a registered collaborator keyed by the rule's type name
/// (or, for `Custom`, by the rule's own name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// 1:1 row transform built from field operations
    Map { operations: Vec<MapOp> },

    /// Order-preserving row subset
    Filter { predicate: Predicate },

    /// Grouped aggregation, delegated to a collaborator
    Aggregate { config: serde_json::Value },

    /// Join against another row set, delegated to a collaborator
    Join { config: serde_json::Value },

    /// Row-to-column pivot, delegated to a collaborator
    Pivot { config: serde_json::Value },

    /// User-defined transform, delegated to a named collaborator
    Custom {
        name: String,
        config: serde_json::Value,
    },
}

impl RuleKind {
    /// Get the rule type name for stage names, metrics, and logging
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::Map { .. } => "map",
            RuleKind::Filter { .. } => "filter",
            RuleKind::Aggregate { .. } => "aggregate",
            RuleKind::Join { .. } => "join",
            RuleKind::Pivot { .. } => "pivot",
            RuleKind::Custom { .. } => "custom",
        }
    }

    /// True if the engine executes this rule itself rather than
    /// delegating to a collaborator
    pub fn is_builtin(&self) -> bool {
        matches!(self, RuleKind::Map { .. } | RuleKind::Filter { .. })
    }
}

/// An ordered, typed instruction for reshaping dataset rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    /// Rule configuration
    pub kind: RuleKind,

    /// Position in the rule chain; ties are broken by original sequence
    pub order: i32,
}

impl TransformRule {
    /// Construct a rule, validating its configuration.
    ///
    /// Rejects empty map operation lists, operations or predicates that
    /// reference empty field names, and custom rules without a name.
    pub fn new(kind: RuleKind, order: i32) -> Result<Self, RuleError> {
        match &kind {
            RuleKind::Map { operations } => {
                if operations.is_empty() {
                    return Err(RuleError::Invalid(
                        "map rule has no operations".to_string(),
                    ));
                }
                for op in operations {
                    op.validate()?;
                }
            }
            RuleKind::Filter { predicate } => {
                if predicate.field.is_empty() {
                    return Err(RuleError::Invalid(
                        "filter predicate references an empty field name".to_string(),
                    ));
                }
            }
            RuleKind::Custom { name, .. } => {
                if name.is_empty() {
                    return Err(RuleError::Invalid("custom rule has no name".to_string()));
                }
            }
            RuleKind::Aggregate { .. } | RuleKind::Join { .. } | RuleKind::Pivot { .. } => {}
        }
        Ok(Self { kind, order })
    }

    /// Get the rule type name
    pub fn rule_type(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Sort rules by `order`, preserving original sequence among equal orders.
pub fn sort_rules(mut rules: Vec<TransformRule>) -> Vec<TransformRule> {
    rules.sort_by_key(|r| r.order);
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_rule_validation() {
        let ok = TransformRule::new(
            RuleKind::Map {
                operations: vec![MapOp::Rename {
                    from: "a".to_string(),
                    to: "b".to_string(),
                }],
            },
            1,
        );
        assert!(ok.is_ok());

        let empty_ops = TransformRule::new(RuleKind::Map { operations: vec![] }, 1);
        assert!(matches!(empty_ops, Err(RuleError::Invalid(_))));

        let empty_field = TransformRule::new(
            RuleKind::Map {
                operations: vec![MapOp::Drop {
                    field: String::new(),
                }],
            },
            1,
        );
        assert!(empty_field.is_err());
    }

    #[test]
    fn test_filter_rule_validation() {
        let bad = TransformRule::new(
            RuleKind::Filter {
                predicate: Predicate {
                    field: String::new(),
                    op: CompareOp::Eq,
                    value: json!(1),
                },
            },
            0,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_custom_rule_requires_name() {
        let bad = TransformRule::new(
            RuleKind::Custom {
                name: String::new(),
                config: json!({}),
            },
            0,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(
            RuleKind::Map { operations: vec![] }.type_name(),
            "map"
        );
        assert_eq!(
            RuleKind::Aggregate { config: json!({}) }.type_name(),
            "aggregate"
        );
        assert_eq!(
            RuleKind::Custom {
                name: "dedupe".to_string(),
                config: json!({})
            }
            .type_name(),
            "custom"
        );
    }

    #[test]
    fn test_sort_rules_by_order() {
        let filter = TransformRule::new(
            RuleKind::Filter {
                predicate: Predicate {
                    field: "a".to_string(),
                    op: CompareOp::Exists,
                    value: serde_json::Value::Null,
                },
            },
            2,
        )
        .unwrap();
        let map = TransformRule::new(
            RuleKind::Map {
                operations: vec![MapOp::Drop {
                    field: "b".to_string(),
                }],
            },
            1,
        )
        .unwrap();

        let sorted = sort_rules(vec![filter, map]);
        assert_eq!(sorted[0].rule_type(), "map");
        assert_eq!(sorted[1].rule_type(), "filter");
    }

    #[test]
    fn test_sort_rules_stable_on_ties() {
        let mk = |name: &str| {
            TransformRule::new(
                RuleKind::Custom {
                    name: name.to_string(),
                    config: json!({}),
                },
                5,
            )
            .unwrap()
        };
        let sorted = sort_rules(vec![mk("first"), mk("second"), mk("third")]);
        let names: Vec<_> = sorted
            .iter()
            .map(|r| match &r.kind {
                RuleKind::Custom { name, .. } => name.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rule_serialization() {
        let rule = TransformRule::new(
            RuleKind::Filter {
                predicate: Predicate {
                    field: "status".to_string(),
                    op: CompareOp::Eq,
                    value: json!("active"),
                },
            },
            3,
        )
        .unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        let back: TransformRule = serde_json::from_str(&json).unwrap();
        assert_eq!(rule, back);
    }
}
