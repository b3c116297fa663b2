//! Shorthand constructors for rules and schemas

use serde_json::Value;

use strata_core::{
    CompareOp, ErrorPolicy, MapOp, Predicate, RuleKind, RuleSeverity, TransformRule,
    ValidationKind, ValidationRule, ValidationSchema,
};

/// A map rule renaming one field
pub fn rename_rule(order: i32, from: &str, to: &str) -> TransformRule {
    TransformRule::new(
        RuleKind::Map {
            operations: vec![MapOp::Rename {
                from: from.to_string(),
                to: to.to_string(),
            }],
        },
        order,
    )
    .expect("valid map rule")
}

/// A map rule setting a constant field
pub fn set_const_rule(order: i32, field: &str, value: Value) -> TransformRule {
    TransformRule::new(
        RuleKind::Map {
            operations: vec![MapOp::SetConst {
                field: field.to_string(),
                value,
            }],
        },
        order,
    )
    .expect("valid map rule")
}

/// A filter rule comparing one field
pub fn filter_rule(order: i32, field: &str, op: CompareOp, value: Value) -> TransformRule {
    TransformRule::new(
        RuleKind::Filter {
            predicate: Predicate {
                field: field.to_string(),
                op,
                value,
            },
        },
        order,
    )
    .expect("valid filter rule")
}

/// A custom rule delegating to a named collaborator
pub fn custom_rule(order: i32, name: &str) -> TransformRule {
    TransformRule::new(
        RuleKind::Custom {
            name: name.to_string(),
            config: Value::Null,
        },
        order,
    )
    .expect("valid custom rule")
}

/// An error-severity required-field rule
pub fn required_rule(field: &str) -> ValidationRule {
    ValidationRule::new(field, ValidationKind::Required)
}

/// A warning-severity max-length rule
pub fn max_length_warning(field: &str, length: usize) -> ValidationRule {
    ValidationRule::new(field, ValidationKind::MaxLength { length })
        .with_severity(RuleSeverity::Warning)
}

/// A schema with one required-field rule under the given policy
pub fn required_schema(field: &str, policy: ErrorPolicy) -> ValidationSchema {
    ValidationSchema::new(vec![required_rule(field)]).with_policy(policy)
}
