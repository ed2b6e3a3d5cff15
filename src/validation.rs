//! Schema validation helpers.
//!
//! Validates `serde_json::Value` configuration against a [`Schema`]: presence
//! of required attributes, value types, nested block cardinality, and the
//! static [`Validator`] constraints attached to attributes.
//!
//! # Example
//!
//! ```
//! use newrelic_provider::schema::{Attribute, Schema, Validator};
//! use newrelic_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "slo_period",
//!         Attribute::required_int64().with_validator(Validator::int_one_of(&[1, 7, 28])),
//!     );
//!
//! let diagnostics = validate(&schema, &json!({"name": "checkout", "slo_period": 7}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "checkout", "slo_period": 30}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("slo_period".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema, Validator,
};
use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Compiled `Validator::Matches` patterns, keyed by source.
static PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Compile `pattern` once and reuse it for every later check.
fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut patterns = PATTERNS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = patterns.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    patterns.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Attribute validators are checked once the type is correct
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
///
/// Returns `true` if valid, `false` otherwise.
/// Use [`validate`] to get detailed error information.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Null is valid for optional blocks, but we can't validate further
            return;
        },
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    // Validate attributes
    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        let attr_value = obj.get(name);
        validate_attribute(attr, attr_value, &attr_path, diagnostics);
    }

    // Validate nested blocks
    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        let block_value = obj.get(name);
        validate_nested_block(nested_block, block_value, &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Skip computed-only attributes (provider sets these)
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            // Check if required
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            // Optional attributes can be missing/null
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before && !attr.validators.is_empty() {
                check_validators(&attr.validators, v, path, diagnostics);
            }
        },
    }
}

fn check_validators(
    validators: &[Validator],
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Value::Array(items) = value {
        for (i, item) in items.iter().enumerate() {
            check_validators(validators, item, &format!("{}.{}", path, i), diagnostics);
        }
        return;
    }

    for validator in validators {
        if let Some(detail) = violation(validator, value) {
            diagnostics.push(
                Diagnostic::error("Invalid value")
                    .with_detail(detail)
                    .with_attribute(path),
            );
        }
    }
}

/// Describe how `value` violates `validator`, if it does.
fn violation(validator: &Validator, value: &Value) -> Option<String> {
    match validator {
        Validator::OneOf {
            values,
            ignore_case,
        } => {
            let s = value.as_str()?;
            let accepted = values.iter().any(|v| {
                if *ignore_case {
                    v.eq_ignore_ascii_case(s)
                } else {
                    v == s
                }
            });
            (!accepted).then(|| format!("expected one of [{}], got {:?}", values.join(", "), s))
        },
        Validator::IntOneOf { values } => {
            let n = as_whole_i64(value)?;
            (!values.contains(&n)).then(|| format!("expected one of {:?}, got {}", values, n))
        },
        Validator::IntBetween { min, max } => {
            let n = as_whole_i64(value)?;
            (n < *min || n > *max)
                .then(|| format!("expected to be in the range ({} - {}), got {}", min, max, n))
        },
        Validator::IntAtLeast { min } => {
            let n = as_whole_i64(value)?;
            (n < *min).then(|| format!("expected to be at least ({}), got {}", min, n))
        },
        Validator::FloatBetween { min, max } => {
            let n = value.as_f64()?;
            (n < *min || n > *max)
                .then(|| format!("expected to be in the range ({} - {}), got {}", min, max, n))
        },
        Validator::Matches { pattern, hint } => {
            let s = value.as_str()?;
            match compiled(pattern) {
                Ok(re) if re.is_match(s) => None,
                Ok(_) => Some(hint.clone()),
                Err(err) => Some(format!("invalid pattern {:?}: {}", pattern, err)),
            }
        },
        Validator::HasPrefix { prefix, hint } => {
            let s = value.as_str()?;
            (!s.starts_with(prefix.as_str())).then(|| hint.clone())
        },
        Validator::NotEmpty => {
            let s = value.as_str()?;
            s.trim().is_empty().then(|| "expected a non-empty value".to_string())
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            let kind = if matches!(attr_type, AttributeType::Set(_)) { "set" } else { "list" };
            match value.as_array() {
                Some(arr) => {
                    for (i, elem) in arr.iter().enumerate() {
                        let elem_path = format!("{}.{}", path, i);
                        validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                    }
                },
                None => diagnostics.push(type_error(path, kind, value)),
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match nested.nesting_mode {
        BlockNestingMode::Single => {
            validate_single_block(nested, value, path, diagnostics);
        },
        BlockNestingMode::List | BlockNestingMode::Set => {
            validate_list_block(nested, value, path, diagnostics);
        },
    }
}

fn validate_single_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail("At least one block is required")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
    }
}

fn validate_list_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            // Check min_items
            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // Check max_items (0 means unlimited)
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // Validate each block
            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integer value of a number with no fractional part, e.g. `30` or `30.0`.
fn as_whole_i64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then(|| f as i64)
}

fn is_int64(value: &Value) -> bool {
    as_whole_i64(value).is_some()
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    fn policy_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::NotEmpty),
            )
            .with_attribute("account_id", Attribute::optional_computed_int64())
            .with_attribute(
                "incident_preference",
                Attribute::optional_string().with_validator(Validator::one_of(&[
                    "PER_POLICY",
                    "PER_CONDITION",
                    "PER_CONDITION_AND_TARGET",
                ])),
            )
            .with_attribute("id", Attribute::computed_string())
    }

    #[test]
    fn test_validate_required_attribute() {
        let schema = policy_schema();

        assert!(validate(&schema, &json!({"name": "payments"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
        assert!(diagnostics[0].summary.contains("Missing required attribute"));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = policy_schema();
        let diagnostics = validate(&schema, &json!({"name": "payments", "id": 42}));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_types() {
        let schema = policy_schema();

        let diagnostics = validate(&schema, &json!({"name": 12}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));

        let diagnostics = validate(&schema, &json!({"name": "a", "account_id": 1.5}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("account_id"));

        assert!(validate(&schema, &json!({"name": "a", "account_id": 3.0})).is_empty());
    }

    #[test]
    fn test_one_of_validator() {
        let schema = policy_schema();

        let ok = json!({"name": "a", "incident_preference": "PER_CONDITION"});
        assert!(validate(&schema, &ok).is_empty());

        let bad = json!({"name": "a", "incident_preference": "per_condition"});
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid value");
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("PER_POLICY"));
    }

    #[test]
    fn test_one_of_ignore_case_validator() {
        let schema = Schema::v0().with_attribute(
            "region",
            Attribute::optional_string()
                .with_validator(Validator::one_of_ignore_case(&["US", "EU", "Staging"])),
        );
        assert!(is_valid(&schema, &json!({"region": "eu"})));
        assert!(is_valid(&schema, &json!({"region": "STAGING"})));
        assert!(!is_valid(&schema, &json!({"region": "APAC"})));
    }

    #[test]
    fn test_not_empty_validator() {
        let diagnostics = validate(&policy_schema(), &json!({"name": "  "}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
    }

    #[test]
    fn test_numeric_validators() {
        let schema = Schema::v0()
            .with_attribute(
                "slo_target",
                Attribute::required_float64().with_validator(Validator::float_between(0.0, 100.0)),
            )
            .with_attribute(
                "slo_period",
                Attribute::required_int64().with_validator(Validator::int_one_of(&[1, 7, 28])),
            )
            .with_attribute(
                "threshold_duration",
                Attribute::optional_int64().with_validator(Validator::int_between(30, 1440)),
            )
            .with_attribute(
                "custom_evaluation_period",
                Attribute::optional_int64().with_validator(Validator::int_at_least(1)),
            );

        assert!(is_valid(
            &schema,
            &json!({"slo_target": 99.9, "slo_period": 28, "threshold_duration": 30})
        ));

        let diagnostics = validate(
            &schema,
            &json!({
                "slo_target": 100.5,
                "slo_period": 30,
                "threshold_duration": 20,
                "custom_evaluation_period": 0
            }),
        );
        let mut paths: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.clone())
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "custom_evaluation_period",
                "slo_period",
                "slo_target",
                "threshold_duration"
            ]
        );
    }

    #[test]
    fn test_prefix_validator_uses_hint() {
        let schema = Schema::v0().with_attribute(
            "target_data_partition",
            Attribute::required_string().with_validator(Validator::has_prefix(
                "Log_",
                "Prepend \"Log_\" to the given target_data_partition value.",
            )),
        );

        assert!(is_valid(&schema, &json!({"target_data_partition": "Log_Archive"})));

        let diagnostics = validate(&schema, &json!({"target_data_partition": "Archive"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid value");
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Prepend \"Log_\" to the given target_data_partition value.")
        );
    }

    #[test]
    fn test_validators_apply_to_list_elements() {
        let schema = Schema::v0().with_attribute(
            "notification_triggers",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::optional(),
            )
            .with_validator(Validator::one_of(&["ACTIVATED", "CLOSED"])),
        );

        let diagnostics = validate(
            &schema,
            &json!({"notification_triggers": ["ACTIVATED", "OPENED"]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("notification_triggers.1")
        );
    }

    #[test]
    fn test_regex_validator_in_nested_set() {
        let schema = Schema::v0().with_block(
            "component_conditions",
            NestedBlock::set(
                Block::new()
                    .with_attribute("id", Attribute::required_string())
                    .with_attribute(
                        "alias",
                        Attribute::required_string().with_validator(Validator::matches(
                            "^[A-Za-z][A-Za-z0-9_]*$",
                            "alias must start with a letter",
                        )),
                    ),
            )
            .with_min_items(2),
        );

        let ok = json!({"component_conditions": [
            {"id": "1", "alias": "a"},
            {"id": "2", "alias": "b_2"}
        ]});
        assert!(is_valid(&schema, &ok));

        let bad = json!({"component_conditions": [
            {"id": "1", "alias": "1a"},
            {"id": "2", "alias": "b"}
        ]});
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("component_conditions.0.alias")
        );
    }

    #[test]
    fn test_whole_float_checked_by_int_validators() {
        let schema = Schema::v0().with_attribute(
            "threshold_duration",
            Attribute::required_int64().with_validator(Validator::int_between(30, 1440)),
        );

        assert!(is_valid(&schema, &json!({"threshold_duration": 30.0})));

        let diagnostics = validate(&schema, &json!({"threshold_duration": 20.0}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid value");
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("expected to be in the range (30 - 1440), got 20")
        );

        let diagnostics = validate(&schema, &json!({"threshold_duration": 30.5}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.starts_with("Invalid type"));
    }

    #[test]
    fn test_match_pattern_compiled_once() {
        let pattern = "^[a-z]+-[0-9]+$";
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::matches(pattern, "bad name")),
        );

        assert!(is_valid(&schema, &json!({"name": "web-1"})));
        let first = compiled(pattern).unwrap();
        assert!(!is_valid(&schema, &json!({"name": "Web"})));
        let second = compiled(pattern).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(PATTERNS.lock().unwrap().contains_key(pattern));

        let diagnostics = validate(
            &Schema::v0().with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::matches("(", "bad")),
            ),
            &json!({"name": "x"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_deref().unwrap().starts_with("invalid pattern"));
    }

    #[test]
    fn test_validate_block_cardinality() {
        let schema = Schema::v0().with_block(
            "grant",
            NestedBlock::set(
                Block::new()
                    .with_attribute("group_id", Attribute::required_string())
                    .with_attribute("role_id", Attribute::required_int64()),
            )
            .with_min_items(1),
        );

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({"grant": []}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"grant": [{"group_id": "g1"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("grant.0.role_id"));
    }

    #[test]
    fn test_validate_single_block() {
        let schema = Schema::v0().with_block(
            "auth_basic",
            NestedBlock::single(
                Block::new()
                    .with_attribute("user", Attribute::required_string())
                    .with_attribute("password", Attribute::required_string().sensitive()),
            ),
        );

        assert!(is_valid(&schema, &json!({})));
        assert!(is_valid(
            &schema,
            &json!({"auth_basic": {"user": "u", "password": "p"}})
        ));
        assert!(!is_valid(&schema, &json!({"auth_basic": {"user": "u"}})));
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = policy_schema();
        assert!(validate_result(&schema, &json!({"name": "test"})).is_ok());

        let result = validate_result(&schema, &json!({"incident_preference": "NOPE"}));
        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[test]
    fn test_validate_root_not_object() {
        let diagnostics = validate(&policy_schema(), &json!(["not", "an", "object"]));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
