//! Three-stage configuration resolution: expand → default → validate.
//!
//! Each stage is a pure `(data, schema) -> data` transform that only reads
//! the JSON Schema it is handed. The stages run in a fixed order because each
//! one relies on the previous one's output:
//!
//! 1. [`expand_shorthand`] turns `true`/`false` into a fully populated
//!    boolean group, so defaults and validation see the long form.
//! 2. [`fill_defaults`] injects declared defaults, coerces unambiguous type
//!    mismatches and drops undeclared fields, so required-with-default fields
//!    are satisfied before validation.
//! 3. [`validate_structure`] collects every remaining violation.
//!
//! Absent or `null` data is an empty record at every stage.

use std::fmt;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator, validator_for};
use serde_json::{Map, Number, Value};

use crate::error::{Result, TraceError};

/// Run all three stages in order.
pub fn resolve(data: Option<&Value>, schema: &Value) -> Result<Value> {
    CompiledSchema::compile(schema)
        .map_err(|message| TraceError::internal(SchemaCompileError(message)))?
        .resolve(data)
}

/// A schema together with its compiled validator, so repeated resolutions
/// against the same schema compile it once.
#[derive(Clone)]
pub(crate) struct CompiledSchema {
    schema: Value,
    validator: Arc<Validator>,
}

impl CompiledSchema {
    /// Compile `schema`, reporting the engine's message on failure.
    pub(crate) fn compile(schema: &Value) -> std::result::Result<Self, String> {
        let validator = validator_for(schema).map_err(|err| err.to_string())?;
        Ok(Self {
            schema: schema.clone(),
            validator: Arc::new(validator),
        })
    }

    pub(crate) fn schema(&self) -> &Value {
        &self.schema
    }

    pub(crate) fn resolve(&self, data: Option<&Value>) -> Result<Value> {
        let expanded = expand_shorthand(data, &self.schema);
        let defaulted = fill_defaults(Some(&expanded), &self.schema);
        self.validate(Some(&defaulted))
    }

    pub(crate) fn validate(&self, data: Option<&Value>) -> Result<Value> {
        let value = record(data);
        let violations: Vec<String> = self.validator.iter_errors(&value).map(describe).collect();
        if violations.is_empty() {
            Ok(value)
        } else {
            Err(TraceError::ConfigSchema { violations })
        }
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledSchema").field(&self.schema).finish()
    }
}

/// Expand boolean shorthands for boolean-group properties.
///
/// A boolean group is an object schema whose declared properties are all
/// `type: boolean`. Supplying a single bool for such a field sets every
/// property of the group to that bool.
pub fn expand_shorthand(data: Option<&Value>, schema: &Value) -> Value {
    expand_value(&record(data), schema)
}

fn expand_value(value: &Value, schema: &Value) -> Value {
    match value {
        Value::Bool(flag) => match boolean_group(schema) {
            Some(props) => Value::Object(
                props
                    .keys()
                    .map(|key| (key.clone(), Value::Bool(*flag)))
                    .collect(),
            ),
            None => value.clone(),
        },
        Value::Object(map) => match properties(schema) {
            Some(props) => Value::Object(
                map.iter()
                    .map(|(key, item)| {
                        let expanded = match props.get(key) {
                            Some(sub) => expand_value(item, sub),
                            None => item.clone(),
                        };
                        (key.clone(), expanded)
                    })
                    .collect(),
            ),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

fn boolean_group(schema: &Value) -> Option<&Map<String, Value>> {
    let props = properties(schema)?;
    if props.is_empty() {
        return None;
    }
    props
        .values()
        .all(|sub| schema_types(sub) == ["boolean"])
        .then_some(props)
}

/// Inject defaults, coerce unambiguous mismatches and drop undeclared fields.
pub fn fill_defaults(data: Option<&Value>, schema: &Value) -> Value {
    fill_value(&record(data), schema)
}

fn fill_value(value: &Value, schema: &Value) -> Value {
    let value = coerce(value, schema);
    let (Value::Object(map), Some(props)) = (&value, properties(schema)) else {
        return value;
    };

    let keep_undeclared = matches!(
        schema.get("additionalProperties"),
        Some(Value::Bool(true)) | Some(Value::Object(_))
    );
    let mut filled = Map::new();
    for (key, sub) in props {
        match map.get(key) {
            Some(item) => {
                filled.insert(key.clone(), fill_value(item, sub));
            }
            None => {
                if let Some(default) = sub.get("default") {
                    filled.insert(key.clone(), fill_value(default, sub));
                }
            }
        }
    }
    if keep_undeclared {
        for (key, item) in map {
            if !props.contains_key(key) {
                filled.insert(key.clone(), item.clone());
            }
        }
    }
    Value::Object(filled)
}

/// Coerce `value` to the schema's declared type when the conversion is
/// unambiguous. Values that already match any declared type are untouched.
fn coerce(value: &Value, schema: &Value) -> Value {
    let types = schema_types(schema);
    if types.is_empty() || types.iter().any(|ty| matches_type(value, ty)) {
        return value.clone();
    }

    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if types.contains(&"integer") {
                if let Ok(parsed) = trimmed.parse::<i64>() {
                    return Value::Number(parsed.into());
                }
            }
            if types.contains(&"number") {
                if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
                    return Value::Number(number);
                }
            }
            if types.contains(&"boolean") {
                match trimmed {
                    "true" => return Value::Bool(true),
                    "false" => return Value::Bool(false),
                    _ => {}
                }
            }
            value.clone()
        }
        Value::Number(number) if types == ["string"] => Value::String(number.to_string()),
        Value::Bool(flag) if types == ["string"] => Value::String(flag.to_string()),
        other => other.clone(),
    }
}

/// Validate data against the schema, collecting every violation.
///
/// Each violation names the failing instance path (`/` for the record
/// itself) followed by the schema engine's message. Enum violations list the
/// allowed values instead.
pub fn validate_structure(data: Option<&Value>, schema: &Value) -> Result<Value> {
    CompiledSchema::compile(schema)
        .map_err(|message| TraceError::internal(SchemaCompileError(message)))?
        .validate(data)
}

fn describe(err: ValidationError<'_>) -> String {
    let path = match err.instance_path().as_str() {
        "" => "/",
        path => path,
    };
    match err.kind() {
        ValidationErrorKind::Enum { options } => format!(
            "{path}: must be one of: {}",
            list_values(options.as_array().map(Vec::as_slice).unwrap_or_default())
        ),
        _ => format!("{path}: {err}"),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("schema failed to compile: {0}")]
struct SchemaCompileError(String);

fn record(data: Option<&Value>) -> Value {
    match data {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value.clone(),
    }
}

fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

fn schema_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(ty)) => vec![ty.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(value: &Value, ty: &str) -> bool {
    match ty {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|number| number.fract() == 0.0)
        }
        _ => false,
    }
}

fn list_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "direction": {"type": "string", "enum": ["lr", "rl"], "default": "lr"},
                "allowedClasses": {
                    "type": "object",
                    "properties": {
                        "lowercase": {"type": "boolean", "default": true},
                        "uppercase": {"type": "boolean", "default": true}
                    },
                    "default": {}
                },
                "depth": {"type": "integer", "minimum": 1, "default": 3}
            },
            "required": ["direction", "allowedClasses", "depth"],
            "additionalProperties": false
        })
    }

    #[test]
    fn expand_turns_bool_into_boolean_group() {
        let expanded = expand_shorthand(Some(&json!({"allowedClasses": false})), &layout_schema());
        assert_eq!(
            expanded,
            json!({"allowedClasses": {"lowercase": false, "uppercase": false}})
        );
    }

    /// Bools only expand where the schema describes a boolean group.
    #[test]
    fn expand_leaves_other_bools_alone() {
        let schema = json!({"properties": {"strict": {"type": "boolean"}}});
        let data = json!({"strict": true});
        assert_eq!(expand_shorthand(Some(&data), &schema), data);
    }

    #[test]
    fn fill_defaults_injects_declared_defaults() {
        let filled = fill_defaults(Some(&json!({})), &layout_schema());
        assert_eq!(filled["direction"], json!("lr"));
        assert_eq!(filled["depth"], json!(3));
        assert_eq!(
            filled["allowedClasses"],
            json!({"lowercase": true, "uppercase": true})
        );
    }

    #[test]
    fn fill_defaults_coerces_and_drops_undeclared() {
        let filled = fill_defaults(
            Some(&json!({"depth": "7", "colour": "blue"})),
            &layout_schema(),
        );
        assert_eq!(filled["depth"], json!(7));
        assert!(filled.get("colour").is_none());
    }

    #[test]
    fn fill_defaults_keeps_ambiguous_strings() {
        let filled = fill_defaults(Some(&json!({"depth": "seven"})), &layout_schema());
        assert_eq!(filled["depth"], json!("seven"));
    }

    #[test]
    fn null_input_is_an_empty_record() {
        assert_eq!(fill_defaults(None, &json!({"properties": {}})), json!({}));
        assert_eq!(
            expand_shorthand(Some(&Value::Null), &layout_schema()),
            json!({})
        );
        let resolved = resolve(Some(&Value::Null), &layout_schema()).expect("resolve");
        assert_eq!(resolved["direction"], json!("lr"));
    }

    #[test]
    fn validate_names_allowed_enum_values() {
        let filled = fill_defaults(Some(&json!({"direction": "sideways"})), &layout_schema());
        let err = validate_structure(Some(&filled), &layout_schema()).expect_err("invalid");
        match err {
            TraceError::ConfigSchema { violations } => {
                assert_eq!(
                    violations,
                    vec!["/direction: must be one of: lr, rl".to_string()]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Every violation is reported, not only the first.
    #[test]
    fn validate_collects_every_violation() {
        let data = json!({
            "direction": "up",
            "depth": 0,
            "allowedClasses": {"lowercase": "yes", "uppercase": true},
            "extra": 1
        });
        let err = validate_structure(Some(&data), &layout_schema()).expect_err("invalid");
        let TraceError::ConfigSchema { violations } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(violations.len(), 4, "{violations:?}");
        assert!(violations.iter().any(|v| v.starts_with("/direction:")));
        assert!(violations.iter().any(|v| v.starts_with("/depth:")));
        assert!(
            violations
                .iter()
                .any(|v| v.starts_with("/allowedClasses/lowercase:"))
        );
        assert!(
            violations
                .iter()
                .any(|v| v.starts_with("/: ") && v.contains("'extra'"))
        );
    }

    #[test]
    fn validate_reports_missing_required_fields() {
        let err = validate_structure(None, &layout_schema()).expect_err("invalid");
        let TraceError::ConfigSchema { violations } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(violations.len(), 3);
        assert!(
            violations
                .iter()
                .all(|v| v.starts_with("/: ") && v.ends_with("is a required property"))
        );
    }

    /// Object-level keywords apply to the record as a whole.
    #[test]
    fn validate_checks_object_level_keywords() {
        let schema = json!({
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "dependentRequired": {"a": ["b"]},
            "minProperties": 2
        });
        let err = validate_structure(Some(&json!({"a": 1})), &schema).expect_err("invalid");
        let TraceError::ConfigSchema { violations } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(violations.len(), 2, "{violations:?}");
        assert!(violations.iter().all(|v| v.starts_with("/: ")));
        assert!(validate_structure(Some(&json!({"a": 1, "b": 2})), &schema).is_ok());
    }

    #[test]
    fn validate_checks_additional_properties_schema() {
        let schema = json!({
            "properties": {"a": {"type": "integer"}},
            "additionalProperties": {"type": "integer"}
        });
        let err = validate_structure(Some(&json!({"a": 1, "x": "not-an-int"})), &schema)
            .expect_err("invalid");
        let TraceError::ConfigSchema { violations } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("/x: "), "{violations:?}");
        assert!(validate_structure(Some(&json!({"a": 1, "x": 2})), &schema).is_ok());
    }

    #[test]
    fn enum_membership_compares_numbers_by_value() {
        let schema = json!({"properties": {"level": {"enum": [1, 2]}}});
        assert!(validate_structure(Some(&json!({"level": 1.0})), &schema).is_ok());
        let err = validate_structure(Some(&json!({"level": 3})), &schema).expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "configuration schema violated: /level: must be one of: 1, 2"
        );
    }

    #[test]
    fn compiled_schema_resolves_like_the_free_functions() {
        let compiled = CompiledSchema::compile(&layout_schema()).expect("compiles");
        let data = json!({"allowedClasses": false, "depth": "4"});
        assert_eq!(
            compiled.resolve(Some(&data)).expect("resolve"),
            resolve(Some(&data), &layout_schema()).expect("resolve")
        );
        assert!(CompiledSchema::compile(&json!({"type": 12})).is_err());
    }

    #[test]
    fn resolving_twice_matches_resolving_once() {
        let data = json!({"allowedClasses": true, "depth": "2", "junk": null});
        let once = resolve(Some(&data), &layout_schema()).expect("first pass");
        let twice = resolve(Some(&once), &layout_schema()).expect("second pass");
        assert_eq!(once, twice);
        assert_eq!(
            once,
            json!({
                "direction": "lr",
                "allowedClasses": {"lowercase": true, "uppercase": true},
                "depth": 2
            })
        );
    }

    #[test]
    fn subschema_refs_resolve_against_root_definitions() {
        let schema = json!({
            "$defs": {"positive": {"type": "integer", "minimum": 1}},
            "properties": {"width": {"$ref": "#/$defs/positive"}}
        });
        assert!(validate_structure(Some(&json!({"width": 4})), &schema).is_ok());
        assert!(validate_structure(Some(&json!({"width": 0})), &schema).is_err());
    }
}
