//! Fixed schema for the cross-capability `limits` axis.

use std::sync::LazyLock;

use serde_json::Value;

use crate::core::pipeline::CompiledSchema;
use crate::core::types::Limits;
use crate::error::{Result, TraceError};

const LIMITS_SCHEMA_JSON: &str = include_str!("../../schemas/limits.schema.json");

static LIMITS_SCHEMA: LazyLock<CompiledSchema> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(LIMITS_SCHEMA_JSON).unwrap_or_else(|err| {
        panic!("embedded limits schema is not valid JSON: {err}");
    });
    CompiledSchema::compile(&schema).unwrap_or_else(|message| {
        panic!("embedded limits schema does not compile: {message}");
    })
});

/// The limit schema every capability shares.
pub fn limits_schema() -> &'static Value {
    LIMITS_SCHEMA.schema()
}

/// Resolve raw limit settings into typed [`Limits`].
///
/// Violation paths are prefixed with `limits`.
pub fn resolve_limits(raw: Option<&Value>) -> Result<Limits> {
    let resolved = LIMITS_SCHEMA
        .resolve(raw)
        .map_err(|err| err.scoped("limits"))?;
    serde_json::from_value(resolved).map_err(TraceError::internal)
}

impl Limits {
    /// Fail if `length` exceeds `maxTextLength`.
    pub fn check_text_length(&self, length: usize) -> Result<()> {
        exceeds("maxTextLength", self.max_text_length, length)
    }

    /// Fail if `count` exceeds `maxSteps`.
    pub fn check_step_count(&self, count: usize) -> Result<()> {
        exceeds("maxSteps", self.max_steps, count)
    }
}

fn exceeds(limit: &str, bound: Option<u64>, observed: usize) -> Result<()> {
    match bound {
        Some(bound) if observed as u64 > bound => Err(TraceError::LimitExceeded {
            limit: limit.to_string(),
            observed: Value::from(observed),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn empty_limits_take_schema_defaults() {
        let limits = resolve_limits(None).expect("resolve");
        assert_eq!(
            limits,
            Limits {
                max_steps: Some(10_000),
                max_text_length: None,
                timeout_ms: None,
            }
        );
    }

    #[test]
    fn limits_accept_null_and_numeric_strings() {
        let limits = resolve_limits(Some(&json!({"maxSteps": null, "timeoutMs": "250"})))
            .expect("resolve");
        assert_eq!(limits.max_steps, None);
        assert_eq!(limits.timeout_ms, Some(250));
    }

    #[test]
    fn invalid_limits_are_scoped_to_the_limits_axis() {
        let err = resolve_limits(Some(&json!({"maxSteps": 0}))).expect_err("invalid");
        let TraceError::ConfigSchema { violations } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("limits/maxSteps:"));
    }

    #[test]
    fn limit_checks_report_name_and_observed_value() {
        let limits = Limits {
            max_steps: Some(2),
            max_text_length: Some(3),
            timeout_ms: None,
        };
        assert!(limits.check_text_length(3).is_ok());
        let err = limits.check_text_length(4).expect_err("too long");
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert_eq!(err.to_string(), "limit 'maxTextLength' exceeded (observed 4)");
        assert!(limits.check_step_count(3).is_err());
    }
}
