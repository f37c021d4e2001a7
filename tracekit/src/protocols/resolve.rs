//! Resolution and execution shared by all four protocols.
//!
//! [`resolve_config`] and [`start_trace`] are synchronous and fail
//! immediately. The future returned by [`start_trace`] is the only place
//! that suspends: it awaits `Tracer::execute` and freezes its output.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::capability::Capability;
use crate::core::freeze::{Frozen, freeze_owned};
use crate::core::limits::resolve_limits;
use crate::core::types::{ResolvedConfig, StepSequence};
use crate::error::{Result, TraceError};

/// Deferred execution of a prepared trace.
pub type TraceFuture = BoxFuture<'static, Result<Frozen<StepSequence>>>;

/// Resolve `rawConfig` (`{limits?, options?}`) for `capability`.
///
/// Options are passed through untouched when the capability declares no
/// options schema.
#[instrument(skip_all, fields(capability = %capability.identity()))]
pub(crate) fn resolve_config(
    capability: &Capability,
    raw: Option<&Value>,
) -> Result<Frozen<ResolvedConfig>> {
    let (raw_limits, raw_options) = split_raw_config(raw)?;
    let limits = resolve_limits(raw_limits)?;
    let options = match capability.compiled_options() {
        Some(schema) => schema
            .resolve(raw_options)
            .map_err(|err| err.scoped("options"))?,
        None => raw_options
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    };
    debug!(?limits, "configuration resolved");
    Ok(freeze_owned(ResolvedConfig { limits, options }))
}

fn split_raw_config(raw: Option<&Value>) -> Result<(Option<&Value>, Option<&Value>)> {
    match raw {
        None | Some(Value::Null) => Ok((None, None)),
        Some(Value::Object(map)) => Ok((map.get("limits"), map.get("options"))),
        Some(other) => Err(TraceError::ArgumentType {
            field: "rawConfig".to_string(),
            message: format!("expected an object or null, got {other}"),
        }),
    }
}

/// Check text limits and run the semantic validator, then hand back the
/// deferred `execute` call.
pub(crate) fn start_trace(
    capability: Arc<Capability>,
    text: &str,
    config: Frozen<ResolvedConfig>,
) -> Result<TraceFuture> {
    capability.check_semantics(&config.options)?;
    config.limits.check_text_length(text.chars().count())?;
    let text = text.to_string();
    Ok(Box::pin(execute(capability, text, config)))
}

/// Resolve `raw` and start a trace in one synchronous step.
pub(crate) fn prepare(
    capability: Arc<Capability>,
    text: &str,
    raw: Option<&Value>,
) -> Result<(Frozen<ResolvedConfig>, TraceFuture)> {
    let config = resolve_config(&capability, raw)?;
    let future = start_trace(capability, text, config.clone())?;
    Ok((config, future))
}

/// [`start_trace`] and await it, reporting a panicking capability as an
/// internal failure instead of unwinding into the caller.
pub(crate) async fn run_guarded(
    capability: Arc<Capability>,
    text: &str,
    config: Frozen<ResolvedConfig>,
) -> Result<Frozen<StepSequence>> {
    let started = catch_unwind(AssertUnwindSafe(|| start_trace(capability, text, config)))
        .map_err(panic_failure)?;
    AssertUnwindSafe(started?)
        .catch_unwind()
        .await
        .map_err(panic_failure)?
}

#[derive(Debug, thiserror::Error)]
#[error("capability panicked: {0}")]
struct CapabilityPanic(String);

fn panic_failure(payload: Box<dyn Any + Send>) -> TraceError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    warn!(%message, "capability panicked");
    TraceError::internal(CapabilityPanic(message))
}

async fn execute(
    capability: Arc<Capability>,
    text: String,
    config: Frozen<ResolvedConfig>,
) -> Result<Frozen<StepSequence>> {
    info!(
        capability = %capability.identity(),
        chars = text.chars().count(),
        "executing trace"
    );
    let steps = capability
        .tracer()
        .execute(&text, &config)
        .await
        .map_err(|err| {
            let err = TraceError::classify(err);
            warn!(kind = ?err.kind(), error = %err, "capability execute failed");
            err
        })?;
    config.limits.check_step_count(steps.len())?;
    debug!(steps = steps.len(), "trace completed");
    Ok(freeze_owned(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::validate_capability;
    use crate::error::ErrorKind;
    use crate::test_support::{EchoTracer, echo_capability, letters_capability};
    use serde_json::json;

    fn letters() -> Arc<Capability> {
        Arc::new(validate_capability(&letters_capability(Arc::new(EchoTracer))).expect("valid"))
    }

    #[test]
    fn resolves_both_axes() {
        let config = resolve_config(
            &letters(),
            Some(&json!({"limits": {"maxSteps": 5}, "options": {"allowedClasses": false}})),
        )
        .expect("resolve");
        assert_eq!(config.limits.max_steps, Some(5));
        assert_eq!(
            config.options,
            json!({
                "direction": "lr",
                "allowedClasses": {"lowercase": false, "uppercase": false},
                "width": 1
            })
        );
    }

    #[test]
    fn options_pass_through_without_schema() {
        let capability = validate_capability(&echo_capability("plain", &[])).expect("valid");
        let config = resolve_config(&capability, Some(&json!({"options": {"anything": [1]}})))
            .expect("resolve");
        assert_eq!(config.options, json!({"anything": [1]}));

        let empty = resolve_config(&capability, None).expect("resolve");
        assert_eq!(empty.options, json!({}));
    }

    #[test]
    fn non_object_raw_config_is_an_argument_violation() {
        let err = resolve_config(&letters(), Some(&json!([1, 2]))).expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::ArgumentType);
    }

    #[test]
    fn option_violations_are_scoped() {
        let err = resolve_config(&letters(), Some(&json!({"options": {"direction": "up"}})))
            .expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "configuration schema violated: options/direction: must be one of: lr, rl"
        );
    }

    /// Text limits fail before anything is executed.
    #[test]
    fn text_limit_fails_synchronously() {
        let capability = letters();
        let config = resolve_config(&capability, Some(&json!({"limits": {"maxTextLength": 2}})))
            .expect("resolve");
        let err = start_trace(capability, "abc", config)
            .err()
            .expect("limit exceeded");
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    struct PanickingTracer;

    #[async_trait::async_trait]
    impl crate::core::capability::Tracer for PanickingTracer {
        async fn execute(&self, _text: &str, _config: &ResolvedConfig) -> anyhow::Result<StepSequence> {
            panic!("tracer exploded");
        }
    }

    #[tokio::test]
    async fn guarded_run_reports_panics_as_internal() {
        let descriptor = crate::test_support::letters_capability(Arc::new(PanickingTracer));
        let capability = Arc::new(validate_capability(&descriptor).expect("valid"));
        let config = resolve_config(&capability, None).expect("resolve");
        let err = run_guarded(capability, "ab", config)
            .await
            .expect_err("panics are failures");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("tracer exploded"));
    }

    #[tokio::test]
    async fn step_limit_applies_to_capability_output() {
        let (_, future) = prepare(letters(), "abc", Some(&json!({"limits": {"maxSteps": 2}})))
            .expect("prepare");
        let err = future.await.expect_err("too many steps");
        assert_eq!(err.to_string(), "limit 'maxSteps' exceeded (observed 3)");
    }
}
