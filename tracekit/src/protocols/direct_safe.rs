//! Direct-Safe protocol: keyed inputs, partial application, never fails.
//!
//! An invocation with capability, text and raw config completes a trace and
//! returns a [`TraceOutcome`]. An invocation missing any of them returns a
//! [`PartialTrace`] that remembers what it was given and can be called again
//! with the rest.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::capability::{Capability, CapabilityDescriptor, validate_capability};
use crate::core::freeze::{Frozen, freeze_borrowed, freeze_owned, merge};
use crate::core::types::{ResolvedConfig, StepSequence};
use crate::error::Result;
use crate::protocols::outcome::{TraceFailure, TraceInput, TraceOutcome, TraceSuccess};
use crate::protocols::resolve::{resolve_config, run_guarded};

/// Entry point of the Direct-Safe protocol.
#[derive(Debug, Clone, Default)]
pub struct DirectSafe {
    bound: Option<Arc<Capability>>,
}

/// Either a finished trace or an accumulator waiting for more inputs.
#[derive(Debug, Clone)]
pub enum SafeInvocation {
    Complete(Frozen<TraceOutcome>),
    Partial(PartialTrace),
}

impl SafeInvocation {
    pub fn outcome(&self) -> Option<&TraceOutcome> {
        match self {
            Self::Complete(outcome) => Some(outcome),
            Self::Partial(_) => None,
        }
    }

    pub fn partial(&self) -> Option<&PartialTrace> {
        match self {
            Self::Complete(_) => None,
            Self::Partial(partial) => Some(partial),
        }
    }
}

impl DirectSafe {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bound(capability: Arc<Capability>) -> Self {
        Self {
            bound: Some(capability),
        }
    }

    pub async fn invoke(&self, input: TraceInput) -> SafeInvocation {
        let seed = PartialTrace {
            bound: self.bound.clone(),
            capability: self.bound.as_ref().map(|cap| cap.descriptor().clone()),
            text: None,
            raw_config: None,
        };
        seed.call(input).await
    }
}

/// Inputs accumulated so far. Calling it never changes it.
#[derive(Debug, Clone)]
pub struct PartialTrace {
    /// Capability validated ahead of time, used while `capability` is the
    /// descriptor it was validated from.
    bound: Option<Arc<Capability>>,
    capability: Option<CapabilityDescriptor>,
    text: Option<String>,
    raw_config: Option<Frozen<Value>>,
}

impl PartialTrace {
    pub fn capability(&self) -> Option<&CapabilityDescriptor> {
        self.capability.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn raw_config(&self) -> Option<&Value> {
        self.raw_config.as_deref()
    }

    /// Supply more inputs.
    ///
    /// A new capability or text replaces the accumulated one; a new raw
    /// config is merged over the accumulated one.
    pub async fn call(&self, remaining: TraceInput) -> SafeInvocation {
        let next = self.accumulate(remaining);
        match (&next.capability, &next.text, &next.raw_config) {
            (Some(capability), Some(text), Some(raw_config)) => {
                let outcome = complete(next.bound.clone(), capability, text, raw_config).await;
                SafeInvocation::Complete(freeze_owned(outcome))
            }
            _ => {
                debug!(
                    capability = next.capability.is_some(),
                    text = next.text.is_some(),
                    raw_config = next.raw_config.is_some(),
                    "direct-safe call is partial"
                );
                SafeInvocation::Partial(next)
            }
        }
    }

    fn accumulate(&self, remaining: TraceInput) -> PartialTrace {
        let (bound, capability) = match remaining.capability {
            Some(descriptor) => (None, Some(descriptor)),
            None => (self.bound.clone(), self.capability.clone()),
        };
        let raw_config = match (&self.raw_config, remaining.raw_config) {
            (Some(current), Some(incoming)) => Some(freeze_owned(merge(current, &incoming))),
            (None, Some(incoming)) => Some(freeze_borrowed(&incoming)),
            (current, None) => current.clone(),
        };
        PartialTrace {
            bound,
            capability,
            text: remaining.text.or_else(|| self.text.clone()),
            raw_config,
        }
    }
}

async fn complete(
    bound: Option<Arc<Capability>>,
    descriptor: &CapabilityDescriptor,
    text: &str,
    raw_config: &Frozen<Value>,
) -> TraceOutcome {
    match trace(bound, descriptor, text, raw_config).await {
        Ok((resolved_config, steps)) => TraceOutcome::Success(TraceSuccess {
            steps,
            capability: descriptor.clone(),
            text: text.to_string(),
            raw_config: raw_config.clone(),
            resolved_config,
        }),
        Err(failure) => {
            warn!(kind = ?failure.kind(), error = %failure, "direct-safe trace failed");
            TraceOutcome::Failure(TraceFailure {
                failure,
                capability: descriptor.clone(),
                text: text.to_string(),
                raw_config: raw_config.clone(),
            })
        }
    }
}

async fn trace(
    bound: Option<Arc<Capability>>,
    descriptor: &CapabilityDescriptor,
    text: &str,
    raw_config: &Value,
) -> Result<(Frozen<ResolvedConfig>, Frozen<StepSequence>)> {
    let capability = match bound {
        Some(capability) => capability,
        None => Arc::new(validate_capability(descriptor)?),
    };
    let config = resolve_config(&capability, Some(raw_config))?;
    let steps = run_guarded(capability, text, config.clone()).await?;
    Ok((config, steps))
}
