//! Inputs and outcome values for the non-throwing protocols.

use serde_json::Value;

use crate::core::capability::CapabilityDescriptor;
use crate::core::freeze::Frozen;
use crate::core::types::{ResolvedConfig, StepSequence};
use crate::error::TraceError;

/// Any subset of the three trace inputs.
#[derive(Debug, Clone, Default)]
pub struct TraceInput {
    pub capability: Option<CapabilityDescriptor>,
    pub text: Option<String>,
    pub raw_config: Option<Value>,
}

impl TraceInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(mut self, descriptor: CapabilityDescriptor) -> Self {
        self.capability = Some(descriptor);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_config(mut self, raw_config: Value) -> Self {
        self.raw_config = Some(raw_config);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TraceSuccess {
    pub steps: Frozen<StepSequence>,
    pub capability: CapabilityDescriptor,
    pub text: String,
    pub raw_config: Frozen<Value>,
    pub resolved_config: Frozen<ResolvedConfig>,
}

#[derive(Debug, Clone)]
pub struct TraceFailure {
    pub failure: TraceError,
    pub capability: CapabilityDescriptor,
    pub text: String,
    pub raw_config: Frozen<Value>,
}

/// Result of a complete trace, reported as a value instead of an error.
#[derive(Debug, Clone)]
pub enum TraceOutcome {
    Success(TraceSuccess),
    Failure(TraceFailure),
}

impl TraceOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn steps(&self) -> Option<&Frozen<StepSequence>> {
        match self {
            Self::Success(success) => Some(&success.steps),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TraceError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(&failure.failure),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Success(success) => &success.text,
            Self::Failure(failure) => &failure.text,
        }
    }

    pub fn raw_config(&self) -> &Value {
        match self {
            Self::Success(success) => &success.raw_config,
            Self::Failure(failure) => &failure.raw_config,
        }
    }
}
