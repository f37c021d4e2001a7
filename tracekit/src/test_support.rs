//! Test-only tracers and capability fixtures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::capability::{CapabilityDescriptor, Tracer};
use crate::core::types::{ResolvedConfig, SourceRange, Step, StepSequence};
use crate::error::TraceError;

/// Emits one step per character, echoing the character and resolved options.
pub struct EchoTracer;

#[async_trait]
impl Tracer for EchoTracer {
    async fn execute(&self, text: &str, config: &ResolvedConfig) -> anyhow::Result<StepSequence> {
        Ok(echo_steps(text, &config.options))
    }
}

/// Deterministic step sequence produced by [`EchoTracer`].
pub fn echo_steps(text: &str, options: &Value) -> StepSequence {
    text.chars()
        .enumerate()
        .map(|(index, ch)| Step {
            index,
            range: SourceRange {
                start: index,
                end: index + 1,
            },
            data: json!({"char": ch.to_string(), "options": options}),
        })
        .collect()
}

/// [`EchoTracer`] that counts how many times `execute` ran.
#[derive(Default)]
pub struct CountingTracer {
    calls: AtomicUsize,
}

impl CountingTracer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tracer for CountingTracer {
    async fn execute(&self, text: &str, config: &ResolvedConfig) -> anyhow::Result<StepSequence> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(echo_steps(text, &config.options))
    }
}

/// Failure a [`FailingTracer`] rejects with.
#[derive(Debug, Clone)]
pub enum Failure {
    /// A taxonomy error, which must keep its kind.
    Known(TraceError),
    /// A foreign error, which must be reported as internal.
    Foreign(String),
}

/// Tracer whose `execute` always rejects.
pub struct FailingTracer {
    failure: Failure,
}

impl FailingTracer {
    pub fn new(failure: Failure) -> Self {
        Self { failure }
    }
}

#[async_trait]
impl Tracer for FailingTracer {
    async fn execute(&self, _text: &str, _config: &ResolvedConfig) -> anyhow::Result<StepSequence> {
        match &self.failure {
            Failure::Known(err) => Err(err.clone().into()),
            Failure::Foreign(message) => Err(anyhow!("{message}")),
        }
    }
}

/// Manifest with the given identity and domains.
pub fn manifest(identity: &str, domains: &[&str]) -> Value {
    json!({"identity": identity, "supportedDomains": domains})
}

/// Valid descriptor backed by [`EchoTracer`].
pub fn echo_capability(identity: &str, domains: &[&str]) -> CapabilityDescriptor {
    CapabilityDescriptor::new(manifest(identity, domains), Arc::new(EchoTracer))
}

/// Options schema with an enum field, a boolean group and a numeric default.
pub fn letters_schema() -> Value {
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
            "width": {"type": "integer", "minimum": 1, "default": 1}
        },
        "required": ["direction", "allowedClasses", "width"]
    })
}

/// Echo-backed descriptor that declares [`letters_schema`] as its options schema.
pub fn letters_capability(tracer: Arc<dyn Tracer>) -> CapabilityDescriptor {
    let mut manifest = manifest("letters", &["text"]);
    manifest["optionsSchema"] = letters_schema();
    CapabilityDescriptor::new(manifest, tracer)
}
