//! Builder-Safe protocol: immutable snapshots with outcome-as-value.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::capability::{Capability, CapabilityDescriptor};
use crate::core::freeze::Frozen;
use crate::core::types::{ResolvedConfig, StepSequence};
use crate::error::{Result, TraceError};
use crate::protocols::chain::{ChainPhase, ChainState, Invalidation};
use crate::protocols::outcome::TraceInput;
use crate::protocols::resolve::{resolve_config, run_guarded};

#[derive(Debug, Clone, Default)]
enum ChainOutcome {
    #[default]
    Pending,
    Succeeded,
    Failed(TraceError),
}

/// Chain snapshot. [`set`](Self::set) and [`trace`](Self::trace) return new
/// snapshots and never fail; failures are recorded on the returned snapshot.
#[derive(Debug, Clone, Default)]
pub struct SafeChain {
    state: ChainState,
    resolved: Option<Frozen<ResolvedConfig>>,
    steps: Option<Frozen<StepSequence>>,
    outcome: ChainOutcome,
}

impl SafeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bound(capability: Arc<Capability>) -> Self {
        Self {
            state: ChainState::bound(capability),
            ..Self::default()
        }
    }

    /// Apply any subset of inputs, capability first, then text, then config.
    pub fn set(&self, input: TraceInput) -> Self {
        let mut state = self.state.clone();
        let mut invalidation = Invalidation::NONE;
        if let Some(descriptor) = &input.capability {
            let (next, dropped) = state.with_capability(descriptor);
            state = next;
            invalidation = invalidation.union(dropped);
        }
        if let Some(text) = input.text {
            let (next, dropped) = state.with_text(text);
            state = next;
            invalidation = invalidation.union(dropped);
        }
        if let Some(raw_config) = &input.raw_config {
            let (next, dropped) = state.with_config(raw_config);
            state = next;
            invalidation = invalidation.union(dropped);
        }
        self.derive(state, invalidation)
    }

    fn derive(&self, state: ChainState, invalidation: Invalidation) -> Self {
        if invalidation == Invalidation::NONE {
            return Self {
                state,
                ..self.clone()
            };
        }
        Self {
            state,
            resolved: if invalidation.resolved {
                None
            } else {
                self.resolved.clone()
            },
            steps: None,
            outcome: ChainOutcome::Pending,
        }
    }

    /// Run a trace with `overrides` applied first.
    pub async fn trace(&self, overrides: Option<TraceInput>) -> Self {
        let chain = match overrides {
            Some(input) => self.set(input),
            None => self.clone(),
        };
        chain.run().await
    }

    async fn run(self) -> Self {
        let resolved = match self.resolve() {
            Ok(resolved) => resolved,
            Err(failure) => return self.failed(None, failure),
        };
        let inputs = self.state.require_capability().and_then(|capability| {
            let text = self.state.require_text()?.to_string();
            Ok((capability, text))
        });
        let (capability, text) = match inputs {
            Ok(inputs) => inputs,
            Err(failure) => return self.failed(Some(resolved), failure),
        };
        match run_guarded(capability, &text, resolved.clone()).await {
            Ok(steps) => Self {
                resolved: Some(resolved),
                steps: Some(steps),
                outcome: ChainOutcome::Succeeded,
                ..self
            },
            Err(failure) => self.failed(Some(resolved), failure),
        }
    }

    fn resolve(&self) -> Result<Frozen<ResolvedConfig>> {
        if let Some(resolved) = &self.resolved {
            debug!("reusing resolved configuration");
            return Ok(resolved.clone());
        }
        let capability = self.state.require_capability()?;
        resolve_config(&capability, self.state.raw_config())
    }

    fn failed(self, resolved: Option<Frozen<ResolvedConfig>>, failure: TraceError) -> Self {
        warn!(kind = ?failure.kind(), error = %failure, "builder-safe trace failed");
        Self {
            resolved,
            steps: None,
            outcome: ChainOutcome::Failed(failure),
            ..self
        }
    }

    /// `None` until a trace has run on this snapshot.
    pub fn ok(&self) -> Option<bool> {
        match self.outcome {
            ChainOutcome::Pending => None,
            ChainOutcome::Succeeded => Some(true),
            ChainOutcome::Failed(_) => Some(false),
        }
    }

    pub fn failure(&self) -> Option<&TraceError> {
        match &self.outcome {
            ChainOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn steps(&self) -> Option<&Frozen<StepSequence>> {
        self.steps.as_ref()
    }

    pub fn resolved_config(&self) -> Option<&Frozen<ResolvedConfig>> {
        self.resolved.as_ref()
    }

    pub fn capability(&self) -> Option<&CapabilityDescriptor> {
        self.state.capability().map(Capability::descriptor)
    }

    pub fn text(&self) -> Option<&str> {
        self.state.text.as_deref()
    }

    pub fn raw_config(&self) -> Option<&Value> {
        self.state.raw_config()
    }

    pub fn phase(&self) -> ChainPhase {
        let completed = !matches!(self.outcome, ChainOutcome::Pending);
        self.state.phase(self.resolved.is_some(), completed)
    }
}
