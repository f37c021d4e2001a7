//! Builder-Throws protocol: immutable chain with memoised getters.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::core::capability::{Capability, CapabilityDescriptor};
use crate::core::freeze::Frozen;
use crate::core::types::{ResolvedConfig, StepSequence};
use crate::error::Result;
use crate::protocols::chain::{ChainPhase, ChainState, Invalidation};
use crate::protocols::resolve::{resolve_config, start_trace};

/// Chainable trace builder. Setters return a new builder; the receiver is
/// never modified.
///
/// Missing inputs and resolution failures only surface from
/// [`resolved_config`](Self::resolved_config) and [`result`](Self::result).
/// Both memoise per instance, failures included, so repeated access returns
/// the same [`Frozen`] handle without recomputation.
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    state: ChainState,
    resolved: OnceLock<Result<Frozen<ResolvedConfig>>>,
    result: OnceCell<Result<Frozen<StepSequence>>>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bound(capability: Arc<Capability>) -> Self {
        Self {
            state: ChainState::bound(capability),
            ..Self::default()
        }
    }

    /// Replace the capability. The descriptor is validated here; a contract
    /// violation is reported by the getters.
    pub fn capability(&self, descriptor: &CapabilityDescriptor) -> Self {
        let (state, invalidation) = self.state.with_capability(descriptor);
        self.derive(state, invalidation)
    }

    pub fn text(&self, text: impl Into<String>) -> Self {
        let (state, invalidation) = self.state.with_text(text.into());
        self.derive(state, invalidation)
    }

    /// Replace the raw configuration. The value is copied; later changes to
    /// the caller's value are not observed.
    pub fn config(&self, raw_config: &Value) -> Self {
        let (state, invalidation) = self.state.with_config(raw_config);
        self.derive(state, invalidation)
    }

    fn derive(&self, state: ChainState, invalidation: Invalidation) -> Self {
        let resolved = if invalidation.resolved {
            OnceLock::new()
        } else {
            self.resolved.clone()
        };
        let result = if invalidation.result {
            OnceCell::new()
        } else {
            self.result.clone()
        };
        Self {
            state,
            resolved,
            result,
        }
    }

    /// Resolved configuration for the current capability and config.
    pub fn resolved_config(&self) -> Result<Frozen<ResolvedConfig>> {
        self.resolved
            .get_or_init(|| {
                debug!("resolving builder configuration");
                let capability = self.state.require_capability()?;
                resolve_config(&capability, self.state.raw_config())
            })
            .clone()
    }

    /// Trace result for the current capability, text and config.
    pub async fn result(&self) -> Result<Frozen<StepSequence>> {
        self.result
            .get_or_init(|| async {
                let capability = self.state.require_capability()?;
                let text = self.state.require_text()?;
                let config = self.resolved_config()?;
                start_trace(capability, text, config)?.await
            })
            .await
            .clone()
    }

    pub fn current_capability(&self) -> Option<&Capability> {
        self.state.capability()
    }

    pub fn current_text(&self) -> Option<&str> {
        self.state.text.as_deref()
    }

    pub fn current_config(&self) -> Option<&Value> {
        self.state.raw_config()
    }

    pub fn phase(&self) -> ChainPhase {
        let resolved = matches!(self.resolved.get(), Some(Ok(_)));
        self.state.phase(resolved, self.result.initialized())
    }
}
