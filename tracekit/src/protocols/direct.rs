//! Direct protocol: positional call that fails fast.
//!
//! ```text
//! let direct = Direct::new(&descriptor)?;            // curry point
//! let steps = direct.invoke("ab", None)?.await?;     // sync prefix, async execute
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::core::capability::{Capability, CapabilityDescriptor, validate_capability};
use crate::error::Result;
use crate::protocols::resolve::{TraceFuture, prepare};

/// A capability bound for repeated direct invocation.
#[derive(Debug, Clone)]
pub struct Direct {
    capability: Arc<Capability>,
}

impl Direct {
    /// Validate `descriptor` and bind it.
    pub fn new(descriptor: &CapabilityDescriptor) -> Result<Self> {
        Ok(Self::bound(Arc::new(validate_capability(descriptor)?)))
    }

    pub(crate) fn bound(capability: Arc<Capability>) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Resolve configuration and start a trace.
    ///
    /// Configuration errors, limit checks and the semantic validator all
    /// fail here, before anything suspends. Only the returned future awaits
    /// the capability.
    pub fn invoke(&self, text: &str, raw_config: Option<&Value>) -> Result<TraceFuture> {
        debug!(capability = %self.capability.identity(), "direct invoke");
        let (_, future) = prepare(Arc::clone(&self.capability), text, raw_config)?;
        Ok(future)
    }
}

/// Validate `descriptor`, then [`Direct::invoke`].
pub fn invoke(
    descriptor: &CapabilityDescriptor,
    text: &str,
    raw_config: Option<&Value>,
) -> Result<TraceFuture> {
    Direct::new(descriptor)?.invoke(text, raw_config)
}
