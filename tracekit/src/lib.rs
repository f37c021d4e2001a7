//! Typed wrapper protocols around pluggable tracing capabilities.
//!
//! A capability pairs an identity and supported domains with an async
//! `execute` that turns text into a step sequence. This crate validates the
//! capability, resolves per-trace configuration against schemas and hands
//! back frozen results:
//!
//! - **[`core`]**: Pure logic (capability contract, resolution pipeline,
//!   limits, freezing). No I/O, no logging.
//! - **[`protocols`]**: Direct, Builder-Throws, Direct-Safe and Builder-Safe
//!   wrappers built on the same resolution path.
//!
//! [`compose`] validates a capability once and binds all four protocols to it.

pub mod core;
pub mod error;
pub mod logging;
pub mod protocols;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

use std::sync::Arc;

use tracing::{debug, instrument};

pub use crate::core::capability::{
    Capability, CapabilityDescriptor, SemanticValidator, Tracer, validate_capability,
};
pub use crate::core::freeze::{Frozen, freeze_borrowed, freeze_owned};
pub use crate::core::pipeline::{expand_shorthand, fill_defaults, validate_structure};
pub use crate::core::types::{Limits, ResolvedConfig, SourceRange, Step, StepSequence};
pub use crate::error::{ErrorKind, Result, SourcePosition, TraceError};
pub use crate::protocols::builder::TraceBuilder;
pub use crate::protocols::builder_safe::SafeChain;
pub use crate::protocols::chain::ChainPhase;
pub use crate::protocols::direct::Direct;
pub use crate::protocols::direct_safe::{DirectSafe, PartialTrace, SafeInvocation};
pub use crate::protocols::outcome::{TraceFailure, TraceInput, TraceOutcome, TraceSuccess};
pub use crate::protocols::resolve::TraceFuture;

/// All four protocols bound to one validated capability.
#[derive(Debug, Clone)]
pub struct Protocols {
    pub direct: Direct,
    pub builder: TraceBuilder,
    pub direct_safe: DirectSafe,
    pub builder_safe: SafeChain,
}

/// Validate `descriptor` once and bind every protocol to the result.
#[instrument(skip_all, fields(capability = descriptor.identity().unwrap_or("<invalid>")))]
pub fn compose(descriptor: &CapabilityDescriptor) -> Result<Protocols> {
    let capability = Arc::new(validate_capability(descriptor)?);
    debug!("capability validated for composition");
    Ok(Protocols {
        direct: Direct::bound(Arc::clone(&capability)),
        builder: TraceBuilder::bound(Arc::clone(&capability)),
        direct_safe: DirectSafe::bound(Arc::clone(&capability)),
        builder_safe: SafeChain::bound(capability),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingTracer, letters_capability};
    use serde_json::json;

    #[test]
    fn compose_rejects_invalid_capability() {
        let err = compose(&CapabilityDescriptor::default()).expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::CapabilityContract);
    }

    #[tokio::test]
    async fn composed_protocols_share_one_capability() {
        let tracer = Arc::new(CountingTracer::default());
        let protocols = compose(&letters_capability(tracer.clone())).expect("compose");

        let direct = protocols.direct.invoke("ab", None).expect("start").await.expect("trace");
        let built = protocols.builder.text("ab").result().await.expect("trace");
        let safe = protocols
            .direct_safe
            .invoke(TraceInput::new().with_text("ab").with_config(json!({})))
            .await;
        let chained = protocols
            .builder_safe
            .trace(Some(TraceInput::new().with_text("ab")))
            .await;

        assert_eq!(*direct, *built);
        assert_eq!(safe.outcome().and_then(TraceOutcome::steps), Some(&direct));
        assert_eq!(chained.steps(), Some(&direct));
        assert_eq!(tracer.calls(), 4);
        assert!(
            protocols
                .builder
                .current_capability()
                .is_some_and(|capability| capability.same_as(protocols.direct.capability()))
        );
    }
}
