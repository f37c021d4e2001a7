//! Immutable chain state shared by both builder protocols.
//!
//! Every transition returns a new [`ChainState`] together with the caches it
//! invalidates:
//!
//! | transition  | config  | text                      | resolved | result |
//! |-------------|---------|---------------------------|----------|--------|
//! | capability  | cleared | kept if domain-compatible | dropped  | dropped|
//! | text        | kept    | replaced                  | kept     | dropped|
//! | config      | replaced| kept                      | dropped  | dropped|
//!
//! A transition to an equal value is not a change and invalidates nothing.
//! Capabilities compare with [`Capability::same_as`] and configs compare
//! structurally.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::capability::{Capability, CapabilityDescriptor, validate_capability};
use crate::core::freeze::{Frozen, freeze_borrowed, structurally_equal};
use crate::error::{Result, TraceError};

/// Where a chain stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPhase {
    /// Nothing has been set.
    Empty,
    /// Some inputs are set but nothing has been resolved.
    Partial,
    /// Configuration is resolved; no trace has run.
    Resolved,
    /// A trace ran, successfully or not.
    Completed,
}

/// Validated capability, or the contract violation it failed with.
pub(crate) type CapabilitySlot = Result<Arc<Capability>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct ChainState {
    pub(crate) capability: Option<CapabilitySlot>,
    pub(crate) text: Option<String>,
    pub(crate) raw_config: Option<Frozen<Value>>,
}

/// Caches a transition invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Invalidation {
    pub(crate) resolved: bool,
    pub(crate) result: bool,
}

impl Invalidation {
    pub(crate) const NONE: Self = Self {
        resolved: false,
        result: false,
    };
    pub(crate) const RESULT: Self = Self {
        resolved: false,
        result: true,
    };
    pub(crate) const ALL: Self = Self {
        resolved: true,
        result: true,
    };

    pub(crate) fn union(self, other: Self) -> Self {
        Self {
            resolved: self.resolved || other.resolved,
            result: self.result || other.result,
        }
    }
}

impl ChainState {
    pub(crate) fn bound(capability: Arc<Capability>) -> Self {
        Self {
            capability: Some(Ok(capability)),
            ..Self::default()
        }
    }

    pub(crate) fn with_capability(&self, descriptor: &CapabilityDescriptor) -> (Self, Invalidation) {
        self.with_capability_slot(validate_capability(descriptor).map(Arc::new))
    }

    pub(crate) fn with_capability_slot(&self, next: CapabilitySlot) -> (Self, Invalidation) {
        let keep_text = match (&self.capability, &next) {
            (Some(Ok(current)), Ok(incoming)) if current.same_as(incoming) => {
                return (self.clone(), Invalidation::NONE);
            }
            (Some(Ok(current)), Ok(incoming)) => current.shares_domain_with(incoming),
            (None, _) => true,
            _ => false,
        };
        let state = Self {
            capability: Some(next),
            text: if keep_text { self.text.clone() } else { None },
            raw_config: None,
        };
        (state, Invalidation::ALL)
    }

    pub(crate) fn with_text(&self, text: String) -> (Self, Invalidation) {
        if self.text.as_deref() == Some(text.as_str()) {
            return (self.clone(), Invalidation::NONE);
        }
        let state = Self {
            text: Some(text),
            ..self.clone()
        };
        (state, Invalidation::RESULT)
    }

    pub(crate) fn with_config(&self, raw: &Value) -> (Self, Invalidation) {
        if let Some(current) = &self.raw_config {
            if structurally_equal(current, raw) {
                return (self.clone(), Invalidation::NONE);
            }
        }
        let state = Self {
            raw_config: Some(freeze_borrowed(raw)),
            ..self.clone()
        };
        (state, Invalidation::ALL)
    }

    pub(crate) fn require_capability(&self) -> Result<Arc<Capability>> {
        match &self.capability {
            Some(Ok(capability)) => Ok(Arc::clone(capability)),
            Some(Err(err)) => Err(err.clone()),
            None => Err(TraceError::missing_argument("capability")),
        }
    }

    pub(crate) fn require_text(&self) -> Result<&str> {
        self.text
            .as_deref()
            .ok_or_else(|| TraceError::missing_argument("text"))
    }

    pub(crate) fn capability(&self) -> Option<&Capability> {
        match &self.capability {
            Some(Ok(capability)) => Some(capability),
            _ => None,
        }
    }

    pub(crate) fn raw_config(&self) -> Option<&Value> {
        self.raw_config.as_deref()
    }

    pub(crate) fn phase(&self, resolved: bool, completed: bool) -> ChainPhase {
        if completed {
            ChainPhase::Completed
        } else if resolved {
            ChainPhase::Resolved
        } else if self.capability.is_none() && self.text.is_none() && self.raw_config.is_none() {
            ChainPhase::Empty
        } else {
            ChainPhase::Partial
        }
    }
}
