//! Shared value types passed between the wrappers and the capability.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Half-open character range `[start, end)` in the traced text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

/// One execution step produced by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Ordinal position of the step in its sequence.
    pub index: usize,
    pub range: SourceRange,
    /// Capability-specific payload.
    #[serde(default)]
    pub data: Value,
}

pub type StepSequence = Vec<Step>;

/// Cross-capability limits after resolution. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub max_steps: Option<u64>,
    pub max_text_length: Option<u64>,
    /// Budget the capability enforces itself; the core never imposes it.
    pub timeout_ms: Option<u64>,
}

/// Fully defaulted and validated configuration handed to `execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub limits: Limits,
    pub options: Value,
}
