//! Closed error taxonomy shared by every wrapper protocol.
//!
//! Capability code returns `anyhow::Result`; [`TraceError::classify`] maps
//! whatever comes back onto the taxonomy so callers only ever see one of
//! the kinds below.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Erased cause carried by [`TraceError::Internal`].
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Position inside the traced source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Character offset from the start of the text.
    pub offset: usize,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl SourcePosition {
    pub fn at(offset: usize) -> Self {
        Self {
            offset,
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{line}:{column}"),
            _ => write!(f, "offset {}", self.offset),
        }
    }
}

/// Fieldless mirror of [`TraceError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CapabilityContract,
    ArgumentType,
    ConfigSchema,
    ConfigSemantic,
    Parse,
    Execution,
    LimitExceeded,
    Internal,
}

/// Every failure a wrapper can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TraceError {
    /// The capability object does not have the required shape.
    #[error("capability contract violated: {}", .violations.join("; "))]
    CapabilityContract { violations: Vec<String> },

    /// A single call argument is missing or has the wrong type.
    #[error("invalid argument '{field}': {message}")]
    ArgumentType { field: String, message: String },

    /// The configuration does not satisfy its schema.
    #[error("configuration schema violated: {}", .violations.join("; "))]
    ConfigSchema { violations: Vec<String> },

    /// The capability's own semantic validator rejected the options.
    #[error("configuration rejected: {message}")]
    ConfigSemantic { message: String },

    #[error("parse failure{}: {message}", position_suffix(.position))]
    Parse {
        message: String,
        position: Option<SourcePosition>,
    },

    #[error("execution failure{}: {message}", position_suffix(.position))]
    Execution {
        message: String,
        position: Option<SourcePosition>,
    },

    /// A configured limit was exceeded.
    #[error("limit '{limit}' exceeded (observed {observed})")]
    LimitExceeded { limit: String, observed: Value },

    /// Anything outside the taxonomy, with the original error as cause.
    #[error("internal failure: {message}")]
    Internal {
        message: String,
        #[source]
        cause: Cause,
    },
}

fn position_suffix(position: &Option<SourcePosition>) -> String {
    position
        .map(|pos| format!(" at {pos}"))
        .unwrap_or_default()
}

impl TraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilityContract { .. } => ErrorKind::CapabilityContract,
            Self::ArgumentType { .. } => ErrorKind::ArgumentType,
            Self::ConfigSchema { .. } => ErrorKind::ConfigSchema,
            Self::ConfigSemantic { .. } => ErrorKind::ConfigSemantic,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Contract and argument violations are bugs in the calling code, not
    /// problems with the traced content.
    pub fn is_developer_facing(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CapabilityContract | ErrorKind::ArgumentType
        )
    }

    /// Source position, for the content-facing kinds that carry one.
    pub fn position(&self) -> Option<SourcePosition> {
        match self {
            Self::Parse { position, .. } | Self::Execution { position, .. } => *position,
            _ => None,
        }
    }

    pub fn missing_argument(field: &str) -> Self {
        Self::ArgumentType {
            field: field.to_string(),
            message: "required argument is missing".to_string(),
        }
    }

    pub fn internal<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Internal {
            message: cause.to_string(),
            cause: Arc::new(cause),
        }
    }

    /// Map an error raised by capability code onto the taxonomy.
    ///
    /// Known kinds pass through unchanged; anything else becomes
    /// [`TraceError::Internal`] with the original error as cause.
    pub fn classify(err: anyhow::Error) -> Self {
        match err.downcast::<TraceError>() {
            Ok(known) => known,
            Err(foreign) => {
                let message = format!("{foreign:#}");
                let boxed: Box<dyn StdError + Send + Sync + 'static> = foreign.into();
                Self::Internal {
                    message,
                    cause: Arc::from(boxed),
                }
            }
        }
    }

    /// Prefix every schema violation path with the configuration axis it
    /// was resolved under (`limits`, `options`).
    pub(crate) fn scoped(self, axis: &str) -> Self {
        match self {
            Self::ConfigSchema { violations } => Self::ConfigSchema {
                violations: violations
                    .into_iter()
                    .map(|violation| format!("{axis}{violation}"))
                    .collect(),
            },
            other => other,
        }
    }
}

pub type Result<T, E = TraceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn classify_passes_known_kinds_through() {
        let err = anyhow::Error::new(TraceError::Parse {
            message: "unexpected ')'".to_string(),
            position: Some(SourcePosition::at(3)),
        });
        let classified = TraceError::classify(err);
        assert_eq!(classified.kind(), ErrorKind::Parse);
        assert_eq!(classified.position(), Some(SourcePosition::at(3)));
    }

    #[test]
    fn classify_wraps_foreign_errors_as_internal() {
        let classified = TraceError::classify(anyhow!("disk on fire"));
        assert_eq!(classified.kind(), ErrorKind::Internal);
        let source = classified.source().expect("cause");
        assert!(source.to_string().contains("disk on fire"));
    }

    #[test]
    fn scoped_prefixes_schema_paths_only() {
        let err = TraceError::ConfigSchema {
            violations: vec!["/maxSteps: must be >= 1".to_string()],
        }
        .scoped("limits");
        match err {
            TraceError::ConfigSchema { violations } => {
                assert_eq!(violations, vec!["limits/maxSteps: must be >= 1".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let untouched = TraceError::missing_argument("text").scoped("limits");
        assert_eq!(untouched.kind(), ErrorKind::ArgumentType);
    }

    #[test]
    fn display_includes_position_when_present() {
        let err = TraceError::Execution {
            message: "stack overflow".to_string(),
            position: Some(SourcePosition {
                offset: 10,
                line: Some(2),
                column: Some(4),
            }),
        };
        assert_eq!(err.to_string(), "execution failure at 2:4: stack overflow");
        assert!(!err.is_developer_facing());
        assert!(TraceError::missing_argument("text").is_developer_facing());
    }
}
