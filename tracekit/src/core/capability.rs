//! Capability descriptors and their structural validation.
//!
//! A [`CapabilityDescriptor`] is whatever the caller hands in: a JSON
//! manifest that may have any shape, plus two invocable slots. The only way
//! to obtain a [`Capability`] is [`validate_capability`], so every wrapper
//! that holds one is guaranteed to hold a validated one.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::pipeline::CompiledSchema;
use crate::core::types::{ResolvedConfig, StepSequence};
use crate::error::{Result, TraceError};

/// The external tracing capability: turns source text into steps.
///
/// Errors may be any `anyhow::Error`. Returning a [`TraceError`] keeps its
/// kind; anything else is reported as an internal failure.
#[async_trait]
pub trait Tracer: Send + Sync {
    async fn execute(&self, text: &str, config: &ResolvedConfig) -> anyhow::Result<StepSequence>;
}

/// Capability-defined check of resolved options, run once before `execute`.
pub type SemanticValidator = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Unvalidated capability as supplied by the caller.
#[derive(Clone, Default)]
pub struct CapabilityDescriptor {
    /// Record with `identity`, `supportedDomains` and optional `optionsSchema`.
    pub manifest: Value,
    pub execute: Option<Arc<dyn Tracer>>,
    pub semantic_validator: Option<SemanticValidator>,
}

impl CapabilityDescriptor {
    pub fn new(manifest: Value, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            manifest,
            execute: Some(tracer),
            semantic_validator: None,
        }
    }

    pub fn with_semantic_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.semantic_validator = Some(Arc::new(validator));
        self
    }

    /// Identity as written in the manifest, if it is a string.
    pub fn identity(&self) -> Option<&str> {
        self.manifest.get("identity").and_then(Value::as_str)
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("manifest", &self.manifest)
            .field("execute", &self.execute.is_some())
            .field("semantic_validator", &self.semantic_validator.is_some())
            .finish()
    }
}

/// A descriptor that passed [`validate_capability`].
#[derive(Clone)]
pub struct Capability {
    identity: String,
    supported_domains: Vec<String>,
    tracer: Arc<dyn Tracer>,
    options_schema: Option<CompiledSchema>,
    semantic_validator: Option<SemanticValidator>,
    descriptor: CapabilityDescriptor,
}

impl Capability {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Declared domain tags. Empty means the capability is universal.
    pub fn supported_domains(&self) -> &[String] {
        &self.supported_domains
    }

    pub fn is_universal(&self) -> bool {
        self.supported_domains.is_empty()
    }

    pub fn options_schema(&self) -> Option<&Value> {
        self.options_schema.as_ref().map(CompiledSchema::schema)
    }

    pub(crate) fn compiled_options(&self) -> Option<&CompiledSchema> {
        self.options_schema.as_ref()
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub(crate) fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Run the semantic validator, if any. Foreign errors are reported as
    /// semantic violations; taxonomy errors keep their kind.
    pub(crate) fn check_semantics(&self, options: &Value) -> Result<()> {
        let Some(validator) = &self.semantic_validator else {
            return Ok(());
        };
        validator(options).map_err(|err| match err.downcast::<TraceError>() {
            Ok(known) => known,
            Err(foreign) => TraceError::ConfigSemantic {
                message: format!("{foreign:#}"),
            },
        })
    }

    /// Whether both were validated from the same descriptor: same manifest,
    /// same tracer, same semantic validator.
    pub fn same_as(&self, other: &Capability) -> bool {
        let validators_match = match (&self.semantic_validator, &other.semantic_validator) {
            (None, None) => true,
            (Some(a), Some(b)) => same_allocation(a, b),
            _ => false,
        };
        same_allocation(&self.tracer, &other.tracer)
            && validators_match
            && self.descriptor.manifest == other.descriptor.manifest
    }

    /// Whether text accumulated for `self` can be carried over to `next`.
    ///
    /// True when both share an identity, either one is universal, or their
    /// domain sets intersect.
    pub fn shares_domain_with(&self, next: &Capability) -> bool {
        if self.identity == next.identity || self.is_universal() || next.is_universal() {
            return true;
        }
        self.supported_domains
            .iter()
            .any(|domain| next.supported_domains.contains(domain))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("identity", &self.identity)
            .field("supported_domains", &self.supported_domains)
            .field("options_schema", &self.options_schema.is_some())
            .field("semantic_validator", &self.semantic_validator.is_some())
            .finish()
    }
}

fn same_allocation<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Check a descriptor against the capability contract.
///
/// Only the "manifest is a record" check short-circuits; every other check
/// runs so the error lists all violations at once.
pub fn validate_capability(descriptor: &CapabilityDescriptor) -> Result<Capability> {
    let Value::Object(manifest) = &descriptor.manifest else {
        return Err(TraceError::CapabilityContract {
            violations: vec!["capability must be an object".to_string()],
        });
    };
    let mut violations = Vec::new();

    let identity = match manifest.get("identity") {
        Some(Value::String(identity)) if !identity.trim().is_empty() => identity.clone(),
        _ => {
            violations.push("identity must be a non-empty string".to_string());
            String::new()
        }
    };

    let mut supported_domains = Vec::new();
    match manifest.get("supportedDomains") {
        Some(Value::Array(tags)) => {
            let mut seen = HashSet::new();
            for (position, tag) in tags.iter().enumerate() {
                match tag.as_str() {
                    Some(tag) if seen.insert(tag) => supported_domains.push(tag.to_string()),
                    Some(tag) => violations.push(format!(
                        "supportedDomains[{position}] duplicates '{tag}'"
                    )),
                    None => violations.push(format!("supportedDomains[{position}] must be a string")),
                }
            }
        }
        _ => violations.push("supportedDomains must be an array of strings".to_string()),
    }

    if descriptor.execute.is_none() {
        violations.push("execute must be provided".to_string());
    }

    let options_schema = match manifest.get("optionsSchema") {
        None | Some(Value::Null) => None,
        Some(schema @ Value::Object(_)) => match CompiledSchema::compile(schema) {
            Ok(compiled) => Some(compiled),
            Err(message) => {
                violations.push(format!("optionsSchema is not a valid schema: {message}"));
                None
            }
        },
        Some(_) => {
            violations.push("optionsSchema must be a schema object".to_string());
            None
        }
    };

    if !matches!(manifest.get("semanticValidator"), None | Some(Value::Null)) {
        violations.push(
            "semanticValidator must be supplied as a function, not in the manifest".to_string(),
        );
    }

    match (&descriptor.execute, violations.is_empty()) {
        (Some(tracer), true) => Ok(Capability {
            identity,
            supported_domains,
            tracer: Arc::clone(tracer),
            options_schema,
            semantic_validator: descriptor.semantic_validator.clone(),
            descriptor: descriptor.clone(),
        }),
        _ => Err(TraceError::CapabilityContract { violations }),
    }
}
