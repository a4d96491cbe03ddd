//! Typed TTL policies and the pure predicates evaluated against candidates.

pub mod expiry;
pub mod extract;
pub mod matcher;

use crate::core::{Annotations, CandidateResource, ResourceKind};
use std::time::Duration;

pub use expiry::{expires_at, is_expired};
pub use extract::extract_policy;
pub use matcher::matches;

/// Validated form of a `ResourceTTL` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    pub kind: ResourceKind,
    /// Exact-name filter; `None` applies the policy to every instance.
    pub target_name: Option<String>,
    pub namespace: String,
    pub ttl: Duration,
    pub required_annotations: Annotations,
}

impl TtlPolicy {
    pub fn new(kind: ResourceKind, namespace: &str, ttl: Duration) -> Self {
        Self {
            kind,
            target_name: None,
            namespace: namespace.to_string(),
            ttl,
            required_annotations: Annotations::new(),
        }
    }

    pub fn target_name(mut self, name: &str) -> Self {
        self.target_name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        self
    }

    pub fn require_annotation(mut self, key: &str, value: &str) -> Self {
        self.required_annotations
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Whether the name filter admits `candidate`.
    pub fn selects_name(&self, candidate: &CandidateResource) -> bool {
        match &self.target_name {
            Some(name) => candidate.name == *name,
            None => true,
        }
    }
}
