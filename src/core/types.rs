use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub type Annotations = BTreeMap<String, String>;

/// Identifier of a target resource type, e.g. `Pod` or `Deployment`.
///
/// Kinds are compared case-sensitively, the same way the API server spells them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(String);

impl ResourceKind {
    pub const POD: &'static str = "Pod";
    pub const DEPLOYMENT: &'static str = "Deployment";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn pod() -> Self {
        Self::new(Self::POD)
    }

    pub fn deployment() -> Self {
        Self::new(Self::DEPLOYMENT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// Identity of a policy object in the cluster store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    pub namespace: Option<String>,
    pub name: String,
}

impl PolicyRef {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self::new(Some(namespace), name)
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Untyped policy object as delivered by the notifier.
///
/// `body` is everything except object metadata, so the policy lives under
/// `body["spec"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyObject {
    pub id: PolicyRef,
    pub body: Value,
}

impl PolicyObject {
    pub fn new(id: PolicyRef, body: Value) -> Self {
        Self { id, body }
    }
}

/// Change notification for a policy object.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyEvent {
    Added(PolicyObject),
    Updated(PolicyObject),
    Deleted(PolicyObject),
}

impl PolicyEvent {
    pub fn object(&self) -> &PolicyObject {
        match self {
            Self::Added(object) | Self::Updated(object) | Self::Deleted(object) => object,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
        }
    }
}

/// A live resource instance considered for expiration in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateResource {
    pub name: String,
    pub namespace: String,
    pub created_at: DateTime<Utc>,
    pub annotations: Annotations,
}

impl CandidateResource {
    pub fn new(namespace: &str, name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            created_at,
            annotations: Annotations::new(),
        }
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }
}

/// Result of a successful delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// The object was already absent; treated as converged.
    AlreadyGone,
}
