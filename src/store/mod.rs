//! Cluster object store capability
//!
//! The narrow slice of the cluster API the adapters need: list the live
//! objects of one resource type in a namespace, and delete one by name.

pub mod kubernetes;
pub mod memory;

use crate::core::{CandidateResource, DeleteOutcome, Result};
use async_trait::async_trait;
use std::fmt;

pub use self::kubernetes::KubeStore;
pub use self::memory::{DeletionRecord, MemoryStore};

/// Group/version/kind/plural coordinates of a namespaced resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceType {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
        }
    }

    pub fn pods() -> Self {
        Self::new("", "v1", "Pod", "pods")
    }

    pub fn deployments() -> Self {
        Self::new("apps", "v1", "Deployment", "deployments")
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plural, self.api_version())
    }
}

/// How dependents of a deleted object are garbage collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Server-side default for the resource type.
    #[default]
    Default,
    Background,
    Foreground,
    Orphan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOptions {
    pub propagation: Propagation,
}

impl DeleteOptions {
    pub fn foreground() -> Self {
        Self {
            propagation: Propagation::Foreground,
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists the live objects of `resource` in `namespace`.
    ///
    /// Transport and authorization failures are returned as
    /// [`crate::core::TtlError::Store`].
    async fn list(&self, resource: &ResourceType, namespace: &str) -> Result<Vec<CandidateResource>>;

    /// Deletes one object. A missing object is `Ok(DeleteOutcome::AlreadyGone)`.
    async fn delete(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<DeleteOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_for_core_and_grouped_types() {
        assert_eq!(ResourceType::pods().api_version(), "v1");
        assert_eq!(ResourceType::deployments().api_version(), "apps/v1");
        assert_eq!(ResourceType::deployments().to_string(), "deployments.apps/v1");
    }
}
