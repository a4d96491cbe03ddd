use super::{ResourceAdapter, delete_via, list_via};
use crate::core::{CandidateResource, DeleteOutcome, ResourceKind, Result};
use crate::store::{DeleteOptions, ObjectStore, ResourceType};
use async_trait::async_trait;
use std::sync::Arc;

/// Adapter for `apps/v1` Deployments.
///
/// Deletes with foreground propagation: the Deployment stays visible until
/// its ReplicaSets and Pods are gone, so an expired workload never leaves
/// orphaned replicas behind.
pub struct DeploymentAdapter {
    store: Arc<dyn ObjectStore>,
    resource: ResourceType,
    kind: ResourceKind,
}

impl DeploymentAdapter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            resource: ResourceType::deployments(),
            kind: ResourceKind::deployment(),
        }
    }
}

#[async_trait]
impl ResourceAdapter for DeploymentAdapter {
    fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    async fn list(&self, namespace: &str) -> Result<Vec<CandidateResource>> {
        list_via(self.store.as_ref(), &self.resource, namespace).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome> {
        delete_via(
            self.store.as_ref(),
            &self.resource,
            namespace,
            name,
            &DeleteOptions::foreground(),
        )
        .await
    }
}
