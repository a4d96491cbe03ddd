use super::{ResourceAdapter, delete_via, list_via};
use crate::core::{CandidateResource, DeleteOutcome, ResourceKind, Result};
use crate::store::{DeleteOptions, ObjectStore, ResourceType};
use async_trait::async_trait;
use std::sync::Arc;

/// Adapter for core `v1` Pods.
pub struct PodAdapter {
    store: Arc<dyn ObjectStore>,
    resource: ResourceType,
    kind: ResourceKind,
}

impl PodAdapter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            resource: ResourceType::pods(),
            kind: ResourceKind::pod(),
        }
    }
}

#[async_trait]
impl ResourceAdapter for PodAdapter {
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
            &DeleteOptions::default(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TtlError;
    use crate::store::{MemoryStore, Propagation};
    use chrono::Utc;

    #[tokio::test]
    async fn test_list_and_delete_pods() {
        let store = Arc::new(MemoryStore::new());
        let pods = ResourceType::pods();
        store
            .insert(&pods, CandidateResource::new("default", "runner-1", Utc::now()))
            .await;
        let adapter = PodAdapter::new(store.clone());

        assert_eq!(adapter.list("default").await.unwrap().len(), 1);
        assert_eq!(
            adapter.delete("default", "runner-1").await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            adapter.delete("default", "runner-1").await.unwrap(),
            DeleteOutcome::AlreadyGone
        );
        assert_eq!(store.deletions().await[0].options.propagation, Propagation::Default);
    }

    #[tokio::test]
    async fn test_store_failures_become_typed_errors() {
        let store = Arc::new(MemoryStore::new());
        let pods = ResourceType::pods();
        store.fail_list(&pods, "default", "connection refused").await;
        store.fail_delete(&pods, "default", "runner-1", "forbidden").await;
        let adapter = PodAdapter::new(store);

        assert_eq!(
            adapter.list("default").await.unwrap_err(),
            TtlError::ListFailed {
                kind: "Pod".into(),
                namespace: "default".into(),
                reason: "connection refused".into(),
            }
        );
        assert_eq!(
            adapter.delete("default", "runner-1").await.unwrap_err(),
            TtlError::DeleteFailed {
                kind: "Pod".into(),
                namespace: "default".into(),
                name: "runner-1".into(),
                reason: "forbidden".into(),
            }
        );
    }
}
