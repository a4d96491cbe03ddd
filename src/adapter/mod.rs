//! Resource kind adapters
//!
//! One adapter per supported kind knows how to enumerate live instances in a
//! namespace and how to delete one by name. The reconciler only sees the
//! [`ResourceAdapter`] trait and looks adapters up in an [`AdapterRegistry`],
//! so a new kind is supported by registering another adapter.

pub mod deployment;
pub mod pod;

use crate::core::{CandidateResource, DeleteOutcome, ResourceKind, Result, TtlError};
use crate::store::{DeleteOptions, ObjectStore, ResourceType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use deployment::DeploymentAdapter;
pub use pod::PodAdapter;

#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Kind served by this adapter, matched against `spec.resourceKind`.
    fn kind(&self) -> &ResourceKind;

    /// Enumerates live instances in `namespace`.
    ///
    /// Any failure is reported as [`TtlError::ListFailed`].
    async fn list(&self, namespace: &str) -> Result<Vec<CandidateResource>>;

    /// Deletes one instance. Not-found is `Ok(DeleteOutcome::AlreadyGone)`;
    /// any other failure is [`TtlError::DeleteFailed`].
    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome>;
}

/// Lists `resource` through `store`, wrapping failures as `ListFailed`.
pub(crate) async fn list_via(
    store: &dyn ObjectStore,
    resource: &ResourceType,
    namespace: &str,
) -> Result<Vec<CandidateResource>> {
    store
        .list(resource, namespace)
        .await
        .map_err(|err| TtlError::ListFailed {
            kind: resource.kind.clone(),
            namespace: namespace.to_string(),
            reason: store_reason(err),
        })
}

/// Deletes through `store`, wrapping failures as `DeleteFailed`.
pub(crate) async fn delete_via(
    store: &dyn ObjectStore,
    resource: &ResourceType,
    namespace: &str,
    name: &str,
    options: &DeleteOptions,
) -> Result<DeleteOutcome> {
    store
        .delete(resource, namespace, name, options)
        .await
        .map_err(|err| TtlError::DeleteFailed {
            kind: resource.kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: store_reason(err),
        })
}

fn store_reason(err: TtlError) -> String {
    match err {
        TtlError::Store(reason) => reason,
        other => other.to_string(),
    }
}

/// Read-only mapping from kind to adapter, built once at startup.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ResourceKind, Arc<dyn ResourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registers `adapter` under its kind, replacing any previous adapter.
    pub fn register(&mut self, adapter: Arc<dyn ResourceAdapter>) {
        let kind = adapter.kind().clone();
        if self.adapters.insert(kind.clone(), adapter).is_some() {
            warn!(kind = %kind, "Replaced previously registered adapter");
        } else {
            debug!(kind = %kind, "Registered adapter");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, adapter: Arc<dyn ResourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Registry with the built-in `Pod` and `Deployment` adapters over `store`.
    pub fn with_default_adapters(store: Arc<dyn ObjectStore>) -> Self {
        Self::new()
            .with(Arc::new(PodAdapter::new(store.clone())))
            .with(Arc::new(DeploymentAdapter::new(store)))
    }

    /// Looks up the adapter for `kind`.
    ///
    /// # Errors
    ///
    /// [`TtlError::UnsupportedKind`] when nothing is registered for `kind`.
    pub fn get(&self, kind: &ResourceKind) -> Result<Arc<dyn ResourceAdapter>> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| TtlError::UnsupportedKind(kind.to_string()))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&ResourceKind> {
        let mut kinds: Vec<_> = self.adapters.keys().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> AdapterRegistry {
        AdapterRegistry::with_default_adapters(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_default_registry_serves_pods_and_deployments() {
        let registry = registry();
        assert_eq!(
            registry.kinds(),
            vec![&ResourceKind::deployment(), &ResourceKind::pod()]
        );
        assert_eq!(registry.get(&ResourceKind::pod()).unwrap().kind(), &ResourceKind::pod());
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let err = registry().get(&ResourceKind::new("ConfigMap")).err().unwrap();
        assert_eq!(err, TtlError::UnsupportedKind("ConfigMap".into()));
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(PodAdapter::new(store.clone())));
        registry.register(Arc::new(PodAdapter::new(store)));
        assert_eq!(registry.len(), 1);
    }
}
