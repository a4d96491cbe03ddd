use super::{DeleteOptions, ObjectStore, ResourceType};
use crate::core::{CandidateResource, DeleteOutcome, Result, TtlError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// A delete call observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    pub resource: ResourceType,
    pub namespace: String,
    pub name: String,
    pub options: DeleteOptions,
    pub outcome: Option<DeleteOutcome>,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    reason: String,
    /// `None` fails forever.
    remaining: Option<usize>,
}

impl InjectedFailure {
    /// Returns the failure reason if this call should fail, consuming one use.
    fn trip(&mut self) -> Option<String> {
        match &mut self.remaining {
            None => Some(self.reason.clone()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.reason.clone())
            }
        }
    }
}

type ScopeKey = (ResourceType, String);
type ObjectKey = (ResourceType, String, String);

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<ScopeKey, Vec<CandidateResource>>,
    list_failures: HashMap<ScopeKey, InjectedFailure>,
    delete_failures: HashMap<ObjectKey, InjectedFailure>,
    deletions: Vec<DeletionRecord>,
    list_calls: usize,
    latency: Option<Duration>,
}

/// In-process object store.
///
/// Keeps objects in listing order per resource type and namespace, records
/// every delete call, and can inject list/delete failures and latency. Used
/// to exercise adapters and the reconciler without a cluster.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `object` to the listing of `resource` in its namespace.
    pub async fn insert(&self, resource: &ResourceType, object: CandidateResource) {
        let mut state = self.state.write().await;
        state
            .objects
            .entry((resource.clone(), object.namespace.clone()))
            .or_default()
            .push(object);
    }

    /// Removes an object without going through `delete`, as another actor would.
    pub async fn remove(&self, resource: &ResourceType, namespace: &str, name: &str) -> bool {
        let mut state = self.state.write().await;
        remove_object(&mut state, resource, namespace, name)
    }

    pub async fn names(&self, resource: &ResourceType, namespace: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .objects
            .get(&(resource.clone(), namespace.to_string()))
            .map(|objects| objects.iter().map(|o| o.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Every `list` call on `resource`/`namespace` fails with `reason`.
    pub async fn fail_list(&self, resource: &ResourceType, namespace: &str, reason: &str) {
        self.inject_list_failure(resource, namespace, reason, None).await;
    }

    /// The next `times` list calls fail, later ones succeed.
    pub async fn fail_list_times(
        &self,
        resource: &ResourceType,
        namespace: &str,
        reason: &str,
        times: usize,
    ) {
        self.inject_list_failure(resource, namespace, reason, Some(times)).await;
    }

    /// Every `delete` call for this object fails with `reason`.
    pub async fn fail_delete(&self, resource: &ResourceType, namespace: &str, name: &str, reason: &str) {
        self.inject_delete_failure(resource, namespace, name, reason, None).await;
    }

    pub async fn fail_delete_times(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        reason: &str,
        times: usize,
    ) {
        self.inject_delete_failure(resource, namespace, name, reason, Some(times))
            .await;
    }

    /// Delay applied to every call before it touches the state.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = Some(latency);
    }

    pub async fn deletions(&self) -> Vec<DeletionRecord> {
        self.state.read().await.deletions.clone()
    }

    /// Names passed to `delete`, in call order, regardless of outcome.
    pub async fn deleted_names(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .deletions
            .iter()
            .map(|record| record.name.clone())
            .collect()
    }

    pub async fn list_calls(&self) -> usize {
        self.state.read().await.list_calls
    }

    async fn inject_list_failure(
        &self,
        resource: &ResourceType,
        namespace: &str,
        reason: &str,
        remaining: Option<usize>,
    ) {
        let mut state = self.state.write().await;
        state.list_failures.insert(
            (resource.clone(), namespace.to_string()),
            InjectedFailure {
                reason: reason.to_string(),
                remaining,
            },
        );
    }

    async fn inject_delete_failure(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        reason: &str,
        remaining: Option<usize>,
    ) {
        let mut state = self.state.write().await;
        state.delete_failures.insert(
            (resource.clone(), namespace.to_string(), name.to_string()),
            InjectedFailure {
                reason: reason.to_string(),
                remaining,
            },
        );
    }

    async fn simulate_latency(&self) {
        let latency = self.state.read().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn remove_object(state: &mut MemoryState, resource: &ResourceType, namespace: &str, name: &str) -> bool {
    let Some(objects) = state
        .objects
        .get_mut(&(resource.clone(), namespace.to_string()))
    else {
        return false;
    };
    let before = objects.len();
    objects.retain(|object| object.name != name);
    objects.len() != before
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, resource: &ResourceType, namespace: &str) -> Result<Vec<CandidateResource>> {
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        state.list_calls += 1;

        let key = (resource.clone(), namespace.to_string());
        if let Some(reason) = state.list_failures.get_mut(&key).and_then(InjectedFailure::trip) {
            return Err(TtlError::Store(reason));
        }

        Ok(state.objects.get(&key).cloned().unwrap_or_default())
    }

    async fn delete(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<DeleteOutcome> {
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        let key = (resource.clone(), namespace.to_string(), name.to_string());
        let failure = state.delete_failures.get_mut(&key).and_then(InjectedFailure::trip);

        let result = match failure {
            Some(reason) => Err(TtlError::Store(reason)),
            None if remove_object(&mut state, resource, namespace, name) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::AlreadyGone),
        };

        state.deletions.push(DeletionRecord {
            resource: resource.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            options: *options,
            outcome: result.as_ref().ok().copied(),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pod(name: &str) -> CandidateResource {
        CandidateResource::new("default", name, Utc::now())
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order_and_scope() {
        let store = MemoryStore::new();
        let pods = ResourceType::pods();
        store.insert(&pods, pod("b")).await;
        store.insert(&pods, pod("a")).await;
        store
            .insert(&pods, CandidateResource::new("other", "c", Utc::now()))
            .await;

        let listed = store.list(&pods, "default").await.unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(store.list(&ResourceType::deployments(), "default").await.unwrap().is_empty());
        assert_eq!(store.list_calls().await, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_object_is_already_gone() {
        let store = MemoryStore::new();
        let pods = ResourceType::pods();
        store.insert(&pods, pod("a")).await;

        let options = DeleteOptions::default();
        assert_eq!(
            store.delete(&pods, "default", "a", &options).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            store.delete(&pods, "default", "a", &options).await.unwrap(),
            DeleteOutcome::AlreadyGone
        );
        assert_eq!(store.deleted_names().await, vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_injected_failures_trip_the_requested_number_of_times() {
        let store = MemoryStore::new();
        let pods = ResourceType::pods();
        store.insert(&pods, pod("a")).await;
        store.fail_list_times(&pods, "default", "etcd timeout", 1).await;
        store.fail_delete(&pods, "default", "a", "forbidden").await;

        assert_eq!(
            store.list(&pods, "default").await.unwrap_err(),
            TtlError::Store("etcd timeout".into())
        );
        assert_eq!(store.list(&pods, "default").await.unwrap().len(), 1);

        let err = store
            .delete(&pods, "default", "a", &DeleteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, TtlError::Store("forbidden".into()));
        assert_eq!(store.names(&pods, "default").await, vec!["a"]);
        assert_eq!(store.deletions().await[0].outcome, None);
    }
}
