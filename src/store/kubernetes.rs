use super::{DeleteOptions, ObjectStore, Propagation, ResourceType};
use crate::core::{CandidateResource, DeleteOutcome, Result, TtlError};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams};
use kube::{Api, Client};
use tracing::{debug, warn};

/// Page size for list calls against the API server.
const LIST_PAGE_SIZE: u32 = 500;

/// [`ObjectStore`] backed by the Kubernetes API through the dynamic client.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").field("client", &"kube::Client").finish()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ResourceType, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(resource))
    }
}

pub fn api_resource(resource: &ResourceType) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
    ApiResource::from_gvk_with_plural(&gvk, &resource.plural)
}

fn delete_params(options: &DeleteOptions) -> DeleteParams {
    match options.propagation {
        Propagation::Default => DeleteParams::default(),
        Propagation::Background => DeleteParams::background(),
        Propagation::Foreground => DeleteParams::foreground(),
        Propagation::Orphan => DeleteParams::orphan(),
    }
}

/// Builds a candidate from object metadata.
///
/// Objects without a name or creation timestamp cannot be evaluated and
/// yield `None`, as do objects already terminating (`deletionTimestamp`
/// set).
pub fn candidate_from_meta(meta: &ObjectMeta, namespace: &str) -> Option<CandidateResource> {
    if is_terminating(meta) {
        return None;
    }
    let name = meta.name.as_ref()?;
    let created_at = meta.creation_timestamp.as_ref()?.0;

    Some(CandidateResource {
        name: name.clone(),
        namespace: meta.namespace.clone().unwrap_or_else(|| namespace.to_string()),
        created_at,
        annotations: meta.annotations.clone().unwrap_or_default(),
    })
}

fn is_terminating(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn list(&self, resource: &ResourceType, namespace: &str) -> Result<Vec<CandidateResource>> {
        let api = self.api(resource, namespace);
        let mut candidates = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
            if let Some(token) = &continue_token {
                params = params.continue_token(token);
            }

            let page = api
                .list(&params)
                .await
                .map_err(|err| TtlError::Store(err.to_string()))?;

            for object in &page.items {
                match candidate_from_meta(&object.metadata, namespace) {
                    Some(candidate) => candidates.push(candidate),
                    None if is_terminating(&object.metadata) => debug!(
                        resource = %resource,
                        namespace,
                        name = ?object.metadata.name,
                        "Skipping object already being deleted"
                    ),
                    None => warn!(
                        resource = %resource,
                        namespace,
                        name = ?object.metadata.name,
                        "Skipping object without name or creation timestamp"
                    ),
                }
            }

            continue_token = page.metadata.continue_.filter(|token| !token.is_empty());
            if continue_token.is_none() {
                break;
            }
        }

        Ok(candidates)
    }

    async fn delete(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<DeleteOutcome> {
        let api = self.api(resource, namespace);
        match api.delete(name, &delete_params(options)).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(DeleteOutcome::AlreadyGone),
            Err(err) => Err(TtlError::Store(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use std::collections::BTreeMap;

    #[test]
    fn test_api_resource_for_core_and_grouped_types() {
        let pods = api_resource(&ResourceType::pods());
        assert_eq!(pods.api_version, "v1");
        assert_eq!(pods.plural, "pods");

        let deployments = api_resource(&ResourceType::deployments());
        assert_eq!(deployments.api_version, "apps/v1");
        assert_eq!(deployments.kind, "Deployment");
    }

    #[test]
    fn test_candidate_from_meta_copies_fields() {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let meta = ObjectMeta {
            name: Some("worker-1".into()),
            namespace: Some("jobs".into()),
            creation_timestamp: Some(Time(created)),
            annotations: Some(BTreeMap::from([("app".to_string(), "batch".to_string())])),
            ..ObjectMeta::default()
        };

        let candidate = candidate_from_meta(&meta, "fallback").unwrap();
        assert_eq!(candidate.name, "worker-1");
        assert_eq!(candidate.namespace, "jobs");
        assert_eq!(candidate.created_at, created);
        assert_eq!(candidate.annotations["app"], "batch");
    }

    #[test]
    fn test_candidate_without_timestamp_is_dropped() {
        let meta = ObjectMeta {
            name: Some("worker-1".into()),
            ..ObjectMeta::default()
        };
        assert!(candidate_from_meta(&meta, "jobs").is_none());
    }

    #[test]
    fn test_terminating_object_is_not_a_candidate() {
        let meta = ObjectMeta {
            name: Some("terminating-pod".into()),
            namespace: Some("default".into()),
            creation_timestamp: Some(Time(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())),
            deletion_timestamp: Some(Time(Utc::now())),
            ..ObjectMeta::default()
        };
        assert!(is_terminating(&meta));
        assert!(candidate_from_meta(&meta, "default").is_none());
    }

    #[test]
    fn test_delete_params_follow_propagation() {
        let params = delete_params(&DeleteOptions::foreground());
        assert!(params.propagation_policy.is_some());
        assert!(delete_params(&DeleteOptions::default()).propagation_policy.is_none());
    }
}
