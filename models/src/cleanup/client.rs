use super::error::{self, Result};
use super::{ClusterObject, ClusterObjectRef, ListScope, ObjectKind};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use snafu::{OptionExt, ResultExt};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{event, instrument, Level};

use crate::storage_class::NFSStorageClass;

#[cfg(feature = "mockall")]
use mockall::mock;

// Patches and deletes that fail with throttling or server errors are retried with exponential
// backoff. Hooks block the module queue while they run, so retries are kept short.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);
const NUM_RETRIES: usize = 3;

#[async_trait]
/// A trait providing an interface to list, release and remove the objects a module leaves behind.
/// This is provided as a trait in order to allow mocks to be used for testing purposes.
pub trait ClusterObjectClient: Send + Sync {
    /// List every object of the given kind within the scope.
    async fn list_objects(&self, kind: ObjectKind, scope: &ListScope) -> Result<Vec<ClusterObject>>;
    /// Set the object's finalizers to null so that garbage collection is no longer blocked.
    /// Succeeds if the object no longer exists.
    async fn clear_finalizers(&self, object: &ClusterObjectRef) -> Result<()>;
    /// Delete the object. Succeeds if the object no longer exists.
    async fn delete_object(&self, object: &ClusterObjectRef) -> Result<()>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock ClusterObjectClient for use in tests.
    pub ClusterObjectClient {}
    #[async_trait]
    impl ClusterObjectClient for ClusterObjectClient {
        async fn list_objects(
            &self,
            kind: ObjectKind,
            scope: &ListScope,
        ) -> Result<Vec<ClusterObject>>;
        async fn clear_finalizers(&self, object: &ClusterObjectRef) -> Result<()>;
        async fn delete_object(&self, object: &ClusterObjectRef) -> Result<()>;
    }
}

#[async_trait]
impl<T> ClusterObjectClient for Arc<T>
where
    T: ClusterObjectClient,
{
    async fn list_objects(
        &self,
        kind: ObjectKind,
        scope: &ListScope,
    ) -> Result<Vec<ClusterObject>> {
        (**self).list_objects(kind, scope).await
    }

    async fn clear_finalizers(&self, object: &ClusterObjectRef) -> Result<()> {
        (**self).clear_finalizers(object).await
    }

    async fn delete_object(&self, object: &ClusterObjectRef) -> Result<()> {
        (**self).delete_object(object).await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `ClusterObjectClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SClusterObjectClient {
    k8s_client: kube::client::Client,
}

impl K8SClusterObjectClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SClusterObjectClient { k8s_client }
    }

    fn scoped_api<K>(&self, kind: ObjectKind, scope: &ListScope) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match scope {
            ListScope::Namespace(namespace) => {
                Ok(Api::namespaced(self.k8s_client.clone(), namespace))
            }
            ListScope::Cluster => error::MissingNamespaceSnafu { kind }.fail(),
        }
    }

    fn object_api<K>(&self, object: &ClusterObjectRef) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = object
            .namespace
            .as_deref()
            .context(error::MissingNamespaceSnafu { kind: object.kind })?;
        Ok(Api::namespaced(self.k8s_client.clone(), namespace))
    }

    fn cluster_api<K>(&self) -> Api<K>
    where
        K: Resource,
        <K as Resource>::DynamicType: Default,
    {
        Api::all(self.k8s_client.clone())
    }
}

#[async_trait]
impl ClusterObjectClient for K8SClusterObjectClient {
    #[instrument(skip(self), err)]
    async fn list_objects(
        &self,
        kind: ObjectKind,
        scope: &ListScope,
    ) -> Result<Vec<ClusterObject>> {
        let listed = match kind {
            ObjectKind::Secret => {
                list_as_objects(self.scoped_api::<Secret>(kind, scope)?, kind).await
            }
            ObjectKind::ConfigMap => {
                list_as_objects(self.scoped_api::<ConfigMap>(kind, scope)?, kind).await
            }
            ObjectKind::StorageClass => {
                self.cluster_api::<StorageClass>()
                    .list(&ListParams::default())
                    .await
                    .map(|list| {
                        list.items
                            .into_iter()
                            .map(|sc| ClusterObject {
                                reference: ClusterObjectRef::cluster_scoped(kind, &sc.name_any()),
                                finalizers: sc.finalizers().to_vec(),
                                provisioner: Some(sc.provisioner.clone()),
                            })
                            .collect()
                    })
            }
            ObjectKind::NFSStorageClass => {
                list_as_objects(self.cluster_api::<NFSStorageClass>(), kind).await
            }
        };

        listed.context(error::ListObjectsSnafu {
            kind,
            scope: scope.clone(),
        })
    }

    #[instrument(skip(self, object), fields(object = %object), err)]
    async fn clear_finalizers(&self, object: &ClusterObjectRef) -> Result<()> {
        let name = object.name.as_str();
        let patched = match object.kind {
            ObjectKind::Secret => {
                patch_out_finalizers(&self.object_api::<Secret>(object)?, name).await
            }
            ObjectKind::ConfigMap => {
                patch_out_finalizers(&self.object_api::<ConfigMap>(object)?, name).await
            }
            ObjectKind::StorageClass => {
                patch_out_finalizers(&self.cluster_api::<StorageClass>(), name).await
            }
            ObjectKind::NFSStorageClass => {
                patch_out_finalizers(&self.cluster_api::<NFSStorageClass>(), name).await
            }
        };

        ignore_not_found(object, patched).context(error::ClearFinalizersSnafu {
            object: object.clone(),
        })
    }

    #[instrument(skip(self, object), fields(object = %object), err)]
    async fn delete_object(&self, object: &ClusterObjectRef) -> Result<()> {
        let name = object.name.as_str();
        let deleted = match object.kind {
            ObjectKind::Secret => delete_named(&self.object_api::<Secret>(object)?, name).await,
            ObjectKind::ConfigMap => {
                delete_named(&self.object_api::<ConfigMap>(object)?, name).await
            }
            ObjectKind::StorageClass => {
                delete_named(&self.cluster_api::<StorageClass>(), name).await
            }
            ObjectKind::NFSStorageClass => {
                delete_named(&self.cluster_api::<NFSStorageClass>(), name).await
            }
        };

        ignore_not_found(object, deleted).context(error::DeleteObjectSnafu {
            object: object.clone(),
        })
    }
}

/// Lists every object reachable through `api` and reduces each to a `ClusterObject`.
async fn list_as_objects<K>(
    api: Api<K>,
    kind: ObjectKind,
) -> std::result::Result<Vec<ClusterObject>, kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let list = api.list(&ListParams::default()).await?;
    Ok(list
        .items
        .into_iter()
        .map(|item| {
            let name = item.name_any();
            let reference = match item.namespace() {
                Some(namespace) => ClusterObjectRef::namespaced(kind, &namespace, &name),
                None => ClusterObjectRef::cluster_scoped(kind, &name),
            };
            ClusterObject {
                reference,
                finalizers: item.finalizers().to_vec(),
                provisioner: None,
            }
        })
        .collect())
}

async fn patch_out_finalizers<K>(api: &Api<K>, name: &str) -> std::result::Result<(), kube::Error>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = PatchParams::default();
    let patch = Patch::Merge(json!({ "metadata": { "finalizers": null } }));

    RetryIf::spawn(
        retry_strategy(),
        || api.patch(name, &params, &patch),
        is_transient,
    )
    .await
    .map(|_| ())
}

async fn delete_named<K>(api: &Api<K>, name: &str) -> std::result::Result<(), kube::Error>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = DeleteParams::default();

    RetryIf::spawn(retry_strategy(), || api.delete(name, &params), is_transient)
        .await
        .map(|_| ())
}

fn retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(RETRY_BASE_DELAY.as_millis() as u64)
        .max_delay(RETRY_MAX_DELAY)
        .map(jitter)
        .take(NUM_RETRIES)
}

/// Throttling, server-side failures and transport errors may succeed on a later attempt.
fn is_transient(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(response) => response.code == 429 || response.code >= 500,
        kube::Error::HyperError(_) | kube::Error::Service(_) => true,
        _ => false,
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

/// An object that disappeared since it was listed has nothing left to release.
fn ignore_not_found(
    object: &ClusterObjectRef,
    result: std::result::Result<(), kube::Error>,
) -> std::result::Result<(), kube::Error> {
    match result {
        Err(err) if is_not_found(&err) => {
            event!(Level::DEBUG, %object, "Object is already gone.");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("request failed with {}", code),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn test_transient_errors() {
        let test_cases = vec![
            (404, false),
            (403, false),
            (409, false),
            (429, true),
            (500, true),
            (503, true),
        ];

        for (code, transient) in test_cases {
            assert_eq!(is_transient(&api_error(code)), transient, "code {}", code);
        }
    }

    #[test]
    fn test_not_found_is_success() {
        let object = ClusterObjectRef::cluster_scoped(ObjectKind::StorageClass, "nfs");

        assert!(ignore_not_found(&object, Err(api_error(404))).is_ok());
        assert!(ignore_not_found(&object, Ok(())).is_ok());
        assert!(ignore_not_found(&object, Err(api_error(403))).is_err());
    }

    #[test]
    fn test_retry_strategy_is_bounded() {
        let delays: Vec<Duration> = retry_strategy().collect();
        assert_eq!(delays.len(), NUM_RETRIES);
        assert!(delays.iter().all(|delay| *delay <= RETRY_MAX_DELAY));
    }
}
