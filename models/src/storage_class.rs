//! The `NFSStorageClass` custom resource, which describes an NFS share exposed to the cluster as a
//! StorageClass.
//!
//! Only `spec.workloadNodes` is interpreted by the hooks in this workspace. The remaining fields
//! are modelled so that the typed `Api<NFSStorageClass>` round-trips objects without dropping data.
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The desired state of an NFS-backed storage class.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "storage.deckhouse.io",
    kind = "NFSStorageClass",
    plural = "nfsstorageclasses",
    singular = "nfsstorageclass",
    status = "NFSStorageClassStatus",
    version = "v1alpha1",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NFSStorageClassSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<NFSStorageClassConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_options: Option<NFSStorageClassMountOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chmod_permissions: Option<String>,
    pub reclaim_policy: String,
    pub volume_binding_mode: String,
    /// Restricts the nodes on which workloads using this storage class may run. When a node
    /// selector is configured here, the scheduler extender must be running to honor it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_nodes: Option<WorkloadNodes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_cleanup: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NFSStorageClassConnection {
    pub host: String,
    pub share: String,
    pub nfs_version: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub mtls: bool,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NFSStorageClassMountOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retransmissions: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct NFSStorageClassStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The `spec.workloadNodes` section of an `NFSStorageClass`. This is also the shape of the filter
/// result the hook runtime delivers for each watched object.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadNodes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelector>,
}

impl WorkloadNodes {
    /// Returns the node selector if one is present and carries at least one key.
    pub fn effective_node_selector(&self) -> Option<&NodeSelector> {
        self.node_selector
            .as_ref()
            .filter(|selector| !selector.is_empty())
    }
}

/// A node selector as written by users.
///
/// Label-selector syntax (`matchLabels`/`matchExpressions`) is modelled explicitly, but plain label
/// maps such as `{disktype: ssd}` are kept as well, since any key at all means the user asked for
/// node placement.
///
/// A known key that is present but `null` still counts as a key, so it is kept as an empty value.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelector {
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<BTreeMap<String, String>>")]
    pub match_labels: Option<BTreeMap<String, String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<Vec<NodeSelectorRequirement>>")]
    pub match_expressions: Option<Vec<NodeSelectorRequirement>>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl NodeSelector {
    /// A selector is empty only when no key is present. `{matchLabels: {}}` is not empty.
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_none() && self.match_expressions.is_none() && self.other.is_empty()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct NodeSelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Deserializes a field that is present in the input, mapping `null` to the type's empty value.
/// Absent fields never reach this function and fall back to `None`.
fn deserialize_present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?.unwrap_or_default()))
}

/// Deserializes an optional `WorkloadNodes`, mapping payloads of any other shape to `None`.
///
/// Filter results come from a jq expression evaluated by the hook runtime, so they are not
/// guaranteed to match the schema. A malformed result is treated the same as an absent one.
pub fn deserialize_lenient_workload_nodes<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<WorkloadNodes>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }))
}
