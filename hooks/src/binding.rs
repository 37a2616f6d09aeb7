//! Binding contexts delivered by the hook runtime, and the object snapshots they carry.
use kube::api::ObjectMeta;
use models::storage_class::{deserialize_lenient_workload_nodes, WorkloadNodes};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Why the runtime invoked the hook.
#[derive(Copy, Clone, Deserialize, Debug, Eq, PartialEq)]
pub enum BindingType {
    /// The initial listing of watched objects.
    Synchronization,
    /// A watched object was added, modified or deleted.
    Event,
    /// Several queued events were combined into one invocation.
    Group,
    Schedule,
    #[serde(other)]
    Other,
}

/// A single binding context. The runtime passes an array of these, oldest first.
#[derive(Clone, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BindingContext {
    #[serde(default)]
    pub binding: String,
    #[serde(rename = "type", default)]
    pub binding_type: Option<BindingType>,
    #[serde(default)]
    pub watch_event: Option<String>,
    /// Snapshots of every binding listed in `includeSnapshotsFrom`, keyed by binding name.
    #[serde(default)]
    pub snapshots: BTreeMap<String, Vec<CustomResourceSnapshot>>,
    /// The objects of a `Synchronization` context.
    #[serde(default)]
    pub objects: Vec<CustomResourceSnapshot>,
}

/// The runtime's view of one watched object at the time the hook was triggered.
#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceSnapshot {
    /// Only present when the binding keeps full objects in memory.
    #[serde(default)]
    pub object: Option<SnapshotObject>,
    /// The result of the binding's jq filter, `.spec.workloadNodes`. Missing, null and malformed
    /// results are all `None`.
    #[serde(default, deserialize_with = "deserialize_lenient_workload_nodes")]
    pub filter_result: Option<WorkloadNodes>,
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct SnapshotObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

impl CustomResourceSnapshot {
    pub fn name(&self) -> Option<&str> {
        self.object
            .as_ref()
            .and_then(|object| object.metadata.name.as_deref())
    }
}

/// Returns the most recent snapshots for `binding`.
///
/// Later contexts supersede earlier ones. A `Synchronization` context for the binding itself
/// carries its objects in `objects` when snapshots are not included.
pub fn latest_snapshots<'a>(
    contexts: &'a [BindingContext],
    binding: &str,
) -> &'a [CustomResourceSnapshot] {
    contexts
        .iter()
        .rev()
        .find_map(|context| {
            if let Some(snapshots) = context.snapshots.get(binding) {
                Some(snapshots.as_slice())
            } else if context.binding == binding
                && context.binding_type == Some(BindingType::Synchronization)
            {
                Some(context.objects.as_slice())
            } else {
                None
            }
        })
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BINDING: &str = "nfs-storage-classes";

    fn contexts(raw: serde_json::Value) -> Vec<BindingContext> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_snapshot_filter_results() {
        let snapshots: Vec<CustomResourceSnapshot> = serde_json::from_value(json!([
            {},
            {"filterResult": null},
            {"filterResult": "unexpected"},
            {"filterResult": {"nodeSelector": "not-a-map"}},
            {"filterResult": {}},
            {"filterResult": {"nodeSelector": {"disktype": "ssd"}}},
        ]))
        .unwrap();

        let filter_results: Vec<bool> = snapshots
            .iter()
            .map(|snapshot| snapshot.filter_result.is_some())
            .collect();
        assert_eq!(filter_results, vec![false, false, false, false, true, true]);
    }

    #[test]
    fn test_snapshot_name() {
        let snapshot: CustomResourceSnapshot = serde_json::from_value(json!({
            "object": {"metadata": {"name": "nfs-fast"}},
            "filterResult": {}
        }))
        .unwrap();
        assert_eq!(snapshot.name(), Some("nfs-fast"));

        assert_eq!(CustomResourceSnapshot::default().name(), None);
    }

    #[test]
    fn test_latest_snapshots_prefers_last_context() {
        let contexts = contexts(json!([
            {
                "binding": BINDING,
                "type": "Event",
                "watchEvent": "Added",
                "snapshots": {BINDING: [{"filterResult": {}}]}
            },
            {
                "binding": BINDING,
                "type": "Event",
                "watchEvent": "Modified",
                "snapshots": {BINDING: [
                    {"filterResult": {}},
                    {"filterResult": {"nodeSelector": {"matchLabels": {"a": "b"}}}}
                ]}
            }
        ]));

        assert_eq!(latest_snapshots(&contexts, BINDING).len(), 2);
        assert_eq!(contexts[1].watch_event.as_deref(), Some("Modified"));
    }

    #[test]
    fn test_latest_snapshots_from_synchronization_objects() {
        let contexts = contexts(json!([
            {
                "binding": BINDING,
                "type": "Synchronization",
                "objects": [{"filterResult": {"nodeSelector": {"zone": "a"}}}]
            }
        ]));

        let snapshots = latest_snapshots(&contexts, BINDING);
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].filter_result.is_some());
    }

    #[test]
    fn test_latest_snapshots_missing_binding() {
        let contexts = contexts(json!([
            {"binding": "other", "type": "Schedule"},
            {"binding": "something-else", "type": "Unknown"}
        ]));

        assert!(latest_snapshots(&contexts, BINDING).is_empty());
        assert_eq!(contexts[1].binding_type, Some(BindingType::Other));
        assert!(latest_snapshots(&[], BINDING).is_empty());
    }
}
