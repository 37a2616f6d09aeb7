//! Decides whether the scheduler extender must run.
//!
//! The extender is only needed when some `NFSStorageClass` restricts its workloads to particular
//! nodes. The decision is recomputed from the full set of snapshots on every invocation and
//! published to the module values, where the extender's deployment template picks it up.
use crate::binding::{latest_snapshots, CustomResourceSnapshot};
use crate::error::{self, Result};
use crate::runtime::HookEnvironment;
use crate::values::ValuesStore;
use models::constants::{NFS_STORAGE_CLASS_SNAPSHOT, SCHEDULER_EXTENDER_ENABLED_VALUES_PATH};

use serde_json::Value;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// Returns `true` if at least one snapshot carries a non-empty node selector.
///
/// Evaluation stops at the first such snapshot. Snapshots without a filter result, or whose node
/// selector is absent or empty, do not count towards enablement.
pub fn should_enable_scheduler_extender<'a, I>(snapshots: I) -> bool
where
    I: IntoIterator<Item = &'a CustomResourceSnapshot>,
{
    snapshots
        .into_iter()
        .enumerate()
        .any(|(index, snapshot)| requests_node_placement(index, snapshot))
}

fn requests_node_placement(index: usize, snapshot: &CustomResourceSnapshot) -> bool {
    let name = snapshot.name().unwrap_or("<unnamed>");

    let workload_nodes = match snapshot.filter_result.as_ref() {
        Some(workload_nodes) => workload_nodes,
        None => {
            event!(Level::INFO, index, name, "Filter result is empty.");
            return false;
        }
    };

    match workload_nodes.effective_node_selector() {
        Some(node_selector) => {
            event!(
                Level::INFO,
                index,
                name,
                ?node_selector,
                "NodeSelector is not empty. Scheduler extender should be enabled."
            );
            true
        }
        None => {
            event!(Level::INFO, index, name, "NodeSelector is empty.");
            false
        }
    }
}

/// Computes the enablement flag for `snapshots` and writes it to the module values.
#[instrument(skip_all, fields(snapshots = snapshots.len()), err)]
pub fn publish_scheduler_extender_enabled<V>(
    snapshots: &[CustomResourceSnapshot],
    values: &mut V,
) -> Result<bool>
where
    V: ValuesStore,
{
    let enabled = should_enable_scheduler_extender(snapshots);
    if enabled {
        event!(Level::INFO, "Enabling scheduler extender.");
    } else {
        event!(Level::INFO, "Disabling scheduler extender.");
    }

    values
        .set(SCHEDULER_EXTENDER_ENABLED_VALUES_PATH, Value::Bool(enabled))
        .context(error::SetValueSnafu)?;
    Ok(enabled)
}

/// Runs the hook against the files provided by the runtime.
pub fn run(environment: &HookEnvironment) -> Result<bool> {
    event!(Level::INFO, "Scheduler extender enabler hook started.");

    let contexts = environment.read_binding_contexts()?;
    let snapshots = latest_snapshots(&contexts, NFS_STORAGE_CLASS_SNAPSHOT);
    if snapshots.is_empty() {
        event!(Level::INFO, "No NFSStorageClass snapshots found.");
    }

    let mut values = environment.read_values()?;
    let enabled = publish_scheduler_extender_enabled(snapshots, &mut values)?;
    environment.write_values_patch(&values)?;

    Ok(enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::PatchableValues;
    use serde_json::json;

    fn snapshots(raw: Value) -> Vec<CustomResourceSnapshot> {
        serde_json::from_value(raw).unwrap()
    }

    fn stored_flag(values: &PatchableValues) -> Value {
        values.get(SCHEDULER_EXTENDER_ENABLED_VALUES_PATH, Value::Null)
    }

    #[test]
    fn test_no_snapshots_disables() {
        assert!(!should_enable_scheduler_extender(std::iter::empty()));

        let mut values = PatchableValues::default();
        assert!(!publish_scheduler_extender_enabled(&[], &mut values).unwrap());
        assert_eq!(stored_flag(&values), json!(false));
    }

    #[test]
    fn test_empty_filter_result_disables() {
        let snapshots = snapshots(json!([{"filterResult": {}}]));
        assert!(!should_enable_scheduler_extender(&snapshots));
    }

    #[test]
    fn test_empty_node_selector_disables() {
        let snapshots = snapshots(json!([{"filterResult": {"nodeSelector": {}}}]));
        assert!(!should_enable_scheduler_extender(&snapshots));
    }

    #[test]
    fn test_one_non_empty_selector_enables() {
        let snapshots = snapshots(json!([
            {"filterResult": {"nodeSelector": {"disktype": "ssd"}}},
            {"filterResult": {}}
        ]));
        assert!(should_enable_scheduler_extender(&snapshots));

        let mut values = PatchableValues::default();
        assert!(publish_scheduler_extender_enabled(&snapshots, &mut values).unwrap());
        assert_eq!(stored_flag(&values), json!(true));
    }

    #[test]
    fn test_malformed_snapshots_do_not_vote() {
        let snapshots = snapshots(json!([
            {},
            {"filterResult": null},
            {"filterResult": ["not", "an", "object"]},
            {"filterResult": {"nodeSelector": null}},
            {"filterResult": {"nodeSelector": 42}}
        ]));
        assert!(!should_enable_scheduler_extender(&snapshots));
    }

    #[test]
    fn test_label_selector_syntax_enables() {
        let test_cases = vec![
            json!({"matchLabels": {"kubernetes.io/hostname": "node-1"}}),
            json!({"matchExpressions": [{"key": "zone", "operator": "In", "values": ["a"]}]}),
            json!({"matchLabels": {}}),
            json!({"matchLabels": null}),
        ];

        for node_selector in test_cases {
            let snapshots = snapshots(json!([{"filterResult": {"nodeSelector": node_selector}}]));
            assert!(
                should_enable_scheduler_extender(&snapshots),
                "selector: {}",
                node_selector
            );
        }
    }

    #[test]
    fn test_decision_is_order_independent() {
        let mut snapshots = snapshots(json!([
            {"filterResult": {}},
            {"filterResult": {"nodeSelector": {}}},
            {"filterResult": {"nodeSelector": {"matchLabels": {"zone": "a"}}}},
            {}
        ]));

        for _ in 0..snapshots.len() {
            assert!(should_enable_scheduler_extender(&snapshots));
            snapshots.rotate_left(1);
        }
        snapshots.reverse();
        assert!(should_enable_scheduler_extender(&snapshots));
    }

    #[test]
    fn test_publish_is_idempotent() {
        let snapshots = snapshots(json!([{"filterResult": {"nodeSelector": {"zone": "a"}}}]));
        let mut values = PatchableValues::new(json!({"csiNfs": {"internal": {}}}));

        let first = publish_scheduler_extender_enabled(&snapshots, &mut values).unwrap();
        let after_first = stored_flag(&values);
        let second = publish_scheduler_extender_enabled(&snapshots, &mut values).unwrap();

        assert_eq!(first, second);
        assert_eq!(after_first, stored_flag(&values));
        assert!(values
            .patches()
            .iter()
            .all(|patch| patch.path == "/csiNfs/internal/shedulerExtenderEnabled"
                && patch.value == json!(true)));
    }

    #[test]
    fn test_flag_is_overwritten() {
        let mut values = PatchableValues::new(json!({
            "csiNfs": {"internal": {"shedulerExtenderEnabled": true}}
        }));

        let enabled = publish_scheduler_extender_enabled(&[], &mut values).unwrap();

        assert!(!enabled);
        assert_eq!(stored_flag(&values), json!(false));
    }
}
