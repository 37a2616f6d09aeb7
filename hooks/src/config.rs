//! Trigger configurations for the module's hooks.
//!
//! These are declarative: the runtime reads them (via `--config`) to decide when to invoke each
//! hook and which snapshots to deliver. Nothing in this crate acts on them.
use crate::error::{self, Result};
use models::constants::{
    MODULE_QUEUE, NFS_STORAGE_CLASS_API_VERSION, NFS_STORAGE_CLASS_KIND,
    NFS_STORAGE_CLASS_SNAPSHOT, WORKLOAD_NODES_JQ_FILTER,
};

use serde::{Serialize, Serializer};
use snafu::ResultExt;
use std::time::Duration;

const CONFIG_VERSION: &str = "v1";

// Minimum time between two runs of the enabler, and how many queued events may run at once.
const ENABLER_MIN_INTERVAL: Duration = Duration::from_secs(3);
const ENABLER_BURST: u32 = 1;

// Order among the hooks that run once the module's helm release has been deleted.
const TEARDOWN_AFTER_DELETE_HELM_ORDER: u32 = 10;

/// The hooks this binary provides.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Hook {
    SchedulerExtenderEnabler,
    RemoveScAndSecretsOnModuleDelete,
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SchedulerExtenderEnabler => "scheduler-extender-enabler",
            Self::RemoveScAndSecretsOnModuleDelete => "remove-sc-and-secrets-on-module-delete",
        }
    }

    pub fn config(&self) -> HookConfig {
        match self {
            Self::SchedulerExtenderEnabler => HookConfig {
                kubernetes: vec![KubernetesBinding {
                    name: NFS_STORAGE_CLASS_SNAPSHOT.to_string(),
                    api_version: NFS_STORAGE_CLASS_API_VERSION.to_string(),
                    kind: NFS_STORAGE_CLASS_KIND.to_string(),
                    include_snapshots_from: vec![NFS_STORAGE_CLASS_SNAPSHOT.to_string()],
                    execute_hook_on_event: vec![
                        WatchEvent::Added,
                        WatchEvent::Modified,
                        WatchEvent::Deleted,
                    ],
                    execute_hook_on_synchronization: true,
                    keep_full_objects_in_memory: false,
                    jq_filter: WORKLOAD_NODES_JQ_FILTER.to_string(),
                    queue: MODULE_QUEUE.to_string(),
                }],
                settings: Some(HookSettings {
                    execution_min_interval: ENABLER_MIN_INTERVAL,
                    execution_burst: ENABLER_BURST,
                }),
                ..Default::default()
            },
            Self::RemoveScAndSecretsOnModuleDelete => HookConfig {
                after_delete_helm: Some(TEARDOWN_AFTER_DELETE_HELM_ORDER),
                ..Default::default()
            },
        }
    }

    /// The configuration as the YAML document the runtime expects on stdout.
    pub fn config_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.config()).context(error::SerializeConfigSnafu)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookConfig {
    pub config_version: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kubernetes: Vec<KubernetesBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_delete_helm: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<HookSettings>,
}

impl Default for HookConfig {
    fn default() -> Self {
        HookConfig {
            config_version: CONFIG_VERSION,
            kubernetes: Vec::new(),
            after_delete_helm: None,
            settings: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesBinding {
    pub name: String,
    pub api_version: String,
    pub kind: String,
    pub include_snapshots_from: Vec<String>,
    pub execute_hook_on_event: Vec<WatchEvent>,
    pub execute_hook_on_synchronization: bool,
    pub keep_full_objects_in_memory: bool,
    pub jq_filter: String,
    pub queue: String,
}

#[derive(Copy, Clone, Debug, Serialize, PartialEq, Eq)]
pub enum WatchEvent {
    Added,
    Modified,
    Deleted,
}

/// Rate limiting the runtime applies to a hook.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookSettings {
    #[serde(serialize_with = "serialize_seconds")]
    pub execution_min_interval: Duration,
    pub execution_burst: u32,
}

fn serialize_seconds<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}s", duration.as_secs()))
}
