//! Types describing the cluster objects a module leaves behind, and a client able to release and
//! remove them.
mod client;
mod error;

pub use self::client::*;
pub use self::error::Error as ClusterObjectError;

use std::fmt;

#[cfg(feature = "mockall")]
pub use self::client::MockClusterObjectClient;

/// The kinds of object removed when the module is deleted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ObjectKind {
    Secret,
    ConfigMap,
    StorageClass,
    NFSStorageClass,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::StorageClass => "StorageClass",
            Self::NFSStorageClass => "NFSStorageClass",
        };
        write!(f, "{}", kind)
    }
}

/// Identifies a single object in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterObjectRef {
    pub kind: ObjectKind,
    /// Only set for namespaced kinds.
    pub namespace: Option<String>,
    pub name: String,
}

impl ClusterObjectRef {
    pub fn cluster_scoped(kind: ObjectKind, name: &str) -> Self {
        ClusterObjectRef {
            kind,
            namespace: None,
            name: name.to_string(),
        }
    }

    pub fn namespaced(kind: ObjectKind, namespace: &str, name: &str) -> Self {
        ClusterObjectRef {
            kind,
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ClusterObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {}/{}", self.kind, namespace, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A point-in-time view of a listed object, carrying only what teardown decisions need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterObject {
    pub reference: ClusterObjectRef,
    pub finalizers: Vec<String>,
    /// The provisioner of a StorageClass. `None` for every other kind.
    pub provisioner: Option<String>,
}

impl ClusterObject {
    pub fn has_finalizers(&self) -> bool {
        !self.finalizers.is_empty()
    }
}

/// Where to look for objects of a given kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Every object of a cluster-scoped kind.
    Cluster,
    /// Objects within one namespace.
    Namespace(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        let secret = ClusterObjectRef::namespaced(ObjectKind::Secret, "d8-csi-nfs", "webhook-cert");
        assert_eq!(secret.to_string(), "Secret d8-csi-nfs/webhook-cert");

        let sc = ClusterObjectRef::cluster_scoped(ObjectKind::StorageClass, "nfs");
        assert_eq!(sc.to_string(), "StorageClass nfs");
    }
}
