/// Helper macro to avoid retyping the API group of the storage custom resources when creating
/// further string constants from it. When given no parameters, this returns the group name. When
/// given a string literal parameter it adds `/parameter` to the end.
#[macro_export]
macro_rules! storage_group {
    () => {
        "storage.deckhouse.io"
    };
    ($s:literal) => {
        concat!(storage_group!(), "/", $s)
    };
}

pub const STORAGE_GROUP: &str = storage_group!();
pub const NFS_STORAGE_CLASS_VERSION: &str = "v1alpha1";
pub const NFS_STORAGE_CLASS_API_VERSION: &str = storage_group!("v1alpha1");
pub const NFS_STORAGE_CLASS_KIND: &str = "NFSStorageClass";
pub const NFS_STORAGE_CLASS_PLURAL: &str = "nfsstorageclasses";

// Module identity as seen by the hook runtime.
pub const MODULE_NAMESPACE: &str = "d8-csi-nfs";
pub const MODULE_QUEUE: &str = "/modules/csi-nfs";

/// StorageClass provisioners owned by this module. Only storage classes with one of these
/// provisioners are removed on module deletion.
pub const ALLOWED_PROVISIONERS: &[&str] = &["nfs.csi.k8s.io"];

// Values paths. The misspelling is part of the contract with the module's templates.
pub const SCHEDULER_EXTENDER_ENABLED_VALUES_PATH: &str = "csiNfs.internal.shedulerExtenderEnabled";

// Snapshot bindings
pub const NFS_STORAGE_CLASS_SNAPSHOT: &str = "nfs-storage-classes";
pub const WORKLOAD_NODES_JQ_FILTER: &str = ".spec.workloadNodes";
