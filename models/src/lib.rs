//! Shared models for the csi-nfs module hooks: the `NFSStorageClass` custom resource, a client for
//! releasing and removing the module's cluster objects, project constants, and tracing setup.
pub mod cleanup;
pub mod constants;
pub mod storage_class;
pub mod telemetry;
