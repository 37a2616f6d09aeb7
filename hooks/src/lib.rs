//! Hooks for the csi-nfs module, invoked by a shell-operator style hook runtime.
//!
//! `scheduler-extender-enabler` keeps the scheduler extender running only while some
//! `NFSStorageClass` restricts its workloads to a set of nodes.
//! `remove-sc-and-secrets-on-module-delete` releases and removes the module's objects after its
//! helm release has been deleted.
pub mod binding;
pub mod config;
pub mod enabler;
pub mod error;
pub mod runtime;
pub mod teardown;
pub mod values;
