//! Releases and removes the objects the module leaves behind once its helm release is gone.
//!
//! The sweep is best-effort. A failure on one object never prevents the remaining objects from
//! being processed, and every failure is collected so the runtime can be told to retry once the
//! sweep has finished.
use crate::error::{self, Result};
use models::cleanup::{
    ClusterObject, ClusterObjectClient, ClusterObjectError, ListScope, ObjectKind,
};
use models::constants::{ALLOWED_PROVISIONERS, MODULE_NAMESPACE};

use snafu::ensure;
use tracing::{event, instrument, Level};

/// One step of the teardown: which objects to visit and what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownPhase {
    pub kind: ObjectKind,
    pub scope: ListScope,
    /// For StorageClasses, only those with one of these provisioners are touched.
    pub provisioners: Option<Vec<String>>,
    /// Whether objects are deleted once their finalizers are cleared.
    pub delete: bool,
}

impl TeardownPhase {
    /// Clears finalizers in `namespace` and leaves deletion to the namespace's own removal.
    pub fn release_namespaced(kind: ObjectKind, namespace: &str) -> Self {
        TeardownPhase {
            kind,
            scope: ListScope::Namespace(namespace.to_string()),
            provisioners: None,
            delete: false,
        }
    }

    /// Clears finalizers on cluster-scoped objects and then deletes them.
    pub fn remove_cluster_scoped(kind: ObjectKind) -> Self {
        TeardownPhase {
            kind,
            scope: ListScope::Cluster,
            provisioners: None,
            delete: true,
        }
    }

    pub fn with_provisioners(mut self, provisioners: &[&str]) -> Self {
        self.provisioners = Some(provisioners.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Whether a listed object falls under this phase.
    pub fn selects(&self, object: &ClusterObject) -> bool {
        match &self.provisioners {
            None => true,
            Some(allowed) => object
                .provisioner
                .as_ref()
                .map(|provisioner| allowed.contains(provisioner))
                .unwrap_or(false),
        }
    }
}

/// The phases run when the module is deleted, in order.
pub fn module_teardown_phases() -> Vec<TeardownPhase> {
    vec![
        TeardownPhase::release_namespaced(ObjectKind::Secret, MODULE_NAMESPACE),
        TeardownPhase::release_namespaced(ObjectKind::ConfigMap, MODULE_NAMESPACE),
        TeardownPhase::remove_cluster_scoped(ObjectKind::StorageClass)
            .with_provisioners(ALLOWED_PROVISIONERS),
        TeardownPhase::remove_cluster_scoped(ObjectKind::NFSStorageClass),
    ]
}

/// What a single phase did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub kind: ObjectKind,
    pub finalizers_cleared: usize,
    pub deleted: usize,
    /// Objects a clear-only phase left alone because they carry no finalizers.
    pub already_released: usize,
    /// Listed objects the phase does not apply to.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub phases: Vec<PhaseOutcome>,
    pub failures: Vec<ClusterObjectError>,
}

impl TeardownReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|failure| failure.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Runs each phase in turn against the cluster.
///
/// Within a phase, an object whose finalizers could not be cleared is not deleted. Objects that
/// already have no finalizers are not patched, so repeated runs against a clean cluster make no
/// writes.
pub async fn remove_module_objects<T>(client: &T, phases: &[TeardownPhase]) -> TeardownReport
where
    T: ClusterObjectClient,
{
    let mut report = TeardownReport::default();

    for phase in phases {
        let outcome = run_phase(client, phase, &mut report.failures).await;
        event!(
            Level::INFO,
            kind = %phase.kind,
            finalizers_cleared = outcome.finalizers_cleared,
            deleted = outcome.deleted,
            already_released = outcome.already_released,
            skipped = outcome.skipped,
            "Teardown phase finished."
        );
        report.phases.push(outcome);
    }

    report
}

#[instrument(skip(client, failures), fields(kind = %phase.kind))]
async fn run_phase<T>(
    client: &T,
    phase: &TeardownPhase,
    failures: &mut Vec<ClusterObjectError>,
) -> PhaseOutcome
where
    T: ClusterObjectClient,
{
    let mut outcome = PhaseOutcome {
        kind: phase.kind,
        finalizers_cleared: 0,
        deleted: 0,
        already_released: 0,
        skipped: 0,
    };

    let objects = match client.list_objects(phase.kind, &phase.scope).await {
        Ok(objects) => objects,
        Err(err) => {
            event!(Level::ERROR, %err, "Unable to list objects, skipping phase.");
            failures.push(err);
            return outcome;
        }
    };

    for object in objects {
        if !phase.selects(&object) {
            event!(
                Level::INFO,
                object = %object.reference,
                provisioner = ?object.provisioner,
                "Object is not managed by this module, leaving it untouched."
            );
            outcome.skipped += 1;
            continue;
        }

        if object.has_finalizers() {
            event!(Level::INFO, object = %object.reference, "Removing finalizers.");
            match client.clear_finalizers(&object.reference).await {
                Ok(()) => outcome.finalizers_cleared += 1,
                Err(err) => {
                    event!(Level::ERROR, %err, "Unable to remove finalizers, not deleting.");
                    failures.push(err);
                    continue;
                }
            }
        } else if !phase.delete {
            event!(
                Level::INFO,
                object = %object.reference,
                "Object has no finalizers, nothing to release."
            );
            outcome.already_released += 1;
            continue;
        } else {
            event!(Level::INFO, object = %object.reference, "Object has no finalizers.");
        }

        if phase.delete {
            event!(Level::INFO, object = %object.reference, "Deleting object.");
            match client.delete_object(&object.reference).await {
                Ok(()) => outcome.deleted += 1,
                Err(err) => {
                    event!(Level::ERROR, %err, "Unable to delete object.");
                    failures.push(err);
                }
            }
        }
    }

    outcome
}

/// Runs the module teardown, failing if any object could not be released or removed.
pub async fn run<T>(client: &T) -> Result<TeardownReport>
where
    T: ClusterObjectClient,
{
    event!(Level::INFO, "Removing module storage classes and releasing secrets.");

    let report = remove_module_objects(client, &module_teardown_phases()).await;
    ensure!(
        report.is_complete(),
        error::TeardownIncompleteSnafu {
            failed: report.failures.len(),
            summary: report.failure_summary(),
        }
    );

    event!(Level::INFO, "Module objects removed.");
    Ok(report)
}
