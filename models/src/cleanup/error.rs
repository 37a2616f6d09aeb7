use super::{ClusterObjectRef, ListScope, ObjectKind};

use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to list {} objects in {:?}: '{}'", kind, scope, source))]
    ListObjects {
        kind: ObjectKind,
        scope: ListScope,
        source: kube::Error,
    },

    #[snafu(display("Unable to remove finalizers from {}: '{}'", object, source))]
    ClearFinalizers {
        object: ClusterObjectRef,
        source: kube::Error,
    },

    #[snafu(display("Unable to delete {}: '{}'", object, source))]
    DeleteObject {
        object: ClusterObjectRef,
        source: kube::Error,
    },

    #[snafu(display("{} objects must be addressed with a namespace", kind))]
    MissingNamespace { kind: ObjectKind },
}

impl Error {
    /// The object this error concerns, if it concerns a single object.
    pub fn object(&self) -> Option<&ClusterObjectRef> {
        match self {
            Self::ClearFinalizers { object, .. } | Self::DeleteObject { object, .. } => {
                Some(object)
            }
            _ => None,
        }
    }
}
