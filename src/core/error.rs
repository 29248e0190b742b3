//! Reconciliation errors.
//!
//! Only conditions the caller must act on (by redelivering the request) end
//! up here. Missing targets, create races and a single update conflict are
//! absorbed inside the reconcilers.

use thiserror::Error;

use super::projector::ProjectionError;
use super::registry::RegistryError;
use crate::domain::{Kind, ObjectKey};
use crate::store::StoreError;

/// Errors surfaced by a reconcile invocation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A planet's back-reference label points at a galaxy that does not exist
    #[error("Planet {planet} belongs to galaxy {galaxy}, which does not exist")]
    DependencyMissing { planet: ObjectKey, galaxy: ObjectKey },

    /// The record kept changing underneath the re-fetch-and-reapply attempt
    #[error("{kind} {key} is still conflicting after a re-fetch")]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    InvalidItems(#[from] ProjectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    pub fn is_dependency_missing(&self) -> bool {
        matches!(self, ReconcileError::DependencyMissing { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Conflict { .. })
    }
}
