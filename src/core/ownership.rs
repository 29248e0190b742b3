//! Controller ownership checks.
//!
//! A record has at most one controlling owner. Both reconcilers use these
//! helpers to decide whether a child's owner references need a write and to
//! produce the corrected set. Nothing here touches a store.

use crate::domain::{ObjectMeta, OwnerReference};

/// How a record's controller reference differs from the desired one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipDrift {
    /// The desired owner is the controller; no write needed
    InSync,

    /// No controller reference at all
    Missing,

    /// The desired owner is referenced but not as controller
    NotController,

    /// Another owner holds the controller reference
    ForeignController,
}

impl OwnershipDrift {
    pub fn needs_update(&self) -> bool {
        !matches!(self, OwnershipDrift::InSync)
    }
}

/// The controller reference of a record, if any
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references.iter().find(|r| r.controller)
}

/// Whether `owner` is the controller of the record
pub fn is_controlled_by(meta: &ObjectMeta, owner: &OwnerReference) -> bool {
    controller_of(meta).map_or(false, |c| c.same_owner(owner))
}

/// Compare a record's owner references against the desired controller
pub fn drift(meta: &ObjectMeta, desired: &OwnerReference) -> OwnershipDrift {
    let controllers = meta.owner_references.iter().filter(|r| r.controller).count();
    if controllers > 1 {
        return OwnershipDrift::ForeignController;
    }

    match controller_of(meta) {
        Some(current) if current.same_owner(desired) => {
            if current == desired {
                OwnershipDrift::InSync
            } else {
                // Same owner, stale details (api version, deletion blocking)
                OwnershipDrift::NotController
            }
        }
        Some(_) => OwnershipDrift::ForeignController,
        None if meta.owner_references.iter().any(|r| r.same_owner(desired)) => {
            OwnershipDrift::NotController
        }
        None => OwnershipDrift::Missing,
    }
}

/// Make `desired` the sole controller of the record.
///
/// Controller references to other owners are dropped, any reference to the
/// same owner is replaced, and non-controller references to other owners are
/// kept. Returns whether the references changed.
pub fn set_controller(meta: &mut ObjectMeta, desired: &OwnerReference) -> bool {
    if drift(meta, desired) == OwnershipDrift::InSync {
        return false;
    }

    let mut controller = desired.clone();
    controller.controller = true;

    meta.owner_references.retain(|r| !r.controller && !r.same_owner(&controller));
    meta.owner_references.push(controller);
    true
}
