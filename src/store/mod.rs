//! Declarative record store.
//!
//! The engine talks to storage only through the [`Store`] trait: get, create
//! and update keyed by kind + identity, with optimistic concurrency on the
//! resource version. Delete and list exist for external actors (users, the
//! garbage collector, the CLI); the reconcilers never delete.
//!
//! [`Client`] layers typed access on top of any store and stamps type
//! metadata from the [`Registry`].

pub mod file;
pub mod gc;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::registry::{Registry, RegistryError};
use crate::domain::{Kind, ObjectKey, ObjectMeta, Resource, TypeMeta};

pub use file::FileStore;
pub use gc::{collect_garbage, GcReport};
pub use memory::{Fault, MemoryStore, Operation, StoreStats};

/// Errors returned by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: Kind, key: ObjectKey },

    #[error("{kind} {key} was modified concurrently (expected version {expected:?}, found {actual:?})")]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("Invalid {kind} record: {reason}")]
    Invalid { kind: Kind, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Turn `NotFound` into `Ok(None)`, keeping every other error
pub fn ignore_not_found<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Kind-agnostic record as held by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: serde_json::Value,
}

impl StoredRecord {
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}

/// Backend interface for record storage
#[async_trait]
pub trait Store: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Fetch a record; `NotFound` when absent
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<StoredRecord, StoreError>;

    /// Insert a new record; `AlreadyExists` when the identity is taken.
    ///
    /// The store assigns uid, resource version and creation timestamp.
    async fn create(&self, kind: Kind, record: StoredRecord) -> Result<StoredRecord, StoreError>;

    /// Replace an existing record.
    ///
    /// When the record carries a resource version it must match the stored
    /// one, otherwise `Conflict`. A record without a version overwrites
    /// unconditionally.
    async fn update(&self, kind: Kind, record: StoredRecord) -> Result<StoredRecord, StoreError>;

    /// Remove a record; `NotFound` when absent
    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError>;

    /// All records of a kind, optionally restricted to one namespace, ordered by key
    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
    ) -> Result<Vec<StoredRecord>, StoreError>;
}

/// Reject identities that are not a single plain name segment.
///
/// Names and namespaces double as path components in the file store, so an
/// empty value, a separator or a leading dot is refused by every backend.
pub(crate) fn check_key(kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
    check_segment(kind, "namespace", &key.namespace)?;
    check_segment(kind, "name", &key.name)
}

pub(crate) fn check_segment(kind: Kind, field: &str, value: &str) -> Result<(), StoreError> {
    let reason = if value.is_empty() {
        format!("metadata.{} must not be empty", field)
    } else if value.starts_with('.') || value.contains(['/', '\\', '\0']) {
        format!("metadata.{} '{}' is not a plain name", field, value)
    } else {
        return Ok(());
    };
    Err(StoreError::Invalid { kind, reason })
}

/// Stamp store-owned fields on a record about to be created
pub(crate) fn prepare_create(
    kind: Kind,
    mut record: StoredRecord,
    resource_version: u64,
) -> Result<StoredRecord, StoreError> {
    check_key(kind, &record.key())?;

    record.metadata.uid = Some(Uuid::new_v4());
    record.metadata.resource_version = Some(resource_version);
    record.metadata.creation_timestamp = Some(Utc::now());
    Ok(record)
}

/// Check an update against the stored record and carry over immutable fields
pub(crate) fn prepare_update(
    kind: Kind,
    current: &StoredRecord,
    mut record: StoredRecord,
    resource_version: u64,
) -> Result<StoredRecord, StoreError> {
    let key = current.key();
    let expected = record.metadata.resource_version;

    let version_moved = expected.is_some() && expected != current.metadata.resource_version;
    let replaced = record.metadata.uid.is_some() && record.metadata.uid != current.metadata.uid;
    if version_moved || replaced {
        return Err(StoreError::Conflict {
            kind,
            key,
            expected,
            actual: current.metadata.resource_version,
        });
    }

    record.metadata.uid = current.metadata.uid;
    record.metadata.creation_timestamp = current.metadata.creation_timestamp;
    record.metadata.resource_version = Some(resource_version);
    Ok(record)
}

/// Typed access to a store
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
}

impl Client {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn get<R: Resource>(&self, key: &ObjectKey) -> Result<R, StoreError> {
        let record = self.store.get(R::KIND, key).await?;
        from_stored(record)
    }

    pub async fn create<R: Resource>(&self, record: &R) -> Result<R, StoreError> {
        let stored = self.store.create(R::KIND, self.to_stored(record)?).await?;
        from_stored(stored)
    }

    pub async fn update<R: Resource>(&self, record: &R) -> Result<R, StoreError> {
        let stored = self.store.update(R::KIND, self.to_stored(record)?).await?;
        from_stored(stored)
    }

    pub async fn delete<R: Resource>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.store.delete(R::KIND, key).await
    }

    pub async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, StoreError> {
        self.store
            .list(R::KIND, namespace)
            .await?
            .into_iter()
            .map(from_stored)
            .collect()
    }

    fn to_stored<R: Resource>(&self, record: &R) -> Result<StoredRecord, StoreError> {
        Ok(StoredRecord {
            type_meta: self.registry.type_meta(R::KIND)?,
            metadata: record.metadata().clone(),
            spec: serde_json::to_value(record.spec())?,
        })
    }
}

fn from_stored<R: Resource>(record: StoredRecord) -> Result<R, StoreError> {
    let spec = serde_json::from_value(record.spec)?;
    Ok(R::from_parts(record.type_meta, record.metadata, spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> StoredRecord {
        StoredRecord {
            type_meta: TypeMeta::default(),
            metadata: ObjectMeta::new("default", name),
            spec: serde_json::json!({ "name": name }),
        }
    }

    #[test]
    fn test_prepare_create_assigns_store_fields() {
        let created = prepare_create(Kind::Planet, record("sol-earth"), 7).unwrap();
        assert!(created.metadata.uid.is_some());
        assert_eq!(created.metadata.resource_version, Some(7));
        assert!(created.metadata.creation_timestamp.is_some());
    }

    #[test]
    fn test_prepare_create_rejects_empty_name() {
        let result = prepare_create(Kind::Planet, record(""), 1);
        assert!(matches!(result, Err(StoreError::Invalid { .. })));
    }

    #[test]
    fn test_prepare_create_rejects_path_like_names() {
        for name in ["sol-a/b", "sol-..\\x", "..", ".hidden"] {
            let result = prepare_create(Kind::Planet, record(name), 1);
            assert!(
                matches!(result, Err(StoreError::Invalid { .. })),
                "{} was accepted",
                name
            );
        }

        let mut outside = record("sol-earth");
        outside.metadata.namespace = "../etc".to_string();
        let result = prepare_create(Kind::Planet, outside, 1);
        assert!(matches!(result, Err(StoreError::Invalid { .. })));
    }

    #[test]
    fn test_prepare_update_checks_version() {
        let current = prepare_create(Kind::Planet, record("sol-earth"), 3).unwrap();

        let mut stale = current.clone();
        stale.metadata.resource_version = Some(2);
        let result = prepare_update(Kind::Planet, &current, stale, 4);
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let fresh = current.clone();
        let updated = prepare_update(Kind::Planet, &current, fresh, 4).unwrap();
        assert_eq!(updated.metadata.resource_version, Some(4));
        assert_eq!(updated.metadata.uid, current.metadata.uid);
    }

    #[test]
    fn test_prepare_update_without_version_overwrites() {
        let current = prepare_create(Kind::Planet, record("sol-earth"), 3).unwrap();
        let blind = record("sol-earth");

        let updated = prepare_update(Kind::Planet, &current, blind, 4).unwrap();
        assert_eq!(updated.metadata.uid, current.metadata.uid);
        assert_eq!(updated.metadata.creation_timestamp, current.metadata.creation_timestamp);
    }

    #[test]
    fn test_prepare_update_rejects_replaced_record() {
        let current = prepare_create(Kind::Planet, record("sol-earth"), 3).unwrap();
        let mut other = current.clone();
        other.metadata.uid = Some(Uuid::new_v4());

        let result = prepare_update(Kind::Planet, &current, other, 4);
        assert!(result.unwrap_err().is_conflict());
    }

    #[test]
    fn test_ignore_not_found() {
        let missing: Result<(), StoreError> = Err(StoreError::NotFound {
            kind: Kind::Galaxy,
            key: ObjectKey::new("default", "sol"),
        });
        assert!(ignore_not_found(missing).unwrap().is_none());

        let broken: Result<(), StoreError> = Err(StoreError::Unavailable("down".to_string()));
        assert!(ignore_not_found(broken).is_err());
    }
}
