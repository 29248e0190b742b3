//! In-process store.
//!
//! Keeps records in an ordered map behind an async mutex. Besides backing
//! tests and embedded use, it counts operations and can be told to fail the
//! next matching call, which is how races and outages are simulated.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{prepare_create, prepare_update, Store, StoreError, StoredRecord};
use crate::domain::{Kind, ObjectKey};

/// Store operations, for fault targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Create,
    Update,
    Delete,
    List,
}

/// Failure to inject into a single upcoming operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    NotFound,
    AlreadyExists,
    Conflict,
    Unavailable(String),
}

impl Fault {
    fn into_error(self, kind: Kind, key: ObjectKey) -> StoreError {
        match self {
            Fault::NotFound => StoreError::NotFound { kind, key },
            Fault::AlreadyExists => StoreError::AlreadyExists { kind, key },
            Fault::Conflict => StoreError::Conflict {
                kind,
                key,
                expected: None,
                actual: None,
            },
            Fault::Unavailable(reason) => StoreError::Unavailable(reason),
        }
    }
}

/// Counts of successful operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub gets: u64,
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
    pub lists: u64,
}

impl StoreStats {
    /// Creates + updates + deletes
    pub fn writes(&self) -> u64 {
        self.creates + self.updates + self.deletes
    }
}

#[derive(Default)]
struct State {
    records: BTreeMap<(Kind, ObjectKey), StoredRecord>,
    last_version: u64,
    stats: StoreStats,
    faults: VecDeque<(Operation, Kind, Fault)>,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn take_fault(&mut self, op: Operation, kind: Kind) -> Option<Fault> {
        let idx = self
            .faults
            .iter()
            .position(|(o, k, _)| *o == op && *k == kind)?;
        self.faults.remove(idx).map(|(_, _, fault)| fault)
    }
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `op` on `kind` with `fault`.
    ///
    /// Faults queue up; each one is consumed by the first matching call and
    /// that call has no other effect.
    pub async fn fail_next(&self, op: Operation, kind: Kind, fault: Fault) {
        self.state.lock().await.faults.push_back((op, kind, fault));
    }

    /// Operation counts so far
    pub async fn stats(&self) -> StoreStats {
        self.state.lock().await.stats
    }

    /// Zero the operation counters
    pub async fn reset_stats(&self) {
        self.state.lock().await.stats = StoreStats::default();
    }

    /// Number of records of a kind
    pub async fn count(&self, kind: Kind) -> usize {
        self.state
            .lock()
            .await
            .records
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<StoredRecord, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(fault) = state.take_fault(Operation::Get, kind) {
            return Err(fault.into_error(kind, key.clone()));
        }

        let record = state
            .records
            .get(&(kind, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;

        state.stats.gets += 1;
        Ok(record)
    }

    async fn create(&self, kind: Kind, record: StoredRecord) -> Result<StoredRecord, StoreError> {
        let mut state = self.state.lock().await;
        let key = record.key();
        if let Some(fault) = state.take_fault(Operation::Create, kind) {
            return Err(fault.into_error(kind, key));
        }

        if state.records.contains_key(&(kind, key.clone())) {
            return Err(StoreError::AlreadyExists { kind, key });
        }

        let version = state.next_version();
        let created = prepare_create(kind, record, version)?;
        state.records.insert((kind, key), created.clone());
        state.stats.creates += 1;
        Ok(created)
    }

    async fn update(&self, kind: Kind, record: StoredRecord) -> Result<StoredRecord, StoreError> {
        let mut state = self.state.lock().await;
        let key = record.key();
        if let Some(fault) = state.take_fault(Operation::Update, kind) {
            return Err(fault.into_error(kind, key));
        }

        let current = state
            .records
            .get(&(kind, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;

        let version = state.next_version();
        let updated = prepare_update(kind, &current, record, version)?;
        state.records.insert((kind, key), updated.clone());
        state.stats.updates += 1;
        Ok(updated)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(fault) = state.take_fault(Operation::Delete, kind) {
            return Err(fault.into_error(kind, key.clone()));
        }

        state
            .records
            .remove(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;

        state.stats.deletes += 1;
        Ok(())
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(fault) = state.take_fault(Operation::List, kind) {
            let key = ObjectKey::new(namespace.unwrap_or_default(), "");
            return Err(fault.into_error(kind, key));
        }

        let records = state
            .records
            .iter()
            .filter(|((k, key), _)| {
                *k == kind && namespace.map_or(true, |ns| key.namespace == ns)
            })
            .map(|(_, record)| record.clone())
            .collect();

        state.stats.lists += 1;
        Ok(records)
    }
}
