//! On-disk store.
//!
//! Layout: `<root>/<plural>/<namespace>/<name>.json`, one pretty-printed JSON
//! record per file. Every operation runs on the blocking pool under an
//! exclusive lock on `<root>/.lock`, so read-modify-write is atomic across
//! processes sharing the directory. Writes go through a temp file + rename.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;

use super::{
    check_key, check_segment, prepare_create, prepare_update, Store, StoreError, StoredRecord,
};
use crate::domain::{Kind, ObjectKey};

const LOCK_FILE: &str = ".lock";
const RECORD_EXT: &str = "json";

/// Store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding a record
    pub fn record_path(&self, kind: Kind, key: &ObjectKey) -> PathBuf {
        record_path(&self.root, kind, key)
    }

    /// Map a file path inside the store back to the record it holds.
    ///
    /// Returns `None` for anything that is not a record file (lock file,
    /// temp files, unknown directories).
    pub fn parse_path(&self, path: &Path) -> Option<(Kind, ObjectKey)> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts = relative.iter().map(|p| p.to_str());

        let kind = Kind::from_plural(parts.next()??)?;
        let namespace = parts.next()??;
        let file = Path::new(parts.next()??);
        if parts.next().is_some() {
            return None;
        }

        if file.extension()?.to_str()? != RECORD_EXT {
            return None;
        }
        let name = file.file_stem()?.to_str()?;
        if name.starts_with('.') || name.is_empty() {
            return None;
        }

        Some((kind, ObjectKey::new(namespace, name)))
    }

    async fn locked<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let lock = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(root.join(LOCK_FILE))?;
            lock.lock_exclusive()?;

            // Lock is released when the file is dropped
            op(&root)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

fn record_path(root: &Path, kind: Kind, key: &ObjectKey) -> PathBuf {
    root.join(kind.plural())
        .join(&key.namespace)
        .join(format!("{}.{}", key.name, RECORD_EXT))
}

/// Record path for a key that is known to stay inside its kind/namespace directory
fn checked_path(root: &Path, kind: Kind, key: &ObjectKey) -> Result<PathBuf, StoreError> {
    check_key(kind, key)?;
    Ok(record_path(root, kind, key))
}

fn read_record(path: &Path) -> Result<Option<StoredRecord>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_record(path: &Path, record: &StoredRecord) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension(format!("{}.tmp", RECORD_EXT));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_dir_records(dir: &Path, out: &mut Vec<StoredRecord>) -> Result<(), StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            continue;
        }
        if let Some(record) = read_record(&path)? {
            out.push(record);
        }
    }

    Ok(())
}

#[async_trait]
impl Store for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<StoredRecord, StoreError> {
        let key = key.clone();
        self.locked(move |root| {
            read_record(&checked_path(root, kind, &key)?)?.ok_or(StoreError::NotFound { kind, key })
        })
        .await
    }

    async fn create(&self, kind: Kind, record: StoredRecord) -> Result<StoredRecord, StoreError> {
        self.locked(move |root| {
            let key = record.key();
            let path = checked_path(root, kind, &key)?;
            if path.exists() {
                return Err(StoreError::AlreadyExists { kind, key });
            }

            let created = prepare_create(kind, record, 1)?;
            write_record(&path, &created)?;
            Ok(created)
        })
        .await
    }

    async fn update(&self, kind: Kind, record: StoredRecord) -> Result<StoredRecord, StoreError> {
        self.locked(move |root| {
            let key = record.key();
            let path = checked_path(root, kind, &key)?;
            let current = read_record(&path)?.ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;

            let next = current.metadata.resource_version.unwrap_or(0) + 1;
            let updated = prepare_update(kind, &current, record, next)?;
            write_record(&path, &updated)?;
            Ok(updated)
        })
        .await
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let key = key.clone();
        self.locked(move |root| {
            match fs::remove_file(checked_path(root, kind, &key)?) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(StoreError::NotFound { kind, key })
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let namespace = namespace.map(str::to_string);
        self.locked(move |root| {
            let kind_dir = root.join(kind.plural());
            let mut records = Vec::new();

            match namespace {
                Some(ns) => {
                    check_segment(kind, "namespace", &ns)?;
                    read_dir_records(&kind_dir.join(ns), &mut records)?
                }
                None => {
                    let entries = match fs::read_dir(&kind_dir) {
                        Ok(entries) => entries,
                        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
                        Err(e) => return Err(e.into()),
                    };
                    for entry in entries {
                        let entry = entry?;
                        if entry.file_type()?.is_dir() {
                            read_dir_records(&entry.path(), &mut records)?;
                        }
                    }
                }
            }

            records.sort_by_key(|r| r.key());
            Ok(records)
        })
        .await
    }
}
