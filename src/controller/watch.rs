//! File store watcher.
//!
//! Turns changes under a [`FileStore`] root into work queue requests. Events
//! are debounced and only carry identities: the reconcilers re-read the
//! current state themselves, so a burst of edits collapses into one request.

use std::path::PathBuf;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::queue::{Request, WorkQueue};
use crate::store::FileStore;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Store directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches a file store and feeds a work queue
pub struct FileWatcher {
    store: FileStore,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new(store: FileStore, debounce: Duration) -> Self {
        Self { store, debounce }
    }

    /// Start watching; stops when the returned handle is dropped or stopped
    pub fn watch(&self, queue: WorkQueue) -> Result<WatchHandle, WatchError> {
        let root = self.store.root().to_path_buf();
        if !root.exists() {
            return Err(WatchError::DirectoryNotFound(root));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        // Receiver gone means the watcher is shutting down
                        let _ = tx.send(event.path);
                    }
                }
                Err(e) => tracing::warn!("Watcher error: {:?}", e),
            }
        })?;
        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

        tracing::info!("Watching {} for record changes", root.display());

        let store = self.store.clone();
        let task = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                let Some((kind, key)) = store.parse_path(&path) else {
                    continue;
                };

                let request = Request::new(kind, key);
                if queue.add(request.clone()).await {
                    tracing::debug!(%request, "Queued from file change");
                }
            }
        });

        Ok(WatchHandle {
            _debouncer: debouncer,
            task,
        })
    }
}

/// Handle to a running watcher
pub struct WatchHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop watching
    pub fn stop(self) {
        self.task.abort();
    }
}
