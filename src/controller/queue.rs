//! Coalescing work queue.
//!
//! Requests are identities, not events: adding a request that is already
//! waiting is a no-op, and a request is never handed to two workers at once.
//! If a request is added while a worker holds it, it is queued again when the
//! worker calls [`WorkQueue::done`], so the latest state is always reconciled.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::domain::{Kind, ObjectKey};

/// A record that may need reconciling
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    pub kind: Kind,
    pub key: ObjectKey,
}

impl Request {
    pub fn new(kind: Kind, key: ObjectKey) -> Self {
        Self { kind, key }
    }

    pub fn galaxy(key: ObjectKey) -> Self {
        Self::new(Kind::Galaxy, key)
    }

    pub fn planet(key: ObjectKey) -> Self {
        Self::new(Kind::Planet, key)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

#[derive(Default)]
struct QueueState {
    /// Waiting requests, in arrival order
    order: VecDeque<Request>,
    /// Requests that need processing (waiting or re-added while in flight)
    dirty: HashSet<Request>,
    /// Requests currently held by a worker
    processing: HashSet<Request>,
    shutting_down: bool,
}

/// Deduplicating queue with per-request exclusivity
#[derive(Clone, Default)]
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
    ready: Arc<Notify>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request; returns false when it was coalesced into a pending one
    pub async fn add(&self, request: Request) -> bool {
        let mut state = self.state.lock().await;
        if state.shutting_down || state.dirty.contains(&request) {
            return false;
        }

        state.dirty.insert(request.clone());
        if !state.processing.contains(&request) {
            state.order.push_back(request);
            drop(state);
            self.ready.notify_one();
        }
        true
    }

    /// Queue a request after a fixed delay
    pub fn add_after(&self, request: Request, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(request).await;
        });
    }

    /// Wait for the next request; `None` once the queue is shut down and drained
    pub async fn get(&self) -> Option<Request> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(request) = state.order.pop_front() {
                    state.dirty.remove(&request);
                    state.processing.insert(request.clone());
                    if !state.order.is_empty() {
                        // Let another idle worker pick up the rest
                        self.ready.notify_one();
                    }
                    return Some(request);
                }
                if state.shutting_down {
                    // Wake the next waiter so every worker sees the shutdown
                    self.ready.notify_one();
                    return None;
                }
            }

            self.ready.notified().await;
        }
    }

    /// Release a request taken with [`get`](Self::get)
    pub async fn done(&self, request: &Request) {
        let mut state = self.state.lock().await;
        state.processing.remove(request);

        if state.dirty.contains(request) {
            state.order.push_back(request.clone());
            drop(state);
            self.ready.notify_one();
        }
    }

    /// Stop accepting requests and release waiting workers once drained
    pub async fn shutdown(&self) {
        self.state.lock().await.shutting_down = true;
        self.ready.notify_waiters();
        self.ready.notify_one();
    }

    /// Requests waiting to be handed out
    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
