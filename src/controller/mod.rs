//! Controller runtime.
//!
//! Drives the reconcilers the way a declarative control plane would:
//! - WorkQueue: coalescing, per-request exclusive delivery
//! - FileWatcher: file store changes → requests
//! - Manager: workers, fixed-delay requeue on failure, periodic resync + GC
//!
//! All retry timing lives here; the reconcilers themselves never wait or retry
//! beyond a single conflict re-fetch.

pub mod manager;
pub mod queue;
pub mod watch;

pub use manager::Manager;
pub use queue::{Request, WorkQueue};
pub use watch::{FileWatcher, WatchError, WatchHandle};
