//! galaxy - Owner-tracked Galaxy to Planet reconciliation engine
//!
//! A galaxy record lists planets inline; the engine keeps one standalone
//! planet record per listed item, owned by the galaxy and labelled with its
//! name, and continuously pulls every planet back to what its galaxy implies.
//!
//! # Architecture
//!
//! Reconciliation is level-triggered:
//! - A request carries only an identity; the current state is always re-read
//! - Each pass derives the full desired state and makes the minimum writes
//! - Running a pass twice on unchanged input writes nothing the second time
//!
//! # Modules
//!
//! - `domain`: Record shapes (Galaxy, Planet, metadata, owner references)
//! - `core`: Projection, ownership, the forward and reverse reconcilers
//! - `store`: Store trait, typed client, memory and file backends, GC
//! - `controller`: Work queue, file watcher, worker manager
//! - `config`: Configuration loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Declare a galaxy
//! galaxy apply -f sol.yaml
//!
//! # Converge it once, or keep everything converged
//! galaxy reconcile galaxy sol
//! galaxy run
//!
//! # Inspect the generated planets
//! galaxy get planets
//! ```

pub mod cli;
pub mod config;
pub mod controller;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{
    GalaxyReconciler, PlanetReconciler, ReconcileError, ReconcileReport, ReconcileStatus, Registry,
};
pub use domain::{Galaxy, GalaxyPlanetSpec, GalaxySpec, Planet, PlanetSpec};
pub use store::{Client, FileStore, MemoryStore, Store, StoreError};
