//! Reconciliation engine.
//!
//! This module contains:
//! - Projector: galaxy item → planet spec, child naming, item validation
//! - Ownership: controller reference checks and correction
//! - Registry: kind → API version table shared by everything that writes
//! - GalaxyReconciler: forward path, galaxy identity → upserted planets
//! - PlanetReconciler: reverse path, planet identity → drift correction

mod converge;
pub mod error;
pub mod forward;
pub mod outcome;
pub mod ownership;
pub mod projector;
pub mod registry;
pub mod reverse;

// Re-export commonly used types
pub use error::ReconcileError;
pub use forward::GalaxyReconciler;
pub use outcome::{Phase, ReconcileReport, ReconcileStatus};
pub use ownership::OwnershipDrift;
pub use projector::{planet_name, project, ProjectionError};
pub use registry::{Registry, RegistryError};
pub use reverse::PlanetReconciler;
