//! Reverse reconciliation: planet → owning galaxy → planet.
//!
//! Triggered by changes to a planet (including external edits). Resolves the
//! owning galaxy through the back-reference label, re-derives the planet from
//! the matching galaxy item and corrects any drift.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::converge::{self, Applied, DesiredPlanet};
use super::error::ReconcileError;
use super::outcome::{Phase, PhaseTracker, ReconcileReport, ReconcileStatus};
use super::projector;
use super::registry::Registry;
use crate::domain::{Galaxy, ObjectKey, Planet, Resource};
use crate::store::{ignore_not_found, Client};

/// Heals drift on individual planets
#[derive(Clone)]
pub struct PlanetReconciler {
    client: Client,
    registry: Arc<Registry>,
}

impl PlanetReconciler {
    pub fn new(client: Client, registry: Arc<Registry>) -> Self {
        Self { client, registry }
    }

    /// Reconcile the planet identified by `key`.
    ///
    /// Missing planet, unlabeled planet and orphaned planet all end without a
    /// write. A label pointing at a galaxy that does not exist is
    /// [`ReconcileError::DependencyMissing`].
    #[instrument(skip(self), fields(planet = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileReport, ReconcileError> {
        let mut phase = PhaseTracker::start();

        let result = self.reconcile_planet(key, &mut phase).await;
        match &result {
            Ok(report) => {
                phase.advance(Phase::Done);
                debug!(status = ?report.status, writes = report.writes(), "Planet reconciled");
            }
            Err(e) if e.is_dependency_missing() => warn!(error = %e, "Planet owner missing"),
            Err(e) => error!(error = %e, phase = %phase.current(), "Planet reconcile failed"),
        }
        result
    }

    async fn reconcile_planet(
        &self,
        key: &ObjectKey,
        phase: &mut PhaseTracker,
    ) -> Result<ReconcileReport, ReconcileError> {
        let report = |status| ReconcileReport::new(Planet::KIND, key.clone(), status);

        let planet = match ignore_not_found(self.client.get::<Planet>(key).await) {
            Ok(Some(planet)) => planet,
            Ok(None) => {
                debug!("Planet not found, nothing to do");
                return Ok(report(ReconcileStatus::TargetMissing));
            }
            Err(e) => return Err(phase.fail(e.into())),
        };

        let Some(galaxy_name) = planet.galaxy().map(str::to_string) else {
            debug!("Planet has no galaxy label, not managed here");
            return Ok(report(ReconcileStatus::Unmanaged));
        };

        let galaxy_key = ObjectKey::new(key.namespace.clone(), galaxy_name);
        let galaxy = match ignore_not_found(self.client.get::<Galaxy>(&galaxy_key).await) {
            Ok(Some(galaxy)) => galaxy,
            Ok(None) => {
                return Err(phase.fail(ReconcileError::DependencyMissing {
                    planet: key.clone(),
                    galaxy: galaxy_key,
                }));
            }
            Err(e) => return Err(phase.fail(e.into())),
        };

        phase.advance(Phase::Diffing);
        projector::validate_items(&galaxy).map_err(|e| phase.fail(e.into()))?;

        let item = projector::item_name(&galaxy.metadata.name, &key.name)
            .and_then(|item_name| galaxy.planet(item_name));
        let Some(item) = item else {
            // Item removed from the galaxy; planets are never deleted here
            warn!(
                galaxy = %galaxy_key,
                "Planet no longer listed by its galaxy, leaving it orphaned"
            );
            return Ok(report(ReconcileStatus::Orphaned));
        };

        let owner = self
            .registry
            .controller_reference(&galaxy)
            .map_err(|e| phase.fail(e.into()))?;
        let desired = DesiredPlanet::for_item(&galaxy, item, &owner);

        let mut result = report(ReconcileStatus::Converged);
        match converge::update_planet(&self.client, &desired, planet, phase).await? {
            Applied::Updated => {
                info!(galaxy = %galaxy_key, "Restored planet from galaxy item");
                result.updated.push(desired.key);
            }
            Applied::Vanished => {
                debug!("Planet deleted while re-fetching, nothing to do");
                result.status = ReconcileStatus::TargetMissing;
            }
            Applied::Unchanged | Applied::Created => result.unchanged.push(desired.key),
        }

        Ok(result)
    }
}
