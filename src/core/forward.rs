//! Forward reconciliation: galaxy → planets.
//!
//! Given a galaxy identity, derive the full set of planets it implies and
//! upsert each one in list order. Safe to run concurrently for different
//! galaxies; invocations for the same galaxy must be serialized by the caller.

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use super::converge::{self, Applied, DesiredPlanet};
use super::error::ReconcileError;
use super::outcome::{Phase, PhaseTracker, ReconcileReport, ReconcileStatus};
use super::projector;
use super::registry::Registry;
use crate::domain::{Galaxy, ObjectKey, Planet, Resource};
use crate::store::{ignore_not_found, Client};

/// Keeps the planets of a galaxy converged with its spec
#[derive(Clone)]
pub struct GalaxyReconciler {
    client: Client,
    registry: Arc<Registry>,
}

impl GalaxyReconciler {
    pub fn new(client: Client, registry: Arc<Registry>) -> Self {
        Self { client, registry }
    }

    /// Reconcile the galaxy identified by `key`.
    ///
    /// A missing galaxy is not an error. The first unrecoverable error aborts
    /// the remaining items; planets handled before it stay converged.
    #[instrument(skip(self), fields(galaxy = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileReport, ReconcileError> {
        let mut phase = PhaseTracker::start();

        let galaxy = match ignore_not_found(self.client.get::<Galaxy>(key).await) {
            Ok(Some(galaxy)) => galaxy,
            Ok(None) => {
                debug!("Galaxy not found, nothing to do");
                phase.advance(Phase::Done);
                return Ok(ReconcileReport::new(
                    Galaxy::KIND,
                    key.clone(),
                    ReconcileStatus::TargetMissing,
                ));
            }
            Err(e) => return Err(phase.fail(e.into())),
        };

        let result = self.reconcile_items(&galaxy, &mut phase).await;
        match &result {
            Ok(report) => {
                phase.advance(Phase::Done);
                info!(
                    planets = galaxy.spec.planets.len(),
                    created = report.created.len(),
                    updated = report.updated.len(),
                    "Galaxy reconciled"
                );
            }
            Err(e) => error!(error = %e, phase = %phase.current(), "Galaxy reconcile failed"),
        }
        result
    }

    async fn reconcile_items(
        &self,
        galaxy: &Galaxy,
        phase: &mut PhaseTracker,
    ) -> Result<ReconcileReport, ReconcileError> {
        phase.advance(Phase::Diffing);
        projector::validate_items(galaxy).map_err(|e| phase.fail(e.into()))?;
        let owner = self
            .registry
            .controller_reference(galaxy)
            .map_err(|e| phase.fail(e.into()))?;

        let mut report =
            ReconcileReport::new(Galaxy::KIND, galaxy.key(), ReconcileStatus::Converged);

        for item in &galaxy.spec.planets {
            let desired = DesiredPlanet::for_item(galaxy, item, &owner);
            let applied = self.converge_planet(&desired, phase).await?;

            let bucket = match applied {
                Applied::Created => &mut report.created,
                Applied::Updated => &mut report.updated,
                Applied::Unchanged | Applied::Vanished => &mut report.unchanged,
            };
            bucket.push(desired.key);
        }

        Ok(report)
    }

    async fn converge_planet(
        &self,
        desired: &DesiredPlanet,
        phase: &mut PhaseTracker,
    ) -> Result<Applied, ReconcileError> {
        phase.advance(Phase::Fetching);

        let existing = ignore_not_found(self.client.get::<Planet>(&desired.key).await)
            .map_err(|e| phase.fail(e.into()))?;

        let applied = match existing {
            None => {
                phase.advance(Phase::Diffing);
                converge::create_planet(&self.client, desired, phase).await?
            }
            Some(planet) => converge::update_planet(&self.client, desired, planet, phase).await?,
        };

        if applied == Applied::Vanished {
            // Deleted between our conflict and the re-fetch
            phase.advance(Phase::Diffing);
            return converge::create_planet(&self.client, desired, phase).await;
        }

        Ok(applied)
    }
}
