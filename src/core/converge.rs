//! Desired planet state and the single-child write path shared by both
//! reconcilers.

use tracing::{debug, info, warn};

use super::error::ReconcileError;
use super::outcome::{Phase, PhaseTracker};
use super::ownership::{self, OwnershipDrift};
use super::projector;
use crate::domain::{
    Galaxy, GalaxyPlanetSpec, ObjectKey, ObjectMeta, OwnerReference, Planet, PlanetSpec, Resource,
    GALAXY_LABEL,
};
use crate::store::{ignore_not_found, Client};

/// One re-fetch-and-reapply after a conflict, then give up
const MAX_UPDATE_ATTEMPTS: u32 = 2;

/// Everything a planet should carry, derived from its galaxy item
#[derive(Debug, Clone)]
pub(crate) struct DesiredPlanet {
    pub key: ObjectKey,
    pub spec: PlanetSpec,
    pub owner: OwnerReference,
    pub galaxy: String,
}

/// Which parts of a stored planet diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Drift {
    pub spec: bool,
    pub owner: OwnershipDrift,
    pub label: bool,
}

impl Drift {
    pub fn any(&self) -> bool {
        self.spec || self.owner.needs_update() || self.label
    }
}

impl DesiredPlanet {
    pub fn for_item(galaxy: &Galaxy, item: &GalaxyPlanetSpec, owner: &OwnerReference) -> Self {
        Self {
            key: projector::planet_key(galaxy, item),
            spec: projector::project(item),
            owner: owner.clone(),
            galaxy: galaxy.metadata.name.clone(),
        }
    }

    /// A fresh planet record for create
    pub fn build(&self) -> Planet {
        let mut meta = ObjectMeta::new(self.key.namespace.clone(), self.key.name.clone())
            .with_label(GALAXY_LABEL, self.galaxy.clone());
        meta.owner_references.push(self.owner.clone());
        Planet::new(meta, self.spec.clone())
    }

    /// Compare without modifying
    pub fn drift(&self, planet: &Planet) -> Drift {
        Drift {
            spec: !planet.spec.matches(&self.spec),
            owner: ownership::drift(&planet.metadata, &self.owner),
            label: planet.metadata.label(GALAXY_LABEL) != Some(self.galaxy.as_str()),
        }
    }

    /// Correct every diverging part of `planet` in place, leaving matching
    /// parts untouched
    pub fn apply_to(&self, planet: &mut Planet) -> Drift {
        let drift = self.drift(planet);

        if drift.spec {
            planet.spec = self.spec.clone();
        }
        if drift.owner.needs_update() {
            ownership::set_controller(planet.metadata_mut(), &self.owner);
        }
        if drift.label {
            planet
                .metadata
                .labels
                .insert(GALAXY_LABEL.to_string(), self.galaxy.clone());
        }

        drift
    }
}

/// What happened to one planet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    Created,
    Updated,
    Unchanged,
    /// The planet disappeared while re-fetching after a conflict
    Vanished,
}

/// Create the planet, treating a lost race as success
pub(crate) async fn create_planet(
    client: &Client,
    desired: &DesiredPlanet,
    phase: &mut PhaseTracker,
) -> Result<Applied, ReconcileError> {
    phase.advance(Phase::Writing);

    match client.create(&desired.build()).await {
        Ok(_) => {
            info!(planet = %desired.key, galaxy = %desired.galaxy, "Created planet");
            Ok(Applied::Created)
        }
        Err(e) if e.is_already_exists() => {
            // Someone else created it first; the next pass will diff it
            debug!(planet = %desired.key, "Planet already exists, treating create as done");
            Ok(Applied::Unchanged)
        }
        Err(e) => Err(phase.fail(e.into())),
    }
}

/// Bring an existing planet in line with `desired` using one combined update.
///
/// On a conflict the planet is re-fetched and the diff reapplied once; a
/// second conflict is returned as [`ReconcileError::Conflict`].
pub(crate) async fn update_planet(
    client: &Client,
    desired: &DesiredPlanet,
    mut current: Planet,
    phase: &mut PhaseTracker,
) -> Result<Applied, ReconcileError> {
    let mut attempt = 0;

    loop {
        attempt += 1;
        phase.advance(Phase::Diffing);

        let drift = desired.apply_to(&mut current);
        if !drift.any() {
            debug!(planet = %desired.key, "Planet matches its galaxy item");
            return Ok(Applied::Unchanged);
        }

        phase.advance(Phase::Writing);
        match client.update(&current).await {
            Ok(_) => {
                info!(
                    planet = %desired.key,
                    spec = drift.spec,
                    owner = ?drift.owner,
                    label = drift.label,
                    "Updated planet to match galaxy spec"
                );
                return Ok(Applied::Updated);
            }
            Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                warn!(planet = %desired.key, attempt, "Update conflicted, re-fetching");
                phase.advance(Phase::Fetching);

                match ignore_not_found(client.get::<Planet>(&desired.key).await) {
                    Ok(Some(fresh)) => current = fresh,
                    Ok(None) => return Ok(Applied::Vanished),
                    Err(e) => return Err(phase.fail(e.into())),
                }
            }
            Err(e) if e.is_conflict() => {
                return Err(phase.fail(ReconcileError::Conflict {
                    kind: Planet::KIND,
                    key: desired.key.clone(),
                    source: e,
                }));
            }
            Err(e) => return Err(phase.fail(e.into())),
        }
    }
}
