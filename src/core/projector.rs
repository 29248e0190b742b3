//! Galaxy item → planet projection.
//!
//! `project` is the single source of truth for what a planet should look like;
//! both reconcilers compare stored specs against it. Child naming lives here
//! too, since identity is derived from the same item.

use std::collections::HashSet;

use thiserror::Error;

use crate::domain::{Galaxy, GalaxyPlanetSpec, ObjectKey, PlanetSpec};

/// A galaxy whose item list cannot be projected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("Galaxy {galaxy} has a planet with an empty name at position {index}")]
    EmptyItemName { galaxy: String, index: usize },

    #[error("Galaxy {galaxy} has a planet named '{item}', which is not a DNS-1123 label")]
    InvalidItemName { galaxy: String, item: String },

    #[error("Galaxy {galaxy} lists planet '{item}' more than once")]
    DuplicateItemName { galaxy: String, item: String },
}

/// Longest name a DNS-1123 label may have
const MAX_LABEL_LEN: usize = 63;

/// Planet spec for one galaxy item
pub fn project(item: &GalaxyPlanetSpec) -> PlanetSpec {
    PlanetSpec {
        name: item.name.clone(),
        diameter_km: item.diameter_km,
        has_life: item.has_life,
        moons: item.moons.clone(),
    }
}

/// Planet name for a galaxy item: `<galaxy>-<item>`
///
/// The join is not injective: galaxy `sol` with item `a-b` and galaxy `sol-a`
/// with item `b` in one namespace both map to `sol-a-b`. Whichever galaxy
/// reconciles second takes the planet over, and the two then flip it back
/// and forth on every pass.
pub fn planet_name(galaxy_name: &str, item_name: &str) -> String {
    format!("{}-{}", galaxy_name, item_name)
}

/// Identity of the planet generated for `item`
pub fn planet_key(galaxy: &Galaxy, item: &GalaxyPlanetSpec) -> ObjectKey {
    ObjectKey::new(
        galaxy.metadata.namespace.clone(),
        planet_name(&galaxy.metadata.name, &item.name),
    )
}

/// Item name a planet was generated from, given its owning galaxy's name
pub fn item_name<'a>(galaxy_name: &str, planet_name: &'a str) -> Option<&'a str> {
    planet_name
        .strip_prefix(galaxy_name)?
        .strip_prefix('-')
        .filter(|item| !item.is_empty())
}

/// Whether `name` is a DNS-1123 label: lowercase alphanumerics and '-',
/// starting and ending with an alphanumeric, at most 63 characters
fn is_dns_label(name: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    name.len() <= MAX_LABEL_LEN
        && name.starts_with(alnum)
        && name.ends_with(alnum)
        && name.chars().all(|c| alnum(c) || c == '-')
}

/// Check that every item can be projected to a distinct planet.
///
/// Item names must be non-empty DNS-1123 labels and unique within the galaxy.
/// A name is spliced into the planet's own name, so separators or dots would
/// reach the store as path segments, and duplicates would fight over one
/// planet.
pub fn validate_items(galaxy: &Galaxy) -> Result<(), ProjectionError> {
    let mut seen = HashSet::new();

    for (index, item) in galaxy.spec.planets.iter().enumerate() {
        if item.name.is_empty() {
            return Err(ProjectionError::EmptyItemName {
                galaxy: galaxy.metadata.name.clone(),
                index,
            });
        }
        if !is_dns_label(&item.name) {
            return Err(ProjectionError::InvalidItemName {
                galaxy: galaxy.metadata.name.clone(),
                item: item.name.clone(),
            });
        }
        if !seen.insert(item.name.as_str()) {
            return Err(ProjectionError::DuplicateItemName {
                galaxy: galaxy.metadata.name.clone(),
                item: item.name.clone(),
            });
        }
    }

    Ok(())
}
