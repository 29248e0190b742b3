//! Ownership garbage collection.
//!
//! Stands in for the cascade deletion a declarative store performs on its own:
//! once a planet's controlling galaxy is gone (or was replaced by a new galaxy
//! with the same name but a different uid), the planet is deleted. Planets
//! without a controller reference are left alone.

use tracing::{debug, info, instrument};

use super::{ignore_not_found, Client, StoreError};
use crate::core::ownership;
use crate::domain::{Galaxy, ObjectKey, Planet, Resource};

/// Result of a garbage collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Planets inspected
    pub scanned: usize,

    /// Planets deleted because their controller no longer exists
    pub deleted: Vec<ObjectKey>,
}

/// Delete every planet whose controlling galaxy no longer exists
#[instrument(skip(client))]
pub async fn collect_garbage(
    client: &Client,
    namespace: Option<&str>,
) -> Result<GcReport, StoreError> {
    let mut report = GcReport::default();

    for planet in client.list::<Planet>(namespace).await? {
        report.scanned += 1;

        let Some(owner) = ownership::controller_of(planet.metadata()) else {
            continue;
        };
        if owner.kind != Galaxy::KIND.as_str() {
            continue;
        }

        let owner_key = ObjectKey::new(planet.metadata.namespace.clone(), owner.name.clone());
        let alive = ignore_not_found(client.get::<Galaxy>(&owner_key).await)?
            .map_or(false, |galaxy| galaxy.metadata.uid == Some(owner.uid));
        if alive {
            continue;
        }

        let key = planet.key();
        match client.delete::<Planet>(&key).await {
            Ok(()) => {
                info!(planet = %key, galaxy = %owner.name, "Deleted planet whose owner is gone");
                report.deleted.push(key);
            }
            Err(e) if e.is_not_found() => {
                debug!(planet = %key, "Planet already gone");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
