//! Forward Reconciliation Integration Tests
//!
//! Galaxy → planets: convergence, idempotence, naming, ownership correction
//! and the store error taxonomy (races, conflicts, aborts).

use std::sync::Arc;

use galaxy::core::ownership::controller_of;
use galaxy::core::{
    project, GalaxyReconciler, ProjectionError, ReconcileError, ReconcileStatus, Registry,
};
use galaxy::domain::{
    Galaxy, GalaxyPlanetSpec, GalaxySpec, Kind, ObjectKey, ObjectMeta, OwnerReference, Planet,
    GALAXY_LABEL,
};
use galaxy::store::{Client, Fault, MemoryStore, Operation, StoreError};
use uuid::Uuid;

struct Harness {
    store: Arc<MemoryStore>,
    client: Client,
    reconciler: GalaxyReconciler,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(Registry::standard());
        let client = Client::new(store.clone(), registry.clone());
        let reconciler = GalaxyReconciler::new(client.clone(), registry);
        Self {
            store,
            client,
            reconciler,
        }
    }

    async fn apply(&self, galaxy: Galaxy) -> Galaxy {
        self.client.create(&galaxy).await.unwrap()
    }

    async fn planet(&self, name: &str) -> Planet {
        self.client.get::<Planet>(&key(name)).await.unwrap()
    }
}

fn key(name: &str) -> ObjectKey {
    ObjectKey::new("default", name)
}

fn item(name: &str, diameter_km: f64, moons: &[&str]) -> GalaxyPlanetSpec {
    GalaxyPlanetSpec {
        name: name.to_string(),
        diameter_km,
        has_life: false,
        moons: moons.iter().map(|m| m.to_string()).collect(),
    }
}

fn new_galaxy(name: &str, planets: Vec<GalaxyPlanetSpec>) -> Galaxy {
    Galaxy::new(
        ObjectMeta::new("default", name),
        GalaxySpec {
            name: String::new(),
            planets,
        },
    )
}

fn sol() -> Galaxy {
    let mut earth = item("earth", 12742.0, &["luna"]);
    earth.has_life = true;
    new_galaxy("sol", vec![earth, item("mars", 6779.0, &["phobos", "deimos"])])
}

#[tokio::test]
async fn test_creates_one_planet_per_item() {
    let h = Harness::new();
    let sol = h.apply(sol()).await;

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.status, ReconcileStatus::Converged);
    assert_eq!(report.created, vec![key("sol-earth"), key("sol-mars")]);
    assert!(report.updated.is_empty());

    for item in &sol.spec.planets {
        let planet = h.planet(&format!("sol-{}", item.name)).await;
        assert!(planet.spec.matches(&project(item)));
        assert_eq!(planet.galaxy(), Some("sol"));

        let owner = controller_of(&planet.metadata).unwrap();
        assert_eq!(owner.kind, "Galaxy");
        assert_eq!(owner.name, "sol");
        assert_eq!(Some(owner.uid), sol.metadata.uid);
        assert!(owner.block_owner_deletion);
    }
}

#[tokio::test]
async fn test_second_pass_writes_nothing() {
    let h = Harness::new();
    h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    h.store.reset_stats().await;
    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();

    assert_eq!(report.writes(), 0);
    assert_eq!(report.unchanged.len(), 2);
    assert_eq!(h.store.stats().await.writes(), 0);
}

#[tokio::test]
async fn test_missing_galaxy_is_not_an_error() {
    let h = Harness::new();

    let report = h.reconciler.reconcile(&key("andromeda")).await.unwrap();
    assert_eq!(report.status, ReconcileStatus::TargetMissing);
    assert_eq!(h.store.stats().await.writes(), 0);
}

#[tokio::test]
async fn test_deleted_planet_comes_back_under_same_name() {
    let h = Harness::new();
    h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();
    let before = h.planet("sol-mars").await;

    h.client.delete::<Planet>(&key("sol-mars")).await.unwrap();
    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();

    assert_eq!(report.created, vec![key("sol-mars")]);
    let after = h.planet("sol-mars").await;
    assert!(after.spec.matches(&before.spec));
    assert_ne!(after.metadata.uid, before.metadata.uid);
}

#[tokio::test]
async fn test_spec_drift_is_overwritten() {
    let h = Harness::new();
    h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    let mut mars = h.planet("sol-mars").await;
    mars.spec.has_life = true;
    mars.spec.moons.clear();
    h.client.update(&mars).await.unwrap();

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.updated, vec![key("sol-mars")]);
    assert_eq!(report.unchanged, vec![key("sol-earth")]);

    let mars = h.planet("sol-mars").await;
    assert!(!mars.spec.has_life);
    assert_eq!(mars.spec.moons, vec!["phobos", "deimos"]);
}

#[tokio::test]
async fn test_galaxy_edit_propagates() {
    let h = Harness::new();
    let mut sol = h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    sol.spec.planets[1].diameter_km = 6792.4;
    h.client.update(&sol).await.unwrap();

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.updated, vec![key("sol-mars")]);
    assert_eq!(h.planet("sol-mars").await.spec.diameter_km, 6792.4);
}

#[tokio::test]
async fn test_ownership_is_restored() {
    let h = Harness::new();
    h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    // Strip the controller and the label, keep an unrelated reference
    let bystander = OwnerReference {
        api_version: "v1".to_string(),
        kind: "ConfigMap".to_string(),
        name: "settings".to_string(),
        uid: Uuid::new_v4(),
        controller: false,
        block_owner_deletion: false,
    };
    let mut earth = h.planet("sol-earth").await;
    earth.metadata.owner_references = vec![bystander.clone()];
    earth.metadata.labels.remove(GALAXY_LABEL);
    h.client.update(&earth).await.unwrap();

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.updated, vec![key("sol-earth")]);

    let earth = h.planet("sol-earth").await;
    assert_eq!(controller_of(&earth.metadata).unwrap().name, "sol");
    assert!(earth.metadata.owner_references.contains(&bystander));
    assert_eq!(earth.galaxy(), Some("sol"));
}

#[tokio::test]
async fn test_foreign_controller_is_replaced() {
    let h = Harness::new();
    let sol = h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    let mut mars = h.planet("sol-mars").await;
    for reference in &mut mars.metadata.owner_references {
        reference.name = "vega".to_string();
        reference.uid = Uuid::new_v4();
    }
    h.client.update(&mars).await.unwrap();

    h.reconciler.reconcile(&key("sol")).await.unwrap();

    let mars = h.planet("sol-mars").await;
    assert_eq!(mars.metadata.owner_references.len(), 1);
    let owner = controller_of(&mars.metadata).unwrap();
    assert_eq!(owner.name, "sol");
    assert_eq!(Some(owner.uid), sol.metadata.uid);
}

#[tokio::test]
async fn test_lost_create_race_counts_as_success() {
    let h = Harness::new();
    h.apply(sol()).await;
    h.store
        .fail_next(Operation::Create, Kind::Planet, Fault::AlreadyExists)
        .await;

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.unchanged, vec![key("sol-earth")]);
    assert_eq!(report.created, vec![key("sol-mars")]);

    // The planet the fault stood in for is picked up by the next pass
    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.created, vec![key("sol-earth")]);
}

#[tokio::test]
async fn test_conflict_is_retried_once() {
    let h = Harness::new();
    let mut sol = h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    sol.spec.planets[0].moons.push("theia".to_string());
    h.client.update(&sol).await.unwrap();
    h.store
        .fail_next(Operation::Update, Kind::Planet, Fault::Conflict)
        .await;

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.updated, vec![key("sol-earth")]);
    assert_eq!(h.planet("sol-earth").await.spec.moons, vec!["luna", "theia"]);
}

#[tokio::test]
async fn test_second_conflict_is_surfaced() {
    let h = Harness::new();
    let mut sol = h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    sol.spec.planets[0].has_life = false;
    h.client.update(&sol).await.unwrap();
    for _ in 0..2 {
        h.store
            .fail_next(Operation::Update, Kind::Planet, Fault::Conflict)
            .await;
    }

    let err = h.reconciler.reconcile(&key("sol")).await.unwrap_err();
    assert!(err.is_conflict());
    match err {
        ReconcileError::Conflict { kind, key: k, .. } => {
            assert_eq!(kind, Kind::Planet);
            assert_eq!(k, key("sol-earth"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Nothing was written for the conflicting planet
    assert!(h.planet("sol-earth").await.spec.has_life);
}

#[tokio::test]
async fn test_first_error_aborts_remaining_items() {
    let h = Harness::new();
    let mut sol = h.apply(new_galaxy("sol", vec![item("earth", 12742.0, &[])])).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();

    sol.spec.planets.push(item("mars", 6779.0, &[]));
    sol.spec.planets.push(item("venus", 12104.0, &[]));
    h.client.update(&sol).await.unwrap();
    h.store
        .fail_next(
            Operation::Create,
            Kind::Planet,
            Fault::Unavailable("disk full".to_string()),
        )
        .await;

    let err = h.reconciler.reconcile(&key("sol")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Store(StoreError::Unavailable(_))
    ));

    // earth stays converged, mars failed, venus never attempted
    assert_eq!(h.store.count(Kind::Planet).await, 1);
    let venus = h.client.get::<Planet>(&key("sol-venus")).await;
    assert!(venus.unwrap_err().is_not_found());

    // Redelivery finishes the job
    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.created, vec![key("sol-mars"), key("sol-venus")]);
}

#[tokio::test]
async fn test_duplicate_items_are_rejected_before_writes() {
    let h = Harness::new();
    h.apply(new_galaxy(
        "sol",
        vec![item("earth", 12742.0, &[]), item("earth", 1.0, &[])],
    ))
    .await;
    h.store.reset_stats().await;

    let err = h.reconciler.reconcile(&key("sol")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidItems(ProjectionError::DuplicateItemName { .. })
    ));
    assert_eq!(h.store.stats().await.writes(), 0);
}

#[tokio::test]
async fn test_empty_item_name_is_rejected() {
    let h = Harness::new();
    h.apply(new_galaxy("sol", vec![item("", 1.0, &[])])).await;

    let err = h.reconciler.reconcile(&key("sol")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidItems(ProjectionError::EmptyItemName { .. })
    ));
    assert_eq!(h.store.count(Kind::Planet).await, 0);
}

#[tokio::test]
async fn test_nan_diameter_stays_idempotent() {
    let h = Harness::new();
    h.apply(new_galaxy("sol", vec![item("ceres", f64::NAN, &[])])).await;

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.created, vec![key("sol-ceres")]);
    assert!(h.planet("sol-ceres").await.spec.diameter_km.is_nan());

    h.store.reset_stats().await;
    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.writes(), 0);
    assert_eq!(h.store.stats().await.writes(), 0);
}

#[tokio::test]
async fn test_removed_item_leaves_planet_alone() {
    let h = Harness::new();
    let mut sol = h.apply(sol()).await;
    h.reconciler.reconcile(&key("sol")).await.unwrap();
    let mars = h.planet("sol-mars").await;

    sol.spec.planets.retain(|p| p.name != "mars");
    h.client.update(&sol).await.unwrap();
    h.store.reset_stats().await;

    let report = h.reconciler.reconcile(&key("sol")).await.unwrap();
    assert_eq!(report.unchanged, vec![key("sol-earth")]);
    assert_eq!(h.store.stats().await.writes(), 0);
    assert_eq!(h.planet("sol-mars").await, mars);
}

#[tokio::test]
async fn test_galaxies_share_item_names() {
    let h = Harness::new();
    h.apply(sol()).await;
    h.apply(new_galaxy("vega", vec![item("earth", 1.0, &[])])).await;

    h.reconciler.reconcile(&key("sol")).await.unwrap();
    h.reconciler.reconcile(&key("vega")).await.unwrap();

    assert_eq!(h.planet("sol-earth").await.galaxy(), Some("sol"));
    assert_eq!(h.planet("vega-earth").await.galaxy(), Some("vega"));
    assert_eq!(h.store.count(Kind::Planet).await, 3);
}
