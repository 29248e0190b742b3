//! Reconcile workers.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::queue::{Request, WorkQueue};
use crate::config::ControllerSettings;
use crate::core::{GalaxyReconciler, PlanetReconciler, ReconcileError, ReconcileReport, Registry};
use crate::domain::{Galaxy, Kind, Planet, Resource};
use crate::store::{collect_garbage, Client, StoreError};

/// Owns the queue and both reconcilers
pub struct Manager {
    client: Client,
    galaxies: GalaxyReconciler,
    planets: PlanetReconciler,
    queue: WorkQueue,
    settings: ControllerSettings,
}

impl Manager {
    pub fn new(client: Client, registry: Arc<Registry>, settings: ControllerSettings) -> Self {
        Self {
            galaxies: GalaxyReconciler::new(client.clone(), registry.clone()),
            planets: PlanetReconciler::new(client.clone(), registry),
            client,
            queue: WorkQueue::new(),
            settings,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Route a request to the reconciler for its kind
    pub async fn dispatch(&self, request: &Request) -> Result<ReconcileReport, ReconcileError> {
        match request.kind {
            Kind::Galaxy => self.galaxies.reconcile(&request.key).await,
            Kind::Planet => self.planets.reconcile(&request.key).await,
        }
    }

    /// Take one request, reconcile it and schedule a retry on failure.
    ///
    /// Returns the request handled, or `None` once the queue has shut down.
    pub async fn process_next(&self) -> Option<Request> {
        let request = self.queue.get().await?;

        match self.dispatch(&request).await {
            Ok(report) => {
                debug!(%request, status = ?report.status, writes = report.writes(), "Reconciled");
            }
            Err(e) => {
                let delay = self.settings.requeue_after();
                warn!(
                    %request,
                    error = %e,
                    delay_secs = delay.as_secs(),
                    "Reconcile failed, requeueing"
                );
                self.queue.add_after(request.clone(), delay);
            }
        }

        self.queue.done(&request).await;
        Some(request)
    }

    /// Queue every galaxy and planet, then collect garbage once
    #[instrument(skip(self))]
    pub async fn resync(&self) -> Result<usize, StoreError> {
        let mut queued = 0;

        for galaxy in self.client.list::<Galaxy>(None).await? {
            if self.queue.add(Request::galaxy(galaxy.key())).await {
                queued += 1;
            }
        }
        for planet in self.client.list::<Planet>(None).await? {
            if self.queue.add(Request::planet(planet.key())).await {
                queued += 1;
            }
        }

        let gc = collect_garbage(&self.client, None).await?;
        info!(queued, collected = gc.deleted.len(), "Resync complete");
        Ok(queued)
    }

    /// Run workers and periodic resync until `shutdown` resolves
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut workers = JoinSet::new();
        for worker in 0..self.settings.workers.max(1) {
            let manager = self.clone();
            workers.spawn(async move {
                debug!(worker, "Worker started");
                while manager.process_next().await.is_some() {}
                debug!(worker, "Worker stopped");
            });
        }

        let resync = {
            let manager = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(manager.settings.resync_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = manager.resync().await {
                        warn!(error = %e, "Resync failed");
                    }
                }
            })
        };

        info!(workers = self.settings.workers, "Manager running");
        shutdown.await;

        info!("Manager stopping...");
        resync.abort();
        self.queue.shutdown().await;
        while let Some(joined) = workers.join_next().await {
            joined?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GalaxyPlanetSpec, GalaxySpec, ObjectKey, ObjectMeta};
    use crate::store::MemoryStore;

    fn galaxy(name: &str, items: &[&str]) -> Galaxy {
        let planets = items
            .iter()
            .map(|item| GalaxyPlanetSpec {
                name: item.to_string(),
                diameter_km: 1000.0,
                ..Default::default()
            })
            .collect();
        Galaxy::new(
            ObjectMeta::new("default", name),
            GalaxySpec {
                name: String::new(),
                planets,
            },
        )
    }

    fn manager(store: Arc<MemoryStore>) -> Manager {
        let registry = Arc::new(Registry::standard());
        let client = Client::new(store, registry.clone());
        Manager::new(client, registry, ControllerSettings::default())
    }

    async fn drain(manager: &Manager) {
        while !manager.queue().is_empty().await {
            manager.process_next().await;
        }
    }

    #[tokio::test]
    async fn test_resync_converges_everything() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());
        manager.client.create(&galaxy("sol", &["earth", "mars"])).await.unwrap();
        manager.client.create(&galaxy("vega", &["b"])).await.unwrap();

        let queued = manager.resync().await.unwrap();
        assert_eq!(queued, 2);
        drain(&manager).await;
        assert_eq!(store.count(Kind::Planet).await, 3);

        // Second resync only finds work that is already done
        store.reset_stats().await;
        manager.resync().await.unwrap();
        drain(&manager).await;
        assert_eq!(store.stats().await.writes(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_kind() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);
        manager.client.create(&galaxy("sol", &["earth"])).await.unwrap();

        let key = ObjectKey::new("default", "sol");
        let report = manager.dispatch(&Request::galaxy(key)).await.unwrap();
        assert_eq!(report.kind, Kind::Galaxy);
        assert_eq!(report.created.len(), 1);

        let planet = ObjectKey::new("default", "sol-earth");
        let report = manager.dispatch(&Request::planet(planet)).await.unwrap();
        assert_eq!(report.kind, Kind::Planet);
        assert_eq!(report.writes(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(manager(store.clone()));
        manager.client.create(&galaxy("sol", &["earth"])).await.unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(manager.clone().run(async move {
            let _ = stop_rx.await;
        }));

        // The first resync tick fires immediately
        for _ in 0..50 {
            if store.count(Kind::Planet).await == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.count(Kind::Planet).await, 1);

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }
}
