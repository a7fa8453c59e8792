//! Registries shared by the plugin features.

use crate::config::ServerConfig;
use crate::scheduler::Scheduler;
use anyhow::Context as _;
use digging::DiggingMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use resourcepack::{
    ConfigStore, HttpResourceClient, PackDelivery, PackError, PackState, PackStatus, ResourceClient,
    ResourcePack, ResourcePackApplier, ResourcePackLoader,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use util::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Loaded { loaded: usize, failed: usize },
    Failed(String),
}

/// Outcome of one pack reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, PackError)>,
}

/// Owns every registry the features share.
///
/// Hosts create one context at startup and call
/// [`shutdown`](Self::shutdown) when the plugin is disabled.
pub struct AppContext {
    config: ServerConfig,
    scheduler: Arc<Scheduler>,
    digging: Arc<DiggingMap>,
    applier: Arc<ResourcePackApplier>,
    client: Arc<dyn ResourceClient>,
    packs: RwLock<IndexMap<String, ResourcePack>>,
    status: RwLock<LoadStatus>,
}

impl AppContext {
    /// Create a context using the HTTP client described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig, delivery: Arc<dyn PackDelivery>) -> anyhow::Result<Self> {
        let client = HttpResourceClient::with_settings(
            &config.resource_packs.user_agent,
            config.resource_packs.http_timeout(),
        )?;

        Self::with_client(config, delivery, Arc::new(client))
    }

    pub fn with_client(
        config: ServerConfig,
        delivery: Arc<dyn PackDelivery>,
        client: Arc<dyn ResourceClient>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let scheduler = Scheduler::new(config.digging.tick_period()).context("Failed to create scheduler")?;

        Ok(Self {
            config,
            scheduler: Arc::new(scheduler),
            digging: Arc::new(DiggingMap::new()),
            applier: Arc::new(ResourcePackApplier::new(delivery)),
            client,
            packs: RwLock::new(IndexMap::new()),
            status: RwLock::new(LoadStatus::NotLoaded),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn digging(&self) -> &Arc<DiggingMap> {
        &self.digging
    }

    pub fn applier(&self) -> &Arc<ResourcePackApplier> {
        &self.applier
    }

    pub fn load_status(&self) -> LoadStatus {
        self.status.read().clone()
    }

    /// Resolve every configured pack and replace the pack registry.
    ///
    /// Packs that fail are registered as disabled stand-ins so they still
    /// show up by name, and are listed in the summary.
    pub async fn load_resource_packs(&self) -> anyhow::Result<LoadSummary> {
        *self.status.write() = LoadStatus::Loading;
        let start = Instant::now();

        let path = &self.config.resource_packs.config_path;
        let store = match ConfigStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(error) => {
                *self.status.write() = LoadStatus::Failed(error.to_string());
                return Err(error).with_context(|| format!("Failed to open {}", path.display()));
            }
        };

        let loader = ResourcePackLoader::new(store, Arc::clone(&self.client)).with_on_failed(|entry, error| {
            tracing::warn!("Resource pack '{}' is disabled until the next reload: {}", entry.key, error);
            Some(entry)
        });

        let results = loader.load_all().await;

        let mut summary = LoadSummary::default();
        let mut packs = IndexMap::with_capacity(results.len());

        for (key, result) in results {
            match (result, loader.state(&key)) {
                (Ok(pack), Some(PackState::Failed(error))) => {
                    summary.failed.push((key.clone(), error));
                    packs.insert(key, pack);
                }
                (Ok(pack), _) => {
                    summary.loaded.push(key.clone());
                    packs.insert(key, pack);
                }
                (Err(error), _) => summary.failed.push((key, error)),
            }
        }

        *self.packs.write() = packs;
        *self.status.write() = LoadStatus::Loaded {
            loaded: summary.loaded.len(),
            failed: summary.failed.len(),
        };

        tracing::info!(
            "Resource packs ready in {:.2}ms: {} loaded, {} failed",
            start.elapsed().as_secs_f64() * 1000.0,
            summary.loaded.len(),
            summary.failed.len()
        );

        Ok(summary)
    }

    pub fn resource_pack(&self, key: &str) -> Option<ResourcePack> {
        self.packs.read().get(key).cloned()
    }

    /// Registered packs in configuration order
    pub fn resource_packs(&self) -> Vec<(String, ResourcePack)> {
        self.packs
            .read()
            .iter()
            .map(|(key, pack)| (key.clone(), pack.clone()))
            .collect()
    }

    pub fn enabled_packs(&self) -> Vec<ResourcePack> {
        self.packs
            .read()
            .values()
            .filter(|pack| !pack.is_disabled())
            .cloned()
            .collect()
    }

    /// Push every enabled pack to a joining player
    pub fn apply_packs<F>(&self, player: PlayerId, on_status: F) -> impl Future<Output = Vec<ResourcePack>> + Send + 'static
    where
        F: Fn(&ResourcePack, PackStatus) + Send + Sync + 'static,
    {
        self.applier.apply_all(player, self.enabled_packs(), on_status)
    }

    /// Forget everything tracked for a player who left
    pub fn on_player_quit(&self, player: PlayerId) {
        let sessions = self.digging.remove_all_player(player).len();
        let pending = self.applier.forget(player);

        if sessions > 0 || pending > 0 {
            tracing::debug!(
                "{} left with {} digging sessions and {} pending packs",
                player,
                sessions,
                pending
            );
        }
    }

    /// Cancel every digging task and stop the scheduler
    pub fn shutdown(&self) {
        let sessions = self.digging.entries_len();
        self.digging.clear();
        self.scheduler.shutdown();

        tracing::info!("Shut down, cancelled {} digging sessions", sessions);
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("status", &self.load_status())
            .field("packs", &self.packs.read().len())
            .field("digging", &self.digging.entries_len())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
