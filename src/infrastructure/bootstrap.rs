//! Composition root: builds every service from configuration.

use std::sync::Arc;

use tracing::info;

use crate::adapter::inbound::gateway::AgentGateway;
use crate::adapter::outbound::memory::{MemoryBackupService, MemoryStore};
use crate::adapter::outbound::support_bundle::LoggingSupportBundles;
use crate::adapter::outbound::upstream::HttpUpstreamClient;
use crate::application::callback::ResultCallbacks;
use crate::application::dispatch::DeployDispatcher;
use crate::application::restore::RestoreCoordinator;
use crate::application::scanner::UpdateScanner;
use crate::application::session::ClusterSessionRegistry;
use crate::domain::id::{AppId, ClusterId};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::render::ManifestRenderer;
use crate::port::outbound::store::Store;

/// Every long-lived service, wired together.
pub struct Services {
    pub registry: Arc<ClusterSessionRegistry>,
    pub store: Arc<MemoryStore>,
    pub backups: Arc<MemoryBackupService>,
    pub dispatcher: Arc<DeployDispatcher>,
    pub restore: Arc<RestoreCoordinator>,
    pub scanner: Arc<UpdateScanner>,
    pub gateway: Arc<AgentGateway>,
}

/// Load `[[apps]]` seeds into the store.
pub fn seed_store(config: &Config, store: &MemoryStore) {
    for seed in &config.apps {
        let app_id = AppId::new(seed.id.as_str());
        store.insert_app(seed.to_app());
        store.set_rollback_allowed(&app_id, seed.rollback_allowed);
        for release in seed.to_releases() {
            store.insert_release(&app_id, release);
        }
        for cluster in &seed.clusters {
            let cluster_id = ClusterId::new(cluster.as_str());
            store.assign_cluster(&app_id, cluster_id.clone());
            if let Some(sequence) = seed.deployed_sequence {
                store.set_desired(&app_id, &cluster_id, sequence);
            }
        }
    }
    info!(apps = config.apps.len(), "Seeded app store");
}

/// Build all services from configuration.
pub fn build(config: &Config) -> Result<Services> {
    let registry = Arc::new(ClusterSessionRegistry::new());

    let store = Arc::new(MemoryStore::new());
    seed_store(config, &store);
    let backups = Arc::new(MemoryBackupService::new());
    let upstream = Arc::new(HttpUpstreamClient::new(&config.upstream.settings())?);

    let shared_store: Arc<dyn Store> = store.clone();
    let renderer: Arc<dyn ManifestRenderer> = store.clone();

    let dispatcher = Arc::new(DeployDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&shared_store),
        renderer,
        config.dispatch.settings(&config.server.public_url),
    ));

    let restore = Arc::new(RestoreCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&shared_store),
        backups.clone(),
        Arc::clone(&dispatcher),
        Arc::new(LoggingSupportBundles),
        config.restore.settings(),
    ));

    let scanner = Arc::new(UpdateScanner::new(
        Arc::clone(&shared_store),
        upstream,
        config.scanner.settings(),
    ));

    let callbacks = Arc::new(ResultCallbacks::new(shared_store));
    let gateway = Arc::new(AgentGateway::new(
        Arc::clone(&registry),
        callbacks,
        config.cluster_tokens(),
    ));

    Ok(Services {
        registry,
        store,
        backups,
        dispatcher,
        restore,
        scanner,
        gateway,
    })
}
