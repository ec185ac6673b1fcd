//! A control plane wired entirely from in-memory adapters.

use std::sync::Arc;

use harbormaster::adapter::outbound::memory::{MemoryBackupService, MemoryStore};
use harbormaster::application::{
    ClusterSessionRegistry, DeployDispatcher, DispatchSettings, RestoreCoordinator,
    RestoreSettings, ResultCallbacks, ScannerSettings, UpdateScanner,
};
use harbormaster::domain::{App, AppId, ClusterId, Release};
use harbormaster::port::outbound::render::ManifestRenderer;
use harbormaster::port::outbound::store::Store;
use harbormaster::testkit::domain::{self, APP, CLUSTER};
use harbormaster::testkit::fake::{FailingRenderer, RecordingSupportBundles, ScriptedUpstream};

pub struct World {
    pub store: Arc<MemoryStore>,
    pub backups: Arc<MemoryBackupService>,
    pub registry: Arc<ClusterSessionRegistry>,
    pub renderer: Arc<FailingRenderer>,
    pub dispatcher: Arc<DeployDispatcher>,
    pub bundles: Arc<RecordingSupportBundles>,
    pub restore: RestoreCoordinator,
    pub callbacks: ResultCallbacks,
}

impl World {
    pub fn new() -> Self {
        Self::with_bundles(RecordingSupportBundles::default())
    }

    pub fn with_bundles(bundles: RecordingSupportBundles) -> Self {
        let store = Arc::new(MemoryStore::new());
        let backups = Arc::new(MemoryBackupService::new());
        let registry = Arc::new(ClusterSessionRegistry::new());
        let bundles = Arc::new(bundles);

        let inner: Arc<dyn ManifestRenderer> = store.clone();
        let renderer = Arc::new(FailingRenderer::new(inner));
        let shared: Arc<dyn Store> = store.clone();

        let dispatcher = Arc::new(DeployDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&shared),
            renderer.clone(),
            DispatchSettings::default(),
        ));
        let restore = RestoreCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&shared),
            backups.clone(),
            Arc::clone(&dispatcher),
            bundles.clone(),
            RestoreSettings::default(),
        );
        let callbacks = ResultCallbacks::new(shared);

        Self {
            store,
            backups,
            registry,
            renderer,
            dispatcher,
            bundles,
            restore,
            callbacks,
        }
    }

    pub fn scanner(&self, upstream: Arc<ScriptedUpstream>) -> Arc<UpdateScanner> {
        self.scanner_with(upstream, ScannerSettings::default())
    }

    pub fn scanner_with(
        &self,
        upstream: Arc<ScriptedUpstream>,
        settings: ScannerSettings,
    ) -> Arc<UpdateScanner> {
        let shared: Arc<dyn Store> = self.store.clone();
        Arc::new(UpdateScanner::new(shared, upstream, settings))
    }

    /// Seed `app` on [`CLUSTER`] with `releases`, deployed at `desired`.
    pub fn seed(&self, app: App, releases: Vec<Release>, desired: Option<u64>) -> AppId {
        let app_id = app.id.clone();
        self.store.insert_app(app);
        for release in releases {
            self.store.insert_release(&app_id, release);
        }
        self.store.assign_cluster(&app_id, cluster());
        if let Some(sequence) = desired {
            self.store.set_desired(&app_id, &cluster(), sequence);
        }
        app_id
    }

    /// The default app with three semver releases, deployed at `desired`.
    pub fn seed_default(&self, desired: Option<u64>) -> AppId {
        self.seed(
            domain::app(APP),
            vec![
                domain::semver_release(0, "1.0.0"),
                domain::semver_release(1, "1.0.1"),
                domain::semver_release(2, "1.1.0"),
            ],
            desired,
        )
    }
}

pub fn cluster() -> ClusterId {
    ClusterId::new(CLUSTER)
}

/// Archive the memory store serves for a seeded release.
pub fn archive(app_id: &AppId, sequence: u64) -> Vec<u8> {
    format!("# {app_id} sequence {sequence}\n").into_bytes()
}
