/*!
Workspace de test pour le pipeline de scan

Monte dans un dossier temporaire les trois stores (catalogue, config, machines)
et un catalogue de fabriques vide, puis construit l'orchestrateur.
*/

use crate::collector_stubs::{Script, ScriptedCollector};
use anyhow::Result;
use hostscan_kernel::collectors::ExternalManifest;
use hostscan_kernel::config_store::DEFAULT_CONFIG_FILE;
use hostscan_kernel::devices::DEFAULT_DEVICE_FILE;
use hostscan_kernel::registry::DEFAULT_CATALOG_FILE;
use hostscan_kernel::settings::ScanSettings;
use hostscan_kernel::{
    CollectorCatalog, CollectorOptions, ConfigStore, DeviceIdentity, DeviceStore, Exporter, ScanOrchestrator,
    ServiceRegistry,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Identité machine constante
pub struct FixedIdentity(pub String);

impl FixedIdentity {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl DeviceIdentity for FixedIdentity {
    fn current_device_id(&self) -> String {
        self.0.clone()
    }
}

/// Harness complet : stores sur disque temporaire + collecteurs scriptés
pub struct TestWorkspace {
    dir: TempDir,
    pub registry: Arc<ServiceRegistry>,
    pub config: Arc<ConfigStore>,
    pub devices: Arc<DeviceStore>,
    catalog: CollectorCatalog,
    seen: HashMap<String, Arc<Mutex<Vec<CollectorOptions>>>>,
    settings: ScanSettings,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();

        let dir = tempfile::tempdir()?;
        let registry = Arc::new(ServiceRegistry::load(dir.path().join(DEFAULT_CATALOG_FILE)));
        let config = Arc::new(ConfigStore::load(dir.path().join(DEFAULT_CONFIG_FILE)));
        let devices = Arc::new(DeviceStore::load(dir.path().join(DEFAULT_DEVICE_FILE)));

        Ok(Self {
            dir,
            registry,
            config,
            devices,
            catalog: CollectorCatalog::new(),
            seen: HashMap::new(),
            settings: ScanSettings::default(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Enregistre un collecteur scripté sous `name`
    pub fn register(&mut self, name: &str, script: Script) -> &mut Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        self.seen.insert(name.to_uppercase(), seen.clone());
        self.catalog.register(name, ScriptedCollector::factory(script, seen));
        self
    }

    /// Enregistre un collecteur externe sans passer par un fichier manifest
    pub fn register_external(&mut self, manifest: ExternalManifest) -> &mut Self {
        let path = self.dir.path().join(format!("{}.json", manifest.name));
        self.catalog.register_external(manifest, &path);
        self
    }

    /// Active `name` dans le ConfigStore avec ces surcharges
    pub fn enable(&mut self, name: &str, overrides: Value) -> &mut Self {
        let overrides: Map<String, Value> = overrides.as_object().cloned().unwrap_or_default();
        self.config.set_service_config(name, overrides);
        self
    }

    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.collector_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_workers(&mut self, workers: usize) -> &mut Self {
        self.settings.workers = workers;
        self
    }

    /// Options reçues par les constructions successives de `name`
    pub fn options_seen(&self, name: &str) -> Vec<CollectorOptions> {
        self.seen
            .get(&name.to_uppercase())
            .map(|seen| seen.lock().clone())
            .unwrap_or_default()
    }

    /// Construit l'orchestrateur ; le catalogue de fabriques est transféré
    pub fn orchestrator(&mut self, exporter: Option<Arc<dyn Exporter>>) -> ScanOrchestrator {
        let catalog = std::mem::take(&mut self.catalog);
        let orchestrator = ScanOrchestrator::new(
            self.registry.clone(),
            self.config.clone(),
            self.devices.clone(),
            Arc::new(catalog),
            &self.settings,
        );
        match exporter {
            Some(exporter) => orchestrator.with_exporter(exporter),
            None => orchestrator,
        }
    }
}
