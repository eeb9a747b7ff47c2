//! Composition root: builds the stores, the collector catalog and the exporter
//! once, and hands them to the orchestrator and the CLI commands by `Arc`.

use crate::discovery::MacDeviceIdentity;
use crate::metrics;
use anyhow::{bail, Result};
use hostscan_kernel::collectors::{CollectorOrigin, DEFAULT_COLLECTORS_DIR};
use hostscan_kernel::config_store::{ServiceOptions, DEFAULT_CONFIG_FILE};
use hostscan_kernel::devices::DEFAULT_DEVICE_FILE;
use hostscan_kernel::export::{GitHubExporter, GitHubSettings};
use hostscan_kernel::options::coerce;
use hostscan_kernel::paths::PathResolver;
use hostscan_kernel::registry::{canonical_name, DEFAULT_CATALOG_FILE};
use hostscan_kernel::{
    CollectorCatalog, ConfigStore, DeviceIdentity, DeviceStore, Exporter, ScanOrchestrator, ServiceRegistry,
    Settings,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable carrying the device id to external collectors
pub const DEVICE_ID_ENV: &str = "HOSTSCAN_DEVICE_ID";

/// One line of the `services` listing
#[derive(Debug, Serialize)]
pub struct ServiceOverview {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// `None` when no implementation is registered under this name
    pub origin: Option<CollectorOrigin>,
    pub options: Value,
}

pub struct App {
    pub settings: Settings,
    pub resolver: PathResolver,
    pub registry: Arc<ServiceRegistry>,
    pub config: Arc<ConfigStore>,
    pub devices: Arc<DeviceStore>,
    pub catalog: Arc<CollectorCatalog>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl App {
    pub async fn bootstrap(settings: Settings) -> Result<Self> {
        let identity: Arc<dyn DeviceIdentity> = Arc::new(MacDeviceIdentity::discover());
        Self::with_identity(settings, identity).await
    }

    pub async fn with_identity(settings: Settings, identity: Arc<dyn DeviceIdentity>) -> Result<Self> {
        let resolver = PathResolver::from_settings(&settings);
        info!("Data root: {}", resolver.base().display());

        let registry = Arc::new(ServiceRegistry::load(resolver.resolve(DEFAULT_CATALOG_FILE)));
        let config = Arc::new(ConfigStore::load(resolver.resolve(DEFAULT_CONFIG_FILE)));
        let devices = Arc::new(DeviceStore::load(resolver.resolve(DEFAULT_DEVICE_FILE)).with_identity(identity.clone()));

        let mut catalog = CollectorCatalog::new();
        catalog.set_env(DEVICE_ID_ENV, &identity.current_device_id());
        metrics::register_builtin(&mut catalog, identity);

        let collectors_dir = resolver.resolve(DEFAULT_COLLECTORS_DIR);
        match catalog.discover_external(&collectors_dir).await {
            Ok(found) => {
                for name in found {
                    if registry.exists(&name) {
                        continue;
                    }
                    let description = catalog
                        .description(&name)
                        .unwrap_or_else(|| format!("External collector {}", name));
                    registry.add(&name, &description, None);
                }
            }
            Err(e) => warn!("Cannot scan {}: {}", collectors_dir.display(), e),
        }

        let exporter: Option<Arc<dyn Exporter>> = match GitHubSettings::from_env() {
            Ok(github) => {
                info!("GitHub export available ({}/{})", github.owner, github.repository);
                Some(Arc::new(GitHubExporter::new(github)))
            }
            Err(e) => {
                debug!("GitHub export unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            settings,
            resolver,
            registry,
            config,
            devices,
            catalog: Arc::new(catalog),
            exporter,
        })
    }

    pub fn orchestrator(&self) -> ScanOrchestrator {
        let orchestrator = ScanOrchestrator::new(
            self.registry.clone(),
            self.config.clone(),
            self.devices.clone(),
            self.catalog.clone(),
            &self.settings.scan,
        );
        match &self.exporter {
            Some(exporter) => orchestrator.with_exporter(exporter.clone()),
            None => orchestrator,
        }
    }

    /// Enables a collector, merging `key=value` overrides into its entry
    pub fn enable(&self, name: &str, assignments: &[String]) -> Result<String> {
        let key = self.known_name(name)?;
        let configured_as = self.configured_key(&key);

        let mut options: ServiceOptions = self.config.get_service_config(&configured_as);
        for assignment in assignments {
            let Some((option, raw)) = assignment.split_once('=') else {
                bail!("expected key=value, got '{}'", assignment);
            };
            let option = option.trim();
            self.check_option(&key, option, raw)?;
            options.insert(option.to_string(), self.typed_value(&key, option, raw));
        }

        self.config.set_service_config(&configured_as, options);
        Ok(key)
    }

    /// `false` when the collector was not enabled
    pub fn disable(&self, name: &str) -> bool {
        let key = canonical_name(name);
        let configured: Vec<String> = self
            .config
            .list_services()
            .into_iter()
            .filter(|configured| canonical_name(configured) == key)
            .collect();

        let mut removed = false;
        for configured in configured {
            removed |= self.config.remove_service(&configured);
        }
        removed
    }

    /// Stores one override; enables the collector as a side effect
    pub fn set_option(&self, name: &str, option: &str, raw: &str) -> Result<()> {
        let key = self.known_name(name)?;
        self.check_option(&key, option, raw)?;
        let value = self.typed_value(&key, option, raw);
        self.config.update_service_option(&self.configured_key(&key), option, value);
        Ok(())
    }

    /// Every collector known to the catalog file or to the factory catalog
    pub fn services(&self) -> Vec<ServiceOverview> {
        let enabled: Vec<String> = self.config.list_services().iter().map(|n| canonical_name(n)).collect();
        let origins = self.catalog.origins();
        let orchestrator = self.orchestrator();

        let mut names = self.registry.list_names();
        for name in origins.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();

        names
            .into_iter()
            .map(|name| {
                let (options, _) = orchestrator.effective_options(&name);
                ServiceOverview {
                    description: self.registry.description(&name).or_else(|| self.catalog.description(&name)),
                    enabled: enabled.contains(&name),
                    origin: origins.get(&name).cloned(),
                    options: options.to_json(),
                    name,
                }
            })
            .collect()
    }

    /// Startup health check; an empty list means everything is consistent
    pub fn check(&self) -> Vec<String> {
        let mut issues = self.registry.validation_issues();

        for name in self.registry.list_names() {
            if !self.catalog.contains(&name) {
                issues.push(format!("collector {} has no implementation", name));
            }
        }

        let orchestrator = self.orchestrator();
        for configured in self.config.list_services() {
            let key = canonical_name(&configured);
            if !self.catalog.contains(&key) {
                issues.push(format!("enabled collector {} has no implementation", configured));
            }
            if !self.registry.exists(&key) {
                issues.push(format!("enabled collector {} is not in the catalog", configured));
            }
            for rejected in orchestrator.effective_options(&key).1 {
                issues.push(format!("{}.{}: {}", key, rejected.option, rejected.reason));
            }
        }
        issues
    }

    fn known_name(&self, name: &str) -> Result<String> {
        let key = canonical_name(name);
        if key.is_empty() {
            bail!("collector name is empty");
        }
        if !self.registry.exists(&key) && !self.catalog.contains(&key) {
            bail!("unknown collector {}", key);
        }
        Ok(key)
    }

    /// Key already used in the config file for this collector, if any
    fn configured_key(&self, key: &str) -> String {
        self.config
            .list_services()
            .into_iter()
            .find(|configured| canonical_name(configured) == key)
            .unwrap_or_else(|| key.to_string())
    }

    fn check_option(&self, key: &str, option: &str, raw: &str) -> Result<()> {
        if option.is_empty() {
            bail!("option name is empty");
        }
        let Some(specs) = self.registry.options(key) else {
            return Ok(());
        };
        let Some(spec) = specs.get(option) else {
            bail!(
                "{} has no option '{}' (known: {})",
                key,
                option,
                specs.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        };
        if let Some(choices) = spec.allowed_values() {
            if !choices.iter().any(|choice| choice == raw) {
                bail!("{}.{} must be one of {}", key, option, choices.join(", "));
            }
        }
        Ok(())
    }

    /// Raw CLI text typed after the declared option kind when possible
    fn typed_value(&self, key: &str, option: &str, raw: &str) -> Value {
        let kind = self.registry.option_info(key, option).and_then(|spec| spec.option_kind());
        match coerce(&Value::String(raw.to_string()), kind) {
            Ok(value) => value.to_json(),
            Err(_) => Value::String(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostscan_kernel::ScanRequest;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    const DEVICE: &str = "aa:bb:cc:dd:ee:ff";

    async fn app() -> (TempDir, App) {
        let dir = tempdir().unwrap();
        let settings = Settings {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let app = App::with_identity(settings, Arc::new(MacDeviceIdentity::from_id(DEVICE)))
            .await
            .unwrap();
        (dir, app)
    }

    #[tokio::test]
    async fn test_bootstrap_creates_data_files() {
        let (dir, app) = app().await;

        assert!(dir.path().join("data/services.json").exists());
        assert!(dir.path().join("data/config.json").exists());
        assert_eq!(app.registry.list_names(), vec!["CPU", "DISK", "NETWORK", "OS", "RAM"]);
        assert!(app.check().is_empty());
    }

    #[tokio::test]
    async fn test_enable_types_values_and_disable() {
        let (_dir, app) = app().await;

        let name = app
            .enable("ram", &["unit=GB".to_string(), "show_swap=yes".to_string()])
            .unwrap();
        assert_eq!(name, "RAM");
        assert_eq!(app.config.get_service_config("RAM")["unit"], json!("GB"));
        assert_eq!(app.config.get_service_config("RAM")["show_swap"], json!(true));

        assert!(app.disable("Ram"));
        assert!(!app.disable("RAM"));
        assert!(app.config.list_services().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_options_are_refused() {
        let (_dir, app) = app().await;

        assert!(app.enable("gpu", &[]).is_err());
        assert!(app.enable("ram", &["unit".to_string()]).is_err());
        assert!(app.set_option("RAM", "unit", "TB").is_err());
        assert!(app.set_option("RAM", "colour", "red").is_err());
        assert!(app.config.list_services().is_empty());
    }

    #[tokio::test]
    async fn test_set_option_reuses_configured_spelling() {
        let (_dir, app) = app().await;
        app.config.set_service_config("cpu", Default::default());

        app.set_option("CPU", "show_load", "false").unwrap();
        assert_eq!(app.config.list_services(), vec!["cpu"]);
        assert_eq!(app.config.get_service_config("cpu")["show_load"], json!(false));
    }

    #[tokio::test]
    async fn test_check_reports_unknown_enabled_collector() {
        let (_dir, app) = app().await;
        app.config.set_service_config("GPU", Default::default());

        let issues = app.check();
        assert!(issues.contains(&"enabled collector GPU has no implementation".to_string()));
        assert!(issues.contains(&"enabled collector GPU is not in the catalog".to_string()));
    }

    #[tokio::test]
    async fn test_services_overview() {
        let (_dir, app) = app().await;
        app.enable("OS", &["include_kernel=false".to_string()]).unwrap();

        let services = app.services();
        let os = services.iter().find(|s| s.name == "OS").unwrap();
        assert!(os.enabled);
        assert_eq!(os.origin, Some(CollectorOrigin::Builtin));
        assert_eq!(os.options, json!({"include_kernel": false}));
        assert!(!services.iter().find(|s| s.name == "CPU").unwrap().enabled);
    }

    #[tokio::test]
    async fn test_scan_records_current_device() {
        let (_dir, app) = app().await;
        app.enable("OS", &[]).unwrap();

        let report = app.orchestrator().run(ScanRequest::default()).await;

        assert!(report.get("OS").unwrap().success);
        let record = app.devices.get_computer(DEVICE).unwrap();
        assert_eq!(record["OS"]["service"], json!("OS"));
        assert_eq!(app.devices.current_device_id().as_deref(), Some(DEVICE));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_collector_joins_registry() {
        let dir = tempdir().unwrap();
        let collectors = dir.path().join("collectors");
        std::fs::create_dir_all(&collectors).unwrap();
        std::fs::write(
            collectors.join("uptime.json"),
            r#"{"name": "uptime", "binary": "/bin/sh", "description": "Seconds since boot",
                "args": ["-c", "echo \"{\\\"$HOSTSCAN_DEVICE_ID\\\": {\\\"up\\\": 1}}\""]}"#,
        )
        .unwrap();

        let settings = Settings {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let app = App::with_identity(settings, Arc::new(MacDeviceIdentity::from_id(DEVICE)))
            .await
            .unwrap();

        assert_eq!(app.registry.description("UPTIME").as_deref(), Some("Seconds since boot"));
        app.enable("uptime", &[]).unwrap();

        let report = app.orchestrator().run(ScanRequest::default()).await;
        assert!(report.get("UPTIME").unwrap().success);
        assert_eq!(app.devices.get_service_data(DEVICE, "UPTIME").unwrap()["up"], json!(1));
    }
}
