/**
 * SCAN ORCHESTRATOR - Exécution d'un scan complet
 *
 * RÔLE :
 * Pour chaque collecteur activé dans le ConfigStore : résolution de la fabrique,
 * fusion des options (défauts du catalogue + surcharges), exécution isolée et
 * chronométrée, écriture dans le DeviceStore, puis export optionnel du lot.
 *
 * CYCLE D'UN RUN :
 * Listing → (par collecteur : Loading → Configuring → Executing → Recording)
 *         → Aggregating → Exporting (optionnel)
 *
 * GARANTIES :
 * - Un collecteur en échec (erreur, panic, timeout) n'affecte jamais les autres
 * - Le rapport couvre TOUS les collecteurs activés, succès ou échec explicite
 * - Pool borné (sémaphore), un thread par collecteur, timeout par collecteur ;
 *   un collecteur hors délai est abandonné et sa sortie tardive ignorée
 * - Rapport trié par nom : indépendant de l'ordre de terminaison
 */

use crate::collectors::{CollectorCatalog, CollectorError, CollectorFactory, CollectorOutput};
use crate::config_store::ConfigStore;
use crate::devices::DeviceStore;
use crate::export::{ExportBatch, Exporter};
use crate::options::{resolve_options, CollectorOptions, RejectedOverride};
use crate::registry::{canonical_name, ServiceRegistry};
use crate::settings::ScanSettings;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Étape d'un collecteur au moment de son échec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStage {
    Loading,
    Configuring,
    Executing,
    Recording,
}

/// Résultat d'un collecteur pour un run
#[derive(Debug, Clone, Serialize)]
pub struct CollectorRun {
    pub payload: Option<CollectorOutput>,
    pub duration_secs: f64,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<ScanStage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_options: Vec<RejectedOverride>,
    /// Machines écrites dans le DeviceStore
    pub devices_recorded: usize,
}

impl CollectorRun {
    fn failed(stage: ScanStage, error: String, executed_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            payload: None,
            duration_secs: duration.as_secs_f64(),
            executed_at,
            success: false,
            error: Some(error),
            failed_stage: Some(stage),
            rejected_options: Vec::new(),
            devices_recorded: 0,
        }
    }
}

/// Demande de scan
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanRequest {
    pub export: bool,
}

/// Résultat de l'étape d'export
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub exporter: String,
    pub files: Vec<String>,
    pub success: bool,
}

/// Rapport d'un run complet
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Collecteurs activés, dans l'ordre du ConfigStore
    pub services: Vec<String>,
    pub results: BTreeMap<String, CollectorRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportSummary>,
}

impl ScanReport {
    fn empty(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            services: Vec::new(),
            results: BTreeMap::new(),
            export: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CollectorRun> {
        self.results.get(&canonical_name(name))
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|run| run.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Part des collecteurs réussis, 0.0 pour un run vide
    pub fn success_ratio(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.succeeded() as f64 / self.results.len() as f64
        }
    }

    /// Suffixe horodaté commun aux fichiers d'export du run
    pub fn timestamp_tag(&self) -> String {
        self.started_at.format("%Y%m%d_%H%M%S").to_string()
    }

    /// Un fichier consolidé + un fichier par collecteur réussi
    pub fn export_batch(&self) -> ExportBatch {
        let tag = self.timestamp_tag();
        let mut batch = ExportBatch::new();

        let results: Map<String, Value> = self
            .results
            .iter()
            .map(|(name, run)| (name.clone(), serde_json::to_value(run).unwrap_or(Value::Null)))
            .collect();
        batch.insert(
            format!("scan_{}.json", tag),
            json!({
                "timestamp": self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                "run_id": self.run_id,
                "services": self.services,
                "results": results,
            }),
        );

        for (name, run) in &self.results {
            if let (true, Some(payload)) = (run.success, &run.payload) {
                batch.insert(format!("{}_{}.json", name, tag), Value::Object(payload.clone()));
            }
        }
        batch
    }
}

/// Issue de l'exécution d'un collecteur, avant écriture
enum Execution {
    Collected(CollectorOutput),
    Failed(ScanStage, String),
}

struct Finished {
    name: String,
    rejected: Vec<RejectedOverride>,
    executed_at: DateTime<Utc>,
    duration: Duration,
    execution: Execution,
}

pub struct ScanOrchestrator {
    registry: Arc<ServiceRegistry>,
    config: Arc<ConfigStore>,
    devices: Arc<DeviceStore>,
    catalog: Arc<CollectorCatalog>,
    exporter: Option<Arc<dyn Exporter>>,
    workers: usize,
    timeout: Duration,
}

impl ScanOrchestrator {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        config: Arc<ConfigStore>,
        devices: Arc<DeviceStore>,
        catalog: Arc<CollectorCatalog>,
        settings: &ScanSettings,
    ) -> Self {
        Self {
            registry,
            config,
            devices,
            catalog,
            exporter: None,
            workers: settings.workers.max(1),
            timeout: settings.timeout(),
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn has_exporter(&self) -> bool {
        self.exporter.is_some()
    }

    /// Fusion défauts + surcharges telle qu'elle serait passée au collecteur
    pub fn effective_options(&self, name: &str) -> (CollectorOptions, Vec<RejectedOverride>) {
        let key = canonical_name(name);
        let specs = self.registry.options(&key).unwrap_or_default();
        let overrides = self.overrides_for(&key);
        let resolved = resolve_options(&specs, &overrides);
        (resolved.options, resolved.rejected)
    }

    /// Exécute un scan complet. Ne retourne jamais d'erreur : chaque échec
    /// est porté par l'entrée du collecteur concerné.
    pub async fn run(&self, request: ScanRequest) -> ScanReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        // Listing
        let enabled = self.enabled_collectors();
        if enabled.is_empty() {
            warn!("No collector enabled, nothing to scan");
            return ScanReport::empty(run_id, started_at);
        }
        info!("Scan {} started: {}", run_id, enabled.join(", "));

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for name in &enabled {
            // Loading
            let resolved_factory = if name.is_empty() {
                Err("collector name is empty".to_string())
            } else {
                self.catalog.resolve(name).map_err(|e| e.to_string())
            };
            let factory = match resolved_factory {
                Ok(factory) => factory,
                Err(e) => {
                    warn!("{:?}: {}", name, e);
                    let finished = Finished {
                        name: name.clone(),
                        rejected: Vec::new(),
                        executed_at: Utc::now(),
                        duration: Duration::ZERO,
                        execution: Execution::Failed(ScanStage::Loading, e),
                    };
                    tasks.spawn(async move { finished });
                    continue;
                }
            };

            // Configuring
            let specs = self.registry.options(name).unwrap_or_default();
            let overrides = self.overrides_for(name);
            let resolved = resolve_options(&specs, &overrides);
            for rejected in &resolved.rejected {
                warn!("{}: override {} ignored ({})", name, rejected.option, rejected.reason);
            }

            // Executing
            let name = name.clone();
            let semaphore = semaphore.clone();
            let timeout = self.timeout;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let executed_at = Utc::now();
                let started = Instant::now();
                let execution = execute(&name, factory, resolved.options, timeout).await;
                Finished {
                    name,
                    rejected: resolved.rejected,
                    executed_at,
                    duration: started.elapsed(),
                    execution,
                }
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(finished) => {
                    let name = finished.name.clone();
                    results.insert(name, self.record(finished));
                }
                Err(e) => error!("Scan task aborted: {}", e),
            }
        }

        // une tâche interrompue ne doit pas faire disparaître son collecteur du rapport
        for name in &enabled {
            results.entry(name.clone()).or_insert_with(|| {
                CollectorRun::failed(
                    ScanStage::Executing,
                    "scan task aborted before reporting".to_string(),
                    Utc::now(),
                    Duration::ZERO,
                )
            });
        }

        // Aggregating
        let mut report = ScanReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            services: enabled,
            results,
            export: None,
        };
        info!(
            "Scan {} finished: {}/{} collectors succeeded ({:.0}%)",
            run_id,
            report.succeeded(),
            report.results.len(),
            report.success_ratio() * 100.0
        );

        // Exporting
        if request.export {
            match &self.exporter {
                Some(exporter) => {
                    let summary = export(exporter.as_ref(), &report).await;
                    report.export = Some(summary);
                }
                None => warn!("Export requested but no exporter is configured"),
            }
        }

        report
    }

    /// Noms canoniques des collecteurs activés, sans doublon, ordre du ConfigStore.
    /// Un nom vide est gardé : il échoue au chargement au lieu de disparaître du rapport.
    fn enabled_collectors(&self) -> Vec<String> {
        let mut enabled: Vec<String> = Vec::new();
        for name in self.config.list_services() {
            let key = canonical_name(&name);
            if !enabled.contains(&key) {
                enabled.push(key);
            }
        }
        enabled
    }

    /// Surcharges de toutes les graphies de `key`, dans l'ordre du fichier (la dernière gagne)
    fn overrides_for(&self, key: &str) -> Map<String, Value> {
        let mut overrides = Map::new();
        for configured in self.config.list_services() {
            if canonical_name(&configured) == key {
                overrides.extend(self.config.get_service_config(&configured));
            }
        }
        overrides
    }

    // Recording
    fn record(&self, finished: Finished) -> CollectorRun {
        let Finished {
            name,
            rejected,
            executed_at,
            duration,
            execution,
        } = finished;

        let output = match execution {
            Execution::Collected(output) => output,
            Execution::Failed(stage, message) => {
                warn!("{} failed at {:?} stage: {}", name, stage, message);
                let mut run = CollectorRun::failed(stage, message, executed_at, duration);
                run.rejected_options = rejected;
                return run;
            }
        };

        let mut run = CollectorRun {
            payload: None,
            duration_secs: duration.as_secs_f64(),
            executed_at,
            success: true,
            error: None,
            failed_stage: None,
            rejected_options: rejected,
            devices_recorded: 0,
        };

        let last_scan = executed_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        for (device_id, payload) in &output {
            let entry = collection_entry(&name, payload, &last_scan);
            let mut data = Map::new();
            data.insert(name.clone(), Value::Object(entry));

            match self.devices.try_add_computer(device_id, data) {
                Ok(()) => run.devices_recorded += 1,
                Err(e) => {
                    error!("{}: failed to record results for {}: {}", name, device_id, e);
                    run.success = false;
                    run.failed_stage = Some(ScanStage::Recording);
                    run.error = Some(format!("failed to persist results: {}", e));
                }
            }
        }

        if output.is_empty() {
            debug!("{} returned no device data", name);
        }
        info!("{} collected in {:.2}s ({} devices)", name, run.duration_secs, run.devices_recorded);
        run.payload = Some(output);
        run
    }
}

/// Payload d'une machine + `last_scan` + `service`
fn collection_entry(name: &str, payload: &Value, last_scan: &str) -> Map<String, Value> {
    let mut entry = match payload {
        Value::Object(map) => map.clone(),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), other.clone());
            wrapped
        }
    };
    entry.insert("last_scan".to_string(), Value::String(last_scan.to_string()));
    entry.insert("service".to_string(), Value::String(name.to_string()));
    entry
}

/// Construction + collecte sur un thread dédié, sous timeout.
/// Un thread hors délai n'est jamais joint : il finit seul, sa sortie est perdue.
async fn execute(name: &str, factory: CollectorFactory, options: CollectorOptions, timeout: Duration) -> Execution {
    debug!("{}: executing with {} options", name, options.len());

    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name(format!("collector-{}", name.to_lowercase()))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(
                move || -> Result<CollectorOutput, (ScanStage, CollectorError)> {
                    let mut collector = factory(&options).map_err(|e| (ScanStage::Loading, e))?;
                    collector.set_deadline(timeout);
                    collector.collect().map_err(|e| (ScanStage::Executing, e))
                },
            ));
            // le récepteur a disparu si le timeout est déjà passé
            let _ = tx.send(outcome);
        });
    if let Err(e) = spawned {
        return Execution::Failed(ScanStage::Executing, format!("cannot start collector thread: {}", e));
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(Ok(output)))) => Execution::Collected(output),
        Ok(Ok(Ok(Err((ScanStage::Loading, e))))) => {
            Execution::Failed(ScanStage::Loading, format!("collector refused its options: {}", e))
        }
        Ok(Ok(Ok(Err((stage, e))))) => Execution::Failed(stage, e.to_string()),
        Ok(Ok(Err(payload))) => Execution::Failed(
            ScanStage::Executing,
            format!("collector panicked: {}", panic_message(payload)),
        ),
        Ok(Err(_)) => Execution::Failed(
            ScanStage::Executing,
            "collector thread exited without reporting".to_string(),
        ),
        Err(_) => Execution::Failed(
            ScanStage::Executing,
            format!("timed out after {}s", timeout.as_secs_f64()),
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn export(exporter: &dyn Exporter, report: &ScanReport) -> ExportSummary {
    let batch = report.export_batch();
    let files: Vec<String> = batch.keys().cloned().collect();
    info!("Exporting {} files via {}", files.len(), exporter.name());

    let success = exporter.upload(batch).await;
    if success {
        info!("Export complete");
    } else {
        warn!("Export failed or incomplete; device store writes are kept");
    }

    ExportSummary {
        exporter: exporter.name().to_string(),
        files,
        success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Collector;
    use crate::devices::DeviceStore;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    struct Static(Value);

    impl Collector for Static {
        fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
            Ok(self.0.as_object().cloned().unwrap_or_default())
        }
    }

    struct Echo(CollectorOptions);

    impl Collector for Echo {
        fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
            let mut out = Map::new();
            out.insert("dev".to_string(), self.0.to_json());
            Ok(out)
        }
    }

    fn orchestrator(dir: &TempDir, catalog: CollectorCatalog) -> (ScanOrchestrator, Arc<ConfigStore>, Arc<DeviceStore>) {
        let registry = Arc::new(ServiceRegistry::load(dir.path().join("services.json")));
        let config = Arc::new(ConfigStore::load(dir.path().join("config.json")));
        let devices = Arc::new(DeviceStore::load(dir.path().join("machines.json")));
        let orchestrator = ScanOrchestrator::new(
            registry,
            config.clone(),
            devices.clone(),
            Arc::new(catalog),
            &ScanSettings::default(),
        );
        (orchestrator, config, devices)
    }

    #[test]
    fn test_collection_entry_wraps_scalars() {
        let entry = collection_entry("OS", &json!("Linux"), "2025-01-01T00:00:00Z");
        assert_eq!(
            Value::Object(entry),
            json!({"value": "Linux", "last_scan": "2025-01-01T00:00:00Z", "service": "OS"})
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }

    #[tokio::test]
    async fn test_lowercase_config_names_are_canonicalised() {
        let dir = tempdir().unwrap();
        let mut catalog = CollectorCatalog::new();
        catalog.register("OS", |_| Ok(Box::new(Static(json!({"dev": {"name": "Linux"}}))) as Box<dyn Collector>));
        let (orchestrator, config, devices) = orchestrator(&dir, catalog);
        config.set_service_config("os", Map::new());

        let report = orchestrator.run(ScanRequest::default()).await;

        assert_eq!(report.services, vec!["OS"]);
        assert!(report.get("os").unwrap().success);
        assert_eq!(devices.get_service_data("dev", "OS").unwrap()["service"], json!("OS"));
    }

    #[tokio::test]
    async fn test_options_reach_the_collector() {
        let dir = tempdir().unwrap();
        let mut catalog = CollectorCatalog::new();
        catalog.register("RAM", |options| Ok(Box::new(Echo(options.clone())) as Box<dyn Collector>));
        let (orchestrator, config, _devices) = orchestrator(&dir, catalog);
        config.set_service_config("RAM", json!({"unit": "TB", "show_swap": "yes"}).as_object().cloned().unwrap());

        let report = orchestrator.run(ScanRequest::default()).await;
        let run = report.get("RAM").unwrap();

        assert!(run.success);
        assert_eq!(run.payload.as_ref().unwrap()["dev"], json!({"show_swap": true, "unit": "MB"}));
        assert_eq!(run.rejected_options.len(), 1);
        assert_eq!(run.rejected_options[0].option, "unit");

        let (effective, rejected) = orchestrator.effective_options("ram");
        assert_eq!(effective.text("unit"), Some("MB"));
        assert_eq!(rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_overrides_from_every_spelling_are_merged() {
        let dir = tempdir().unwrap();
        let mut catalog = CollectorCatalog::new();
        catalog.register("CPU", |options| Ok(Box::new(Echo(options.clone())) as Box<dyn Collector>));
        let (orchestrator, config, _devices) = orchestrator(&dir, catalog);
        config.set_service_config("CPU", json!({"show_load": false}).as_object().cloned().unwrap());
        config.set_service_config("cpu", json!({"show_temperature": true}).as_object().cloned().unwrap());

        let report = orchestrator.run(ScanRequest::default()).await;

        assert_eq!(report.services, vec!["CPU"]);
        let payload = report.get("CPU").unwrap().payload.as_ref().unwrap();
        assert_eq!(payload["dev"]["show_load"], json!(false));
        assert_eq!(payload["dev"]["show_temperature"], json!(true));
        assert_eq!(payload["dev"]["show_usage"], json!(true));
    }

    #[tokio::test]
    async fn test_blank_name_fails_at_loading() {
        let dir = tempdir().unwrap();
        let mut catalog = CollectorCatalog::new();
        catalog.register("OS", |_| Ok(Box::new(Static(json!({"dev": {}}))) as Box<dyn Collector>));
        let (orchestrator, config, _devices) = orchestrator(&dir, catalog);
        config.set_service_config("OS", Map::new());
        config.set_service_config("   ", Map::new());

        let report = orchestrator.run(ScanRequest::default()).await;

        assert_eq!(report.results.len(), 2);
        assert!(report.get("OS").unwrap().success);
        let blank = &report.results[""];
        assert!(!blank.success);
        assert_eq!(blank.failed_stage, Some(ScanStage::Loading));
        assert_eq!(blank.error.as_deref(), Some("collector name is empty"));
    }

    struct Deadline(Option<Duration>);

    impl Collector for Deadline {
        fn set_deadline(&mut self, timeout: Duration) {
            self.0 = Some(timeout);
        }

        fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
            let mut out = Map::new();
            out.insert("dev".to_string(), json!({"deadline_secs": self.0.map(|d| d.as_secs())}));
            Ok(out)
        }
    }

    #[tokio::test]
    async fn test_collector_receives_the_scan_timeout() {
        let dir = tempdir().unwrap();
        let mut catalog = CollectorCatalog::new();
        catalog.register("SLOW", |_| Ok(Box::new(Deadline(None)) as Box<dyn Collector>));
        let (orchestrator, config, _devices) = orchestrator(&dir, catalog);
        config.set_service_config("SLOW", Map::new());

        let report = orchestrator.run(ScanRequest::default()).await;
        let payload = report.get("SLOW").unwrap().payload.as_ref().unwrap();
        assert_eq!(payload["dev"]["deadline_secs"], json!(60));
    }

    #[tokio::test]
    async fn test_export_without_exporter_is_skipped() {
        let dir = tempdir().unwrap();
        let mut catalog = CollectorCatalog::new();
        catalog.register("OS", |_| Ok(Box::new(Static(json!({"dev": {}}))) as Box<dyn Collector>));
        let (orchestrator, config, _devices) = orchestrator(&dir, catalog);
        config.set_service_config("OS", Map::new());

        let report = orchestrator.run(ScanRequest { export: true }).await;
        assert!(!orchestrator.has_exporter());
        assert!(report.export.is_none());
        assert_eq!(report.succeeded(), 1);
    }

    #[test]
    fn test_export_batch_naming() {
        let started_at = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z").unwrap().with_timezone(&Utc);
        let mut report = ScanReport::empty(Uuid::nil(), started_at);
        report.services = vec!["CPU".into(), "DISK".into()];
        let mut ok = CollectorRun::failed(ScanStage::Executing, String::new(), started_at, Duration::ZERO);
        ok.success = true;
        ok.error = None;
        ok.failed_stage = None;
        ok.payload = Some(json!({"dev": {"cores": 2}}).as_object().cloned().unwrap());
        report.results.insert("CPU".into(), ok);
        report.results.insert(
            "DISK".into(),
            CollectorRun::failed(ScanStage::Executing, "boom".into(), started_at, Duration::ZERO),
        );

        let batch = report.export_batch();
        assert_eq!(
            batch.keys().collect::<Vec<_>>(),
            vec!["CPU_20250304_050607.json", "scan_20250304_050607.json"]
        );
        let consolidated = &batch["scan_20250304_050607.json"];
        assert_eq!(consolidated["services"], json!(["CPU", "DISK"]));
        assert_eq!(consolidated["results"]["DISK"]["success"], json!(false));
        assert_eq!(consolidated["results"]["DISK"]["failed_stage"], json!("executing"));
        assert_eq!(batch["CPU_20250304_050607.json"], json!({"dev": {"cores": 2}}));
    }
}
