/**
 * CONFIG STORE - Collecteurs activés et surcharges d'options par installation
 *
 * RÔLE :
 * Un collecteur est "activé" dès qu'il possède une entrée ici, même vide.
 * La liste des entrées, dans l'ordre du fichier, est la liste d'exécution du scan.
 *
 * FONCTIONNEMENT :
 * - Persistance : data/config.json (nom → {option: valeur brute})
 * - Le fichier est créé vide s'il n'existe pas ; un fichier corrompu repart de `{}`
 * - Write-through : chaque mutation réécrit le fichier, verrou tenu pendant l'écriture
 * - Noms conservés tels qu'écrits par l'appelant (la canonisation est faite par l'orchestrateur)
 */

use crate::storage::{self, json_kind, StoreError};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "data/config.json";

/// Surcharges brutes d'un collecteur
pub type ServiceOptions = Map<String, Value>;

pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<Map<String, Value>>,
}

impl ConfigStore {
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let store = Self {
            path: path.into(),
            config: Mutex::new(Map::new()),
        };
        if let Err(e) = store.ensure_config_file_exists() {
            error!("Cannot create config file {}: {}", store.path.display(), e);
        }
        store.reload();
        store
    }

    /// Crée un fichier `{}` si aucun n'existe
    pub fn ensure_config_file_exists(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        info!("Creating empty config file at {}", self.path.display());
        storage::write_json_pretty(&self.path, &Map::new())
    }

    pub fn reload(&self) {
        let mut config = self.config.lock();
        *config = match storage::read_json_object(&self.path) {
            Ok(Some(raw)) => sanitize(raw),
            Ok(None) => Map::new(),
            Err(e) => {
                error!("Config file unreadable ({}), starting from an empty config", e);
                Map::new()
            }
        };
        info!("Config loaded: {} enabled collectors", config.len());
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let config = self.config.lock();
        storage::write_json_pretty(&self.path, &*config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Surcharges du collecteur, vide si non configuré
    pub fn get_service_config(&self, name: &str) -> ServiceOptions {
        self.config
            .lock()
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Surcharges appliquées par-dessus `defaults`, clé par clé
    pub fn get_service_config_with_defaults(&self, name: &str, defaults: &ServiceOptions) -> ServiceOptions {
        let mut merged = defaults.clone();
        merged.extend(self.get_service_config(name));
        merged
    }

    pub fn get_service_option(&self, name: &str, option: &str, default: Value) -> Value {
        self.get_service_config(name).remove(option).unwrap_or(default)
    }

    pub fn set_service_config(&self, name: &str, options: ServiceOptions) {
        let mut config = self.config.lock();
        config.insert(name.to_string(), Value::Object(options));
        info!("Collector {} configured", name);
        self.persist(&config);
    }

    /// Crée l'entrée si besoin (ce qui active le collecteur)
    pub fn update_service_option(&self, name: &str, option: &str, value: Value) {
        let mut config = self.config.lock();
        let mut options = config
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        options.insert(option.to_string(), value);
        config.insert(name.to_string(), Value::Object(options));
        debug!("Option {}.{} updated", name, option);
        self.persist(&config);
    }

    /// Désactive le collecteur ; `false` s'il n'était pas configuré
    pub fn remove_service(&self, name: &str) -> bool {
        let mut config = self.config.lock();
        if config.shift_remove(name).is_none() {
            debug!("Collector {} not configured, nothing removed", name);
            return false;
        }
        info!("Collector {} disabled", name);
        self.persist(&config);
        true
    }

    /// Collecteurs activés, dans l'ordre du fichier
    pub fn list_services(&self) -> Vec<String> {
        self.config.lock().keys().cloned().collect()
    }

    pub fn get_all_configs(&self) -> Map<String, Value> {
        self.config.lock().clone()
    }

    fn persist(&self, config: &Map<String, Value>) {
        if let Err(e) = storage::write_json_pretty(&self.path, config) {
            error!("Failed to persist config: {}", e);
        }
    }
}

/// Une entrée qui n'est pas un objet reste activée, sans surcharge
fn sanitize(raw: Map<String, Value>) -> Map<String, Value> {
    raw.into_iter()
        .map(|(name, value)| match value {
            Value::Object(_) => (name, value),
            other => {
                warn!(
                    "Config entry {} is a {}, treating it as enabled without overrides",
                    name,
                    json_kind(&other)
                );
                (name, Value::Object(Map::new()))
            }
        })
        .collect()
}
