/**
 * DEVICE STORE - Résultats de collecte par machine
 *
 * RÔLE :
 * Registre durable identifiant machine → {collecteur → dernière entrée de collecte}.
 * C'est ici que l'orchestrateur écrit chaque résultat réussi.
 *
 * FONCTIONNEMENT :
 * - Persistance : data/machines.json, réécrit en entier à chaque mutation
 * - `add_computer` : merge superficiel (les entrées des autres collecteurs sont gardées)
 * - `update_service_data` : remplace atomiquement l'entrée d'UN collecteur
 * - Chargement best-effort : fichier illisible → store vide, jamais d'erreur
 * - Optionnellement lié à une identité machine (adresse MAC) pour les helpers
 *   `update_machine_info` / `get_machine_info`
 *
 * DONNÉES EXEMPLE :
 * ```json
 * {
 *   "a1:b2:c3:d4:e5:f6": {
 *     "CPU": {"cores": 8, "last_scan": "2025-01-01T10:00:00Z", "service": "CPU"}
 *   }
 * }
 * ```
 */

use crate::storage::{self, StoreError};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_DEVICE_FILE: &str = "data/machines.json";

/// Enregistrement d'une machine : collecteur → entrée
pub type DeviceRecord = Map<String, Value>;

/// Fournit l'identifiant stable de la machine courante
pub trait DeviceIdentity: Send + Sync {
    fn current_device_id(&self) -> String;
}

pub struct DeviceStore {
    path: PathBuf,
    computers: Mutex<Map<String, Value>>,
    identity: Option<Arc<dyn DeviceIdentity>>,
}

impl DeviceStore {
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let store = Self {
            path: path.into(),
            computers: Mutex::new(Map::new()),
            identity: None,
        };
        store.reload();
        store
    }

    pub fn with_identity(mut self, identity: Arc<dyn DeviceIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn reload(&self) {
        let mut computers = self.computers.lock();
        *computers = match storage::read_json_object(&self.path) {
            Ok(Some(raw)) => raw,
            Ok(None) => Map::new(),
            Err(e) => {
                warn!("Device store unreadable ({}), starting empty", e);
                Map::new()
            }
        };
        info!("Device store loaded: {} devices", computers.len());
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let computers = self.computers.lock();
        storage::write_json_pretty(&self.path, &*computers)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insère ou fusionne superficiellement `data` dans l'enregistrement de la machine
    pub fn add_computer(&self, identifier: &str, data: DeviceRecord) {
        if let Err(e) = self.try_add_computer(identifier, data) {
            error!("Failed to persist device store: {}", e);
        }
    }

    /// Comme `add_computer`, mais remonte l'échec d'écriture.
    /// La mémoire est mise à jour même si l'écriture échoue.
    pub fn try_add_computer(&self, identifier: &str, data: DeviceRecord) -> Result<(), StoreError> {
        let mut computers = self.computers.lock();
        match computers.get_mut(identifier) {
            Some(Value::Object(record)) => {
                debug!("Merging {} entries into device {}", data.len(), identifier);
                record.extend(data);
            }
            _ => {
                info!("New device recorded: {}", identifier);
                computers.insert(identifier.to_string(), Value::Object(data));
            }
        }
        storage::write_json_pretty(&self.path, &*computers)
    }

    /// Remplace l'entrée d'un collecteur (pas de fusion à ce niveau)
    pub fn update_service_data(&self, identifier: &str, service_name: &str, service_data: Value) {
        let mut computers = self.computers.lock();
        let mut record = computers
            .get(identifier)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        record.insert(service_name.to_string(), service_data);
        computers.insert(identifier.to_string(), Value::Object(record));
        debug!("Entry {} replaced for device {}", service_name, identifier);
        self.persist(&computers);
    }

    pub fn remove_computer(&self, identifier: &str) -> bool {
        let mut computers = self.computers.lock();
        if computers.shift_remove(identifier).is_none() {
            debug!("Device {} unknown, nothing removed", identifier);
            return false;
        }
        info!("Device removed: {}", identifier);
        self.persist(&computers);
        true
    }

    pub fn clear_all(&self) {
        let mut computers = self.computers.lock();
        let count = computers.len();
        computers.clear();
        info!("Device store cleared ({} devices)", count);
        self.persist(&computers);
    }

    pub fn list_computers(&self) -> Vec<String> {
        self.computers.lock().keys().cloned().collect()
    }

    pub fn get_computer(&self, identifier: &str) -> Option<DeviceRecord> {
        self.computers
            .lock()
            .get(identifier)
            .and_then(Value::as_object)
            .cloned()
    }

    pub fn get_service_data(&self, identifier: &str, service_name: &str) -> Option<Value> {
        self.get_computer(identifier)
            .and_then(|mut record| record.remove(service_name))
    }

    pub fn get_all_computers(&self) -> Map<String, Value> {
        self.computers.lock().clone()
    }

    /// Identifiant de la machine courante, si une identité est liée
    pub fn current_device_id(&self) -> Option<String> {
        self.identity.as_ref().map(|identity| identity.current_device_id())
    }

    /// Fusionne `data` dans l'enregistrement de la machine courante.
    /// `false` si aucune identité n'est liée.
    pub fn update_machine_info(&self, data: DeviceRecord) -> bool {
        match self.current_device_id() {
            Some(id) => {
                self.add_computer(&id, data);
                true
            }
            None => {
                warn!("No device identity bound, machine info not updated");
                false
            }
        }
    }

    /// Enregistrement de `identifier` (ou de la machine courante), vide si inconnu
    pub fn get_machine_info(&self, identifier: Option<&str>) -> DeviceRecord {
        let id = match identifier {
            Some(id) => Some(id.to_string()),
            None => self.current_device_id(),
        };
        id.and_then(|id| self.get_computer(&id)).unwrap_or_default()
    }

    fn persist(&self, computers: &Map<String, Value>) {
        if let Err(e) = storage::write_json_pretty(&self.path, computers) {
            error!("Failed to persist device store: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    struct StaticId(&'static str);

    impl DeviceIdentity for StaticId {
        fn current_device_id(&self) -> String {
            self.0.to_string()
        }
    }

    fn record(value: Value) -> DeviceRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_add_computer_merges_siblings() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::load(dir.path().join("machines.json"));

        store.add_computer("aa:bb", record(json!({"CPU": {"cores": 4}})));
        store.add_computer("aa:bb", record(json!({"DISK": {"count": 2}})));

        let device = store.get_computer("aa:bb").unwrap();
        assert_eq!(device["CPU"], json!({"cores": 4}));
        assert_eq!(device["DISK"], json!({"count": 2}));
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let dir = tempdir().unwrap();
        let first = DeviceStore::load(dir.path().join("a.json"));
        let second = DeviceStore::load(dir.path().join("b.json"));
        let cpu = record(json!({"CPU": {"cores": 4}}));
        let ram = record(json!({"RAM": {"total": 16}}));

        first.add_computer("id", cpu.clone());
        first.add_computer("id", ram.clone());
        second.add_computer("id", ram);
        second.add_computer("id", cpu);

        assert_eq!(first.get_computer("id"), second.get_computer("id"));
    }

    #[test]
    fn test_update_service_data_replaces_single_entry() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::load(dir.path().join("machines.json"));
        store.add_computer("id", record(json!({"CPU": {"cores": 4}})));

        store.update_service_data("id", "RAM", json!({"total": 8, "swap": 2}));
        store.update_service_data("id", "RAM", json!({"total": 16}));

        assert_eq!(store.get_service_data("id", "RAM"), Some(json!({"total": 16})));
        assert_eq!(store.get_service_data("id", "CPU"), Some(json!({"cores": 4})));
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::load(dir.path().join("machines.json"));
        store.add_computer("one", DeviceRecord::new());
        store.add_computer("two", DeviceRecord::new());

        assert!(store.remove_computer("one"));
        assert!(!store.remove_computer("one"));
        assert_eq!(store.list_computers(), vec!["two"]);

        store.clear_all();
        assert!(store.get_all_computers().is_empty());
        assert!(DeviceStore::load(store.path()).list_computers().is_empty());
    }

    #[test]
    fn test_unreadable_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("machines.json");
        fs::write(&path, "[]").unwrap();

        let store = DeviceStore::load(&path);
        assert!(store.list_computers().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::load(dir.path().join("machines.json"));
        store.add_computer("id", record(json!({"OS": {"name": "Linux", "last_scan": "2025-01-01T00:00:00Z"}})));

        let reloaded = DeviceStore::load(store.path());
        assert_eq!(reloaded.get_all_computers(), store.get_all_computers());
    }

    #[test]
    fn test_machine_info_uses_bound_identity() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::load(dir.path().join("machines.json"))
            .with_identity(Arc::new(StaticId("de:ad:be:ef:00:01")));

        assert!(store.update_machine_info(record(json!({"OS": {"name": "Linux"}}))));
        assert_eq!(store.get_machine_info(None)["OS"]["name"], json!("Linux"));
        assert!(store.get_machine_info(Some("unknown")).is_empty());
    }

    #[test]
    fn test_machine_info_without_identity() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::load(dir.path().join("machines.json"));

        assert!(!store.update_machine_info(DeviceRecord::new()));
        assert!(store.get_machine_info(None).is_empty());
    }
}
