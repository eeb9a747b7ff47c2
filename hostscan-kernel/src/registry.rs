/**
 * SERVICE REGISTRY - Catalogue des types de collecteurs et de leurs options
 *
 * RÔLE :
 * Décrit chaque collecteur connu (CPU, RAM, DISK...) : description humaine et
 * options typées avec leurs valeurs par défaut. C'est la source des défauts
 * que l'orchestrateur fusionne avec les surcharges de l'installation.
 *
 * FONCTIONNEMENT :
 * - Persistance : data/services.json (objet nom → descripteur)
 * - Fail-closed : fichier absent/illisible → catalogue par défaut, réécrit sur disque
 * - Entrée mal formée : ignorée au chargement, conservée telle quelle sur disque
 * - Noms normalisés en MAJUSCULES, recherche insensible à la casse
 * - Write-through : add/remove/update réécrivent tout le catalogue, verrou tenu
 *
 * EXEMPLE services.json :
 * ```json
 * {
 *   "RAM": {
 *     "description": "Memory usage",
 *     "options": {
 *       "unit": {"type": "string", "default": "MB", "description": "Unit", "options": ["MB", "GB"]}
 *     }
 *   }
 * }
 * ```
 */

use crate::options::OptionSpec;
use crate::storage::{self, StoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DEFAULT_CATALOG_FILE: &str = "data/services.json";

pub type OptionSpecs = BTreeMap<String, OptionSpec>;
pub type Catalog = BTreeMap<String, CollectorDescriptor>;

/// Descripteur d'un type de collecteur
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionSpecs>,
}

impl CollectorDescriptor {
    pub fn new(description: &str, options: OptionSpecs) -> Self {
        Self {
            description: Some(description.to_string()),
            options: Some(options),
        }
    }

    pub fn option_specs(&self) -> OptionSpecs {
        self.options.clone().unwrap_or_default()
    }
}

/// Entrée du fichier qui ne se lit pas comme un descripteur
#[derive(Debug, Clone)]
struct MalformedEntry {
    raw: Value,
    reason: String,
}

/// Registry des collecteurs, adossé à un fichier JSON
pub struct ServiceRegistry {
    path: PathBuf,
    catalog: Mutex<Catalog>,
    /// Verrouillé après `catalog`, jamais avant
    malformed: Mutex<BTreeMap<String, MalformedEntry>>,
}

impl ServiceRegistry {
    /// Charge le catalogue ; ne retourne jamais d'erreur (repli sur le défaut)
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let registry = Self {
            path: path.into(),
            catalog: Mutex::new(Catalog::new()),
            malformed: Mutex::new(BTreeMap::new()),
        };
        registry.reload();
        registry
    }

    /// Relit le fichier avec la même règle de repli que `load`
    pub fn reload(&self) {
        let mut catalog = self.catalog.lock();
        match read_catalog(&self.path) {
            Ok(Some((loaded, malformed))) => {
                info!("Service catalog loaded: {} collectors from {}", loaded.len(), self.path.display());
                for (name, entry) in &malformed {
                    warn!("Catalog entry {} skipped: {}", name, entry.reason);
                }
                *catalog = loaded;
                *self.malformed.lock() = malformed;
            }
            Ok(None) => {
                warn!("Service catalog not found at {}, installing defaults", self.path.display());
                *catalog = default_catalog();
                self.malformed.lock().clear();
                self.persist(&catalog);
            }
            Err(e) => {
                error!("Service catalog unreadable ({}), installing defaults", e);
                *catalog = default_catalog();
                self.malformed.lock().clear();
                self.persist(&catalog);
            }
        }
    }

    /// Sauvegarde explicite : seule opération qui remonte l'erreur d'écriture
    pub fn save(&self) -> Result<(), StoreError> {
        let catalog = self.catalog.lock();
        storage::write_json_pretty(&self.path, &self.to_file(&catalog)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<CollectorDescriptor> {
        self.catalog.lock().get(&canonical_name(name)).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.catalog.lock().contains_key(&canonical_name(name))
    }

    pub fn list_names(&self) -> Vec<String> {
        self.catalog.lock().keys().cloned().collect()
    }

    /// Copie complète du catalogue
    pub fn all(&self) -> Catalog {
        self.catalog.lock().clone()
    }

    pub fn description(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|d| d.description)
    }

    pub fn options(&self, name: &str) -> Option<OptionSpecs> {
        self.get(name).map(|d| d.option_specs())
    }

    pub fn option_info(&self, name: &str, option: &str) -> Option<OptionSpec> {
        self.options(name).and_then(|mut specs| specs.remove(option))
    }

    pub fn option_default(&self, name: &str, option: &str) -> Option<Value> {
        self.option_info(name, option).and_then(|spec| spec.default)
    }

    pub fn option_choices(&self, name: &str, option: &str) -> Option<Vec<String>> {
        self.option_info(name, option).and_then(|spec| spec.choices)
    }

    /// Nom d'option → défaut ; `None` si le collecteur est inconnu
    pub fn option_defaults(&self, name: &str) -> Option<Map<String, Value>> {
        self.options(name).map(|specs| {
            specs
                .into_iter()
                .filter_map(|(option, spec)| spec.default.map(|value| (option, value)))
                .collect()
        })
    }

    /// Options dont le défaut est le booléen `true`
    pub fn enabled_by_default_options(&self, name: &str) -> OptionSpecs {
        self.options(name)
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, spec)| spec.default == Some(Value::Bool(true)))
            .collect()
    }

    /// Ajoute un collecteur ; `false` si le nom existe déjà
    pub fn add(&self, name: &str, description: &str, options: Option<OptionSpecs>) -> bool {
        let key = canonical_name(name);
        let mut catalog = self.catalog.lock();
        if catalog.contains_key(&key) {
            warn!("Collector {} already in catalog, not added", key);
            return false;
        }

        catalog.insert(
            key.clone(),
            CollectorDescriptor {
                description: Some(description.to_string()),
                options,
            },
        );
        self.malformed.lock().remove(&key);
        info!("Collector added to catalog: {}", key);
        self.persist(&catalog);
        true
    }

    pub fn remove(&self, name: &str) -> bool {
        let key = canonical_name(name);
        let mut catalog = self.catalog.lock();
        let dropped_malformed = self.malformed.lock().remove(&key).is_some();
        if catalog.remove(&key).is_none() && !dropped_malformed {
            debug!("Collector {} not in catalog, nothing removed", key);
            return false;
        }
        info!("Collector removed from catalog: {}", key);
        self.persist(&catalog);
        true
    }

    /// `false` si le collecteur ou l'option est inconnu
    pub fn update_option_default(&self, name: &str, option: &str, value: Value) -> bool {
        let key = canonical_name(name);
        let mut catalog = self.catalog.lock();
        let Some(spec) = catalog
            .get_mut(&key)
            .and_then(|d| d.options.as_mut())
            .and_then(|specs| specs.get_mut(option))
        else {
            warn!("Cannot update default of unknown option {}.{}", key, option);
            return false;
        };

        spec.default = Some(value);
        info!("Default updated for {}.{}", key, option);
        self.persist(&catalog);
        true
    }

    /// Vérification de santé au démarrage ; rien n'est modifié
    pub fn validate(&self) -> bool {
        let issues = self.validation_issues();
        for issue in &issues {
            error!("Catalog validation: {}", issue);
        }
        issues.is_empty()
    }

    /// Liste lisible des défauts du catalogue (vide si valide)
    pub fn validation_issues(&self) -> Vec<String> {
        let catalog = self.catalog.lock();
        let mut issues: Vec<String> = self
            .malformed
            .lock()
            .iter()
            .map(|(name, entry)| format!("collector {} is malformed: {}", name, entry.reason))
            .collect();

        for (name, descriptor) in catalog.iter() {
            if descriptor.description.is_none() {
                issues.push(format!("collector {} has no description", name));
            }
            for (option, spec) in descriptor.options.iter().flatten() {
                let missing = spec.missing_fields();
                if !missing.is_empty() {
                    issues.push(format!("option {}.{} is missing {}", name, option, missing.join(", ")));
                }
            }
        }
        issues
    }

    fn persist(&self, catalog: &Catalog) {
        let written = self
            .to_file(catalog)
            .and_then(|file| storage::write_json_pretty(&self.path, &file));
        if let Err(e) = written {
            error!("Failed to persist service catalog: {}", e);
        }
    }

    /// Catalogue + entrées mal formées restituées telles quelles
    fn to_file(&self, catalog: &Catalog) -> Result<BTreeMap<String, Value>, StoreError> {
        let mut file = BTreeMap::new();
        for (name, entry) in self.malformed.lock().iter() {
            file.insert(name.clone(), entry.raw.clone());
        }
        for (name, descriptor) in catalog {
            let value = serde_json::to_value(descriptor).map_err(|e| StoreError::json(&self.path, e))?;
            file.insert(name.clone(), value);
        }
        Ok(file)
    }
}

/// Forme canonique d'un nom de collecteur
pub fn canonical_name(name: &str) -> String {
    name.trim().to_uppercase()
}

type ParsedCatalog = (Catalog, BTreeMap<String, MalformedEntry>);

/// Une entrée illisible n'invalide pas ses voisines
fn read_catalog(path: &Path) -> Result<Option<ParsedCatalog>, StoreError> {
    let Some(raw) = storage::read_json_object(path)? else {
        return Ok(None);
    };

    let mut catalog = Catalog::new();
    let mut malformed = BTreeMap::new();
    for (name, entry) in raw {
        let key = canonical_name(&name);
        match serde_json::from_value::<CollectorDescriptor>(entry.clone()) {
            Ok(descriptor) => {
                catalog.insert(key, descriptor);
            }
            Err(e) => {
                malformed.insert(
                    key,
                    MalformedEntry {
                        raw: entry,
                        reason: e.to_string(),
                    },
                );
            }
        }
    }
    Ok(Some((catalog, malformed)))
}

/// Catalogue installé quand services.json est absent ou illisible
pub fn default_catalog() -> Catalog {
    let mut catalog = Catalog::new();

    catalog.insert(
        "CPU".to_string(),
        CollectorDescriptor::new(
            "Processor model, core count, usage and load",
            BTreeMap::from([
                ("show_usage".to_string(), OptionSpec::boolean(true, "Report global CPU usage")),
                ("show_load".to_string(), OptionSpec::boolean(true, "Report load averages")),
                (
                    "show_temperature".to_string(),
                    OptionSpec::boolean(false, "Report temperature sensors"),
                ),
            ]),
        ),
    );
    catalog.insert(
        "RAM".to_string(),
        CollectorDescriptor::new(
            "Physical memory and swap usage",
            BTreeMap::from([
                ("unit".to_string(), OptionSpec::choice("MB", &["MB", "GB"], "Unit used for sizes")),
                ("show_swap".to_string(), OptionSpec::boolean(false, "Include swap usage")),
            ]),
        ),
    );
    catalog.insert(
        "DISK".to_string(),
        CollectorDescriptor::new(
            "Mounted disks with capacity and free space",
            BTreeMap::from([(
                "include_removable".to_string(),
                OptionSpec::boolean(false, "Include removable media"),
            )]),
        ),
    );
    catalog.insert(
        "OS".to_string(),
        CollectorDescriptor::new(
            "Operating system name, version and hostname",
            BTreeMap::from([(
                "include_kernel".to_string(),
                OptionSpec::boolean(true, "Include kernel version"),
            )]),
        ),
    );
    catalog.insert(
        "NETWORK".to_string(),
        CollectorDescriptor::new(
            "Network interfaces with addresses",
            BTreeMap::from([(
                "include_loopback".to_string(),
                OptionSpec::boolean(false, "Include loopback interfaces"),
            )]),
        ),
    );

    catalog
}
