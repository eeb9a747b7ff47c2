/**
 * COLLECTORS - Contrat des collecteurs et catalogue de fabriques
 *
 * RÔLE :
 * Un collecteur lit une catégorie de données machine (CPU, disques...) et
 * renvoie un objet identifiant machine → payload. L'orchestrateur ne connaît
 * les collecteurs que par leur nom : ce catalogue associe chaque nom à une
 * fabrique qui construit l'instance à partir des options fusionnées.
 *
 * FONCTIONNEMENT :
 * - Trait `Collector` : une seule opération bloquante, `collect()`
 * - `CollectorCatalog` : nom MAJUSCULE → fabrique (intégrée ou externe)
 * - Collecteurs externes : manifests JSON dans collectors/, exécutables lancés
 *   à chaque collecte (voir `external`)
 * - Nom sans fabrique = erreur de chargement, jamais fatale pour le scan
 */

pub mod external;

use crate::options::CollectorOptions;
use crate::registry::canonical_name;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub use external::{ExternalCollector, ExternalManifest};

/// Dossier des manifests de collecteurs externes, relatif à la racine de données
pub const DEFAULT_COLLECTORS_DIR: &str = "collectors";

/// Sortie d'une collecte : identifiant machine → payload
pub type CollectorOutput = Map<String, Value>;

/// Erreurs levées pendant la construction ou la collecte
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },
    #[error("data unavailable: {0}")]
    Unavailable(String),
    #[error("external collector exited with {status}: {stderr}")]
    ExternalFailed { status: String, stderr: String },
    #[error("external collector produced invalid output: {0}")]
    InvalidOutput(String),
    #[error("killed after {}s without finishing", .0.as_secs_f64())]
    TimedOut(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Erreurs de résolution d'un collecteur par son nom
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no collector implementation registered for {0}")]
    NotRegistered(String),
    #[error("collector {name} refused its options: {source}")]
    Construction {
        name: String,
        #[source]
        source: CollectorError,
    },
    #[error("collector manifest error: {0}")]
    Manifest(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contrat d'un collecteur.
///
/// `collect` est bloquant : l'orchestrateur l'appelle depuis un thread dédié,
/// sous timeout. Le payload de chaque machine est libre (objet de préférence).
pub trait Collector: Send {
    /// Délai accordé à `collect`, transmis avant l'appel. Un collecteur qui
    /// lance un processus doit l'arrêter lui-même une fois ce délai écoulé.
    fn set_deadline(&mut self, _timeout: Duration) {}

    fn collect(&mut self) -> Result<CollectorOutput, CollectorError>;
}

/// Construit un collecteur à partir de ses options fusionnées
pub type CollectorFactory =
    Arc<dyn Fn(&CollectorOptions) -> Result<Box<dyn Collector>, CollectorError> + Send + Sync>;

/// Provenance d'une fabrique, pour l'affichage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CollectorOrigin {
    Builtin,
    External { manifest: PathBuf },
}

struct CatalogEntry {
    factory: CollectorFactory,
    origin: CollectorOrigin,
    description: Option<String>,
}

/// Catalogue nom → fabrique, rempli au démarrage
#[derive(Default)]
pub struct CollectorCatalog {
    entries: HashMap<String, CatalogEntry>,
    /// Variables passées à tous les collecteurs externes
    global_env: HashMap<String, String>,
}

impl CollectorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.global_env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_env(&mut self, key: &str, value: &str) {
        self.global_env.insert(key.to_string(), value.to_string());
    }

    /// Enregistre (ou remplace) une fabrique intégrée
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&CollectorOptions) -> Result<Box<dyn Collector>, CollectorError> + Send + Sync + 'static,
    {
        let key = canonical_name(name);
        if self.entries.contains_key(&key) {
            warn!("Collector factory {} replaced", key);
        }
        self.entries.insert(
            key,
            CatalogEntry {
                factory: Arc::new(factory),
                origin: CollectorOrigin::Builtin,
                description: None,
            },
        );
    }

    /// Enregistre un collecteur externe ; `false` si le nom est déjà pris
    pub fn register_external(&mut self, manifest: ExternalManifest, manifest_path: &Path) -> bool {
        let key = canonical_name(&manifest.name);
        if self.entries.contains_key(&key) {
            warn!(
                "External collector {} ignored ({}): name already registered",
                key,
                manifest_path.display()
            );
            return false;
        }

        let description = manifest.description.clone();
        let manifest = Arc::new(manifest);
        let env = self.global_env.clone();
        let name = key.clone();
        let factory: CollectorFactory = Arc::new(move |options: &CollectorOptions| {
            let collector = ExternalCollector::new(name.clone(), manifest.clone(), options.clone(), env.clone());
            Ok(Box::new(collector) as Box<dyn Collector>)
        });

        self.entries.insert(
            key,
            CatalogEntry {
                factory,
                origin: CollectorOrigin::External {
                    manifest: manifest_path.to_path_buf(),
                },
                description,
            },
        );
        true
    }

    /// Charge tous les manifests `*.json` du dossier.
    /// Un dossier absent n'est pas une erreur ; un manifest invalide est ignoré.
    pub async fn discover_external(&mut self, dir: &Path) -> Result<Vec<String>, LoadError> {
        let mut discovered = Vec::new();
        if !dir.is_dir() {
            info!("No external collectors directory at {}", dir.display());
            return Ok(discovered);
        }

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match external::load_manifest(&path).await {
                Ok(manifest) => {
                    let name = canonical_name(&manifest.name);
                    if self.register_external(manifest, &path) {
                        info!("External collector discovered: {} (from {})", name, path.display());
                        discovered.push(name);
                    }
                }
                Err(e) => warn!("Failed to load collector manifest {}: {}", path.display(), e),
            }
        }

        discovered.sort();
        Ok(discovered)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&canonical_name(name))
    }

    /// Noms enregistrés, triés
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn origins(&self) -> BTreeMap<String, CollectorOrigin> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.origin.clone()))
            .collect()
    }

    /// Description déclarée par le manifest d'un collecteur externe
    pub fn description(&self, name: &str) -> Option<String> {
        self.entries
            .get(&canonical_name(name))
            .and_then(|entry| entry.description.clone())
    }

    pub fn resolve(&self, name: &str) -> Result<CollectorFactory, LoadError> {
        let key = canonical_name(name);
        self.entries
            .get(&key)
            .map(|entry| entry.factory.clone())
            .ok_or(LoadError::NotRegistered(key))
    }

    /// Résout puis construit le collecteur
    pub fn instantiate(&self, name: &str, options: &CollectorOptions) -> Result<Box<dyn Collector>, LoadError> {
        let factory = self.resolve(name)?;
        factory(options).map_err(|source| LoadError::Construction {
            name: canonical_name(name),
            source,
        })
    }
}
