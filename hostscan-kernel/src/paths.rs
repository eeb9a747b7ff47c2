/**
 * PATHS - Résolution des fichiers de données
 *
 * RÔLE :
 * Point unique qui transforme "data/config.json" en chemin absolu pour les
 * trois stores et le dossier des collecteurs externes.
 *
 * FONCTIONNEMENT :
 * - Base = `data_dir` des settings (HOSTSCAN_DATA_DIR) si défini
 * - Sinon production → dossier de l'exécutable, développement → dossier courant
 * - `resolve` ne cherche rien et ne peut pas échouer
 * - `locate` cherche un fichier existant dans les emplacements connus
 */

use crate::settings::{Environment, Settings};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sous-dossiers essayés par `locate`, après la base elle-même
const SEARCH_DIRS: &[&str] = &["resources", "data", "assets", "src"];

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("file not found: {relative} (searched {searched} locations under {base})")]
    NotFound {
        relative: String,
        base: PathBuf,
        searched: usize,
    },
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let base = match &settings.data_dir {
            Some(dir) => dir.clone(),
            None => default_base(settings.environment),
        };
        debug!("Data root: {}", base.display());
        Self::new(base)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Chemin sous la base ; un chemin absolu est renvoyé tel quel
    pub fn resolve<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.base.join(relative)
        }
    }

    /// Premier emplacement existant parmi la base, ses sous-dossiers connus et le parent
    pub fn locate<P: AsRef<Path>>(&self, relative: P) -> Result<PathBuf, PathError> {
        let relative = relative.as_ref();
        let candidates = self.candidates(relative);

        candidates
            .iter()
            .find(|candidate| candidate.exists())
            .cloned()
            .ok_or_else(|| PathError::NotFound {
                relative: relative.display().to_string(),
                base: self.base.clone(),
                searched: candidates.len(),
            })
    }

    fn candidates(&self, relative: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![self.resolve(relative)];
        if relative.is_absolute() {
            return candidates;
        }
        candidates.extend(SEARCH_DIRS.iter().map(|dir| self.base.join(dir).join(relative)));
        if let Some(parent) = self.base.parent() {
            candidates.push(parent.join(relative));
        }
        candidates
    }
}

fn default_base(environment: Environment) -> PathBuf {
    let base = match environment {
        Environment::Production => std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        Environment::Development => std::env::current_dir().ok(),
    };
    base.unwrap_or_else(|| PathBuf::from("."))
}
