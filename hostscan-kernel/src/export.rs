/**
 * EXPORT - Publication des résultats de scan vers un dépôt distant
 *
 * RÔLE :
 * L'orchestrateur remet un lot nom de fichier → JSON à un `Exporter` ; celui-ci
 * répond par un simple booléen (tout publié ou non). Un échec d'export est
 * journalisé, jamais propagé : les écritures du store machine restent valides.
 *
 * IMPLÉMENTATION FOURNIE :
 * - `GitHubExporter` : API contents de GitHub. Pour chaque fichier, GET du sha
 *   courant (mise à jour si le fichier existe) puis PUT du contenu en base64.
 *
 * CONFIGURATION (variables d'environnement) :
 * GITHUB_TOKEN, GITHUB_REPOSITORY_OWNER, GITHUB_REPOSITORY_NAME (obligatoires),
 * GITHUB_BRANCH (défaut "main"), GITHUB_FILE_PATH (défaut "machines/")
 */

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Lot de fichiers à publier : nom → contenu JSON
pub type ExportBatch = BTreeMap<String, Value>;

/// Contrat du collaborateur d'export
pub trait Exporter: Send + Sync {
    /// Nom court pour les logs
    fn name(&self) -> &str;

    /// `true` seulement si tous les fichiers ont été publiés
    fn upload(&self, files: ExportBatch) -> BoxFuture<'_, bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("exporter configuration incomplete, missing: {}", .0.join(", "))]
    MissingSettings(Vec<&'static str>),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote rejected {file} with status {status}: {body}")]
    Rejected {
        file: String,
        status: u16,
        body: String,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq)]
pub struct GitHubSettings {
    pub token: String,
    pub owner: String,
    pub repository: String,
    pub branch: String,
    /// Préfixe des fichiers dans le dépôt
    pub file_path: String,
    pub api_base: String,
}

impl GitHubSettings {
    pub fn from_env() -> Result<Self, ExportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("GITHUB_TOKEN");
        let owner = get("GITHUB_REPOSITORY_OWNER");
        let repository = get("GITHUB_REPOSITORY_NAME");

        match (token, owner, repository) {
            (Some(token), Some(owner), Some(repository)) => Ok(Self {
                token,
                owner,
                repository,
                branch: get("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
                file_path: get("GITHUB_FILE_PATH").unwrap_or_else(|| "machines/".to_string()),
                api_base: DEFAULT_API_BASE.to_string(),
            }),
            (token, owner, repository) => {
                let mut missing = Vec::new();
                if token.is_none() {
                    missing.push("GITHUB_TOKEN");
                }
                if owner.is_none() {
                    missing.push("GITHUB_REPOSITORY_OWNER");
                }
                if repository.is_none() {
                    missing.push("GITHUB_REPOSITORY_NAME");
                }
                Err(ExportError::MissingSettings(missing))
            }
        }
    }

    /// URL de l'API contents pour un fichier du lot
    pub fn contents_url(&self, filename: &str) -> String {
        let prefix = self.file_path.trim_matches('/');
        let path = if prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", prefix, filename)
        };
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repository,
            path
        )
    }
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

pub struct GitHubExporter {
    client: reqwest::Client,
    settings: GitHubSettings,
}

impl GitHubExporter {
    pub fn new(settings: GitHubSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &GitHubSettings {
        &self.settings
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("token {}", self.settings.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "hostscan-agent")
    }

    /// sha du fichier existant ; `None` s'il n'existe pas encore
    async fn current_sha(&self, url: &str) -> Option<String> {
        let response = match self
            .request(reqwest::Method::GET, url)
            .query(&[("ref", self.settings.branch.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("sha lookup failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }
        response.json::<ContentsEntry>().await.ok().map(|entry| entry.sha)
    }

    /// Crée ou met à jour un fichier du dépôt
    pub async fn upload_file(&self, filename: &str, content: &Value) -> Result<(), ExportError> {
        let url = self.settings.contents_url(filename);
        let sha = self.current_sha(&url).await;

        let mut body = json!({
            "message": format!("Update {}", filename),
            "content": encode_content(content)?,
            "branch": self.settings.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = Value::String(sha);
        }

        let response = self.request(reqwest::Method::PUT, &url).json(&body).send().await?;
        let status = response.status();
        if status.as_u16() == 200 || status.as_u16() == 201 {
            info!("Exported {} ({})", filename, status);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ExportError::Rejected {
                file: filename.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl Exporter for GitHubExporter {
    fn name(&self) -> &str {
        "github"
    }

    fn upload(&self, files: ExportBatch) -> BoxFuture<'_, bool> {
        async move {
            let total = files.len();
            let mut uploaded = 0;
            for (filename, content) in &files {
                match self.upload_file(filename, content).await {
                    Ok(()) => uploaded += 1,
                    Err(e) => error!("Export of {} failed: {}", filename, e),
                }
            }
            if uploaded < total {
                warn!("Export incomplete: {}/{} files uploaded", uploaded, total);
            }
            uploaded == total
        }
        .boxed()
    }
}

/// JSON indenté encodé en base64, tel qu'attendu par l'API contents
pub fn encode_content(content: &Value) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(content)?;
    Ok(STANDARD.encode(json.as_bytes()))
}
