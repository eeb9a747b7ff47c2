/**
 * EXTERNAL COLLECTORS - Collecteurs fournis sous forme d'exécutables
 *
 * RÔLE :
 * Permet d'ajouter un collecteur sans recompiler l'agent : un manifest JSON
 * dans collectors/ pointe vers un exécutable lancé à chaque collecte.
 *
 * PROTOCOLE :
 * - stdin  : options fusionnées, en objet JSON
 * - env    : HOSTSCAN_COLLECTOR_NAME, HOSTSCAN_DEVICE_ID (+ env du manifest)
 * - stdout : un objet JSON identifiant machine → payload
 * - code de sortie 0 obligatoire, stderr repris dans l'erreur sinon
 * - délai : le processus est tué (kill + wait) quand le timeout du scan expire
 *
 * EXEMPLE MANIFEST :
 * ```json
 * {
 *   "name": "uptime",
 *   "binary": "./uptime-collector",
 *   "args": ["--json"],
 *   "description": "Machine uptime",
 *   "env": {"UPTIME_FORMAT": "seconds"}
 * }
 * ```
 */

use super::{Collector, CollectorError, CollectorOutput, LoadError};
use crate::options::CollectorOptions;
use crate::storage::json_kind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, warn};

/// Intervalle de scrutation du processus enfant
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Manifest d'un collecteur externe (collectors/{nom}.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalManifest {
    pub name: String,
    /// Chemin de l'exécutable, relatif au dossier du manifest
    pub binary: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub description: Option<String>,
    pub env: Option<HashMap<String, String>>,
}

/// Lit et valide un manifest : nom non vide, exécutable existant
pub async fn load_manifest(path: &Path) -> Result<ExternalManifest, LoadError> {
    let content = fs::read_to_string(path).await?;
    let mut manifest: ExternalManifest = serde_json::from_str(&content)?;

    if manifest.name.trim().is_empty() {
        return Err(LoadError::Manifest("name cannot be empty".to_string()));
    }

    if manifest.binary.is_relative() {
        if let Some(dir) = path.parent() {
            manifest.binary = dir.join(&manifest.binary);
        }
    }
    if !manifest.binary.exists() {
        return Err(LoadError::Manifest(format!(
            "binary not found: {}",
            manifest.binary.display()
        )));
    }

    Ok(manifest)
}

/// Instance construite par la fabrique d'un manifest
pub struct ExternalCollector {
    name: String,
    manifest: Arc<ExternalManifest>,
    options: CollectorOptions,
    env: HashMap<String, String>,
    deadline: Option<Duration>,
}

impl ExternalCollector {
    pub fn new(
        name: String,
        manifest: Arc<ExternalManifest>,
        options: CollectorOptions,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            name,
            manifest,
            options,
            env,
            deadline: None,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.manifest.binary);
        cmd.args(&self.manifest.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(env) = &self.manifest.env {
            for (k, v) in env {
                cmd.env(k, v);
            }
        }
        cmd.env("HOSTSCAN_COLLECTOR_NAME", &self.name);
        cmd
    }
}

impl Collector for ExternalCollector {
    fn set_deadline(&mut self, timeout: Duration) {
        self.deadline = Some(timeout);
    }

    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        let input = serde_json::to_vec(&self.options.to_json())?;
        let started = Instant::now();
        let mut child = self.command().spawn()?;
        debug!("External collector {} started (pid {})", self.name, child.id());

        if let Some(mut stdin) = child.stdin.take() {
            // un collecteur qui ignore stdin peut déjà être sorti
            match stdin.write_all(&input) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
                _ => {}
            }
        }

        // stdout/stderr lus en parallèle : un pipe plein bloquerait l'enfant
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(timeout) = self.deadline {
                if started.elapsed() >= timeout {
                    kill(&mut child, &self.name);
                    return Err(CollectorError::TimedOut(timeout));
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = join(stdout);
        if !status.success() {
            return Err(CollectorError::ExternalFailed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&join(stderr)).trim().to_string(),
            });
        }

        match serde_json::from_slice::<Value>(&stdout) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(CollectorError::InvalidOutput(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(CollectorError::InvalidOutput(e.to_string())),
        }
    }
}

fn kill(child: &mut Child, name: &str) {
    warn!("External collector {} timed out, killing pid {}", name, child.id());
    if let Err(e) = child.kill() {
        warn!("Failed to kill external collector {}: {}", name, e);
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|handle| handle.join().ok()).unwrap_or_default()
}
