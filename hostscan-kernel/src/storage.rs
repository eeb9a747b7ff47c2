/**
 * STORAGE - Persistance JSON commune aux trois stores
 *
 * RÔLE :
 * Lecture/écriture des fichiers JSON utilisés par le catalogue de services,
 * la configuration par installation et le store par machine.
 *
 * FONCTIONNEMENT :
 * - Lecture tolérante : fichier absent = `Ok(None)`, le store décide du repli
 * - Écriture pretty-printed (indentation 2 espaces), répertoires parents créés
 * - Écriture via fichier temporaire + rename, un crash ne laisse pas de JSON tronqué
 */

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Erreurs de persistance des stores JSON
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected content in {path}: {reason}")]
    Shape { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Lit un fichier JSON dont la racine doit être un objet.
/// `Ok(None)` si le fichier n'existe pas.
pub fn read_json_object(path: &Path) -> Result<Option<Map<String, Value>>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    match serde_json::from_str::<Value>(&content).map_err(|e| StoreError::json(path, e))? {
        Value::Object(map) => Ok(Some(map)),
        other => Err(StoreError::Shape {
            path: path.to_path_buf(),
            reason: format!("expected a JSON object at top level, found {}", json_kind(&other)),
        }),
    }
}

/// Écrit `value` en JSON indenté, en créant les répertoires parents.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::json(path, e))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Nom lisible du type JSON, pour les messages d'erreur
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let result = read_json_object(&dir.path().join("absent.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_write_creates_parent_dirs_and_indents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("file.json");

        write_json_pretty(&path, &json!({"CPU": {"show_usage": true}})).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"CPU\""));
        let back = read_json_object(&path).unwrap().unwrap();
        assert_eq!(back["CPU"]["show_usage"], json!(true));
        assert!(!dir.path().join("data/nested/file.json.tmp").exists());
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        match read_json_object(&path) {
            Err(StoreError::Shape { reason, .. }) => assert!(reason.contains("array")),
            other => panic!("expected shape error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read_json_object(&path), Err(StoreError::Json { .. })));
    }
}
