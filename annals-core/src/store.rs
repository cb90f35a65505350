use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("writing {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("serializing for {path}: {source}")]
    Serialize { path: PathBuf, source: serde_json::Error },
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-printed, written to a sibling temp file and renamed into place so a
/// crash mid-run never leaves a truncated artifact behind.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    let write_err = |source| StoreError::Write { path: tmp.clone(), source };
    {
        let mut f = fs::File::create(&tmp).map_err(write_err)?;
        f.write_all(json.as_bytes()).map_err(write_err)?;
        f.write_all(b"\n").map_err(write_err)?;
        f.sync_all().map_err(write_err)?;
    }
    fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy an existing artifact into `backups/<label>_<timestamp>.json` beside
/// it. Returns the backup path, or None when there is nothing to back up.
pub fn backup(path: &Path, label: &str) -> Result<Option<PathBuf>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let dir = path.parent().unwrap_or(Path::new(".")).join("backups");
    fs::create_dir_all(&dir).map_err(|source| StoreError::Write { path: dir.clone(), source })?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S");
    let backup_path = dir.join(format!("{label}_{timestamp}.json"));
    fs::copy(path, &backup_path).map_err(|source| StoreError::Write {
        path: backup_path.clone(),
        source,
    })?;

    info!(from = %path.display(), to = %backup_path.display(), "backed up artifact");
    Ok(Some(backup_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{People, Person};
    use tempfile::tempdir;

    #[test]
    fn round_trip_people_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geni-profiles.json");

        let mut people = People::new();
        people.insert(
            "1".into(),
            Person {
                name: Some("Duncan I".into()),
                ..Person::default()
            },
        );

        save_json_atomic(&path, &people).unwrap();
        let loaded: People = load_json(&path).unwrap();
        assert_eq!(loaded, people);

        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        save_json_atomic(&path, &serde_json::json!({"v": 1})).unwrap();
        save_json_atomic(&path, &serde_json::json!({"v": 2})).unwrap();
        let v: serde_json::Value = load_json(&path).unwrap();
        assert_eq!(v["v"], 2);
    }

    #[test]
    fn backup_copies_into_timestamped_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("castles.json");
        save_json_atomic(&path, &serde_json::json!([])).unwrap();

        let backup_path = backup(&path, "castles").unwrap().expect("backup made");
        assert!(backup_path.exists());
        assert!(backup_path.starts_with(dir.path().join("backups")));
        let name = backup_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("castles_") && name.ends_with(".json"));
    }

    #[test]
    fn backup_of_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(backup(&missing, "nope").unwrap(), None);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_json::<serde_json::Value>(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
