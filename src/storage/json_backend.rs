use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use tracing::warn;

use super::document_store::{DocumentStore, StoreSnapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::{
    errors::{MoneyError, Result},
    utils::persistence::{ensure_dir, list_backup_files, unused_backup_name, write_atomic},
};

const STORE_FILE: &str = "store.json";
const BACKUPS_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "store";
const DEFAULT_RETENTION: usize = 5;

/// Persistence for whole-store snapshots.
pub trait SnapshotBackend: Send + Sync {
    fn save(&self, store: &DocumentStore) -> Result<()>;
    /// Returns an empty store when nothing was saved yet.
    fn load(&self) -> Result<DocumentStore>;
    fn backup(&self, store: &DocumentStore, note: Option<&str>) -> Result<String>;
    fn list_backups(&self) -> Result<Vec<String>>;
    fn restore(&self, backup_name: &str) -> Result<DocumentStore>;
}

/// Keeps the document store in one pretty-printed JSON file plus rotating backups.
#[derive(Debug, Clone)]
pub struct JsonDocumentStorage {
    path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonDocumentStorage {
    pub fn new(root: &Path, retention: Option<usize>) -> Result<Self> {
        ensure_dir(root)?;
        let backups_dir = root.join(BACKUPS_DIR);
        ensure_dir(&backups_dir)?;
        Ok(Self {
            path: root.join(STORE_FILE),
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn prune_backups(&self) -> Result<()> {
        for stale in self.list_backups()?.iter().skip(self.retention) {
            if let Err(err) = fs::remove_file(self.backups_dir.join(stale)) {
                warn!(backup = %stale, error = %err, "could not prune old backup");
            }
        }
        Ok(())
    }
}

impl SnapshotBackend for JsonDocumentStorage {
    fn save(&self, store: &DocumentStore) -> Result<()> {
        let json = serde_json::to_string_pretty(&store.snapshot()?)?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), "document store saved");
        Ok(())
    }

    fn load(&self) -> Result<DocumentStore> {
        if !self.path.exists() {
            return Ok(DocumentStore::new());
        }
        load_snapshot(&self.path)
    }

    fn backup(&self, store: &DocumentStore, note: Option<&str>) -> Result<String> {
        let name = unused_backup_name(&self.backups_dir, BACKUP_PREFIX, Utc::now(), note);
        let json = serde_json::to_string_pretty(&store.snapshot()?)?;
        write_atomic(&self.backups_dir.join(&name), &json)?;
        self.prune_backups()?;
        tracing::info!(backup = %name, "document store backed up");
        Ok(name)
    }

    fn list_backups(&self) -> Result<Vec<String>> {
        list_backup_files(&self.backups_dir)
    }

    fn restore(&self, backup_name: &str) -> Result<DocumentStore> {
        let source = self.backups_dir.join(backup_name);
        if !source.exists() {
            return Err(MoneyError::Storage(format!(
                "backup `{}` not found",
                backup_name
            )));
        }
        let store = load_snapshot(&source)?;
        self.save(&store)?;
        Ok(store)
    }
}

fn load_snapshot(path: &Path) -> Result<DocumentStore> {
    let data = fs::read_to_string(path)?;
    let snapshot: StoreSnapshot = serde_json::from_str(&data)?;
    if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
        return Err(MoneyError::Storage(format!(
            "`{}` was written by a newer schema version",
            path.display()
        )));
    }
    Ok(DocumentStore::from_snapshot(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn storage_with_temp_dir() -> (JsonDocumentStorage, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let storage = JsonDocumentStorage::new(temp.path(), Some(2)).expect("json storage");
        (storage, temp)
    }

    fn seeded_store() -> (DocumentStore, String) {
        let store = DocumentStore::new();
        let fields = match json!({ "userId": "u1", "name": "Food", "type": "expense" }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let id = store.add("categories", fields).expect("add");
        (store, id)
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (storage, _guard) = storage_with_temp_dir();
        let (store, id) = seeded_store();
        storage.save(&store).expect("save store");
        let loaded = storage.load().expect("load store");
        let doc = loaded.get("categories", &id).unwrap().expect("document");
        assert_eq!(doc.fields["name"], "Food");
    }

    #[test]
    fn missing_file_loads_empty_store() {
        let (storage, _guard) = storage_with_temp_dir();
        let store = storage.load().expect("load");
        assert!(store.snapshot().unwrap().collections.is_empty());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let (storage, _guard) = storage_with_temp_dir();
        fs::write(
            storage.path(),
            r#"{ "schema_version": 99, "collections": {} }"#,
        )
        .unwrap();
        assert!(matches!(storage.load(), Err(MoneyError::Storage(_))));
    }

    #[test]
    fn backup_and_restore() {
        let (storage, _guard) = storage_with_temp_dir();
        let (store, id) = seeded_store();
        let name = storage.backup(&store, Some("before cleanup")).expect("backup");
        assert!(name.ends_with("_before-cleanup.json"));
        assert_eq!(storage.list_backups().unwrap(), vec![name.clone()]);

        let restored = storage.restore(&name).expect("restore");
        assert!(restored.get("categories", &id).unwrap().is_some());
        assert!(storage.path().exists());
        assert!(storage.restore("missing.json").is_err());
    }

    #[test]
    fn rapid_backups_do_not_overwrite_and_are_pruned() {
        let (storage, _guard) = storage_with_temp_dir();
        let (store, _) = seeded_store();
        let names: Vec<String> = (0..3)
            .map(|_| storage.backup(&store, None).expect("backup"))
            .collect();
        assert_ne!(names[0], names[1]);
        assert_ne!(names[1], names[2]);

        let kept = storage.list_backups().unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], names[2]);
        assert!(!kept.contains(&names[0]));
    }
}
