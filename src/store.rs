use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Ids of every message that has been through the classifier, job or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedIds {
    ids: BTreeSet<String>,
}

impl ProcessedIds {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if the id was not already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ProcessedIds {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

pub trait DedupStore {
    /// Missing storage is a first run, not an error.
    fn load(&self) -> Result<ProcessedIds, StoreError>;

    /// Replaces whatever was stored before with the full set.
    fn save(&self, ids: &ProcessedIds) -> Result<(), StoreError>;
}

/// JSON array of ids on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DedupStore for JsonFileStore {
    fn load(&self) -> Result<ProcessedIds, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No dedup store yet, starting empty");
                return Ok(ProcessedIds::default());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let ids: Vec<String> = serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), count = ids.len(), "Loaded dedup store");
        Ok(ids.into_iter().collect())
    }

    fn save(&self, ids: &ProcessedIds) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let list: Vec<&str> = ids.iter().collect();
        let json = serde_json::to_string_pretty(&list).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        // Write-then-rename so a failed write leaves the previous state intact.
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), count = ids.len(), "Saved dedup store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("processed_ids.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state").join("processed_ids.json"));

        let mut ids = ProcessedIds::default();
        assert!(ids.insert("<a@x>"));
        assert!(ids.insert("<b@x>"));
        assert!(!ids.insert("<a@x>"));
        store.save(&ids).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, ids);
        assert!(loaded.contains("<b@x>"));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("processed_ids.json"));

        let first: ProcessedIds = vec!["1".to_string(), "2".to_string()].into_iter().collect();
        store.save(&first).unwrap();
        let second: ProcessedIds = vec!["3".to_string()].into_iter().collect();
        store.save(&second).unwrap();

        assert_eq!(store.load().unwrap(), second);
    }

    #[test]
    fn test_reads_plain_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed_ids.json");
        fs::write(&path, r#"["12", "13"]"#).unwrap();

        let ids = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("12"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed_ids.json");
        fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_unwritable_location_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        // parent "directory" is a regular file
        let store = JsonFileStore::new(blocker.join("processed_ids.json"));

        let err = store.save(&ProcessedIds::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
