//! Persistent storage for the check-in log.
//!
//! The log is one flat, unordered collection of [`CheckinRecord`]s keyed by
//! [`CheckinKey`]. [`JsonFileRepository`] keeps it as a single JSON array under
//! a fixed storage key; the array is read entirely and rewritten entirely on
//! every insert.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CheckinError, Result};
use crate::record::{CheckinKey, CheckinRecord};

/// Storage key (file stem) of the check-in log.
pub const CHECKIN_STORAGE_KEY: &str = "checkin_history";

/// Access to the check-in log.
pub trait CheckinRepository: Send + Sync {
    /// Looks up the record for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn find(&self, key: &CheckinKey) -> Result<Option<CheckinRecord>>;

    /// Inserts `record` unless one with the same key exists.
    ///
    /// Returns `true` if the record was inserted, `false` if a record with
    /// the same key was already present (the existing one is kept).
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or written.
    fn insert_if_absent(&mut self, record: CheckinRecord) -> Result<bool>;

    /// All records, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn list(&self) -> Result<Vec<CheckinRecord>>;
}

/// In-memory repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    records: Vec<CheckinRecord>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl CheckinRepository for MemoryRepository {
    fn find(&self, key: &CheckinKey) -> Result<Option<CheckinRecord>> {
        Ok(self
            .records
            .iter()
            .find(|r| &r.composite_key == key)
            .cloned())
    }

    fn insert_if_absent(&mut self, record: CheckinRecord) -> Result<bool> {
        if self
            .records
            .iter()
            .any(|r| r.composite_key == record.composite_key)
        {
            return Ok(false);
        }
        self.records.push(record);
        Ok(true)
    }

    fn list(&self) -> Result<Vec<CheckinRecord>> {
        Ok(self.records.clone())
    }
}

/// Repository backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Repository storing the log at `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Repository storing the log under [`CHECKIN_STORAGE_KEY`] in `data_dir`.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(format!("{CHECKIN_STORAGE_KEY}.json")))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<CheckinRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            CheckinError::PersistenceError(format!(
                "Failed to parse {}: {e}",
                self.path.display()
            ))
        })
    }

    fn save(&self, records: &[CheckinRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(records).map_err(|e| {
            CheckinError::PersistenceError(format!("Failed to serialize check-in log: {e}"))
        })?;

        // Write then rename so a crash never leaves a truncated log.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CheckinRepository for JsonFileRepository {
    fn find(&self, key: &CheckinKey) -> Result<Option<CheckinRecord>> {
        Ok(self.load()?.into_iter().find(|r| &r.composite_key == key))
    }

    fn insert_if_absent(&mut self, record: CheckinRecord) -> Result<bool> {
        let mut records = self.load()?;
        if records
            .iter()
            .any(|r| r.composite_key == record.composite_key)
        {
            return Ok(false);
        }
        records.push(record);
        self.save(&records)?;
        debug!(path = %self.path.display(), total = records.len(), "Rewrote check-in log");
        Ok(true)
    }

    fn list(&self) -> Result<Vec<CheckinRecord>> {
        self.load()
    }
}

/// Default data directory.
///
/// On Linux: `/var/lib/checkin/`.
/// Elsewhere: the platform data directory.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/checkin")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "checkin")
            .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode_payload;
    use chrono::Utc;

    fn record(title: &str, time: &str) -> CheckinRecord {
        let payload = decode_payload(&format!(
            r#"{{"type":"event","v":1,"title":"{title}","date":"2025-05-01","time":"{time}","location":"Hall"}}"#
        ))
        .unwrap();
        CheckinRecord::new(payload, Utc::now(), None, None, "img".to_string())
    }

    fn exercise(repo: &mut dyn CheckinRepository) {
        let first = record("Workshop", "09:00");
        let key = first.composite_key.clone();

        assert!(repo.find(&key).unwrap().is_none());
        assert!(repo.insert_if_absent(first.clone()).unwrap());
        assert_eq!(repo.find(&key).unwrap(), Some(first.clone()));

        // Same key, different record: rejected, original kept.
        let mut dup = record("Workshop", "09:00");
        dup.selfie_image = "other".to_string();
        assert!(!repo.insert_if_absent(dup).unwrap());
        assert_eq!(repo.find(&key).unwrap().unwrap().selfie_image, "img");

        assert!(repo.insert_if_absent(record("Workshop", "14:00")).unwrap());
        let all = repo.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);
    }

    #[test]
    fn test_memory_repository() {
        exercise(&mut MemoryRepository::new());
    }

    #[test]
    fn test_json_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = JsonFileRepository::in_dir(&dir.path().join("data"));
        exercise(&mut repo);

        assert!(repo.path().ends_with("checkin_history.json"));
        let raw = std::fs::read_to_string(repo.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert!(!repo.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_file_repository_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = JsonFileRepository::in_dir(dir.path());
        assert!(repo.insert_if_absent(record("Talk", "18:00")).unwrap());

        let mut reopened = JsonFileRepository::in_dir(dir.path());
        assert_eq!(reopened.list().unwrap().len(), 1);
        assert!(!reopened.insert_if_absent(record("Talk", "18:00")).unwrap());
    }

    #[test]
    fn test_missing_and_empty_file_is_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::in_dir(dir.path());
        assert!(repo.list().unwrap().is_empty());

        std::fs::write(repo.path(), "").unwrap();
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::in_dir(dir.path());
        std::fs::write(repo.path(), "{not json").unwrap();
        let err = repo.list().unwrap_err();
        assert!(matches!(err, CheckinError::PersistenceError(_)));
    }
}
