//! Flat-file behavior store.
//!
//! One JSON file maps sender addresses to interaction statistics and
//! pending reminders. The contract is load-all/save-all: every read parses
//! the full mapping, every write serializes it back wholesale, and the last
//! writer wins on the entire file. There is no locking; the system serves
//! a single interactive user running one process.

use std::fs;
use std::path::{Path, PathBuf};

use shared_types::SenderLedger;

use crate::error::{Error, Result};

/// Repository contract for the behavior store. Kept as a trait so a future
/// real datastore can replace the flat file without touching callers.
pub trait BehaviorRepository: Send + Sync {
    /// Load the entire ledger. A missing or unreadable store is an empty
    /// ledger, never an error.
    fn load(&self) -> SenderLedger;

    /// Persist the entire ledger, replacing whatever was on disk.
    fn save(&self, ledger: &SenderLedger) -> Result<()>;
}

/// The production store: a single pretty-printed JSON file.
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
}

impl BehaviorRepository for JsonFileStore {
    fn load(&self) -> SenderLedger {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "behavior store {} not found, starting empty",
                    self.path.display()
                );
                return SenderLedger::new();
            }
            Err(e) => {
                tracing::error!(
                    "failed to read behavior store {}: {e}",
                    self.path.display()
                );
                return SenderLedger::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::error!(
                    "corrupt behavior store {}, starting empty: {e}",
                    self.path.display()
                );
                SenderLedger::new()
            }
        }
    }

    fn save(&self, ledger: &SenderLedger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::Store(format!("create {}: {e}", parent.display())))?;
            }
        }
        let json = serde_json::to_string_pretty(ledger)?;
        fs::write(&self.path, json)
            .map_err(|e| Error::Store(format!("write {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared_types::{ReminderEntry, ReminderKind, SenderRecord};

    fn sample_ledger() -> SenderLedger {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut rec = SenderRecord::default();
        rec.record_message(now);
        rec.reminders.insert(
            "m1".into(),
            ReminderEntry::new(now, ReminderKind::Default, "hello"),
        );
        let mut ledger = SenderLedger::new();
        ledger.insert("alice@example.com".into(), rec);
        ledger
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));

        let ledger = sample_ledger();
        store.save(&ledger).unwrap();
        assert_eq!(store.load(), ledger);
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));

        store.save(&sample_ledger()).unwrap();
        store.save(&SenderLedger::new()).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/dir/store.json"));
        store.save(&sample_ledger()).unwrap();
        assert_eq!(store.load().len(), 1);
    }
}
