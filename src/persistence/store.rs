//! File-backed snapshot store for the account document.

use crate::domain::errors::ImportError;
use crate::persistence::document::AccountDocument;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the document atomically: temp file in the same directory, then
    /// rename over the target.
    pub fn save(&self, document: &AccountDocument) -> Result<(), ImportError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, document.to_json())?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "account snapshot written");
        Ok(())
    }

    /// Load the last snapshot; `Ok(None)` when no snapshot exists yet.
    pub fn load(&self) -> Result<Option<AccountDocument>, ImportError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no account snapshot found, starting fresh");
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(Some(AccountDocument::parse(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::ledger::Ledger;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "tradepilot_store_test_{}_{}.json",
            name,
            std::process::id()
        ));
        path
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = temp_path("round_trip");
        let store = SnapshotStore::new(&path);

        let ledger = Ledger::new(1234.5);
        store.save(&AccountDocument::export(&ledger)).unwrap();

        let loaded = store.load().unwrap().expect("snapshot present");
        assert_eq!(loaded.cash_balance, Some(1234.5));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let store = SnapshotStore::new(temp_path("missing_never_written"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{{{").unwrap();
        let store = SnapshotStore::new(&path);
        assert!(store.load().is_err());
        std::fs::remove_file(&path).ok();
    }
}
