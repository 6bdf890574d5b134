use std::path::PathBuf;
use std::sync::Mutex;

use engine_logging::{engine_debug, engine_info, engine_warn};
use readsync_core::{AwardKey, AwardLedger};
use readsync_engine::{PersistError, StateDir};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("could not serialize award ledger: {0}")]
    Serialize(#[from] ron::Error),
    #[error("award ledger lock poisoned")]
    Poisoned,
}

/// Durable award ledger for one identity, stored as `awards-<namespace>.ron`.
pub struct LedgerStore {
    dir: StateDir,
    filename: String,
    // Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl LedgerStore {
    pub fn new(data_dir: PathBuf, namespace: &str) -> Self {
        Self {
            dir: StateDir::new(data_dir),
            filename: ledger_filename(namespace),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path(&self.filename)
    }

    /// Missing or unreadable files load as an empty ledger.
    pub fn load(&self) -> AwardLedger {
        self.read_ledger().unwrap_or_default()
    }

    /// Add `key` and persist. Returns `false` when it was already recorded.
    pub fn record(&self, key: AwardKey) -> Result<bool, LedgerStoreError> {
        let _guard = self.lock.lock().map_err(|_| LedgerStoreError::Poisoned)?;
        let mut ledger = self.load();
        if !ledger.record(key) {
            return Ok(false);
        }
        self.save(&ledger)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), LedgerStoreError> {
        let _guard = self.lock.lock().map_err(|_| LedgerStoreError::Poisoned)?;
        if self.dir.remove(&self.filename)? {
            engine_info!("Removed award ledger {:?}", self.path());
        }
        Ok(())
    }

    fn read_ledger(&self) -> Option<AwardLedger> {
        let content = match self.dir.read(&self.filename) {
            Ok(content) => content?,
            Err(err) => {
                engine_warn!("Failed to read award ledger: {}", err);
                return None;
            }
        };
        match ron::from_str(&content) {
            Ok(ledger) => Some(ledger),
            Err(err) => {
                engine_warn!("Failed to parse award ledger from {:?}: {}", self.path(), err);
                None
            }
        }
    }

    fn save(&self, ledger: &AwardLedger) -> Result<(), LedgerStoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(ledger, pretty)?;
        let path = self.dir.replace(&self.filename, &content)?;
        engine_debug!("Saved {} awarded facts to {:?}", ledger.len(), path);
        Ok(())
    }
}

fn ledger_filename(namespace: &str) -> String {
    let safe: String = namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("awards-{safe}.ron")
}
