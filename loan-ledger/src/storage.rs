//! Snapshot storage
//!
//! The whole ledger is written as one bincode-encoded [`LedgerSnapshot`].
//! Writes go to a sibling temp file first and are then renamed over the
//! previous snapshot, so a crash mid-write leaves the old snapshot intact.

use crate::{
    error::{Error, Result},
    ledger::LedgerSnapshot,
    Config,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Snapshot format version, written ahead of the payload
const FORMAT_VERSION: u32 = 1;

/// On-disk envelope
#[derive(serde::Serialize, serde::Deserialize)]
struct Envelope {
    version: u32,
    snapshot: LedgerSnapshot,
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Open the store described by `config`, creating the data directory
    pub fn open(config: &Config) -> Result<Self> {
        let dir = &config.storage.data_dir;
        fs::create_dir_all(dir)?;

        let path = config.snapshot_path();
        tracing::info!("Opened snapshot store at {:?}", path);

        Ok(Self { path })
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored snapshot
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let envelope = Envelope {
            version: FORMAT_VERSION,
            snapshot: snapshot.clone(),
        };
        let bytes = bincode::serialize(&envelope)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            loans = snapshot.loans.len(),
            events = snapshot.events.len(),
            bytes = bytes.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Stored snapshot, or `None` if nothing has been saved yet
    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = bincode::deserialize(&bytes)?;
        if envelope.version != FORMAT_VERSION {
            return Err(Error::Storage(format!(
                "unsupported snapshot version {} in {:?}",
                envelope.version, self.path
            )));
        }
        Ok(Some(envelope.snapshot))
    }

    /// Delete the stored snapshot, if any
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{EventLog, LoanEventKind},
        types::{AccountId, Loan},
    };
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = temp_dir.path().join("ledger");
        (config, temp_dir)
    }

    fn test_snapshot() -> LedgerSnapshot {
        let alice = AccountId::new("alice");
        let mut events = EventLog::default();
        events.append(
            0,
            0,
            LoanEventKind::Requested {
                borrower: alice.clone(),
                principal: 100,
                interest: 10,
                duration: 3600,
            },
        );

        LedgerSnapshot {
            contract_address: AccountId::new("loan-ledger"),
            token_address: AccountId::new("token"),
            loans: vec![Loan {
                borrower: alice,
                lender: None,
                collateral_amount: 1,
                principal: 100,
                interest: 10,
                repayment_amount: 110,
                duration: 3600,
                due_date: 0,
                is_funded: false,
                is_closed: false,
                is_cancelled: false,
            }],
            escrow: 1,
            events: events.all().to_vec(),
        }
    }

    #[test]
    fn test_open_creates_directory() {
        let (config, _temp) = test_config();
        let store = SnapshotStore::open(&config).unwrap();
        assert!(config.storage.data_dir.is_dir());
        assert_eq!(store.path(), config.snapshot_path());
    }

    #[test]
    fn test_load_missing_snapshot() {
        let (config, _temp) = test_config();
        let store = SnapshotStore::open(&config).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let (config, _temp) = test_config();
        let store = SnapshotStore::open(&config).unwrap();
        let snapshot = test_snapshot();

        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot.clone()));

        // Overwrite leaves no temp file behind
        store.save(&snapshot).unwrap();
        assert!(!store.path().with_extension("tmp").exists());

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let (config, _temp) = test_config();
        let store = SnapshotStore::open(&config).unwrap();
        fs::write(store.path(), b"not a snapshot").unwrap();
        assert!(store.load().is_err());
    }
}
