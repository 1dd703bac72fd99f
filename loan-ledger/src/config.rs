//! Configuration for the loan ledger

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// The ledger's own identity: token spender and collateral escrow holder
    pub contract_address: AccountId,

    /// Token ledger the loan ledger is bound to
    pub token_address: AccountId,

    /// Snapshot storage configuration
    pub storage: StorageConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "loan-ledger".to_string(),
            contract_address: AccountId::new("loan-ledger"),
            token_address: AccountId::new("token"),
            storage: StorageConfig::default(),
            actor: ActorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory
    pub data_dir: PathBuf,

    /// Snapshot file name inside `data_dir`
    pub snapshot_file: String,

    /// Write a snapshot after every committed transition
    pub persist_on_commit: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/loan-ledger"),
            snapshot_file: "ledger.snapshot".to_string(),
            persist_on_commit: false,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(addr) = std::env::var("LOAN_LEDGER_CONTRACT_ADDRESS") {
            config.contract_address = AccountId::new(addr);
        }

        if let Ok(addr) = std::env::var("LOAN_LEDGER_TOKEN_ADDRESS") {
            config.token_address = AccountId::new(addr);
        }

        if let Ok(data_dir) = std::env::var("LOAN_LEDGER_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(persist) = std::env::var("LOAN_LEDGER_PERSIST") {
            config.storage.persist_on_commit = persist.parse().map_err(|_| {
                crate::Error::Config(format!("LOAN_LEDGER_PERSIST is not a bool: {}", persist))
            })?;
        }

        if let Ok(json) = std::env::var("LOAN_LEDGER_LOG_JSON") {
            config.logging.json = json == "1" || json.eq_ignore_ascii_case("true");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject unusable settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.contract_address.as_str().is_empty() {
            return Err(crate::Error::Config("contract_address is empty".to_string()));
        }
        if self.token_address.as_str().is_empty() {
            return Err(crate::Error::Config("token_address is empty".to_string()));
        }
        if self.contract_address == self.token_address {
            return Err(crate::Error::Config(
                "contract_address and token_address must differ".to_string(),
            ));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Full path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.snapshot_file)
    }
}
