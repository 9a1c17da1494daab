//! # Ledger Configuration & Constants
//!
//! Every magic number in the ledger lives here, next to the small runtime
//! configuration ([`LedgerConfig`]) a node loads at start-up.
//!
//! The constants are consensus rules. Changing one splits the ledger into
//! nodes that accept a transaction and nodes that reject it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::crypto::PublicKey;

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Crate / protocol release.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// `version` field of every transaction this library builds and accepts.
pub const TRANSACTION_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Transaction Rules
// ---------------------------------------------------------------------------

/// Largest amount a single output may carry.
pub const MAX_AMOUNT: u64 = 9_000_000_000_000_000_000;

/// Deepest threshold nesting accepted in outputs and parsed fulfillments.
pub const MAX_THRESHOLD_DEPTH: usize = 100;

/// Every input signs a SHA-256 digest, so key-locked conditions built by
/// the ledger declare exactly this much dynamic message.
pub const SIGNED_MESSAGE_LENGTH: u64 = 32;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub const TREE_TRANSACTIONS: &str = "transactions";
pub const TREE_SPENT: &str = "spent";
pub const TREE_BLOCKS: &str = "blocks";

/// File name of the ledger database inside a data directory.
pub const DATABASE_DIR_NAME: &str = "ledger.sled";

/// File name of the node's secret key inside a data directory.
pub const NODE_KEY_FILE_NAME: &str = "node.key";

/// File name of the JSON config inside a data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("federation must list at least one key")]
    EmptyFederation,
}

/// Node configuration, stored as JSON.
///
/// ```json
/// {
///   "federation": ["<base58 public key>", "..."],
///   "database_path": "/var/lib/ccledger/ledger.sled",
///   "node_key_path": "/var/lib/ccledger/node.key"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Keys allowed to issue CREATE and GENESIS transactions and to sign
    /// blocks.
    pub federation: Vec<PublicKey>,
    pub database_path: PathBuf,
    pub node_key_path: PathBuf,
}

impl LedgerConfig {
    /// Default layout for a node rooted at `data_dir`.
    pub fn for_data_dir(data_dir: &Path, federation: Vec<PublicKey>) -> Self {
        Self {
            federation,
            database_path: data_dir.join(DATABASE_DIR_NAME),
            node_key_path: data_dir.join(NODE_KEY_FILE_NAME),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.federation.is_empty() {
            return Err(ConfigError::EmptyFederation);
        }
        Ok(())
    }

    pub fn is_federation_member(&self, key: &PublicKey) -> bool {
        self.federation.contains(key)
    }
}
