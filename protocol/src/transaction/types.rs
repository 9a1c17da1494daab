//! Value types shared by every transaction: the operation, the link to a
//! prior output and the asset.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::crypto::sha256;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// What a transaction does. Decides which validation rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Issue a new asset. Signed by federation keys, spends nothing.
    Create,
    /// Move existing outputs to new owners.
    Transfer,
    /// The first transaction of a ledger. Validated like CREATE.
    Genesis,
}

impl Operation {
    /// CREATE and GENESIS mint outputs out of nothing.
    pub fn is_issuance(self) -> bool {
        matches!(self, Self::Create | Self::Genesis)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Genesis => write!(f, "GENESIS"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionLink
// ---------------------------------------------------------------------------

/// Points at output `output_index` of transaction `txid`.
///
/// A weak reference: holding a link says nothing about whether the output
/// exists or is still unspent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionLink {
    pub txid: String,
    pub output_index: u32,
}

impl TransactionLink {
    pub fn new(txid: impl Into<String>, output_index: u32) -> Self {
        Self {
            txid: txid.into(),
            output_index,
        }
    }
}

impl fmt::Display for TransactionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.output_index)
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// The thing being issued and transferred.
///
/// A CREATE carries the full asset. A TRANSFER carries only a reference
/// (the id, no data) to the asset of the outputs it spends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub divisible: bool,
    #[serde(default)]
    pub updatable: bool,
    #[serde(default)]
    pub refillable: bool,
}

impl Asset {
    /// A new asset with a random id.
    pub fn new(data: Option<Map<String, Value>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            divisible: false,
            updatable: false,
            refillable: false,
        }
    }

    /// A new asset whose id is derived from its data, so issuing the same
    /// data twice yields the same id.
    pub fn with_content_id(data: Map<String, Value>) -> Self {
        let canonical = Value::Object(data.clone()).to_string();
        let digest = sha256(canonical.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self {
            id: uuid::Builder::from_random_bytes(bytes).into_uuid(),
            ..Self::new(Some(data))
        }
    }

    /// The id-only form a TRANSFER carries.
    pub fn reference(id: Uuid) -> Self {
        Self {
            id,
            data: None,
            divisible: false,
            updatable: false,
            refillable: false,
        }
    }

    pub fn divisible(mut self, divisible: bool) -> Self {
        self.divisible = divisible;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn refillable(mut self, refillable: bool) -> Self {
        self.refillable = refillable;
        self
    }
}

impl Default for Asset {
    fn default() -> Self {
        Self::new(None)
    }
}
