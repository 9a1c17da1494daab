//! # Transaction Module
//!
//! Construction, signing and serialization of ledger transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs   : Operation, TransactionLink, Asset
//! output.rs  : Output and the OwnerSpec tree behind Output::generate
//! input.rs   : Input and its three wire forms (URI, details, null)
//! builder.rs : Transaction, the CREATE / TRANSFER / GENESIS factories, ids
//! signing.rs : per-input signing
//! error.rs   : TransactionError
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`Transaction::create`] or [`Transaction::transfer`] (fed by
//!    [`Transaction::to_inputs`]) returns an unsigned transaction whose id
//!    is already final.
//! 2. **Sign**: [`sign_transaction`] signs each input against its own view.
//! 3. **Validate**: [`crate::validation::Validator`] checks it against the
//!    ledger.
//! 4. **Commit**: a [`crate::storage::TransactionStore`] stores it. From then
//!    on every output it links to counts as spent.
//!
//! ## Design Decisions
//!
//! - The id is content-addressed and excludes fulfillments, so signatures
//!   cannot be part of what they sign.
//! - Amounts are `u64` in `1..=MAX_AMOUNT`. No floating point.
//! - Canonical JSON relies on `serde_json::Map` being a `BTreeMap`; the
//!   `preserve_order` feature must stay off.

pub mod builder;
pub mod error;
pub mod input;
pub mod output;
pub mod signing;
pub mod types;

pub use builder::{OutputSpec, Transaction};
pub use error::TransactionError;
pub use input::Input;
pub use output::{Output, OutputCondition, OwnerSpec};
pub use signing::{sign_transaction, sign_transaction_partial};
pub use types::{Asset, Operation, TransactionLink};
