//! # Validation Module
//!
//! Decides whether a well-formed transaction may join the ledger, given
//! what the store has already committed.
//!
//! ```text
//! hash → structure → ownership → double spend → proofs → asset → amounts → duplicate
//! ```
//!
//! Every check either passes or rejects the transaction with a
//! [`ValidationError`] naming the reason. The engine mutates nothing; see
//! [`Validator::submit`] for validate-then-commit.

pub mod engine;
pub mod error;

pub use engine::Validator;
pub use error::ValidationError;
