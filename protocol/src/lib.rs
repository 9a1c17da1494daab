// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ccledger: Core Library
//!
//! A federated asset ledger whose outputs are locked by crypto-conditions
//! and unlocked by fulfillments: Ed25519 signatures, SHA-256 preimages,
//! and threshold trees that combine them into m-of-n and nested AND/OR
//! policies.
//!
//! ## Architecture
//!
//! - **codec**: var_uint / var_bytes binary encoding and base64url.
//! - **conditions**: condition and fulfillment types, URIs, hashing.
//! - **crypto**: Ed25519 keys and SHA-256.
//! - **transaction**: CREATE / TRANSFER / GENESIS construction and signing.
//! - **validation**: the checks a transaction passes before it is committed.
//! - **storage**: blocks, the store collaborator, in-memory and sled stores.
//! - **config**: protocol constants and node configuration.
//!
//! ## Quick Start
//!
//! ```
//! use ccledger_protocol::crypto::Keypair;
//! use ccledger_protocol::storage::MemoryStore;
//! use ccledger_protocol::transaction::{Asset, Transaction};
//! use ccledger_protocol::validation::Validator;
//!
//! let issuer = Keypair::generate();
//! let alice = Keypair::generate();
//! let federation = [issuer.public_key()];
//! let store = MemoryStore::new();
//! let validator = Validator::new(&store, &federation);
//!
//! let create = Transaction::create(
//!     &[issuer.public_key()],
//!     &[(vec![alice.public_key().into()], 1)],
//!     Asset::default(),
//!     None,
//! )
//! .unwrap()
//! .sign(&[issuer])
//! .unwrap();
//! validator.submit(&create).unwrap();
//!
//! let bob = Keypair::generate();
//! let transfer = Transaction::transfer(
//!     create.to_inputs(None).unwrap(),
//!     &[(vec![bob.public_key().into()], 1)],
//!     create.asset_id(),
//!     None,
//! )
//! .unwrap()
//! .sign(&[alice])
//! .unwrap();
//! validator.submit(&transfer).unwrap();
//! ```

pub mod codec;
pub mod conditions;
pub mod config;
pub mod crypto;
pub mod storage;
pub mod transaction;
pub mod validation;
