//! AssetChain - consensus rules for a federated asset ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Model
//! - [`transaction`] - CREATE/TRANSFER transactions, signing and validation
//! - [`asset`] - Asset definitions and composition types
//! - [`blockchain`] - Block structure, serialization and validation
//! - [`ledger`] - Read access to stored transactions
//!
//! ## Consensus
//! - [`consensus`] - Consensus rules and the asset composition engine
//! - [`policy`] - Sandboxed asset policy scripts
//! - [`node`] - Federation node tying rules, ledger and keys together
//!
//! ## Cryptography
//! - [`crypto`] - Hashing, signatures and verification (secp256k1)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`utils`] - Canonical serialization and timestamps

#![forbid(unsafe_code)]

// ============================================================================
// Core Model
// ============================================================================
pub mod asset;
pub mod blockchain;
pub mod ledger;
pub mod transaction;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;
pub mod node;
pub mod policy;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod utils;
