//! Error types for AssetChain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),
    #[error("Cannot mix assets: {0}")]
    AssetMix(String),
    #[error("Asset id mismatch: {0}")]
    AssetIdMismatch(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Amount error: {0}")]
    AmountError(String),
    #[error("Input does not exist: {0}")]
    InputDoesNotExist(String),
    #[error("Transaction not in a valid block: {0}")]
    TransactionNotInValidBlock(String),
    #[error("Double spend detected: {0}")]
    DoubleSpendDetected(String),

    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Block has no node_pubkey; it cannot be serialized")]
    MissingNodePubkey,
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Unauthorized node: {0}")]
    UnauthorizedNode(String),

    #[error("Policy rejected: {0}")]
    PolicyRejected(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Ledger error: {0}")]
    LedgerError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
