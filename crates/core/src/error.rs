//! Error types for the indexer domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Data-consistency violations and domain rules
//! - [`StorageError`] - Database/repository errors
//! - [`ChainError`] - Block-stream errors
//! - [`IndexerError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::{AccountId, CryptoHash};

// =============================================================================
// Domain Errors
// =============================================================================

/// Keyed bucket a classified state change was routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalBucket {
    Transactions,
    Receipts,
    Rewards,
}

impl CausalBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            CausalBucket::Transactions => "transactions",
            CausalBucket::Receipts => "receipts",
            CausalBucket::Rewards => "rewards",
        }
    }
}

impl std::fmt::Display for CausalBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consistency violations detected while deriving balance events.
///
/// The four correlation variants are fatal data-integrity bugs, not
/// expected runtime conditions: they mean the stream reported causal
/// sources that do not account for the state changes it also reported,
/// and continuing would write a wrong ledger. They abort the current
/// block with nothing persisted and are never retried here.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Two state changes claimed the same causal key during classification.
    #[error("duplicate causal change for {key} in {bucket} bucket at block {block_height}")]
    DuplicateCausalChange {
        bucket: CausalBucket,
        key: CryptoHash,
        block_height: u64,
    },

    /// A cause type that must never carry balance-relevant changes appeared.
    #[error("unexpected cause type `{cause}` at block {block_height}")]
    UnexpectedCauseType {
        cause: &'static str,
        block_height: u64,
    },

    /// A matched state change named a different account than its causal source.
    #[error(
        "correlation mismatch for {key} at block {block_height}: expected account {expected}, got {actual}"
    )]
    CorrelationMismatch {
        key: CryptoHash,
        expected: AccountId,
        actual: AccountId,
        block_height: u64,
    },

    /// A correlation pass finished with entries left in its bucket.
    #[error(
        "{} change(s) left unconsumed in {bucket} bucket at block {block_height}: {}",
        .keys.len(),
        .keys.join(", ")
    )]
    UnconsumedChange {
        bucket: CausalBucket,
        keys: Vec<String>,
        block_height: u64,
    },

    /// Generic validation error.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DomainError {
    /// Stable label for the consistency-failure metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            DomainError::DuplicateCausalChange { .. } => "duplicate_causal_change",
            DomainError::UnexpectedCauseType { .. } => "unexpected_cause_type",
            DomainError::CorrelationMismatch { .. } => "correlation_mismatch",
            DomainError::UnconsumedChange { .. } => "unconsumed_change",
            DomainError::ValidationError(_) => "validation",
            DomainError::Storage(_) => "storage",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and data serialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Block-stream errors.
///
/// These errors occur while reading block messages from the chain-data
/// stream adapter.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Reading from the stream's backing store failed.
    #[error("Stream I/O error: {0}")]
    StreamIo(String),

    /// A block message could not be decoded.
    #[error("Malformed block message at height {height}: {message}")]
    MalformedMessage {
        /// Height of the offending message.
        height: u64,
        /// Decoder error details.
        message: String,
    },

    /// Subscription could not be established or was lost.
    #[error("Subscription error: {0}")]
    SubscriptionError(String),
}

// =============================================================================
// Indexer Errors
// =============================================================================

/// Top-level indexer orchestration errors.
///
/// This is the main error type returned by
/// [`crate::services::BalanceIndexer`]. It wraps all lower-level errors
/// and adds indexer-specific variants.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Domain logic error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Block-stream error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Indexer shutdown requested")]
    ShutdownRequested,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: la chaîne de conversion d'erreurs fonctionne
    // Permet d'utiliser ? à travers les couches
    #[test]
    fn test_error_conversion_chain() {
        // Storage -> Domain -> Indexer
        let storage_err = StorageError::QueryError("db failed".into());
        let domain_err: DomainError = storage_err.into();
        let indexer_err: IndexerError = domain_err.into();

        // Le message original est préservé
        assert!(indexer_err.to_string().contains("db failed"));

        // Chain -> Indexer
        let chain_err = ChainError::SubscriptionError("stream gone".into());
        let indexer_err: IndexerError = chain_err.into();
        assert!(indexer_err.to_string().contains("stream gone"));
    }

    // Test critique: les erreurs de corrélation portent le contexte de debug
    #[test]
    fn test_correlation_mismatch_includes_context() {
        let err = DomainError::CorrelationMismatch {
            key: CryptoHash("8fTxh".into()),
            expected: AccountId("alice.near".into()),
            actual: AccountId("mallory.near".into()),
            block_height: 4321,
        };
        let msg = err.to_string();
        assert!(msg.contains("8fTxh"));
        assert!(msg.contains("alice.near"));
        assert!(msg.contains("mallory.near"));
        assert!(msg.contains("4321"));
    }

    #[test]
    fn test_unconsumed_change_lists_keys_and_count() {
        let err = DomainError::UnconsumedChange {
            bucket: CausalBucket::Receipts,
            keys: vec!["r1".into(), "r2".into()],
            block_height: 99,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 change(s)"));
        assert!(msg.contains("r1, r2"));
        assert!(msg.contains("receipts"));
    }
}
