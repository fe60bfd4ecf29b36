//! Error types for the Sluice engine.

use thiserror::Error;

/// All possible errors from the Sluice engine.
///
/// No variant is recoverable inside a planning call: either a complete plan
/// is returned or the caller receives one of these and should abort the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    // Record/schema errors
    #[error("schema mismatch in {context}: expected {expected}, got {got}")]
    SchemaMismatch {
        context: String,
        expected: String,
        got: String,
    },

    #[error("key field '{0}' is missing from the arriving records")]
    MissingKeyField(String),

    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // Collaborator errors
    #[error("existing-record lookup failed: {0}")]
    Lookup(#[from] LookupError),
}

/// Configuration problems, detected when a planner is built or first used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("option '{0}' must not be blank")]
    BlankField(&'static str),

    #[error("option '{option}' lists field '{field}' more than once")]
    DuplicateField { option: &'static str, field: String },

    #[error("key columns must be specified for the {0} strategy")]
    KeyFieldsRequired(&'static str),

    #[error("key columns must be specified to provide synthetic keys")]
    SyntheticKeyWithoutKeyFields,

    #[error("no planning strategy configured")]
    MissingStrategy,

    #[error("unknown planning strategy: {0}")]
    UnknownStrategy(String),

    #[error("option '{0}' is required for history-preserving planning")]
    MissingValidityField(&'static str),

    #[error("invalid value for option '{option}': {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },
}

/// Failures reported by an [`ExistingLookup`](crate::ExistingLookup).
///
/// The engine never retries; these surface to the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("lookup timed out after {0}ms")]
    Timeout(u64),

    #[error("lookup returned a record for a key that was not requested: {0}")]
    UnexpectedKey(String),

    #[error("lookup found more than one current record for key {0}")]
    DuplicateKey(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
