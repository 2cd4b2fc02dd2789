//! Error types for polarway-accounts — Railway Programming
//!
//! Store round trips return `Result<T, AccountsError>`. The account streams
//! themselves never carry errors; failures inside them are logged and absorbed.

use thiserror::Error;

/// Unified error type for account lifecycle operations
#[derive(Error, Debug)]
pub enum AccountsError {
    // ─── Store Errors ───

    /// The store stopped accepting requests
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store accepted a request but went away before answering
    #[error("Actor unavailable: {0}")]
    ActorUnavailable(String),

    // ─── Session Errors ───

    #[error("Transport error: {0}")]
    Transport(String),

    // ─── Infrastructure Errors ───

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AccountsError {
    fn from(err: serde_json::Error) -> Self {
        AccountsError::Serialization(err.to_string())
    }
}

/// Result type alias for account operations
pub type Result<T> = std::result::Result<T, AccountsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccountsError::ActorUnavailable("MemoryRecordStore".into());
        assert_eq!(err.to_string(), "Actor unavailable: MemoryRecordStore");

        let err = AccountsError::StoreUnavailable("MemoryRecordStore".into());
        assert_eq!(err.to_string(), "Record store unavailable: MemoryRecordStore");
    }

    #[test]
    fn test_from_serde_json() {
        let bad: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: AccountsError = bad.unwrap_err().into();
        assert!(matches!(err, AccountsError::Serialization(_)));
    }
}
