//! Error types for the cashier ledger

use crate::permissions::{Permission, Role};
use crate::types::{Amount, ClientId, TicketId, UserId};
use std::time::Duration;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount is zero, negative, or finer than the minor unit
    #[error("Invalid amount: {0}")]
    InvalidAmount(Amount),

    /// Withdrawal exceeds the current balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Requested withdrawal
        requested: Amount,
        /// Balance the request was checked against
        available: Amount,
    },

    /// National ID is not exactly 8 digits
    #[error("Invalid national ID: {0:?}")]
    InvalidNationalId(String),

    /// National ID already registered to another client
    #[error("National ID already registered: {0}")]
    DuplicateNationalId(String),

    /// Client fields failed validation
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Client is inactive and cannot receive tickets
    #[error("Client inactive: {0}")]
    InactiveClient(ClientId),

    /// User fields failed validation
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// Username already taken
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// Operator role lacks the permission
    #[error("Permission denied: {role} cannot {permission}")]
    PermissionDenied {
        /// Operator role
        role: Role,
        /// Missing permission
        permission: Permission,
    },

    /// Client not found
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    /// Ticket not found
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Ticket code already used by another ticket
    #[error("Duplicate ticket code: {0}")]
    DuplicateCode(String),

    /// Store request did not complete in time
    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    /// Opaque store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised before any store access
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InvalidNationalId(_)
                | Error::InvalidClient(_)
                | Error::InvalidUser(_)
        )
    }

    /// True for lookups that missed
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ClientNotFound(_) | Error::TicketNotFound(_) | Error::UserNotFound(_)
        )
    }
}
