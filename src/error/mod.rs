//! Unified error handling module
//!
//! Every fallible operation in the crate returns [`FieldDbResult`]. Variants carry
//! enough context (field, row, action, user) to render a precise message, and
//! [`FieldDbError::kind`] folds them into a small taxonomy callers can match on.

use crate::acl::{DatabaseAction, FieldAction};
use crate::field::{FieldOperation, FieldType, Row, ValueKind};
use std::io;
use thiserror::Error;

/// Coarse classification of a [`FieldDbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    UnsupportedOperation,
    NotFound,
    Conflict,
    ResourceExhausted,
    InvalidArgument,
    EndOfSequence,
    /// Snapshot I/O and decoding; the only failures that come from outside the core.
    Persistence,
}

#[derive(Debug, Error)]
pub enum FieldDbError {
    // Permission errors
    #[error("User '{user}' is not allowed to {action} on this database")]
    DatabaseActionDenied { user: String, action: DatabaseAction },

    #[error("User '{user}' is not allowed to {action} on field '{field}'")]
    FieldActionDenied {
        user: String,
        field: String,
        action: FieldAction,
    },

    #[error("User '{user}' cannot edit permissions: {reason}")]
    AclEditDenied { user: String, reason: String },

    #[error("Invalid username or password")]
    InvalidLogin,

    #[error("User '{0}' cannot delete itself")]
    UserCannotDeleteItself(String),

    #[error("Delete request for field '{0}' carried the wrong token")]
    InvalidDeleteToken(String),

    // Capability errors
    #[error("{operation} is not supported on {field_type} field '{field}'")]
    UnsupportedFieldOperation {
        field: String,
        field_type: FieldType,
        operation: FieldOperation,
    },

    // Lookup errors
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Data not found in field '{field}'")]
    DataNotFound { field: String },

    #[error("Bad row given for field '{field}' (Row: {row}, Field Depth: {depth})")]
    BadRow { field: String, row: Row, depth: usize },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    // Conflicts
    #[error("Trying to insert duplicate data into field '{field}'")]
    DuplicateValue { field: String },

    #[error("A field named '{0}' already exists")]
    DuplicateFieldName(String),

    #[error("A user named '{0}' already exists")]
    DuplicateUser(String),

    #[error("A database named '{0}' already exists")]
    DuplicateDatabase(String),

    // Capacity
    #[error("Out of space to insert into field '{field}' (depth {depth})")]
    OutOfSpace { field: String, depth: usize },

    #[error("No field ids left to allocate")]
    FieldIdsExhausted,

    // Invalid arguments
    #[error("Bad resize given for field '{field}' (To Add: {amount})")]
    InvalidResize { field: String, amount: i64 },

    #[error("Field '{field}' cannot reference row {target_row}: it is not in use in the target")]
    InvalidReference { field: String, target_row: Row },

    #[error("Field '{field}' holds {expected} values, got {found}")]
    TypeMismatch {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Field '{field}' cannot be a {field_type} field holding {kind} values")]
    InvalidValueKind {
        field: String,
        field_type: FieldType,
        kind: ValueKind,
    },

    #[error("Invalid field name: '{0}'")]
    InvalidFieldName(String),

    #[error("Field '{field}' is a {found} field, expected {expected}")]
    WrongFieldType {
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    // Traversal
    #[error("End of list in field '{field}'")]
    EndOfList { field: String },

    // Persistence
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Database lock poisoned: {0}")]
    Poisoned(String),
}

impl FieldDbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatabaseActionDenied { .. }
            | Self::FieldActionDenied { .. }
            | Self::AclEditDenied { .. }
            | Self::InvalidLogin
            | Self::UserCannotDeleteItself(_)
            | Self::InvalidDeleteToken(_) => ErrorKind::PermissionDenied,
            Self::UnsupportedFieldOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::FieldNotFound(_)
            | Self::DataNotFound { .. }
            | Self::BadRow { .. }
            | Self::UserNotFound(_)
            | Self::DatabaseNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateValue { .. }
            | Self::DuplicateFieldName(_)
            | Self::DuplicateUser(_)
            | Self::DuplicateDatabase(_) => ErrorKind::Conflict,
            Self::OutOfSpace { .. } | Self::FieldIdsExhausted => ErrorKind::ResourceExhausted,
            Self::InvalidResize { .. }
            | Self::InvalidReference { .. }
            | Self::TypeMismatch { .. }
            | Self::InvalidValueKind { .. }
            | Self::InvalidFieldName(_)
            | Self::WrongFieldType { .. } => ErrorKind::InvalidArgument,
            Self::EndOfList { .. } => ErrorKind::EndOfSequence,
            Self::Io(_) | Self::Serialization(_) | Self::CorruptSnapshot(_) | Self::Poisoned(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

pub type FieldDbResult<T> = Result<T, FieldDbError>;
