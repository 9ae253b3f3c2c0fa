//! Unified error system for Keygate
//!
//! Every core operation returns [`KeygateError`] rather than aborting. The
//! variants map one-to-one onto the outcomes the HTTP and CLI layers need to
//! tell apart, so those layers can pick a status code or exit code from
//! [`KeygateError::kind`] without parsing messages.

use serde::{Deserialize, Serialize};

/// Unified error type for all Keygate operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum KeygateError {
    /// Token missing, unparseable, forged or expired
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Why the caller could not be authenticated
        message: String,
    },

    /// Valid identity, but revoked, disabled, or lacking the permission
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Why access was refused
        message: String,
    },

    /// No record for the requested key
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Uniqueness violation on create
    #[error("Already exists: {message}")]
    AlreadyExists {
        /// Error message describing the conflicting record
        message: String,
    },

    /// Miner identifier already bound to another account
    #[error("Miner bound: {message}")]
    MinerBound {
        /// Error message naming the miner and its owner
        message: String,
    },

    /// Illegal reward-pool state change
    #[error("Invalid transition: {message}")]
    InvalidTransition {
        /// Error message describing the rejected transition
        message: String,
    },

    /// Malformed field value
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message describing the invalid input
        message: String,
    },

    /// Storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

/// Fieldless discriminant of [`KeygateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`KeygateError::Unauthenticated`]
    Unauthenticated,
    /// See [`KeygateError::Forbidden`]
    Forbidden,
    /// See [`KeygateError::NotFound`]
    NotFound,
    /// See [`KeygateError::AlreadyExists`]
    AlreadyExists,
    /// See [`KeygateError::MinerBound`]
    MinerBound,
    /// See [`KeygateError::InvalidTransition`]
    InvalidTransition,
    /// See [`KeygateError::InvalidArgument`]
    InvalidArgument,
    /// See [`KeygateError::Storage`]
    Storage,
    /// See [`KeygateError::Serialization`]
    Serialization,
    /// See [`KeygateError::Internal`]
    Internal,
}

impl KeygateError {
    /// Create an unauthenticated error
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an already exists error
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Create a miner bound error
    pub fn miner_bound(message: impl Into<String>) -> Self {
        Self::MinerBound {
            message: message.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The error's kind, for mapping onto response codes
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::MinerBound { .. } => ErrorKind::MinerBound,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// The human-readable detail carried by the error
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::AlreadyExists { message }
            | Self::MinerBound { message }
            | Self::InvalidTransition { message }
            | Self::InvalidArgument { message }
            | Self::Storage { message }
            | Self::Serialization { message }
            | Self::Internal { message } => message,
        }
    }
}

/// Standard Result type for Keygate operations
pub type Result<T> = std::result::Result<T, KeygateError>;

impl From<std::io::Error> for KeygateError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::forbidden(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for KeygateError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
