//! Error types shared by standins, targets and codecs

use std::sync::Arc;

use crate::code::MethodCode;

/// Result type for standin operations
pub type StandinResult<T> = Result<T, StandinError>;

/// Result of invoking a method by code
pub type InvokeResult = StandinResult<crate::Value>;

/// Failure categories a caller can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Authorisation missing or lacking a capability
    Security,
    /// Unrecognised method code or a broken method table
    Dispatch,
    /// Operation issued in the wrong lifecycle state
    StateOrdering,
    /// Lost a compare-and-swap on the storage slot
    ConcurrentModification,
    /// Failure raised by the invoked method itself
    Delegated,
    /// Argument conversion or codec failure
    Marshalling,
}

/// Errors produced by the standin machinery
#[derive(Debug, Clone, thiserror::Error)]
pub enum StandinError {
    /// Authorisation absent or not issued by the trusted core
    #[error("Security violation: {0}")]
    Security(String),

    /// Authorisation lacks the requested capability
    #[error("Missing capability: {0}")]
    MissingCapability(&'static str),

    /// Method code not present in the receiver's method table
    #[error("Unknown method code {code} for {class}")]
    UnknownMethod {
        /// The offending code
        code: MethodCode,
        /// Class whose table was consulted
        class: String,
    },

    /// Two eligible methods produced the same 64-bit code
    #[error("Method code {code} produced by both {first} and {second}")]
    CodeCollision {
        /// The colliding code
        code: MethodCode,
        /// Method registered first
        first: String,
        /// Method registered second
        second: String,
    },

    /// Operation not legal in the current lifecycle state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Operation not supported for this standin or class
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Storage changed between read and compare-and-swap
    #[error("Concurrent modification of storage for {class}")]
    ConcurrentModification {
        /// Class of the standin whose storage was contended
        class: String,
    },

    /// Value or description of the wrong type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Invalid or missing argument
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// Encoding or decoding a description failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Failure raised by the invoked method, passed through untouched
    #[error(transparent)]
    Raised(Arc<dyn std::error::Error + Send + Sync>),
}

impl StandinError {
    /// Wrap a method's own failure so it propagates unchanged
    pub fn raised<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StandinError::Raised(Arc::new(error))
    }

    /// Category of this failure
    pub fn category(&self) -> FailureCategory {
        match self {
            StandinError::Security(_) | StandinError::MissingCapability(_) => {
                FailureCategory::Security
            }
            StandinError::UnknownMethod { .. } | StandinError::CodeCollision { .. } => {
                FailureCategory::Dispatch
            }
            StandinError::IllegalState(_) | StandinError::UnsupportedOperation(_) => {
                FailureCategory::StateOrdering
            }
            StandinError::ConcurrentModification { .. } => FailureCategory::ConcurrentModification,
            StandinError::Raised(_) => FailureCategory::Delegated,
            StandinError::TypeMismatch { .. }
            | StandinError::ArgumentError(_)
            | StandinError::Codec(_) => FailureCategory::Marshalling,
        }
    }

    /// Only a lost compare-and-swap is worth retrying with fresh state
    pub fn is_retryable(&self) -> bool {
        self.category() == FailureCategory::ConcurrentModification
    }

    /// Downcast a delegated failure back to the method's own error type
    pub fn downcast_raised<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            StandinError::Raised(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}
