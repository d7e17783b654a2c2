//! Error taxonomy for the feed services
//!
//! Comprehensive error taxonomy using thiserror. Request-boundary
//! validation failures map to structured negative acknowledgements;
//! predicate-evaluation and transport-full conditions are handled at
//! the dispatch gates and never surface to clients.

use thiserror::Error;

/// Top-level feed error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("instrument not found: {id}")]
    InstrumentNotFound { id: String },

    #[error("subscription not found: {id}")]
    SubscriptionNotFound { id: String },

    #[error("session not found: {id}")]
    SessionNotFound { id: u64 },

    #[error("instrument already exists: {id}")]
    AlreadyExists { id: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("predicate evaluation failed: {message}")]
    PredicateEval { message: String },

    #[error("transport queue full for session {session}")]
    TransportFull { session: u64 },

    #[error("service shutting down")]
    Shutdown,
}

impl FeedError {
    /// Stable error code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            FeedError::InstrumentNotFound { .. }
            | FeedError::SubscriptionNotFound { .. }
            | FeedError::SessionNotFound { .. } => "NOT_FOUND",
            FeedError::AlreadyExists { .. } => "ALREADY_EXISTS",
            FeedError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            FeedError::PredicateEval { .. } => "PREDICATE_EVALUATION",
            FeedError::TransportFull { .. } => "TRANSPORT_FULL",
            FeedError::Shutdown => "SHUTDOWN",
        }
    }
}

/// Field-level errors raised by the uniform field-map view
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("unknown field: {field}")]
    UnknownField { field: String },

    #[error("type mismatch for {field}: expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("field {field} is immutable")]
    ImmutableField { field: String },

    #[error("invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },
}

impl From<FieldError> for FeedError {
    fn from(err: FieldError) -> Self {
        FeedError::InvalidArgument {
            message: err.to_string(),
        }
    }
}
