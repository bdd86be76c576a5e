use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use shared::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Any failure inside a transaction; the whole transition was rolled back.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("stored record is malformed: {0}")]
    Malformed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl<E: std::error::Error + 'static> From<bb8::RunError<E>> for ServiceError {
    fn from(err: bb8::RunError<E>) -> Self {
        ServiceError::Pool(err.to_string())
    }
}

/// How a storage failure should be reported. Only `Transient` failures can
/// succeed when the same request is sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFault {
    /// Lost connection, serialization failure, deadlock, lock or statement timeout.
    Transient,
    /// Unique or foreign key violation.
    Conflict,
    /// The request produced values the schema refuses: CHECK, NOT NULL,
    /// numeric overflow.
    Rejected,
    Internal,
}

// diesel reports SQLSTATEs it has no kind for as `Unknown` with the server
// message only.
const TRANSIENT_MESSAGES: &[&str] = &[
    "deadlock detected",
    "could not obtain lock",
    "canceling statement due to",
    "terminating connection",
];
const REJECTED_MESSAGES: &[&str] = &["numeric field overflow", "out of range", "value too long"];

pub fn classify(err: &DieselError) -> StorageFault {
    match err {
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::SerializationFailure
            | DatabaseErrorKind::ClosedConnection
            | DatabaseErrorKind::UnableToSendCommand => StorageFault::Transient,
            DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation => StorageFault::Conflict,
            DatabaseErrorKind::CheckViolation | DatabaseErrorKind::NotNullViolation => StorageFault::Rejected,
            _ => {
                let message = info.message();
                if TRANSIENT_MESSAGES.iter().any(|m| message.contains(m)) {
                    StorageFault::Transient
                } else if REJECTED_MESSAGES.iter().any(|m| message.contains(m)) {
                    StorageFault::Rejected
                } else {
                    StorageFault::Internal
                }
            }
        },
        DieselError::RollbackTransaction
        | DieselError::RollbackErrorOnCommit { .. }
        | DieselError::BrokenTransactionManager => StorageFault::Transient,
        _ => StorageFault::Internal,
    }
}

impl ServiceError {
    /// Whether the caller may safely repeat the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Pool(_) => true,
            ServiceError::Database(err) => classify(err) == StorageFault::Transient,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Ledger(err) => match err {
                LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                LedgerError::InvalidTransition { .. } | LedgerError::AlreadyAssigned(_) => StatusCode::CONFLICT,
                LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientUnits { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                LedgerError::Invalid(_) => StatusCode::BAD_REQUEST,
            },
            ServiceError::Database(err) => match classify(err) {
                StorageFault::Transient => StatusCode::SERVICE_UNAVAILABLE,
                StorageFault::Conflict => StatusCode::CONFLICT,
                StorageFault::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
                StorageFault::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Malformed(_) | ServiceError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, retryable = self.is_retryable(), "Request failed");
        }

        let error = match &self {
            ServiceError::Ledger(err) => err.to_string(),
            ServiceError::Database(err) => match classify(err) {
                StorageFault::Transient => "Storage unavailable, nothing was applied".to_string(),
                StorageFault::Conflict => "Conflicting record, nothing was applied".to_string(),
                StorageFault::Rejected => "Values out of range for storage, nothing was applied".to_string(),
                StorageFault::Internal => "Internal server error".to_string(),
            },
            ServiceError::Pool(_) => "Storage unavailable, nothing was applied".to_string(),
            ServiceError::Malformed(_) | ServiceError::Serialization(_) => "Internal server error".to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                retryable: self.is_retryable(),
            }),
        )
            .into_response()
    }
}
