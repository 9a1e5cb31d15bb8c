use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use herald_db::StoreError;
use herald_types::api::{Envelope, ErrorBody};
use herald_types::{ServerKind, Status};
use tracing::error;

/// Failures of coordinator operations. Handlers never see storage errors
/// directly; everything arrives classified here.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("referenced {kind} '{id}' does not exist")]
    ReferenceNotFound { kind: ServerKind, id: String },

    #[error("connection between user delivery server '{user_delivery_id}' and webview server '{webview_id}' already exists")]
    AlreadyExists {
        user_delivery_id: String,
        webview_id: String,
    },

    #[error("{kind} named '{name}' already exists")]
    DuplicateName { kind: ServerKind, name: String },

    #[error("{kind} '{id}' is already {status}")]
    NoOp {
        kind: &'static str,
        id: String,
        status: Status,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{kind} '{id}' is inactive")]
    PeerInactive { kind: ServerKind, id: String },

    #[error("transaction aborted: {0}")]
    TransactionFailed(StoreError),

    #[error("store call timed out")]
    Timeout,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn reference_not_found(kind: ServerKind, id: &str) -> Self {
        Self::ReferenceNotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate_name(kind: ServerKind, name: &str) -> Self {
        Self::DuplicateName {
            kind,
            name: name.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidId(id) => Self::InvalidArgument(format!("malformed id '{}'", id)),
            StoreError::Timeout => Self::Timeout,
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            other => Self::Store(other),
        }
    }
}

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Service(ServiceError::InvalidArgument(msg.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::NotFound { .. } | ServiceError::ReferenceNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                ServiceError::AlreadyExists { .. }
                | ServiceError::DuplicateName { .. }
                | ServiceError::PeerInactive { .. } => StatusCode::CONFLICT,
                ServiceError::NoOp { .. } | ServiceError::InvalidArgument(_) => {
                    StatusCode::BAD_REQUEST
                }
                ServiceError::TransactionFailed(_) | ServiceError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                ServiceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag for the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Service(err) => match err {
                ServiceError::NotFound { .. } => "NOT_FOUND",
                ServiceError::ReferenceNotFound { .. } => "REFERENCE_NOT_FOUND",
                ServiceError::AlreadyExists { .. } => "ALREADY_EXISTS",
                ServiceError::DuplicateName { .. } => "DUPLICATE_NAME",
                ServiceError::NoOp { .. } => "NO_OP",
                ServiceError::InvalidArgument(_) => "INVALID_ARGUMENT",
                ServiceError::PeerInactive { .. } => "PEER_INACTIVE",
                ServiceError::TransactionFailed(_) => "TRANSACTION_FAILED",
                ServiceError::Timeout => "TIMEOUT",
                ServiceError::Unavailable(_) => "UNAVAILABLE",
                ServiceError::Store(_) => "STORAGE_ERROR",
            },
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the log.
        let detail = match &self {
            Self::Service(ServiceError::Store(err)) => {
                error!("Storage error: {}", err);
                "storage error".to_string()
            }
            Self::Service(ServiceError::TransactionFailed(err)) => {
                error!("Transaction failed: {}", err);
                "transaction aborted, no changes were applied".to_string()
            }
            Self::Internal(msg) => {
                error!("Internal error: {}", msg);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = Envelope::<()> {
            message: detail.clone(),
            code: status.as_u16(),
            data: None,
            error: Some(ErrorBody {
                kind: self.kind().to_string(),
                detail,
            }),
        };
        (status, Json(body)).into_response()
    }
}
