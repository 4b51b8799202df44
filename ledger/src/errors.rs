use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named precondition failures raised by contract logic. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("record {0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized: caller organization {0} may not verify records")]
    Unauthorized(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// Everything a ledger invocation can fail with.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// The caller's organization is not a member of the private collection.
    #[error("access denied: organization {msp_id} is not a member of collection {collection}")]
    AccessDenied { msp_id: String, collection: String },

    /// A key read during simulation changed before commit, or a key to be created already exists.
    #[error("mvcc read conflict on {0}")]
    Conflict(String),

    #[error("state codec error: {0}")]
    Codec(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Wire-level reason code carried in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    AlreadyExists,
    NotFound,
    Unauthorized,
    AccessDenied,
    MalformedInput,
    MvccReadConflict,
    Unauthenticated,
    Internal,
}

impl LedgerError {
    pub fn code(&self) -> ReasonCode {
        match self {
            LedgerError::Contract(ContractError::AlreadyExists(_)) => ReasonCode::AlreadyExists,
            LedgerError::Contract(ContractError::NotFound(_)) => ReasonCode::NotFound,
            LedgerError::Contract(ContractError::Unauthorized(_)) => ReasonCode::Unauthorized,
            LedgerError::Contract(ContractError::MalformedInput(_)) => ReasonCode::MalformedInput,
            LedgerError::AccessDenied { .. } => ReasonCode::AccessDenied,
            LedgerError::Conflict(_) => ReasonCode::MvccReadConflict,
            LedgerError::Codec(_) | LedgerError::Storage(_) => ReasonCode::Internal,
        }
    }

    pub fn contract(&self) -> Option<&ContractError> {
        match self {
            LedgerError::Contract(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("missing or unknown client credential")]
    Unauthenticated,

    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ReasonCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::Ledger(e) => e.code(),
            ApiError::Unauthenticated => ReasonCode::Unauthenticated,
            ApiError::BadRequest(_) => ReasonCode::MalformedInput,
        };

        let status = match code {
            ReasonCode::AlreadyExists | ReasonCode::MvccReadConflict => StatusCode::CONFLICT,
            ReasonCode::NotFound => StatusCode::NOT_FOUND,
            ReasonCode::Unauthorized | ReasonCode::AccessDenied => StatusCode::FORBIDDEN,
            ReasonCode::MalformedInput => StatusCode::BAD_REQUEST,
            ReasonCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ReasonCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage details stay in the logs.
        let message = match code {
            ReasonCode::Internal => {
                tracing::error!(error = %self, "internal error");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}

/// Failures of the verification relayer.
#[derive(Debug, Error)]
pub enum RelayerError {
    /// The proof did not verify locally, or it proves a different commitment than the record's.
    #[error("proof invalid: {0}")]
    ProofInvalid(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The ledger answered and refused.
    #[error("ledger rejected the call ({code:?}): {message}")]
    Rejected { code: ReasonCode, message: String },

    /// The ledger could not be reached or did not answer in time.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("credential store: {0}")]
    Credential(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayerError {
    /// Transport failures and MVCC conflicts can be retried; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayerError::Transport(_)
                | RelayerError::Rejected { code: ReasonCode::MvccReadConflict, .. }
        )
    }
}

impl From<zk_commit::ZkError> for RelayerError {
    fn from(e: zk_commit::ZkError) -> Self {
        RelayerError::MalformedInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorBody) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn contract_errors_map_to_reason_codes() {
        let (status, body) = body_of(LedgerError::from(ContractError::AlreadyExists("R1".into())).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, ReasonCode::AlreadyExists);

        let (status, body) = body_of(LedgerError::from(ContractError::Unauthorized("ReporterMSP".into())).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, ReasonCode::Unauthorized);

        let (status, body) = body_of(ApiError::Unauthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, ReasonCode::Unauthenticated);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_of(LedgerError::Codec("bad json at byte 7".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "internal error");
    }

    #[test]
    fn only_transport_and_conflicts_retry() {
        assert!(RelayerError::Transport("timeout".into()).is_retryable());
        assert!(RelayerError::Rejected { code: ReasonCode::MvccReadConflict, message: String::new() }.is_retryable());
        assert!(!RelayerError::Rejected { code: ReasonCode::Unauthorized, message: String::new() }.is_retryable());
        assert!(!RelayerError::ProofInvalid("bad".into()).is_retryable());
    }
}
