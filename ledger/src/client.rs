//! Relayer-side access to the ledger gateway.

use crate::errors::{ErrorBody, ReasonCode, RelayerError};
use crate::identity::{Enrollment, CREDENTIAL_HEADER};
use crate::models::{CommitmentIndexEntry, ConfidentialRecord};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// The three contract calls the relayer makes.
pub trait LedgerClient: Send + Sync {
    fn get_record(&self, id: &str) -> impl Future<Output = Result<ConfidentialRecord, RelayerError>> + Send;

    fn get_commitment(&self, id: &str) -> impl Future<Output = Result<CommitmentIndexEntry, RelayerError>> + Send;

    /// Submit the verification transaction.
    fn verify_record(&self, id: &str) -> impl Future<Output = Result<ConfidentialRecord, RelayerError>> + Send;
}

/// `LedgerClient` over the node's HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    base_url: Url,
    credential: String,
}

impl HttpLedgerClient {
    /// `ledger_url` is the node root, e.g. `http://127.0.0.1:7051`. Every call is bounded by `timeout`.
    pub fn new(
        ledger_url: &str,
        channel: &str,
        contract: &str,
        enrollment: &Enrollment,
        timeout: Duration,
    ) -> Result<Self, RelayerError> {
        let mut base_url =
            Url::parse(ledger_url).map_err(|e| RelayerError::MalformedInput(format!("invalid ledger url {ledger_url}: {e}")))?;
        base_url
            .path_segments_mut()
            .map_err(|_| RelayerError::MalformedInput(format!("ledger url {ledger_url} cannot be a base")))?
            .pop_if_empty()
            .extend(["api", "v1", channel, contract]);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayerError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            credential: enrollment.credential.clone(),
        })
    }

    fn record_url(&self, id: &str, suffix: Option<&str>) -> Result<Url, RelayerError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RelayerError::Internal("ledger url cannot be a base".into()))?;
            segments.extend(["records", id]);
            if let Some(s) = suffix {
                segments.push(s);
            }
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T, RelayerError> {
        let endpoint = format!("{method} {}", url.path());

        let resp = self
            .http
            .request(method, url)
            .header(CREDENTIAL_HEADER, &self.credential)
            .send()
            .await
            .map_err(|e| RelayerError::Transport(format!("{endpoint}: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json()
                .await
                .map_err(|e| RelayerError::Transport(format!("{endpoint}: unreadable response: {e}")));
        }

        if status.is_server_error() {
            return Err(RelayerError::Transport(format!("{endpoint}: ledger answered {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| RelayerError::Transport(format!("{endpoint}: unreadable error body: {e}")))?;
        Err(rejection(&endpoint, status, &body))
    }
}

/// Map a 4xx answer to a rejection. Gateway errors carry an [`ErrorBody`]; anything else (e.g.
/// a route that does not exist under a misconfigured channel) is classified by status.
fn rejection(endpoint: &str, status: StatusCode, body: &str) -> RelayerError {
    if let Ok(ErrorBody { error, message }) = serde_json::from_str::<ErrorBody>(body) {
        return RelayerError::Rejected { code: error, message };
    }

    let code = match status {
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => ReasonCode::NotFound,
        StatusCode::UNAUTHORIZED => ReasonCode::Unauthenticated,
        StatusCode::FORBIDDEN => ReasonCode::AccessDenied,
        StatusCode::CONFLICT => ReasonCode::MvccReadConflict,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ReasonCode::MalformedInput,
        _ => ReasonCode::Internal,
    };
    RelayerError::Rejected {
        code,
        message: format!("{endpoint}: {status}: {body}"),
    }
}

impl LedgerClient for HttpLedgerClient {
    async fn get_record(&self, id: &str) -> Result<ConfidentialRecord, RelayerError> {
        let url = self.record_url(id, None)?;
        self.call(Method::GET, url).await
    }

    async fn get_commitment(&self, id: &str) -> Result<CommitmentIndexEntry, RelayerError> {
        let url = self.record_url(id, Some("commitment"))?;
        self.call(Method::GET, url).await
    }

    async fn verify_record(&self, id: &str) -> Result<ConfidentialRecord, RelayerError> {
        let url = self.record_url(id, Some("verify"))?;
        self.call(Method::POST, url).await
    }
}
