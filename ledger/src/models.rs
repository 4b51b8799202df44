use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A filed report as stored in the private collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidentialRecord {
    pub id: String,
    pub reporter: String,

    /// Pointer into content-addressed storage; never interpreted here.
    pub evidence_ref: String,

    pub verified: bool,

    /// Identity of the verifying caller; empty until verified.
    #[serde(default)]
    pub verified_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// Globally readable index entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentIndexEntry {
    pub id: String,
    pub commitment: String,
}

/// Payload of the event emitted when a record is verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVerified {
    pub id: String,
    pub commitment: String,
}

pub const RECORD_VERIFIED_EVENT: &str = "RecordVerified";

/// A contract event together with the transaction that committed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub name: String,
    pub tx_id: Uuid,
    pub height: u64,
    pub payload: serde_json::Value,
}

/// The authenticated caller of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    /// Organization (membership service provider) the caller belongs to.
    pub msp_id: String,

    /// Caller-unique identity within the organization, e.g. a certificate subject.
    pub id: String,
}

impl ClientIdentity {
    pub fn new(msp_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self { msp_id: msp_id.into(), id: id.into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub id: String,
    pub reporter: String,
    pub evidence_ref: String,
    pub commitment: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordExistsResponse {
    pub id: String,
    pub exists: bool,
}
