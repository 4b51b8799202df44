//! The record contract.
//!
//! Confidential records live in a private collection; only `{id, commitment}` is written to the
//! world state. Contract code sees the ledger exclusively through a [`TxContext`].

use crate::authz::VerifierPolicy;
use crate::errors::{ContractError, LedgerError};
use crate::models::{CommitmentIndexEntry, ConfidentialRecord, RecordVerified, RECORD_VERIFIED_EVENT};
use crate::stub::TxContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use zk_commit::types::is_canonical_decimal;

/// World-state key prefix of the public commitment index.
pub const INDEX_PREFIX: &str = "commitment~";

pub fn index_key(id: &str) -> String {
    format!("{INDEX_PREFIX}{id}")
}

#[derive(Clone, Debug)]
pub struct RecordContract {
    collection: String,
    verifiers: VerifierPolicy,
}

impl RecordContract {
    pub fn new(collection: impl Into<String>, verifiers: VerifierPolicy) -> Self {
        Self {
            collection: collection.into(),
            verifiers,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn create_record(
        &self,
        ctx: &mut TxContext,
        id: &str,
        reporter: &str,
        evidence_ref: &str,
        commitment: &str,
    ) -> Result<ConfidentialRecord, LedgerError> {
        if id.is_empty() {
            return Err(ContractError::MalformedInput("record id must not be empty".into()).into());
        }
        if !is_canonical_decimal(commitment) {
            return Err(ContractError::MalformedInput(format!(
                "commitment must be a canonical decimal field element, got {commitment:?}"
            ))
            .into());
        }

        if self.record_exists(ctx, id).await? {
            return Err(ContractError::AlreadyExists(id.to_string()).into());
        }

        let record = ConfidentialRecord {
            id: id.to_string(),
            reporter: reporter.to_string(),
            evidence_ref: evidence_ref.to_string(),
            verified: false,
            verified_by: String::new(),
            verified_at: None,
            created_at: ctx.timestamp(),
        };
        let entry = CommitmentIndexEntry {
            id: id.to_string(),
            commitment: commitment.to_string(),
        };

        ctx.put_private_data(&self.collection, id, encode(&record)?);
        ctx.put_state(&index_key(id), encode(&entry)?);

        Ok(record)
    }

    pub async fn get_record(&self, ctx: &mut TxContext, id: &str) -> Result<ConfidentialRecord, LedgerError> {
        match ctx.get_private_data(&self.collection, id).await? {
            Some(bytes) => decode(&bytes),
            None => Err(ContractError::NotFound(format!("record {id}")).into()),
        }
    }

    pub async fn get_commitment(&self, ctx: &mut TxContext, id: &str) -> Result<CommitmentIndexEntry, LedgerError> {
        match ctx.get_state(&index_key(id)).await? {
            Some(bytes) => decode(&bytes),
            None => Err(ContractError::NotFound(format!("commitment index {id}")).into()),
        }
    }

    /// Flip a record to verified.
    ///
    /// Only configured verifier organizations may call this. A record that is already verified
    /// is returned unchanged: no write and no second event.
    pub async fn verify_record(&self, ctx: &mut TxContext, id: &str) -> Result<ConfidentialRecord, LedgerError> {
        if !self.verifiers.is_authorized(ctx.creator()) {
            warn!(record_id = id, msp_id = %ctx.creator().msp_id, "verification refused");
            return Err(ContractError::Unauthorized(ctx.creator().msp_id.clone()).into());
        }

        let mut record = self.get_record(ctx, id).await?;
        if record.verified {
            info!(record_id = id, verified_by = %record.verified_by, "record already verified");
            return Ok(record);
        }

        let entry = self.get_commitment(ctx, id).await?;

        record.verified = true;
        record.verified_by = ctx.creator().id.clone();
        record.verified_at = Some(ctx.timestamp());

        ctx.put_private_data(&self.collection, id, encode(&record)?);

        let event = RecordVerified {
            id: id.to_string(),
            commitment: entry.commitment,
        };
        let payload = serde_json::to_value(&event).map_err(|e| LedgerError::Codec(format!("{e}")))?;
        ctx.set_event(RECORD_VERIFIED_EVENT, payload);

        Ok(record)
    }

    pub async fn record_exists(&self, ctx: &mut TxContext, id: &str) -> Result<bool, LedgerError> {
        Ok(ctx.get_private_data(&self.collection, id).await?.is_some())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(value).map_err(|e| LedgerError::Codec(format!("{e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::Codec(format!("{e}")))
}
