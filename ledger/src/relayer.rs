//! Verification relayer: checks a commitment proof off-ledger, then marks the record verified.
//!
//! Nothing reaches the ledger until the proof has verified locally and proves the commitment
//! that is actually published for the record.

use crate::client::LedgerClient;
use crate::errors::RelayerError;
use crate::models::ConfidentialRecord;
use crate::retry::RetryConfig;
use ark_bn254::Fr;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use zk_commit::groth16::verify_commitment_proof;
use zk_commit::types::{fr_from_decimal, ProofDocument, PublicSignals, VerificationKeyDocument};

/// `proof.json`, `public.json` and `verification_key.json`, as read from disk.
#[derive(Debug, Clone)]
pub struct VerificationArtifacts {
    pub proof: ProofDocument,
    pub public_signals: PublicSignals,
    pub verification_key: VerificationKeyDocument,
}

impl VerificationArtifacts {
    pub fn load(proof: &Path, public: &Path, vkey: &Path) -> Result<Self, RelayerError> {
        Ok(Self {
            proof: read_json(proof)?,
            public_signals: read_json(public)?,
            verification_key: read_json(vkey)?,
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RelayerError> {
    let raw = std::fs::read(path)
        .map_err(|e| RelayerError::MalformedInput(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_slice(&raw).map_err(|e| RelayerError::MalformedInput(format!("invalid {}: {e}", path.display())))
}

pub struct Relayer<C> {
    client: C,
    retry: RetryConfig,
}

impl<C: LedgerClient> Relayer<C> {
    pub fn new(client: C, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Verify `proof` locally and, only if it holds for record `id`'s published commitment,
    /// submit the verification transaction. Returns the verified record.
    pub async fn verify_and_submit(
        &self,
        proof: &ProofDocument,
        public_signals: &PublicSignals,
        verification_key: &VerificationKeyDocument,
        id: &str,
    ) -> Result<ConfidentialRecord, RelayerError> {
        if id.is_empty() {
            return Err(RelayerError::MalformedInput("record id must not be empty".into()));
        }

        let proven = verify_locally(proof.clone(), public_signals.clone(), verification_key.clone()).await?;
        tracing::info!(id, "proof verified locally");

        let published = self.with_retry("get_commitment", || self.client.get_commitment(id)).await?;
        let published = fr_from_decimal(&published.commitment).map_err(|e| {
            RelayerError::ProofInvalid(format!("published commitment for {id} is not a field element: {e}"))
        })?;
        if published != proven {
            tracing::warn!(id, "proof is for a different commitment than the one published");
            return Err(RelayerError::ProofInvalid(format!(
                "proof does not attest the commitment published for {id}"
            )));
        }

        self.submit(id).await
    }

    /// Submit `verify_record`, reconciling after every transport failure since the transaction
    /// may have committed without the answer reaching us.
    async fn submit(&self, id: &str) -> Result<ConfidentialRecord, RelayerError> {
        let mut attempt = 0;
        loop {
            let err = match self.client.verify_record(id).await {
                Ok(record) => {
                    tracing::info!(id, verified_by = %record.verified_by, "record verified");
                    return Ok(record);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if matches!(err, RelayerError::Transport(_)) {
                match self.client.get_record(id).await {
                    Ok(record) if record.verified => {
                        tracing::info!(id, "verification already committed");
                        return Ok(record);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(id, error = %e, "reconciliation read failed"),
                }
            }

            if attempt >= self.retry.max_retries {
                tracing::error!(id, attempts = attempt + 1, error = %err, "giving up on verify_record");
                return Err(err);
            }
            let delay = self.retry.delay_for_attempt(attempt);
            tracing::warn!(id, attempt, ?delay, error = %err, "retrying verify_record");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, RelayerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RelayerError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(op, attempt, ?delay, error = %e, "retrying ledger call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Decode and check the proof off the async runtime. Returns the proven commitment.
async fn verify_locally(
    proof: ProofDocument,
    public_signals: PublicSignals,
    verification_key: VerificationKeyDocument,
) -> Result<Fr, RelayerError> {
    tokio::task::spawn_blocking(move || -> Result<Fr, RelayerError> {
        let proof = proof.to_proof()?;
        let vk = verification_key.to_vk()?;
        let inputs = public_signals.to_field_elems()?;

        if verify_commitment_proof(&vk, &proof, &inputs)? {
            Ok(inputs[0])
        } else {
            Err(RelayerError::ProofInvalid("proof does not verify".into()))
        }
    })
    .await
    .map_err(|e| RelayerError::Internal(format!("verification task: {e}")))?
}
