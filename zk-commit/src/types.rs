//! Document shapes and field encodings shared by the generator, the prover and the relayer.
//!
//! Every field element that crosses a document boundary is a canonical decimal string: ASCII
//! digits only, no sign, no leading zeros (except `"0"`), strictly below the BN254 scalar modulus.
//! This is the same convention the circuit uses for its public signals, so a commitment read off
//! the ledger can be compared with public signal 0 of a proof without any re-encoding.

use crate::constants::{NUM_PUBLIC_SIGNALS, PROOF_CURVE, PROOF_PROTOCOL, SECRET_ARITY};
use crate::error::ZkError;
use crate::groth16::{deserialize_proof, deserialize_vk, serialize_proof, serialize_vk};
use ark_bn254::{Bn254, Fr};
use ark_ff::PrimeField;
use ark_groth16::{Proof, VerifyingKey};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Parse a non-negative decimal integer into a field element.
///
/// Leading zeros are tolerated. Empty strings, signs, whitespace and values at or above the
/// modulus are rejected instead of being silently reduced.
pub fn fr_from_decimal(s: &str) -> Result<Fr, ZkError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ZkError::malformed(format!("not a non-negative decimal integer: {s:?}")));
    }

    let digits = s.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let x = Fr::from_str(digits).map_err(|_| ZkError::malformed(format!("invalid field element: {s:?}")))?;

    // `from_str` reduces modulo p; a round trip that changes the digits means the value was too big.
    if x.into_bigint().to_string() != digits {
        return Err(ZkError::malformed(format!("value exceeds the field modulus: {s:?}")));
    }

    Ok(x)
}

/// Canonical decimal encoding of a field element.
pub fn fr_to_decimal(x: &Fr) -> String {
    x.into_bigint().to_string()
}

/// True when `s` is exactly the canonical encoding of some field element.
pub fn is_canonical_decimal(s: &str) -> bool {
    match fr_from_decimal(s) {
        Ok(x) => fr_to_decimal(&x) == s,
        Err(_) => false,
    }
}

/// The circuit input document written by the commitment generator.
///
/// Flat key-value shape: `{"a": .., "b": .., "c": .., "commitment": ..}`, all decimal strings so
/// no consumer ever round-trips a secret through a lossy number type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInput {
    pub a: String,
    pub b: String,
    pub c: String,
    pub commitment: String,
}

impl ProofInput {
    pub fn secrets(&self) -> Result<[Fr; SECRET_ARITY], ZkError> {
        Ok([
            fr_from_decimal(&self.a)?,
            fr_from_decimal(&self.b)?,
            fr_from_decimal(&self.c)?,
        ])
    }

    pub fn commitment(&self) -> Result<Fr, ZkError> {
        fr_from_decimal(&self.commitment)
    }
}

/// Public signals of a commitment proof (`public.json`): a JSON array of decimal strings.
///
/// Index 0 is the commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicSignals(pub Vec<String>);

impl PublicSignals {
    pub fn from_commitment(commitment: &Fr) -> Self {
        Self(vec![fr_to_decimal(commitment)])
    }

    /// Decode into the field-element vector handed to the Groth16 verifier.
    pub fn to_field_elems(&self) -> Result<Vec<Fr>, ZkError> {
        if self.0.len() != NUM_PUBLIC_SIGNALS {
            return Err(ZkError::malformed(format!(
                "expected {NUM_PUBLIC_SIGNALS} public signal(s), got {}",
                self.0.len()
            )));
        }
        self.0.iter().map(|s| fr_from_decimal(s)).collect()
    }

    pub fn commitment(&self) -> Result<Fr, ZkError> {
        let elems = self.to_field_elems()?;
        Ok(elems[0])
    }
}

/// `proof.json`: a compressed arkworks proof, base64 encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofDocument {
    pub protocol: String,
    pub curve: String,
    pub proof_b64: String,
}

impl ProofDocument {
    pub fn from_proof(proof: &Proof<Bn254>) -> Result<Self, ZkError> {
        Ok(Self {
            protocol: PROOF_PROTOCOL.to_string(),
            curve: PROOF_CURVE.to_string(),
            proof_b64: base64::engine::general_purpose::STANDARD.encode(serialize_proof(proof)?),
        })
    }

    pub fn to_proof(&self) -> Result<Proof<Bn254>, ZkError> {
        check_tags(&self.protocol, &self.curve)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.proof_b64)
            .map_err(|e| ZkError::malformed(format!("invalid proof_b64: {e}")))?;
        deserialize_proof(&bytes).map_err(|e| ZkError::malformed(format!("invalid proof: {e}")))
    }
}

/// `verification_key.json`: a compressed arkworks verifying key, base64 encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationKeyDocument {
    pub protocol: String,
    pub curve: String,
    pub vk_b64: String,
}

impl VerificationKeyDocument {
    pub fn from_vk(vk: &VerifyingKey<Bn254>) -> Result<Self, ZkError> {
        Ok(Self {
            protocol: PROOF_PROTOCOL.to_string(),
            curve: PROOF_CURVE.to_string(),
            vk_b64: base64::engine::general_purpose::STANDARD.encode(serialize_vk(vk)?),
        })
    }

    pub fn to_vk(&self) -> Result<VerifyingKey<Bn254>, ZkError> {
        check_tags(&self.protocol, &self.curve)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.vk_b64)
            .map_err(|e| ZkError::malformed(format!("invalid vk_b64: {e}")))?;
        deserialize_vk(&bytes).map_err(|e| ZkError::malformed(format!("invalid verification key: {e}")))
    }
}

fn check_tags(protocol: &str, curve: &str) -> Result<(), ZkError> {
    if protocol != PROOF_PROTOCOL || curve != PROOF_CURVE {
        return Err(ZkError::malformed(format!(
            "unsupported proof system {protocol}/{curve}, expected {PROOF_PROTOCOL}/{PROOF_CURVE}"
        )));
    }
    Ok(())
}
