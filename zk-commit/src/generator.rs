//! Commitment generator: secrets in, circuit input document out.

use crate::constants::SECRET_ARITY;
use crate::error::ZkError;
use crate::groth16::compute_commitment;
use crate::types::{fr_from_decimal, fr_to_decimal, ProofInput};
use ark_bn254::Fr;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Default location of the circuit input document, relative to the working directory.
pub const DEFAULT_INPUT_PATH: &str = "circuit/input.json";

/// Parse the secrets and build the proof-input document.
///
/// Every value is validated before anything is hashed.
pub fn make_input(secrets: [&str; SECRET_ARITY]) -> Result<ProofInput, ZkError> {
    let mut elems = [Fr::from(0u64); SECRET_ARITY];
    for (slot, raw) in elems.iter_mut().zip(secrets) {
        *slot = fr_from_decimal(raw)?;
    }

    let commitment = compute_commitment(&elems);

    Ok(ProofInput {
        a: fr_to_decimal(&elems[0]),
        b: fr_to_decimal(&elems[1]),
        c: fr_to_decimal(&elems[2]),
        commitment: fr_to_decimal(&commitment),
    })
}

/// Write the document to `path` atomically.
pub fn write_input(path: &Path, input: &ProofInput) -> Result<(), ZkError> {
    let json = serde_json::to_vec(input).map_err(|e| ZkError::Serialization(format!("{e}")))?;
    write_atomically(path, &json)
}

/// Write `bytes` to a uniquely named temp file next to `path`, then rename it over `path`.
///
/// Readers see either the complete new file or the previous one. The temp file is removed if
/// anything fails before the rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ZkError> {
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Parse, hash and write in one step. Nothing is written if any secret is malformed.
pub fn generate(secrets: [&str; SECRET_ARITY], path: &Path) -> Result<ProofInput, ZkError> {
    let input = make_input(secrets)?;
    write_input(path, &input)?;
    info!(path = %path.display(), commitment = %input.commitment, "wrote proof input");
    Ok(input)
}
