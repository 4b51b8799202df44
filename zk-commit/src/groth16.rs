//! Groth16 prover/verifier orchestration for the commitment circuit.
//!
//! SECURITY NOTE: Groth16 requires a trusted setup that produces a proving key (PK) and
//! verifying key (VK). `setup_keys` runs a local, single-party setup; whoever holds its
//! randomness can forge proofs. Deployments should import keys from an MPC ceremony instead.

use crate::circuit::CommitmentCircuit;
use crate::constants::{poseidon_config, SECRET_ARITY};
use crate::error::ZkError;
use ark_bn254::{Bn254, Fr};
use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_groth16::{prepare_verifying_key, Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::RngCore;

/// Poseidon commitment over the secrets, absorbed in order.
///
/// This MUST match the circuit's logic.
pub fn compute_commitment(secrets: &[Fr; SECRET_ARITY]) -> Fr {
    let cfg = poseidon_config();
    let mut sponge = PoseidonSponge::<Fr>::new(&cfg);
    for s in secrets {
        sponge.absorb(s);
    }
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

/// Generate a Groth16 keypair for the commitment circuit.
pub fn setup_keys(rng: &mut impl RngCore) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    // Constraints do not depend on the witness values.
    let secrets = [Fr::from(0u64); SECRET_ARITY];
    let circuit = CommitmentCircuit {
        secrets,
        commitment: compute_commitment(&secrets),
    };

    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    let vk = pk.vk.clone();
    Ok((pk, vk))
}

/// Prove knowledge of `secrets` for their commitment. Returns the proof and the commitment.
pub fn prove_commitment(
    rng: &mut impl RngCore,
    pk: &ProvingKey<Bn254>,
    secrets: [Fr; SECRET_ARITY],
) -> Result<(Proof<Bn254>, Fr), ZkError> {
    let commitment = compute_commitment(&secrets);
    let circuit = CommitmentCircuit { secrets, commitment };

    let proof = Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    Ok((proof, commitment))
}

/// Verify a commitment proof against its public inputs.
///
/// Pure: no I/O, no side effects. `Ok(false)` means a well-formed proof that does not verify;
/// `Err` means the key and inputs cannot even be paired up (e.g. wrong input count).
pub fn verify_commitment_proof(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, ZkError> {
    if public_inputs.len() + 1 != vk.gamma_abc_g1.len() {
        return Err(ZkError::malformed(format!(
            "verifying key expects {} public input(s), got {}",
            vk.gamma_abc_g1.len().saturating_sub(1),
            public_inputs.len()
        )));
    }

    let pvk = prepare_verifying_key(vk);
    Groth16::<Bn254>::verify_proof(&pvk, proof, public_inputs).map_err(|e| ZkError::Ark(format!("{e}")))
}

pub fn serialize_pk(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    pk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, ZkError> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, ZkError> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_proof(proof: &Proof<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    proof
        .serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ZkError> {
    Proof::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fr_to_decimal;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn secrets() -> [Fr; SECRET_ARITY] {
        [Fr::from(123u64), Fr::from(456u64), Fr::from(789u64)]
    }

    #[test]
    fn commitment_is_deterministic() {
        let first = fr_to_decimal(&compute_commitment(&secrets()));
        let second = fr_to_decimal(&compute_commitment(&secrets()));
        assert_eq!(first, second);

        let reordered = [Fr::from(789u64), Fr::from(456u64), Fr::from(123u64)];
        assert_ne!(first, fr_to_decimal(&compute_commitment(&reordered)));
    }

    #[test]
    fn prove_then_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let (pk, vk) = setup_keys(&mut rng).unwrap();

        let (proof, commitment) = prove_commitment(&mut rng, &pk, secrets()).unwrap();
        assert!(verify_commitment_proof(&vk, &proof, &[commitment]).unwrap());

        // Same proof, different public commitment.
        let other = commitment + Fr::from(1u64);
        assert!(!verify_commitment_proof(&vk, &proof, &[other]).unwrap());

        // Wrong arity is an error, not a `false`.
        assert!(verify_commitment_proof(&vk, &proof, &[commitment, other]).is_err());

        let vk2 = deserialize_vk(&serialize_vk(&vk).unwrap()).unwrap();
        let proof2 = deserialize_proof(&serialize_proof(&proof).unwrap()).unwrap();
        assert!(verify_commitment_proof(&vk2, &proof2, &[commitment]).unwrap());
    }
}
