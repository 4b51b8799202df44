//! Constants shared by the commitment hasher, the in-circuit gadget and the artifact codecs.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;

/// Number of secret values bound by one commitment: `(a, b, c)`.
pub const SECRET_ARITY: usize = 3;

/// Number of public signals the commitment circuit exposes (the commitment itself).
pub const NUM_PUBLIC_SIGNALS: usize = 1;

/// Field names of the secrets in the proof-input document, in absorption order.
pub const SECRET_FIELD_NAMES: [&str; SECRET_ARITY] = ["a", "b", "c"];

/// Tags written into proof and verification-key documents.
pub const PROOF_PROTOCOL: &str = "groth16";
pub const PROOF_CURVE: &str = "bn254";

// Poseidon sponge configuration.
//
// Width-3 sponge (rate=2, capacity=1). Three secrets are absorbed in order, which costs two
// permutations before the single squeeze.
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;

pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// Poseidon S-box exponent (alpha).
pub const POSEIDON_ALPHA: u64 = 5;

/// Deterministically derive Poseidon parameters for BN254::Fr.
///
/// The native hasher and the circuit gadget both call this, so a commitment computed off-circuit
/// is exactly the value the circuit squeezes.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS as u64,
        POSEIDON_PARTIAL_ROUNDS as u64,
        0,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}
