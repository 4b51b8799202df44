//! R1CS circuit for proving knowledge of a commitment preimage.
//!
//! What this circuit proves:
//! 1) The prover knows secret values `(a, b, c)`.
//! 2) The public commitment `C` equals Poseidon(a, b, c), absorbed in that order.
//!
//! Privacy: the secrets are witnesses (never public). Only `C` is a public input.

use crate::constants::{poseidon_config, SECRET_ARITY};
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Circuit binding private secrets to a public Poseidon commitment.
#[derive(Clone, Debug)]
pub struct CommitmentCircuit {
    /// Private secrets, in absorption order.
    pub secrets: [Fr; SECRET_ARITY],

    /// Public commitment.
    pub commitment: Fr,
}

impl ConstraintSynthesizer<Fr> for CommitmentCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public input ordering MUST match `PublicSignals::to_field_elems`: commitment only.
        let public_commitment = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.commitment))?;

        let mut secret_vars = Vec::with_capacity(SECRET_ARITY);
        for s in self.secrets {
            secret_vars.push(FpVar::<Fr>::new_witness(cs.clone(), || Ok(s))?);
        }

        let cfg = poseidon_config();
        let mut sponge = PoseidonSpongeVar::<Fr>::new(cs.clone(), &cfg);
        for v in &secret_vars {
            sponge.absorb(v)?;
        }

        let computed = sponge.squeeze_field_elements(1)?[0].clone();
        computed.enforce_equal(&public_commitment)?;

        Ok(())
    }
}
