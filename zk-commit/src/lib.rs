//! ZK layer for the confidential record ledger.
//!
//! This crate contains:
//! - The Poseidon commitment over a report's secret values and the generator that writes the
//!   circuit input document.
//! - A Groth16 circuit proving knowledge of a commitment's preimage, with setup/prove/verify.
//! - The pinned document encodings (`proof.json`, `public.json`, `verification_key.json`).

pub mod circuit;
pub mod constants;
pub mod error;
pub mod generator;
pub mod groth16;
pub mod types;

pub use error::ZkError;
