//! Off-ledger proof tooling: commitment generation, trusted setup and proving.

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zk_commit::generator::{self, write_atomically, DEFAULT_INPUT_PATH};
use zk_commit::groth16::{deserialize_pk, prove_commitment, serialize_pk, setup_keys};
use zk_commit::types::{ProofDocument, ProofInput, PublicSignals, VerificationKeyDocument};
use zk_commit::ZkError;

#[derive(Parser)]
#[command(name = "zkcommit", about = "Commitment and proof tooling for confidential records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hash three secret values (default 123 456 789) and write the circuit input document.
    Input {
        #[arg(default_value = "123")]
        a: String,
        #[arg(default_value = "456")]
        b: String,
        #[arg(default_value = "789")]
        c: String,
        #[arg(long, default_value = DEFAULT_INPUT_PATH)]
        out: PathBuf,
    },
    /// Run a local Groth16 setup and write proving_key.bin + verification_key.json.
    Setup {
        #[arg(long, default_value = "circuit/build")]
        out_dir: PathBuf,
        /// Deterministic seed (testing only); OS randomness otherwise.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Prove knowledge of the secrets in an input document; writes proof.json + public.json.
    Prove {
        #[arg(long, default_value = DEFAULT_INPUT_PATH)]
        input: PathBuf,
        #[arg(long, default_value = "circuit/build/proving_key.bin")]
        pk: PathBuf,
        #[arg(long, default_value = "circuit/build")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<(), ZkError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Input { a, b, c, out } => {
            let input = generator::generate([a.as_str(), b.as_str(), c.as_str()], &out)?;
            println!("{}", input.commitment);
        }
        Command::Setup { out_dir, seed } => {
            let (pk, vk) = match seed {
                Some(seed) => setup_keys(&mut ChaCha20Rng::seed_from_u64(seed))?,
                None => setup_keys(&mut rand::rngs::OsRng)?,
            };
            std::fs::create_dir_all(&out_dir)?;
            write_atomically(&out_dir.join("proving_key.bin"), &serialize_pk(&pk)?)?;
            write_json(&out_dir.join("verification_key.json"), &VerificationKeyDocument::from_vk(&vk)?)?;
            info!(dir = %out_dir.display(), "wrote groth16 keys");
        }
        Command::Prove { input, pk, out_dir } => {
            let raw = std::fs::read(&input)?;
            let doc: ProofInput =
                serde_json::from_slice(&raw).map_err(|e| ZkError::malformed(format!("{}: {e}", input.display())))?;
            let pk = deserialize_pk(&std::fs::read(&pk)?)?;

            let (proof, commitment) = prove_commitment(&mut rand::rngs::OsRng, &pk, doc.secrets()?)?;
            if commitment != doc.commitment()? {
                return Err(ZkError::malformed("input commitment does not match its secrets"));
            }

            std::fs::create_dir_all(&out_dir)?;
            write_json(&out_dir.join("proof.json"), &ProofDocument::from_proof(&proof)?)?;
            write_json(&out_dir.join("public.json"), &PublicSignals::from_commitment(&commitment))?;
            info!(dir = %out_dir.display(), commitment = %doc.commitment, "wrote proof");
        }
    }

    Ok(())
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<(), ZkError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| ZkError::Serialization(format!("{e}")))?;
    write_atomically(path, &bytes)
}
