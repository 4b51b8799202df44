//! One-shot verification relayer: verifies the proof artifacts locally and, if they hold for the
//! record's published commitment, submits the verification under the relayer's own identity.
//!
//! The record id comes from the first argument or `RECORD_ID`.

use ledger::client::HttpLedgerClient;
use ledger::config::RelayerConfig;
use ledger::errors::RelayerError;
use ledger::identity::Wallet;
use ledger::models::ConfidentialRecord;
use ledger::relayer::{Relayer, VerificationArtifacts};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = RelayerConfig::from_env();
    if let Some(id) = std::env::args().nth(1) {
        config.record_id = Some(id);
    }

    match run(&config).await {
        Ok(record) => match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot render verified record");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "verification not submitted");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &RelayerConfig) -> Result<ConfidentialRecord, RelayerError> {
    let id = config
        .record_id
        .as_deref()
        .ok_or_else(|| RelayerError::MalformedInput("no record id: pass one or set RECORD_ID".into()))?;

    let enrollment = Wallet::open(&config.wallet_path)
        .get(&config.identity_label)
        .map_err(|e| RelayerError::Credential(e.to_string()))?;
    tracing::info!(label = %config.identity_label, msp_id = %enrollment.msp_id, "relayer identity loaded");

    let artifacts = VerificationArtifacts::load(&config.proof_file, &config.public_file, &config.vkey_file)?;

    let client = HttpLedgerClient::new(&config.ledger_url, &config.channel, &config.contract, &enrollment, config.timeout)?;
    let relayer = Relayer::new(client, config.retry.clone());

    relayer
        .verify_and_submit(&artifacts.proof, &artifacts.public_signals, &artifacts.verification_key, id)
        .await
}
