//! Runtime configuration, read from the environment with local-network defaults.

use crate::retry::RetryConfig;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Ledger node configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub db_url: String,
    pub max_connections: u32,
    pub listen_addr: String,

    /// Channel and contract name; together they form the gateway's route prefix.
    pub channel: String,
    pub contract: String,

    pub collection: String,
    pub collection_members: BTreeSet<String>,

    /// Organizations allowed to run the verification transition.
    pub verifiers: BTreeSet<String>,

    /// JSON file mapping client credentials to identities.
    pub identities_path: PathBuf,
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(lookup);
        Self {
            db_url: env.or("LEDGER_DB_URL", "sqlite:data/ledger.sqlite?mode=rwc"),
            max_connections: env.parse("LEDGER_DB_MAX_CONNECTIONS", 5),
            listen_addr: env.or("LEDGER_ADDR", "127.0.0.1:7051"),
            channel: env.or("LEDGER_CHANNEL", "mychannel"),
            contract: env.or("LEDGER_CONTRACT", "recordcc"),
            collection: env.or("PRIVATE_COLLECTION", "collectionRecords"),
            collection_members: env.set("COLLECTION_MEMBERS", "ReporterMSP,RelayerMSP"),
            verifiers: env.set("AUTHORIZED_VERIFIERS", "RelayerMSP"),
            identities_path: PathBuf::from(env.or("IDENTITIES_PATH", "identities.json")),
        }
    }
}

/// Verification relayer configuration.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub ledger_url: String,
    pub channel: String,
    pub contract: String,

    pub wallet_path: PathBuf,
    /// Label of the relayer's identity inside the wallet.
    pub identity_label: String,

    pub proof_file: PathBuf,
    pub public_file: PathBuf,
    pub vkey_file: PathBuf,
    pub record_id: Option<String>,

    /// Upper bound on any single ledger call.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl RelayerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(lookup);
        Self {
            ledger_url: env.or("LEDGER_URL", "http://127.0.0.1:7051"),
            channel: env.or("LEDGER_CHANNEL", "mychannel"),
            contract: env.or("LEDGER_CONTRACT", "recordcc"),
            wallet_path: PathBuf::from(env.or("WALLET_PATH", "wallet")),
            identity_label: env.or("RELAYER_ID", "relayer"),
            proof_file: PathBuf::from(env.or("PROOF_FILE", "circuit/build/proof.json")),
            public_file: PathBuf::from(env.or("PUBLIC_FILE", "circuit/build/public.json")),
            vkey_file: PathBuf::from(env.or("VKEY_FILE", "circuit/build/verification_key.json")),
            record_id: (env.0)("RECORD_ID").filter(|s| !s.is_empty()),
            timeout: Duration::from_millis(env.parse("LEDGER_TIMEOUT_MS", 10_000)),
            retry: RetryConfig::external_service().with_max_retries(env.parse("RELAYER_MAX_RETRIES", 3)),
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn or(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.0)(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn set(&self, key: &str, default: &str) -> BTreeSet<String> {
        parse_set(&self.or(key, default))
    }
}

/// Comma-separated list to set; blanks are dropped.
pub fn parse_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
