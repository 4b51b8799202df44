use ledger::api;
use ledger::authz::{CollectionPolicy, VerifierPolicy};
use ledger::config::LedgerConfig;
use ledger::contract::RecordContract;
use ledger::db;
use ledger::events::{BroadcastEventSink, EventSink, TracingEventSink};
use ledger::identity::IdentityRegistry;
use ledger::ledger::Ledger;
use ledger::state::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LedgerConfig::from_env();

    // Local state lives under data/ (ignored by git).
    if let Some(dir) = sqlite_parent_dir(&config.db_url) {
        std::fs::create_dir_all(dir)?;
    }

    let db = db::connect(&config.db_url, config.max_connections).await?;
    db::init_schema(&db).await?;

    let identities = IdentityRegistry::load(&config.identities_path)?;
    tracing::info!(path = %config.identities_path.display(), count = identities.len(), "identities loaded");

    let events = BroadcastEventSink::new(256);
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(events.clone()), Arc::new(TracingEventSink)];

    let contract = RecordContract::new(&config.collection, VerifierPolicy::new(config.verifiers.iter().cloned()));
    let collection = CollectionPolicy::new(&config.collection, config.collection_members.iter().cloned());
    let ledger = Ledger::new(db, contract, collection, sinks);
    tracing::info!(height = ledger.height().await?, "ledger opened");

    let state = AppState::new(Arc::new(ledger), identities, events);
    let app = api::router(state, &config.channel, &config.contract);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;

    tracing::info!(
        addr = %config.listen_addr,
        channel = %config.channel,
        contract = %config.contract,
        "ledger node listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("ledger node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Directory holding a file-backed SQLite database, if the URL names one.
fn sqlite_parent_dir(db_url: &str) -> Option<&std::path::Path> {
    let path = db_url.strip_prefix("sqlite:")?.split('?').next()?.trim_start_matches("//");
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    std::path::Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}
