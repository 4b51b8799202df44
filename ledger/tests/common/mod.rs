#![allow(dead_code)]

use ark_bn254::Fr;
use ledger::api;
use ledger::authz::{CollectionPolicy, VerifierPolicy};
use ledger::contract::RecordContract;
use ledger::db;
use ledger::events::{BroadcastEventSink, EventSink};
use ledger::identity::{Enrollment, IdentityRegistry};
use ledger::ledger::Ledger;
use ledger::models::ClientIdentity;
use ledger::state::AppState;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use zk_commit::groth16::{prove_commitment, setup_keys};
use zk_commit::types::{fr_to_decimal, ProofDocument, PublicSignals, VerificationKeyDocument};

pub const COLLECTION: &str = "collectionRecords";
pub const CHANNEL: &str = "mychannel";
pub const CONTRACT: &str = "recordcc";

pub fn reporter_enrollment() -> Enrollment {
    Enrollment { msp_id: "ReporterMSP".into(), id: "reporter".into(), credential: "r-secret".into() }
}

pub fn relayer_enrollment() -> Enrollment {
    Enrollment { msp_id: "RelayerMSP".into(), id: "relayer".into(), credential: "v-secret".into() }
}

pub fn reporter() -> ClientIdentity {
    reporter_enrollment().identity()
}

pub fn relayer() -> ClientIdentity {
    relayer_enrollment().identity()
}

pub struct Node {
    pub ledger: Arc<Ledger>,
    pub events: BroadcastEventSink,
}

/// A ledger over a private in-memory database; `RelayerMSP` is the only verifier.
pub async fn node() -> Node {
    // One connection: each connection to `:memory:` is a separate database.
    let db = db::connect("sqlite::memory:", 1).await.unwrap();
    db::init_schema(&db).await.unwrap();

    let events = BroadcastEventSink::new(64);
    let ledger = Ledger::new(
        db,
        RecordContract::new(COLLECTION, VerifierPolicy::new(["RelayerMSP"])),
        CollectionPolicy::new(COLLECTION, ["ReporterMSP", "RelayerMSP", "AuditMSP"]),
        vec![Arc::new(events.clone()) as Arc<dyn EventSink>],
    );
    Node { ledger: Arc::new(ledger), events }
}

impl Node {
    /// Serve the gateway on an ephemeral local port.
    pub async fn serve(&self) -> SocketAddr {
        let identities = IdentityRegistry::from_enrollments(vec![reporter_enrollment(), relayer_enrollment()]).unwrap();
        let state = AppState::new(self.ledger.clone(), identities, self.events.clone());
        let app = api::router(state, CHANNEL, CONTRACT);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

pub struct ProofFixture {
    pub proof: ProofDocument,
    pub public: PublicSignals,
    pub vk: VerificationKeyDocument,
    pub commitment: String,
}

/// A valid proof for secrets (123, 456, 789). Setup is slow, so it runs once per test binary.
pub fn proof_fixture() -> &'static ProofFixture {
    static FIXTURE: OnceLock<ProofFixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let mut rng = ChaCha20Rng::seed_from_u64(2024);
        let (pk, vk) = setup_keys(&mut rng).unwrap();
        let secrets = [Fr::from(123u64), Fr::from(456u64), Fr::from(789u64)];
        let (proof, commitment) = prove_commitment(&mut rng, &pk, secrets).unwrap();
        ProofFixture {
            proof: ProofDocument::from_proof(&proof).unwrap(),
            public: PublicSignals::from_commitment(&commitment),
            vk: VerificationKeyDocument::from_vk(&vk).unwrap(),
            commitment: fr_to_decimal(&commitment),
        }
    })
}
