//! Ledger host: runs contract invocations as ordered, atomic transactions.
//!
//! Each submission is simulated against committed state, then committed in one SQLite
//! transaction that (1) takes the next block height, (2) re-validates every version the
//! simulation read, (3) applies the buffered writes and (4) logs the transaction. Events go to
//! the sinks only after that commit succeeds.

use crate::authz::CollectionPolicy;
use crate::contract::RecordContract;
use crate::db::{self, Db};
use crate::errors::LedgerError;
use crate::events::EventSink;
use crate::models::{ClientIdentity, CommitmentIndexEntry, ConfidentialRecord, LedgerEvent};
use crate::stub::TxContext;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a committed transaction.
#[derive(Clone, Debug)]
pub struct Committed {
    pub tx_id: uuid::Uuid,
    /// `None` when the invocation wrote nothing and was not ordered into a block.
    pub height: Option<u64>,
}

pub struct Ledger {
    db: Db,
    contract: RecordContract,
    collection: CollectionPolicy,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Ledger {
    pub fn new(db: Db, contract: RecordContract, collection: CollectionPolicy, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            db,
            contract,
            collection,
            sinks,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub async fn create_record(
        &self,
        caller: &ClientIdentity,
        id: &str,
        reporter: &str,
        evidence_ref: &str,
        commitment: &str,
    ) -> Result<ConfidentialRecord, LedgerError> {
        let mut ctx = self.begin("createRecord", caller);
        let record = self
            .contract
            .create_record(&mut ctx, id, reporter, evidence_ref, commitment)
            .await
            .inspect_err(|e| rejected(&ctx, e))?;
        self.commit(ctx).await?;
        Ok(record)
    }

    pub async fn verify_record(&self, caller: &ClientIdentity, id: &str) -> Result<ConfidentialRecord, LedgerError> {
        let mut ctx = self.begin("verifyRecord", caller);
        let record = self
            .contract
            .verify_record(&mut ctx, id)
            .await
            .inspect_err(|e| rejected(&ctx, e))?;
        self.commit(ctx).await?;
        Ok(record)
    }

    /// Read a confidential record. Only members of the private collection get past the host.
    pub async fn get_record(&self, caller: &ClientIdentity, id: &str) -> Result<ConfidentialRecord, LedgerError> {
        self.require_member(caller)?;
        let mut ctx = self.begin("getRecord", caller);
        self.contract.get_record(&mut ctx, id).await
    }

    pub async fn get_commitment(&self, caller: &ClientIdentity, id: &str) -> Result<CommitmentIndexEntry, LedgerError> {
        let mut ctx = self.begin("getCommitment", caller);
        self.contract.get_commitment(&mut ctx, id).await
    }

    pub async fn record_exists(&self, caller: &ClientIdentity, id: &str) -> Result<bool, LedgerError> {
        let mut ctx = self.begin("recordExists", caller);
        self.contract.record_exists(&mut ctx, id).await
    }

    pub async fn height(&self) -> Result<u64, LedgerError> {
        db::chain_height(&self.db).await
    }

    fn begin(&self, function: &'static str, caller: &ClientIdentity) -> TxContext {
        TxContext::new(self.db.clone(), function, caller.clone())
    }

    fn require_member(&self, caller: &ClientIdentity) -> Result<(), LedgerError> {
        if self.collection.is_member(caller) {
            return Ok(());
        }
        warn!(msp_id = %caller.msp_id, collection = %self.collection.name, "private data read denied");
        Err(LedgerError::AccessDenied {
            msp_id: caller.msp_id.clone(),
            collection: self.collection.name.clone(),
        })
    }

    pub(crate) async fn commit(&self, ctx: TxContext) -> Result<Committed, LedgerError> {
        if ctx.is_read_only() {
            debug!(tx_id = %ctx.tx_id, function = ctx.function, "read-only invocation, nothing to order");
            return Ok(Committed { tx_id: ctx.tx_id, height: None });
        }

        let mut tx = self.db.begin().await?;
        let height = db::bump_height(&mut tx).await?;

        for (key, seen) in &ctx.read_set {
            let now = db::current_version(&mut tx, &key.ns, &key.key).await?;
            if now != *seen {
                warn!(tx_id = %ctx.tx_id, ns = %key.ns, key = %key.key, "mvcc read conflict");
                return Err(LedgerError::Conflict(format!("{}/{}", key.ns, key.key)));
            }
        }

        for (key, value) in &ctx.write_set {
            match ctx.read_set.get(key) {
                Some(Some(version)) => db::update_value(&mut tx, &key.ns, &key.key, value, *version).await?,
                _ => db::insert_value(&mut tx, &key.ns, &key.key, value).await?,
            }
        }

        db::insert_transaction(
            &mut tx,
            ctx.tx_id,
            height,
            ctx.function,
            &ctx.creator.msp_id,
            &ctx.creator.id,
            ctx.timestamp,
        )
        .await?;

        tx.commit().await?;

        info!(
            tx_id = %ctx.tx_id,
            height,
            function = ctx.function,
            msp_id = %ctx.creator.msp_id,
            writes = ctx.write_set.len(),
            "transaction committed"
        );

        if let Some(pending) = ctx.event {
            let event = LedgerEvent {
                name: pending.name,
                tx_id: ctx.tx_id,
                height,
                payload: pending.payload,
            };
            for sink in &self.sinks {
                if let Err(e) = sink.publish(&event) {
                    warn!(tx_id = %ctx.tx_id, error = %e, "event delivery failed; commit stands");
                }
            }
        }

        Ok(Committed {
            tx_id: ctx.tx_id,
            height: Some(height),
        })
    }
}

fn rejected(ctx: &TxContext, e: &LedgerError) {
    info!(tx_id = %ctx.tx_id, function = ctx.function, msp_id = %ctx.creator.msp_id, error = %e, "invocation rejected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::VerifierPolicy;
    use crate::contract::index_key;
    use crate::db::WORLD_STATE;
    use crate::errors::ContractError;
    use crate::events::{BroadcastEventSink, SinkError};
    use crate::models::RECORD_VERIFIED_EVENT;

    const COLLECTION: &str = "collectionRecords";

    fn reporter() -> ClientIdentity {
        ClientIdentity::new("ReporterMSP", "reporter-1")
    }

    fn relayer() -> ClientIdentity {
        ClientIdentity::new("RelayerMSP", "relayer")
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn publish(&self, _event: &LedgerEvent) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("down".into()))
        }
    }

    async fn ledger_with(sinks: Vec<Arc<dyn EventSink>>) -> Ledger {
        let db = db::memory_db().await;
        let contract = RecordContract::new(COLLECTION, VerifierPolicy::new(["RelayerMSP"]));
        let collection = CollectionPolicy::new(COLLECTION, ["ReporterMSP", "RelayerMSP"]);
        Ledger::new(db, contract, collection, sinks)
    }

    #[tokio::test]
    async fn create_writes_record_and_index_in_one_block() {
        let ledger = ledger_with(vec![]).await;

        let rec = ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();
        assert!(!rec.verified);
        assert_eq!(ledger.height().await.unwrap(), 1);

        let got = ledger.get_record(&reporter(), "R1").await.unwrap();
        assert_eq!(got, rec);
        assert_eq!(ledger.get_commitment(&reporter(), "R1").await.unwrap().commitment, "12345");
    }

    #[tokio::test]
    async fn rejected_create_does_not_consume_a_block() {
        let ledger = ledger_with(vec![]).await;
        ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

        let err = ledger.create_record(&reporter(), "R1", "mallory", "bafy2", "999").await.unwrap_err();
        assert_eq!(err.contract(), Some(&ContractError::AlreadyExists("R1".into())));
        assert_eq!(ledger.height().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn malformed_create_is_rejected() {
        let ledger = ledger_with(vec![]).await;

        for (id, commitment) in [("", "1"), ("R1", "0x1f"), ("R1", ""), ("R1", "007")] {
            let err = ledger.create_record(&reporter(), id, "alice", "bafy", commitment).await.unwrap_err();
            assert!(matches!(err.contract(), Some(ContractError::MalformedInput(_))), "{id:?} {commitment:?}");
        }
        assert!(!ledger.record_exists(&reporter(), "R1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_creation_is_caught_at_commit() {
        let ledger = ledger_with(vec![]).await;
        let contract = RecordContract::new(COLLECTION, VerifierPolicy::new(["RelayerMSP"]));

        // Both simulations see an absent key.
        let mut first = ledger.begin("createRecord", &reporter());
        let mut second = ledger.begin("createRecord", &reporter());
        contract.create_record(&mut first, "R1", "alice", "bafy1", "1").await.unwrap();
        contract.create_record(&mut second, "R1", "bob", "bafy2", "2").await.unwrap();

        ledger.commit(first).await.unwrap();
        let err = ledger.commit(second).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        let rec = ledger.get_record(&reporter(), "R1").await.unwrap();
        assert_eq!(rec.reporter, "alice");
        assert_eq!(ledger.get_commitment(&reporter(), "R1").await.unwrap().commitment, "1");
        assert_eq!(ledger.height().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_verification_is_caught_at_commit() {
        let sink = BroadcastEventSink::new(8);
        let mut events = sink.subscribe();
        let ledger = ledger_with(vec![Arc::new(sink)]).await;
        let contract = RecordContract::new(COLLECTION, VerifierPolicy::new(["RelayerMSP"]));
        ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

        let mut first = ledger.begin("verifyRecord", &relayer());
        let mut second = ledger.begin("verifyRecord", &relayer());
        contract.verify_record(&mut first, "R1").await.unwrap();
        contract.verify_record(&mut second, "R1").await.unwrap();

        ledger.commit(first).await.unwrap();
        assert!(matches!(ledger.commit(second).await, Err(LedgerError::Conflict(_))));

        assert_eq!(events.recv().await.unwrap().name, RECORD_VERIFIED_EVENT);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_members_cannot_read_private_data() {
        let ledger = ledger_with(vec![]).await;
        ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

        let outsider = ClientIdentity::new("PublicMSP", "observer");
        let err = ledger.get_record(&outsider, "R1").await.unwrap_err();
        assert!(matches!(err, LedgerError::AccessDenied { .. }));

        // The public index stays readable.
        assert_eq!(ledger.get_commitment(&outsider, "R1").await.unwrap().commitment, "12345");
    }

    #[tokio::test]
    async fn failing_sink_does_not_roll_back() {
        let sink = BroadcastEventSink::new(8);
        let mut events = sink.subscribe();
        let ledger = ledger_with(vec![Arc::new(FailingSink), Arc::new(sink)]).await;
        ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

        let rec = ledger.verify_record(&relayer(), "R1").await.unwrap();
        assert!(rec.verified);
        assert!(ledger.get_record(&relayer(), "R1").await.unwrap().verified);

        // Delivery continues to the remaining sinks.
        let event = events.recv().await.unwrap();
        assert_eq!(event.height, 2);
        assert_eq!(event.payload, serde_json::json!({"id": "R1", "commitment": "12345"}));
    }

    #[tokio::test]
    async fn index_entry_without_record_is_never_overwritten() {
        let ledger = ledger_with(vec![]).await;

        // Plant a stray index key directly; creation must refuse to clobber it.
        let mut conn = ledger.db().acquire().await.unwrap();
        db::insert_value(&mut conn, WORLD_STATE, &index_key("R9"), br#"{"id":"R9","commitment":"1"}"#)
            .await
            .unwrap();
        drop(conn);

        let err = ledger.create_record(&reporter(), "R9", "alice", "bafy", "2").await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(!ledger.record_exists(&reporter(), "R9").await.unwrap());
    }
}
