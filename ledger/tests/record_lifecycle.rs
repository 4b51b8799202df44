mod common;

use common::{node, relayer, reporter, COLLECTION};
use ledger::contract::index_key;
use ledger::db::{self, WORLD_STATE};
use ledger::errors::{ContractError, LedgerError};
use ledger::models::{ClientIdentity, RECORD_VERIFIED_EVENT};
use std::sync::Arc;

#[tokio::test]
async fn created_record_is_readable_and_unique() {
    let node = node().await;
    let ledger = &node.ledger;

    ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();
    let entry = ledger.get_commitment(&reporter(), "R1").await.unwrap();
    assert_eq!(entry.commitment, "12345");

    let err = ledger.create_record(&reporter(), "R1", "mallory", "bafy2", "999").await.unwrap_err();
    assert_eq!(err.contract(), Some(&ContractError::AlreadyExists("R1".into())));
}

#[tokio::test]
async fn duplicate_create_leaves_both_entries_byte_identical() {
    let node = node().await;
    let ledger = &node.ledger;
    ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

    let record_before = db::read_versioned(ledger.db(), COLLECTION, "R1").await.unwrap();
    let index_before = db::read_versioned(ledger.db(), WORLD_STATE, &index_key("R1")).await.unwrap();

    for caller in [reporter(), relayer()] {
        let err = ledger.create_record(&caller, "R1", "bob", "bafy9", "777").await.unwrap_err();
        assert!(matches!(err, LedgerError::Contract(ContractError::AlreadyExists(_))));
    }

    assert_eq!(db::read_versioned(ledger.db(), COLLECTION, "R1").await.unwrap(), record_before);
    assert_eq!(db::read_versioned(ledger.db(), WORLD_STATE, &index_key("R1")).await.unwrap(), index_before);
}

#[tokio::test]
async fn concurrent_creates_of_one_id_yield_one_record() {
    let node = node().await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&node.ledger);
            tokio::spawn(async move {
                ledger
                    .create_record(&reporter(), "R1", &format!("reporter-{i}"), "bafy", &format!("{}", 100 + i))
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await.unwrap() {
            Ok(_) => winners.push(i),
            Err(LedgerError::Contract(ContractError::AlreadyExists(_))) | Err(LedgerError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners.len(), 1);

    let winner = winners[0];
    let record = node.ledger.get_record(&reporter(), "R1").await.unwrap();
    let entry = node.ledger.get_commitment(&reporter(), "R1").await.unwrap();
    assert_eq!(record.reporter, format!("reporter-{winner}"));
    assert_eq!(entry.commitment, format!("{}", 100 + winner));
    assert_eq!(node.ledger.height().await.unwrap(), 1);
}

#[tokio::test]
async fn record_and_index_exist_together_or_not_at_all() {
    let node = node().await;
    let ledger = &node.ledger;

    // Rejected before any write: neither half may appear.
    assert!(ledger.create_record(&reporter(), "R2", "alice", "bafy", "0123").await.is_err());
    ledger.create_record(&reporter(), "R1", "alice", "bafy", "12345").await.unwrap();

    for id in ["R1", "R2", "R3"] {
        let record = ledger.get_record(&reporter(), id).await;
        let entry = ledger.get_commitment(&reporter(), id).await;
        assert_eq!(record.is_ok(), entry.is_ok(), "{id}");
        assert_eq!(ledger.record_exists(&reporter(), id).await.unwrap(), record.is_ok());
    }
}

#[tokio::test]
async fn only_configured_verifiers_can_verify() {
    let node = node().await;
    let ledger = &node.ledger;
    let mut events = node.events.subscribe();
    ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();
    let before = ledger.get_record(&reporter(), "R1").await.unwrap();

    let outsiders = [
        reporter(),
        ClientIdentity::new("AuditMSP", "auditor"),
        // Same certificate subject as the relayer, wrong organization.
        ClientIdentity::new("ReporterMSP", "relayer"),
    ];
    for caller in &outsiders {
        let err = ledger.verify_record(caller, "R1").await.unwrap_err();
        assert!(matches!(err, LedgerError::Contract(ContractError::Unauthorized(_))), "{caller:?}");
    }

    let after = ledger.get_record(&reporter(), "R1").await.unwrap();
    assert_eq!(after, before);
    assert!(!after.verified);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn verifier_flips_record_and_emits_once() {
    let node = node().await;
    let ledger = &node.ledger;
    let mut events = node.events.subscribe();
    ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

    let verified = ledger.verify_record(&relayer(), "R1").await.unwrap();
    assert!(verified.verified);
    assert_eq!(verified.verified_by, "relayer");
    assert!(verified.verified_at.is_some());

    // A second call changes nothing and emits nothing.
    let again = ledger.verify_record(&relayer(), "R1").await.unwrap();
    assert_eq!(again, verified);
    assert_eq!(ledger.get_record(&relayer(), "R1").await.unwrap(), verified);

    let event = events.try_recv().unwrap();
    assert_eq!(event.name, RECORD_VERIFIED_EVENT);
    assert_eq!(event.payload, serde_json::json!({"id": "R1", "commitment": "12345"}));
    assert!(events.try_recv().is_err());
    assert_eq!(ledger.height().await.unwrap(), 2);
}

#[tokio::test]
async fn verification_never_goes_backwards() {
    let node = node().await;
    node.ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();
    let mut events = node.events.subscribe();

    let mut writers = Vec::new();
    for _ in 0..4 {
        let ledger = Arc::clone(&node.ledger);
        writers.push(tokio::spawn(async move {
            // Lost MVCC races are fine; the record only has to end up verified.
            let _ = ledger.verify_record(&relayer(), "R1").await;
        }));
    }

    let reader = {
        let ledger = Arc::clone(&node.ledger);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..20 {
                seen.push(ledger.get_record(&reporter(), "R1").await.unwrap().verified);
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    for w in writers {
        w.await.unwrap();
    }
    let seen = reader.await.unwrap();
    if let Some(first_true) = seen.iter().position(|v| *v) {
        assert!(seen[first_true..].iter().all(|v| *v), "{seen:?}");
    }

    assert!(node.ledger.get_record(&reporter(), "R1").await.unwrap().verified);
    assert!(events.try_recv().is_ok());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn private_records_stay_inside_the_collection() {
    let node = node().await;
    node.ledger.create_record(&reporter(), "R1", "alice", "bafy1", "12345").await.unwrap();

    let outsider = ClientIdentity::new("OtherMSP", "someone");
    let err = node.ledger.get_record(&outsider, "R1").await.unwrap_err();
    assert!(matches!(err, LedgerError::AccessDenied { .. }));

    // The public index is not private.
    assert_eq!(node.ledger.get_commitment(&outsider, "R1").await.unwrap().commitment, "12345");
}
