//! Per-transaction view of the ledger handed to contract code.
//!
//! Reads see committed state only (not the transaction's own pending writes) and record the
//! version they observed. Writes and the event are buffered; nothing touches storage until the
//! host commits the transaction.

use crate::db::{self, Db, WORLD_STATE};
use crate::errors::LedgerError;
use crate::models::ClientIdentity;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateKey {
    pub ns: String,
    pub key: String,
}

impl StateKey {
    fn new(ns: &str, key: &str) -> Self {
        Self { ns: ns.to_string(), key: key.to_string() }
    }
}

/// Event set by the contract, published only after commit.
#[derive(Clone, Debug)]
pub struct PendingEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

pub struct TxContext {
    pub(crate) tx_id: Uuid,
    pub(crate) function: &'static str,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) creator: ClientIdentity,
    db: Db,

    /// Version observed for every key read; `None` means the key was absent.
    pub(crate) read_set: BTreeMap<StateKey, Option<i64>>,
    pub(crate) write_set: BTreeMap<StateKey, Vec<u8>>,
    pub(crate) event: Option<PendingEvent>,
}

impl TxContext {
    pub(crate) fn new(db: Db, function: &'static str, creator: ClientIdentity) -> Self {
        Self {
            tx_id: Uuid::new_v4(),
            function,
            timestamp: Utc::now(),
            creator,
            db,
            read_set: BTreeMap::new(),
            write_set: BTreeMap::new(),
            event: None,
        }
    }

    pub fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    /// Transaction timestamp, fixed when the proposal was accepted.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn creator(&self) -> &ClientIdentity {
        &self.creator
    }

    pub async fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.read(WORLD_STATE, key).await
    }

    pub fn put_state(&mut self, key: &str, value: Vec<u8>) {
        self.write_set.insert(StateKey::new(WORLD_STATE, key), value);
    }

    pub async fn get_private_data(&mut self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.read(collection, key).await
    }

    pub fn put_private_data(&mut self, collection: &str, key: &str, value: Vec<u8>) {
        self.write_set.insert(StateKey::new(collection, key), value);
    }

    /// Set the transaction's event. A later call replaces an earlier one.
    pub fn set_event(&mut self, name: &str, payload: serde_json::Value) {
        self.event = Some(PendingEvent { name: name.to_string(), payload });
    }

    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty() && self.event.is_none()
    }

    async fn read(&mut self, ns: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let found = db::read_versioned(&self.db, ns, key).await?;
        let sk = StateKey::new(ns, key);

        // Keep the first observed version; a key that moved between two reads is caught at commit.
        self.read_set.entry(sk).or_insert(found.as_ref().map(|(_, v)| *v));

        Ok(found.map(|(value, _)| value))
    }
}
