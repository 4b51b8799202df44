//! Outbound port for committed contract events.
//!
//! Publishing happens after the state change has committed. A sink that fails is logged by the
//! host and never undoes the commit.

use crate::models::LedgerEvent;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError>;
}

/// Fan-out to in-process subscribers (the SSE endpoint, tests).
#[derive(Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<LedgerEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError> {
        // Having no subscriber right now is not a failure.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Emits every event as a structured log line.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &LedgerEvent) -> Result<(), SinkError> {
        info!(
            event = %event.name,
            tx_id = %event.tx_id,
            height = event.height,
            payload = %event.payload,
            "contract event"
        );
        Ok(())
    }
}
