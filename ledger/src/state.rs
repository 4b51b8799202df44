use crate::events::BroadcastEventSink;
use crate::identity::IdentityRegistry;
use crate::ledger::Ledger;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub identities: Arc<IdentityRegistry>,
    /// Feed for the event stream endpoint; also registered as a sink on `ledger`.
    pub events: BroadcastEventSink,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, identities: IdentityRegistry, events: BroadcastEventSink) -> Self {
        Self {
            ledger,
            identities: Arc::new(identities),
            events,
        }
    }
}
