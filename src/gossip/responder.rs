//! SummaryResponder: answers inbound summaries with the parts their
//! sender is missing.

use crate::agent::Fleet;
use crate::bus::EventBus;
use crate::concurrency::CancelToken;
use crate::error::GossipError;
use crate::gossip::{decode_summary, encode_update, UpdateMessage};
use crate::types::{AgentId, Event, EventKind, WorkerOutcome};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[instrument(skip(fleet, bus, token), fields(agent = %self_id))]
pub async fn run_summary_responder(
    self_id: AgentId,
    fleet: Arc<Fleet>,
    bus: EventBus,
    token: CancelToken,
) -> WorkerOutcome {
    let Some(agent) = fleet.get(self_id) else {
        return WorkerOutcome::Failed(GossipError::AgentNotFound(self_id.0));
    };

    loop {
        let bytes = tokio::select! {
            _ = token.cancelled() => return WorkerOutcome::Done,
            received = agent.recv_summary() => match received {
                Some(bytes) => bytes,
                None => return WorkerOutcome::Done,
            },
        };

        let summary = match decode_summary(&bytes) {
            Ok(s) => s,
            Err(err) => {
                debug!(error = %err, "dropping malformed summary");
                continue;
            }
        };

        let Some(peer) = fleet.get(summary.sender_id) else {
            warn!(sender = %summary.sender_id, "summary from out-of-range sender, dropping");
            continue;
        };

        let missing = agent.parts_missing_from(&summary.indexes).await;
        if missing.is_empty() {
            continue;
        }

        let update = UpdateMessage { parts: missing };
        let Ok(encoded) = encode_update(&update) else {
            continue;
        };

        if peer.update_sender().try_send(encoded).is_ok() {
            bus.publish(Event::new(EventKind::MessageReceived {
                receiver: summary.sender_id,
            }));
        } else {
            debug!(receiver = %summary.sender_id, "update inbox full, dropping response");
        }
    }
}
