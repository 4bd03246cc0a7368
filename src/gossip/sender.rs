//! SummarySender: periodically advertises what this agent holds to a
//! random peer, under the fault-injecting transport.

use crate::agent::Fleet;
use crate::bus::EventBus;
use crate::concurrency::CancelToken;
use crate::error::GossipError;
use crate::gossip::transport::{FaultInjector, SendPlan};
use crate::gossip::{encode_summary, SummaryMessage};
use crate::types::{AgentId, Event, EventKind, WorkerOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{instrument, trace};

#[instrument(skip(fleet, bus, fault, token), fields(agent = %self_id))]
pub async fn run_summary_sender(
    self_id: AgentId,
    fleet: Arc<Fleet>,
    bus: EventBus,
    gossip_time: Duration,
    max_attempts: u32,
    fault: FaultInjector,
    token: CancelToken,
) -> WorkerOutcome {
    let Some(agent) = fleet.get(self_id) else {
        return WorkerOutcome::Failed(GossipError::AgentNotFound(self_id.0));
    };

    let mut ticker = tokio::time::interval(gossip_time);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => return WorkerOutcome::Done,
            _ = ticker.tick() => {}
        }

        let peer_id = fleet.random_peer_excluding(self_id);
        let Some(peer) = fleet.get(peer_id) else {
            continue;
        };

        let indexes = agent.indexes().await;
        let message = SummaryMessage {
            sender_id: self_id,
            indexes,
        };
        let Ok(bytes) = encode_summary(&message) else {
            continue;
        };

        for _ in 0..max_attempts {
            if token.is_cancelled() {
                return WorkerOutcome::Done;
            }
            match fault.plan() {
                SendPlan::Dropped => {
                    bus.publish(Event::new(EventKind::MessageLost));
                }
                SendPlan::Single => {
                    offer(&peer.summary_sender(), &bytes, self_id, &bus);
                }
                SendPlan::Duplicated(extra) => {
                    bus.publish(Event::new(EventKind::MessageDuplicated));
                    for _ in 0..=extra {
                        offer(&peer.summary_sender(), &bytes, self_id, &bus);
                    }
                }
            }
        }
    }
}

fn offer(tx: &Sender<Vec<u8>>, bytes: &[u8], sender: AgentId, bus: &EventBus) {
    if tx.try_send(bytes.to_vec()).is_ok() {
        bus.publish(Event::new(EventKind::MessageSent { sender }));
    } else {
        trace!(%sender, "summary inbox full, dropping send");
    }
}
