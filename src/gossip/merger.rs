//! UpdateMerger: applies inbound parts to local state. Each merge is
//! wrapped in its own panic barrier so a conflict is reported on the event
//! bus before the panic is re-raised for the Supervisor to observe.

use crate::agent::Fleet;
use crate::bus::EventBus;
use crate::concurrency::CancelToken;
use crate::error::GossipError;
use crate::gossip::decode_update;
use crate::types::{AgentId, Event, EventKind, WorkerOutcome};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, instrument};

#[instrument(skip(fleet, bus, token), fields(agent = %self_id))]
pub async fn run_update_merger(
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
            received = agent.recv_update() => match received {
                Some(bytes) => bytes,
                None => return WorkerOutcome::Done,
            },
        };

        let update = match decode_update(&bytes) {
            Ok(u) => u,
            Err(err) => {
                debug!(error = %err, "dropping malformed update");
                continue;
            }
        };

        for part in update.parts {
            let outcome = AssertUnwindSafe(agent.merge_secret_part(part)).catch_unwind().await;
            if let Err(panic) = outcome {
                bus.publish(Event::new(EventKind::InvariantViolation { agent: self_id }));
                std::panic::resume_unwind(panic);
            }
        }
    }
}
