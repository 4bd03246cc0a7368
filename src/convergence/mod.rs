//! Per-agent quiescence + completion detection and the single-winner
//! election.

use crate::agent::Fleet;
use crate::bus::EventBus;
use crate::concurrency::CancelToken;
use crate::error::GossipError;
use crate::output::OutputSink;
use crate::types::{is_quiet_since, AgentId, Event, EventKind, WorkerOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

/// The process-wide once-barrier: first caller to reach completion and
/// quiescence wins, writes to the sink, and emits `WinnerElected`; every
/// later caller is a no-op.
pub struct Election {
    winner: OnceCell<AgentId>,
    sink: Arc<dyn OutputSink>,
}

impl Election {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            winner: OnceCell::new(),
            sink,
        }
    }

    /// Attempt to win on behalf of `agent`. Returns `true` iff this call
    /// performed the write.
    pub fn try_elect(&self, agent: AgentId, secret: &str, bus: &EventBus) -> bool {
        if self.winner.set(agent).is_err() {
            return false;
        }
        match self.sink.write_secret(secret.as_bytes()) {
            Ok(()) => {
                info!(%agent, "elected: secret written to the output sink");
                bus.publish(Event::new(EventKind::WinnerElected { agent }));
            }
            Err(err) => {
                error!(%agent, error = %err, "output sink write failed after election");
            }
        }
        true
    }

    pub fn winner(&self) -> Option<AgentId> {
        self.winner.get().copied()
    }
}

/// Per-agent detector: on every one-second tick, checks quiescence and
/// completion and attempts the election.
#[instrument(skip(fleet, election, bus, token), fields(agent = %self_id))]
pub async fn run_convergence_detector(
    self_id: AgentId,
    fleet: Arc<Fleet>,
    end_of_secret: String,
    quiet_period: Duration,
    election: Arc<Election>,
    bus: EventBus,
    token: CancelToken,
) -> WorkerOutcome {
    let Some(agent) = fleet.get(self_id) else {
        return WorkerOutcome::Failed(GossipError::AgentNotFound(self_id.0));
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = token.cancelled() => return WorkerOutcome::Done,
            _ = ticker.tick() => {}
        }

        if election.winner().is_some() {
            continue;
        }

        let last_updated_at = agent.last_updated_at().await;
        if !is_quiet_since(last_updated_at, quiet_period) {
            continue;
        }
        if !agent.is_secret_completed(&end_of_secret).await {
            continue;
        }

        let secret = agent.build_secret().await;
        election.try_elect(self_id, &secret, &bus);
    }
}

/// Advisory observer: samples whether every agent in the fleet has
/// completed and emits `AllConverged`.
#[instrument(skip(fleet, bus, token))]
pub async fn run_convergence_observer(
    fleet: Arc<Fleet>,
    end_of_secret: String,
    bus: EventBus,
    token: CancelToken,
) -> WorkerOutcome {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = token.cancelled() => return WorkerOutcome::Done,
            _ = ticker.tick() => {}
        }

        let mut converged = true;
        for agent in fleet.iter() {
            if !agent.is_secret_completed(&end_of_secret).await {
                converged = false;
                break;
            }
        }
        bus.publish(Event::new(EventKind::AllConverged { converged }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use crate::types::SecretPart;

    #[tokio::test]
    async fn first_caller_wins_and_only_writes_once() {
        let sink = Arc::new(MemorySink::new());
        let election = Election::new(sink.clone());
        let (bus, _fanout) = EventBus::new(8);

        assert!(election.try_elect(AgentId(0), "hello world.", &bus));
        assert!(!election.try_elect(AgentId(1), "hello world.", &bus));

        assert_eq!(sink.write_count(), 1);
        assert_eq!(election.winner(), Some(AgentId(0)));
    }

    #[tokio::test]
    async fn detector_only_fires_once_quiet_and_complete() {
        let agent = Arc::new(crate::agent::Agent::new(AgentId(0), 8, vec![]));
        let fleet = Arc::new(Fleet::new(vec![agent.clone()]));
        let sink = Arc::new(MemorySink::new());
        let election = Arc::new(Election::new(sink.clone()));
        let (bus, _fanout) = EventBus::new(8);
        let token = CancelToken::new();

        let handle = tokio::spawn(run_convergence_detector(
            AgentId(0),
            fleet,
            ".".to_string(),
            Duration::from_millis(50),
            election.clone(),
            bus,
            token.clone(),
        ));

        // Not complete yet: no election should fire.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sink.write_count(), 0);

        agent.merge_secret_part(SecretPart::new(0, "hello")).await;
        agent.merge_secret_part(SecretPart::new(1, "world.")).await;

        // Wait past both the quiet period and the next 1s tick.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(sink.write_count(), 1);
        assert_eq!(sink.writes()[0], b"hello world.");
    }
}
