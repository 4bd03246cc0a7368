//! Channel capacity sampling, per-agent quiescence sampling, and counter
//! aggregation over the event bus.

use crate::agent::Fleet;
use crate::bus::{EventBus, EventHandler};
use crate::concurrency::CancelToken;
use crate::types::{elapsed_ms, AgentId, Event, EventKind, WorkerOutcome};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

/// Periodically samples the event bus's own capacity.
/// If the bus is itself full, the sample is dropped, which falls out of
/// `EventBus::publish`'s non-blocking offer for free.
#[instrument(skip(bus, token))]
pub async fn run_capacity_sampler(
    bus: EventBus,
    metric_interval: Duration,
    token: CancelToken,
) -> WorkerOutcome {
    let mut ticker = tokio::time::interval(metric_interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => return WorkerOutcome::Done,
            _ = ticker.tick() => {}
        }
        bus.publish(Event::new(EventKind::ChannelCapacity {
            worker: "event_bus".to_string(),
            capacity: bus.capacity(),
            length: bus.len(),
        }));
    }
}

/// Per-agent sampler: emits the agent's idle duration every tick.
#[instrument(skip(fleet, bus, token), fields(agent = %self_id))]
pub async fn run_quiescence_sampler(
    self_id: AgentId,
    fleet: Arc<Fleet>,
    bus: EventBus,
    metric_interval: Duration,
    token: CancelToken,
) -> WorkerOutcome {
    let Some(agent) = fleet.get(self_id) else {
        return WorkerOutcome::Done;
    };

    let mut ticker = tokio::time::interval(metric_interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => return WorkerOutcome::Done,
            _ = ticker.tick() => {}
        }
        let last_updated_at = agent.last_updated_at().await;
        bus.publish(Event::new(EventKind::QuiescenceSample {
            agent: self_id,
            last_activity_ms: elapsed_ms(last_updated_at),
        }));
    }
}

/// Counters maintained by the [`Aggregator`], by event kind.
#[derive(Debug, Default)]
pub struct Counters {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_duplicated: u64,
    pub messages_reordered: u64,
    pub messages_lost: u64,
    pub invariant_violations_by_agent: HashMap<AgentId, u64>,
    pub worker_restarts_by_name: HashMap<String, u64>,
    pub capacity_by_worker: HashMap<String, (usize, usize)>,
    pub last_activity: Option<Instant>,
}

/// The Fanout's registered consumer: folds every event into [`Counters`]
/// under a single `parking_lot::Mutex`.
pub struct Aggregator {
    counters: Mutex<Counters>,
    low_capacity_threshold: i64,
}

impl Aggregator {
    pub fn new(low_capacity_threshold: i64) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            low_capacity_threshold,
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let guard = self.counters.lock();
        CountersSnapshot {
            messages_sent: guard.messages_sent,
            messages_received: guard.messages_received,
            messages_duplicated: guard.messages_duplicated,
            messages_reordered: guard.messages_reordered,
            messages_lost: guard.messages_lost,
            invariant_violations: guard.invariant_violations_by_agent.values().sum(),
            worker_restarts: guard.worker_restarts_by_name.values().sum(),
        }
    }
}

/// A point-in-time, lock-free copy of the totals, for tests and
/// diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountersSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_duplicated: u64,
    pub messages_reordered: u64,
    pub messages_lost: u64,
    pub invariant_violations: u64,
    pub worker_restarts: u64,
}

impl EventHandler for Aggregator {
    fn handle(&self, event: &Event) {
        let mut counters = self.counters.lock();
        counters.last_activity = Some(event.created_at);
        match &event.kind {
            EventKind::MessageSent { .. } => counters.messages_sent += 1,
            EventKind::MessageReceived { .. } => counters.messages_received += 1,
            EventKind::MessageDuplicated => counters.messages_duplicated += 1,
            EventKind::MessageReordered => counters.messages_reordered += 1,
            EventKind::MessageLost => counters.messages_lost += 1,
            EventKind::InvariantViolation { agent } => {
                *counters.invariant_violations_by_agent.entry(*agent).or_insert(0) += 1;
            }
            EventKind::WorkerRestarted { worker } => {
                *counters.worker_restarts_by_name.entry(worker.clone()).or_insert(0) += 1;
            }
            EventKind::ChannelCapacity {
                worker,
                capacity,
                length,
            } => {
                counters
                    .capacity_by_worker
                    .insert(worker.clone(), (*capacity, *length));
                drop(counters);
                self.warn_if_low(worker, *capacity, *length);
                return;
            }
            EventKind::QuiescenceSample { .. }
            | EventKind::WinnerElected { .. }
            | EventKind::AllConverged { .. } => {}
        }
    }
}

impl Aggregator {
    fn warn_if_low(&self, worker: &str, capacity: usize, length: usize) {
        if capacity == 0 {
            return;
        }
        let free = capacity as i64 - length as i64;
        if free <= self.low_capacity_threshold {
            warn!(worker, capacity, length, free, "channel capacity is low");
        }
    }
}
