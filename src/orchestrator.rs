//! Wires agents, the event bus, the gossip engine, convergence, and
//! telemetry together under one cancellable scope.

use crate::agent::{partition_words, Agent, Fleet};
use crate::bus::EventBus;
use crate::concurrency::{CancelScope, CancelToken};
use crate::config::Config;
use crate::convergence::{run_convergence_detector, run_convergence_observer, Election};
use crate::error::GossipResult;
use crate::gossip::transport::FaultInjector;
use crate::gossip::{run_summary_responder, run_summary_sender, run_update_merger};
use crate::output::OutputSink;
use crate::supervisor::Supervisor;
use crate::telemetry::{run_capacity_sampler, run_quiescence_sampler, Aggregator};
use crate::types::AgentId;
use std::sync::Arc;
use tracing::info;

/// Owns the root cancellable scope for one run. Dropping the scope (or
/// calling `shutdown`) cancels every worker.
pub struct Orchestrator {
    config: Config,
    fleet: Arc<Fleet>,
    bus: EventBus,
    supervisor: Supervisor,
    scope: CancelScope,
    aggregator: Arc<Aggregator>,
}

impl Orchestrator {
    /// Build the fleet, event bus, and every worker, but do not start
    /// anything yet.
    pub fn new(config: Config, sink: Arc<dyn OutputSink>) -> GossipResult<Self> {
        config.validate()?;

        let words = config.words();
        let buckets = partition_words(&words, config.nbr_of_robots);
        let agents: Vec<Arc<Agent>> = buckets
            .into_iter()
            .enumerate()
            .map(|(i, parts)| Arc::new(Agent::new(AgentId(i as u64), config.buffer_size, parts)))
            .collect();
        let fleet = Arc::new(Fleet::new(agents));

        let (bus, mut fanout) = EventBus::new(config.buffer_size);
        let aggregator = Arc::new(Aggregator::new(config.low_capacity_threshold));
        fanout.register(Box::new(AggregatorHandle(aggregator.clone())));
        let fanout = Arc::new(tokio::sync::Mutex::new(fanout));

        let scope = CancelScope::new();
        let mut supervisor = Supervisor::new(bus.clone(), scope.token().clone());

        supervisor.add(
            "event-bus-fanout",
            Arc::new(move |token: CancelToken| {
                let fanout = fanout.clone();
                Box::pin(async move {
                    let mut fanout = fanout.lock().await;
                    tokio::select! {
                        _ = token.cancelled() => {},
                        _ = fanout.run() => {},
                    }
                    crate::types::WorkerOutcome::Done
                })
            }),
        );

        let election = Arc::new(Election::new(sink));
        let fault = FaultInjector::from_config(&config);

        for agent in fleet.iter() {
            let self_id = agent.id();

            let fleet_c = fleet.clone();
            let bus_c = bus.clone();
            let gossip_time = config.gossip_time;
            let max_attempts = config.max_attempts;
            supervisor.add(
                format!("summary-sender-{self_id}"),
                Arc::new(move |token| {
                    Box::pin(run_summary_sender(
                        self_id,
                        fleet_c.clone(),
                        bus_c.clone(),
                        gossip_time,
                        max_attempts,
                        fault,
                        token,
                    ))
                }),
            );

            let fleet_c = fleet.clone();
            let bus_c = bus.clone();
            supervisor.add(
                format!("summary-responder-{self_id}"),
                Arc::new(move |token| {
                    Box::pin(run_summary_responder(self_id, fleet_c.clone(), bus_c.clone(), token))
                }),
            );

            let fleet_c = fleet.clone();
            let bus_c = bus.clone();
            supervisor.add(
                format!("update-merger-{self_id}"),
                Arc::new(move |token| {
                    Box::pin(run_update_merger(self_id, fleet_c.clone(), bus_c.clone(), token))
                }),
            );

            let fleet_c = fleet.clone();
            let bus_c = bus.clone();
            let end = config.end_of_secret.clone();
            let quiet = config.quiet_period;
            let election_c = election.clone();
            supervisor.add(
                format!("convergence-detector-{self_id}"),
                Arc::new(move |token| {
                    Box::pin(run_convergence_detector(
                        self_id,
                        fleet_c.clone(),
                        end.clone(),
                        quiet,
                        election_c.clone(),
                        bus_c.clone(),
                        token,
                    ))
                }),
            );

            let fleet_c = fleet.clone();
            let bus_c = bus.clone();
            let interval = config.metric_interval;
            supervisor.add(
                format!("quiescence-sampler-{self_id}"),
                Arc::new(move |token| {
                    Box::pin(run_quiescence_sampler(self_id, fleet_c.clone(), bus_c.clone(), interval, token))
                }),
            );
        }

        let bus_c = bus.clone();
        let interval = config.metric_interval;
        supervisor.add(
            "capacity-sampler",
            Arc::new(move |token| Box::pin(run_capacity_sampler(bus_c.clone(), interval, token))),
        );

        let fleet_c = fleet.clone();
        let bus_c = bus.clone();
        let end = config.end_of_secret.clone();
        supervisor.add(
            "convergence-observer",
            Arc::new(move |token| {
                Box::pin(run_convergence_observer(fleet_c.clone(), end.clone(), bus_c.clone(), token))
            }),
        );

        Ok(Self {
            config,
            fleet,
            bus,
            supervisor,
            scope,
            aggregator,
        })
    }

    /// Start every worker and run until the outer `Timeout` elapses.
    pub async fn run(&self) {
        self.supervisor.run().await;
        tokio::select! {
            _ = tokio::time::sleep(self.config.timeout) => {
                info!("timeout elapsed, shutting down");
            }
            _ = self.scope.token().cancelled() => {
                info!("scope cancelled externally, shutting down");
            }
        }
        self.supervisor.stop().await;
    }

    /// Cancel the scope without waiting for the configured timeout.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }
}

struct AggregatorHandle(Arc<Aggregator>);

impl crate::bus::EventHandler for AggregatorHandle {
    fn handle(&self, event: &crate::types::Event) {
        self.0.handle(event);
    }
}
