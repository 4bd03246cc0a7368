//! End-to-end scenarios driving a real `Orchestrator` against an
//! in-memory output sink.

use gossip_swarm::config::Config;
use gossip_swarm::output::MemorySink;
use gossip_swarm::Orchestrator;
use std::sync::Arc;
use std::time::Duration;

fn base_config() -> Config {
    Config {
        nbr_of_robots: 5,
        secret: "hello world.".to_string(),
        output_file: "unused.out".to_string(),
        buffer_size: 64,
        end_of_secret: ".".to_string(),
        percentage_of_lost: 0,
        percentage_of_duplicated: 0,
        duplicated_number: 0,
        max_attempts: 3,
        timeout: Duration::from_secs(3),
        quiet_period: Duration::from_millis(200),
        gossip_time: Duration::from_millis(50),
        metric_interval: Duration::from_millis(500),
        low_capacity_threshold: 4,
        log_level: "error".to_string(),
    }
}

#[tokio::test]
async fn happy_path_no_faults_reconstructs_the_secret() {
    let config = base_config();
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(config, sink.clone()).expect("valid config");

    orchestrator.run().await;

    assert_eq!(sink.write_count(), 1, "exactly one winner must write");
    assert_eq!(sink.writes()[0], b"hello world.");
}

#[tokio::test]
async fn lossy_transport_still_converges_every_agent() {
    let mut config = base_config();
    config.percentage_of_lost = 50;
    config.percentage_of_duplicated = 50;
    config.duplicated_number = 2;
    config.max_attempts = 5;
    config.gossip_time = Duration::from_millis(100);
    config.timeout = Duration::from_secs(2);

    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(config, sink.clone()).expect("valid config");

    orchestrator.run().await;

    for agent in orchestrator.fleet().iter() {
        assert!(
            agent.is_secret_completed(".").await,
            "every agent must eventually reconstruct the full sentence"
        );
    }
}

#[tokio::test]
async fn timeout_before_quiescence_writes_nothing() {
    let mut config = base_config();
    config.quiet_period = Duration::from_secs(5);
    config.timeout = Duration::from_millis(500);

    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(config, sink.clone()).expect("valid config");

    orchestrator.run().await;

    assert_eq!(sink.write_count(), 0, "quiet period never elapses before timeout");
}

#[tokio::test]
async fn conflicting_parts_emit_invariant_violation_without_corrupting_state() {
    use gossip_swarm::agent::Agent;
    use gossip_swarm::bus::EventBus;
    use gossip_swarm::concurrency::CancelToken;
    use gossip_swarm::gossip::{encode_update, run_update_merger, UpdateMessage};
    use gossip_swarm::agent::Fleet;
    use gossip_swarm::types::{AgentId, EventKind, SecretPart};
    use std::sync::atomic::{AtomicBool, Ordering};

    let agent = Arc::new(Agent::new(AgentId(0), 8, vec![]));
    agent.merge_secret_part(SecretPart::new(0, "a")).await;

    let fleet = Arc::new(Fleet::new(vec![agent.clone()]));
    let (bus, mut fanout) = EventBus::new(16);

    struct Seen(Arc<AtomicBool>);
    impl gossip_swarm::bus::EventHandler for Seen {
        fn handle(&self, event: &gossip_swarm::types::Event) {
            if matches!(event.kind, EventKind::InvariantViolation { agent } if agent == AgentId(0)) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
    }
    let seen = Arc::new(AtomicBool::new(false));
    fanout.register(Box::new(Seen(seen.clone())));
    tokio::spawn(async move { fanout.run().await });

    let update = UpdateMessage {
        parts: vec![SecretPart::new(0, "b")],
    };
    agent
        .update_sender()
        .try_send(encode_update(&update).unwrap())
        .unwrap();

    let token = CancelToken::new();
    let result = std::panic::AssertUnwindSafe(run_update_merger(AgentId(0), fleet, bus, token))
        .catch_unwind()
        .await;

    assert!(result.is_err(), "the conflicting merge must panic");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.load(Ordering::SeqCst), "InvariantViolation must be observed");
    assert_eq!(
        agent.get_words(true).await,
        vec!["a".to_string()],
        "the rejected word must never land"
    );
}

#[tokio::test]
async fn winner_race_produces_exactly_one_write() {
    use gossip_swarm::convergence::Election;
    use gossip_swarm::bus::EventBus;
    use gossip_swarm::types::AgentId;

    let sink = Arc::new(MemorySink::new());
    let election = Arc::new(Election::new(sink.clone()));
    let (bus, _fanout) = EventBus::new(8);

    let a = {
        let election = election.clone();
        let bus = bus.clone();
        tokio::spawn(async move { election.try_elect(AgentId(0), "hello world.", &bus) })
    };
    let b = {
        let election = election.clone();
        let bus = bus.clone();
        tokio::spawn(async move { election.try_elect(AgentId(1), "hello world.", &bus) })
    };

    let (won_a, won_b) = tokio::join!(a, b);
    let (won_a, won_b) = (won_a.unwrap(), won_b.unwrap());

    assert_ne!(won_a, won_b, "exactly one of the two racers must win");
    assert_eq!(sink.write_count(), 1);
}

#[tokio::test]
async fn a_worker_that_panics_on_first_run_is_restarted() {
    use gossip_swarm::bus::EventBus;
    use gossip_swarm::concurrency::CancelToken;
    use gossip_swarm::supervisor::Supervisor;
    use gossip_swarm::types::{EventKind, WorkerOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    let (bus, mut fanout) = EventBus::new(16);
    let token = CancelToken::new();
    let mut supervisor = Supervisor::new(bus, token.clone());

    let restarts = Arc::new(AtomicUsize::new(0));
    struct RestartCounter(Arc<AtomicUsize>);
    impl gossip_swarm::bus::EventHandler for RestartCounter {
        fn handle(&self, event: &gossip_swarm::types::Event) {
            if matches!(event.kind, EventKind::WorkerRestarted { .. }) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    fanout.register(Box::new(RestartCounter(restarts.clone())));
    tokio::spawn(async move { fanout.run().await });

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    supervisor.add(
        "fake-worker",
        Arc::new(move |_token| {
            let attempts = attempts_clone.clone();
            Box::pin(async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run always panics");
                }
                WorkerOutcome::Done
            })
        }),
    );

    let other_ran = Arc::new(AtomicUsize::new(0));
    let other_clone = other_ran.clone();
    supervisor.add(
        "unaffected-worker",
        Arc::new(move |_token| {
            let other = other_clone.clone();
            Box::pin(async move {
                other.fetch_add(1, Ordering::SeqCst);
                WorkerOutcome::Done
            })
        }),
    );

    supervisor.run().await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    supervisor.stop().await;

    assert!(attempts.load(Ordering::SeqCst) >= 2, "worker must run again after the panic");
    assert!(restarts.load(Ordering::SeqCst) >= 1);
    assert_eq!(other_ran.load(Ordering::SeqCst), 1, "sibling worker is unaffected");
}
