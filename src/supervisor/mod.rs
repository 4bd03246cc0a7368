//! Supervises named workers: starts each as an isolated task, recovers
//! panics, restarts them, and coordinates shutdown via a cancellable scope.

use crate::bus::EventBus;
use crate::concurrency::CancelToken;
use crate::types::{Event, EventKind, WorkerOutcome};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Restart backoff after any worker failure, panic or otherwise.
const RESTART_DELAY: Duration = Duration::from_millis(200);

/// A worker's entry point factory: called once per run attempt (including
/// every restart) because a failed future cannot be re-polled, only a
/// fresh one spawned. Receives the scope's cancellation token so it can
/// race its own suspension points against shutdown.
pub type WorkerFn =
    Arc<dyn Fn(CancelToken) -> Pin<Box<dyn Future<Output = WorkerOutcome> + Send>> + Send + Sync>;

/// Owns a cancellable scope and a wait-group over every registered
/// worker.
pub struct Supervisor {
    bus: EventBus,
    root: CancelToken,
    workers: Vec<(String, WorkerFn)>,
    tasks: Mutex<JoinSet<()>>,
}

impl Supervisor {
    pub fn new(bus: EventBus, root: CancelToken) -> Self {
        Self {
            bus,
            root,
            workers: Vec::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Register a named worker. Must be called before `run`.
    pub fn add(&mut self, name: impl Into<String>, factory: WorkerFn) {
        self.workers.push((name.into(), factory));
    }

    /// Start every registered worker in its own task.
    pub async fn run(&self) {
        let mut tasks = self.tasks.lock().await;
        for (name, factory) in &self.workers {
            let name = name.clone();
            let factory = factory.clone();
            let bus = self.bus.clone();
            let root = self.root.clone();
            tasks.spawn(supervise(name, factory, bus, root));
        }
    }

    /// Cancel the scope and await every worker task. After this returns,
    /// no worker task is live.
    pub async fn stop(&self) {
        self.root.cancel();
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }

    pub fn token(&self) -> &CancelToken {
        &self.root
    }
}

/// The per-worker supervision loop:
/// cancelled? exit. Else run, behind a panic barrier. Normal success never
/// restarts; any panic or returned error emits `WorkerRestarted`, sleeps
/// `RESTART_DELAY`, and loops.
async fn supervise(name: String, factory: WorkerFn, bus: EventBus, root: CancelToken) {
    loop {
        if root.is_cancelled() {
            return;
        }

        let outcome = AssertUnwindSafe(factory(root.clone())).catch_unwind().await;

        match outcome {
            Ok(WorkerOutcome::Done) => {
                info!(worker = %name, "worker finished, no restart");
                return;
            }
            Ok(WorkerOutcome::Failed(err)) => {
                warn!(worker = %name, error = %err, "worker returned an error, restarting");
                bus.publish(Event::new(EventKind::WorkerRestarted { worker: name.clone() }));
                sleep_or_cancelled(RESTART_DELAY, &root).await;
            }
            Err(_panic) => {
                error!(worker = %name, "worker panicked, restarting");
                bus.publish(Event::new(EventKind::WorkerRestarted { worker: name.clone() }));
                sleep_or_cancelled(RESTART_DELAY, &root).await;
            }
        }
    }
}

async fn sleep_or_cancelled(delay: Duration, token: &CancelToken) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {},
        _ = token.cancelled() => {},
    }
}
