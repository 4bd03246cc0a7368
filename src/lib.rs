//! Push-pull gossip simulation: a fixed fleet of agents, each holding a
//! disjoint random slice of a sentence, reconstruct the whole under a
//! lossy, duplicating, reordering transport. Exactly one agent writes the
//! reconstructed sentence once the fleet has converged and gone quiet.

pub mod agent;
pub mod bus;
pub mod concurrency;
pub mod config;
pub mod convergence;
pub mod error;
pub mod gossip;
pub mod orchestrator;
pub mod output;
pub mod supervisor;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::{GossipError, GossipResult};
pub use orchestrator::Orchestrator;

use tracing::info;

/// Install a global `tracing` subscriber from `log_level`. Opt-in and
/// binary-only: the library itself never configures logging.
pub fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("gossip swarm tracing initialized");
}
