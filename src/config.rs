//! Runtime configuration for a gossip swarm run.
//!
//! Loading (file/CLI) lives in the binary crate, not here: the core only
//! ever sees a validated [`Config`] value, the same boundary
//! `knhk-config` draws between `load_config` and the `KnhkConfig` struct it
//! produces.

use crate::error::{GossipError, GossipResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// All tunables enumerated by the system's external-interface contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fleet size; must be >= 2.
    pub nbr_of_robots: usize,
    /// Whitespace-split into words at startup.
    pub secret: String,
    /// Sink path for the winner's reconstructed secret.
    pub output_file: String,
    /// Capacity of every bounded FIFO (inboxes and the event bus).
    pub buffer_size: usize,
    /// Terminal suffix marking the last word.
    pub end_of_secret: String,
    /// Simulated drop probability per send attempt, 0..=100.
    pub percentage_of_lost: u8,
    /// Duplication trigger probability, 0..=100.
    pub percentage_of_duplicated: u8,
    /// Additional copies sent when duplication triggers.
    pub duplicated_number: u32,
    /// Send attempts per gossip tick.
    pub max_attempts: u32,
    /// Outer scope deadline.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Idle window before election eligibility.
    #[serde(with = "humantime_serde")]
    pub quiet_period: Duration,
    /// Summary-sender tick interval.
    #[serde(with = "humantime_serde")]
    pub gossip_time: Duration,
    /// Telemetry sampler tick interval; must be > 0.
    #[serde(with = "humantime_serde")]
    pub metric_interval: Duration,
    /// Warn when a channel's free capacity falls to or below this.
    pub low_capacity_threshold: i64,
    /// Log verbosity, parsed as a `tracing_subscriber::EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Validate the configuration, rejecting it before any worker runs.
    pub fn validate(&self) -> GossipResult<()> {
        if self.nbr_of_robots < 2 {
            return Err(GossipError::InvalidConfig(
                "nbr_of_robots must be >= 2".into(),
            ));
        }
        if self.secret.split_whitespace().next().is_none() {
            return Err(GossipError::InvalidConfig(
                "secret must contain at least one word".into(),
            ));
        }
        if self.output_file.trim().is_empty() {
            return Err(GossipError::InvalidConfig(
                "output_file must not be empty".into(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(GossipError::InvalidConfig(
                "buffer_size must be > 0".into(),
            ));
        }
        if self.end_of_secret.is_empty() {
            return Err(GossipError::InvalidConfig(
                "end_of_secret must not be empty".into(),
            ));
        }
        if self.percentage_of_lost > 100 {
            return Err(GossipError::InvalidConfig(
                "percentage_of_lost must be 0..=100".into(),
            ));
        }
        if self.percentage_of_duplicated > 100 {
            return Err(GossipError::InvalidConfig(
                "percentage_of_duplicated must be 0..=100".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(GossipError::InvalidConfig(
                "max_attempts must be > 0".into(),
            ));
        }
        if self.metric_interval.is_zero() {
            return Err(GossipError::InvalidConfig(
                "metric_interval must be > 0".into(),
            ));
        }
        if !self
            .secret
            .split_whitespace()
            .last()
            .is_some_and(|w| w.ends_with(&self.end_of_secret))
        {
            return Err(GossipError::InvalidConfig(format!(
                "secret's last word must end with end_of_secret {:?}",
                self.end_of_secret
            )));
        }
        Ok(())
    }

    /// The whitespace-split words of `secret`, in order.
    pub fn words(&self) -> Vec<String> {
        self.secret.split_whitespace().map(str::to_string).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nbr_of_robots: 5,
            secret: "hello world.".to_string(),
            output_file: "secret.out".to_string(),
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
            log_level: default_log_level(),
        }
    }
}
