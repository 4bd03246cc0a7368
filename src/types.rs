//! Core types shared across the gossip swarm

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Unique identifier for agents. Dense integer in `[0, N)`; also the
/// identity embedded in wire messages and the index into the shared
/// agent vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent-{}", self.0)
    }
}

/// One word of the secret sentence, addressed by its position.
///
/// Equality is by `(index, word)`: two parts are the same part iff they
/// agree on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPart {
    pub index: u64,
    pub word: String,
}

impl SecretPart {
    pub fn new(index: u64, word: impl Into<String>) -> Self {
        Self {
            index,
            word: word.into(),
        }
    }
}

/// A named worker's outcome, reported to the Supervisor.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Finished with no error; never restarted.
    Done,
    /// Finished with a recoverable error; restarted after the backoff delay.
    Failed(crate::error::GossipError),
}

/// Kinds of events carried on the event bus, paired with their payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    MessageSent { sender: AgentId },
    MessageReceived { receiver: AgentId },
    MessageDuplicated,
    MessageReordered,
    MessageLost,
    QuiescenceSample { agent: AgentId, last_activity_ms: u64 },
    ChannelCapacity { worker: String, capacity: usize, length: usize },
    WorkerRestarted { worker: String },
    InvariantViolation { agent: AgentId },
    WinnerElected { agent: AgentId },
    AllConverged { converged: bool },
}

/// A timestamped domain or telemetry event.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub created_at: Instant,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            created_at: Instant::now(),
        }
    }
}

/// Duration since `since`, expressed in whole milliseconds.
pub fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Whether `since` is at least `quiet` in the past.
pub fn is_quiet_since(since: Instant, quiet: Duration) -> bool {
    since.elapsed() >= quiet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_display() {
        assert_eq!(AgentId(42).to_string(), "Agent-42");
    }

    #[test]
    fn secret_part_equality_is_index_and_word() {
        let a = SecretPart::new(0, "hello");
        let b = SecretPart::new(0, "hello");
        let c = SecretPart::new(0, "world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn quiet_since_respects_the_window() {
        let now = Instant::now();
        assert!(!is_quiet_since(now, Duration::from_secs(1)));
        assert!(is_quiet_since(now, Duration::from_millis(0)));
    }
}
