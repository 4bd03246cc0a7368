//! Error types for the gossip swarm

use thiserror::Error;

/// Result type alias for swarm operations
pub type GossipResult<T> = Result<T, GossipError>;

/// Comprehensive error type for the gossip swarm core
#[derive(Error, Debug, Clone)]
pub enum GossipError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("agent {0} not found")]
    AgentNotFound(u64),

    #[error("malformed wire message: {0}")]
    Decode(String),

    #[error(
        "invariant violation: agent {agent} observed word {word:?} at index {index}, \
         already holds a different word there"
    )]
    Conflict {
        agent: u64,
        index: u64,
        word: String,
    },

    #[error("output sink failure: {0}")]
    Sink(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GossipError {
    /// Whether this error represents a fatal consistency violation
    /// that must abort the current merge call rather than be tolerated.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, GossipError::Conflict { .. })
    }
}
