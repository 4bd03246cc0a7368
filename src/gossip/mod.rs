//! The push-pull gossip engine: three per-agent workers plus the shared
//! fault-injecting transport policy.

pub mod merger;
pub mod responder;
pub mod sender;
pub mod transport;

pub use merger::run_update_merger;
pub use responder::run_summary_responder;
pub use sender::run_summary_sender;
pub use transport::{FaultInjector, SendPlan};

use crate::error::{GossipError, GossipResult};
use crate::types::{AgentId, SecretPart};
use serde::{Deserialize, Serialize};

/// What a peer currently holds, advertised during the push phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMessage {
    pub sender_id: AgentId,
    pub indexes: Vec<u64>,
}

/// The pull-phase response: the parts the summary's sender was missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub parts: Vec<SecretPart>,
}

pub fn encode_summary(msg: &SummaryMessage) -> GossipResult<Vec<u8>> {
    bincode::serialize(msg).map_err(|e| GossipError::Decode(e.to_string()))
}

pub fn decode_summary(bytes: &[u8]) -> GossipResult<SummaryMessage> {
    bincode::deserialize(bytes).map_err(|e| GossipError::Decode(e.to_string()))
}

pub fn encode_update(msg: &UpdateMessage) -> GossipResult<Vec<u8>> {
    bincode::serialize(msg).map_err(|e| GossipError::Decode(e.to_string()))
}

pub fn decode_update(bytes: &[u8]) -> GossipResult<UpdateMessage> {
    bincode::deserialize(bytes).map_err(|e| GossipError::Decode(e.to_string()))
}
