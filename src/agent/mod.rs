//! Agent state: each agent's local slice of the sentence, with the merge
//! rules and completion check that are the system's sole consistency
//! boundary.

use crate::error::GossipError;
use crate::types::{AgentId, SecretPart};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{error, instrument, trace};

struct Inner {
    parts: HashMap<u64, String>,
    last_updated_at: Instant,
}

/// One participant in the fleet; holds a subset of the sentence plus its
/// two bounded inboxes.
pub struct Agent {
    id: AgentId,
    inner: RwLock<Inner>,
    summary_tx: mpsc::Sender<Vec<u8>>,
    summary_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    update_tx: mpsc::Sender<Vec<u8>>,
    update_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl Agent {
    /// Create an empty agent with the given starting words.
    pub fn new(id: AgentId, buffer_size: usize, initial: Vec<SecretPart>) -> Self {
        let mut parts = HashMap::with_capacity(initial.len());
        for p in initial {
            parts.insert(p.index, p.word);
        }
        let (summary_tx, summary_rx) = mpsc::channel(buffer_size);
        let (update_tx, update_rx) = mpsc::channel(buffer_size);
        Self {
            id,
            inner: RwLock::new(Inner {
                parts,
                last_updated_at: Instant::now(),
            }),
            summary_tx,
            summary_rx: Mutex::new(summary_rx),
            update_tx,
            update_rx: Mutex::new(update_rx),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    /// A clonable handle to this agent's summary inbox, for peers' senders.
    pub fn summary_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.summary_tx.clone()
    }

    /// A clonable handle to this agent's update inbox, for peers' responders.
    pub fn update_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.update_tx.clone()
    }

    pub fn summary_inbox_capacity(&self) -> usize {
        self.summary_tx.max_capacity()
    }

    pub fn update_inbox_capacity(&self) -> usize {
        self.update_tx.max_capacity()
    }

    pub fn summary_inbox_len(&self) -> usize {
        self.summary_tx.max_capacity() - self.summary_tx.capacity()
    }

    pub fn update_inbox_len(&self) -> usize {
        self.update_tx.max_capacity() - self.update_tx.capacity()
    }

    /// Receive the next encoded summary, blocking until one arrives.
    /// Returns `None` only if every sender has been dropped, which never
    /// happens during a run since membership is fixed at startup.
    pub async fn recv_summary(&self) -> Option<Vec<u8>> {
        self.summary_rx.lock().await.recv().await
    }

    /// Receive the next encoded update, blocking until one arrives.
    pub async fn recv_update(&self) -> Option<Vec<u8>> {
        self.update_rx.lock().await.recv().await
    }

    /// The sole consistency boundary for `parts`. On a fresh index, inserts
    /// and bumps `last_updated_at`. On a matching (index, word), no-ops
    /// (idempotence). On a conflicting word at an existing index, this is
    /// an invariant violation: it panics with the violation as the panic
    /// payload, and the caller's task unwinds without mutating state.
    #[instrument(skip(self), fields(agent = %self.id, index = part.index))]
    pub async fn merge_secret_part(&self, part: SecretPart) {
        let mut guard = self.inner.write().await;
        match guard.parts.get(&part.index) {
            None => {
                guard.parts.insert(part.index, part.word);
                guard.last_updated_at = Instant::now();
            }
            Some(existing) if *existing == part.word => {
                trace!("duplicate part merged idempotently");
            }
            Some(existing) => {
                let violation = GossipError::Conflict {
                    agent: self.id.0,
                    index: part.index,
                    word: part.word.clone(),
                };
                error!(
                    existing = %existing,
                    observed = %part.word,
                    "invariant violation: conflicting word at index"
                );
                drop(guard);
                std::panic::panic_any(violation);
            }
        }
    }

    /// True iff `parts` is non-empty, every index in `[0, max]` is
    /// present, and the word at `max` ends with `end`.
    pub async fn is_secret_completed(&self, end: &str) -> bool {
        let guard = self.inner.read().await;
        if guard.parts.is_empty() {
            return false;
        }
        let max = *guard.parts.keys().max().expect("non-empty checked above");
        for i in 0..=max {
            if !guard.parts.contains_key(&i) {
                return false;
            }
        }
        guard.parts[&max].ends_with(end)
    }

    /// The words of `parts`, in index order if `ordered`, else in
    /// unspecified (hash-map) order.
    pub async fn get_words(&self, ordered: bool) -> Vec<String> {
        let guard = self.inner.read().await;
        let mut entries: Vec<(u64, String)> = guard
            .parts
            .iter()
            .map(|(i, w)| (*i, w.clone()))
            .collect();
        if ordered {
            entries.sort_by_key(|(i, _)| *i);
        }
        entries.into_iter().map(|(_, w)| w).collect()
    }

    /// The currently-held indexes, ascending.
    pub async fn indexes(&self) -> Vec<u64> {
        let guard = self.inner.read().await;
        let mut idx: Vec<u64> = guard.parts.keys().copied().collect();
        idx.sort_unstable();
        idx
    }

    /// The parts this agent holds whose index is absent from `indexes`.
    pub async fn parts_missing_from(&self, indexes: &[u64]) -> Vec<SecretPart> {
        let guard = self.inner.read().await;
        let present: std::collections::HashSet<u64> = indexes.iter().copied().collect();
        guard
            .parts
            .iter()
            .filter(|(i, _)| !present.contains(i))
            .map(|(i, w)| SecretPart::new(*i, w.clone()))
            .collect()
    }

    /// The reconstructed sentence: words joined by single spaces, ascending
    /// by index. Only meaningful once `is_secret_completed` holds.
    pub async fn build_secret(&self) -> String {
        self.get_words(true).await.join(" ")
    }

    pub async fn last_updated_at(&self) -> Instant {
        self.inner.read().await.last_updated_at
    }
}

/// A fixed, dense vector of agents. Membership never changes after
/// construction (no dynamic membership, per the Non-goals).
pub struct Fleet {
    agents: Vec<Arc<Agent>>,
}

impl Fleet {
    pub fn new(agents: Vec<Arc<Agent>>) -> Self {
        Self { agents }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: AgentId) -> Option<&Arc<Agent>> {
        self.agents.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.agents.iter()
    }

    /// Pick a peer uniformly at random, distinct from `self_id`. Panics if
    /// the fleet has fewer than two agents (a configuration error caught
    /// by `Config::validate` long before this is called).
    pub fn random_peer_excluding(&self, self_id: AgentId) -> AgentId {
        use rand::Rng;
        assert!(self.agents.len() >= 2, "fleet too small to gossip");
        let mut rng = rand::thread_rng();
        loop {
            let candidate = AgentId(rng.gen_range(0..self.agents.len() as u64));
            if candidate != self_id {
                return candidate;
            }
        }
    }
}

/// Partition `words` across `nbr_of_robots` agents: each word is placed
/// into exactly one agent, chosen uniformly at random. Agents may end up
/// empty if `nbr_of_robots > words.len()` (an accepted Open Question in
/// the design, not an error).
pub fn partition_words(words: &[String], nbr_of_robots: usize) -> Vec<Vec<SecretPart>> {
    use rand::Rng;
    let mut buckets: Vec<Vec<SecretPart>> = (0..nbr_of_robots).map(|_| Vec::new()).collect();
    let mut rng = rand::thread_rng();
    for (index, word) in words.iter().enumerate() {
        let bucket = rng.gen_range(0..nbr_of_robots);
        buckets[bucket].push(SecretPart::new(index as u64, word.clone()));
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: u64) -> Agent {
        Agent::new(AgentId(id), 16, vec![])
    }

    #[tokio::test]
    async fn merge_is_monotone_and_idempotent() {
        let a = agent(0);
        assert_eq!(a.indexes().await, Vec::<u64>::new());

        a.merge_secret_part(SecretPart::new(0, "hi")).await;
        assert_eq!(a.indexes().await, vec![0]);

        // Re-merging the same (index, word) is a no-op, not a growth.
        a.merge_secret_part(SecretPart::new(0, "hi")).await;
        assert_eq!(a.indexes().await, vec![0]);
    }

    #[tokio::test]
    #[should_panic]
    async fn conflicting_word_at_same_index_panics() {
        let a = agent(0);
        a.merge_secret_part(SecretPart::new(0, "hi")).await;
        a.merge_secret_part(SecretPart::new(0, "bye")).await;
    }

    #[tokio::test]
    async fn conflict_rejects_mutation_before_write() {
        use futures::FutureExt;

        let a = agent(0);
        a.merge_secret_part(SecretPart::new(0, "hi")).await;

        let _ = std::panic::AssertUnwindSafe(a.merge_secret_part(SecretPart::new(0, "bye")))
            .catch_unwind()
            .await;

        // State must still read "hi": the conflicting write never landed.
        assert_eq!(a.get_words(true).await, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn completion_requires_gap_free_prefix_and_terminal_marker() {
        let a = agent(0);
        assert!(!a.is_secret_completed(".").await);

        a.merge_secret_part(SecretPart::new(1, "world.")).await;
        assert!(!a.is_secret_completed(".").await, "index 0 missing");

        a.merge_secret_part(SecretPart::new(0, "hello")).await;
        assert!(a.is_secret_completed(".").await);
    }

    #[tokio::test]
    async fn build_secret_joins_in_index_order() {
        let a = agent(0);
        a.merge_secret_part(SecretPart::new(1, "world.")).await;
        a.merge_secret_part(SecretPart::new(0, "hello")).await;
        assert_eq!(a.build_secret().await, "hello world.");
    }

    #[tokio::test]
    async fn parts_missing_from_excludes_known_indexes() {
        let a = agent(0);
        a.merge_secret_part(SecretPart::new(0, "hello")).await;
        a.merge_secret_part(SecretPart::new(1, "world.")).await;

        let missing = a.parts_missing_from(&[0]).await;
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].index, 1);
    }

    #[test]
    fn partition_covers_every_word_exactly_once() {
        let words: Vec<String> = (0..20).map(|i| format!("w{i}")).collect();
        let buckets = partition_words(&words, 4);
        let mut seen: Vec<u64> = buckets.iter().flatten().map(|p| p.index).collect();
        seen.sort_unstable();
        let expected: Vec<u64> = (0..20).collect();
        assert_eq!(seen, expected);
    }
}
