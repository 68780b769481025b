//! Deterministic simulation runner.
//!
//! Owns the global event queue, the shared blob store and id namespaces,
//! and the delay model of the event bus. Given the same seed and
//! configuration, a run is reproducible event for event.

use crate::event_queue::EventKey;
use crate::stats::{ErrorRecord, SimulationStats};
use crate::NodeIndex;
use ezchain_core::{
    sampling, Action, IdGen, MajorityVerifier, OutboundMessage, ProtocolConfig, ProtocolEvent,
    StateMachine, ThresholdVerifier, TimerId,
};
use ezchain_node::{NodeStateMachine, Statistics};
use ezchain_store::MemoryStore;
use ezchain_types::NodeId;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Deterministic simulation runner.
///
/// Processes events in deterministic order: by time, then event priority,
/// then node index, then insertion sequence. All randomness (node RNG
/// streams and bus delays) derives from the seed.
pub struct SimulationRunner {
    config: ProtocolConfig,
    nodes: Vec<NodeStateMachine>,

    /// Global event queue, ordered deterministically.
    queue: BTreeMap<EventKey, ProtocolEvent>,
    /// Sequence counter for deterministic FIFO ordering.
    sequence: u64,
    /// Current simulation time.
    now: Duration,

    /// RNG for bus delays (seeded for determinism).
    rng: ChaCha8Rng,
    /// Timer registry for cancellation support.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,
    /// Nodes currently cut off from the bus (offline or aborted).
    offline: BTreeSet<NodeIndex>,

    store: Arc<MemoryStore>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with `config.n` nodes and a shared blob store.
    pub fn new(config: ProtocolConfig, seed: u64) -> Self {
        let store = Arc::new(MemoryStore::new());
        let value_ids = IdGen::new();
        let tx_ids = IdGen::new();
        // Block id 0 denotes "no previous block"; start above it.
        let block_ids = IdGen::starting_at(1);
        let verifier: Arc<dyn ThresholdVerifier> = Arc::new(MajorityVerifier);

        let mut nodes = Vec::with_capacity(config.n as usize);
        for i in 0..config.n {
            let node_seed = seed.wrapping_add(i + 1).wrapping_mul(0x517cc1b727220a95);
            let node = NodeStateMachine::new(
                NodeId(i),
                config.clone(),
                store.clone(),
                value_ids.clone(),
                tx_ids.clone(),
                block_ids.clone(),
                verifier.clone(),
                node_seed,
            )
            .expect("in-memory blob store is always available");
            nodes.push(node);
        }

        info!(nodes = nodes.len(), seed, "created simulation runner");

        Self {
            config,
            nodes,
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
            timers: HashMap::new(),
            offline: BTreeSet::new(),
            stats: SimulationStats::default(),
            store,
        }
    }

    /// Run every node's initialization pass (genesis values, first
    /// transaction, initial timers).
    pub fn initialize(&mut self) {
        for i in 0..self.nodes.len() {
            self.nodes[i].set_time(Duration::ZERO);
            let actions = self.nodes[i].initialize();
            self.process_actions(i as NodeIndex, actions);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NodeStateMachine> {
        self.nodes.get(index as usize)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Per-node protocol statistics.
    pub fn statistics(&self) -> Vec<(NodeIndex, Statistics)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i as NodeIndex, node.statistic()))
            .collect()
    }

    /// Cut a node off from the bus: its pending and future events are
    /// dropped, as are messages addressed to or sent by it.
    pub fn set_offline(&mut self, node: NodeIndex) {
        self.offline.insert(node);
    }

    pub fn set_online(&mut self, node: NodeIndex) {
        self.offline.remove(&node);
    }

    /// Schedule an event for a node at an absolute time (test hook).
    pub fn schedule_event(&mut self, node: NodeIndex, at: Duration, event: ProtocolEvent) {
        self.push_event(node, at.max(self.now), event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Main loop
    // ═══════════════════════════════════════════════════════════════════════

    /// Run until the queue drains past `end_time`.
    pub fn run_until(&mut self, end_time: Duration) {
        while let Some((&key, _)) = self.queue.first_key_value() {
            if key.time > end_time {
                break;
            }
            let (key, event) = self.queue.pop_first().expect("peeked entry exists");
            self.now = key.time;

            // A fired timer is no longer pending.
            if let Some(timer_id) = timer_id_of(&event) {
                if self.timers.get(&(key.node, timer_id)) == Some(&key) {
                    self.timers.remove(&(key.node, timer_id));
                }
            }

            if self.offline.contains(&key.node) {
                trace!(node = key.node, event = event.type_name(), "dropped for offline node");
                continue;
            }

            self.stats.events_processed += 1;
            trace!(time = ?self.now, node = key.node, event = event.type_name(), "processing");

            let node = &mut self.nodes[key.node as usize];
            node.set_time(self.now);
            let actions = node.handle(event);
            self.process_actions(key.node, actions);
        }

        if self.now < end_time {
            self.now = end_time;
        }
        debug!(
            events = self.stats.events_processed,
            messages = self.stats.messages_sent,
            final_time = ?self.now,
            "simulation step complete"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Action execution
    // ═══════════════════════════════════════════════════════════════════════

    fn process_actions(&mut self, from: NodeIndex, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send { to, message } => {
                    self.deliver(from, to.0, &message);
                }
                Action::Broadcast { message } => {
                    // The final CC block also loops back to its sender; all
                    // other broadcasts fan out to everyone else.
                    let include_sender = matches!(message, OutboundMessage::CcFinal { .. });
                    for target in 0..self.nodes.len() as NodeIndex {
                        if target == from && !include_sender {
                            continue;
                        }
                        self.deliver(from, target, &message);
                    }
                }
                Action::SetTimer { id, duration } => {
                    self.set_timer(from, id, duration);
                }
                Action::CancelTimer { id } => {
                    if let Some(key) = self.timers.remove(&(from, id)) {
                        self.queue.remove(&key);
                        self.stats.timers_cancelled += 1;
                    }
                }
                Action::RecordError { kind } => {
                    self.stats.errors.push(ErrorRecord {
                        time: self.now,
                        node: from,
                        kind,
                    });
                }
                Action::Abort { kind } => {
                    warn!(node = from, kind = %kind, "node aborted");
                    self.stats.aborts += 1;
                    self.offline.insert(from);
                }
            }
        }
    }

    fn deliver(&mut self, from: NodeIndex, to: NodeIndex, message: &OutboundMessage) {
        if self.offline.contains(&from) || self.offline.contains(&to) {
            self.stats.messages_dropped += 1;
            return;
        }
        // AC blocks propagate on the fast path; everything else samples the
        // bus delay uniformly.
        let delay = match message {
            OutboundMessage::AcBlock(_) => Duration::ZERO,
            _ => sampling::uniform_delay(&mut self.rng, self.config.delay),
        };
        self.stats.messages_sent += 1;
        self.push_event(to, self.now + delay, message.to_received_event());
    }

    fn set_timer(&mut self, node: NodeIndex, id: TimerId, duration: Duration) {
        // Re-arming replaces the pending instance.
        if let Some(old) = self.timers.remove(&(node, id)) {
            self.queue.remove(&old);
            self.stats.timers_cancelled += 1;
        }
        let key = self.push_event(node, self.now + duration, id.into_event());
        self.timers.insert((node, id), key);
        self.stats.timers_set += 1;
    }

    fn push_event(&mut self, node: NodeIndex, time: Duration, event: ProtocolEvent) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.queue.insert(key, event);
        key
    }
}

/// The timer a fired event corresponds to, if it is a timer event.
fn timer_id_of(event: &ProtocolEvent) -> Option<TimerId> {
    match event {
        ProtocolEvent::TxTimer => Some(TimerId::TxGen),
        ProtocolEvent::MiningTimer => Some(TimerId::Mining),
        ProtocolEvent::EpochTimer => Some(TimerId::Epoch),
        ProtocolEvent::GammaTimeout(phase) => Some(TimerId::Gamma(*phase)),
        _ => None,
    }
}
