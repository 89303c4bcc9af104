// The shared client abstraction. `ClientView` is the per-client slice of the
// network a protocol operates on; `Client` pairs a view with the state of
// the protocol the run was configured for.
//
// Buddies are the peers this client watches; observers are the peers that
// watch it. Status traffic flows to the observers, never to the buddies: a
// client pushes its presence to whoever cares about it.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::ps_gossip::GossipState;
use crate::ps_heartbeat::HeartbeatState;
use crate::ps_interface::{
    ClientId, ClientMessage, ClientState, GossipId, MessageBus, MessageKind, SimTime,
};
use crate::ps_stats::SimulatorStats;

pub struct ClientView {
    pub(crate) id: ClientId,
    pub(crate) target_buddy_count: u32,
    pub(crate) state: ClientState,
    // initial wake offset, bookkeeping only after construction
    pub(crate) sleep_period: SimTime,

    pub(crate) buddies: Vec<ClientId>,
    pub(crate) buddy_set: HashSet<ClientId>,
    pub(crate) observers: Vec<ClientId>,
    pub(crate) observer_set: HashSet<ClientId>,

    // believed state per buddy; the key set always equals the buddy set
    pub(crate) buddy_state: HashMap<ClientId, ClientState>,
}

impl ClientView {
    pub fn new(
        id: ClientId,
        target_buddy_count: u32,
        sleep_period: SimTime,
        initial_state: ClientState,
    ) -> Self {
        Self {
            id,
            target_buddy_count,
            state: initial_state,
            sleep_period,
            buddies: Vec::new(),
            buddy_set: HashSet::new(),
            observers: Vec::new(),
            observer_set: HashSet::new(),
            buddy_state: HashMap::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == ClientState::Online
    }

    pub fn target_buddy_count(&self) -> u32 {
        self.target_buddy_count
    }

    pub fn sleep_period(&self) -> SimTime {
        self.sleep_period
    }

    pub fn buddies(&self) -> &[ClientId] {
        &self.buddies
    }

    pub fn observers(&self) -> &[ClientId] {
        &self.observers
    }

    pub fn buddy_count(&self) -> usize {
        self.buddy_set.len()
    }

    pub fn is_buddy(&self, client: ClientId) -> bool {
        self.buddy_set.contains(&client)
    }

    pub fn is_observer(&self, client: ClientId) -> bool {
        self.observer_set.contains(&client)
    }

    pub fn believed_state(&self, buddy: ClientId) -> Option<ClientState> {
        self.buddy_state.get(&buddy).copied()
    }

    /// Flip between online and offline, returning the new state. Pure local
    /// effect; truth table, stats and schedule bookkeeping stay with the
    /// simulator.
    pub fn switch_state(&mut self) -> ClientState {
        self.state = self.state.toggled();
        self.state
    }

    /// Start watching `buddy`, seeding the belief with `state`. Rejects self
    /// and duplicates.
    pub fn add_buddy(&mut self, buddy: ClientId, state: ClientState) -> bool {
        if buddy == self.id || self.buddy_set.contains(&buddy) {
            return false;
        }

        self.buddies.push(buddy);
        self.buddy_set.insert(buddy);
        self.buddy_state.insert(buddy, state);
        true
    }

    pub fn add_observer(&mut self, observer: ClientId) -> bool {
        if observer == self.id || self.observer_set.contains(&observer) {
            return false;
        }

        self.observers.push(observer);
        self.observer_set.insert(observer);
        true
    }

    /// Score every belief entry against the truth table.
    pub fn verify_state(&self, truth: &[ClientState], stats: &mut SimulatorStats) {
        for (&buddy, &believed) in &self.buddy_state {
            stats.record_buddy_record(truth[buddy as usize] == believed);
        }
    }

    pub(crate) fn create_message(
        &self,
        recipient: ClientId,
        kind: MessageKind,
        timestamp: SimTime,
        gossip_id: GossipId,
        chain: HashSet<ClientId>,
    ) -> ClientMessage {
        ClientMessage {
            recipient,
            sender: self.id,
            timestamp,
            gossip_id,
            kind,
            chain,
        }
    }
}

pub enum ProtocolState {
    Gossip(GossipState),
    Heartbeat(HeartbeatState),
}

pub struct Client {
    view: ClientView,
    proto: ProtocolState,
}

impl Client {
    pub fn gossip(
        id: ClientId,
        target_buddy_count: u32,
        sleep_period: SimTime,
        initial_state: ClientState,
        legacy_peer_draw: bool,
    ) -> Self {
        Self {
            view: ClientView::new(id, target_buddy_count, sleep_period, initial_state),
            proto: ProtocolState::Gossip(GossipState::new(legacy_peer_draw)),
        }
    }

    pub fn heartbeat(
        id: ClientId,
        target_buddy_count: u32,
        sleep_period: SimTime,
        initial_state: ClientState,
    ) -> Self {
        Self {
            view: ClientView::new(id, target_buddy_count, sleep_period, initial_state),
            proto: ProtocolState::Heartbeat(HeartbeatState::new()),
        }
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    pub fn id(&self) -> ClientId {
        self.view.id
    }

    pub fn state(&self) -> ClientState {
        self.view.state
    }

    pub fn is_online(&self) -> bool {
        self.view.is_online()
    }

    pub fn switch_state(&mut self) -> ClientState {
        self.view.switch_state()
    }

    pub fn add_buddy(&mut self, buddy: ClientId, state: ClientState) -> bool {
        self.view.add_buddy(buddy, state)
    }

    pub fn add_observer(&mut self, observer: ClientId) -> bool {
        self.view.add_observer(observer)
    }

    pub fn verify_state(&self, truth: &[ClientState], stats: &mut SimulatorStats) {
        self.view.verify_state(truth, stats);
    }

    /// Heartbeats pushed so far; 0 for a gossip client.
    pub fn heartbeats_sent(&self) -> u64 {
        match &self.proto {
            ProtocolState::Heartbeat(heartbeat) => heartbeat.heartbeats_sent(),
            ProtocolState::Gossip(_) => 0,
        }
    }

    /// Run the periodic protocol work for this virtual second. Offline
    /// clients do nothing.
    pub fn run_tasks<R: Rng>(
        &mut self,
        now: SimTime,
        rng: &mut R,
        bus: &mut MessageBus,
        stats: &mut SimulatorStats,
    ) {
        if !self.view.is_online() {
            return;
        }

        match &mut self.proto {
            ProtocolState::Gossip(gossip) => gossip.run_tasks(&mut self.view, now, rng, bus),
            ProtocolState::Heartbeat(heartbeat) => {
                heartbeat.run_tasks(&mut self.view, now, bus, stats)
            }
        }
    }

    /// React to an inbound message. Offline clients do not respond; kinds
    /// the active protocol has no handler for (Discovery included) fall
    /// through silently.
    pub fn handle_message<R: Rng>(
        &mut self,
        message: &ClientMessage,
        rng: &mut R,
        bus: &mut MessageBus,
        stats: &mut SimulatorStats,
    ) {
        if !self.view.is_online() {
            return;
        }

        match (&mut self.proto, message.kind) {
            (ProtocolState::Gossip(gossip), MessageKind::Gossip) => {
                gossip.handle_message(&mut self.view, message, rng, bus, stats)
            }
            (ProtocolState::Heartbeat(heartbeat), MessageKind::Heartbeat) => {
                heartbeat.handle_message(&mut self.view, message, stats)
            }
            _ => {}
        }
    }
}
