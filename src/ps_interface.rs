// General data types used by the simulator and the client protocols.

use std::collections::{HashSet, VecDeque};

// all the same numeric type to allow direct arena indexing
pub type ClientId = u32;

// virtual time, whole simulation seconds
pub type SimTime = u32;

// a gossip cycle is identified by the second it started at
pub type GossipId = u32;

/// Width of the sleep window: initial wake times are drawn from
/// `[0, WAKE_WINDOW)`, every later one from `[1, WAKE_WINDOW]` seconds ahead.
pub const WAKE_WINDOW: SimTime = 4000;

/// Gossip cycles start at every multiple of this many seconds.
pub const GOSSIP_INTERVAL: SimTime = 60;

/// Upper bound on messages a client forwards within one gossip cycle.
pub const GOSSIP_CYCLE_LIMIT: u32 = 5;

/// A heartbeat is due once more than this many seconds passed since the last.
pub const HEARTBEAT_SEND_GAP: SimTime = 11;

/// Effective heartbeat period, the base unit of the expiry window.
pub const HEARTBEAT_PERIOD: SimTime = 12;

/// Full round-robin sweeps a buddy may miss before it is declared offline.
pub const HEARTBEAT_EXPIRY_SWEEPS: SimTime = 3;

/// Protocol-only seconds appended after the main phase so views can settle.
pub const GOSSIP_CONVERGENCE_SPAN: SimTime = 1200;
pub const HEARTBEAT_CONVERGENCE_SPAN: SimTime = 2200;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClientState {
    Online,
    Offline,
}

impl ClientState {
    pub fn toggled(self) -> Self {
        match self {
            ClientState::Online => ClientState::Offline,
            ClientState::Offline => ClientState::Online,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Heartbeat,
    // reserved on the wire, nothing sends or handles it yet
    Discovery,
    Gossip,
}

/// A presence message in flight. Copied into the bus by value. The chain
/// holds every client that has forwarded this gossip cycle so far; it is
/// empty for heartbeats.
#[derive(Clone, Debug)]
pub struct ClientMessage {
    pub recipient: ClientId,
    pub sender: ClientId,
    pub timestamp: SimTime,
    pub gossip_id: GossipId,
    pub kind: MessageKind,
    pub chain: HashSet<ClientId>,
}

/// Unbounded FIFO of in-flight messages. The simulator drains it to empty on
/// every dispatch cycle; messages enqueued by handlers mid-drain are
/// delivered within the same drain.
#[derive(Default)]
pub struct MessageBus {
    queue: VecDeque<ClientMessage>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, message: ClientMessage) {
        self.queue.push_back(message);
    }

    pub fn pop(&mut self) -> Option<ClientMessage> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
