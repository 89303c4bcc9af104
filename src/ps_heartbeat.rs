// Round-robin heartbeat protocol. Each online client pushes a heartbeat to
// one observer every twelve seconds, rotating through the observer list, and
// expires buddies it has not heard from for three full sweeps.

use std::collections::{HashMap, HashSet};

use crate::ps_client::ClientView;
use crate::ps_interface::{
    ClientId, ClientMessage, ClientState, MessageBus, MessageKind, SimTime, HEARTBEAT_EXPIRY_SWEEPS,
    HEARTBEAT_PERIOD, HEARTBEAT_SEND_GAP,
};
use crate::ps_stats::SimulatorStats;

pub struct HeartbeatState {
    // position of the next round-robin recipient
    next_observer: usize,
    last_send_time: SimTime,
    // second of the most recent heartbeat received, per buddy
    last_buddy_update: HashMap<ClientId, SimTime>,
    heartbeats_sent: u64,
}

impl HeartbeatState {
    pub fn new() -> Self {
        Self {
            next_observer: 0,
            last_send_time: 0,
            last_buddy_update: HashMap::new(),
            heartbeats_sent: 0,
        }
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent
    }

    pub fn last_buddy_update(&self, buddy: ClientId) -> Option<SimTime> {
        self.last_buddy_update.get(&buddy).copied()
    }

    pub fn run_tasks(
        &mut self,
        view: &mut ClientView,
        now: SimTime,
        bus: &mut MessageBus,
        stats: &mut SimulatorStats,
    ) {
        self.send_heartbeat(view, now, bus);
        self.expire_stale_buddies(view, now, stats);
    }

    /// Record a heartbeat from one of our buddies.
    pub fn handle_message(
        &mut self,
        view: &mut ClientView,
        message: &ClientMessage,
        stats: &mut SimulatorStats,
    ) {
        let Some(believed) = view.buddy_state.get_mut(&message.sender) else {
            // heartbeats only flow along observer edges, so the sender is
            // one of our buddies; anything else is dropped
            return;
        };

        if *believed == ClientState::Offline {
            stats.record_presence_update();
            let delta = message.timestamp - stats.last_switch_time(message.sender);
            stats.add_convergence_time(delta);
        }

        *believed = ClientState::Online;
        self.last_buddy_update.insert(message.sender, message.timestamp);
    }

    fn send_heartbeat(&mut self, view: &mut ClientView, now: SimTime, bus: &mut MessageBus) {
        if now - self.last_send_time <= HEARTBEAT_SEND_GAP || view.observers.is_empty() {
            return;
        }

        let recipient = view.observers[self.next_observer];
        bus.push(view.create_message(recipient, MessageKind::Heartbeat, now, 0, HashSet::new()));

        self.last_send_time = now;
        self.heartbeats_sent += 1;

        self.next_observer += 1;
        if self.next_observer >= view.observers.len() {
            self.next_observer = 0;
        }
    }

    fn expire_stale_buddies(
        &mut self,
        view: &mut ClientView,
        now: SimTime,
        stats: &mut SimulatorStats,
    ) {
        let expiry_window =
            view.observers.len() as SimTime * HEARTBEAT_PERIOD * HEARTBEAT_EXPIRY_SWEEPS;

        for buddy in &view.buddies {
            let believed = view
                .buddy_state
                .get_mut(buddy)
                .expect("buddy without belief entry");

            if *believed == ClientState::Offline {
                continue;
            }

            let last_update = self.last_buddy_update.get(buddy).copied().unwrap_or(0);
            if now - last_update > expiry_window {
                stats.record_presence_update();
                let delta = now - stats.last_switch_time(*buddy);
                stats.add_convergence_time(delta);

                *believed = ClientState::Offline;
            }
        }
    }
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}
