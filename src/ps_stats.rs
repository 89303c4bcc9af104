// Run-wide counters plus the per-client presence ledger. The simulator owns
// a single instance; protocol handlers read the ledger to decide whether an
// observed change counts as a convergence sample.

use crate::ps_interface::{ClientId, ClientState, SimTime};

pub struct SimulatorStats {
    presence_updates: u64,
    messages_sent: u64,
    messages_dropped: u64,
    messages_delivered: u64,
    total_convergence_time: u64,
    total_sleep_time: u64,
    sleep_states: u64,
    total_buddy_records: u64,
    total_correct_buddy_records: u64,

    // true state history, indexed by client id
    last_switch_time: Vec<SimTime>,
    last_known_state: Vec<ClientState>,
}

impl SimulatorStats {
    pub fn new(node_count: usize) -> Self {
        Self {
            presence_updates: 0,
            messages_sent: 0,
            messages_dropped: 0,
            messages_delivered: 0,
            total_convergence_time: 0,
            total_sleep_time: 0,
            sleep_states: 0,
            total_buddy_records: 0,
            total_correct_buddy_records: 0,
            last_switch_time: vec![0; node_count],
            last_known_state: vec![ClientState::Offline; node_count],
        }
    }

    /// Record that `client` truly switched to `state` at `timestamp`.
    pub fn record_state_switch(&mut self, client: ClientId, timestamp: SimTime, state: ClientState) {
        self.last_switch_time[client as usize] = timestamp;
        self.last_known_state[client as usize] = state;
    }

    pub fn last_switch_time(&self, client: ClientId) -> SimTime {
        self.last_switch_time[client as usize]
    }

    pub fn last_known_state(&self, client: ClientId) -> ClientState {
        self.last_known_state[client as usize]
    }

    pub fn record_presence_update(&mut self) {
        self.presence_updates += 1;
    }

    pub fn add_convergence_time(&mut self, delta: SimTime) {
        self.total_convergence_time += u64::from(delta);
    }

    pub fn record_message_sent(&mut self) {
        self.messages_sent += 1;
    }

    pub fn record_message_dropped(&mut self) {
        self.messages_dropped += 1;
    }

    pub fn record_message_delivered(&mut self) {
        self.messages_delivered += 1;
    }

    pub fn add_sleep_time(&mut self, duration: SimTime) {
        self.total_sleep_time += u64::from(duration);
    }

    pub fn record_sleep_state(&mut self) {
        self.sleep_states += 1;
    }

    pub fn record_buddy_record(&mut self, correct: bool) {
        self.total_buddy_records += 1;
        if correct {
            self.total_correct_buddy_records += 1;
        }
    }

    pub fn presence_updates(&self) -> u64 {
        self.presence_updates
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped
    }

    pub fn messages_delivered(&self) -> u64 {
        self.messages_delivered
    }

    pub fn total_convergence_time(&self) -> u64 {
        self.total_convergence_time
    }

    pub fn total_sleep_time(&self) -> u64 {
        self.total_sleep_time
    }

    pub fn sleep_states(&self) -> u64 {
        self.sleep_states
    }

    pub fn total_buddy_records(&self) -> u64 {
        self.total_buddy_records
    }

    pub fn total_correct_buddy_records(&self) -> u64 {
        self.total_correct_buddy_records
    }

    /// Mean seconds between a true switch and the believing side catching up.
    pub fn average_convergence_time(&self) -> u64 {
        if self.presence_updates == 0 {
            0
        } else {
            self.total_convergence_time / self.presence_updates
        }
    }

    pub fn average_sleep_time(&self) -> u64 {
        if self.sleep_states == 0 {
            0
        } else {
            self.total_sleep_time / self.sleep_states
        }
    }

    /// Fraction of verified buddy records that matched the truth table.
    pub fn accuracy_rate(&self) -> f64 {
        if self.total_buddy_records == 0 {
            0.0
        } else {
            self.total_correct_buddy_records as f64 / self.total_buddy_records as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_guard_against_empty_runs() {
        let stats = SimulatorStats::new(4);
        assert_eq!(stats.average_convergence_time(), 0);
        assert_eq!(stats.average_sleep_time(), 0);
        assert_eq!(stats.accuracy_rate(), 0.0);
    }

    #[test]
    fn state_switches_overwrite_the_ledger() {
        let mut stats = SimulatorStats::new(2);
        assert_eq!(stats.last_switch_time(1), 0);

        stats.record_state_switch(1, 17, ClientState::Online);
        assert_eq!(stats.last_switch_time(1), 17);
        assert_eq!(stats.last_known_state(1), ClientState::Online);

        stats.record_state_switch(1, 40, ClientState::Offline);
        assert_eq!(stats.last_switch_time(1), 40);
        assert_eq!(stats.last_known_state(1), ClientState::Offline);
    }

    #[test]
    fn counters_accumulate() {
        let mut stats = SimulatorStats::new(1);

        stats.record_message_sent();
        stats.record_message_sent();
        stats.record_message_dropped();
        stats.record_message_delivered();
        stats.record_presence_update();
        stats.add_convergence_time(30);
        stats.add_sleep_time(2000);
        stats.record_sleep_state();
        stats.record_buddy_record(true);
        stats.record_buddy_record(false);

        assert_eq!(stats.messages_sent(), 2);
        assert_eq!(stats.messages_dropped(), 1);
        assert_eq!(stats.messages_delivered(), 1);
        assert_eq!(stats.average_convergence_time(), 30);
        assert_eq!(stats.average_sleep_time(), 2000);
        assert_eq!(stats.total_buddy_records(), 2);
        assert_eq!(stats.total_correct_buddy_records(), 1);
        assert_eq!(stats.accuracy_rate(), 0.5);
    }
}
