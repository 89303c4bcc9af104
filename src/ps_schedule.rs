// Sleep schedule: virtual second -> clients due to flip their state then.
// Ordered containers keep wake processing deterministic for a fixed seed.

use std::collections::{BTreeMap, BTreeSet};

use crate::ps_interface::{ClientId, SimTime};

#[derive(Default)]
pub struct SleepSchedule {
    wakes: BTreeMap<SimTime, BTreeSet<ClientId>>,
}

impl SleepSchedule {
    pub fn new() -> Self {
        Self {
            wakes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, at: SimTime, client: ClientId) {
        self.wakes.entry(at).or_default().insert(client);
    }

    /// Remove and return the clients due at `now`, in id order.
    pub fn take_due(&mut self, now: SimTime) -> Vec<ClientId> {
        match self.wakes.remove(&now) {
            Some(due) => due.into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Drop a stale slot, if one is still around.
    pub fn discard(&mut self, at: SimTime) {
        self.wakes.remove(&at);
    }

    pub fn earliest(&self) -> Option<SimTime> {
        self.wakes.keys().next().copied()
    }

    pub fn latest(&self) -> Option<SimTime> {
        self.wakes.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.wakes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_clients_come_back_once_in_id_order() {
        let mut schedule = SleepSchedule::new();
        schedule.insert(10, 7);
        schedule.insert(10, 3);
        schedule.insert(12, 1);

        assert_eq!(schedule.take_due(10), vec![3, 7]);
        assert_eq!(schedule.take_due(10), Vec::<ClientId>::new());
        assert_eq!(schedule.earliest(), Some(12));
    }

    #[test]
    fn discard_clears_a_slot() {
        let mut schedule = SleepSchedule::new();
        schedule.insert(5, 0);
        schedule.discard(5);
        assert!(schedule.is_empty());

        // discarding an absent slot is harmless
        schedule.discard(99);
    }

    #[test]
    fn duplicate_inserts_collapse() {
        let mut schedule = SleepSchedule::new();
        schedule.insert(4, 2);
        schedule.insert(4, 2);
        assert_eq!(schedule.take_due(4), vec![2]);
    }
}
