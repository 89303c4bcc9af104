// Gossip flood protocol. Every minute each online client opens a cycle by
// seeding two of its observers; every receiver re-forwards to one random
// observer, capped per client per cycle. A cycle starts from the assumption
// that the whole buddy list went offline and lets the flood argue otherwise.

use std::collections::HashSet;

use rand::Rng;

use crate::ps_client::ClientView;
use crate::ps_interface::{
    ClientId, ClientMessage, ClientState, GossipId, MessageBus, MessageKind, SimTime,
    GOSSIP_CYCLE_LIMIT,
};
use crate::ps_stats::SimulatorStats;

pub struct GossipState {
    pub(crate) last_gossip_id: GossipId,
    pub(crate) messages_sent_this_cycle: u32,
    // union of all forwarders observed this cycle
    pub(crate) gossiped_nodes: HashSet<ClientId>,
    legacy_peer_draw: bool,
}

impl GossipState {
    pub fn new(legacy_peer_draw: bool) -> Self {
        Self {
            last_gossip_id: 0,
            messages_sent_this_cycle: 0,
            gossiped_nodes: HashSet::new(),
            legacy_peer_draw,
        }
    }

    pub fn gossiped_nodes(&self) -> &HashSet<ClientId> {
        &self.gossiped_nodes
    }

    /// Open a new gossip cycle: pick two observers and seed them with a
    /// chain containing only ourselves.
    pub fn run_tasks<R: Rng>(
        &mut self,
        view: &mut ClientView,
        now: SimTime,
        rng: &mut R,
        bus: &mut MessageBus,
    ) {
        if view.observers.is_empty() {
            return;
        }

        self.messages_sent_this_cycle = 2;
        self.gossiped_nodes.clear();
        self.last_gossip_id = now;

        let first = draw_observer(view, rng);
        let second = if self.legacy_peer_draw {
            draw_second_observer_legacy(view, first, rng)
        } else {
            draw_second_observer(view, first, rng)
        };

        let mut chain = HashSet::new();
        chain.insert(view.id);

        let first_target = view.observers[first];
        let second_target = view.observers[second];
        bus.push(view.create_message(first_target, MessageKind::Gossip, now, now, chain.clone()));
        bus.push(view.create_message(second_target, MessageKind::Gossip, now, now, chain));
    }

    pub fn handle_message<R: Rng>(
        &mut self,
        view: &mut ClientView,
        message: &ClientMessage,
        rng: &mut R,
        bus: &mut MessageBus,
        stats: &mut SimulatorStats,
    ) {
        if message.gossip_id != self.last_gossip_id {
            // first word of a new cycle: assume every buddy went offline
            // until the flood proves otherwise
            self.gossiped_nodes.clear();
            self.messages_sent_this_cycle = 0;
            self.last_gossip_id = message.gossip_id;

            for (&buddy, believed) in view.buddy_state.iter_mut() {
                *believed = ClientState::Offline;

                if stats.last_known_state(buddy) == ClientState::Offline {
                    stats.record_presence_update();
                    let delta = message.timestamp - stats.last_switch_time(message.sender);
                    stats.add_convergence_time(delta);
                }
            }
        }

        if self.messages_sent_this_cycle >= GOSSIP_CYCLE_LIMIT {
            return;
        }

        let forward_to = if view.observers.is_empty() {
            None
        } else {
            Some(view.observers[draw_observer(view, rng)])
        };

        self.gossiped_nodes.extend(message.chain.iter().copied());

        // anyone forwarding the chain is alive, and the flood reaches every
        // online client within the minute; treat the whole buddy list as
        // online for this cycle
        for (&buddy, believed) in view.buddy_state.iter_mut() {
            if *believed != ClientState::Online
                && stats.last_known_state(buddy) == ClientState::Online
            {
                stats.record_presence_update();
                let delta = message.timestamp - stats.last_switch_time(message.sender);
                stats.add_convergence_time(delta);
            }
            *believed = ClientState::Online;
        }

        if let Some(recipient) = forward_to {
            let mut chain = message.chain.clone();
            chain.insert(view.id);
            bus.push(view.create_message(
                recipient,
                MessageKind::Gossip,
                message.timestamp,
                message.gossip_id,
                chain,
            ));
            self.messages_sent_this_cycle += 1;
        }
    }
}

fn draw_observer<R: Rng>(view: &ClientView, rng: &mut R) -> usize {
    let mut index = rng.gen_range(0..view.observers.len());
    // observers never contain self; re-draw if one somehow does
    while view.observers[index] == view.id {
        index = rng.gen_range(0..view.observers.len());
    }
    index
}

fn draw_second_observer<R: Rng>(view: &ClientView, first: usize, rng: &mut R) -> usize {
    if view.observers.len() == 1 {
        // the sole observer receives both cycle openers
        return first;
    }

    let mut index = rng.gen_range(0..view.observers.len());
    while index == first || view.observers[index] == view.id {
        index = rng.gen_range(0..view.observers.len());
    }
    index
}

// Draw the first release shipped with: the re-draw samples the buddy list
// even though the index targets the observer list.
fn draw_second_observer_legacy<R: Rng>(view: &ClientView, first: usize, rng: &mut R) -> usize {
    let mut index = rng.gen_range(0..view.observers.len());
    while index == first || view.buddies.get(index) == Some(&view.id) {
        index = rng.gen_range(0..view.buddies.len());
    }
    index % view.observers.len()
}
