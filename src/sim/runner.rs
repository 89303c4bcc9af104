// Simulation runner: owns the client arena, the bus, the sleep schedule,
// the stats package and the truth table, and drives the virtual clock one
// second at a time.

use std::collections::BTreeSet;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ps_client::Client;
use crate::ps_interface::{
    ClientId, ClientState, MessageBus, SimTime, GOSSIP_CONVERGENCE_SPAN, GOSSIP_INTERVAL,
    HEARTBEAT_CONVERGENCE_SPAN, WAKE_WINDOW,
};
use crate::ps_schedule::SleepSchedule;
use crate::ps_stats::SimulatorStats;

use super::config::{LossModel, Protocol, SimConfig};
use super::report::{PhaseReport, SimReport};

pub struct Simulator<R: Rng = StdRng> {
    config: SimConfig,
    rng: R,

    clients: Vec<Client>,
    bus: MessageBus,
    schedule: SleepSchedule,
    stats: SimulatorStats,

    // canonical state per client, the oracle for accuracy scoring
    truth: Vec<ClientState>,

    online: BTreeSet<ClientId>,
    offline: BTreeSet<ClientId>,

    elapsed: SimTime,
    // messages pushed through the loss model so far
    dispatched: u64,
}

impl Simulator<StdRng> {
    pub fn new(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Simulator<R> {
    /// Build a simulator around an externally supplied random source.
    pub fn with_rng(config: SimConfig, rng: R) -> Self {
        let nodes = config.nodes as usize;
        let mut sim = Self {
            rng,
            clients: Vec::with_capacity(nodes),
            bus: MessageBus::new(),
            schedule: SleepSchedule::new(),
            stats: SimulatorStats::new(nodes),
            truth: Vec::with_capacity(nodes),
            online: BTreeSet::new(),
            offline: BTreeSet::new(),
            elapsed: 0,
            dispatched: 0,
            config,
        };
        sim.initialize();
        sim
    }

    pub fn client(&self, id: ClientId) -> &Client {
        &self.clients[id as usize]
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    pub fn true_state(&self, id: ClientId) -> ClientState {
        self.truth[id as usize]
    }

    pub fn elapsed(&self) -> SimTime {
        self.elapsed
    }

    fn initialize(&mut self) {
        info!("initializing {} clients", self.config.nodes);

        for id in 0..self.config.nodes {
            let wake = self.rng.gen_range(0..WAKE_WINDOW);
            let state = if self.rng.gen_range(0..2) == 0 {
                ClientState::Online
            } else {
                ClientState::Offline
            };

            let client = match self.config.protocol {
                Protocol::Gossip => Client::gossip(
                    id,
                    self.config.buddies,
                    wake,
                    state,
                    self.config.legacy_peer_draw,
                ),
                Protocol::Heartbeat => Client::heartbeat(id, self.config.buddies, wake, state),
            };

            self.clients.push(client);
            self.schedule.insert(wake, id);
            self.stats.record_state_switch(id, 0, state);
            self.truth.push(state);

            match state {
                ClientState::Online => self.online.insert(id),
                ClientState::Offline => self.offline.insert(id),
            };
        }

        info!("generating buddy lists");

        // every accepted buddy edge registers the reverse observer edge and
        // seeds the belief with the buddy's true state at wiring time
        for id in 0..self.config.nodes {
            while self.clients[id as usize].view().buddy_count() < self.config.buddies as usize {
                let buddy = self.rng.gen_range(0..self.config.nodes);
                let buddy_state = self.truth[buddy as usize];

                if self.clients[id as usize].add_buddy(buddy, buddy_state) {
                    self.clients[buddy as usize].add_observer(id);
                }
            }
        }
    }

    /// Run the main phase, print its report, run the convergence phase and
    /// score every belief table against the truth.
    pub fn run(&mut self) -> SimReport {
        match self.config.protocol {
            Protocol::Gossip => self.run_gossip_main(),
            Protocol::Heartbeat => self.run_heartbeat_main(),
        }

        let main_phase = self.phase_report();
        main_phase.print();

        self.run_convergence();

        for client in &self.clients {
            client.verify_state(&self.truth, &mut self.stats);
        }

        SimReport {
            main_phase,
            total_buddy_records: self.stats.total_buddy_records(),
            total_correct_buddy_records: self.stats.total_correct_buddy_records(),
            accuracy_rate: self.stats.accuracy_rate(),
        }
    }

    // One iteration per second of simulated time; gossip cycles open every
    // minute and the bus drains once per opened cycle.
    fn run_gossip_main(&mut self) {
        while self.elapsed < self.config.seconds {
            let now = self.elapsed;

            if now % GOSSIP_INTERVAL == 0 {
                for &id in &self.online {
                    self.clients[id as usize].run_tasks(
                        now,
                        &mut self.rng,
                        &mut self.bus,
                        &mut self.stats,
                    );
                }
                self.dispatch_pending_messages();
            }

            self.process_wakes(now);
            self.advance();
        }
    }

    // The heartbeat loop drains after every single client, modelling a tight
    // polling loop where a forwarded heartbeat lands before the next client
    // runs.
    fn run_heartbeat_main(&mut self) {
        while self.elapsed < self.config.seconds {
            let now = self.elapsed;

            for index in 0..self.clients.len() {
                if !self.clients[index].is_online() {
                    continue;
                }
                self.clients[index].run_tasks(now, &mut self.rng, &mut self.bus, &mut self.stats);
                self.dispatch_pending_messages();
            }

            self.process_wakes(now);
            self.advance();
        }
    }

    /// Consistency phase: force every client online, stop consulting the
    /// sleep schedule, and let the protocol run long enough for every
    /// belief table to settle before scoring.
    fn run_convergence(&mut self) {
        let span = match self.config.protocol {
            Protocol::Gossip => GOSSIP_CONVERGENCE_SPAN,
            Protocol::Heartbeat => HEARTBEAT_CONVERGENCE_SPAN,
        };

        info!("converging clients for {} seconds", span);

        for id in 0..self.config.nodes {
            if !self.clients[id as usize].is_online() {
                let now = self.elapsed;
                self.switch_client_state(id, now);
            }
        }

        let end = self.elapsed + span;
        while self.elapsed < end {
            let now = self.elapsed;

            match self.config.protocol {
                Protocol::Gossip => {
                    if now % GOSSIP_INTERVAL == 0 {
                        for &id in &self.online {
                            self.clients[id as usize].run_tasks(
                                now,
                                &mut self.rng,
                                &mut self.bus,
                                &mut self.stats,
                            );
                        }
                        self.dispatch_pending_messages();
                    }
                }
                Protocol::Heartbeat => {
                    for index in 0..self.clients.len() {
                        self.clients[index].run_tasks(
                            now,
                            &mut self.rng,
                            &mut self.bus,
                            &mut self.stats,
                        );
                        self.dispatch_pending_messages();
                    }
                }
            }

            self.elapsed += 1;
        }
    }

    /// Flip a client between online and offline, schedule its next wake and
    /// keep truth table, index sets and stats in step.
    fn switch_client_state(&mut self, id: ClientId, now: SimTime) {
        let state = self.clients[id as usize].switch_state();

        let sleep = self.rng.gen_range(1..=WAKE_WINDOW);
        self.schedule.insert(now + sleep, id);
        self.stats.add_sleep_time(sleep);
        self.stats.record_sleep_state();

        self.truth[id as usize] = state;
        match state {
            ClientState::Online => {
                self.offline.remove(&id);
                self.online.insert(id);
            }
            ClientState::Offline => {
                self.online.remove(&id);
                self.offline.insert(id);
            }
        }

        self.stats.record_state_switch(id, now, state);
    }

    /// Drain the bus to empty. Every popped message counts as sent; the
    /// loss model decides whether it reaches its recipient. Messages pushed
    /// by handlers during the drain are delivered in the same drain.
    fn dispatch_pending_messages(&mut self) {
        while let Some(message) = self.bus.pop() {
            self.stats.record_message_sent();

            if self.message_is_lost() {
                self.stats.record_message_dropped();
                continue;
            }

            self.stats.record_message_delivered();
            self.clients[message.recipient as usize].handle_message(
                &message,
                &mut self.rng,
                &mut self.bus,
                &mut self.stats,
            );
        }
    }

    fn message_is_lost(&mut self) -> bool {
        match self.config.loss {
            LossModel::Bernoulli { percent } => self.rng.gen_range(0..100) < percent,
            LossModel::EveryNth { n } => {
                if n == 0 {
                    return false;
                }
                self.dispatched += 1;
                self.dispatched % u64::from(n) == 0
            }
        }
    }

    fn process_wakes(&mut self, now: SimTime) {
        for id in self.schedule.take_due(now) {
            self.switch_client_state(id, now);
        }
    }

    fn advance(&mut self) {
        if self.elapsed > 0 {
            self.schedule.discard(self.elapsed - 1);
        }
        self.elapsed += 1;
        if self.elapsed % 10_000 == 0 {
            info!("{} seconds elapsed", self.elapsed);
        }
    }

    fn phase_report(&self) -> PhaseReport {
        let seconds = self.config.seconds;
        PhaseReport {
            presence_updates: self.stats.presence_updates(),
            messages_sent: self.stats.messages_sent(),
            messages_dropped: self.stats.messages_dropped(),
            messages_per_second: if seconds == 0 {
                0.0
            } else {
                self.stats.messages_sent() as f64 / f64::from(seconds)
            },
            average_convergence_time: self.stats.average_convergence_time(),
            average_sleep_time: self.stats.average_sleep_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::ps_interface::{HEARTBEAT_PERIOD, HEARTBEAT_SEND_GAP};

    fn config(
        protocol: Protocol,
        nodes: u32,
        buddies: u32,
        seconds: SimTime,
        seed: u64,
    ) -> SimConfig {
        SimConfig {
            protocol,
            nodes,
            buddies,
            seconds,
            seed: Some(seed),
            ..SimConfig::default()
        }
    }

    #[test]
    fn buddy_graph_is_wired_symmetrically() {
        let sim = Simulator::new(config(Protocol::Gossip, 4, 2, 0, 1));

        assert_eq!(sim.clients().len(), 4);
        for client in sim.clients() {
            let view = client.view();

            assert_eq!(view.buddies().len(), 2);
            assert!(!view.buddies().contains(&view.id()));
            let distinct: HashSet<_> = view.buddies().iter().collect();
            assert_eq!(distinct.len(), view.buddies().len());

            for &buddy in view.buddies() {
                assert!(sim.client(buddy).view().is_observer(view.id()));
            }

            // beliefs were seeded from the truth at wiring time
            for &buddy in view.buddies() {
                assert!(view.believed_state(buddy).is_some());
            }
        }
    }

    #[test]
    fn initial_wakes_fall_inside_the_window() {
        let sim = Simulator::new(config(Protocol::Gossip, 50, 5, 0, 3));

        assert!(sim.schedule.earliest().unwrap() < WAKE_WINDOW);
        assert!(sim.schedule.latest().unwrap() < WAKE_WINDOW);
        for client in sim.clients() {
            assert!(client.view().sleep_period() < WAKE_WINDOW);
        }
    }

    #[test]
    fn rescheduled_wakes_stay_in_bounds() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 2, 1, 0, 3));

        sim.switch_client_state(0, 5000);

        let latest = sim.schedule.latest().unwrap();
        assert!(latest >= 5001);
        assert!(latest <= 5000 + WAKE_WINDOW);

        assert_eq!(sim.stats().sleep_states(), 1);
        let slept = sim.stats().total_sleep_time();
        assert!((1..=u64::from(WAKE_WINDOW)).contains(&slept));
    }

    #[test]
    fn state_switch_keeps_truth_and_index_sets_in_step() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 2, 1, 0, 3));
        let before = sim.true_state(0);

        sim.switch_client_state(0, 10);

        assert_eq!(sim.true_state(0), before.toggled());
        assert_eq!(sim.true_state(0), sim.client(0).state());
        assert_eq!(sim.stats().last_known_state(0), sim.true_state(0));
        assert_eq!(sim.stats().last_switch_time(0), 10);
        match sim.true_state(0) {
            ClientState::Online => assert!(sim.online.contains(&0)),
            ClientState::Offline => assert!(sim.offline.contains(&0)),
        }
    }

    #[test]
    fn empty_main_phase_converges_to_full_accuracy() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 4, 2, 0, 1));
        let report = sim.run();

        assert_eq!(report.main_phase.messages_sent, 0);
        assert_eq!(report.main_phase.messages_per_second, 0.0);

        // after the forced flip everyone is truly online, and twenty gossip
        // cycles leave every belief table agreeing
        assert_eq!(report.total_buddy_records, 4 * 2);
        assert_eq!(report.accuracy_rate, 1.0);
    }

    #[test]
    fn two_clients_learn_each_other_is_online() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 2, 1, 0, 5));
        sim.run();

        assert_eq!(sim.client(0).view().believed_state(1), Some(ClientState::Online));
        assert_eq!(sim.client(1).view().believed_state(0), Some(ClientState::Online));
    }

    #[test]
    fn message_accounting_is_consistent() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 10, 3, 600, 42));
        let report = sim.run();

        let stats = sim.stats();
        assert_eq!(
            stats.messages_sent(),
            stats.messages_dropped() + stats.messages_delivered()
        );

        assert!(report.main_phase.messages_sent > 0);
        let expected_rate = report.main_phase.messages_sent as f64 / 600.0;
        assert!((report.main_phase.messages_per_second - expected_rate).abs() < f64::EPSILON);

        for client in sim.clients() {
            assert_eq!(client.view().buddies().len(), 3);
        }
    }

    #[test]
    fn heartbeat_round_robin_reaches_every_observer() {
        let mut sim = Simulator::new(config(Protocol::Heartbeat, 10, 3, 0, 42));
        sim.run();

        // the convergence phase ran every client for 2200 protocol seconds
        let expected_sends =
            u64::from(HEARTBEAT_CONVERGENCE_SPAN) / u64::from(HEARTBEAT_PERIOD) - 1;

        for client in sim.clients() {
            let observers = client.view().observers().len() as u64;
            if observers == 0 {
                assert_eq!(client.heartbeats_sent(), 0);
                continue;
            }

            let sent = client.heartbeats_sent();
            assert!(
                sent >= expected_sends,
                "client {} sent {} heartbeats, expected at least {}",
                client.id(),
                sent,
                expected_sends
            );

            // round-robin rotation spreads the sends evenly
            assert!(sent / observers >= expected_sends / observers);
        }
    }

    #[test]
    fn heartbeat_send_gap_bounds_the_rate() {
        let mut sim = Simulator::new(config(Protocol::Heartbeat, 6, 2, 0, 9));
        sim.run();

        // nobody can beat one heartbeat per period
        let ceiling = u64::from(HEARTBEAT_CONVERGENCE_SPAN) / u64::from(HEARTBEAT_SEND_GAP) + 1;
        for client in sim.clients() {
            assert!(client.heartbeats_sent() <= ceiling);
        }
    }

    #[test]
    fn gossip_accuracy_converges_on_a_mid_size_population() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 100, 5, 3600, 7));
        let report = sim.run();

        assert!(
            report.accuracy_rate >= 0.90,
            "accuracy {} below target",
            report.accuracy_rate
        );

        // the Bernoulli loss model should hover around its 5% setting
        let stats = sim.stats();
        let drop_rate = stats.messages_dropped() as f64 / stats.messages_sent() as f64;
        assert!(
            (0.04..=0.06).contains(&drop_rate),
            "drop rate {} strays from 5%",
            drop_rate
        );
    }

    #[test]
    fn heartbeat_accuracy_converges_after_the_freeze() {
        let mut sim = Simulator::new(config(Protocol::Heartbeat, 200, 10, 600, 11));
        let report = sim.run();

        assert!(
            report.accuracy_rate >= 0.95,
            "accuracy {} below target",
            report.accuracy_rate
        );
    }

    #[test]
    fn deterministic_loss_model_drops_exactly_one_in_n() {
        let mut base = config(Protocol::Gossip, 50, 4, 1200, 13);
        base.loss = LossModel::EveryNth { n: 20 };

        let mut sim = Simulator::new(base);
        sim.run();

        let stats = sim.stats();
        assert!(stats.messages_sent() > 0);
        assert_eq!(stats.messages_dropped(), stats.messages_sent() / 20);
    }

    #[test]
    fn identical_seeds_reproduce_identical_reports() {
        let run = |seed| {
            let mut sim = Simulator::new(config(Protocol::Gossip, 50, 4, 1200, seed));
            sim.run()
        };

        assert_eq!(run(21), run(21));
        assert_ne!(run(21), run(22));
    }

    #[test]
    fn heartbeat_runs_are_deterministic_too() {
        let run = || {
            let mut sim = Simulator::new(config(Protocol::Heartbeat, 30, 3, 900, 17));
            sim.run()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn bus_is_empty_after_every_run() {
        let mut sim = Simulator::new(config(Protocol::Gossip, 20, 3, 600, 2));
        sim.run();
        assert!(sim.bus.is_empty());

        let mut sim = Simulator::new(config(Protocol::Heartbeat, 20, 3, 600, 2));
        sim.run();
        assert!(sim.bus.is_empty());
    }
}
