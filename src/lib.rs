//! # presence-sim - Presence Dissemination Simulator
//!
//! A discrete-event simulator for distributed presence dissemination
//! protocols. A fixed population of clients flips between online and
//! offline on a random sleep schedule; each client keeps a believed state
//! for a random subset of the population (its buddy list) and pushes its
//! own status to the clients that watch it (its observers). Two protocols
//! are provided over a lossy in-memory message bus:
//!
//! - **Gossip**: floods the buddy network with status chains every minute.
//!   State converges quickly with high probability.
//! - **Heartbeat**: round-robin heartbeats keep the buddy network
//!   up to date, with an expiry window for silent peers.
//!
//! ## Core Components
//!
//! - **Client**: the shared per-client view plus the configured protocol
//!   state machine
//! - **Simulator**: owns the client arena, bus, sleep schedule, stats and
//!   truth table, and drives the virtual clock
//! - **SimulatorStats**: counters and the per-client presence ledger used
//!   for convergence measurement
//!
//! ## Usage
//!
//! ```no_run
//! use presence_sim::{Protocol, SimConfig, Simulator};
//!
//! let config = SimConfig {
//!     protocol: Protocol::Gossip,
//!     nodes: 100,
//!     buddies: 5,
//!     seconds: 3600,
//!     seed: Some(7),
//!     ..SimConfig::default()
//! };
//!
//! let mut sim = Simulator::new(config);
//! let report = sim.run();
//! report.print();
//! ```
//!
//! All time is virtual, counted in whole seconds; a run is fully
//! deterministic for a fixed seed.

// Client protocol modules
pub mod ps_client;
pub mod ps_gossip;
pub mod ps_heartbeat;
pub mod ps_interface;
pub mod ps_schedule;
pub mod ps_stats;

// Simulation harness
pub mod sim;

// Re-export commonly used types
pub use ps_client::{Client, ClientView};
pub use ps_interface::{ClientId, ClientMessage, ClientState, MessageBus, MessageKind, SimTime};
pub use ps_stats::SimulatorStats;
pub use sim::{ConfigError, LossModel, PhaseReport, Protocol, SimConfig, SimReport, Simulator};
