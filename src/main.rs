use std::process;

use clap::Parser;
use log::info;
use simple_logger::SimpleLogger;

use presence_sim::{Protocol, SimConfig, SimTime, Simulator};

/// Discrete-event simulator for distributed presence dissemination
/// protocols.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Dissemination protocol to simulate
    #[clap(long, value_enum, default_value = "gossip")]
    protocol: Protocol,

    /// Number of clients in the population
    #[clap(long, default_value_t = 1000)]
    nodes: u32,

    /// Buddies per client
    #[clap(long, default_value_t = 20)]
    buddies: u32,

    /// Main phase length in virtual seconds
    #[clap(long, default_value_t = 3 * 30 * 24 * 60 * 60)]
    seconds: SimTime,

    /// Seed for the random source; drawn from entropy when omitted
    #[clap(long)]
    seed: Option<u64>,

    /// Reproduce the original second-peer draw of the gossip cycle opener
    #[clap(long)]
    legacy_peer_draw: bool,
}

fn main() {
    SimpleLogger::new().init().unwrap();

    let cli = Cli::parse();
    let config = SimConfig {
        protocol: cli.protocol,
        nodes: cli.nodes,
        buddies: cli.buddies,
        seconds: cli.seconds,
        seed: cli.seed,
        legacy_peer_draw: cli.legacy_peer_draw,
        ..SimConfig::default()
    };

    if let Err(error) = config.validate() {
        eprintln!("invalid configuration: {error}");
        process::exit(1);
    }

    info!(
        "simulating {:?} with {} nodes, {} buddies each, for {} seconds",
        config.protocol, config.nodes, config.buddies, config.seconds
    );

    let mut sim = Simulator::new(config);
    let report = sim.run();
    report.print();
}
