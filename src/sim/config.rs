// Simulation configuration

use clap::ValueEnum;
use thiserror::Error;

use crate::ps_interface::SimTime;

/// Which dissemination protocol a run exercises.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    Gossip,
    Heartbeat,
}

/// How the bus decides that a message is lost on delivery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LossModel {
    /// Drop each message independently with `percent`% probability.
    Bernoulli { percent: u32 },
    /// Drop exactly every n-th dispatched message. Deterministic; meant for
    /// tests that pin the drop rate.
    EveryNth { n: u32 },
}

/// Main simulation configuration
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub protocol: Protocol,

    /// Number of clients in the population.
    pub nodes: u32,

    /// Buddies per client.
    pub buddies: u32,

    /// Length of the main phase in virtual seconds.
    pub seconds: SimTime,

    /// Random seed for reproducibility; drawn from entropy when absent.
    pub seed: Option<u64>,

    pub loss: LossModel,

    /// Reproduce the original second-peer draw of the gossip cycle opener.
    pub legacy_peer_draw: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        // the shipped configuration: gossip over 1000 clients for 90 days
        Self {
            protocol: Protocol::Gossip,
            nodes: 1000,
            buddies: 20,
            seconds: 3 * 30 * 24 * 60 * 60,
            seed: None,
            loss: LossModel::Bernoulli { percent: 5 },
            legacy_peer_draw: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node count must be at least 1")]
    NoClients,

    #[error("buddy count {buddies} must be smaller than node count {nodes}")]
    TooManyBuddies { buddies: u32, nodes: u32 },

    #[error("simulated timespan must be at least 1 second")]
    EmptyTimespan,
}

impl SimConfig {
    /// Startup validation for externally supplied parameters. Construction
    /// itself does not re-check, so programmatic harnesses may run
    /// degenerate shapes (an empty main phase, say) on purpose.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::NoClients);
        }
        if self.buddies >= self.nodes {
            return Err(ConfigError::TooManyBuddies {
                buddies: self.buddies,
                nodes: self.nodes,
            });
        }
        if self.seconds == 0 {
            return Err(ConfigError::EmptyTimespan);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn degenerate_shapes_are_rejected() {
        let mut config = SimConfig {
            nodes: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoClients));

        config.nodes = 10;
        config.buddies = 10;
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyBuddies {
                buddies: 10,
                nodes: 10
            })
        );

        config.buddies = 3;
        config.seconds = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyTimespan));
    }
}
