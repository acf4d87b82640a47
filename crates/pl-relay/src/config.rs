use std::net::{IpAddr, Ipv4Addr};

use pl_quorum::QuorumPolicy;

/// Full configuration for a [`crate::Relay`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interface to bind.  Defaults to all interfaces.
    pub host: IpAddr,

    /// TCP port the relay listens on.  Defaults to `3000`; `0` lets the OS
    /// pick one.
    pub port: u16,

    /// How long a longest-chain request may wait for its quorum.
    pub policy: QuorumPolicy,

    /// When `true` the binary embedding this relay should suppress log
    /// output.  The library itself does not initialise a tracing subscriber.
    pub quiet: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            policy: QuorumPolicy::default(),
            quiet: false,
        }
    }
}

impl RelayConfig {
    /// Config on a specific port with every other field defaulted.
    pub fn on_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Loopback-only config on an OS-assigned port, for tests and local demos.
    pub fn local_ephemeral() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: QuorumPolicy) -> Self {
        self.policy = policy;
        self
    }
}
