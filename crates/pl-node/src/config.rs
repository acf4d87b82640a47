use pl_blockchain::DEFAULT_DIFFICULTY;

/// Full configuration for a [`crate::NodeRuntime`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// `host:port` of the relay.  Defaults to `127.0.0.1:3000`.
    pub relay_addr: String,

    /// Leading zero bits required of mined block hashes.  Must match every
    /// other node on the relay or their blocks will be rejected.
    pub difficulty: u32,

    /// When `true` the binary embedding this node should suppress log output.
    /// The library itself does not initialise a tracing subscriber.
    pub quiet: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:3000".to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            quiet: false,
        }
    }
}

impl NodeConfig {
    /// Config for a node talking to the relay at `relay_addr`.
    pub fn with_relay(relay_addr: impl Into<String>) -> Self {
        Self {
            relay_addr: relay_addr.into(),
            ..Self::default()
        }
    }

    pub fn difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }
}
