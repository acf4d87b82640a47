use std::time::Duration;

/// How long the relay is prepared to wait for a longest-chain quorum.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuorumPolicy {
    /// Wait until every connected peer has answered, however long that takes.
    /// A peer that stays connected but never replies stalls the exchange.
    #[default]
    WaitForAll,

    /// Resolve against whatever replies arrived once `timeout` has elapsed.
    /// If nobody replied the requester gets an empty chain.
    Bounded { timeout: Duration },
}

impl QuorumPolicy {
    /// `None` keeps the unbounded default.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self::Bounded { timeout },
            None => Self::WaitForAll,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::WaitForAll => None,
            Self::Bounded { timeout } => Some(*timeout),
        }
    }
}
