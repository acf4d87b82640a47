use std::fmt;

/// Read-only snapshot of a [`crate::Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub chain_len: usize,
    pub chain_empty: bool,
    pub mining: bool,
    pub pending: usize,
}

impl NodeStatus {
    /// One-line summary shown to the operator.
    pub fn label(&self) -> String {
        if self.chain_empty {
            "Initializing the blockchain...".to_string()
        } else if self.mining {
            "Mining a new block...".to_string()
        } else if self.pending == 0 {
            "Add one or more transactions.".to_string()
        } else {
            format!("Ready to mine a new block (transactions: {}).", self.pending)
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(chain_len: usize, mining: bool, pending: usize) -> NodeStatus {
        NodeStatus {
            chain_len,
            chain_empty: chain_len == 0,
            mining,
            pending,
        }
    }

    #[test]
    fn empty_chain_takes_precedence() {
        assert_eq!(status(0, true, 3).label(), "Initializing the blockchain...");
    }

    #[test]
    fn mining_before_pending_count() {
        assert_eq!(status(2, true, 3).label(), "Mining a new block...");
    }

    #[test]
    fn idle_labels() {
        assert_eq!(status(1, false, 0).label(), "Add one or more transactions.");
        assert_eq!(
            status(1, false, 2).to_string(),
            "Ready to mine a new block (transactions: 2)."
        );
    }
}
