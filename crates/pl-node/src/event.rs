use pl_blockchain::Block;
use pl_transaction::Transaction;

use crate::status::NodeStatus;

/// High-level events emitted by a running [`crate::NodeRuntime`] that callers
/// (e.g. the console) can subscribe to via a channel.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Connected to the relay at the given address.
    Connected(String),

    /// The chain is ready.  `adopted` is `false` when the node started its own
    /// chain from genesis.
    ChainInitialised { length: usize, adopted: bool },

    TransactionAdded(Transaction),

    /// A proof-of-work search for block `index` began.
    MiningStarted { index: u64, transactions: usize },

    /// This node found a nonce.  The block still has to be accepted.
    BlockMined(Block),

    /// A block was appended to the local chain.
    BlockAccepted(Block),

    /// A block failed validation and was dropped.
    BlockRejected { index: u64, reason: String },

    /// Snapshot sent after every state change and on request.
    Status(NodeStatus),

    /// Reply to [`crate::NodeCommand::ShowChain`].
    Chain(Vec<Block>),

    /// Reply to [`crate::NodeCommand::ShowPending`].
    Pending(Vec<Transaction>),

    /// The relay closed the connection.
    Disconnected,
}
