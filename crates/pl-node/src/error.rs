use pl_protocol::MessageType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("chain is already initialised")]
    AlreadyInitialised,

    #[error("chain is not initialised yet")]
    Uninitialised,

    #[error("rejected chain: {0}")]
    RejectedChain(String),

    #[error("a block is already being mined")]
    AlreadyMining,

    #[error("mining was cancelled")]
    MiningCancelled,

    #[error("no nonce satisfies the difficulty")]
    NonceSpaceExhausted,

    #[error("no pending transactions to form a block")]
    NoPendingTransactions,

    #[error("relay answered with an unexpected {0} message")]
    UnexpectedReply(MessageType),

    #[error("relay connection closed")]
    Disconnected,

    #[error("blockchain error: {0}")]
    Blockchain(#[from] pl_blockchain::BlockchainError),

    #[error("transaction error: {0}")]
    Transaction(#[from] pl_transaction::TransactionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
