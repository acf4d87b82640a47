use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("chain is empty")]
    EmptyChain,

    #[error("block {index} does not extend the current tip")]
    InvalidPredecessor { index: u64 },

    #[error("block {index} carries a hash that does not match its contents")]
    InvalidHash { index: u64 },

    #[error("block {index} hash has fewer than {difficulty} leading zero bits")]
    DifficultyNotMet { index: u64, difficulty: u32 },

    #[error("first block is not a genesis block")]
    InvalidGenesis,

    #[error("transaction error: {0}")]
    Transaction(#[from] pl_transaction::TransactionError),
}
