use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("transaction sender is empty")]
    EmptySender,

    #[error("transaction recipient is empty")]
    EmptyRecipient,

    #[error("transaction amount must be greater than zero")]
    ZeroAmount,
}
