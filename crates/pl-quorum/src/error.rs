use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QuorumError {
    #[error("exchange {0} is already outstanding")]
    DuplicateExchange(Uuid),

    #[error("no outstanding exchange {0}")]
    UnknownExchange(Uuid),

    #[error("reply to exchange {0} came from a peer that is not being polled")]
    UnexpectedReplier(Uuid),
}
