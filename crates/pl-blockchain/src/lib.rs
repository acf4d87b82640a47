pub mod block;
pub mod blockchain;
pub mod error;
pub mod pow;

pub use block::{compute_hash, Block, GENESIS_PREVIOUS_HASH};
pub use blockchain::{is_valid_block, is_valid_chain, validate_block, validate_chain, Blockchain};
pub use error::BlockchainError;
pub use pow::{BlockTemplate, MiningOutcome};

/// Leading zero bits a mined block hash must carry unless a node is
/// configured otherwise.  Every peer on a relay has to agree on this value.
pub const DEFAULT_DIFFICULTY: u32 = 16;
