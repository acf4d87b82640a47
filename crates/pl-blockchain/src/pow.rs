use std::sync::atomic::{AtomicBool, Ordering};

use pl_transaction::Transaction;

use crate::{
    block::{finish, header_hasher},
    Block, BlockchainError,
};

/// Everything needed to mine a block except the nonce.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub index: u64,
    pub timestamp: i64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
}

impl BlockTemplate {
    /// Template for the block that would follow `tip`.
    pub fn on_top_of(tip: &Block, timestamp: i64, transactions: Vec<Transaction>) -> Self {
        Self {
            index: tip.index + 1,
            timestamp,
            previous_hash: tip.hash.clone(),
            transactions,
        }
    }
}

/// Result of a proof-of-work search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    Found(Block),
    /// The cancel flag was raised before a nonce was found.
    Cancelled,
    /// Every `u64` nonce was tried.
    Exhausted,
}

/// Number of leading zero bits in `hash`.
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut count = 0;
    for &b in hash {
        if b == 0 {
            count += 8;
        } else {
            count += b.leading_zeros();
            break;
        }
    }
    count
}

/// The difficulty predicate: at least `difficulty` leading zero bits, i.e. the
/// hash read as a big-endian integer is below `2^(256 - difficulty)`.
pub fn meets_difficulty(hash: &[u8], difficulty: u32) -> bool {
    leading_zero_bits(hash) >= difficulty
}

/// Search nonces `0, 1, 2, ...` for the first one whose hash meets
/// `difficulty`.
///
/// `cancel` is checked before every attempt.  The returned block always
/// satisfies [`crate::validate_block`] against the block the template was
/// built on.
pub fn search(
    template: BlockTemplate,
    difficulty: u32,
    cancel: &AtomicBool,
) -> Result<MiningOutcome, BlockchainError> {
    let prefix = header_hasher(
        template.index,
        template.timestamp,
        &template.previous_hash,
        &template.transactions,
    )?;

    let mut nonce: u64 = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(MiningOutcome::Cancelled);
        }

        let hash = finish(prefix.clone(), nonce);
        if meets_difficulty(&hash, difficulty) {
            return Ok(MiningOutcome::Found(Block {
                index: template.index,
                timestamp: template.timestamp,
                previous_hash: template.previous_hash,
                transactions: template.transactions,
                nonce,
                hash: hex::encode(hash),
            }));
        }

        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => return Ok(MiningOutcome::Exhausted),
        };
    }
}
