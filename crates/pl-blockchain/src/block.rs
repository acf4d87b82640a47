use pl_transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::BlockchainError;

/// `previous_hash` of the genesis block: 64 hex zeros.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// A single block in the peer ledger.
///
/// `hash` is always the output of [`compute_hash`] over the other five
/// fields; blocks are produced either by [`Block::genesis`] or by the
/// proof-of-work search, never by assigning a hash directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Sequential block height (genesis = 0).
    pub index: u64,

    /// Unix timestamp in milliseconds when mining started.
    pub timestamp: i64,

    /// Hex hash of the predecessor.  [`GENESIS_PREVIOUS_HASH`] for genesis.
    pub previous_hash: String,

    pub transactions: Vec<Transaction>,

    /// Proof-of-work nonce.
    pub nonce: u64,

    /// Hex-encoded SHA-256 of the block header and transactions.
    pub hash: String,
}

impl Block {
    /// The fixed genesis block.  Every node derives a byte-identical copy, so
    /// chains built on different nodes share their first block.
    pub fn genesis() -> Self {
        let previous_hash = GENESIS_PREVIOUS_HASH.to_string();
        let hash = hex::encode(finish(header_prefix(0, 0, &previous_hash, 0), 0));

        Self {
            index: 0,
            timestamp: 0,
            previous_hash,
            transactions: Vec::new(),
            nonce: 0,
            hash,
        }
    }

    /// Recompute the hash from the block's own fields.
    pub fn recompute_hash(&self) -> Result<[u8; 32], BlockchainError> {
        Ok(finish(
            header_hasher(
                self.index,
                self.timestamp,
                &self.previous_hash,
                &self.transactions,
            )?,
            self.nonce,
        ))
    }

    /// `true` when the block has the shape of genesis: index 0, the sentinel
    /// predecessor, no transactions and a consistent hash.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
            && self.previous_hash == GENESIS_PREVIOUS_HASH
            && self.transactions.is_empty()
            && self
                .recompute_hash()
                .map(|h| hex::encode(h) == self.hash)
                .unwrap_or(false)
    }

    /// Shortened hash for log lines.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..12).unwrap_or(&self.hash)
    }
}

/// Hex-encoded SHA-256 over `(index, timestamp, previous_hash, transactions,
/// nonce)`.
///
/// The preimage is: little-endian `index` and `timestamp`, the length-prefixed
/// UTF-8 bytes of `previous_hash`, the transaction count followed by each
/// transaction's hash, and finally the little-endian `nonce`.  Peers only
/// agree on blocks if they agree on this layout.
pub fn compute_hash(
    index: u64,
    timestamp: i64,
    previous_hash: &str,
    transactions: &[Transaction],
    nonce: u64,
) -> Result<String, BlockchainError> {
    let hasher = header_hasher(index, timestamp, previous_hash, transactions)?;
    Ok(hex::encode(finish(hasher, nonce)))
}

/// Hasher state fed with everything except the nonce.  The miner clones it
/// once per attempt instead of re-encoding the transactions.
pub(crate) fn header_hasher(
    index: u64,
    timestamp: i64,
    previous_hash: &str,
    transactions: &[Transaction],
) -> Result<Sha256, BlockchainError> {
    let mut hasher = header_prefix(index, timestamp, previous_hash, transactions.len());
    for tx in transactions {
        hasher.update(tx.hash()?);
    }
    Ok(hasher)
}

/// Everything up to and including the transaction count.  Cannot fail, so a
/// block without transactions is hashed without touching `bincode`.
fn header_prefix(index: u64, timestamp: i64, previous_hash: &str, tx_count: usize) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update((previous_hash.len() as u64).to_le_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update((tx_count as u64).to_le_bytes());
    hasher
}

pub(crate) fn finish(mut hasher: Sha256, nonce: u64) -> [u8; 32] {
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}
