use crate::{block::Block, error::BlockchainError, pow::meets_difficulty, DEFAULT_DIFFICULTY};

/// The append-only chain of [`Block`]s held by a node.
///
/// Invariants maintained by this type:
/// - Either empty (node not yet initialised) or starting with genesis.
/// - Every block's `previous_hash` matches the hash of the preceding block.
/// - Block indices are contiguous starting from 0.
/// - Every non-genesis hash meets `difficulty`.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: u32,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::empty(DEFAULT_DIFFICULTY)
    }
}

impl Blockchain {
    /// A chain with no blocks at all.
    pub fn empty(difficulty: u32) -> Self {
        Self {
            blocks: Vec::new(),
            difficulty,
        }
    }

    /// A chain holding only the genesis block.
    pub fn with_genesis(difficulty: u32) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            difficulty,
        }
    }

    /// Adopt `blocks` as a chain after full validation.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Result<Self, BlockchainError> {
        validate_chain(&blocks, difficulty)?;
        Ok(Self { blocks, difficulty })
    }

    /// Number of blocks in the chain (including genesis).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// The most recent block, if any.
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// All blocks in the chain.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Append `block` if it validly extends the tip.  The chain is untouched
    /// on error.
    pub fn add_block(&mut self, block: Block) -> Result<&Block, BlockchainError> {
        let tip = self.tip().ok_or(BlockchainError::EmptyChain)?;
        validate_block(&block, tip, self.difficulty)?;
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Validate the whole chain; see [`validate_chain`].
    pub fn is_valid(&self) -> bool {
        is_valid_chain(&self.blocks, self.difficulty)
    }
}

/// Check that `candidate` may follow `predecessor`.
///
/// Linkage is checked first, then hash integrity, then proof of work, so the
/// error names the first thing that is wrong.
pub fn validate_block(
    candidate: &Block,
    predecessor: &Block,
    difficulty: u32,
) -> Result<(), BlockchainError> {
    let index = candidate.index;

    if candidate.previous_hash != predecessor.hash || index != predecessor.index + 1 {
        return Err(BlockchainError::InvalidPredecessor { index });
    }

    let hash = candidate.recompute_hash()?;
    if hex::encode(hash) != candidate.hash {
        return Err(BlockchainError::InvalidHash { index });
    }

    if !meets_difficulty(&hash, difficulty) {
        return Err(BlockchainError::DifficultyNotMet { index, difficulty });
    }

    Ok(())
}

pub fn is_valid_block(candidate: &Block, predecessor: &Block, difficulty: u32) -> bool {
    validate_block(candidate, predecessor, difficulty).is_ok()
}

/// Validate a full chain: genesis first, then every adjacent pair.
pub fn validate_chain(blocks: &[Block], difficulty: u32) -> Result<(), BlockchainError> {
    let first = blocks.first().ok_or(BlockchainError::EmptyChain)?;
    if !first.is_genesis() {
        return Err(BlockchainError::InvalidGenesis);
    }

    for window in blocks.windows(2) {
        validate_block(&window[1], &window[0], difficulty)?;
    }

    Ok(())
}

pub fn is_valid_chain(blocks: &[Block], difficulty: u32) -> bool {
    validate_chain(blocks, difficulty).is_ok()
}
