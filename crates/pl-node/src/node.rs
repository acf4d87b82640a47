use pl_blockchain::{Block, BlockTemplate, Blockchain};
use pl_transaction::Transaction;
use tracing::{debug, info};

use crate::{
    error::NodeError,
    miner::{Miner, MiningJob},
    status::NodeStatus,
};

/// A ledger participant: its copy of the chain, the transactions waiting to
/// be mined, and the miner working on the next block.
///
/// `Node` does no I/O.  [`crate::NodeRuntime`] owns one and drives it from
/// relay messages and operator commands, one at a time.
pub struct Node {
    chain: Blockchain,
    pending: Vec<Transaction>,
    miner: Miner,
}

impl Node {
    /// Create a node with an empty chain.
    pub fn new(difficulty: u32) -> Self {
        Self {
            chain: Blockchain::empty(difficulty),
            pending: Vec::new(),
            miner: Miner::new(difficulty),
        }
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn blocks(&self) -> &[Block] {
        self.chain.blocks()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn is_mining(&self) -> bool {
        self.miner.is_mining()
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            chain_len: self.chain.len(),
            chain_empty: self.chain.is_empty(),
            mining: self.is_mining(),
            pending: self.pending.len(),
        }
    }

    /// Start a fresh chain holding only the genesis block.
    pub fn initialize_with_genesis_block(&mut self) -> Result<&Block, NodeError> {
        if !self.chain.is_empty() {
            return Err(NodeError::AlreadyInitialised);
        }
        self.chain = Blockchain::with_genesis(self.chain.difficulty());
        info!("Chain initialised with genesis block");
        self.chain.tip().ok_or(NodeError::Uninitialised)
    }

    /// Adopt `blocks` if they form a valid chain longer than ours.
    ///
    /// Returns the new length.  On rejection nothing changes.
    pub fn initialize_with(&mut self, blocks: Vec<Block>) -> Result<usize, NodeError> {
        if blocks.len() <= self.chain.len() {
            return Err(NodeError::RejectedChain(format!(
                "{} blocks is not longer than the local {}",
                blocks.len(),
                self.chain.len()
            )));
        }
        let chain = Blockchain::from_blocks(blocks, self.chain.difficulty())
            .map_err(|e| NodeError::RejectedChain(e.to_string()))?;

        self.chain = chain;
        info!(len = self.chain.len(), "Adopted chain");
        Ok(self.chain.len())
    }

    /// Queue `tx` for the next block.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), NodeError> {
        tx.validate()?;
        debug!(%tx, "Transaction pending");
        self.pending.push(tx);
        Ok(())
    }

    /// Start mining a block on top of the current tip.
    ///
    /// The block is not appended when found; the caller passes it to
    /// [`Node::add_block`] like any other block.
    pub fn mine_block_with(
        &mut self,
        transactions: Vec<Transaction>,
    ) -> Result<MiningJob, NodeError> {
        if self.miner.is_mining() {
            return Err(NodeError::AlreadyMining);
        }
        let tip = self.chain.tip().ok_or(NodeError::Uninitialised)?;
        let timestamp = chrono::Utc::now().timestamp_millis();
        let template = BlockTemplate::on_top_of(tip, timestamp, transactions);

        Ok(self.miner.start(template))
    }

    /// Validate `block` against the tip and append it.  Transactions the
    /// block carries leave the pending set.
    pub fn add_block(&mut self, block: Block) -> Result<&Block, NodeError> {
        let added = self.chain.add_block(block)?;
        // One pending entry per mined transaction; identical payments queued
        // twice are distinct entries.
        for tx in &added.transactions {
            if let Some(pos) = self.pending.iter().position(|p| p == tx) {
                self.pending.remove(pos);
            }
        }
        info!(index = added.index, hash = added.short_hash(), "Block added");
        Ok(added)
    }

    /// Stop the in-flight search, if any.
    pub fn cancel_mining(&mut self) -> bool {
        self.miner.cancel()
    }
}

#[cfg(test)]
mod tests {
    use pl_blockchain::BlockchainError;

    use super::*;

    const TEST_DIFFICULTY: u32 = 6;

    fn tx(sender: &str, amount: u64) -> Transaction {
        Transaction::new(sender, "bob", amount).unwrap()
    }

    fn ready_node() -> Node {
        let mut node = Node::new(TEST_DIFFICULTY);
        node.initialize_with_genesis_block().unwrap();
        node
    }

    async fn mine(node: &mut Node, txs: Vec<Transaction>) -> Block {
        node.mine_block_with(txs).unwrap().wait().await.unwrap()
    }

    #[test]
    fn genesis_initialisation_happens_once() {
        let mut node = Node::new(TEST_DIFFICULTY);
        assert!(node.status().chain_empty);

        let genesis = node.initialize_with_genesis_block().unwrap();
        assert_eq!(genesis, &Block::genesis());
        assert!(matches!(
            node.initialize_with_genesis_block(),
            Err(NodeError::AlreadyInitialised)
        ));
        assert_eq!(node.chain().len(), 1);
    }

    #[test]
    fn invalid_transactions_are_not_queued() {
        let mut node = ready_node();
        let bad = Transaction {
            sender: "alice".into(),
            recipient: "bob".into(),
            amount: 0,
        };
        assert!(matches!(
            node.add_transaction(bad),
            Err(NodeError::Transaction(_))
        ));
        assert!(node.pending_transactions().is_empty());

        node.add_transaction(tx("alice", 5)).unwrap();
        assert_eq!(node.status().pending, 1);
    }

    #[tokio::test]
    async fn mining_requires_a_chain() {
        let mut node = Node::new(TEST_DIFFICULTY);
        assert!(matches!(
            node.mine_block_with(Vec::new()),
            Err(NodeError::Uninitialised)
        ));
    }

    #[tokio::test]
    async fn mined_block_is_not_appended_until_added() {
        let mut node = ready_node();
        let block = mine(&mut node, vec![tx("alice", 10)]).await;

        assert_eq!(block.index, 1);
        assert_eq!(node.chain().len(), 1);

        node.add_block(block).unwrap();
        assert_eq!(node.chain().len(), 2);
        assert!(node.chain().is_valid());
    }

    #[tokio::test]
    async fn adding_a_block_clears_only_its_transactions() {
        let mut node = ready_node();
        let (a, b, c) = (tx("alice", 1), tx("carol", 2), tx("dave", 3));
        for t in [&a, &b, &c] {
            node.add_transaction(t.clone()).unwrap();
        }

        let block = mine(&mut node, vec![a.clone(), c.clone()]).await;
        node.add_block(block).unwrap();

        assert_eq!(node.pending_transactions(), &[b]);
    }

    #[tokio::test]
    async fn duplicate_pending_payment_survives_when_one_copy_is_mined() {
        let mut node = ready_node();
        let payment = tx("alice", 5);
        node.add_transaction(payment.clone()).unwrap();
        node.add_transaction(payment.clone()).unwrap();

        let block = mine(&mut node, vec![payment.clone()]).await;
        node.add_block(block).unwrap();

        assert_eq!(node.pending_transactions(), &[payment]);
    }

    #[tokio::test]
    async fn the_same_block_cannot_be_added_twice() {
        let mut node = ready_node();
        let block = mine(&mut node, vec![tx("alice", 10)]).await;

        node.add_block(block.clone()).unwrap();
        assert!(matches!(
            node.add_block(block),
            Err(NodeError::Blockchain(BlockchainError::InvalidPredecessor { .. }))
        ));
        assert_eq!(node.chain().len(), 2);
    }

    #[tokio::test]
    async fn tampered_block_is_rejected_without_side_effects() {
        let mut node = ready_node();
        let paid = tx("alice", 10);
        node.add_transaction(paid.clone()).unwrap();

        let mut block = mine(&mut node, vec![paid]).await;
        block.transactions[0].amount = 1_000;

        assert!(node.add_block(block).is_err());
        assert_eq!(node.chain().len(), 1);
        assert_eq!(node.status().pending, 1);
    }

    #[tokio::test]
    async fn second_search_is_refused_while_mining() {
        let mut node = Node::new(64);
        node.initialize_with_genesis_block().unwrap();

        let _job = node.mine_block_with(Vec::new()).unwrap();
        assert!(node.status().mining);
        assert!(matches!(
            node.mine_block_with(Vec::new()),
            Err(NodeError::AlreadyMining)
        ));

        assert!(node.cancel_mining());
        assert!(!node.status().mining);
    }

    #[tokio::test]
    async fn longer_valid_chain_is_adopted() {
        let mut source = ready_node();
        for amount in 1..=2 {
            let block = mine(&mut source, vec![tx("alice", amount)]).await;
            source.add_block(block).unwrap();
        }

        let mut node = Node::new(TEST_DIFFICULTY);
        assert_eq!(node.initialize_with(source.blocks().to_vec()).unwrap(), 3);
        assert_eq!(node.blocks(), source.blocks());
    }

    #[tokio::test]
    async fn shorter_or_broken_chains_are_rejected() {
        let mut source = ready_node();
        let block = mine(&mut source, vec![tx("alice", 1)]).await;
        source.add_block(block).unwrap();

        let mut node = ready_node();
        assert!(matches!(
            node.initialize_with(vec![Block::genesis()]),
            Err(NodeError::RejectedChain(_))
        ));

        let mut broken = source.blocks().to_vec();
        broken[1].nonce += 1;
        assert!(matches!(
            node.initialize_with(broken),
            Err(NodeError::RejectedChain(_))
        ));
        assert_eq!(node.chain().len(), 1);
    }

    #[tokio::test]
    async fn two_block_chain_does_not_replace_four_blocks() {
        let mut source = ready_node();
        for amount in 1..=3 {
            let block = mine(&mut source, vec![tx("alice", amount)]).await;
            source.add_block(block).unwrap();
        }

        let mut node = Node::new(TEST_DIFFICULTY);
        node.initialize_with(source.blocks().to_vec()).unwrap();
        assert_eq!(node.chain().len(), 4);

        assert!(matches!(
            node.initialize_with(source.blocks()[..2].to_vec()),
            Err(NodeError::RejectedChain(_))
        ));
        assert_eq!(node.blocks(), source.blocks());
    }
}
