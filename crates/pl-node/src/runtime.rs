use std::collections::VecDeque;

use pl_blockchain::Block;
use pl_protocol::{Message, Payload};
use pl_transaction::Transaction;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    client::RelayClient,
    command::NodeCommand,
    config::NodeConfig,
    error::NodeError,
    event::NodeEvent,
    node::Node,
};

/// A [`Node`] wired to the relay.
///
/// One task owns the node and reacts to three sources in turn: messages from
/// the relay, operator commands, and finished mining jobs.  Nothing else
/// touches the node, so each reaction sees and leaves a consistent state.
pub struct NodeRuntime {
    node: Node,
    client: RelayClient,
    inbound: mpsc::UnboundedReceiver<Message>,
    /// Relay messages that arrived while the chain was being fetched.
    backlog: VecDeque<Message>,
    mined_tx: mpsc::UnboundedSender<Result<Block, NodeError>>,
    mined_rx: mpsc::UnboundedReceiver<Result<Block, NodeError>>,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
}

impl NodeRuntime {
    /// Connect to the relay and initialise the chain.
    ///
    /// The longest chain held by the other nodes is adopted.  When there is
    /// none, or it fails validation, the node starts its own from genesis.
    /// Returns the runtime together with a receiver for [`NodeEvent`]s.
    pub async fn start(
        config: NodeConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let (client, mut inbound) = RelayClient::connect(&config.relay_addr).await?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (mined_tx, mined_rx) = mpsc::unbounded_channel();
        let _ = event_tx.send(NodeEvent::Connected(config.relay_addr.clone()));

        let mut backlog = VecDeque::new();
        let chain = {
            let reply = client.request_longest_chain();
            tokio::pin!(reply);
            loop {
                tokio::select! {
                    chain = &mut reply => break chain?,
                    Some(msg) = inbound.recv() => match msg.payload {
                        // Peers starting at the same time poll each other.
                        // Answer with our (still empty) chain so neither
                        // side waits on the other.
                        Payload::GetLongestChainRequest => {
                            client.respond_with_chain(msg.correlation_id, Vec::new())?;
                        }
                        _ => backlog.push_back(msg),
                    },
                }
            }
        };

        let mut node = Node::new(config.difficulty);
        // A chain nobody can validate is no reason to stay down; start from
        // genesis like a lone node would.
        let adopted = if chain.is_empty() {
            false
        } else {
            match node.initialize_with(chain) {
                Ok(_) => true,
                Err(e @ NodeError::RejectedChain(_)) => {
                    warn!("Ignoring chain offered by the relay: {e}");
                    false
                }
                Err(e) => return Err(e),
            }
        };
        if !adopted {
            node.initialize_with_genesis_block()?;
        }

        let length = node.chain().len();
        info!(length, adopted, "Chain initialised");
        let _ = event_tx.send(NodeEvent::ChainInitialised { length, adopted });

        let runtime = Self {
            node,
            client,
            inbound,
            backlog,
            mined_tx,
            mined_rx,
            event_tx,
        };
        runtime.publish_status();

        Ok((runtime, event_rx))
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Run until [`NodeCommand::Shutdown`], the command channel closes, or
    /// the relay disconnects.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<NodeCommand>) {
        while let Some(msg) = self.backlog.pop_front() {
            self.handle_message(msg);
        }

        loop {
            tokio::select! {
                msg = self.inbound.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => {
                        warn!("Relay connection lost");
                        let _ = self.event_tx.send(NodeEvent::Disconnected);
                        break;
                    }
                },

                Some(mined) = self.mined_rx.recv() => self.on_mined(mined),

                cmd = commands.recv() => match cmd {
                    Some(NodeCommand::Shutdown) | None => {
                        info!("Shutting down");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                },
            }
        }

        self.node.cancel_mining();
    }

    fn handle_message(&mut self, msg: Message) {
        match msg.payload {
            Payload::GetLongestChainRequest => {
                let chain = self.node.blocks().to_vec();
                debug!(len = chain.len(), "Answering chain request");
                if let Err(e) = self.client.respond_with_chain(msg.correlation_id, chain) {
                    warn!("Could not answer chain request: {e}");
                }
            }
            Payload::GetLongestChainResponse(_) => {
                debug!(id = %msg.correlation_id, "Ignoring unsolicited chain response");
            }
            Payload::NewBlockRequest(transactions) => {
                info!(count = transactions.len(), "Peer asked for a new block");
                self.start_mining(transactions);
            }
            Payload::NewBlockAnnouncement(block) => self.accept_block(block, false),
        }
    }

    fn handle_command(&mut self, cmd: NodeCommand) {
        match cmd {
            NodeCommand::AddTransaction(tx) => self.add_transaction(tx),
            NodeCommand::GenerateBlock => self.generate_block(),
            NodeCommand::Status => self.publish_status(),
            NodeCommand::ShowChain => {
                let _ = self
                    .event_tx
                    .send(NodeEvent::Chain(self.node.blocks().to_vec()));
            }
            NodeCommand::ShowPending => {
                let _ = self.event_tx.send(NodeEvent::Pending(
                    self.node.pending_transactions().to_vec(),
                ));
            }
            NodeCommand::Shutdown => {}
        }
    }

    fn add_transaction(&mut self, tx: Transaction) {
        match self.node.add_transaction(tx.clone()) {
            Ok(()) => {
                info!(%tx, "Transaction added");
                let _ = self.event_tx.send(NodeEvent::TransactionAdded(tx));
                self.publish_status();
            }
            Err(e) => warn!("Transaction refused: {e}"),
        }
    }

    /// Ask the other nodes to mine the pending set, then mine it here too.
    fn generate_block(&mut self) {
        let pending = self.node.pending_transactions().to_vec();
        if pending.is_empty() {
            warn!("{}", NodeError::NoPendingTransactions);
            return;
        }
        if self.node.is_mining() {
            warn!("{}", NodeError::AlreadyMining);
            return;
        }

        if let Err(e) = self.client.request_new_block(pending.clone()) {
            warn!("Could not ask peers for a block: {e}");
        }
        self.start_mining(pending);
    }

    fn start_mining(&mut self, transactions: Vec<Transaction>) {
        let count = transactions.len();
        match self.node.mine_block_with(transactions) {
            Ok(job) => {
                let index = job.index();
                info!(index, transactions = count, "Mining block");
                let _ = self.event_tx.send(NodeEvent::MiningStarted {
                    index,
                    transactions: count,
                });

                let mined_tx = self.mined_tx.clone();
                tokio::spawn(async move {
                    let _ = mined_tx.send(job.wait().await);
                });
                self.publish_status();
            }
            Err(e) => warn!("Cannot mine: {e}"),
        }
    }

    fn on_mined(&mut self, mined: Result<Block, NodeError>) {
        match mined {
            Ok(block) => {
                info!(index = block.index, nonce = block.nonce, "Block mined");
                let _ = self.event_tx.send(NodeEvent::BlockMined(block.clone()));
                self.accept_block(block, true);
            }
            Err(NodeError::MiningCancelled) => debug!("Mining cancelled"),
            Err(e) => {
                warn!("Mining failed: {e}");
                self.publish_status();
            }
        }
    }

    /// Try to append `block`.  Blocks this node mined are announced once
    /// accepted; announced blocks are never re-announced.
    fn accept_block(&mut self, block: Block, announce: bool) {
        let index = block.index;
        match self.node.add_block(block) {
            Ok(added) => {
                let added = added.clone();
                // A search started before this block is now mining on a stale tip.
                if !announce && self.node.cancel_mining() {
                    debug!("Cancelled stale search after block #{index}");
                }
                if announce {
                    if let Err(e) = self.client.announce_new_block(added.clone()) {
                        warn!("Could not announce block #{index}: {e}");
                    }
                }
                let _ = self.event_tx.send(NodeEvent::BlockAccepted(added));
            }
            Err(e) => {
                warn!("Rejected block #{index}: {e}");
                let _ = self.event_tx.send(NodeEvent::BlockRejected {
                    index,
                    reason: e.to_string(),
                });
            }
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let _ = self.event_tx.send(NodeEvent::Status(self.node.status()));
    }
}
