use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use pl_blockchain::{pow, Block, BlockTemplate, BlockchainError, MiningOutcome};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::NodeError;

/// Flags shared with the blocking task running a search.
struct ActiveSearch {
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

/// Runs proof-of-work searches off the async runtime.
///
/// At most one search is live per miner.  Starting another cancels the first,
/// and dropping the miner cancels whatever is still running.
pub struct Miner {
    difficulty: u32,
    active: Option<ActiveSearch>,
}

/// Handle to a search started by [`Miner::start`].
#[derive(Debug)]
pub struct MiningJob {
    index: u64,
    result: oneshot::Receiver<Result<MiningOutcome, BlockchainError>>,
}

impl Miner {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            active: None,
        }
    }

    /// `true` while a search has neither finished nor been cancelled.
    pub fn is_mining(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| !s.done.load(Ordering::Acquire) && !s.cancel.load(Ordering::Relaxed))
    }

    /// Start searching for a nonce for `template`, cancelling any earlier
    /// search first.
    pub fn start(&mut self, template: BlockTemplate) -> MiningJob {
        self.cancel();

        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let index = template.index;
        let difficulty = self.difficulty;

        {
            let cancel = Arc::clone(&cancel);
            let done = Arc::clone(&done);
            tokio::task::spawn_blocking(move || {
                let outcome = pow::search(template, difficulty, &cancel);
                done.store(true, Ordering::Release);
                let _ = tx.send(outcome);
            });
        }

        debug!(index, difficulty, "Mining started");
        self.active = Some(ActiveSearch { cancel, done });

        MiningJob { index, result: rx }
    }

    /// Stop the current search.  Returns `true` if one was still running.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(search) => {
                let running = !search.done.load(Ordering::Acquire);
                search.cancel.store(true, Ordering::Relaxed);
                running
            }
            None => false,
        }
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl MiningJob {
    /// Index of the block being mined.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Wait for the search to finish.
    pub async fn wait(self) -> Result<Block, NodeError> {
        match self.result.await {
            Ok(Ok(MiningOutcome::Found(block))) => Ok(block),
            Ok(Ok(MiningOutcome::Cancelled)) | Err(_) => Err(NodeError::MiningCancelled),
            Ok(Ok(MiningOutcome::Exhausted)) => Err(NodeError::NonceSpaceExhausted),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}
