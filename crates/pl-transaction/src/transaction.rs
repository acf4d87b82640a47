use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TransactionError;

/// A transfer of `amount` units from `sender` to `recipient`.
///
/// Only presence is checked (see [`Transaction::validate`]).  Whether the
/// sender can afford the transfer is not the ledger's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    /// Whole units.
    pub amount: u64,
}

impl Transaction {
    /// Create a transaction, rejecting blank parties and zero amounts.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<Self, TransactionError> {
        let tx = Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Presence check: non-blank sender and recipient, positive amount.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.sender.trim().is_empty() {
            return Err(TransactionError::EmptySender);
        }
        if self.recipient.trim().is_empty() {
            return Err(TransactionError::EmptyRecipient);
        }
        if self.amount == 0 {
            return Err(TransactionError::ZeroAmount);
        }
        Ok(())
    }

    /// SHA-256 of the canonical `bincode` encoding.  Block hashes commit to
    /// this value, so it must not depend on anything but the three fields.
    pub fn hash(&self) -> Result<[u8; 32], TransactionError> {
        let bytes = bincode::serialize(self)?;
        let digest = Sha256::digest(&bytes);
        Ok(digest.into())
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}: ${}", self.sender, self.recipient, self.amount)
    }
}
