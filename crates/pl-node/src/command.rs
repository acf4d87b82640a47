use std::str::FromStr;

use pl_transaction::Transaction;
use thiserror::Error;

/// Operator requests fed to [`crate::NodeRuntime::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    AddTransaction(Transaction),
    /// Ask peers to mine the pending set and mine it locally as well.
    GenerateBlock,
    Status,
    ShowChain,
    ShowPending,
    Shutdown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?} (try: tx, mine, status, chain, pending, quit)")]
    Unknown(String),

    #[error("usage: tx <sender> <recipient> <amount>")]
    TransactionUsage,

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

impl FromStr for NodeCommand {
    type Err = ParseCommandError;

    /// Parse one console line.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseCommandError::Empty)?;

        match verb.to_ascii_lowercase().as_str() {
            "tx" => {
                let args: Vec<&str> = words.collect();
                let [sender, recipient, amount] = args[..] else {
                    return Err(ParseCommandError::TransactionUsage);
                };
                let amount = amount
                    .trim_start_matches('$')
                    .parse::<u64>()
                    .map_err(|_| ParseCommandError::TransactionUsage)?;
                Transaction::new(sender, recipient, amount)
                    .map(NodeCommand::AddTransaction)
                    .map_err(|e| ParseCommandError::InvalidTransaction(e.to_string()))
            }
            "mine" => Ok(NodeCommand::GenerateBlock),
            "status" => Ok(NodeCommand::Status),
            "chain" => Ok(NodeCommand::ShowChain),
            "pending" => Ok(NodeCommand::ShowPending),
            "quit" | "exit" => Ok(NodeCommand::Shutdown),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}
