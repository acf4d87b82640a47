pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod miner;
pub mod node;
pub mod runtime;
pub mod status;

pub use client::RelayClient;
pub use command::{NodeCommand, ParseCommandError};
pub use config::NodeConfig;
pub use error::NodeError;
pub use event::NodeEvent;
pub use miner::{Miner, MiningJob};
pub use node::Node;
pub use runtime::NodeRuntime;
pub use status::NodeStatus;
