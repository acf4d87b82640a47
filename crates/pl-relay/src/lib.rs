pub mod config;
pub mod error;
pub mod event;
pub mod peer;
pub mod relay;
mod router;

pub use config::RelayConfig;
pub use error::RelayError;
pub use event::RelayEvent;
pub use peer::PeerId;
pub use relay::Relay;
