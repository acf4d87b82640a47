pub mod coordinator;
pub mod error;
pub mod policy;

pub use coordinator::{select_longest, Departure, QuorumCoordinator, ReplyOutcome, Resolution, Routing};
pub use error::QuorumError;
pub use policy::QuorumPolicy;
