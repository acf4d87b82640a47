pub mod error;
pub mod io;
pub mod message;

pub use error::ProtocolError;
pub use io::{write_message, MessageReader};
pub use message::{decode_message, encode_message, Message, MessageType, Payload};
