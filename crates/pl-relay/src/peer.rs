use std::fmt;

use pl_protocol::{write_message, Message, MessageReader, ProtocolError};
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::mpsc,
};
use tracing::{debug, warn};

use crate::router::Inbound;

/// Relay-local identifier of a connection.  Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Split `stream` into a reader task feeding `inbox` and a writer task fed
/// by the returned sender.
///
/// The reader forwards messages in the order they arrive and reports
/// [`Inbound::Closed`] exactly once when the connection ends.
pub(crate) fn spawn_connection(
    peer: PeerId,
    stream: TcpStream,
    inbox: mpsc::UnboundedSender<Inbound>,
) -> mpsc::UnboundedSender<Message> {
    let (reader, writer) = stream.into_split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    tokio::spawn(write_loop(peer, writer, out_rx));
    tokio::spawn(read_loop(peer, reader, inbox));

    out_tx
}

async fn read_loop(peer: PeerId, reader: OwnedReadHalf, inbox: mpsc::UnboundedSender<Inbound>) {
    let mut reader = MessageReader::new(reader);

    loop {
        match reader.next().await {
            Ok(Some(Ok(msg))) => {
                if inbox.send(Inbound::Message(peer, msg)).is_err() {
                    return;
                }
            }
            Ok(Some(Err(ProtocolError::UnknownType(kind)))) => {
                warn!(%peer, "Received message of unknown type {kind:?}");
            }
            Ok(Some(Err(e))) => warn!(%peer, "Dropping malformed message: {e}"),
            Ok(None) => break,
            Err(e) => {
                debug!(%peer, "Read error: {e}");
                break;
            }
        }
    }

    let _ = inbox.send(Inbound::Closed(peer));
}

async fn write_loop(
    peer: PeerId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = outbound.recv().await {
        if let Err(e) = write_message(&mut writer, &msg).await {
            debug!(%peer, "Write failed, closing writer: {e}");
            break;
        }
    }
}
