use std::{collections::HashMap, sync::Arc};

use pl_blockchain::Block;
use pl_protocol::{write_message, Message, MessageReader, Payload, ProtocolError};
use pl_transaction::Transaction;
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, oneshot, Mutex},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::NodeError;

type Awaiting = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Message>>>>;

/// Connection from a node to the relay.
///
/// Replies to [`RelayClient::request`] are matched by correlation id and
/// handed back to the caller.  Every other inbound message goes to the
/// receiver returned by [`RelayClient::connect`], in arrival order.
#[derive(Clone)]
pub struct RelayClient {
    outbound: mpsc::UnboundedSender<Message>,
    awaiting: Awaiting,
}

impl RelayClient {
    pub async fn connect(
        addr: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Message>), NodeError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(relay = addr, "Connected to relay");

        let (reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let awaiting = Awaiting::default();

        tokio::spawn(write_loop(writer, out_rx));
        tokio::spawn(read_loop(reader, in_tx, Arc::clone(&awaiting)));

        Ok((
            Self {
                outbound: out_tx,
                awaiting,
            },
            in_rx,
        ))
    }

    /// Queue `msg` for the relay without waiting for a reply.
    pub fn send(&self, msg: Message) -> Result<(), NodeError> {
        self.outbound
            .send(msg)
            .map_err(|_| NodeError::Disconnected)
    }

    /// Send `msg` and wait for the message carrying the same correlation id.
    pub async fn request(&self, msg: Message) -> Result<Message, NodeError> {
        let id = msg.correlation_id;
        let (tx, rx) = oneshot::channel();
        self.awaiting.lock().await.insert(id, tx);

        if let Err(e) = self.send(msg) {
            self.awaiting.lock().await.remove(&id);
            return Err(e);
        }
        rx.await.map_err(|_| NodeError::Disconnected)
    }

    /// Ask the relay for the longest chain any other node holds.
    pub async fn request_longest_chain(&self) -> Result<Vec<Block>, NodeError> {
        let reply = self
            .request(Message::new(Payload::GetLongestChainRequest))
            .await?;
        match reply.payload {
            Payload::GetLongestChainResponse(chain) => Ok(chain),
            other => Err(NodeError::UnexpectedReply(other.message_type())),
        }
    }

    /// Ask every other node to mine `transactions`.
    pub fn request_new_block(&self, transactions: Vec<Transaction>) -> Result<(), NodeError> {
        self.send(Message::new(Payload::NewBlockRequest(transactions)))
    }

    pub fn announce_new_block(&self, block: Block) -> Result<(), NodeError> {
        self.send(Message::new(Payload::NewBlockAnnouncement(block)))
    }

    /// Answer a chain request the relay forwarded to us.
    pub fn respond_with_chain(
        &self,
        correlation_id: Uuid,
        chain: Vec<Block>,
    ) -> Result<(), NodeError> {
        self.send(Message::reply(
            correlation_id,
            Payload::GetLongestChainResponse(chain),
        ))
    }
}

async fn read_loop(
    reader: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<Message>,
    awaiting: Awaiting,
) {
    let mut reader = MessageReader::new(reader);

    loop {
        match reader.next().await {
            Ok(Some(Ok(msg))) => {
                let waiter = awaiting.lock().await.remove(&msg.correlation_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(msg);
                    }
                    None => {
                        if inbound.send(msg).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Some(Err(ProtocolError::UnknownType(kind)))) => {
                warn!("Received message of unknown type {kind:?}");
            }
            Ok(Some(Err(e))) => warn!("Dropping malformed message: {e}"),
            Ok(None) => {
                info!("Relay closed the connection");
                break;
            }
            Err(e) => {
                warn!("Relay read failed: {e}");
                break;
            }
        }
    }

    // Wake anyone still waiting for a reply.
    awaiting.lock().await.clear();
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = outbound.recv().await {
        if let Err(e) = write_message(&mut writer, &msg).await {
            debug!("Write to relay failed: {e}");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    /// A fake relay: accepts one connection and hands back its halves.
    async fn fake_relay() -> (
        String,
        tokio::task::JoinHandle<(MessageReader<OwnedReadHalf>, OwnedWriteHalf)>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, w) = stream.into_split();
            (MessageReader::new(r), w)
        });
        (addr, accept)
    }

    #[tokio::test]
    async fn replies_are_routed_to_the_requester() {
        let (addr, accept) = fake_relay().await;
        let (client, mut inbound) = RelayClient::connect(&addr).await.unwrap();
        let (mut relay_in, mut relay_out) = accept.await.unwrap();

        let request = tokio::spawn({
            let client = client.clone();
            async move { client.request_longest_chain().await }
        });

        let asked = relay_in.next().await.unwrap().unwrap().unwrap();
        assert_eq!(asked.payload, Payload::GetLongestChainRequest);

        // An unrelated message first; it must not satisfy the request.
        let unrelated = Message::new(Payload::NewBlockAnnouncement(Block::genesis()));
        write_message(&mut relay_out, &unrelated).await.unwrap();
        write_message(
            &mut relay_out,
            &Message::reply(
                asked.correlation_id,
                Payload::GetLongestChainResponse(vec![Block::genesis()]),
            ),
        )
        .await
        .unwrap();

        assert_eq!(request.await.unwrap().unwrap(), vec![Block::genesis()]);
        assert_eq!(inbound.recv().await.unwrap(), unrelated);
    }

    #[tokio::test]
    async fn pending_request_fails_when_relay_goes_away() {
        let (addr, accept) = fake_relay().await;
        let (client, _inbound) = RelayClient::connect(&addr).await.unwrap();
        let (mut relay_in, relay_out) = accept.await.unwrap();

        let request = tokio::spawn({
            let client = client.clone();
            async move { client.request_longest_chain().await }
        });
        relay_in.next().await.unwrap().unwrap().unwrap();
        drop(relay_out);
        drop(relay_in);

        assert!(matches!(
            request.await.unwrap(),
            Err(NodeError::Disconnected)
        ));
    }
}
