use std::collections::BTreeMap;

use pl_blockchain::Block;
use pl_protocol::{Message, Payload};
use pl_quorum::{QuorumCoordinator, QuorumError, QuorumPolicy, ReplyOutcome, Resolution, Routing};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{PeerId, RelayEvent};

/// Everything the routing task reacts to.
#[derive(Debug)]
pub(crate) enum Inbound {
    Message(PeerId, Message),
    Closed(PeerId),
    /// A bounded quorum ran out of time.
    QuorumExpired(Uuid),
}

/// Routing state of the relay: the peer table and the quorum bookkeeping.
///
/// Owned by a single task and driven one [`Inbound`] at a time, which is what
/// makes "record a reply, then check for quorum" atomic with respect to
/// replies from other peers.
pub(crate) struct Router {
    peers: BTreeMap<PeerId, mpsc::UnboundedSender<Message>>,
    quorum: QuorumCoordinator<PeerId>,
    policy: QuorumPolicy,
    event_tx: mpsc::UnboundedSender<RelayEvent>,
    /// Loops expirations back into the routing task.
    inbox_tx: mpsc::UnboundedSender<Inbound>,
}

impl Router {
    pub(crate) fn new(
        policy: QuorumPolicy,
        event_tx: mpsc::UnboundedSender<RelayEvent>,
        inbox_tx: mpsc::UnboundedSender<Inbound>,
    ) -> Self {
        Self {
            peers: BTreeMap::new(),
            quorum: QuorumCoordinator::new(),
            policy,
            event_tx,
            inbox_tx,
        }
    }

    pub(crate) fn connect(&mut self, peer: PeerId, outbound: mpsc::UnboundedSender<Message>) {
        self.peers.insert(peer, outbound);
    }

    pub(crate) fn dispatch(&mut self, input: Inbound) {
        match input {
            Inbound::Message(from, msg) => self.handle(from, msg),
            Inbound::Closed(peer) => self.disconnect(peer),
            Inbound::QuorumExpired(correlation_id) => self.expire(correlation_id),
        }
    }

    fn handle(&mut self, from: PeerId, msg: Message) {
        if !self.peers.contains_key(&from) {
            debug!(%from, "Ignoring message from unregistered peer");
            return;
        }

        let correlation_id = msg.correlation_id;
        match msg.payload {
            Payload::GetLongestChainRequest => self.on_longest_chain_request(from, correlation_id),
            Payload::GetLongestChainResponse(chain) => {
                self.on_longest_chain_response(from, correlation_id, chain)
            }
            payload @ (Payload::NewBlockRequest(_) | Payload::NewBlockAnnouncement(_)) => {
                self.forward(from, Message::reply(correlation_id, payload))
            }
        }
    }

    fn on_longest_chain_request(&mut self, requester: PeerId, correlation_id: Uuid) {
        let connected = self.connected();
        match self.quorum.open(correlation_id, requester, &connected) {
            Ok(Routing::Solo) => {
                info!(%requester, %correlation_id, "Only one peer connected, answering with an empty chain");
                self.deliver(Resolution {
                    correlation_id,
                    requester,
                    chain: Vec::new(),
                    replies: 0,
                    complete: true,
                });
            }

            Ok(Routing::Broadcast { targets }) => {
                let request = Message::reply(correlation_id, Payload::GetLongestChainRequest);
                for target in &targets {
                    self.send(*target, request.clone());
                }
                info!(%requester, %correlation_id, polled = targets.len(), "Polling peers for their chains");
                let _ = self.event_tx.send(RelayEvent::QuorumOpened {
                    correlation_id,
                    requester,
                    polled: targets.len(),
                });
                self.schedule_expiry(correlation_id);
            }

            Err(e) => warn!(%requester, "Rejected longest-chain request: {e}"),
        }
    }

    fn on_longest_chain_response(&mut self, from: PeerId, correlation_id: Uuid, chain: Vec<Block>) {
        let connected = self.connected();
        let chain_len = chain.len();
        match self.quorum.record_reply(correlation_id, from, chain, &connected) {
            Ok(ReplyOutcome::Waiting { awaiting }) => {
                debug!(%from, %correlation_id, chain_len, awaiting, "Recorded chain reply");
            }
            Ok(ReplyOutcome::Resolved(resolution)) => self.deliver(resolution),
            Err(e @ (QuorumError::UnknownExchange(_) | QuorumError::UnexpectedReplier(_))) => {
                debug!(%from, "Ignoring chain reply: {e}");
            }
            Err(e) => warn!(%from, "Chain reply failed: {e}"),
        }
    }

    /// Pass a block request or announcement to everybody but the sender.
    fn forward(&mut self, from: PeerId, msg: Message) {
        let kind = msg.message_type();
        let recipients: Vec<PeerId> = self.peers.keys().copied().filter(|p| *p != from).collect();
        for peer in &recipients {
            self.send(*peer, msg.clone());
        }
        debug!(%from, %kind, recipients = recipients.len(), "Forwarded message");
        let _ = self.event_tx.send(RelayEvent::Forwarded {
            from,
            kind,
            recipients: recipients.len(),
        });
    }

    fn disconnect(&mut self, peer: PeerId) {
        if self.peers.remove(&peer).is_none() {
            return;
        }
        info!(%peer, "Peer disconnected");
        let _ = self.event_tx.send(RelayEvent::PeerDisconnected(peer));

        let connected = self.connected();
        let departure = self.quorum.peer_disconnected(peer, &connected);
        for correlation_id in departure.abandoned {
            debug!(%peer, %correlation_id, "Requester left, dropping exchange");
        }
        for resolution in departure.resolved {
            self.deliver(resolution);
        }
    }

    fn expire(&mut self, correlation_id: Uuid) {
        if let Some(resolution) = self.quorum.expire(correlation_id) {
            warn!(
                %correlation_id,
                replies = resolution.replies,
                "Quorum timed out, answering with the replies received so far"
            );
            self.deliver(resolution);
        }
    }

    fn deliver(&mut self, resolution: Resolution<PeerId>) {
        let Resolution {
            correlation_id,
            requester,
            chain,
            replies,
            complete,
        } = resolution;
        let chain_len = chain.len();

        info!(%requester, %correlation_id, chain_len, replies, "Delivering longest chain");
        self.send(
            requester,
            Message::reply(correlation_id, Payload::GetLongestChainResponse(chain)),
        );
        let _ = self.event_tx.send(RelayEvent::QuorumResolved {
            correlation_id,
            requester,
            chain_len,
            replies,
            complete,
        });
    }

    fn schedule_expiry(&self, correlation_id: Uuid) {
        let Some(timeout) = self.policy.timeout() else {
            return;
        };
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = inbox.send(Inbound::QuorumExpired(correlation_id));
        });
    }

    fn send(&self, to: PeerId, msg: Message) {
        match self.peers.get(&to) {
            Some(outbound) => {
                if outbound.send(msg).is_err() {
                    debug!(peer = %to, "Writer already closed");
                }
            }
            None => debug!(peer = %to, "Dropping message for departed peer"),
        }
    }

    fn connected(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.quorum.outstanding()
    }
}
