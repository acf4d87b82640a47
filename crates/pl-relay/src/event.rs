use std::net::SocketAddr;

use pl_protocol::MessageType;
use uuid::Uuid;

use crate::PeerId;

/// High-level events emitted by a running [`crate::Relay`] for whoever
/// embeds it (the binary logs them; tests assert on them).
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// The relay is accepting connections on this address.
    Listening(SocketAddr),

    PeerConnected { peer: PeerId, addr: SocketAddr },

    PeerDisconnected(PeerId),

    /// A message was forwarded to `recipients` peers.
    Forwarded {
        from: PeerId,
        kind: MessageType,
        recipients: usize,
    },

    /// A longest-chain request went out to every other peer.
    QuorumOpened {
        correlation_id: Uuid,
        requester: PeerId,
        polled: usize,
    },

    /// A longest-chain answer was delivered to `requester`.
    QuorumResolved {
        correlation_id: Uuid,
        requester: PeerId,
        chain_len: usize,
        replies: usize,
        complete: bool,
    },
}
