use std::net::SocketAddr;

use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    config::RelayConfig,
    error::RelayError,
    event::RelayEvent,
    peer::{spawn_connection, PeerId},
    router::{Inbound, Router},
};

/// The relay hub.
///
/// Every node holds one TCP connection to the relay.  Each connection gets a
/// reader and a writer task; all routing decisions happen in [`Relay::run`],
/// one inbound event at a time.
pub struct Relay {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox_rx: mpsc::UnboundedReceiver<Inbound>,
    event_tx: mpsc::UnboundedSender<RelayEvent>,
    next_peer: u64,
}

impl Relay {
    /// Bind the listener described by `config`.
    ///
    /// Returns the relay together with a receiver for [`RelayEvent`]s that
    /// the calling application can process independently.
    pub async fn bind(
        config: RelayConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayEvent>), RelayError> {
        let listener = TcpListener::bind((config.host, config.port)).await?;
        let local_addr = listener.local_addr()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        info!(%local_addr, policy = ?config.policy, "Relay listening");
        let _ = event_tx.send(RelayEvent::Listening(local_addr));

        let relay = Self {
            listener,
            local_addr,
            router: Router::new(config.policy, event_tx.clone(), inbox_tx.clone()),
            inbox_tx,
            inbox_rx,
            event_tx,
            next_peer: 0,
        };

        Ok((relay, event_rx))
    }

    /// Address the listener is bound to (useful when the port was `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the relay event loop.  This future runs until cancelled.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr),
                    Err(e) => warn!("Accept failed: {e}"),
                },

                Some(input) = self.inbox_rx.recv() => self.router.dispatch(input),
            }
        }
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        self.next_peer += 1;
        let peer = PeerId(self.next_peer);

        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, "Could not disable Nagle: {e}");
        }

        // The reader only reaches the router through the inbox, which is not
        // polled again until this peer is registered.
        let outbound = spawn_connection(peer, stream, self.inbox_tx.clone());
        self.router.connect(peer, outbound);

        info!(%peer, %addr, "Peer connected");
        let _ = self.event_tx.send(RelayEvent::PeerConnected { peer, addr });
    }
}
