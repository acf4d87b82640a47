use std::{collections::HashMap, hash::Hash};

use pl_blockchain::Block;
use uuid::Uuid;

use crate::QuorumError;

/// What the relay should do with a fresh longest-chain request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing<P> {
    /// Nobody else is connected: answer the requester with an empty chain.
    Solo,
    /// Forward the request to `targets` and wait for their replies.
    Broadcast { targets: Vec<P> },
}

/// The answer to deliver to a requester once an exchange is settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<P> {
    pub correlation_id: Uuid,
    pub requester: P,
    /// The winning chain; empty when no peer replied.
    pub chain: Vec<Block>,
    /// Number of replies the decision was based on.
    pub replies: usize,
    /// `false` when the exchange was cut short by a timeout.
    pub complete: bool,
}

/// Result of recording one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome<P> {
    /// Still waiting on `awaiting` connected peers.
    Waiting { awaiting: usize },
    Resolved(Resolution<P>),
}

/// Effect of a peer leaving the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure<P> {
    /// Exchanges requested by the departed peer, now dropped.
    pub abandoned: Vec<Uuid>,
    /// Exchanges that became complete because the peer was the last one
    /// still awaited.
    pub resolved: Vec<Resolution<P>>,
}

struct Exchange<P> {
    requester: P,
    /// Replies in arrival order, one per peer.
    replies: Vec<(P, Vec<Block>)>,
}

impl<P: Copy + Eq> Exchange<P> {
    fn has_replied(&self, peer: &P) -> bool {
        self.replies.iter().any(|(p, _)| p == peer)
    }

    fn awaiting<'a>(&'a self, connected: &'a [P]) -> impl Iterator<Item = P> + 'a {
        connected
            .iter()
            .copied()
            .filter(move |p| *p != self.requester && !self.has_replied(p))
    }

    fn into_resolution(self, correlation_id: Uuid, complete: bool) -> Resolution<P> {
        let replies = self.replies.len();
        let winner = select_longest(self.replies.iter().map(|(_, chain)| chain.as_slice()));
        let chain = match winner {
            Some(i) => self.replies.into_iter().nth(i).map(|(_, c)| c).unwrap_or_default(),
            None => Vec::new(),
        };
        Resolution {
            correlation_id,
            requester: self.requester,
            chain,
            replies,
            complete,
        }
    }
}

/// Per-correlation-id bookkeeping for longest-chain requests.
///
/// The coordinator owns no chain state and knows nothing about sockets: the
/// caller passes in the set of currently connected peers on every call, and
/// completion is always judged against that live set rather than a snapshot
/// taken when the request arrived.  A peer that joins mid-exchange is
/// therefore never waited for, and one that leaves stops being waited for.
///
/// Not internally synchronised.  The relay drives it from a single task.
pub struct QuorumCoordinator<P> {
    exchanges: HashMap<Uuid, Exchange<P>>,
}

impl<P> Default for QuorumCoordinator<P> {
    fn default() -> Self {
        Self {
            exchanges: HashMap::new(),
        }
    }
}

impl<P: Copy + Eq + Hash> QuorumCoordinator<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of exchanges still waiting for replies.
    pub fn outstanding(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_outstanding(&self, correlation_id: &Uuid) -> bool {
        self.exchanges.contains_key(correlation_id)
    }

    /// Register a longest-chain request from `requester`.
    ///
    /// With no other peer connected nothing is recorded and [`Routing::Solo`]
    /// is returned.
    pub fn open(
        &mut self,
        correlation_id: Uuid,
        requester: P,
        connected: &[P],
    ) -> Result<Routing<P>, QuorumError> {
        if self.exchanges.contains_key(&correlation_id) {
            return Err(QuorumError::DuplicateExchange(correlation_id));
        }

        let targets: Vec<P> = connected.iter().copied().filter(|p| *p != requester).collect();
        if targets.is_empty() {
            return Ok(Routing::Solo);
        }

        self.exchanges.insert(
            correlation_id,
            Exchange {
                requester,
                replies: Vec::new(),
            },
        );
        Ok(Routing::Broadcast { targets })
    }

    /// Record `from`'s chain and resolve the exchange if nobody else is
    /// awaited.
    ///
    /// A second reply from the same peer replaces its chain but keeps its
    /// first arrival position.
    pub fn record_reply(
        &mut self,
        correlation_id: Uuid,
        from: P,
        chain: Vec<Block>,
        connected: &[P],
    ) -> Result<ReplyOutcome<P>, QuorumError> {
        let exchange = self
            .exchanges
            .get_mut(&correlation_id)
            .ok_or(QuorumError::UnknownExchange(correlation_id))?;

        if from == exchange.requester || !connected.contains(&from) {
            return Err(QuorumError::UnexpectedReplier(correlation_id));
        }

        match exchange.replies.iter_mut().find(|(p, _)| *p == from) {
            Some(slot) => slot.1 = chain,
            None => exchange.replies.push((from, chain)),
        }

        let awaiting = exchange.awaiting(connected).count();
        if awaiting > 0 {
            return Ok(ReplyOutcome::Waiting { awaiting });
        }

        Ok(self
            .take(correlation_id, true)
            .map(ReplyOutcome::Resolved)
            .unwrap_or(ReplyOutcome::Waiting { awaiting: 0 }))
    }

    /// Forget everything `peer` requested and settle exchanges that were only
    /// waiting on it.  `connected` must no longer contain `peer`.
    pub fn peer_disconnected(&mut self, peer: P, connected: &[P]) -> Departure<P> {
        let abandoned: Vec<Uuid> = self
            .exchanges
            .iter()
            .filter(|(_, ex)| ex.requester == peer)
            .map(|(id, _)| *id)
            .collect();
        for id in &abandoned {
            self.exchanges.remove(id);
        }

        let settled: Vec<Uuid> = self
            .exchanges
            .iter()
            .filter(|(_, ex)| ex.awaiting(connected).next().is_none())
            .map(|(id, _)| *id)
            .collect();
        let resolved = settled
            .into_iter()
            .filter_map(|id| self.take(id, true))
            .collect();

        Departure {
            abandoned,
            resolved,
        }
    }

    /// Settle an exchange with whatever replies it has.  Returns `None` if it
    /// was already resolved or abandoned.
    pub fn expire(&mut self, correlation_id: Uuid) -> Option<Resolution<P>> {
        self.take(correlation_id, false)
    }

    /// Peers still expected to reply to `correlation_id`.
    pub fn awaiting(&self, correlation_id: &Uuid, connected: &[P]) -> Option<Vec<P>> {
        self.exchanges
            .get(correlation_id)
            .map(|ex| ex.awaiting(connected).collect())
    }

    fn take(&mut self, correlation_id: Uuid, complete: bool) -> Option<Resolution<P>> {
        self.exchanges
            .remove(&correlation_id)
            .map(|ex| ex.into_resolution(correlation_id, complete))
    }
}

/// Index of the winning chain: the first one strictly longer than every chain
/// before it.  Later chains of equal length never displace an earlier one.
pub fn select_longest<'a, I>(chains: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a [Block]>,
{
    let mut best: Option<(usize, usize)> = None;
    for (i, chain) in chains.into_iter().enumerate() {
        match best {
            Some((_, len)) if chain.len() <= len => {}
            _ => best = Some((i, chain.len())),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(len: usize) -> Vec<Block> {
        vec![Block::genesis(); len]
    }

    /// Chain of `len` blocks whose last block carries `tag` as its nonce, so
    /// equal-length chains can be told apart.
    fn tagged(len: usize, tag: u64) -> Vec<Block> {
        let mut c = chain(len);
        if let Some(last) = c.last_mut() {
            last.nonce = tag;
        }
        c
    }

    #[test]
    fn select_longest_prefers_first_strictly_longer() {
        let a = tagged(3, 1);
        let b = tagged(5, 2);
        let c = tagged(5, 3);
        let winner = select_longest([a.as_slice(), b.as_slice(), c.as_slice()]);
        assert_eq!(winner, Some(1));
    }

    #[test]
    fn select_longest_keeps_first_of_equal_lengths() {
        let a = tagged(2, 1);
        let b = tagged(2, 2);
        assert_eq!(select_longest([a.as_slice(), b.as_slice()]), Some(0));
        assert_eq!(select_longest(std::iter::empty::<&[Block]>()), None);
    }

    #[test]
    fn solo_requester_gets_no_bookkeeping() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        assert_eq!(q.open(id, 1u32, &[1]).unwrap(), Routing::Solo);
        assert_eq!(q.outstanding(), 0);
    }

    #[test]
    fn broadcast_targets_exclude_requester() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        let routing = q.open(id, 1u32, &[1, 2, 3]).unwrap();
        assert_eq!(routing, Routing::Broadcast { targets: vec![2, 3] });
        assert!(q.is_outstanding(&id));
    }

    #[test]
    fn duplicate_correlation_id_is_rejected() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        q.open(id, 1u32, &[1, 2]).unwrap();
        assert!(matches!(
            q.open(id, 2, &[1, 2]),
            Err(QuorumError::DuplicateExchange(_))
        ));
    }

    #[test]
    fn resolves_only_after_every_other_peer_replied() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        let connected = [1u32, 2, 3];
        q.open(id, 1, &connected).unwrap();

        let first = q.record_reply(id, 2, chain(2), &connected).unwrap();
        assert_eq!(first, ReplyOutcome::Waiting { awaiting: 1 });

        match q.record_reply(id, 3, chain(4), &connected).unwrap() {
            ReplyOutcome::Resolved(res) => {
                assert_eq!(res.requester, 1);
                assert_eq!(res.chain.len(), 4);
                assert_eq!(res.replies, 2);
                assert!(res.complete);
            }
            other => panic!("expected resolution, got {other:?}"),
        }
        assert_eq!(q.outstanding(), 0);
    }

    #[test]
    fn tie_break_follows_arrival_order() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        let connected = [0u32, 1, 2, 3];
        q.open(id, 0, &connected).unwrap();

        q.record_reply(id, 1, tagged(3, 1), &connected).unwrap();
        q.record_reply(id, 2, tagged(5, 2), &connected).unwrap();
        match q.record_reply(id, 3, tagged(5, 3), &connected).unwrap() {
            ReplyOutcome::Resolved(res) => assert_eq!(res.chain, tagged(5, 2)),
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    #[test]
    fn repeated_reply_keeps_its_position() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        let connected = [0u32, 1, 2, 3];
        q.open(id, 0, &connected).unwrap();

        q.record_reply(id, 1, tagged(1, 1), &connected).unwrap();
        q.record_reply(id, 2, tagged(4, 2), &connected).unwrap();
        // Peer 1 answers again with an equally long chain: it now sits ahead
        // of peer 2 in arrival order and wins the tie.
        q.record_reply(id, 1, tagged(4, 9), &connected).unwrap();
        match q.record_reply(id, 3, chain(2), &connected).unwrap() {
            ReplyOutcome::Resolved(res) => {
                assert_eq!(res.chain, tagged(4, 9));
                assert_eq!(res.replies, 3);
            }
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    #[test]
    fn reply_from_requester_or_stranger_is_refused() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        let connected = [1u32, 2];
        q.open(id, 1, &connected).unwrap();

        assert!(matches!(
            q.record_reply(id, 1, chain(9), &connected),
            Err(QuorumError::UnexpectedReplier(_))
        ));
        assert!(matches!(
            q.record_reply(id, 7, chain(9), &connected),
            Err(QuorumError::UnexpectedReplier(_))
        ));
        assert_eq!(q.awaiting(&id, &connected), Some(vec![2]));
    }

    #[test]
    fn unknown_exchange_is_an_error() {
        let mut q: QuorumCoordinator<u32> = QuorumCoordinator::new();
        assert!(matches!(
            q.record_reply(Uuid::new_v4(), 2, chain(1), &[1, 2]),
            Err(QuorumError::UnknownExchange(_))
        ));
    }

    #[test]
    fn peer_joining_mid_exchange_is_not_awaited() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        q.open(id, 1u32, &[1, 2]).unwrap();
        // Peer 3 joins, then peer 2 answers.  Peer 3 never saw the request,
        // but the live set now includes it.
        let connected = [1, 2, 3];
        assert_eq!(
            q.record_reply(id, 2, chain(2), &connected).unwrap(),
            ReplyOutcome::Waiting { awaiting: 1 }
        );
    }

    #[test]
    fn departure_of_last_awaited_peer_resolves() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        q.open(id, 1u32, &[1, 2, 3]).unwrap();
        q.record_reply(id, 2, chain(3), &[1, 2, 3]).unwrap();

        let departure = q.peer_disconnected(3, &[1, 2]);
        assert!(departure.abandoned.is_empty());
        assert_eq!(departure.resolved.len(), 1);
        assert_eq!(departure.resolved[0].chain.len(), 3);
        assert_eq!(q.outstanding(), 0);
    }

    #[test]
    fn departure_of_requester_abandons_exchange() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        q.open(id, 1u32, &[1, 2, 3]).unwrap();

        let departure = q.peer_disconnected(1, &[2, 3]);
        assert_eq!(departure.abandoned, vec![id]);
        assert!(departure.resolved.is_empty());
        assert!(!q.is_outstanding(&id));
    }

    #[test]
    fn everyone_leaving_yields_empty_chain() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        q.open(id, 1u32, &[1, 2]).unwrap();

        let departure = q.peer_disconnected(2, &[1]);
        assert_eq!(departure.resolved.len(), 1);
        assert!(departure.resolved[0].chain.is_empty());
        assert_eq!(departure.resolved[0].replies, 0);
    }

    #[test]
    fn expire_settles_with_partial_replies() {
        let mut q = QuorumCoordinator::new();
        let id = Uuid::new_v4();
        let connected = [1u32, 2, 3];
        q.open(id, 1, &connected).unwrap();
        q.record_reply(id, 2, chain(6), &connected).unwrap();

        let res = q.expire(id).unwrap();
        assert!(!res.complete);
        assert_eq!(res.chain.len(), 6);
        assert!(q.expire(id).is_none());
    }
}
