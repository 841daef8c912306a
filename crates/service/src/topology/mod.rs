//! The routing core.
//!
//! Per configured peer, a soft-state table of the channels that peer is a
//! downstream subscriber of; process-wide, a bounded ring of recently
//! seen message ids. Together they build a per-channel spanning subtree
//! over the server graph: joins flood and stop at servers that already
//! hold the channel, duplicate says (detected by id) prune the redundant
//! edge, and the periodic refresh re-announces interest and ages out
//! whatever stopped renewing.
//!
//! Nothing here is retried; a lost datagram is repaired by the next
//! refresh tick.

pub mod channels;

use std::net::SocketAddr;

use bytes::BytesMut;
use rand::Rng;

use codec::{
    s2s::{S2sJoin, S2sLeave, S2sSay},
    text::{ChannelName, SayText, Username},
};

use crate::{Transport, sessions::Sessions};
use self::channels::ChannelSet;

/// Upper bound on configured peers; enforced at configuration time.
pub const PEERS_MAX: usize = 100;

/// Capacity of the recent message id ring.
pub const ID_POOL_MAX: usize = 2000;

/// A bounded ring of recently observed message ids, the sole
/// loop-suppression mechanism. Membership is a linear scan; insertion
/// overwrites the oldest entry once full. An id colliding with a
/// forgotten one merely suppresses a single message.
pub struct IdPool {
    ids: Vec<u64>,
    next: usize,
}

impl IdPool {
    fn new() -> Self {
        Self {
            ids: Vec::with_capacity(ID_POOL_MAX),
            next: 0,
        }
    }

    pub fn store(&mut self, id: u64) {
        if self.ids.len() < ID_POOL_MAX {
            self.ids.push(id);
        } else {
            self.ids[self.next] = id;
            self.next = (self.next + 1) % ID_POOL_MAX;
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }
}

struct Peer {
    address: SocketAddr,
    channels: ChannelSet,
}

pub struct Topology {
    local: SocketAddr,
    peers: Vec<Peer>,
    ids: IdPool,
    buf: BytesMut,
}

impl Topology {
    pub fn new(local: SocketAddr, addresses: &[SocketAddr]) -> Self {
        debug_assert!(addresses.len() <= PEERS_MAX);

        Self {
            peers: addresses
                .iter()
                .map(|address| Peer {
                    address: *address,
                    channels: ChannelSet::new(),
                })
                .collect(),
            ids: IdPool::new(),
            buf: BytesMut::with_capacity(256),
            local,
        }
    }

    /// Peers are matched by bit-equal address; an unconfigured sender
    /// matches nothing and its routing-table updates are skipped.
    fn find_peer(&mut self, address: SocketAddr) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|peer| peer.address == address)
    }

    /// Announce a channel subscription to every peer except the one that
    /// caused this send. Each targeted peer is also entered into our own
    /// routing table for the channel, since the join tells it to route
    /// the channel's traffic through us.
    pub fn join_send<T: Transport>(
        &mut self,
        transport: &T,
        channel: ChannelName,
        except: Option<SocketAddr>,
    ) {
        let Self {
            local, peers, buf, ..
        } = self;

        S2sJoin {
            origin: *local,
            channel,
        }
        .encode(buf);

        for peer in peers.iter_mut() {
            if except == Some(peer.address) {
                continue;
            }

            log::info!("{} {} send S2S Join {}", local, peer.address, channel);
            peer.channels.add(channel);

            if let Err(e) = transport.send(&buf[..], peer.address) {
                log::warn!("S2S join send failure to {}: {}", peer.address, e);
            }
        }
    }

    /// Prune one branch (`target` set) or every branch (`target` none) of
    /// a channel. Leaves are never flooded onward by the receiver.
    pub fn leave_send<T: Transport>(
        &mut self,
        transport: &T,
        channel: ChannelName,
        target: Option<SocketAddr>,
    ) {
        let Self {
            local, peers, buf, ..
        } = self;

        S2sLeave {
            origin: *local,
            channel,
        }
        .encode(buf);

        for peer in peers.iter_mut() {
            if let Some(target) = target {
                if peer.address != target {
                    continue;
                }
            }

            log::info!("{} {} send S2S Leave {}", local, peer.address, channel);
            peer.channels.remove(&channel);

            if let Err(e) = transport.send(&buf[..], peer.address) {
                log::warn!("S2S leave send failure to {}: {}", peer.address, e);
            }
        }
    }

    /// Forward a say to every peer that subscribes to the channel, except
    /// the one it arrived from. `id` is `None` at the origin, which mints
    /// a fresh id and pools it. Returns whether anyone was sent to.
    pub fn say_send<T: Transport>(
        &mut self,
        transport: &T,
        username: Username,
        channel: ChannelName,
        text: SayText,
        id: Option<u64>,
        except: Option<SocketAddr>,
    ) -> bool {
        let id = match id {
            Some(id) => id,
            None => {
                let id = rand::rng().random::<u64>();
                self.ids.store(id);
                id
            }
        };

        let Self {
            local, peers, buf, ..
        } = self;

        S2sSay {
            origin: *local,
            id,
            username,
            channel,
            text,
        }
        .encode(buf);

        let mut sent = false;
        for peer in peers.iter() {
            if except == Some(peer.address) {
                continue;
            }

            if !peer.channels.has(&channel) {
                continue;
            }

            log::info!(
                "{} {} send S2S Say {} {} \"{}\"",
                local,
                peer.address,
                username,
                channel,
                text
            );
            sent = true;

            if let Err(e) = transport.send(&buf[..], peer.address) {
                log::warn!("S2S say send failure to {}: {}", peer.address, e);
            }
        }

        sent
    }

    /// Inbound join: the sender wants this channel's traffic through the
    /// link it arrived on. A channel we did not hold yet is created
    /// (empty) and re-flooded; the flood stops at servers that already
    /// hold it. The sender's entry is renewed either way.
    pub fn join_recv<T: Transport>(
        &mut self,
        transport: &T,
        sessions: &mut Sessions,
        source: SocketAddr,
        origin: SocketAddr,
        channel: ChannelName,
    ) {
        log::info!("{} {} recv S2S Join {}", self.local, origin, channel);

        if let Some(peer) = self.find_peer(source) {
            peer.channels.add(channel);
        }

        if !sessions.has_channel(&channel) {
            sessions.ensure_channel(channel);
            self.join_send(transport, channel, Some(source));
        }

        if let Some(peer) = self.find_peer(source) {
            peer.channels.renew(&channel);
        }
    }

    /// Inbound leave: a narrow prune of the sender's subscription. No
    /// onward flood, no local channel deletion; an unconfigured sender is
    /// dropped silently.
    pub fn leave_recv(&mut self, source: SocketAddr, origin: SocketAddr, channel: ChannelName) {
        log::info!("{} {} recv S2S Leave {}", self.local, origin, channel);

        if let Some(peer) = self.find_peer(source) {
            peer.channels.remove(&channel);
        }
    }

    /// Inbound say. Returns whether the message is new here and should be
    /// delivered to local channel members.
    pub fn say_recv<T: Transport>(
        &mut self,
        transport: &T,
        sessions: &mut Sessions,
        source: SocketAddr,
        origin: SocketAddr,
        id: u64,
        username: Username,
        channel: ChannelName,
        text: SayText,
    ) -> bool {
        log::info!(
            "{} {} recv S2S Say {} {} \"{}\"",
            self.local,
            origin,
            username,
            channel,
            text
        );

        // A known id means the message also reached us along another
        // path; prune the redundant edge it just arrived on.
        if self.ids.contains(id) {
            self.leave_send(transport, channel, Some(source));
            return false;
        }

        // No local record: we are genuinely off-tree for this channel.
        // No pre-emptive prune here — the channel may exist further
        // downstream through a link that just has not joined us yet.
        if !sessions.has_channel(&channel) {
            return false;
        }

        self.ids.store(id);

        let sent = self.say_send(transport, username, channel, text, Some(id), Some(source));

        // A leaf with no local users serves nobody: detach this branch
        // entirely and drop the channel record.
        if !sent && sessions.member_count(&channel) == 0 {
            self.leave_send(transport, channel, None);
            sessions.remove_channel(&channel);
            return false;
        }

        true
    }

    /// The refresh tick. Re-announce every locally held channel to all
    /// peers (their tables renew our entries on receive), then age every
    /// peer table and drop what expired. Expiry is handled as a synthetic
    /// inbound leave: the peer stopped renewing us, so only local state
    /// needs purging, not the peer.
    pub fn renew<T: Transport>(&mut self, transport: &T, sessions: &Sessions) {
        for channel in sessions.channel_names() {
            self.join_send(transport, channel, None);
        }

        for index in 0..self.peers.len() {
            self.peers[index].channels.age();

            while let Some(expired) = self.peers[index].channels.find_expired() {
                let address = self.peers[index].address;
                self.leave_recv(address, address, expired);
            }
        }
    }

    pub fn routes(&self, peer: SocketAddr) -> Vec<ChannelName> {
        self.peers
            .iter()
            .find(|entry| entry.address == peer)
            .map(|entry| entry.channels.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_pool_overwrites_the_oldest_entry() {
        let mut pool = IdPool::new();

        for id in 0..ID_POOL_MAX as u64 {
            pool.store(id);
        }
        assert!(pool.contains(0));
        assert!(pool.contains(ID_POOL_MAX as u64 - 1));

        pool.store(u64::MAX);
        assert!(!pool.contains(0));
        assert!(pool.contains(1));
        assert!(pool.contains(u64::MAX));

        pool.store(u64::MAX - 1);
        assert!(!pool.contains(1));
        assert!(pool.contains(2));
    }

    #[test]
    fn id_pool_zero_is_an_ordinary_id() {
        let mut pool = IdPool::new();
        assert!(!pool.contains(0));

        pool.store(0);
        assert!(pool.contains(0));
    }
}
