//! DuckChat protocol state and logic.
//!
//! Everything a server knows lives here: the membership store (users and
//! channels), the routing topology (per-peer soft-state channel tables
//! plus the message id pool), and the per-datagram router that drives
//! both from inbound frames. The crate does no I/O of its own; outbound
//! datagrams leave through the [`Transport`] trait and inbound ones
//! arrive through [`router::Router::route`].
//!
//! The whole state sits behind one coarse lock. The workload is bounded
//! by a single datagram socket and the protocol requires that routing
//! operations never interleave, so there is nothing to gain from
//! anything finer.

pub mod router;
pub mod sessions;
pub mod topology;

use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use codec::text::{ChannelName, Username};

use self::{router::Router, sessions::Sessions, topology::Topology};

/// Non-blocking outbound datagram transport.
///
/// One socket is shared by all traffic; the destination address selects
/// the peer or client. Sends must not block: on a full buffer the
/// datagram is dropped and the refresh machinery repairs the loss.
pub trait Transport {
    fn send(&self, bytes: &[u8], target: SocketAddr) -> std::io::Result<usize>;
}

/// Membership event hooks.
///
/// All methods have empty defaults; implementors pick what to watch.
pub trait Observer: Send + Sync {
    #[allow(unused_variables)]
    fn on_login(&self, address: SocketAddr, username: &Username) {}

    #[allow(unused_variables)]
    fn on_logout(&self, address: SocketAddr, username: &Username) {}

    #[allow(unused_variables)]
    fn on_join(&self, username: &Username, channel: &ChannelName) {}

    #[allow(unused_variables)]
    fn on_leave(&self, username: &Username, channel: &ChannelName) {}

    /// The user missed its keepalive window and was reaped.
    #[allow(unused_variables)]
    fn on_user_expired(&self, address: SocketAddr, username: &Username) {}
}

pub struct ServiceOptions<T, O> {
    /// The advertised (and bound) address of this server.
    pub local: SocketAddr,
    /// Peer servers, fixed for the process lifetime.
    pub peers: Vec<SocketAddr>,
    /// How long a silent user survives before the reaper removes it.
    pub keepalive: Duration,
    pub transport: T,
    pub observer: O,
}

/// One chat server.
pub struct Service<T, O> {
    local: SocketAddr,
    state: Mutex<State>,
    transport: T,
    observer: O,
}

pub(crate) struct State {
    pub sessions: Sessions,
    pub topology: Topology,
}

impl<T, O> Service<T, O>
where
    T: Transport,
    O: Observer,
{
    pub fn new(options: ServiceOptions<T, O>) -> Self {
        Self {
            state: Mutex::new(State {
                sessions: Sessions::new(options.keepalive),
                topology: Topology::new(options.local, &options.peers),
            }),
            local: options.local,
            transport: options.transport,
            observer: options.observer,
        }
    }

    pub fn local(&self) -> SocketAddr {
        self.local
    }

    /// Get a router over this service. The router owns the scratch encode
    /// buffer, so the caller creates one and feeds it every datagram.
    pub fn router(&self) -> Router<'_, T, O> {
        Router::new(self)
    }

    /// The S2S refresh tick: re-announce every locally held channel, then
    /// age all peer routing tables and prune what expired.
    pub fn renew(&self) {
        let mut state = self.state.lock();
        let State { sessions, topology } = &mut *state;

        topology.renew(&self.transport, sessions);
    }

    /// The user keepalive tick. Reaped users leave their channels; any
    /// channel that empties is dropped and announced as left to every
    /// peer, exactly as if the user had sent the leave itself.
    pub fn reap(&self) {
        let mut state = self.state.lock();
        let State { sessions, topology } = &mut *state;

        for reaped in sessions.reap(Instant::now()) {
            self.observer.on_user_expired(reaped.address, &reaped.username);

            for channel in reaped.removed_channels {
                topology.leave_send(&self.transport, channel, None);
            }
        }
    }

    /// The channels a peer is currently routed for, freshness-blind.
    pub fn routes(&self, peer: SocketAddr) -> Vec<ChannelName> {
        self.state.lock().topology.routes(peer)
    }

    /// Whether this server currently holds a local record for a channel.
    pub fn holds_channel(&self, channel: &ChannelName) -> bool {
        self.state.lock().sessions.has_channel(channel)
    }
}
