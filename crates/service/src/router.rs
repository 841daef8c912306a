//! The per-datagram entry point.
//!
//! One router reads every inbound datagram: decode by the leading tag,
//! count the sender as alive, then hand client requests to the
//! membership store and S2S frames to the routing core. Malformed or
//! unknown frames are dropped and never echoed. Semantic client errors
//! come back as `TXT_ERROR` and never reach the peers.

use std::net::SocketAddr;

use bytes::BytesMut;

use codec::{
    Packet,
    client::{TextError, TextList, TextSay, TextWho},
    text::{ChannelName, SayText, Username},
};

use crate::{
    Observer, Service, State, Transport,
    sessions::{JoinOutcome, LeaveOutcome},
};

/// Every fresh login lands in this channel.
const INITIAL_CHANNEL: &str = "Common";

pub struct Router<'a, T, O> {
    service: &'a Service<T, O>,
    bytes: BytesMut,
}

impl<'a, T, O> Router<'a, T, O>
where
    T: Transport,
    O: Observer,
{
    pub(crate) fn new(service: &'a Service<T, O>) -> Self {
        Self {
            bytes: BytesMut::with_capacity(1024),
            service,
        }
    }

    /// Handle one inbound datagram from `source`.
    pub fn route(&mut self, bytes: &[u8], source: SocketAddr) {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("dropping malformed datagram from {}: {}", source, e);
                return;
            }
        };

        let mut guard = self.service.state.lock();
        let state = &mut *guard;

        state.sessions.heartbeat(source);

        match packet {
            Packet::Login(login) => self.login(state, source, login.username),
            Packet::Logout => self.logout(state, source),
            Packet::Join(join) => self.join(state, source, join.channel),
            Packet::Leave(leave) => self.leave(state, source, leave.channel),
            Packet::Say(say) => self.say(state, source, say.channel, say.text),
            Packet::List => self.list(state, source),
            Packet::Who(who) => self.who(state, source, who.channel),
            // Receiving anything already refreshed the keepalive.
            Packet::KeepAlive => {}
            Packet::S2sJoin(join) => {
                state.topology.join_recv(
                    &self.service.transport,
                    &mut state.sessions,
                    source,
                    join.origin,
                    join.channel,
                );
            }
            Packet::S2sLeave(leave) => {
                state.topology.leave_recv(source, leave.origin, leave.channel);
            }
            Packet::S2sSay(say) => {
                let delivered = state.topology.say_recv(
                    &self.service.transport,
                    &mut state.sessions,
                    source,
                    say.origin,
                    say.id,
                    say.username,
                    say.channel,
                    say.text,
                );

                if delivered {
                    self.deliver(state, say.channel, say.username, say.text);
                }
            }
        }
    }

    fn login(&mut self, state: &mut State, source: SocketAddr, username: Username) {
        let local = self.service.local;

        // A login over a live session replaces it.
        if let Some((previous, removed)) = state.sessions.login(source, username) {
            log::info!("{} {} recv Request Logout {}", local, source, previous);
            self.service.observer.on_logout(source, &previous);

            for channel in removed {
                state
                    .topology
                    .leave_send(&self.service.transport, channel, None);
            }
        }

        log::info!("{} {} recv Request Login {}", local, source, username);
        self.service.observer.on_login(source, &username);

        // Every login is forced into the initial channel.
        let channel = ChannelName::new(INITIAL_CHANNEL);
        if let JoinOutcome::Joined { first_member } = state.sessions.join(source, channel) {
            log::info!(
                "{} {} recv Request Join {} {}",
                local,
                source,
                username,
                channel
            );
            self.service.observer.on_join(&username, &channel);

            if first_member {
                state
                    .topology
                    .join_send(&self.service.transport, channel, None);
            }
        }
    }

    fn logout(&mut self, state: &mut State, source: SocketAddr) {
        let Some((username, removed)) = state.sessions.logout(source) else {
            return;
        };

        log::info!(
            "{} {} recv Request Logout {}",
            self.service.local,
            source,
            username
        );
        self.service.observer.on_logout(source, &username);

        for channel in removed {
            state
                .topology
                .leave_send(&self.service.transport, channel, None);
        }
    }

    fn join(&mut self, state: &mut State, source: SocketAddr, channel: ChannelName) {
        let Some(username) = state.sessions.username(source) else {
            self.error(source, "You are not logged in. Please restart the client.");
            return;
        };

        match state.sessions.join(source, channel) {
            JoinOutcome::NotLoggedIn => {
                self.error(source, "You are not logged in. Please restart the client.");
            }
            JoinOutcome::AlreadyIn => {
                self.error(source, "You are already in this channel.");
            }
            JoinOutcome::Joined { first_member } => {
                log::info!(
                    "{} {} recv Request Join {} {}",
                    self.service.local,
                    source,
                    username,
                    channel
                );
                self.service.observer.on_join(&username, &channel);
                self.error(source, &format!("Joined channel [{}].", channel));

                if first_member {
                    state
                        .topology
                        .join_send(&self.service.transport, channel, None);
                }
            }
        }
    }

    fn leave(&mut self, state: &mut State, source: SocketAddr, channel: ChannelName) {
        let Some(username) = state.sessions.username(source) else {
            self.error(source, "You are not logged in. Please restart the client.");
            return;
        };

        match state.sessions.leave(source, &channel) {
            LeaveOutcome::NotLoggedIn => {
                self.error(source, "You are not logged in. Please restart the client.");
            }
            LeaveOutcome::NoSuchChannel => {
                self.error(source, "You cannot leave a channel that doesn't exist.");
            }
            LeaveOutcome::NotMember => {
                self.error(source, "You cannot leave a channel you are not in.");
            }
            LeaveOutcome::Left { channel_removed } => {
                log::info!(
                    "{} {} recv Request Leave {}",
                    self.service.local,
                    source,
                    channel
                );
                self.service.observer.on_leave(&username, &channel);
                self.error(source, &format!("Left channel [{}].", channel));

                // The last local member is gone; tell every peer this
                // branch no longer wants the channel's traffic.
                if channel_removed {
                    state
                        .topology
                        .leave_send(&self.service.transport, channel, None);
                }
            }
        }
    }

    fn say(&mut self, state: &mut State, source: SocketAddr, channel: ChannelName, text: SayText) {
        let Some(username) = state.sessions.username(source) else {
            self.error(source, "You are not logged in. Please restart the client.");
            return;
        };

        log::info!(
            "{} {} recv Request Say {} \"{}\"",
            self.service.local,
            source,
            channel,
            text
        );

        if !state.sessions.has_channel(&channel) {
            self.error(source, "Channel does not exist.");
            return;
        }

        self.deliver(state, channel, username, text);

        state
            .topology
            .say_send(&self.service.transport, username, channel, text, None, None);
    }

    fn list(&mut self, state: &mut State, source: SocketAddr) {
        let Some(username) = state.sessions.username(source) else {
            self.error(source, "You are not logged in. Please restart the client.");
            return;
        };

        log::info!(
            "{} {} recv Request List {}",
            self.service.local,
            source,
            username
        );

        TextList {
            channels: state.sessions.channel_names(),
        }
        .encode(&mut self.bytes);
        self.transmit(source);
    }

    fn who(&mut self, state: &mut State, source: SocketAddr, channel: ChannelName) {
        let Some(username) = state.sessions.username(source) else {
            self.error(source, "You are not logged in. Please restart the client.");
            return;
        };

        log::info!(
            "{} {} recv Request Who {} {}",
            self.service.local,
            source,
            username,
            channel
        );

        if !state.sessions.has_channel(&channel) {
            self.error(source, &format!("Channel [{}] does not exist.", channel));
            return;
        }

        TextWho {
            channel,
            users: state.sessions.member_names(&channel),
        }
        .encode(&mut self.bytes);
        self.transmit(source);
    }

    /// Send a say to every local member of a channel, sender included.
    fn deliver(&mut self, state: &State, channel: ChannelName, username: Username, text: SayText) {
        TextSay {
            channel,
            username,
            text,
        }
        .encode(&mut self.bytes);

        for member in state.sessions.members(&channel) {
            self.transmit(member);
        }
    }

    fn error(&mut self, target: SocketAddr, message: &str) {
        TextError {
            text: SayText::new(message),
        }
        .encode(&mut self.bytes);
        self.transmit(target);
    }

    /// Send whatever sits in the scratch buffer to one client.
    fn transmit(&mut self, target: SocketAddr) {
        if let Err(e) = self.service.transport.send(&self.bytes[..], target) {
            log::warn!("response to client {} failed to send: {}", target, e);
        }
    }
}
