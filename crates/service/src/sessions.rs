//! The membership store: who is logged in, and who sits in which channel.
//!
//! Users are keyed by their transport address; a login from an address
//! that already has a user replaces it. Channel records are reference
//! counted by membership: the record dies the moment a member removal
//! empties it (the router then tells the peers), while records created
//! empty by the S2S path stick around as transit state until the routing
//! core prunes them.

use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use codec::text::{ChannelName, Username};

struct User {
    username: Username,
    deadline: Instant,
}

#[derive(Default)]
struct Channel {
    members: HashSet<SocketAddr>,
}

pub struct Sessions {
    users: HashMap<SocketAddr, User>,
    channels: HashMap<ChannelName, Channel>,
    keepalive: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    NotLoggedIn,
    AlreadyIn,
    Joined {
        /// The channel had no members before this join; the caller
        /// announces the subscription to the peers.
        first_member: bool,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    NotLoggedIn,
    NoSuchChannel,
    NotMember,
    Left {
        /// The channel emptied and its record is gone; the caller
        /// announces the leave to the peers.
        channel_removed: bool,
    },
}

/// A user removed by the keepalive reaper.
pub struct Reaped {
    pub address: SocketAddr,
    pub username: Username,
    pub removed_channels: Vec<ChannelName>,
}

impl Sessions {
    pub fn new(keepalive: Duration) -> Self {
        Self {
            users: HashMap::new(),
            channels: HashMap::new(),
            keepalive,
        }
    }

    /// Create a user at an address. An existing user at the same address
    /// is logged out first; its name and emptied channels are returned so
    /// the caller can report them.
    pub fn login(
        &mut self,
        address: SocketAddr,
        username: Username,
    ) -> Option<(Username, Vec<ChannelName>)> {
        let previous = self.logout(address);

        self.users.insert(
            address,
            User {
                username,
                deadline: Instant::now() + self.keepalive,
            },
        );

        previous
    }

    /// Remove a user and its memberships. Returns the username and the
    /// channels that became empty (and were removed) on the way out.
    pub fn logout(&mut self, address: SocketAddr) -> Option<(Username, Vec<ChannelName>)> {
        let user = self.users.remove(&address)?;

        let mut removed = Vec::new();
        self.channels.retain(|name, channel| {
            if channel.members.remove(&address) && channel.members.is_empty() {
                removed.push(*name);
                false
            } else {
                true
            }
        });

        Some((user.username, removed))
    }

    pub fn username(&self, address: SocketAddr) -> Option<Username> {
        self.users.get(&address).map(|user| user.username)
    }

    /// Any datagram from a known user counts as a sign of life.
    pub fn heartbeat(&mut self, address: SocketAddr) {
        if let Some(user) = self.users.get_mut(&address) {
            user.deadline = Instant::now() + self.keepalive;
        }
    }

    pub fn join(&mut self, address: SocketAddr, channel: ChannelName) -> JoinOutcome {
        if !self.users.contains_key(&address) {
            return JoinOutcome::NotLoggedIn;
        }

        let entry = self.channels.entry(channel).or_default();
        if entry.members.contains(&address) {
            return JoinOutcome::AlreadyIn;
        }

        let first_member = entry.members.is_empty();
        entry.members.insert(address);

        JoinOutcome::Joined { first_member }
    }

    pub fn leave(&mut self, address: SocketAddr, channel: &ChannelName) -> LeaveOutcome {
        if !self.users.contains_key(&address) {
            return LeaveOutcome::NotLoggedIn;
        }

        let Some(entry) = self.channels.get_mut(channel) else {
            return LeaveOutcome::NoSuchChannel;
        };

        if !entry.members.remove(&address) {
            return LeaveOutcome::NotMember;
        }

        let channel_removed = entry.members.is_empty();
        if channel_removed {
            self.channels.remove(channel);
        }

        LeaveOutcome::Left { channel_removed }
    }

    /// Remove every user whose keepalive deadline has passed.
    pub fn reap(&mut self, now: Instant) -> Vec<Reaped> {
        let expired: Vec<SocketAddr> = self
            .users
            .iter()
            .filter(|(_, user)| user.deadline <= now)
            .map(|(address, _)| *address)
            .collect();

        expired
            .into_iter()
            .filter_map(|address| {
                self.logout(address)
                    .map(|(username, removed_channels)| Reaped {
                        address,
                        username,
                        removed_channels,
                    })
            })
            .collect()
    }

    /// Create an empty channel record if absent. Returns whether one was
    /// created. This is the inbound S2S join path; such records carry no
    /// members until a local user joins.
    pub fn ensure_channel(&mut self, channel: ChannelName) -> bool {
        match self.channels.entry(channel) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Channel::default());
                true
            }
        }
    }

    /// Drop a channel record outright (the leaf prune).
    pub fn remove_channel(&mut self, channel: &ChannelName) {
        self.channels.remove(channel);
    }

    pub fn has_channel(&self, channel: &ChannelName) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn member_count(&self, channel: &ChannelName) -> usize {
        self.channels
            .get(channel)
            .map(|entry| entry.members.len())
            .unwrap_or(0)
    }

    pub fn members(&self, channel: &ChannelName) -> Vec<SocketAddr> {
        self.channels
            .get(channel)
            .map(|entry| entry.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn member_names(&self, channel: &ChannelName) -> Vec<Username> {
        self.channels
            .get(channel)
            .map(|entry| {
                entry
                    .members
                    .iter()
                    .filter_map(|address| self.username(*address))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn channel_names(&self) -> Vec<ChannelName> {
        self.channels.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn store() -> Sessions {
        Sessions::new(Duration::from_secs(120))
    }

    #[test]
    fn join_requires_login() {
        let mut sessions = store();
        assert_eq!(
            sessions.join(address(1), ChannelName::new("x")),
            JoinOutcome::NotLoggedIn
        );
    }

    #[test]
    fn first_member_is_reported_once() {
        let mut sessions = store();
        sessions.login(address(1), Username::new("a"));
        sessions.login(address(2), Username::new("b"));

        let channel = ChannelName::new("x");
        assert_eq!(
            sessions.join(address(1), channel),
            JoinOutcome::Joined { first_member: true }
        );
        assert_eq!(
            sessions.join(address(2), channel),
            JoinOutcome::Joined {
                first_member: false
            }
        );
        assert_eq!(sessions.join(address(2), channel), JoinOutcome::AlreadyIn);
    }

    #[test]
    fn rejoining_an_empty_transit_channel_counts_as_first() {
        let mut sessions = store();
        sessions.login(address(1), Username::new("a"));

        let channel = ChannelName::new("x");
        assert!(sessions.ensure_channel(channel));
        assert_eq!(
            sessions.join(address(1), channel),
            JoinOutcome::Joined { first_member: true }
        );
    }

    #[test]
    fn leaving_the_last_member_removes_the_record() {
        let mut sessions = store();
        sessions.login(address(1), Username::new("a"));

        let channel = ChannelName::new("x");
        sessions.join(address(1), channel);
        assert_eq!(
            sessions.leave(address(1), &channel),
            LeaveOutcome::Left {
                channel_removed: true
            }
        );
        assert!(!sessions.has_channel(&channel));
        assert_eq!(
            sessions.leave(address(1), &channel),
            LeaveOutcome::NoSuchChannel
        );
    }

    #[test]
    fn logout_reports_emptied_channels() {
        let mut sessions = store();
        sessions.login(address(1), Username::new("a"));
        sessions.login(address(2), Username::new("b"));

        let shared = ChannelName::new("shared");
        let own = ChannelName::new("own");
        sessions.join(address(1), shared);
        sessions.join(address(2), shared);
        sessions.join(address(1), own);

        let (username, removed) = sessions.logout(address(1)).unwrap();
        assert_eq!(username.as_str(), "a");
        assert_eq!(removed, vec![own]);
        assert!(sessions.has_channel(&shared));
    }

    #[test]
    fn login_replaces_the_previous_user() {
        let mut sessions = store();
        sessions.login(address(1), Username::new("a"));
        sessions.join(address(1), ChannelName::new("x"));

        let (previous, removed) = sessions.login(address(1), Username::new("b")).unwrap();
        assert_eq!(previous.as_str(), "a");
        assert_eq!(removed.len(), 1);
        assert_eq!(sessions.username(address(1)).unwrap().as_str(), "b");
    }

    #[test]
    fn reaping_expires_silent_users() {
        let mut sessions = Sessions::new(Duration::ZERO);
        sessions.login(address(1), Username::new("a"));
        sessions.join(address(1), ChannelName::new("x"));

        let reaped = sessions.reap(Instant::now());
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].username.as_str(), "a");
        assert_eq!(reaped[0].removed_channels.len(), 1);
        assert!(sessions.username(address(1)).is_none());
    }
}
