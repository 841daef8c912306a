use std::net::SocketAddr;

use codec::text::{ChannelName, Username};

/// Logs membership events. The wire-level S2S contract lines come from
/// the routing core; this covers the human-facing rest.
#[derive(Clone, Copy, Default)]
pub struct Observer;

impl service::Observer for Observer {
    fn on_login(&self, address: SocketAddr, username: &Username) {
        log::debug!("{} logged in from {}", username, address);
    }

    fn on_logout(&self, address: SocketAddr, username: &Username) {
        log::debug!("{} at {} logged out", username, address);
    }

    fn on_join(&self, username: &Username, channel: &ChannelName) {
        log::debug!("{} joined {}", username, channel);
    }

    fn on_leave(&self, username: &Username, channel: &ChannelName) {
        log::debug!("{} left {}", username, channel);
    }

    fn on_user_expired(&self, address: SocketAddr, username: &Username) {
        log::info!(
            "removing {} at {} (failed to respond to heartbeat)",
            username,
            address
        );
    }
}
