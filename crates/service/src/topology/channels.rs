//! The freshness-aware channel set kept per peer.
//!
//! Each entry is a channel the peer is a downstream subscriber of, with a
//! small freshness counter as soft state: entries are created and renewed
//! at [`FRESHNESS_INIT`], aged once per refresh tick, and eligible for
//! pruning at zero. `add` deliberately does not renew — renewal is a
//! separate, explicit operation so that a stale entry reappearing in an
//! inbound join can be refreshed without a fresh insert.

use ahash::{HashMap, HashMapExt};
use codec::text::ChannelName;

/// Freshness of a newly created or renewed entry. Combined with the
/// refresh interval this puts the soft-state lifetime at about two
/// intervals.
pub const FRESHNESS_INIT: u8 = 2;

#[derive(Default)]
pub struct ChannelSet {
    entries: HashMap<ChannelName, u8>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a channel if absent. Returns whether it was newly inserted;
    /// an existing entry is left untouched, freshness included.
    pub fn add(&mut self, channel: ChannelName) -> bool {
        if self.entries.contains_key(&channel) {
            return false;
        }

        self.entries.insert(channel, FRESHNESS_INIT);
        true
    }

    pub fn remove(&mut self, channel: &ChannelName) -> bool {
        self.entries.remove(channel).is_some()
    }

    /// Present, valid or not. Callers that care about freshness use
    /// [`ChannelSet::is_valid`].
    pub fn has(&self, channel: &ChannelName) -> bool {
        self.entries.contains_key(channel)
    }

    /// Reset a valid entry's freshness. Expired or absent entries are
    /// left alone.
    pub fn renew(&mut self, channel: &ChannelName) {
        if let Some(freshness) = self.entries.get_mut(channel) {
            if *freshness > 0 {
                *freshness = FRESHNESS_INIT;
            }
        }
    }

    /// Age every valid entry by one tick.
    pub fn age(&mut self) {
        for freshness in self.entries.values_mut() {
            if *freshness > 0 {
                *freshness -= 1;
            }
        }
    }

    /// One expired entry, if any. Callers loop until `None` so a single
    /// pass handles multiple expirations.
    pub fn find_expired(&self) -> Option<ChannelName> {
        self.entries
            .iter()
            .find(|(_, freshness)| **freshness == 0)
            .map(|(channel, _)| *channel)
    }

    pub fn is_valid(&self, channel: &ChannelName) -> bool {
        self.entries
            .get(channel)
            .is_some_and(|freshness| *freshness > 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
