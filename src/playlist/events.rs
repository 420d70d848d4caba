//! Change notification for playlists.
//!
//! Each event keeps an ordered list of callbacks. Callbacks run
//! synchronously, in subscription order, on the thread that raised the event,
//! and only get shared access to the playlist, so they cannot mutate it
//! from inside a notification.

use std::fmt;

use super::Playlist;

/// Token returned by a subscription, used to unsubscribe.
pub type SubscriptionId = u64;

type Callback = Box<dyn Fn(&Playlist) + Send + Sync>;

/// Ordered subscriber list for one event.
#[derive(Default)]
pub struct Subscribers {
    next_id: SubscriptionId,
    entries: Vec<(SubscriptionId, Callback)>,
}

impl Subscribers {
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Playlist) + Send + Sync + 'static,
    {
        self.next_id += 1;
        self.entries.push((self.next_id, Box::new(callback)));
        self.next_id
    }

    /// Remove a subscription. Returns `false` for unknown tokens.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn emit(&self, playlist: &Playlist) {
        for (_, callback) in &self.entries {
            callback(playlist);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// The two events a playlist raises.
#[derive(Debug, Default)]
pub struct PlaylistEvents {
    /// Raised by `raise_playlist_changed` and by `remove_duplicates`
    pub playlist_changed: Subscribers,
    /// Raised whenever the effective cover bytes change
    pub cover_image_changed: Subscribers,
}
