//! The playlist aggregate: an ordered song collection plus metadata.
//!
//! A [`Playlist`] owns its songs, a custom-data map, cover state and two
//! events. It does not know about files or the manager; the manager
//! subscribes to [`Playlist::on_playlist_changed`] to track unsaved changes.
//!
//! Mutations do **not** raise `PlaylistChanged` on their own (except
//! [`Playlist::remove_duplicates`]). Callers doing a batch of edits call
//! [`Playlist::raise_playlist_changed`] once when they are done.
//!
//! Cover generation uses the first four songs, so mutations touching those
//! positions drop any cached default cover (see [`Playlist::set_default_cover`]).

mod cover;
pub mod events;
pub mod factory;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::custom_data::{self, CustomData, CustomValue};
use crate::error::{Error, Result};
use crate::song::{PlaylistSong, Song};

pub use cover::COVER_PREVIEW_SONGS;
use cover::CoverState;
pub use events::{PlaylistEvents, SubscriptionId};
pub use factory::{PlaylistFormat, SongFactory};

/// Custom-data key controlling duplicate suppression in [`Playlist::add`].
pub const ALLOW_DUPLICATES_KEY: &str = "AllowDuplicates";

/// Custom-data key marking a playlist as read-only for editors.
pub const READ_ONLY_KEY: &str = "ReadOnly";

/// A playlist shared between the manager and its callers.
pub type SharedPlaylist = Arc<RwLock<Playlist>>;

/// An ordered, optionally deduplicated collection of playlist songs.
#[derive(Debug)]
pub struct Playlist {
    format: PlaylistFormat,
    id: Uuid,
    title: String,
    author: Option<String>,
    description: Option<String>,
    filename: String,
    suggested_extension: Option<String>,
    source_dir: Option<PathBuf>,
    songs: Vec<PlaylistSong>,
    custom_data: CustomData,
    cover: CoverState,
    events: PlaylistEvents,
}

impl Playlist {
    /// Create an empty playlist of the given format.
    pub fn new(format: PlaylistFormat, title: impl Into<String>) -> Self {
        Self {
            format,
            id: Uuid::new_v4(),
            title: title.into(),
            author: None,
            description: None,
            filename: String::new(),
            suggested_extension: None,
            source_dir: None,
            songs: Vec::new(),
            custom_data: CustomData::new(),
            cover: CoverState::default(),
            events: PlaylistEvents::default(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Wrap in the shared handle the manager works with.
    pub fn into_shared(self) -> SharedPlaylist {
        Arc::new(RwLock::new(self))
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn format(&self) -> PlaylistFormat {
        self.format
    }

    /// Stable id generated when the playlist object was created.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn set_author(&mut self, author: Option<&str>) {
        self.author = author.map(str::to_string);
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<&str>) {
        self.description = description.map(str::to_string);
    }

    /// File name without directory or extension.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
    }

    /// Extension (no leading dot) the playlist would like to be stored with.
    pub fn suggested_extension(&self) -> Option<&str> {
        self.suggested_extension.as_deref()
    }

    pub fn set_suggested_extension(&mut self, extension: Option<&str>) {
        self.suggested_extension = extension
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(str::to_string);
    }

    /// Directory the playlist was loaded from, if it came from disk.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn set_source_dir(&mut self, dir: Option<PathBuf>) {
        self.source_dir = dir;
    }

    // ========================================================================
    // Songs
    // ========================================================================

    pub fn songs(&self) -> &[PlaylistSong] {
        &self.songs
    }

    /// Mutable access to the entries; the collection length cannot change.
    pub fn songs_mut(&mut self) -> &mut [PlaylistSong] {
        &mut self.songs
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistSong> {
        self.songs.get(index)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Add any song, converted by this format's song factory.
    ///
    /// Returns `Ok(None)` when duplicates are not allowed and an entry with
    /// the same hash or key already exists.
    pub fn add(&mut self, song: &dyn Song) -> Result<Option<&PlaylistSong>> {
        let entry = self.format.song_factory().create_from_song(song)?;
        Ok(self.add_entry(entry))
    }

    /// Build a song from a hash and add it.
    pub fn add_by_identifier(
        &mut self,
        hash: &str,
        name: Option<&str>,
        key: Option<&str>,
        mapper: Option<&str>,
    ) -> Result<Option<&PlaylistSong>> {
        let entry = self
            .format
            .song_factory()
            .create_from_hash(hash, name, key, mapper)?;
        Ok(self.add_entry(entry))
    }

    /// Build a song from a level id and add it.
    pub fn add_by_level_id(
        &mut self,
        level_id: &str,
        name: Option<&str>,
        key: Option<&str>,
        mapper: Option<&str>,
    ) -> Result<Option<&PlaylistSong>> {
        let entry = self
            .format
            .song_factory()
            .create_from_level_id(level_id, name, key, mapper)?;
        Ok(self.add_entry(entry))
    }

    /// Add an already-built entry as-is, subject to duplicate suppression.
    pub fn add_entry(&mut self, entry: PlaylistSong) -> Option<&PlaylistSong> {
        if !self.allow_duplicates() && self.songs.iter().any(|s| s.matches(&entry)) {
            tracing::debug!(
                playlist = %self.title,
                hash = ?Song::hash(&entry),
                "Duplicate song not added"
            );
            return None;
        }

        self.songs.push(entry);
        let index = self.songs.len() - 1;
        self.touched(index);
        self.songs.last()
    }

    /// Insert a song at `index` (no duplicate check).
    pub fn insert(&mut self, index: usize, song: &dyn Song) -> Result<&PlaylistSong> {
        if index > self.songs.len() {
            return Err(Error::argument(format!(
                "insert index {index} out of range for {} songs",
                self.songs.len()
            )));
        }
        let entry = self.format.song_factory().create_from_song(song)?;
        self.songs.insert(index, entry);
        self.touched(index);
        Ok(&self.songs[index])
    }

    /// Remove and return the song at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<PlaylistSong> {
        if index >= self.songs.len() {
            return Err(Error::argument(format!(
                "remove index {index} out of range for {} songs",
                self.songs.len()
            )));
        }
        let removed = self.songs.remove(index);
        self.touched(index);
        Ok(removed)
    }

    /// Remove this exact entry (matched by entry id).
    pub fn remove(&mut self, song: &PlaylistSong) -> bool {
        let id = song.playlist_song_id();
        match self.songs.iter().position(|s| s.playlist_song_id() == id) {
            Some(index) => {
                self.songs.remove(index);
                self.touched(index);
                true
            }
            None => false,
        }
    }

    /// Remove every entry for the level with `hash`.
    pub fn try_remove_by_hash(&mut self, hash: &str) -> bool {
        self.remove_where_touched(|s| s.has_hash(hash))
    }

    /// Remove every entry with catalog key `key`.
    pub fn try_remove_by_key(&mut self, key: &str) -> bool {
        self.remove_where_touched(|s| s.has_key(key))
    }

    /// Remove every entry matching `predicate`; returns how many went.
    ///
    /// Always drops the cached default cover.
    pub fn remove_all<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&PlaylistSong) -> bool,
    {
        let before = self.songs.len();
        self.songs.retain(|s| !predicate(s));
        self.invalidate_default_cover();
        before - self.songs.len()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.songs.clear();
        self.invalidate_default_cover();
    }

    /// Stable sort by date added, newest first. Undated songs go last.
    pub fn sort(&mut self) {
        self.songs
            .sort_by(|a, b| b.date_added().cmp(&a.date_added()));
        self.invalidate_default_cover();
    }

    /// Drop later entries that point at the same level as an earlier one.
    ///
    /// Two entries are the same level when their level ids match, or, if
    /// either has no level id, when their keys match. Raises
    /// `PlaylistChanged` only if something was removed.
    pub fn remove_duplicates(&mut self) -> usize {
        let songs = std::mem::take(&mut self.songs);
        let before = songs.len();
        let mut kept: Vec<PlaylistSong> = Vec::with_capacity(before);
        for song in songs {
            if !kept.iter().any(|k| k.same_level(&song)) {
                kept.push(song);
            }
        }
        self.songs = kept;

        let removed = before - self.songs.len();
        if removed > 0 {
            tracing::debug!(playlist = %self.title, removed, "Removed duplicate songs");
            self.raise_playlist_changed();
            self.invalidate_default_cover();
        }
        removed
    }

    /// Replace every entry without duplicate checks (used by deserializers).
    pub(crate) fn replace_songs(&mut self, songs: Vec<PlaylistSong>) {
        self.songs = songs;
        self.invalidate_default_cover();
    }

    fn remove_where_touched<F>(&mut self, mut predicate: F) -> bool
    where
        F: FnMut(&PlaylistSong) -> bool,
    {
        let first = self.songs.iter().position(&mut predicate);
        let Some(first) = first else {
            return false;
        };
        self.songs.retain(|s| !predicate(s));
        self.touched(first);
        true
    }

    /// Mutation at `index`: refresh the default cover if it could change.
    fn touched(&mut self, index: usize) {
        if index < COVER_PREVIEW_SONGS {
            self.invalidate_default_cover();
        }
    }

    // ========================================================================
    // Custom data
    // ========================================================================

    pub fn custom_data(&self) -> &CustomData {
        &self.custom_data
    }

    pub fn try_get_custom_data(&self, key: &str) -> Option<&CustomValue> {
        self.custom_data.get(key)
    }

    /// Set a custom-data value.
    ///
    /// `AllowDuplicates` and `ReadOnly` only accept booleans.
    pub fn set_custom_data(&mut self, key: impl Into<String>, value: impl Into<CustomValue>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        if (key == ALLOW_DUPLICATES_KEY || key == READ_ONLY_KEY) && value.as_bool().is_none() {
            return Err(Error::validation(format!(
                "{key} must be a bool, got {}",
                value.kind()
            )));
        }
        self.custom_data.insert(key, value);
        Ok(())
    }

    pub fn remove_custom_data(&mut self, key: &str) -> Option<CustomValue> {
        self.custom_data.remove(key)
    }

    /// Merge values read from a file; keys already present win.
    pub(crate) fn merge_custom_data(&mut self, incoming: CustomData) {
        custom_data::merge_missing(&mut self.custom_data, incoming);
    }

    /// Whether [`Playlist::add`] keeps duplicate songs. Defaults to `true`.
    pub fn allow_duplicates(&self) -> bool {
        self.custom_data
            .get(ALLOW_DUPLICATES_KEY)
            .and_then(CustomValue::as_bool)
            .unwrap_or(true)
    }

    pub fn set_allow_duplicates(&mut self, allow: bool) {
        self.custom_data
            .insert(ALLOW_DUPLICATES_KEY.to_string(), allow.into());
    }

    pub fn read_only(&self) -> bool {
        self.custom_data
            .get(READ_ONLY_KEY)
            .and_then(CustomValue::as_bool)
            .unwrap_or(false)
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.custom_data
            .insert(READ_ONLY_KEY.to_string(), read_only.into());
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribe to `PlaylistChanged`.
    pub fn on_playlist_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Playlist) + Send + Sync + 'static,
    {
        self.events.playlist_changed.subscribe(callback)
    }

    pub fn unsubscribe_playlist_changed(&mut self, id: SubscriptionId) -> bool {
        self.events.playlist_changed.unsubscribe(id)
    }

    /// Subscribe to `CoverImageChanged`.
    pub fn on_cover_image_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Playlist) + Send + Sync + 'static,
    {
        self.events.cover_image_changed.subscribe(callback)
    }

    pub fn unsubscribe_cover_image_changed(&mut self, id: SubscriptionId) -> bool {
        self.events.cover_image_changed.unsubscribe(id)
    }

    /// Notify subscribers that the playlist changed.
    ///
    /// Call once after a batch of edits; individual mutations do not.
    pub fn raise_playlist_changed(&self) {
        self.events.playlist_changed.emit(self);
    }

    fn raise_cover_image_changed(&self) {
        self.events.cover_image_changed.emit(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::SongIdentity;
    use crate::test_utils::{dated_song, sample_identity};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(playlist: &mut Playlist) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        playlist.on_playlist_changed(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[test]
    fn test_duplicates_suppressed_when_not_allowed() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "No dupes");
        playlist.set_allow_duplicates(false);

        let song = sample_identity(1);
        assert!(playlist.add(&song).unwrap().is_some());
        assert!(playlist.add(&song).unwrap().is_none());
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn test_duplicates_kept_then_removed() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Dupes");
        let hits = counter(&mut playlist);
        assert!(playlist.allow_duplicates());

        let song = sample_identity(1);
        playlist.add(&song).unwrap();
        playlist.add(&song).unwrap();
        assert_eq!(playlist.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(playlist.remove_duplicates(), 1);
        assert_eq!(playlist.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // nothing left to remove: no event
        assert_eq!(playlist.remove_duplicates(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_by_key_only() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Keys");
        playlist.set_allow_duplicates(false);
        playlist.add(&SongIdentity::from_key("1a2b")).unwrap();
        assert!(playlist.add(&SongIdentity::from_key("1A2B")).unwrap().is_none());
        assert!(playlist.add(&SongIdentity::from_key("ffff")).unwrap().is_some());
    }

    #[test]
    fn test_add_by_identifier() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Ids");
        let added = playlist
            .add_by_identifier("abcd", Some("Name"), Some("1"), Some("Mapper"))
            .unwrap()
            .unwrap();
        assert_eq!(added.hash(), Some("ABCD"));
        assert_eq!(added.level_author_name(), Some("Mapper"));
        assert!(matches!(
            playlist.add_by_identifier("", None, None, None),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_insert_and_remove_at_bounds() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Bounds");
        playlist.add(&sample_identity(1)).unwrap();
        playlist.insert(0, &sample_identity(2)).unwrap();
        assert_eq!(playlist.get(0).unwrap().hash(), sample_identity(2).hash());

        assert!(matches!(
            playlist.insert(5, &sample_identity(3)),
            Err(Error::Argument(_))
        ));
        assert!(matches!(playlist.remove_at(2), Err(Error::Argument(_))));

        let removed = playlist.remove_at(0).unwrap();
        assert_eq!(removed.hash(), sample_identity(2).hash());
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn test_remove_by_entry_id() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Entries");
        let song = sample_identity(1);
        playlist.add(&song).unwrap();
        playlist.add(&song).unwrap();
        let second = playlist.get(1).unwrap().clone();

        assert!(playlist.remove(&second));
        assert!(!playlist.remove(&second));
        assert_eq!(playlist.len(), 1);
        assert_ne!(playlist.get(0).unwrap().playlist_song_id(), second.playlist_song_id());
    }

    #[test]
    fn test_sort_newest_first_and_stable() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Sorted");
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();

        playlist.add_entry(dated_song(1, Some(old)));
        playlist.add_entry(dated_song(2, None));
        playlist.add_entry(dated_song(3, Some(new)));
        playlist.add_entry(dated_song(4, Some(old)));

        playlist.sort();
        let order: Vec<_> = playlist
            .songs()
            .iter()
            .map(|s| s.name().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["Song 3", "Song 1", "Song 4", "Song 2"]);
    }

    #[test]
    fn test_remove_all_returns_count() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Filter");
        for n in 0..5 {
            playlist.add(&sample_identity(n)).unwrap();
        }
        let removed = playlist.remove_all(|s| s.key().is_some_and(|k| k.ends_with('2') || k.ends_with('3')));
        assert_eq!(removed, 2);
        assert_eq!(playlist.len(), 3);
    }

    #[test]
    fn test_try_remove_by_hash_removes_every_entry() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Hashes");
        let song = sample_identity(7);
        playlist.add(&song).unwrap();
        playlist.add(&sample_identity(8)).unwrap();
        playlist.add(&song).unwrap();

        let hash = song.hash().unwrap().to_lowercase();
        assert!(playlist.try_remove_by_hash(&hash));
        assert_eq!(playlist.len(), 1);
        assert!(!playlist.try_remove_by_hash(&hash));
    }

    #[test]
    fn test_custom_data_type_checks() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Custom");
        assert!(matches!(
            playlist.set_custom_data(ALLOW_DUPLICATES_KEY, "yes"),
            Err(Error::Validation(_))
        ));
        playlist.set_custom_data(ALLOW_DUPLICATES_KEY, false).unwrap();
        assert!(!playlist.allow_duplicates());

        playlist.set_custom_data("syncURL", "https://example.com").unwrap();
        assert_eq!(
            playlist.try_get_custom_data("syncURL").and_then(CustomValue::as_str),
            Some("https://example.com")
        );
        assert!(playlist.try_get_custom_data("missing").is_none());
    }

    #[test]
    fn test_read_only_flag() {
        let mut playlist = Playlist::new(PlaylistFormat::Blist, "RO");
        assert!(!playlist.read_only());
        playlist.set_read_only(true);
        assert!(playlist.read_only());
        assert_eq!(
            playlist.try_get_custom_data(READ_ONLY_KEY),
            Some(&CustomValue::Bool(true))
        );
    }

    #[test]
    fn test_raise_playlist_changed_is_explicit() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Explicit");
        let hits = counter(&mut playlist);

        playlist.add(&sample_identity(1)).unwrap();
        playlist.set_title("Renamed");
        playlist.sort();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        playlist.raise_playlist_changed();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suggested_extension_strips_dot() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Ext");
        playlist.set_suggested_extension(Some(".bplist"));
        assert_eq!(playlist.suggested_extension(), Some("bplist"));
        playlist.set_suggested_extension(Some(""));
        assert_eq!(playlist.suggested_extension(), None);
    }
}
