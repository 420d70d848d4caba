//! Playlist format handlers.
//!
//! A handler turns a [`Playlist`] into bytes and back for one wire format.
//! The manager picks handlers by file extension or by [`PlaylistFormat`].
//!
//! Handlers only ever fail with [`Error::Serialization`]; malformed JSON,
//! broken archives, bad base64 and I/O failures are all wrapped.
//!
//! # Example
//!
//! ```ignore
//! use playlist_keeper::handler::{LegacyHandler, PlaylistHandler};
//!
//! let handler = LegacyHandler;
//! let mut out: Vec<u8> = Vec::new();
//! handler.serialize(&playlist, &mut out)?;
//! let copy = handler.deserialize(&mut out.as_slice())?;
//! ```

pub mod blist;
pub mod blister;
pub mod legacy;

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::custom_data::{self, CustomData};
use crate::error::{Error, Result};
use crate::playlist::{Playlist, PlaylistFormat};
use crate::song::{Difficulty, PlaylistSong, Song, SongIdentity};

pub use blist::BlistHandler;
pub use blister::BlisterHandler;
pub use legacy::LegacyHandler;

/// Serializer/deserializer for one playlist wire format.
pub trait PlaylistHandler: Send + Sync {
    /// Extension used when a playlist has no usable suggestion (no dot).
    fn default_extension(&self) -> &'static str;

    /// Every extension this handler reads and writes (no dot).
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Format of the playlists this handler produces.
    fn handled_format(&self) -> PlaylistFormat;

    /// Case-insensitive extension check; a leading dot is ignored.
    fn supports_extension(&self, extension: &str) -> bool {
        let extension = normalize_extension(extension);
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Write `playlist` to `sink`.
    fn serialize(&self, playlist: &Playlist, sink: &mut dyn Write) -> Result<()>;

    /// Read `source` into an existing playlist, keeping its identity,
    /// subscriptions and any custom data it already has.
    fn populate(&self, source: &mut dyn Read, playlist: &mut Playlist) -> Result<()>;

    /// Read a new playlist of [`Self::handled_format`] from `source`.
    fn deserialize(&self, source: &mut dyn Read) -> Result<Playlist> {
        let mut playlist = Playlist::new(self.handled_format(), "");
        self.populate(source, &mut playlist)?;
        Ok(playlist)
    }

    /// Write `playlist` over a previous version of the same file.
    ///
    /// Flat formats ignore `previous`; container formats use it to keep
    /// entries they don't manage.
    fn rewrite(
        &self,
        playlist: &Playlist,
        _previous: Option<&mut dyn Read>,
        sink: &mut dyn Write,
    ) -> Result<()> {
        self.serialize(playlist, sink)
    }
}

impl std::fmt::Debug for dyn PlaylistHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistHandler")
            .field("format", &self.handled_format())
            .field("extensions", &self.supported_extensions())
            .finish()
    }
}

/// Strip a leading dot and surrounding whitespace from an extension.
pub fn normalize_extension(extension: &str) -> &str {
    extension.trim().trim_start_matches('.')
}

// ============================================================================
// Shared wire helpers
// ============================================================================

/// Fields every format reads for one song.
#[derive(Debug, Default)]
pub(crate) struct WireSong {
    pub hash: Option<String>,
    pub level_id: Option<String>,
    pub key: Option<String>,
    pub name: Option<String>,
    pub level_author_name: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
    pub difficulties: Option<Vec<Difficulty>>,
    pub custom_data: Option<Map<String, Value>>,
    pub extra: Map<String, Value>,
}

impl WireSong {
    /// Build a playlist entry, assigning identifiers in wire order.
    ///
    /// Entries in a file are not rejected for disagreeing identifiers: the
    /// later assignment wins, as it would for any caller using the setters.
    pub fn into_song(self) -> PlaylistSong {
        let hash = non_empty(self.hash.as_deref());
        let level_id = non_empty(self.level_id.as_deref());

        let mut identity = SongIdentity::default();
        identity.set_hash(hash);
        identity.set_level_id(level_id);
        identity.set_key(non_empty(self.key.as_deref()));
        let overridden = hash
            .zip(identity.hash())
            .is_some_and(|(given, kept)| !kept.eq_ignore_ascii_case(given));
        if overridden {
            tracing::warn!(
                hash = hash.unwrap_or_default(),
                level_id = level_id.unwrap_or_default(),
                "Song entry hash disagrees with its level id, keeping the level id"
            );
        }
        identity.set_name(self.name.as_deref());
        identity.set_level_author_name(self.level_author_name.as_deref());

        let mut song = PlaylistSong::new(identity);
        song.set_date_added(self.date_added);
        song.set_difficulties(self.difficulties);
        *song.custom_data_mut() = collect_custom_data(self.custom_data, self.extra);
        song
    }

    /// Wire view of a playlist entry.
    pub fn from_song(song: &PlaylistSong) -> Self {
        Self {
            hash: song.hash().map(str::to_string),
            level_id: song.level_id().map(str::to_string),
            key: song.key().map(str::to_string),
            name: song.name().map(str::to_string),
            level_author_name: song.level_author_name().map(str::to_string),
            date_added: song.date_added(),
            difficulties: Song::difficulties(song).map(<[Difficulty]>::to_vec),
            custom_data: custom_data_out(song.custom_data()),
            extra: Map::new(),
        }
    }
}

/// Playlist-level fields shared by every format.
#[derive(Debug, Default)]
pub(crate) struct Manifest {
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub custom_data: Option<Map<String, Value>>,
    pub extra: Map<String, Value>,
    pub songs: Vec<WireSong>,
}

impl Manifest {
    pub fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            title: playlist.title().to_string(),
            author: playlist.author().map(str::to_string),
            description: playlist.description().map(str::to_string),
            custom_data: custom_data_out(playlist.custom_data()),
            extra: Map::new(),
            songs: playlist.songs().iter().map(WireSong::from_song).collect(),
        }
    }

    /// Copy into `playlist`. Songs are replaced; custom data is merged with
    /// keys the playlist already has taking precedence.
    pub fn apply(self, playlist: &mut Playlist) -> Result<()> {
        let songs = self.songs.into_iter().map(WireSong::into_song).collect();

        playlist.set_title(self.title);
        playlist.set_author(self.author.as_deref());
        playlist.set_description(self.description.as_deref());
        playlist.merge_custom_data(collect_custom_data(self.custom_data, self.extra));
        playlist.replace_songs(songs);
        Ok(())
    }
}

/// `customData` object plus unrecognized fields; explicit values win.
fn collect_custom_data(custom: Option<Map<String, Value>>, extra: Map<String, Value>) -> CustomData {
    let mut data = custom.map(custom_data::data_from_json).unwrap_or_default();
    custom_data::merge_missing(&mut data, custom_data::data_from_json(extra));
    data
}

/// Custom data for output, `None` when empty so the field is omitted.
pub(crate) fn custom_data_out(data: &CustomData) -> Option<Map<String, Value>> {
    (!data.is_empty()).then(|| custom_data::data_to_json(data))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub(crate) fn read_error(e: std::io::Error) -> Error {
    Error::serialization_from("failed to read playlist data", e)
}

pub(crate) fn write_error(e: std::io::Error) -> Error {
    Error::serialization_from("failed to write playlist data", e)
}

pub(crate) fn json_error(e: serde_json::Error) -> Error {
    Error::serialization_from("malformed playlist JSON", e)
}

/// Re-wrap any non-serialization error coming out of the playlist model.
pub(crate) fn into_serialization(e: Error) -> Error {
    if e.is_serialization() {
        e
    } else {
        Error::serialization_from(e.to_string(), e)
    }
}
