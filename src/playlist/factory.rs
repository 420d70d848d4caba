//! Playlist formats and the per-format song factories.
//!
//! A [`Playlist`](super::Playlist) is one aggregate type for every format;
//! what differs is how songs are built when they enter it. Each
//! [`PlaylistFormat`] has a [`SongFactory`] for that.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::song::{PlaylistSong, Song, SongIdentity};

/// Concrete playlist kind; this is the "handled type" of a format handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistFormat {
    /// Flat JSON `.bplist` / `.json`
    #[default]
    Legacy,
    /// Zip container `.blist`
    Blist,
    /// Flat JSON with a `maps` array
    Blister,
}

impl PlaylistFormat {
    /// All formats, in default registration order.
    pub const ALL: [PlaylistFormat; 3] = [Self::Legacy, Self::Blist, Self::Blister];

    /// Convert to string representation for config and CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistFormat::Legacy => "legacy",
            PlaylistFormat::Blist => "blist",
            PlaylistFormat::Blister => "blister",
        }
    }

    /// Song factory for this format.
    pub fn song_factory(&self) -> &'static dyn SongFactory {
        match self {
            PlaylistFormat::Legacy => &LEGACY_SONGS,
            PlaylistFormat::Blist => &BLIST_SONGS,
            PlaylistFormat::Blister => &BlisterSongs,
        }
    }
}

impl fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaylistFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "bplist" => Ok(PlaylistFormat::Legacy),
            "blist" => Ok(PlaylistFormat::Blist),
            "blister" => Ok(PlaylistFormat::Blister),
            other => Err(Error::argument(format!("unknown playlist format '{other}'"))),
        }
    }
}

/// Builds the playlist's own song type from the ways a caller can name a level.
pub trait SongFactory: Send + Sync {
    /// Format whose songs this factory builds.
    fn format(&self) -> PlaylistFormat;

    /// Convert any song into a new playlist entry.
    fn create_from_song(&self, song: &dyn Song) -> Result<PlaylistSong>;

    /// New entry for a level known by hash.
    fn create_from_hash(
        &self,
        hash: &str,
        name: Option<&str>,
        key: Option<&str>,
        mapper: Option<&str>,
    ) -> Result<PlaylistSong>;

    /// New entry for a level known by level id.
    fn create_from_level_id(
        &self,
        level_id: &str,
        name: Option<&str>,
        key: Option<&str>,
        mapper: Option<&str>,
    ) -> Result<PlaylistSong>;
}

static LEGACY_SONGS: DisplaySongs = DisplaySongs(PlaylistFormat::Legacy);
static BLIST_SONGS: DisplaySongs = DisplaySongs(PlaylistFormat::Blist);

/// Songs for formats that store the song name and mapper (Legacy, Blist).
struct DisplaySongs(PlaylistFormat);

/// Songs for Blister, whose map entries only carry identifiers.
struct BlisterSongs;

fn entry(identity: SongIdentity, source: Option<&dyn Song>) -> PlaylistSong {
    let date_added = source.and_then(|s| s.date_added()).unwrap_or_else(Utc::now);
    let mut song = PlaylistSong::new(identity).with_date_added(date_added);
    if let Some(difficulties) = source.and_then(|s| s.difficulties()) {
        song.set_difficulties(Some(difficulties.to_vec()));
    }
    song
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::argument(format!("{what} must not be empty")));
    }
    Ok(())
}

fn with_display(mut identity: SongIdentity, name: Option<&str>, mapper: Option<&str>) -> SongIdentity {
    identity.set_name(name);
    identity.set_level_author_name(mapper);
    identity
}

impl SongFactory for DisplaySongs {
    fn format(&self) -> PlaylistFormat {
        self.0
    }

    fn create_from_song(&self, song: &dyn Song) -> Result<PlaylistSong> {
        let identity = SongIdentity::from_song(song)?;
        Ok(entry(identity, Some(song)))
    }

    fn create_from_hash(
        &self,
        hash: &str,
        name: Option<&str>,
        key: Option<&str>,
        mapper: Option<&str>,
    ) -> Result<PlaylistSong> {
        require(hash, "hash")?;
        let identity = SongIdentity::new(Some(hash), None, key)?;
        Ok(entry(with_display(identity, name, mapper), None))
    }

    fn create_from_level_id(
        &self,
        level_id: &str,
        name: Option<&str>,
        key: Option<&str>,
        mapper: Option<&str>,
    ) -> Result<PlaylistSong> {
        require(level_id, "level id")?;
        let identity = SongIdentity::new(None, Some(level_id), key)?;
        Ok(entry(with_display(identity, name, mapper), None))
    }
}

impl SongFactory for BlisterSongs {
    fn format(&self) -> PlaylistFormat {
        PlaylistFormat::Blister
    }

    fn create_from_song(&self, song: &dyn Song) -> Result<PlaylistSong> {
        let identity = SongIdentity::new(song.hash(), song.level_id(), song.key())?;
        Ok(entry(identity, Some(song)))
    }

    fn create_from_hash(
        &self,
        hash: &str,
        _name: Option<&str>,
        key: Option<&str>,
        _mapper: Option<&str>,
    ) -> Result<PlaylistSong> {
        require(hash, "hash")?;
        let identity = SongIdentity::new(Some(hash), None, key)?;
        Ok(entry(identity, None))
    }

    fn create_from_level_id(
        &self,
        level_id: &str,
        _name: Option<&str>,
        key: Option<&str>,
        _mapper: Option<&str>,
    ) -> Result<PlaylistSong> {
        require(level_id, "level id")?;
        let identity = SongIdentity::new(None, Some(level_id), key)?;
        Ok(entry(identity, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("Legacy".parse::<PlaylistFormat>().unwrap(), PlaylistFormat::Legacy);
        assert_eq!("bplist".parse::<PlaylistFormat>().unwrap(), PlaylistFormat::Legacy);
        assert_eq!("BLIST".parse::<PlaylistFormat>().unwrap(), PlaylistFormat::Blist);
        assert!(matches!(
            "m3u".parse::<PlaylistFormat>(),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_factories_match_their_format() {
        for format in PlaylistFormat::ALL {
            assert_eq!(format.song_factory().format(), format);
        }
    }

    #[test]
    fn test_create_from_hash_keeps_display_fields() {
        let song = PlaylistFormat::Legacy
            .song_factory()
            .create_from_hash("abcd", Some("Song"), Some("1f"), Some("Mapper"))
            .unwrap();
        assert_eq!(song.hash(), Some("ABCD"));
        assert_eq!(song.key(), Some("1F"));
        assert_eq!(song.name(), Some("Song"));
        assert_eq!(song.level_author_name(), Some("Mapper"));
        assert!(song.date_added().is_some());
    }

    #[test]
    fn test_blister_drops_display_fields() {
        let source = SongIdentity::from_hash("abcd")
            .with_name("Song")
            .with_level_author_name("Mapper");
        let song = PlaylistFormat::Blister
            .song_factory()
            .create_from_song(&source)
            .unwrap();
        assert_eq!(song.hash(), Some("ABCD"));
        assert_eq!(song.name(), None);
    }

    #[test]
    fn test_empty_hash_is_an_argument_error() {
        let result = PlaylistFormat::Blist
            .song_factory()
            .create_from_hash("", None, None, None);
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn test_create_from_level_id() {
        let song = PlaylistFormat::Blist
            .song_factory()
            .create_from_level_id("custom_level_abcd", None, None, None)
            .unwrap();
        assert_eq!(song.hash(), Some("ABCD"));
    }
}
