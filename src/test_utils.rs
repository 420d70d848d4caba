//! Test utilities and fixtures for playlist-keeper tests.
//!
//! Provides sample songs and playlists plus a manager rooted in a temporary
//! directory, so tests don't repeat the same setup.
//!
//! # Example
//!
//! ```ignore
//! use playlist_keeper::test_utils::{temp_manager, sample_playlist};
//!
//! #[test]
//! fn test_something() {
//!     let (manager, _dir) = temp_manager();
//!     let playlist = sample_playlist(PlaylistFormat::Legacy, 3);
//!     // ... test logic
//! }
//! ```

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::manager::{ManagerOptions, PlaylistManager};
use crate::playlist::{Playlist, PlaylistFormat};
use crate::song::{PlaylistSong, SongIdentity};

/// A song identity with every identifier set, unique per `n`.
///
/// Keys are `1A0`, `1A1`, ... so they stay short (upper-cased) and distinct.
pub fn sample_identity(n: u32) -> SongIdentity {
    let hash = format!("{n:040X}");
    let key = format!("{:X}", 0x1A0 + n);
    SongIdentity::new(Some(hash.as_str()), None, Some(key.as_str()))
        .expect("sample identity is consistent")
        .with_name(format!("Song {n}"))
        .with_level_author_name("Test Mapper")
}

/// A playlist entry for [`sample_identity`] with a fixed added date.
pub fn dated_song(n: u32, date_added: Option<DateTime<Utc>>) -> PlaylistSong {
    let mut song = PlaylistSong::new(sample_identity(n));
    song.set_date_added(date_added);
    song
}

/// A playlist with `count` sample songs and some metadata filled in.
pub fn sample_playlist(format: PlaylistFormat, count: u32) -> Playlist {
    let mut playlist = Playlist::new(format, "Sample Playlist")
        .with_author("Test Author")
        .with_description("Songs for tests")
        .with_filename("sample");
    for n in 0..count {
        playlist
            .add(&sample_identity(n))
            .expect("sample songs are valid");
    }
    playlist
}

/// Creates a manager with the default handlers over an empty temp directory.
///
/// Keep the `TempDir` alive for the duration of the test.
pub fn temp_manager() -> (PlaylistManager, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let manager = PlaylistManager::with_default_handlers(ManagerOptions::new(dir.path()));
    (manager, dir)
}
