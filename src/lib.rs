//! Playlist Keeper - a library for rhythm-game song playlists.
//!
//! Reads and writes three playlist formats (legacy `.bplist`, zipped
//! `.blist` and flat `.blister`) behind one [`Playlist`](playlist::Playlist)
//! type, and keeps a directory of playlists in sync through the
//! [`PlaylistManager`](manager::PlaylistManager).
//!
//! # Example
//!
//! ```ignore
//! use playlist_keeper::manager::{ManagerOptions, PlaylistManager};
//! use playlist_keeper::song::SongIdentity;
//!
//! let manager = PlaylistManager::with_default_handlers(ManagerOptions::new("Playlists"));
//! let playlist = manager.get_or_add("favorites", || {
//!     manager.create_playlist("favorites", "Favorites", None, None, None).unwrap()
//! })?;
//! playlist.write().add(&SongIdentity::from_hash("ABCD1234"))?;
//! playlist.read().raise_playlist_changed();
//! manager.store_all_playlists()?;
//! ```

pub mod config;
pub mod custom_data;
pub mod error;
pub mod handler;
pub mod manager;
pub mod playlist;
pub mod song;
#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
