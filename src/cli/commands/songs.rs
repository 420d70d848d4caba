//! Song-level commands: add, remove-song, dedupe, sort.

use playlist_keeper::manager::PlaylistManager;
use playlist_keeper::playlist::Playlist;
use playlist_keeper::song::SongIdentity;

use super::{SongIds, require_playlist};

/// Add a song to a playlist
pub fn cmd_add(
    manager: &PlaylistManager,
    name: &str,
    ids: &SongIds,
    song_name: Option<&str>,
    mapper: Option<&str>,
) -> anyhow::Result<()> {
    let shared = require_playlist(manager, name)?;

    let mut identity = SongIdentity::new(ids.hash.as_deref(), ids.level_id.as_deref(), ids.key.as_deref())?;
    identity.set_name(song_name);
    identity.set_level_author_name(mapper);

    let added = {
        let mut playlist = shared.write();
        ensure_writable(&playlist, name)?;
        let added = playlist.add(&identity)?.is_some();
        if added {
            playlist.raise_playlist_changed();
        }
        added
    };

    if !added {
        println!("'{}' already contains that song", name);
        return Ok(());
    }
    let stored = manager.store_all_playlists()?;
    tracing::debug!(stored, "Stored changed playlists");
    println!(
        "Added {} to '{}'",
        identity.name().or(identity.hash()).or(identity.key()).unwrap_or("song"),
        name
    );
    Ok(())
}

/// Remove a song from every playlist
pub fn cmd_remove_song(manager: &PlaylistManager, hash: &str) -> anyhow::Result<()> {
    for playlist in manager.load_all() {
        let filename = {
            let guard = playlist.read();
            guard.read_only().then(|| guard.filename().to_string())
        };
        if let Some(filename) = filename {
            tracing::debug!(%filename, "Skipping read-only playlist");
            manager.unregister_playlist(&filename);
        }
    }

    let touched = manager.remove_song_from_all(hash);
    if touched.is_empty() {
        println!("No playlist contains {}", hash);
        return Ok(());
    }
    for playlist in &touched {
        manager.mark_changed(playlist);
    }
    manager.store_all_playlists()?;

    for playlist in &touched {
        println!("Removed from '{}'", playlist.read().filename());
    }
    Ok(())
}

/// Remove duplicate songs from a playlist
pub fn cmd_dedupe(manager: &PlaylistManager, name: &str) -> anyhow::Result<()> {
    let shared = require_playlist(manager, name)?;
    ensure_writable(&shared.read(), name)?;
    let removed = shared.write().remove_duplicates();
    if removed == 0 {
        println!("No duplicates in '{}'", name);
        return Ok(());
    }
    manager.store_all_playlists()?;
    println!("Removed {} duplicate(s) from '{}'", removed, name);
    Ok(())
}

/// Sort a playlist by date added, newest first
pub fn cmd_sort(manager: &PlaylistManager, name: &str) -> anyhow::Result<()> {
    let shared = require_playlist(manager, name)?;
    {
        let mut playlist = shared.write();
        ensure_writable(&playlist, name)?;
        playlist.sort();
        playlist.raise_playlist_changed();
    }
    manager.store_all_playlists()?;
    println!("Sorted '{}'", name);
    Ok(())
}

fn ensure_writable(playlist: &Playlist, name: &str) -> anyhow::Result<()> {
    if playlist.read_only() {
        anyhow::bail!("Playlist '{}' is read-only", name);
    }
    Ok(())
}
