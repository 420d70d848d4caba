//! Playlist-level commands: list, show, create, convert.

use anyhow::Context;
use std::fs::File;
use std::path::{Path, PathBuf};

use playlist_keeper::manager::PlaylistManager;
use playlist_keeper::playlist::{Playlist, PlaylistFormat};
use playlist_keeper::song::Song;

use super::require_playlist;

/// List every playlist in the playlist directory
pub fn cmd_list(manager: &PlaylistManager) -> anyhow::Result<()> {
    let mut playlists = manager.load_all();
    if playlists.is_empty() {
        println!("No playlists in {}", manager.root().display());
        return Ok(());
    }
    playlists.sort_by_key(|p| p.read().filename().to_lowercase());

    println!("Playlists in {}:", manager.root().display());
    for playlist in &playlists {
        let playlist = playlist.read();
        println!(
            "  {:<24} {:<8} {:>4} songs  {}",
            playlist.filename(),
            playlist.format(),
            playlist.len(),
            playlist.title()
        );
    }
    println!();
    println!("{} playlist(s)", playlists.len());
    Ok(())
}

/// Show a playlist's metadata and songs
pub fn cmd_show(manager: &PlaylistManager, name: &str) -> anyhow::Result<()> {
    let shared = require_playlist(manager, name)?;
    let playlist = shared.read();

    println!("Title:       {}", playlist.title());
    println!("Author:      {}", playlist.author().unwrap_or("-"));
    println!("Description: {}", playlist.description().unwrap_or("-"));
    println!("Format:      {}", playlist.format());
    println!(
        "Cover:       {}",
        match playlist.cover_bytes() {
            Some(bytes) => format!("{} bytes", bytes.len()),
            None => "none".to_string(),
        }
    );
    if !playlist.custom_data().is_empty() {
        let keys: Vec<&str> = playlist.custom_data().keys().map(String::as_str).collect();
        println!("Custom data: {}", keys.join(", "));
    }
    println!();

    if playlist.is_empty() {
        println!("(no songs)");
        return Ok(());
    }
    for (index, song) in playlist.songs().iter().enumerate() {
        let added = song
            .date_added()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}. {:<32} {:<10} {:<8} {}",
            index + 1,
            song.name().or(song.hash()).or(song.level_id()).unwrap_or("?"),
            song.key().unwrap_or("-"),
            added,
            song.level_author_name().unwrap_or("")
        );
    }
    Ok(())
}

/// Create an empty playlist and write it to disk
pub fn cmd_create(
    manager: &PlaylistManager,
    name: &str,
    title: &str,
    author: Option<&str>,
    description: Option<&str>,
    cover: Option<&Path>,
) -> anyhow::Result<()> {
    if manager.get_playlist(name, None)?.is_some() {
        anyhow::bail!("A playlist named '{}' already exists", name);
    }

    let mut cover_file = match cover {
        Some(path) => Some(
            File::open(path).with_context(|| format!("Failed to open cover {}", path.display()))?,
        ),
        None => None,
    };
    let playlist = manager.create_playlist(
        name,
        title,
        author,
        cover_file.as_mut().map(|f| f as &mut dyn std::io::Read),
        description,
    )?;

    let shared = playlist.into_shared();
    manager.register_playlist(&shared, true)?;
    let path = manager.store_playlist(&shared, None, true)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Convert a playlist to another format
pub fn cmd_convert(
    manager: &PlaylistManager,
    name: &str,
    to: PlaylistFormat,
    keep: bool,
) -> anyhow::Result<()> {
    let shared = require_playlist(manager, name)?;
    let (converted, old_path) = {
        let source = shared.read();
        if source.format() == to {
            println!("'{}' is already a {} playlist", name, to);
            return Ok(());
        }
        (convert(&source, to)?, existing_path(manager, &source))
    };

    let filename = converted.filename().to_string();
    manager.unregister_playlist(&filename);
    let converted = converted.into_shared();
    manager.register_playlist(&converted, true)?;
    let new_path = manager
        .store_playlist(&converted, None, true)
        .with_context(|| format!("Failed to write converted playlist '{}'", filename))?;

    if let Some(old_path) = old_path.filter(|p| *p != new_path) {
        if keep {
            println!("Kept {}", old_path.display());
        } else {
            std::fs::remove_file(&old_path)
                .with_context(|| format!("Failed to remove {}", old_path.display()))?;
            tracing::info!(path = %old_path.display(), "Removed original playlist file");
        }
    }
    println!("Converted '{}' to {} -> {}", filename, to, new_path.display());
    Ok(())
}

/// Copy of `source` in `format`, with songs rebuilt by that format's factory.
fn convert(source: &Playlist, format: PlaylistFormat) -> anyhow::Result<Playlist> {
    let mut converted = Playlist::new(format, source.title()).with_filename(source.filename());
    converted.set_author(source.author());
    converted.set_description(source.description());
    converted.set_source_dir(source.source_dir().map(Path::to_path_buf));
    for (key, value) in source.custom_data() {
        converted.set_custom_data(key.clone(), value.clone())?;
    }
    if let Some(cover) = source.cover_bytes() {
        converted.set_cover(cover.to_vec());
    }

    let factory = format.song_factory();
    for song in source.songs() {
        let mut entry = factory.create_from_song(song)?;
        *entry.custom_data_mut() = song.custom_data().clone();
        converted.add_entry(entry);
    }
    Ok(converted)
}

/// Path the playlist was loaded from, if it came from disk.
fn existing_path(manager: &PlaylistManager, playlist: &Playlist) -> Option<PathBuf> {
    let extension = playlist.suggested_extension()?;
    let dir = playlist.source_dir().unwrap_or(manager.root());
    let path = dir.join(format!("{}.{}", playlist.filename(), extension));
    path.exists().then_some(path)
}
