//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `library`: listing, inspecting, creating and converting playlists
//! - `songs`: adding, removing and reordering songs

mod library;
mod songs;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use playlist_keeper::config;
use playlist_keeper::manager::{ManagerOptions, PlaylistManager};
use playlist_keeper::playlist::{PlaylistFormat, SharedPlaylist};

pub use library::{cmd_convert, cmd_create, cmd_list, cmd_show};
pub use songs::{cmd_add, cmd_dedupe, cmd_remove_song, cmd_sort};

/// Playlist Keeper CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Playlist directory (overrides the config file)
    #[arg(long, global = true, env = "PLAYLIST_KEEPER_ROOT")]
    pub root: Option<PathBuf>,

    /// Also search subdirectories of the playlist directory
    #[arg(short, long, global = true)]
    pub recursive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identifiers for a song on the command line; at least one is required.
#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
pub struct SongIds {
    /// Level hash
    #[arg(long)]
    pub hash: Option<String>,
    /// Level id (custom_level_<hash> for custom levels)
    #[arg(long)]
    pub level_id: Option<String>,
    /// Catalog key
    #[arg(long)]
    pub key: Option<String>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// List every playlist in the playlist directory
    List,
    /// Show a playlist's metadata and songs
    Show {
        /// Playlist file name without extension
        name: String,
    },
    /// Create an empty playlist
    Create {
        /// Playlist file name without extension
        name: String,
        /// Playlist title
        #[arg(short, long)]
        title: String,
        /// Playlist author
        #[arg(short, long)]
        author: Option<String>,
        /// Playlist description
        #[arg(short, long)]
        description: Option<String>,
        /// Cover image file
        #[arg(long)]
        cover: Option<PathBuf>,
        /// Playlist format: legacy, blist or blister (default from config)
        #[arg(short, long)]
        format: Option<PlaylistFormat>,
    },
    /// Add a song to a playlist
    Add {
        /// Playlist file name without extension
        name: String,
        #[command(flatten)]
        ids: SongIds,
        /// Song name
        #[arg(long)]
        song_name: Option<String>,
        /// Level author
        #[arg(long)]
        mapper: Option<String>,
    },
    /// Remove a song from every playlist
    RemoveSong {
        /// Level hash
        hash: String,
    },
    /// Remove duplicate songs from a playlist
    Dedupe {
        /// Playlist file name without extension
        name: String,
    },
    /// Sort a playlist by date added, newest first
    Sort {
        /// Playlist file name without extension
        name: String,
    },
    /// Convert a playlist to another format
    Convert {
        /// Playlist file name without extension
        name: String,
        /// Target format: legacy, blist or blister
        #[arg(long)]
        to: PlaylistFormat,
        /// Keep the original file next to the converted one
        #[arg(long)]
        keep: bool,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::List => cmd_list(&open_manager(cli, None)),
        Commands::Show { name } => cmd_show(&open_manager(cli, None), name),
        Commands::Create {
            name,
            title,
            author,
            description,
            cover,
            format,
        } => cmd_create(
            &open_manager(cli, *format),
            name,
            title,
            author.as_deref(),
            description.as_deref(),
            cover.as_deref(),
        ),
        Commands::Add {
            name,
            ids,
            song_name,
            mapper,
        } => cmd_add(
            &open_manager(cli, None),
            name,
            ids,
            song_name.as_deref(),
            mapper.as_deref(),
        ),
        Commands::RemoveSong { hash } => cmd_remove_song(&open_manager(cli, None), hash),
        Commands::Dedupe { name } => cmd_dedupe(&open_manager(cli, None), name),
        Commands::Sort { name } => cmd_sort(&open_manager(cli, None), name),
        Commands::Convert { name, to, keep } => {
            cmd_convert(&open_manager(cli, None), name, *to, *keep)
        }
    }
}

/// Manager over the configured playlist directory, with CLI overrides.
fn open_manager(cli: &Cli, format: Option<PlaylistFormat>) -> PlaylistManager {
    let config = config::load();
    let mut options = ManagerOptions::from(&config);
    if let Some(root) = &cli.root {
        options.root = root.clone();
    }
    if cli.recursive {
        options.recursive = true;
    }
    if let Some(format) = format {
        options.default_format = format;
    }
    tracing::debug!(root = %options.root.display(), recursive = options.recursive, "Opening playlist directory");
    PlaylistManager::with_default_handlers(options)
}

/// Load a playlist by name or fail with a readable message.
fn require_playlist(manager: &PlaylistManager, name: &str) -> anyhow::Result<SharedPlaylist> {
    match manager.get_playlist(name, None)? {
        Some(playlist) => Ok(playlist),
        None => anyhow::bail!(
            "No playlist named '{}' in {}",
            name,
            manager.root().display()
        ),
    }
}
