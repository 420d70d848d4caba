//! Command-line interface for playlist-keeper.
//!
//! This module provides CLI commands for inspecting and editing the
//! playlists in a directory.

mod commands;

pub use commands::{Cli, run_command};
