//! Settings for the playlist directory, kept in a TOML file.
//!
//! The file lives at `<config dir>/playlist-keeper/config.toml`
//! (`%APPDATA%` on Windows, `~/Library/Application Support` on macOS,
//! `~/.config` on Linux). Every field is optional; missing ones take their
//! defaults. Command-line flags override individual settings for one run.
//!
//! ```toml
//! [library]
//! root = "/games/Beat Saber/Playlists"
//! recursive = false
//! default_format = "blist"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::playlist::PlaylistFormat;

const APP_DIR: &str = "playlist-keeper";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
}

/// Where playlists live and how new ones are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory holding the playlist files
    pub root: PathBuf,

    /// Search subdirectories of `root` too
    pub recursive: bool,

    /// Format of newly created playlists
    pub default_format: PlaylistFormat,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            root: default_root(),
            recursive: false,
            default_format: PlaylistFormat::default(),
        }
    }
}

/// `<data dir>/playlist-keeper/playlists`, or `./playlists` if the OS
/// doesn't report a data directory.
pub fn default_root() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR).join("playlists"))
        .unwrap_or_else(|| PathBuf::from("playlists"))
}

/// `<config dir>/playlist-keeper`
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// `<config dir>/playlist-keeper/config.toml`
pub fn config_path() -> Option<PathBuf> {
    Some(config_dir()?.join(CONFIG_FILE))
}

/// Settings from the standard location.
///
/// Never fails: a missing, unreadable or malformed file yields the defaults.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("No config directory on this platform, using default settings");
            Config::default()
        }
    }
}

/// Settings from `path`, falling back to defaults the same way as [`load`].
pub fn load_from(path: &Path) -> Config {
    match read_config(path) {
        Ok(Some(config)) => {
            tracing::debug!(path = %path.display(), "Loaded settings");
            config
        }
        Ok(None) => {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            Config::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring settings file, using defaults");
            Config::default()
        }
    }
}

fn read_config(path: &Path) -> Result<Option<Config>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Write settings to the standard location.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Write settings to `path`, creating its directory.
///
/// The file is replaced through a sibling `.toml.tmp` so readers never see
/// half a file.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let text = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    let staging = path.with_extension("toml.tmp");
    std::fs::write(&staging, text).map_err(|e| ConfigError::Write(staging.clone(), e))?;
    std::fs::rename(&staging, path)
        .map_err(|e| ConfigError::Rename(staging, path.to_path_buf(), e))?;

    tracing::info!(path = %path.display(), "Saved settings");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("This platform has no config directory")]
    NoConfigDir,

    #[error("Cannot read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Cannot parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Cannot create {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Cannot encode settings: {0}")]
    Serialize(toml::ser::Error),

    #[error("Cannot write {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Cannot move {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        crate::error::Error::config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_write_library_section() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("[library]"));
        assert!(text.contains("default_format = \"legacy\""));
    }

    #[test]
    fn test_library_settings_survive_toml() {
        let mut config = Config::default();
        config.library.root = PathBuf::from("/games/Playlists");
        config.library.recursive = true;
        config.library.default_format = PlaylistFormat::Blist;

        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();

        assert_eq!(back.library.root, PathBuf::from("/games/Playlists"));
        assert!(back.library.recursive);
        assert_eq!(back.library.default_format, PlaylistFormat::Blist);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config = toml::from_str("[library]\ndefault_format = \"blister\"\n").unwrap();

        assert_eq!(config.library.default_format, PlaylistFormat::Blister);
        assert!(!config.library.recursive);
        assert_eq!(config.library.root, default_root());
    }

    #[test]
    fn test_save_creates_directory_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.library.recursive = true;
        save_to(&config, &path).unwrap();

        assert!(load_from(&path).library.recursive);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "library = [not toml").unwrap();

        assert!(matches!(read_config(&path), Err(ConfigError::Parse(..))));
        assert_eq!(load_from(&path).library.default_format, PlaylistFormat::Legacy);
    }
}
