//! Playlist manager: handler registry, loaded playlists and unsaved changes.
//!
//! The manager owns a playlist root directory. Playlists are looked up by
//! file name without extension (case-insensitive), loaded through the
//! handler registered for the file's extension, and written back with the
//! crash-safe protocol in [`files`].
//!
//! Registered playlists report changes through their `PlaylistChanged`
//! event; the manager keeps those in a dirty set until they are stored.
//!
//! # Locking
//!
//! Playlists are shared as [`SharedPlaylist`]. Don't hold a playlist's lock
//! while calling manager methods that take the playlist itself
//! ([`PlaylistManager::mark_changed`], [`PlaylistManager::store_playlist`],
//! [`PlaylistManager::register_playlist`]); they lock it internally.
//! Raising `PlaylistChanged` while holding the write lock is fine.

pub mod files;

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::{BlistHandler, BlisterHandler, LegacyHandler, PlaylistHandler, normalize_extension};
use crate::playlist::{Playlist, PlaylistFormat, SharedPlaylist, SubscriptionId};
use crate::song::Song;

/// A registered handler, shared between the format and extension maps.
pub type HandlerRef = Arc<dyn PlaylistHandler>;

type DirtySet = Mutex<HashMap<Uuid, SharedPlaylist>>;

/// Where the manager keeps playlists and which format new ones get.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub root: PathBuf,
    /// Also look in subdirectories of `root`
    pub recursive: bool,
    /// Format of playlists made by [`PlaylistManager::create_playlist`]
    pub default_format: PlaylistFormat,
}

impl ManagerOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            default_format: PlaylistFormat::default(),
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_default_format(mut self, format: PlaylistFormat) -> Self {
        self.default_format = format;
        self
    }
}

impl From<&Config> for ManagerOptions {
    fn from(config: &Config) -> Self {
        Self::new(config.library.root.clone())
            .with_recursive(config.library.recursive)
            .with_default_format(config.library.default_format)
    }
}

struct LoadedPlaylist {
    playlist: SharedPlaylist,
    subscription: SubscriptionId,
}

/// Registry of format handlers and loaded playlists for one directory.
pub struct PlaylistManager {
    root: PathBuf,
    recursive: bool,
    default_format: PlaylistFormat,
    handlers: RwLock<HashMap<PlaylistFormat, HandlerRef>>,
    extensions: RwLock<HashMap<String, HandlerRef>>,
    /// Keyed by upper-cased file name
    playlists: RwLock<HashMap<String, LoadedPlaylist>>,
    changed: Arc<DirtySet>,
}

impl std::fmt::Debug for PlaylistManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistManager")
            .field("root", &self.root)
            .field("recursive", &self.recursive)
            .field("default_format", &self.default_format)
            .field("loaded", &self.playlists.read().len())
            .field("changed", &self.changed.lock().len())
            .finish()
    }
}

fn extension_key(extension: &str) -> String {
    normalize_extension(extension).to_uppercase()
}

impl PlaylistManager {
    /// A manager with no handlers registered.
    pub fn new(options: ManagerOptions) -> Self {
        Self {
            root: options.root,
            recursive: options.recursive,
            default_format: options.default_format,
            handlers: RwLock::new(HashMap::new()),
            extensions: RwLock::new(HashMap::new()),
            playlists: RwLock::new(HashMap::new()),
            changed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A manager with the Legacy, Blist and Blister handlers, in that order.
    ///
    /// Blist registers before Blister, so `.blist` files are read as zip
    /// containers.
    pub fn with_default_handlers(options: ManagerOptions) -> Self {
        let manager = Self::new(options);
        manager.register_handler(Arc::new(LegacyHandler));
        manager.register_handler(Arc::new(BlistHandler));
        manager.register_handler(Arc::new(BlisterHandler));
        manager
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn default_format(&self) -> PlaylistFormat {
        self.default_format
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Register a handler for its format and every extension it supports.
    ///
    /// The first handler registered for a format keeps it, and the first
    /// handler claiming an extension keeps that. Returns `true` if at least
    /// one extension mapping was added.
    pub fn register_handler(&self, handler: HandlerRef) -> bool {
        let format = handler.handled_format();
        {
            let mut handlers = self.handlers.write();
            if handlers.contains_key(&format) {
                tracing::debug!(%format, "Format already has a handler");
            } else {
                handlers.insert(format, Arc::clone(&handler));
            }
        }

        let mut extensions = self.extensions.write();
        let mut added = false;
        for ext in handler.supported_extensions() {
            let key = extension_key(ext);
            if extensions.contains_key(&key) {
                tracing::debug!(extension = %key, %format, "Extension already claimed");
                continue;
            }
            extensions.insert(key, Arc::clone(&handler));
            added = true;
        }
        added
    }

    /// Map `extension` to `handler`, replacing any current mapping.
    pub fn register_handler_for_extension(&self, extension: &str, handler: HandlerRef) -> Result<()> {
        let ext = normalize_extension(extension);
        if ext.is_empty() {
            return Err(Error::argument("extension must not be empty"));
        }
        if !handler.supports_extension(ext) {
            return Err(Error::argument(format!(
                "{} handler does not support extension '{ext}'",
                handler.handled_format()
            )));
        }
        tracing::debug!(extension = %ext, format = %handler.handled_format(), "Overriding extension handler");
        self.extensions.write().insert(extension_key(ext), handler);
        Ok(())
    }

    /// Handler registered for `extension` (case-insensitive, dot optional).
    pub fn handler_for_extension(&self, extension: &str) -> Option<HandlerRef> {
        self.extensions.read().get(&extension_key(extension)).cloned()
    }

    /// Handler registered for `format`.
    pub fn handler_for_format(&self, format: PlaylistFormat) -> Option<HandlerRef> {
        self.handlers.read().get(&format).cloned()
    }

    /// Handler for the default format.
    pub fn default_handler(&self) -> Option<HandlerRef> {
        self.handler_for_format(self.default_format)
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    /// Build a new, unregistered playlist of the default format.
    pub fn create_playlist(
        &self,
        filename: &str,
        title: &str,
        author: Option<&str>,
        cover: Option<&mut dyn Read>,
        description: Option<&str>,
    ) -> Result<Playlist> {
        let mut playlist = Playlist::new(self.default_format, title).with_filename(filename);
        playlist.set_author(author);
        playlist.set_description(description);
        if let Some(cover) = cover {
            playlist.set_cover_from_reader(cover)?;
        }
        Ok(playlist)
    }

    /// Start tracking `playlist`.
    ///
    /// Returns `false` without doing anything if a playlist with the same
    /// file name is already registered.
    pub fn register_playlist(&self, playlist: &SharedPlaylist, mark_changed: bool) -> Result<bool> {
        let (key, id) = {
            let guard = playlist.read();
            if guard.filename().is_empty() {
                return Err(Error::invalid_state("playlist has no filename"));
            }
            (guard.filename().to_uppercase(), guard.id())
        };

        let mut playlists = self.playlists.write();
        if playlists.contains_key(&key) {
            tracing::debug!(filename = %key, "Playlist already registered");
            return Ok(false);
        }

        let weak: Weak<RwLock<Playlist>> = Arc::downgrade(playlist);
        let changed = Arc::downgrade(&self.changed);
        let subscription = playlist.write().on_playlist_changed(move |p| {
            if let (Some(shared), Some(changed)) = (weak.upgrade(), changed.upgrade()) {
                changed.lock().insert(p.id(), shared);
            }
        });

        playlists.insert(
            key,
            LoadedPlaylist {
                playlist: Arc::clone(playlist),
                subscription,
            },
        );
        drop(playlists);

        if mark_changed {
            self.changed.lock().insert(id, Arc::clone(playlist));
        }
        Ok(true)
    }

    /// Stop tracking the playlist with `filename`; pending changes are dropped.
    pub fn unregister_playlist(&self, filename: &str) -> Option<SharedPlaylist> {
        let loaded = self.playlists.write().remove(&filename.to_uppercase())?;
        let id = {
            let mut guard = loaded.playlist.write();
            guard.unsubscribe_playlist_changed(loaded.subscription);
            guard.id()
        };
        self.changed.lock().remove(&id);
        Some(loaded.playlist)
    }

    /// A loaded playlist, or the first matching file in the root.
    ///
    /// Returns `Ok(None)` if no file matches. With `handler` given, the file's
    /// extension must be one it supports.
    pub fn get_playlist(
        &self,
        filename: &str,
        handler: Option<HandlerRef>,
    ) -> Result<Option<SharedPlaylist>> {
        if let Some(loaded) = self.playlists.read().get(&filename.to_uppercase()) {
            return Ok(Some(Arc::clone(&loaded.playlist)));
        }

        let Some(path) = files::find_playlist_file(&self.root, filename, self.recursive) else {
            tracing::debug!(filename, root = %self.root.display(), "No playlist file found");
            return Ok(None);
        };
        self.load_file(&path, handler).map(Some)
    }

    /// [`Self::get_playlist`], or register the playlist made by `factory`.
    pub fn get_or_add<F>(&self, filename: &str, factory: F) -> Result<SharedPlaylist>
    where
        F: FnOnce() -> Playlist,
    {
        if let Some(existing) = self.get_playlist(filename, None)? {
            return Ok(existing);
        }

        let mut playlist = factory();
        playlist.set_filename(filename);
        let shared = playlist.into_shared();
        if !self.register_playlist(&shared, true)? {
            // registered by someone else in the meantime
            if let Some(existing) = self.playlists.read().get(&filename.to_uppercase()) {
                return Ok(Arc::clone(&existing.playlist));
            }
        }
        Ok(shared)
    }

    fn load_file(&self, path: &Path, handler: Option<HandlerRef>) -> Result<SharedPlaylist> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                Error::argument(format!("playlist file {} has no extension", path.display()))
            })?;

        let handler = match handler {
            Some(handler) if handler.supports_extension(extension) => handler,
            Some(handler) => {
                return Err(Error::argument(format!(
                    "{} handler does not support extension '{extension}'",
                    handler.handled_format()
                )));
            }
            None => self.handler_for_extension(extension).ok_or_else(|| {
                Error::invalid_state(format!("no handler registered for extension '{extension}'"))
            })?,
        };

        let mut playlist = files::read_playlist_file(path, |source| handler.deserialize(source))?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            playlist.set_filename(stem);
        }
        playlist.set_suggested_extension(Some(extension));
        playlist.set_source_dir(path.parent().map(Path::to_path_buf));
        tracing::info!(path = %path.display(), songs = playlist.len(), "Loaded playlist");

        let shared = playlist.into_shared();
        if !self.register_playlist(&shared, false)? {
            let key = shared.read().filename().to_uppercase();
            if let Some(existing) = self.playlists.read().get(&key) {
                return Ok(Arc::clone(&existing.playlist));
            }
        }
        Ok(shared)
    }

    /// Files in the root that a registered handler can read.
    pub fn discover(&self) -> Vec<PathBuf> {
        let extensions = self.extensions.read();
        files::playlist_files(&self.root, self.recursive)
            .into_iter()
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains_key(&extension_key(e)))
            })
            .collect()
    }

    /// Load every discovered playlist; failures are logged and skipped.
    pub fn load_all(&self) -> Vec<SharedPlaylist> {
        let mut loaded = Vec::new();
        for path in self.discover() {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let known = self.playlists.read().get(&stem.to_uppercase()).map(|l| Arc::clone(&l.playlist));
            let result = match known {
                Some(playlist) => Ok(playlist),
                None => self.load_file(&path, None),
            };
            match result {
                Ok(playlist) => {
                    if !loaded.iter().any(|p| Arc::ptr_eq(p, &playlist)) {
                        loaded.push(playlist);
                    }
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping playlist"),
            }
        }
        loaded
    }

    /// Every registered playlist, in no particular order.
    pub fn loaded_playlists(&self) -> Vec<SharedPlaylist> {
        self.playlists
            .read()
            .values()
            .map(|l| Arc::clone(&l.playlist))
            .collect()
    }

    // ========================================================================
    // Changes and storing
    // ========================================================================

    /// Add `playlist` to the dirty set.
    pub fn mark_changed(&self, playlist: &SharedPlaylist) {
        let id = playlist.read().id();
        self.changed.lock().insert(id, Arc::clone(playlist));
    }

    pub fn is_changed(&self, playlist: &Playlist) -> bool {
        self.changed.lock().contains_key(&playlist.id())
    }

    pub fn changed_count(&self) -> usize {
        self.changed.lock().len()
    }

    /// Resolve the handler a store would use.
    ///
    /// An explicit handler must handle the playlist's format. Otherwise the
    /// handler for the suggested extension is used if it handles the format,
    /// then the handler for the format itself.
    pub fn resolve_store_handler(
        &self,
        playlist: &Playlist,
        handler: Option<HandlerRef>,
    ) -> Result<HandlerRef> {
        let format = playlist.format();
        if let Some(handler) = handler {
            if handler.handled_format() != format {
                return Err(Error::argument(format!(
                    "{} handler cannot store a {format} playlist",
                    handler.handled_format()
                )));
            }
            return Ok(handler);
        }

        playlist
            .suggested_extension()
            .and_then(|ext| self.handler_for_extension(ext))
            .filter(|h| h.handled_format() == format)
            .or_else(|| self.handler_for_format(format))
            .ok_or_else(|| Error::argument(format!("no handler registered for {format} playlists")))
    }

    /// Write `playlist` into its source directory (or the root).
    ///
    /// Returns the written path. With `remove_from_changed`, a successful
    /// store also clears the playlist from the dirty set.
    pub fn store_playlist(
        &self,
        playlist: &SharedPlaylist,
        handler: Option<HandlerRef>,
        remove_from_changed: bool,
    ) -> Result<PathBuf> {
        let (path, id, extension, dir) = {
            let guard = playlist.read();
            if guard.filename().is_empty() {
                return Err(Error::invalid_state("playlist has no filename"));
            }
            let handler = self.resolve_store_handler(&guard, handler)?;
            let extension = guard
                .suggested_extension()
                .filter(|ext| handler.supports_extension(ext))
                .unwrap_or(handler.default_extension())
                .to_string();
            let dir = guard
                .source_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone());
            let path = dir.join(format!("{}.{extension}", guard.filename()));

            files::write_playlist_file(&path, |previous, sink| {
                handler.rewrite(&guard, previous, sink)
            })?;
            tracing::info!(path = %path.display(), songs = guard.len(), "Stored playlist");
            (path, guard.id(), extension, dir)
        };

        {
            let mut guard = playlist.write();
            guard.set_suggested_extension(Some(&extension));
            guard.set_source_dir(Some(dir));
        }
        if remove_from_changed {
            self.changed.lock().remove(&id);
        }
        Ok(path)
    }

    /// Store every playlist in the dirty set.
    ///
    /// Every playlist is attempted. Ones that fail go back into the dirty set
    /// and the first error is returned once all have been tried. Returns the
    /// number stored.
    pub fn store_all_playlists(&self) -> Result<usize> {
        let pending = std::mem::take(&mut *self.changed.lock());
        let mut stored = 0;
        let mut first_error = None;

        for (id, playlist) in pending {
            match self.store_playlist(&playlist, None, false) {
                Ok(_) => stored += 1,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "Failed to store playlist");
                    self.changed.lock().entry(id).or_insert(playlist);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stored),
        }
    }

    /// Remove every entry for `hash` from all loaded playlists.
    ///
    /// Returns the playlists that lost songs. They are not marked changed.
    pub fn remove_song_from_all(&self, hash: &str) -> Vec<SharedPlaylist> {
        let hash = hash.to_uppercase();
        self.loaded_playlists()
            .into_iter()
            .filter(|playlist| playlist.write().try_remove_by_hash(&hash))
            .collect()
    }

    /// [`Self::remove_song_from_all`] by a song's hash; songs without one
    /// match nothing.
    pub fn remove_matching_song_from_all(&self, song: &dyn Song) -> Vec<SharedPlaylist> {
        match song.hash() {
            Some(hash) => self.remove_song_from_all(hash),
            None => Vec::new(),
        }
    }
}
