//! Song identity: the three alternative level identifiers and how they
//! reconcile with each other.
//!
//! A level can be referenced by any of:
//! - a content **hash** (stored upper-cased)
//! - a **level id**; for custom content this is `custom_level_` + hash
//! - a short catalog **key** (upper-cased when shorter than 12 characters)
//!
//! [`SongIdentity`] keeps these consistent on every assignment. A prefixed
//! level id always implies the hash, and a hash always implies a level id
//! when none is set. The [`Identifiers`] set is derived from the populated
//! fields and is never assigned directly.

pub mod playlist_song;

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub use playlist_song::{Difficulty, PlaylistSong};

/// Prefix of level ids that are derived from a content hash.
pub const LEVEL_ID_PREFIX: &str = "custom_level_";

/// Keys of at least this many characters are stored verbatim.
pub const CASE_SENSITIVE_KEY_LEN: usize = 12;

bitflags! {
    /// Which identifiers a song currently holds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Identifiers: u8 {
        /// Content hash is populated (stored or derived from the level id)
        const HASH = 1 << 0;
        /// Level id is populated
        const LEVEL_ID = 1 << 1;
        /// Catalog key is populated
        const KEY = 1 << 2;
    }
}

/// Read access to anything that identifies a level.
///
/// [`crate::playlist::Playlist::add`] accepts any `&dyn Song` and converts it
/// into the playlist's own song type.
pub trait Song {
    /// Upper-cased content hash.
    fn hash(&self) -> Option<&str>;
    /// Level id, `custom_level_<HASH>` for custom levels.
    fn level_id(&self) -> Option<&str>;
    /// Catalog key.
    fn key(&self) -> Option<&str>;
    /// Song display name.
    fn name(&self) -> Option<&str>;
    /// Name of whoever mapped the level.
    fn level_author_name(&self) -> Option<&str>;
    /// Populated identifiers.
    fn identifiers(&self) -> Identifiers;

    fn date_added(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn difficulties(&self) -> Option<&[Difficulty]> {
        None
    }
}

/// Normalize a hash for storage. Empty input clears it.
pub fn normalize_hash(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_uppercase())
    }
}

/// Normalize a key for storage.
///
/// Short keys are case-insensitive catalog ids and get upper-cased; longer
/// values may be URL-like and are kept as-is.
pub fn normalize_key(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else if value.chars().count() < CASE_SENSITIVE_KEY_LEN {
        Some(value.to_uppercase())
    } else {
        Some(value.to_string())
    }
}

/// Hash implied by a `custom_level_` level id, upper-cased.
pub fn hash_from_level_id(level_id: &str) -> Option<String> {
    level_id
        .strip_prefix(LEVEL_ID_PREFIX)
        .filter(|suffix| !suffix.is_empty())
        .map(str::to_uppercase)
}

/// Level id for a (normalized) hash.
pub fn level_id_from_hash(hash: &str) -> String {
    format!("{LEVEL_ID_PREFIX}{hash}")
}

fn normalize_level_id(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    Some(match hash_from_level_id(value) {
        Some(hash) => level_id_from_hash(&hash),
        None => value.to_string(),
    })
}

/// The identifying half of a song: hash, level id, key, plus display fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongIdentity {
    hash: Option<String>,
    level_id: Option<String>,
    key: Option<String>,
    name: Option<String>,
    level_author_name: Option<String>,
    identifiers: Identifiers,
}

impl SongIdentity {
    /// Build an identity from any combination of identifiers.
    ///
    /// Fails with [`Error::Validation`] when `hash` and a `custom_level_`
    /// level id are both given and name different levels.
    pub fn new(hash: Option<&str>, level_id: Option<&str>, key: Option<&str>) -> Result<Self> {
        let normalized = hash.and_then(normalize_hash);
        let derived = level_id.and_then(hash_from_level_id);
        if let (Some(hash), Some(derived)) = (&normalized, &derived) {
            if hash != derived {
                return Err(Error::validation("levelId and hash do not match"));
            }
        }

        let mut song = Self::default();
        song.set_hash(normalized.as_deref());
        song.set_level_id(level_id);
        song.set_key(key);
        Ok(song)
    }

    /// Identity for a custom level known by hash.
    pub fn from_hash(hash: &str) -> Self {
        let mut song = Self::default();
        song.set_hash(Some(hash));
        song
    }

    /// Identity for a level known by level id.
    pub fn from_level_id(level_id: &str) -> Self {
        let mut song = Self::default();
        song.set_level_id(Some(level_id));
        song
    }

    /// Identity for a level known only by catalog key.
    pub fn from_key(key: &str) -> Self {
        let mut song = Self::default();
        song.set_key(Some(key));
        song
    }

    /// Copy the identifying fields of any song.
    pub fn from_song(song: &dyn Song) -> Result<Self> {
        let mut identity = Self::new(song.hash(), song.level_id(), song.key())?;
        identity.name = song.name().map(str::to_string);
        identity.level_author_name = song.level_author_name().map(str::to_string);
        Ok(identity)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_level_author_name(mut self, mapper: impl Into<String>) -> Self {
        self.level_author_name = Some(mapper.into());
        self
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn level_id(&self) -> Option<&str> {
        self.level_id.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn level_author_name(&self) -> Option<&str> {
        self.level_author_name.as_deref()
    }

    pub fn identifiers(&self) -> Identifiers {
        self.identifiers
    }

    /// Assign the hash. Returns `false` when nothing changed.
    ///
    /// A new hash rewrites the level id to `custom_level_<HASH>` unless the
    /// current level id already ends with it. Clearing the hash keeps it
    /// when the level id still implies one.
    pub fn set_hash(&mut self, value: Option<&str>) -> bool {
        let new = value.and_then(normalize_hash);
        if new == self.hash {
            return false;
        }
        let before = (self.hash.clone(), self.level_id.clone());

        match new {
            Some(hash) => {
                let level_id_matches = self
                    .level_id
                    .as_deref()
                    .is_some_and(|id| id.to_uppercase().ends_with(&hash));
                if !level_id_matches {
                    self.level_id = Some(level_id_from_hash(&hash));
                }
                self.hash = Some(hash);
            }
            None => {
                self.hash = self.level_id.as_deref().and_then(hash_from_level_id);
            }
        }

        self.refresh_identifiers();
        before != (self.hash.clone(), self.level_id.clone())
    }

    /// Assign the level id. Returns `false` when nothing changed.
    ///
    /// A `custom_level_` id rewrites the hash to its suffix. Any other id is
    /// stored verbatim and leaves the hash alone. Clearing the level id falls
    /// back to `custom_level_<HASH>` when a hash is present.
    pub fn set_level_id(&mut self, value: Option<&str>) -> bool {
        let new = value.and_then(normalize_level_id);
        if new == self.level_id {
            return false;
        }
        let before = (self.hash.clone(), self.level_id.clone());

        match new {
            Some(level_id) => {
                if let Some(derived) = hash_from_level_id(&level_id) {
                    self.hash = Some(derived);
                }
                self.level_id = Some(level_id);
            }
            None => {
                self.level_id = self.hash.as_deref().map(level_id_from_hash);
            }
        }

        self.refresh_identifiers();
        before != (self.hash.clone(), self.level_id.clone())
    }

    /// Assign the catalog key. Returns `false` when nothing changed.
    pub fn set_key(&mut self, value: Option<&str>) -> bool {
        let new = value.and_then(normalize_key);
        if new == self.key {
            return false;
        }
        self.key = new;
        self.refresh_identifiers();
        true
    }

    pub fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(str::to_string);
    }

    pub fn set_level_author_name(&mut self, mapper: Option<&str>) {
        self.level_author_name = mapper.map(str::to_string);
    }

    fn refresh_identifiers(&mut self) {
        let mut ids = Identifiers::empty();
        ids.set(Identifiers::HASH, self.hash.is_some());
        ids.set(Identifiers::LEVEL_ID, self.level_id.is_some());
        ids.set(Identifiers::KEY, self.key.is_some());
        self.identifiers = ids;
    }
}

impl Song for SongIdentity {
    fn hash(&self) -> Option<&str> {
        SongIdentity::hash(self)
    }

    fn level_id(&self) -> Option<&str> {
        SongIdentity::level_id(self)
    }

    fn key(&self) -> Option<&str> {
        SongIdentity::key(self)
    }

    fn name(&self) -> Option<&str> {
        SongIdentity::name(self)
    }

    fn level_author_name(&self) -> Option<&str> {
        SongIdentity::level_author_name(self)
    }

    fn identifiers(&self) -> Identifiers {
        SongIdentity::identifiers(self)
    }
}
