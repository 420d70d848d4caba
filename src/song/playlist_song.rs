//! A song as it sits in a playlist: identity plus per-entry metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Identifiers, Song, SongIdentity};
use crate::custom_data::{CustomData, CustomValue};

/// A recommended difficulty for a playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Difficulty {
    /// Beatmap characteristic, e.g. "Standard" or "OneSaber"
    pub characteristic: String,
    /// Difficulty name, e.g. "Expert"
    pub name: String,
}

impl Difficulty {
    pub fn new(characteristic: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            characteristic: characteristic.into(),
            name: name.into(),
        }
    }
}

/// An entry in a playlist.
///
/// `playlist_song_id` identifies the entry itself, so two entries for the
/// same level can still be told apart.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSong {
    identity: SongIdentity,
    date_added: Option<DateTime<Utc>>,
    playlist_song_id: Uuid,
    difficulties: Option<Vec<Difficulty>>,
    custom_data: CustomData,
}

impl PlaylistSong {
    /// Wrap an identity in a new entry with a fresh entry id.
    pub fn new(identity: SongIdentity) -> Self {
        Self {
            identity,
            date_added: None,
            playlist_song_id: Uuid::new_v4(),
            difficulties: None,
            custom_data: CustomData::new(),
        }
    }

    pub fn with_date_added(mut self, date_added: DateTime<Utc>) -> Self {
        self.date_added = Some(date_added);
        self
    }

    pub fn with_difficulties(mut self, difficulties: Vec<Difficulty>) -> Self {
        self.difficulties = Some(difficulties);
        self
    }

    pub fn identity(&self) -> &SongIdentity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut SongIdentity {
        &mut self.identity
    }

    pub fn playlist_song_id(&self) -> Uuid {
        self.playlist_song_id
    }

    pub fn set_hash(&mut self, value: Option<&str>) -> bool {
        self.identity.set_hash(value)
    }

    pub fn set_level_id(&mut self, value: Option<&str>) -> bool {
        self.identity.set_level_id(value)
    }

    pub fn set_key(&mut self, value: Option<&str>) -> bool {
        self.identity.set_key(value)
    }

    pub fn set_name(&mut self, name: Option<&str>) {
        self.identity.set_name(name);
    }

    pub fn set_level_author_name(&mut self, mapper: Option<&str>) {
        self.identity.set_level_author_name(mapper);
    }

    pub fn set_date_added(&mut self, date_added: Option<DateTime<Utc>>) {
        self.date_added = date_added;
    }

    pub fn set_difficulties(&mut self, difficulties: Option<Vec<Difficulty>>) {
        self.difficulties = difficulties;
    }

    /// Append a difficulty, creating the list if needed.
    pub fn add_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulties.get_or_insert_with(Vec::new).push(difficulty);
    }

    pub fn custom_data(&self) -> &CustomData {
        &self.custom_data
    }

    pub fn custom_data_mut(&mut self) -> &mut CustomData {
        &mut self.custom_data
    }

    pub fn set_custom_data(&mut self, key: impl Into<String>, value: impl Into<CustomValue>) {
        self.custom_data.insert(key.into(), value.into());
    }

    /// True if this entry is for the level with `hash` (case-insensitive).
    pub fn has_hash(&self, hash: &str) -> bool {
        self.identity
            .hash()
            .is_some_and(|own| own.eq_ignore_ascii_case(hash))
    }

    /// True if this entry has catalog key `key` (after key normalization).
    pub fn has_key(&self, key: &str) -> bool {
        match (self.identity.key(), super::normalize_key(key)) {
            (Some(own), Some(other)) => own == other,
            _ => false,
        }
    }

    /// Duplicate check used when adding: same hash, or same non-null key.
    pub fn matches(&self, other: &dyn Song) -> bool {
        let same_hash = matches!(
            (self.identity.hash(), other.hash()),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
        );
        same_hash || other.key().is_some_and(|key| self.has_key(key))
    }

    /// Duplicate check used by `remove_duplicates`: same level id, or, when
    /// either level id is missing, same key.
    pub fn same_level(&self, other: &PlaylistSong) -> bool {
        match (self.identity.level_id(), other.identity.level_id()) {
            (Some(a), Some(b)) => a == b,
            _ => matches!(
                (self.identity.key(), other.identity.key()),
                (Some(a), Some(b)) if a == b
            ),
        }
    }
}

impl Song for PlaylistSong {
    fn hash(&self) -> Option<&str> {
        self.identity.hash()
    }

    fn level_id(&self) -> Option<&str> {
        self.identity.level_id()
    }

    fn key(&self) -> Option<&str> {
        self.identity.key()
    }

    fn name(&self) -> Option<&str> {
        self.identity.name()
    }

    fn level_author_name(&self) -> Option<&str> {
        self.identity.level_author_name()
    }

    fn identifiers(&self) -> Identifiers {
        self.identity.identifiers()
    }

    fn date_added(&self) -> Option<DateTime<Utc>> {
        self.date_added
    }

    fn difficulties(&self) -> Option<&[Difficulty]> {
        self.difficulties.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_get_distinct_ids() {
        let a = PlaylistSong::new(SongIdentity::from_hash("ABCD"));
        let b = PlaylistSong::new(SongIdentity::from_hash("ABCD"));
        assert_ne!(a.playlist_song_id(), b.playlist_song_id());
    }

    #[test]
    fn test_matches_by_hash_or_key() {
        let song = PlaylistSong::new(SongIdentity::new(Some("abcd"), None, Some("1a")).unwrap());
        assert!(song.matches(&SongIdentity::from_hash("ABCD")));
        assert!(song.matches(&SongIdentity::from_key("1A")));
        assert!(!song.matches(&SongIdentity::from_hash("FFFF")));
        assert!(!song.matches(&SongIdentity::default()));
    }

    #[test]
    fn test_same_level_prefers_level_id() {
        let a = PlaylistSong::new(SongIdentity::new(Some("AAAA"), None, Some("1")).unwrap());
        let b = PlaylistSong::new(SongIdentity::new(Some("BBBB"), None, Some("1")).unwrap());
        // both have level ids, so keys are ignored
        assert!(!a.same_level(&b));

        let c = PlaylistSong::new(SongIdentity::from_key("1"));
        assert!(a.same_level(&c));
    }

    #[test]
    fn test_add_difficulty_creates_list() {
        let mut song = PlaylistSong::new(SongIdentity::from_key("ff"));
        assert!(Song::difficulties(&song).is_none());
        song.add_difficulty(Difficulty::new("Standard", "Expert"));
        assert_eq!(
            Song::difficulties(&song),
            Some(&[Difficulty::new("Standard", "Expert")][..])
        );
    }
}
