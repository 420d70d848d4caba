//! Blister playlists: flat JSON with a `maps` array.
//!
//! Map entries only carry identifiers, so song names and mappers are not
//! stored. Each entry has a `type` naming its primary identifier; it is
//! written for other readers but ignored when reading.

use std::io::{BufReader, Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Manifest, PlaylistHandler, WireSong, into_serialization, json_error, read_error, write_error};
use crate::error::{Error, Result};
use crate::playlist::{Playlist, PlaylistFormat};
use crate::song::{Difficulty, Identifiers};

const EXTENSIONS: &[&str] = &["blister", "blist"];

/// Handler for the Blister flat JSON format.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlisterHandler;

/// Primary identifier of a map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    Hash,
    Key,
    LevelId,
}

impl MapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Hash => "hash",
            MapType::Key => "key",
            MapType::LevelId => "levelID",
        }
    }

    /// Hash first, then level id, then key.
    pub fn for_identifiers(identifiers: Identifiers) -> Option<Self> {
        if identifiers.contains(Identifiers::HASH) {
            Some(MapType::Hash)
        } else if identifiers.contains(Identifiers::LEVEL_ID) {
            Some(MapType::LevelId)
        } else if identifiers.contains(Identifiers::KEY) {
            Some(MapType::Key)
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlisterDocument {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_data: Option<Map<String, Value>>,
    #[serde(default)]
    maps: Vec<BlisterMap>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlisterMap {
    /// Informational; any value is accepted on read.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(rename = "levelID", default, skip_serializing_if = "Option::is_none")]
    level_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulties: Option<Vec<Difficulty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_data: Option<Map<String, Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<BlisterMap> for WireSong {
    fn from(map: BlisterMap) -> Self {
        WireSong {
            hash: map.hash,
            level_id: map.level_id,
            key: map.key,
            date_added: map.date,
            difficulties: map.difficulties,
            custom_data: map.custom_data,
            extra: map.extra,
            ..WireSong::default()
        }
    }
}

impl From<WireSong> for BlisterMap {
    fn from(song: WireSong) -> Self {
        let mut identifiers = Identifiers::empty();
        identifiers.set(Identifiers::HASH, song.hash.is_some());
        identifiers.set(Identifiers::LEVEL_ID, song.level_id.is_some());
        identifiers.set(Identifiers::KEY, song.key.is_some());

        BlisterMap {
            kind: MapType::for_identifiers(identifiers).map(|t| Value::from(t.as_str())),
            hash: song.hash,
            key: song.key,
            level_id: song.level_id,
            date: song.date_added,
            difficulties: song.difficulties,
            custom_data: song.custom_data,
            extra: Map::new(),
        }
    }
}

/// Non-empty check for string fields.
fn check_len(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if v.is_empty() => Err(Error::serialization(format!(
            "blister field '{field}' must not be empty"
        ))),
        _ => Ok(()),
    }
}

fn check_document(document: &BlisterDocument) -> Result<()> {
    check_len("title", Some(&document.title))?;
    check_len("author", document.author.as_deref())?;
    check_len("description", document.description.as_deref())?;
    check_len("cover", document.cover.as_deref())
}

impl PlaylistHandler for BlisterHandler {
    fn default_extension(&self) -> &'static str {
        "blister"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn handled_format(&self) -> PlaylistFormat {
        PlaylistFormat::Blister
    }

    fn serialize(&self, playlist: &Playlist, sink: &mut dyn Write) -> Result<()> {
        let manifest = Manifest::from_playlist(playlist);
        let document = BlisterDocument {
            title: manifest.title,
            author: manifest.author,
            description: manifest.description,
            cover: playlist.cover_base64().map(str::to_string),
            custom_data: manifest.custom_data,
            maps: manifest.songs.into_iter().map(BlisterMap::from).collect(),
            extra: Map::new(),
        };
        check_document(&document)?;

        serde_json::to_writer_pretty(&mut *sink, &document).map_err(json_error)?;
        sink.flush().map_err(write_error)
    }

    fn populate(&self, source: &mut dyn Read, playlist: &mut Playlist) -> Result<()> {
        let document: BlisterDocument =
            serde_json::from_reader(BufReader::new(source)).map_err(|e| {
                if e.is_io() {
                    read_error(e.into())
                } else {
                    json_error(e)
                }
            })?;
        check_document(&document)?;

        let manifest = Manifest {
            title: document.title,
            author: document.author,
            description: document.description,
            custom_data: document.custom_data,
            extra: document.extra,
            songs: document.maps.into_iter().map(WireSong::from).collect(),
        };
        manifest.apply(playlist)?;

        match document.cover.as_deref() {
            Some(cover) => playlist.set_cover_base64(cover).map_err(into_serialization)?,
            None => playlist.clear_cover(),
        }
        Ok(())
    }
}
