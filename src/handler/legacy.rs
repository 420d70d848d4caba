//! Legacy `.bplist` playlists: one flat JSON object with a `songs` array
//! and the cover inline as base64 under `image`.

use std::io::{BufReader, Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Manifest, PlaylistHandler, WireSong, into_serialization, json_error, read_error, write_error};
use crate::error::Result;
use crate::playlist::{Playlist, PlaylistFormat};
use crate::song::Difficulty;

const EXTENSIONS: &[&str] = &["bplist", "json"];

/// Handler for the legacy flat JSON format.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyHandler;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDocument {
    playlist_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    playlist_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    playlist_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default)]
    songs: Vec<LegacySong>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_data: Option<Map<String, Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySong {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    song_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(rename = "levelid", default, skip_serializing_if = "Option::is_none")]
    level_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulties: Option<Vec<Difficulty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_data: Option<Map<String, Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<LegacySong> for WireSong {
    fn from(song: LegacySong) -> Self {
        WireSong {
            hash: song.hash,
            level_id: song.level_id,
            key: song.key,
            name: song.song_name,
            level_author_name: song.level_author_name,
            date_added: song.date_added,
            difficulties: song.difficulties,
            custom_data: song.custom_data,
            extra: song.extra,
        }
    }
}

impl From<WireSong> for LegacySong {
    fn from(song: WireSong) -> Self {
        LegacySong {
            song_name: song.name,
            level_author_name: song.level_author_name,
            key: song.key,
            hash: song.hash,
            level_id: song.level_id,
            date_added: song.date_added,
            difficulties: song.difficulties,
            custom_data: song.custom_data,
            extra: song.extra,
        }
    }
}

impl PlaylistHandler for LegacyHandler {
    fn default_extension(&self) -> &'static str {
        "bplist"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn handled_format(&self) -> PlaylistFormat {
        PlaylistFormat::Legacy
    }

    fn serialize(&self, playlist: &Playlist, sink: &mut dyn Write) -> Result<()> {
        let manifest = Manifest::from_playlist(playlist);
        let document = LegacyDocument {
            playlist_title: manifest.title,
            playlist_author: manifest.author,
            playlist_description: manifest.description,
            image: playlist.cover_base64().map(str::to_string),
            songs: manifest.songs.into_iter().map(LegacySong::from).collect(),
            custom_data: manifest.custom_data,
            extra: Map::new(),
        };

        serde_json::to_writer_pretty(&mut *sink, &document).map_err(json_error)?;
        sink.flush().map_err(write_error)
    }

    fn populate(&self, source: &mut dyn Read, playlist: &mut Playlist) -> Result<()> {
        let document: LegacyDocument =
            serde_json::from_reader(BufReader::new(source)).map_err(|e| {
                if e.is_io() {
                    read_error(e.into())
                } else {
                    json_error(e)
                }
            })?;

        let manifest = Manifest {
            title: document.playlist_title,
            author: document.playlist_author,
            description: document.playlist_description,
            custom_data: document.custom_data,
            extra: document.extra,
            songs: document.songs.into_iter().map(WireSong::from).collect(),
        };
        manifest.apply(playlist)?;

        match document.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => {
                playlist.set_cover_base64(image).map_err(into_serialization)?
            }
            _ => playlist.clear_cover(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Song;
    use crate::test_utils::sample_playlist;
    use serde_json::json;

    fn roundtrip(playlist: &Playlist) -> Playlist {
        let mut out: Vec<u8> = Vec::new();
        LegacyHandler.serialize(playlist, &mut out).unwrap();
        LegacyHandler.deserialize(&mut out.as_slice()).unwrap()
    }

    #[test]
    fn test_roundtrip_keeps_metadata_and_songs() {
        let mut playlist = sample_playlist(PlaylistFormat::Legacy, 3);
        playlist.set_cover(vec![1, 2, 3]);
        playlist.set_read_only(true);

        let copy = roundtrip(&playlist);
        assert_eq!(copy.title(), playlist.title());
        assert_eq!(copy.author(), playlist.author());
        assert_eq!(copy.description(), playlist.description());
        assert_eq!(copy.cover_bytes(), Some(&[1u8, 2, 3][..]));
        assert!(copy.read_only());
        assert_eq!(copy.len(), 3);
        for (a, b) in copy.songs().iter().zip(playlist.songs()) {
            assert_eq!(a.identity(), b.identity());
            assert_eq!(a.date_added(), b.date_added());
        }
    }

    #[test]
    fn test_reads_external_field_names() {
        let text = json!({
            "playlistTitle": "Old",
            "playlistAuthor": "Someone",
            "image": "data:image/png;base64,AQID",
            "syncURL": "https://example.com/old.bplist",
            "songs": [
                {"songName": "One", "levelAuthorName": "Mapper", "key": "1a2b",
                 "hash": "abcdef", "dateAdded": "2021-03-04T05:06:07Z",
                 "difficulties": [{"characteristic": "Standard", "name": "Expert"}],
                 "uploader": "someone"}
            ]
        })
        .to_string();

        let playlist = LegacyHandler.deserialize(&mut text.as_bytes()).unwrap();
        assert_eq!(playlist.format(), PlaylistFormat::Legacy);
        assert_eq!(playlist.author(), Some("Someone"));
        assert_eq!(playlist.cover_bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(
            playlist.try_get_custom_data("syncURL").and_then(|v| v.as_str()),
            Some("https://example.com/old.bplist")
        );

        let song = playlist.get(0).unwrap();
        assert_eq!(song.hash(), Some("ABCDEF"));
        assert_eq!(song.level_id(), Some("custom_level_ABCDEF"));
        assert_eq!(song.key(), Some("1A2B"));
        assert_eq!(song.name(), Some("One"));
        assert_eq!(song.difficulties().map(<[Difficulty]>::len), Some(1));
        assert!(song.custom_data().contains_key("uploader"));
    }

    #[test]
    fn test_writes_external_field_names() {
        let playlist = sample_playlist(PlaylistFormat::Legacy, 1);
        let mut out: Vec<u8> = Vec::new();
        LegacyHandler.serialize(&playlist, &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["playlistTitle"], "Sample Playlist");
        assert!(value.get("image").is_none());
        assert!(value.get("customData").is_none());
        let song = &value["songs"][0];
        assert!(song["levelid"].as_str().unwrap().starts_with("custom_level_"));
        assert_eq!(song["songName"], "Song 0");
    }

    #[test]
    fn test_missing_title_fails() {
        let text = r#"{"songs": []}"#;
        let err = LegacyHandler.deserialize(&mut text.as_bytes()).unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn test_bad_image_fails_as_serialization() {
        let text = r#"{"playlistTitle": "x", "image": "***"}"#;
        let err = LegacyHandler.deserialize(&mut text.as_bytes()).unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn test_truncated_json_fails() {
        let text = r#"{"playlistTitle": "x", "songs": ["#;
        let err = LegacyHandler.deserialize(&mut text.as_bytes()).unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let text = json!({
            "playlistTitle": "Synced",
            "syncURL": "https://example.com/synced.bplist",
            "songs": [{"hash": "abcd", "uploader": "someone"}]
        })
        .to_string();

        let loaded = LegacyHandler.deserialize(&mut text.as_bytes()).unwrap();
        let copy = roundtrip(&loaded);
        assert_eq!(
            copy.try_get_custom_data("syncURL").and_then(|v| v.as_str()),
            Some("https://example.com/synced.bplist")
        );
        let song = copy.get(0).unwrap();
        assert_eq!(song.custom_data().get("uploader").and_then(|v| v.as_str()), Some("someone"));
    }

    #[test]
    fn test_inconsistent_entry_does_not_reject_file() {
        let text = json!({
            "playlistTitle": "Stale",
            "songs": [
                {"hash": "AAAA"},
                {"hash": "BBBB", "levelid": "custom_level_CCCC"},
                {"key": "1f"}
            ]
        })
        .to_string();

        let playlist = LegacyHandler.deserialize(&mut text.as_bytes()).unwrap();
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.get(0).unwrap().hash(), Some("AAAA"));
        let stale = playlist.get(1).unwrap();
        assert_eq!(stale.hash(), Some("CCCC"));
        assert_eq!(stale.level_id(), Some("custom_level_CCCC"));
        assert_eq!(playlist.get(2).unwrap().key(), Some("1F"));
    }
}
