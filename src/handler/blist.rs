//! Blist playlists: a zip archive holding a `playlist.json` manifest and,
//! optionally, a raw cover image entry named by the manifest's `cover`.
//!
//! Zip needs seekable I/O, so archives are built and read in memory and
//! copied to or from the caller's stream.

use std::io::{Cursor, Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{Manifest, PlaylistHandler, WireSong, json_error, read_error, write_error};
use crate::error::{Error, Result};
use crate::playlist::{Playlist, PlaylistFormat};
use crate::song::Difficulty;

/// Name of the manifest entry inside the archive.
pub const MANIFEST_ENTRY: &str = "playlist.json";

/// Cover entry name used when the playlist has none yet.
pub const DEFAULT_COVER_ENTRY: &str = "cover";

const EXTENSIONS: &[&str] = &["blist"];

/// Handler for `.blist` zip containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlistHandler;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlistManifest {
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
    maps: Vec<BlistMap>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlistMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(rename = "levelID", default, skip_serializing_if = "Option::is_none")]
    level_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    song_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulties: Option<Vec<Difficulty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_data: Option<Map<String, Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<BlistMap> for WireSong {
    fn from(map: BlistMap) -> Self {
        WireSong {
            hash: map.hash,
            level_id: map.level_id,
            key: map.key,
            name: map.song_name,
            level_author_name: map.level_author_name,
            date_added: map.date,
            difficulties: map.difficulties,
            custom_data: map.custom_data,
            extra: map.extra,
        }
    }
}

impl From<WireSong> for BlistMap {
    fn from(song: WireSong) -> Self {
        BlistMap {
            hash: song.hash,
            key: song.key,
            level_id: song.level_id,
            song_name: song.name,
            level_author_name: song.level_author_name,
            date: song.date_added,
            difficulties: song.difficulties,
            custom_data: song.custom_data,
            extra: Map::new(),
        }
    }
}

fn zip_error(e: ZipError) -> Error {
    match e {
        ZipError::Io(io) => read_error(io),
        other => Error::serialization_from("invalid blist archive", other),
    }
}

/// Cover entry name for `playlist`, or `None` when it has no cover bytes.
fn cover_entry(playlist: &Playlist) -> Option<&str> {
    playlist
        .has_cover()
        .then(|| playlist.cover_entry_name().unwrap_or(DEFAULT_COVER_ENTRY))
}

impl BlistHandler {
    fn write_archive(
        &self,
        playlist: &Playlist,
        previous: Option<&[u8]>,
        sink: &mut dyn Write,
    ) -> Result<()> {
        let cover_name = cover_entry(playlist);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        // Entries we don't manage survive a rewrite.
        if let Some(previous) = previous {
            let mut archive = ZipArchive::new(Cursor::new(previous)).map_err(zip_error)?;
            for index in 0..archive.len() {
                let entry = archive.by_index_raw(index).map_err(zip_error)?;
                let name = entry.name();
                if name == MANIFEST_ENTRY || Some(name) == cover_name {
                    continue;
                }
                tracing::debug!(entry = %name, "Carrying over blist entry");
                writer.raw_copy_file(entry).map_err(zip_error)?;
            }
        }

        let manifest = Manifest::from_playlist(playlist);
        let document = BlistManifest {
            title: manifest.title,
            author: manifest.author,
            description: manifest.description,
            cover: cover_name.map(str::to_string),
            custom_data: manifest.custom_data,
            maps: manifest.songs.into_iter().map(BlistMap::from).collect(),
            extra: Map::new(),
        };

        writer
            .start_file(MANIFEST_ENTRY, options)
            .map_err(zip_error)?;
        serde_json::to_writer_pretty(&mut writer, &document).map_err(json_error)?;
        writer.flush().map_err(write_error)?;

        if let (Some(name), Some(bytes)) = (cover_name, playlist.cover_bytes()) {
            writer.start_file(name, options).map_err(zip_error)?;
            writer.write_all(bytes).map_err(write_error)?;
            writer.flush().map_err(write_error)?;
        }

        let archive = writer.finish().map_err(zip_error)?.into_inner();
        sink.write_all(&archive).map_err(write_error)?;
        sink.flush().map_err(write_error)
    }
}

impl PlaylistHandler for BlistHandler {
    fn default_extension(&self) -> &'static str {
        "blist"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn handled_format(&self) -> PlaylistFormat {
        PlaylistFormat::Blist
    }

    fn serialize(&self, playlist: &Playlist, sink: &mut dyn Write) -> Result<()> {
        self.write_archive(playlist, None, sink)
    }

    fn rewrite(
        &self,
        playlist: &Playlist,
        previous: Option<&mut dyn Read>,
        sink: &mut dyn Write,
    ) -> Result<()> {
        let previous = match previous {
            Some(reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).map_err(read_error)?;
                Some(bytes)
            }
            None => None,
        };
        // A previous file that isn't a readable archive has nothing to keep.
        let previous = previous.filter(|bytes| ZipArchive::new(Cursor::new(bytes.as_slice())).is_ok());
        self.write_archive(playlist, previous.as_deref(), sink)
    }

    fn populate(&self, source: &mut dyn Read, playlist: &mut Playlist) -> Result<()> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).map_err(read_error)?;
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

        let document: BlistManifest = {
            let entry = archive.by_name(MANIFEST_ENTRY).map_err(|e| match e {
                ZipError::FileNotFound => {
                    Error::serialization(format!("archive has no {MANIFEST_ENTRY} entry"))
                }
                other => zip_error(other),
            })?;
            serde_json::from_reader(entry).map_err(json_error)?
        };

        let cover = match document.cover.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => match archive.by_name(name) {
                Ok(mut entry) => {
                    let mut cover = Vec::new();
                    entry.read_to_end(&mut cover).map_err(read_error)?;
                    Some((name.to_string(), cover))
                }
                Err(ZipError::FileNotFound) => {
                    tracing::debug!(entry = %name, "Blist cover entry missing");
                    None
                }
                Err(e) => return Err(zip_error(e)),
            },
            None => None,
        };

        let manifest = Manifest {
            title: document.title,
            author: document.author,
            description: document.description,
            custom_data: document.custom_data,
            extra: document.extra,
            songs: document.maps.into_iter().map(WireSong::from).collect(),
        };
        manifest.apply(playlist)?;

        match cover {
            Some((name, bytes)) => {
                playlist.set_cover_entry_name(Some(&name));
                playlist.set_cover(bytes);
            }
            // No explicit cover: leaves room for a derived default one.
            None => playlist.clear_cover(),
        }
        Ok(())
    }
}
