//! Cover image state for a playlist.
//!
//! A playlist either has an explicit cover (bytes set by the user or read
//! from a file) or relies on a default cover derived elsewhere from its first
//! few songs. Derivation is not done here; the deriving code hands the bytes
//! back through [`Playlist::set_default_cover`].

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::Playlist;
use crate::error::{Error, Result};

/// Number of leading songs a default cover is built from.
pub const COVER_PREVIEW_SONGS: usize = 4;

#[derive(Debug, Default)]
pub(super) struct CoverState {
    explicit: Option<Vec<u8>>,
    /// Archive entry name for formats that store the cover separately
    entry_name: Option<String>,
    base64: OnceLock<String>,
    default_cover: Option<Vec<u8>>,
    needs_default: bool,
}

/// Strip a `data:image/png;base64,` style prefix.
pub(crate) fn strip_data_uri(value: &str) -> &str {
    match value.find(',') {
        Some(comma) => &value[comma + 1..],
        None => value,
    }
}

impl Playlist {
    /// True if an explicit cover is set.
    pub fn has_cover(&self) -> bool {
        self.cover.explicit.is_some()
    }

    pub fn cover_bytes(&self) -> Option<&[u8]> {
        self.cover.explicit.as_deref()
    }

    /// Reader over the explicit cover.
    pub fn cover_stream(&self) -> Option<Cursor<&[u8]>> {
        self.cover_bytes().map(Cursor::new)
    }

    /// Set the explicit cover; empty bytes clear it.
    ///
    /// Fires `CoverImageChanged` if the bytes actually changed.
    pub fn set_cover(&mut self, bytes: Vec<u8>) {
        let next = if bytes.is_empty() { None } else { Some(bytes) };
        if next == self.cover.explicit {
            return;
        }
        self.cover.explicit = next;
        self.cover.base64.take();
        self.raise_cover_image_changed();
    }

    /// Set the cover from base64 text, with or without a data-URI prefix.
    pub fn set_cover_base64(&mut self, encoded: &str) -> Result<()> {
        let bytes = STANDARD
            .decode(strip_data_uri(encoded.trim()))
            .map_err(|e| Error::argument(format!("cover is not valid base64: {e}")))?;
        self.set_cover(bytes);
        Ok(())
    }

    /// Set the cover from a reader, consuming it to the end.
    pub fn set_cover_from_reader(&mut self, reader: &mut dyn Read) -> Result<()> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.set_cover(bytes);
        Ok(())
    }

    pub fn clear_cover(&mut self) {
        self.set_cover(Vec::new());
    }

    /// Explicit cover as bare base64, computed once and cached.
    pub fn cover_base64(&self) -> Option<&str> {
        let bytes = self.cover.explicit.as_deref()?;
        Some(self.cover.base64.get_or_init(|| STANDARD.encode(bytes)))
    }

    pub fn cover_entry_name(&self) -> Option<&str> {
        self.cover.entry_name.as_deref()
    }

    pub fn set_cover_entry_name(&mut self, name: Option<&str>) {
        self.cover.entry_name = name.filter(|n| !n.is_empty()).map(str::to_string);
    }

    // ========================================================================
    // Default cover
    // ========================================================================

    /// Previously supplied default cover bytes, if any.
    pub fn default_cover(&self) -> Option<&[u8]> {
        self.cover.default_cover.as_deref()
    }

    pub fn default_cover_stream(&self) -> Option<Cursor<&[u8]>> {
        self.default_cover().map(Cursor::new)
    }

    /// True when there is no explicit cover and the default one is missing
    /// or stale.
    pub fn needs_default_cover(&self) -> bool {
        !self.has_cover() && (self.cover.needs_default || self.cover.default_cover.is_none())
    }

    /// Hand over a freshly derived default cover.
    pub fn set_default_cover(&mut self, bytes: Vec<u8>) {
        self.cover.default_cover = (!bytes.is_empty()).then_some(bytes);
        self.cover.needs_default = false;
        if !self.has_cover() {
            self.raise_cover_image_changed();
        }
    }

    /// Hook for cover derivation code: announce that the default cover changed.
    pub fn raise_cover_image_changed_for_default_cover(&mut self) {
        self.cover.base64.take();
        self.raise_cover_image_changed();
    }

    /// Drop the cached default cover after a change to the leading songs.
    pub(crate) fn invalidate_default_cover(&mut self) {
        if self.has_cover() {
            return;
        }
        self.cover.needs_default = true;
        if self.cover.default_cover.take().is_some() {
            self.raise_cover_image_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::PlaylistFormat;
    use crate::test_utils::sample_identity;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cover_counter(playlist: &mut Playlist) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        playlist.on_cover_image_changed(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[test]
    fn test_set_cover_fires_only_on_change() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Cover");
        let hits = cover_counter(&mut playlist);

        playlist.set_cover(vec![1, 2, 3]);
        playlist.set_cover(vec![1, 2, 3]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(playlist.has_cover());

        playlist.clear_cover();
        assert!(!playlist.has_cover());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_base64_strips_data_uri_prefix() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Cover");
        playlist
            .set_cover_base64("data:image/png;base64,AQID")
            .unwrap();
        assert_eq!(playlist.cover_bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(playlist.cover_base64(), Some("AQID"));

        assert!(matches!(
            playlist.set_cover_base64("not base64!"),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_base64_cache_resets_with_cover() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Cover");
        playlist.set_cover(vec![1, 2, 3]);
        assert_eq!(playlist.cover_base64(), Some("AQID"));
        playlist.set_cover(vec![4, 5, 6]);
        assert_eq!(playlist.cover_base64(), Some("BAUG"));
    }

    #[test]
    fn test_cover_from_reader() {
        let mut playlist = Playlist::new(PlaylistFormat::Blist, "Cover");
        let mut reader = Cursor::new(vec![9u8; 16]);
        playlist.set_cover_from_reader(&mut reader).unwrap();
        assert_eq!(playlist.cover_bytes().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn test_leading_mutation_drops_default_cover() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Default");
        for n in 0..6 {
            playlist.add(&sample_identity(n)).unwrap();
        }
        playlist.set_default_cover(vec![7, 7, 7]);
        assert!(!playlist.needs_default_cover());
        let hits = cover_counter(&mut playlist);

        // position 5 is outside the preview window
        playlist.remove_at(5).unwrap();
        assert_eq!(playlist.default_cover(), Some(&[7u8, 7, 7][..]));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        playlist.remove_at(0).unwrap();
        assert!(playlist.default_cover().is_none());
        assert!(playlist.needs_default_cover());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // nothing cached any more: no second event
        playlist.sort();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_cover_is_not_invalidated() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Explicit");
        playlist.set_cover(vec![1]);
        let hits = cover_counter(&mut playlist);

        playlist.add(&sample_identity(1)).unwrap();
        assert!(!playlist.needs_default_cover());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_cover_hook_fires() {
        let mut playlist = Playlist::new(PlaylistFormat::Legacy, "Hook");
        let hits = cover_counter(&mut playlist);
        playlist.raise_cover_image_changed_for_default_cover();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_derived_default_cover_fills_empty_cover() {
        let mut playlist = Playlist::new(PlaylistFormat::Blist, "Covers");
        playlist.add(&sample_identity(1)).unwrap();
        let hits = cover_counter(&mut playlist);
        assert!(playlist.needs_default_cover());
        assert!(playlist.default_cover().is_none());

        playlist.set_default_cover(vec![7, 8, 9]);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(playlist.default_cover(), Some(&[7u8, 8, 9][..]));
        assert!(!playlist.needs_default_cover());
        assert!(!playlist.has_cover());
    }

    #[test]
    fn test_default_cover_is_silent_behind_explicit_cover() {
        let mut playlist = Playlist::new(PlaylistFormat::Blist, "Covers");
        playlist.set_cover(vec![1]);
        let hits = cover_counter(&mut playlist);

        playlist.set_default_cover(vec![7, 8, 9]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(playlist.cover_bytes(), Some(&[1u8][..]));
    }
}
