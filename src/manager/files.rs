//! Crash-safe playlist file I/O and directory discovery.
//!
//! # Write
//!
//! An existing `<path>` is renamed to `<path>.bak` before the new content is
//! written. The backup is deleted only after the new file has been flushed
//! and synced, so a failed or interrupted write leaves it as a recovery copy.
//!
//! # Read
//!
//! Before every read, a `<path>.bak` next to `<path>` wins: `<path>` is
//! deleted and the backup renamed back. This runs unconditionally, not only
//! after a detected failure.
//!
//! # Discovery
//!
//! Lookups by name match the file stem case-insensitively. When several
//! files share a stem (`a.bplist` and `A.blist`, or the same name in two
//! subdirectories), the first one the directory walk yields is used. That
//! order is whatever the file system returns and is not guaranteed to be
//! stable across platforms or runs.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result, ResultExt};

/// Suffix appended to a playlist path for its backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

/// `<path>.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Restore `<path>.bak` over `<path>` if a backup exists.
///
/// Returns `true` if a backup was restored.
pub fn recover_backup(path: &Path) -> Result<bool> {
    let backup = backup_path(path);
    if !backup.is_file() {
        return Ok(false);
    }

    if path.exists() {
        fs::remove_file(path)?;
    }
    fs::rename(&backup, path)
        .with_context(format!("restoring {}", backup.display()))?;
    tracing::warn!(path = %path.display(), "Restored playlist from backup");
    Ok(true)
}

/// Open `path` for reading after running backup recovery.
pub fn read_playlist_file<T, F>(path: &Path, read: F) -> Result<T>
where
    F: FnOnce(&mut dyn Read) -> Result<T>,
{
    recover_backup(path)?;
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(path),
        _ => Error::Io(e),
    })?;
    let mut reader = BufReader::new(file);
    read(&mut reader)
}

/// Write `path` with the backup protocol.
///
/// `write` gets the previous content (from the backup) when there was one,
/// and the sink for the new content.
pub fn write_playlist_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(Option<&mut dyn Read>, &mut dyn Write) -> Result<()>,
{
    // A backup left by an earlier crash is the last good copy.
    recover_backup(path)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(format!("creating {}", parent.display()))?;
    }

    let backup = backup_path(path);
    let had_previous = path.is_file();
    if had_previous {
        fs::rename(path, &backup)
            .with_context(format!("backing up {}", path.display()))?;
    }

    match write_new(path, had_previous.then_some(backup.as_path()), write) {
        Ok(()) => {
            if had_previous {
                fs::remove_file(&backup)?;
            }
            Ok(())
        }
        Err(e) => {
            if had_previous {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Playlist write failed, backup kept"
                );
            } else {
                // Nothing to recover; don't leave a half-written file behind.
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                    Err(cleanup) => tracing::warn!(
                        path = %path.display(),
                        error = %cleanup,
                        "Could not remove partially written playlist"
                    ),
                }
            }
            Err(e)
        }
    }
}

fn write_new<F>(path: &Path, previous: Option<&Path>, write: F) -> Result<()>
where
    F: FnOnce(Option<&mut dyn Read>, &mut dyn Write) -> Result<()>,
{
    let mut previous = match previous {
        Some(p) => Some(BufReader::new(File::open(p)?)),
        None => None,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    write(
        previous.as_mut().map(|r| r as &mut dyn Read),
        &mut writer,
    )?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Every file under `root` that could be a playlist, with backups mapped to
/// the path they protect.
///
/// A `<name>.<ext>.bak` is reported as `<name>.<ext>` when that file is
/// missing, since reading it will restore the backup.
pub fn playlist_files(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(root).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let candidate = match strip_backup_suffix(path) {
            Some(original) if original.exists() => continue,
            Some(original) => original,
            None => path.to_path_buf(),
        };
        if !files.contains(&candidate) {
            files.push(candidate);
        }
    }
    files
}

/// First file under `root` whose stem equals `filename`, ignoring case.
///
/// See the module docs for how ties are resolved.
pub fn find_playlist_file(root: &Path, filename: &str, recursive: bool) -> Option<PathBuf> {
    let wanted = filename.to_uppercase();
    playlist_files(root, recursive)
        .into_iter()
        .find(|path| file_stem_upper(path).is_some_and(|stem| stem == wanted))
}

/// Upper-cased file name without extension.
pub fn file_stem_upper(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_uppercase)
}

fn strip_backup_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let cut = name.len().checked_sub(BACKUP_SUFFIX.len())?;
    if cut == 0 || !name.is_char_boundary(cut) || !name[cut..].eq_ignore_ascii_case(BACKUP_SUFFIX) {
        return None;
    }
    Some(path.with_file_name(&name[..cut]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_text(path: &Path, text: &'static str) -> Result<()> {
        write_playlist_file(path, |_, sink| {
            sink.write_all(text.as_bytes())?;
            Ok(())
        })
    }

    fn read_text(path: &Path) -> String {
        read_playlist_file(path, |source| {
            let mut text = String::new();
            source.read_to_string(&mut text)?;
            Ok(text)
        })
        .unwrap()
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/p/list.bplist")),
            PathBuf::from("/p/list.bplist.bak")
        );
    }

    #[test]
    fn test_write_replaces_and_removes_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.bplist");

        write_text(&path, "one").unwrap();
        write_text(&path, "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_failed_write_keeps_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.bplist");
        write_text(&path, "good").unwrap();

        let result = write_playlist_file(&path, |previous, sink| {
            let mut old = String::new();
            previous.unwrap().read_to_string(&mut old)?;
            assert_eq!(old, "good");
            sink.write_all(b"partial")?;
            Err(Error::serialization("boom"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "good");

        // reading treats the backup as authoritative
        assert_eq!(read_text(&path), "good");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_failed_first_write_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.bplist");

        let result = write_playlist_file(&path, |previous, sink| {
            assert!(previous.is_none());
            sink.write_all(b"partial")?;
            Err(Error::serialization("boom"))
        });
        assert!(result.unwrap_err().is_serialization());
        assert!(!path.exists());
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_read_recovers_over_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.bplist");
        fs::write(&path, "{ corrupt").unwrap();
        fs::write(backup_path(&path), "valid").unwrap();

        assert_eq!(read_text(&path), "valid");
        assert_eq!(fs::read_to_string(&path).unwrap(), "valid");
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let result = read_playlist_file(&dir.path().join("nope.bplist"), |_| Ok(()));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_find_is_case_insensitive_and_sees_backups() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Favorites.bplist"), "x").unwrap();
        fs::write(dir.path().join("orphan.blist.bak"), "x").unwrap();
        fs::write(dir.path().join("kept.json"), "x").unwrap();
        fs::write(dir.path().join("kept.json.bak"), "x").unwrap();

        assert_eq!(
            find_playlist_file(dir.path(), "FAVORITES", false),
            Some(dir.path().join("Favorites.bplist"))
        );
        assert_eq!(
            find_playlist_file(dir.path(), "orphan", false),
            Some(dir.path().join("orphan.blist"))
        );

        let files = playlist_files(dir.path(), false);
        assert_eq!(files.len(), 3);
        assert!(files.contains(&dir.path().join("kept.json")));
    }

    #[test]
    fn test_recursive_flag_controls_depth() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.bplist"), "x").unwrap();

        assert!(find_playlist_file(dir.path(), "deep", false).is_none());
        assert!(find_playlist_file(dir.path(), "deep", true).is_some());
    }
}
