//! Directory tree operations with rollback.
//!
//! Every operation is all-or-nothing from the caller's perspective:
//! a copy that fails or is cancelled mid-flight removes the partial
//! destination and leaves the source untouched. Deleting the source
//! only starts once the copy has fully completed; from that point the
//! operation runs to its end and cancellation has no effect.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use veil_common::{Error, Result};

/// Result of a completed tree move.
///
/// The copy phase succeeded in full; `cleanup` records whether the
/// follow-up delete of the source also succeeded. A `Some` value means
/// the data now exists in both locations and the caller must surface
/// that distinctly instead of discarding it.
#[derive(Debug)]
pub struct MoveOutcome {
    /// Total bytes in the copied tree.
    pub bytes: u64,
    /// Error from the source-delete step, if it failed.
    pub cleanup: Option<io::Error>,
}

/// Copy a directory tree and return the number of bytes copied.
///
/// Iterative walk so the loop can poll the cancellation token between
/// entries. Returns raw `Io`/`Cancelled` errors; callers wrap them
/// with rollback.
fn copy_tree(source: &Path, dest: &Path, cancel: &CancellationToken) -> Result<u64> {
    let mut bytes = 0u64;
    let mut stack = vec![(source.to_path_buf(), dest.to_path_buf())];

    while let Some((src_dir, dst_dir)) = stack.pop() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        fs::create_dir(&dst_dir)?;

        for entry in fs::read_dir(&src_dir)? {
            let entry = entry?;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let src = entry.path();
            let dst = dst_dir.join(entry.file_name());

            if entry.file_type()?.is_dir() {
                stack.push((src, dst));
            } else {
                bytes += fs::copy(&src, &dst)?;
            }
        }
    }

    Ok(bytes)
}

/// Copy a tree, removing the partial destination on failure.
///
/// The source is never modified here. An I/O failure maps to
/// [`Error::Copy`]; cancellation rolls back the same way and surfaces
/// as [`Error::Cancelled`].
fn copy_with_rollback(source: &Path, dest: &Path, cancel: &CancellationToken) -> Result<u64> {
    match copy_tree(source, dest, cancel) {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            if dest.exists() {
                if let Err(cleanup) = fs::remove_dir_all(dest) {
                    warn!(
                        dest = %dest.display(),
                        error = %cleanup,
                        "failed to remove partial copy"
                    );
                }
            }
            match err {
                Error::Cancelled => Err(Error::Cancelled),
                Error::Io(source_err) => Err(Error::Copy {
                    dest: dest.to_path_buf(),
                    source: source_err,
                }),
                other => Err(other),
            }
        }
    }
}

/// Hide a folder: copy `source` into `dest`, then delete `source`.
///
/// # Errors
/// - [`Error::InvalidInput`] if `source` is not a directory
/// - [`Error::Copy`] if the copy fails (destination rolled back,
///   source untouched)
/// - [`Error::Cancelled`] if cancelled during the copy (same rollback)
///
/// A failure of the source-delete step is not an error here: the copy
/// is complete and canonical at `dest`, so it is reported through
/// [`MoveOutcome::cleanup`] instead.
pub fn hide_tree(source: &Path, dest: &Path, cancel: &CancellationToken) -> Result<MoveOutcome> {
    if !source.is_dir() {
        return Err(Error::InvalidInput(format!(
            "not a directory: {}",
            source.display()
        )));
    }

    let bytes = copy_with_rollback(source, dest, cancel)?;

    // Past this point the operation completes or fails, never rolls back.
    let cleanup = fs::remove_dir_all(source).err();

    debug!(source = %source.display(), bytes, "folder tree hidden");
    Ok(MoveOutcome { bytes, cleanup })
}

/// Unhide a folder: copy `hidden` to `dest`, then delete `hidden`.
///
/// # Errors
/// - [`Error::DestinationExists`] if `dest` exists and `overwrite` is
///   false; nothing is touched
/// - [`Error::Copy`] / [`Error::Cancelled`] with the rollback
///   discipline of [`hide_tree`]
///
/// As with [`hide_tree`], a failed delete of the hidden copy is
/// reported through [`MoveOutcome::cleanup`].
pub fn unhide_tree(
    hidden: &Path,
    dest: &Path,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<MoveOutcome> {
    if dest.exists() {
        if !overwrite {
            return Err(Error::DestinationExists(dest.to_path_buf()));
        }
        remove_tree(dest)?;
    }

    let bytes = copy_with_rollback(hidden, dest, cancel)?;

    let cleanup = fs::remove_dir_all(hidden).err();

    debug!(dest = %dest.display(), "folder tree unhidden");
    Ok(MoveOutcome { bytes, cleanup })
}

/// Irreversibly delete a directory tree.
///
/// Files are removed one at a time so a failure can report progress:
/// [`Error::PartialRemove`] carries how many entries were removed and
/// how many remain.
pub fn remove_tree(path: &Path) -> Result<()> {
    let files = collect_files(path)?;
    let total = files.len();
    let mut removed = 0usize;

    for file in &files {
        if let Err(e) = fs::remove_file(file) {
            return Err(Error::PartialRemove {
                removed,
                remaining: total - removed,
                source: e,
            });
        }
        removed += 1;
    }

    // Only the directory skeleton remains.
    fs::remove_dir_all(path)?;

    debug!(path = %path.display(), files = total, "folder tree removed");
    Ok(())
}

/// Restore a hidden folder to `dest`, preferring an atomic rename.
///
/// A rename cannot cross volumes; when the OS reports that, fall back
/// to the copy-then-delete sequence with its usual rollback.
pub fn restore_tree(hidden: &Path, dest: &Path, cancel: &CancellationToken) -> Result<MoveOutcome> {
    match fs::rename(hidden, dest) {
        Ok(()) => {
            debug!(dest = %dest.display(), "folder tree restored by rename");
            Ok(MoveOutcome {
                bytes: 0,
                cleanup: None,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(dest = %dest.display(), "cross-volume restore, copying");
            let bytes = copy_with_rollback(hidden, dest, cancel)?;
            let cleanup = fs::remove_dir_all(hidden).err();
            Ok(MoveOutcome { bytes, cleanup })
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// All non-directory entries under `path`, depth-first.
fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![path.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                stack.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Lay down a small tree: two files at the root, one nested.
    fn build_tree(root: &Path) -> u64 {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("b.txt"), b"bravo!").unwrap();
        fs::write(root.join("sub/c.txt"), b"charlie").unwrap();
        (5 + 6 + 7) as u64
    }

    fn read_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        for rel in ["a.txt", "b.txt", "sub/c.txt"] {
            out.push((rel.to_string(), fs::read(root.join(rel)).unwrap()));
        }
        out
    }

    #[test]
    fn test_hide_moves_tree_and_reports_size() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        let dest = temp.path().join("stash");
        let expected = build_tree(&source);
        let original = read_tree(&source);

        let outcome = hide_tree(&source, &dest, &CancellationToken::new()).unwrap();

        assert_eq!(outcome.bytes, expected);
        assert!(outcome.cleanup.is_none());
        assert!(!source.exists());
        assert_eq!(read_tree(&dest), original);
    }

    #[test]
    fn test_hide_non_directory_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, b"data").unwrap();

        let result = hide_tree(&file, &temp.path().join("dest"), &CancellationToken::new());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_cancelled_copy_rolls_back() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        let dest = temp.path().join("stash");
        build_tree(&source);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = hide_tree(&source, &dest, &cancel);

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!dest.exists());
        assert!(source.join("sub/c.txt").exists());
    }

    #[test]
    fn test_unhide_roundtrip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        let stash = temp.path().join("stash");
        build_tree(&source);
        let original = read_tree(&source);

        hide_tree(&source, &stash, &CancellationToken::new()).unwrap();
        let outcome = unhide_tree(&stash, &source, false, &CancellationToken::new()).unwrap();

        assert!(outcome.cleanup.is_none());
        assert!(!stash.exists());
        assert_eq!(read_tree(&source), original);
    }

    #[test]
    fn test_unhide_occupied_destination_fails_untouched() {
        let temp = TempDir::new().unwrap();
        let hidden = temp.path().join("hidden");
        let dest = temp.path().join("docs");
        build_tree(&hidden);
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep.txt"), b"keep me").unwrap();

        let result = unhide_tree(&hidden, &dest, false, &CancellationToken::new());

        assert!(matches!(result, Err(Error::DestinationExists(_))));
        assert!(hidden.join("a.txt").exists());
        assert_eq!(fs::read(dest.join("keep.txt")).unwrap(), b"keep me");
    }

    #[test]
    fn test_unhide_overwrite_replaces_destination() {
        let temp = TempDir::new().unwrap();
        let hidden = temp.path().join("hidden");
        let dest = temp.path().join("docs");
        build_tree(&hidden);
        let expected = read_tree(&hidden);
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("stale.txt"), b"stale").unwrap();

        unhide_tree(&hidden, &dest, true, &CancellationToken::new()).unwrap();

        assert!(!hidden.exists());
        assert!(!dest.join("stale.txt").exists());
        assert_eq!(read_tree(&dest), expected);
    }

    #[test]
    fn test_remove_tree() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("doomed");
        build_tree(&target);

        remove_tree(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_restore_same_volume_renames() {
        let temp = TempDir::new().unwrap();
        let hidden = temp.path().join("hidden");
        let dest = temp.path().join("docs");
        build_tree(&hidden);
        let original = read_tree(&hidden);

        restore_tree(&hidden, &dest, &CancellationToken::new()).unwrap();

        assert!(!hidden.exists());
        assert_eq!(read_tree(&dest), original);
    }
}
