//! On-disk layout of a vault root directory.
//!
//! A vault root contains the encrypted manifest blob, the plain
//! settings file, and the storage area with one subdirectory per
//! hidden folder, named by its identifier.

use std::path::{Path, PathBuf};

use veil_common::FolderId;

/// Filename of the encrypted manifest blob.
pub const MANIFEST_FILENAME: &str = "manifest.vault";

/// Filename of the plain settings file.
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Directory holding the hidden folder trees.
pub const STORAGE_DIRNAME: &str = "hidden";

/// Resolved paths inside a vault root directory.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    /// Create a layout rooted at the given directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The default vault root in the platform data directory.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("veil"))
    }

    /// The vault root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the encrypted manifest blob.
    pub fn manifest_file(&self) -> PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    /// Path of the plain settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILENAME)
    }

    /// Directory holding all hidden folder trees.
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(STORAGE_DIRNAME)
    }

    /// Storage directory of a single hidden folder.
    pub fn folder_dir(&self, id: &FolderId) -> PathBuf {
        self.storage_dir().join(id.as_str())
    }

    /// Whether a path lies inside the vault root.
    ///
    /// Hiding the vault's own storage would recurse the copy into its
    /// destination, so callers reject such paths up front.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}
