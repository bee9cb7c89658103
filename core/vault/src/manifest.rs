//! The catalog of hidden folders.
//!
//! The manifest exists encrypted on disk as a single blob and is
//! decrypted only inside an unlocked session. Entries are keyed by
//! folder identifier in a BTreeMap so the serialized form is
//! deterministic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use veil_common::FolderId;

/// Metadata for one hidden folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Identifier; also the name of the storage subdirectory.
    pub id: FolderId,
    /// Display name (the original folder's base name).
    pub name: String,
    /// Absolute path the folder was hidden from; default restore target.
    pub original_path: PathBuf,
    /// When the folder was hidden.
    pub hidden_at: DateTime<Utc>,
    /// Total size computed at hide time; not recomputed live.
    pub size_bytes: u64,
}

/// Mapping from folder id to its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<FolderId, ManifestEntry>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hidden folders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &FolderId) -> Option<&ManifestEntry> {
        self.entries.get(id)
    }

    /// Insert a new entry, keyed by its id.
    pub fn insert(&mut self, entry: ManifestEntry) {
        debug_assert!(!self.entries.contains_key(&entry.id));
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&mut self, id: &FolderId) -> Option<ManifestEntry> {
        self.entries.remove(id)
    }

    /// Whether any entry is hidden from the given original path.
    ///
    /// No two folders may be hidden from the same location at once.
    pub fn is_path_hidden(&self, path: &Path) -> bool {
        self.entries.values().any(|e| e.original_path == path)
    }

    /// All ids currently in the manifest.
    pub fn ids(&self) -> impl Iterator<Item = &FolderId> {
        self.entries.keys()
    }

    /// Entries ordered by display name, then id for a stable order.
    pub fn entries_by_name(&self) -> Vec<ManifestEntry> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        entries
    }
}

/// Human-readable size, the way the folder list displays it.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= GB {
        format!("{:.1} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.1} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, path: &str) -> ManifestEntry {
        ManifestEntry {
            id: FolderId::new(id).unwrap(),
            name: name.to_string(),
            original_path: PathBuf::from(path),
            hidden_at: Utc::now(),
            size_bytes: 1024,
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let mut manifest = Manifest::new();
        let e = entry("aaaaaaaaaaaaaaaa", "taxes", "/docs/taxes");
        let id = e.id.clone();

        manifest.insert(e.clone());
        assert_eq!(manifest.get(&id), Some(&e));
        assert_eq!(manifest.len(), 1);

        assert_eq!(manifest.remove(&id), Some(e));
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_is_path_hidden() {
        let mut manifest = Manifest::new();
        manifest.insert(entry("aaaaaaaaaaaaaaaa", "taxes", "/docs/taxes"));

        assert!(manifest.is_path_hidden(Path::new("/docs/taxes")));
        assert!(!manifest.is_path_hidden(Path::new("/docs/other")));
    }

    #[test]
    fn test_entries_sorted_by_name() {
        let mut manifest = Manifest::new();
        manifest.insert(entry("bbbbbbbbbbbbbbbb", "zeta", "/z"));
        manifest.insert(entry("cccccccccccccccc", "alpha", "/a"));
        manifest.insert(entry("aaaaaaaaaaaaaaaa", "mid", "/m"));

        let names: Vec<_> = manifest
            .entries_by_name()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let mut a = Manifest::new();
        let mut b = Manifest::new();

        // Insertion order must not affect the encoding.
        let one = entry("aaaaaaaaaaaaaaaa", "one", "/one");
        let two = entry("bbbbbbbbbbbbbbbb", "two", "/two");
        a.insert(one.clone());
        a.insert(two.clone());
        b.insert(two);
        b.insert(one);

        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(10 * 1024), "10.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.0 GB");
    }
}
