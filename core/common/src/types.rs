//! Common types used throughout Veil.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a folder identifier in characters.
pub const ID_LENGTH: usize = 16;

/// Opaque identifier for a hidden folder.
///
/// A fixed-length alphanumeric string that names both the manifest
/// entry and the storage subdirectory holding the hidden tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FolderId(String);

impl FolderId {
    /// Create a FolderId from a string, validating shape.
    ///
    /// # Errors
    /// - Returns error if the string is not exactly [`ID_LENGTH`]
    ///   ASCII alphanumeric characters
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.len() != ID_LENGTH || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(crate::Error::InvalidInput(format!(
                "folder id must be {} alphanumeric characters",
                ID_LENGTH
            )));
        }
        Ok(Self(id))
    }

    /// Build an id from characters already known to be valid.
    ///
    /// Used by the allocator, which samples from an alphanumeric
    /// distribution and cannot produce an invalid id.
    pub fn from_generated(id: String) -> Self {
        debug_assert!(id.len() == ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric()));
        Self(id)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_id_valid() {
        let id = FolderId::new("aB3dE5fG7hJ9kL1m").unwrap();
        assert_eq!(id.as_str(), "aB3dE5fG7hJ9kL1m");
    }

    #[test]
    fn test_folder_id_wrong_length_fails() {
        assert!(FolderId::new("short").is_err());
        assert!(FolderId::new("aB3dE5fG7hJ9kL1m0").is_err());
    }

    #[test]
    fn test_folder_id_non_alphanumeric_fails() {
        assert!(FolderId::new("aB3dE5fG7hJ9kL1/").is_err());
        assert!(FolderId::new("aB3dE5fG7hJ9kL1.").is_err());
    }

    #[test]
    fn test_folder_id_display() {
        let id = FolderId::new("0123456789abcdef").unwrap();
        assert_eq!(id.to_string(), "0123456789abcdef");
    }
}
