//! Common error types for Veil.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for vault operations.
///
/// Wrong-password and corrupted-blob failures both surface as the
/// single [`Error::Authentication`] variant; callers cannot tell them
/// apart.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrong password, or the manifest blob is corrupted or tampered with.
    #[error("wrong password or corrupted vault data")]
    Authentication,

    /// No hidden folder with the given identifier.
    #[error("no hidden folder with id {0}")]
    NotFound(String),

    /// The folder is already tracked by the vault.
    #[error("folder is already hidden: {}", .0.display())]
    AlreadyHidden(PathBuf),

    /// The restore target is occupied and overwrite was not requested.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// A tree copy failed mid-flight. The partial destination has been
    /// removed and the source is untouched.
    #[error("copy into {} failed; partial copy removed", .dest.display())]
    Copy {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy completed but deleting the source failed. The data now
    /// exists in both locations and the caller must surface that.
    #[error("cleanup of {} failed; data exists in both locations", .retained.display())]
    Cleanup {
        retained: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be persisted after a filesystem mutation
    /// already completed. The catalog on disk is stale.
    #[error("manifest update failed after the filesystem change completed")]
    Persistence(#[source] Box<Error>),

    /// A tree delete failed partway through.
    #[error("delete failed with {removed} entries removed and {remaining} remaining")]
    PartialRemove {
        removed: usize,
        remaining: usize,
        #[source]
        source: std::io::Error,
    },

    /// The operation was cancelled before the point of no return and
    /// rolled back.
    #[error("operation cancelled")]
    Cancelled,

    /// The session is locked; unlock first.
    #[error("vault is locked")]
    Locked,

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic operation failed.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
