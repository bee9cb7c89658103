//! Persistence of the encrypted manifest blob.
//!
//! The blob file is a plaintext header (magic, format version, key
//! derivation salt and parameters) followed by the authenticated
//! ciphertext of the manifest. Saves go through a temporary file in
//! the same directory and an atomic rename, so a crash mid-save never
//! leaves a half-written manifest behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use veil_common::{Error, Result};
use veil_crypto::{KdfParams, Salt, SALT_LENGTH};

/// File magic at the start of every manifest blob.
const MAGIC: &[u8; 4] = b"VEIL";

/// Current blob format version.
const FORMAT_VERSION: u16 = 1;

/// Encoded header length: magic + version + salt + three KDF words.
const HEADER_LEN: usize = 4 + 2 + SALT_LENGTH + 12;

/// Plaintext prefix of the manifest blob.
///
/// Carries everything needed to re-derive the master key from a
/// password. The salt is generated per installation, so identical
/// passwords on different machines derive different keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub salt: Salt,
    pub kdf: KdfParams,
}

impl BlobHeader {
    /// Create a header with a freshly generated salt.
    pub fn generate(kdf: KdfParams) -> Self {
        Self {
            salt: Salt::generate(),
            kdf,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(self.salt.as_bytes());
        buf.extend_from_slice(&self.kdf.memory_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf.time_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf
    }

    /// Decode a header from the start of a blob file.
    ///
    /// Any malformation is reported as [`Error::Authentication`]; a
    /// corrupted header and a wrong password look the same to the
    /// caller.
    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(Error::Authentication);
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(Error::Authentication);
        }

        let mut salt = [0u8; SALT_LENGTH];
        salt.copy_from_slice(&bytes[6..6 + SALT_LENGTH]);

        let words = &bytes[6 + SALT_LENGTH..HEADER_LEN];
        let word = |i: usize| {
            u32::from_le_bytes([words[i * 4], words[i * 4 + 1], words[i * 4 + 2], words[i * 4 + 3]])
        };

        Ok(Self {
            salt: Salt::from_bytes(salt),
            kdf: KdfParams {
                memory_cost: word(0),
                time_cost: word(1),
                parallelism: word(2),
            },
        })
    }
}

/// Store for the encrypted manifest blob file.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    /// Create a store for the blob at the given path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the blob file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a manifest blob is present on disk.
    ///
    /// Distinguishes a first run from a normal run.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the blob file with its first payload.
    ///
    /// Creates the parent directory if missing. An unwritable storage
    /// directory is the one condition the vault treats as fatal at
    /// startup.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] if a blob already exists
    /// - [`Error::Io`] if the directory or file cannot be created
    pub fn initialize(&self, header: &BlobHeader, payload: &[u8]) -> Result<()> {
        if self.exists() {
            return Err(Error::InvalidInput(
                "vault is already initialized".to_string(),
            ));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        self.save(header, payload)?;
        debug!(path = %self.path.display(), "manifest blob created");
        Ok(())
    }

    /// Load the header and encrypted payload from disk.
    ///
    /// # Errors
    /// - [`Error::Io`] if the file is unreadable
    /// - [`Error::Authentication`] if the header is malformed
    pub fn load(&self) -> Result<(BlobHeader, Vec<u8>)> {
        let bytes = fs::read(&self.path)?;
        let header = BlobHeader::decode(&bytes)?;
        Ok((header, bytes[HEADER_LEN..].to_vec()))
    }

    /// Write the blob crash-safely.
    ///
    /// The full file is written to a sibling temporary file, flushed,
    /// and renamed over the previous blob. A crash between write and
    /// rename leaves the old version fully intact.
    pub fn save(&self, header: &BlobHeader, payload: &[u8]) -> Result<()> {
        let mut bytes = header.encode();
        bytes.extend_from_slice(payload);
        atomic_write(&self.path, &bytes)?;
        debug!(path = %self.path.display(), len = bytes.len(), "manifest blob saved");
        Ok(())
    }
}

/// Write a file atomically via a sibling temp file and rename.
///
/// The temp file lives in the same directory as the target, so the
/// rename cannot cross filesystems.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let mut tmp_name = name.to_os_string();
            tmp_name.push(".tmp");
            parent.join(tmp_name)
        }
        _ => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ))
        }
    };

    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)
}
