//! Authenticated encryption of the manifest.
//!
//! The codec is a pure transformation: canonical JSON bytes wrapped in
//! XChaCha20-Poly1305. Decryption doubles as password verification,
//! since the only way to learn whether a key is right is whether the
//! tag checks out.

use veil_common::{Error, Result};
use veil_crypto::MasterKey;

use crate::manifest::Manifest;

/// Serialize and encrypt a manifest.
///
/// The output blob is self-contained: nonce, ciphertext, and
/// authentication tag.
pub fn seal(manifest: &Manifest, key: &MasterKey) -> Result<Vec<u8>> {
    let plaintext =
        serde_json::to_vec(manifest).map_err(|e| Error::Serialization(e.to_string()))?;
    veil_crypto::encrypt(key.as_bytes(), &plaintext)
}

/// Decrypt and deserialize a manifest blob.
///
/// # Errors
/// Fails with [`Error::Authentication`] whenever the tag check fails
/// (wrong password) or the payload is malformed (corruption). The two
/// causes are reported identically.
pub fn open(blob: &[u8], key: &MasterKey) -> Result<Manifest> {
    let plaintext = veil_crypto::decrypt(key.as_bytes(), blob)?;
    serde_json::from_slice(&plaintext).map_err(|_| Error::Authentication)
}
