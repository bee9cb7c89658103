//! Vault session management.
//!
//! A session starts locked, becomes unlocked only when a derived key
//! decrypts the manifest blob, and holds the decrypted manifest and
//! master key for exactly as long as it stays unlocked. All mutating
//! operations run under one write lock, from validation through
//! persistence, so no caller ever observes a half-updated manifest.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroizing;

use veil_common::{Error, FolderId, Result};
use veil_crypto::{derive_key, KdfParams, MasterKey, Salt};
use veil_storage::{mover, BlobHeader, ManifestStore, VaultLayout};

use crate::codec;
use crate::ident;
use crate::manifest::{Manifest, ManifestEntry};

/// Minimum master password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Observable state of the vault session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No key material in memory.
    Locked,
    /// An unlock attempt (key derivation + decrypt) is in flight.
    Unlocking,
    /// Manifest resident, operations available.
    Unlocked,
}

/// State held only while the session is unlocked.
struct Unlocked {
    key: MasterKey,
    header: BlobHeader,
    manifest: Manifest,
    /// Every id issued while unlocked, including ids whose entries
    /// were later removed. Ids are never reused within a session run,
    /// so a stale on-disk directory cannot be resurrected.
    issued: BTreeSet<FolderId>,
}

enum Inner {
    Locked,
    Unlocking,
    Unlocked(Box<Unlocked>),
}

/// Process-local handle to the vault.
///
/// Collaborators (file browser, viewers, the CLI) hold a shared
/// reference and go through these methods; nothing else touches the
/// manifest blob or the keys.
pub struct VaultSession {
    layout: VaultLayout,
    store: ManifestStore,
    inner: RwLock<Inner>,
}

impl VaultSession {
    /// Create a locked session over the given vault layout.
    pub fn new(layout: VaultLayout) -> Self {
        let store = ManifestStore::new(layout.manifest_file());
        Self {
            layout,
            store,
            inner: RwLock::new(Inner::Locked),
        }
    }

    /// The layout this session operates on.
    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Whether a manifest blob exists on disk (first-run detection).
    pub fn is_initialized(&self) -> bool {
        self.store.exists()
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        match *self.inner.read().await {
            Inner::Locked => SessionState::Locked,
            Inner::Unlocking => SessionState::Unlocking,
            Inner::Unlocked(_) => SessionState::Unlocked,
        }
    }

    /// Whether operations are currently available.
    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    /// First-run setup: create the storage layout and an encrypted
    /// empty manifest. The session stays locked; call [`unlock`]
    /// afterwards.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] if the password is shorter than
    ///   [`MIN_PASSWORD_LEN`] or the vault already exists
    /// - [`Error::Io`] if the storage directory cannot be created,
    ///   the one condition fatal to startup
    ///
    /// [`unlock`]: VaultSession::unlock
    pub async fn initialize(&self, password: &str, kdf: KdfParams) -> Result<()> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.store.exists() {
            return Err(Error::InvalidInput(
                "vault is already initialized".to_string(),
            ));
        }

        std::fs::create_dir_all(self.layout.storage_dir())?;

        let header = BlobHeader::generate(kdf);
        let key = derive_blocking(password, header.salt.clone(), header.kdf.clone()).await?;
        let blob = codec::seal(&Manifest::new(), &key)?;
        self.store.initialize(&header, &blob)?;

        info!(root = %self.layout.root().display(), "vault initialized");
        Ok(())
    }

    /// Unlock the session with the master password.
    ///
    /// Password verification is implicit: the derived key either
    /// authenticates the manifest blob or it does not. A failed
    /// attempt leaves the session locked.
    ///
    /// # Errors
    /// - [`Error::Authentication`] on a wrong password or a corrupted
    ///   blob (indistinguishable)
    /// - [`Error::Io`] if the blob cannot be read
    pub async fn unlock(&self, password: &str) -> Result<()> {
        {
            let mut inner = self.inner.write().await;
            match *inner {
                Inner::Locked => *inner = Inner::Unlocking,
                Inner::Unlocking => {
                    return Err(Error::InvalidInput(
                        "an unlock attempt is already in progress".to_string(),
                    ))
                }
                Inner::Unlocked(_) => {
                    return Err(Error::InvalidInput(
                        "session is already unlocked".to_string(),
                    ))
                }
            }
        }

        let attempt = self.attempt_unlock(password).await;

        let mut inner = self.inner.write().await;
        match attempt {
            Ok(unlocked) => {
                *inner = Inner::Unlocked(Box::new(unlocked));
                info!("vault unlocked");
                Ok(())
            }
            Err(e) => {
                *inner = Inner::Locked;
                Err(e)
            }
        }
    }

    async fn attempt_unlock(&self, password: &str) -> Result<Unlocked> {
        let (header, payload) = self.store.load()?;
        let key = derive_blocking(password, header.salt.clone(), header.kdf.clone()).await?;
        let manifest = codec::open(&payload, &key)?;
        let issued = manifest.ids().cloned().collect();

        Ok(Unlocked {
            key,
            header,
            manifest,
            issued,
        })
    }

    /// Lock the session, discarding the key and manifest.
    ///
    /// The session never locks itself; this is the only transition
    /// back to [`SessionState::Locked`].
    pub async fn logout(&self) {
        let mut inner = self.inner.write().await;
        if matches!(*inner, Inner::Unlocked(_)) {
            info!("vault locked");
        }
        // Dropping the Unlocked state zeroizes the master key.
        *inner = Inner::Locked;
    }

    /// All hidden folders, ordered by display name.
    pub async fn list_folders(&self) -> Result<Vec<ManifestEntry>> {
        match &*self.inner.read().await {
            Inner::Unlocked(u) => Ok(u.manifest.entries_by_name()),
            _ => Err(Error::Locked),
        }
    }

    /// Storage directory of a hidden folder, for collaborators that
    /// browse its contents directly. Read-only.
    pub async fn storage_path_for(&self, id: &FolderId) -> Result<PathBuf> {
        match &*self.inner.read().await {
            Inner::Unlocked(u) => {
                if u.manifest.get(id).is_none() {
                    return Err(Error::NotFound(id.to_string()));
                }
                Ok(self.layout.folder_dir(id))
            }
            _ => Err(Error::Locked),
        }
    }

    /// Hide a folder and return its new identifier.
    pub async fn hide_folder(&self, path: &Path) -> Result<FolderId> {
        self.hide_folder_with(path, CancellationToken::new()).await
    }

    /// Hide a folder, honoring a cancellation token during the copy.
    ///
    /// The manifest is re-encrypted and persisted before the id is
    /// returned. If persistence fails after the move already
    /// completed, the entry stays in the in-memory manifest and the
    /// error is [`Error::Persistence`]; the move is not rolled back.
    pub async fn hide_folder_with(
        &self,
        path: &Path,
        cancel: CancellationToken,
    ) -> Result<FolderId> {
        let mut inner = self.inner.write().await;
        let unlocked = match &mut *inner {
            Inner::Unlocked(u) => u,
            _ => return Err(Error::Locked),
        };

        if !path.is_absolute() {
            return Err(Error::InvalidInput(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
        if self.layout.contains(path) {
            return Err(Error::InvalidInput(
                "cannot hide the vault's own storage".to_string(),
            ));
        }
        if unlocked.manifest.is_path_hidden(path) {
            return Err(Error::AlreadyHidden(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidInput(format!("path has no folder name: {}", path.display()))
            })?;

        let id = ident::allocate(&unlocked.issued);
        let dest = self.layout.folder_dir(&id);

        let source = path.to_path_buf();
        let outcome =
            run_blocking(move || mover::hide_tree(&source, &dest, &cancel)).await?;

        unlocked.issued.insert(id.clone());
        unlocked.manifest.insert(ManifestEntry {
            id: id.clone(),
            name: name.clone(),
            original_path: path.to_path_buf(),
            hidden_at: Utc::now(),
            size_bytes: outcome.bytes,
        });

        self.persist(unlocked)?;

        if let Some(cleanup) = outcome.cleanup {
            // The hidden copy is canonical and tracked; the original
            // could not be deleted and the caller must know about it.
            warn!(path = %path.display(), "hide completed but the source remains");
            return Err(Error::Cleanup {
                retained: path.to_path_buf(),
                source: cleanup,
            });
        }

        info!(id = %id, name = %name, "folder hidden");
        Ok(id)
    }

    /// Unhide a folder back to its original path.
    pub async fn unhide_folder(&self, id: &FolderId, overwrite: bool) -> Result<()> {
        self.unhide_folder_with(id, overwrite, CancellationToken::new())
            .await
    }

    /// Unhide a folder, honoring a cancellation token during the copy.
    pub async fn unhide_folder_with(
        &self,
        id: &FolderId,
        overwrite: bool,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let unlocked = match &mut *inner {
            Inner::Unlocked(u) => u,
            _ => return Err(Error::Locked),
        };

        let dest = match unlocked.manifest.get(id) {
            Some(entry) => entry.original_path.clone(),
            None => return Err(Error::NotFound(id.to_string())),
        };
        let hidden = self.layout.folder_dir(id);

        let hidden_arg = hidden.clone();
        let dest_arg = dest.clone();
        let outcome = run_blocking(move || {
            mover::unhide_tree(&hidden_arg, &dest_arg, overwrite, &cancel)
        })
        .await?;

        if let Some(cleanup) = outcome.cleanup {
            // Destination is fully restored but the hidden copy could
            // not be deleted; keep the entry so the copy stays tracked.
            warn!(id = %id, "unhide completed but the hidden copy remains");
            return Err(Error::Cleanup {
                retained: hidden,
                source: cleanup,
            });
        }

        unlocked.manifest.remove(id);
        self.persist(unlocked)?;

        info!(id = %id, dest = %dest.display(), "folder unhidden");
        Ok(())
    }

    /// Restore a folder to its original path by rename when possible.
    pub async fn restore_folder(&self, id: &FolderId) -> Result<()> {
        self.restore_folder_with(id, CancellationToken::new()).await
    }

    /// Restore a folder, honoring a cancellation token if the move
    /// falls back to a cross-volume copy.
    pub async fn restore_folder_with(&self, id: &FolderId, cancel: CancellationToken) -> Result<()> {
        let mut inner = self.inner.write().await;
        let unlocked = match &mut *inner {
            Inner::Unlocked(u) => u,
            _ => return Err(Error::Locked),
        };

        let dest = match unlocked.manifest.get(id) {
            Some(entry) => entry.original_path.clone(),
            None => return Err(Error::NotFound(id.to_string())),
        };

        // The original location must still be reachable.
        match dest.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("original location is gone: {}", dest.display()),
                )))
            }
        }

        let hidden = self.layout.folder_dir(id);

        let hidden_arg = hidden.clone();
        let dest_arg = dest.clone();
        let outcome =
            run_blocking(move || mover::restore_tree(&hidden_arg, &dest_arg, &cancel)).await?;

        if let Some(cleanup) = outcome.cleanup {
            warn!(id = %id, "restore completed but the hidden copy remains");
            return Err(Error::Cleanup {
                retained: hidden,
                source: cleanup,
            });
        }

        unlocked.manifest.remove(id);
        self.persist(unlocked)?;

        info!(id = %id, dest = %dest.display(), "folder restored");
        Ok(())
    }

    /// Permanently delete a hidden folder.
    pub async fn remove_folder(&self, id: &FolderId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let unlocked = match &mut *inner {
            Inner::Unlocked(u) => u,
            _ => return Err(Error::Locked),
        };

        if unlocked.manifest.get(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        let hidden = self.layout.folder_dir(id);
        run_blocking(move || mover::remove_tree(&hidden)).await?;

        unlocked.manifest.remove(id);
        self.persist(unlocked)?;

        info!(id = %id, "folder permanently removed");
        Ok(())
    }

    /// Change the master password.
    ///
    /// The manifest is re-encrypted under a key derived from the new
    /// password and a fresh salt, saved atomically, and only then does
    /// the session swap its key. A failure anywhere leaves the old
    /// password working.
    ///
    /// # Errors
    /// - [`Error::Authentication`] if `old` does not match the key
    ///   this session was unlocked with
    /// - [`Error::InvalidInput`] if `new` is shorter than
    ///   [`MIN_PASSWORD_LEN`]
    pub async fn change_password(&self, old: &str, new: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let unlocked = match &mut *inner {
            Inner::Unlocked(u) => u,
            _ => return Err(Error::Locked),
        };

        if new.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let old_key = derive_blocking(
            old,
            unlocked.header.salt.clone(),
            unlocked.header.kdf.clone(),
        )
        .await?;
        if !old_key.ct_eq(&unlocked.key) {
            return Err(Error::Authentication);
        }

        let new_header = BlobHeader::generate(unlocked.header.kdf.clone());
        let new_key =
            derive_blocking(new, new_header.salt.clone(), new_header.kdf.clone()).await?;

        let blob = codec::seal(&unlocked.manifest, &new_key)?;
        self.store.save(&new_header, &blob)?;

        unlocked.header = new_header;
        unlocked.key = new_key;

        info!("master password changed");
        Ok(())
    }

    /// Re-encrypt and save the manifest after a filesystem mutation.
    ///
    /// The mutation already happened, so a failure here is the
    /// dangerous kind: the catalog on disk no longer matches reality.
    fn persist(&self, unlocked: &Unlocked) -> Result<()> {
        codec::seal(&unlocked.manifest, &unlocked.key)
            .and_then(|blob| self.store.save(&unlocked.header, &blob))
            .map_err(|e| {
                warn!(error = %e, "manifest persistence failed after a filesystem change");
                Error::Persistence(Box::new(e))
            })
    }
}

/// Run the Argon2id derivation off the async executor.
async fn derive_blocking(password: &str, salt: Salt, params: KdfParams) -> Result<MasterKey> {
    let password = Zeroizing::new(password.as_bytes().to_vec());
    task::spawn_blocking(move || derive_key(&password, &salt, &params))
        .await
        .map_err(|e| Error::Crypto(format!("key derivation task failed: {}", e)))?
}

/// Run filesystem-heavy work off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}
