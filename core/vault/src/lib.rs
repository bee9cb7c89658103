//! Vault engine for Veil.
//!
//! This module provides:
//! - The hidden-folder manifest and its authenticated encryption
//! - Collision-free folder identifier allocation
//! - Session handling with secure key management
//! - The hide/unhide/remove/restore operations with their
//!   filesystem-atomicity guarantees
//!
//! # Architecture
//! The vault module sits between collaborators (CLI, browsers,
//! viewers) and the storage layer; collaborators never touch the
//! manifest blob or key material directly.

pub mod codec;
pub mod ident;
pub mod manifest;
pub mod session;

pub use manifest::{format_size, Manifest, ManifestEntry};
pub use session::{SessionState, VaultSession, MIN_PASSWORD_LEN};
