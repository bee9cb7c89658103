//! Storage layer for Veil.
//!
//! This module provides:
//! - The on-disk vault layout (manifest blob, settings, hidden trees)
//! - Crash-safe persistence of the encrypted manifest blob
//! - Directory tree moves with rollback and cancellation
//! - Plain user preferences outside the trust boundary

pub mod blob;
pub mod layout;
pub mod mover;
pub mod settings;

pub use blob::{BlobHeader, ManifestStore};
pub use layout::VaultLayout;
pub use mover::MoveOutcome;
pub use settings::{Settings, Theme};
