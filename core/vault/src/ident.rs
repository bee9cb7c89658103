//! Folder identifier allocation.
//!
//! Identifiers are random fixed-length alphanumeric strings, so they
//! stay unique even across a manifest reset. The caller supplies the
//! exclusion set; generation retries on the (astronomically rare)
//! collision instead of assuming uniqueness.

use std::collections::BTreeSet;

use rand::distr::{Alphanumeric, SampleString};

use veil_common::{FolderId, ID_LENGTH};

/// Allocate an identifier not present in `existing`.
pub fn allocate(existing: &BTreeSet<FolderId>) -> FolderId {
    loop {
        let candidate = Alphanumeric.sample_string(&mut rand::rng(), ID_LENGTH);
        let id = FolderId::from_generated(candidate);
        if !existing.contains(&id) {
            return id;
        }
    }
}
