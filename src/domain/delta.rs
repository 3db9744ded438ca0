//! Synchronization delta
//!
//! A [`SyncDelta`] is the classified result of one retrieval: three disjoint
//! sets keyed by identity value. It is what the staging synchronizer commits
//! and what the target reconciler replays downstream.

use crate::domain::feature::Feature;
use crate::domain::ids::IdentityValue;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Added, updated and deleted records of a retrieval
///
/// Invariant: an identity value appears in at most one of the three sets and
/// at most once within it. `deleted` only holds identities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncDelta {
    /// Records whose identity is not yet in the canonical store
    pub added: BTreeMap<IdentityValue, Feature>,
    /// Records whose identity already exists in the canonical store
    pub updated: BTreeMap<IdentityValue, Feature>,
    /// Identities to remove
    pub deleted: BTreeSet<IdentityValue>,
}

impl SyncDelta {
    /// Creates an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta for a full retrieval: every record is an addition
    ///
    /// Duplicate identities collapse to the last record seen.
    pub fn full(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut delta = Self::new();
        for feature in features {
            delta.added.insert(feature.identity.clone(), feature);
        }
        delta
    }

    /// Classifies changeset records against the identities already stored
    ///
    /// Records are processed in payload order and the last record for an
    /// identity wins. A record without the deletion tag is an update when its
    /// identity is already stored, otherwise an addition; the INSERT/UPDATE tag
    /// itself is not trusted, which keeps re-application idempotent.
    pub fn classify(
        records: impl IntoIterator<Item = Feature>,
        existing: &HashSet<IdentityValue>,
    ) -> Self {
        let mut delta = Self::new();
        for record in records {
            let id = record.identity.clone();
            if record.is_deletion() {
                delta.added.remove(&id);
                delta.updated.remove(&id);
                delta.deleted.insert(id);
            } else {
                delta.deleted.remove(&id);
                if existing.contains(&id) {
                    delta.added.remove(&id);
                    delta.updated.insert(id, record);
                } else {
                    delta.updated.remove(&id);
                    delta.added.insert(id, record);
                }
            }
        }
        delta
    }

    /// Turns a pending addition or update into a deletion
    ///
    /// Used by corrective post-filtering: a record that no longer passes the
    /// dataset filters must leave the canonical store.
    pub fn demote_to_deletion(&mut self, id: &IdentityValue) {
        self.added.remove(id);
        self.updated.remove(id);
        self.deleted.insert(id.clone());
    }

    /// Records to insert or replace, additions first
    pub fn upserts(&self) -> impl Iterator<Item = &Feature> {
        self.added.values().chain(self.updated.values())
    }

    /// Number of records to insert or replace
    pub fn upsert_count(&self) -> usize {
        self.added.len() + self.updated.len()
    }

    /// Total number of classified identities
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }

    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks the cross-set uniqueness invariant
    pub fn is_disjoint(&self) -> bool {
        self.added.keys().all(|k| !self.updated.contains_key(k) && !self.deleted.contains(k))
            && self.updated.keys().all(|k| !self.deleted.contains(k))
    }
}
