//! Membership index (§4.2): every known hash is in exactly one of `active`
//! or `orphans` (invariant P1 / spec invariant 1).

use crate::entry::EntryId;
use crate::hash::Hash256;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Index {
    active: HashMap<Hash256, EntryId>,
    orphans: HashMap<Hash256, EntryId>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orphan-first lookup: during a reorg an entry may transiently sit in
    /// `orphans` while its ancestors are still being re-parented (§4.2).
    pub fn lookup(&self, hash: &Hash256) -> Option<EntryId> {
        self.orphans
            .get(hash)
            .or_else(|| self.active.get(hash))
            .copied()
    }

    pub fn is_active(&self, hash: &Hash256) -> bool {
        self.active.contains_key(hash)
    }

    pub fn is_orphan(&self, hash: &Hash256) -> bool {
        self.orphans.contains_key(hash)
    }

    pub fn is_known(&self, hash: &Hash256) -> bool {
        self.is_active(hash) || self.is_orphan(hash)
    }

    pub fn insert_active(&mut self, hash: Hash256, id: EntryId) {
        self.active.insert(hash, id);
    }

    pub fn insert_orphan(&mut self, hash: Hash256, id: EntryId) {
        self.orphans.insert(hash, id);
    }

    /// Move `hash` from `orphans` to `active`. Panics if it isn't an orphan —
    /// a broken invariant, not a recoverable condition (§7).
    pub fn promote(&mut self, hash: &Hash256) -> EntryId {
        let id = self
            .orphans
            .remove(hash)
            .unwrap_or_else(|| panic!("promote: {hash} is not an orphan"));
        self.active.insert(*hash, id);
        id
    }

    /// Move `hash` from `active` to `orphans`. Panics if it isn't active.
    pub fn demote(&mut self, hash: &Hash256) -> EntryId {
        let id = self
            .active
            .remove(hash)
            .unwrap_or_else(|| panic!("demote: {hash} is not active"));
        self.orphans.insert(*hash, id);
        id
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
