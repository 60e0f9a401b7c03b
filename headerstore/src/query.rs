//! Read-only chain-navigation operations (§4.6, plus the supplemental
//! operations in SPEC_FULL §C). Every function here takes `&StoreInner`:
//! the caller ([`crate::store::BlockStore`]) already holds the lock.

use crate::hash::Hash256;
use crate::header::BlockHeader;
use crate::store::{StoreInner, GENESIS_TIMESTAMP};

/// Maximum number of hashes [`next_hashes`] will emit in one call (§4.6).
const NEXT_HASHES_LIMIT: usize = 1_000;

/// Maximum number of entries [`locator_hashes`] will emit (§4.6).
const LOCATOR_MAX_ENTRIES: usize = 64;

/// Number of most-recent blocks `locator_hashes` spaces one apart before it
/// starts doubling the step (§4.6: "step back 1 block nine times (ten most
/// recent)").
const LOCATOR_DENSE_STEPS: usize = 9;

pub(crate) fn best_hash(inner: &StoreInner) -> Hash256 {
    inner.best_hash
}

pub(crate) fn height(inner: &StoreInner) -> i32 {
    inner.height
}

pub(crate) fn timestamp(inner: &StoreInner) -> u32 {
    match inner.tip {
        Some(id) => inner.pool.get(id).header.timestamp,
        None => GENESIS_TIMESTAMP,
    }
}

/// Panics if `hash` isn't a known active entry (§7 `MissingParentInActive`:
/// a broken invariant, not a recoverable error).
pub(crate) fn height_of(inner: &StoreInner, hash: &Hash256) -> i32 {
    if !inner.index.is_active(hash) {
        panic!("height_of: {hash} is not a known active header");
    }
    let id = inner
        .index
        .lookup(hash)
        .unwrap_or_else(|| panic!("height_of: {hash} is not a known active header"));
    inner.pool.get(id).height
}

/// Hash and header of the active entry at `height`, walking backward from
/// `tip` via `prev`. `None` if there is no tip yet or `height` is out of
/// `[0, store.height]`.
pub(crate) fn block_at(inner: &StoreInner, height: i32) -> Option<(Hash256, BlockHeader)> {
    if height < 0 || height > inner.height {
        return None;
    }
    let mut id = inner.tip?;
    loop {
        let e = inner.pool.get(id);
        if e.height == height {
            return Some((e.header.hash(), e.header));
        }
        id = e.prev?;
    }
}

pub(crate) fn is_next(inner: &StoreInner, prev: &Hash256, next: &Hash256) -> bool {
    match inner.index.lookup(prev).and_then(|id| inner.pool.get(id).next) {
        Some(next_id) => inner.pool.get(next_id).header.hash() == *next,
        None => false,
    }
}

/// Up to 1,000 successor hashes following `start` on the active chain.
pub(crate) fn next_hashes(inner: &StoreInner, start: &Hash256) -> Vec<Hash256> {
    let mut out = Vec::new();
    let Some(start_id) = inner.index.lookup(start) else {
        return out;
    };
    if !inner.index.is_active(start) {
        return out;
    }
    let mut cur = inner.pool.get(start_id).next;
    while let Some(id) = cur {
        if out.len() >= NEXT_HASHES_LIMIT {
            break;
        }
        let e = inner.pool.get(id);
        out.push(e.header.hash());
        cur = e.next;
    }
    out
}

/// Sparse peer-synchronization locator (§4.6): the tip, then the nine
/// blocks before it one at a time, then doubling gaps (2, 4, 8, ...) back
/// to genesis, capped at 64 entries.
pub(crate) fn locator_hashes(inner: &StoreInner) -> Vec<Hash256> {
    let mut out = Vec::new();
    let Some(mut id) = inner.tip else {
        return out;
    };

    let mut step: i64 = 1;
    let mut dense_emitted = 0usize;
    loop {
        let e = inner.pool.get(id);
        out.push(e.header.hash());
        if out.len() >= LOCATOR_MAX_ENTRIES || e.height == 0 {
            break;
        }

        // Walk back `step` entries, clamping at genesis if the chain is
        // shorter than the requested gap (so the final locator entry is
        // always genesis rather than silently missing).
        let mut p = id;
        for _ in 0..step {
            match inner.pool.get(p).prev {
                Some(parent) => p = parent,
                None => break,
            }
        }
        id = p;

        dense_emitted += 1;
        if dense_emitted >= LOCATOR_DENSE_STEPS {
            step *= 2;
        }
    }
    out
}

/// Hash of the most recent active entry whose timestamp is strictly before
/// `t`, walking backward from `tip`. Falls back to `genesis_hash` if no
/// such entry exists (§4.6: "should not happen on a real chain").
pub(crate) fn hash_from_birth(inner: &StoreInner, t: u32) -> Hash256 {
    let mut cur = inner.tip;
    while let Some(id) = cur {
        let e = inner.pool.get(id);
        if e.header.timestamp < t {
            return e.header.hash();
        }
        cur = e.prev;
    }
    inner.genesis_hash
}

/// Timestamp of any known header, active or orphan (SPEC_FULL §C). A zero
/// hash short-circuits to `None`, mirroring the original's
/// `uint256_iszero` guard.
pub(crate) fn block_timestamp(inner: &StoreInner, hash: &Hash256) -> Option<u32> {
    if hash.is_zero() {
        return None;
    }
    inner.index.lookup(hash).map(|id| inner.pool.get(id).header.timestamp)
}

/// Whichever of two known *active* hashes sits at the greater height
/// (SPEC_FULL §C). A zero hash is "absent": the other hash wins
/// unconditionally.
pub(crate) fn highest_of(inner: &StoreInner, a: &Hash256, b: &Hash256) -> Hash256 {
    if a.is_zero() {
        return *b;
    }
    if b.is_zero() {
        return *a;
    }
    let ha = height_of(inner, a);
    let hb = height_of(inner, b);
    if ha >= hb {
        *a
    } else {
        *b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoints::{CheckpointTable, Network};
    use crate::header::BlockHeader;
    use crate::ingest::add_header;
    use crate::store::StoreInner;

    fn header(prev: Hash256, nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block: prev,
            merkle_root: Hash256::ZERO,
            timestamp: 1_700_000_000 + nonce,
            bits: 0,
            nonce,
        }
    }

    fn chain_of(n: usize) -> (StoreInner, Vec<Hash256>) {
        let mut inner = StoreInner::new_empty(CheckpointTable::for_network(Network::Test));
        let genesis = BlockHeader {
            version: 1,
            prev_block: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: GENESIS_TIMESTAMP,
            bits: 0,
            nonce: 0,
        };
        let genesis_hash = genesis.hash();
        inner.genesis_hash = genesis_hash;
        add_header(&mut inner, genesis, genesis_hash);

        let mut hashes = vec![genesis_hash];
        let mut prev = genesis_hash;
        for i in 1..=n {
            let h = header(prev, i as u32);
            let hash = h.hash();
            add_header(&mut inner, h, hash);
            hashes.push(hash);
            prev = hash;
        }
        (inner, hashes)
    }

    #[test]
    fn block_at_and_height_of_round_trip() {
        let (inner, hashes) = chain_of(5);
        for (h, hash) in hashes.iter().enumerate() {
            assert_eq!(height_of(&inner, hash), h as i32);
            let (found_hash, _) = block_at(&inner, h as i32).unwrap();
            assert_eq!(found_hash, *hash);
        }
        assert_eq!(block_at(&inner, 6), None);
    }

    #[test]
    fn next_hashes_lists_successors() {
        let (inner, hashes) = chain_of(4);
        let got = next_hashes(&inner, &hashes[1]);
        assert_eq!(got, hashes[2..].to_vec());
    }

    #[test]
    fn locator_shape_is_dense_then_doubling() {
        let (inner, hashes) = chain_of(30);
        let locator = locator_hashes(&inner);
        assert!(locator.len() <= LOCATOR_MAX_ENTRIES);
        assert_eq!(locator[0], *hashes.last().unwrap());
        // Heights must strictly decrease.
        let heights: Vec<i32> = locator.iter().map(|h| height_of(&inner, h)).collect();
        for w in heights.windows(2) {
            assert!(w[0] > w[1]);
        }
        // Last entry reaches genesis.
        assert_eq!(*heights.last().unwrap(), 0);
    }

    #[test]
    fn hash_from_birth_finds_predecessor() {
        let (inner, hashes) = chain_of(5);
        // hashes[i] has timestamp GENESIS_TIMESTAMP for i==0, else 1_700_000_000+i.
        let t = 1_700_000_000 + 3;
        let found = hash_from_birth(&inner, t);
        assert_eq!(found, hashes[2]);
    }

    #[test]
    fn highest_of_picks_greater_height() {
        let (inner, hashes) = chain_of(3);
        assert_eq!(highest_of(&inner, &hashes[1], &hashes[2]), hashes[2]);
        assert_eq!(highest_of(&inner, &Hash256::ZERO, &hashes[1]), hashes[1]);
    }
}
