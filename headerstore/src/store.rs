//! `BlockStore`: the coarse lock plus the public operations (§3, §5).
//!
//! Per §5 ("no suspension points inside the critical section") and §9
//! ("all helpers assume the lock is held"), every public method locks once
//! for its full duration and delegates to free functions in [`crate::ingest`]
//! and [`crate::query`] that take `&StoreInner`/`&mut StoreInner` directly —
//! there is no re-entrant locking anywhere in the call graph.

use crate::checkpoints::CheckpointTable;
use crate::config::StoreConfig;
use crate::entry::{EntryId, EntryPool};
use crate::error::{StoreError, StoreResult};
use crate::hash::Hash256;
use crate::header::BlockHeader;
use crate::index::Index;
use crate::ingest::{self, IngestOutcome};
use crate::log::HeaderLog;
use crate::query;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

/// Bound on how many dirty (unwritten) entries a single internal flush
/// round collects before appending, per §4.5 / §9 Open Question 2: treated
/// as a soft cap — [`BlockStore::flush`] loops in batches of this size
/// rather than asserting the whole dirty set fits in one round.
pub(crate) const FLUSH_BATCH: usize = 2048;

/// Genesis-block timestamp constant used by [`query::timestamp`] before any
/// header has been ingested (§4.6): 2009-01-03 18:15:05 UTC.
pub const GENESIS_TIMESTAMP: u32 = 1_231_006_505;

/// Everything the lock protects. Free functions in [`crate::ingest`] and
/// [`crate::query`] operate directly on this; only [`BlockStore`]'s methods
/// touch the [`Mutex`].
pub(crate) struct StoreInner {
    pub(crate) pool: EntryPool,
    pub(crate) index: Index,
    pub(crate) checkpoints: CheckpointTable,
    pub(crate) genesis_hash: Hash256,
    pub(crate) genesis: Option<EntryId>,
    pub(crate) best_hash: Hash256,
    pub(crate) tip: Option<EntryId>,
    pub(crate) height: i32,
    pub(crate) log: HeaderLog,
}

impl StoreInner {
    fn new(checkpoints: CheckpointTable, log: HeaderLog) -> Self {
        let genesis_hash = checkpoints.genesis_hash();
        StoreInner {
            pool: EntryPool::new(),
            index: Index::new(),
            checkpoints,
            genesis_hash,
            genesis: None,
            best_hash: Hash256::ZERO,
            tip: None,
            height: -1,
            log,
        }
    }

    /// Test-only constructor that doesn't need a real file: backed by an
    /// empty in-memory log would defeat `HeaderLog`'s file ownership, so
    /// tests that need a `StoreInner` without driving `BlockStore::init`
    /// build one against a throwaway temp file. Kept `pub(crate)` for
    /// `crate::ingest`'s unit tests.
    #[cfg(test)]
    pub(crate) fn new_empty(checkpoints: CheckpointTable) -> Self {
        let dir = tempfile::tempdir().expect("tempdir for test store");
        let path = dir.path().join("headers.dat");
        let log = HeaderLog::open(&path).expect("open temp header log");
        std::mem::forget(dir); // keep the tempdir alive for the test's duration
        StoreInner::new(checkpoints, log)
    }
}

/// The header store: an in-memory index and graph over accepted headers,
/// plus the on-disk log that persists the active chain (§3).
pub struct BlockStore {
    inner: Mutex<StoreInner>,
}

impl BlockStore {
    /// Open (or create) the headers file at `config`'s resolved path, replay
    /// it to rebuild in-memory state, and return a ready store. `stop` is
    /// polled between replay chunks (§5); setting it from another thread
    /// aborts the load with [`StoreError::Cancelled`].
    pub fn init(config: &StoreConfig, checkpoints: CheckpointTable, stop: &AtomicBool) -> StoreResult<Self> {
        let log = HeaderLog::open(&config.headers_path())?;

        // Collect the on-disk headers first (borrowing only `log`), then
        // replay them against a fresh `StoreInner` one at a time: this
        // keeps the borrow of `log` during the file read disjoint from the
        // mutable borrow of `inner` ingest needs.
        let mut on_disk = Vec::new();
        log.replay(stop, |header| {
            on_disk.push(header);
            Ok(())
        })?;

        let mut inner = StoreInner::new(checkpoints, log);
        let mut replayed = 0u64;
        for header in on_disk {
            let hash = header.hash();
            if !inner.checkpoints.validate(&hash, inner.height + 1) {
                return Err(StoreError::CheckpointMismatch { height: inner.height + 1 });
            }
            let (added, _orphan) = ingest::add_header(&mut inner, header, hash);
            if added {
                if let Some(id) = inner.index.lookup(&hash) {
                    inner.pool.get_mut(id).written = true;
                }
            }
            replayed += 1;
        }

        if replayed > 0 {
            tracing::info!(headers = replayed, height = inner.height, "replayed header log");
        }

        Ok(BlockStore { inner: Mutex::new(inner) })
    }

    /// Flush any unwritten active entries, then release the log file. The
    /// store is consumed: there is no way to use it after shutdown (§6).
    pub fn shutdown(self) -> StoreResult<()> {
        self.flush()?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a header from the network (§4.3). Returns `(added, orphan)`.
    pub fn add_header(&self, header: BlockHeader, claimed_hash: Hash256) -> IngestOutcome {
        let mut inner = self.lock();
        ingest::add_header(&mut inner, header, claimed_hash)
    }

    /// Append every unwritten active entry to the log, in chain order, in
    /// batches of [`FLUSH_BATCH`] (§4.5). Returns the number of headers
    /// written. Entries demoted to orphan since their last ingest are
    /// skipped automatically: the backward walk from `tip` never reaches
    /// them.
    ///
    /// The whole unwritten suffix is collected first and reversed to chain
    /// order *before* any chunking: [`FLUSH_BATCH`] only bounds how many
    /// headers go into a single `pwrite`, it must not bound which entries
    /// get considered at all, or a dirty suffix longer than one batch would
    /// have its newest entries written ahead of its older ones (corrupting
    /// the on-disk chain order) while the oldest entries past the cap were
    /// silently left dirty forever.
    pub fn flush(&self) -> StoreResult<usize> {
        let mut inner = self.lock();

        let mut collected: Vec<EntryId> = Vec::new();
        let mut cur = inner.tip;
        while let Some(id) = cur {
            let e = inner.pool.get(id);
            if e.written {
                break;
            }
            collected.push(id);
            cur = e.prev;
        }
        collected.reverse(); // oldest unwritten entry first, in chain order.

        let mut total = 0usize;
        for chunk in collected.chunks(FLUSH_BATCH) {
            let headers: Vec<BlockHeader> = chunk.iter().map(|id| inner.pool.get(*id).header).collect();
            match inner.log.append(&headers) {
                Ok(()) => {
                    for id in chunk {
                        inner.pool.get_mut(*id).written = true;
                    }
                    total += chunk.len();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "flush failed, entries remain dirty for next attempt");
                    return Err(e);
                }
            }
        }
        if total > 0 {
            tracing::debug!(count = total, "flushed headers to log");
        }
        Ok(total)
    }

    pub fn best_hash(&self) -> Hash256 {
        query::best_hash(&self.lock())
    }

    pub fn height(&self) -> i32 {
        query::height(&self.lock())
    }

    pub fn timestamp(&self) -> u32 {
        query::timestamp(&self.lock())
    }

    /// Height of `hash` on the active chain. Panics if `hash` is not a
    /// known active entry: an internal invariant violation (§7
    /// `MissingParentInActive`), not a recoverable condition.
    pub fn height_of(&self, hash: &Hash256) -> i32 {
        query::height_of(&self.lock(), hash)
    }

    pub fn block_at(&self, height: i32) -> Option<(Hash256, BlockHeader)> {
        query::block_at(&self.lock(), height)
    }

    pub fn is_next(&self, prev: &Hash256, next: &Hash256) -> bool {
        query::is_next(&self.lock(), prev, next)
    }

    pub fn next_hashes(&self, start: &Hash256) -> Vec<Hash256> {
        query::next_hashes(&self.lock(), start)
    }

    pub fn locator_hashes(&self) -> Vec<Hash256> {
        query::locator_hashes(&self.lock())
    }

    pub fn hash_from_birth(&self, t: u32) -> Hash256 {
        query::hash_from_birth(&self.lock(), t)
    }

    /// True if `hash` is on the active chain. Distinct from [`Self::is_known`]:
    /// an orphan is known but `has_header` only answers for the active chain.
    pub fn has_header(&self, hash: &Hash256) -> bool {
        self.lock().index.is_active(hash)
    }

    pub fn is_orphan(&self, hash: &Hash256) -> bool {
        self.lock().index.is_orphan(hash)
    }

    pub fn is_known(&self, hash: &Hash256) -> bool {
        self.lock().index.is_known(hash)
    }

    /// Timestamp of an arbitrary known header, active or orphan (SPEC_FULL
    /// §C, `block_timestamp`).
    pub fn block_timestamp(&self, hash: &Hash256) -> Option<u32> {
        query::block_timestamp(&self.lock(), hash)
    }

    /// Whichever of two known active hashes sits at the greater height
    /// (SPEC_FULL §C, `highest_of`). A zero hash is "absent": the other
    /// hash wins unconditionally.
    pub fn highest_of(&self, a: &Hash256, b: &Hash256) -> Hash256 {
        query::highest_of(&self.lock(), a, b)
    }

    /// This store's compiled-in genesis hash (SPEC_FULL §C, `genesis_hash`).
    pub fn genesis_hash(&self) -> Hash256 {
        self.lock().genesis_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoints::Network;
    use crate::config::StoreConfig;
    use crate::hash::Hash256;
    use std::sync::atomic::AtomicBool;

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: GENESIS_TIMESTAMP,
            bits: 0,
            nonce: 0,
        }
    }

    /// Build a checkpoint table whose genesis record matches `genesis_header()`'s
    /// own digest, since the compiled-in test-network hash is an unrelated
    /// literal (see also `ingest::tests`).
    fn matching_checkpoints() -> (CheckpointTable, Hash256) {
        let hash = genesis_header().hash();
        (CheckpointTable::from_genesis(Network::Test, hash), hash)
    }

    #[test]
    fn bootstrap_then_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(Network::Test, dir.path());
        let (checkpoints, genesis_hash) = matching_checkpoints();
        let stop = AtomicBool::new(false);

        let store = BlockStore::init(&config, checkpoints, &stop).unwrap();
        let (added, orphan) = store.add_header(genesis_header(), genesis_hash);
        assert!(added && !orphan);
        assert_eq!(store.height(), 0);
        assert_eq!(store.best_hash(), genesis_hash);

        let flushed = store.flush().unwrap();
        assert_eq!(flushed, 1);
        store.shutdown().unwrap();

        let (checkpoints2, _) = matching_checkpoints();
        let store2 = BlockStore::init(&config, checkpoints2, &stop).unwrap();
        assert_eq!(store2.height(), 0);
        assert_eq!(store2.best_hash(), genesis_hash);
    }

    /// Regression test: a dirty suffix longer than one [`FLUSH_BATCH`] must
    /// still flush in full chain order across multiple `pwrite`s, not just
    /// write its newest batch and strand the rest.
    #[test]
    fn flush_writes_suffix_longer_than_one_batch_in_chain_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(Network::Test, dir.path());
        let (checkpoints, genesis_hash) = matching_checkpoints();
        let stop = AtomicBool::new(false);

        let store = BlockStore::init(&config, checkpoints, &stop).unwrap();
        store.add_header(genesis_header(), genesis_hash);

        let extra = FLUSH_BATCH + 50;
        let mut prev = genesis_hash;
        for nonce in 1..=extra as u32 {
            let h = BlockHeader {
                version: 1,
                prev_block: prev,
                merkle_root: Hash256::ZERO,
                timestamp: GENESIS_TIMESTAMP + nonce,
                bits: 0,
                nonce,
            };
            let hash = h.hash();
            let (added, orphan) = store.add_header(h, hash);
            assert!(added && !orphan);
            prev = hash;
        }
        let total_headers = extra + 1; // plus genesis

        let flushed = store.flush().unwrap();
        assert_eq!(flushed, total_headers);
        store.shutdown().unwrap();

        assert_eq!(
            std::fs::metadata(dir.path().join("headers.dat")).unwrap().len(),
            total_headers as u64 * crate::header::HEADER_SIZE as u64
        );

        // Reload must see the exact same chain: if the batches were written
        // out of order, some headers would fail to extend the tip on replay
        // and the rebuilt height/best_hash would come out short of `prev`.
        let (checkpoints2, _) = matching_checkpoints();
        let store2 = BlockStore::init(&config, checkpoints2, &stop).unwrap();
        assert_eq!(store2.height(), extra as i32);
        assert_eq!(store2.best_hash(), prev);
    }

    #[test]
    fn has_header_is_active_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(Network::Test, dir.path());
        let (checkpoints, genesis_hash) = matching_checkpoints();
        let stop = AtomicBool::new(false);
        let store = BlockStore::init(&config, checkpoints, &stop).unwrap();
        store.add_header(genesis_header(), genesis_hash);

        let orphan_header = BlockHeader {
            version: 1,
            prev_block: Hash256::from_hex(&"ab".repeat(32)).unwrap(),
            merkle_root: Hash256::ZERO,
            timestamp: GENESIS_TIMESTAMP + 1,
            bits: 0,
            nonce: 1,
        };
        let orphan_hash = orphan_header.hash();
        let (added, orphan) = store.add_header(orphan_header, orphan_hash);
        assert!(added && orphan);

        assert!(store.is_known(&orphan_hash));
        assert!(store.is_orphan(&orphan_hash));
        assert!(
            !store.has_header(&orphan_hash),
            "has_header must be active-only, distinct from is_known"
        );
        assert!(store.has_header(&genesis_hash));
    }

    #[test]
    fn query_surface_before_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(Network::Test, dir.path());
        let (checkpoints, _) = matching_checkpoints();
        let stop = AtomicBool::new(false);
        let store = BlockStore::init(&config, checkpoints, &stop).unwrap();

        assert_eq!(store.height(), -1);
        assert!(store.best_hash().is_zero());
        assert_eq!(store.timestamp(), GENESIS_TIMESTAMP);
        assert_eq!(store.block_at(0), None);
    }
}
