//! Static per-network checkpoint table (§4.1, §6).
//!
//! A checkpoint rejects any fork that contradicts known history: if an
//! active entry would land at a checkpointed height with the wrong hash,
//! ingest refuses it. The bootstrap table always contains at least the
//! genesis record, per §6.

use crate::hash::Hash256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
}

#[derive(Debug, Clone, Copy)]
pub struct CheckpointEntry {
    pub height: u32,
    pub hash_hex: &'static str,
}

/// Genesis + a handful of historical checkpoints for the main network.
/// Placeholder hashes: a real deployment compiles in the actual chain's
/// genesis and known-good heights.
const MAIN_CHECKPOINTS: &[CheckpointEntry] = &[
    CheckpointEntry {
        height: 0,
        hash_hex: "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26",
    },
    CheckpointEntry {
        height: 100_000,
        hash_hex: "000000000003ba27aa200b1cecaad478d2b00432346c3f1f3986da1afd33e82",
    },
];

const TEST_CHECKPOINTS: &[CheckpointEntry] = &[CheckpointEntry {
    height: 0,
    hash_hex: "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f424",
}];

#[derive(Debug, Clone)]
pub struct CheckpointTable {
    network: Network,
    entries: Vec<(u32, Hash256)>,
}

impl CheckpointTable {
    /// Build the compiled-in table for `network`. Panics if a hash literal
    /// fails to parse — that would be a build-time bug, not a runtime one.
    pub fn for_network(network: Network) -> Self {
        let source = match network {
            Network::Main => MAIN_CHECKPOINTS,
            Network::Test => TEST_CHECKPOINTS,
        };
        let entries = source
            .iter()
            .map(|e| {
                (
                    e.height,
                    Hash256::from_hex(e.hash_hex)
                        .unwrap_or_else(|_| panic!("invalid checkpoint hash literal for height {}", e.height)),
                )
            })
            .collect();
        CheckpointTable { network, entries }
    }

    /// Build a single-entry table pinning only the genesis record to
    /// `genesis_hash`, with no further historical checkpoints. Meant for
    /// private/regtest-style deployments (and tests) where the genesis
    /// header is chosen at runtime rather than compiled in.
    pub fn from_genesis(network: Network, genesis_hash: Hash256) -> Self {
        CheckpointTable {
            network,
            entries: vec![(0, genesis_hash)],
        }
    }

    /// Pin (or repin) a checkpoint at `height`. Lets a deployment layer
    /// additional known-good heights onto a table beyond its compiled-in
    /// set, and lets tests exercise checkpoint rejection deterministically.
    pub fn with_checkpoint(mut self, height: u32, hash: Hash256) -> Self {
        match self.entries.iter_mut().find(|(h, _)| *h == height) {
            Some((_, existing)) => *existing = hash,
            None => self.entries.push((height, hash)),
        }
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The genesis record is always entries[0] (§6: "must contain at least
    /// the genesis (0, ...) record").
    pub fn genesis_hash(&self) -> Hash256 {
        self.entries
            .first()
            .map(|(_, h)| *h)
            .expect("checkpoint table must contain at least genesis")
    }

    /// True unless a checkpoint exists for `height` and its hash differs
    /// from `hash` (§4.1).
    pub fn validate(&self, hash: &Hash256, height: i32) -> bool {
        if height < 0 {
            return true;
        }
        let height = height as u32;
        match self.entries.iter().find(|(h, _)| *h == height) {
            Some((_, expected)) => expected == hash,
            None => true,
        }
    }
}
