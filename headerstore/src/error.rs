//! Error kinds for the header store, per the error design in §7: anything
//! externally induced (bad I/O, a corrupt file, a peer header that fails a
//! checkpoint) is a recoverable [`StoreError`]. Anything that would mean an
//! internal invariant broke — a hash the index claims to know but the pool
//! doesn't have, a caller who can't be bothered to pass the right digest —
//! is a programming error and is raised with `panic!`/`assert!` at the call
//! site instead of being threaded through `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on header log: {0}")]
    Io(#[from] std::io::Error),

    #[error("header log size {size} is not a multiple of {record_size} bytes")]
    FormatTruncated { size: u64, record_size: usize },

    #[error("header at height {height} does not match checkpoint hash")]
    CheckpointMismatch { height: i32 },

    #[error("replay cancelled by stop flag")]
    Cancelled,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
