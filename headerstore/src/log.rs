//! Append-only on-disk log of 80-byte headers (§4.5).
//!
//! No framing, no checksum: offset `i * 80` holds the header at position
//! `i`, and that position is *chain order at the time of writing*, not
//! insertion order (§4.5, invariant 6 in §3). This module owns only the
//! bytes; the decision of *which* headers to replay/flush and in what order
//! belongs to [`crate::store::BlockStore`], which knows the chain graph.

use crate::error::{StoreError, StoreResult};
use crate::header::{BlockHeader, HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read in chunks of this many headers at a time during replay, mirroring
/// the original implementation's bounded read buffer.
const REPLAY_CHUNK_HEADERS: usize = 8192;

#[derive(Debug)]
pub struct HeaderLog {
    file: File,
    size: u64,
}

impl HeaderLog {
    /// Open (creating with mode 0600 if missing) the log at `path`. A file
    /// whose size isn't a multiple of 80 is a hard error (§6, §7
    /// `FormatTruncated`) — the operator is expected to `zap` and re-sync.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(path)?;

        let size = file.metadata()?.len();
        if size as usize % HEADER_SIZE != 0 {
            return Err(StoreError::FormatTruncated {
                size,
                record_size: HEADER_SIZE,
            });
        }

        if !existed {
            tracing::info!(path = %path.display(), "created headers file");
        } else if size > 0 {
            tracing::info!(
                path = %path.display(),
                headers = size / HEADER_SIZE as u64,
                "opened headers file"
            );
        }

        Ok(HeaderLog { file, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn header_count(&self) -> u64 {
        self.size / HEADER_SIZE as u64
    }

    /// Walk every header in the log in file order, invoking `on_header` for
    /// each. Polls `stop` between chunks and bails out with
    /// [`StoreError::Cancelled`] if it's set — the one cancellable operation
    /// in the whole store (§5).
    pub fn replay<F>(&self, stop: &AtomicBool, mut on_header: F) -> StoreResult<()>
    where
        F: FnMut(BlockHeader) -> StoreResult<()>,
    {
        let chunk_bytes = REPLAY_CHUNK_HEADERS * HEADER_SIZE;
        let mut buf = vec![0u8; chunk_bytes];
        let mut offset: u64 = 0;

        while offset < self.size {
            if stop.load(Ordering::Relaxed) {
                return Err(StoreError::Cancelled);
            }

            let remaining = (self.size - offset) as usize;
            let n = remaining.min(chunk_bytes);
            self.file.read_exact_at(&mut buf[..n], offset)?;

            let num_headers = n / HEADER_SIZE;
            for i in 0..num_headers {
                let start = i * HEADER_SIZE;
                let mut record = [0u8; HEADER_SIZE];
                record.copy_from_slice(&buf[start..start + HEADER_SIZE]);
                on_header(BlockHeader::from_bytes(&record))?;
            }

            offset += n as u64;
        }

        Ok(())
    }

    /// Append `headers` (already in chain order) at the current end of the
    /// file in a single write. On success, advances `size`; on failure the
    /// caller keeps the entries marked dirty so the next flush retries
    /// (§4.5 "Note on consistency").
    pub fn append(&mut self, headers: &[BlockHeader]) -> StoreResult<()> {
        if headers.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(headers.len() * HEADER_SIZE);
        for h in headers {
            buf.extend_from_slice(&h.to_bytes());
        }

        self.file.write_all_at(&buf, self.size)?;
        self.size += buf.len() as u64;
        Ok(())
    }
}
