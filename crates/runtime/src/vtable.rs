//! The vtable cache.
//!
//! Structurally identical tables share one vtable on the wire. The cache maps
//! vtable *content* to emitted references so `end_table` can reuse an
//! existing vtable instead of emitting a new one. Content is addressed by the
//! running hash the builder mixes while fields are added, so a lookup never
//! rehashes the vtable bytes.
//!
//! References are only valid inside the buffer that emitted them, so one
//! cached byte image carries a bucket of `(buffer mark, reference)` pairs in
//! most-recently-used order. A hit on the bytes but not on the mark means the
//! vtable must be emitted again for the current buffer, while the byte image
//! is shared.

use crate::builder::Ref;
use hashbrown::HashTable;
use smallvec::SmallVec;

struct Entry {
    hash: u64,
    bytes: Box<[u8]>,
    /// `(buffer mark, emitted reference)` pairs, most recently used first.
    refs: SmallVec<[(i64, Ref); 2]>,
}

#[derive(Default)]
pub(crate) struct VtCache {
    index: HashTable<Entry>,
    cached_bytes: usize,
    flush_limit: usize,
}

impl VtCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum bytes of cached vtable storage before the cache flushes
    /// wholesale; 0 disables the limit.
    pub fn set_flush_limit(&mut self, limit: usize) {
        self.flush_limit = limit;
    }

    /// Total bytes of cached vtable images.
    #[cfg(test)]
    pub fn cached_bytes(&self) -> usize {
        self.cached_bytes
    }

    /// Look up a vtable already emitted into the buffer identified by `mark`.
    pub fn find(&mut self, hash: u32, bytes: &[u8], mark: i64) -> Option<Ref> {
        let h = u64::from(hash);
        let entry = self.index.find_mut(h, |e| e.hash == h && &*e.bytes == bytes)?;
        let pos = entry.refs.iter().position(|&(m, _)| m == mark)?;
        let pair = entry.refs.remove(pos);
        entry.refs.insert(0, pair);
        Some(pair.1)
    }

    /// Record a vtable just emitted as `vt_ref` into the buffer identified by
    /// `mark`. The byte image is stored once; further buffers only add a
    /// `(mark, ref)` pair. When the byte limit would be exceeded the cache is
    /// flushed instead and the vtable stays uncached.
    pub fn record(&mut self, hash: u32, bytes: &[u8], mark: i64, vt_ref: Ref) {
        debug_assert!(vt_ref.is_vtable());
        let h = u64::from(hash);
        if let Some(entry) = self.index.find_mut(h, |e| e.hash == h && &*e.bytes == bytes) {
            entry.refs.insert(0, (mark, vt_ref));
            return;
        }
        if self.flush_limit != 0 && self.cached_bytes + bytes.len() > self.flush_limit {
            self.flush();
            return;
        }
        self.cached_bytes += bytes.len();
        self.index.insert_unique(
            h,
            Entry {
                hash: h,
                bytes: bytes.into(),
                refs: SmallVec::from_slice(&[(mark, vt_ref)]),
            },
            |e| e.hash,
        );
    }

    /// Drop every cached vtable. Existing buffers are unaffected; future
    /// tables re-emit.
    pub fn flush(&mut self) {
        self.index.clear();
        self.cached_bytes = 0;
    }
}
