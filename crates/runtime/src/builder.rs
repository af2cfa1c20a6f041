//! The buffer construction engine.
//!
//! A [`Builder`] produces a wire buffer *backwards*: children are emitted
//! before the parents that reference them, so every reference is a plain
//! subtraction against an address that is already final. The data of the
//! object currently under construction accumulates on a data stack; matching
//! `start_*`/`end_*` calls push and pop frames, and each `end_*` flushes one
//! finished object through the emission sink as a single gather-write.
//!
//! Logical addresses are signed: emission at the front moves `emit_start`
//! further below zero while clustered vtables and end padding grow `emit_end`
//! above it. A [`Ref`] names an emitted object by its address; vtable
//! references are stored as `address + 1` so they are the only odd references
//! and zero never names a valid object.
//!
//! Tables are the interesting case. While a table frame is open, added fields
//! land on the data stack and their offsets land in vtable slots; offset
//! fields are additionally noted in a patch log because their final relative
//! encoding cannot be computed until the table's own address is known. At
//! [`Builder::end_table`] the vtable is materialized, deduplicated through a
//! content-hash cache, and the body is emitted with every patch-log entry
//! rewritten from an absolute reference to the relative offset the reader
//! expects.

use crate::emit::{BufferSink, EmitError, EmitSink, IoVec, ZERO_PAD};
use crate::frame::{Frame, FrameKind, FramePayload};
use crate::scratch::{
    Region, DATA_STACK_HINT, FRAME_STACK_HINT, PATCH_LOG_HINT, VTABLE_STACK_HINT,
};
use crate::vtable::VtCache;
use crate::AlignedBytes;
use log::{debug, trace};
use planar_format::{
    count_max, FileIdentifier, Scalar, UOffset, VOffset, FIELD_ID_MAX, IDENTIFIER_SIZE,
    SOFFSET_MAX, SOFFSET_MIN, UOFFSET_MAX, UOFFSET_SIZE, VOFFSET_SIZE,
};
use smallvec::SmallVec;
use thiserror::Error;

/// Size of the uoffset field heading every table, vector and string.
const FIELD_SIZE: usize = UOFFSET_SIZE;

/// Data-stack clamp for table bodies: the table size including its header
/// must fit a voffset.
const TABLE_LIMIT: usize = planar_format::VOFFSET_MAX as usize - FIELD_SIZE;

/// Data-stack clamp for everything else, leaving header room below the
/// uoffset range.
const DATA_LIMIT: usize = UOFFSET_MAX as usize - 16;

/// Largest accepted alignment argument. One front pad plus a string
/// terminator must fit the shared zero block.
const ALIGN_MAX: u16 = 256;

/// Errors produced by [`Builder`] operations.
///
/// Any error leaves the in-progress buffer unfit for shipping; the builder
/// itself can be reused after [`Builder::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The emission sink or an allocator refused to provide storage.
    #[error("backing storage could not be allocated")]
    OutOfMemory,
    /// The buffer would exceed the representable offset range, or a size
    /// clamp (table size, vector element count) was hit.
    #[error("buffer exceeds representable offset range")]
    Overflow,
    /// Nesting depth would exceed the configured maximum level.
    #[error("nesting exceeds the configured maximum level")]
    TooNested,
    /// An operation was applied to the wrong kind of frame, a `start_*` and
    /// `end_*` were mismatched, or a required field is missing.
    #[error("builder misuse: {0}")]
    Misuse(&'static str),
}

impl From<EmitError> for BuildError {
    fn from(e: EmitError) -> Self {
        match e {
            EmitError::OutOfMemory => BuildError::OutOfMemory,
        }
    }
}

/// Result of builder operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Reference to an object already emitted into the buffer under
/// construction.
///
/// The value is the object's logical emission address, except for vtables
/// which are stored as `address + 1`: vtable references are the only odd
/// ones, and zero never names a valid object. A reference is only meaningful
/// within the buffer (and builder) that produced it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Ref(i64);

impl Ref {
    pub(crate) fn new(addr: i64) -> Self {
        debug_assert!(addr != 0);
        Self(addr)
    }

    /// Whether this reference names a vtable.
    pub fn is_vtable(self) -> bool {
        self.0 & 1 == 1
    }

    /// The raw emission address (for vtables: address + 1).
    pub fn addr(self) -> i64 {
        self.0
    }
}

bitflags::bitflags! {
    /// Options for buffer framing.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct BufferFlags: u32 {
        /// Prefix the finished buffer with its byte size even at top level.
        /// Nested buffers always carry the prefix.
        const WITH_SIZE = 1;
    }
}

impl Default for BufferFlags {
    fn default() -> Self {
        BufferFlags::empty()
    }
}

#[inline]
fn align_up(x: usize, align: usize) -> usize {
    (x + align - 1) & !(align - 1)
}

/// Padding needed after `size` bytes emitted at the front so the bytes start
/// on an `align` boundary.
#[inline]
fn front_pad(emit_start: i64, size: usize, align: u16) -> usize {
    ((emit_start - size as i64) & (i64::from(align) - 1)) as usize
}

/// Running vtable content hash: seeded per table, mixed per field with
/// `(id, size)` and finalized with the two header voffsets.
const VT_HASH_SEED: u32 = 0x2f69_3b52;

#[inline]
fn mix_vt_hash(hash: u32, a: u32, b: u32) -> u32 {
    ((hash ^ a).wrapping_mul(2_654_435_761) ^ b).wrapping_mul(2_654_435_761)
}

/// The buffer construction engine. See the [module docs](self) for the
/// emission model.
///
/// A builder is single-owner, single-buffer-stream state: operations must be
/// serialized by the caller, and references from one buffer stream must not
/// leak into another. `S` is the emission sink; the default [`BufferSink`]
/// collects the buffer in memory for [`Builder::finalize`].
pub struct Builder<S: EmitSink = BufferSink> {
    sink: S,

    /// Lowest emitted logical address; front emission decreases it.
    emit_start: i64,
    /// One past the highest emitted logical address; only clustered vtables
    /// and end padding increase it.
    emit_end: i64,

    /// Largest alignment observed in the current buffer.
    min_align: u16,
    /// Alignment accumulated by the current frame.
    align: u16,
    block_align: u16,
    identifier: FileIdentifier,
    /// `emit_start` at the current buffer's start; bounds a nested buffer's
    /// content for its size prefix.
    buffer_mark: i64,
    /// Identity of the current buffer, keying vtable-cache validity; 0 for
    /// the top buffer (and for objects built before any buffer starts).
    buffer_serial: i64,
    next_buffer_serial: i64,

    frames: Region<Frame>,
    max_level: usize,
    user_state: usize,

    /// Data stack: contents of in-progress objects, back to back.
    ds: Region<u8>,
    /// Start of the current frame's data-stack span.
    ds_base: usize,
    /// Clamp on the current frame's span length.
    ds_limit: usize,

    /// Vtable slot stack: one voffset per declared field id, per open table.
    vs: Region<VOffset>,
    vs_base: usize,
    /// One past the highest field id added to the current table.
    field_end: u16,
    vt_hash: u32,

    /// Patch log: data-stack offsets (within the current table span) holding
    /// absolute references that need relocation at `end_table`.
    pl: Region<u32>,
    pl_base: usize,

    vtables: VtCache,
    clustering: bool,
}

impl Builder<BufferSink> {
    /// Create a builder with the default in-memory sink.
    pub fn new() -> Self {
        Self::with_sink(BufferSink::new())
    }

    /// Coalesce the finished buffer into one contiguous allocation.
    ///
    /// Call after the outermost `end_buffer`. The builder keeps its state;
    /// use [`Builder::reset`] before building the next buffer.
    pub fn finalize(&self) -> Vec<u8> {
        self.sink.to_vec()
    }

    /// Like [`Builder::finalize`], but the allocation is aligned to the
    /// buffer's alignment requirement.
    pub fn finalize_aligned(&self) -> AlignedBytes {
        self.sink.to_aligned(usize::from(self.min_align.max(1)))
    }

    /// Copy the finished buffer into `dst`, returning the byte count, or
    /// `None` when `dst` is too small.
    pub fn copy_buffer(&self, dst: &mut [u8]) -> Option<usize> {
        self.sink.copy_to(dst)
    }
}

impl Default for Builder<BufferSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EmitSink> Builder<S> {
    /// Create a builder emitting through a caller-supplied sink.
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            emit_start: 0,
            emit_end: 0,
            min_align: 0,
            align: 0,
            block_align: 0,
            identifier: FileIdentifier::null(),
            buffer_mark: 0,
            buffer_serial: 0,
            next_buffer_serial: 0,
            frames: Region::new(FRAME_STACK_HINT),
            max_level: 0,
            user_state: 0,
            ds: Region::new(DATA_STACK_HINT),
            ds_base: 0,
            ds_limit: DATA_LIMIT,
            vs: Region::new(VTABLE_STACK_HINT),
            vs_base: 0,
            field_end: 0,
            vt_hash: VT_HASH_SEED,
            pl: Region::new(PATCH_LOG_HINT),
            pl_base: 0,
            vtables: VtCache::new(),
            clustering: true,
        }
    }

    /// The emission sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The emission sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the builder, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Clear all construction state and the sink, keeping warm allocations.
    /// Tuning settings survive.
    pub fn reset(&mut self) {
        self.reset_regions(false);
    }

    /// Like [`Builder::reset`], but also give back scratch capacity when
    /// occupancy has dropped to half or less.
    pub fn reset_and_shrink(&mut self) {
        self.reset_regions(true);
    }

    /// Reset and drop all scratch allocations.
    pub fn clear(&mut self) {
        self.reset();
        self.ds.release();
        self.vs.release();
        self.pl.release();
        self.frames.release();
    }

    fn reset_regions(&mut self, reduce: bool) {
        self.ds.reset(reduce);
        self.vs.reset(reduce);
        self.pl.reset(reduce);
        self.frames.reset(reduce);
        self.vtables.flush();
        self.sink.reset();
        self.emit_start = 0;
        self.emit_end = 0;
        self.min_align = 0;
        self.align = 0;
        self.identifier = FileIdentifier::null();
        self.buffer_mark = 0;
        self.buffer_serial = 0;
        self.next_buffer_serial = 0;
        self.user_state = 0;
        self.ds_base = 0;
        self.ds_limit = DATA_LIMIT;
        self.vs_base = 0;
        self.field_end = 0;
        self.vt_hash = VT_HASH_SEED;
        self.pl_base = 0;
    }

    /// Total bytes emitted so far.
    pub fn buffer_size(&self) -> usize {
        (self.emit_end - self.emit_start) as usize
    }

    /// Lowest emitted logical address.
    pub fn emit_start(&self) -> i64 {
        self.emit_start
    }

    /// One past the highest emitted logical address.
    pub fn emit_end(&self) -> i64 {
        self.emit_end
    }

    /// Current nesting level; 0 when no frame is open.
    pub fn level(&self) -> usize {
        self.frames.len()
    }

    /// Bound the nesting depth; 0 means unlimited.
    pub fn set_max_level(&mut self, max_level: usize) {
        self.max_level = max_level;
    }

    /// Enable or disable clustering of top-level vtables at the buffer end.
    pub fn set_vtable_clustering(&mut self, enable: bool) {
        self.clustering = enable;
    }

    /// Cap the bytes of cached vtable storage before the cache flushes;
    /// 0 disables the cap.
    pub fn set_vtable_cache_limit(&mut self, bytes: usize) {
        self.vtables.set_flush_limit(bytes);
    }

    /// Drop all cached vtables; future identical tables re-emit theirs.
    pub fn flush_vtable_cache(&mut self) {
        self.vtables.flush();
    }

    /// Default block alignment applied by buffer framing when `start_buffer`
    /// passed 0.
    pub fn set_block_align(&mut self, align: u16) -> BuildResult<()> {
        if align != 0 {
            Self::check_align(align)?;
        }
        self.block_align = align;
        Ok(())
    }

    /// Largest alignment observed in the current buffer.
    pub fn buffer_alignment(&self) -> u16 {
        self.min_align
    }

    /// Temporarily reset the observed buffer alignment while building an
    /// independent object; returns the value to pass to
    /// [`Builder::pop_buffer_alignment`].
    pub fn push_buffer_alignment(&mut self) -> u16 {
        let saved = self.min_align;
        self.min_align = FIELD_SIZE as u16;
        saved
    }

    /// Restore an alignment saved by [`Builder::push_buffer_alignment`].
    pub fn pop_buffer_alignment(&mut self, saved: u16) {
        self.set_min_align(saved);
    }

    /// Frame-scoped user scalar, restored when the current frame exits.
    pub fn set_user_state(&mut self, state: usize) {
        self.user_state = state;
    }

    /// The current frame's user scalar.
    pub fn user_state(&self) -> usize {
        self.user_state
    }

    // ------------------------------------------------------------------
    // Emission primitives.
    // ------------------------------------------------------------------

    fn emit_front_raw(sink: &mut S, emit_start: &mut i64, iov: &IoVec) -> BuildResult<Ref> {
        let len = iov.len() as i64;
        let addr = *emit_start - len;
        if iov.len() > DATA_LIMIT || addr < i64::from(SOFFSET_MIN) {
            return Err(BuildError::Overflow);
        }
        sink.emit(addr, iov)?;
        *emit_start = addr;
        Ok(Ref::new(addr))
    }

    /// Back emission returns `address + 1` so address 0 stays distinguishable
    /// from the null reference; only vtables and padding go here.
    fn emit_back_raw(sink: &mut S, emit_end: &mut i64, iov: &IoVec) -> BuildResult<Ref> {
        let len = iov.len() as i64;
        let end = *emit_end + len;
        if end > i64::from(SOFFSET_MAX) {
            return Err(BuildError::Overflow);
        }
        sink.emit(*emit_end, iov)?;
        let r = Ref::new(*emit_end + 1);
        *emit_end = end;
        Ok(r)
    }

    fn set_min_align(&mut self, align: u16) {
        if self.min_align < align {
            self.min_align = align;
        }
    }

    fn check_align(align: u16) -> BuildResult<u16> {
        if align == 0 || !align.is_power_of_two() || align > ALIGN_MAX {
            return Err(BuildError::Misuse("alignment must be a power of two"));
        }
        Ok(align)
    }

    // ------------------------------------------------------------------
    // Frame discipline.
    // ------------------------------------------------------------------

    fn enter_frame(&mut self, align: u16, kind: FrameKind, payload: FramePayload) -> BuildResult<()> {
        if self.max_level > 0 && self.frames.len() >= self.max_level {
            return Err(BuildError::TooNested);
        }
        self.frames.warm();
        self.frames.push(Frame {
            kind,
            ds_len: self.ds.len(),
            ds_base: self.ds_base,
            ds_limit: self.ds_limit,
            align: self.align,
            user_state: self.user_state,
            payload,
        });
        self.align = align;
        // The new span starts 8-aligned so naturally aligned scalars can be
        // assembled in place.
        let base = align_up(self.ds.len(), 8);
        self.ds.warm();
        self.ds.resize(base, 0);
        self.ds_base = base;
        self.ds_limit = if kind == FrameKind::Table {
            TABLE_LIMIT
        } else {
            DATA_LIMIT
        };
        Ok(())
    }

    fn exit_frame(&mut self) -> Frame {
        let frame = self.frames.pop().expect("frame stack underflow");
        self.ds.truncate(frame.ds_len);
        self.user_state = frame.user_state;
        self.ds_base = frame.ds_base;
        self.ds_limit = frame.ds_limit;
        // A parent's own layout is unaffected by what a child emitted
        // elsewhere, but the buffer-wide alignment must see it.
        let child_align = self.align;
        self.set_min_align(child_align);
        self.align = frame.align;
        frame
    }

    fn expect_kind(&self, kind: FrameKind, what: &'static str) -> BuildResult<()> {
        match self.frames.last() {
            Some(f) if f.kind == kind => Ok(()),
            _ => Err(BuildError::Misuse(what)),
        }
    }

    fn ds_cursor(&self) -> usize {
        self.ds.len() - self.ds_base
    }

    fn push_ds(&mut self, size: usize) -> BuildResult<&mut [u8]> {
        if self.ds_cursor() + size > self.ds_limit {
            return Err(BuildError::Overflow);
        }
        let start = self.ds.len();
        self.ds.resize(start + size, 0);
        Ok(&mut self.ds[start..])
    }

    fn push_ds_copy(&mut self, data: &[u8]) -> BuildResult<()> {
        self.push_ds(data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn unpush_ds(&mut self, size: usize) {
        debug_assert!(self.ds_cursor() >= size);
        let len = self.ds.len() - size;
        self.ds.truncate(len);
    }

    // ------------------------------------------------------------------
    // Tables.
    // ------------------------------------------------------------------

    /// Open a table frame. `field_count_hint` pre-sizes the vtable slot stack
    /// and patch log.
    pub fn start_table(&mut self, field_count_hint: usize) -> BuildResult<()> {
        self.enter_frame(
            FIELD_SIZE as u16,
            FrameKind::Table,
            FramePayload::Table {
                vs_base: self.vs_base,
                pl_base: self.pl_base,
                field_end: self.field_end,
                vt_hash: self.vt_hash,
            },
        )?;
        self.vs_base = self.vs.len();
        self.pl_base = self.pl.len();
        self.field_end = 0;
        self.vt_hash = VT_HASH_SEED;
        self.reserve_table(field_count_hint)?;
        Ok(())
    }

    /// Reserve slot and patch-log capacity for `count` more fields.
    pub fn reserve_table(&mut self, count: usize) -> BuildResult<()> {
        // A hint cannot exceed the addressable id space.
        let count = count.min(usize::from(FIELD_ID_MAX) + 1);
        self.vs.warm();
        self.pl.warm();
        self.vs.reserve(count + 2);
        self.pl.reserve(count);
        Ok(())
    }

    fn push_ds_field(&mut self, id: VOffset, size: usize, align: u16) -> BuildResult<usize> {
        self.expect_kind(FrameKind::Table, "field added outside a table frame")?;
        if id > FIELD_ID_MAX {
            return Err(BuildError::Misuse("field id out of range"));
        }
        let slot = self.vs_base + usize::from(id);
        if self.vs.len() <= slot {
            self.vs.resize(slot + 1, 0);
        }
        if self.vs[slot] != 0 {
            return Err(BuildError::Misuse("field already set"));
        }
        if align > self.align {
            self.align = align;
        }
        // Field offsets are relative to the first field byte; the table
        // header is accounted for by the FIELD_SIZE added to the slot.
        let offset = align_up(self.ds_cursor(), usize::from(align));
        if offset + size > self.ds_limit {
            return Err(BuildError::Overflow);
        }
        self.ds.resize(self.ds_base + offset + size, 0);
        self.vs[slot] = (offset + FIELD_SIZE) as VOffset;
        if id >= self.field_end {
            self.field_end = id + 1;
        }
        Ok(offset)
    }

    /// Allocate storage for field `id` and return it for the caller to fill.
    /// The slot is zeroed.
    pub fn table_add(&mut self, id: VOffset, size: usize, align: u16) -> BuildResult<&mut [u8]> {
        let align = Self::check_align(align)?;
        self.vt_hash = mix_vt_hash(self.vt_hash, u32::from(id), size as u32);
        let offset = self.push_ds_field(id, size, align)?;
        let start = self.ds_base + offset;
        Ok(&mut self.ds[start..start + size])
    }

    /// Add field `id` from existing bytes.
    pub fn table_add_copy(&mut self, id: VOffset, data: &[u8], align: u16) -> BuildResult<()> {
        self.table_add(id, data.len(), align)?.copy_from_slice(data);
        Ok(())
    }

    /// Add a scalar field.
    pub fn table_add_scalar<T: Scalar>(&mut self, id: VOffset, value: T) -> BuildResult<()> {
        value.write_to(self.table_add(id, T::SIZE, T::ALIGN as u16)?);
        Ok(())
    }

    /// Add an offset field referencing a previously built object. The stored
    /// value is relocated to its relative form when the table is emitted.
    pub fn table_add_offset(&mut self, id: VOffset, r: Ref) -> BuildResult<()> {
        if r.is_vtable() {
            return Err(BuildError::Misuse("vtable reference used as field value"));
        }
        self.vt_hash = mix_vt_hash(self.vt_hash, u32::from(id), FIELD_SIZE as u32);
        let offset = self.push_ds_field(id, FIELD_SIZE, FIELD_SIZE as u16)?;
        self.pl.warm();
        self.pl.push(offset as u32);
        let start = self.ds_base + offset;
        self.ds[start..start + FIELD_SIZE].copy_from_slice(&(r.addr() as i32).to_le_bytes());
        Ok(())
    }

    /// Check that every listed field id has been set on the current table.
    pub fn check_required(&self, required: &[VOffset]) -> BuildResult<()> {
        self.expect_kind(FrameKind::Table, "required check outside a table frame")?;
        for &id in required {
            let slot = self.vs.get(self.vs_base + usize::from(id)).copied().unwrap_or(0);
            if id >= self.field_end || slot == 0 {
                return Err(BuildError::Misuse("required field missing"));
            }
        }
        Ok(())
    }

    fn emit_vtable(&mut self, vt: &[u8]) -> BuildResult<Ref> {
        let mut iov = IoVec::new();
        iov.push(vt);
        // Only the top-level buffer can extend beyond the back edge; nested
        // vtables must stay inside their buffer's extent.
        if self.buffer_serial == 0 && self.clustering {
            // Back emission already returns address + 1.
            Self::emit_back_raw(&mut self.sink, &mut self.emit_end, &iov)
        } else {
            let r = Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)?;
            Ok(Ref::new(r.addr() + 1))
        }
    }

    /// Close the current table: materialize and deduplicate its vtable,
    /// relocate offset fields, and emit the body.
    pub fn end_table(&mut self) -> BuildResult<Ref> {
        self.expect_kind(FrameKind::Table, "end_table without start_table")?;

        let body_len = self.ds_cursor();
        let table_size = body_len + FIELD_SIZE;
        let n_slots = usize::from(self.field_end);
        let vt_size = (n_slots + 2) * VOFFSET_SIZE;

        let mut vt: SmallVec<[u8; 32]> = SmallVec::new();
        vt.extend_from_slice(&(vt_size as VOffset).to_le_bytes());
        vt.extend_from_slice(&(table_size as VOffset).to_le_bytes());
        for i in 0..n_slots {
            let slot = self.vs.get(self.vs_base + i).copied().unwrap_or(0);
            vt.extend_from_slice(&slot.to_le_bytes());
        }
        let hash = mix_vt_hash(self.vt_hash, vt_size as u32, table_size as u32);

        let vt_ref = match self.vtables.find(hash, &vt, self.buffer_serial) {
            Some(r) => {
                trace!("vtable cache hit at {}", r.addr());
                r
            }
            None => {
                let r = self.emit_vtable(&vt)?;
                trace!("vtable emitted at {}", r.addr() - 1);
                self.vtables.record(hash, &vt, self.buffer_serial, r);
                r
            }
        };

        let align = self.align.max(FIELD_SIZE as u16);
        self.set_min_align(align);
        // Alignment targets the first field, not the header.
        let pad = front_pad(self.emit_start, body_len, align);
        let base = self.emit_start - (pad + body_len + FIELD_SIZE) as i64;

        // Relocate offset fields from absolute references to offsets
        // relative to the field's own final position.
        for i in self.pl_base..self.pl.len() {
            let off = self.pl[i] as usize;
            let p = self.ds_base + off;
            let stored = i32::from_le_bytes(self.ds[p..p + FIELD_SIZE].try_into().unwrap());
            let rel = (i64::from(stored) - base - off as i64 - FIELD_SIZE as i64) as UOffset;
            self.ds[p..p + FIELD_SIZE].copy_from_slice(&rel.to_le_bytes());
        }

        let vt_base = vt_ref.addr() - 1;
        let vt_offset = base - vt_base;
        if vt_offset > i64::from(SOFFSET_MAX) || vt_offset < i64::from(SOFFSET_MIN) {
            return Err(BuildError::Overflow);
        }
        let vt_offset = (vt_offset as i32).to_le_bytes();

        let mut iov = IoVec::new();
        iov.push(&vt_offset);
        iov.push(&self.ds[self.ds_base..self.ds_base + body_len]);
        iov.push(&ZERO_PAD[..pad]);
        let table_ref = Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)?;
        debug_assert_eq!(table_ref.addr(), base);
        drop(iov);

        self.vs.truncate(self.vs_base);
        self.pl.truncate(self.pl_base);
        let frame = self.exit_frame();
        if let FramePayload::Table {
            vs_base,
            pl_base,
            field_end,
            vt_hash,
        } = frame.payload
        {
            self.vs_base = vs_base;
            self.pl_base = pl_base;
            self.field_end = field_end;
            self.vt_hash = vt_hash;
        }
        Ok(table_ref)
    }

    // ------------------------------------------------------------------
    // Structs.
    // ------------------------------------------------------------------

    /// Open a struct frame of exactly `size` bytes, returning the zeroed
    /// storage to fill.
    pub fn start_struct(&mut self, size: usize, align: u16) -> BuildResult<&mut [u8]> {
        let align = Self::check_align(align)?;
        self.enter_frame(align, FrameKind::Struct, FramePayload::Plain)?;
        self.push_ds(size)
    }

    /// The struct storage, for edits after `start_struct`.
    pub fn struct_data(&mut self) -> BuildResult<&mut [u8]> {
        self.expect_kind(FrameKind::Struct, "no struct frame open")?;
        let base = self.ds_base;
        Ok(&mut self.ds[base..])
    }

    /// Close the struct frame and emit its contents.
    pub fn end_struct(&mut self) -> BuildResult<Ref> {
        self.expect_kind(FrameKind::Struct, "end_struct without start_struct")?;
        let body_len = self.ds_cursor();
        let align = self.align;
        let r = self.emit_raw_block(self.ds_base, body_len, align)?;
        self.exit_frame();
        Ok(r)
    }

    /// Emit a struct from existing bytes, without a frame.
    pub fn create_struct(&mut self, data: &[u8], align: u16) -> BuildResult<Ref> {
        let align = Self::check_align(align)?;
        self.set_min_align(align);
        let pad = front_pad(self.emit_start, data.len(), align);
        let mut iov = IoVec::new();
        iov.push(data);
        // Structs are normally a multiple of their alignment already, so
        // this padding is rarely emitted.
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    fn emit_raw_block(&mut self, start: usize, len: usize, align: u16) -> BuildResult<Ref> {
        self.set_min_align(align);
        let pad = front_pad(self.emit_start, len, align);
        let mut iov = IoVec::new();
        iov.push(&self.ds[start..start + len]);
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    // ------------------------------------------------------------------
    // Vectors.
    // ------------------------------------------------------------------

    /// Open a vector frame for `elem_size`-byte elements. `max_count` bounds
    /// the element count; it is clamped so the byte size stays representable.
    pub fn start_vector(&mut self, elem_size: usize, align: u16, max_count: usize) -> BuildResult<()> {
        if elem_size == 0 {
            return Err(BuildError::Misuse("vector element size must be non-zero"));
        }
        let align = Self::check_align(align)?.max(FIELD_SIZE as u16);
        self.enter_frame(
            align,
            FrameKind::Vector,
            FramePayload::Vector {
                elem_size,
                count: 0,
                max_count: max_count.min(count_max(elem_size)),
            },
        )
    }

    fn vector_count_add(&mut self, n: usize, kinds: &[FrameKind]) -> BuildResult<usize> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(BuildError::Misuse("no vector frame open"))?;
        if !kinds.contains(&frame.kind) {
            return Err(BuildError::Misuse("operation does not match the open frame"));
        }
        match &mut frame.payload {
            FramePayload::Vector {
                elem_size,
                count,
                max_count,
            } => {
                let n1 = count.checked_add(n).ok_or(BuildError::Overflow)?;
                if n1 > *max_count {
                    return Err(BuildError::Overflow);
                }
                *count = n1;
                Ok(*elem_size)
            }
            _ => Err(BuildError::Misuse("operation does not match the open frame")),
        }
    }

    fn vector_count_sub(&mut self, n: usize, kinds: &[FrameKind]) -> BuildResult<usize> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(BuildError::Misuse("no vector frame open"))?;
        if !kinds.contains(&frame.kind) {
            return Err(BuildError::Misuse("operation does not match the open frame"));
        }
        match &mut frame.payload {
            FramePayload::Vector {
                elem_size, count, ..
            } => {
                if *count < n {
                    return Err(BuildError::Misuse("truncation past the element count"));
                }
                *count -= n;
                Ok(*elem_size)
            }
            _ => Err(BuildError::Misuse("operation does not match the open frame")),
        }
    }

    fn vector_state(&self, kinds: &[FrameKind]) -> BuildResult<(usize, usize)> {
        match self.frames.last() {
            Some(frame) if kinds.contains(&frame.kind) => match frame.payload {
                FramePayload::Vector {
                    elem_size, count, ..
                } => Ok((elem_size, count)),
                _ => Err(BuildError::Misuse("operation does not match the open frame")),
            },
            _ => Err(BuildError::Misuse("operation does not match the open frame")),
        }
    }

    /// Append `n` zeroed elements, returning their storage.
    pub fn extend_vector(&mut self, n: usize) -> BuildResult<&mut [u8]> {
        let elem_size = self.vector_count_add(n, &[FrameKind::Vector])?;
        self.push_ds(elem_size * n)
    }

    /// Append one element from its encoded bytes.
    pub fn vector_push(&mut self, elem: &[u8]) -> BuildResult<()> {
        let elem_size = self.vector_count_add(1, &[FrameKind::Vector])?;
        if elem.len() != elem_size {
            return Err(BuildError::Misuse("element size mismatch"));
        }
        self.push_ds_copy(elem)
    }

    /// Append encoded elements; `data` must be a whole number of elements.
    pub fn append_vector(&mut self, data: &[u8]) -> BuildResult<()> {
        let (elem_size, _) = self.vector_state(&[FrameKind::Vector])?;
        if data.len() % elem_size != 0 {
            return Err(BuildError::Misuse("element size mismatch"));
        }
        self.vector_count_add(data.len() / elem_size, &[FrameKind::Vector])?;
        self.push_ds_copy(data)
    }

    /// Drop the last `n` elements.
    pub fn truncate_vector(&mut self, n: usize) -> BuildResult<()> {
        let elem_size = self.vector_count_sub(n, &[FrameKind::Vector])?;
        self.unpush_ds(elem_size * n);
        Ok(())
    }

    /// Elements added to the open vector so far.
    pub fn vector_count(&self) -> BuildResult<usize> {
        self.vector_state(&[FrameKind::Vector, FrameKind::OffsetVector])
            .map(|(_, count)| count)
    }

    /// The accumulated element storage, for edits.
    pub fn vector_data(&mut self) -> BuildResult<&mut [u8]> {
        self.expect_kind(FrameKind::Vector, "no vector frame open")?;
        let base = self.ds_base;
        Ok(&mut self.ds[base..])
    }

    /// Close the vector frame: emit `[length][elements]` with the first
    /// element aligned.
    pub fn end_vector(&mut self) -> BuildResult<Ref> {
        let (elem_size, count) = self.vector_state(&[FrameKind::Vector])?;
        debug_assert_eq!(self.ds_cursor(), elem_size * count);
        let align = self.align;
        let r = self.emit_length_prefixed(self.ds_base, elem_size * count, count, align)?;
        self.exit_frame();
        Ok(r)
    }

    /// Emit a vector from pre-encoded elements, without a frame.
    pub fn create_vector(
        &mut self,
        data: &[u8],
        elem_size: usize,
        align: u16,
        max_count: usize,
    ) -> BuildResult<Ref> {
        if elem_size == 0 || data.len() % elem_size != 0 {
            return Err(BuildError::Misuse("element size mismatch"));
        }
        let count = data.len() / elem_size;
        if count > max_count.min(count_max(elem_size)) {
            return Err(BuildError::Overflow);
        }
        let align = Self::check_align(align)?.max(FIELD_SIZE as u16);
        self.set_min_align(align);
        let pad = front_pad(self.emit_start, data.len(), align);
        let length = (count as UOffset).to_le_bytes();
        let mut iov = IoVec::new();
        iov.push(&length);
        iov.push(data);
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    /// Emit a vector of scalars, without a frame.
    pub fn create_scalar_vector<T: Scalar>(&mut self, values: &[T]) -> BuildResult<Ref> {
        let mut data = vec![0u8; values.len() * T::SIZE];
        for (chunk, v) in data.chunks_exact_mut(T::SIZE).zip(values) {
            v.write_to(chunk);
        }
        self.create_vector(&data, T::SIZE, T::ALIGN as u16, count_max(T::SIZE))
    }

    fn emit_length_prefixed(
        &mut self,
        start: usize,
        len: usize,
        count: usize,
        align: u16,
    ) -> BuildResult<Ref> {
        self.set_min_align(align);
        let pad = front_pad(self.emit_start, len, align);
        let length = (count as UOffset).to_le_bytes();
        let mut iov = IoVec::new();
        iov.push(&length);
        iov.push(&self.ds[start..start + len]);
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    // ------------------------------------------------------------------
    // Offset vectors.
    // ------------------------------------------------------------------

    /// Open an offset-vector frame; elements are references to previously
    /// built objects.
    pub fn start_offset_vector(&mut self) -> BuildResult<()> {
        self.enter_frame(
            FIELD_SIZE as u16,
            FrameKind::OffsetVector,
            FramePayload::Vector {
                elem_size: FIELD_SIZE,
                count: 0,
                max_count: count_max(FIELD_SIZE),
            },
        )
    }

    /// Append one reference.
    pub fn offset_vector_push(&mut self, r: Ref) -> BuildResult<()> {
        if r.is_vtable() {
            return Err(BuildError::Misuse("vtable reference used as element"));
        }
        self.vector_count_add(1, &[FrameKind::OffsetVector])?;
        self.push_ds_copy(&(r.addr() as i32).to_le_bytes())
    }

    /// Append references in order.
    pub fn append_offset_vector(&mut self, refs: &[Ref]) -> BuildResult<()> {
        for &r in refs {
            self.offset_vector_push(r)?;
        }
        Ok(())
    }

    /// Drop the last `n` references.
    pub fn truncate_offset_vector(&mut self, n: usize) -> BuildResult<()> {
        let elem_size = self.vector_count_sub(n, &[FrameKind::OffsetVector])?;
        self.unpush_ds(elem_size * n);
        Ok(())
    }

    /// References added to the open offset vector so far.
    pub fn offset_vector_count(&self) -> BuildResult<usize> {
        self.vector_state(&[FrameKind::OffsetVector])
            .map(|(_, count)| count)
    }

    /// Close the offset-vector frame, relocating each stored reference to be
    /// relative to its element's own final position.
    pub fn end_offset_vector(&mut self) -> BuildResult<Ref> {
        let (_, count) = self.vector_state(&[FrameKind::OffsetVector])?;
        let vec_size = count * FIELD_SIZE;
        let align = FIELD_SIZE as u16;
        self.set_min_align(align);
        let pad = front_pad(self.emit_start, vec_size, align);
        let base = self.emit_start - (FIELD_SIZE + vec_size + pad) as i64;
        for i in 0..count {
            let p = self.ds_base + i * FIELD_SIZE;
            let stored = i32::from_le_bytes(self.ds[p..p + FIELD_SIZE].try_into().unwrap());
            let elem_pos = base + (FIELD_SIZE + i * FIELD_SIZE) as i64;
            let rel = (i64::from(stored) - elem_pos) as UOffset;
            self.ds[p..p + FIELD_SIZE].copy_from_slice(&rel.to_le_bytes());
        }
        let length = (count as UOffset).to_le_bytes();
        let mut iov = IoVec::new();
        iov.push(&length);
        iov.push(&self.ds[self.ds_base..self.ds_base + vec_size]);
        iov.push(&ZERO_PAD[..pad]);
        let r = Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)?;
        debug_assert_eq!(r.addr(), base);
        drop(iov);
        self.exit_frame();
        Ok(r)
    }

    /// Emit an offset vector from existing references, without a frame.
    pub fn create_offset_vector(&mut self, refs: &[Ref]) -> BuildResult<Ref> {
        self.start_offset_vector()?;
        self.append_offset_vector(refs)?;
        self.end_offset_vector()
    }

    // ------------------------------------------------------------------
    // Strings.
    // ------------------------------------------------------------------

    /// Open a string frame.
    pub fn start_string(&mut self) -> BuildResult<()> {
        self.enter_frame(
            1,
            FrameKind::String,
            FramePayload::Vector {
                elem_size: 1,
                count: 0,
                max_count: count_max(1),
            },
        )
    }

    /// Append UTF-8 text.
    pub fn append_string(&mut self, s: &str) -> BuildResult<()> {
        self.vector_count_add(s.len(), &[FrameKind::String])?;
        self.push_ds_copy(s.as_bytes())
    }

    /// Append `n` zero bytes, returning them for the caller to fill.
    pub fn extend_string(&mut self, n: usize) -> BuildResult<&mut [u8]> {
        self.vector_count_add(n, &[FrameKind::String])?;
        self.push_ds(n)
    }

    /// Drop the last `n` bytes.
    pub fn truncate_string(&mut self, n: usize) -> BuildResult<()> {
        self.vector_count_sub(n, &[FrameKind::String])?;
        self.unpush_ds(n);
        Ok(())
    }

    /// Bytes added to the open string so far.
    pub fn string_len(&self) -> BuildResult<usize> {
        self.vector_state(&[FrameKind::String]).map(|(_, count)| count)
    }

    /// Close the string frame: emit `[length][bytes][NUL]`; the terminator is
    /// not counted by the length prefix.
    pub fn end_string(&mut self) -> BuildResult<Ref> {
        let (_, count) = self.vector_state(&[FrameKind::String])?;
        debug_assert_eq!(count, self.ds_cursor());
        let r = self.emit_string_block(self.ds_base, count)?;
        self.exit_frame();
        Ok(r)
    }

    /// Emit a string, without a frame.
    pub fn create_string(&mut self, s: &str) -> BuildResult<Ref> {
        if s.len() > count_max(1) {
            return Err(BuildError::Overflow);
        }
        self.set_min_align(FIELD_SIZE as u16);
        // One terminator byte rides along with the alignment padding.
        let pad = front_pad(self.emit_start, s.len() + 1, FIELD_SIZE as u16) + 1;
        let length = (s.len() as UOffset).to_le_bytes();
        let mut iov = IoVec::new();
        iov.push(&length);
        iov.push(s.as_bytes());
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    fn emit_string_block(&mut self, start: usize, len: usize) -> BuildResult<Ref> {
        self.set_min_align(FIELD_SIZE as u16);
        let pad = front_pad(self.emit_start, len + 1, FIELD_SIZE as u16) + 1;
        let length = (len as UOffset).to_le_bytes();
        let mut iov = IoVec::new();
        iov.push(&length);
        iov.push(&self.ds[start..start + len]);
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    // ------------------------------------------------------------------
    // Buffer framing.
    // ------------------------------------------------------------------

    /// Open a buffer frame. The identifier (zero-padded to 4 bytes) is
    /// placed after the root offset; `block_align` 0 defers to
    /// [`Builder::set_block_align`]. Buffers nest: a non-top buffer is
    /// emitted with a size prefix so it can sit in a byte-vector field.
    pub fn start_buffer(
        &mut self,
        identifier: Option<FileIdentifier>,
        block_align: u16,
        flags: BufferFlags,
    ) -> BuildResult<()> {
        if block_align != 0 {
            Self::check_align(block_align)?;
        }
        // The frame's align slot carries the parent's min_align across the
        // child buffer; exit_frame folds it back up.
        self.enter_frame(
            self.min_align,
            FrameKind::Buffer,
            FramePayload::Buffer {
                block_align: self.block_align,
                mark: self.buffer_mark,
                serial: self.buffer_serial,
                identifier: self.identifier,
                nested: false,
                with_size: flags.contains(BufferFlags::WITH_SIZE),
            },
        )?;
        let nested = self.frames.len() > 1;
        if let Some(FramePayload::Buffer { nested: n, .. }) =
            self.frames.last_mut().map(|f| &mut f.payload)
        {
            *n = nested;
        }
        self.min_align = 1;
        self.block_align = block_align;
        self.buffer_mark = if nested { self.emit_start } else { 0 };
        self.buffer_serial = if nested {
            self.next_buffer_serial += 1;
            self.next_buffer_serial
        } else {
            0
        };
        self.identifier = identifier.unwrap_or_default();
        Ok(())
    }

    /// Close the buffer frame: pad the tail to the block alignment, then
    /// prepend the root offset and identifier with aligning front padding.
    pub fn end_buffer(&mut self, root: Ref) -> BuildResult<Ref> {
        self.expect_kind(FrameKind::Buffer, "end_buffer without start_buffer")?;
        let (nested, with_size) = match self.frames.last().map(|f| &f.payload) {
            Some(&FramePayload::Buffer {
                nested, with_size, ..
            }) => (nested, with_size),
            _ => unreachable!(),
        };
        self.set_min_align(self.block_align);
        let r = self.frame_buffer(
            self.identifier,
            self.block_align,
            root,
            self.min_align,
            nested,
            with_size,
        )?;
        debug!(
            "buffer finished: {} bytes, align {}",
            self.buffer_size(),
            self.min_align
        );
        let frame = self.exit_frame();
        if let FramePayload::Buffer {
            block_align,
            mark,
            serial,
            identifier,
            ..
        } = frame.payload
        {
            self.block_align = block_align;
            self.buffer_mark = mark;
            self.buffer_serial = serial;
            self.identifier = identifier;
        }
        Ok(r)
    }

    /// One-shot framing of an already built root, without a buffer frame.
    /// The buffer is treated as top level; `WITH_SIZE` adds the size prefix.
    pub fn create_buffer(
        &mut self,
        identifier: Option<FileIdentifier>,
        block_align: u16,
        root: Ref,
        align: u16,
        flags: BufferFlags,
    ) -> BuildResult<Ref> {
        if block_align != 0 {
            Self::check_align(block_align)?;
        }
        self.frame_buffer(
            identifier.unwrap_or_default(),
            block_align,
            root,
            Self::check_align(align.max(1))?,
            false,
            flags.contains(BufferFlags::WITH_SIZE),
        )
    }

    fn frame_buffer(
        &mut self,
        identifier: FileIdentifier,
        block_align: u16,
        root: Ref,
        align: u16,
        nested: bool,
        with_size: bool,
    ) -> BuildResult<Ref> {
        if root.is_vtable() {
            return Err(BuildError::Misuse("vtable reference used as buffer root"));
        }
        let block_align = self.resolve_block_align(block_align);
        let align = align.max(FIELD_SIZE as u16).max(block_align);
        if !nested {
            self.pad_back_to(block_align)?;
        }
        self.set_min_align(align);

        let id_size = if identifier.is_null() { 0 } else { IDENTIFIER_SIZE };
        let prefix = nested || with_size;
        let header_pad = front_pad(self.emit_start, FIELD_SIZE + id_size, align);
        let header_len = if prefix { FIELD_SIZE } else { 0 } + FIELD_SIZE + id_size + header_pad;
        let buffer_base = self.emit_start - header_len as i64 + if prefix { FIELD_SIZE as i64 } else { 0 };
        // A nested buffer's content ends where it began emitting; a size
        // prefixed top-level buffer runs to the clustered tail.
        let content_end = if nested { self.buffer_mark } else { self.emit_end };
        let size_field = ((content_end - buffer_base) as UOffset).to_le_bytes();
        let root_field = ((root.addr() - buffer_base) as UOffset).to_le_bytes();

        let mut iov = IoVec::new();
        if prefix {
            iov.push(&size_field);
        }
        iov.push(&root_field);
        if id_size != 0 {
            iov.push(&identifier.as_bytes()[..]);
        }
        iov.push(&ZERO_PAD[..header_pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    /// Store a complete pre-built buffer so it can sit in a byte-vector
    /// field: `[size prefix][contents][pad]`, with the padding counted by the
    /// prefix so readers see one contiguous byte vector.
    pub fn embed_buffer(&mut self, data: &[u8], align: u16, block_align: u16) -> BuildResult<Ref> {
        if block_align != 0 {
            Self::check_align(block_align)?;
        }
        let block_align = self.resolve_block_align(block_align);
        let align = Self::check_align(align.max(1))?
            .max(FIELD_SIZE as u16)
            .max(block_align);
        self.set_min_align(align);
        let pad = front_pad(self.emit_start, data.len(), align);
        let size_field = ((data.len() + pad) as UOffset).to_le_bytes();
        let mut iov = IoVec::new();
        iov.push(&size_field);
        iov.push(data);
        iov.push(&ZERO_PAD[..pad]);
        Self::emit_front_raw(&mut self.sink, &mut self.emit_start, &iov)
    }

    fn resolve_block_align(&self, block_align: u16) -> u16 {
        if block_align != 0 {
            block_align
        } else if self.block_align != 0 {
            self.block_align
        } else {
            1
        }
    }

    fn pad_back_to(&mut self, block_align: u16) -> BuildResult<()> {
        let pad = ((-self.emit_end) & (i64::from(block_align) - 1)) as usize;
        if pad > 0 {
            let mut iov = IoVec::new();
            iov.push(&ZERO_PAD[..pad]);
            Self::emit_back_raw(&mut self.sink, &mut self.emit_end, &iov)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_string_layout() {
        let mut b = Builder::new();
        let r = b.create_string("abc").unwrap();
        assert_eq!(r.addr(), -8);
        assert_eq!(b.finalize(), b"\x03\0\0\0abc\0");
    }

    #[test]
    fn empty_table_clusters_vtable_at_back() {
        let mut b = Builder::new();
        b.start_table(0).unwrap();
        b.check_required(&[]).unwrap();
        let t = b.end_table().unwrap();
        assert_eq!(t.addr(), -4);
        // soffset -4 points back across the table to the clustered vtable
        // [vt_size=4, table_size=4].
        assert_eq!(b.finalize(), b"\xfc\xff\xff\xff\x04\0\x04\0");
    }

    #[test]
    fn inline_vtable_when_clustering_disabled() {
        let mut b = Builder::new();
        b.set_vtable_clustering(false);
        b.start_table(0).unwrap();
        let t = b.end_table().unwrap();
        // Table header first (lower address), vtable right behind it.
        assert_eq!(t.addr(), -8);
        assert_eq!(b.finalize(), b"\xfc\xff\xff\xff\x04\0\x04\0");
    }

    #[test]
    fn scalar_field_layout() {
        let mut b = Builder::new();
        b.start_table(1).unwrap();
        b.table_add_scalar::<i32>(0, 7).unwrap();
        let t = b.end_table().unwrap();
        assert_eq!(t.addr(), -8);
        let buf = b.finalize();
        // [soffset=-8][7i32][vt_size=6, table_size=8, slot0=4]
        assert_eq!(
            buf,
            b"\xf8\xff\xff\xff\x07\0\0\0\x06\0\x08\0\x04\0"
        );
    }

    #[test]
    fn duplicate_field_is_misuse() {
        let mut b = Builder::new();
        b.start_table(1).unwrap();
        b.table_add_scalar::<u8>(0, 1).unwrap();
        assert_eq!(
            b.table_add_scalar::<u8>(0, 2),
            Err(BuildError::Misuse("field already set"))
        );
    }

    #[test]
    fn required_field_enforced() {
        let mut b = Builder::new();
        b.start_table(2).unwrap();
        b.table_add_scalar::<u8>(1, 1).unwrap();
        assert!(b.check_required(&[1]).is_ok());
        assert_eq!(
            b.check_required(&[0]),
            Err(BuildError::Misuse("required field missing"))
        );
    }

    #[test]
    fn vector_push_and_truncate() {
        let mut b = Builder::new();
        b.start_vector(2, 2, usize::MAX).unwrap();
        b.vector_push(&5u16.to_le_bytes()).unwrap();
        b.vector_push(&6u16.to_le_bytes()).unwrap();
        b.vector_push(&7u16.to_le_bytes()).unwrap();
        b.truncate_vector(1).unwrap();
        assert_eq!(b.vector_count().unwrap(), 2);
        let r = b.end_vector().unwrap();
        assert_eq!(r.addr(), -8);
        assert_eq!(b.finalize(), b"\x02\0\0\0\x05\0\x06\0");
    }

    #[test]
    fn string_frame_matches_create_string() {
        let mut b = Builder::new();
        b.start_string().unwrap();
        b.append_string("ab").unwrap();
        b.append_string("c").unwrap();
        assert_eq!(b.string_len().unwrap(), 3);
        b.end_string().unwrap();
        let framed = b.finalize();

        let mut b = Builder::new();
        b.create_string("abc").unwrap();
        assert_eq!(framed, b.finalize());
    }

    #[test]
    fn too_nested_reports() {
        let mut b = Builder::new();
        b.set_max_level(1);
        b.start_table(0).unwrap();
        assert_eq!(b.start_string(), Err(BuildError::TooNested));
    }

    #[test]
    fn wrong_frame_is_misuse() {
        let mut b = Builder::new();
        b.start_table(0).unwrap();
        assert!(matches!(
            b.vector_push(&[0, 0]),
            Err(BuildError::Misuse(_))
        ));
        assert!(matches!(b.end_vector(), Err(BuildError::Misuse(_))));
    }

    #[test]
    fn reset_reuses_builder() {
        let mut b = Builder::new();
        b.create_string("first").unwrap();
        b.reset();
        assert_eq!(b.buffer_size(), 0);
        let r = b.create_string("ab").unwrap();
        assert_eq!(r.addr(), -8);
        assert_eq!(b.finalize(), b"\x02\0\0\0ab\0\0");
    }

    #[test]
    fn struct_emission_aligns_block() {
        let mut b = Builder::new();
        b.create_string("x").unwrap(); // emit_start now -8
        let data = [1u8; 12];
        let r = b.create_struct(&data, 8).unwrap();
        // 12 bytes need 4 front pad bytes so the struct starts 8-aligned.
        assert_eq!(r.addr() % 8, 0);
        assert_eq!(b.buffer_alignment(), 8);
    }

    #[test]
    fn offset_vector_relocates_elements() {
        let mut b = Builder::new();
        let a = b.create_string("a").unwrap();
        let bb = b.create_string("bb").unwrap();
        b.start_offset_vector().unwrap();
        b.offset_vector_push(a).unwrap();
        b.offset_vector_push(bb).unwrap();
        let v = b.end_offset_vector().unwrap();
        let buf = b.finalize();
        let base = (v.addr() - b.emit_start()) as usize;
        assert_eq!(planar_format::read_uoffset(&buf, base as u32), 2);
        for i in 0..2 {
            let elem = base + 4 + i * 4;
            let rel = planar_format::read_uoffset(&buf, elem as u32);
            let target = elem as u32 + rel;
            // Each element lands on a string length prefix.
            let len = planar_format::read_uoffset(&buf, target);
            assert_eq!(len as usize, i + 1);
        }
    }

    #[test]
    fn user_state_is_frame_scoped() {
        let mut b = Builder::new();
        b.set_user_state(7);
        b.start_table(0).unwrap();
        b.set_user_state(9);
        assert_eq!(b.user_state(), 9);
        b.end_table().unwrap();
        assert_eq!(b.user_state(), 7);
    }
}
