//! The builder's frame stack.
//!
//! Each `start_*`/`end_*` pair runs inside one frame. A frame captures the
//! caller's data-stack position and alignment so that `end_*` can emit the
//! frame's contents, discard its data-stack span and return the caller to
//! exactly the state it had. The one exception is alignment, which folds
//! upward: a parent must end up at least as aligned as its most demanding
//! child.

use planar_format::FileIdentifier;

/// What kind of object a frame is assembling.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum FrameKind {
    Table,
    Struct,
    Vector,
    OffsetVector,
    String,
    Buffer,
}

/// Per-kind frame payload, holding the caller state the kind shadows.
pub(crate) enum FramePayload {
    /// Structs carry no extra state; the data stack span is the struct.
    Plain,
    /// Saved table-building state of the enclosing table, if any.
    Table {
        vs_base: usize,
        pl_base: usize,
        field_end: u16,
        vt_hash: u32,
    },
    /// Element bookkeeping for vectors, offset vectors and strings.
    Vector {
        elem_size: usize,
        count: usize,
        max_count: usize,
    },
    /// Saved buffer framing state of the enclosing buffer.
    Buffer {
        block_align: u16,
        mark: i64,
        serial: i64,
        identifier: FileIdentifier,
        nested: bool,
        with_size: bool,
    },
}

/// One level of the builder's nesting stack.
pub(crate) struct Frame {
    pub kind: FrameKind,
    /// Data-stack length at entry; `exit` truncates back to this.
    pub ds_len: usize,
    /// Caller's data-stack base.
    pub ds_base: usize,
    /// Caller's data-stack limit (table vs. general data clamp).
    pub ds_limit: usize,
    /// Caller's accumulated alignment.
    pub align: u16,
    /// Caller's user state scalar.
    pub user_state: usize,
    pub payload: FramePayload,
}
