//! Buffer verification.
//!
//! The verifier proves that every offset, vtable, string, vector, table and
//! union reachable from a buffer's root is in-bounds, aligned and
//! well-formed, so a schema-conformant reader can access the buffer without
//! further checks. It is a pure function over the byte slice: it never
//! mutates, never panics on hostile input (including the empty slice), runs
//! in time linear in the buffer size, and reports the first failure as a
//! specific [`VerifyError`].
//!
//! Table verification is driven from outside: the verifier validates the
//! table skeleton (header, vtable, size) and hands a [`TableContext`] to a
//! [`TableVerify`] implementation, which checks each field it knows about
//! through the `verify_*_field` helpers. [`crate::schema::TableDecl`]
//! implements [`TableVerify`], so a descriptor can stand in for a generated
//! verifier function.
//!
//! What is deliberately *not* guaranteed: hostile buffers may contain
//! overlapping objects. Verification makes reading safe, not rewriting;
//! a verified buffer must still be treated as read-only.

use crate::schema::{ElemType, FieldType, TableDecl, UnionDecl, UnionType};
use planar_format::{
    count_max, read_soffset, read_uoffset, read_voffset, FileIdentifier, VOffset, IDENTIFIER_SIZE,
    UOFFSET_MAX, UOFFSET_SIZE, VOFFSET_SIZE,
};
use thiserror::Error;

/// Default verification recursion budget.
pub const MAX_LEVELS: u32 = 100;

/// One error per failure path, so tests can assert the exact check that
/// tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Buffer too small to hold the root offset and identifier slot.
    #[error("buffer header too small")]
    BadHeader,
    /// The buffer's identifier does not match the expected one.
    #[error("buffer identifier mismatch")]
    IdentifierMismatch,
    /// Buffer size exceeds the representable offset range.
    #[error("buffer size out of range")]
    SizeOutOfRange,
    /// A position is not aligned to its target's requirement.
    #[error("misaligned offset target")]
    Alignment,
    /// An offset is null, wraps, or points past the buffer end.
    #[error("offset out of range")]
    OffsetOutOfRange,
    /// A vtable's size field is too small, odd, or exceeds the buffer.
    #[error("vtable size out of range")]
    VtableSize,
    /// A table's vtable link points outside the buffer or is misaligned.
    #[error("vtable offset out of range")]
    VtableOffset,
    /// A table's declared size exceeds the buffer.
    #[error("table size out of range")]
    TableSize,
    /// A field's storage exceeds the table's declared size.
    #[error("table field out of range")]
    TableFieldOutOfRange,
    /// A string's zero terminator is missing or unprovable in range.
    #[error("string not zero-terminated")]
    StringUnterminated,
    /// A vector's elements run past the buffer end.
    #[error("vector out of range")]
    VectorOutOfRange,
    /// A vector's element count exceeds the representable byte size.
    #[error("vector count overflow")]
    VectorCountOverflow,
    /// A union carries a type tag the verifier does not know.
    #[error("unknown union type")]
    UnionTypeUnknown,
    /// A union has a known type tag but no value.
    #[error("union value missing")]
    UnionMissingValue,
    /// A union of type NONE (or with no type field) carries a value.
    #[error("union of type NONE carries a value")]
    UnionNoneWithValue,
    /// A field marked required is absent.
    #[error("required field absent")]
    RequiredFieldAbsent,
    /// Nesting exceeded the recursion budget.
    #[error("max verification depth exceeded")]
    MaxDepthExceeded,
}

/// Result of verification; errors propagate unchanged up the recursion.
pub type VerifyResult<T = ()> = Result<T, VerifyError>;

macro_rules! ensure {
    ($cond:expr, $err:tt) => {
        if !$cond {
            return Err(VerifyError::$err);
        }
    };
}

/// Verifies one table type: checks each known field of the table handed to
/// it via [`TableContext`]. Implemented by [`TableDecl`] and by plain
/// function pointers ([`TableVerifierFn`]).
pub trait TableVerify {
    /// Verify all known fields of the table described by `td`.
    fn verify_table(&self, td: &mut TableContext<'_>) -> VerifyResult;
}

/// A hand-written table verifier function.
pub type TableVerifierFn = for<'a, 'b> fn(&'a mut TableContext<'b>) -> VerifyResult;

impl TableVerify for TableVerifierFn {
    fn verify_table(&self, td: &mut TableContext<'_>) -> VerifyResult {
        self(td)
    }
}

/// Verifies one union value given its type tag. Implemented by
/// [`UnionDecl`] and by plain function pointers ([`UnionVerifierFn`]).
pub trait UnionVerify {
    /// Verify the union value at field `id`, whose tag is `tag` (never 0).
    fn verify_union(&self, td: &mut TableContext<'_>, id: VOffset, tag: u8) -> VerifyResult;
}

/// A hand-written union verifier function.
pub type UnionVerifierFn = for<'a, 'b> fn(&'a mut TableContext<'b>, VOffset, u8) -> VerifyResult;

impl UnionVerify for UnionVerifierFn {
    fn verify_union(&self, td: &mut TableContext<'_>, id: VOffset, tag: u8) -> VerifyResult {
        self(td, id, tag)
    }
}

/// Offset target with null rejection, range and uoffset alignment checks.
fn check_header(end: u32, base: u32, offset: u32) -> VerifyResult<u32> {
    let k = base.checked_add(offset).ok_or(VerifyError::OffsetOutOfRange)?;
    // `>` rather than `>=` rejects null offsets.
    ensure!(k > base, OffsetOutOfRange);
    ensure!(u64::from(k) + UOFFSET_SIZE as u64 <= u64::from(end), OffsetOutOfRange);
    ensure!(k & (UOFFSET_SIZE as u32 - 1) == 0, Alignment);
    Ok(k)
}

fn check_aligned_header(end: u32, base: u32, offset: u32, align: u16) -> VerifyResult<u32> {
    let k = check_header(end, base, offset)?;
    ensure!(k & (u32::from(align.max(1)) - 1) == 0, Alignment);
    Ok(k)
}

fn verify_struct(end: u32, base: u32, align: u16, size: usize) -> VerifyResult {
    ensure!(base > 0, OffsetOutOfRange);
    ensure!(u64::from(base) + size as u64 <= u64::from(end), OffsetOutOfRange);
    ensure!(base & (u32::from(align.max(1)) - 1) == 0, Alignment);
    Ok(())
}

fn verify_string(buf: &[u8], end: u32, base: u32, offset: u32) -> VerifyResult {
    let pos = check_header(end, base, offset)?;
    let n = read_uoffset(buf, pos);
    let data = pos + UOFFSET_SIZE as u32;
    ensure!(
        u64::from(end - data) >= u64::from(n) + 1,
        StringUnterminated
    );
    ensure!(buf[(data + n) as usize] == 0, StringUnterminated);
    Ok(())
}

/// Returns the position of the vector's length prefix.
fn verify_vector(
    buf: &[u8],
    end: u32,
    base: u32,
    offset: u32,
    align: u16,
    elem_size: usize,
    max_count: usize,
) -> VerifyResult<u32> {
    let pos = check_aligned_header(end, base, offset, align)?;
    let n = read_uoffset(buf, pos);
    let data = pos + UOFFSET_SIZE as u32;
    // Bounding the count first keeps `n * elem_size` from overflowing.
    ensure!(
        u64::from(n) <= max_count.min(count_max(elem_size)) as u64,
        VectorCountOverflow
    );
    ensure!(
        u64::from(end - data) >= u64::from(n) * elem_size as u64,
        VectorOutOfRange
    );
    Ok(pos)
}

fn verify_table(
    buf: &[u8],
    end: u32,
    base: u32,
    offset: u32,
    ttl: u32,
    tvf: &dyn TableVerify,
) -> VerifyResult {
    ensure!(ttl > 1, MaxDepthExceeded);
    let table = check_header(end, base, offset)?;
    let so = read_soffset(buf, table);
    let vtable = i64::from(table) - i64::from(so);
    ensure!(vtable >= 0 && vtable <= i64::from(UOFFSET_MAX), VtableOffset);
    let vtable = vtable as u32;
    ensure!(vtable & (VOFFSET_SIZE as u32 - 1) == 0, VtableOffset);
    ensure!(
        u64::from(vtable) + VOFFSET_SIZE as u64 <= u64::from(end),
        VtableOffset
    );
    let vsize = read_voffset(buf, vtable);
    ensure!(
        vsize as usize >= 2 * VOFFSET_SIZE && vsize & (VOFFSET_SIZE as u16 - 1) == 0,
        VtableSize
    );
    ensure!(u64::from(vtable) + u64::from(vsize) <= u64::from(end), VtableSize);
    let tsize = read_voffset(buf, vtable + VOFFSET_SIZE as u32);
    ensure!(u64::from(end - table) >= u64::from(tsize), TableSize);
    let mut td = TableContext {
        buf,
        end,
        table,
        vtable,
        vsize,
        tsize,
        ttl: ttl - 1,
    };
    tvf.verify_table(&mut td)
}

/// Verified skeleton of one table, handed to [`TableVerify`]
/// implementations. The header, vtable bounds and table size have been
/// checked; per-field checks happen through the `verify_*_field` methods.
pub struct TableContext<'a> {
    buf: &'a [u8],
    end: u32,
    table: u32,
    vtable: u32,
    vsize: u16,
    tsize: u16,
    ttl: u32,
}

impl<'a> TableContext<'a> {
    /// The buffer under verification.
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Position of this table's header within the buffer.
    pub fn table_pos(&self) -> u32 {
        self.table
    }

    /// Remaining recursion budget.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// The vtable slot for `id`, or 0 when absent or unaddressed.
    fn vt_entry(&self, id: VOffset) -> VOffset {
        let vo = (u32::from(id) + 2) * VOFFSET_SIZE as u32;
        if vo >= u32::from(self.vsize) {
            return 0;
        }
        read_voffset(self.buf, self.vtable + vo)
    }

    /// Verify an inline scalar, enum or struct field. Absence is fine:
    /// inline fields fall back to defaults.
    pub fn verify_field(&mut self, id: VOffset, align: u16, size: usize) -> VerifyResult {
        let vte = self.vt_entry(id);
        if vte == 0 {
            return Ok(());
        }
        // Checked against the table size, not the buffer end; the table
        // size itself was verified against the buffer.
        ensure!(
            u64::from(vte) + size as u64 <= u64::from(self.tsize),
            TableFieldOutOfRange
        );
        let pos = self.table + u32::from(vte);
        ensure!(pos & (u32::from(align.max(1)) - 1) == 0, Alignment);
        Ok(())
    }

    /// Absolute position of an offset-typed field's storage, or `None` when
    /// the field is absent.
    fn offset_field_pos(&self, id: VOffset) -> VerifyResult<Option<u32>> {
        let vte = self.vt_entry(id);
        if vte == 0 {
            return Ok(None);
        }
        ensure!(
            u64::from(vte) + UOFFSET_SIZE as u64 <= u64::from(self.tsize),
            TableFieldOutOfRange
        );
        let pos = self.table + u32::from(vte);
        ensure!(pos & (UOFFSET_SIZE as u32 - 1) == 0, Alignment);
        Ok(Some(pos))
    }

    fn required_offset(&self, id: VOffset, required: bool) -> VerifyResult<Option<u32>> {
        match self.offset_field_pos(id)? {
            None if required => Err(VerifyError::RequiredFieldAbsent),
            pos => Ok(pos),
        }
    }

    /// Verify a string field.
    pub fn verify_string_field(&mut self, id: VOffset, required: bool) -> VerifyResult {
        let Some(pos) = self.required_offset(id, required)? else {
            return Ok(());
        };
        verify_string(self.buf, self.end, pos, read_uoffset(self.buf, pos))
    }

    /// Verify a vector of scalars, enums or structs.
    pub fn verify_vector_field(
        &mut self,
        id: VOffset,
        required: bool,
        align: u16,
        elem_size: usize,
        max_count: usize,
    ) -> VerifyResult {
        let Some(pos) = self.required_offset(id, required)? else {
            return Ok(());
        };
        verify_vector(
            self.buf,
            self.end,
            pos,
            read_uoffset(self.buf, pos),
            align,
            elem_size,
            max_count,
        )?;
        Ok(())
    }

    /// Verify a vector of strings.
    pub fn verify_string_vector_field(&mut self, id: VOffset, required: bool) -> VerifyResult {
        let Some(pos) = self.required_offset(id, required)? else {
            return Ok(());
        };
        let vec = verify_vector(
            self.buf,
            self.end,
            pos,
            read_uoffset(self.buf, pos),
            UOFFSET_SIZE as u16,
            UOFFSET_SIZE,
            count_max(UOFFSET_SIZE),
        )?;
        let n = read_uoffset(self.buf, vec);
        let mut elem = vec + UOFFSET_SIZE as u32;
        for _ in 0..n {
            verify_string(self.buf, self.end, elem, read_uoffset(self.buf, elem))?;
            elem += UOFFSET_SIZE as u32;
        }
        Ok(())
    }

    /// Verify a table field, recursing through `tvf`.
    pub fn verify_table_field(
        &mut self,
        id: VOffset,
        required: bool,
        tvf: &dyn TableVerify,
    ) -> VerifyResult {
        let Some(pos) = self.required_offset(id, required)? else {
            return Ok(());
        };
        verify_table(
            self.buf,
            self.end,
            pos,
            read_uoffset(self.buf, pos),
            self.ttl,
            tvf,
        )
    }

    /// Verify a vector of tables, recursing through `tvf` per element.
    pub fn verify_table_vector_field(
        &mut self,
        id: VOffset,
        required: bool,
        tvf: &dyn TableVerify,
    ) -> VerifyResult {
        let Some(pos) = self.required_offset(id, required)? else {
            return Ok(());
        };
        ensure!(self.ttl > 0, MaxDepthExceeded);
        let vec = verify_vector(
            self.buf,
            self.end,
            pos,
            read_uoffset(self.buf, pos),
            UOFFSET_SIZE as u16,
            UOFFSET_SIZE,
            count_max(UOFFSET_SIZE),
        )?;
        let n = read_uoffset(self.buf, vec);
        let mut elem = vec + UOFFSET_SIZE as u32;
        for _ in 0..n {
            verify_table(
                self.buf,
                self.end,
                elem,
                read_uoffset(self.buf, elem),
                self.ttl - 1,
                tvf,
            )?;
            elem += UOFFSET_SIZE as u32;
        }
        Ok(())
    }

    /// Verify a union: the type tag at `id - 1` and the value at `id`.
    ///
    /// An absent type field means NONE. NONE forbids a value; a known tag
    /// requires one; the tag dispatch happens through `uvf`.
    pub fn verify_union_field(
        &mut self,
        id: VOffset,
        required: bool,
        uvf: &dyn UnionVerify,
    ) -> VerifyResult {
        assert!(id >= 1, "union value field id 0 leaves no room for the tag");
        let type_vte = self.vt_entry(id - 1);
        if type_vte == 0 {
            ensure!(self.vt_entry(id) == 0, UnionNoneWithValue);
            ensure!(!required, RequiredFieldAbsent);
            return Ok(());
        }
        self.verify_field(id - 1, 1, 1)?;
        let tag = self.buf[(self.table + u32::from(type_vte)) as usize];
        if tag == 0 {
            ensure!(self.vt_entry(id) == 0, UnionNoneWithValue);
            ensure!(!required, RequiredFieldAbsent);
            return Ok(());
        }
        uvf.verify_union(self, id, tag)
    }

    /// Verify a union value known to be a table. For use by [`UnionVerify`]
    /// implementations.
    pub fn verify_union_table(&mut self, id: VOffset, tvf: &dyn TableVerify) -> VerifyResult {
        let Some(pos) = self.offset_field_pos(id)? else {
            return Err(VerifyError::UnionMissingValue);
        };
        verify_table(
            self.buf,
            self.end,
            pos,
            read_uoffset(self.buf, pos),
            self.ttl,
            tvf,
        )
    }

    /// Verify a union value known to be a string.
    pub fn verify_union_string(&mut self, id: VOffset) -> VerifyResult {
        let Some(pos) = self.offset_field_pos(id)? else {
            return Err(VerifyError::UnionMissingValue);
        };
        verify_string(self.buf, self.end, pos, read_uoffset(self.buf, pos))
    }

    /// Verify a union value known to be a struct.
    pub fn verify_union_struct(&mut self, id: VOffset, align: u16, size: usize) -> VerifyResult {
        let Some(pos) = self.offset_field_pos(id)? else {
            return Err(VerifyError::UnionMissingValue);
        };
        let target = pos
            .checked_add(read_uoffset(self.buf, pos))
            .ok_or(VerifyError::OffsetOutOfRange)?;
        ensure!(target > pos, OffsetOutOfRange);
        verify_struct(self.end, target, align, size)
    }

    /// Verify a byte-vector field holding a complete nested buffer, then
    /// verify the nested root table.
    ///
    /// The enclosing traversal never checks nested identifiers on its own;
    /// pass `fid` here when the nested identifier matters.
    pub fn verify_table_as_nested_root(
        &mut self,
        id: VOffset,
        required: bool,
        fid: Option<FileIdentifier>,
        align: u16,
        tvf: &dyn TableVerify,
    ) -> VerifyResult {
        let Some(sub) = self.nested_buffer_slice(id, required, align)? else {
            return Ok(());
        };
        verify_buffer_header(sub, fid)?;
        verify_table(sub, sub.len() as u32, 0, read_uoffset(sub, 0), self.ttl, tvf)
    }

    /// Verify a byte-vector field holding a nested buffer whose root is a
    /// struct.
    pub fn verify_struct_as_nested_root(
        &mut self,
        id: VOffset,
        required: bool,
        fid: Option<FileIdentifier>,
        align: u16,
        size: usize,
    ) -> VerifyResult {
        let Some(sub) = self.nested_buffer_slice(id, required, align)? else {
            return Ok(());
        };
        verify_buffer_header(sub, fid)?;
        verify_struct(sub.len() as u32, read_uoffset(sub, 0), align, size)
    }

    fn nested_buffer_slice(
        &self,
        id: VOffset,
        required: bool,
        align: u16,
    ) -> VerifyResult<Option<&'a [u8]>> {
        let Some(pos) = self.required_offset(id, required)? else {
            return Ok(None);
        };
        let vec = verify_vector(
            self.buf,
            self.end,
            pos,
            read_uoffset(self.buf, pos),
            align.max(UOFFSET_SIZE as u16),
            1,
            count_max(1),
        )?;
        let n = read_uoffset(self.buf, vec);
        let data = (vec + UOFFSET_SIZE as u32) as usize;
        Ok(Some(&self.buf[data..data + n as usize]))
    }
}

/// Verify the buffer header: size sanity and, when `fid` is given and
/// non-null, the 4-byte identifier after the root offset.
pub fn verify_buffer_header(buf: &[u8], fid: Option<FileIdentifier>) -> VerifyResult {
    // Headroom so no scalar or offset arithmetic can overflow u32.
    ensure!(buf.len() as u64 <= u64::from(UOFFSET_MAX) - 8, SizeOutOfRange);
    // Space for the identifier is required even when none is expected:
    // buffers without it cannot be safely probed for one later.
    ensure!(buf.len() >= UOFFSET_SIZE + IDENTIFIER_SIZE, BadHeader);
    if let Some(fid) = fid {
        if !fid.is_null() {
            ensure!(
                &buf[UOFFSET_SIZE..UOFFSET_SIZE + IDENTIFIER_SIZE] == fid.as_bytes(),
                IdentifierMismatch
            );
        }
    }
    Ok(())
}

/// Verify a buffer whose root is a table, walking it through `tvf`.
pub fn verify_table_as_root(
    buf: &[u8],
    fid: Option<FileIdentifier>,
    tvf: &dyn TableVerify,
) -> VerifyResult {
    verify_buffer_header(buf, fid)?;
    verify_table(
        buf,
        buf.len() as u32,
        0,
        read_uoffset(buf, 0),
        MAX_LEVELS,
        tvf,
    )
}

/// Verify a buffer whose root is a struct of the given size and alignment.
pub fn verify_struct_as_root(
    buf: &[u8],
    fid: Option<FileIdentifier>,
    align: u16,
    size: usize,
) -> VerifyResult {
    verify_buffer_header(buf, fid)?;
    verify_struct(buf.len() as u32, read_uoffset(buf, 0), align, size)
}

// ----------------------------------------------------------------------
// Descriptor-driven verification.
// ----------------------------------------------------------------------

impl TableVerify for TableDecl {
    fn verify_table(&self, td: &mut TableContext<'_>) -> VerifyResult {
        for field in self.fields {
            match field.ty {
                FieldType::Scalar { ty, .. } => {
                    require_inline(td, field.id, field.required)?;
                    td.verify_field(field.id, ty.align() as u16, ty.size())?;
                }
                FieldType::Struct(decl) => {
                    require_inline(td, field.id, field.required)?;
                    td.verify_field(field.id, decl.align, decl.size as usize)?;
                }
                FieldType::String => td.verify_string_field(field.id, field.required)?,
                FieldType::Table(decl) => {
                    td.verify_table_field(field.id, field.required, decl)?;
                }
                FieldType::Vector(elem) => verify_vector_elem(td, field.id, field.required, elem)?,
                FieldType::Union(decl) => td.verify_union_field(field.id, field.required, decl)?,
                FieldType::NestedBuffer(decl) => match decl {
                    Some(decl) => {
                        td.verify_table_as_nested_root(field.id, field.required, None, 1, decl)?;
                    }
                    None => td.verify_vector_field(field.id, field.required, 1, 1, count_max(1))?,
                },
            }
        }
        Ok(())
    }
}

fn require_inline(td: &TableContext<'_>, id: VOffset, required: bool) -> VerifyResult {
    ensure!(!required || td.vt_entry(id) != 0, RequiredFieldAbsent);
    Ok(())
}

fn verify_vector_elem(
    td: &mut TableContext<'_>,
    id: VOffset,
    required: bool,
    elem: ElemType,
) -> VerifyResult {
    match elem {
        ElemType::Scalar(ty) => {
            td.verify_vector_field(id, required, ty.align() as u16, ty.size(), count_max(ty.size()))
        }
        ElemType::Struct(decl) => td.verify_vector_field(
            id,
            required,
            decl.align,
            decl.size as usize,
            count_max(decl.size as usize),
        ),
        ElemType::String => td.verify_string_vector_field(id, required),
        ElemType::Table(decl) => td.verify_table_vector_field(id, required, decl),
    }
}

impl UnionVerify for UnionDecl {
    fn verify_union(&self, td: &mut TableContext<'_>, id: VOffset, tag: u8) -> VerifyResult {
        let Some(variant) = self.variant(tag) else {
            return Err(VerifyError::UnionTypeUnknown);
        };
        match variant.ty {
            UnionType::Table(decl) => td.verify_union_table(id, decl),
            UnionType::String => td.verify_union_string(id),
            UnionType::Struct(decl) => {
                td.verify_union_struct(id, decl.align, decl.size as usize)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static EMPTY: TableDecl = TableDecl {
        name: "Empty",
        fields: &[],
    };

    #[test]
    fn header_checks() {
        assert_eq!(
            verify_buffer_header(&[], None),
            Err(VerifyError::BadHeader)
        );
        assert_eq!(
            verify_buffer_header(&[0; 7], None),
            Err(VerifyError::BadHeader)
        );
        assert_eq!(verify_buffer_header(&[0; 8], None), Ok(()));
        let mut buf = [0u8; 8];
        buf[4..8].copy_from_slice(b"MONS");
        assert_eq!(
            verify_buffer_header(&buf, Some(FileIdentifier::new(b"MONS"))),
            Ok(())
        );
        assert_eq!(
            verify_buffer_header(&buf, Some(FileIdentifier::new(b"XXXX"))),
            Err(VerifyError::IdentifierMismatch)
        );
        // A null expected identifier skips the check.
        assert_eq!(
            verify_buffer_header(&buf, Some(FileIdentifier::null())),
            Ok(())
        );
    }

    #[test]
    fn null_root_offset_rejected() {
        let buf = [0u8; 16];
        assert_eq!(
            verify_table_as_root(&buf, None, &EMPTY),
            Err(VerifyError::OffsetOutOfRange)
        );
    }

    #[test]
    fn misaligned_root_offset_rejected() {
        let mut buf = [0u8; 16];
        buf[0] = 5; // root at odd offset
        assert_eq!(
            verify_table_as_root(&buf, None, &EMPTY),
            Err(VerifyError::Alignment)
        );
    }

    #[test]
    fn root_past_end_rejected() {
        let mut buf = [0u8; 16];
        buf[0] = 16;
        assert_eq!(
            verify_table_as_root(&buf, None, &EMPTY),
            Err(VerifyError::OffsetOutOfRange)
        );
    }

    #[test]
    fn struct_root_checks() {
        let mut buf = [0u8; 16];
        buf[0] = 8;
        assert_eq!(verify_struct_as_root(&buf, None, 4, 8), Ok(()));
        assert_eq!(
            verify_struct_as_root(&buf, None, 4, 9),
            Err(VerifyError::OffsetOutOfRange)
        );
        assert_eq!(
            verify_struct_as_root(&buf, None, 16, 8),
            Err(VerifyError::Alignment)
        );
    }

    #[test]
    fn hand_written_verifier_fn_dispatches() {
        let mut buf = [0u8; 16];
        buf[0] = 4; // root table at 4
        buf[4..8].copy_from_slice(&(-4i32).to_le_bytes()); // vtable at 8
        buf[8..10].copy_from_slice(&4u16.to_le_bytes()); // vtable size
        buf[10..12].copy_from_slice(&4u16.to_le_bytes()); // table size
        let f: TableVerifierFn = |_td| Ok(());
        assert_eq!(verify_table_as_root(&buf, None, &f), Ok(()));
        let g: TableVerifierFn = |_td| Err(VerifyError::TableFieldOutOfRange);
        assert_eq!(
            verify_table_as_root(&buf, None, &g),
            Err(VerifyError::TableFieldOutOfRange)
        );
    }
}
