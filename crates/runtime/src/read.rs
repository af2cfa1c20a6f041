//! Safe access to verified buffers.
//!
//! These accessors perform the reader side of the vtable protocol: a field's
//! storage is found through its table's vtable slot, absent fields fall back
//! to schema defaults. They are meant to run on buffers the [`crate::verify`]
//! module has accepted, which makes every position they hand out in-bounds.
//! Reads still go through checked slicing, so a protocol bug surfaces as a
//! panic in tests rather than as an out-of-bounds read.

use planar_format::{read_soffset, read_uoffset, read_voffset, Scalar, UOffset, VOffset, UOFFSET_SIZE, VOFFSET_SIZE};

/// The root table of a finished buffer.
pub fn root_table(buf: &[u8]) -> Table<'_> {
    Table {
        buf,
        pos: read_uoffset(buf, 0),
    }
}

/// Position of a root struct within a finished buffer.
pub fn root_struct_pos(buf: &[u8]) -> u32 {
    read_uoffset(buf, 0)
}

/// A table view: a buffer plus the table's header position.
#[derive(Copy, Clone)]
pub struct Table<'a> {
    buf: &'a [u8],
    pos: u32,
}

impl<'a> Table<'a> {
    /// View the table at `pos`. The position must come from a verified
    /// reference (root offset, table field, or table-vector element).
    pub fn at(buf: &'a [u8], pos: u32) -> Self {
        Self { buf, pos }
    }

    /// The underlying buffer.
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// The table's header position.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Absolute position of field `id`'s storage, or `None` when absent.
    pub fn field_pos(&self, id: VOffset) -> Option<u32> {
        let vtable = (i64::from(self.pos) - i64::from(read_soffset(self.buf, self.pos))) as u32;
        let vsize = read_voffset(self.buf, vtable);
        let vo = (u32::from(id) + 2) * VOFFSET_SIZE as u32;
        if vo >= u32::from(vsize) {
            return None;
        }
        match read_voffset(self.buf, vtable + vo) {
            0 => None,
            vte => Some(self.pos + u32::from(vte)),
        }
    }

    /// Read a scalar field, or `default` when absent.
    pub fn scalar<T: Scalar>(&self, id: VOffset, default: T) -> T {
        match self.field_pos(id) {
            Some(pos) => T::read_from(&self.buf[pos as usize..]),
            None => default,
        }
    }

    /// Resolve an offset field to its target position.
    pub fn offset_target(&self, id: VOffset) -> Option<u32> {
        let pos = self.field_pos(id)?;
        Some(pos + read_uoffset(self.buf, pos))
    }

    /// View a table field.
    pub fn table(&self, id: VOffset) -> Option<Table<'a>> {
        Some(Table::at(self.buf, self.offset_target(id)?))
    }

    /// Position of an inline struct field.
    pub fn struct_pos(&self, id: VOffset) -> Option<u32> {
        self.field_pos(id)
    }

    /// The bytes of a string field, without the terminator.
    pub fn string_bytes(&self, id: VOffset) -> Option<&'a [u8]> {
        let pos = self.offset_target(id)?;
        let len = read_uoffset(self.buf, pos) as usize;
        let data = pos as usize + UOFFSET_SIZE;
        Some(&self.buf[data..data + len])
    }

    /// A string field as UTF-8, `None` when absent or not valid UTF-8.
    pub fn string(&self, id: VOffset) -> Option<&'a str> {
        core::str::from_utf8(self.string_bytes(id)?).ok()
    }

    /// View a vector field.
    pub fn vector(&self, id: VOffset) -> Option<Vector<'a>> {
        Some(Vector {
            buf: self.buf,
            pos: self.offset_target(id)?,
        })
    }

    /// The type tag of the union whose value sits at field `id`; 0 (NONE)
    /// when the tag field is absent.
    pub fn union_tag(&self, id: VOffset) -> u8 {
        debug_assert!(id >= 1);
        self.scalar::<u8>(id - 1, 0)
    }

    /// The contents of a nested-buffer field, after its size prefix.
    pub fn nested_buffer(&self, id: VOffset) -> Option<&'a [u8]> {
        let pos = self.offset_target(id)?;
        let len = read_uoffset(self.buf, pos) as usize;
        let data = pos as usize + UOFFSET_SIZE;
        Some(&self.buf[data..data + len])
    }
}

/// A vector view: a buffer plus the vector's length-prefix position.
#[derive(Copy, Clone)]
pub struct Vector<'a> {
    buf: &'a [u8],
    pos: u32,
}

impl<'a> Vector<'a> {
    /// View the vector at `pos` (its length prefix).
    pub fn at(buf: &'a [u8], pos: u32) -> Self {
        Self { buf, pos }
    }

    /// The underlying buffer.
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Element count.
    pub fn len(&self) -> usize {
        read_uoffset(self.buf, self.pos) as usize
    }

    /// Whether the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of element `i` given the element size.
    pub fn elem_pos(&self, i: usize, elem_size: usize) -> u32 {
        debug_assert!(i < self.len());
        self.pos + UOFFSET_SIZE as u32 + (i * elem_size) as u32
    }

    /// Read scalar element `i`.
    pub fn scalar_at<T: Scalar>(&self, i: usize) -> T {
        T::read_from(&self.buf[self.elem_pos(i, T::SIZE) as usize..])
    }

    /// Resolve offset element `i` to its target position.
    pub fn offset_target_at(&self, i: usize) -> u32 {
        let pos = self.elem_pos(i, UOFFSET_SIZE);
        pos + read_uoffset(self.buf, pos)
    }

    /// View table element `i`.
    pub fn table_at(&self, i: usize) -> Table<'a> {
        Table::at(self.buf, self.offset_target_at(i))
    }

    /// The bytes of string element `i`, without the terminator.
    pub fn string_bytes_at(&self, i: usize) -> &'a [u8] {
        let pos = self.offset_target_at(i);
        let len = read_uoffset(self.buf, pos) as usize;
        let data = pos as usize + UOFFSET_SIZE;
        &self.buf[data..data + len]
    }

    /// Read a uoffset element raw (the relative value, not its target).
    pub fn uoffset_at(&self, i: usize) -> UOffset {
        read_uoffset(self.buf, self.elem_pos(i, UOFFSET_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn scalar_round_trip_through_table() {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        b.start_table(3).unwrap();
        b.table_add_scalar::<i32>(0, -5).unwrap();
        b.table_add_scalar::<f64>(1, 2.5).unwrap();
        b.table_add_scalar::<u8>(2, 200).unwrap();
        let t = b.end_table().unwrap();
        b.end_buffer(t).unwrap();
        let buf = b.finalize();

        let t = root_table(&buf);
        assert_eq!(t.scalar::<i32>(0, 0), -5);
        assert_eq!(t.scalar::<f64>(1, 0.0), 2.5);
        assert_eq!(t.scalar::<u8>(2, 0), 200);
        // Absent field falls back to the default.
        assert_eq!(t.scalar::<u16>(3, 77), 77);
        assert_eq!(t.field_pos(3), None);
    }

    #[test]
    fn string_and_vector_round_trip() {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        let s = b.create_string("hello").unwrap();
        let v = b.create_scalar_vector::<u16>(&[10, 20, 30]).unwrap();
        b.start_table(2).unwrap();
        b.table_add_offset(0, s).unwrap();
        b.table_add_offset(1, v).unwrap();
        let t = b.end_table().unwrap();
        b.end_buffer(t).unwrap();
        let buf = b.finalize();

        let t = root_table(&buf);
        assert_eq!(t.string(0), Some("hello"));
        let v = t.vector(1).unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.scalar_at::<u16>(1), 20);
    }
}
