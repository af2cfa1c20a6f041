//! Wire-format primitive types for the planar serialization format.
//!
//! The wire format addresses objects through three offset types. All of them
//! have a fixed width independent of the host platform, because buffers are
//! exchanged between processes and machines:
//!
//! - [`UOffset`]: unsigned 32-bit forward reference. A value stored at
//!   position `p` points at `p + value`. Zero is reserved as the null/error
//!   sentinel, so a valid offset never points at its own position.
//! - [`SOffset`]: signed 32-bit reference, used only for the link from a
//!   table to its vtable, which may sit on either side of the table.
//! - [`VOffset`]: unsigned 16-bit offset from a table header to one of its
//!   fields, stored in vtable slots.
//!
//! Every scalar is stored little-endian at its naturally aligned position;
//! the [`Scalar`] trait captures the codec for the ten primitive wire types.

#![deny(missing_docs)]

use core::fmt;

/// Unsigned relative reference; position `+ value` addresses the target.
///
/// Deliberately not `usize`: buffers built on a 64-bit host must be readable
/// on 32-bit targets and vice versa.
pub type UOffset = u32;

/// Signed relative reference, used for the table-to-vtable link.
pub type SOffset = i32;

/// Offset from a table header to a field, stored in vtable slots.
pub type VOffset = u16;

/// Byte width of a [`UOffset`].
pub const UOFFSET_SIZE: usize = 4;
/// Byte width of an [`SOffset`]. Always equal to [`UOFFSET_SIZE`].
pub const SOFFSET_SIZE: usize = 4;
/// Byte width of a [`VOffset`].
pub const VOFFSET_SIZE: usize = 2;

/// Largest representable unsigned offset.
pub const UOFFSET_MAX: u32 = u32::MAX;
/// Largest representable signed offset.
pub const SOFFSET_MAX: i32 = i32::MAX;
/// Smallest representable signed offset.
pub const SOFFSET_MIN: i32 = i32::MIN;
/// Largest representable vtable offset.
pub const VOFFSET_MAX: u16 = u16::MAX;

/// Byte width of a file identifier.
pub const IDENTIFIER_SIZE: usize = 4;

/// Largest field id a vtable can address.
///
/// A vtable is a sequence of voffset slots whose total byte size must itself
/// fit in a voffset. Two slots are taken by the header (vtable size, table
/// size) and the highest slot index is unaddressable because the size field
/// counts it out, which yields `u16::MAX / 2 - 3`.
pub const FIELD_ID_MAX: u16 = VOFFSET_MAX / VOFFSET_SIZE as u16 - 3;

/// Upper bound on the number of gather segments handed to an emission sink
/// in one call.
pub const IOV_COUNT_MAX: usize = 8;

/// Largest element count of a vector with `elem_size`-byte elements such
/// that the total byte size cannot overflow a [`UOffset`].
#[inline]
pub const fn count_max(elem_size: usize) -> usize {
    (UOFFSET_MAX as usize) / elem_size
}

/// A 4-byte buffer tag placed immediately after the root offset,
/// conventionally ASCII.
///
/// The all-zero identifier doubles as "no identifier"; such buffers are
/// emitted without the tag bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct FileIdentifier([u8; IDENTIFIER_SIZE]);

impl FileIdentifier {
    /// Create an identifier from up to four bytes, zero-padding short input.
    ///
    /// Input longer than four bytes is truncated.
    pub fn new(tag: &[u8]) -> Self {
        let mut id = [0u8; IDENTIFIER_SIZE];
        let n = tag.len().min(IDENTIFIER_SIZE);
        id[..n].copy_from_slice(&tag[..n]);
        Self(id)
    }

    /// The all-zero "absent" identifier.
    pub const fn null() -> Self {
        Self([0; IDENTIFIER_SIZE])
    }

    /// Whether this is the all-zero identifier.
    pub fn is_null(&self) -> bool {
        self.0 == [0; IDENTIFIER_SIZE]
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_SIZE] {
        &self.0
    }
}

impl From<[u8; IDENTIFIER_SIZE]> for FileIdentifier {
    fn from(id: [u8; IDENTIFIER_SIZE]) -> Self {
        Self(id)
    }
}

impl fmt::Debug for FileIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FileIdentifier(")?;
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        write!(f, ")")
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Little-endian codec for the ten primitive wire scalar types.
///
/// The trait is sealed; the wire format fixes the scalar set.
pub trait Scalar: Copy + PartialEq + fmt::Debug + sealed::Sealed {
    /// Encoded byte width.
    const SIZE: usize;
    /// Required alignment, equal to the natural size.
    const ALIGN: usize;

    /// Encode into `out[..Self::SIZE]`.
    fn write_to(self, out: &mut [u8]);

    /// Decode from `buf[..Self::SIZE]`.
    fn read_from(buf: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Scalar for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();
                const ALIGN: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn write_to(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_from(buf: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl sealed::Sealed for bool {}
impl Scalar for bool {
    const SIZE: usize = 1;
    const ALIGN: usize = 1;

    #[inline]
    fn write_to(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    #[inline]
    fn read_from(buf: &[u8]) -> Self {
        buf[0] != 0
    }
}

/// Read a [`UOffset`] at `pos`. The caller guarantees `pos + 4` is in range.
#[inline]
pub fn read_uoffset(buf: &[u8], pos: u32) -> UOffset {
    let pos = pos as usize;
    debug_assert!(pos + UOFFSET_SIZE <= buf.len());
    u32::from_le_bytes(buf[pos..pos + UOFFSET_SIZE].try_into().unwrap())
}

/// Read an [`SOffset`] at `pos`. The caller guarantees `pos + 4` is in range.
#[inline]
pub fn read_soffset(buf: &[u8], pos: u32) -> SOffset {
    read_uoffset(buf, pos) as i32
}

/// Read a [`VOffset`] at `pos`. The caller guarantees `pos + 2` is in range.
#[inline]
pub fn read_voffset(buf: &[u8], pos: u32) -> VOffset {
    let pos = pos as usize;
    debug_assert!(pos + VOFFSET_SIZE <= buf.len());
    u16::from_le_bytes(buf[pos..pos + VOFFSET_SIZE].try_into().unwrap())
}
