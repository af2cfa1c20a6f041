//! Type descriptors.
//!
//! Descriptors are the hand-writable stand-in for generated bindings: a
//! `&'static` tree describing a root table's fields, the structs, unions and
//! nested tables they reach, field defaults and `required` markings. The
//! descriptor-driven verifier walks them to validate a buffer without any
//! generated code, and the JSON printer walks them to name members.
//!
//! Everything here is plain data constructible in `const`/`static` context,
//! so a schema compiler can emit descriptors as statics and tests can write
//! them inline.

use planar_format::VOffset;

/// The ten primitive wire scalar types.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[allow(missing_docs)]
pub enum ScalarType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScalarType {
    /// Encoded byte width.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Required alignment, equal to the natural size.
    pub const fn align(self) -> usize {
        self.size()
    }
}

/// A schema default for a scalar field.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ScalarValue {
    /// Boolean default.
    Bool(bool),
    /// Default for the signed integer types.
    Int(i64),
    /// Default for the unsigned integer types.
    UInt(u64),
    /// Default for the float types.
    Float(f64),
}

/// Element type of a vector field.
#[derive(Copy, Clone)]
pub enum ElemType {
    /// Vector of scalars.
    Scalar(ScalarType),
    /// Vector of fixed-size structs.
    Struct(&'static StructDecl),
    /// Vector of strings.
    String,
    /// Vector of tables.
    Table(&'static TableDecl),
}

/// The wire type of one table field.
#[derive(Copy, Clone)]
pub enum FieldType {
    /// Inline scalar with its schema default.
    Scalar {
        /// Wire scalar type.
        ty: ScalarType,
        /// Value encoded when the field is absent.
        default: ScalarValue,
    },
    /// Inline fixed-size struct.
    Struct(&'static StructDecl),
    /// Offset to a string.
    String,
    /// Offset to a table.
    Table(&'static TableDecl),
    /// Offset to a vector.
    Vector(ElemType),
    /// A union; the declaring [`FieldDecl::id`] names the *value* slot, the
    /// type tag implicitly occupies `id - 1`.
    Union(&'static UnionDecl),
    /// Offset to a byte vector holding a complete nested buffer. With a
    /// declaration the nested root can be verified and printed; without one
    /// it is treated as opaque bytes.
    NestedBuffer(Option<&'static TableDecl>),
}

/// One field of a table.
pub struct FieldDecl {
    /// Vtable field id.
    pub id: VOffset,
    /// Member name used by the JSON printer.
    pub name: &'static str,
    /// Whether verification fails when the field is absent.
    pub required: bool,
    /// Wire type.
    pub ty: FieldType,
}

/// A table type.
pub struct TableDecl {
    /// Type name, for diagnostics.
    pub name: &'static str,
    /// Fields in ascending id order.
    pub fields: &'static [FieldDecl],
}

/// A fixed-size struct type.
pub struct StructDecl {
    /// Type name, for diagnostics.
    pub name: &'static str,
    /// Total byte size including internal padding.
    pub size: u32,
    /// Alignment of the largest member.
    pub align: u16,
    /// Members in layout order.
    pub members: &'static [StructMember],
}

/// One member of a struct.
pub struct StructMember {
    /// Member name used by the JSON printer.
    pub name: &'static str,
    /// Byte offset within the struct.
    pub offset: u32,
    /// Member type.
    pub ty: MemberType,
}

/// The type of a struct member.
#[derive(Copy, Clone)]
pub enum MemberType {
    /// Scalar member.
    Scalar(ScalarType),
    /// Nested struct member.
    Struct(&'static StructDecl),
}

/// A union type: a tag byte at field `id - 1` selecting the value at `id`.
pub struct UnionDecl {
    /// Type name, for diagnostics.
    pub name: &'static str,
    /// Known variants; tag 0 (`NONE`) is implicit and never listed.
    pub variants: &'static [UnionVariant],
}

/// One union variant.
pub struct UnionVariant {
    /// Non-zero tag value.
    pub tag: u8,
    /// Variant name used by the JSON printer.
    pub name: &'static str,
    /// Value type.
    pub ty: UnionType,
}

/// The value type of a union variant.
#[derive(Copy, Clone)]
pub enum UnionType {
    /// Table value.
    Table(&'static TableDecl),
    /// String value.
    String,
    /// Struct value.
    Struct(&'static StructDecl),
}

impl UnionDecl {
    /// Look up a variant by tag.
    pub fn variant(&self, tag: u8) -> Option<&UnionVariant> {
        self.variants.iter().find(|v| v.tag == tag)
    }
}

impl TableDecl {
    /// Field ids marked `required`, for [`crate::Builder::check_required`].
    pub fn required_ids(&self) -> impl Iterator<Item = VOffset> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.id)
    }
}
