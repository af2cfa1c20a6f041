//! Verifier soundness: arbitrary input must be rejected or accepted without
//! panicking or reading out of bounds, and accepted buffers must be the ones
//! the builder actually produces.

use planar_runtime::schema::{
    ElemType, FieldDecl, FieldType, ScalarType, ScalarValue, TableDecl, UnionDecl, UnionType,
    UnionVariant,
};
use planar_runtime::verify::verify_table_as_root;
use planar_runtime::{read, Builder};
use proptest::prelude::*;
use std::sync::OnceLock;

static ITEM: TableDecl = TableDecl {
    name: "Item",
    fields: &[
        FieldDecl {
            id: 0,
            name: "label",
            required: false,
            ty: FieldType::String,
        },
        FieldDecl {
            id: 1,
            name: "weight",
            required: false,
            ty: FieldType::Scalar {
                ty: ScalarType::U32,
                default: ScalarValue::UInt(0),
            },
        },
    ],
};

static STASH: UnionDecl = UnionDecl {
    name: "Stash",
    variants: &[
        UnionVariant {
            tag: 1,
            name: "Item",
            ty: UnionType::Table(&ITEM),
        },
        UnionVariant {
            tag: 2,
            name: "Note",
            ty: UnionType::String,
        },
    ],
};

static CRATE_DECL: TableDecl = TableDecl {
    name: "Crate",
    fields: &[
        FieldDecl {
            id: 0,
            name: "tag",
            required: false,
            ty: FieldType::Scalar {
                ty: ScalarType::I64,
                default: ScalarValue::Int(-1),
            },
        },
        FieldDecl {
            id: 1,
            name: "items",
            required: false,
            ty: FieldType::Vector(ElemType::Table(&ITEM)),
        },
        FieldDecl {
            id: 2,
            name: "names",
            required: false,
            ty: FieldType::Vector(ElemType::String),
        },
        FieldDecl {
            id: 3,
            name: "bytes",
            required: false,
            ty: FieldType::Vector(ElemType::Scalar(ScalarType::U8)),
        },
        FieldDecl {
            id: 5,
            name: "stash",
            required: false,
            ty: FieldType::Union(&STASH),
        },
    ],
};

fn valid_buffer() -> &'static [u8] {
    static BUF: OnceLock<Vec<u8>> = OnceLock::new();
    BUF.get_or_init(|| {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        let label = b.create_string("brick").unwrap();
        b.start_table(2).unwrap();
        b.table_add_offset(0, label).unwrap();
        b.table_add_scalar::<u32>(1, 17).unwrap();
        let item = b.end_table().unwrap();
        let items = b.create_offset_vector(&[item]).unwrap();
        let hello = b.create_string("hello").unwrap();
        let names = b.create_offset_vector(&[hello]).unwrap();
        let bytes = b.create_scalar_vector::<u8>(&[1, 2, 3]).unwrap();
        b.start_table(6).unwrap();
        b.table_add_scalar::<i64>(0, 99).unwrap();
        b.table_add_offset(1, items).unwrap();
        b.table_add_offset(2, names).unwrap();
        b.table_add_offset(3, bytes).unwrap();
        b.table_add_scalar::<u8>(4, 1).unwrap();
        b.table_add_offset(5, item).unwrap();
        let root = b.end_table().unwrap();
        b.end_buffer(root).unwrap();
        let buf = b.finalize();
        verify_table_as_root(&buf, None, &CRATE_DECL).unwrap();
        buf
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1024))]

    // Random byte soup terminates without panicking, whatever the verdict.
    #[test]
    fn random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let _ = verify_table_as_root(&bytes, None, &CRATE_DECL);
    }

    // Single-byte corruptions of a valid buffer exercise the deep checks.
    #[test]
    fn corrupted_buffer_never_panics(
        idx in any::<prop::sample::Index>(),
        byte in any::<u8>(),
    ) {
        let mut buf = valid_buffer().to_vec();
        let i = idx.index(buf.len());
        buf[i] = byte;
        let _ = verify_table_as_root(&buf, None, &CRATE_DECL);
    }

    // Four-byte corruptions hit offset fields more often.
    #[test]
    fn corrupted_word_never_panics(
        idx in any::<prop::sample::Index>(),
        word in any::<u32>(),
    ) {
        let mut buf = valid_buffer().to_vec();
        let i = idx.index(buf.len().saturating_sub(4));
        buf[i..i + 4].copy_from_slice(&word.to_le_bytes());
        let _ = verify_table_as_root(&buf, None, &CRATE_DECL);
    }

    // Primitive round trip: what the builder writes, the reader returns.
    #[test]
    fn scalar_round_trip(a in any::<i64>(), c in any::<u32>(), f in any::<f64>()) {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        b.start_table(3).unwrap();
        b.table_add_scalar::<i64>(0, a).unwrap();
        b.table_add_scalar::<u32>(1, c).unwrap();
        b.table_add_scalar::<f64>(2, f).unwrap();
        let root = b.end_table().unwrap();
        b.end_buffer(root).unwrap();
        let buf = b.finalize();

        let t = read::root_table(&buf);
        prop_assert_eq!(t.scalar::<i64>(0, 0), a);
        prop_assert_eq!(t.scalar::<u32>(1, 0), c);
        let back = t.scalar::<f64>(2, 0.0);
        if f.is_nan() {
            prop_assert!(back.is_nan());
        } else {
            prop_assert_eq!(back, f);
        }
    }
}
