//! A representative schema exercised end to end: structs, scalars with
//! defaults, strings, scalar/struct/table vectors, a union, and a nested
//! buffer, built once and then verified, read back and printed.

use planar_format::FileIdentifier;
use planar_runtime::json::{print_json, JsonOptions};
use planar_runtime::read;
use planar_runtime::schema::{
    ElemType, FieldDecl, FieldType, MemberType, ScalarType, ScalarValue, StructDecl, StructMember,
    TableDecl, UnionDecl, UnionType, UnionVariant,
};
use planar_runtime::verify::verify_table_as_root;
use planar_runtime::{BuildError, Builder, VerifyError};

static VEC3: StructDecl = StructDecl {
    name: "Vec3",
    size: 12,
    align: 4,
    members: &[
        StructMember {
            name: "x",
            offset: 0,
            ty: MemberType::Scalar(ScalarType::F32),
        },
        StructMember {
            name: "y",
            offset: 4,
            ty: MemberType::Scalar(ScalarType::F32),
        },
        StructMember {
            name: "z",
            offset: 8,
            ty: MemberType::Scalar(ScalarType::F32),
        },
    ],
};

static WEAPON: TableDecl = TableDecl {
    name: "Weapon",
    fields: &[
        FieldDecl {
            id: 0,
            name: "name",
            required: true,
            ty: FieldType::String,
        },
        FieldDecl {
            id: 1,
            name: "damage",
            required: false,
            ty: FieldType::Scalar {
                ty: ScalarType::I16,
                default: ScalarValue::Int(0),
            },
        },
    ],
};

static EQUIPMENT: UnionDecl = UnionDecl {
    name: "Equipment",
    variants: &[UnionVariant {
        tag: 1,
        name: "Weapon",
        ty: UnionType::Table(&WEAPON),
    }],
};

static MONSTER: TableDecl = TableDecl {
    name: "Monster",
    fields: &[
        FieldDecl {
            id: 0,
            name: "pos",
            required: false,
            ty: FieldType::Struct(&VEC3),
        },
        FieldDecl {
            id: 1,
            name: "mana",
            required: false,
            ty: FieldType::Scalar {
                ty: ScalarType::I16,
                default: ScalarValue::Int(150),
            },
        },
        FieldDecl {
            id: 2,
            name: "hp",
            required: false,
            ty: FieldType::Scalar {
                ty: ScalarType::I16,
                default: ScalarValue::Int(100),
            },
        },
        FieldDecl {
            id: 3,
            name: "name",
            required: true,
            ty: FieldType::String,
        },
        FieldDecl {
            id: 4,
            name: "inventory",
            required: false,
            ty: FieldType::Vector(ElemType::Scalar(ScalarType::U8)),
        },
        FieldDecl {
            id: 5,
            name: "color",
            required: false,
            ty: FieldType::Scalar {
                ty: ScalarType::I8,
                default: ScalarValue::Int(2),
            },
        },
        FieldDecl {
            id: 6,
            name: "weapons",
            required: false,
            ty: FieldType::Vector(ElemType::Table(&WEAPON)),
        },
        FieldDecl {
            id: 8,
            name: "equipped",
            required: false,
            ty: FieldType::Union(&EQUIPMENT),
        },
        FieldDecl {
            id: 9,
            name: "path",
            required: false,
            ty: FieldType::Vector(ElemType::Struct(&VEC3)),
        },
        FieldDecl {
            id: 10,
            name: "sidecar",
            required: false,
            ty: FieldType::NestedBuffer(Some(&WEAPON)),
        },
    ],
};

fn vec3(x: f32, y: f32, z: f32) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[..4].copy_from_slice(&x.to_le_bytes());
    out[4..8].copy_from_slice(&y.to_le_bytes());
    out[8..].copy_from_slice(&z.to_le_bytes());
    out
}

fn build_weapon(b: &mut Builder, name: &str, damage: i16) -> planar_runtime::Ref {
    let name = b.create_string(name).unwrap();
    b.start_table(2).unwrap();
    b.table_add_offset(0, name).unwrap();
    b.table_add_scalar::<i16>(1, damage).unwrap();
    b.check_required(&[0]).unwrap();
    b.end_table().unwrap()
}

fn build_monster() -> Vec<u8> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut b = Builder::new();
    b.start_buffer(Some(FileIdentifier::new(b"MONS")), 0, Default::default())
        .unwrap();

    // A complete sub-buffer, stored behind a byte-vector field.
    b.start_buffer(Some(FileIdentifier::new(b"WEAP")), 0, Default::default())
        .unwrap();
    let knife = build_weapon(&mut b, "knife", 2);
    let sidecar = b.end_buffer(knife).unwrap();

    let sword = build_weapon(&mut b, "sword", 3);
    let axe = build_weapon(&mut b, "axe", 5);
    let weapons = b.create_offset_vector(&[sword, axe]).unwrap();

    let inventory = b
        .create_scalar_vector::<u8>(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9])
        .unwrap();
    let name = b.create_string("orc").unwrap();

    b.start_vector(12, 4, usize::MAX).unwrap();
    b.vector_push(&vec3(1.0, 2.0, 3.0)).unwrap();
    b.vector_push(&vec3(4.0, 5.0, 6.0)).unwrap();
    let path = b.end_vector().unwrap();

    b.start_table(11).unwrap();
    b.table_add_copy(0, &vec3(1.0, 2.0, 3.0), 4).unwrap();
    b.table_add_scalar::<i16>(2, 80).unwrap();
    b.table_add_offset(3, name).unwrap();
    b.table_add_offset(4, inventory).unwrap();
    b.table_add_offset(6, weapons).unwrap();
    b.table_add_scalar::<u8>(7, 1).unwrap();
    b.table_add_offset(8, sword).unwrap();
    b.table_add_offset(9, path).unwrap();
    b.table_add_offset(10, sidecar).unwrap();
    b.check_required(&[3]).unwrap();
    let root = b.end_table().unwrap();
    b.end_buffer(root).unwrap();
    b.finalize()
}

#[test]
fn monster_verifies_and_reads_back() {
    let buf = build_monster();
    verify_table_as_root(&buf, Some(FileIdentifier::new(b"MONS")), &MONSTER).unwrap();

    let m = read::root_table(&buf);
    assert_eq!(m.scalar::<i16>(1, 150), 150); // absent, default
    assert_eq!(m.scalar::<i16>(2, 100), 80);
    assert_eq!(m.string(3), Some("orc"));

    let inventory = m.vector(4).unwrap();
    assert_eq!(inventory.len(), 10);
    assert_eq!(inventory.scalar_at::<u8>(9), 9);

    let weapons = m.vector(6).unwrap();
    assert_eq!(weapons.len(), 2);
    assert_eq!(weapons.table_at(0).string(0), Some("sword"));
    assert_eq!(weapons.table_at(1).scalar::<i16>(1, 0), 5);

    assert_eq!(m.union_tag(8), 1);
    let equipped = m.table(8).unwrap();
    assert_eq!(equipped.string(0), Some("sword"));

    let path = m.vector(9).unwrap();
    assert_eq!(path.len(), 2);
    let p1 = path.elem_pos(1, 12) as usize;
    assert_eq!(&buf[p1..p1 + 4], &4.0f32.to_le_bytes());
}

#[test]
fn nested_buffer_verifies_as_its_own_root() {
    let buf = build_monster();
    verify_table_as_root(&buf, None, &MONSTER).unwrap();

    let sub = read::root_table(&buf).nested_buffer(10).unwrap();
    // The outer traversal does not look at nested identifiers; checking one
    // is a separate verification of the nested root.
    verify_table_as_root(sub, Some(FileIdentifier::new(b"WEAP")), &WEAPON).unwrap();
    assert_eq!(
        verify_table_as_root(sub, Some(FileIdentifier::new(b"MONS")), &WEAPON),
        Err(VerifyError::IdentifierMismatch)
    );
    assert_eq!(read::root_table(sub).string(0), Some("knife"));
}

#[test]
fn monster_json_output() {
    let buf = build_monster();
    let json = print_json(&buf, &MONSTER, &JsonOptions::default()).unwrap();
    assert_eq!(
        json,
        concat!(
            r#"{"pos":{"x":1,"y":2,"z":3},"hp":80,"name":"orc","#,
            r#""inventory":[0,1,2,3,4,5,6,7,8,9],"#,
            r#""weapons":[{"name":"sword","damage":3},{"name":"axe","damage":5}],"#,
            r#""equipped_type":"Weapon","equipped":{"name":"sword","damage":3},"#,
            r#""path":[{"x":1,"y":2,"z":3},{"x":4,"y":5,"z":6}],"#,
            r#""sidecar":{"name":"knife","damage":2}}"#,
        )
    );

    let forced = print_json(
        &buf,
        &MONSTER,
        &JsonOptions {
            force_defaults: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(forced.contains(r#""mana":150"#));
    assert!(forced.contains(r#""color":2"#));
}

#[test]
fn missing_required_field_fails_both_sides() {
    // Builder side: check_required refuses.
    let mut b = Builder::new();
    b.start_buffer(None, 0, Default::default()).unwrap();
    b.start_table(2).unwrap();
    b.table_add_scalar::<i16>(1, 9).unwrap();
    assert_eq!(
        b.check_required(&[0]),
        Err(BuildError::Misuse("required field missing"))
    );

    // Verifier side: a buffer that shipped anyway is rejected.
    let t = b.end_table().unwrap();
    b.end_buffer(t).unwrap();
    let buf = b.finalize();
    assert_eq!(
        verify_table_as_root(&buf, None, &WEAPON),
        Err(VerifyError::RequiredFieldAbsent)
    );
}

static NODE: TableDecl = TableDecl {
    name: "Node",
    fields: &[FieldDecl {
        id: 0,
        name: "next",
        required: false,
        ty: FieldType::Table(&NODE),
    }],
};

fn build_chain(depth: usize) -> Vec<u8> {
    let mut b = Builder::new();
    b.start_buffer(None, 0, Default::default()).unwrap();
    b.start_table(0).unwrap();
    let mut t = b.end_table().unwrap();
    for _ in 0..depth {
        b.start_table(1).unwrap();
        b.table_add_offset(0, t).unwrap();
        t = b.end_table().unwrap();
    }
    b.end_buffer(t).unwrap();
    b.finalize()
}

#[test]
fn recursion_budget_bounds_verification() {
    let shallow = build_chain(50);
    verify_table_as_root(&shallow, None, &NODE).unwrap();

    let deep = build_chain(120);
    assert_eq!(
        verify_table_as_root(&deep, None, &NODE),
        Err(VerifyError::MaxDepthExceeded)
    );
}

#[test]
fn builder_nesting_bound() {
    let mut b = Builder::new();
    b.set_max_level(4);
    b.start_buffer(None, 0, Default::default()).unwrap();
    b.start_table(1).unwrap();
    b.start_vector(1, 1, usize::MAX).unwrap();
    b.start_string().unwrap();
    assert_eq!(b.start_table(0), Err(BuildError::TooNested));
}
