//! JSON printing of verified buffers.
//!
//! The printer walks a [`TableDecl`] over a buffer the verifier has accepted
//! and renders deterministic UTF-8 JSON: objects for tables and structs,
//! arrays for vectors, `"<name>_type"`/`"<name>"` member pairs for unions.
//! Absent fields are skipped unless [`JsonOptions::force_defaults`] asks for
//! their schema defaults.
//!
//! The buffer must have been verified against the same descriptor first; the
//! printer relies on every reachable position being in-bounds.

use crate::read::{self, Table, Vector};
use crate::schema::{
    ElemType, FieldType, MemberType, ScalarType, ScalarValue, StructDecl, TableDecl, UnionType,
};
use planar_format::Scalar;
use thiserror::Error;

/// JSON rendering failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JsonError {
    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    /// A float field holds NaN or an infinity, which JSON cannot carry.
    #[error("non-finite float has no JSON representation")]
    NonFiniteNumber,
    /// A union tag has no variant in the descriptor.
    #[error("union tag unknown to the descriptor")]
    UnknownUnionType,
}

/// Printer options.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonOptions {
    /// Print absent scalar fields with their schema defaults.
    pub force_defaults: bool,
    /// Two-space indentation instead of compact output.
    pub pretty: bool,
}

/// Render the buffer's root table as JSON text.
pub fn print_json(buf: &[u8], decl: &TableDecl, opts: &JsonOptions) -> Result<String, JsonError> {
    let mut p = Printer {
        out: String::new(),
        pretty: opts.pretty,
        force_defaults: opts.force_defaults,
        depth: 0,
    };
    p.table(read::root_table(buf), decl)?;
    Ok(p.out)
}

struct Printer {
    out: String,
    pretty: bool,
    force_defaults: bool,
    depth: usize,
}

impl Printer {
    fn nl(&mut self) {
        if self.pretty {
            self.out.push('\n');
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
        }
    }

    fn member(&mut self, first: &mut bool, name: &str) {
        if !*first {
            self.out.push(',');
        }
        *first = false;
        self.nl();
        self.quoted(name);
        self.out.push(':');
        if self.pretty {
            self.out.push(' ');
        }
    }

    fn elem(&mut self, first: &mut bool) {
        if !*first {
            self.out.push(',');
        }
        *first = false;
        self.nl();
    }

    fn quoted(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                '\u{8}' => self.out.push_str("\\b"),
                '\u{c}' => self.out.push_str("\\f"),
                c if (c as u32) < 0x20 => {
                    self.out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn float(&mut self, v: f64) -> Result<(), JsonError> {
        if !v.is_finite() {
            return Err(JsonError::NonFiniteNumber);
        }
        self.out.push_str(&v.to_string());
        Ok(())
    }

    fn scalar_at(&mut self, buf: &[u8], pos: usize, ty: ScalarType) -> Result<(), JsonError> {
        let bytes = &buf[pos..];
        match ty {
            ScalarType::Bool => {
                self.out
                    .push_str(if bool::read_from(bytes) { "true" } else { "false" });
            }
            ScalarType::U8 => self.out.push_str(&u8::read_from(bytes).to_string()),
            ScalarType::I8 => self.out.push_str(&i8::read_from(bytes).to_string()),
            ScalarType::U16 => self.out.push_str(&u16::read_from(bytes).to_string()),
            ScalarType::I16 => self.out.push_str(&i16::read_from(bytes).to_string()),
            ScalarType::U32 => self.out.push_str(&u32::read_from(bytes).to_string()),
            ScalarType::I32 => self.out.push_str(&i32::read_from(bytes).to_string()),
            ScalarType::U64 => self.out.push_str(&u64::read_from(bytes).to_string()),
            ScalarType::I64 => self.out.push_str(&i64::read_from(bytes).to_string()),
            ScalarType::F32 => self.float(f64::from(f32::read_from(bytes)))?,
            ScalarType::F64 => self.float(f64::read_from(bytes))?,
        }
        Ok(())
    }

    fn default_value(&mut self, default: ScalarValue) -> Result<(), JsonError> {
        match default {
            ScalarValue::Bool(v) => self.out.push_str(if v { "true" } else { "false" }),
            ScalarValue::Int(v) => self.out.push_str(&v.to_string()),
            ScalarValue::UInt(v) => self.out.push_str(&v.to_string()),
            ScalarValue::Float(v) => self.float(v)?,
        }
        Ok(())
    }

    fn string_field(&mut self, bytes: &[u8]) -> Result<(), JsonError> {
        let s = core::str::from_utf8(bytes).map_err(|_| JsonError::InvalidUtf8)?;
        self.quoted(s);
        Ok(())
    }

    fn table(&mut self, t: Table<'_>, decl: &TableDecl) -> Result<(), JsonError> {
        self.out.push('{');
        self.depth += 1;
        let mut first = true;
        for field in decl.fields {
            match field.ty {
                FieldType::Scalar { ty, default } => match t.field_pos(field.id) {
                    Some(pos) => {
                        self.member(&mut first, field.name);
                        self.scalar_at(t.buf(), pos as usize, ty)?;
                    }
                    None if self.force_defaults => {
                        self.member(&mut first, field.name);
                        self.default_value(default)?;
                    }
                    None => {}
                },
                FieldType::Struct(decl) => {
                    if let Some(pos) = t.struct_pos(field.id) {
                        self.member(&mut first, field.name);
                        self.struct_value(t.buf(), pos as usize, decl)?;
                    }
                }
                FieldType::String => {
                    if let Some(bytes) = t.string_bytes(field.id) {
                        self.member(&mut first, field.name);
                        self.string_field(bytes)?;
                    }
                }
                FieldType::Table(decl) => {
                    if let Some(child) = t.table(field.id) {
                        self.member(&mut first, field.name);
                        self.table(child, decl)?;
                    }
                }
                FieldType::Vector(elem) => {
                    if let Some(v) = t.vector(field.id) {
                        self.member(&mut first, field.name);
                        self.vector(v, elem)?;
                    }
                }
                FieldType::Union(decl) => {
                    let tag = t.union_tag(field.id);
                    if tag != 0 {
                        let variant =
                            decl.variant(tag).ok_or(JsonError::UnknownUnionType)?;
                        self.member(&mut first, &format!("{}_type", field.name));
                        self.quoted(variant.name);
                        if let Some(target) = t.offset_target(field.id) {
                            self.member(&mut first, field.name);
                            match variant.ty {
                                UnionType::Table(decl) => {
                                    self.table(Table::at(t.buf(), target), decl)?;
                                }
                                UnionType::String => {
                                    let len =
                                        planar_format::read_uoffset(t.buf(), target) as usize;
                                    let data = target as usize + 4;
                                    self.string_field(&t.buf()[data..data + len])?;
                                }
                                UnionType::Struct(decl) => {
                                    self.struct_value(t.buf(), target as usize, decl)?;
                                }
                            }
                        }
                    }
                }
                FieldType::NestedBuffer(decl) => {
                    if let Some(sub) = t.nested_buffer(field.id) {
                        self.member(&mut first, field.name);
                        match decl {
                            Some(decl) => self.table(read::root_table(sub), decl)?,
                            None => self.byte_array(sub),
                        }
                    }
                }
            }
        }
        self.depth -= 1;
        if !first {
            self.nl();
        }
        self.out.push('}');
        Ok(())
    }

    fn struct_value(
        &mut self,
        buf: &[u8],
        pos: usize,
        decl: &StructDecl,
    ) -> Result<(), JsonError> {
        self.out.push('{');
        self.depth += 1;
        let mut first = true;
        for member in decl.members {
            self.member(&mut first, member.name);
            let mpos = pos + member.offset as usize;
            match member.ty {
                MemberType::Scalar(ty) => self.scalar_at(buf, mpos, ty)?,
                MemberType::Struct(decl) => self.struct_value(buf, mpos, decl)?,
            }
        }
        self.depth -= 1;
        if !first {
            self.nl();
        }
        self.out.push('}');
        Ok(())
    }

    fn vector(&mut self, v: Vector<'_>, elem: ElemType) -> Result<(), JsonError> {
        self.out.push('[');
        self.depth += 1;
        let mut first = true;
        let n = v.len();
        for i in 0..n {
            self.elem(&mut first);
            match elem {
                ElemType::Scalar(ty) => {
                    let pos = v.elem_pos(i, ty.size()) as usize;
                    self.scalar_at(v.buf(), pos, ty)?;
                }
                ElemType::Struct(decl) => {
                    let pos = v.elem_pos(i, decl.size as usize) as usize;
                    self.struct_value(v.buf(), pos, decl)?;
                }
                ElemType::String => self.string_field(v.string_bytes_at(i))?,
                ElemType::Table(decl) => self.table(v.table_at(i), decl)?,
            }
        }
        self.depth -= 1;
        if !first {
            self.nl();
        }
        self.out.push(']');
        Ok(())
    }

    fn byte_array(&mut self, bytes: &[u8]) {
        self.out.push('[');
        for (i, b) in bytes.iter().enumerate() {
            if i != 0 {
                self.out.push(',');
            }
            self.out.push_str(&b.to_string());
        }
        self.out.push(']');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::schema::FieldDecl;
    use crate::verify::verify_table_as_root;

    static WEAPON: TableDecl = TableDecl {
        name: "Weapon",
        fields: &[
            FieldDecl {
                id: 0,
                name: "name",
                required: false,
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

    fn weapon_buffer() -> Vec<u8> {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        let name = b.create_string("axe").unwrap();
        b.start_table(2).unwrap();
        b.table_add_offset(0, name).unwrap();
        b.table_add_scalar::<i16>(1, 12).unwrap();
        let t = b.end_table().unwrap();
        b.end_buffer(t).unwrap();
        b.finalize()
    }

    #[test]
    fn compact_output() {
        let buf = weapon_buffer();
        verify_table_as_root(&buf, None, &WEAPON).unwrap();
        let json = print_json(&buf, &WEAPON, &JsonOptions::default()).unwrap();
        assert_eq!(json, r#"{"name":"axe","damage":12}"#);
    }

    #[test]
    fn pretty_output() {
        let buf = weapon_buffer();
        let json = print_json(
            &buf,
            &WEAPON,
            &JsonOptions {
                pretty: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(json, "{\n  \"name\": \"axe\",\n  \"damage\": 12\n}");
    }

    #[test]
    fn absent_fields_skipped_unless_forced() {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        b.start_table(0).unwrap();
        let t = b.end_table().unwrap();
        b.end_buffer(t).unwrap();
        let buf = b.finalize();

        let json = print_json(&buf, &WEAPON, &JsonOptions::default()).unwrap();
        assert_eq!(json, "{}");
        let json = print_json(
            &buf,
            &WEAPON,
            &JsonOptions {
                force_defaults: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(json, r#"{"damage":0}"#);
    }

    #[test]
    fn escapes_control_characters() {
        let mut b = Builder::new();
        b.start_buffer(None, 0, Default::default()).unwrap();
        let name = b.create_string("a\"b\\c\nd\u{1}").unwrap();
        b.start_table(1).unwrap();
        b.table_add_offset(0, name).unwrap();
        let t = b.end_table().unwrap();
        b.end_buffer(t).unwrap();
        let buf = b.finalize();

        let json = print_json(&buf, &WEAPON, &JsonOptions::default()).unwrap();
        assert_eq!(json, r#"{"name":"a\"b\\c\nd\u0001"}"#);
    }
}
