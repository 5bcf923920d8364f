//! Engine variant values as stored in the constant pool.
//!
//! The bytecode container only knows that a constant is "one variant"; the
//! binary layout of that variant belongs to the engine's marshalling code and
//! differs between engine majors. [`VariantDecoder`] is the seam the parser
//! calls through, and [`EngineVariantDecoder`] covers majors 2 and 3.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reader::{Reader, Short};

const ENCODE_FLAG_64: u32 = 1 << 16;
const ENCODE_FLAG_OBJECT_AS_ID: u32 = 1 << 16;
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariantError {
    #[error("unexpected end of variant data (needed {needed} bytes, {remaining} remaining)")]
    Truncated { needed: usize, remaining: usize },

    #[error("unsupported variant type {type_id} in format {major}")]
    UnsupportedType { type_id: u32, major: u32 },

    #[error("unsupported variant format major version: {0}")]
    UnsupportedFormat(u32),

    #[error("variant nesting deeper than {0} levels")]
    TooDeep(usize),
}

impl From<Short> for VariantError {
    fn from(s: Short) -> Self {
        VariantError::Truncated {
            needed: s.needed,
            remaining: s.remaining,
        }
    }
}

/// Decodes constant-pool entries and names builtin types for one engine format.
pub trait VariantDecoder {
    /// Decodes the variant at the start of `buf`, returning it with the number of bytes consumed.
    fn decode_one(&self, buf: &[u8], format_major: u32) -> Result<(Variant, usize), VariantError>;

    fn type_name(&self, type_id: u32, format_major: u32) -> Option<&'static str>;

    /// Number of consecutive type ids, from 0, that [`type_name`](Self::type_name) resolves.
    /// Type ids occupy one byte of a variant header, so the count never exceeds 256.
    fn type_count(&self, format_major: u32) -> u32 {
        (0..=u32::from(u8::MAX))
            .take_while(|&id| self.type_name(id, format_major).is_some())
            .count() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantType {
    Nil,
    Bool,
    Int,
    Real,
    String,
    Vector2,
    Rect2,
    Vector3,
    Transform2D,
    Plane,
    Quat,
    Aabb,
    Basis,
    Transform,
    Color,
    Image,
    NodePath,
    Rid,
    Object,
    InputEvent,
    Dictionary,
    Array,
    ByteArray,
    IntArray,
    RealArray,
    StringArray,
    Vector2Array,
    Vector3Array,
    ColorArray,
}

const TYPES_V2: &[VariantType] = &[
    VariantType::Nil,
    VariantType::Bool,
    VariantType::Int,
    VariantType::Real,
    VariantType::String,
    VariantType::Vector2,
    VariantType::Rect2,
    VariantType::Vector3,
    VariantType::Transform2D,
    VariantType::Plane,
    VariantType::Quat,
    VariantType::Aabb,
    VariantType::Basis,
    VariantType::Transform,
    VariantType::Color,
    VariantType::Image,
    VariantType::NodePath,
    VariantType::Rid,
    VariantType::Object,
    VariantType::InputEvent,
    VariantType::Dictionary,
    VariantType::Array,
    VariantType::ByteArray,
    VariantType::IntArray,
    VariantType::RealArray,
    VariantType::StringArray,
    VariantType::Vector2Array,
    VariantType::Vector3Array,
    VariantType::ColorArray,
];

// 3.x dropped Image and InputEvent from the variant set.
const TYPES_V3: &[VariantType] = &[
    VariantType::Nil,
    VariantType::Bool,
    VariantType::Int,
    VariantType::Real,
    VariantType::String,
    VariantType::Vector2,
    VariantType::Rect2,
    VariantType::Vector3,
    VariantType::Transform2D,
    VariantType::Plane,
    VariantType::Quat,
    VariantType::Aabb,
    VariantType::Basis,
    VariantType::Transform,
    VariantType::Color,
    VariantType::NodePath,
    VariantType::Rid,
    VariantType::Object,
    VariantType::Dictionary,
    VariantType::Array,
    VariantType::ByteArray,
    VariantType::IntArray,
    VariantType::RealArray,
    VariantType::StringArray,
    VariantType::Vector2Array,
    VariantType::Vector3Array,
    VariantType::ColorArray,
];

fn type_table(major: u32) -> Option<&'static [VariantType]> {
    match major {
        2 => Some(TYPES_V2),
        3 => Some(TYPES_V3),
        _ => None,
    }
}

impl VariantType {
    pub fn from_id(type_id: u32, major: u32) -> Option<VariantType> {
        type_table(major)?.get(type_id as usize).copied()
    }

    /// Script-visible name of the type in the given engine major.
    pub fn name(self, major: u32) -> &'static str {
        let v2 = major < 3;
        match self {
            VariantType::Nil => "Nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Real => "float",
            VariantType::String => "String",
            VariantType::Vector2 => "Vector2",
            VariantType::Rect2 => "Rect2",
            VariantType::Vector3 => "Vector3",
            VariantType::Transform2D if v2 => "Matrix32",
            VariantType::Transform2D => "Transform2D",
            VariantType::Plane => "Plane",
            VariantType::Quat => "Quat",
            VariantType::Aabb => "AABB",
            VariantType::Basis if v2 => "Matrix3",
            VariantType::Basis => "Basis",
            VariantType::Transform => "Transform",
            VariantType::Color => "Color",
            VariantType::Image => "Image",
            VariantType::NodePath => "NodePath",
            VariantType::Rid => "RID",
            VariantType::Object => "Object",
            VariantType::InputEvent => "InputEvent",
            VariantType::Dictionary => "Dictionary",
            VariantType::Array => "Array",
            VariantType::ByteArray if v2 => "RawArray",
            VariantType::ByteArray => "PoolByteArray",
            VariantType::IntArray if v2 => "IntArray",
            VariantType::IntArray => "PoolIntArray",
            VariantType::RealArray if v2 => "RealArray",
            VariantType::RealArray => "PoolRealArray",
            VariantType::StringArray if v2 => "StringArray",
            VariantType::StringArray => "PoolStringArray",
            VariantType::Vector2Array if v2 => "Vector2Array",
            VariantType::Vector2Array => "PoolVector2Array",
            VariantType::Vector3Array if v2 => "Vector3Array",
            VariantType::Vector3Array => "PoolVector3Array",
            VariantType::ColorArray if v2 => "ColorArray",
            VariantType::ColorArray => "PoolColorArray",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Nil,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(String),
    Vector2([f32; 2]),
    Rect2([f32; 4]),
    Vector3([f32; 3]),
    Transform2D([f32; 6]),
    Plane([f32; 4]),
    Quat([f32; 4]),
    Aabb([f32; 6]),
    Basis([f32; 9]),
    Transform([f32; 12]),
    Color([f32; 4]),
    NodePath(String),
    Rid,
    Object(Option<u64>),
    Dictionary(Vec<(Variant, Variant)>),
    Array(Vec<Variant>),
    ByteArray(Vec<u8>),
    IntArray(Vec<i32>),
    RealArray(Vec<f32>),
    StringArray(Vec<String>),
    Vector2Array(Vec<[f32; 2]>),
    Vector3Array(Vec<[f32; 3]>),
    ColorArray(Vec<[f32; 4]>),
}

impl Variant {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Real(_) => VariantType::Real,
            Variant::String(_) => VariantType::String,
            Variant::Vector2(_) => VariantType::Vector2,
            Variant::Rect2(_) => VariantType::Rect2,
            Variant::Vector3(_) => VariantType::Vector3,
            Variant::Transform2D(_) => VariantType::Transform2D,
            Variant::Plane(_) => VariantType::Plane,
            Variant::Quat(_) => VariantType::Quat,
            Variant::Aabb(_) => VariantType::Aabb,
            Variant::Basis(_) => VariantType::Basis,
            Variant::Transform(_) => VariantType::Transform,
            Variant::Color(_) => VariantType::Color,
            Variant::NodePath(_) => VariantType::NodePath,
            Variant::Rid => VariantType::Rid,
            Variant::Object(_) => VariantType::Object,
            Variant::Dictionary(_) => VariantType::Dictionary,
            Variant::Array(_) => VariantType::Array,
            Variant::ByteArray(_) => VariantType::ByteArray,
            Variant::IntArray(_) => VariantType::IntArray,
            Variant::RealArray(_) => VariantType::RealArray,
            Variant::StringArray(_) => VariantType::StringArray,
            Variant::Vector2Array(_) => VariantType::Vector2Array,
            Variant::Vector3Array(_) => VariantType::Vector3Array,
            Variant::ColorArray(_) => VariantType::ColorArray,
        }
    }

    /// The expression that constructs this value in script source.
    pub fn to_source(&self, major: u32) -> String {
        let mut out = String::new();
        self.write_source(&mut out, major);
        out
    }

    fn write_source(&self, out: &mut String, major: u32) {
        let name = self.variant_type().name(major);
        match self {
            Variant::Nil | Variant::Object(_) => out.push_str("null"),
            Variant::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Variant::Int(v) => out.push_str(&v.to_string()),
            Variant::Real(v) => out.push_str(&real_literal(*v)),
            Variant::String(s) => quote_into(out, s),
            Variant::Vector2(c) => write_ctor(out, name, c),
            Variant::Rect2(c) | Variant::Plane(c) | Variant::Quat(c) | Variant::Color(c) => {
                write_ctor(out, name, c)
            }
            Variant::Vector3(c) => write_ctor(out, name, c),
            Variant::Transform2D(c) | Variant::Aabb(c) => write_ctor(out, name, c),
            Variant::Basis(c) => write_ctor(out, name, c),
            Variant::Transform(c) => write_ctor(out, name, c),
            Variant::NodePath(p) => {
                out.push_str("NodePath(");
                quote_into(out, p);
                out.push(')');
            }
            Variant::Rid => out.push_str("RID()"),
            Variant::Dictionary(entries) => {
                if entries.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_source(out, major);
                    out.push(':');
                    v.write_source(out, major);
                }
                out.push_str(" }");
            }
            Variant::Array(items) => {
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_source(out, major);
                }
                out.push_str(" ]");
            }
            Variant::ByteArray(v) => {
                write_list(out, name, v.iter().map(|b| b.to_string()));
            }
            Variant::IntArray(v) => {
                write_list(out, name, v.iter().map(|i| i.to_string()));
            }
            Variant::RealArray(v) => {
                write_list(out, name, v.iter().map(|r| real_component(f64::from(*r))));
            }
            Variant::StringArray(v) => {
                write_list(
                    out,
                    name,
                    v.iter().map(|s| {
                        let mut q = String::new();
                        quote_into(&mut q, s);
                        q
                    }),
                );
            }
            Variant::Vector2Array(v) => write_list(out, name, v.iter().flatten().map(component)),
            Variant::Vector3Array(v) => write_list(out, name, v.iter().flatten().map(component)),
            Variant::ColorArray(v) => write_list(out, name, v.iter().flatten().map(component)),
        }
    }
}

fn component(c: &f32) -> String {
    real_component(f64::from(*c))
}

/// Shortest text for a real, preferring the single-precision spelling when it round-trips.
fn real_component(v: f64) -> String {
    let single = v as f32;
    if f64::from(single) == v {
        format!("{single}")
    } else {
        format!("{v}")
    }
}

/// A scalar real keeps a decimal point so it re-parses as a float.
fn real_literal(v: f64) -> String {
    let mut s = real_component(v);
    if !s.contains(['.', 'e', 'E', 'i', 'N']) {
        s.push_str(".0");
    }
    s
}

fn write_ctor(out: &mut String, name: &str, components: &[f32]) {
    write_list(out, name, components.iter().map(component));
}

fn write_list(out: &mut String, name: &str, items: impl Iterator<Item = String>) {
    out.push_str(name);
    out.push_str("( ");
    let mut first = true;
    for item in items {
        if !first {
            out.push_str(", ");
        }
        first = false;
        out.push_str(&item);
    }
    if first {
        // nothing written, collapse "( " to "()"
        out.pop();
        out.push(')');
    } else {
        out.push_str(" )");
    }
}

fn quote_into(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// The engine's own binary variant encoding, majors 2 and 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineVariantDecoder;

impl VariantDecoder for EngineVariantDecoder {
    fn decode_one(&self, buf: &[u8], format_major: u32) -> Result<(Variant, usize), VariantError> {
        if type_table(format_major).is_none() {
            return Err(VariantError::UnsupportedFormat(format_major));
        }
        let mut r = Reader::new(buf);
        let v = decode_value(&mut r, format_major, 0)?;
        Ok((v, r.pos()))
    }

    fn type_name(&self, type_id: u32, format_major: u32) -> Option<&'static str> {
        VariantType::from_id(type_id, format_major).map(|t| t.name(format_major))
    }

    fn type_count(&self, format_major: u32) -> u32 {
        type_table(format_major).map_or(0, |t| t.len() as u32)
    }
}

fn padded(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn read_string(r: &mut Reader<'_>) -> Result<String, VariantError> {
    let len = r.get_u32()? as usize;
    let bytes = r.get_bytes(len)?;
    r.advance(padded(len))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_reals<const N: usize>(r: &mut Reader<'_>) -> Result<[f32; N], VariantError> {
    let mut out = [0f32; N];
    for c in out.iter_mut() {
        *c = r.get_f32()?;
    }
    Ok(out)
}

/// Clamps an untrusted element count to what the remaining bytes could hold.
fn capacity_for(count: usize, r: &Reader<'_>, elem_size: usize) -> usize {
    count.min(r.remaining() / elem_size.max(1))
}

fn read_node_path(r: &mut Reader<'_>, major: u32) -> Result<String, VariantError> {
    let head = r.get_u32()?;
    if head & 0x8000_0000 == 0 {
        // legacy layout: the path as one plain string
        let len = head as usize;
        let bytes = r.get_bytes(len)?;
        r.advance(padded(len))?;
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let name_count = (head & 0x7fff_ffff) as usize;
    let mut sub_count = r.get_u32()? as usize;
    if major >= 3 {
        sub_count &= 0x7fff_ffff;
    }
    let flags = r.get_u32()?;
    let has_property = flags & 2 != 0;

    let mut path = String::new();
    if flags & 1 != 0 {
        path.push('/');
    }
    let total = name_count + sub_count + usize::from(has_property);
    for i in 0..total {
        let part = read_string(r)?;
        if i < name_count {
            if i > 0 {
                path.push('/');
            }
        } else {
            path.push(':');
        }
        path.push_str(&part);
    }
    Ok(path)
}

fn decode_value(r: &mut Reader<'_>, major: u32, depth: usize) -> Result<Variant, VariantError> {
    if depth > MAX_DEPTH {
        return Err(VariantError::TooDeep(MAX_DEPTH));
    }
    let header = r.get_u32()?;
    let type_id = header & 0xff;
    let wide = major >= 3 && header & ENCODE_FLAG_64 != 0;
    let unsupported = VariantError::UnsupportedType { type_id, major };
    let ty = VariantType::from_id(type_id, major).ok_or(VariantError::UnsupportedType { type_id, major })?;

    let v = match ty {
        VariantType::Nil => Variant::Nil,
        VariantType::Bool => Variant::Bool(r.get_u32()? != 0),
        VariantType::Int if wide => Variant::Int(r.get_i64()?),
        VariantType::Int => Variant::Int(i64::from(r.get_i32()?)),
        VariantType::Real if wide => Variant::Real(r.get_f64()?),
        VariantType::Real => Variant::Real(f64::from(r.get_f32()?)),
        VariantType::String => Variant::String(read_string(r)?),
        VariantType::Vector2 => Variant::Vector2(read_reals(r)?),
        VariantType::Rect2 => Variant::Rect2(read_reals(r)?),
        VariantType::Vector3 => Variant::Vector3(read_reals(r)?),
        VariantType::Transform2D => Variant::Transform2D(read_reals(r)?),
        VariantType::Plane => Variant::Plane(read_reals(r)?),
        VariantType::Quat => Variant::Quat(read_reals(r)?),
        VariantType::Aabb => Variant::Aabb(read_reals(r)?),
        VariantType::Basis => Variant::Basis(read_reals(r)?),
        VariantType::Transform => Variant::Transform(read_reals(r)?),
        VariantType::Color => Variant::Color(read_reals(r)?),
        VariantType::NodePath => Variant::NodePath(read_node_path(r, major)?),
        VariantType::Rid => Variant::Rid,
        VariantType::Object if major < 3 => Variant::Object(None),
        VariantType::Object if header & ENCODE_FLAG_OBJECT_AS_ID != 0 => {
            Variant::Object(Some(r.get_u64()?))
        }
        VariantType::Object => {
            // only the empty (null) object can be recovered without a class database
            let class = read_string(r)?;
            if !class.is_empty() {
                return Err(unsupported);
            }
            Variant::Object(None)
        }
        VariantType::Image | VariantType::InputEvent => return Err(unsupported),
        VariantType::Dictionary => {
            let count = (r.get_u32()? & 0x7fff_ffff) as usize;
            let mut entries = Vec::with_capacity(capacity_for(count, r, 8));
            for _ in 0..count {
                let k = decode_value(r, major, depth + 1)?;
                let v = decode_value(r, major, depth + 1)?;
                entries.push((k, v));
            }
            Variant::Dictionary(entries)
        }
        VariantType::Array => {
            let count = (r.get_u32()? & 0x7fff_ffff) as usize;
            let mut items = Vec::with_capacity(capacity_for(count, r, 4));
            for _ in 0..count {
                items.push(decode_value(r, major, depth + 1)?);
            }
            Variant::Array(items)
        }
        VariantType::ByteArray => {
            let len = r.get_u32()? as usize;
            let bytes = r.get_bytes(len)?.to_vec();
            r.advance(padded(len))?;
            Variant::ByteArray(bytes)
        }
        VariantType::IntArray => {
            let count = r.get_u32()? as usize;
            let mut v = Vec::with_capacity(capacity_for(count, r, 4));
            for _ in 0..count {
                v.push(r.get_i32()?);
            }
            Variant::IntArray(v)
        }
        VariantType::RealArray => {
            let count = r.get_u32()? as usize;
            let mut v = Vec::with_capacity(capacity_for(count, r, 4));
            for _ in 0..count {
                v.push(r.get_f32()?);
            }
            Variant::RealArray(v)
        }
        VariantType::StringArray => {
            let count = r.get_u32()? as usize;
            let mut v = Vec::with_capacity(capacity_for(count, r, 4));
            for _ in 0..count {
                v.push(read_string(r)?);
            }
            Variant::StringArray(v)
        }
        VariantType::Vector2Array => {
            let count = r.get_u32()? as usize;
            let mut v = Vec::with_capacity(capacity_for(count, r, 8));
            for _ in 0..count {
                v.push(read_reals(r)?);
            }
            Variant::Vector2Array(v)
        }
        VariantType::Vector3Array => {
            let count = r.get_u32()? as usize;
            let mut v = Vec::with_capacity(capacity_for(count, r, 12));
            for _ in 0..count {
                v.push(read_reals(r)?);
            }
            Variant::Vector3Array(v)
        }
        VariantType::ColorArray => {
            let count = r.get_u32()? as usize;
            let mut v = Vec::with_capacity(capacity_for(count, r, 16));
            for _ in 0..count {
                v.push(read_reals(r)?);
            }
            Variant::ColorArray(v)
        }
    };
    Ok(v)
}
