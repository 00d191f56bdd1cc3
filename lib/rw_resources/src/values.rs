use crate::errors::{ResourcesError, ResourcesResult};
use crate::ids::{IdentifierTable, ResRef};
use crate::strings::{StringPool, StringPoolIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const VALUE_SIZE: u16 = 8;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

const DATA_NULL_UNDEFINED: u32 = 0;
const DATA_NULL_EMPTY: u32 = 1;

const COMPLEX_UNIT_MASK: u32 = 0xf;
const COMPLEX_RADIX_SHIFT: u32 = 4;
const COMPLEX_RADIX_MASK: u32 = 0x3;
const COMPLEX_MANTISSA_SHIFT: u32 = 8;
const COMPLEX_MANTISSA_MASK: u32 = 0x00ff_ffff;

const MANTISSA_MULT: f32 = 1.0 / (1 << COMPLEX_MANTISSA_SHIFT) as f32;
const RADIX_MULTS: [f32; 4] = [
    MANTISSA_MULT,
    MANTISSA_MULT / (1 << 7) as f32,
    MANTISSA_MULT / (1 << 15) as f32,
    MANTISSA_MULT / (1 << 23) as f32,
];

const DIMENSION_UNITS: [&str; 6] = ["px", "dp", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];

/// A typed 32-bit value, as stored in entries, maps and XML attributes.
///
/// The variant is fully determined by the on-disk `dataType` byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    /// Null value explicitly set to "empty" (`@empty`).
    Empty,
    Reference(u32),
    Attribute(u32),
    String(StringPoolIndex),
    Float(f32),
    Dimension(u32),
    Fraction(u32),
    DynamicReference(u32),
    DynamicAttribute(u32),
    IntDec(u32),
    IntHex(u32),
    /// Raw data is kept: producers use either `1` or `0xffffffff` for true.
    IntBoolean(u32),
    IntColorARGB8(u32),
    IntColorRGB8(u32),
    IntColorARGB4(u32),
    IntColorRGB4(u32),
}

impl Value {
    pub fn from_raw(data_type: u8, data: u32) -> ResourcesResult<Self> {
        let value = match data_type {
            TYPE_NULL => match data {
                DATA_NULL_EMPTY => Self::Empty,
                DATA_NULL_UNDEFINED => Self::Null,
                _ => {
                    log::warn!("null value with unexpected data {data:#x}");
                    Self::Null
                }
            },
            TYPE_REFERENCE => Self::Reference(data),
            TYPE_ATTRIBUTE => Self::Attribute(data),
            TYPE_STRING => Self::String(StringPoolIndex::new(data as usize)),
            TYPE_FLOAT => Self::Float(f32::from_bits(data)),
            TYPE_DIMENSION => Self::Dimension(data),
            TYPE_FRACTION => Self::Fraction(data),
            TYPE_DYNAMIC_REFERENCE => Self::DynamicReference(data),
            TYPE_DYNAMIC_ATTRIBUTE => Self::DynamicAttribute(data),
            TYPE_INT_DEC => Self::IntDec(data),
            TYPE_INT_HEX => Self::IntHex(data),
            TYPE_INT_BOOLEAN => Self::IntBoolean(data),
            TYPE_INT_COLOR_ARGB8 => Self::IntColorARGB8(data),
            TYPE_INT_COLOR_RGB8 => Self::IntColorRGB8(data),
            TYPE_INT_COLOR_ARGB4 => Self::IntColorARGB4(data),
            TYPE_INT_COLOR_RGB4 => Self::IntColorRGB4(data),
            _ => {
                return Err(ResourcesError::Format(format!(
                    "unknown value data type {data_type:#04x}"
                )))
            }
        };
        Ok(value)
    }

    #[must_use]
    pub const fn data_type(&self) -> u8 {
        match self {
            Self::Null | Self::Empty => TYPE_NULL,
            Self::Reference(_) => TYPE_REFERENCE,
            Self::Attribute(_) => TYPE_ATTRIBUTE,
            Self::String(_) => TYPE_STRING,
            Self::Float(_) => TYPE_FLOAT,
            Self::Dimension(_) => TYPE_DIMENSION,
            Self::Fraction(_) => TYPE_FRACTION,
            Self::DynamicReference(_) => TYPE_DYNAMIC_REFERENCE,
            Self::DynamicAttribute(_) => TYPE_DYNAMIC_ATTRIBUTE,
            Self::IntDec(_) => TYPE_INT_DEC,
            Self::IntHex(_) => TYPE_INT_HEX,
            Self::IntBoolean(_) => TYPE_INT_BOOLEAN,
            Self::IntColorARGB8(_) => TYPE_INT_COLOR_ARGB8,
            Self::IntColorRGB8(_) => TYPE_INT_COLOR_RGB8,
            Self::IntColorARGB4(_) => TYPE_INT_COLOR_ARGB4,
            Self::IntColorRGB4(_) => TYPE_INT_COLOR_RGB4,
        }
    }

    #[must_use]
    pub fn data(&self) -> u32 {
        match self {
            Self::Null => DATA_NULL_UNDEFINED,
            Self::Empty => DATA_NULL_EMPTY,
            Self::String(idx) => idx.index() as u32,
            Self::Float(f) => f.to_bits(),
            Self::Reference(d)
            | Self::Attribute(d)
            | Self::Dimension(d)
            | Self::Fraction(d)
            | Self::DynamicReference(d)
            | Self::DynamicAttribute(d)
            | Self::IntDec(d)
            | Self::IntHex(d)
            | Self::IntBoolean(d)
            | Self::IntColorARGB8(d)
            | Self::IntColorRGB8(d)
            | Self::IntColorARGB4(d)
            | Self::IntColorRGB4(d) => *d,
        }
    }

    /// Resource id this value points to, if it is a reference of any kind.
    #[must_use]
    pub const fn referenced_id(&self) -> Option<u32> {
        match self {
            Self::Reference(id)
            | Self::Attribute(id)
            | Self::DynamicReference(id)
            | Self::DynamicAttribute(id) => Some(*id),
            _ => None,
        }
    }

    /// Converts to the symbolic form. References are named through `ids`
    /// when possible and kept as numeric ids otherwise.
    pub fn resolve(
        &self,
        string_pool: &StringPool,
        ids: Option<&IdentifierTable>,
    ) -> ResourcesResult<ResolvedValue> {
        let reference = |id: u32| match ids {
            Some(ids) => ids.reference(id),
            None => ResRef::Unresolved(id),
        };
        let resolved = match self {
            Self::Null => ResolvedValue::Null,
            Self::Empty => ResolvedValue::Empty,
            Self::Reference(id) => ResolvedValue::Reference(reference(*id)),
            Self::Attribute(id) => ResolvedValue::Attribute(reference(*id)),
            Self::DynamicReference(id) => ResolvedValue::DynamicReference(reference(*id)),
            Self::DynamicAttribute(id) => ResolvedValue::DynamicAttribute(reference(*id)),
            Self::String(idx) => ResolvedValue::String(string_pool.string(*idx)?),
            Self::Float(f) => ResolvedValue::Float(*f),
            Self::Dimension(d) => ResolvedValue::Dimension(*d),
            Self::Fraction(d) => ResolvedValue::Fraction(*d),
            Self::IntDec(d) => ResolvedValue::IntDec(*d as i32),
            Self::IntHex(d) => ResolvedValue::IntHex(*d),
            Self::IntBoolean(d) => ResolvedValue::Boolean(*d),
            Self::IntColorARGB8(d) => ResolvedValue::Color(ColorKind::Argb8, *d),
            Self::IntColorRGB8(d) => ResolvedValue::Color(ColorKind::Rgb8, *d),
            Self::IntColorARGB4(d) => ResolvedValue::Color(ColorKind::Argb4, *d),
            Self::IntColorRGB4(d) => ResolvedValue::Color(ColorKind::Rgb4, *d),
        };
        Ok(resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKind {
    Argb8,
    Rgb8,
    Argb4,
    Rgb4,
}

/// Symbolic, editable counterpart of [`Value`]: strings are inlined and
/// resource ids are replaced by names whenever they can be mapped back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum ResolvedValue {
    Null,
    Empty,
    Reference(ResRef),
    Attribute(ResRef),
    DynamicReference(ResRef),
    DynamicAttribute(ResRef),
    String(String),
    Float(f32),
    Dimension(u32),
    Fraction(u32),
    IntDec(i32),
    IntHex(u32),
    Boolean(u32),
    Color(ColorKind, u32),
}

impl ResolvedValue {
    /// Converts back to a binary value, adding strings to `string_pool`
    /// when needed. `location` only serves error reporting.
    pub fn unresolve(
        &self,
        string_pool: &mut StringPool,
        ids: Option<&IdentifierTable>,
        location: &str,
    ) -> ResourcesResult<Value> {
        let id = |r: &ResRef| r.to_id(ids, location);
        let value = match self {
            Self::Null => Value::Null,
            Self::Empty => Value::Empty,
            Self::Reference(r) => Value::Reference(id(r)?),
            Self::Attribute(r) => Value::Attribute(id(r)?),
            Self::DynamicReference(r) => Value::DynamicReference(id(r)?),
            Self::DynamicAttribute(r) => Value::DynamicAttribute(id(r)?),
            Self::String(s) => Value::String(string_pool.get_or_push(s)),
            Self::Float(f) => Value::Float(*f),
            Self::Dimension(d) => Value::Dimension(*d),
            Self::Fraction(d) => Value::Fraction(*d),
            Self::IntDec(i) => Value::IntDec(*i as u32),
            Self::IntHex(d) => Value::IntHex(*d),
            Self::Boolean(d) => Value::IntBoolean(*d),
            Self::Color(ColorKind::Argb8, d) => Value::IntColorARGB8(*d),
            Self::Color(ColorKind::Rgb8, d) => Value::IntColorRGB8(*d),
            Self::Color(ColorKind::Argb4, d) => Value::IntColorARGB4(*d),
            Self::Color(ColorKind::Rgb4, d) => Value::IntColorRGB4(*d),
        };
        Ok(value)
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "@null"),
            Self::Empty => write!(f, "@empty"),
            Self::Reference(ResRef::Unresolved(0)) => write!(f, "@null"),
            Self::Reference(r) | Self::DynamicReference(r) => write!(f, "@{r}"),
            Self::Attribute(r) | Self::DynamicAttribute(r) => write!(f, "?{r}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Dimension(d) => write_complex(f, *d, 1.0, &DIMENSION_UNITS),
            Self::Fraction(d) => write_complex(f, *d, 100.0, &FRACTION_UNITS),
            Self::IntDec(i) => write!(f, "{i}"),
            Self::IntHex(h) => write!(f, "{h:#x}"),
            Self::Boolean(b) => write!(f, "{}", *b != 0),
            Self::Color(kind, c) => write_color(f, *kind, *c),
        }
    }
}

/// Decodes the float part of a complex (dimension or fraction) value.
#[must_use]
pub fn complex_to_float(complex: u32) -> f32 {
    let mantissa = (complex & (COMPLEX_MANTISSA_MASK << COMPLEX_MANTISSA_SHIFT)) as i32;
    let radix = ((complex >> COMPLEX_RADIX_SHIFT) & COMPLEX_RADIX_MASK) as usize;
    mantissa as f32 * RADIX_MULTS[radix]
}

fn write_complex(f: &mut fmt::Formatter, complex: u32, scale: f32, units: &[&str]) -> fmt::Result {
    let value = complex_to_float(complex) * scale;
    if value.fract() == 0.0 {
        write!(f, "{value:.1}")?;
    } else {
        write!(f, "{value}")?;
    }
    match units.get((complex & COMPLEX_UNIT_MASK) as usize) {
        Some(unit) => write!(f, "{unit}"),
        None => write!(f, " (unit {:#x})", complex & COMPLEX_UNIT_MASK),
    }
}

fn write_color(f: &mut fmt::Formatter, kind: ColorKind, c: u32) -> fmt::Result {
    let nibble = |shift: u32| (c >> shift) & 0xf;
    match kind {
        ColorKind::Argb8 => write!(f, "#{c:08x}"),
        ColorKind::Rgb8 => write!(f, "#{:06x}", c & 0x00ff_ffff),
        ColorKind::Argb4 => write!(
            f,
            "#{:x}{:x}{:x}{:x}",
            nibble(28),
            nibble(20),
            nibble(12),
            nibble(4)
        ),
        ColorKind::Rgb4 => write!(f, "#{:x}{:x}{:x}", nibble(20), nibble(12), nibble(4)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_roundtrip_preserves_data() {
        for (typ, data) in [
            (TYPE_NULL, 1),
            (TYPE_REFERENCE, 0x7f01_0002),
            (TYPE_FLOAT, 0x3fc0_0000),
            (TYPE_INT_BOOLEAN, 0xffff_ffff),
            (TYPE_INT_BOOLEAN, 1),
            (TYPE_INT_COLOR_RGB4, 0xffff_0000),
        ] {
            let value = Value::from_raw(typ, data).unwrap();
            assert_eq!(value.data_type(), typ);
            assert_eq!(value.data(), data);
        }
    }

    #[test]
    fn unknown_data_type() {
        assert!(Value::from_raw(0x42, 0).unwrap_err().is_format_error());
    }

    #[test]
    fn dimensions() {
        // 16dp: mantissa 16 << 8, radix 23p0, unit dip
        assert_eq!(ResolvedValue::Dimension(0x1001).to_string(), "16.0dp");
        // 1.5px: radix 16p7
        assert_eq!(ResolvedValue::Dimension(0x0000_c010).to_string(), "1.5px");
        assert_eq!(ResolvedValue::Dimension(0x1002).to_string(), "16.0sp");
    }

    #[test]
    fn fractions() {
        // 0.5 as 0p23 mantissa, scaled to a percentage
        assert_eq!(ResolvedValue::Fraction(0x4000_0030).to_string(), "50.0%");
        assert_eq!(ResolvedValue::Fraction(0x4000_0031).to_string(), "50.0%p");
    }

    #[test]
    fn colors() {
        assert_eq!(
            ResolvedValue::Color(ColorKind::Argb8, 0x80ff_0000).to_string(),
            "#80ff0000"
        );
        assert_eq!(
            ResolvedValue::Color(ColorKind::Rgb8, 0xff12_3456).to_string(),
            "#123456"
        );
        assert_eq!(
            ResolvedValue::Color(ColorKind::Rgb4, 0xffff_0000).to_string(),
            "#f00"
        );
        assert_eq!(
            ResolvedValue::Color(ColorKind::Argb4, 0x88ff_0000).to_string(),
            "#8f00"
        );
    }

    #[test]
    fn booleans_keep_raw_data() {
        let mut pool = StringPool::new(true);
        let value = Value::IntBoolean(0xffff_ffff);
        let resolved = value.resolve(&pool, None).unwrap();
        assert_eq!(resolved.to_string(), "true");
        assert_eq!(resolved.unresolve(&mut pool, None, "test").unwrap(), value);
    }

    #[test]
    fn strings_are_inlined() {
        let mut pool = StringPool::new(false);
        let idx = pool.push("hello");
        let resolved = Value::String(idx).resolve(&pool, None).unwrap();
        assert_eq!(resolved, ResolvedValue::String("hello".to_string()));
        assert_eq!(
            resolved.unresolve(&mut pool, None, "test").unwrap(),
            Value::String(idx)
        );
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn null_reference_renders_as_null() {
        let pool = StringPool::new(true);
        let resolved = Value::Reference(0).resolve(&pool, None).unwrap();
        assert_eq!(resolved.to_string(), "@null");
        assert_eq!(
            Value::Reference(0x0101_0000)
                .resolve(&pool, None)
                .unwrap()
                .to_string(),
            "@0x01010000"
        );
    }
}
