//! Scalar type tags and values
//!
//! Defines:
//! - `ScalarType`: the one-character tags of the signature grammar
//! - `ScalarValue`: a tagged C scalar as it crosses the call boundary
//!
//! Tag mapping:
//! - `c` → char, `s` → short, `i` → int, `j` → long, `l` → long long
//! - `p` → pointer, `f` → float, `d` → double
//! - `v` (void) is only meaningful as a return type and has no `ScalarType`

use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::os::raw::{c_int, c_long, c_longlong};

/// C `char` as passed by the harness (always signed)
pub type CChar = i8;
/// C `short`
pub type CShort = i16;
/// C `int`
pub type CInt = c_int;
/// C `long`
pub type CLong = c_long;
/// C `long long`
pub type CLongLong = c_longlong;
/// C `void*`
pub type CPointer = *const c_void;
/// C `float`
pub type CFloat = f32;
/// C `double`
pub type CDouble = f64;

/// Tag of the void return type
pub const VOID_TAG: char = 'v';
/// First character of every aggregate token
pub const AGGREGATE_TAG: char = '{';

/// Scalar C types understood by the signature grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Char,
    Short,
    Int,
    Long,
    LongLong,
    Pointer,
    Float,
    Double,
}

impl ScalarType {
    /// Every scalar type, in tag order
    pub const ALL: [ScalarType; 8] = [
        ScalarType::Char,
        ScalarType::Short,
        ScalarType::Int,
        ScalarType::Long,
        ScalarType::LongLong,
        ScalarType::Pointer,
        ScalarType::Float,
        ScalarType::Double,
    ];

    /// Look up a scalar type by its signature tag
    ///
    /// # Examples
    ///
    /// ```
    /// # use abicheck_runtime::types::ScalarType;
    /// assert_eq!(ScalarType::from_tag('j'), Some(ScalarType::Long));
    /// assert_eq!(ScalarType::from_tag('v'), None);
    /// ```
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'c' => Some(ScalarType::Char),
            's' => Some(ScalarType::Short),
            'i' => Some(ScalarType::Int),
            'j' => Some(ScalarType::Long),
            'l' => Some(ScalarType::LongLong),
            'p' => Some(ScalarType::Pointer),
            'f' => Some(ScalarType::Float),
            'd' => Some(ScalarType::Double),
            _ => None,
        }
    }

    /// Signature tag of this type
    pub const fn tag(self) -> char {
        match self {
            ScalarType::Char => 'c',
            ScalarType::Short => 's',
            ScalarType::Int => 'i',
            ScalarType::Long => 'j',
            ScalarType::LongLong => 'l',
            ScalarType::Pointer => 'p',
            ScalarType::Float => 'f',
            ScalarType::Double => 'd',
        }
    }

    /// Size in bytes on the host
    pub const fn size(self) -> usize {
        match self {
            ScalarType::Char => mem::size_of::<CChar>(),
            ScalarType::Short => mem::size_of::<CShort>(),
            ScalarType::Int => mem::size_of::<CInt>(),
            ScalarType::Long => mem::size_of::<CLong>(),
            ScalarType::LongLong => mem::size_of::<CLongLong>(),
            ScalarType::Pointer => mem::size_of::<CPointer>(),
            ScalarType::Float => mem::size_of::<CFloat>(),
            ScalarType::Double => mem::size_of::<CDouble>(),
        }
    }

    /// Alignment in bytes on the host, as laid out inside a `#[repr(C)]` struct
    pub const fn align(self) -> usize {
        match self {
            ScalarType::Char => mem::align_of::<CChar>(),
            ScalarType::Short => mem::align_of::<CShort>(),
            ScalarType::Int => mem::align_of::<CInt>(),
            ScalarType::Long => mem::align_of::<CLong>(),
            ScalarType::LongLong => mem::align_of::<CLongLong>(),
            ScalarType::Pointer => mem::align_of::<CPointer>(),
            ScalarType::Float => mem::align_of::<CFloat>(),
            ScalarType::Double => mem::align_of::<CDouble>(),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A C scalar value tagged with its type
///
/// Pointers are carried as addresses so values stay `Send` and comparable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Char(CChar),
    Short(CShort),
    Int(CInt),
    Long(CLong),
    LongLong(CLongLong),
    Pointer(usize),
    Float(CFloat),
    Double(CDouble),
}

impl ScalarValue {
    /// Type tag of this value
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::Char(_) => ScalarType::Char,
            ScalarValue::Short(_) => ScalarType::Short,
            ScalarValue::Int(_) => ScalarType::Int,
            ScalarValue::Long(_) => ScalarType::Long,
            ScalarValue::LongLong(_) => ScalarType::LongLong,
            ScalarValue::Pointer(_) => ScalarType::Pointer,
            ScalarValue::Float(_) => ScalarType::Float,
            ScalarValue::Double(_) => ScalarType::Double,
        }
    }

    /// Build a pointer value from a raw pointer
    pub fn pointer(ptr: CPointer) -> Self {
        ScalarValue::Pointer(ptr as usize)
    }

    /// Zero of the given type
    pub const fn zero(ty: ScalarType) -> Self {
        match ty {
            ScalarType::Char => ScalarValue::Char(0),
            ScalarType::Short => ScalarValue::Short(0),
            ScalarType::Int => ScalarValue::Int(0),
            ScalarType::Long => ScalarValue::Long(0),
            ScalarType::LongLong => ScalarValue::LongLong(0),
            ScalarType::Pointer => ScalarValue::Pointer(0),
            ScalarType::Float => ScalarValue::Float(0.0),
            ScalarType::Double => ScalarValue::Double(0.0),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Char(v) => write!(f, "{}", v),
            ScalarValue::Short(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Long(v) => write!(f, "{}", v),
            ScalarValue::LongLong(v) => write!(f, "{}", v),
            ScalarValue::Pointer(v) => write!(f, "{:#x}", v),
            ScalarValue::Float(v) => write!(f, "{:?}", v),
            ScalarValue::Double(v) => write!(f, "{:?}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip_for_every_type() {
        for ty in ScalarType::ALL {
            assert_eq!(ScalarType::from_tag(ty.tag()), Some(ty));
        }
    }

    #[test]
    fn test_void_and_aggregate_are_not_scalars() {
        assert_eq!(ScalarType::from_tag(VOID_TAG), None);
        assert_eq!(ScalarType::from_tag(AGGREGATE_TAG), None);
        assert_eq!(ScalarType::from_tag('x'), None);
    }

    #[test]
    fn test_sizes_match_host() {
        assert_eq!(ScalarType::Char.size(), 1);
        assert_eq!(ScalarType::Short.size(), 2);
        assert_eq!(ScalarType::LongLong.size(), 8);
        assert_eq!(ScalarType::Double.size(), 8);
        assert_eq!(ScalarType::Pointer.size(), mem::size_of::<usize>());
    }

    #[test]
    fn test_value_carries_its_type() {
        assert_eq!(ScalarValue::Int(5).scalar_type(), ScalarType::Int);
        assert_eq!(ScalarValue::Double(0.5).scalar_type(), ScalarType::Double);
        assert_eq!(ScalarValue::zero(ScalarType::Pointer), ScalarValue::Pointer(0));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ScalarValue::Int(-3).to_string(), "-3");
        assert_eq!(ScalarValue::Pointer(0xfeed).to_string(), "0xfeed");
        assert_eq!(ScalarValue::Float(1.5).to_string(), "1.5");
    }
}
