//! Aggregate (struct) descriptors
//!
//! An `AggregateDescriptor` is the structural description the call engine needs
//! to pass a struct by value: ordered fields, each a scalar or a nested aggregate,
//! optionally repeated as a fixed-size array. C layout (offsets, size, alignment)
//! is computed once at construction.
//!
//! `CAggregate` ties a `#[repr(C)]` Rust struct to its signature text and
//! descriptor, and provides the default byte-level comparator.

use crate::types::ScalarType;
use std::fmt;
use std::mem;
use std::ptr;

/// What a field holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Aggregate(AggregateDescriptor),
}

impl FieldKind {
    fn size(&self) -> usize {
        match self {
            FieldKind::Scalar(ty) => ty.size(),
            FieldKind::Aggregate(desc) => desc.size(),
        }
    }

    fn align(&self) -> usize {
        match self {
            FieldKind::Scalar(ty) => ty.align(),
            FieldKind::Aggregate(desc) => desc.align(),
        }
    }
}

/// One field of an aggregate, possibly an array of `count` elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    kind: FieldKind,
    count: usize,
}

impl Field {
    /// Single scalar field
    pub fn scalar(ty: ScalarType) -> Self {
        Self {
            kind: FieldKind::Scalar(ty),
            count: 1,
        }
    }

    /// Single nested aggregate field
    pub fn aggregate(desc: AggregateDescriptor) -> Self {
        Self {
            kind: FieldKind::Aggregate(desc),
            count: 1,
        }
    }

    /// Turn this field into a fixed-size array of `count` elements
    pub fn repeated(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Number of array elements (1 for plain fields)
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Structural description of a C aggregate type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateDescriptor {
    fields: Vec<Field>,
    offsets: Vec<usize>,
    size: usize,
    align: usize,
}

impl AggregateDescriptor {
    /// Build a descriptor, laying fields out with C rules
    ///
    /// # Examples
    ///
    /// ```
    /// # use abicheck_runtime::aggregate::{AggregateDescriptor, Field};
    /// # use abicheck_runtime::types::ScalarType;
    /// let desc = AggregateDescriptor::new(vec![
    ///     Field::scalar(ScalarType::Char),
    ///     Field::scalar(ScalarType::Double),
    /// ]);
    /// assert_eq!(desc.offsets(), &[0, 8]);
    /// assert_eq!(desc.size(), 16);
    /// assert_eq!(desc.signature(), "{cd}");
    /// ```
    pub fn new(fields: Vec<Field>) -> Self {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0;
        let mut align = 1;

        for field in &fields {
            let field_align = field.kind.align();
            offset = round_up(offset, field_align);
            offsets.push(offset);
            offset += field.kind.size() * field.count;
            align = align.max(field_align);
        }

        Self {
            fields,
            offsets,
            size: round_up(offset, align),
            align,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Byte offset of each field, parallel to `fields()`
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Total size including trailing padding
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// Render the signature text this descriptor corresponds to
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AggregateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for field in &self.fields {
            match &field.kind {
                FieldKind::Scalar(ty) => write!(f, "{}", ty.tag())?,
                FieldKind::Aggregate(inner) => write!(f, "{}", inner)?,
            }
            if field.count != 1 {
                write!(f, "[{}]", field.count)?;
            }
        }
        write!(f, "}}")
    }
}

fn round_up(value: usize, align: usize) -> usize {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// A `#[repr(C)]` Rust struct usable as an aggregate argument or return value
///
/// # Safety
///
/// Implementors must guarantee that:
/// - the type is `#[repr(C)]` and `descriptor()` describes exactly its fields
/// - every bit pattern is a valid value (integers, floats and raw pointers only)
pub unsafe trait CAggregate: Copy + PartialEq + 'static {
    /// Signature text, e.g. `{ic}`
    const SIGNATURE: &'static str;

    /// Structural descriptor for the call engine
    fn descriptor() -> AggregateDescriptor;
}

/// Reinterpret the leading bytes of a payload as `T`
///
/// Returns `None` when the payload is shorter than `T`.
pub fn read_as<T: CAggregate>(bytes: &[u8]) -> Option<T> {
    if bytes.len() < mem::size_of::<T>() {
        return None;
    }
    // SAFETY: length checked above; CAggregate guarantees any bit pattern is valid
    Some(unsafe { ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
}

/// Store `value` into the leading bytes of a payload
///
/// Returns `false` (and writes nothing) when the payload is too short.
pub fn write_as<T: CAggregate>(bytes: &mut [u8], value: &T) -> bool {
    if bytes.len() < mem::size_of::<T>() {
        return false;
    }
    // SAFETY: length checked above; unaligned write of a Copy value
    unsafe { ptr::write_unaligned(bytes.as_mut_ptr().cast::<T>(), *value) };
    true
}

/// Default comparator: field-wise equality of two payloads read as `T`
///
/// Padding bytes are ignored and floating-point fields compare exactly.
pub fn compare_as<T: CAggregate>(observed: &[u8], expected: &[u8]) -> bool {
    match (read_as::<T>(observed), read_as::<T>(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CChar, CDouble, CInt};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct CharDouble {
        c: CChar,
        d: CDouble,
    }

    unsafe impl CAggregate for CharDouble {
        const SIGNATURE: &'static str = "{cd}";
        fn descriptor() -> AggregateDescriptor {
            AggregateDescriptor::new(vec![
                Field::scalar(ScalarType::Char),
                Field::scalar(ScalarType::Double),
            ])
        }
    }

    #[test]
    fn test_layout_matches_repr_c() {
        let desc = CharDouble::descriptor();
        assert_eq!(desc.size(), mem::size_of::<CharDouble>());
        assert_eq!(desc.align(), mem::align_of::<CharDouble>());
    }

    #[test]
    fn test_nested_and_array_layout() {
        let inner = AggregateDescriptor::new(vec![
            Field::scalar(ScalarType::Char),
            Field::scalar(ScalarType::Char),
        ]);
        let desc = AggregateDescriptor::new(vec![
            Field::scalar(ScalarType::Int),
            Field::aggregate(inner).repeated(3),
            Field::scalar(ScalarType::Short),
        ]);

        assert_eq!(desc.offsets(), &[0, 4, 10]);
        assert_eq!(desc.size(), 12);
        assert_eq!(desc.align(), mem::align_of::<CInt>());
        assert_eq!(desc.signature(), "{i{cc}[3]s}");
    }

    #[test]
    fn test_empty_descriptor() {
        let desc = AggregateDescriptor::new(Vec::new());
        assert_eq!(desc.size(), 0);
        assert_eq!(desc.signature(), "{}");
    }

    #[test]
    fn test_compare_ignores_padding() {
        let value = CharDouble { c: 7, d: 0.25 };
        let mut a = vec![0u8; mem::size_of::<CharDouble>()];
        assert!(write_as(&mut a, &value));

        let mut b = a.clone();
        b[1..8].iter_mut().for_each(|byte| *byte ^= 0xAA);

        assert_ne!(a, b);
        assert!(compare_as::<CharDouble>(&a, &b));
    }

    #[test]
    fn test_compare_detects_field_difference() {
        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        write_as(&mut a, &CharDouble { c: 1, d: 2.0 });
        write_as(&mut b, &CharDouble { c: 1, d: 2.5 });
        assert!(!compare_as::<CharDouble>(&a, &b));
    }

    #[test]
    fn test_short_payload_never_matches() {
        let short = [0u8; 4];
        assert_eq!(read_as::<CharDouble>(&short), None);
        assert!(!compare_as::<CharDouble>(&short, &short));
        assert!(!write_as(&mut [0u8; 4], &CharDouble { c: 0, d: 0.0 }));
    }
}
