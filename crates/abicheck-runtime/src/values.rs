//! Expected and observed value tables
//!
//! One vector per scalar tag plus one vector of aggregate payloads, all indexed
//! by argument position. Index 0 is the return slot of zero-argument signatures;
//! arguments use 1..=max_args.
//!
//! The expected table is seeded once and only read afterwards. The observed
//! table is written by the callee during the call and compared afterwards.

use crate::types::{CChar, CDouble, CFloat, CInt, CLong, CLongLong, CShort, ScalarType, ScalarValue};

/// Raw bytes of one aggregate value, 8-byte aligned
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    words: Vec<u64>,
    len: usize,
}

impl Payload {
    /// Zero-filled payload of `len` bytes
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(8)],
            len,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialized bytes
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `words` owns at least `len` initialized bytes
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}

/// Per-type, position-indexed value table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueTable {
    chars: Vec<CChar>,
    shorts: Vec<CShort>,
    ints: Vec<CInt>,
    longs: Vec<CLong>,
    long_longs: Vec<CLongLong>,
    pointers: Vec<usize>,
    floats: Vec<CFloat>,
    doubles: Vec<CDouble>,
    aggregates: Vec<Payload>,
}

impl ValueTable {
    /// All-zero table for positions `0..=max_args`
    pub fn new(max_args: usize, payload_size: usize) -> Self {
        let slots = max_args + 1;
        Self {
            chars: vec![0; slots],
            shorts: vec![0; slots],
            ints: vec![0; slots],
            longs: vec![0; slots],
            long_longs: vec![0; slots],
            pointers: vec![0; slots],
            floats: vec![0.0; slots],
            doubles: vec![0.0; slots],
            aggregates: (0..slots).map(|_| Payload::zeroed(payload_size)).collect(),
        }
    }

    /// Expected-value table: distinct, deterministic values per type and position
    ///
    /// Floating-point values are exact binary fractions. Aggregate payload bytes
    /// stay within `0x01..=0x3F`, so no float field inside an aggregate can
    /// decode to NaN.
    pub fn seeded(max_args: usize, payload_size: usize) -> Self {
        let mut table = Self::new(max_args, payload_size);

        for pos in 0..=max_args {
            let n = pos as i64;
            table.chars[pos] = (n % 100 + 2) as CChar;
            table.shorts[pos] = (n * 257 + 3) as CShort;
            table.ints[pos] = (n * 65_537 + 0x1234) as CInt;
            table.longs[pos] = (n * 1_000_003 + 7) as CLong;
            table.long_longs[pos] = (n << 33) | (n + 11);
            table.pointers[pos] = (pos + 1).wrapping_mul(0x1001_0011);
            table.floats[pos] = pos as CFloat * 1.25 + 0.5;
            table.doubles[pos] = pos as CDouble * 2.5 + 0.125;

            for (k, byte) in table.aggregates[pos].as_bytes_mut().iter_mut().enumerate() {
                *byte = ((pos * 31 + k * 7) % 0x3F + 1) as u8;
            }
        }

        table
    }

    /// Highest usable argument position
    pub fn max_args(&self) -> usize {
        self.ints.len().saturating_sub(1)
    }

    /// Bytes available per aggregate slot
    pub fn payload_size(&self) -> usize {
        self.aggregates.first().map_or(0, Payload::len)
    }

    /// Scalar at `position`, or `None` past the table bound
    pub fn get(&self, ty: ScalarType, position: usize) -> Option<ScalarValue> {
        match ty {
            ScalarType::Char => self.chars.get(position).map(|v| ScalarValue::Char(*v)),
            ScalarType::Short => self.shorts.get(position).map(|v| ScalarValue::Short(*v)),
            ScalarType::Int => self.ints.get(position).map(|v| ScalarValue::Int(*v)),
            ScalarType::Long => self.longs.get(position).map(|v| ScalarValue::Long(*v)),
            ScalarType::LongLong => self
                .long_longs
                .get(position)
                .map(|v| ScalarValue::LongLong(*v)),
            ScalarType::Pointer => self.pointers.get(position).map(|v| ScalarValue::Pointer(*v)),
            ScalarType::Float => self.floats.get(position).map(|v| ScalarValue::Float(*v)),
            ScalarType::Double => self.doubles.get(position).map(|v| ScalarValue::Double(*v)),
        }
    }

    /// Store a scalar at `position`; returns `false` past the table bound
    pub fn set(&mut self, position: usize, value: ScalarValue) -> bool {
        fn put<T>(slots: &mut [T], position: usize, value: T) -> bool {
            match slots.get_mut(position) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        }

        match value {
            ScalarValue::Char(v) => put(&mut self.chars, position, v),
            ScalarValue::Short(v) => put(&mut self.shorts, position, v),
            ScalarValue::Int(v) => put(&mut self.ints, position, v),
            ScalarValue::Long(v) => put(&mut self.longs, position, v),
            ScalarValue::LongLong(v) => put(&mut self.long_longs, position, v),
            ScalarValue::Pointer(v) => put(&mut self.pointers, position, v),
            ScalarValue::Float(v) => put(&mut self.floats, position, v),
            ScalarValue::Double(v) => put(&mut self.doubles, position, v),
        }
    }

    /// Aggregate payload at `position`
    pub fn aggregate(&self, position: usize) -> Option<&[u8]> {
        self.aggregates.get(position).map(Payload::as_bytes)
    }

    pub fn aggregate_mut(&mut self, position: usize) -> Option<&mut [u8]> {
        self.aggregates.get_mut(position).map(Payload::as_bytes_mut)
    }

    /// Copy `bytes` into the payload at `position`
    ///
    /// Returns `false` when the position or the length is out of range.
    pub fn set_aggregate(&mut self, position: usize, bytes: &[u8]) -> bool {
        match self.aggregate_mut(position) {
            Some(slot) if bytes.len() <= slot.len() => {
                slot[..bytes.len()].copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Zero every slot, keeping the table bounds
    pub fn clear(&mut self) {
        self.chars.iter_mut().for_each(|v| *v = 0);
        self.shorts.iter_mut().for_each(|v| *v = 0);
        self.ints.iter_mut().for_each(|v| *v = 0);
        self.longs.iter_mut().for_each(|v| *v = 0);
        self.long_longs.iter_mut().for_each(|v| *v = 0);
        self.pointers.iter_mut().for_each(|v| *v = 0);
        self.floats.iter_mut().for_each(|v| *v = 0.0);
        self.doubles.iter_mut().for_each(|v| *v = 0.0);
        self.aggregates.iter_mut().for_each(Payload::clear);
    }

    /// Zeroed table with the same bounds as this one
    pub fn blank(&self) -> Self {
        Self::new(self.max_args(), self.payload_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_include_position_zero() {
        let table = ValueTable::new(4, 16);
        assert_eq!(table.max_args(), 4);
        assert_eq!(table.payload_size(), 16);
        assert_eq!(table.get(ScalarType::Int, 0), Some(ScalarValue::Int(0)));
        assert_eq!(table.get(ScalarType::Int, 4), Some(ScalarValue::Int(0)));
        assert_eq!(table.get(ScalarType::Int, 5), None);
        assert!(table.aggregate(5).is_none());
    }

    #[test]
    fn test_seeded_values_are_distinct_per_position() {
        let table = ValueTable::seeded(16, 32);
        for ty in ScalarType::ALL {
            let values: Vec<ScalarValue> = (0..=16).filter_map(|p| table.get(ty, p)).collect();
            for (i, a) in values.iter().enumerate() {
                for b in &values[i + 1..] {
                    assert_ne!(a, b, "duplicate {:?} value", ty);
                }
            }
        }
    }

    #[test]
    fn test_seeded_is_deterministic() {
        assert_eq!(ValueTable::seeded(8, 24), ValueTable::seeded(8, 24));
    }

    #[test]
    fn test_seeded_payload_bytes_avoid_nan_patterns() {
        let table = ValueTable::seeded(8, 64);
        for pos in 0..=8 {
            let bytes = table.aggregate(pos).unwrap();
            assert!(bytes.iter().all(|b| (0x01..=0x3F).contains(b)));
            for chunk in bytes.chunks_exact(4) {
                let f = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                assert!(!f.is_nan());
            }
        }
    }

    #[test]
    fn test_set_and_get_round_trip() {
        let mut table = ValueTable::new(2, 8);
        assert!(table.set(1, ScalarValue::Double(0.75)));
        assert!(table.set(2, ScalarValue::Pointer(0xbeef)));
        assert!(!table.set(3, ScalarValue::Char(1)));

        assert_eq!(table.get(ScalarType::Double, 1), Some(ScalarValue::Double(0.75)));
        assert_eq!(table.get(ScalarType::Pointer, 2), Some(ScalarValue::Pointer(0xbeef)));
    }

    #[test]
    fn test_set_aggregate_respects_slot_size() {
        let mut table = ValueTable::new(1, 4);
        assert!(table.set_aggregate(1, &[1, 2, 3]));
        assert_eq!(table.aggregate(1), Some(&[1u8, 2, 3, 0][..]));
        assert!(!table.set_aggregate(1, &[0; 5]));
        assert!(!table.set_aggregate(2, &[0]));
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let mut table = ValueTable::seeded(3, 8);
        table.clear();
        assert_eq!(table, ValueTable::new(3, 8));
        assert_eq!(table.blank(), ValueTable::new(3, 8));
    }
}
