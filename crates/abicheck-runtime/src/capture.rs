//! Callee capture slots
//!
//! Target functions are plain `extern "C"` functions and cannot be handed the
//! harness's tables. While a call is in flight they reach them through these
//! thread-local slots instead: each argument is recorded into the observed
//! table, and the return value is read from the expected table.
//!
//! A `CaptureSession` installs the slots for exactly one call and hands the
//! observed table back when it finishes. Nothing here panics, since callers
//! sit on the far side of an `extern "C"` boundary.

use crate::aggregate::{read_as, write_as, CAggregate};
use crate::types::{
    CChar, CDouble, CFloat, CInt, CLong, CLongLong, CPointer, CShort, ScalarType, ScalarValue,
};
use crate::values::ValueTable;
use std::cell::RefCell;
use std::marker::PhantomData;

struct Slots {
    expected: ValueTable,
    observed: ValueTable,
}

thread_local! {
    static SLOTS: RefCell<Option<Slots>> = const { RefCell::new(None) };
}

/// Installed capture slots for one call
///
/// Not `Send`: the slots belong to the thread that issues the call.
#[must_use = "the observed values are only returned by `finish`"]
pub struct CaptureSession {
    _thread_bound: PhantomData<*const ()>,
}

impl CaptureSession {
    /// Install a copy of `expected` and a cleared observed table
    pub fn begin(expected: &ValueTable) -> Self {
        let slots = Slots {
            expected: expected.clone(),
            observed: expected.blank(),
        };
        SLOTS.with(|cell| *cell.borrow_mut() = Some(slots));
        Self {
            _thread_bound: PhantomData,
        }
    }

    /// Uninstall the slots and return everything the callee recorded
    pub fn finish(self) -> ValueTable {
        SLOTS
            .with(|cell| cell.borrow_mut().take())
            .map(|slots| slots.observed)
            .unwrap_or_default()
    }

    /// Check whether a session is installed on this thread
    pub fn is_active() -> bool {
        SLOTS.with(|cell| cell.borrow().is_some())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        SLOTS.with(|cell| cell.borrow_mut().take());
    }
}

fn with_slots<R>(f: impl FnOnce(&mut Slots) -> R) -> Option<R> {
    SLOTS.with(|cell| {
        let mut guard = cell.try_borrow_mut().ok()?;
        guard.as_mut().map(f)
    })
}

/// Record a scalar argument as seen by the callee
///
/// Returns `false` when no session is active or the position is out of range.
pub fn record(position: usize, value: ScalarValue) -> bool {
    with_slots(|slots| slots.observed.set(position, value)).unwrap_or(false)
}

/// Record an aggregate argument as seen by the callee
pub fn record_aggregate<T: CAggregate>(position: usize, value: &T) -> bool {
    with_slots(|slots| {
        slots
            .observed
            .aggregate_mut(position)
            .is_some_and(|bytes| write_as(bytes, value))
    })
    .unwrap_or(false)
}

/// Record raw aggregate bytes at `position`
pub fn record_payload(position: usize, bytes: &[u8]) -> bool {
    with_slots(|slots| slots.observed.set_aggregate(position, bytes)).unwrap_or(false)
}

fn expected(ty: ScalarType, position: usize) -> Option<ScalarValue> {
    with_slots(|slots| slots.expected.get(ty, position)).flatten()
}

/// Expected `char` at `position` (0 when unavailable)
pub fn expected_char(position: usize) -> CChar {
    match expected(ScalarType::Char, position) {
        Some(ScalarValue::Char(v)) => v,
        _ => 0,
    }
}

pub fn expected_short(position: usize) -> CShort {
    match expected(ScalarType::Short, position) {
        Some(ScalarValue::Short(v)) => v,
        _ => 0,
    }
}

pub fn expected_int(position: usize) -> CInt {
    match expected(ScalarType::Int, position) {
        Some(ScalarValue::Int(v)) => v,
        _ => 0,
    }
}

pub fn expected_long(position: usize) -> CLong {
    match expected(ScalarType::Long, position) {
        Some(ScalarValue::Long(v)) => v,
        _ => 0,
    }
}

pub fn expected_long_long(position: usize) -> CLongLong {
    match expected(ScalarType::LongLong, position) {
        Some(ScalarValue::LongLong(v)) => v,
        _ => 0,
    }
}

pub fn expected_pointer(position: usize) -> CPointer {
    match expected(ScalarType::Pointer, position) {
        Some(ScalarValue::Pointer(v)) => v as CPointer,
        _ => std::ptr::null(),
    }
}

pub fn expected_float(position: usize) -> CFloat {
    match expected(ScalarType::Float, position) {
        Some(ScalarValue::Float(v)) => v,
        _ => 0.0,
    }
}

pub fn expected_double(position: usize) -> CDouble {
    match expected(ScalarType::Double, position) {
        Some(ScalarValue::Double(v)) => v,
        _ => 0.0,
    }
}

/// Expected aggregate at `position` (all-zero when unavailable)
pub fn expected_aggregate<T: CAggregate>(position: usize) -> T {
    with_slots(|slots| slots.expected.aggregate(position).and_then(read_as::<T>))
        .flatten()
        // SAFETY: CAggregate guarantees the all-zero bit pattern is a valid value
        .unwrap_or_else(|| unsafe { std::mem::zeroed() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_collects_records() {
        let expected = ValueTable::seeded(3, 8);
        let session = CaptureSession::begin(&expected);
        assert!(CaptureSession::is_active());

        assert!(record(1, ScalarValue::Int(42)));
        assert!(record(3, ScalarValue::Double(1.5)));
        assert!(!record(4, ScalarValue::Int(0)));

        let observed = session.finish();
        assert!(!CaptureSession::is_active());
        assert_eq!(observed.get(ScalarType::Int, 1), Some(ScalarValue::Int(42)));
        assert_eq!(observed.get(ScalarType::Double, 3), Some(ScalarValue::Double(1.5)));
        assert_eq!(observed.get(ScalarType::Int, 2), Some(ScalarValue::Int(0)));
    }

    #[test]
    fn test_expected_values_visible_during_session() {
        let mut expected = ValueTable::new(2, 0);
        expected.set(2, ScalarValue::Int(5));
        expected.set(1, ScalarValue::Pointer(0x40));

        let session = CaptureSession::begin(&expected);
        assert_eq!(expected_int(2), 5);
        assert_eq!(expected_pointer(1) as usize, 0x40);
        drop(session);

        assert_eq!(expected_int(2), 0);
        assert!(expected_pointer(1).is_null());
    }

    #[test]
    fn test_records_without_session_are_dropped() {
        assert!(!CaptureSession::is_active());
        assert!(!record(1, ScalarValue::Char(1)));
    }

    #[test]
    fn test_new_session_starts_clean() {
        let expected = ValueTable::seeded(1, 0);
        let first = CaptureSession::begin(&expected);
        record(1, ScalarValue::Short(9));
        drop(first);

        let second = CaptureSession::begin(&expected);
        let observed = second.finish();
        assert_eq!(observed.get(ScalarType::Short, 1), Some(ScalarValue::Short(0)));
    }
}
