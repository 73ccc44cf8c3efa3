//! Built-in case table
//!
//! Every target echoes each argument into the capture slots at its position and
//! returns the expected value for the return tag at the last argument position
//! (position 0 when there are no arguments). Signatures cover every scalar tag,
//! register exhaustion for integer and floating-point classes, small and
//! memory-class aggregates, nesting, fixed arrays and pointers.

use super::{CaseTable, TestCase};
use crate::aggregate::{AggregateDescriptor, CAggregate, Field};
use crate::capture;
use crate::registry::{AggregateEntry, AggregateRegistry};
use crate::types::{
    CChar, CDouble, CFloat, CInt, CLong, CLongLong, CPointer, CShort, ScalarType, ScalarValue,
};

/// Highest argument position used by any built-in case
pub const MAX_ARGS: usize = 9;

macro_rules! aggregate {
    ($name:ident, $sig:literal, { $($field:ident : $ty:ty => $desc:expr),+ $(,)? }) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            $(pub $field: $ty),+
        }

        // SAFETY: #[repr(C)], integer/float/pointer fields only, descriptor mirrors the fields
        unsafe impl CAggregate for $name {
            const SIGNATURE: &'static str = $sig;

            fn descriptor() -> AggregateDescriptor {
                AggregateDescriptor::new(vec![$($desc),+])
            }
        }
    };
}

fn scalar(ty: ScalarType) -> Field {
    Field::scalar(ty)
}

aggregate!(IntChar, "{ic}", {
    a: CInt => scalar(ScalarType::Int),
    b: CChar => scalar(ScalarType::Char),
});
aggregate!(CharPair, "{cc}", {
    a: CChar => scalar(ScalarType::Char),
    b: CChar => scalar(ScalarType::Char),
});
aggregate!(ShortInt, "{si}", {
    a: CShort => scalar(ScalarType::Short),
    b: CInt => scalar(ScalarType::Int),
});
aggregate!(FloatPair, "{ff}", {
    a: CFloat => scalar(ScalarType::Float),
    b: CFloat => scalar(ScalarType::Float),
});
aggregate!(DoublePair, "{dd}", {
    a: CDouble => scalar(ScalarType::Double),
    b: CDouble => scalar(ScalarType::Double),
});
aggregate!(LongLongPtr, "{lp}", {
    a: CLongLong => scalar(ScalarType::LongLong),
    b: CPointer => scalar(ScalarType::Pointer),
});
aggregate!(DoubleQuad, "{dddd}", {
    a: CDouble => scalar(ScalarType::Double),
    b: CDouble => scalar(ScalarType::Double),
    c: CDouble => scalar(ScalarType::Double),
    d: CDouble => scalar(ScalarType::Double),
});
aggregate!(Nested, "{i{cc}d}", {
    a: CInt => scalar(ScalarType::Int),
    b: CharPair => Field::aggregate(CharPair::descriptor()),
    c: CDouble => scalar(ScalarType::Double),
});
aggregate!(FloatTriple, "{f[3]}", {
    v: [CFloat; 3] => scalar(ScalarType::Float).repeated(3),
});
aggregate!(Ptr, "{p}", {
    p: CPointer => scalar(ScalarType::Pointer),
});
aggregate!(LongFloats, "{j{ff}}", {
    a: CLong => scalar(ScalarType::Long),
    b: FloatPair => Field::aggregate(FloatPair::descriptor()),
});
aggregate!(MixedArray, "{c[3]s[2]d}", {
    c: [CChar; 3] => scalar(ScalarType::Char).repeated(3),
    s: [CShort; 2] => scalar(ScalarType::Short).repeated(2),
    d: CDouble => scalar(ScalarType::Double),
});

/// Registry of every built-in aggregate
pub fn registry() -> AggregateRegistry {
    AggregateRegistry::new()
        .with(AggregateEntry::of::<IntChar>())
        .with(AggregateEntry::of::<CharPair>())
        .with(AggregateEntry::of::<ShortInt>())
        .with(AggregateEntry::of::<FloatPair>())
        .with(AggregateEntry::of::<DoublePair>())
        .with(AggregateEntry::of::<LongLongPtr>())
        .with(AggregateEntry::of::<DoubleQuad>())
        .with(AggregateEntry::of::<Nested>())
        .with(AggregateEntry::of::<FloatTriple>())
        .with(AggregateEntry::of::<Ptr>())
        .with(AggregateEntry::of::<LongFloats>())
        .with(AggregateEntry::of::<MixedArray>())
}

macro_rules! c_type {
    (c) => { CChar };
    (s) => { CShort };
    (i) => { CInt };
    (j) => { CLong };
    (l) => { CLongLong };
    (p) => { CPointer };
    (f) => { CFloat };
    (d) => { CDouble };
    ({ $agg:ty }) => { $agg };
}

macro_rules! observe {
    ($pos:literal, c, $v:ident) => { capture::record($pos, ScalarValue::Char($v)) };
    ($pos:literal, s, $v:ident) => { capture::record($pos, ScalarValue::Short($v)) };
    ($pos:literal, i, $v:ident) => { capture::record($pos, ScalarValue::Int($v)) };
    ($pos:literal, j, $v:ident) => { capture::record($pos, ScalarValue::Long($v)) };
    ($pos:literal, l, $v:ident) => { capture::record($pos, ScalarValue::LongLong($v)) };
    ($pos:literal, p, $v:ident) => { capture::record($pos, ScalarValue::pointer($v)) };
    ($pos:literal, f, $v:ident) => { capture::record($pos, ScalarValue::Float($v)) };
    ($pos:literal, d, $v:ident) => { capture::record($pos, ScalarValue::Double($v)) };
    ($pos:literal, { $agg:ty }, $v:ident) => { capture::record_aggregate::<$agg>($pos, &$v) };
}

macro_rules! expected {
    ($pos:expr, c) => { capture::expected_char($pos) };
    ($pos:expr, s) => { capture::expected_short($pos) };
    ($pos:expr, i) => { capture::expected_int($pos) };
    ($pos:expr, j) => { capture::expected_long($pos) };
    ($pos:expr, l) => { capture::expected_long_long($pos) };
    ($pos:expr, p) => { capture::expected_pointer($pos) };
    ($pos:expr, f) => { capture::expected_float($pos) };
    ($pos:expr, d) => { capture::expected_double($pos) };
    ($pos:expr, { $agg:ty }) => { capture::expected_aggregate::<$agg>($pos) };
}

macro_rules! count {
    () => { 0usize };
    ($head:tt $($tail:tt)*) => { 1usize + count!($($tail)*) };
}

macro_rules! target {
    ($name:ident : v ( $($pos:literal $arg:ident : $tag:tt),* )) => {
        extern "C" fn $name($($arg: c_type!($tag)),*) {
            $( let _ = observe!($pos, $tag, $arg); )*
        }
    };
    ($name:ident : $ret:tt ( $($pos:literal $arg:ident : $tag:tt),* )) => {
        extern "C" fn $name($($arg: c_type!($tag)),*) -> c_type!($ret) {
            $( let _ = observe!($pos, $tag, $arg); )*
            expected!(count!($($pos)*), $ret)
        }
    };
}

macro_rules! cases {
    ($( $sig:literal => $name:ident : $ret:tt ( $($pos:literal $arg:ident : $tag:tt),* $(,)? ); )+) => {
        $( target!($name : $ret ( $($pos $arg : $tag),* )); )+

        /// The built-in case table
        pub fn cases() -> CaseTable {
            // SAFETY: each target is generated from the same tags as its signature
            let cases = unsafe { vec![$( TestCase::new($sig, $name as *const ()) ),+] };
            CaseTable::new(cases, MAX_ARGS)
        }
    };
}

cases! {
    "v" => f_v: v();
    "ii" => f_ii: i(1 a: i);
    "cc" => f_cc: c(1 a: c);
    "ss" => f_ss: s(1 a: s);
    "jj" => f_jj: j(1 a: j);
    "ll" => f_ll: l(1 a: l);
    "pp" => f_pp: p(1 a: p);
    "ff" => f_ff: f(1 a: f);
    "dd" => f_dd: d(1 a: d);
    "vicsjlpfd" => f_vicsjlpfd: v(1 a: i, 2 b: c, 3 c: s, 4 d: j, 5 e: l, 6 f: p, 7 g: f, 8 h: d);
    "fdfdfdfdf" => f_fdfdfdfdf: f(1 a: d, 2 b: f, 3 c: d, 4 d: f, 5 e: d, 6 f: f, 7 g: d, 8 h: f);
    "lliiiiiiil" => f_lliiiiiiil: l(1 a: l, 2 b: i, 3 c: i, 4 d: i, 5 e: i, 6 f: i, 7 g: i, 8 h: i, 9 k: l);
    "{ic}" => f_ic: {IntChar}();
    "{ic}{ic}" => f_ic_ic: {IntChar}(1 a: {IntChar});
    "v{cc}" => f_v_cc: v(1 a: {CharPair});
    "{si}{si}{cc}s" => f_si_si_cc_s: {ShortInt}(1 a: {ShortInt}, 2 b: {CharPair}, 3 c: s);
    "{dd}{dd}d" => f_dd_dd_d: {DoublePair}(1 a: {DoublePair}, 2 b: d);
    "i{ff}i{ff}" => f_i_ff_i_ff: i(1 a: {FloatPair}, 2 b: i, 3 c: {FloatPair});
    "{lp}{lp}" => f_lp_lp: {LongLongPtr}(1 a: {LongLongPtr});
    "{dddd}" => f_dddd: {DoubleQuad}();
    "{dddd}{dddd}i" => f_dddd_dddd_i: {DoubleQuad}(1 a: {DoubleQuad}, 2 b: i);
    "d{i{cc}d}" => f_d_nested: d(1 a: {Nested});
    "{i{cc}d}c{i{cc}d}" => f_nested_c_nested: {Nested}(1 a: c, 2 b: {Nested});
    "{f[3]}{f[3]}" => f_f3_f3: {FloatTriple}(1 a: {FloatTriple});
    "{p}p{p}" => f_p_p_p: {Ptr}(1 a: p, 2 b: {Ptr});
    "l{j{ff}}c{ic}" => f_l_jff_c_ic: l(1 a: {LongFloats}, 2 b: c, 3 c: {IntChar});
    "{c[3]s[2]d}{c[3]s[2]d}f" => f_mixed_array: {MixedArray}(1 a: {MixedArray}, 2 b: f);
    "vdddddddd{dd}" => f_v_d8_dd: v(1 a: d, 2 b: d, 3 c: d, 4 d: d, 5 e: d, 6 f: d, 7 g: d, 8 h: d, 9 k: {DoublePair});
    "viiiiiiii{ic}" => f_v_i8_ic: v(1 a: i, 2 b: i, 3 c: i, 4 d: i, 5 e: i, 6 f: i, 7 g: i, 8 h: i, 9 k: {IntChar});
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;
    use std::mem;

    fn check_layout<T: CAggregate>() {
        let desc = T::descriptor();
        assert_eq!(desc.signature(), T::SIGNATURE);
        assert_eq!(desc.size(), mem::size_of::<T>(), "{}", T::SIGNATURE);
        assert_eq!(desc.align(), mem::align_of::<T>(), "{}", T::SIGNATURE);
    }

    #[test]
    fn test_descriptors_match_rust_layout() {
        check_layout::<IntChar>();
        check_layout::<CharPair>();
        check_layout::<ShortInt>();
        check_layout::<FloatPair>();
        check_layout::<DoublePair>();
        check_layout::<LongLongPtr>();
        check_layout::<DoubleQuad>();
        check_layout::<Nested>();
        check_layout::<FloatTriple>();
        check_layout::<Ptr>();
        check_layout::<LongFloats>();
        check_layout::<MixedArray>();
    }

    #[test]
    fn test_every_case_lexes_within_bounds() {
        let registry = registry();
        let table = cases();
        for case in table.cases() {
            let sig = Signature::parse(case.signature(), &registry)
                .unwrap_or_else(|e| panic!("{}: {}", case.signature(), e));
            assert!(sig.last_position() <= table.max_args(), "{}", case.signature());
        }
    }

    #[test]
    fn test_bound_is_tight() {
        let registry = registry();
        let widest = cases()
            .cases()
            .iter()
            .filter_map(|case| Signature::parse(case.signature(), &registry).ok())
            .map(|sig| sig.last_position())
            .max();
        assert_eq!(widest, Some(MAX_ARGS));
    }

    #[test]
    fn test_signatures_are_unique() {
        let table = cases();
        let mut seen: Vec<&str> = table.cases().iter().map(TestCase::signature).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), table.len());
    }
}
