//! Scalar float conversions and the flag-producing compare.

use verto_types::{ElemSize, FcmpFlags, OpSize};

fn load(bits: u64, elem: ElemSize) -> f64 {
    match elem {
        ElemSize::E4 => f32::from_bits(bits as u32) as f64,
        ElemSize::E8 => f64::from_bits(bits),
        _ => panic!("scalar float width {elem:?}"),
    }
}

fn store(value: f64, elem: ElemSize) -> u64 {
    match elem {
        ElemSize::E4 => (value as f32).to_bits() as u64,
        ElemSize::E8 => value.to_bits(),
        _ => panic!("scalar float width {elem:?}"),
    }
}

/// Integer-to-float, reading the integer at `src_size`.
pub(crate) fn from_gpr(src: u64, src_size: OpSize, dst_elem: ElemSize, signed: bool) -> u64 {
    let value = match (src_size, signed) {
        (OpSize::B4, true) => src as u32 as i32 as f64,
        (OpSize::B4, false) => src as u32 as f64,
        (OpSize::B8, true) => src as i64 as f64,
        (OpSize::B8, false) => src as f64,
        _ => panic!("FloatFromGpr: unsupported integer size {src_size:?}"),
    };
    store(value, dst_elem)
}

/// Float-to-integer, truncating toward zero; out-of-range values clamp.
pub(crate) fn to_gpr(src_bits: u64, elem: ElemSize, signed: bool) -> u64 {
    let f = load(src_bits, elem);
    match (elem, signed) {
        (ElemSize::E4, true) => f as i32 as u32 as u64,
        (ElemSize::E4, false) => f as u32 as u64,
        (ElemSize::E8, true) => f as i64 as u64,
        (ElemSize::E8, false) => f as u64,
        _ => panic!("FloatToGpr: unsupported float width {elem:?}"),
    }
}

pub(crate) fn ftof(src_bits: u64, src_elem: ElemSize, dst_elem: ElemSize) -> u64 {
    store(load(src_bits, src_elem), dst_elem)
}

/// Sets each *requested* predicate bit independently. An unordered pair
/// (either side NaN) asserts LT and EQ as well as UNORDERED, mirroring how
/// guest flag material is derived from the compare.
pub(crate) fn fcmp(a_bits: u64, b_bits: u64, elem: ElemSize, requested: FcmpFlags) -> u64 {
    // Compare at the native width so signaling behavior is width-exact.
    let (lt, eq, unordered) = match elem {
        ElemSize::E4 => {
            let (a, b) = (f32::from_bits(a_bits as u32), f32::from_bits(b_bits as u32));
            (a < b, a == b, a.is_nan() || b.is_nan())
        }
        ElemSize::E8 => {
            let (a, b) = (f64::from_bits(a_bits), f64::from_bits(b_bits));
            (a < b, a == b, a.is_nan() || b.is_nan())
        }
        _ => panic!("FCmp: unsupported float width {elem:?}"),
    };
    let mut out = FcmpFlags::empty();
    if requested.contains(FcmpFlags::LT) && (unordered || lt) {
        out |= FcmpFlags::LT;
    }
    if requested.contains(FcmpFlags::UNORDERED) && unordered {
        out |= FcmpFlags::UNORDERED;
    }
    if requested.contains(FcmpFlags::EQ) && (unordered || eq) {
        out |= FcmpFlags::EQ;
    }
    out.bits() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_round_trip_preserves_integers() {
        let bits = from_gpr(-5i64 as u64, OpSize::B8, ElemSize::E8, true);
        assert_eq!(f64::from_bits(bits), -5.0);
        assert_eq!(to_gpr(bits, ElemSize::E8, true), -5i64 as u64);
    }

    #[test]
    fn unsigned_conversion_treats_the_top_bit_as_magnitude() {
        let bits = from_gpr(0x8000_0000, OpSize::B4, ElemSize::E8, false);
        assert_eq!(f64::from_bits(bits), 2147483648.0);
    }

    #[test]
    fn to_gpr_truncates_toward_zero() {
        assert_eq!(to_gpr((-2.9f64).to_bits(), ElemSize::E8, true), -2i64 as u64);
        assert_eq!(to_gpr(2.9f64.to_bits(), ElemSize::E8, true), 2);
    }

    #[test]
    fn width_conversion_round_trips_exact_values() {
        let single = 1.5f32.to_bits() as u64;
        let double = ftof(single, ElemSize::E4, ElemSize::E8);
        assert_eq!(f64::from_bits(double), 1.5);
        assert_eq!(ftof(double, ElemSize::E8, ElemSize::E4), single);
    }

    #[test]
    fn fcmp_sets_only_requested_flags() {
        let one = 1.0f64.to_bits();
        let two = 2.0f64.to_bits();
        let all = FcmpFlags::LT | FcmpFlags::UNORDERED | FcmpFlags::EQ;
        assert_eq!(fcmp(one, two, ElemSize::E8, all), FcmpFlags::LT.bits() as u64);
        assert_eq!(fcmp(one, one, ElemSize::E8, all), FcmpFlags::EQ.bits() as u64);
        assert_eq!(fcmp(one, two, ElemSize::E8, FcmpFlags::EQ), 0);
    }

    #[test]
    fn unordered_compare_asserts_lt_and_eq() {
        let nan = f64::NAN.to_bits();
        let one = 1.0f64.to_bits();
        let all = FcmpFlags::LT | FcmpFlags::UNORDERED | FcmpFlags::EQ;
        assert_eq!(fcmp(nan, one, ElemSize::E8, all), all.bits() as u64);
    }
}
