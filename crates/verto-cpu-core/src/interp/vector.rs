//! Lane-generic vector semantics over 128-bit register images.
//!
//! Lanes are pulled out as zero-extended `u64` (or sign-extended `i64`)
//! values and computed with width-masked helpers, the same scheme the scalar
//! side uses, so each family is implemented once rather than per lane width.

use verto_ir::{VArithOp, VBitOp, VFCmpOp, VFOp, VFUnaryOp, VShiftOp};
use verto_types::{ElemSize, OpSize};

pub(crate) type Vreg = [u8; 16];

#[inline]
fn lane_count(size: OpSize, elem: ElemSize) -> usize {
    size.bytes() / elem.bytes()
}

#[inline]
fn get(v: &Vreg, elem: ElemSize, i: usize) -> u64 {
    let n = elem.bytes();
    let mut raw = [0u8; 8];
    raw[..n].copy_from_slice(&v[i * n..i * n + n]);
    u64::from_le_bytes(raw)
}

#[inline]
fn set(v: &mut Vreg, elem: ElemSize, i: usize, value: u64) {
    let n = elem.bytes();
    let raw = (value & elem.mask()).to_le_bytes();
    v[i * n..i * n + n].copy_from_slice(&raw[..n]);
}

#[inline]
fn sext_lane(value: u64, elem: ElemSize) -> i64 {
    let shift = 64 - elem.bits();
    ((value << shift) as i64) >> shift
}

#[inline]
fn smin(elem: ElemSize) -> i128 {
    -(1i128 << (elem.bits() - 1))
}

#[inline]
fn smax(elem: ElemSize) -> i128 {
    (1i128 << (elem.bits() - 1)) - 1
}

pub(crate) fn splat(value: u64, size: OpSize, elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        set(&mut out, elem, i, value);
    }
    out
}

pub(crate) fn dup_element(src: &Vreg, index: usize, size: OpSize, elem: ElemSize) -> Vreg {
    splat(get(src, elem, index), size, elem)
}

/// Scalar moved into lane 0, upper lanes zero.
pub(crate) fn cast_from_gpr(value: u64, elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    set(&mut out, elem, 0, value);
    out
}

pub(crate) fn create_pair(lo: &Vreg, hi: &Vreg, half: OpSize) -> Vreg {
    let n = half.bytes();
    let mut out = Vreg::default();
    out[..n].copy_from_slice(&lo[..n]);
    out[n..2 * n].copy_from_slice(&hi[..n]);
    out
}

pub(crate) fn extract_pair(src: &Vreg, element: usize, half: OpSize) -> Vreg {
    let n = half.bytes();
    let mut out = Vreg::default();
    out[..n].copy_from_slice(&src[element * n..element * n + n]);
    out
}

pub(crate) fn bit(op: VBitOp, lhs: &Vreg, rhs: &Vreg, size: OpSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..size.bytes() {
        out[i] = match op {
            VBitOp::And => lhs[i] & rhs[i],
            VBitOp::Or => lhs[i] | rhs[i],
            VBitOp::Xor => lhs[i] ^ rhs[i],
        };
    }
    out
}

pub(crate) fn not(src: &Vreg, size: OpSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..size.bytes() {
        out[i] = !src[i];
    }
    out
}

/// Whole-register byte shift toward high addresses (guest left shift).
pub(crate) fn shl_bytes(src: &Vreg, bytes: usize, size: OpSize) -> Vreg {
    let n = size.bytes();
    let mut out = Vreg::default();
    if bytes < n {
        out[bytes..n].copy_from_slice(&src[..n - bytes]);
    }
    out
}

pub(crate) fn shr_bytes(src: &Vreg, bytes: usize, size: OpSize) -> Vreg {
    let n = size.bytes();
    let mut out = Vreg::default();
    if bytes < n {
        out[..n - bytes].copy_from_slice(&src[bytes..n]);
    }
    out
}

pub(crate) fn arith(op: VArithOp, lhs: &Vreg, rhs: &Vreg, size: OpSize, elem: ElemSize) -> Vreg {
    let mask = elem.mask();
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let a = get(lhs, elem, i);
        let b = get(rhs, elem, i);
        let r = match op {
            VArithOp::Add => a.wrapping_add(b),
            VArithOp::Sub => a.wrapping_sub(b),
            VArithOp::UQAdd => (a as u128 + b as u128).min(mask as u128) as u64,
            VArithOp::UQSub => a.saturating_sub(b),
            VArithOp::SQAdd => {
                let s = sext_lane(a, elem) as i128 + sext_lane(b, elem) as i128;
                s.clamp(smin(elem), smax(elem)) as u64
            }
            VArithOp::SQSub => {
                let s = sext_lane(a, elem) as i128 - sext_lane(b, elem) as i128;
                s.clamp(smin(elem), smax(elem)) as u64
            }
            VArithOp::SMin => sext_lane(a, elem).min(sext_lane(b, elem)) as u64,
            VArithOp::SMax => sext_lane(a, elem).max(sext_lane(b, elem)) as u64,
            VArithOp::UMin => a.min(b),
            VArithOp::UMax => a.max(b),
        };
        set(&mut out, elem, i, r);
    }
    out
}

#[inline]
fn shift_lane(op: VShiftOp, value: u64, amount: u64, elem: ElemSize) -> u64 {
    let bits = elem.bits() as u64;
    match op {
        // Over-width amounts shift everything out.
        VShiftOp::Shl => {
            if amount >= bits {
                0
            } else {
                value << amount
            }
        }
        VShiftOp::UShr => {
            if amount >= bits {
                0
            } else {
                value >> amount
            }
        }
        // Arithmetic right clamps: an over-width shift leaves the sign fill.
        VShiftOp::SShr => (sext_lane(value, elem) >> amount.min(bits - 1)) as u64,
    }
}

pub(crate) fn shift_imm(
    op: VShiftOp,
    src: &Vreg,
    amount: u8,
    size: OpSize,
    elem: ElemSize,
) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        set(&mut out, elem, i, shift_lane(op, get(src, elem, i), amount as u64, elem));
    }
    out
}

pub(crate) fn shift_vec(
    op: VShiftOp,
    lhs: &Vreg,
    rhs: &Vreg,
    size: OpSize,
    elem: ElemSize,
) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        set(
            &mut out,
            elem,
            i,
            shift_lane(op, get(lhs, elem, i), get(rhs, elem, i), elem),
        );
    }
    out
}

pub(crate) fn shift_scalar(
    op: VShiftOp,
    lhs: &Vreg,
    amount: u64,
    size: OpSize,
    elem: ElemSize,
) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        set(&mut out, elem, i, shift_lane(op, get(lhs, elem, i), amount, elem));
    }
    out
}

pub(crate) fn mul(signed: bool, lhs: &Vreg, rhs: &Vreg, size: OpSize, elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let a = get(lhs, elem, i);
        let b = get(rhs, elem, i);
        let r = if signed {
            sext_lane(a, elem).wrapping_mul(sext_lane(b, elem)) as u64
        } else {
            a.wrapping_mul(b)
        };
        set(&mut out, elem, i, r);
    }
    out
}

/// Widening multiply: half the source lanes (low or high half) produce
/// double-width products filling the whole register.
pub(crate) fn mul_long(signed: bool, lhs: &Vreg, rhs: &Vreg, elem: ElemSize, high: bool) -> Vreg {
    let wide = elem.widened().unwrap_or_else(|| panic!("VMulL: cannot widen {elem:?}"));
    let out_lanes = 16 / wide.bytes();
    let base = if high { out_lanes } else { 0 };
    let mut out = Vreg::default();
    for i in 0..out_lanes {
        let a = get(lhs, elem, base + i);
        let b = get(rhs, elem, base + i);
        let r = if signed {
            (sext_lane(a, elem) as i128 * sext_lane(b, elem) as i128) as u64
        } else {
            (a as u128 * b as u128) as u64
        };
        set(&mut out, wide, i, r);
    }
    out
}

/// Logical shift right then truncate each source lane to half width. The
/// narrowed lanes land in the low half (`high == false`, upper half zero) or
/// the high half on top of `prev`.
pub(crate) fn ushr_narrow(
    prev: Option<&Vreg>,
    src: &Vreg,
    shift: u8,
    elem: ElemSize,
    high: bool,
) -> Vreg {
    let narrow = elem.narrowed().unwrap_or_else(|| panic!("VUShrN: cannot narrow {elem:?}"));
    let in_lanes = 16 / elem.bytes();
    let mut out = match prev {
        Some(p) if high => *p,
        _ => Vreg::default(),
    };
    let base = if high { in_lanes } else { 0 };
    for i in 0..in_lanes {
        let shifted = shift_lane(VShiftOp::UShr, get(src, elem, i), shift as u64, elem);
        set(&mut out, narrow, base + i, shifted);
    }
    out
}

/// Saturating narrow of signed source lanes to half width, into the signed
/// or unsigned range of the narrow type.
pub(crate) fn sqxtn(
    prev: Option<&Vreg>,
    src: &Vreg,
    elem: ElemSize,
    unsigned_result: bool,
    high: bool,
) -> Vreg {
    let narrow = elem.narrowed().unwrap_or_else(|| panic!("VSQXTN: cannot narrow {elem:?}"));
    let in_lanes = 16 / elem.bytes();
    let (lo, hi) = if unsigned_result {
        (0, narrow.mask() as i128)
    } else {
        (smin(narrow), smax(narrow))
    };
    let mut out = match prev {
        Some(p) if high => *p,
        _ => Vreg::default(),
    };
    let base = if high { in_lanes } else { 0 };
    for i in 0..in_lanes {
        let v = sext_lane(get(src, elem, i), elem) as i128;
        set(&mut out, narrow, base + i, v.clamp(lo, hi) as u64);
    }
    out
}

/// Widen the low (or high) half lanes to double width with sign or zero
/// extension.
pub(crate) fn extend(src: &Vreg, elem: ElemSize, signed: bool, high: bool) -> Vreg {
    let wide = elem.widened().unwrap_or_else(|| panic!("VExtend: cannot widen {elem:?}"));
    let out_lanes = 16 / wide.bytes();
    let base = if high { out_lanes } else { 0 };
    let mut out = Vreg::default();
    for i in 0..out_lanes {
        let v = get(src, elem, base + i);
        let r = if signed { sext_lane(v, elem) as u64 } else { v };
        set(&mut out, wide, i, r);
    }
    out
}

#[inline]
fn f_get(v: &Vreg, elem: ElemSize, i: usize) -> f64 {
    match elem {
        ElemSize::E4 => f32::from_bits(get(v, elem, i) as u32) as f64,
        ElemSize::E8 => f64::from_bits(get(v, elem, i)),
        _ => panic!("float lane width {elem:?}"),
    }
}

#[inline]
fn f_set(v: &mut Vreg, elem: ElemSize, i: usize, value: f64) {
    match elem {
        ElemSize::E4 => set(v, elem, i, (value as f32).to_bits() as u64),
        ElemSize::E8 => set(v, elem, i, value.to_bits()),
        _ => panic!("float lane width {elem:?}"),
    }
}

pub(crate) fn cvt_int_to_float(
    src: &Vreg,
    size: OpSize,
    elem: ElemSize,
    signed: bool,
) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let v = get(src, elem, i);
        let f = if signed {
            sext_lane(v, elem) as f64
        } else {
            v as f64
        };
        f_set(&mut out, elem, i, f);
    }
    out
}

/// Truncating (toward zero) float to int; out-of-range values clamp to the
/// destination range.
pub(crate) fn cvt_float_to_int(
    src: &Vreg,
    size: OpSize,
    elem: ElemSize,
    signed: bool,
) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let f = f_get(src, elem, i);
        let r = match (elem, signed) {
            (ElemSize::E4, true) => f as i32 as u64,
            (ElemSize::E4, false) => f as u32 as u64,
            (ElemSize::E8, true) => f as i64 as u64,
            (ElemSize::E8, false) => f as u64,
            _ => panic!("float lane width {elem:?}"),
        };
        set(&mut out, elem, i, r);
    }
    out
}

/// Float width conversion: two f32 lanes widen to two f64, or two f64 narrow
/// into the low half (upper half zero).
pub(crate) fn fcvt(src: &Vreg, src_elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    match src_elem {
        ElemSize::E4 => {
            for i in 0..2 {
                let f = f32::from_bits(get(src, ElemSize::E4, i) as u32);
                set(&mut out, ElemSize::E8, i, (f as f64).to_bits());
            }
        }
        ElemSize::E8 => {
            for i in 0..2 {
                let f = f64::from_bits(get(src, ElemSize::E8, i));
                set(&mut out, ElemSize::E4, i, (f as f32).to_bits() as u64);
            }
        }
        _ => panic!("VFCvt: unsupported source width {src_elem:?}"),
    }
    out
}

pub(crate) fn farith(op: VFOp, lhs: &Vreg, rhs: &Vreg, size: OpSize, elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let a = f_get(lhs, elem, i);
        let b = f_get(rhs, elem, i);
        let r = match op {
            VFOp::Add => a + b,
            VFOp::Sub => a - b,
            VFOp::Mul => a * b,
            VFOp::Div => a / b,
            VFOp::Min => if a < b { a } else { b },
            VFOp::Max => if a > b { a } else { b },
        };
        f_set(&mut out, elem, i, r);
    }
    out
}

pub(crate) fn funary(op: VFUnaryOp, src: &Vreg, size: OpSize, elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let a = f_get(src, elem, i);
        let r = match op {
            VFUnaryOp::Recip => 1.0 / a,
            VFUnaryOp::Sqrt => a.sqrt(),
            VFUnaryOp::RSqrt => 1.0 / a.sqrt(),
        };
        f_set(&mut out, elem, i, r);
    }
    out
}

/// Integer pairwise add: adjacent pairs of `lhs` fill the low half of the
/// result, pairs of `rhs` the high half.
pub(crate) fn addp(lhs: &Vreg, rhs: &Vreg, size: OpSize, elem: ElemSize) -> Vreg {
    let lanes = lane_count(size, elem);
    let mut out = Vreg::default();
    for i in 0..lanes / 2 {
        let a = get(lhs, elem, 2 * i).wrapping_add(get(lhs, elem, 2 * i + 1));
        let b = get(rhs, elem, 2 * i).wrapping_add(get(rhs, elem, 2 * i + 1));
        set(&mut out, elem, i, a);
        set(&mut out, elem, lanes / 2 + i, b);
    }
    out
}

pub(crate) fn zip(lhs: &Vreg, rhs: &Vreg, size: OpSize, elem: ElemSize, high: bool) -> Vreg {
    let lanes = lane_count(size, elem);
    let base = if high { lanes / 2 } else { 0 };
    let mut out = Vreg::default();
    for i in 0..lanes / 2 {
        set(&mut out, elem, 2 * i, get(lhs, elem, base + i));
        set(&mut out, elem, 2 * i + 1, get(rhs, elem, base + i));
    }
    out
}

pub(crate) fn ins_element(
    into: &Vreg,
    from: &Vreg,
    dst_index: usize,
    src_index: usize,
    elem: ElemSize,
) -> Vreg {
    let mut out = *into;
    set(&mut out, elem, dst_index, get(from, elem, src_index));
    out
}

pub(crate) fn ins_gpr(into: &Vreg, value: u64, index: usize, elem: ElemSize) -> Vreg {
    let mut out = *into;
    set(&mut out, elem, index, value);
    out
}

pub(crate) fn extract_to_gpr(src: &Vreg, index: usize, elem: ElemSize) -> u64 {
    get(src, elem, index)
}

/// Byte-granularity extract across the concatenation `lhs:rhs` (with `rhs`
/// in the low bytes), as used by guest align-and-extract instructions.
pub(crate) fn extr(lhs: &Vreg, rhs: &Vreg, offset: usize, size: OpSize) -> Vreg {
    let n = size.bytes();
    let mut cat = [0u8; 32];
    cat[..n].copy_from_slice(&rhs[..n]);
    cat[n..2 * n].copy_from_slice(&lhs[..n]);
    let mut out = Vreg::default();
    out[..n].copy_from_slice(&cat[offset..offset + n]);
    out
}

/// Per-lane float compare producing an all-ones mask on true.
pub(crate) fn fcmp_lanes(op: VFCmpOp, lhs: &Vreg, rhs: &Vreg, size: OpSize, elem: ElemSize) -> Vreg {
    let mut out = Vreg::default();
    for i in 0..lane_count(size, elem) {
        let a = f_get(lhs, elem, i);
        let b = f_get(rhs, elem, i);
        let hit = match op {
            VFCmpOp::Eq => a == b,
            VFCmpOp::Neq => a != b,
            VFCmpOp::Lt => a < b,
            VFCmpOp::Le => a <= b,
        };
        set(&mut out, elem, i, if hit { elem.mask() } else { 0 });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v16(bytes: [u8; 16]) -> Vreg {
        bytes
    }

    #[test]
    fn unsigned_saturating_add_clamps_to_lane_max() {
        let a = splat(200, OpSize::B16, ElemSize::E1);
        let b = splat(100, OpSize::B16, ElemSize::E1);
        let r = arith(VArithOp::UQAdd, &a, &b, OpSize::B16, ElemSize::E1);
        assert_eq!(r, [255u8; 16]);
    }

    #[test]
    fn signed_saturating_sub_clamps_to_lane_min() {
        let a = splat(0x80, OpSize::B16, ElemSize::E1); // INT8_MIN
        let b = splat(1, OpSize::B16, ElemSize::E1);
        let r = arith(VArithOp::SQSub, &a, &b, OpSize::B16, ElemSize::E1);
        assert_eq!(r, [0x80u8; 16]);
    }

    #[test]
    fn wrapping_lane_add_stays_in_lane() {
        let a = splat(0xffff, OpSize::B16, ElemSize::E2);
        let b = splat(2, OpSize::B16, ElemSize::E2);
        let r = arith(VArithOp::Add, &a, &b, OpSize::B16, ElemSize::E2);
        assert_eq!(r, splat(1, OpSize::B16, ElemSize::E2));
    }

    #[test]
    fn over_width_shifts_zero_but_arithmetic_keeps_sign() {
        let v = splat(0x80, OpSize::B16, ElemSize::E1);
        assert_eq!(
            shift_imm(VShiftOp::UShr, &v, 8, OpSize::B16, ElemSize::E1),
            Vreg::default()
        );
        assert_eq!(
            shift_imm(VShiftOp::SShr, &v, 200, OpSize::B16, ElemSize::E1),
            [0xffu8; 16]
        );
    }

    #[test]
    fn widening_multiply_reads_the_selected_half() {
        let mut a = Vreg::default();
        let mut b = Vreg::default();
        for i in 0..8 {
            set(&mut a, ElemSize::E2, i, (i as u64) + 1);
            set(&mut b, ElemSize::E2, i, 1000);
        }
        let low = mul_long(false, &a, &b, ElemSize::E2, false);
        let high = mul_long(false, &a, &b, ElemSize::E2, true);
        assert_eq!(get(&low, ElemSize::E4, 0), 1000);
        assert_eq!(get(&low, ElemSize::E4, 3), 4000);
        assert_eq!(get(&high, ElemSize::E4, 0), 5000);
        assert_eq!(get(&high, ElemSize::E4, 3), 8000);
    }

    #[test]
    fn narrow_then_widen_halves_round_trip() {
        let mut src = Vreg::default();
        for i in 0..4 {
            set(&mut src, ElemSize::E4, i, 0x1_0000 + i as u64);
        }
        let narrowed = ushr_narrow(None, &src, 16, ElemSize::E4, false);
        for i in 0..4 {
            assert_eq!(get(&narrowed, ElemSize::E2, i), 1);
        }
        // Upper half untouched by the low form.
        assert_eq!(&narrowed[8..], &[0u8; 8]);
    }

    #[test]
    fn saturating_narrow_clamps_both_ranges() {
        let mut src = Vreg::default();
        set(&mut src, ElemSize::E4, 0, 0x7fff_ffff); // large positive
        set(&mut src, ElemSize::E4, 1, 0x8000_0000); // most negative
        set(&mut src, ElemSize::E4, 2, 100);
        set(&mut src, ElemSize::E4, 3, -100i64 as u64);

        let s = sqxtn(None, &src, ElemSize::E4, false, false);
        assert_eq!(get(&s, ElemSize::E2, 0), 0x7fff);
        assert_eq!(get(&s, ElemSize::E2, 1), 0x8000);
        assert_eq!(get(&s, ElemSize::E2, 2), 100);
        assert_eq!(get(&s, ElemSize::E2, 3), 0xff9c);

        let u = sqxtn(None, &src, ElemSize::E4, true, false);
        assert_eq!(get(&u, ElemSize::E2, 0), 0xffff);
        assert_eq!(get(&u, ElemSize::E2, 1), 0);
        assert_eq!(get(&u, ElemSize::E2, 3), 0);
    }

    #[test]
    fn zip_interleaves_the_chosen_halves() {
        let a = v16([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        let b = v16([
            100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111, 112, 113, 114, 115,
        ]);
        let lo = zip(&a, &b, OpSize::B16, ElemSize::E1, false);
        assert_eq!(&lo[..4], &[0, 100, 1, 101]);
        let hi = zip(&a, &b, OpSize::B16, ElemSize::E1, true);
        assert_eq!(&hi[..4], &[8, 108, 9, 109]);
    }

    #[test]
    fn extr_pulls_bytes_across_the_concatenation() {
        let lhs = [0xaau8; 16];
        let rhs = v16([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        let r = extr(&lhs, &rhs, 12, OpSize::B16);
        assert_eq!(&r[..4], &[12, 13, 14, 15]);
        assert_eq!(&r[4..], &[0xaa; 12]);
    }

    #[test]
    fn lane_float_compare_writes_full_masks() {
        let mut a = Vreg::default();
        let mut b = Vreg::default();
        for i in 0..4 {
            f_set(&mut a, ElemSize::E4, i, i as f64);
            f_set(&mut b, ElemSize::E4, i, 2.0);
        }
        let r = fcmp_lanes(VFCmpOp::Lt, &a, &b, OpSize::B16, ElemSize::E4);
        assert_eq!(get(&r, ElemSize::E4, 0), 0xffff_ffff);
        assert_eq!(get(&r, ElemSize::E4, 1), 0xffff_ffff);
        assert_eq!(get(&r, ElemSize::E4, 2), 0);
        assert_eq!(get(&r, ElemSize::E4, 3), 0);
    }

    #[test]
    fn float_to_int_truncates_toward_zero() {
        let mut src = Vreg::default();
        f_set(&mut src, ElemSize::E4, 0, 2.9);
        f_set(&mut src, ElemSize::E4, 1, -2.9);
        let r = cvt_float_to_int(&src, OpSize::B8, ElemSize::E4, true);
        assert_eq!(get(&r, ElemSize::E4, 0), 2);
        assert_eq!(get(&r, ElemSize::E4, 1) as u32 as i32, -2);
    }

    #[test]
    fn pairwise_add_combines_both_sources() {
        let mut a = Vreg::default();
        let mut b = Vreg::default();
        for i in 0..4 {
            set(&mut a, ElemSize::E4, i, i as u64 + 1);
            set(&mut b, ElemSize::E4, i, 10 * (i as u64 + 1));
        }
        let r = addp(&a, &b, OpSize::B16, ElemSize::E4);
        assert_eq!(get(&r, ElemSize::E4, 0), 3); // 1+2
        assert_eq!(get(&r, ElemSize::E4, 1), 7); // 3+4
        assert_eq!(get(&r, ElemSize::E4, 2), 30); // 10+20
        assert_eq!(get(&r, ElemSize::E4, 3), 70); // 30+40
    }
}
