//! Width-generic scalar integer semantics.
//!
//! Operands arrive zero-extended in a `u64`; every helper masks its result
//! back to the operation width, so two's-complement wraparound at 1/2/4/8
//! bytes falls out of the masking rather than per-width code paths.

use verto_ir::{AluOp, DivKind, MulKind, UnaryOp};
use verto_types::{CondCode, OpSize};

/// Sign-extend the low `size` bytes of `value` to 64 bits.
#[inline]
pub(crate) fn sext(value: u64, size: OpSize) -> i64 {
    let shift = 64 - size.bits().min(64);
    ((value << shift) as i64) >> shift
}

pub(crate) fn alu(op: AluOp, size: OpSize, a: u64, b: u64) -> u64 {
    let mask = size.mask();
    let bits = size.bits().min(64) as u64;
    match op {
        AluOp::Add => a.wrapping_add(b) & mask,
        AluOp::Sub => a.wrapping_sub(b) & mask,
        AluOp::And => a & b & mask,
        AluOp::Or => (a | b) & mask,
        AluOp::Xor => (a ^ b) & mask,
        AluOp::Lshl => {
            let s = b & (bits - 1);
            (a << s) & mask
        }
        AluOp::Lshr => {
            let s = b & (bits - 1);
            ((a & mask) >> s) & mask
        }
        AluOp::Ashr => {
            let s = b & (bits - 1);
            (sext(a, size) >> s) as u64 & mask
        }
        AluOp::Rol => {
            let s = (b % bits) as u32;
            let v = a & mask;
            if s == 0 {
                v
            } else {
                ((v << s) | (v >> (bits as u32 - s))) & mask
            }
        }
        AluOp::Ror => {
            let s = (b % bits) as u32;
            let v = a & mask;
            if s == 0 {
                v
            } else {
                ((v >> s) | (v << (bits as u32 - s))) & mask
            }
        }
    }
}

pub(crate) fn unary(op: UnaryOp, size: OpSize, a: u64) -> u64 {
    let mask = size.mask();
    match op {
        UnaryOp::Neg => 0u64.wrapping_sub(a) & mask,
        UnaryOp::Not => !a & mask,
    }
}

/// Multiply at widths up to 8 bytes; the double-width intermediate makes the
/// high-half kinds uniform across widths.
pub(crate) fn mul64(kind: MulKind, size: OpSize, a: u64, b: u64) -> u64 {
    let mask = size.mask();
    let bits = size.bits();
    match kind {
        MulKind::Smul => (sext(a, size).wrapping_mul(sext(b, size))) as u64 & mask,
        MulKind::Umul => (a & mask).wrapping_mul(b & mask) & mask,
        MulKind::SmulH => {
            let wide = sext(a, size) as i128 * sext(b, size) as i128;
            (wide >> bits) as u64 & mask
        }
        MulKind::UmulH => {
            let wide = (a & mask) as u128 * (b & mask) as u128;
            (wide >> bits) as u64 & mask
        }
    }
}

/// 16-byte multiply: two 64-bit operands widened into a 128-bit product.
pub(crate) fn mul128(kind: MulKind, a: u64, b: u64) -> u128 {
    match kind {
        MulKind::Smul => (a as i64 as i128).wrapping_mul(b as i64 as i128) as u128,
        MulKind::Umul => a as u128 * b as u128,
        MulKind::SmulH => ((a as i64 as i128).wrapping_mul(b as i64 as i128) >> 64) as u64 as u128,
        MulKind::UmulH => ((a as u128 * b as u128) >> 64) as u64 as u128,
    }
}

/// Division at widths up to 8 bytes. Division by zero and the
/// `INT_MIN / -1` overflow are fatal, matching hardware fault behavior.
pub(crate) fn divide(kind: DivKind, size: OpSize, a: u64, b: u64) -> u64 {
    let mask = size.mask();
    match kind {
        DivKind::Div => match sext(a, size).checked_div(sext(b, size)) {
            Some(q) => q as u64 & mask,
            None => panic!("Div fault at size {:?}: {} / {}", size, sext(a, size), sext(b, size)),
        },
        DivKind::UDiv => match (a & mask).checked_div(b & mask) {
            Some(q) => q,
            None => panic!("UDiv by zero at size {:?}", size),
        },
        DivKind::Rem => match sext(a, size).checked_rem(sext(b, size)) {
            Some(r) => r as u64 & mask,
            None => panic!("Rem fault at size {:?}: {} % {}", size, sext(a, size), sext(b, size)),
        },
        DivKind::URem => match (a & mask).checked_rem(b & mask) {
            Some(r) => r,
            None => panic!("URem by zero at size {:?}", size),
        },
    }
}

pub(crate) fn divide128(kind: DivKind, a: u128, b: u128) -> u128 {
    match kind {
        DivKind::Div => match (a as i128).checked_div(b as i128) {
            Some(q) => q as u128,
            None => panic!("Div fault at size B16"),
        },
        DivKind::UDiv => match a.checked_div(b) {
            Some(q) => q,
            None => panic!("UDiv by zero at size B16"),
        },
        DivKind::Rem => match (a as i128).checked_rem(b as i128) {
            Some(r) => r as u128,
            None => panic!("Rem fault at size B16"),
        },
        DivKind::URem => match a.checked_rem(b) {
            Some(r) => r,
            None => panic!("URem by zero at size B16"),
        },
    }
}

/// Double-width dividend `hi:lo` divided by `divisor`; only the low half of
/// the quotient or remainder is kept.
pub(crate) fn long_divide(kind: DivKind, size: OpSize, lo: u64, hi: u64, divisor: u64) -> u64 {
    let mask = size.mask();
    let bits = size.bits();
    match kind {
        DivKind::UDiv | DivKind::URem => {
            let dividend = ((hi & mask) as u128) << bits | (lo & mask) as u128;
            let d = (divisor & mask) as u128;
            let out = match kind {
                DivKind::UDiv => dividend.checked_div(d),
                _ => dividend.checked_rem(d),
            };
            match out {
                Some(v) => v as u64 & mask,
                None => panic!("LUDiv by zero at size {size:?}"),
            }
        }
        DivKind::Div | DivKind::Rem => {
            let dividend = (sext(hi, size) as i128) << bits | (lo & mask) as i128;
            let d = sext(divisor, size) as i128;
            let out = match kind {
                DivKind::Div => dividend.checked_div(d),
                _ => dividend.checked_rem(d),
            };
            match out {
                Some(v) => v as u64 & mask,
                None => panic!("LDiv fault at size {size:?}"),
            }
        }
    }
}

/// Merge `width` bits of `field` into `base` at bit offset `lsb`.
pub(crate) fn bfi(base: u64, field: u64, width: u8, lsb: u8) -> u64 {
    let mask = width_mask(width);
    (base & !(mask << lsb)) | ((field & mask) << lsb)
}

pub(crate) fn bfe(value: u64, width: u8, lsb: u8) -> u64 {
    (value >> lsb) & width_mask(width)
}

pub(crate) fn sbfe(value: u64, width: u8, lsb: u8) -> u64 {
    let shift = 64 - width as u32 - lsb as u32;
    (((value << shift) as i64) >> (64 - width as u32)) as u64
}

#[inline]
fn width_mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// 0-based index of the lowest set bit, -1 when none is set.
pub(crate) fn find_lsb(value: u64) -> u64 {
    if value == 0 {
        -1i64 as u64
    } else {
        value.trailing_zeros() as u64
    }
}

/// 0-based index of the highest set bit within the width, -1 when none.
pub(crate) fn find_msb(value: u64, size: OpSize) -> u64 {
    (63i64 - (value & size.mask()).leading_zeros() as i64) as u64
}

pub(crate) fn find_trailing_zeros(value: u64, size: OpSize) -> u64 {
    let bits = size.bits().min(64);
    let masked = value & size.mask();
    if masked == 0 {
        bits as u64
    } else {
        masked.trailing_zeros() as u64
    }
}

pub(crate) fn count_leading_zeros(value: u64, size: OpSize) -> u64 {
    let bits = size.bits().min(64);
    let masked = value & size.mask();
    if masked == 0 {
        bits as u64
    } else {
        (masked.leading_zeros() - (64 - bits)) as u64
    }
}

/// Byte swap at widths 2/4/8. Width 1 is malformed IR.
pub(crate) fn rev(value: u64, size: OpSize) -> u64 {
    match size {
        OpSize::B2 => (value as u16).swap_bytes() as u64,
        OpSize::B4 => (value as u32).swap_bytes() as u64,
        OpSize::B8 => value.swap_bytes(),
        _ => panic!("Rev: unsupported size {size:?}"),
    }
}

/// Hardware-style condition evaluation over two 64-bit operands compared at
/// `cmp_size` (4 or 8 bytes; the float codes reinterpret the low bits).
pub(crate) fn test_cond(cond: CondCode, cmp_size: OpSize, a: u64, b: u64) -> bool {
    let mask = cmp_size.mask();
    let (ua, ub) = (a & mask, b & mask);
    let (sa, sb) = (sext(a, cmp_size), sext(b, cmp_size));
    let (fa, fb, nan) = match cmp_size {
        OpSize::B4 => {
            let (x, y) = (f32::from_bits(a as u32) as f64, f32::from_bits(b as u32) as f64);
            (x, y, x.is_nan() || y.is_nan())
        }
        _ => {
            let (x, y) = (f64::from_bits(a), f64::from_bits(b));
            (x, y, x.is_nan() || y.is_nan())
        }
    };
    match cond {
        CondCode::Eq => ua == ub,
        CondCode::Neq => ua != ub,
        CondCode::Sge => sa >= sb,
        CondCode::Slt => sa < sb,
        CondCode::Sgt => sa > sb,
        CondCode::Sle => sa <= sb,
        CondCode::Uge => ua >= ub,
        CondCode::Ult => ua < ub,
        CondCode::Ugt => ua > ub,
        CondCode::Ule => ua <= ub,
        CondCode::Flu => fa < fb || nan,
        CondCode::Fge => fa >= fb && !nan,
        CondCode::Fleu => fa <= fb || nan,
        CondCode::Fgt => fa > fb && !nan,
        CondCode::Fu => nan,
        CondCode::Fnu => !nan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_add_wraps() {
        assert_eq!(alu(AluOp::Add, OpSize::B1, 255, 2), 1);
    }

    #[test]
    fn four_byte_sub_borrows_within_width() {
        assert_eq!(alu(AluOp::Sub, OpSize::B4, 0, 1), 0xffff_ffff);
    }

    #[test]
    fn shift_amounts_mask_to_width() {
        // 1-byte shift by 9 behaves like shift by 1.
        assert_eq!(alu(AluOp::Lshl, OpSize::B1, 0x40, 9), 0x80);
        assert_eq!(alu(AluOp::Ashr, OpSize::B1, 0x80, 1), 0xc0);
    }

    #[test]
    fn rotate_by_full_width_is_identity() {
        assert_eq!(alu(AluOp::Rol, OpSize::B2, 0x1234, 16), 0x1234);
        assert_eq!(alu(AluOp::Ror, OpSize::B2, 0x1234, 4), 0x4123);
    }

    #[test]
    fn high_multiply_matches_wide_product() {
        assert_eq!(
            mul64(MulKind::UmulH, OpSize::B8, u64::MAX, u64::MAX),
            0xffff_ffff_ffff_fffe
        );
        // -1 * -1 = 1: high half is zero.
        assert_eq!(mul64(MulKind::SmulH, OpSize::B8, u64::MAX, u64::MAX), 0);
        assert_eq!(mul64(MulKind::SmulH, OpSize::B1, 0x80, 0x80), 0x40);
    }

    #[test]
    fn signed_division_sign_extends_before_dividing() {
        // -8 / 2 at one byte.
        assert_eq!(divide(DivKind::Div, OpSize::B1, 0xf8, 2), 0xfc);
        assert_eq!(divide(DivKind::URem, OpSize::B2, 0xffff, 0x10), 0xf);
    }

    #[test]
    #[should_panic(expected = "Div fault")]
    fn int64_min_by_minus_one_is_fatal() {
        divide(DivKind::Div, OpSize::B8, i64::MIN as u64, -1i64 as u64);
    }

    #[test]
    #[should_panic(expected = "by zero")]
    fn unsigned_division_by_zero_is_fatal() {
        divide(DivKind::UDiv, OpSize::B4, 10, 0);
    }

    #[test]
    fn long_division_keeps_the_low_half() {
        // 0x1_0000_0000_0000_0005 / 2 at 8 bytes.
        let q = long_divide(DivKind::UDiv, OpSize::B8, 5, 1, 2);
        assert_eq!(q, 0x8000_0000_0000_0002);
        let r = long_divide(DivKind::URem, OpSize::B8, 5, 1, 2);
        assert_eq!(r, 1);
    }

    #[test]
    fn bitfield_insert_then_extract_round_trips() {
        let base = 0xffff_ffff_ffff_ffff;
        let inserted = bfi(base, 0x2a, 7, 12);
        assert_eq!(bfe(inserted, 7, 12), 0x2a);
        // Bits outside the field are untouched.
        assert_eq!(inserted & !(0x7f << 12), base & !(0x7f << 12));
    }

    #[test]
    fn signed_extract_propagates_the_field_sign() {
        assert_eq!(sbfe(0b1000 << 4, 4, 4), -8i64 as u64);
        assert_eq!(sbfe(0b0111 << 4, 4, 4), 7);
    }

    #[test]
    fn bit_scans_handle_zero_inputs_explicitly() {
        assert_eq!(find_lsb(0), -1i64 as u64);
        assert_eq!(find_lsb(0b1000), 3);
        assert_eq!(find_msb(0, OpSize::B4), -1i64 as u64);
        assert_eq!(find_msb(0x8000_0000, OpSize::B4), 31);
        assert_eq!(find_trailing_zeros(0, OpSize::B2), 16);
        assert_eq!(find_trailing_zeros(0x100, OpSize::B2), 8);
        assert_eq!(count_leading_zeros(0, OpSize::B1), 8);
        assert_eq!(count_leading_zeros(1, OpSize::B4), 31);
    }

    #[test]
    fn condition_codes_respect_compare_width() {
        // 0xffff_ffff is -1 at 4 bytes: less than 1 signed, greater unsigned.
        assert!(test_cond(CondCode::Slt, OpSize::B4, 0xffff_ffff, 1));
        assert!(test_cond(CondCode::Ugt, OpSize::B4, 0xffff_ffff, 1));
        assert!(test_cond(CondCode::Eq, OpSize::B4, 0x1_0000_0000, 0));
    }

    #[test]
    fn float_conditions_account_for_nan() {
        let nan = f64::NAN.to_bits();
        let one = 1.0f64.to_bits();
        assert!(test_cond(CondCode::Flu, OpSize::B8, nan, one));
        assert!(!test_cond(CondCode::Fge, OpSize::B8, nan, one));
        assert!(test_cond(CondCode::Fu, OpSize::B8, nan, one));
        assert!(test_cond(CondCode::Fnu, OpSize::B8, one, one));
        assert!(test_cond(CondCode::Fgt, OpSize::B8, 2.0f64.to_bits(), one));
    }
}
