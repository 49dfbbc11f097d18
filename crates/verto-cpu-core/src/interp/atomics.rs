//! Atomic read-modify-write against resolved host memory.
//!
//! These must be genuine hardware atomics: another guest thread's dispatcher
//! may be racing on the same word through its own resolved pointer. All
//! operations are sequentially consistent, the strongest ordering any guest
//! fence can ask for.

use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use verto_ir::AtomicOp;
use verto_types::{FenceKind, OpSize};

macro_rules! impl_rmw {
    ($atomic:expr, $op:expr, $src:expr) => {{
        let a = $atomic;
        match $op {
            AtomicOp::Add => a.fetch_add($src as _, Ordering::SeqCst),
            AtomicOp::Sub => a.fetch_sub($src as _, Ordering::SeqCst),
            AtomicOp::And => a.fetch_and($src as _, Ordering::SeqCst),
            AtomicOp::Or => a.fetch_or($src as _, Ordering::SeqCst),
            AtomicOp::Xor => a.fetch_xor($src as _, Ordering::SeqCst),
        }
    }};
}

/// Fetch-op at `ptr`; the prior value is returned (fire-and-forget callers
/// discard it).
///
/// # Safety
/// `ptr` must be valid for a `size`-byte read-modify-write and sufficiently
/// aligned for the width.
pub(crate) unsafe fn rmw(op: AtomicOp, ptr: *mut u8, src: u64, size: OpSize) -> u64 {
    match size {
        OpSize::B1 => impl_rmw!(AtomicU8::from_ptr(ptr), op, src) as u64,
        OpSize::B2 => impl_rmw!(AtomicU16::from_ptr(ptr.cast()), op, src) as u64,
        OpSize::B4 => impl_rmw!(AtomicU32::from_ptr(ptr.cast()), op, src) as u64,
        OpSize::B8 => impl_rmw!(AtomicU64::from_ptr(ptr.cast()), op, src),
        OpSize::B16 => panic!("atomic op: unsupported size B16"),
    }
}

/// Compare-and-swap returning the value observed in memory: `expected` when
/// the swap happened, the conflicting occupant when it did not.
///
/// # Safety
/// Same contract as [`rmw`].
pub(crate) unsafe fn cas(ptr: *mut u8, expected: u64, desired: u64, size: OpSize) -> u64 {
    match size {
        OpSize::B1 => {
            let a = AtomicU8::from_ptr(ptr);
            match a.compare_exchange(expected as u8, desired as u8, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(prev) | Err(prev) => prev as u64,
            }
        }
        OpSize::B2 => {
            let a = AtomicU16::from_ptr(ptr.cast());
            match a.compare_exchange(expected as u16, desired as u16, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(prev) | Err(prev) => prev as u64,
            }
        }
        OpSize::B4 => {
            let a = AtomicU32::from_ptr(ptr.cast());
            match a.compare_exchange(expected as u32, desired as u32, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(prev) | Err(prev) => prev as u64,
            }
        }
        OpSize::B8 => {
            let a = AtomicU64::from_ptr(ptr.cast());
            match a.compare_exchange(expected, desired, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(prev) | Err(prev) => prev,
            }
        }
        OpSize::B16 => panic!("CAS: unsupported size B16"),
    }
}

/// # Safety
/// Same contract as [`rmw`].
pub(crate) unsafe fn swap(ptr: *mut u8, src: u64, size: OpSize) -> u64 {
    match size {
        OpSize::B1 => AtomicU8::from_ptr(ptr).swap(src as u8, Ordering::SeqCst) as u64,
        OpSize::B2 => AtomicU16::from_ptr(ptr.cast()).swap(src as u16, Ordering::SeqCst) as u64,
        OpSize::B4 => AtomicU32::from_ptr(ptr.cast()).swap(src as u32, Ordering::SeqCst) as u64,
        OpSize::B8 => AtomicU64::from_ptr(ptr.cast()).swap(src, Ordering::SeqCst),
        OpSize::B16 => panic!("atomic swap: unsupported size B16"),
    }
}

pub(crate) fn fence(kind: FenceKind) {
    match kind {
        FenceKind::Load => std::sync::atomic::fence(Ordering::Acquire),
        FenceKind::Store => std::sync::atomic::fence(Ordering::Release),
        FenceKind::LoadStore => std::sync::atomic::fence(Ordering::SeqCst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_returns_expected_on_success_and_occupant_on_failure() {
        let mut word: u64 = 0x1234;
        let ptr = &mut word as *mut u64 as *mut u8;
        let prev = unsafe { cas(ptr, 0x1234, 0x5678, OpSize::B8) };
        assert_eq!(prev, 0x1234);
        assert_eq!(word, 0x5678);

        let prev = unsafe { cas(ptr, 0x1234, 0x9999, OpSize::B8) };
        assert_eq!(prev, 0x5678);
        assert_eq!(word, 0x5678);
    }

    #[test]
    fn narrow_rmw_touches_only_its_width() {
        let mut word: u32 = 0xaabb_ccff;
        let ptr = &mut word as *mut u32 as *mut u8;
        let prev = unsafe { rmw(AtomicOp::Add, ptr, 1, OpSize::B1) };
        assert_eq!(prev, 0xff);
        assert_eq!(word, 0xaabb_cc00);
    }

    #[test]
    fn rmw_and_swap_dispatch_every_width() {
        let mut word: u64 = 0;
        let ptr = &mut word as *mut u64 as *mut u8;
        for size in [OpSize::B1, OpSize::B2, OpSize::B4, OpSize::B8] {
            word = 0x0f;
            assert_eq!(unsafe { rmw(AtomicOp::Xor, ptr, 0xff, size) }, 0x0f);
            assert_eq!(word, 0xf0);
            assert_eq!(unsafe { swap(ptr, 0x3c, size) }, 0xf0);
            assert_eq!(word, 0x3c);
        }
    }

    #[test]
    fn swap_returns_the_prior_value() {
        let mut half: u16 = 7;
        let ptr = &mut half as *mut u16 as *mut u8;
        assert_eq!(unsafe { swap(ptr, 42, OpSize::B2) }, 7);
        assert_eq!(half, 42);
    }
}
