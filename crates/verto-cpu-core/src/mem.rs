//! Resolution of guest memory operands to host pointers.
//!
//! The access mode is fixed per guest thread at construction: either operand
//! bits already are host pointers (unified), or they are guest virtual
//! addresses translated through an external mapper. A failed translation is
//! a fatal mapping mismatch, never a recoverable fault.

use std::cell::UnsafeCell;
use std::sync::Arc;

/// External guest-address translator used in mapped mode.
pub trait GuestMapper: Send + Sync {
    /// Host pointer backing `guest`, or `None` when the address is not
    /// mapped.
    fn translate(&self, guest: u64) -> Option<*mut u8>;
}

/// Per-thread view of guest memory, chosen once at thread construction.
#[derive(Clone)]
pub enum MemView {
    /// Operand bits are host pointers already.
    Unified,
    Mapped(Arc<dyn GuestMapper>),
}

impl MemView {
    /// Resolve an operand address to a host pointer for a `size`-byte
    /// access. Panics with a diagnostic when mapped translation fails.
    #[inline]
    pub fn resolve(&self, addr: u64, size: usize) -> *mut u8 {
        match self {
            MemView::Unified => addr as *mut u8,
            MemView::Mapped(mapper) => match mapper.translate(addr) {
                Some(ptr) => ptr,
                None => panic!("untranslatable guest address {addr:#x} ({size}-byte access)"),
            },
        }
    }
}

/// Fixed host buffer standing in for guest RAM in tests and harnesses.
/// Interior mutability because interpreted stores write through raw pointers
/// while the owner still holds `&self`.
pub struct HostRegion {
    buf: Box<[UnsafeCell<u8>]>,
}

// Guest threads race on this memory on purpose; the atomics the interpreter
// issues provide whatever ordering the guest asked for.
unsafe impl Sync for HostRegion {}

impl HostRegion {
    pub fn new(len: usize) -> Self {
        let mut buf = Vec::with_capacity(len);
        buf.resize_with(len, || UnsafeCell::new(0));
        HostRegion {
            buf: buf.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.buf.as_ptr() as *mut u8
    }

    pub fn read(&self, offset: usize, out: &mut [u8]) {
        assert!(offset + out.len() <= self.buf.len());
        for (i, b) in out.iter_mut().enumerate() {
            *b = unsafe { *self.buf[offset + i].get() };
        }
    }

    pub fn write(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.buf.len());
        for (i, &b) in src.iter().enumerate() {
            unsafe { *self.buf[offset + i].get() = b };
        }
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut raw = [0u8; 8];
        self.read(offset, &mut raw);
        u64::from_le_bytes(raw)
    }

    pub fn write_u64(&self, offset: usize, value: u64) {
        self.write(offset, &value.to_le_bytes());
    }
}

/// Maps the guest range `[guest_base, guest_base + len)` onto a
/// [`HostRegion`]. Anything outside the range is unmapped.
pub struct RangeMapper {
    region: Arc<HostRegion>,
    guest_base: u64,
}

impl RangeMapper {
    pub fn new(region: Arc<HostRegion>, guest_base: u64) -> Self {
        RangeMapper { region, guest_base }
    }
}

impl GuestMapper for RangeMapper {
    fn translate(&self, guest: u64) -> Option<*mut u8> {
        let delta = guest.checked_sub(self.guest_base)?;
        if delta < self.region.len() as u64 {
            Some(unsafe { self.region.base().add(delta as usize) })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_mode_passes_operand_bits_through() {
        let region = HostRegion::new(64);
        let addr = region.base() as u64 + 8;
        assert_eq!(MemView::Unified.resolve(addr, 4), addr as *mut u8);
    }

    #[test]
    fn range_mapper_translates_in_range_only() {
        let region = Arc::new(HostRegion::new(4096));
        let mapper = RangeMapper::new(region.clone(), 0x10_0000);
        assert_eq!(mapper.translate(0x10_0000), Some(region.base()));
        assert_eq!(
            mapper.translate(0x10_0fff),
            Some(unsafe { region.base().add(0xfff) })
        );
        assert_eq!(mapper.translate(0x10_1000), None);
        assert_eq!(mapper.translate(0x0f_ffff), None);
    }

    #[test]
    #[should_panic(expected = "untranslatable guest address")]
    fn failed_translation_is_fatal() {
        let region = Arc::new(HostRegion::new(16));
        let view = MemView::Mapped(Arc::new(RangeMapper::new(region, 0x1000)));
        view.resolve(0x9999_0000, 8);
    }
}
