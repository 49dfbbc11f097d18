//! Operand storage for interpreted values.
//!
//! Every instruction result lives in a bump-allocated slot addressed through
//! a [`SlotRef`] handle rather than a raw pointer. Growth doubles the backing
//! buffer and never moves previously returned offsets, so handles stay valid
//! from `reset()` to the next `reset()`.

use verto_ir::ValueId;
use verto_types::OpSize;

/// Minimum slot size. Sub-16-byte results get a full 16 bytes, zeroed up
/// front, so partial writes can never leak a previous run's bytes.
pub const MIN_SLOT: usize = 16;

const SLOT_ALIGN: usize = 16;
const INITIAL_CAPACITY: usize = 4096;

/// Bounds-checked handle to one arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotRef {
    offset: u32,
    len: u32,
}

impl SlotRef {
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }
}

pub struct OpdArena {
    buf: Vec<u8>,
    cursor: usize,
}

impl Default for OpdArena {
    fn default() -> Self {
        Self::new()
    }
}

impl OpdArena {
    pub fn new() -> Self {
        OpdArena {
            buf: vec![0; INITIAL_CAPACITY],
            cursor: 0,
        }
    }

    /// Rewind the write cursor. Capacity is kept; all outstanding handles
    /// from the previous run become logically stale.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Reserve `bytes` (rounded up to [`MIN_SLOT`], 16-byte aligned) and
    /// zero the first 16 bytes of the slot.
    pub fn alloc(&mut self, bytes: usize) -> SlotRef {
        let len = bytes.max(MIN_SLOT).next_multiple_of(SLOT_ALIGN);
        let offset = self.cursor;
        while offset + len > self.buf.len() {
            let doubled = self.buf.len() * 2;
            self.buf.resize(doubled, 0);
        }
        self.cursor = offset + len;
        self.buf[offset..offset + MIN_SLOT].fill(0);
        SlotRef {
            offset: offset as u32,
            len: len as u32,
        }
    }

    #[inline]
    pub fn bytes(&self, slot: SlotRef) -> &[u8] {
        &self.buf[slot.offset as usize..slot.offset as usize + slot.len as usize]
    }

    #[inline]
    pub fn bytes_mut(&mut self, slot: SlotRef) -> &mut [u8] {
        &mut self.buf[slot.offset as usize..slot.offset as usize + slot.len as usize]
    }

    /// Little-endian scalar read of the slot's low `size` bytes,
    /// zero-extended to 64 bits.
    pub fn read_scalar(&self, slot: SlotRef, size: OpSize) -> u64 {
        let bytes = self.bytes(slot);
        let mut raw = [0u8; 8];
        let n = size.bytes().min(8);
        raw[..n].copy_from_slice(&bytes[..n]);
        u64::from_le_bytes(raw)
    }

    /// Writes `value` masked to `size` into the slot's low bytes.
    pub fn write_scalar(&mut self, slot: SlotRef, size: OpSize, value: u64) {
        let n = size.bytes().min(8);
        let raw = (value & size.mask()).to_le_bytes();
        self.bytes_mut(slot)[..n].copy_from_slice(&raw[..n]);
    }

    pub fn read_u128(&self, slot: SlotRef) -> u128 {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&self.bytes(slot)[..16]);
        u128::from_le_bytes(raw)
    }

    pub fn write_u128(&mut self, slot: SlotRef, value: u128) {
        self.bytes_mut(slot)[..16].copy_from_slice(&value.to_le_bytes());
    }

    pub fn read_vec(&self, slot: SlotRef) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.bytes(slot)[..16]);
        out
    }

    pub fn write_vec(&mut self, slot: SlotRef, value: [u8; 16]) {
        self.bytes_mut(slot)[..16].copy_from_slice(&value);
    }
}

/// SSA id to arena slot, rebuilt each interpreted invocation. Storage only
/// grows across runs so repeated invocations stop allocating.
#[derive(Default)]
pub struct DestMap {
    slots: Vec<Option<SlotRef>>,
}

impl DestMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all entries and ensure capacity for `value_count` ids.
    pub fn begin_run(&mut self, value_count: usize) {
        if value_count > self.slots.len() {
            self.slots.resize(value_count, None);
        }
        self.slots[..value_count].fill(None);
    }

    #[inline]
    pub fn set(&mut self, id: ValueId, slot: SlotRef) {
        self.slots[id.index()] = Some(slot);
    }

    /// Panics when the id has no slot this run, i.e. the IR references a
    /// value before its defining instruction executed.
    #[inline]
    pub fn get(&self, id: ValueId) -> SlotRef {
        match self.slots[id.index()] {
            Some(slot) => slot,
            None => panic!("value {:?} read before definition", id),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
