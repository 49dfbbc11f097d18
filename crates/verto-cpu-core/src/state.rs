//! Fixed-layout guest execution state.
//!
//! Context-access instructions carry byte offsets into this structure as
//! literals, so the layout is part of the IR contract: reordering fields
//! breaks every translated region.

use bytemuck::{Pod, Zeroable};

pub const GPR_COUNT: usize = 16;
pub const VREG_COUNT: usize = 16;
pub const VREG_BYTES: usize = 16;
pub const FLAG_COUNT: usize = 48;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CpuState {
    /// Guest instruction pointer.
    pub rip: u64,
    pub gprs: [u64; GPR_COUNT],
    pub vregs: [[u8; VREG_BYTES]; VREG_COUNT],
    /// One byte per emulated flag; only bit 0 of each is meaningful.
    pub flags: [u8; FLAG_COUNT],
}

impl Default for CpuState {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl CpuState {
    pub const RIP_OFFSET: u32 = 0;
    pub const GPR_BASE: u32 = 8;
    pub const VREG_BASE: u32 = Self::GPR_BASE + (GPR_COUNT * 8) as u32;
    pub const FLAGS_BASE: u32 = Self::VREG_BASE + (VREG_COUNT * VREG_BYTES) as u32;

    #[inline]
    pub const fn gpr_offset(index: usize) -> u32 {
        Self::GPR_BASE + (index * 8) as u32
    }

    #[inline]
    pub const fn vreg_offset(index: usize) -> u32 {
        Self::VREG_BASE + (index * VREG_BYTES) as u32
    }

    /// Raw byte read at a context offset. Panics on an out-of-range access,
    /// which indicates malformed IR.
    #[inline]
    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        out.copy_from_slice(&bytemuck::bytes_of(self)[offset..offset + out.len()]);
    }

    #[inline]
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) {
        bytemuck::bytes_of_mut(self)[offset..offset + src.len()].copy_from_slice(src);
    }
}
