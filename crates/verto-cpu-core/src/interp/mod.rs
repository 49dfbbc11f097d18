//! The interpreter loop: walks a function's block chain and dispatches each
//! instruction's semantics against guest state, the operand arena, and guest
//! memory.

mod alu;
mod atomics;
mod float;
mod vector;

use std::sync::atomic::Ordering;
use std::sync::OnceLock;
use std::time::Instant;

use tracing::{info, trace};
use verto_ir::{Function, Instr, ValueId, BREAK_REASON_HALT};
use verto_types::OpSize;

use crate::arena::{DestMap, OpdArena};
use crate::mem::MemView;
use crate::state::CpuState;
use crate::{CpuIdSource, GuestThread, SyscallHandler};

use vector::Vreg;

enum Flow {
    Continue,
    /// A control-flow instruction selected a new current block.
    Redo(verto_ir::BlockId),
    Quit,
}

/// Interpret `function` against `thread`, running to chain completion or a
/// halting `Break`. The thread's stop flag is honored at block boundaries
/// only, never mid-block.
pub fn run(function: &Function, thread: &mut GuestThread) {
    let GuestThread {
        state,
        mem,
        should_stop,
        syscalls,
        cpuid,
        arena,
        dest_map,
    } = thread;
    arena.reset();
    dest_map.begin_run(function.value_count as usize);

    let mut interp = Interp {
        state,
        mem,
        syscalls: &**syscalls,
        cpuid: &**cpuid,
        arena,
        map: dest_map,
        entry_addr: function.entry_addr,
        stop_requested: false,
    };

    let mut block = function.block(function.entry);
    'blocks: loop {
        trace!(block = block.id.0, "entering block");
        for instr in &block.instrs {
            if let Some((dst, bytes)) = instr.dest_alloc() {
                let slot = interp.arena.alloc(bytes);
                interp.map.set(dst, slot);
            }
            match interp.step(instr) {
                Flow::Continue => {}
                Flow::Redo(id) => {
                    if should_stop.load(Ordering::Relaxed) {
                        break 'blocks;
                    }
                    block = function.block(id);
                    continue 'blocks;
                }
                Flow::Quit => break 'blocks,
            }
        }
        // Fell off the end of the block: continue in program order.
        match block.next {
            Some(next) if !should_stop.load(Ordering::Relaxed) => block = function.block(next),
            _ => break,
        }
    }
    if interp.stop_requested {
        should_stop.store(true, Ordering::Relaxed);
    }
}

struct Interp<'a> {
    state: &'a mut CpuState,
    mem: &'a MemView,
    syscalls: &'a dyn SyscallHandler,
    cpuid: &'a dyn CpuIdSource,
    arena: &'a mut OpdArena,
    map: &'a mut DestMap,
    entry_addr: u64,
    stop_requested: bool,
}

impl Interp<'_> {
    #[inline]
    fn scalar(&self, v: ValueId, size: OpSize) -> u64 {
        self.arena.read_scalar(self.map.get(v), size)
    }

    #[inline]
    fn wide(&self, v: ValueId) -> u128 {
        self.arena.read_u128(self.map.get(v))
    }

    #[inline]
    fn vec(&self, v: ValueId) -> Vreg {
        self.arena.read_vec(self.map.get(v))
    }

    #[inline]
    fn put_scalar(&mut self, dst: ValueId, size: OpSize, value: u64) {
        let slot = self.map.get(dst);
        self.arena.write_scalar(slot, size, value);
    }

    #[inline]
    fn put_wide(&mut self, dst: ValueId, value: u128) {
        let slot = self.map.get(dst);
        self.arena.write_u128(slot, value);
    }

    #[inline]
    fn put_vec(&mut self, dst: ValueId, value: Vreg) {
        let slot = self.map.get(dst);
        self.arena.write_vec(slot, value);
    }

    /// Byte copy between slots through a bounce buffer (the arena cannot
    /// hand out two overlapping borrows).
    fn copy_value(&mut self, dst: ValueId, src: ValueId, n: usize) {
        let mut buf = [0u8; 16];
        buf[..n].copy_from_slice(&self.arena.bytes(self.map.get(src))[..n]);
        let slot = self.map.get(dst);
        self.arena.bytes_mut(slot)[..n].copy_from_slice(&buf[..n]);
    }

    fn step(&mut self, instr: &Instr) -> Flow {
        match *instr {
            // Control flow.
            Instr::Jump { target } => return Flow::Redo(target),
            Instr::CondJump {
                cond,
                true_target,
                false_target,
            } => {
                let taken = self.scalar(cond, OpSize::B8) != 0;
                return Flow::Redo(if taken { true_target } else { false_target });
            }
            Instr::ExitFunction => return Flow::Quit,
            Instr::EndBlock { ip_increment } => {
                self.state.rip = self.state.rip.wrapping_add(ip_increment);
            }
            Instr::Break { reason } => {
                if reason == BREAK_REASON_HALT {
                    self.stop_requested = true;
                    return Flow::Quit;
                }
                panic!("Break: unknown reason {reason}");
            }
            Instr::Fence { kind } => atomics::fence(kind),

            // External boundaries.
            Instr::Syscall { dst, ref args } => {
                let mut gathered = [0u64; verto_ir::MAX_SYSCALL_ARGS];
                let mut count = 0;
                for arg in args {
                    match arg {
                        Some(v) => {
                            gathered[count] = self.scalar(*v, OpSize::B8);
                            count += 1;
                        }
                        None => break,
                    }
                }
                let result = self.syscalls.syscall(self.state, &gathered[..count]);
                self.put_scalar(dst, OpSize::B8, result);
            }
            Instr::CpuId { dst, function } => {
                let request = self.scalar(function, OpSize::B8);
                let res = self.cpuid.run_function(request);
                let packed = res[0] as u128
                    | (res[1] as u128) << 32
                    | (res[2] as u128) << 64
                    | (res[3] as u128) << 96;
                self.put_wide(dst, packed);
            }

            // Constants, moves, debug.
            Instr::Constant { dst, value } => self.put_scalar(dst, OpSize::B8, value),
            Instr::EntrypointOffset { dst, offset } => {
                self.put_scalar(dst, OpSize::B8, self.entry_addr.wrapping_add(offset));
            }
            Instr::CycleCounter { dst } => self.put_scalar(dst, OpSize::B8, cycle_counter()),
            Instr::Mov { dst, src, size } => self.copy_value(dst, src, size.bytes()),
            Instr::VectorZero { dst } => self.put_vec(dst, Vreg::default()),
            Instr::Print { src, size } => {
                if size == OpSize::B16 {
                    info!(value = format_args!("{:#034x}", self.wide(src)), "print");
                } else {
                    info!(value = format_args!("{:#x}", self.scalar(src, size)), "print");
                }
            }

            // Guest context access.
            Instr::LoadContext { dst, offset, size } => {
                self.load_context_at(dst, offset as usize, size);
            }
            Instr::StoreContext { src, offset, size } => {
                self.store_context_at(src, offset as usize, size);
            }
            Instr::LoadContextIndexed {
                dst,
                index,
                base_offset,
                stride,
                size,
            } => {
                let i = self.scalar(index, OpSize::B8);
                let offset = base_offset as u64 + i * stride as u64;
                self.load_context_at(dst, offset as usize, size);
            }
            Instr::StoreContextIndexed {
                src,
                index,
                base_offset,
                stride,
                size,
            } => {
                let i = self.scalar(index, OpSize::B8);
                let offset = base_offset as u64 + i * stride as u64;
                self.store_context_at(src, offset as usize, size);
            }
            Instr::LoadFlag { dst, flag } => {
                let value = self.state.flags[flag as usize] as u64;
                self.put_scalar(dst, OpSize::B1, value);
            }
            Instr::StoreFlag { src, flag } => {
                let value = self.scalar(src, OpSize::B1) & 1;
                self.state.flags[flag as usize] = value as u8;
            }

            // Guest memory access.
            Instr::LoadMem { dst, addr, size } => {
                let n = size.bytes();
                let ptr = self.mem.resolve(self.scalar(addr, OpSize::B8), n);
                let mut buf = [0u8; 16];
                unsafe { std::ptr::copy_nonoverlapping(ptr, buf.as_mut_ptr(), n) };
                let slot = self.map.get(dst);
                self.arena.bytes_mut(slot)[..n].copy_from_slice(&buf[..n]);
            }
            Instr::StoreMem { addr, src, size } => {
                let n = size.bytes();
                let ptr = self.mem.resolve(self.scalar(addr, OpSize::B8), n);
                let mut buf = [0u8; 16];
                buf[..n].copy_from_slice(&self.arena.bytes(self.map.get(src))[..n]);
                unsafe { std::ptr::copy_nonoverlapping(buf.as_ptr(), ptr, n) };
            }

            // Scalar integer.
            Instr::Alu {
                dst,
                op,
                lhs,
                rhs,
                size,
            } => {
                if size == OpSize::B16 {
                    panic!("Alu {op:?}: unsupported size B16");
                }
                let r = alu::alu(op, size, self.scalar(lhs, size), self.scalar(rhs, OpSize::B8));
                self.put_scalar(dst, size, r);
            }
            Instr::Unary { dst, op, src, size } => {
                if size == OpSize::B16 {
                    panic!("Unary {op:?}: unsupported size B16");
                }
                let r = alu::unary(op, size, self.scalar(src, size));
                self.put_scalar(dst, size, r);
            }
            Instr::Mul {
                dst,
                kind,
                lhs,
                rhs,
                size,
            } => {
                if size == OpSize::B16 {
                    // Widening form: 64-bit operands make a 128-bit product.
                    let r = alu::mul128(kind, self.scalar(lhs, OpSize::B8), self.scalar(rhs, OpSize::B8));
                    self.put_wide(dst, r);
                } else {
                    let r = alu::mul64(kind, size, self.scalar(lhs, size), self.scalar(rhs, size));
                    self.put_scalar(dst, size, r);
                }
            }
            Instr::Div {
                dst,
                kind,
                lhs,
                rhs,
                size,
            } => {
                if size == OpSize::B16 {
                    let r = alu::divide128(kind, self.wide(lhs), self.wide(rhs));
                    self.put_wide(dst, r);
                } else {
                    let r = alu::divide(kind, size, self.scalar(lhs, size), self.scalar(rhs, size));
                    self.put_scalar(dst, size, r);
                }
            }
            Instr::LongDiv {
                dst,
                kind,
                lo,
                hi,
                divisor,
                size,
            } => {
                if size == OpSize::B16 {
                    panic!("LongDiv: unsupported size B16");
                }
                let r = alu::long_divide(
                    kind,
                    size,
                    self.scalar(lo, size),
                    self.scalar(hi, size),
                    self.scalar(divisor, size),
                );
                self.put_scalar(dst, size, r);
            }
            Instr::Bfi {
                dst,
                lhs,
                rhs,
                width,
                lsb,
            } => {
                let r = alu::bfi(
                    self.scalar(lhs, OpSize::B8),
                    self.scalar(rhs, OpSize::B8),
                    width,
                    lsb,
                );
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::Bfe {
                dst,
                src,
                width,
                lsb,
                size,
            } => {
                // The 16-byte form extracts at most 64 bits of a wide value.
                let r = if size == OpSize::B16 {
                    let wide = self.wide(src) >> lsb;
                    (wide as u64) & if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
                } else {
                    alu::bfe(self.scalar(src, OpSize::B8), width, lsb)
                };
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::Sbfe {
                dst,
                src,
                width,
                lsb,
            } => {
                let r = alu::sbfe(self.scalar(src, OpSize::B8), width, lsb);
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::Popcount { dst, src } => {
                let r = self.scalar(src, OpSize::B8).count_ones() as u64;
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::FindLsb { dst, src } => {
                let r = alu::find_lsb(self.scalar(src, OpSize::B8));
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::FindMsb { dst, src, size } => {
                let r = alu::find_msb(self.scalar(src, size), size);
                self.put_scalar(dst, size, r);
            }
            Instr::FindTrailingZeros { dst, src, size } => {
                let r = alu::find_trailing_zeros(self.scalar(src, size), size);
                self.put_scalar(dst, size, r);
            }
            Instr::CountLeadingZeros { dst, src, size } => {
                let r = alu::count_leading_zeros(self.scalar(src, size), size);
                self.put_scalar(dst, size, r);
            }
            Instr::Rev { dst, src, size } => {
                let r = alu::rev(self.scalar(src, size), size);
                self.put_scalar(dst, size, r);
            }

            // Atomics.
            Instr::Cas {
                dst,
                expected,
                desired,
                addr,
                size,
            } => {
                let ptr = self.mem.resolve(self.scalar(addr, OpSize::B8), size.bytes());
                let prev = unsafe {
                    atomics::cas(
                        ptr,
                        self.scalar(expected, size),
                        self.scalar(desired, size),
                        size,
                    )
                };
                self.put_scalar(dst, size, prev);
            }
            Instr::AtomicRmw {
                op,
                addr,
                src,
                size,
            } => {
                let ptr = self.mem.resolve(self.scalar(addr, OpSize::B8), size.bytes());
                unsafe { atomics::rmw(op, ptr, self.scalar(src, size), size) };
            }
            Instr::AtomicFetchRmw {
                dst,
                op,
                addr,
                src,
                size,
            } => {
                let ptr = self.mem.resolve(self.scalar(addr, OpSize::B8), size.bytes());
                let prev = unsafe { atomics::rmw(op, ptr, self.scalar(src, size), size) };
                self.put_scalar(dst, size, prev);
            }
            Instr::AtomicSwap {
                dst,
                addr,
                src,
                size,
            } => {
                let ptr = self.mem.resolve(self.scalar(addr, OpSize::B8), size.bytes());
                let prev = unsafe { atomics::swap(ptr, self.scalar(src, size), size) };
                self.put_scalar(dst, size, prev);
            }

            // Comparison / select.
            Instr::Select {
                dst,
                cond,
                cmp_size,
                cmp1,
                cmp2,
                if_true,
                if_false,
                size,
            } => {
                let taken = alu::test_cond(
                    cond,
                    cmp_size,
                    self.scalar(cmp1, OpSize::B8),
                    self.scalar(cmp2, OpSize::B8),
                );
                let chosen = if taken { if_true } else { if_false };
                self.copy_value(dst, chosen, size.bytes());
            }
            Instr::GetHostFlag { dst, src, bit } => {
                let r = (self.scalar(src, OpSize::B8) >> bit) & 1;
                self.put_scalar(dst, OpSize::B8, r);
            }

            // Vector.
            Instr::VCastFromGpr { dst, src, elem } => {
                let r = vector::cast_from_gpr(self.scalar(src, OpSize::B8), elem);
                self.put_vec(dst, r);
            }
            Instr::VCreatePair { dst, lo, hi, half } => {
                let r = vector::create_pair(&self.vec(lo), &self.vec(hi), half);
                self.put_vec(dst, r);
            }
            Instr::VExtractPair {
                dst,
                src,
                element,
                half,
            } => {
                let r = vector::extract_pair(&self.vec(src), element as usize, half);
                self.put_vec(dst, r);
            }
            Instr::VSplat {
                dst,
                src,
                size,
                elem,
            } => {
                let r = vector::splat(self.scalar(src, OpSize::B8), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VDupElement {
                dst,
                src,
                index,
                size,
                elem,
            } => {
                let r = vector::dup_element(&self.vec(src), index as usize, size, elem);
                self.put_vec(dst, r);
            }
            Instr::VBit {
                dst,
                op,
                lhs,
                rhs,
                size,
            } => {
                let r = vector::bit(op, &self.vec(lhs), &self.vec(rhs), size);
                self.put_vec(dst, r);
            }
            Instr::VNot { dst, src, size } => {
                self.put_vec(dst, vector::not(&self.vec(src), size));
            }
            Instr::VShlBytes {
                dst,
                src,
                bytes,
                size,
            } => {
                let r = vector::shl_bytes(&self.vec(src), bytes as usize, size);
                self.put_vec(dst, r);
            }
            Instr::VShrBytes {
                dst,
                src,
                bytes,
                size,
            } => {
                let r = vector::shr_bytes(&self.vec(src), bytes as usize, size);
                self.put_vec(dst, r);
            }
            Instr::VArith {
                dst,
                op,
                lhs,
                rhs,
                size,
                elem,
            } => {
                let r = vector::arith(op, &self.vec(lhs), &self.vec(rhs), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VShiftImm {
                dst,
                op,
                src,
                amount,
                size,
                elem,
            } => {
                let r = vector::shift_imm(op, &self.vec(src), amount, size, elem);
                self.put_vec(dst, r);
            }
            Instr::VShiftVec {
                dst,
                op,
                lhs,
                rhs,
                size,
                elem,
            } => {
                let r = vector::shift_vec(op, &self.vec(lhs), &self.vec(rhs), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VShiftScalar {
                dst,
                op,
                lhs,
                amount,
                size,
                elem,
            } => {
                let r = vector::shift_scalar(
                    op,
                    &self.vec(lhs),
                    self.scalar(amount, OpSize::B8),
                    size,
                    elem,
                );
                self.put_vec(dst, r);
            }
            Instr::VMul {
                dst,
                signed,
                lhs,
                rhs,
                size,
                elem,
            } => {
                let r = vector::mul(signed, &self.vec(lhs), &self.vec(rhs), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VMulL {
                dst,
                signed,
                lhs,
                rhs,
                elem,
                high,
            } => {
                let r = vector::mul_long(signed, &self.vec(lhs), &self.vec(rhs), elem, high);
                self.put_vec(dst, r);
            }
            Instr::VUShrN {
                dst,
                prev,
                src,
                shift,
                elem,
                high,
            } => {
                let prev = prev.map(|p| self.vec(p));
                let r = vector::ushr_narrow(prev.as_ref(), &self.vec(src), shift, elem, high);
                self.put_vec(dst, r);
            }
            Instr::VSqxtn {
                dst,
                prev,
                src,
                elem,
                unsigned_result,
                high,
            } => {
                let prev = prev.map(|p| self.vec(p));
                let r = vector::sqxtn(prev.as_ref(), &self.vec(src), elem, unsigned_result, high);
                self.put_vec(dst, r);
            }
            Instr::VExtend {
                dst,
                src,
                elem,
                signed,
                high,
            } => {
                let r = vector::extend(&self.vec(src), elem, signed, high);
                self.put_vec(dst, r);
            }
            Instr::VCvtIntToFloat {
                dst,
                src,
                size,
                elem,
                signed,
            } => {
                let r = vector::cvt_int_to_float(&self.vec(src), size, elem, signed);
                self.put_vec(dst, r);
            }
            Instr::VCvtFloatToInt {
                dst,
                src,
                size,
                elem,
                signed,
            } => {
                let r = vector::cvt_float_to_int(&self.vec(src), size, elem, signed);
                self.put_vec(dst, r);
            }
            Instr::VFCvt { dst, src, src_elem } => {
                self.put_vec(dst, vector::fcvt(&self.vec(src), src_elem));
            }
            Instr::VFArith {
                dst,
                op,
                lhs,
                rhs,
                size,
                elem,
            } => {
                let r = vector::farith(op, &self.vec(lhs), &self.vec(rhs), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VFUnary {
                dst,
                op,
                src,
                size,
                elem,
            } => {
                let r = vector::funary(op, &self.vec(src), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VAddP {
                dst,
                lhs,
                rhs,
                size,
                elem,
            } => {
                let r = vector::addp(&self.vec(lhs), &self.vec(rhs), size, elem);
                self.put_vec(dst, r);
            }
            Instr::VZip {
                dst,
                lhs,
                rhs,
                size,
                elem,
                high,
            } => {
                let r = vector::zip(&self.vec(lhs), &self.vec(rhs), size, elem, high);
                self.put_vec(dst, r);
            }
            Instr::VInsElement {
                dst,
                into,
                from,
                dst_index,
                src_index,
                elem,
            } => {
                let r = vector::ins_element(
                    &self.vec(into),
                    &self.vec(from),
                    dst_index as usize,
                    src_index as usize,
                    elem,
                );
                self.put_vec(dst, r);
            }
            Instr::VInsGpr {
                dst,
                into,
                from,
                index,
                elem,
            } => {
                let r = vector::ins_gpr(
                    &self.vec(into),
                    self.scalar(from, OpSize::B8),
                    index as usize,
                    elem,
                );
                self.put_vec(dst, r);
            }
            Instr::VExtractToGpr {
                dst,
                src,
                index,
                elem,
            } => {
                let r = vector::extract_to_gpr(&self.vec(src), index as usize, elem);
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::VExtr {
                dst,
                lhs,
                rhs,
                offset_bytes,
                size,
            } => {
                let r = vector::extr(&self.vec(lhs), &self.vec(rhs), offset_bytes as usize, size);
                self.put_vec(dst, r);
            }
            Instr::VFCmp {
                dst,
                op,
                lhs,
                rhs,
                size,
                elem,
            } => {
                let r = vector::fcmp_lanes(op, &self.vec(lhs), &self.vec(rhs), size, elem);
                self.put_vec(dst, r);
            }

            // Scalar float.
            Instr::FloatFromGpr {
                dst,
                src,
                dst_elem,
                src_size,
                signed,
            } => {
                let r = float::from_gpr(self.scalar(src, src_size), src_size, dst_elem, signed);
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::FloatToGpr {
                dst,
                src,
                elem,
                signed,
            } => {
                let r = float::to_gpr(self.scalar(src, OpSize::B8), elem, signed);
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::FloatFToF {
                dst,
                src,
                src_elem,
                dst_elem,
            } => {
                let r = float::ftof(self.scalar(src, OpSize::B8), src_elem, dst_elem);
                self.put_scalar(dst, OpSize::B8, r);
            }
            Instr::FCmp {
                dst,
                lhs,
                rhs,
                elem,
                flags,
            } => {
                let r = float::fcmp(
                    self.scalar(lhs, OpSize::B8),
                    self.scalar(rhs, OpSize::B8),
                    elem,
                    flags,
                );
                self.put_scalar(dst, OpSize::B8, r);
            }
        }
        Flow::Continue
    }

    fn load_context_at(&mut self, dst: ValueId, offset: usize, size: OpSize) {
        let n = size.bytes();
        let mut buf = [0u8; 16];
        self.state.read_bytes(offset, &mut buf[..n]);
        let slot = self.map.get(dst);
        self.arena.bytes_mut(slot)[..n].copy_from_slice(&buf[..n]);
    }

    fn store_context_at(&mut self, src: ValueId, offset: usize, size: OpSize) {
        let n = size.bytes();
        let mut buf = [0u8; 16];
        buf[..n].copy_from_slice(&self.arena.bytes(self.map.get(src))[..n]);
        self.state.write_bytes(offset, &buf[..n]);
    }
}

/// Monotonic counter standing in for a guest cycle counter.
fn cycle_counter() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}
