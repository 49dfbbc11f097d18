use std::sync::Arc;

use verto_cpu_core::interp;
use verto_cpu_core::mem::{HostRegion, MemView, RangeMapper};
use verto_cpu_core::state::CpuState;
use verto_cpu_core::GuestThread;
use verto_ir::{AtomicOp, FunctionBuilder, Instr};
use verto_types::OpSize;

const GUEST_BASE: u64 = 0x10_0000;

fn mapped_thread(region: &Arc<HostRegion>) -> GuestThread {
    GuestThread::new(MemView::Mapped(Arc::new(RangeMapper::new(
        region.clone(),
        GUEST_BASE,
    ))))
}

#[test]
fn unified_mode_loads_through_host_pointers() {
    let region = HostRegion::new(64);
    region.write_u64(16, 0x1122_3344_5566_7788);

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(region.base() as u64 + 16);
    let v = b.load_mem(addr, OpSize::B8);
    b.store_context(v, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    let mut t = GuestThread::new(MemView::Unified);
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 0x1122_3344_5566_7788);
}

#[test]
fn mapped_mode_translates_guest_addresses() {
    let region = Arc::new(HostRegion::new(4096));
    region.write_u64(128, 0xcafe);

    let mut b = FunctionBuilder::new(0);
    let load_addr = b.constant(GUEST_BASE + 128);
    let v = b.load_mem(load_addr, OpSize::B8);
    let store_addr = b.constant(GUEST_BASE + 256);
    b.store_mem(store_addr, v, OpSize::B8);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    assert_eq!(region.read_u64(256), 0xcafe);
}

#[test]
#[should_panic(expected = "untranslatable guest address")]
fn out_of_range_guest_access_is_fatal() {
    let region = Arc::new(HostRegion::new(64));

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(GUEST_BASE + 0x10_0000);
    let v = b.load_mem(addr, OpSize::B8);
    b.store_context(v, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
}

#[test]
fn narrow_store_leaves_neighboring_bytes() {
    let region = Arc::new(HostRegion::new(64));
    region.write_u64(0, 0xffff_ffff_ffff_ffff);

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(GUEST_BASE + 2);
    let v = b.constant(0xab);
    b.store_mem(addr, v, OpSize::B1);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    assert_eq!(region.read_u64(0), 0xffff_ffff_ffab_ffff);
}

#[test]
fn sixteen_byte_copies_move_whole_vectors() {
    let region = Arc::new(HostRegion::new(64));
    let pattern: Vec<u8> = (0u8..16).collect();
    region.write(0, &pattern);

    let mut b = FunctionBuilder::new(0);
    let src = b.constant(GUEST_BASE);
    let v = b.load_mem(src, OpSize::B16);
    let dst = b.constant(GUEST_BASE + 32);
    b.store_mem(dst, v, OpSize::B16);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    let mut out = [0u8; 16];
    region.read(32, &mut out);
    assert_eq!(&out[..], &pattern[..]);
}

#[test]
fn cas_returns_expected_on_success_and_occupant_on_failure() {
    let region = Arc::new(HostRegion::new(64));
    region.write_u64(0, 0x1111);

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(GUEST_BASE);
    let expected = b.constant(0x1111);
    let desired = b.constant(0x2222);
    let first = b.emit(|dst| Instr::Cas {
        dst,
        expected,
        desired,
        addr,
        size: OpSize::B8,
    });
    b.store_context(first, CpuState::gpr_offset(0), OpSize::B8);
    // Second attempt with a stale expectation observes the new occupant.
    let stale = b.constant(0x1111);
    let other = b.constant(0x3333);
    let second = b.emit(|dst| Instr::Cas {
        dst,
        expected: stale,
        desired: other,
        addr,
        size: OpSize::B8,
    });
    b.store_context(second, CpuState::gpr_offset(1), OpSize::B8);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 0x1111);
    assert_eq!(t.state.gprs[1], 0x2222);
    assert_eq!(region.read_u64(0), 0x2222);
}

#[test]
fn fetch_add_returns_the_prior_value() {
    let region = Arc::new(HostRegion::new(64));
    region.write_u64(8, 40);

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(GUEST_BASE + 8);
    let two = b.constant(2);
    let prev = b.emit(|dst| Instr::AtomicFetchRmw {
        dst,
        op: AtomicOp::Add,
        addr,
        src: two,
        size: OpSize::B8,
    });
    b.store_context(prev, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 40);
    assert_eq!(region.read_u64(8), 42);
}

#[test]
fn fire_and_forget_atomics_mutate_without_a_destination() {
    let region = Arc::new(HostRegion::new(64));
    region.write_u64(0, 0b1100);

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(GUEST_BASE);
    let mask = b.constant(0b1010);
    b.push(Instr::AtomicRmw {
        op: AtomicOp::And,
        addr,
        src: mask,
        size: OpSize::B4,
    });
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    assert_eq!(region.read_u64(0), 0b1000);
}

#[test]
fn atomic_swap_exchanges_narrow_words() {
    let region = Arc::new(HostRegion::new(64));
    region.write(4, &7u16.to_le_bytes());

    let mut b = FunctionBuilder::new(0);
    let addr = b.constant(GUEST_BASE + 4);
    let v = b.constant(42);
    let prev = b.emit(|dst| Instr::AtomicSwap {
        dst,
        addr,
        src: v,
        size: OpSize::B2,
    });
    b.store_context(prev, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    let mut t = mapped_thread(&region);
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 7);
    let mut out = [0u8; 2];
    region.read(4, &mut out);
    assert_eq!(u16::from_le_bytes(out), 42);
}
