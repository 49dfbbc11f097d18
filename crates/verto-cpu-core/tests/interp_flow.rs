use std::sync::atomic::Ordering;

use verto_cpu_core::interp;
use verto_cpu_core::mem::MemView;
use verto_cpu_core::state::CpuState;
use verto_cpu_core::GuestThread;
use verto_ir::{FunctionBuilder, Instr, BREAK_REASON_HALT};
use verto_types::OpSize;

fn thread() -> GuestThread {
    GuestThread::new(MemView::Unified)
}

/// Entry branches on `cond`; each arm stores its marker and exits.
fn branch_function(cond_value: u64) -> verto_ir::Function {
    let mut b = FunctionBuilder::new(0);
    let on_true = b.create_block();
    let on_false = b.create_block();

    let cond = b.constant(cond_value);
    b.cond_jump(cond, on_true, on_false);

    b.switch_to(on_true);
    let m1 = b.constant(1);
    b.store_context(m1, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    b.switch_to(on_false);
    let m2 = b.constant(2);
    b.store_context(m2, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    b.finish()
}

#[test]
fn nonzero_condition_takes_the_true_block() {
    let mut t = thread();
    interp::run(&branch_function(0x8000_0000_0000_0000), &mut t);
    assert_eq!(t.state.gprs[0], 1);
}

#[test]
fn zero_condition_takes_the_false_block() {
    let mut t = thread();
    interp::run(&branch_function(0), &mut t);
    assert_eq!(t.state.gprs[0], 2);
}

#[test]
fn jump_skips_the_fallthrough_block() {
    let mut b = FunctionBuilder::new(0);
    let skipped = b.create_block();
    let target = b.create_block();

    b.jump(target);

    b.switch_to(skipped);
    let bad = b.constant(0xbad);
    b.store_context(bad, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    b.switch_to(target);
    let good = b.constant(0x900d);
    b.store_context(good, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    let mut t = thread();
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 0x900d);
}

#[test]
fn blocks_fall_through_in_program_order() {
    let mut b = FunctionBuilder::new(0);
    let second = b.create_block();

    let one = b.constant(1);
    b.store_context(one, CpuState::gpr_offset(0), OpSize::B8);
    // No terminator: execution continues at the next block.

    b.switch_to(second);
    let two = b.constant(2);
    b.store_context(two, CpuState::gpr_offset(1), OpSize::B8);
    b.exit_function();

    let mut t = thread();
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 1);
    assert_eq!(t.state.gprs[1], 2);
}

#[test]
fn end_block_advances_the_instruction_pointer() {
    let mut b = FunctionBuilder::new(0);
    b.end_block(4);
    b.end_block(9);
    b.exit_function();

    let mut t = thread();
    t.state.rip = 0x1000;
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.rip, 0x100d);
}

#[test]
fn halting_break_sets_the_stop_flag_and_quits() {
    let mut b = FunctionBuilder::new(0);
    let unreachable = b.create_block();

    b.push(Instr::Break {
        reason: BREAK_REASON_HALT,
    });

    b.switch_to(unreachable);
    let bad = b.constant(0xbad);
    b.store_context(bad, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();

    let mut t = thread();
    interp::run(&b.finish(), &mut t);
    assert!(t.should_stop.load(Ordering::Relaxed));
    assert_eq!(t.state.gprs[0], 0);
}

#[test]
#[should_panic(expected = "unknown reason")]
fn unknown_break_reason_is_fatal() {
    let mut b = FunctionBuilder::new(0);
    b.push(Instr::Break { reason: 9 });
    let mut t = thread();
    interp::run(&b.finish(), &mut t);
}

#[test]
fn external_stop_request_ends_the_chain_at_a_block_boundary() {
    let mut b = FunctionBuilder::new(0);
    let target = b.create_block();

    // The entry block runs to completion even with the flag raised.
    let one = b.constant(1);
    b.store_context(one, CpuState::gpr_offset(0), OpSize::B8);
    b.jump(target);

    b.switch_to(target);
    let two = b.constant(2);
    b.store_context(two, CpuState::gpr_offset(1), OpSize::B8);
    b.exit_function();

    let mut t = thread();
    t.should_stop.store(true, Ordering::Relaxed);
    interp::run(&b.finish(), &mut t);
    assert_eq!(t.state.gprs[0], 1);
    assert_eq!(t.state.gprs[1], 0);
}

#[test]
fn scratch_is_reset_between_invocations() {
    let mut b = FunctionBuilder::new(0);
    let v = b.load_context(CpuState::gpr_offset(0), OpSize::B8);
    let one = b.constant(1);
    let sum = b.alu(verto_ir::AluOp::Add, OpSize::B8, v, one);
    b.store_context(sum, CpuState::gpr_offset(0), OpSize::B8);
    b.exit_function();
    let f = b.finish();

    let mut t = thread();
    for _ in 0..100 {
        interp::run(&f, &mut t);
    }
    assert_eq!(t.state.gprs[0], 100);
}
