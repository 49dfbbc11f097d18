//! Execution core for translated guest code: a reference interpreter over
//! the lowered IR, per-thread operand storage, and the guest-memory access
//! adapter. The guest-address lookup cache lives in `verto-lookup`; native
//! code generation is out of scope here.

pub mod arena;
pub mod backend;
pub mod interp;
pub mod mem;
pub mod state;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::arena::{DestMap, OpdArena};
use crate::mem::MemView;
use crate::state::CpuState;

/// External syscall emulation boundary. The interpreter gathers arguments
/// and stores the 64-bit result; it never interprets syscall numbers.
pub trait SyscallHandler: Send + Sync {
    fn syscall(&self, state: &mut CpuState, args: &[u64]) -> u64;
}

/// External CPU identification boundary.
pub trait CpuIdSource: Send + Sync {
    fn run_function(&self, request: u64) -> [u32; 4];
}

/// Inert handlers for harnesses that never reach a syscall or cpuid.
pub struct NullHandlers;

impl SyscallHandler for NullHandlers {
    fn syscall(&self, _state: &mut CpuState, _args: &[u64]) -> u64 {
        0
    }
}

impl CpuIdSource for NullHandlers {
    fn run_function(&self, _request: u64) -> [u32; 4] {
        [0; 4]
    }
}

/// One guest thread: its architectural state, its memory view, and the
/// interpreter scratch that is reused across invocations but never shared
/// between threads.
pub struct GuestThread {
    pub state: CpuState,
    pub mem: MemView,
    /// Set by `Break`(halt) or an external stop request; observed at block
    /// boundaries.
    pub should_stop: AtomicBool,
    pub syscalls: Arc<dyn SyscallHandler>,
    pub cpuid: Arc<dyn CpuIdSource>,
    pub(crate) arena: OpdArena,
    pub(crate) dest_map: DestMap,
}

impl GuestThread {
    pub fn new(mem: MemView) -> Self {
        Self::with_handlers(mem, Arc::new(NullHandlers), Arc::new(NullHandlers))
    }

    pub fn with_handlers(
        mem: MemView,
        syscalls: Arc<dyn SyscallHandler>,
        cpuid: Arc<dyn CpuIdSource>,
    ) -> Self {
        GuestThread {
            state: CpuState::default(),
            mem,
            should_stop: AtomicBool::new(false),
            syscalls,
            cpuid,
            arena: OpdArena::new(),
            dest_map: DestMap::new(),
        }
    }
}
