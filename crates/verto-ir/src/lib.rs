//! Lowered IR consumed by the verto interpreter.
//!
//! A [`Function`] is an ordered list of basic blocks reachable from a single
//! entry block. Instructions are in SSA form: each destination is written
//! exactly once, and an operand reference is only valid if the producing
//! instruction has already executed in program order on the current
//! control-flow path. Front ends build functions through [`FunctionBuilder`],
//! which hands out [`ValueId`]s monotonically, so the SSA property holds by
//! construction for straight-line emission.

mod builder;
mod instr;

pub use builder::FunctionBuilder;
pub use instr::{
    AluOp, AtomicOp, DivKind, Instr, MulKind, UnaryOp, VArithOp, VBitOp, VFCmpOp, VFOp, VFUnaryOp,
    VShiftOp, BREAK_REASON_HALT, MAX_SYSCALL_ARGS,
};

/// Identity of an instruction's result, used as the destination-map key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A straight-line run of instructions ending in a control-transfer op.
///
/// `next` is the following block in *program order* (None for the last block),
/// independent of control flow; control flow is expressed only by `Jump` /
/// `CondJump` / `ExitFunction` instructions.
#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    pub instrs: Vec<Instr>,
    pub next: Option<BlockId>,
}

/// One translated guest code region.
#[derive(Clone, Debug)]
pub struct Function {
    /// Guest address this region was translated at; `EntrypointOffset`
    /// results are relative to it.
    pub entry_addr: u64,
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    /// Total number of [`ValueId`]s assigned; sizes the destination map.
    pub value_count: u32,
}

impl Function {
    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }
}
