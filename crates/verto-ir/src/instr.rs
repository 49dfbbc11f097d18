use verto_types::{CondCode, ElemSize, FcmpFlags, FenceKind, OpSize};

use crate::{BlockId, ValueId};

/// Maximum operands gathered for a syscall; dispatch stops at the first
/// `None` argument slot.
pub const MAX_SYSCALL_ARGS: usize = 7;

/// `Break` reason requesting a guest halt. Any other reason is fatal at
/// dispatch.
pub const BREAK_REASON_HALT: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Lshl,
    Lshr,
    Ashr,
    Rol,
    Ror,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MulKind {
    /// Signed, truncating (widening for 16-byte results).
    Smul,
    Umul,
    /// High half of the signed double-width product.
    SmulH,
    UmulH,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DivKind {
    Div,
    UDiv,
    Rem,
    URem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomicOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VBitOp {
    And,
    Or,
    Xor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VArithOp {
    Add,
    Sub,
    UQAdd,
    UQSub,
    SQAdd,
    SQSub,
    SMin,
    SMax,
    UMin,
    UMax,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VShiftOp {
    Shl,
    UShr,
    SShr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VFOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VFUnaryOp {
    Recip,
    Sqrt,
    RSqrt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VFCmpOp {
    Eq,
    Neq,
    Lt,
    Le,
}

/// One lowered IR instruction.
///
/// Scalar results are stored little-endian in the low bytes of the operand
/// slot; vector results occupy the full 16-byte register image. Context
/// offsets and flag indices are literals carried on the instruction, not
/// symbolic register names.
#[derive(Clone, Debug)]
pub enum Instr {
    // --- Control flow ---
    Jump {
        target: BlockId,
    },
    /// Branch on a 64-bit operand tested non-zero.
    CondJump {
        cond: ValueId,
        true_target: BlockId,
        false_target: BlockId,
    },
    ExitFunction,
    /// Advance the guest instruction pointer by a fixed increment.
    EndBlock {
        ip_increment: u64,
    },
    Break {
        reason: u8,
    },
    Fence {
        kind: FenceKind,
    },

    // --- External boundaries ---
    Syscall {
        dst: ValueId,
        args: [Option<ValueId>; MAX_SYSCALL_ARGS],
    },
    CpuId {
        dst: ValueId,
        function: ValueId,
    },

    // --- Constants, moves, debug ---
    Constant {
        dst: ValueId,
        value: u64,
    },
    EntrypointOffset {
        dst: ValueId,
        offset: u64,
    },
    CycleCounter {
        dst: ValueId,
    },
    Mov {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
    },
    VectorZero {
        dst: ValueId,
    },
    Print {
        src: ValueId,
        size: OpSize,
    },

    // --- Guest context access ---
    LoadContext {
        dst: ValueId,
        offset: u32,
        size: OpSize,
    },
    StoreContext {
        src: ValueId,
        offset: u32,
        size: OpSize,
    },
    LoadContextIndexed {
        dst: ValueId,
        index: ValueId,
        base_offset: u32,
        stride: u32,
        size: OpSize,
    },
    StoreContextIndexed {
        src: ValueId,
        index: ValueId,
        base_offset: u32,
        stride: u32,
        size: OpSize,
    },
    LoadFlag {
        dst: ValueId,
        flag: u32,
    },
    /// Masks the source to a single bit before storing.
    StoreFlag {
        src: ValueId,
        flag: u32,
    },

    // --- Guest memory access ---
    LoadMem {
        dst: ValueId,
        addr: ValueId,
        size: OpSize,
    },
    StoreMem {
        addr: ValueId,
        src: ValueId,
        size: OpSize,
    },

    // --- Scalar integer ---
    Alu {
        dst: ValueId,
        op: AluOp,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
    },
    Unary {
        dst: ValueId,
        op: UnaryOp,
        src: ValueId,
        size: OpSize,
    },
    Mul {
        dst: ValueId,
        kind: MulKind,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
    },
    Div {
        dst: ValueId,
        kind: DivKind,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
    },
    /// Double-width dividend built from two same-size halves; only the low
    /// half of the quotient/remainder is stored.
    LongDiv {
        dst: ValueId,
        kind: DivKind,
        lo: ValueId,
        hi: ValueId,
        divisor: ValueId,
        size: OpSize,
    },
    Bfi {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        width: u8,
        lsb: u8,
    },
    Bfe {
        dst: ValueId,
        src: ValueId,
        width: u8,
        lsb: u8,
        size: OpSize,
    },
    Sbfe {
        dst: ValueId,
        src: ValueId,
        width: u8,
        lsb: u8,
    },
    Popcount {
        dst: ValueId,
        src: ValueId,
    },
    /// 0-based index of the lowest set bit; -1 for a zero input.
    FindLsb {
        dst: ValueId,
        src: ValueId,
    },
    FindMsb {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
    },
    /// Returns the operand bit width for a zero input.
    FindTrailingZeros {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
    },
    CountLeadingZeros {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
    },
    /// Byte swap, sizes 2/4/8.
    Rev {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
    },

    // --- Atomic read-modify-write ---
    /// Returns the value observed in memory: `expected` on success, the
    /// conflicting occupant on failure.
    Cas {
        dst: ValueId,
        expected: ValueId,
        desired: ValueId,
        addr: ValueId,
        size: OpSize,
    },
    AtomicRmw {
        op: AtomicOp,
        addr: ValueId,
        src: ValueId,
        size: OpSize,
    },
    AtomicFetchRmw {
        dst: ValueId,
        op: AtomicOp,
        addr: ValueId,
        src: ValueId,
        size: OpSize,
    },
    AtomicSwap {
        dst: ValueId,
        addr: ValueId,
        src: ValueId,
        size: OpSize,
    },

    // --- Comparison / select ---
    Select {
        dst: ValueId,
        cond: CondCode,
        cmp_size: OpSize,
        cmp1: ValueId,
        cmp2: ValueId,
        if_true: ValueId,
        if_false: ValueId,
        size: OpSize,
    },
    GetHostFlag {
        dst: ValueId,
        src: ValueId,
        bit: u8,
    },

    // --- Vector ---
    VCastFromGpr {
        dst: ValueId,
        src: ValueId,
        elem: ElemSize,
    },
    VCreatePair {
        dst: ValueId,
        lo: ValueId,
        hi: ValueId,
        half: OpSize,
    },
    VExtractPair {
        dst: ValueId,
        src: ValueId,
        element: u8,
        half: OpSize,
    },
    VSplat {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    VDupElement {
        dst: ValueId,
        src: ValueId,
        index: u8,
        size: OpSize,
        elem: ElemSize,
    },
    VBit {
        dst: ValueId,
        op: VBitOp,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
    },
    VNot {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
    },
    /// Whole-register logical shift by a byte count (zero-fill).
    VShlBytes {
        dst: ValueId,
        src: ValueId,
        bytes: u8,
        size: OpSize,
    },
    VShrBytes {
        dst: ValueId,
        src: ValueId,
        bytes: u8,
        size: OpSize,
    },
    VArith {
        dst: ValueId,
        op: VArithOp,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    /// Per-lane shift by immediate. Over-width amounts zero-fill, except
    /// arithmetic right shifts which clamp to the sign fill.
    VShiftImm {
        dst: ValueId,
        op: VShiftOp,
        src: ValueId,
        amount: u8,
        size: OpSize,
        elem: ElemSize,
    },
    /// Per-lane shift by the matching lane of `rhs`; over-width wraps to zero
    /// output (sign fill for arithmetic right).
    VShiftVec {
        dst: ValueId,
        op: VShiftOp,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    /// All lanes shifted by one scalar 64-bit amount; over-width zeroes the
    /// register (sign fill for arithmetic right).
    VShiftScalar {
        dst: ValueId,
        op: VShiftOp,
        lhs: ValueId,
        amount: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    VMul {
        dst: ValueId,
        signed: bool,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    /// Widening multiply of the low (or high) half lanes into double-width
    /// lanes; `elem` is the source lane width.
    VMulL {
        dst: ValueId,
        signed: bool,
        lhs: ValueId,
        rhs: ValueId,
        elem: ElemSize,
        high: bool,
    },
    /// Shift right then narrow each lane to half width. `prev` seeds the
    /// untouched half for the `..2` (high) form.
    VUShrN {
        dst: ValueId,
        prev: Option<ValueId>,
        src: ValueId,
        shift: u8,
        elem: ElemSize,
        high: bool,
    },
    /// Saturating narrow to half-width lanes (signed source; unsigned result
    /// range when `unsigned_result`).
    VSqxtn {
        dst: ValueId,
        prev: Option<ValueId>,
        src: ValueId,
        elem: ElemSize,
        unsigned_result: bool,
        high: bool,
    },
    /// Sign/zero extend the low (or high) half lanes to double width.
    VExtend {
        dst: ValueId,
        src: ValueId,
        elem: ElemSize,
        signed: bool,
        high: bool,
    },
    VCvtIntToFloat {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
        elem: ElemSize,
        signed: bool,
    },
    /// Truncates toward zero.
    VCvtFloatToInt {
        dst: ValueId,
        src: ValueId,
        size: OpSize,
        elem: ElemSize,
        signed: bool,
    },
    /// Per-lane float width conversion; `src_elem` is 4 or 8.
    VFCvt {
        dst: ValueId,
        src: ValueId,
        src_elem: ElemSize,
    },
    VFArith {
        dst: ValueId,
        op: VFOp,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    VFUnary {
        dst: ValueId,
        op: VFUnaryOp,
        src: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    /// Pairwise add: adjacent lane pairs of `lhs` then `rhs`.
    VAddP {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
    },
    VZip {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
        high: bool,
    },
    VInsElement {
        dst: ValueId,
        into: ValueId,
        from: ValueId,
        dst_index: u8,
        src_index: u8,
        elem: ElemSize,
    },
    VInsGpr {
        dst: ValueId,
        into: ValueId,
        from: ValueId,
        index: u8,
        elem: ElemSize,
    },
    VExtractToGpr {
        dst: ValueId,
        src: ValueId,
        index: u8,
        elem: ElemSize,
    },
    /// Byte-granularity extract across the `rhs:lhs` concatenation.
    VExtr {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        offset_bytes: u8,
        size: OpSize,
    },
    /// Per-lane float compare producing all-ones / all-zero lane masks.
    VFCmp {
        dst: ValueId,
        op: VFCmpOp,
        lhs: ValueId,
        rhs: ValueId,
        size: OpSize,
        elem: ElemSize,
    },

    // --- Scalar float ---
    FloatFromGpr {
        dst: ValueId,
        src: ValueId,
        dst_elem: ElemSize,
        src_size: OpSize,
        signed: bool,
    },
    /// Truncates toward zero.
    FloatToGpr {
        dst: ValueId,
        src: ValueId,
        elem: ElemSize,
        signed: bool,
    },
    FloatFToF {
        dst: ValueId,
        src: ValueId,
        src_elem: ElemSize,
        dst_elem: ElemSize,
    },
    FCmp {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        elem: ElemSize,
        flags: FcmpFlags,
    },
}

#[inline]
fn vec_alloc(size: OpSize, elem: ElemSize) -> usize {
    let lanes = (size.bytes() / elem.bytes()).max(1);
    size.bytes() * lanes
}

impl Instr {
    /// Destination value and the byte count to reserve for it, or `None` for
    /// ops without a result. The arena clamps the reservation up to its
    /// 16-byte minimum.
    pub fn dest_alloc(&self) -> Option<(ValueId, usize)> {
        use Instr::*;
        Some(match *self {
            Jump { .. }
            | CondJump { .. }
            | ExitFunction
            | EndBlock { .. }
            | Break { .. }
            | Fence { .. }
            | Print { .. }
            | StoreContext { .. }
            | StoreContextIndexed { .. }
            | StoreFlag { .. }
            | StoreMem { .. }
            | AtomicRmw { .. } => return None,

            Syscall { dst, .. }
            | Constant { dst, .. }
            | EntrypointOffset { dst, .. }
            | CycleCounter { dst }
            | LoadFlag { dst, .. }
            | Bfi { dst, .. }
            | Sbfe { dst, .. }
            | Popcount { dst, .. }
            | FindLsb { dst, .. }
            | GetHostFlag { dst, .. } => (dst, 8),

            CpuId { dst, .. } => (dst, 16),
            VectorZero { dst } => (dst, 16),

            Mov { dst, size, .. }
            | LoadContext { dst, size, .. }
            | LoadContextIndexed { dst, size, .. }
            | LoadMem { dst, size, .. }
            | Alu { dst, size, .. }
            | Unary { dst, size, .. }
            | Mul { dst, size, .. }
            | Div { dst, size, .. }
            | LongDiv { dst, size, .. }
            | Bfe { dst, size, .. }
            | FindMsb { dst, size, .. }
            | FindTrailingZeros { dst, size, .. }
            | CountLeadingZeros { dst, size, .. }
            | Rev { dst, size, .. }
            | Cas { dst, size, .. }
            | AtomicFetchRmw { dst, size, .. }
            | AtomicSwap { dst, size, .. }
            | Select { dst, size, .. } => (dst, size.bytes()),

            VCastFromGpr { dst, elem, .. } => (dst, elem.bytes()),
            VCreatePair { dst, half, .. } => (dst, half.bytes() * 2),
            VExtractPair { dst, half, .. } => (dst, half.bytes()),
            VBit { dst, size, .. }
            | VNot { dst, size, .. }
            | VShlBytes { dst, size, .. }
            | VShrBytes { dst, size, .. }
            | VExtr { dst, size, .. } => (dst, size.bytes()),

            VSplat { dst, size, elem, .. }
            | VDupElement { dst, size, elem, .. }
            | VArith { dst, size, elem, .. }
            | VShiftImm { dst, size, elem, .. }
            | VShiftVec { dst, size, elem, .. }
            | VShiftScalar { dst, size, elem, .. }
            | VMul { dst, size, elem, .. }
            | VCvtIntToFloat { dst, size, elem, .. }
            | VCvtFloatToInt { dst, size, elem, .. }
            | VFArith { dst, size, elem, .. }
            | VFUnary { dst, size, elem, .. }
            | VAddP { dst, size, elem, .. }
            | VZip { dst, size, elem, .. }
            | VFCmp { dst, size, elem, .. } => (dst, vec_alloc(size, elem)),

            VMulL { dst, .. }
            | VUShrN { dst, .. }
            | VSqxtn { dst, .. }
            | VExtend { dst, .. }
            | VFCvt { dst, .. }
            | VInsElement { dst, .. }
            | VInsGpr { dst, .. } => (dst, 16),

            VExtractToGpr { dst, elem, .. } => (dst, elem.bytes()),

            FloatFromGpr { dst, dst_elem, .. } => (dst, dst_elem.bytes()),
            FloatToGpr { dst, elem, .. } => (dst, elem.bytes()),
            FloatFToF { dst, dst_elem, .. } => (dst, dst_elem.bytes()),
            FCmp { dst, .. } => (dst, 8),
        })
    }
}
