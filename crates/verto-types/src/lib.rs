//! Shared leaf types for the verto IR and interpreter.
//!
//! Everything here is a plain enum or flag set with no behavior beyond
//! width/mask math, so the IR crate and the interpreter can agree on operand
//! domains without depending on each other.

use bitflags::bitflags;

/// Byte width of a scalar operand or of a whole vector register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpSize {
    B1,
    B2,
    B4,
    B8,
    B16,
}

impl OpSize {
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            OpSize::B1 => 1,
            OpSize::B2 => 2,
            OpSize::B4 => 4,
            OpSize::B8 => 8,
            OpSize::B16 => 16,
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// All-ones mask at this width, as a 64-bit value.
    ///
    /// `B16` saturates to a full 64-bit mask; 128-bit operations that need
    /// the real mask work on `u128` directly.
    #[inline]
    pub const fn mask(self) -> u64 {
        match self {
            OpSize::B1 => 0xFF,
            OpSize::B2 => 0xFFFF,
            OpSize::B4 => 0xFFFF_FFFF,
            OpSize::B8 | OpSize::B16 => u64::MAX,
        }
    }

    #[inline]
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(OpSize::B1),
            2 => Some(OpSize::B2),
            4 => Some(OpSize::B4),
            8 => Some(OpSize::B8),
            16 => Some(OpSize::B16),
            _ => None,
        }
    }
}

/// Byte width of one vector lane.
///
/// Kept separate from [`OpSize`] so a 16-byte vector op with 4-byte lanes
/// reads as `size: OpSize::B16, elem: ElemSize::E4` at use sites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElemSize {
    E1,
    E2,
    E4,
    E8,
}

impl ElemSize {
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            ElemSize::E1 => 1,
            ElemSize::E2 => 2,
            ElemSize::E4 => 4,
            ElemSize::E8 => 8,
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    #[inline]
    pub const fn mask(self) -> u64 {
        match self {
            ElemSize::E1 => 0xFF,
            ElemSize::E2 => 0xFFFF,
            ElemSize::E4 => 0xFFFF_FFFF,
            ElemSize::E8 => u64::MAX,
        }
    }

    /// Lane width doubled, for widening multiplies and extends.
    #[inline]
    pub const fn widened(self) -> Option<ElemSize> {
        match self {
            ElemSize::E1 => Some(ElemSize::E2),
            ElemSize::E2 => Some(ElemSize::E4),
            ElemSize::E4 => Some(ElemSize::E8),
            ElemSize::E8 => None,
        }
    }

    /// Lane width halved, for narrowing packs.
    #[inline]
    pub const fn narrowed(self) -> Option<ElemSize> {
        match self {
            ElemSize::E1 => None,
            ElemSize::E2 => Some(ElemSize::E1),
            ElemSize::E4 => Some(ElemSize::E2),
            ElemSize::E8 => Some(ElemSize::E4),
        }
    }
}

/// Hardware-style condition code evaluated by `Select`.
///
/// Integer codes compare two operands at the instruction's compare size;
/// float codes reinterpret the operand bits as IEEE-754 values of that size
/// and fold NaN handling into the predicate itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CondCode {
    Eq,
    Neq,
    Sge,
    Slt,
    Sgt,
    Sle,
    Uge,
    Ult,
    Ugt,
    Ule,
    /// Float: less-than or unordered.
    Flu,
    /// Float: greater-or-equal, ordered.
    Fge,
    /// Float: less-or-equal or unordered.
    Fleu,
    /// Float: greater-than, ordered.
    Fgt,
    /// Float: unordered (either operand NaN).
    Fu,
    /// Float: not unordered.
    Fnu,
}

/// Memory-barrier kind carried on a `Fence` op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FenceKind {
    Load,
    Store,
    LoadStore,
}

/// Guest register class for indexed context access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegClass {
    Gpr,
    Vector,
}

bitflags! {
    /// Predicate bits requested from / produced by the scalar `FCmp` op.
    ///
    /// Each bit is requested independently and set independently in the
    /// result mask; `LT` and `EQ` are also set when the compare is unordered,
    /// matching the condition-flag packing the translated guest code expects.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FcmpFlags: u32 {
        const LT = 1 << 0;
        const UNORDERED = 1 << 1;
        const EQ = 1 << 2;
    }
}
