use verto_types::OpSize;

use crate::{AluOp, Block, BlockId, Function, Instr, ValueId};

/// Incremental construction of a [`Function`].
///
/// Blocks are chained in creation order; a block whose terminator falls
/// through continues at its `next` link. Value ids are assigned
/// monotonically, one per destination-producing instruction.
pub struct FunctionBuilder {
    entry_addr: u64,
    blocks: Vec<Block>,
    current: BlockId,
    next_value: u32,
}

impl FunctionBuilder {
    pub fn new(entry_addr: u64) -> Self {
        let entry = Block {
            id: BlockId(0),
            instrs: Vec::new(),
            next: None,
        };
        FunctionBuilder {
            entry_addr,
            blocks: vec![entry],
            current: BlockId(0),
            next_value: 0,
        }
    }

    /// Appends a fresh block to the chain and returns its id. Does not
    /// change the insertion point.
    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        if let Some(last) = self.blocks.last_mut() {
            last.next = Some(id);
        }
        self.blocks.push(Block {
            id,
            instrs: Vec::new(),
            next: None,
        });
        id
    }

    pub fn switch_to(&mut self, id: BlockId) {
        debug_assert!(id.index() < self.blocks.len());
        self.current = id;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    fn alloc_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    /// Emits a result-producing instruction; the closure receives the freshly
    /// assigned destination id.
    pub fn emit(&mut self, f: impl FnOnce(ValueId) -> Instr) -> ValueId {
        let dst = self.alloc_value();
        let instr = f(dst);
        debug_assert!(matches!(instr.dest_alloc(), Some((d, _)) if d == dst));
        self.blocks[self.current.index()].instrs.push(instr);
        dst
    }

    /// Emits an instruction with no destination.
    pub fn push(&mut self, instr: Instr) {
        debug_assert!(instr.dest_alloc().is_none());
        self.blocks[self.current.index()].instrs.push(instr);
    }

    pub fn constant(&mut self, value: u64) -> ValueId {
        self.emit(|dst| Instr::Constant { dst, value })
    }

    pub fn alu(&mut self, op: AluOp, size: OpSize, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(|dst| Instr::Alu {
            dst,
            op,
            lhs,
            rhs,
            size,
        })
    }

    pub fn load_context(&mut self, offset: u32, size: OpSize) -> ValueId {
        self.emit(|dst| Instr::LoadContext { dst, offset, size })
    }

    pub fn store_context(&mut self, src: ValueId, offset: u32, size: OpSize) {
        self.push(Instr::StoreContext { src, offset, size });
    }

    pub fn load_mem(&mut self, addr: ValueId, size: OpSize) -> ValueId {
        self.emit(|dst| Instr::LoadMem { dst, addr, size })
    }

    pub fn store_mem(&mut self, addr: ValueId, src: ValueId, size: OpSize) {
        self.push(Instr::StoreMem { addr, src, size });
    }

    pub fn jump(&mut self, target: BlockId) {
        self.push(Instr::Jump { target });
    }

    pub fn cond_jump(&mut self, cond: ValueId, true_target: BlockId, false_target: BlockId) {
        self.push(Instr::CondJump {
            cond,
            true_target,
            false_target,
        });
    }

    pub fn end_block(&mut self, ip_increment: u64) {
        self.push(Instr::EndBlock { ip_increment });
    }

    pub fn exit_function(&mut self) {
        self.push(Instr::ExitFunction);
    }

    pub fn finish(self) -> Function {
        Function {
            entry_addr: self.entry_addr,
            blocks: self.blocks,
            entry: BlockId(0),
            value_count: self.next_value,
        }
    }
}
