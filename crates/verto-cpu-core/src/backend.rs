//! The backend seam between the translation front end and an execution
//! engine. Native code generators implement the same trait; the interpreter
//! is the reference engine, whose "compilation" is just handing the IR back.

use std::sync::Arc;

use tracing::debug;
use verto_ir::Function;

use crate::interp;
use crate::GuestThread;

/// A translated region ready for execution by the backend that produced it.
pub struct CompiledBlock {
    pub entry_addr: u64,
    pub function: Arc<Function>,
}

pub trait CpuBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether executing this backend's output still walks IR operands (true
    /// for the interpreter, false once code is native).
    fn needs_operand_dispatch(&self) -> bool;

    fn compile(&self, function: Arc<Function>) -> CompiledBlock;

    /// Run to block-chain completion or a halting `Break`; never yields
    /// mid-invocation.
    fn execute(&self, block: &CompiledBlock, thread: &mut GuestThread);
}

pub struct InterpreterBackend;

impl CpuBackend for InterpreterBackend {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn needs_operand_dispatch(&self) -> bool {
        true
    }

    fn compile(&self, function: Arc<Function>) -> CompiledBlock {
        debug!(entry = format_args!("{:#x}", function.entry_addr), "compile");
        CompiledBlock {
            entry_addr: function.entry_addr,
            function,
        }
    }

    fn execute(&self, block: &CompiledBlock, thread: &mut GuestThread) {
        interp::run(&block.function, thread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verto_ir::FunctionBuilder;

    #[test]
    fn interpreter_compile_is_the_identity() {
        let f = Arc::new(FunctionBuilder::new(0x7000).finish());
        let backend = InterpreterBackend;
        assert_eq!(backend.name(), "interpreter");
        assert!(backend.needs_operand_dispatch());
        let block = backend.compile(f.clone());
        assert_eq!(block.entry_addr, 0x7000);
        assert!(Arc::ptr_eq(&block.function, &f));
    }
}
