//! Graph construction helpers
//!
//! Utilities for producing `HirFunction` values directly, used by upstream
//! producers and by tests. Instruction ids are handed out in emission
//! order, so scope boundaries recorded through `begin_scope`/`end_scope`
//! line up with program order.

use super::block::{BasicBlock, Phi, Terminal, TerminalKind};
use super::function::{HirFunction, ScopeBoundary};
use super::ids::{BlockId, IdentifierId, InstructionId, InstructionRange};
use super::instr::{Instruction, InstructionValue};
use super::place::{Effect, Identifier, Place, Span};
use rustc_hash::FxHashMap;

struct PendingBlock {
    id: BlockId,
    phis: Vec<Phi>,
    instructions: Vec<Instruction>,
    terminal: Option<Terminal>,
}

/// Marks the start of a lexical scope boundary
#[must_use = "pass the handle to end_scope to record the boundary"]
pub struct ScopeHandle {
    start: InstructionId,
}

/// Builder that simplifies graph construction
pub struct FunctionBuilder {
    func: HirFunction,
    blocks: Vec<PendingBlock>,
    block_index: FxHashMap<BlockId, usize>,
    current: BlockId,
}

impl FunctionBuilder {
    /// Create a builder with an empty entry block
    pub fn new(name: impl Into<String>) -> Self {
        let mut builder = Self {
            func: HirFunction::new(Some(name.into())),
            blocks: Vec::new(),
            block_index: FxHashMap::default(),
            current: BlockId(0),
        };
        let entry = builder.create_block();
        builder.func.entry = entry;
        builder.current = entry;
        builder
    }

    /// Declare a named identifier
    pub fn named(&mut self, name: impl Into<String>) -> IdentifierId {
        let id = self.func.alloc_identifier_id();
        self.func
            .identifiers
            .insert(id, Identifier::named(id, name));
        id
    }

    /// Declare a compiler temporary
    pub fn temp(&mut self) -> IdentifierId {
        let id = self.func.alloc_identifier_id();
        self.func.identifiers.insert(id, Identifier::temporary(id));
        id
    }

    /// Declare a named parameter
    pub fn param(&mut self, name: impl Into<String>) -> IdentifierId {
        let id = self.named(name);
        self.func.params.push(Place::new(id, Effect::Freeze));
        id
    }

    /// Build a place referencing `id` with the given effect
    pub fn place(&self, id: IdentifierId, effect: Effect) -> Place {
        Place::new(id, effect)
    }

    /// Read reference
    pub fn read(&self, id: IdentifierId) -> Place {
        self.place(id, Effect::Read)
    }

    /// Capturing reference
    pub fn capture(&self, id: IdentifierId) -> Place {
        self.place(id, Effect::Capture)
    }

    /// Mutating reference
    pub fn mutate(&self, id: IdentifierId) -> Place {
        self.place(id, Effect::Mutate)
    }

    /// Assignment target reference
    pub fn store(&self, id: IdentifierId) -> Place {
        self.place(id, Effect::Store)
    }

    /// Create a new empty block
    pub fn create_block(&mut self) -> BlockId {
        let id = self.func.alloc_block_id();
        self.block_index.insert(id, self.blocks.len());
        self.blocks.push(PendingBlock {
            id,
            phis: Vec::new(),
            instructions: Vec::new(),
            terminal: None,
        });
        id
    }

    /// Switch to emitting into a different block
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current = block;
    }

    /// The block currently being emitted into
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Emit an instruction producing a fresh temporary; returns its id
    pub fn emit(&mut self, value: InstructionValue) -> IdentifierId {
        let result = self.temp();
        self.emit_into(result, value);
        result
    }

    /// Emit an instruction binding its result to `lvalue`
    pub fn emit_into(&mut self, lvalue: IdentifierId, value: InstructionValue) {
        let id = self.func.alloc_instruction_id();
        let instruction = Instruction {
            id,
            lvalue: Some(Place::new(lvalue, Effect::Store)),
            value,
            span: Span::default(),
        };
        self.push_instruction(instruction);
    }

    /// Emit an instruction evaluated for effect only
    pub fn emit_void(&mut self, value: InstructionValue) {
        let id = self.func.alloc_instruction_id();
        let instruction = Instruction {
            id,
            lvalue: None,
            value,
            span: Span::default(),
        };
        self.push_instruction(instruction);
    }

    fn push_instruction(&mut self, instruction: Instruction) {
        let index = self.block_index[&self.current];
        self.blocks[index].instructions.push(instruction);
    }

    /// Add a phi to the current block
    pub fn add_phi(&mut self, place: Place, operands: Vec<(BlockId, Place)>) {
        let index = self.block_index[&self.current];
        self.blocks[index].phis.push(Phi { place, operands });
    }

    /// Set the terminal of the current block
    pub fn terminate(&mut self, kind: TerminalKind) {
        let id = self.func.alloc_instruction_id();
        let index = self.block_index[&self.current];
        self.blocks[index].terminal = Some(Terminal {
            id,
            kind,
            span: Span::default(),
        });
    }

    /// Begin a lexical scope boundary at the next instruction id
    pub fn begin_scope(&self) -> ScopeHandle {
        ScopeHandle {
            start: InstructionId(self.func.next_instruction_id),
        }
    }

    /// Close a lexical scope boundary at the next instruction id
    pub fn end_scope(&mut self, handle: ScopeHandle) {
        let end = InstructionId(self.func.next_instruction_id);
        self.func.scope_boundaries.push(ScopeBoundary {
            range: InstructionRange::new(handle.start, end),
            span: Span::default(),
        });
    }

    /// Assemble the function; fails if any block is unterminated
    pub fn finish(mut self) -> Result<HirFunction, String> {
        for pending in std::mem::take(&mut self.blocks) {
            let terminal = pending
                .terminal
                .ok_or_else(|| format!("block {} is not terminated", pending.id))?;
            let mut block = BasicBlock::new(pending.id, terminal);
            block.phis = pending.phis;
            block.instructions = pending.instructions;
            self.func.add_block(block);
        }
        self.func.compute_predecessors();
        self.func.validate()?;
        Ok(self.func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::instr::PrimitiveValue;

    #[test]
    fn test_straight_line_function() {
        let mut b = FunctionBuilder::new("f");
        let props = b.param("props");
        let t = b.emit(InstructionValue::PropertyLoad {
            object: b.read(props),
            property: "x".to_string(),
        });
        b.terminate(TerminalKind::Return {
            value: Some(b.read(t)),
        });
        let func = b.finish().unwrap();
        assert_eq!(func.blocks.len(), 1);
        assert_eq!(func.instruction_count(), 1);
        assert_eq!(func.params.len(), 1);
    }

    #[test]
    fn test_unterminated_block_fails() {
        let mut b = FunctionBuilder::new("f");
        b.emit(InstructionValue::Primitive {
            value: PrimitiveValue::Null,
        });
        assert!(b.finish().is_err());
    }

    #[test]
    fn test_scope_boundary_ids() {
        let mut b = FunctionBuilder::new("f");
        let handle = b.begin_scope();
        let x = b.emit(InstructionValue::Object { properties: vec![] });
        b.end_scope(handle);
        b.terminate(TerminalKind::Return {
            value: Some(b.read(x)),
        });
        let func = b.finish().unwrap();
        assert_eq!(func.scope_boundaries.len(), 1);
        let range = func.scope_boundaries[0].range;
        assert_eq!(range.start, InstructionId(0));
        assert_eq!(range.end, InstructionId(1));
    }
}
