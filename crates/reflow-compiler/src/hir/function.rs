//! Function units in the graph IR
//!
//! A `HirFunction` owns its blocks (in reverse postorder), an identifier
//! table, and the lexical scope boundary ranges supplied by the upstream
//! producer. Id allocators are carried along so the lowering phase can
//! synthesize fresh instructions without colliding with existing ids.

use super::block::BasicBlock;
use super::ids::{BlockId, IdentifierId, InstructionId, InstructionRange};
use super::place::{Identifier, Place, Span};
use rustc_hash::FxHashMap;

/// An externally supplied lexical block-scope boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeBoundary {
    pub range: InstructionRange,
    pub span: Span,
}

/// A function unit in graph form
#[derive(Debug, Clone, PartialEq)]
pub struct HirFunction {
    pub name: Option<String>,
    /// Parameters, in declaration order
    pub params: Vec<Place>,
    /// Blocks in reverse postorder
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    /// All identifiers referenced by this function
    pub identifiers: FxHashMap<IdentifierId, Identifier>,
    /// Lexical block-scope boundaries, outermost-first for nested ranges
    pub scope_boundaries: Vec<ScopeBoundary>,
    /// Next unused identifier id
    pub next_identifier_id: u32,
    /// Next unused instruction id
    pub next_instruction_id: u32,
    /// Next unused block id
    pub next_block_id: u32,
    /// Span of the whole function
    pub span: Span,
    block_map: FxHashMap<BlockId, usize>,
}

impl HirFunction {
    /// Create an empty function shell
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            params: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
            identifiers: FxHashMap::default(),
            scope_boundaries: Vec::new(),
            next_identifier_id: 0,
            next_instruction_id: 0,
            next_block_id: 0,
            span: Span::default(),
            block_map: FxHashMap::default(),
        }
    }

    /// Add a block and return its id
    pub fn add_block(&mut self, block: BasicBlock) -> BlockId {
        let id = block.id;
        self.block_map.insert(id, self.blocks.len());
        self.blocks.push(block);
        id
    }

    /// Get a block by id
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.block_map.get(&id).map(|&idx| &self.blocks[idx])
    }

    /// Get a block by id, mutably
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.block_map
            .get(&id)
            .copied()
            .map(move |idx| &mut self.blocks[idx])
    }

    /// Get an identifier by id
    pub fn identifier(&self, id: IdentifierId) -> Option<&Identifier> {
        self.identifiers.get(&id)
    }

    /// Allocate a fresh identifier id
    pub fn alloc_identifier_id(&mut self) -> IdentifierId {
        let id = IdentifierId(self.next_identifier_id);
        self.next_identifier_id += 1;
        id
    }

    /// Allocate a fresh instruction id
    pub fn alloc_instruction_id(&mut self) -> InstructionId {
        let id = InstructionId(self.next_instruction_id);
        self.next_instruction_id += 1;
        id
    }

    /// Allocate a fresh block id
    pub fn alloc_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        id
    }

    /// Total instruction count (terminals excluded)
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }

    /// Recompute predecessor lists from terminal successors
    pub fn compute_predecessors(&mut self) {
        let edges: Vec<(BlockId, Vec<BlockId>)> = self
            .blocks
            .iter()
            .map(|block| (block.id, block.terminal.successors()))
            .collect();
        for block in &mut self.blocks {
            block.predecessors.clear();
        }
        for (source, successors) in edges {
            for successor in successors {
                if let Some(block) = self.block_mut(successor) {
                    if !block.predecessors.contains(&source) {
                        block.predecessors.push(source);
                    }
                }
            }
        }
    }

    /// Structural sanity check: entry exists and every terminal edge
    /// resolves to a real block
    pub fn validate(&self) -> Result<(), String> {
        if self.blocks.is_empty() {
            return Err("function has no blocks".to_string());
        }
        if self.block(self.entry).is_none() {
            return Err(format!("entry block {} does not exist", self.entry));
        }
        for block in &self.blocks {
            for successor in block.terminal.successors() {
                if self.block(successor).is_none() {
                    return Err(format!(
                        "block {} references non-existent successor {}",
                        block.id, successor
                    ));
                }
            }
        }
        for boundary in &self.scope_boundaries {
            for other in &self.scope_boundaries {
                if boundary.range != other.range
                    && boundary.range.overlaps(other.range)
                    && !boundary.range.encloses(other.range)
                    && !other.range.encloses(boundary.range)
                {
                    return Err(format!(
                        "scope boundaries {} and {} partially overlap",
                        boundary.range, other.range
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::block::{Terminal, TerminalKind};
    use crate::hir::place::Span;

    fn goto(id: u32, target: u32) -> BasicBlock {
        BasicBlock::new(
            BlockId(id),
            Terminal {
                id: InstructionId(100 + id),
                kind: TerminalKind::Goto {
                    block: BlockId(target),
                    kind: crate::hir::block::GotoKind::Break,
                },
                span: Span::default(),
            },
        )
    }

    fn ret(id: u32) -> BasicBlock {
        BasicBlock::new(
            BlockId(id),
            Terminal {
                id: InstructionId(100 + id),
                kind: TerminalKind::Return { value: None },
                span: Span::default(),
            },
        )
    }

    #[test]
    fn test_empty_function_is_invalid() {
        let func = HirFunction::new(None);
        assert!(func.validate().is_err());
    }

    #[test]
    fn test_predecessors() {
        let mut func = HirFunction::new(Some("f".to_string()));
        func.add_block(goto(0, 1));
        func.add_block(ret(1));
        func.compute_predecessors();
        assert!(func.block(BlockId(0)).unwrap().predecessors.is_empty());
        assert_eq!(
            func.block(BlockId(1)).unwrap().predecessors,
            vec![BlockId(0)]
        );
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_dangling_successor_is_invalid() {
        let mut func = HirFunction::new(None);
        func.add_block(goto(0, 9));
        assert!(func.validate().is_err());
    }

    #[test]
    fn test_partially_overlapping_boundaries_rejected() {
        let mut func = HirFunction::new(None);
        func.add_block(ret(0));
        func.scope_boundaries.push(ScopeBoundary {
            range: InstructionRange::new(InstructionId(0), InstructionId(5)),
            span: Span::default(),
        });
        func.scope_boundaries.push(ScopeBoundary {
            range: InstructionRange::new(InstructionId(3), InstructionId(8)),
            span: Span::default(),
        });
        assert!(func.validate().is_err());
    }
}
