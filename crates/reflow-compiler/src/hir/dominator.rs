//! Dominator tree
//!
//! The upstream producer normally supplies the dominator tree alongside the
//! graph; `compute_dominators` exists so the fixture builder and tests can
//! produce one from scratch. Iterative algorithm over reverse postorder
//! with the usual intersection walk.

use super::function::HirFunction;
use super::ids::BlockId;
use rustc_hash::FxHashMap;

/// Immediate-dominator tree for one function
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: BlockId,
    idom: FxHashMap<BlockId, BlockId>,
}

impl DominatorTree {
    /// Immediate dominator of `block`; the entry maps to itself
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    /// Whether `a` dominates `b` (reflexively)
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            if current == self.entry {
                return false;
            }
            match self.idom(current) {
                Some(parent) => current = parent,
                // Unreachable block: dominated by nothing but itself
                None => return false,
            }
        }
    }
}

/// Compute the dominator tree for `func`.
///
/// Expects `func.blocks` in reverse postorder with predecessor lists
/// populated (the fixture builder guarantees both).
pub fn compute_dominators(func: &HirFunction) -> DominatorTree {
    let order: FxHashMap<BlockId, usize> = func
        .blocks
        .iter()
        .enumerate()
        .map(|(index, block)| (block.id, index))
        .collect();

    let mut idom: FxHashMap<BlockId, BlockId> = FxHashMap::default();
    idom.insert(func.entry, func.entry);

    let mut changed = true;
    while changed {
        changed = false;
        for block in &func.blocks {
            if block.id == func.entry {
                continue;
            }
            // First processed predecessor seeds the intersection
            let mut new_idom: Option<BlockId> = None;
            for &pred in &block.predecessors {
                if !idom.contains_key(&pred) {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &order, pred, current),
                });
            }
            if let Some(new_idom) = new_idom {
                if idom.get(&block.id) != Some(&new_idom) {
                    idom.insert(block.id, new_idom);
                    changed = true;
                }
            }
        }
    }

    DominatorTree {
        entry: func.entry,
        idom,
    }
}

fn intersect(
    idom: &FxHashMap<BlockId, BlockId>,
    order: &FxHashMap<BlockId, usize>,
    a: BlockId,
    b: BlockId,
) -> BlockId {
    let mut a = a;
    let mut b = b;
    while a != b {
        while order[&a] > order[&b] {
            a = idom[&a];
        }
        while order[&b] > order[&a] {
            b = idom[&b];
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::block::{BasicBlock, GotoKind, Terminal, TerminalKind};
    use crate::hir::ids::{IdentifierId, InstructionId};
    use crate::hir::place::{Effect, Place, Span};

    fn block(id: u32, kind: TerminalKind) -> BasicBlock {
        BasicBlock::new(
            BlockId(id),
            Terminal {
                id: InstructionId(100 + id),
                kind,
                span: Span::default(),
            },
        )
    }

    /// entry -> (b1 | b2) -> b3
    fn diamond() -> HirFunction {
        let mut func = HirFunction::new(None);
        func.add_block(block(
            0,
            TerminalKind::If {
                test: Place::new(IdentifierId(0), Effect::Read),
                consequent: BlockId(1),
                alternate: Some(BlockId(2)),
                fallthrough: BlockId(3),
            },
        ));
        func.add_block(block(
            1,
            TerminalKind::Goto {
                block: BlockId(3),
                kind: GotoKind::Break,
            },
        ));
        func.add_block(block(
            2,
            TerminalKind::Goto {
                block: BlockId(3),
                kind: GotoKind::Break,
            },
        ));
        func.add_block(block(3, TerminalKind::Return { value: None }));
        func.compute_predecessors();
        func
    }

    #[test]
    fn test_diamond_idoms() {
        let func = diamond();
        let doms = compute_dominators(&func);
        assert_eq!(doms.idom(BlockId(1)), Some(BlockId(0)));
        assert_eq!(doms.idom(BlockId(2)), Some(BlockId(0)));
        // Join is dominated by the branch, not by either arm
        assert_eq!(doms.idom(BlockId(3)), Some(BlockId(0)));
    }

    #[test]
    fn test_dominates_is_reflexive_and_transitive() {
        let func = diamond();
        let doms = compute_dominators(&func);
        assert!(doms.dominates(BlockId(1), BlockId(1)));
        assert!(doms.dominates(BlockId(0), BlockId(3)));
        assert!(!doms.dominates(BlockId(1), BlockId(3)));
        assert!(!doms.dominates(BlockId(3), BlockId(0)));
    }
}
