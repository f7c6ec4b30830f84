//! Basic blocks, phis, and terminals
//!
//! Terminals are structured: branch-like terminals carry their sub-block
//! roles and a `fallthrough` continuation, produced upstream. The
//! structuring step relies on those roles instead of re-deriving loop
//! shapes from scratch.

use super::ids::{BlockId, InstructionId};
use super::instr::Instruction;
use super::place::{Place, Span};

/// A merge point for a value flowing in from multiple predecessors
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    /// The merged binding
    pub place: Place,
    /// Incoming value per predecessor block
    pub operands: Vec<(BlockId, Place)>,
}

/// Whether a goto leaves a loop or continues it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoKind {
    Break,
    Continue,
}

/// One arm of a switch terminal
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` is the default arm
    pub test: Option<Place>,
    pub block: BlockId,
}

/// How a basic block ends
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalKind {
    /// Unconditional edge; `kind` records whether the source construct was
    /// a break or a continue
    Goto { block: BlockId, kind: GotoKind },
    If {
        test: Place,
        consequent: BlockId,
        alternate: Option<BlockId>,
        fallthrough: BlockId,
    },
    Switch {
        test: Place,
        cases: Vec<SwitchCase>,
        fallthrough: BlockId,
    },
    While {
        test: BlockId,
        body: BlockId,
        fallthrough: BlockId,
    },
    DoWhile {
        body: BlockId,
        test: BlockId,
        fallthrough: BlockId,
    },
    For {
        init: BlockId,
        test: BlockId,
        update: Option<BlockId>,
        body: BlockId,
        fallthrough: BlockId,
    },
    ForOf {
        binding: Place,
        iterable: Place,
        body: BlockId,
        fallthrough: BlockId,
    },
    ForIn {
        binding: Place,
        object: Place,
        body: BlockId,
        fallthrough: BlockId,
    },
    Label {
        block: BlockId,
        fallthrough: BlockId,
    },
    Try {
        block: BlockId,
        handler_binding: Option<Place>,
        handler: BlockId,
        fallthrough: BlockId,
    },
    Return { value: Option<Place> },
    Throw { value: Place },
}

/// A block terminal; occupies an instruction id so scopes can span it
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    pub id: InstructionId,
    pub kind: TerminalKind,
    pub span: Span,
}

impl Terminal {
    /// Direct control-flow successors (the edges predecessor lists and the
    /// dominator computation see)
    pub fn successors(&self) -> Vec<BlockId> {
        match &self.kind {
            TerminalKind::Goto { block, .. } => vec![*block],
            TerminalKind::If {
                consequent,
                alternate,
                fallthrough,
                ..
            } => match alternate {
                Some(alternate) => vec![*consequent, *alternate],
                None => vec![*consequent, *fallthrough],
            },
            TerminalKind::Switch {
                cases, fallthrough, ..
            } => {
                let mut succs: Vec<_> = cases.iter().map(|case| case.block).collect();
                if !cases.iter().any(|case| case.test.is_none()) {
                    succs.push(*fallthrough);
                }
                succs
            }
            TerminalKind::While { test, .. } => vec![*test],
            TerminalKind::DoWhile { body, .. } => vec![*body],
            TerminalKind::For { init, .. } => vec![*init],
            TerminalKind::ForOf {
                body, fallthrough, ..
            }
            | TerminalKind::ForIn {
                body, fallthrough, ..
            } => vec![*body, *fallthrough],
            TerminalKind::Label { block, .. } => vec![*block],
            TerminalKind::Try { block, handler, .. } => vec![*block, *handler],
            TerminalKind::Return { .. } | TerminalKind::Throw { .. } => vec![],
        }
    }

    /// The branch condition this terminal selects on, if any
    pub fn test_place(&self) -> Option<&Place> {
        match &self.kind {
            TerminalKind::If { test, .. } | TerminalKind::Switch { test, .. } => Some(test),
            _ => None,
        }
    }

    /// Every place this terminal reads or writes
    pub fn operands(&self) -> Vec<&Place> {
        match &self.kind {
            TerminalKind::If { test, .. } => vec![test],
            TerminalKind::Switch { test, cases, .. } => {
                let mut places = vec![test];
                places.extend(cases.iter().filter_map(|case| case.test.as_ref()));
                places
            }
            TerminalKind::ForOf {
                binding, iterable, ..
            } => vec![iterable, binding],
            TerminalKind::ForIn {
                binding, object, ..
            } => vec![object, binding],
            TerminalKind::Try {
                handler_binding, ..
            } => handler_binding.iter().collect(),
            TerminalKind::Return { value } => value.iter().collect(),
            TerminalKind::Throw { value } => vec![value],
            TerminalKind::Goto { .. }
            | TerminalKind::While { .. }
            | TerminalKind::DoWhile { .. }
            | TerminalKind::For { .. }
            | TerminalKind::Label { .. } => vec![],
        }
    }

    /// Mutable version of [`Terminal::operands`]
    pub fn operands_mut(&mut self) -> Vec<&mut Place> {
        match &mut self.kind {
            TerminalKind::If { test, .. } => vec![test],
            TerminalKind::Switch { test, cases, .. } => {
                let mut places = vec![test];
                places.extend(cases.iter_mut().filter_map(|case| case.test.as_mut()));
                places
            }
            TerminalKind::ForOf {
                binding, iterable, ..
            } => vec![iterable, binding],
            TerminalKind::ForIn {
                binding, object, ..
            } => vec![object, binding],
            TerminalKind::Try {
                handler_binding, ..
            } => handler_binding.iter_mut().collect(),
            TerminalKind::Return { value } => value.iter_mut().collect(),
            TerminalKind::Throw { value } => vec![value],
            TerminalKind::Goto { .. }
            | TerminalKind::While { .. }
            | TerminalKind::DoWhile { .. }
            | TerminalKind::For { .. }
            | TerminalKind::Label { .. } => vec![],
        }
    }
}

/// A sequence of instructions with a single entry and a single exit
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub phis: Vec<Phi>,
    pub instructions: Vec<Instruction>,
    pub terminal: Terminal,
    pub predecessors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId, terminal: Terminal) -> Self {
        Self {
            id,
            phis: Vec::new(),
            instructions: Vec::new(),
            terminal,
            predecessors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::ids::IdentifierId;
    use crate::hir::place::Effect;

    fn place(id: u32) -> Place {
        Place::new(IdentifierId(id), Effect::Read)
    }

    #[test]
    fn test_if_successors() {
        let term = Terminal {
            id: InstructionId(0),
            kind: TerminalKind::If {
                test: place(0),
                consequent: BlockId(1),
                alternate: Some(BlockId(2)),
                fallthrough: BlockId(3),
            },
            span: Span::default(),
        };
        assert_eq!(term.successors(), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn test_if_without_alternate_falls_through() {
        let term = Terminal {
            id: InstructionId(0),
            kind: TerminalKind::If {
                test: place(0),
                consequent: BlockId(1),
                alternate: None,
                fallthrough: BlockId(3),
            },
            span: Span::default(),
        };
        assert_eq!(term.successors(), vec![BlockId(1), BlockId(3)]);
    }

    #[test]
    fn test_switch_without_default_reaches_fallthrough() {
        let term = Terminal {
            id: InstructionId(0),
            kind: TerminalKind::Switch {
                test: place(0),
                cases: vec![SwitchCase {
                    test: Some(place(1)),
                    block: BlockId(1),
                }],
                fallthrough: BlockId(2),
            },
            span: Span::default(),
        };
        assert_eq!(term.successors(), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn test_return_has_no_successors() {
        let term = Terminal {
            id: InstructionId(0),
            kind: TerminalKind::Return { value: None },
            span: Span::default(),
        };
        assert!(term.successors().is_empty());
        assert_eq!(term.operands().len(), 0);
    }

    #[test]
    fn test_for_of_operand_effects() {
        let term = Terminal {
            id: InstructionId(0),
            kind: TerminalKind::ForOf {
                binding: Place::new(IdentifierId(1), Effect::Store),
                iterable: Place::new(IdentifierId(0), Effect::ConditionallyMutateIterator),
                body: BlockId(1),
                fallthrough: BlockId(2),
            },
            span: Span::default(),
        };
        let effects: Vec<_> = term.operands().iter().map(|p| p.effect.unwrap()).collect();
        assert_eq!(
            effects,
            vec![Effect::ConditionallyMutateIterator, Effect::Store]
        );
    }
}
