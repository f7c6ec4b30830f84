//! Structural invariant checkers
//!
//! Non-mutating walks run between lowering passes so a broken tree is
//! caught next to the pass that broke it. Violations are internal errors:
//! downstream passes assume these invariants unconditionally, so there is
//! no safe local recovery.

use super::tree::{ReactiveFunction, ReactiveScopeBlock, ReactiveTerminal, ReactiveTerminalStatement};
use super::visit::{visit_function, ReactiveVisitor};
use crate::error::{CompileError, CompileResult};
use crate::hir::{BlockId, Instruction, InstructionRange, ScopeId};

/// Run every validator over `func`
pub fn validate_tree(func: &ReactiveFunction) -> CompileResult<()> {
    validate_instructions_within_scopes(func)?;
    validate_break_targets(func)?;
    Ok(())
}

/// Every instruction whose id falls in some scope's range must appear
/// while that scope is open; a stray instruction outside its owning scope
/// means an earlier pass produced an inconsistent tree.
pub fn validate_instructions_within_scopes(func: &ReactiveFunction) -> CompileResult<()> {
    struct CollectRanges {
        ranges: Vec<(ScopeId, InstructionRange)>,
    }
    impl ReactiveVisitor for CollectRanges {
        fn enter_scope(&mut self, block: &ReactiveScopeBlock, _pruned: bool) {
            self.ranges.push((block.scope.id, block.scope.range));
        }
    }

    let mut collector = CollectRanges { ranges: Vec::new() };
    visit_function(&mut collector, func);

    struct Checker {
        ranges: Vec<(ScopeId, InstructionRange)>,
        open: Vec<ScopeId>,
        error: Option<CompileError>,
    }
    impl Checker {
        /// Innermost known scope whose range contains `instruction`
        fn owner(&self, instruction: &Instruction) -> Option<ScopeId> {
            self.ranges
                .iter()
                .filter(|(_, range)| range.contains(instruction.id))
                .min_by_key(|(_, range)| range.len())
                .map(|(id, _)| *id)
        }
    }
    impl ReactiveVisitor for Checker {
        fn enter_scope(&mut self, block: &ReactiveScopeBlock, _pruned: bool) {
            self.open.push(block.scope.id);
        }

        fn exit_scope(&mut self, _block: &ReactiveScopeBlock, _pruned: bool) {
            self.open.pop();
        }

        fn visit_instruction(&mut self, instruction: &Instruction) {
            if self.error.is_some() {
                return;
            }
            if let Some(owner) = self.owner(instruction) {
                if !self.open.contains(&owner) {
                    self.error = Some(
                        CompileError::invariant(
                            "instruction outside its owning scope",
                            instruction.span,
                        )
                        .with_description(format!(
                            "instruction {} is owned by scope {owner} which is not open here",
                            instruction.id
                        )),
                    );
                }
            }
        }
    }

    let mut checker = Checker {
        ranges: collector.ranges,
        open: Vec::new(),
        error: None,
    };
    visit_function(&mut checker, func);
    match checker.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Every break/continue target must name a construct that is open at that
/// point in the walk.
pub fn validate_break_targets(func: &ReactiveFunction) -> CompileResult<()> {
    struct Checker {
        active: Vec<Option<BlockId>>,
        error: Option<CompileError>,
    }
    impl Checker {
        fn check(&mut self, target: BlockId, statement: &ReactiveTerminalStatement) {
            if self.error.is_some() {
                return;
            }
            if !self.active.contains(&Some(target)) {
                self.error = Some(
                    CompileError::invariant("jump to an undeclared label", statement.span)
                        .with_description(format!(
                            "target {target} is not declared by any enclosing construct"
                        )),
                );
            }
        }
    }
    impl ReactiveVisitor for Checker {
        fn enter_terminal(&mut self, statement: &ReactiveTerminalStatement) {
            match &statement.terminal {
                ReactiveTerminal::Break { target, .. } => self.check(*target, statement),
                ReactiveTerminal::Continue { target, .. } => self.check(*target, statement),
                _ => {}
            }
            if statement.terminal.is_labelable() {
                self.active.push(statement.label);
            }
        }

        fn exit_terminal(&mut self, statement: &ReactiveTerminalStatement) {
            if statement.terminal.is_labelable() {
                self.active.pop();
            }
        }
    }

    let mut checker = Checker {
        active: Vec::new(),
        error: None,
    };
    visit_function(&mut checker, func);
    match checker.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
