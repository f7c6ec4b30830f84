//! Shared traversal engine for the statement tree
//!
//! Every lowering pass and validator is a bundle of hooks over this one
//! engine rather than a hand-rolled walk. Traversal is deterministic and
//! single-pass: statement containers are walked in order, and a scope or
//! terminal's enter/exit hooks bracket the traversal of its own subtree so
//! passes can push and pop per-scope state cleanly. Replacement nodes are
//! not re-traversed; each node is visited, and rewritten if applicable,
//! exactly once.

use super::tree::{
    ReactiveFunction, ReactiveScopeBlock, ReactiveStatement, ReactiveTerminalStatement,
};
use crate::hir::{Instruction, Place};

/// Read-only hooks; the implementor carries its own state
pub trait ReactiveVisitor {
    fn visit_instruction(&mut self, _instruction: &Instruction) {}

    fn visit_place(&mut self, _place: &Place) {}

    fn enter_scope(&mut self, _block: &ReactiveScopeBlock, _pruned: bool) {}

    fn exit_scope(&mut self, _block: &ReactiveScopeBlock, _pruned: bool) {}

    fn enter_terminal(&mut self, _terminal: &ReactiveTerminalStatement) {}

    fn exit_terminal(&mut self, _terminal: &ReactiveTerminalStatement) {}
}

/// Walk `func` top to bottom with `visitor`
pub fn visit_function<V: ReactiveVisitor + ?Sized>(visitor: &mut V, func: &ReactiveFunction) {
    for param in &func.params {
        visitor.visit_place(param);
    }
    visit_statements(visitor, &func.body);
}

/// Walk one statement list
pub fn visit_statements<V: ReactiveVisitor + ?Sized>(
    visitor: &mut V,
    statements: &[ReactiveStatement],
) {
    for statement in statements {
        match statement {
            ReactiveStatement::Instruction(instruction) => {
                visitor.visit_instruction(instruction);
                for place in instruction.value.operands() {
                    visitor.visit_place(place);
                }
                for place in instruction.lvalues() {
                    visitor.visit_place(place);
                }
            }
            ReactiveStatement::Scope(block) => {
                visitor.enter_scope(block, false);
                visit_statements(visitor, &block.body);
                visitor.exit_scope(block, false);
            }
            ReactiveStatement::PrunedScope(block) => {
                visitor.enter_scope(block, true);
                visit_statements(visitor, &block.body);
                visitor.exit_scope(block, true);
            }
            ReactiveStatement::Terminal(terminal) => {
                visitor.enter_terminal(terminal);
                for place in terminal.terminal.places() {
                    visitor.visit_place(place);
                }
                for body in terminal.terminal.bodies() {
                    visit_statements(visitor, body);
                }
                visitor.exit_terminal(terminal);
            }
        }
    }
}

/// Result of one transform hook
#[derive(Debug)]
pub enum Transformed {
    /// Leave the node as rewritten in place (or untouched)
    Keep,
    /// Substitute one statement for the node
    Replace(ReactiveStatement),
    /// Substitute a sequence of statements for the node
    ReplaceMany(Vec<ReactiveStatement>),
    /// Drop the node entirely
    Remove,
}

/// Rewriting hooks; children are transformed before the node's own
/// transform hook runs, so a hook sees its subtree in final form
pub trait ReactiveTransform {
    fn enter_scope(&mut self, _block: &mut ReactiveScopeBlock, _pruned: bool) {}

    fn exit_scope(&mut self, _block: &mut ReactiveScopeBlock, _pruned: bool) {}

    fn enter_terminal(&mut self, _terminal: &mut ReactiveTerminalStatement) {}

    fn exit_terminal(&mut self, _terminal: &mut ReactiveTerminalStatement) {}

    fn transform_instruction(&mut self, _instruction: &mut Instruction) -> Transformed {
        Transformed::Keep
    }

    fn transform_scope(&mut self, _block: &mut ReactiveScopeBlock, _pruned: bool) -> Transformed {
        Transformed::Keep
    }

    fn transform_terminal(&mut self, _terminal: &mut ReactiveTerminalStatement) -> Transformed {
        Transformed::Keep
    }
}

/// Rewrite `func` in place with `transform`
pub fn transform_function<T: ReactiveTransform + ?Sized>(
    transform: &mut T,
    func: &mut ReactiveFunction,
) {
    transform_statements(transform, &mut func.body);
}

/// Rewrite one statement list in place
pub fn transform_statements<T: ReactiveTransform + ?Sized>(
    transform: &mut T,
    statements: &mut Vec<ReactiveStatement>,
) {
    let original = std::mem::take(statements);
    statements.reserve(original.len());
    for mut statement in original {
        let result = match &mut statement {
            ReactiveStatement::Instruction(instruction) => {
                transform.transform_instruction(instruction)
            }
            ReactiveStatement::Scope(block) => {
                transform.enter_scope(block, false);
                transform_statements(transform, &mut block.body);
                transform.exit_scope(block, false);
                transform.transform_scope(block, false)
            }
            ReactiveStatement::PrunedScope(block) => {
                transform.enter_scope(block, true);
                transform_statements(transform, &mut block.body);
                transform.exit_scope(block, true);
                transform.transform_scope(block, true)
            }
            ReactiveStatement::Terminal(terminal) => {
                transform.enter_terminal(terminal);
                for body in terminal.terminal.bodies_mut() {
                    transform_statements(transform, body);
                }
                transform.exit_terminal(terminal);
                transform.transform_terminal(terminal)
            }
        };
        match result {
            Transformed::Keep => statements.push(statement),
            Transformed::Replace(replacement) => statements.push(replacement),
            Transformed::ReplaceMany(replacements) => statements.extend(replacements),
            Transformed::Remove => {}
        }
    }
}
