//! Graph to tree structuring
//!
//! Re-serializes the control-flow graph into a nested statement tree using
//! the structured roles carried on each terminal (branch arms, loop bodies,
//! fallthrough continuations). Every construct is provisionally labeled
//! with its fallthrough block id; label pruning later drops the ones
//! nothing targets. Scope blocks are interleaved afterwards by lining
//! statement id ranges up against the scope ranges.
//!
//! Control flow the roles cannot express (a jump into the middle of an
//! already-serialized region) is a recoverable error: that one function
//! unit is skipped, siblings continue.

use super::tree::{
    BreakKind, ReactiveCase, ReactiveFunction, ReactiveScopeBlock, ReactiveStatement,
    ReactiveTerminal, ReactiveTerminalStatement, ValueBlock,
};
use crate::analysis::ReactiveScope;
use crate::error::{CompileError, CompileResult};
use crate::hir::{
    BasicBlock, BlockId, GotoKind, HirFunction, InstructionId, Span, TerminalKind,
};
use rustc_hash::FxHashSet;

/// Structure `func` into a statement tree and interleave `scopes`
pub fn build_reactive_function(
    func: &HirFunction,
    scopes: Vec<ReactiveScope>,
) -> CompileResult<ReactiveFunction> {
    let mut builder = TreeBuilder {
        func,
        visited: FxHashSet::default(),
        targets: Vec::new(),
    };
    let mut body = builder.build_sequence(func.entry, None)?;
    attach_scopes(&mut body, scopes)?;
    Ok(ReactiveFunction {
        name: func.name.clone(),
        params: func.params.clone(),
        body,
        identifiers: func.identifiers.clone(),
        next_identifier_id: func.next_identifier_id,
        next_instruction_id: func.next_instruction_id,
        span: func.span,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Loop,
    Switch,
    Label,
    Branch,
}

/// One construct currently open during serialization
struct ControlTarget {
    /// The construct's fallthrough block; doubles as its label id
    label: BlockId,
    /// Block a continue edge jumps to, for loops
    continue_from: Option<BlockId>,
    kind: TargetKind,
}

struct TreeBuilder<'a> {
    func: &'a HirFunction,
    visited: FxHashSet<BlockId>,
    targets: Vec<ControlTarget>,
}

impl TreeBuilder<'_> {
    fn block(&self, id: BlockId, span: Span) -> CompileResult<&BasicBlock> {
        self.func
            .block(id)
            .ok_or_else(|| CompileError::invariant("terminal references missing block", span))
    }

    fn enter(&mut self, id: BlockId, span: Span) -> CompileResult<()> {
        if !self.visited.insert(id) {
            return Err(CompileError::unsupported(
                "unsupported control flow",
                span,
            )
            .with_description(format!(
                "block {id} is reachable along more than one serialization path"
            )));
        }
        Ok(())
    }

    /// Serialize the region starting at `start`, stopping (without
    /// serializing it) when flow reaches `stop`.
    fn build_sequence(
        &mut self,
        start: BlockId,
        stop: Option<BlockId>,
    ) -> CompileResult<Vec<ReactiveStatement>> {
        let mut statements = Vec::new();
        let mut current = Some(start);
        while let Some(block_id) = current {
            if Some(block_id) == stop {
                break;
            }
            self.enter(block_id, Span::default())?;
            let block = self.block(block_id, Span::default())?;
            for instruction in &block.instructions {
                statements.push(ReactiveStatement::Instruction(instruction.clone()));
            }
            let span = block.terminal.span;
            current = match block.terminal.kind.clone() {
                TerminalKind::Goto { block: target, kind } => {
                    if Some(target) == stop {
                        // Natural flow out of the region, except a break to
                        // the label block we are directly inside, which is
                        // kept explicit for label pruning to reason about
                        if kind == GotoKind::Break && self.innermost_is_label(target) {
                            statements.push(terminal_statement(
                                ReactiveTerminal::Break {
                                    target,
                                    kind: BreakKind::Unlabeled,
                                },
                                None,
                                span,
                            ));
                        }
                        None
                    } else if let Some(statement) = self.resolve_jump(target, kind, span)? {
                        statements.push(statement);
                        None
                    } else {
                        Some(target)
                    }
                }
                TerminalKind::If {
                    test,
                    consequent,
                    alternate,
                    fallthrough,
                } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: None,
                        kind: TargetKind::Branch,
                    });
                    let consequent = self.build_sequence(consequent, Some(fallthrough))?;
                    let alternate = match alternate {
                        Some(alternate) if alternate != fallthrough => {
                            Some(self.build_sequence(alternate, Some(fallthrough))?)
                        }
                        _ => None,
                    };
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::If {
                            test,
                            consequent,
                            alternate,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::Switch {
                    test,
                    cases,
                    fallthrough,
                } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: None,
                        kind: TargetKind::Switch,
                    });
                    let mut arms = Vec::with_capacity(cases.len());
                    for case in cases {
                        let body = if case.block == fallthrough {
                            Vec::new()
                        } else {
                            self.build_sequence(case.block, Some(fallthrough))?
                        };
                        arms.push(ReactiveCase {
                            test: case.test,
                            body,
                        });
                    }
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::Switch { test, cases: arms },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::While {
                    test,
                    body,
                    fallthrough,
                } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: Some(test),
                        kind: TargetKind::Loop,
                    });
                    let test_block = self.build_loop_test(test, body, span)?;
                    let body = self.build_sequence(body, Some(test))?;
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::While {
                            test: test_block,
                            body,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::DoWhile {
                    body,
                    test,
                    fallthrough,
                } => {
                    let body_entry = body;
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: Some(test),
                        kind: TargetKind::Loop,
                    });
                    let body = self.build_sequence(body, Some(test))?;
                    let test_block = self.build_loop_test(test, body_entry, span)?;
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::DoWhile {
                            body,
                            test: test_block,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::For {
                    init,
                    test,
                    update,
                    body,
                    fallthrough,
                } => {
                    let continue_from = update.unwrap_or(test);
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: Some(continue_from),
                        kind: TargetKind::Loop,
                    });
                    let init = self.build_sequence(init, Some(test))?;
                    let test_block = self.build_loop_test(test, body, span)?;
                    let body = self.build_sequence(body, Some(continue_from))?;
                    let update = match update {
                        Some(update) => Some(self.build_sequence(update, Some(test))?),
                        None => None,
                    };
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::For {
                            init,
                            test: test_block,
                            update,
                            body,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::ForOf {
                    binding,
                    iterable,
                    body,
                    fallthrough,
                } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: Some(block_id),
                        kind: TargetKind::Loop,
                    });
                    let body = self.build_sequence(body, Some(block_id))?;
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::ForOf {
                            binding,
                            iterable,
                            body,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::ForIn {
                    binding,
                    object,
                    body,
                    fallthrough,
                } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: Some(block_id),
                        kind: TargetKind::Loop,
                    });
                    let body = self.build_sequence(body, Some(block_id))?;
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::ForIn {
                            binding,
                            object,
                            body,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::Label { block, fallthrough } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: None,
                        kind: TargetKind::Label,
                    });
                    let body = self.build_sequence(block, Some(fallthrough))?;
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::Label { body },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::Try {
                    block,
                    handler_binding,
                    handler,
                    fallthrough,
                } => {
                    self.targets.push(ControlTarget {
                        label: fallthrough,
                        continue_from: None,
                        kind: TargetKind::Branch,
                    });
                    let body = self.build_sequence(block, Some(fallthrough))?;
                    let handler = self.build_sequence(handler, Some(fallthrough))?;
                    self.targets.pop();
                    statements.push(terminal_statement(
                        ReactiveTerminal::Try {
                            body,
                            handler_binding,
                            handler,
                        },
                        Some(fallthrough),
                        span,
                    ));
                    Some(fallthrough)
                }
                TerminalKind::Return { value } => {
                    statements.push(terminal_statement(
                        ReactiveTerminal::Return { value },
                        None,
                        span,
                    ));
                    None
                }
                TerminalKind::Throw { value } => {
                    statements.push(terminal_statement(
                        ReactiveTerminal::Throw { value },
                        None,
                        span,
                    ));
                    None
                }
            };
        }
        Ok(statements)
    }

    /// Serialize a loop condition region: instruction chains joined by
    /// gotos, ending at the branch that selects `body`.
    fn build_loop_test(
        &mut self,
        test: BlockId,
        body: BlockId,
        span: Span,
    ) -> CompileResult<ValueBlock> {
        let mut statements = Vec::new();
        let mut current = test;
        loop {
            self.enter(current, span)?;
            let block = self.block(current, span)?;
            for instruction in &block.instructions {
                statements.push(ReactiveStatement::Instruction(instruction.clone()));
            }
            match &block.terminal.kind {
                TerminalKind::Goto { block: next, .. } => current = *next,
                TerminalKind::If {
                    test, consequent, ..
                } if *consequent == body => {
                    return Ok(ValueBlock {
                        statements,
                        value: test.clone(),
                    });
                }
                _ => {
                    return Err(CompileError::unsupported(
                        "unsupported loop condition shape",
                        block.terminal.span,
                    ));
                }
            }
        }
    }

    fn innermost_is_label(&self, target: BlockId) -> bool {
        self.targets
            .last()
            .is_some_and(|entry| entry.kind == TargetKind::Label && entry.label == target)
    }

    /// Turn a goto into a break/continue statement if it targets an open
    /// construct; `None` means plain sequential flow.
    fn resolve_jump(
        &self,
        target: BlockId,
        kind: GotoKind,
        span: Span,
    ) -> CompileResult<Option<ReactiveStatement>> {
        if kind == GotoKind::Continue {
            let matched = self
                .targets
                .iter()
                .rposition(|entry| entry.continue_from == Some(target));
            let Some(index) = matched else {
                return Err(CompileError::unsupported(
                    "continue without an enclosing loop",
                    span,
                ));
            };
            let innermost_loop = self
                .targets
                .iter()
                .rposition(|entry| entry.kind == TargetKind::Loop);
            let break_kind = if innermost_loop == Some(index) {
                BreakKind::Unlabeled
            } else {
                BreakKind::Labeled
            };
            return Ok(Some(terminal_statement(
                ReactiveTerminal::Continue {
                    target: self.targets[index].label,
                    kind: break_kind,
                },
                None,
                span,
            )));
        }

        let matched = self.targets.iter().rposition(|entry| entry.label == target);
        let Some(index) = matched else {
            return Ok(None);
        };
        let innermost_breakable = self.targets.iter().rposition(|entry| {
            matches!(entry.kind, TargetKind::Loop | TargetKind::Switch)
        });
        let break_kind = if innermost_breakable == Some(index) {
            BreakKind::Unlabeled
        } else {
            BreakKind::Labeled
        };
        Ok(Some(terminal_statement(
            ReactiveTerminal::Break {
                target,
                kind: break_kind,
            },
            None,
            span,
        )))
    }
}

fn terminal_statement(
    terminal: ReactiveTerminal,
    label: Option<BlockId>,
    span: Span,
) -> ReactiveStatement {
    ReactiveStatement::Terminal(ReactiveTerminalStatement {
        terminal,
        label,
        span,
    })
}

/// Wrap runs of statements in scope blocks, innermost scopes first so that
/// outer scopes wrap the already-grouped inner blocks. Scope ranges nest or
/// are disjoint, so a range that does not line up with one nesting level of
/// the tree is corrupted upstream state, not a structuring limitation.
fn attach_scopes(
    statements: &mut Vec<ReactiveStatement>,
    mut scopes: Vec<ReactiveScope>,
) -> CompileResult<()> {
    scopes.sort_by_key(|scope| scope.range.len());
    for scope in scopes {
        if !attach_scope(statements, &scope) {
            return Err(
                CompileError::invariant("scope range not attachable", scope.span)
                    .with_description(format!(
                        "scope {} covers {:?} which does not align with one nesting level",
                        scope.id, scope.range
                    )),
            );
        }
    }
    Ok(())
}

fn attach_scope(statements: &mut Vec<ReactiveStatement>, scope: &ReactiveScope) -> bool {
    let mut first = None;
    let mut last = None;
    for (index, statement) in statements.iter().enumerate() {
        if statement_overlaps(statement, scope) {
            if first.is_none() {
                first = Some(index);
            }
            last = Some(index);
        }
    }
    let (Some(first), Some(last)) = (first, last) else {
        return false;
    };

    let fully_contained = statements[first..=last]
        .iter()
        .all(|statement| statement_contained(statement, scope));
    if fully_contained {
        let body: Vec<ReactiveStatement> = statements.drain(first..=last).collect();
        statements.insert(
            first,
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope.clone(),
                body,
            }),
        );
        return true;
    }

    if first == last {
        // The range lives inside one nested construct; descend into it
        return match &mut statements[first] {
            ReactiveStatement::Instruction(_) => false,
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                attach_scope(&mut block.body, scope)
            }
            ReactiveStatement::Terminal(terminal) => {
                for body in terminal.terminal.bodies_mut() {
                    if attach_scope(body, scope) {
                        return true;
                    }
                }
                false
            }
        };
    }
    false
}

fn statement_overlaps(statement: &ReactiveStatement, scope: &ReactiveScope) -> bool {
    let mut ids: Vec<InstructionId> = Vec::new();
    statement.collect_instruction_ids(&mut ids);
    ids.iter().any(|id| scope.range.contains(*id))
}

fn statement_contained(statement: &ReactiveStatement, scope: &ReactiveScope) -> bool {
    let mut ids: Vec<InstructionId> = Vec::new();
    statement.collect_instruction_ids(&mut ids);
    ids.iter().all(|id| scope.range.contains(*id))
}
