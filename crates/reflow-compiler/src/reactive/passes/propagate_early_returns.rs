//! Thread early exits out of memoized regions
//!
//! A return inside a scope cannot be cached directly: on a cache hit the
//! scope body never runs, so the exit has to be replayed from cached state.
//! The rewrite stores the returned value into the scope's exit sentinel,
//! breaks out of a label wrapped around the scope, and re-checks the
//! sentinel after the scope:
//!
//! ```text
//! label L: scope s0 {
//!   sentinel = MARKER
//!   ...
//!   sentinel = value; break L     // was: return value
//! }
//! if (sentinel !== MARKER) return sentinel
//! ```
//!
//! A break or continue that targets a construct outside the scope is the
//! same problem with a different landing site. It stores a jump token
//! naming the target instead of a value, and the guard dispatches on the
//! token before falling back to the return replay:
//!
//! ```text
//!   sentinel = "...break.7"; break L    // was: break bb7
//! }
//! if (sentinel !== MARKER) {
//!   if (sentinel === "...break.7") break bb7
//!   return sentinel
//! }
//! ```
//!
//! The sentinel is declared by the scope, so a cache hit restores it and
//! the guard replays the exit. Scopes are processed innermost-first; a
//! guard synthesized for an inner scope is itself an exit inside the outer
//! scope and is threaded out again by the same rule.

use crate::analysis::{EarlyReturnValue, ScopeDeclaration};
use crate::hir::{
    BinaryOp, BlockId, DeclarationKind, Effect, Identifier, IdentifierId, Instruction,
    InstructionId, InstructionValue, Place, PrimitiveValue, Span,
};
use crate::reactive::tree::{
    BreakKind, ReactiveFunction, ReactiveStatement, ReactiveTerminal, ReactiveTerminalStatement,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Marker the exit sentinel holds while no early exit has fired
pub const EARLY_RETURN_MARKER: &str = "__reflow.earlyReturn";

pub fn propagate_early_returns(func: &mut ReactiveFunction) {
    let mut body = std::mem::take(&mut func.body);
    let mut ctx = Rewriter {
        next_instruction_id: func.next_instruction_id,
        next_identifier_id: func.next_identifier_id,
        identifiers: &mut func.identifiers,
    };
    ctx.process_statements(&mut body);
    func.next_instruction_id = ctx.next_instruction_id;
    func.next_identifier_id = ctx.next_identifier_id;
    func.body = body;
}

/// One break or continue leaving the scope, keyed by its original target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EscapingJump {
    target: BlockId,
    continues: bool,
}

impl EscapingJump {
    /// Token stored in the sentinel; compared by the guard dispatch
    fn token(&self) -> String {
        if self.continues {
            format!("{}.continue.{}", EARLY_RETURN_MARKER, self.target.as_u32())
        } else {
            format!("{}.break.{}", EARLY_RETURN_MARKER, self.target.as_u32())
        }
    }
}

/// How one exit terminal is threaded out of the scope
enum ExitRewrite {
    Return(Option<Place>),
    Jump(EscapingJump),
}

/// What the rewrite found inside one scope, driving the guard shape
#[derive(Default)]
struct RewrittenExits {
    returns: bool,
    jumps: Vec<EscapingJump>,
}

impl RewrittenExits {
    fn record_jump(&mut self, jump: EscapingJump) {
        if !self.jumps.contains(&jump) {
            self.jumps.push(jump);
        }
    }
}

struct Rewriter<'a> {
    next_instruction_id: u32,
    next_identifier_id: u32,
    identifiers: &'a mut FxHashMap<IdentifierId, Identifier>,
}

impl Rewriter<'_> {
    fn alloc_instruction_id(&mut self) -> InstructionId {
        let id = InstructionId(self.next_instruction_id);
        self.next_instruction_id += 1;
        id
    }

    fn alloc_temp(&mut self) -> IdentifierId {
        let id = IdentifierId(self.next_identifier_id);
        self.next_identifier_id += 1;
        self.identifiers.insert(id, Identifier::temporary(id));
        id
    }

    fn process_statements(&mut self, statements: &mut Vec<ReactiveStatement>) {
        let original = std::mem::take(statements);
        for mut statement in original {
            let mut wrap: Option<(EarlyReturnValue, RewrittenExits)> = None;
            match &mut statement {
                ReactiveStatement::Instruction(_) => {}
                ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                    self.process_statements(&mut block.body);
                    // Consumed either way: a marker without a surviving
                    // exit means it was already rewritten or pruned
                    if let Some(early) = block.scope.early_return_value.take() {
                        let mut labels = FxHashSet::default();
                        collect_labels(&block.body, &mut labels);
                        if contains_escaping_exit(&block.body, &labels) {
                            let mut exits = RewrittenExits::default();
                            self.replace_exits(&mut block.body, early, &labels, &mut exits);
                            let init =
                                self.sentinel_store(early, DeclarationKind::Let, early.span);
                            block.body.splice(0..0, init);
                            if let Some(identifier) = self.identifiers.get(&early.value) {
                                block.scope.declarations.insert(
                                    early.value,
                                    ScopeDeclaration {
                                        identifier: identifier.clone(),
                                        scope: block.scope.id,
                                    },
                                );
                            }
                            wrap = Some((early, exits));
                        }
                    }
                }
                ReactiveStatement::Terminal(terminal) => {
                    for body in terminal.terminal.bodies_mut() {
                        self.process_statements(body);
                    }
                }
            }
            match wrap {
                Some((early, exits)) => {
                    statements.push(ReactiveStatement::Terminal(ReactiveTerminalStatement {
                        terminal: ReactiveTerminal::Label {
                            body: vec![statement],
                        },
                        label: Some(early.label),
                        span: early.span,
                    }));
                    statements.extend(self.exit_guard(early, &exits));
                }
                None => statements.push(statement),
            }
        }
    }

    /// `return value` becomes `sentinel = value; break label`; an escaping
    /// break or continue becomes `sentinel = token; break label`
    fn replace_exits(
        &mut self,
        statements: &mut Vec<ReactiveStatement>,
        early: EarlyReturnValue,
        labels: &FxHashSet<BlockId>,
        exits: &mut RewrittenExits,
    ) {
        let original = std::mem::take(statements);
        for mut statement in original {
            match &mut statement {
                ReactiveStatement::Instruction(_) => {}
                ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                    self.replace_exits(&mut block.body, early, labels, exits);
                }
                ReactiveStatement::Terminal(terminal) => {
                    let exit = match &terminal.terminal {
                        ReactiveTerminal::Return { value } => {
                            Some(ExitRewrite::Return(value.clone()))
                        }
                        ReactiveTerminal::Break { target, .. } if !labels.contains(target) => {
                            Some(ExitRewrite::Jump(EscapingJump {
                                target: *target,
                                continues: false,
                            }))
                        }
                        ReactiveTerminal::Continue { target, .. } if !labels.contains(target) => {
                            Some(ExitRewrite::Jump(EscapingJump {
                                target: *target,
                                continues: true,
                            }))
                        }
                        _ => None,
                    };
                    match exit {
                        Some(ExitRewrite::Return(value)) => {
                            let span = terminal.span;
                            let stored = match value {
                                Some(place) => place,
                                None => {
                                    let undefined = self.alloc_temp();
                                    statements.push(self.instruction_statement(
                                        Some(Place::new(undefined, Effect::Store)),
                                        InstructionValue::Primitive {
                                            value: PrimitiveValue::Undefined,
                                        },
                                        span,
                                    ));
                                    Place::new(undefined, Effect::Read)
                                }
                            };
                            exits.returns = true;
                            statements.extend(self.store_and_break(early, stored, span));
                            continue;
                        }
                        Some(ExitRewrite::Jump(jump)) => {
                            exits.record_jump(jump);
                            let span = terminal.span;
                            let token = self.token_place(jump, span, statements);
                            statements.extend(self.store_and_break(early, token, span));
                            continue;
                        }
                        None => {
                            for body in terminal.terminal.bodies_mut() {
                                self.replace_exits(body, early, labels, exits);
                            }
                        }
                    }
                }
            }
            statements.push(statement);
        }
    }

    /// Materialize a jump token string and return a place reading it
    fn token_place(
        &mut self,
        jump: EscapingJump,
        span: Span,
        statements: &mut Vec<ReactiveStatement>,
    ) -> Place {
        let token = self.alloc_temp();
        statements.push(self.instruction_statement(
            Some(Place::new(token, Effect::Store)),
            InstructionValue::Primitive {
                value: PrimitiveValue::String(jump.token()),
            },
            span,
        ));
        Place::new(token, Effect::Read)
    }

    /// `sentinel = value; break label`
    fn store_and_break(
        &mut self,
        early: EarlyReturnValue,
        value: Place,
        span: Span,
    ) -> Vec<ReactiveStatement> {
        vec![
            self.instruction_statement(
                None,
                InstructionValue::StoreLocal {
                    lvalue: Place::new(early.value, Effect::Store),
                    value,
                    kind: DeclarationKind::Reassign,
                },
                span,
            ),
            ReactiveStatement::Terminal(ReactiveTerminalStatement {
                terminal: ReactiveTerminal::Break {
                    target: early.label,
                    kind: BreakKind::Labeled,
                },
                label: None,
                span,
            }),
        ]
    }

    /// `sentinel = MARKER` with the given declaration kind
    fn sentinel_store(
        &mut self,
        early: EarlyReturnValue,
        kind: DeclarationKind,
        span: Span,
    ) -> Vec<ReactiveStatement> {
        let marker = self.alloc_temp();
        vec![
            self.instruction_statement(
                Some(Place::new(marker, Effect::Store)),
                InstructionValue::Primitive {
                    value: PrimitiveValue::String(EARLY_RETURN_MARKER.to_string()),
                },
                span,
            ),
            self.instruction_statement(
                None,
                InstructionValue::StoreLocal {
                    lvalue: Place::new(early.value, Effect::Store),
                    value: Place::new(marker, Effect::Read),
                    kind,
                },
                span,
            ),
        ]
    }

    /// The replay after the labeled scope: dispatch on each jump token,
    /// then `return sentinel` if any return was rewritten
    fn exit_guard(
        &mut self,
        early: EarlyReturnValue,
        exits: &RewrittenExits,
    ) -> Vec<ReactiveStatement> {
        let span = early.span;

        let mut consequent = Vec::new();
        for jump in &exits.jumps {
            let token = self.token_place(*jump, span, &mut consequent);
            let matched = self.alloc_temp();
            consequent.push(self.instruction_statement(
                Some(Place::new(matched, Effect::Store)),
                InstructionValue::Binary {
                    op: BinaryOp::Eq,
                    left: Place::new(early.value, Effect::Read),
                    right: token,
                },
                span,
            ));
            let replay = if jump.continues {
                ReactiveTerminal::Continue {
                    target: jump.target,
                    kind: BreakKind::Labeled,
                }
            } else {
                ReactiveTerminal::Break {
                    target: jump.target,
                    kind: BreakKind::Labeled,
                }
            };
            consequent.push(ReactiveStatement::Terminal(ReactiveTerminalStatement {
                terminal: ReactiveTerminal::If {
                    test: Place::new(matched, Effect::Read),
                    consequent: vec![ReactiveStatement::Terminal(ReactiveTerminalStatement {
                        terminal: replay,
                        label: None,
                        span,
                    })],
                    alternate: None,
                },
                label: None,
                span,
            }));
        }
        if exits.returns {
            consequent.push(ReactiveStatement::Terminal(ReactiveTerminalStatement {
                terminal: ReactiveTerminal::Return {
                    value: Some(Place::new(early.value, Effect::Read)),
                },
                label: None,
                span,
            }));
        }

        let marker = self.alloc_temp();
        let comparison = self.alloc_temp();
        vec![
            self.instruction_statement(
                Some(Place::new(marker, Effect::Store)),
                InstructionValue::Primitive {
                    value: PrimitiveValue::String(EARLY_RETURN_MARKER.to_string()),
                },
                span,
            ),
            self.instruction_statement(
                Some(Place::new(comparison, Effect::Store)),
                InstructionValue::Binary {
                    op: BinaryOp::NotEq,
                    left: Place::new(early.value, Effect::Read),
                    right: Place::new(marker, Effect::Read),
                },
                span,
            ),
            ReactiveStatement::Terminal(ReactiveTerminalStatement {
                terminal: ReactiveTerminal::If {
                    test: Place::new(comparison, Effect::Read),
                    consequent,
                    alternate: None,
                },
                label: None,
                span,
            }),
        ]
    }

    fn instruction_statement(
        &mut self,
        lvalue: Option<Place>,
        value: InstructionValue,
        span: Span,
    ) -> ReactiveStatement {
        ReactiveStatement::Instruction(Instruction {
            id: self.alloc_instruction_id(),
            lvalue,
            value,
            span,
        })
    }
}

/// Labels declared anywhere in the subtree; a break can only target an
/// enclosing construct, so a target outside this set leaves the scope
fn collect_labels(statements: &[ReactiveStatement], labels: &mut FxHashSet<BlockId>) {
    for statement in statements {
        match statement {
            ReactiveStatement::Instruction(_) => {}
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                collect_labels(&block.body, labels);
            }
            ReactiveStatement::Terminal(terminal) => {
                if let Some(label) = terminal.label {
                    labels.insert(label);
                }
                for body in terminal.terminal.bodies() {
                    collect_labels(body, labels);
                }
            }
        }
    }
}

fn contains_escaping_exit(statements: &[ReactiveStatement], labels: &FxHashSet<BlockId>) -> bool {
    statements.iter().any(|statement| match statement {
        ReactiveStatement::Instruction(_) => false,
        ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
            contains_escaping_exit(&block.body, labels)
        }
        ReactiveStatement::Terminal(terminal) => match &terminal.terminal {
            ReactiveTerminal::Return { .. } => true,
            ReactiveTerminal::Break { target, .. } | ReactiveTerminal::Continue { target, .. } => {
                !labels.contains(target)
            }
            _ => terminal
                .terminal
                .bodies()
                .into_iter()
                .any(|body| contains_escaping_exit(body, labels)),
        },
    })
}
