//! The reactive statement tree
//!
//! The structured form handed to the lowering suite and, finally, to the
//! emitter. Dataflow never runs here; the tree is a faithful
//! re-serialization of the graph's control flow with scope blocks
//! interleaved at the depth computed during scope construction.

use crate::analysis::ReactiveScope;
use crate::hir::{
    BlockId, Identifier, IdentifierId, Instruction, InstructionId, Place, PrettyPrint, ScopeId,
    Span,
};
use rustc_hash::FxHashMap;
use std::fmt::Write;

/// How a break or continue is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// Falls out of the enclosing construct naturally; prints nothing
    Implicit,
    /// Plain `break`/`continue` targeting the innermost construct
    Unlabeled,
    /// Targets an outer construct by label
    Labeled,
}

/// A sub-expression block re-evaluated each time its owner needs the value
/// (loop conditions)
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBlock {
    pub statements: Vec<ReactiveStatement>,
    pub value: Place,
}

/// One arm of a switch statement
#[derive(Debug, Clone, PartialEq)]
pub struct ReactiveCase {
    /// `None` is the default arm
    pub test: Option<Place>,
    pub body: Vec<ReactiveStatement>,
}

/// Structured control flow in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum ReactiveTerminal {
    Break {
        target: BlockId,
        kind: BreakKind,
    },
    Continue {
        target: BlockId,
        kind: BreakKind,
    },
    Return {
        value: Option<Place>,
    },
    Throw {
        value: Place,
    },
    If {
        test: Place,
        consequent: Vec<ReactiveStatement>,
        alternate: Option<Vec<ReactiveStatement>>,
    },
    Switch {
        test: Place,
        cases: Vec<ReactiveCase>,
    },
    While {
        test: ValueBlock,
        body: Vec<ReactiveStatement>,
    },
    DoWhile {
        body: Vec<ReactiveStatement>,
        test: ValueBlock,
    },
    For {
        init: Vec<ReactiveStatement>,
        test: ValueBlock,
        update: Option<Vec<ReactiveStatement>>,
        body: Vec<ReactiveStatement>,
    },
    ForOf {
        binding: Place,
        iterable: Place,
        body: Vec<ReactiveStatement>,
    },
    ForIn {
        binding: Place,
        object: Place,
        body: Vec<ReactiveStatement>,
    },
    Label {
        body: Vec<ReactiveStatement>,
    },
    Try {
        body: Vec<ReactiveStatement>,
        handler_binding: Option<Place>,
        handler: Vec<ReactiveStatement>,
    },
}

impl ReactiveTerminal {
    /// Every nested statement list, in source order
    pub fn bodies(&self) -> Vec<&Vec<ReactiveStatement>> {
        match self {
            ReactiveTerminal::Break { .. }
            | ReactiveTerminal::Continue { .. }
            | ReactiveTerminal::Return { .. }
            | ReactiveTerminal::Throw { .. } => vec![],
            ReactiveTerminal::If {
                consequent,
                alternate,
                ..
            } => {
                let mut bodies = vec![consequent];
                if let Some(alternate) = alternate {
                    bodies.push(alternate);
                }
                bodies
            }
            ReactiveTerminal::Switch { cases, .. } => {
                cases.iter().map(|case| &case.body).collect()
            }
            ReactiveTerminal::While { test, body } => vec![&test.statements, body],
            ReactiveTerminal::DoWhile { body, test } => vec![body, &test.statements],
            ReactiveTerminal::For {
                init,
                test,
                update,
                body,
            } => {
                let mut bodies = vec![init, &test.statements];
                if let Some(update) = update {
                    bodies.push(update);
                }
                bodies.push(body);
                bodies
            }
            ReactiveTerminal::ForOf { body, .. } | ReactiveTerminal::ForIn { body, .. } => {
                vec![body]
            }
            ReactiveTerminal::Label { body } => vec![body],
            ReactiveTerminal::Try { body, handler, .. } => vec![body, handler],
        }
    }

    /// Mutable version of [`ReactiveTerminal::bodies`]
    pub fn bodies_mut(&mut self) -> Vec<&mut Vec<ReactiveStatement>> {
        match self {
            ReactiveTerminal::Break { .. }
            | ReactiveTerminal::Continue { .. }
            | ReactiveTerminal::Return { .. }
            | ReactiveTerminal::Throw { .. } => vec![],
            ReactiveTerminal::If {
                consequent,
                alternate,
                ..
            } => {
                let mut bodies = vec![consequent];
                if let Some(alternate) = alternate {
                    bodies.push(alternate);
                }
                bodies
            }
            ReactiveTerminal::Switch { cases, .. } => {
                cases.iter_mut().map(|case| &mut case.body).collect()
            }
            ReactiveTerminal::While { test, body } => vec![&mut test.statements, body],
            ReactiveTerminal::DoWhile { body, test } => vec![body, &mut test.statements],
            ReactiveTerminal::For {
                init,
                test,
                update,
                body,
            } => {
                let mut bodies = vec![init, &mut test.statements];
                if let Some(update) = update {
                    bodies.push(update);
                }
                bodies.push(body);
                bodies
            }
            ReactiveTerminal::ForOf { body, .. } | ReactiveTerminal::ForIn { body, .. } => {
                vec![body]
            }
            ReactiveTerminal::Label { body } => vec![body],
            ReactiveTerminal::Try { body, handler, .. } => vec![body, handler],
        }
    }

    /// Every place this terminal itself reads or writes (not those of
    /// nested statements)
    pub fn places(&self) -> Vec<&Place> {
        match self {
            ReactiveTerminal::Break { .. }
            | ReactiveTerminal::Continue { .. }
            | ReactiveTerminal::Label { .. } => vec![],
            ReactiveTerminal::Return { value } => value.iter().collect(),
            ReactiveTerminal::Throw { value } => vec![value],
            ReactiveTerminal::If { test, .. } => vec![test],
            ReactiveTerminal::Switch { test, cases } => {
                let mut places = vec![test];
                places.extend(cases.iter().filter_map(|case| case.test.as_ref()));
                places
            }
            ReactiveTerminal::While { test, .. } | ReactiveTerminal::DoWhile { test, .. } => {
                vec![&test.value]
            }
            ReactiveTerminal::For { test, .. } => vec![&test.value],
            ReactiveTerminal::ForOf {
                binding, iterable, ..
            } => vec![iterable, binding],
            ReactiveTerminal::ForIn {
                binding, object, ..
            } => vec![object, binding],
            ReactiveTerminal::Try {
                handler_binding, ..
            } => handler_binding.iter().collect(),
        }
    }

    /// Mutable version of [`ReactiveTerminal::places`]
    pub fn places_mut(&mut self) -> Vec<&mut Place> {
        match self {
            ReactiveTerminal::Break { .. }
            | ReactiveTerminal::Continue { .. }
            | ReactiveTerminal::Label { .. } => vec![],
            ReactiveTerminal::Return { value } => value.iter_mut().collect(),
            ReactiveTerminal::Throw { value } => vec![value],
            ReactiveTerminal::If { test, .. } => vec![test],
            ReactiveTerminal::Switch { test, cases } => {
                let mut places = vec![test];
                places.extend(cases.iter_mut().filter_map(|case| case.test.as_mut()));
                places
            }
            ReactiveTerminal::While { test, .. } | ReactiveTerminal::DoWhile { test, .. } => {
                vec![&mut test.value]
            }
            ReactiveTerminal::For { test, .. } => vec![&mut test.value],
            ReactiveTerminal::ForOf {
                binding, iterable, ..
            } => vec![iterable, binding],
            ReactiveTerminal::ForIn {
                binding, object, ..
            } => vec![object, binding],
            ReactiveTerminal::Try {
                handler_binding, ..
            } => handler_binding.iter_mut().collect(),
        }
    }

    /// Whether this terminal can be the target of a break/continue
    pub fn is_labelable(&self) -> bool {
        matches!(
            self,
            ReactiveTerminal::If { .. }
                | ReactiveTerminal::Switch { .. }
                | ReactiveTerminal::While { .. }
                | ReactiveTerminal::DoWhile { .. }
                | ReactiveTerminal::For { .. }
                | ReactiveTerminal::ForOf { .. }
                | ReactiveTerminal::ForIn { .. }
                | ReactiveTerminal::Label { .. }
                | ReactiveTerminal::Try { .. }
        )
    }
}

/// A terminal plus its optional label
#[derive(Debug, Clone, PartialEq)]
pub struct ReactiveTerminalStatement {
    pub terminal: ReactiveTerminal,
    /// Break/continue target id naming this construct, if any statement
    /// targets it
    pub label: Option<BlockId>,
    pub span: Span,
}

/// A scope together with the statements it owns
#[derive(Debug, Clone, PartialEq)]
pub struct ReactiveScopeBlock {
    pub scope: ReactiveScope,
    pub body: Vec<ReactiveStatement>,
}

/// One statement in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum ReactiveStatement {
    Instruction(Instruction),
    /// An active memoization region
    Scope(ReactiveScopeBlock),
    /// A former region kept for grouping but never memoized
    PrunedScope(ReactiveScopeBlock),
    Terminal(ReactiveTerminalStatement),
}

impl ReactiveStatement {
    /// The multiset of instruction ids contained in this subtree; pruning
    /// and un-pruning scopes must keep it intact
    pub fn collect_instruction_ids(&self, out: &mut Vec<InstructionId>) {
        match self {
            ReactiveStatement::Instruction(instruction) => out.push(instruction.id),
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                for statement in &block.body {
                    statement.collect_instruction_ids(out);
                }
            }
            ReactiveStatement::Terminal(statement) => {
                for body in statement.terminal.bodies() {
                    for nested in body {
                        nested.collect_instruction_ids(out);
                    }
                }
            }
        }
    }

    /// Smallest instruction id in this subtree, used to line statements up
    /// against scope ranges
    pub fn first_instruction_id(&self) -> Option<InstructionId> {
        match self {
            ReactiveStatement::Instruction(instruction) => Some(instruction.id),
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => block
                .body
                .iter()
                .filter_map(|statement| statement.first_instruction_id())
                .min(),
            ReactiveStatement::Terminal(statement) => statement
                .terminal
                .bodies()
                .into_iter()
                .flatten()
                .filter_map(|nested| nested.first_instruction_id())
                .min(),
        }
    }
}

/// The structured function handed to the emitter
#[derive(Debug, Clone)]
pub struct ReactiveFunction {
    pub name: Option<String>,
    pub params: Vec<Place>,
    pub body: Vec<ReactiveStatement>,
    pub identifiers: FxHashMap<IdentifierId, Identifier>,
    pub next_identifier_id: u32,
    /// Synthesized instructions take ids from here, past every scope range
    pub next_instruction_id: u32,
    pub span: Span,
}

impl ReactiveFunction {
    /// Fresh identifier for synthesized bindings
    pub fn alloc_identifier(&mut self, identifier: Identifier) -> IdentifierId {
        let id = IdentifierId::new(self.next_identifier_id);
        self.next_identifier_id += 1;
        let mut identifier = identifier;
        identifier.id = id;
        self.identifiers.insert(id, identifier);
        id
    }

    /// Fresh instruction id for synthesized statements
    pub fn alloc_instruction_id(&mut self) -> InstructionId {
        let id = InstructionId::new(self.next_instruction_id);
        self.next_instruction_id += 1;
        id
    }

    /// Every scope id present anywhere in the tree, active or pruned
    pub fn all_scope_ids(&self) -> Vec<ScopeId> {
        let mut ids = Vec::new();
        collect_scope_ids(&self.body, &mut ids);
        ids
    }
}

fn collect_scope_ids(statements: &[ReactiveStatement], out: &mut Vec<ScopeId>) {
    for statement in statements {
        match statement {
            ReactiveStatement::Instruction(_) => {}
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                out.push(block.scope.id);
                collect_scope_ids(&block.body, out);
            }
            ReactiveStatement::Terminal(terminal) => {
                for body in terminal.terminal.bodies() {
                    collect_scope_ids(body, out);
                }
            }
        }
    }
}

impl PrettyPrint for ReactiveFunction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        writeln!(
            output,
            "fn {}({}) {{",
            self.name.as_deref().unwrap_or("<anonymous>"),
            params.join(", ")
        )
        .unwrap();
        print_statements(&self.body, 1, &mut output);
        output.push_str("}\n");
        output
    }
}

fn print_statements(statements: &[ReactiveStatement], depth: usize, out: &mut String) {
    for statement in statements {
        print_statement(statement, depth, out);
    }
}

fn print_statement(statement: &ReactiveStatement, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match statement {
        ReactiveStatement::Instruction(instruction) => {
            writeln!(out, "{pad}{}", instruction.pretty_print()).unwrap();
        }
        ReactiveStatement::Scope(block) => {
            print_scope(block, "scope", depth, out);
        }
        ReactiveStatement::PrunedScope(block) => {
            print_scope(block, "pruned-scope", depth, out);
        }
        ReactiveStatement::Terminal(terminal) => {
            if let Some(label) = terminal.label {
                writeln!(out, "{pad}{label}:").unwrap();
            }
            print_terminal(&terminal.terminal, depth, out);
        }
    }
}

fn print_scope(block: &ReactiveScopeBlock, kind: &str, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let deps: Vec<String> = block
        .scope
        .dependencies
        .iter()
        .map(|dep| {
            let mut text = dep.identifier.to_string();
            for segment in &dep.path {
                text.push('.');
                text.push_str(segment);
            }
            text
        })
        .collect();
    let mut decls: Vec<String> = block
        .scope
        .declarations
        .keys()
        .map(|id| id.to_string())
        .collect();
    decls.sort();
    writeln!(
        out,
        "{pad}{kind} {} deps=[{}] decls=[{}] {{",
        block.scope.id,
        deps.join(", "),
        decls.join(", ")
    )
    .unwrap();
    print_statements(&block.body, depth + 1, out);
    writeln!(out, "{pad}}}").unwrap();
}

fn print_terminal(terminal: &ReactiveTerminal, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match terminal {
        ReactiveTerminal::Break { target, kind } => {
            writeln!(out, "{pad}break {target} ({kind:?})").unwrap();
        }
        ReactiveTerminal::Continue { target, kind } => {
            writeln!(out, "{pad}continue {target} ({kind:?})").unwrap();
        }
        ReactiveTerminal::Return { value } => match value {
            Some(value) => writeln!(out, "{pad}return {value}").unwrap(),
            None => writeln!(out, "{pad}return").unwrap(),
        },
        ReactiveTerminal::Throw { value } => writeln!(out, "{pad}throw {value}").unwrap(),
        ReactiveTerminal::If {
            test,
            consequent,
            alternate,
        } => {
            writeln!(out, "{pad}if {test} {{").unwrap();
            print_statements(consequent, depth + 1, out);
            if let Some(alternate) = alternate {
                writeln!(out, "{pad}}} else {{").unwrap();
                print_statements(alternate, depth + 1, out);
            }
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::Switch { test, cases } => {
            writeln!(out, "{pad}switch {test} {{").unwrap();
            for case in cases {
                match &case.test {
                    Some(test) => writeln!(out, "{pad}case {test}:").unwrap(),
                    None => writeln!(out, "{pad}default:").unwrap(),
                }
                print_statements(&case.body, depth + 1, out);
            }
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::While { test, body } => {
            writeln!(out, "{pad}while {} {{", test.value).unwrap();
            print_statements(body, depth + 1, out);
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::DoWhile { body, test } => {
            writeln!(out, "{pad}do {{").unwrap();
            print_statements(body, depth + 1, out);
            writeln!(out, "{pad}}} while {}", test.value).unwrap();
        }
        ReactiveTerminal::For { test, body, .. } => {
            writeln!(out, "{pad}for (; {} ;) {{", test.value).unwrap();
            print_statements(body, depth + 1, out);
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::ForOf {
            binding,
            iterable,
            body,
        } => {
            writeln!(out, "{pad}for ({binding} of {iterable}) {{").unwrap();
            print_statements(body, depth + 1, out);
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::ForIn {
            binding,
            object,
            body,
        } => {
            writeln!(out, "{pad}for ({binding} in {object}) {{").unwrap();
            print_statements(body, depth + 1, out);
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::Label { body } => {
            writeln!(out, "{pad}{{").unwrap();
            print_statements(body, depth + 1, out);
            writeln!(out, "{pad}}}").unwrap();
        }
        ReactiveTerminal::Try {
            body,
            handler_binding,
            handler,
        } => {
            writeln!(out, "{pad}try {{").unwrap();
            print_statements(body, depth + 1, out);
            match handler_binding {
                Some(binding) => writeln!(out, "{pad}}} catch ({binding}) {{").unwrap(),
                None => writeln!(out, "{pad}}} catch {{").unwrap(),
            }
            print_statements(handler, depth + 1, out);
            writeln!(out, "{pad}}}").unwrap();
        }
    }
}
