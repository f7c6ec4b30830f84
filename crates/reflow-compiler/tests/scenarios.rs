//! End-to-end scenarios through the full compilation pipeline

use reflow_compiler::analysis::{analyze_aliases, build_reactive_scopes, infer_reactive_places};
use reflow_compiler::hir::{
    compute_dominators, GotoKind, PropertyKey, TerminalKind,
};
use reflow_compiler::reactive::tree::ReactiveTerminalStatement;
use reflow_compiler::reactive::validate_tree;
use reflow_compiler::reactive::{BreakKind, ReactiveStatement, ReactiveTerminal};
use reflow_compiler::{
    compile_function, Environment, FunctionBuilder, HirFunction, InstructionValue,
};

fn infer(func: &mut HirFunction) {
    let mut aliases = analyze_aliases(func);
    let doms = compute_dominators(func);
    infer_reactive_places(func, &mut aliases, &doms, &Environment::default())
        .expect("inference failed");
}

/// Walk every statement in the tree, including nested bodies
fn all_statements(statements: &[ReactiveStatement]) -> Vec<&ReactiveStatement> {
    let mut out = Vec::new();
    for statement in statements {
        out.push(statement);
        match statement {
            ReactiveStatement::Instruction(_) => {}
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                out.extend(all_statements(&block.body));
            }
            ReactiveStatement::Terminal(terminal) => {
                for body in terminal.terminal.bodies() {
                    out.extend(all_statements(body));
                }
            }
        }
    }
    out
}

#[test]
fn test_mutation_through_reactive_operand_builds_scope() {
    // const x = {}; x.y = props.y; return x;
    let mut b = FunctionBuilder::new("f");
    let props = b.param("props");
    let handle = b.begin_scope();
    let x = b.named("x");
    b.emit_into(x, InstructionValue::Object { properties: vec![] });
    let loaded = b.emit(InstructionValue::PropertyLoad {
        object: b.read(props),
        property: "y".to_string(),
    });
    b.emit_void(InstructionValue::PropertyStore {
        object: b.mutate(x),
        property: "y".to_string(),
        value: b.capture(loaded),
    });
    b.end_scope(handle);
    b.terminate(TerminalKind::Return {
        value: Some(b.read(x)),
    });
    let mut func = b.finish().expect("build failed");

    infer(&mut func);
    let entry = func.block(func.entry).expect("entry block");
    let returned = entry.terminal.operands();
    assert!(returned[0].reactive, "x should become reactive");

    let scopes = build_reactive_scopes(&mut func);
    assert_eq!(scopes.len(), 1);
    let scope = &scopes[0];
    assert!(scope
        .dependencies
        .iter()
        .any(|dep| dep.identifier == props && dep.path == vec!["y".to_string()]));
    assert!(scope.declarations.contains_key(&x));
}

#[test]
fn test_control_dependence_makes_constant_assignments_reactive() {
    // let x; if (props.cond) { x = 1 } else { x = 2 } return x;
    let mut b = FunctionBuilder::new("f");
    let props = b.param("props");
    let consequent = b.create_block();
    let alternate = b.create_block();
    let join = b.create_block();

    let cond = b.emit(InstructionValue::PropertyLoad {
        object: b.read(props),
        property: "cond".to_string(),
    });
    b.terminate(TerminalKind::If {
        test: b.read(cond),
        consequent,
        alternate: Some(alternate),
        fallthrough: join,
    });

    b.switch_to_block(consequent);
    let x1 = b.emit(InstructionValue::Primitive {
        value: reflow_compiler::hir::PrimitiveValue::Number(1.0),
    });
    b.terminate(TerminalKind::Goto {
        block: join,
        kind: GotoKind::Break,
    });

    b.switch_to_block(alternate);
    let x2 = b.emit(InstructionValue::Primitive {
        value: reflow_compiler::hir::PrimitiveValue::Number(2.0),
    });
    b.terminate(TerminalKind::Goto {
        block: join,
        kind: GotoKind::Break,
    });

    b.switch_to_block(join);
    let x = b.named("x");
    b.add_phi(b.store(x), vec![(consequent, b.read(x1)), (alternate, b.read(x2))]);
    b.terminate(TerminalKind::Return {
        value: Some(b.read(x)),
    });
    let mut func = b.finish().expect("build failed");

    infer(&mut func);
    let phi = &func.block(join).expect("join block").phis[0];
    assert!(
        phi.place.reactive,
        "x should be reactive purely via control dependence"
    );
}

#[test]
fn test_unwrapped_literal_prunes_consuming_scope() {
    // An object literal built outside any scope feeds a scope below it
    let mut b = FunctionBuilder::new("f");
    let props = b.param("props");
    let loaded = b.emit(InstructionValue::PropertyLoad {
        object: b.read(props),
        property: "x".to_string(),
    });
    let literal = b.emit(InstructionValue::Object {
        properties: vec![(PropertyKey::Named("x".to_string()), b.capture(loaded))],
    });
    let handle = b.begin_scope();
    let wrapped = b.named("wrapped");
    b.emit_into(
        wrapped,
        InstructionValue::Object {
            properties: vec![(PropertyKey::Named("inner".to_string()), b.capture(literal))],
        },
    );
    b.end_scope(handle);
    b.terminate(TerminalKind::Return {
        value: Some(b.read(wrapped)),
    });
    let func = b.finish().expect("build failed");

    let lowered = compile_function(func, &Environment::default()).expect("compile failed");
    let statements = all_statements(&lowered.function.body);
    assert!(statements
        .iter()
        .any(|s| matches!(s, ReactiveStatement::PrunedScope(_))));
    assert!(!statements
        .iter()
        .any(|s| matches!(s, ReactiveStatement::Scope(_))));
    assert_eq!(lowered.cache.total, 0);
}

#[test]
fn test_untargeted_labeled_block_is_flattened() {
    let mut b = FunctionBuilder::new("f");
    let body = b.create_block();
    let after = b.create_block();
    b.terminate(TerminalKind::Label {
        block: body,
        fallthrough: after,
    });

    b.switch_to_block(body);
    let total = b.named("total");
    b.emit_into(
        total,
        InstructionValue::Primitive {
            value: reflow_compiler::hir::PrimitiveValue::Number(1.0),
        },
    );
    b.terminate(TerminalKind::Goto {
        block: after,
        kind: GotoKind::Break,
    });

    b.switch_to_block(after);
    b.terminate(TerminalKind::Return {
        value: Some(b.read(total)),
    });
    let func = b.finish().expect("build failed");

    let lowered = compile_function(func, &Environment::default()).expect("compile failed");
    let statements = all_statements(&lowered.function.body);
    assert!(!statements.iter().any(|s| matches!(
        s,
        ReactiveStatement::Terminal(ReactiveTerminalStatement {
            terminal: ReactiveTerminal::Label { .. },
            ..
        })
    )));
    assert!(!statements.iter().any(|s| matches!(
        s,
        ReactiveStatement::Terminal(ReactiveTerminalStatement {
            terminal: ReactiveTerminal::Break { .. },
            ..
        })
    )));
}

#[test]
fn test_break_escaping_a_scope_is_threaded_through_the_sentinel() {
    // outer: { const x = {}; x.y = props.y;
    //          if (props.early) { x.flag = props.early; break outer } }
    // return x
    let mut b = FunctionBuilder::new("f");
    let props = b.param("props");
    let body_block = b.create_block();
    let after = b.create_block();
    b.terminate(TerminalKind::Label {
        block: body_block,
        fallthrough: after,
    });

    b.switch_to_block(body_block);
    let handle = b.begin_scope();
    let x = b.named("x");
    b.emit_into(x, InstructionValue::Object { properties: vec![] });
    let loaded = b.emit(InstructionValue::PropertyLoad {
        object: b.read(props),
        property: "y".to_string(),
    });
    b.emit_void(InstructionValue::PropertyStore {
        object: b.mutate(x),
        property: "y".to_string(),
        value: b.capture(loaded),
    });
    let early = b.emit(InstructionValue::PropertyLoad {
        object: b.read(props),
        property: "early".to_string(),
    });
    let then_block = b.create_block();
    let join = b.create_block();
    b.terminate(TerminalKind::If {
        test: b.read(early),
        consequent: then_block,
        alternate: None,
        fallthrough: join,
    });

    b.switch_to_block(then_block);
    b.emit_void(InstructionValue::PropertyStore {
        object: b.mutate(x),
        property: "flag".to_string(),
        value: b.capture(early),
    });
    b.terminate(TerminalKind::Goto {
        block: after,
        kind: GotoKind::Break,
    });

    b.switch_to_block(join);
    b.end_scope(handle);
    b.terminate(TerminalKind::Goto {
        block: after,
        kind: GotoKind::Break,
    });

    b.switch_to_block(after);
    b.terminate(TerminalKind::Return {
        value: Some(b.read(x)),
    });
    let func = b.finish().expect("build failed");

    let lowered = compile_function(func, &Environment::default()).expect("compile failed");
    let statements = all_statements(&lowered.function.body);

    // The scope survives, wrapped in a label, with the exit sentinel as a
    // second declaration alongside x
    let (wrapper_label, scope) = statements
        .iter()
        .find_map(|statement| {
            if let ReactiveStatement::Terminal(terminal) = statement {
                if let ReactiveTerminal::Label { body } = &terminal.terminal {
                    if let Some(ReactiveStatement::Scope(block)) = body.first() {
                        return Some((terminal.label.expect("wrapper keeps its label"), block));
                    }
                }
            }
            None
        })
        .expect("memoized scope wrapped in a label");
    assert!(scope.scope.declarations.contains_key(&x));
    assert_eq!(scope.scope.declarations.len(), 2);

    // Every break left inside the scope targets the wrapper label; the
    // original jump is not carried raw through the memoized region
    let inner = all_statements(&scope.body);
    let inner_breaks: Vec<_> = inner
        .iter()
        .filter_map(|statement| match statement {
            ReactiveStatement::Terminal(ReactiveTerminalStatement {
                terminal: ReactiveTerminal::Break { target, .. },
                ..
            }) => Some(*target),
            _ => None,
        })
        .collect();
    assert!(!inner_breaks.is_empty());
    assert!(inner_breaks.iter().all(|target| *target == wrapper_label));

    // The guard after the scope replays the jump to the original target
    assert!(statements.iter().any(|statement| match statement {
        ReactiveStatement::Terminal(ReactiveTerminalStatement {
            terminal: ReactiveTerminal::If { consequent, .. },
            ..
        }) => consequent.iter().any(|nested| {
            matches!(
                nested,
                ReactiveStatement::Terminal(ReactiveTerminalStatement {
                    terminal: ReactiveTerminal::Break { target, .. },
                    ..
                }) if *target != wrapper_label
            )
        }),
        _ => false,
    }));
}

#[test]
fn test_scope_without_own_output_is_pruned() {
    let mut b = FunctionBuilder::new("f");
    let props = b.param("props");
    let handle = b.begin_scope();
    b.emit(InstructionValue::PropertyLoad {
        object: b.read(props),
        property: "x".to_string(),
    });
    b.end_scope(handle);
    b.terminate(TerminalKind::Return { value: None });
    let func = b.finish().expect("build failed");

    let lowered = compile_function(func, &Environment::default()).expect("compile failed");
    let statements = all_statements(&lowered.function.body);
    assert!(!statements
        .iter()
        .any(|s| matches!(s, ReactiveStatement::Scope(_))));
    assert_eq!(lowered.cache.total, 0);
}

#[test]
fn test_break_to_undeclared_label_is_fatal() {
    use reflow_compiler::hir::{BlockId, Span};
    use reflow_compiler::reactive::ReactiveFunction;
    use rustc_hash::FxHashMap;

    let func = ReactiveFunction {
        name: None,
        params: vec![],
        body: vec![ReactiveStatement::Terminal(ReactiveTerminalStatement {
            terminal: ReactiveTerminal::Break {
                target: BlockId::new(42),
                kind: BreakKind::Labeled,
            },
            label: None,
            span: Span::default(),
        })],
        identifiers: FxHashMap::default(),
        next_identifier_id: 0,
        next_instruction_id: 0,
        span: Span::default(),
    };
    let err = validate_tree(&func).expect_err("must reject undeclared target");
    assert!(err.is_invariant());
}
