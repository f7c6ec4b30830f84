//! Drop labels nothing jumps to and renumber the survivors
//!
//! Structuring gives every labelable construct a label so jumps always have
//! a target to name. Most of those labels end up unused: breaks out of the
//! innermost loop need no label at all, and the trailing break of a label
//! wrapper is just its own fallthrough. This pass removes labels with no
//! remaining jump, flattens label wrappers that only existed to carry one,
//! and renumbers the surviving labels densely so emitted names read `bb0`,
//! `bb1` in source order.

use crate::hir::BlockId;
use crate::reactive::tree::{
    BreakKind, ReactiveFunction, ReactiveStatement, ReactiveTerminal,
};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn prune_unused_labels(func: &mut ReactiveFunction) {
    let mut targets = FxHashSet::default();
    collect_targets(&func.body, &mut targets);
    prune_in(&mut func.body, &targets);

    let mut renumber = Renumber {
        map: FxHashMap::default(),
    };
    renumber.assign(&mut func.body);
    renumber.rewrite(&mut func.body);
}

fn collect_targets(statements: &[ReactiveStatement], targets: &mut FxHashSet<BlockId>) {
    for statement in statements {
        match statement {
            ReactiveStatement::Instruction(_) => {}
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                collect_targets(&block.body, targets);
            }
            ReactiveStatement::Terminal(terminal) => {
                match &terminal.terminal {
                    ReactiveTerminal::Break { target, .. }
                    | ReactiveTerminal::Continue { target, .. } => {
                        targets.insert(*target);
                    }
                    _ => {}
                }
                for body in terminal.terminal.bodies() {
                    collect_targets(body, targets);
                }
            }
        }
    }
}

fn prune_in(statements: &mut Vec<ReactiveStatement>, targets: &FxHashSet<BlockId>) {
    let mut index = 0;
    while index < statements.len() {
        let mut flattened = None;
        match &mut statements[index] {
            ReactiveStatement::Instruction(_) => {}
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                prune_in(&mut block.body, targets);
            }
            ReactiveStatement::Terminal(terminal) => {
                for body in terminal.terminal.bodies_mut() {
                    prune_in(body, targets);
                }
                if let (ReactiveTerminal::Label { body }, Some(label)) =
                    (&mut terminal.terminal, terminal.label)
                {
                    trim_trailing_break(body, label);
                    if !body_targets(body, label) {
                        flattened = Some(std::mem::take(body));
                    }
                }
                if flattened.is_none() {
                    if let Some(label) = terminal.label {
                        if !targets.contains(&label) {
                            terminal.label = None;
                        }
                    }
                }
            }
        }
        if let Some(body) = flattened {
            // The spliced statements were already pruned above, but the
            // first of them still needs this slot re-examined
            statements.splice(index..=index, body);
            continue;
        }
        index += 1;
    }
}

/// A trailing unlabeled break out of a label wrapper is the wrapper's own
/// fallthrough
fn trim_trailing_break(body: &mut Vec<ReactiveStatement>, label: BlockId) {
    while let Some(ReactiveStatement::Terminal(last)) = body.last() {
        let redundant = matches!(
            &last.terminal,
            ReactiveTerminal::Break { target, kind }
                if *target == label && *kind != BreakKind::Labeled
        );
        if !redundant {
            break;
        }
        body.pop();
    }
}

fn body_targets(statements: &[ReactiveStatement], label: BlockId) -> bool {
    let mut targets = FxHashSet::default();
    collect_targets(statements, &mut targets);
    targets.contains(&label)
}

struct Renumber {
    map: FxHashMap<BlockId, BlockId>,
}

impl Renumber {
    fn assign(&mut self, statements: &mut [ReactiveStatement]) {
        for statement in statements {
            match statement {
                ReactiveStatement::Instruction(_) => {}
                ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                    self.assign(&mut block.body);
                }
                ReactiveStatement::Terminal(terminal) => {
                    if let Some(label) = &mut terminal.label {
                        let fresh = BlockId::new(self.map.len() as u32);
                        self.map.insert(*label, fresh);
                        *label = fresh;
                    }
                    for body in terminal.terminal.bodies_mut() {
                        self.assign(body);
                    }
                }
            }
        }
    }

    fn rewrite(&self, statements: &mut [ReactiveStatement]) {
        for statement in statements {
            match statement {
                ReactiveStatement::Instruction(_) => {}
                ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                    self.rewrite(&mut block.body);
                }
                ReactiveStatement::Terminal(terminal) => {
                    match &mut terminal.terminal {
                        ReactiveTerminal::Break { target, .. }
                        | ReactiveTerminal::Continue { target, .. } => {
                            if let Some(fresh) = self.map.get(target) {
                                *target = *fresh;
                            }
                        }
                        _ => {}
                    }
                    for body in terminal.terminal.bodies_mut() {
                        self.rewrite(body);
                    }
                }
            }
        }
    }
}
