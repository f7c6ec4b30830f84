//! Prune scopes whose dependencies change on every invocation
//!
//! An array/object/new/markup constructor evaluated outside any active
//! scope produces a fresh value each time the function runs. A scope that
//! depends on such a value would miss its cache on every invocation, so the
//! comparison is pure overhead; the scope is converted to a pruned scope.
//! Converting a scope can itself expose new unmemoized values (its own
//! constructors are no longer cached), so the pass iterates to fixpoint,
//! bounded by the scope count.

use crate::hir::{IdentifierId, Instruction, InstructionValue};
use crate::reactive::tree::{ReactiveFunction, ReactiveScopeBlock, ReactiveStatement};
use crate::reactive::visit::{
    transform_function, visit_function, ReactiveTransform, ReactiveVisitor, Transformed,
};
use rustc_hash::FxHashSet;

pub fn prune_always_invalidating_scopes(func: &mut ReactiveFunction) {
    loop {
        let unmemoized = collect_unmemoized(func);
        let mut pass = Prune {
            unmemoized,
            converted: false,
        };
        transform_function(&mut pass, func);
        if !pass.converted {
            break;
        }
    }
}

/// Values that are freshly allocated each invocation and not captured by
/// any active scope, closed over load/store aliasing edges
fn collect_unmemoized(func: &ReactiveFunction) -> FxHashSet<IdentifierId> {
    struct Collect {
        depth: usize,
        unmemoized: FxHashSet<IdentifierId>,
        edges: Vec<(IdentifierId, IdentifierId)>,
    }
    impl ReactiveVisitor for Collect {
        fn enter_scope(&mut self, _block: &ReactiveScopeBlock, pruned: bool) {
            if !pruned {
                self.depth += 1;
            }
        }

        fn exit_scope(&mut self, _block: &ReactiveScopeBlock, pruned: bool) {
            if !pruned {
                self.depth -= 1;
            }
        }

        fn visit_instruction(&mut self, instruction: &Instruction) {
            if self.depth == 0 && instruction.value.allocates() {
                for lvalue in instruction.lvalues() {
                    self.unmemoized.insert(lvalue.identifier);
                }
            }
            let source = match &instruction.value {
                InstructionValue::LoadLocal { place } => Some(place.identifier),
                InstructionValue::StoreLocal { value, .. } => Some(value.identifier),
                _ => None,
            };
            if let Some(source) = source {
                for lvalue in instruction.lvalues() {
                    self.edges.push((source, lvalue.identifier));
                }
            }
        }
    }

    let mut collect = Collect {
        depth: 0,
        unmemoized: FxHashSet::default(),
        edges: Vec::new(),
    };
    visit_function(&mut collect, func);

    let mut unmemoized = collect.unmemoized;
    let mut changed = true;
    while changed {
        changed = false;
        for (source, target) in &collect.edges {
            if unmemoized.contains(source) && unmemoized.insert(*target) {
                changed = true;
            }
        }
    }
    unmemoized
}

struct Prune {
    unmemoized: FxHashSet<IdentifierId>,
    converted: bool,
}

impl ReactiveTransform for Prune {
    fn transform_scope(&mut self, block: &mut ReactiveScopeBlock, pruned: bool) -> Transformed {
        if pruned {
            return Transformed::Keep;
        }
        let always_invalidates = block
            .scope
            .dependencies
            .iter()
            .any(|dependency| self.unmemoized.contains(&dependency.identifier));
        if always_invalidates {
            self.converted = true;
            Transformed::Replace(ReactiveStatement::PrunedScope(block.clone()))
        } else {
            Transformed::Keep
        }
    }
}
