//! Drop scope dependencies that cannot change between invocations
//!
//! A scope only needs to compare dependencies that are actually reactive.
//! The reactive set is recomputed here from the tree alone, as the closure
//! of the inference flags over local dataflow edges, because earlier tree
//! rewrites may have rearranged which loads feed which stores. Scopes whose
//! dependency set survives re-mark their declarations and reassignments
//! reactive so nested scopes keep treating them as changeable inputs.

use crate::hir::{IdentifierId, Instruction, InstructionValue};
use crate::reactive::tree::{ReactiveFunction, ReactiveScopeBlock};
use crate::reactive::visit::{
    transform_function, visit_function, ReactiveTransform, ReactiveVisitor,
};
use rustc_hash::FxHashSet;

pub fn prune_non_reactive_dependencies(func: &mut ReactiveFunction) {
    let reactive = local_reactive_closure(func);
    let mut pass = Prune { reactive };
    transform_function(&mut pass, func);
}

/// Reactive identifiers per the inference flags, closed over the
/// load/store/destructure/property-load/computed-load edges in the tree
fn local_reactive_closure(func: &ReactiveFunction) -> FxHashSet<IdentifierId> {
    struct Seed {
        reactive: FxHashSet<IdentifierId>,
        edges: Vec<(IdentifierId, IdentifierId)>,
    }
    impl ReactiveVisitor for Seed {
        fn visit_place(&mut self, place: &crate::hir::Place) {
            if place.reactive {
                self.reactive.insert(place.identifier);
            }
        }

        fn visit_instruction(&mut self, instruction: &Instruction) {
            let source = match &instruction.value {
                InstructionValue::LoadLocal { place } => Some(place.identifier),
                InstructionValue::StoreLocal { value, .. } => Some(value.identifier),
                InstructionValue::Destructure { value, .. } => Some(value.identifier),
                InstructionValue::PropertyLoad { object, .. } => Some(object.identifier),
                InstructionValue::ComputedLoad { object, .. } => Some(object.identifier),
                _ => None,
            };
            let Some(source) = source else {
                return;
            };
            for lvalue in instruction.lvalues() {
                self.edges.push((source, lvalue.identifier));
            }
        }
    }

    let mut seed = Seed {
        reactive: FxHashSet::default(),
        edges: Vec::new(),
    };
    visit_function(&mut seed, func);

    let mut reactive = seed.reactive;
    let mut changed = true;
    while changed {
        changed = false;
        for (source, target) in &seed.edges {
            if reactive.contains(source) && reactive.insert(*target) {
                changed = true;
            }
        }
    }
    reactive
}

struct Prune {
    reactive: FxHashSet<IdentifierId>,
}

impl ReactiveTransform for Prune {
    // Pre-order: an outer scope's surviving declarations become reactive
    // inputs for the scopes nested inside it
    fn enter_scope(&mut self, block: &mut ReactiveScopeBlock, _pruned: bool) {
        block
            .scope
            .dependencies
            .retain(|dependency| self.reactive.contains(&dependency.identifier));
        if !block.scope.dependencies.is_empty() {
            for id in block.scope.declarations.keys() {
                self.reactive.insert(*id);
            }
            for id in &block.scope.reassignments {
                self.reactive.insert(*id);
            }
        }
    }
}
