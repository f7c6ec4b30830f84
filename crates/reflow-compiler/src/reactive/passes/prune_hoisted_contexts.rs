//! Remove context declarations whose captures did not survive
//!
//! Lowering hoists a declaration for any variable a nested function
//! captures before its assignment. Earlier passes can delete the capturing
//! function, leaving the hoisted declaration with nothing to feed. The
//! declaration is dropped and the first assignment takes the declaration
//! back, turning the reassignment into a `let`.

use crate::hir::{DeclarationKind, HirFunction, IdentifierId, Instruction, InstructionValue};
use crate::reactive::tree::ReactiveFunction;
use crate::reactive::visit::{
    transform_function, visit_function, ReactiveTransform, ReactiveVisitor, Transformed,
};
use rustc_hash::FxHashSet;

pub fn prune_hoisted_contexts(func: &mut ReactiveFunction) {
    let captured = collect_captured(func);
    let mut pass = Prune {
        captured,
        demoted: FxHashSet::default(),
    };
    transform_function(&mut pass, func);
}

fn collect_captured(func: &ReactiveFunction) -> FxHashSet<IdentifierId> {
    struct Collect {
        captured: FxHashSet<IdentifierId>,
    }
    impl Collect {
        fn visit_nested(&mut self, function: &HirFunction) {
            for block in &function.blocks {
                for instruction in &block.instructions {
                    if let InstructionValue::FunctionExpression {
                        context, function, ..
                    } = &instruction.value
                    {
                        self.captured
                            .extend(context.iter().map(|place| place.identifier));
                        self.visit_nested(function);
                    }
                }
            }
        }
    }
    impl ReactiveVisitor for Collect {
        fn visit_instruction(&mut self, instruction: &Instruction) {
            if let InstructionValue::FunctionExpression {
                context, function, ..
            } = &instruction.value
            {
                self.captured
                    .extend(context.iter().map(|place| place.identifier));
                self.visit_nested(function);
            }
        }
    }

    let mut collect = Collect {
        captured: FxHashSet::default(),
    };
    visit_function(&mut collect, func);
    collect.captured
}

struct Prune {
    captured: FxHashSet<IdentifierId>,
    /// Declarations removed so far whose first store still needs demoting
    demoted: FxHashSet<IdentifierId>,
}

impl ReactiveTransform for Prune {
    fn transform_instruction(&mut self, instruction: &mut Instruction) -> Transformed {
        match &mut instruction.value {
            InstructionValue::DeclareContext { lvalue } => {
                if !self.captured.contains(&lvalue.identifier) {
                    self.demoted.insert(lvalue.identifier);
                    return Transformed::Remove;
                }
            }
            InstructionValue::StoreLocal { lvalue, kind, .. } => {
                if *kind == DeclarationKind::Reassign
                    && self.demoted.remove(&lvalue.identifier)
                {
                    *kind = DeclarationKind::Let;
                }
            }
            _ => {}
        }
        Transformed::Keep
    }
}
