//! Drop never-read bindings and promote temporaries that need names
//!
//! After scope pruning and merging, some bindings have no remaining
//! readers; their assignments are dead weight for the emitter. The inverse
//! also happens: a compiler temporary that started as a single-use
//! intermediate may now be read several times, cross a scope boundary, or
//! be captured by a nested function literal, and the emitter needs a real
//! declaration for it. Both adjustments live here because they share the
//! same read census.

use crate::hir::{
    IdentifierId, IdentifierName, Instruction, InstructionValue, Place, ScopeId,
};
use crate::reactive::tree::{ReactiveFunction, ReactiveScopeBlock};
use crate::reactive::visit::{
    transform_function, visit_function, ReactiveTransform, ReactiveVisitor, Transformed,
};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn prune_unused_lvalues(func: &mut ReactiveFunction) {
    let census = take_census(func);

    let mut pass = Prune {
        reads: census.reads.clone(),
    };
    transform_function(&mut pass, func);

    // Promotion order follows identifier ids so reruns assign the same
    // numbers
    let mut candidates: Vec<IdentifierId> = census
        .promote
        .iter()
        .copied()
        .filter(|id| {
            func.identifiers
                .get(id)
                .is_some_and(|identifier| identifier.name == IdentifierName::Temporary)
        })
        .collect();
    candidates.sort();
    for id in candidates {
        if let Some(identifier) = func.identifiers.get_mut(&id) {
            identifier.name = IdentifierName::Promoted(id.as_u32());
        }
    }
}

struct Census {
    reads: FxHashMap<IdentifierId, usize>,
    promote: FxHashSet<IdentifierId>,
}

fn take_census(func: &ReactiveFunction) -> Census {
    struct Visitor {
        reads: FxHashMap<IdentifierId, usize>,
        promote: FxHashSet<IdentifierId>,
        def_scope: FxHashMap<IdentifierId, Option<ScopeId>>,
        scope_stack: Vec<ScopeId>,
    }
    impl Visitor {
        fn current_scope(&self) -> Option<ScopeId> {
            self.scope_stack.last().copied()
        }

        fn record_read(&mut self, id: IdentifierId) {
            *self.reads.entry(id).or_default() += 1;
            if let Some(def) = self.def_scope.get(&id) {
                if *def != self.current_scope() {
                    self.promote.insert(id);
                }
            }
        }
    }
    impl ReactiveVisitor for Visitor {
        fn enter_scope(&mut self, block: &ReactiveScopeBlock, _pruned: bool) {
            // Dependencies are read by the memo comparison itself
            for dependency in &block.scope.dependencies {
                *self.reads.entry(dependency.identifier).or_default() += 1;
                self.promote.insert(dependency.identifier);
            }
            self.scope_stack.push(block.scope.id);
        }

        fn exit_scope(&mut self, _block: &ReactiveScopeBlock, _pruned: bool) {
            self.scope_stack.pop();
        }

        fn visit_instruction(&mut self, instruction: &Instruction) {
            let current_scope = self.current_scope();
            for lvalue in instruction.lvalues() {
                self.def_scope
                    .entry(lvalue.identifier)
                    .or_insert(current_scope);
            }
            if let InstructionValue::FunctionExpression {
                context, function, ..
            } = &instruction.value
            {
                // Captured values need declarations whatever their count
                for place in context {
                    self.promote.insert(place.identifier);
                }
                count_nested_reads(function, &mut self.reads);
            }
        }

        fn visit_place(&mut self, place: &Place) {
            if place.effect != Some(crate::hir::Effect::Store) {
                self.record_read(place.identifier);
            }
            if self.reads.get(&place.identifier).copied().unwrap_or(0) >= 2 {
                self.promote.insert(place.identifier);
            }
        }
    }

    let mut visitor = Visitor {
        reads: FxHashMap::default(),
        promote: FxHashSet::default(),
        def_scope: FxHashMap::default(),
        scope_stack: Vec::new(),
    };
    visit_function(&mut visitor, func);
    Census {
        reads: visitor.reads,
        promote: visitor.promote,
    }
}

/// Reads inside nested function literals keep outer bindings alive; the
/// identifier id space is shared with the enclosing function
fn count_nested_reads(
    func: &crate::hir::HirFunction,
    reads: &mut FxHashMap<IdentifierId, usize>,
) {
    for block in &func.blocks {
        for instruction in &block.instructions {
            for operand in instruction.value.operands() {
                if operand.effect != Some(crate::hir::Effect::Store) {
                    *reads.entry(operand.identifier).or_default() += 1;
                }
            }
            if let InstructionValue::FunctionExpression { function, .. } = &instruction.value {
                count_nested_reads(function, reads);
            }
        }
        for operand in block.terminal.operands() {
            if operand.effect != Some(crate::hir::Effect::Store) {
                *reads.entry(operand.identifier).or_default() += 1;
            }
        }
    }
}

struct Prune {
    reads: FxHashMap<IdentifierId, usize>,
}

impl Prune {
    fn is_read(&self, id: IdentifierId) -> bool {
        self.reads.get(&id).copied().unwrap_or(0) > 0
    }
}

impl ReactiveTransform for Prune {
    fn transform_instruction(&mut self, instruction: &mut Instruction) -> Transformed {
        if let Some(lvalue) = &instruction.lvalue {
            if !self.is_read(lvalue.identifier) {
                instruction.lvalue = None;
            }
        }
        match &mut instruction.value {
            InstructionValue::StoreLocal { lvalue, .. } => {
                if !self.is_read(lvalue.identifier) {
                    return Transformed::Remove;
                }
            }
            InstructionValue::Destructure { bindings, .. } => {
                bindings.retain(|binding| self.is_read(binding.place.identifier));
                if bindings.is_empty() {
                    return Transformed::Remove;
                }
            }
            _ => {}
        }
        Transformed::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{
        DeclarationKind, Effect, Identifier, InstructionId, PrimitiveValue, Span,
    };
    use crate::reactive::tree::ReactiveStatement;

    fn instruction(id: u32, lvalue: Option<u32>, value: InstructionValue) -> ReactiveStatement {
        ReactiveStatement::Instruction(Instruction {
            id: InstructionId(id),
            lvalue: lvalue.map(|l| Place::new(IdentifierId(l), Effect::Store)),
            value,
            span: Span::default(),
        })
    }

    fn function(body: Vec<ReactiveStatement>, identifiers: Vec<Identifier>) -> ReactiveFunction {
        ReactiveFunction {
            name: None,
            params: vec![],
            body,
            identifiers: identifiers.into_iter().map(|i| (i.id, i)).collect(),
            next_identifier_id: 20,
            next_instruction_id: 20,
            span: Span::default(),
        }
    }

    #[test]
    fn test_unread_store_is_removed() {
        let mut func = function(
            vec![
                instruction(
                    0,
                    Some(1),
                    InstructionValue::Primitive {
                        value: PrimitiveValue::Number(1.0),
                    },
                ),
                instruction(
                    1,
                    None,
                    InstructionValue::StoreLocal {
                        lvalue: Place::new(IdentifierId(2), Effect::Store),
                        value: Place::new(IdentifierId(1), Effect::Read),
                        kind: DeclarationKind::Const,
                    },
                ),
            ],
            vec![
                Identifier::temporary(IdentifierId(1)),
                Identifier::named(IdentifierId(2), "unused"),
            ],
        );
        prune_unused_lvalues(&mut func);
        assert_eq!(func.body.len(), 1);
    }

    #[test]
    fn test_unread_result_binding_is_dropped_but_call_kept() {
        // The call may have effects; only the binding goes
        let mut func = function(
            vec![
                instruction(
                    0,
                    Some(1),
                    InstructionValue::LoadGlobal {
                        name: "effectful".to_string(),
                    },
                ),
                instruction(
                    1,
                    Some(2),
                    InstructionValue::Call {
                        callee: Place::new(IdentifierId(1), Effect::Read),
                        arguments: vec![],
                    },
                ),
            ],
            vec![
                Identifier::temporary(IdentifierId(1)),
                Identifier::temporary(IdentifierId(2)),
            ],
        );
        prune_unused_lvalues(&mut func);
        assert_eq!(func.body.len(), 2);
        let ReactiveStatement::Instruction(call) = &func.body[1] else {
            panic!("expected instruction");
        };
        assert!(call.lvalue.is_none());
    }

    #[test]
    fn test_multiply_read_temporary_is_promoted() {
        let mut func = function(
            vec![
                instruction(
                    0,
                    Some(1),
                    InstructionValue::Primitive {
                        value: PrimitiveValue::Number(1.0),
                    },
                ),
                instruction(
                    1,
                    Some(2),
                    InstructionValue::Binary {
                        op: crate::hir::BinaryOp::Add,
                        left: Place::new(IdentifierId(1), Effect::Read),
                        right: Place::new(IdentifierId(1), Effect::Read),
                    },
                ),
                instruction(
                    2,
                    None,
                    InstructionValue::StoreLocal {
                        lvalue: Place::new(IdentifierId(3), Effect::Store),
                        value: Place::new(IdentifierId(2), Effect::Read),
                        kind: DeclarationKind::Const,
                    },
                ),
                instruction(
                    3,
                    None,
                    InstructionValue::StoreLocal {
                        lvalue: Place::new(IdentifierId(4), Effect::Store),
                        value: Place::new(IdentifierId(3), Effect::Read),
                        kind: DeclarationKind::Const,
                    },
                ),
                instruction(
                    4,
                    None,
                    InstructionValue::StoreLocal {
                        lvalue: Place::new(IdentifierId(5), Effect::Store),
                        value: Place::new(IdentifierId(4), Effect::Read),
                        kind: DeclarationKind::Const,
                    },
                ),
            ],
            vec![
                Identifier::temporary(IdentifierId(1)),
                Identifier::temporary(IdentifierId(2)),
                Identifier::named(IdentifierId(3), "a"),
                Identifier::named(IdentifierId(4), "b"),
                Identifier::named(IdentifierId(5), "c"),
            ],
        );
        prune_unused_lvalues(&mut func);
        assert_eq!(
            func.identifiers[&IdentifierId(1)].name,
            IdentifierName::Promoted(1)
        );
        // Single-read temporary stays inline
        assert_eq!(
            func.identifiers[&IdentifierId(2)].name,
            IdentifierName::Temporary
        );
    }
}
