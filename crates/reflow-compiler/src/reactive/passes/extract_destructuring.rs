//! Rewrite destructures whose bindings are scope outputs
//!
//! When a destructuring pattern declares a variable that escapes its scope,
//! the emitter hoists the declaration to the scope boundary. The pattern
//! itself must then assign rather than declare, and every binding in the
//! pattern has to be hoisted with it so the statement stays a single
//! pattern assignment.

use crate::analysis::ScopeDeclaration;
use crate::hir::{
    DeclarationKind, Identifier, IdentifierId, Instruction, InstructionId, InstructionValue,
    ScopeId,
};
use crate::reactive::tree::{ReactiveFunction, ReactiveScopeBlock};
use crate::reactive::visit::{
    transform_function, visit_function, ReactiveTransform, ReactiveVisitor, Transformed,
};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn extract_destructuring_reassignments(func: &mut ReactiveFunction) {
    let plan = plan_rewrites(func);
    if plan.rewrite.is_empty() {
        return;
    }
    let mut pass = Rewrite {
        rewrite: plan.rewrite,
        hoisted: plan.hoisted,
        identifiers: func.identifiers.clone(),
    };
    transform_function(&mut pass, func);
}

struct Plan {
    /// Destructure instructions that must become pattern reassignments
    rewrite: FxHashSet<InstructionId>,
    /// Bindings each owning scope must additionally declare
    hoisted: FxHashMap<ScopeId, Vec<IdentifierId>>,
}

fn plan_rewrites(func: &ReactiveFunction) -> Plan {
    struct Visitor {
        // innermost last; (scope id, declared identifiers)
        stack: Vec<(ScopeId, FxHashSet<IdentifierId>)>,
        rewrite: FxHashSet<InstructionId>,
        hoisted: FxHashMap<ScopeId, Vec<IdentifierId>>,
    }
    impl ReactiveVisitor for Visitor {
        fn enter_scope(&mut self, block: &ReactiveScopeBlock, pruned: bool) {
            if !pruned {
                self.stack.push((
                    block.scope.id,
                    block.scope.declarations.keys().copied().collect(),
                ));
            }
        }

        fn exit_scope(&mut self, _block: &ReactiveScopeBlock, pruned: bool) {
            if !pruned {
                self.stack.pop();
            }
        }

        fn visit_instruction(&mut self, instruction: &Instruction) {
            let InstructionValue::Destructure { bindings, kind, .. } = &instruction.value else {
                return;
            };
            if *kind == DeclarationKind::Reassign {
                return;
            }
            let owner = self.stack.iter().rev().find(|(_, declared)| {
                bindings
                    .iter()
                    .any(|binding| declared.contains(&binding.place.identifier))
            });
            if let Some((scope, declared)) = owner {
                self.rewrite.insert(instruction.id);
                let extra = self.hoisted.entry(*scope).or_default();
                for binding in bindings {
                    if !declared.contains(&binding.place.identifier) {
                        extra.push(binding.place.identifier);
                    }
                }
            }
        }
    }

    let mut visitor = Visitor {
        stack: Vec::new(),
        rewrite: FxHashSet::default(),
        hoisted: FxHashMap::default(),
    };
    visit_function(&mut visitor, func);
    Plan {
        rewrite: visitor.rewrite,
        hoisted: visitor.hoisted,
    }
}

struct Rewrite {
    rewrite: FxHashSet<InstructionId>,
    hoisted: FxHashMap<ScopeId, Vec<IdentifierId>>,
    identifiers: FxHashMap<IdentifierId, Identifier>,
}

impl ReactiveTransform for Rewrite {
    fn transform_instruction(&mut self, instruction: &mut Instruction) -> Transformed {
        if self.rewrite.contains(&instruction.id) {
            if let InstructionValue::Destructure { kind, .. } = &mut instruction.value {
                *kind = DeclarationKind::Reassign;
            }
        }
        Transformed::Keep
    }

    fn transform_scope(&mut self, block: &mut ReactiveScopeBlock, pruned: bool) -> Transformed {
        if pruned {
            return Transformed::Keep;
        }
        if let Some(extra) = self.hoisted.remove(&block.scope.id) {
            for id in extra {
                if let Some(identifier) = self.identifiers.get(&id) {
                    block.scope.declarations.entry(id).or_insert(ScopeDeclaration {
                        identifier: identifier.clone(),
                        scope: block.scope.id,
                    });
                }
            }
        }
        Transformed::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ReactiveScope;
    use crate::hir::{
        DestructureBinding, Effect, InstructionRange, PatternKey, Place, Span,
    };
    use crate::reactive::tree::ReactiveStatement;

    fn destructure(id: u32, bindings: &[u32], kind: DeclarationKind) -> ReactiveStatement {
        ReactiveStatement::Instruction(Instruction {
            id: InstructionId(id),
            lvalue: None,
            value: InstructionValue::Destructure {
                bindings: bindings
                    .iter()
                    .enumerate()
                    .map(|(index, binding)| DestructureBinding {
                        key: PatternKey::Index(index as u32),
                        place: Place::new(IdentifierId(*binding), Effect::Store),
                    })
                    .collect(),
                value: Place::new(IdentifierId(9), Effect::Read),
                kind,
            },
            span: Span::default(),
        })
    }

    fn scope_declaring(id: u32, declared: &[u32]) -> ReactiveScope {
        ReactiveScope {
            id: ScopeId(id),
            range: InstructionRange::new(InstructionId(0), InstructionId(10)),
            dependencies: vec![],
            declarations: declared
                .iter()
                .map(|d| {
                    (
                        IdentifierId(*d),
                        ScopeDeclaration {
                            identifier: Identifier::named(IdentifierId(*d), "x"),
                            scope: ScopeId(id),
                        },
                    )
                })
                .collect(),
            reassignments: FxHashSet::default(),
            early_return_value: None,
            span: Span::default(),
        }
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
    fn test_escaping_binding_turns_pattern_into_reassignment() {
        let mut func = function(
            vec![ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope_declaring(0, &[1]),
                body: vec![destructure(0, &[1, 2], DeclarationKind::Const)],
            })],
            vec![
                Identifier::named(IdentifierId(1), "a"),
                Identifier::named(IdentifierId(2), "b"),
            ],
        );
        extract_destructuring_reassignments(&mut func);
        let ReactiveStatement::Scope(block) = &func.body[0] else {
            panic!("expected scope");
        };
        let ReactiveStatement::Instruction(instr) = &block.body[0] else {
            panic!("expected instruction");
        };
        let InstructionValue::Destructure { kind, .. } = &instr.value else {
            panic!("expected destructure");
        };
        assert_eq!(*kind, DeclarationKind::Reassign);
        // The sibling binding is hoisted with it
        assert!(block.scope.declarations.contains_key(&IdentifierId(2)));
        assert_eq!(
            block.scope.declarations[&IdentifierId(2)].scope,
            block.scope.id
        );
    }

    #[test]
    fn test_local_pattern_is_left_alone() {
        let mut func = function(
            vec![ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope_declaring(0, &[5]),
                body: vec![destructure(0, &[1, 2], DeclarationKind::Const)],
            })],
            vec![
                Identifier::named(IdentifierId(1), "a"),
                Identifier::named(IdentifierId(2), "b"),
            ],
        );
        extract_destructuring_reassignments(&mut func);
        let ReactiveStatement::Scope(block) = &func.body[0] else {
            panic!("expected scope");
        };
        let ReactiveStatement::Instruction(instr) = &block.body[0] else {
            panic!("expected instruction");
        };
        let InstructionValue::Destructure { kind, .. } = &instr.value else {
            panic!("expected destructure");
        };
        assert_eq!(*kind, DeclarationKind::Const);
        assert!(!block.scope.declarations.contains_key(&IdentifierId(2)));
    }

    #[test]
    fn test_rerunning_changes_nothing_more() {
        let mut func = function(
            vec![ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope_declaring(0, &[1]),
                body: vec![destructure(0, &[1, 2], DeclarationKind::Let)],
            })],
            vec![
                Identifier::named(IdentifierId(1), "a"),
                Identifier::named(IdentifierId(2), "b"),
            ],
        );
        extract_destructuring_reassignments(&mut func);
        let snapshot = format!("{func:?}");
        extract_destructuring_reassignments(&mut func);
        assert_eq!(format!("{func:?}"), snapshot);
    }
}
