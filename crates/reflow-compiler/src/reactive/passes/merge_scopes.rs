//! Merge sibling scopes that invalidate together
//!
//! Two adjacent scopes with identical final dependency sets always hit or
//! miss their caches together, so keeping them separate doubles the
//! comparison work for no benefit. Runs after dependency pruning so the
//! comparison sees final sets. Only directly adjacent siblings merge;
//! merging across an intervening statement could move that statement's
//! evaluation relative to the scope contents.

use crate::analysis::ScopeDependency;
use crate::hir::InstructionRange;
use crate::reactive::tree::{ReactiveFunction, ReactiveStatement};

pub fn merge_scopes_that_invalidate_together(func: &mut ReactiveFunction) {
    merge_in(&mut func.body);
}

fn merge_in(statements: &mut Vec<ReactiveStatement>) {
    // Children first so nested sibling pairs merge before the parent level
    for statement in statements.iter_mut() {
        match statement {
            ReactiveStatement::Instruction(_) => {}
            ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
                merge_in(&mut block.body);
            }
            ReactiveStatement::Terminal(terminal) => {
                for body in terminal.terminal.bodies_mut() {
                    merge_in(body);
                }
            }
        }
    }

    let mut index = 0;
    while index + 1 < statements.len() {
        let mergeable = match (&statements[index], &statements[index + 1]) {
            (ReactiveStatement::Scope(first), ReactiveStatement::Scope(second)) => {
                same_dependencies(&first.scope.dependencies, &second.scope.dependencies)
                    && first.scope.early_return_value.is_none()
                    && second.scope.early_return_value.is_none()
            }
            _ => false,
        };
        if !mergeable {
            index += 1;
            continue;
        }
        let ReactiveStatement::Scope(second) = statements.remove(index + 1) else {
            unreachable!("checked above");
        };
        let ReactiveStatement::Scope(first) = &mut statements[index] else {
            unreachable!("checked above");
        };
        first.scope.range = InstructionRange::new(
            first.scope.range.start.min(second.scope.range.start),
            first.scope.range.end.max(second.scope.range.end),
        );
        for (id, declaration) in second.scope.declarations {
            first.scope.declarations.entry(id).or_insert(declaration);
        }
        first.scope.reassignments.extend(second.scope.reassignments);
        first.body.extend(second.body);
        // Do not advance: the merged scope may merge with the next sibling
    }
}

fn same_dependencies(first: &[ScopeDependency], second: &[ScopeDependency]) -> bool {
    if first.len() != second.len() {
        return false;
    }
    let mut left: Vec<(_, _)> = first.iter().map(|d| (d.identifier, &d.path)).collect();
    let mut right: Vec<(_, _)> = second.iter().map(|d| (d.identifier, &d.path)).collect();
    left.sort();
    right.sort();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ReactiveScope;
    use crate::hir::{
        Effect, IdentifierId, Instruction, InstructionId, InstructionValue, Place, ScopeId, Span,
    };
    use crate::reactive::tree::ReactiveScopeBlock;
    use rustc_hash::{FxHashMap, FxHashSet};

    fn dep(id: u32) -> ScopeDependency {
        ScopeDependency {
            identifier: IdentifierId(id),
            path: vec![],
            span: Span::default(),
        }
    }

    fn scope(id: u32, range: (u32, u32), deps: Vec<ScopeDependency>) -> ReactiveScope {
        ReactiveScope {
            id: ScopeId(id),
            range: InstructionRange::new(InstructionId(range.0), InstructionId(range.1)),
            dependencies: deps,
            declarations: FxHashMap::default(),
            reassignments: FxHashSet::default(),
            early_return_value: None,
            span: Span::default(),
        }
    }

    fn instruction(id: u32) -> ReactiveStatement {
        ReactiveStatement::Instruction(Instruction {
            id: InstructionId(id),
            lvalue: Some(Place::new(IdentifierId(id), Effect::Store)),
            value: InstructionValue::Object { properties: vec![] },
            span: Span::default(),
        })
    }

    fn function(body: Vec<ReactiveStatement>) -> ReactiveFunction {
        ReactiveFunction {
            name: None,
            params: vec![],
            body,
            identifiers: FxHashMap::default(),
            next_identifier_id: 20,
            next_instruction_id: 20,
            span: Span::default(),
        }
    }

    #[test]
    fn test_identical_dependency_sets_merge() {
        let mut func = function(vec![
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(0, (0, 2), vec![dep(1), dep(2)]),
                body: vec![instruction(0)],
            }),
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(1, (2, 4), vec![dep(2), dep(1)]),
                body: vec![instruction(2)],
            }),
        ]);
        merge_scopes_that_invalidate_together(&mut func);
        assert_eq!(func.body.len(), 1);
        let ReactiveStatement::Scope(merged) = &func.body[0] else {
            panic!("expected scope");
        };
        assert_eq!(merged.body.len(), 2);
        assert_eq!(merged.scope.range.start, InstructionId(0));
        assert_eq!(merged.scope.range.end, InstructionId(4));
    }

    #[test]
    fn test_different_dependency_sets_stay_separate() {
        let mut func = function(vec![
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(0, (0, 2), vec![dep(1)]),
                body: vec![],
            }),
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(1, (2, 4), vec![dep(2)]),
                body: vec![],
            }),
        ]);
        merge_scopes_that_invalidate_together(&mut func);
        assert_eq!(func.body.len(), 2);
    }

    #[test]
    fn test_intervening_statement_blocks_merge() {
        let mut func = function(vec![
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(0, (0, 2), vec![dep(1)]),
                body: vec![],
            }),
            instruction(5),
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(1, (2, 4), vec![dep(1)]),
                body: vec![],
            }),
        ]);
        merge_scopes_that_invalidate_together(&mut func);
        assert_eq!(func.body.len(), 3);
    }

    #[test]
    fn test_chain_of_three_merges_to_one() {
        let mut func = function(vec![
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(0, (0, 1), vec![dep(1)]),
                body: vec![],
            }),
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(1, (1, 2), vec![dep(1)]),
                body: vec![],
            }),
            ReactiveStatement::Scope(ReactiveScopeBlock {
                scope: scope(2, (2, 3), vec![dep(1)]),
                body: vec![],
            }),
        ]);
        merge_scopes_that_invalidate_together(&mut func);
        assert_eq!(func.body.len(), 1);
    }
}
