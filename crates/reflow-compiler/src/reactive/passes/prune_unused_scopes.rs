//! Prune scopes that memoize nothing
//!
//! A scope earns its cache entry through its own declarations or its
//! reassignments of outer variables. A scope whose declarations all bubbled
//! up from nested scopes owns nothing; comparing its dependencies buys
//! nothing. Scopes carrying early-return bookkeeping are kept: the exit
//! sentinel is meaningful even when nothing else is.

use crate::reactive::tree::{
    ReactiveFunction, ReactiveScopeBlock, ReactiveStatement, ReactiveTerminal,
};
use crate::reactive::visit::{transform_function, ReactiveTransform, Transformed};

pub fn prune_unused_scopes(func: &mut ReactiveFunction) {
    transform_function(&mut Prune, func);
}

struct Prune;

impl ReactiveTransform for Prune {
    fn transform_scope(&mut self, block: &mut ReactiveScopeBlock, pruned: bool) -> Transformed {
        if pruned {
            return Transformed::Keep;
        }
        if block.scope.has_own_output() || block.scope.early_return_value.is_some() {
            return Transformed::Keep;
        }
        if contains_return(&block.body) {
            return Transformed::Keep;
        }
        Transformed::Replace(ReactiveStatement::PrunedScope(block.clone()))
    }
}

fn contains_return(statements: &[ReactiveStatement]) -> bool {
    statements.iter().any(|statement| match statement {
        ReactiveStatement::Instruction(_) => false,
        ReactiveStatement::Scope(block) | ReactiveStatement::PrunedScope(block) => {
            contains_return(&block.body)
        }
        ReactiveStatement::Terminal(terminal) => {
            matches!(terminal.terminal, ReactiveTerminal::Return { .. })
                || terminal
                    .terminal
                    .bodies()
                    .into_iter()
                    .any(|body| contains_return(body))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ReactiveScope, ScopeDeclaration};
    use crate::hir::{
        Identifier, IdentifierId, InstructionId, InstructionRange, ScopeId, Span,
    };
    use crate::reactive::tree::ReactiveTerminalStatement;
    use rustc_hash::{FxHashMap, FxHashSet};

    fn empty_scope(id: u32) -> ReactiveScope {
        ReactiveScope {
            id: ScopeId(id),
            range: InstructionRange::new(InstructionId(0), InstructionId(5)),
            dependencies: vec![],
            declarations: FxHashMap::default(),
            reassignments: FxHashSet::default(),
            early_return_value: None,
            span: Span::default(),
        }
    }

    fn function(body: Vec<ReactiveStatement>) -> ReactiveFunction {
        ReactiveFunction {
            name: None,
            params: vec![],
            body,
            identifiers: FxHashMap::default(),
            next_identifier_id: 10,
            next_instruction_id: 10,
            span: Span::default(),
        }
    }

    #[test]
    fn test_scope_without_output_is_pruned() {
        let mut func = function(vec![ReactiveStatement::Scope(ReactiveScopeBlock {
            scope: empty_scope(0),
            body: vec![],
        })]);
        prune_unused_scopes(&mut func);
        assert!(matches!(func.body[0], ReactiveStatement::PrunedScope(_)));
    }

    #[test]
    fn test_scope_with_own_declaration_is_kept() {
        let mut scope = empty_scope(0);
        scope.declarations.insert(
            IdentifierId(1),
            ScopeDeclaration {
                identifier: Identifier::named(IdentifierId(1), "x"),
                scope: ScopeId(0),
            },
        );
        let mut func = function(vec![ReactiveStatement::Scope(ReactiveScopeBlock {
            scope,
            body: vec![],
        })]);
        prune_unused_scopes(&mut func);
        assert!(matches!(func.body[0], ReactiveStatement::Scope(_)));
    }

    #[test]
    fn test_bubbled_declaration_does_not_save_scope() {
        // The declaration is owned by a nested scope, not this one
        let mut scope = empty_scope(0);
        scope.declarations.insert(
            IdentifierId(1),
            ScopeDeclaration {
                identifier: Identifier::named(IdentifierId(1), "x"),
                scope: ScopeId(1),
            },
        );
        let mut func = function(vec![ReactiveStatement::Scope(ReactiveScopeBlock {
            scope,
            body: vec![],
        })]);
        prune_unused_scopes(&mut func);
        assert!(matches!(func.body[0], ReactiveStatement::PrunedScope(_)));
    }

    #[test]
    fn test_scope_with_return_is_kept() {
        let mut func = function(vec![ReactiveStatement::Scope(ReactiveScopeBlock {
            scope: empty_scope(0),
            body: vec![ReactiveStatement::Terminal(ReactiveTerminalStatement {
                terminal: ReactiveTerminal::Return { value: None },
                label: None,
                span: Span::default(),
            })],
        })]);
        prune_unused_scopes(&mut func);
        assert!(matches!(func.body[0], ReactiveStatement::Scope(_)));
    }
}
