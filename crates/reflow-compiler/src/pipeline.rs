//! End-to-end compilation of a single function
//!
//! Ties the stages together: alias analysis, reactivity inference, scope
//! construction, tree building, the lowering suite, and finally cache slot
//! assignment for the emitter.

use crate::analysis::{analyze_aliases, build_reactive_scopes, infer_reactive_places};
use crate::env::Environment;
use crate::error::CompileResult;
use crate::hir::{compute_dominators, HirFunction, IdentifierId, ScopeId};
use crate::reactive::tree::{ReactiveFunction, ReactiveScopeBlock};
use crate::reactive::visit::{visit_function, ReactiveVisitor};
use crate::reactive::{build_reactive_function, lower_function, validate_tree};
use rustc_hash::FxHashMap;

/// Contiguous block of cache slots reserved for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSlotRange {
    pub start: usize,
    pub len: usize,
}

/// Slot assignment for every surviving scope
#[derive(Debug, Clone, Default)]
pub struct CacheAllocation {
    pub slots: FxHashMap<ScopeId, CacheSlotRange>,
    pub total: usize,
}

/// Final result of compiling one function
#[derive(Debug)]
pub struct LoweredFunction {
    pub function: ReactiveFunction,
    pub names: FxHashMap<IdentifierId, String>,
    pub cache: CacheAllocation,
}

pub fn compile_function(
    mut func: HirFunction,
    env: &Environment,
) -> CompileResult<LoweredFunction> {
    let mut aliases = analyze_aliases(&func);
    let doms = compute_dominators(&func);
    infer_reactive_places(&mut func, &mut aliases, &doms, env)?;

    let scopes = build_reactive_scopes(&mut func);
    let mut tree = build_reactive_function(&func, scopes)?;
    validate_tree(&tree)?;

    let names = lower_function(&mut tree)?;
    let cache = assign_cache_slots(&tree);
    Ok(LoweredFunction {
        function: tree,
        names,
        cache,
    })
}

/// One slot per dependency to compare against, plus one per output to
/// store, in tree order
fn assign_cache_slots(func: &ReactiveFunction) -> CacheAllocation {
    struct Assign {
        cache: CacheAllocation,
    }
    impl ReactiveVisitor for Assign {
        fn enter_scope(&mut self, block: &ReactiveScopeBlock, pruned: bool) {
            if pruned {
                return;
            }
            let len = block.scope.dependencies.len()
                + block.scope.declarations.len()
                + block.scope.reassignments.len();
            self.cache.slots.insert(
                block.scope.id,
                CacheSlotRange {
                    start: self.cache.total,
                    len,
                },
            );
            self.cache.total += len;
        }
    }

    let mut assign = Assign {
        cache: CacheAllocation::default(),
    };
    visit_function(&mut assign, func);
    assign.cache
}
