//! The lowering pass suite
//!
//! Each pass is a standalone rewrite over the reactive tree. The order is
//! load-bearing: dependency pruning must see original dependency sets,
//! merging must see final ones, early-return propagation introduces the
//! stores and labels the later structural passes clean up after, and
//! renaming runs once the set of surviving bindings is final.

pub mod extract_destructuring;
pub mod merge_scopes;
pub mod propagate_early_returns;
pub mod prune_always_invalidating;
pub mod prune_hoisted_contexts;
pub mod prune_non_reactive_deps;
pub mod prune_unused_labels;
pub mod prune_unused_lvalues;
pub mod prune_unused_scopes;
pub mod rename_variables;

pub use extract_destructuring::extract_destructuring_reassignments;
pub use merge_scopes::merge_scopes_that_invalidate_together;
pub use propagate_early_returns::{propagate_early_returns, EARLY_RETURN_MARKER};
pub use prune_always_invalidating::prune_always_invalidating_scopes;
pub use prune_hoisted_contexts::prune_hoisted_contexts;
pub use prune_non_reactive_deps::prune_non_reactive_dependencies;
pub use prune_unused_labels::prune_unused_labels;
pub use prune_unused_lvalues::prune_unused_lvalues;
pub use prune_unused_scopes::prune_unused_scopes;
pub use rename_variables::rename_variables;

use crate::error::CompileResult;
use crate::hir::IdentifierId;
use crate::reactive::tree::ReactiveFunction;
use crate::reactive::validate::validate_tree;
use rustc_hash::FxHashMap;

/// Run the full suite in order, revalidating the tree after the passes
/// that restructure it
pub fn lower_function(
    func: &mut ReactiveFunction,
) -> CompileResult<FxHashMap<IdentifierId, String>> {
    prune_non_reactive_dependencies(func);
    prune_always_invalidating_scopes(func);
    prune_unused_scopes(func);
    merge_scopes_that_invalidate_together(func);
    validate_tree(func)?;

    propagate_early_returns(func);
    validate_tree(func)?;

    prune_unused_lvalues(func);
    extract_destructuring_reassignments(func);
    prune_unused_labels(func);
    validate_tree(func)?;

    let names = rename_variables(func);
    prune_hoisted_contexts(func);
    Ok(names)
}
