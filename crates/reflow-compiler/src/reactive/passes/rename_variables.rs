//! Assign printable, collision-free names to every surviving binding
//!
//! Source names are kept where possible. Shadowed duplicates get a numeric
//! suffix, and promoted temporaries draw from a `t0`, `t1` sequence that
//! skips anything the source already uses. Names are unique across the
//! whole function rather than per lexical scope; hoisted declarations move
//! between scopes during emission, so per-scope uniqueness would not be
//! enough.

use crate::hir::{IdentifierId, IdentifierName};
use crate::reactive::tree::ReactiveFunction;
use rustc_hash::{FxHashMap, FxHashSet};

pub fn rename_variables(func: &ReactiveFunction) -> FxHashMap<IdentifierId, String> {
    let mut ids: Vec<IdentifierId> = func.identifiers.keys().copied().collect();
    ids.sort();

    let mut taken: FxHashSet<String> = FxHashSet::default();
    let mut names = FxHashMap::default();
    let mut next_temporary = 0u32;

    for id in ids {
        let name = match &func.identifiers[&id].name {
            IdentifierName::Temporary => continue,
            IdentifierName::Named(name) => {
                if taken.contains(name) {
                    let mut suffix = 1u32;
                    loop {
                        let candidate = format!("{name}_{suffix}");
                        if !taken.contains(&candidate) {
                            break candidate;
                        }
                        suffix += 1;
                    }
                } else {
                    name.clone()
                }
            }
            IdentifierName::Promoted(_) => loop {
                let candidate = format!("t{next_temporary}");
                next_temporary += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            },
        };
        taken.insert(name.clone());
        names.insert(id, name);
    }
    names
}
