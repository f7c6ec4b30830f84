//! Dataflow analyses over the graph IR
//!
//! Everything here runs before structuring; none of it touches the
//! statement tree. Order matters: aliasing feeds reactivity inference,
//! which feeds scope construction.

pub mod alias;
pub mod reactivity;
pub mod scopes;

pub use alias::{analyze_aliases, DisjointSet};
pub use reactivity::infer_reactive_places;
pub use scopes::{
    build_reactive_scopes, EarlyReturnValue, ReactiveScope, ScopeDeclaration, ScopeDependency,
};
