//! Reactive tree: structured program form between the flow graph and output
//!
//! The control flow graph serializes into a tree of statements and
//! structured terminals, reactive scopes are interleaved as explicit
//! blocks, and the lowering passes rewrite the tree in place.

pub mod build;
pub mod passes;
pub mod tree;
pub mod validate;
pub mod visit;

pub use build::build_reactive_function;
pub use passes::lower_function;
pub use tree::{
    BreakKind, ReactiveCase, ReactiveFunction, ReactiveScopeBlock, ReactiveStatement,
    ReactiveTerminal, ReactiveTerminalStatement, ValueBlock,
};
pub use validate::validate_tree;
pub use visit::{
    transform_function, transform_statements, visit_function, visit_statements,
    ReactiveTransform, ReactiveVisitor, Transformed,
};
