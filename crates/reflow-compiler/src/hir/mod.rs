//! Graph intermediate representation
//!
//! The control-flow-graph form every dataflow analysis runs on. Lowering
//! never runs here; once `reactive::build` re-serializes the graph into a
//! statement tree, all later rewrites happen on the tree.

pub mod block;
pub mod builder;
pub mod dominator;
pub mod function;
pub mod ids;
pub mod instr;
pub mod place;
pub mod pretty;

pub use block::{BasicBlock, GotoKind, Phi, SwitchCase, Terminal, TerminalKind};
pub use builder::FunctionBuilder;
pub use dominator::{compute_dominators, DominatorTree};
pub use function::{HirFunction, ScopeBoundary};
pub use ids::{BlockId, IdentifierId, InstructionId, InstructionRange, ScopeId};
pub use instr::{
    BinaryOp, DeclarationKind, DestructureBinding, Instruction, InstructionValue, LogicalOp,
    PatternKey, PrimitiveValue, PropertyKey,
};
pub use place::{Effect, Identifier, IdentifierName, Place, Span, TypeTag};
pub use pretty::PrettyPrint;
