//! Reflow Compiler - Reactive Scope Inference and Lowering
//!
//! This crate implements the middle-end that turns a function's control
//! flow graph into a memoized form: dataflow analysis decides which values
//! are reactive, reactive scopes group the computations that invalidate
//! together, and a pass suite lowers the structured tree into its final
//! shape with cache slots assigned per scope.

pub mod analysis;
pub mod env;
pub mod error;
pub mod hir;
pub mod pipeline;
pub mod reactive;

pub use env::{Environment, EnvironmentConfig, StableKind};
pub use error::{CompileError, CompileResult};
pub use pipeline::{compile_function, CacheAllocation, CacheSlotRange, LoweredFunction};

// Re-export graph types for upstream producers
pub use hir::{
    BasicBlock, BlockId, Effect, FunctionBuilder, HirFunction, Identifier, IdentifierId,
    IdentifierName, Instruction, InstructionId, InstructionValue, Place, PrettyPrint, Span,
    Terminal, TerminalKind,
};
pub use reactive::{ReactiveFunction, ReactiveStatement, ReactiveTerminal};
