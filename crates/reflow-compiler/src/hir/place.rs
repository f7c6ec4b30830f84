//! Identifiers, places, and access effects
//!
//! A `Place` is one use of an identifier at one instruction site. The
//! `reactive` flag on a place is written exclusively by reactivity
//! inference; every later pass reads it without re-deriving it.

use super::ids::IdentifierId;
use std::fmt;

/// Source location information
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: self.column.min(other.column),
        }
    }
}

/// How an instruction accesses an operand place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Value is read without retaining it
    Read,
    /// Value is read and must not be mutated afterwards
    Freeze,
    /// Value is retained by the produced value (aliases it)
    Capture,
    /// Place is assigned a new value
    Store,
    /// Value is definitely mutated
    Mutate,
    /// Value may be mutated depending on runtime state
    ConditionallyMutate,
    /// Value may be mutated through an iterator protocol
    ConditionallyMutateIterator,
}

impl Effect {
    /// Whether this access can change the referenced value
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Effect::Capture
                | Effect::Store
                | Effect::Mutate
                | Effect::ConditionallyMutate
                | Effect::ConditionallyMutateIterator
        )
    }

    /// Whether this access can make the produced value alias the operand
    pub fn is_aliasing(&self) -> bool {
        matches!(
            self,
            Effect::Capture | Effect::ConditionallyMutate | Effect::ConditionallyMutateIterator
        )
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Effect::Read => "read",
            Effect::Freeze => "freeze",
            Effect::Capture => "capture",
            Effect::Store => "store",
            Effect::Mutate => "mutate",
            Effect::ConditionallyMutate => "mutate?",
            Effect::ConditionallyMutateIterator => "mutate-iter?",
        };
        f.write_str(name)
    }
}

/// Inferred shape of the values an identifier holds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Primitive,
    Object,
    Function,
    Mixed,
    #[default]
    Unknown,
}

/// The user-visible (or synthesized) name of an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierName {
    /// Source-level binding name
    Named(String),
    /// Temporary promoted to a declaration; the number orders promotions
    Promoted(u32),
    /// Compiler temporary with no declaration
    Temporary,
}

impl IdentifierName {
    pub fn is_named(&self) -> bool {
        matches!(self, IdentifierName::Named(_))
    }
}

/// A variable or temporary within one compilation
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub id: IdentifierId,
    pub name: IdentifierName,
    pub type_tag: TypeTag,
}

impl Identifier {
    pub fn named(id: IdentifierId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: IdentifierName::Named(name.into()),
            type_tag: TypeTag::default(),
        }
    }

    pub fn temporary(id: IdentifierId) -> Self {
        Self {
            id,
            name: IdentifierName::Temporary,
            type_tag: TypeTag::default(),
        }
    }
}

/// One use of an identifier at one instruction site
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub identifier: IdentifierId,
    /// Access effect; must be resolved before reactivity inference runs
    pub effect: Option<Effect>,
    /// Whether the value observed here may differ between invocations.
    /// Written only by reactivity inference.
    pub reactive: bool,
    pub span: Span,
}

impl Place {
    pub fn new(identifier: IdentifierId, effect: Effect) -> Self {
        Self {
            identifier,
            effect: Some(effect),
            reactive: false,
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)?;
        if let Some(effect) = self.effect {
            write!(f, ":{effect}")?;
        }
        if self.reactive {
            write!(f, "*")?;
        }
        Ok(())
    }
}
