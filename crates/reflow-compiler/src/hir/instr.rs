//! Instructions and instruction values
//!
//! `InstructionValue` is a closed sum; every consumer matches it
//! exhaustively so that a new variant fails loudly at compile time instead
//! of silently falling through. `operands`/`lvalues` are the single
//! enumeration points for the places an instruction touches — analyses
//! never pattern-match variants just to find places.

use super::function::HirFunction;
use super::ids::{IdentifierId, InstructionId};
use super::place::{Place, Span};
use std::fmt;

/// Kind of a local store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Reassign,
}

/// A compile-time constant
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Number(n) => write!(f, "{n}"),
            PrimitiveValue::String(s) => write!(f, "{s:?}"),
            PrimitiveValue::Boolean(b) => write!(f, "{b}"),
            PrimitiveValue::Null => write!(f, "null"),
            PrimitiveValue::Undefined => write!(f, "undefined"),
        }
    }
}

/// Binary operators (the subset the middle-end needs to carry through)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

/// One binding inside a destructuring pattern
#[derive(Debug, Clone, PartialEq)]
pub struct DestructureBinding {
    pub key: PatternKey,
    pub place: Place,
}

/// Where a destructure binding reads from
#[derive(Debug, Clone, PartialEq)]
pub enum PatternKey {
    /// Positional element of an array pattern
    Index(u32),
    /// Named property of an object pattern
    Named(String),
}

/// Property key of an object literal entry
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Named(String),
    /// Spread of another object
    Spread,
}

/// The value computed by one instruction
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionValue {
    /// Constant
    Primitive { value: PrimitiveValue },
    /// Read a local binding
    LoadLocal { place: Place },
    /// Read a module-level or ambient binding
    LoadGlobal { name: String },
    /// Write a local binding
    StoreLocal {
        lvalue: Place,
        value: Place,
        kind: DeclarationKind,
    },
    /// `object.property`
    PropertyLoad { object: Place, property: String },
    /// `object.property = value`
    PropertyStore {
        object: Place,
        property: String,
        value: Place,
    },
    /// `object[index]`
    ComputedLoad { object: Place, index: Place },
    /// `object[index] = value`
    ComputedStore {
        object: Place,
        index: Place,
        value: Place,
    },
    /// Multi-binding pattern assignment
    Destructure {
        bindings: Vec<DestructureBinding>,
        value: Place,
        kind: DeclarationKind,
    },
    /// Pure binary operation
    Binary {
        op: BinaryOp,
        left: Place,
        right: Place,
    },
    /// `callee(arguments...)`
    Call {
        callee: Place,
        arguments: Vec<Place>,
    },
    /// `receiver.property(arguments...)`
    MethodCall {
        receiver: Place,
        property: String,
        arguments: Vec<Place>,
    },
    /// Array literal
    Array { elements: Vec<Place> },
    /// Object literal
    Object { properties: Vec<(PropertyKey, Place)> },
    /// `new callee(arguments...)`
    New {
        callee: Place,
        arguments: Vec<Place>,
    },
    /// Markup element construction
    Element {
        tag: String,
        props: Vec<(String, Place)>,
        children: Vec<Place>,
    },
    /// Markup fragment construction
    Fragment { children: Vec<Place> },
    /// `test ? consequent : alternate` with pre-evaluated operands
    Conditional {
        test: Place,
        consequent: Place,
        alternate: Place,
    },
    /// Short-circuit expression with pre-evaluated operands
    Logical {
        op: LogicalOp,
        left: Place,
        right: Place,
    },
    /// Comma expression; the last value is the result
    Sequence { values: Vec<Place> },
    /// `object?.property`
    OptionalLoad { object: Place, property: String },
    /// Declares storage hoisted for capture by nested function literals
    DeclareContext { lvalue: Place },
    /// Nested function literal with its captured context
    FunctionExpression {
        name: Option<String>,
        context: Vec<Place>,
        function: Box<HirFunction>,
    },
}

impl InstructionValue {
    /// Every place this value reads or mutates, in evaluation order.
    ///
    /// Store-style lvalues are included here (they carry `Store` effects and
    /// participate in the mutation rules); result lvalues live on
    /// [`Instruction::lvalue`] instead.
    pub fn operands(&self) -> Vec<&Place> {
        match self {
            InstructionValue::Primitive { .. } | InstructionValue::LoadGlobal { .. } => vec![],
            InstructionValue::LoadLocal { place } => vec![place],
            InstructionValue::StoreLocal { lvalue, value, .. } => vec![value, lvalue],
            InstructionValue::PropertyLoad { object, .. } => vec![object],
            InstructionValue::PropertyStore { object, value, .. } => vec![value, object],
            InstructionValue::ComputedLoad { object, index } => vec![object, index],
            InstructionValue::ComputedStore {
                object,
                index,
                value,
            } => vec![index, value, object],
            InstructionValue::Destructure {
                bindings, value, ..
            } => {
                let mut places = vec![value];
                places.extend(bindings.iter().map(|b| &b.place));
                places
            }
            InstructionValue::Binary { left, right, .. } => vec![left, right],
            InstructionValue::Call { callee, arguments } => {
                let mut places = vec![callee];
                places.extend(arguments.iter());
                places
            }
            InstructionValue::MethodCall {
                receiver,
                arguments,
                ..
            } => {
                let mut places = vec![receiver];
                places.extend(arguments.iter());
                places
            }
            InstructionValue::Array { elements } => elements.iter().collect(),
            InstructionValue::Object { properties } => {
                properties.iter().map(|(_, place)| place).collect()
            }
            InstructionValue::New { callee, arguments } => {
                let mut places = vec![callee];
                places.extend(arguments.iter());
                places
            }
            InstructionValue::Element {
                props, children, ..
            } => {
                let mut places: Vec<&Place> = props.iter().map(|(_, place)| place).collect();
                places.extend(children.iter());
                places
            }
            InstructionValue::Fragment { children } => children.iter().collect(),
            InstructionValue::Conditional {
                test,
                consequent,
                alternate,
            } => vec![test, consequent, alternate],
            InstructionValue::Logical { left, right, .. } => vec![left, right],
            InstructionValue::Sequence { values } => values.iter().collect(),
            InstructionValue::OptionalLoad { object, .. } => vec![object],
            InstructionValue::DeclareContext { lvalue } => vec![lvalue],
            InstructionValue::FunctionExpression { context, .. } => context.iter().collect(),
        }
    }

    /// Mutable version of [`InstructionValue::operands`]
    pub fn operands_mut(&mut self) -> Vec<&mut Place> {
        match self {
            InstructionValue::Primitive { .. } | InstructionValue::LoadGlobal { .. } => vec![],
            InstructionValue::LoadLocal { place } => vec![place],
            InstructionValue::StoreLocal { lvalue, value, .. } => vec![value, lvalue],
            InstructionValue::PropertyLoad { object, .. } => vec![object],
            InstructionValue::PropertyStore { object, value, .. } => vec![value, object],
            InstructionValue::ComputedLoad { object, index } => vec![object, index],
            InstructionValue::ComputedStore {
                object,
                index,
                value,
            } => vec![index, value, object],
            InstructionValue::Destructure {
                bindings, value, ..
            } => {
                let mut places = vec![value];
                places.extend(bindings.iter_mut().map(|b| &mut b.place));
                places
            }
            InstructionValue::Binary { left, right, .. } => vec![left, right],
            InstructionValue::Call { callee, arguments } => {
                let mut places = vec![callee];
                places.extend(arguments.iter_mut());
                places
            }
            InstructionValue::MethodCall {
                receiver,
                arguments,
                ..
            } => {
                let mut places = vec![receiver];
                places.extend(arguments.iter_mut());
                places
            }
            InstructionValue::Array { elements } => elements.iter_mut().collect(),
            InstructionValue::Object { properties } => {
                properties.iter_mut().map(|(_, place)| place).collect()
            }
            InstructionValue::New { callee, arguments } => {
                let mut places = vec![callee];
                places.extend(arguments.iter_mut());
                places
            }
            InstructionValue::Element {
                props, children, ..
            } => {
                let mut places: Vec<&mut Place> =
                    props.iter_mut().map(|(_, place)| place).collect();
                places.extend(children.iter_mut());
                places
            }
            InstructionValue::Fragment { children } => children.iter_mut().collect(),
            InstructionValue::Conditional {
                test,
                consequent,
                alternate,
            } => vec![test, consequent, alternate],
            InstructionValue::Logical { left, right, .. } => vec![left, right],
            InstructionValue::Sequence { values } => values.iter_mut().collect(),
            InstructionValue::OptionalLoad { object, .. } => vec![object],
            InstructionValue::DeclareContext { lvalue } => vec![lvalue],
            InstructionValue::FunctionExpression { context, .. } => context.iter_mut().collect(),
        }
    }

    /// Whether this value allocates a fresh object on every evaluation
    pub fn allocates(&self) -> bool {
        matches!(
            self,
            InstructionValue::Array { .. }
                | InstructionValue::Object { .. }
                | InstructionValue::New { .. }
                | InstructionValue::Element { .. }
                | InstructionValue::Fragment { .. }
        )
    }

    /// Whether re-evaluating this value can have observable side effects
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            InstructionValue::Primitive { .. }
                | InstructionValue::LoadLocal { .. }
                | InstructionValue::LoadGlobal { .. }
                | InstructionValue::Binary { .. }
        )
    }
}

/// One instruction in a basic block
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub id: InstructionId,
    /// Result binding, if the value is named or fed into later instructions
    pub lvalue: Option<Place>,
    pub value: InstructionValue,
    pub span: Span,
}

impl Instruction {
    /// Every place this instruction defines: the result lvalue plus
    /// store-style and destructure bindings
    pub fn lvalues(&self) -> Vec<&Place> {
        let mut places: Vec<&Place> = self.lvalue.iter().collect();
        match &self.value {
            InstructionValue::StoreLocal { lvalue, .. } => places.push(lvalue),
            InstructionValue::Destructure { bindings, .. } => {
                places.extend(bindings.iter().map(|b| &b.place));
            }
            InstructionValue::DeclareContext { lvalue } => places.push(lvalue),
            _ => {}
        }
        places
    }

    /// Mutable version of [`Instruction::lvalues`]
    pub fn lvalues_mut(&mut self) -> Vec<&mut Place> {
        let mut places: Vec<&mut Place> = self.lvalue.iter_mut().collect();
        match &mut self.value {
            InstructionValue::StoreLocal { lvalue, .. } => places.push(lvalue),
            InstructionValue::Destructure { bindings, .. } => {
                places.extend(bindings.iter_mut().map(|b| &mut b.place));
            }
            InstructionValue::DeclareContext { lvalue } => places.push(lvalue),
            _ => {}
        }
        places
    }

    /// Identifiers defined by this instruction
    pub fn defined_identifiers(&self) -> Vec<IdentifierId> {
        self.lvalues().into_iter().map(|p| p.identifier).collect()
    }
}
