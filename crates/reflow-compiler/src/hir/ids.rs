//! Identifier newtypes for the graph IR
//!
//! Scope ranges are expressed in instruction-id space, so terminals occupy
//! instruction ids as well.

use std::fmt;

/// Identifies a variable or temporary within one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentifierId(pub u32);

impl IdentifierId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for IdentifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Identifies an instruction or terminal; ordered by program position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionId(pub u32);

impl InstructionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// The next instruction id in program order
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Basic block identifier; doubles as a label id in the reactive tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Reactive scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A half-open range `[start, end)` of instruction ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionRange {
    pub start: InstructionId,
    pub end: InstructionId,
}

impl InstructionRange {
    pub fn new(start: InstructionId, end: InstructionId) -> Self {
        Self { start, end }
    }

    /// Whether `id` falls inside this range
    pub fn contains(&self, id: InstructionId) -> bool {
        self.start <= id && id < self.end
    }

    /// Number of instruction ids covered
    pub fn len(&self) -> u32 {
        self.end.as_u32().saturating_sub(self.start.as_u32())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `other` is entirely inside this range
    pub fn encloses(&self, other: InstructionRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one instruction id
    pub fn overlaps(&self, other: InstructionRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for InstructionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(IdentifierId(3).to_string(), "x3");
        assert_eq!(InstructionId(7).to_string(), "i7");
        assert_eq!(BlockId(0).to_string(), "bb0");
        assert_eq!(ScopeId(2).to_string(), "s2");
    }

    #[test]
    fn test_range_contains() {
        let r = InstructionRange::new(InstructionId(2), InstructionId(5));
        assert!(!r.contains(InstructionId(1)));
        assert!(r.contains(InstructionId(2)));
        assert!(r.contains(InstructionId(4)));
        assert!(!r.contains(InstructionId(5)));
    }

    #[test]
    fn test_range_nesting() {
        let outer = InstructionRange::new(InstructionId(0), InstructionId(10));
        let inner = InstructionRange::new(InstructionId(2), InstructionId(5));
        let partial = InstructionRange::new(InstructionId(4), InstructionId(12));
        assert!(outer.encloses(inner));
        assert!(!inner.encloses(outer));
        assert!(outer.overlaps(partial));
        assert!(!outer.encloses(partial));
    }
}
