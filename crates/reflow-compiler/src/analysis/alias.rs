//! Mutable aliasing analysis
//!
//! Builds a union-find over identifiers: any lvalue that captures or
//! conditionally mutates an existing identifier is unioned with it, because
//! a later mutation of one must be visible through the other. The disjoint
//! set is arena-indexed (plain parent/rank vectors over identifier ids)
//! rather than pointer-linked.

use crate::hir::{HirFunction, IdentifierId};

/// Array-backed disjoint set over identifier ids
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// Create a disjoint set with `size` singleton classes
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![0; size],
        }
    }

    fn ensure(&mut self, id: IdentifierId) {
        let needed = id.as_u32() as usize + 1;
        while self.parent.len() < needed {
            self.parent.push(self.parent.len() as u32);
            self.rank.push(0);
        }
    }

    /// Canonical representative of `id`'s class, with path compression
    pub fn find(&mut self, id: IdentifierId) -> IdentifierId {
        self.ensure(id);
        let mut root = id.as_u32();
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Compress the walked path
        let mut current = id.as_u32();
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        IdentifierId(root)
    }

    /// Merge the classes of `a` and `b`
    pub fn union(&mut self, a: IdentifierId, b: IdentifierId) {
        let root_a = self.find(a).as_u32() as usize;
        let root_b = self.find(b).as_u32() as usize;
        if root_a == root_b {
            return;
        }
        // Union by rank keeps the forest shallow
        if self.rank[root_a] < self.rank[root_b] {
            self.parent[root_a] = root_b as u32;
        } else if self.rank[root_a] > self.rank[root_b] {
            self.parent[root_b] = root_a as u32;
        } else {
            self.parent[root_b] = root_a as u32;
            self.rank[root_a] += 1;
        }
    }

    /// Whether `a` and `b` are in the same class
    pub fn same_set(&mut self, a: IdentifierId, b: IdentifierId) -> bool {
        self.find(a) == self.find(b)
    }
}

/// Run the aliasing analysis over `func`.
///
/// Single forward walk: blocks in reverse postorder, instructions in
/// program order. Unions only merge classes, so the parent structure stays
/// a forest.
pub fn analyze_aliases(func: &HirFunction) -> DisjointSet {
    let mut aliases = DisjointSet::new(func.next_identifier_id as usize);
    for block in &func.blocks {
        for instruction in &block.instructions {
            let defined = instruction.defined_identifiers();
            if defined.is_empty() {
                continue;
            }
            for operand in instruction.value.operands() {
                let aliasing = operand.effect.is_some_and(|effect| effect.is_aliasing());
                if !aliasing {
                    continue;
                }
                for &def in &defined {
                    if def != operand.identifier {
                        aliases.union(def, operand.identifier);
                    }
                }
            }
        }
    }
    aliases
}
