//! Reactive value inference
//!
//! Monotonic fixpoint over a working set of reactive identifier classes.
//! Seeds with the function parameters, then sweeps the blocks in a fixed
//! order until no sweep adds a fact. Selection by a reactive condition is
//! itself a source of reactivity, so blocks reached only through such a
//! branch taint the phis and mutations inside them even when every operand
//! value is a constant.
//!
//! This is the only pass in the pipeline that writes `Place::reactive`;
//! every later consumer reads the flag without re-deriving it.

use super::alias::DisjointSet;
use crate::env::{Environment, StableKind};
use crate::error::{CompileError, CompileResult};
use crate::hir::{
    BlockId, DominatorTree, HirFunction, IdentifierId, Instruction, InstructionValue, PatternKey,
    Place, TerminalKind,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Run reactive value inference over `func`.
///
/// `doms` is the dominator tree supplied by the upstream producer and
/// `aliases` the result of the aliasing analysis; facts are recorded on
/// alias-class representatives so that marking one member of a class marks
/// them all.
pub fn infer_reactive_places(
    func: &mut HirFunction,
    aliases: &mut DisjointSet,
    doms: &DominatorTree,
    env: &Environment,
) -> CompileResult<()> {
    let mut state = InferenceState {
        aliases,
        env,
        reactive: FxHashSet::default(),
        stable: FxHashSet::default(),
        pair_results: FxHashSet::default(),
        globals: FxHashMap::default(),
    };

    // Seed: parameters may differ between invocations by definition
    for param in &mut func.params {
        let canonical = state.aliases.find(param.identifier);
        state.reactive.insert(canonical);
        param.reactive = true;
    }

    let max_sweeps = (func.identifiers.len() * func.blocks.len()).max(1);
    let mut sweeps = 0usize;
    loop {
        sweeps += 1;
        if sweeps > max_sweeps {
            return Err(CompileError::invariant(
                "reactivity fixpoint did not converge",
                func.span,
            )
            .with_description(format!(
                "exceeded the sweep budget of {max_sweeps}; the transfer functions are \
                 expected to be monotone"
            )));
        }

        // Conditions become reactive as the fixpoint grows, so the set of
        // control-dominated blocks is refreshed every sweep.
        let dominated = control_dominated_blocks(func, doms, &mut state);

        let mut changed = false;
        for index in 0..func.blocks.len() {
            let block_id = func.blocks[index].id;
            let block_dominated = dominated.contains(&block_id);
            let block = &mut func.blocks[index];

            for phi in &mut block.phis {
                let mut any_reactive = false;
                for (pred, operand) in &mut phi.operands {
                    let canonical = state.aliases.find(operand.identifier);
                    if state.reactive.contains(&canonical) && !operand.reactive {
                        operand.reactive = true;
                        changed = true;
                    }
                    any_reactive |= operand.reactive || dominated.contains(pred);
                }
                if any_reactive {
                    changed |= state.mark(&mut phi.place);
                }
            }

            for instruction in &mut block.instructions {
                changed |= state.visit_instruction(instruction, block_dominated)?;
            }

            changed |= state.visit_terminal_operands(
                &mut func.blocks[index],
                block_dominated,
            )?;
        }

        if !changed {
            break;
        }
    }

    // Outer reactivity is final here; one top-down pass pushes it into
    // nested function literals without another fixpoint.
    propagate_into_nested_functions(func, &state.reactive.clone(), state.aliases);
    Ok(())
}

struct InferenceState<'a> {
    aliases: &'a mut DisjointSet,
    env: &'a Environment,
    /// Canonical ids of reactive alias classes; only ever grows
    reactive: FxHashSet<IdentifierId>,
    /// Canonical ids exempt from the lvalue rule (stable identities)
    stable: FxHashSet<IdentifierId>,
    /// Canonical ids holding a value-and-stable-setter pair
    pair_results: FxHashSet<IdentifierId>,
    /// Canonical ids of temporaries holding a known global, by name
    globals: FxHashMap<IdentifierId, String>,
}

impl InferenceState<'_> {
    /// Mark one place reactive, recording the fact on its alias class.
    /// Returns whether anything new was learned.
    fn mark(&mut self, place: &mut Place) -> bool {
        let canonical = self.aliases.find(place.identifier);
        let mut changed = self.reactive.insert(canonical);
        if !place.reactive {
            place.reactive = true;
            changed = true;
        }
        changed
    }

    /// Refresh the stable-value bookkeeping for this instruction. Runs
    /// before the reactivity rules because stability can depend on earlier
    /// flow (a destructure of a pair result produced this sweep).
    fn refresh_stability(&mut self, instruction: &Instruction) {
        match &instruction.value {
            InstructionValue::LoadGlobal { name } => {
                if let Some(lvalue) = &instruction.lvalue {
                    let canonical = self.aliases.find(lvalue.identifier);
                    self.globals.insert(canonical, name.clone());
                }
            }
            InstructionValue::Call { callee, .. } => {
                let Some(lvalue) = &instruction.lvalue else {
                    return;
                };
                let callee_class = self.aliases.find(callee.identifier);
                let Some(name) = self.globals.get(&callee_class) else {
                    return;
                };
                let result = self.aliases.find(lvalue.identifier);
                match self.env.stable_kind(name) {
                    Some(StableKind::Identity) => {
                        self.stable.insert(result);
                    }
                    Some(StableKind::SetterPair) => {
                        self.pair_results.insert(result);
                    }
                    None => {}
                }
            }
            InstructionValue::Destructure {
                bindings, value, ..
            } => {
                let source = self.aliases.find(value.identifier);
                if !self.pair_results.contains(&source) {
                    return;
                }
                for binding in bindings {
                    if matches!(binding.key, PatternKey::Index(1)) {
                        let canonical = self.aliases.find(binding.place.identifier);
                        self.stable.insert(canonical);
                    }
                }
            }
            _ => {}
        }
    }

    fn is_source_call(&mut self, value: &InstructionValue) -> bool {
        if let InstructionValue::Call { callee, .. } = value {
            let canonical = self.aliases.find(callee.identifier);
            if let Some(name) = self.globals.get(&canonical) {
                return self.env.is_reactive_source(name);
            }
        }
        false
    }

    fn visit_instruction(
        &mut self,
        instruction: &mut Instruction,
        block_dominated: bool,
    ) -> CompileResult<bool> {
        self.refresh_stability(instruction);

        let mut changed = false;
        let mut has_reactive_input = self.is_source_call(&instruction.value);

        // Visit every operand even after the instruction is known reactive
        // so each individual flag stays accurate for later consumers.
        for operand in instruction.value.operands_mut() {
            let effect = operand.effect.ok_or_else(|| {
                CompileError::invariant("operand with unresolved effect", operand.span)
                    .with_description(format!(
                        "operand {} reached reactivity inference without an effect",
                        operand.identifier
                    ))
            })?;
            let canonical = self.aliases.find(operand.identifier);
            if self.reactive.contains(&canonical) {
                if !operand.reactive {
                    operand.reactive = true;
                    changed = true;
                }
                if effect != crate::hir::Effect::Store {
                    has_reactive_input = true;
                }
            }
        }

        if has_reactive_input {
            for lvalue in instruction.lvalues_mut() {
                let canonical = self.aliases.find(lvalue.identifier);
                if self.stable.contains(&canonical) {
                    continue;
                }
                if self.reactive.insert(canonical) {
                    changed = true;
                }
                if !lvalue.reactive {
                    lvalue.reactive = true;
                    changed = true;
                }
            }
        }

        // Mutation under reactive influence taints the mutated value
        if has_reactive_input || block_dominated {
            for operand in instruction.value.operands_mut() {
                let mutating = operand.effect.is_some_and(|effect| effect.is_mutating());
                if mutating {
                    changed |= self.mark(operand);
                }
            }
        }

        Ok(changed)
    }

    fn visit_terminal_operands(
        &mut self,
        block: &mut crate::hir::BasicBlock,
        block_dominated: bool,
    ) -> CompileResult<bool> {
        let mut changed = false;
        let mut has_reactive_input = false;
        for operand in block.terminal.operands_mut() {
            let effect = operand.effect.ok_or_else(|| {
                CompileError::invariant("operand with unresolved effect", operand.span)
            })?;
            let canonical = self.aliases.find(operand.identifier);
            if self.reactive.contains(&canonical) {
                if !operand.reactive {
                    operand.reactive = true;
                    changed = true;
                }
                if effect != crate::hir::Effect::Store {
                    has_reactive_input = true;
                }
            }
        }
        if has_reactive_input || block_dominated {
            for operand in block.terminal.operands_mut() {
                let mutating = operand.effect.is_some_and(|effect| effect.is_mutating());
                if mutating {
                    changed |= self.mark(operand);
                }
            }
        }
        Ok(changed)
    }
}

/// Blocks reached only through a branch whose condition is reactive.
///
/// A block is controlled by a branch when it is dominated by one of the
/// branch's selected successors (the arms, never the fallthrough join: the
/// join runs regardless of which way the branch went).
fn control_dominated_blocks(
    func: &HirFunction,
    doms: &DominatorTree,
    state: &mut InferenceState<'_>,
) -> FxHashSet<BlockId> {
    let mut result = FxHashSet::default();
    for block in &func.blocks {
        let Some((condition, controlled)) = controlled_successors(&block.terminal.kind) else {
            continue;
        };
        let canonical = state.aliases.find(condition.identifier);
        if !state.reactive.contains(&canonical) {
            continue;
        }
        for successor in controlled {
            for candidate in &func.blocks {
                if doms.dominates(successor, candidate.id) {
                    result.insert(candidate.id);
                }
            }
        }
    }
    result
}

/// The selecting condition and the successors whose execution it decides
fn controlled_successors(kind: &TerminalKind) -> Option<(&Place, Vec<BlockId>)> {
    match kind {
        TerminalKind::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            let mut blocks = vec![*consequent];
            if let Some(alternate) = alternate {
                blocks.push(*alternate);
            }
            Some((test, blocks))
        }
        TerminalKind::Switch { test, cases, .. } => {
            Some((test, cases.iter().map(|case| case.block).collect()))
        }
        TerminalKind::ForOf { iterable, body, .. } => Some((iterable, vec![*body])),
        TerminalKind::ForIn { object, body, .. } => Some((object, vec![*body])),
        TerminalKind::Goto { .. }
        | TerminalKind::While { .. }
        | TerminalKind::DoWhile { .. }
        | TerminalKind::For { .. }
        | TerminalKind::Label { .. }
        | TerminalKind::Try { .. }
        | TerminalKind::Return { .. }
        | TerminalKind::Throw { .. } => None,
    }
}

/// Push final outer reactivity into nested function literals
fn propagate_into_nested_functions(
    func: &mut HirFunction,
    reactive: &FxHashSet<IdentifierId>,
    aliases: &mut DisjointSet,
) {
    for block in &mut func.blocks {
        for instruction in &mut block.instructions {
            if let InstructionValue::FunctionExpression {
                context, function, ..
            } = &mut instruction.value
            {
                for place in context.iter_mut() {
                    if reactive.contains(&aliases.find(place.identifier)) {
                        place.reactive = true;
                    }
                }
                mark_inherited(function, reactive, aliases);
            }
        }
    }
}

fn mark_inherited(
    func: &mut HirFunction,
    reactive: &FxHashSet<IdentifierId>,
    aliases: &mut DisjointSet,
) {
    for block in &mut func.blocks {
        for phi in &mut block.phis {
            for (_, operand) in &mut phi.operands {
                if reactive.contains(&aliases.find(operand.identifier)) {
                    operand.reactive = true;
                }
            }
        }
        for instruction in &mut block.instructions {
            for operand in instruction.value.operands_mut() {
                if reactive.contains(&aliases.find(operand.identifier)) {
                    operand.reactive = true;
                }
            }
            if let InstructionValue::FunctionExpression { function, .. } = &mut instruction.value {
                mark_inherited(function, reactive, aliases);
            }
        }
        for operand in block.terminal.operands_mut() {
            if reactive.contains(&aliases.find(operand.identifier)) {
                operand.reactive = true;
            }
        }
    }
}
