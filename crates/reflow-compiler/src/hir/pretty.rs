//! Pretty-printing for the graph IR
//!
//! Human-readable output for debugging; tests also use it for cheap
//! structural assertions.

use super::block::TerminalKind;
use super::function::HirFunction;
use super::instr::{Instruction, InstructionValue, PatternKey, PropertyKey};
use std::fmt::Write;

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for HirFunction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        writeln!(
            output,
            "fn {}({}) {{",
            self.name.as_deref().unwrap_or("<anonymous>"),
            params.join(", ")
        )
        .unwrap();
        for block in &self.blocks {
            writeln!(output, "{}:", block.id).unwrap();
            for phi in &block.phis {
                let operands: Vec<String> = phi
                    .operands
                    .iter()
                    .map(|(pred, place)| format!("{pred}: {place}"))
                    .collect();
                writeln!(output, "  {} = phi({})", phi.place, operands.join(", ")).unwrap();
            }
            for instruction in &block.instructions {
                writeln!(output, "  {}", instruction.pretty_print()).unwrap();
            }
            writeln!(output, "  {}", print_terminal(&block.terminal.kind)).unwrap();
        }
        output.push_str("}\n");
        output
    }
}

impl PrettyPrint for Instruction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        write!(output, "{} ", self.id).unwrap();
        if let Some(lvalue) = &self.lvalue {
            write!(output, "{lvalue} = ").unwrap();
        }
        output.push_str(&print_value(&self.value));
        output
    }
}

fn print_value(value: &InstructionValue) -> String {
    match value {
        InstructionValue::Primitive { value } => value.to_string(),
        InstructionValue::LoadLocal { place } => format!("load {place}"),
        InstructionValue::LoadGlobal { name } => format!("global {name}"),
        InstructionValue::StoreLocal { lvalue, value, kind } => {
            format!("store({kind:?}) {lvalue} <- {value}")
        }
        InstructionValue::PropertyLoad { object, property } => format!("{object}.{property}"),
        InstructionValue::PropertyStore {
            object,
            property,
            value,
        } => format!("{object}.{property} <- {value}"),
        InstructionValue::ComputedLoad { object, index } => format!("{object}[{index}]"),
        InstructionValue::ComputedStore {
            object,
            index,
            value,
        } => format!("{object}[{index}] <- {value}"),
        InstructionValue::Destructure {
            bindings, value, ..
        } => {
            let parts: Vec<String> = bindings
                .iter()
                .map(|b| match &b.key {
                    PatternKey::Index(i) => format!("{}: {}", i, b.place),
                    PatternKey::Named(name) => format!("{}: {}", name, b.place),
                })
                .collect();
            format!("destructure {{{}}} <- {}", parts.join(", "), value)
        }
        InstructionValue::Binary { op, left, right } => format!("{left} {op:?} {right}"),
        InstructionValue::Call { callee, arguments } => {
            format!("call {}({})", callee, print_places(arguments))
        }
        InstructionValue::MethodCall {
            receiver,
            property,
            arguments,
        } => format!("call {}.{}({})", receiver, property, print_places(arguments)),
        InstructionValue::Array { elements } => format!("[{}]", print_places(elements)),
        InstructionValue::Object { properties } => {
            let parts: Vec<String> = properties
                .iter()
                .map(|(key, place)| match key {
                    PropertyKey::Named(name) => format!("{name}: {place}"),
                    PropertyKey::Spread => format!("...{place}"),
                })
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        InstructionValue::New { callee, arguments } => {
            format!("new {}({})", callee, print_places(arguments))
        }
        InstructionValue::Element { tag, props, children } => {
            let attrs: Vec<String> = props
                .iter()
                .map(|(name, place)| format!("{name}={place}"))
                .collect();
            format!("<{} {}>[{}]", tag, attrs.join(" "), print_places(children))
        }
        InstructionValue::Fragment { children } => format!("<>[{}]", print_places(children)),
        InstructionValue::Conditional {
            test,
            consequent,
            alternate,
        } => format!("{test} ? {consequent} : {alternate}"),
        InstructionValue::Logical { op, left, right } => format!("{left} {op:?} {right}"),
        InstructionValue::Sequence { values } => format!("seq({})", print_places(values)),
        InstructionValue::OptionalLoad { object, property } => format!("{object}?.{property}"),
        InstructionValue::DeclareContext { lvalue } => format!("declare-context {lvalue}"),
        InstructionValue::FunctionExpression { name, context, .. } => format!(
            "function {}[{}]",
            name.as_deref().unwrap_or("<anonymous>"),
            print_places(context)
        ),
    }
}

fn print_places(places: &[super::place::Place]) -> String {
    places
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_terminal(kind: &TerminalKind) -> String {
    match kind {
        TerminalKind::Goto { block, kind } => format!("goto {block} ({kind:?})"),
        TerminalKind::If {
            test,
            consequent,
            alternate,
            fallthrough,
        } => match alternate {
            Some(alternate) => {
                format!("if {test} ? {consequent} : {alternate} -> {fallthrough}")
            }
            None => format!("if {test} ? {consequent} -> {fallthrough}"),
        },
        TerminalKind::Switch {
            test, fallthrough, ..
        } => format!("switch {test} -> {fallthrough}"),
        TerminalKind::While {
            test,
            body,
            fallthrough,
        } => format!("while test={test} body={body} -> {fallthrough}"),
        TerminalKind::DoWhile {
            body,
            test,
            fallthrough,
        } => format!("do-while body={body} test={test} -> {fallthrough}"),
        TerminalKind::For {
            init,
            test,
            update,
            body,
            fallthrough,
        } => format!(
            "for init={init} test={test} update={update:?} body={body} -> {fallthrough}"
        ),
        TerminalKind::ForOf {
            iterable,
            body,
            fallthrough,
            ..
        } => format!("for-of {iterable} body={body} -> {fallthrough}"),
        TerminalKind::ForIn {
            object,
            body,
            fallthrough,
            ..
        } => format!("for-in {object} body={body} -> {fallthrough}"),
        TerminalKind::Label { block, fallthrough } => {
            format!("label {block} -> {fallthrough}")
        }
        TerminalKind::Try {
            block,
            handler,
            fallthrough,
            ..
        } => format!("try {block} catch {handler} -> {fallthrough}"),
        TerminalKind::Return { value } => match value {
            Some(value) => format!("return {value}"),
            None => "return".to_string(),
        },
        TerminalKind::Throw { value } => format!("throw {value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::builder::FunctionBuilder;
    use crate::hir::block::TerminalKind;
    use crate::hir::instr::InstructionValue;

    #[test]
    fn test_pretty_print_smoke() {
        let mut b = FunctionBuilder::new("f");
        let props = b.param("props");
        let t = b.emit(InstructionValue::PropertyLoad {
            object: b.read(props),
            property: "title".to_string(),
        });
        b.terminate(TerminalKind::Return {
            value: Some(b.read(t)),
        });
        let func = b.finish().unwrap();
        let output = func.pretty_print();
        assert!(output.contains("fn f"));
        assert!(output.contains(".title"));
        assert!(output.contains("return"));
    }
}
