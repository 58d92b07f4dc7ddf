use std::fmt::Write;

use colored::Colorize;
use itertools::Itertools;

use crate::{
    backend::{
        FunctionRef, ValueRef,
        lir::{self, Immediate, Instruction, ValueKind},
    },
    index::Index,
};

/// Renders a value as an instruction operand. Constants are printed inline.
struct Operand<'m>(&'m lir::Module, ValueRef);

impl core::fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Operand(module, value) = self;

        match &module.values[*value].kind {
            ValueKind::Constant(Immediate::Int(n)) => write!(f, "{}", n.to_string().purple()),
            ValueKind::Constant(Immediate::Float(n)) => write!(f, "{}", format!("{n:?}").purple()),
            ValueKind::Undefined => write!(f, "{}", "undef".purple()),
            _ => write!(f, "%{}", value.index()),
        }
    }
}

fn label(module: &lir::Module, block: crate::backend::BlockRef) -> String {
    module.blocks[block].label.clone()
}

fn instruction_to_string(module: &lir::Module, instruction: &Instruction) -> String {
    let op = |value: &ValueRef| Operand(module, *value).to_string();
    let assign = |destination: &ValueRef| format!("%{} {}", destination.index(), "=".white());

    match instruction {
        Instruction::Binary {
            destination,
            operator,
            lhs,
            rhs,
        } => format!(
            "{} {} {}, {}",
            assign(destination),
            operator.to_string().cyan(),
            op(lhs),
            op(rhs)
        ),
        Instruction::Unary {
            destination,
            operator,
            operand,
        } => format!(
            "{} {} {}",
            assign(destination),
            operator.to_string().cyan(),
            op(operand)
        ),
        Instruction::Compare {
            destination,
            predicate,
            lhs,
            rhs,
        } => format!(
            "{} {} {} {}, {}",
            assign(destination),
            "cmp".cyan(),
            predicate,
            op(lhs),
            op(rhs)
        ),
        Instruction::Cast {
            destination,
            kind,
            operand,
            ty,
        } => format!(
            "{} {} {} to {ty}",
            assign(destination),
            kind.to_string().cyan(),
            op(operand)
        ),
        Instruction::Select {
            destination,
            condition,
            if_true,
            if_false,
        } => format!(
            "{} {} {}, {}, {}",
            assign(destination),
            "select".cyan(),
            op(condition),
            op(if_true),
            op(if_false)
        ),
        Instruction::Call {
            destination,
            function,
            arguments,
        } => {
            let call = format!(
                "{} {}({})",
                "call".cyan(),
                module.functions[*function].signature.symbol.value().blue(),
                arguments.iter().map(op).join(", ")
            );

            match destination {
                Some(destination) => format!("{} {call}", assign(destination)),
                None => call,
            }
        }
        Instruction::Branch {
            condition,
            positive,
            negative,
        } => format!(
            "{} {}, {}, {}",
            "br".cyan(),
            op(condition),
            label(module, *positive).bright_red(),
            label(module, *negative).bright_red()
        ),
        Instruction::Jump { destination } => {
            format!("{} {}", "jmp".cyan(), label(module, *destination).bright_red())
        }
        Instruction::Return { value: Some(value) } => format!("{} {}", "ret".cyan(), op(value)),
        Instruction::Return { value: None } => "ret".cyan().to_string(),
        Instruction::Unreachable => "unreachable".cyan().to_string(),
    }
}

fn join_to_string(module: &lir::Module, join: ValueRef) -> String {
    let value = &module.values[join];

    let incoming = module
        .incoming(join)
        .iter()
        .map(|(block, v)| format!("[{}, {}]", Operand(module, *v), label(module, *block)))
        .join(", ");

    format!(
        "%{} {} {} {} {incoming}",
        join.index(),
        "=".white(),
        "join".cyan(),
        value.ty
    )
}

pub fn pretty_print_function(module: &lir::Module, function: FunctionRef) -> String {
    let function = &module.functions[function];
    let mut out = String::new();

    let parameters = function
        .parameters
        .iter()
        .map(|p| format!("%{}: {}", p.index(), module.values[*p].ty))
        .join(", ");

    let _ = writeln!(
        out,
        "{} {}{}{}{} -> {} {}",
        "fn".magenta(),
        function.signature.symbol.value().blue(),
        "(".white(),
        parameters,
        ")".white(),
        function.signature.return_type,
        "{".white()
    );

    for block in function.blocks.iter().map(|b| &module.blocks[*b]) {
        let _ = writeln!(out, "{}", format!("{}:", block.label).bright_red());

        for join in &block.joins {
            let _ = writeln!(out, "    {}", join_to_string(module, *join));
        }

        for instruction in &block.instructions {
            let _ = writeln!(out, "    {}", instruction_to_string(module, instruction));
        }
    }

    let _ = writeln!(out, "{}", "}".white());
    out
}

pub fn pretty_print_module(module: &lir::Module) -> String {
    let mut out = String::new();

    for structure in module.structures.iter() {
        let _ = writeln!(
            out,
            "{} {} {{ {} }}",
            "struct".magenta(),
            structure.name.value().blue(),
            structure.members.iter().join(", ")
        );
    }

    for function in module.functions.indices() {
        // Declared-only functions have no body to print
        if module.functions[function].blocks.is_empty() {
            continue;
        }

        out.push_str(&pretty_print_function(module, function));
    }

    out
}
