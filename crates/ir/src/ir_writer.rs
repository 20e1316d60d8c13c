//! Plain-text rendering of functions, for diagnostics and test output.

use std::fmt::Write;

use crate::{Function, FuncRef, Inst, Module, Value, ValueId};

/// Renders one function as stable, human-oriented text.
pub fn dump_func(module: &Module, func_ref: FuncRef) -> String {
    let func = module.func(func_ref);
    let mut out = String::new();

    let sig = &func.sig;
    let args = sig
        .args()
        .iter()
        .map(|ty| format!("{ty:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = write!(
        &mut out,
        "func {} %{}({args}) -> {:?}",
        sig.linkage(),
        sig.name(),
        sig.ret_ty()
    );

    if !func.has_body() {
        out.push_str(";\n");
        return out;
    }

    out.push_str(" {\n");
    for block in func.layout.iter_block() {
        let _ = writeln!(&mut out, "  block{}:", block.0);
        for inst_id in func.layout.iter_inst(block) {
            out.push_str("    ");
            if let Some(res) = func.dfg.inst_result(inst_id) {
                let _ = write!(&mut out, "{} = ", fmt_value(func, res));
            }
            out.push_str(func.dfg.inst(inst_id).as_text());
            write_operands(module, func, func.dfg.inst(inst_id), &mut out);
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

fn write_operands(module: &Module, func: &Function, inst: &Inst, out: &mut String) {
    match inst {
        Inst::Call { callee, args } => {
            let _ = write!(out, " %{}", module.func(*callee).sig.name());
            for &arg in args {
                let _ = write!(out, " {}", fmt_value(func, arg));
            }
        }
        Inst::FuncAddr { func: target } => {
            let _ = write!(out, " %{}", module.func(*target).sig.name());
        }
        Inst::Alloca { ty, count, align } => {
            let _ = write!(out, " {ty:?}");
            if let Some(count) = count {
                let _ = write!(out, " count={}", fmt_value(func, *count));
            }
            let _ = write!(out, " align={align}");
        }
        Inst::Jump { dest } => {
            let _ = write!(out, " block{}", dest.0);
        }
        Inst::Br {
            cond,
            then_dest,
            else_dest,
        } => {
            let _ = write!(
                out,
                " {} block{} block{}",
                fmt_value(func, *cond),
                then_dest.0,
                else_dest.0
            );
        }
        _ => {
            let mut operands = Vec::new();
            inst.for_each_value(&mut |value| operands.push(value));
            for value in operands {
                let _ = write!(out, " {}", fmt_value(func, value));
            }
        }
    }
}

fn fmt_value(func: &Function, value: ValueId) -> String {
    match func.dfg.value(value) {
        Value::Immediate { imm, .. } => format!("{imm}"),
        Value::Undef { .. } => "undef".to_string(),
        _ => format!("v{}", value.0),
    }
}
