//! The mechanical body cloner behind the driver's `InlineFunction` seam.
//!
//! [`SpliceCloner`] substitutes straight-line single-block callee bodies at
//! the call site: operands are remapped through a value map, static stack
//! slots are hoisted to the caller's entry block, the call result is aliased
//! to the mapped return value, and the call instruction is erased. Anything
//! it cannot splice (multi-block bodies, stray branches, argument-count
//! mismatches) it refuses without mutating the caller; refusal is non-fatal
//! and the driver records the site as not inlined.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::smallvec;
use toccata_ir::{
    FuncRef, Immediate, Inst, InstId, IntrinsicKind, Module, Type, Value, ValueId,
};

/// Results of one successful inlining, reported back to the driver.
#[derive(Debug, Default)]
pub struct InlineFunctionInfo {
    /// Static stack slots the inlining contributed to the caller.
    pub static_allocas: Vec<InstId>,
    /// Call sites now present in the caller because the callee body
    /// contained them.
    pub inlined_call_sites: Vec<InstId>,
}

impl InlineFunctionInfo {
    pub fn clear(&mut self) {
        self.static_allocas.clear();
        self.inlined_call_sites.clear();
    }
}

/// Capability for substituting a call site with the callee body.
pub trait BodyCloner {
    /// On success the call site is gone, `info` describes the new caller
    /// contents, and the caller's IR is consistent. On failure the caller is
    /// untouched.
    fn inline_function(
        &mut self,
        module: &mut Module,
        caller: FuncRef,
        call_inst: InstId,
        info: &mut InlineFunctionInfo,
        insert_lifetime: bool,
    ) -> bool;
}

#[derive(Debug, Default)]
pub struct SpliceCloner;

impl BodyCloner for SpliceCloner {
    fn inline_function(
        &mut self,
        module: &mut Module,
        caller: FuncRef,
        call_inst: InstId,
        info: &mut InlineFunctionInfo,
        insert_lifetime: bool,
    ) -> bool {
        let func = module.func(caller);
        let Inst::Call { callee, args } = func.dfg.inst(call_inst) else {
            return false;
        };
        let callee = *callee;
        let call_args: Vec<ValueId> = args.iter().copied().collect();
        let call_res = func.dfg.inst_result(call_inst);

        let Some(plan) = analyze_callee(module, callee) else {
            return false;
        };
        if plan.callee_args.len() != call_args.len() {
            return false;
        }
        if call_res.is_some() && plan.ret_value.is_none() {
            return false;
        }

        apply_plan(module, caller, call_inst, &call_args, call_res, plan, info, insert_lifetime);
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum ConstTemplate {
    Imm(Immediate),
    Undef(Type),
}

struct TemplateInst {
    inst: Inst,
    result: Option<(ValueId, Type)>,
}

struct BodyPlan {
    callee_args: Vec<ValueId>,
    const_values: Vec<(ValueId, ConstTemplate)>,
    body: Vec<TemplateInst>,
    ret_value: Option<ValueId>,
}

/// Reads the callee and builds a self-contained splice plan, or refuses.
/// Everything the apply step needs is cloned out, so the plan stays valid
/// even when the callee IS the caller.
fn analyze_callee(module: &Module, callee: FuncRef) -> Option<BodyPlan> {
    let func = module.func(callee);
    if !func.sig.linkage().has_definition() || !func.has_body() {
        return None;
    }

    let mut blocks = func.layout.iter_block();
    let entry = blocks.next()?;
    if blocks.next().is_some() {
        return None;
    }

    let insts: Vec<InstId> = func.layout.iter_inst(entry).collect();
    let (&term, body_insts) = insts.split_last()?;
    let Inst::Return { arg: ret_value } = func.dfg.inst(term) else {
        return None;
    };
    let ret_value = *ret_value;

    let mut const_values: Vec<(ValueId, ConstTemplate)> = Vec::new();
    let mut body = Vec::with_capacity(body_insts.len());
    for &inst_id in body_insts {
        let inst = func.dfg.inst(inst_id);
        if inst.is_terminator() {
            return None;
        }

        inst.for_each_value(&mut |value| {
            record_const_template(func, value, &mut const_values);
        });

        body.push(TemplateInst {
            inst: inst.clone(),
            result: func
                .dfg
                .inst_result(inst_id)
                .map(|res| (res, func.dfg.value_ty(res))),
        });
    }

    if let Some(ret) = ret_value {
        record_const_template(func, ret, &mut const_values);
    }

    let plan = BodyPlan {
        callee_args: func.arg_values.iter().copied().collect(),
        const_values,
        body,
        ret_value,
    };
    validate_value_flow(&plan).then_some(plan)
}

fn record_const_template(
    func: &toccata_ir::Function,
    value: ValueId,
    const_values: &mut Vec<(ValueId, ConstTemplate)>,
) {
    if const_values.iter().any(|(v, _)| *v == value) {
        return;
    }
    match func.dfg.value(value) {
        Value::Immediate { imm, .. } => const_values.push((value, ConstTemplate::Imm(*imm))),
        Value::Undef { ty } => const_values.push((value, ConstTemplate::Undef(*ty))),
        Value::Arg { .. } | Value::Inst { .. } => {}
    }
}

/// Every operand in the body must be an argument, a recorded constant, or
/// the result of an earlier body instruction.
fn validate_value_flow(plan: &BodyPlan) -> bool {
    let mut available: FxHashSet<ValueId> = plan.callee_args.iter().copied().collect();
    available.extend(plan.const_values.iter().map(|(v, _)| *v));

    for template in &plan.body {
        let mut ok = true;
        template.inst.for_each_value(&mut |value| {
            if !available.contains(&value) {
                ok = false;
            }
        });
        if !ok {
            return false;
        }
        if let Some((res, _)) = template.result {
            available.insert(res);
        }
    }

    match plan.ret_value {
        Some(ret) => available.contains(&ret),
        None => true,
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_plan(
    module: &mut Module,
    caller: FuncRef,
    call_inst: InstId,
    call_args: &[ValueId],
    call_res: Option<ValueId>,
    plan: BodyPlan,
    info: &mut InlineFunctionInfo,
    insert_lifetime: bool,
) {
    let func = module.func_mut(caller);
    let entry = func
        .layout
        .entry_block()
        .expect("caller with a call site has a body");

    let mut value_map: FxHashMap<ValueId, ValueId> = plan
        .callee_args
        .iter()
        .copied()
        .zip(call_args.iter().copied())
        .collect();
    for (old, template) in &plan.const_values {
        let new = match template {
            ConstTemplate::Imm(imm) => func.dfg.make_imm_value(*imm),
            ConstTemplate::Undef(ty) => func.dfg.make_undef_value(*ty),
        };
        value_map.insert(*old, new);
    }

    // Static stack slots are hoisted to the caller's entry block so that
    // slots contributed by sibling inlinings end up in one block and stay
    // mergeable. Their live ranges within the spliced region are bracketed
    // with lifetime markers when requested.
    let mut last_hoisted: Option<InstId> = None;
    let mut hoisted_slots: Vec<ValueId> = Vec::new();

    for template in plan.body {
        let mut inst = template.inst;
        inst.for_each_value_mut(&mut |value| {
            *value = value_map[value];
        });

        let is_static_alloca = matches!(
            inst,
            Inst::Alloca { count: None, .. }
        );
        let is_call_site = inst.call_target().is_some();

        let new_id = func.dfg.make_inst(inst);
        if is_static_alloca {
            match last_hoisted {
                Some(prev) => func.layout.insert_inst_after(new_id, prev),
                None => func.layout.prepend_inst(new_id, entry),
            }
            last_hoisted = Some(new_id);
            info.static_allocas.push(new_id);
        } else {
            func.layout.insert_inst_before(new_id, call_inst);
        }
        if is_call_site {
            info.inlined_call_sites.push(new_id);
        }

        let new_res = template.result.map(|(old_res, ty)| {
            let new_res = func.dfg.make_result(new_id, ty);
            value_map.insert(old_res, new_res);
            new_res
        });

        if is_static_alloca && insert_lifetime {
            let slot = new_res.expect("static stack slot has an address result");
            let start = func.dfg.make_inst(Inst::Intrinsic {
                kind: IntrinsicKind::LifetimeStart,
                args: smallvec![slot],
            });
            func.layout.insert_inst_before(start, call_inst);
            hoisted_slots.push(slot);
        }
    }

    if insert_lifetime {
        for slot in hoisted_slots {
            let end = func.dfg.make_inst(Inst::Intrinsic {
                kind: IntrinsicKind::LifetimeEnd,
                args: smallvec![slot],
            });
            func.layout.insert_inst_before(end, call_inst);
        }
    }

    if let (Some(call_res), Some(ret)) = (call_res, plan.ret_value) {
        let new_ret = value_map[&ret];
        if func.dfg.has_users(call_res) {
            func.dfg.replace_uses(call_res, new_ret);
        }
    }

    func.dfg.untrack_inst(call_inst);
    func.layout.remove_inst(call_inst);
}

#[cfg(test)]
mod tests {
    use toccata_ir::{Linkage, Signature, builder::test_util::*};

    use super::*;

    #[test]
    fn splices_single_block_body_and_reports_reveals() {
        let mut mb = test_module_builder();
        let callee = mb.declare_function(Signature::new(
            "callee",
            Linkage::Private,
            &[Type::I32],
            Type::I32,
        ));
        let leaf = mb.declare_function(Signature::new(
            "leaf",
            Linkage::Private,
            &[],
            Type::Unit,
        ));
        let caller = mb.declare_function(Signature::new(
            "caller",
            Linkage::Public,
            &[Type::I32],
            Type::I32,
        ));

        {
            let mut builder = mb.func_builder(callee);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            let arg = builder.args()[0];
            let one = builder.make_imm_value(1i32);
            let (_, sum) =
                builder.insert_inst_with_result(Inst::Add { lhs: arg, rhs: one }, Type::I32);
            builder.insert_inst(Inst::Call {
                callee: leaf,
                args: smallvec![],
            });
            builder.insert_inst(Inst::Return { arg: Some(sum) });
        }
        {
            let mut builder = mb.func_builder(leaf);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            builder.insert_inst(Inst::Return { arg: None });
        }
        let call;
        {
            let mut builder = mb.func_builder(caller);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            let arg = builder.args()[0];
            let (call_inst, res) = builder.insert_inst_with_result(
                Inst::Call {
                    callee,
                    args: smallvec![arg],
                },
                Type::I32,
            );
            call = call_inst;
            builder.insert_inst(Inst::Return { arg: Some(res) });
        }

        let mut module = mb.build();
        let mut info = InlineFunctionInfo::default();
        assert!(SpliceCloner.inline_function(&mut module, caller, call, &mut info, false));

        assert_eq!(info.inlined_call_sites.len(), 1);
        assert!(info.static_allocas.is_empty());

        let func = module.func(caller);
        assert!(!func.layout.is_inst_inserted(call));
        // Body now: add, call %leaf, return.
        let b0 = func.layout.entry_block().unwrap();
        let texts: Vec<_> = func
            .layout
            .iter_inst(b0)
            .map(|i| func.dfg.inst(i).as_text())
            .collect();
        assert_eq!(texts, vec!["add", "call", "return"]);
    }

    #[test]
    fn refuses_multi_block_callee_without_mutation() {
        let mut mb = test_module_builder();
        let callee =
            mb.declare_function(Signature::new("callee", Linkage::Private, &[], Type::Unit));
        let caller =
            mb.declare_function(Signature::new("caller", Linkage::Public, &[], Type::Unit));

        {
            let mut builder = mb.func_builder(callee);
            let b0 = builder.append_block();
            let b1 = builder.append_block();
            builder.switch_to_block(b0);
            builder.insert_inst(Inst::Jump { dest: b1 });
            builder.switch_to_block(b1);
            builder.insert_inst(Inst::Return { arg: None });
        }
        let call;
        {
            let mut builder = mb.func_builder(caller);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            call = builder.insert_inst(Inst::Call {
                callee,
                args: smallvec![],
            });
            builder.insert_inst(Inst::Return { arg: None });
        }

        let mut module = mb.build();
        let before = toccata_ir::ir_writer::dump_func(&module, caller);
        let mut info = InlineFunctionInfo::default();
        assert!(!SpliceCloner.inline_function(&mut module, caller, call, &mut info, false));
        assert_eq!(before, toccata_ir::ir_writer::dump_func(&module, caller));
    }

    #[test]
    fn hoists_static_allocas_and_brackets_lifetimes() {
        let mut mb = test_module_builder();
        let slot_ty = mb.make_array_ty(Type::I32, 8);
        let ptr_ty = mb.make_ptr_ty(slot_ty);
        let callee =
            mb.declare_function(Signature::new("callee", Linkage::Private, &[], Type::Unit));
        let caller =
            mb.declare_function(Signature::new("caller", Linkage::Public, &[], Type::Unit));

        {
            let mut builder = mb.func_builder(callee);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            let (_, slot) = builder.insert_inst_with_result(
                Inst::Alloca {
                    ty: slot_ty,
                    count: None,
                    align: 4,
                },
                ptr_ty,
            );
            builder.insert_inst(Inst::Store {
                addr: slot,
                value: slot,
            });
            builder.insert_inst(Inst::Return { arg: None });
        }
        let call;
        {
            let mut builder = mb.func_builder(caller);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            let zero = builder.make_imm_value(0i32);
            builder.insert_inst(Inst::Store {
                addr: zero,
                value: zero,
            });
            call = builder.insert_inst(Inst::Call {
                callee,
                args: smallvec![],
            });
            builder.insert_inst(Inst::Return { arg: None });
        }

        let mut module = mb.build();
        let mut info = InlineFunctionInfo::default();
        assert!(SpliceCloner.inline_function(&mut module, caller, call, &mut info, true));
        assert_eq!(info.static_allocas.len(), 1);

        let func = module.func(caller);
        let b0 = func.layout.entry_block().unwrap();
        let texts: Vec<_> = func
            .layout
            .iter_inst(b0)
            .map(|i| func.dfg.inst(i).as_text())
            .collect();
        // The slot is hoisted to the block head; markers stay at the splice
        // point.
        assert_eq!(
            texts,
            vec![
                "alloca",
                "store",
                "lifetime_start",
                "store",
                "lifetime_end",
                "return"
            ]
        );
    }
}
