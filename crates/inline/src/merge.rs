//! Merging of stack slots contributed by sibling inlinings.
//!
//! When several top-level inlinings land in one caller during an SCC pass,
//! their static stack slots have disjoint lifetimes and can share storage.
//! Only slots whose outermost type is an array are merged: array slots are
//! usually indexed dynamically and never promoted to SSA anyway, so folding
//! them costs the scalar-replacement pass nothing.

use rustc_hash::{FxHashMap, FxHashSet};
use toccata_ir::{FuncRef, Inst, InstId, Module, Type};

use crate::{
    cloner::InlineFunctionInfo,
    driver::InlineStats,
    history::NO_HISTORY,
};

/// Reusable slots per caller, keyed by the slot's (interned) array type.
/// Lives for one SCC pass.
#[derive(Debug, Default)]
pub struct InlinedAllocaState {
    available: FxHashMap<FuncRef, FxHashMap<Type, Vec<InstId>>>,
}

impl InlinedAllocaState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Examines the stack slots contributed by one inlining into `caller` and
/// redirects each onto an existing slot where safe.
///
/// Only top-level inlinings participate: a slot introduced by a nested
/// inlining can have a lifetime interleaved with slots already present in
/// the caller, and disjointness cannot be shown. For example, in
/// `a() { b() }  b() { x = alloca; c() }  c() { y = alloca }`, inlining `b`
/// into `a` exposes both `x` and the call to `c`; `x` and `y` overlap, so
/// the `c` call site (history != -1) must not merge.
pub(crate) fn merge_inlined_allocas(
    module: &mut Module,
    caller: FuncRef,
    info: &InlineFunctionInfo,
    inline_history: i32,
    state: &mut InlinedAllocaState,
    stats: &mut InlineStats,
) {
    if inline_history != NO_HISTORY {
        return;
    }

    // A slot reused once in this inlining must not swallow a second fresh
    // slot from the same operation; their lifetimes overlap.
    let mut used: FxHashSet<InstId> = FxHashSet::default();
    let available = state.available.entry(caller).or_default();

    for &alloca in &info.static_allocas {
        let func = module.func(caller);
        if !func.layout.is_inst_inserted(alloca) {
            continue;
        }
        let Inst::Alloca { ty, count, align } = *func.dfg.inst(alloca) else {
            continue;
        };

        // Array allocations (with a runtime count) and slots whose outermost
        // type is not an array are left for scalar replacement.
        if count.is_some() || !module.type_store.is_array(ty) {
            continue;
        }

        let slots = available.entry(ty).or_default();
        let mut merged_away = false;
        for &candidate in slots.iter() {
            let func = module.func(caller);
            // The reusable slot must live in the same block to preserve
            // placement assumptions.
            if func.layout.inst_block(candidate) != func.layout.inst_block(alloca) {
                continue;
            }
            if !used.insert(candidate) {
                continue;
            }

            reuse_slot(module, caller, alloca, candidate, align);
            stats.num_merged_allocas += 1;
            merged_away = true;
            break;
        }

        if merged_away {
            continue;
        }

        slots.push(alloca);
        used.insert(alloca);
    }
}

/// Redirects `alloca` onto `candidate` and erases it.
fn reuse_slot(
    module: &mut Module,
    caller: FuncRef,
    alloca: InstId,
    candidate: InstId,
    alloca_align: u32,
) {
    let (type_align, candidate_align, alloca_res, candidate_res) = {
        let func = module.func(caller);
        let Inst::Alloca { ty, align, .. } = *func.dfg.inst(candidate) else {
            unreachable!("available slot list holds only allocas");
        };
        let type_align = module
            .data_layout
            .abi_alignment(&module.type_store, ty);
        (
            type_align,
            align,
            func.dfg.inst_result(alloca),
            func.dfg.inst_result(candidate),
        )
    };

    let func = module.func_mut(caller);

    // Keep debug-declares after the slot they now describe.
    if let Some(alloca_res) = alloca_res {
        let dbg_users: Vec<InstId> = func
            .dfg
            .users(alloca_res)
            .filter(|&user| {
                matches!(
                    func.dfg.inst(user),
                    Inst::Intrinsic {
                        kind: toccata_ir::IntrinsicKind::DbgDeclare,
                        ..
                    }
                )
            })
            .collect();
        for dbg in dbg_users {
            func.layout.move_inst_after(dbg, candidate);
        }
    }

    if let (Some(alloca_res), Some(candidate_res)) = (alloca_res, candidate_res) {
        if func.dfg.has_users(alloca_res) {
            func.dfg.replace_uses(alloca_res, candidate_res);
        }
    }

    // Unify alignment: substitute the ABI alignment for a zero before
    // comparing, but write back the incoming slot's stored value.
    if alloca_align != candidate_align {
        let eff_alloca = if alloca_align == 0 { type_align } else { alloca_align };
        let eff_candidate = if candidate_align == 0 {
            type_align
        } else {
            candidate_align
        };
        if eff_alloca > eff_candidate {
            let Inst::Alloca { align, .. } = func.dfg.inst_mut(candidate) else {
                unreachable!();
            };
            *align = alloca_align;
        }
    }

    func.dfg.untrack_inst(alloca);
    func.layout.remove_inst(alloca);
}
