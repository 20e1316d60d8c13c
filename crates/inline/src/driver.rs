//! The SCC fixed-point inlining driver.
//!
//! Decisions of which calls are profitable live in the policy module; this
//! driver owns the mechanics of not missing any call site while the call
//! graph mutates underneath it.

use rustc_hash::FxHashSet;
use toccata_ir::{CallTarget, FuncAttrs, FuncRef, Inst, InstId, Module};

use crate::{
    call_graph::{CallGraph, CallGraphScc},
    cloner::{BodyCloner, InlineFunctionInfo},
    history::{InlineHistory, NO_HISTORY},
    import_stats::{ImportStats, ImportStatsMode},
    merge::{InlinedAllocaState, merge_inlined_allocas},
    observer::{InlineEvent, InlineObserver, decision_names},
    policy::{InlineCostModel, should_inline},
};

#[derive(Debug, Clone, Copy)]
pub struct InlinerConfig {
    /// Skip stack-slot merging entirely (kept for experiments with
    /// lifetime-marker based stack coloring).
    pub disable_inlined_alloca_merging: bool,
    pub import_stats: ImportStatsMode,
    /// Forwarded to the body cloner: bracket inlined stack slots with
    /// lifetime markers.
    pub insert_lifetime: bool,
}

impl Default for InlinerConfig {
    fn default() -> Self {
        Self {
            disable_inlined_alloca_merging: false,
            import_stats: ImportStatsMode::No,
            insert_lifetime: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InlineStats {
    /// Call sites replaced with a callee body.
    pub num_inlined: usize,
    /// Call sites deleted as trivially dead, not inlined.
    pub num_calls_deleted: usize,
    /// Functions deleted because every caller was found.
    pub num_deleted: usize,
    /// Stack slots merged together.
    pub num_merged_allocas: usize,
    /// Outer call sites analyzed by the deferral check.
    pub num_caller_callers_analyzed: usize,
}

/// One entry of the work list: a call site plus the index of the inline
/// history entry that produced it (`NO_HISTORY` for original sites).
#[derive(Debug, Clone, Copy)]
struct PendingCallSite {
    caller: FuncRef,
    site: InstId,
    history: i32,
}

/// Inlines profitable call sites inside one SCC until a fixed point,
/// updating the call graph in place. Returns `true` if anything changed.
#[allow(clippy::too_many_arguments)]
pub fn inline_calls_in_scc(
    module: &mut Module,
    cg: &mut CallGraph,
    scc: &CallGraphScc,
    cost_model: &dyn InlineCostModel,
    cloner: &mut dyn BodyCloner,
    observer: &mut dyn InlineObserver,
    config: &InlinerConfig,
    stats: &mut InlineStats,
    import_stats: &mut ImportStats,
) -> bool {
    let scc_functions: FxHashSet<FuncRef> = scc
        .functions
        .iter()
        .copied()
        .filter(|&f| module.is_live(f) && module.func(f).sig.linkage().has_definition())
        .collect();

    // Identify every call site ahead of time, so that only calls present in
    // the original functions are considered, plus whatever inlining reveals
    // along the way.
    let mut work: Vec<PendingCallSite> = Vec::new();
    for &func_ref in &scc.functions {
        if !scc_functions.contains(&func_ref) {
            continue;
        }
        let func = module.func(func_ref);
        for block in func.layout.iter_block() {
            for inst_id in func.layout.iter_inst(block) {
                let inst = func.dfg.inst(inst_id);
                if inst.is_intrinsic() {
                    continue;
                }
                let Some(target) = inst.call_target() else {
                    continue;
                };

                // A direct call to a declaration can never be inlined; an
                // indirect call stays queued because inlining may resolve
                // it to a direct one later.
                if let CallTarget::Direct(callee) = target
                    && !module.func(callee).sig.linkage().has_definition()
                {
                    let (callee, caller) = decision_names(module, func_ref, callee);
                    observer.event(InlineEvent::NoDefinition { callee, caller });
                    continue;
                }

                work.push(PendingCallSite {
                    caller: func_ref,
                    site: inst_id,
                    history: NO_HISTORY,
                });
            }
        }
    }

    if work.is_empty() {
        return false;
    }

    // Calls into the SCC go to the tail: they tend to be recursive, and the
    // non-recursive opportunities should be taken first.
    move_scc_calls_to_tail(&mut work, |pending: &PendingCallSite| {
        matches!(
            module.func(pending.caller).dfg.inst(pending.site).call_target(),
            Some(CallTarget::Direct(callee)) if scc_functions.contains(&callee)
        )
    });

    let singular = scc.is_singular(cg);
    let mut history = InlineHistory::new();
    let mut alloca_state = InlinedAllocaState::new();
    let mut info = InlineFunctionInfo::default();

    let mut changed = false;
    loop {
        // A later inlining can change an earlier decision (an indirect call
        // may resolve, a caller may shrink), so skipped sites stay queued
        // until a full pass leaves every one of them in place.
        let mut local_change = false;
        let mut i = 0;
        while i < work.len() {
            let PendingCallSite {
                caller,
                site,
                history: history_id,
            } = work[i];
            debug_assert!(module.func(caller).layout.is_inst_inserted(site));

            let direct_callee = match module.func(caller).dfg.inst(site).call_target() {
                Some(CallTarget::Direct(callee)) => Some(callee),
                _ => None,
            };

            if is_trivially_dead_call(module, caller, site) {
                // A dead call is deleted outright, whatever its size.
                cg.remove_call_edge_for(caller, site);
                let func = module.func_mut(caller);
                func.dfg.untrack_inst(site);
                func.layout.remove_inst(site);
                stats.num_calls_deleted += 1;
            } else {
                let Some(callee) = direct_callee else {
                    i += 1;
                    continue;
                };
                if !module.func(callee).sig.linkage().has_definition() {
                    i += 1;
                    continue;
                }

                // A callee that already appears in the chain of inlinings
                // that produced this site would reveal the same call again,
                // forever.
                if history_id != NO_HISTORY && history.includes(callee, history_id) {
                    i += 1;
                    continue;
                }

                if !should_inline(module, caller, site, callee, cost_model, observer, stats) {
                    let (callee, caller) = decision_names(module, caller, callee);
                    observer.event(InlineEvent::NotInlined { callee, caller });
                    i += 1;
                    continue;
                }

                info.clear();
                if !cloner.inline_function(module, caller, site, &mut info, config.insert_lifetime)
                {
                    let (callee, caller) = decision_names(module, caller, callee);
                    observer.event(InlineEvent::NotInlined { callee, caller });
                    i += 1;
                    continue;
                }

                if config.import_stats != ImportStatsMode::No {
                    import_stats.record_inline(module, caller, callee);
                }
                merge_attributes_for_inlining(module, caller, callee);

                if !config.disable_inlined_alloca_merging {
                    merge_inlined_allocas(
                        module,
                        caller,
                        &info,
                        history_id,
                        &mut alloca_state,
                        stats,
                    );
                }

                // Keep the graph in step: the inlined edge is gone and the
                // spliced body's calls belong to the caller now.
                cg.remove_call_edge_for(caller, site);
                for &revealed in &info.inlined_call_sites {
                    if let Some(CallTarget::Direct(new_callee)) =
                        module.func(caller).dfg.inst(revealed).call_target()
                    {
                        cg.add_call_edge(caller, revealed, new_callee);
                    }
                }

                if !info.inlined_call_sites.is_empty() {
                    let new_history = history.push(callee, history_id);
                    for &revealed in &info.inlined_call_sites {
                        work.push(PendingCallSite {
                            caller,
                            site: revealed,
                            history: new_history,
                        });
                    }
                }

                stats.num_inlined += 1;
                let (callee_name, caller_name) = decision_names(module, caller, callee);
                observer.event(InlineEvent::Inlined {
                    callee: callee_name,
                    caller: caller_name,
                });
            }

            // If that was the last reference to the callee, drop its body
            // now; the node must report zero references, or removal would
            // invalidate the SCC iteration.
            if let Some(callee) = direct_callee
                && module.is_live(callee)
                && module.func(callee).sig.linkage().is_local()
                && !scc_functions.contains(&callee)
                && module.func_use_count(callee) == 0
                && cg.num_references(callee) == 0
            {
                cg.remove_all_called_functions(callee);
                cg.remove_function_from_module(callee);
                module.remove_function(callee);
                stats.num_deleted += 1;
            }

            // Swap-pop would move an intra-SCC site ahead of the partition
            // boundary, so it is reserved for singular SCCs.
            if singular {
                work.swap_remove(i);
            } else {
                work.remove(i);
            }
            changed = true;
            local_change = true;
        }

        if !local_change {
            break;
        }
    }

    changed
}

/// Partitions `work` so that entries matching `is_scc_call` form the tail,
/// and returns the boundary index. The sweep decrements the boundary on
/// each swap and re-examines the swapped-in element, so one pass suffices.
fn move_scc_calls_to_tail<T>(work: &mut [T], is_scc_call: impl Fn(&T) -> bool) -> usize {
    let mut first_call_in_scc = work.len();
    let mut i = 0;
    while i < first_call_in_scc {
        if is_scc_call(&work[i]) {
            first_call_in_scc -= 1;
            work.swap(i, first_call_in_scc);
        } else {
            i += 1;
        }
    }
    first_call_in_scc
}

/// A call whose result is unused and whose callee cannot write observable
/// state. Constant propagation routinely strands such calls.
fn is_trivially_dead_call(module: &Module, caller: FuncRef, site: InstId) -> bool {
    let func = module.func(caller);
    if func
        .dfg
        .inst_result(site)
        .is_some_and(|res| func.dfg.has_users(res))
    {
        return false;
    }

    match func.dfg.inst(site) {
        Inst::Call { callee, .. } => module.func(*callee).sig.attrs().is_readonly(),
        // An indirect callee's effects are unknown.
        _ => false,
    }
}

/// The caller inherits the callee's memory behavior.
fn merge_attributes_for_inlining(module: &mut Module, caller: FuncRef, callee: FuncRef) {
    let mem = module.func(callee).sig.attrs() & (FuncAttrs::MEM_READ | FuncAttrs::MEM_WRITE);
    module.func_mut(caller).sig.attrs_mut().insert(mem);
}

#[cfg(test)]
mod tests {
    use super::move_scc_calls_to_tail;

    #[test]
    fn partition_puts_scc_calls_strictly_after_others() {
        let cases: Vec<Vec<i32>> = vec![
            vec![],
            vec![1],
            vec![-1],
            vec![1, -2, 3, -4, 5],
            vec![-1, -2, -3],
            vec![1, 2, 3],
            vec![-1, 2, -3, 4, -5, -6, 7],
        ];

        for mut work in cases {
            let original_len = work.len();
            let boundary = move_scc_calls_to_tail(&mut work, |&x| x < 0);

            assert_eq!(work.len(), original_len);
            for (idx, &x) in work.iter().enumerate() {
                if idx < boundary {
                    assert!(x > 0, "non-SCC call after boundary in {work:?}");
                } else {
                    assert!(x < 0, "SCC call before boundary in {work:?}");
                }
            }
        }
    }
}
