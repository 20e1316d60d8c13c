//! End-of-pass removal of functions whose last reference disappeared.

use rustc_hash::FxHashMap;
use toccata_ir::{ComdatRef, FuncAttrs, FuncRef, Module};

use crate::{call_graph::CallGraph, driver::InlineStats};

/// Scans the call graph for functions that inlining left dead and removes
/// them.
///
/// Removal is two-phase: candidates are collected first and physically
/// removed after the scan, since in-flight call-graph iteration must stay
/// valid. With `always_inline_only`, only functions carrying the
/// always-inline attribute are considered (the specialized entry point used
/// by a mandatory-inlining pipeline).
///
/// Returns `true` if anything was removed.
pub fn remove_dead_functions(
    module: &mut Module,
    cg: &mut CallGraph,
    always_inline_only: bool,
    stats: &mut InlineStats,
) -> bool {
    let mut to_remove: Vec<FuncRef> = Vec::new();
    let mut dead_in_comdats: Vec<FuncRef> = Vec::new();

    for func_ref in module.funcs() {
        let sig = &module.func(func_ref).sig;
        if !sig.linkage().has_definition() {
            continue;
        }
        if always_inline_only && !sig.attrs().contains(FuncAttrs::ALWAYS_INLINE) {
            continue;
        }

        // References held only by unused address-taking instructions do not
        // keep a function alive.
        module.remove_dead_constant_users(func_ref);

        if !is_def_trivially_dead(module, func_ref) {
            continue;
        }

        let sig = &module.func(func_ref).sig;
        if !sig.linkage().is_local() {
            // Dropping one member of a COMDAT strands the rest of the
            // group; such functions are removable only when their whole
            // group is dead.
            if sig.comdat().is_some() {
                dead_in_comdats.push(func_ref);
            }
            continue;
        }

        to_remove.push(func_ref);
    }

    if !dead_in_comdats.is_empty() {
        filter_dead_comdat_functions(module, &mut dead_in_comdats);
        to_remove.append(&mut dead_in_comdats);
    }

    if to_remove.is_empty() {
        return false;
    }

    to_remove.sort_unstable();
    to_remove.dedup();

    for func_ref in to_remove {
        cg.remove_all_called_functions(func_ref);
        cg.remove_any_call_edge_to(func_ref);
        cg.remove_function_from_module(func_ref);
        module.remove_function(func_ref);
        stats.num_deleted += 1;
    }
    true
}

/// Defined, discardable, and unreferenced.
fn is_def_trivially_dead(module: &Module, func_ref: FuncRef) -> bool {
    let linkage = module.func(func_ref).sig.linkage();
    linkage.has_definition() && linkage.is_discardable() && module.func_use_count(func_ref) == 0
}

/// Retains only the candidates whose COMDAT group is dead in its entirety:
/// every live member of the group must itself be a candidate.
fn filter_dead_comdat_functions(module: &Module, candidates: &mut Vec<FuncRef>) {
    let mut members: FxHashMap<ComdatRef, Vec<FuncRef>> = FxHashMap::default();
    for func_ref in module.funcs() {
        if let Some(comdat) = module.func(func_ref).sig.comdat() {
            members.entry(comdat).or_default().push(func_ref);
        }
    }

    let dead: Vec<FuncRef> = candidates.clone();
    candidates.retain(|func_ref| {
        let comdat = module
            .func(*func_ref)
            .sig
            .comdat()
            .expect("candidate was queued for having a comdat");
        members[&comdat]
            .iter()
            .all(|member| dead.contains(member))
    });
}
