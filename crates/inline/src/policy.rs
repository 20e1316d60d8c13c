//! Inlining policy: cost categories and the deferral heuristic.

use toccata_ir::{FuncRef, Inst, InstId, Module};

use crate::{
    driver::InlineStats,
    observer::{InlineEvent, InlineObserver, decision_names},
};

/// Cost charged for the call instruction itself; inlining deletes it.
pub const CALL_PENALTY: i32 = 25;

/// Bonus the cost model grants an outer call site in anticipation that the
/// (static) caller disappears entirely once its last call is inlined. The
/// deferral check compensates for it having been granted to only one of the
/// outer sites.
pub const LAST_CALL_TO_STATIC_BONUS: i32 = 15_000;

/// Verdict of the external cost model for one call site.
///
/// `Never` is distinct from a very high `Cost`; the two must not be
/// conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineCost {
    Always,
    Never,
    /// `delta` is the distance from the threshold; negative means the site
    /// is over budget. The effective threshold is `cost + delta`.
    Cost { cost: i32, delta: i32 },
}

impl InlineCost {
    pub fn is_always(self) -> bool {
        matches!(self, Self::Always)
    }

    pub fn is_never(self) -> bool {
        matches!(self, Self::Never)
    }

    pub fn is_over_budget(self) -> bool {
        matches!(self, Self::Cost { delta, .. } if delta < 0)
    }
}

/// The external cost estimate, consumed as a capability. Implementations
/// carry whatever analyses they need (profile summaries, assumption caches);
/// the driver only sees the verdict.
pub trait InlineCostModel {
    fn cost_for(&self, module: &Module, caller: FuncRef, site: InstId) -> InlineCost;
}

/// Returns `true` if the driver should attempt to inline the given call
/// site. Emits one decision event; the driver emits `NotInlined`/`Inlined`
/// separately once the outcome is known.
pub(crate) fn should_inline(
    module: &Module,
    caller: FuncRef,
    site: InstId,
    callee: FuncRef,
    cost_model: &dyn InlineCostModel,
    observer: &mut dyn InlineObserver,
    stats: &mut InlineStats,
) -> bool {
    let (callee_name, caller_name) = decision_names(module, caller, callee);

    match cost_model.cost_for(module, caller, site) {
        InlineCost::Always => {
            observer.event(InlineEvent::AlwaysInline {
                callee: callee_name,
                caller: caller_name,
            });
            true
        }
        InlineCost::Never => {
            observer.event(InlineEvent::NeverInline {
                callee: callee_name,
                caller: caller_name,
            });
            false
        }
        InlineCost::Cost { cost, delta } if delta < 0 => {
            observer.event(InlineEvent::TooCostly {
                callee: callee_name,
                caller: caller_name,
                cost,
                threshold: cost + delta,
            });
            false
        }
        InlineCost::Cost { cost, .. } => {
            if should_be_deferred(module, caller, cost, cost_model, stats) {
                observer.event(InlineEvent::IncreaseCostInOtherContexts {
                    callee: callee_name,
                    caller: caller_name,
                });
                false
            } else {
                true
            }
        }
    }
}

/// Detects the case where the current caller (call it B) is a static or
/// link-once-ODR function that is itself an inlining candidate elsewhere,
/// and the candidate callee (call it C) is large enough that inlining it
/// into B would make B too big to inline later. Such linkage guarantees B is
/// visible at every call site in the unit, so the local decision can be
/// traded against the outer ones.
fn should_be_deferred(
    module: &Module,
    caller: FuncRef,
    cost: i32,
    cost_model: &dyn InlineCostModel,
    stats: &mut InlineStats,
) -> bool {
    let linkage = module.func(caller).sig.linkage();
    if !linkage.is_local() && !linkage.is_link_once_odr() {
        return false;
    }

    // The cost that inlining the candidate would impose on the caller, net
    // of the call instruction it deletes.
    let candidate_cost = cost - (CALL_PENALTY + 1);

    // What happens if we do NOT inline C into B.
    let mut caller_will_be_removed = linkage.is_local();
    // What happens if we DO inline C into B.
    let mut prevents_some_outer_inline = false;
    let mut total_secondary_cost = 0i32;

    let users = module.func_users(caller);
    for &(user_func, user_inst) in &users {
        // A non-call reference (address taken) keeps the caller alive no
        // matter what gets inlined.
        let is_call_to_caller = matches!(
            module.func(user_func).dfg.inst(user_inst),
            Inst::Call { callee, .. } if *callee == caller
        );
        if !is_call_to_caller {
            caller_will_be_removed = false;
            continue;
        }

        let outer = cost_model.cost_for(module, user_func, user_inst);
        stats.num_caller_callers_analyzed += 1;

        match outer {
            InlineCost::Never => {
                caller_will_be_removed = false;
            }
            InlineCost::Cost { delta, .. } if delta < 0 => {
                caller_will_be_removed = false;
            }
            InlineCost::Always => {}
            InlineCost::Cost {
                cost: outer_cost,
                delta,
            } => {
                if delta >= candidate_cost {
                    prevents_some_outer_inline = true;
                    total_secondary_cost += outer_cost;
                }
            }
        }
    }

    // If every outer call to the caller would be inlined, the cost model
    // granted the last-call bonus to only one of them; compensate unless the
    // caller has a single use.
    if caller_will_be_removed && users.len() > 1 {
        total_secondary_cost -= LAST_CALL_TO_STATIC_BONUS;
    }

    prevents_some_outer_inline && total_secondary_cost < cost
}
