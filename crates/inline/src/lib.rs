//! SCC-scoped function inlining.
//!
//! The pass walks call-graph SCCs bottom-up and, inside each SCC, runs a
//! fixed-point worklist over call sites: profitable direct calls are replaced
//! with a clone of the callee body, newly revealed call sites are folded back
//! into the work set, stack slots contributed by sibling inlinings are
//! merged, and functions whose last reference disappears are removed.
//!
//! Policy (the cost model) and the mechanical body cloning are capabilities
//! behind the [`policy::InlineCostModel`] and [`cloner::BodyCloner`] traits;
//! the driver itself never scores a call site and never touches IR layout
//! beyond call-graph maintenance.

pub mod call_graph;
pub mod cloner;
pub mod driver;
pub mod history;
pub mod import_stats;
pub mod merge;
pub mod observer;
pub mod pass;
pub mod policy;
pub mod reaper;

pub use call_graph::{CallGraph, CallGraphScc, compute_sccs_bottom_up};
pub use cloner::{BodyCloner, InlineFunctionInfo, SpliceCloner};
pub use driver::{InlineStats, InlinerConfig, inline_calls_in_scc};
pub use history::{InlineHistory, NO_HISTORY};
pub use import_stats::{ImportStats, ImportStatsMode};
pub use merge::InlinedAllocaState;
pub use observer::{InlineEvent, InlineObserver, NullObserver};
pub use pass::InlinerPass;
pub use policy::{CALL_PENALTY, InlineCost, InlineCostModel, LAST_CALL_TO_STATIC_BONUS};
pub use reaper::remove_dead_functions;
