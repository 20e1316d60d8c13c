//! Structured observation events emitted at every inlining decision point.
//!
//! The driver never renders diagnostics; it hands each decision to an
//! [`InlineObserver`]. Observers default to ignoring everything, so callers
//! that only want the transformation pass [`NullObserver`].

use smol_str::SmolStr;
use toccata_ir::{FuncRef, Module};

/// `(callee, caller)` names for an event at the given decision point.
pub(crate) fn decision_names(
    module: &Module,
    caller: FuncRef,
    callee: FuncRef,
) -> (SmolStr, SmolStr) {
    (
        module.func(callee).sig.name().into(),
        module.func(caller).sig.name().into(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineEvent {
    /// The cost model categorized the callee as always-inline.
    AlwaysInline { callee: SmolStr, caller: SmolStr },
    /// The cost model categorized the callee as never-inline.
    NeverInline { callee: SmolStr, caller: SmolStr },
    /// The estimated cost exceeded the effective threshold.
    TooCostly {
        callee: SmolStr,
        caller: SmolStr,
        cost: i32,
        threshold: i32,
    },
    /// Inlining was deferred because it would foreclose more profitable
    /// inlinings of the caller into its own callers.
    IncreaseCostInOtherContexts { callee: SmolStr, caller: SmolStr },
    /// The callee is a declaration; its definition is unavailable.
    NoDefinition { callee: SmolStr, caller: SmolStr },
    /// The call site was replaced with the callee body.
    Inlined { callee: SmolStr, caller: SmolStr },
    /// The call site survived: policy rejection or cloner refusal.
    NotInlined { callee: SmolStr, caller: SmolStr },
}

impl InlineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlwaysInline { .. } => "AlwaysInline",
            Self::NeverInline { .. } => "NeverInline",
            Self::TooCostly { .. } => "TooCostly",
            Self::IncreaseCostInOtherContexts { .. } => "IncreaseCostInOtherContexts",
            Self::NoDefinition { .. } => "NoDefinition",
            Self::Inlined { .. } => "Inlined",
            Self::NotInlined { .. } => "NotInlined",
        }
    }

    pub fn callee(&self) -> &str {
        match self {
            Self::AlwaysInline { callee, .. }
            | Self::NeverInline { callee, .. }
            | Self::TooCostly { callee, .. }
            | Self::IncreaseCostInOtherContexts { callee, .. }
            | Self::NoDefinition { callee, .. }
            | Self::Inlined { callee, .. }
            | Self::NotInlined { callee, .. } => callee,
        }
    }

    pub fn caller(&self) -> &str {
        match self {
            Self::AlwaysInline { caller, .. }
            | Self::NeverInline { caller, .. }
            | Self::TooCostly { caller, .. }
            | Self::IncreaseCostInOtherContexts { caller, .. }
            | Self::NoDefinition { caller, .. }
            | Self::Inlined { caller, .. }
            | Self::NotInlined { caller, .. } => caller,
        }
    }
}

pub trait InlineObserver {
    fn event(&mut self, _event: InlineEvent) {}

    /// Receives the imported-function statistics report at pass end, when
    /// import-stats tracking is enabled.
    fn import_report(&mut self, _report: &str) {}
}

pub struct NullObserver;

impl InlineObserver for NullObserver {}
