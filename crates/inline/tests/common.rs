//! Shared helpers for inliner integration tests.

use rustc_hash::FxHashMap;
use toccata_inline::{InlineCost, InlineCostModel, InlineEvent, InlineObserver};
use toccata_ir::{
    FuncRef, Inst, InstId, Module,
    builder::{FunctionBuilder, ModuleBuilder},
};

/// Scores a call site by its statically-known callee; sites without an entry
/// get the default verdict.
pub struct MapCostModel {
    default: InlineCost,
    by_callee: FxHashMap<FuncRef, InlineCost>,
}

impl MapCostModel {
    pub fn new(default: InlineCost) -> Self {
        Self {
            default,
            by_callee: FxHashMap::default(),
        }
    }

    pub fn set(mut self, callee: FuncRef, cost: InlineCost) -> Self {
        self.by_callee.insert(callee, cost);
        self
    }
}

impl InlineCostModel for MapCostModel {
    fn cost_for(&self, module: &Module, caller: FuncRef, site: InstId) -> InlineCost {
        match module.func(caller).dfg.inst(site) {
            Inst::Call { callee, .. } => {
                self.by_callee.get(callee).copied().unwrap_or(self.default)
            }
            _ => self.default,
        }
    }
}

/// For tests that must prove no policy hook ran.
pub struct PanicCostModel;

impl InlineCostModel for PanicCostModel {
    fn cost_for(&self, _module: &Module, _caller: FuncRef, _site: InstId) -> InlineCost {
        panic!("cost model must not be consulted");
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<InlineEvent>,
    pub reports: Vec<String>,
}

impl InlineObserver for RecordingObserver {
    fn event(&mut self, event: InlineEvent) {
        self.events.push(event);
    }

    fn import_report(&mut self, report: &str) {
        self.reports.push(report.to_string());
    }
}

impl RecordingObserver {
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.events.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn has(&self, kind: &str) -> bool {
        self.events.iter().any(|e| e.kind() == kind)
    }
}

/// Opens a single entry block on `func` and hands the builder to `f`.
pub fn with_body(mb: &mut ModuleBuilder, func: FuncRef, f: impl FnOnce(&mut FunctionBuilder)) {
    let mut builder = mb.func_builder(func);
    let b0 = builder.append_block();
    builder.switch_to_block(b0);
    f(&mut builder);
}

pub fn body_texts(module: &Module, func: FuncRef) -> Vec<&'static str> {
    let f = module.func(func);
    f.layout
        .iter_block()
        .flat_map(|b| f.layout.iter_inst(b).collect::<Vec<_>>())
        .map(|i| f.dfg.inst(i).as_text())
        .collect()
}

pub fn count_calls_to(module: &Module, func: FuncRef, callee: FuncRef) -> usize {
    let f = module.func(func);
    f.layout
        .iter_block()
        .flat_map(|b| f.layout.iter_inst(b).collect::<Vec<_>>())
        .filter(|&i| matches!(f.dfg.inst(i), Inst::Call { callee: c, .. } if *c == callee))
        .count()
}

/// Alignments of every static alloca in `func`, in layout order.
pub fn alloca_aligns(module: &Module, func: FuncRef) -> Vec<u32> {
    let f = module.func(func);
    f.layout
        .iter_block()
        .flat_map(|b| f.layout.iter_inst(b).collect::<Vec<_>>())
        .filter_map(|i| match f.dfg.inst(i) {
            Inst::Alloca { align, count: None, .. } => Some(*align),
            _ => None,
        })
        .collect()
}
