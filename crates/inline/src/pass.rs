//! Module-level entry point: SCC iteration order and pass finalization.

use toccata_ir::Module;

use crate::{
    call_graph::{CallGraph, CallGraphScc, compute_sccs_bottom_up},
    cloner::BodyCloner,
    driver::{InlineStats, InlinerConfig, inline_calls_in_scc},
    import_stats::{ImportStats, ImportStatsMode},
    observer::InlineObserver,
    policy::InlineCostModel,
    reaper::remove_dead_functions,
};

/// The inlining pass over a whole module.
///
/// Walks the call graph's SCCs bottom-up and runs the fixed-point driver on
/// each, then finalizes: dumps import statistics (when enabled) and reaps
/// functions whose last reference disappeared. Callers embedded in a pass
/// manager can instead drive [`InlinerPass::run_on_scc`] per component and
/// skip whichever components they like.
pub struct InlinerPass<'a> {
    pub config: InlinerConfig,
    pub stats: InlineStats,
    cost_model: &'a dyn InlineCostModel,
    cloner: &'a mut dyn BodyCloner,
    observer: &'a mut dyn InlineObserver,
    import_stats: ImportStats,
}

impl<'a> InlinerPass<'a> {
    pub fn new(
        config: InlinerConfig,
        cost_model: &'a dyn InlineCostModel,
        cloner: &'a mut dyn BodyCloner,
        observer: &'a mut dyn InlineObserver,
    ) -> Self {
        Self {
            config,
            stats: InlineStats::default(),
            cost_model,
            cloner,
            observer,
            import_stats: ImportStats::default(),
        }
    }

    /// Runs the full pass. Returns `true` if the module changed.
    pub fn run(&mut self, module: &mut Module) -> bool {
        let mut cg = CallGraph::build(module);
        let sccs = compute_sccs_bottom_up(module, &cg);

        let mut changed = false;
        for scc in &sccs {
            changed |= self.run_on_scc(module, &mut cg, scc);
        }
        changed |= self.finalize(module, &mut cg);
        changed
    }

    /// Runs the fixed-point driver on one SCC.
    pub fn run_on_scc(
        &mut self,
        module: &mut Module,
        cg: &mut CallGraph,
        scc: &CallGraphScc,
    ) -> bool {
        inline_calls_in_scc(
            module,
            cg,
            scc,
            self.cost_model,
            self.cloner,
            self.observer,
            &self.config,
            &mut self.stats,
            &mut self.import_stats,
        )
    }

    /// Emits the import-statistics report and reaps now-dead functions.
    /// Reaping waits until here so that no SCC iteration holds a reference
    /// into the graph when nodes disappear.
    pub fn finalize(&mut self, module: &mut Module, cg: &mut CallGraph) -> bool {
        match self.config.import_stats {
            ImportStatsMode::No => {}
            ImportStatsMode::Basic => {
                let report = self.import_stats.render(false);
                self.observer.import_report(&report);
            }
            ImportStatsMode::Verbose => {
                let report = self.import_stats.render(true);
                self.observer.import_report(&report);
            }
        }

        remove_dead_functions(module, cg, false, &mut self.stats)
    }
}
