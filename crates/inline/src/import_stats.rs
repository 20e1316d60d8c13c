//! Statistics about inlining of functions imported from other modules.

use std::fmt::Write;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use toccata_ir::{FuncAttrs, FuncRef, Module};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportStatsMode {
    /// No tracking at all.
    #[default]
    No,
    /// Aggregate counts, reported at pass end.
    Basic,
    /// Aggregate counts plus a per-callee breakdown.
    Verbose,
}

#[derive(Debug, Default, Clone)]
struct CalleeRecord {
    inlined: u32,
    imported: bool,
}

/// Per-pass accumulator. Names are captured at record time because a callee
/// may be reaped before the report is rendered.
#[derive(Debug, Default)]
pub struct ImportStats {
    callees: FxHashMap<SmolStr, CalleeRecord>,
    total_inlined: u32,
    imported_inlined: u32,
}

impl ImportStats {
    pub fn record_inline(&mut self, module: &Module, _caller: FuncRef, callee: FuncRef) {
        let sig = &module.func(callee).sig;
        let imported = sig.attrs().contains(FuncAttrs::IMPORTED);

        self.total_inlined += 1;
        if imported {
            self.imported_inlined += 1;
        }

        let record = self.callees.entry(sig.name().into()).or_default();
        record.inlined += 1;
        record.imported = imported;
    }

    pub fn total_inlined(&self) -> u32 {
        self.total_inlined
    }

    pub fn imported_inlined(&self) -> u32 {
        self.imported_inlined
    }

    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(
            &mut out,
            "inlined {} call sites, {} of imported functions",
            self.total_inlined, self.imported_inlined
        );

        if verbose {
            let mut names: Vec<&SmolStr> = self.callees.keys().collect();
            names.sort_unstable();
            for name in names {
                let record = &self.callees[name];
                let _ = writeln!(
                    &mut out,
                    "  %{name}: inlined {} times{}",
                    record.inlined,
                    if record.imported { " (imported)" } else { "" }
                );
            }
        }
        out
    }
}
