//! The inline history ledger.
//!
//! Each successful inlining that reveals new call sites appends one entry
//! `(callee, parent)` and tags the revealed sites with the entry's index.
//! Walking parent indices recovers the chain of inlinings that produced a
//! pending call site; a callee already present in its own chain must not be
//! inlined again, which is the only guard against unbounded expansion under
//! mutual recursion. Entries are stored as an indexable sequence with integer
//! parents so the ledger stays append-only and trivially dumpable.

use toccata_ir::FuncRef;

/// Marks a call site that was enumerated from the original SCC contents
/// rather than produced by inlining.
pub const NO_HISTORY: i32 = -1;

#[derive(Debug, Default)]
pub struct InlineHistory {
    entries: Vec<(FuncRef, i32)>,
}

impl InlineHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its index.
    pub fn push(&mut self, callee: FuncRef, parent: i32) -> i32 {
        let id = self.entries.len() as i32;
        self.entries.push((callee, parent));
        id
    }

    /// Returns `true` if the chain starting at `id` contains `func`.
    pub fn includes(&self, func: FuncRef, mut id: i32) -> bool {
        while id != NO_HISTORY {
            let (callee, parent) = self.entries[id as usize];
            if callee == func {
                return true;
            }
            id = parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
