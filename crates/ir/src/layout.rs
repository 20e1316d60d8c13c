//! Function layout: block order and per-block instruction order.
//!
//! Stored as order vectors rather than intrusive lists; the optimizer's
//! mutation mix is append-heavy with occasional mid-block insertion, and an
//! order vector keeps iteration allocation-free for callers that snapshot.

use cranelift_entity::{SecondaryMap, packed_option::PackedOption};

use super::{BlockId, InstId};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    block_order: Vec<BlockId>,
    block_insts: SecondaryMap<BlockId, Vec<InstId>>,
    inst_blocks: SecondaryMap<InstId, PackedOption<BlockId>>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.block_order.first().copied()
    }

    pub fn is_block_inserted(&self, block: BlockId) -> bool {
        self.block_order.contains(&block)
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.inst_blocks[inst].is_some()
    }

    pub fn inst_block(&self, inst: InstId) -> BlockId {
        self.inst_blocks[inst]
            .expand()
            .expect("instruction not inserted")
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.block_insts[block].first().copied()
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.block_insts[block].last().copied()
    }

    pub fn iter_block(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.block_order.iter().copied()
    }

    pub fn iter_inst(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        self.block_insts[block].iter().copied()
    }

    pub fn append_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_block_inserted(block));
        self.block_order.push(block);
    }

    pub fn append_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));
        self.block_insts[block].push(inst);
        self.inst_blocks[inst] = block.into();
    }

    pub fn prepend_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));
        self.block_insts[block].insert(0, inst);
        self.inst_blocks[inst] = block.into();
    }

    pub fn insert_inst_before(&mut self, inst: InstId, before: InstId) {
        debug_assert!(!self.is_inst_inserted(inst));
        let block = self.inst_block(before);
        let pos = self.position_of(block, before);
        self.block_insts[block].insert(pos, inst);
        self.inst_blocks[inst] = block.into();
    }

    pub fn insert_inst_after(&mut self, inst: InstId, after: InstId) {
        debug_assert!(!self.is_inst_inserted(inst));
        let block = self.inst_block(after);
        let pos = self.position_of(block, after);
        self.block_insts[block].insert(pos + 1, inst);
        self.inst_blocks[inst] = block.into();
    }

    pub fn remove_inst(&mut self, inst: InstId) {
        let block = self.inst_block(inst);
        let pos = self.position_of(block, inst);
        self.block_insts[block].remove(pos);
        self.inst_blocks[inst] = PackedOption::default();
    }

    /// Detaches `inst` from its position and re-inserts it right after
    /// `after`.
    pub fn move_inst_after(&mut self, inst: InstId, after: InstId) {
        self.remove_inst(inst);
        self.insert_inst_after(inst, after);
    }

    /// Drops every block and instruction. The owning function becomes
    /// bodyless.
    pub fn clear(&mut self) {
        for &block in &self.block_order {
            for &inst in &self.block_insts[block] {
                self.inst_blocks[inst] = PackedOption::default();
            }
            self.block_insts[block].clear();
        }
        self.block_order.clear();
    }

    fn position_of(&self, block: BlockId, inst: InstId) -> usize {
        self.block_insts[block]
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not in its recorded block")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataFlowGraph, Inst};

    fn make_dummy_inst(dfg: &mut DataFlowGraph) -> InstId {
        let v0 = dfg.make_imm_value(1i32);
        let v1 = dfg.make_imm_value(2i32);
        dfg.make_inst(Inst::Add { lhs: v0, rhs: v1 })
    }

    #[test]
    fn inst_insertion_and_order() {
        let mut layout = Layout::new();
        let mut dfg = DataFlowGraph::new();
        let b0 = dfg.make_block();
        layout.append_block(b0);

        let i1 = make_dummy_inst(&mut dfg);
        let i2 = make_dummy_inst(&mut dfg);
        let i3 = make_dummy_inst(&mut dfg);
        let i4 = make_dummy_inst(&mut dfg);

        layout.append_inst(i1, b0);
        layout.append_inst(i2, b0);
        layout.insert_inst_after(i3, i1);
        layout.insert_inst_before(i4, i2);

        let order: Vec<_> = layout.iter_inst(b0).collect();
        assert_eq!(order, vec![i1, i3, i4, i2]);
        assert_eq!(layout.first_inst_of(b0), Some(i1));
        assert_eq!(layout.last_inst_of(b0), Some(i2));
        assert_eq!(layout.inst_block(i3), b0);
    }

    #[test]
    fn inst_removal_and_move() {
        let mut layout = Layout::new();
        let mut dfg = DataFlowGraph::new();
        let b0 = dfg.make_block();
        layout.append_block(b0);

        let i1 = make_dummy_inst(&mut dfg);
        let i2 = make_dummy_inst(&mut dfg);
        let i3 = make_dummy_inst(&mut dfg);
        layout.append_inst(i1, b0);
        layout.append_inst(i2, b0);
        layout.append_inst(i3, b0);

        layout.remove_inst(i2);
        assert!(!layout.is_inst_inserted(i2));
        assert_eq!(layout.iter_inst(b0).collect::<Vec<_>>(), vec![i1, i3]);

        layout.move_inst_after(i1, i3);
        assert_eq!(layout.iter_inst(b0).collect::<Vec<_>>(), vec![i3, i1]);
    }

    #[test]
    fn clear_empties_every_block() {
        let mut layout = Layout::new();
        let mut dfg = DataFlowGraph::new();
        let b0 = dfg.make_block();
        let b1 = dfg.make_block();
        layout.append_block(b0);
        layout.append_block(b1);

        let i1 = make_dummy_inst(&mut dfg);
        layout.append_inst(i1, b1);

        layout.clear();
        assert_eq!(layout.entry_block(), None);
        assert!(!layout.is_inst_inserted(i1));
    }
}
