//! Data flow graph: value and instruction storage for one function.
use std::collections::BTreeSet;

use cranelift_entity::{PrimaryMap, SecondaryMap, packed_option::PackedOption};
use rustc_hash::FxHashMap;

use crate::inst::{Inst, InstId};

use super::{Immediate, Type, Value, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);
cranelift_entity::entity_impl!(BlockId);

#[derive(Debug, Clone, Default)]
pub struct Block {}

#[derive(Debug, Default)]
pub struct DataFlowGraph {
    pub blocks: PrimaryMap<BlockId, Block>,
    pub values: PrimaryMap<ValueId, Value>,
    insts: PrimaryMap<InstId, Inst>,
    inst_results: SecondaryMap<InstId, PackedOption<ValueId>>,
    immediates: FxHashMap<Immediate, ValueId>,
    users: SecondaryMap<ValueId, BTreeSet<InstId>>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::default())
    }

    pub fn make_value(&mut self, value: Value) -> ValueId {
        self.values.push(value)
    }

    /// Registers a new instruction and tracks it as a user of its operands.
    pub fn make_inst(&mut self, inst: Inst) -> InstId {
        let inst_id = self.insts.push(inst);
        self.attach_user(inst_id);
        inst_id
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        let imm: Immediate = imm.into();
        if let Some(&value) = self.immediates.get(&imm) {
            return value;
        }

        let ty = imm.ty();
        let value = self.make_value(Value::Immediate { imm, ty });
        self.immediates.insert(imm, value);
        value
    }

    pub fn make_undef_value(&mut self, ty: Type) -> ValueId {
        self.make_value(Value::Undef { ty })
    }

    pub fn inst(&self, inst_id: InstId) -> &Inst {
        &self.insts[inst_id]
    }

    /// Mutable access for in-place payload tweaks. Operand edits must go
    /// through [`Self::replace_inst`] so the users index stays true.
    pub fn inst_mut(&mut self, inst_id: InstId) -> &mut Inst {
        &mut self.insts[inst_id]
    }

    pub fn value(&self, value_id: ValueId) -> &Value {
        &self.values[value_id]
    }

    pub fn value_ty(&self, value_id: ValueId) -> Type {
        self.values[value_id].ty()
    }

    pub fn value_imm(&self, value_id: ValueId) -> Option<Immediate> {
        match self.values[value_id] {
            Value::Immediate { imm, .. } => Some(imm),
            _ => None,
        }
    }

    /// Creates and attaches a result value of type `ty` to `inst_id`.
    pub fn make_result(&mut self, inst_id: InstId, ty: Type) -> ValueId {
        debug_assert!(self.inst_results[inst_id].is_none());
        let value = self.make_value(Value::Inst { inst: inst_id, ty });
        self.inst_results[inst_id] = value.into();
        value
    }

    pub fn inst_result(&self, inst_id: InstId) -> Option<ValueId> {
        self.inst_results[inst_id].expand()
    }

    /// Replaces the instruction body, keeping its identity and result.
    pub fn replace_inst(&mut self, inst_id: InstId, new: Inst) {
        let old = std::mem::replace(&mut self.insts[inst_id], new);
        old.for_each_value(&mut |value| {
            self.users[value].remove(&inst_id);
        });
        self.attach_user(inst_id);
    }

    /// Removes `inst_id` from the user sets of its operands. Call before
    /// removing the instruction from the layout for good.
    pub fn untrack_inst(&mut self, inst_id: InstId) {
        let inst = self.insts[inst_id].clone();
        inst.for_each_value(&mut |value| {
            self.users[value].remove(&inst_id);
        });
    }

    pub fn users(&self, value: ValueId) -> impl Iterator<Item = InstId> + '_ {
        self.users[value].iter().copied()
    }

    pub fn has_users(&self, value: ValueId) -> bool {
        !self.users[value].is_empty()
    }

    /// Rewrites every use of `from` to `to` and updates the user index.
    pub fn replace_uses(&mut self, from: ValueId, to: ValueId) {
        debug_assert_ne!(from, to);
        let user_insts = std::mem::take(&mut self.users[from]);
        for &inst_id in &user_insts {
            self.insts[inst_id].for_each_value_mut(&mut |value| {
                if *value == from {
                    *value = to;
                }
            });
        }
        self.users[to].extend(user_insts);
    }

    fn attach_user(&mut self, inst_id: InstId) {
        let inst = self.insts[inst_id].clone();
        inst.for_each_value(&mut |value| {
            self.users[value].insert(inst_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn immediates_are_interned() {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.make_imm_value(1i32);
        let b = dfg.make_imm_value(1i32);
        let c = dfg.make_imm_value(2i32);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(dfg.value_ty(a), Type::I32);
    }

    #[test]
    fn replace_uses_rewrites_operands_and_users() {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.make_imm_value(1i32);
        let b = dfg.make_imm_value(2i32);
        let add = dfg.make_inst(Inst::Add { lhs: a, rhs: a });
        let res = dfg.make_result(add, Type::I32);
        let store = dfg.make_inst(Inst::Store { addr: res, value: a });

        assert!(dfg.has_users(a));
        dfg.replace_uses(a, b);
        assert!(!dfg.has_users(a));

        assert!(matches!(dfg.inst(add), Inst::Add { lhs, rhs } if *lhs == b && *rhs == b));
        assert!(matches!(dfg.inst(store), Inst::Store { value, .. } if *value == b));
        let users: Vec<_> = dfg.users(b).collect();
        assert_eq!(users, vec![add, store]);
    }

    #[test]
    fn untrack_inst_clears_user_entries() {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.make_imm_value(7i32);
        let call = dfg.make_inst(Inst::Intrinsic {
            kind: crate::IntrinsicKind::DbgDeclare,
            args: smallvec![a],
        });

        assert!(dfg.has_users(a));
        dfg.untrack_inst(call);
        assert!(!dfg.has_users(a));
    }
}
