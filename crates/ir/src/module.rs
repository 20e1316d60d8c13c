use cranelift_entity::{PrimaryMap, entity_impl};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::{DataLayout, Function, Inst, InstId, TypeStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComdatRef(u32);
entity_impl!(ComdatRef);

/// A linker group. Members of one group are kept or discarded as a unit.
#[derive(Debug, Clone)]
pub struct Comdat {
    pub name: SmolStr,
}

#[derive(Debug, Default)]
pub struct Module {
    pub type_store: TypeStore,
    pub data_layout: DataLayout,

    funcs: PrimaryMap<FuncRef, Function>,
    /// Functions whose bodies were physically removed. `FuncRef`s stay
    /// stable; dead refs are hidden from iteration.
    dead_funcs: FxHashSet<FuncRef>,

    comdats: PrimaryMap<ComdatRef, Comdat>,
    comdats_by_name: IndexMap<SmolStr, ComdatRef>,
}

impl Module {
    pub fn new(data_layout: DataLayout) -> Self {
        Self {
            data_layout,
            ..Default::default()
        }
    }

    pub fn declare_function(&mut self, func: Function) -> FuncRef {
        self.funcs.push(func)
    }

    /// Live functions of the module, in declaration order.
    pub fn funcs(&self) -> Vec<FuncRef> {
        self.funcs
            .keys()
            .filter(|func_ref| !self.dead_funcs.contains(func_ref))
            .collect()
    }

    pub fn is_live(&self, func_ref: FuncRef) -> bool {
        !self.dead_funcs.contains(&func_ref)
    }

    pub fn func(&self, func_ref: FuncRef) -> &Function {
        debug_assert!(self.is_live(func_ref), "access to removed function");
        &self.funcs[func_ref]
    }

    pub fn func_mut(&mut self, func_ref: FuncRef) -> &mut Function {
        debug_assert!(self.is_live(func_ref), "access to removed function");
        &mut self.funcs[func_ref]
    }

    /// Erases the function body and hides the ref from iteration. The ref
    /// stays valid for map indexing so side tables survive.
    pub fn remove_function(&mut self, func_ref: FuncRef) {
        debug_assert!(self.is_live(func_ref));
        self.funcs[func_ref].layout.clear();
        self.dead_funcs.insert(func_ref);
    }

    pub fn make_comdat(&mut self, name: &str) -> ComdatRef {
        if let Some(&comdat) = self.comdats_by_name.get(name) {
            return comdat;
        }

        let comdat = self.comdats.push(Comdat { name: name.into() });
        self.comdats_by_name.insert(name.into(), comdat);
        comdat
    }

    pub fn comdat(&self, comdat: ComdatRef) -> &Comdat {
        &self.comdats[comdat]
    }

    /// Every instruction in a live function that refers to `func_ref`,
    /// whether by calling it or by taking its address.
    pub fn func_users(&self, func_ref: FuncRef) -> Vec<(FuncRef, InstId)> {
        let mut users = Vec::new();
        for user_func in self.funcs() {
            let func = self.func(user_func);
            for block in func.layout.iter_block() {
                for inst_id in func.layout.iter_inst(block) {
                    if func.dfg.inst(inst_id).referenced_func() == Some(func_ref) {
                        users.push((user_func, inst_id));
                    }
                }
            }
        }
        users
    }

    pub fn func_use_count(&self, func_ref: FuncRef) -> usize {
        self.func_users(func_ref).len()
    }

    /// Erases address-taking instructions whose result is itself unused.
    /// Returns `true` if anything was erased.
    pub fn remove_dead_constant_users(&mut self, func_ref: FuncRef) -> bool {
        let mut dead = Vec::new();
        for user_func in self.funcs() {
            let func = self.func(user_func);
            for block in func.layout.iter_block() {
                for inst_id in func.layout.iter_inst(block) {
                    let is_addr_of = matches!(
                        func.dfg.inst(inst_id),
                        Inst::FuncAddr { func } if *func == func_ref
                    );
                    if !is_addr_of {
                        continue;
                    }
                    let unused = func
                        .dfg
                        .inst_result(inst_id)
                        .is_none_or(|res| !func.dfg.has_users(res));
                    if unused {
                        dead.push((user_func, inst_id));
                    }
                }
            }
        }

        for &(user_func, inst_id) in &dead {
            let func = self.func_mut(user_func);
            func.dfg.untrack_inst(inst_id);
            func.layout.remove_inst(inst_id);
        }
        !dead.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Linkage, Signature, Type};

    use super::*;

    #[test]
    fn removed_functions_are_hidden_from_iteration() {
        let mut module = Module::default();
        let f = module.declare_function(Function::new(Signature::new(
            "f",
            Linkage::Private,
            &[],
            Type::Unit,
        )));
        let g = module.declare_function(Function::new(Signature::new(
            "g",
            Linkage::Private,
            &[],
            Type::Unit,
        )));

        assert_eq!(module.funcs(), vec![f, g]);
        module.remove_function(f);
        assert_eq!(module.funcs(), vec![g]);
        assert!(!module.is_live(f));
    }

    #[test]
    fn comdats_are_interned_by_name() {
        let mut module = Module::default();
        let a = module.make_comdat("group");
        let b = module.make_comdat("group");
        let c = module.make_comdat("other");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(module.comdat(a).name, "group");
    }
}
