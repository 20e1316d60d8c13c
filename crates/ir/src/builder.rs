//! Programmatic module and function construction.

use crate::{
    BlockId, DataLayout, Function, FuncRef, Inst, InstId, Module, Signature, Type, Value, ValueId,
    module::ComdatRef,
    value::Immediate,
};

pub struct ModuleBuilder {
    pub module: Module,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new(DataLayout::default())
    }
}

impl ModuleBuilder {
    pub fn new(data_layout: DataLayout) -> Self {
        Self {
            module: Module::new(data_layout),
        }
    }

    pub fn declare_function(&mut self, sig: Signature) -> FuncRef {
        self.module.declare_function(Function::new(sig))
    }

    pub fn make_comdat(&mut self, name: &str) -> ComdatRef {
        self.module.make_comdat(name)
    }

    pub fn make_array_ty(&mut self, elem: Type, len: usize) -> Type {
        self.module.type_store.make_array(elem, len)
    }

    pub fn make_ptr_ty(&mut self, pointee: Type) -> Type {
        self.module.type_store.make_ptr(pointee)
    }

    /// Starts building the body of `func_ref`.
    pub fn func_builder(&mut self, func_ref: FuncRef) -> FunctionBuilder<'_> {
        FunctionBuilder {
            func: self.module.func_mut(func_ref),
            current: None,
        }
    }

    pub fn build(self) -> Module {
        self.module
    }
}

pub struct FunctionBuilder<'a> {
    func: &'a mut Function,
    current: Option<BlockId>,
}

impl FunctionBuilder<'_> {
    pub fn append_block(&mut self) -> BlockId {
        let block = self.func.dfg.make_block();
        self.func.layout.append_block(block);
        block
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        debug_assert!(self.func.layout.is_block_inserted(block));
        self.current = Some(block);
    }

    pub fn args(&self) -> &[ValueId] {
        &self.func.arg_values
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        self.func.dfg.make_imm_value(imm)
    }

    pub fn make_undef_value(&mut self, ty: Type) -> ValueId {
        self.func.dfg.make_undef_value(ty)
    }

    /// Appends an instruction with no result to the current block.
    pub fn insert_inst(&mut self, inst: Inst) -> InstId {
        let block = self.current.expect("no block to insert into");
        let inst_id = self.func.dfg.make_inst(inst);
        self.func.layout.append_inst(inst_id, block);
        inst_id
    }

    /// Appends an instruction and attaches a result of type `ty`.
    pub fn insert_inst_with_result(&mut self, inst: Inst, ty: Type) -> (InstId, ValueId) {
        let inst_id = self.insert_inst(inst);
        let result = self.func.dfg.make_result(inst_id, ty);
        (inst_id, result)
    }

    pub fn value_ty(&self, value: ValueId) -> Type {
        self.func.dfg.value_ty(value)
    }

    pub fn value(&self, value: ValueId) -> &Value {
        self.func.dfg.value(value)
    }
}

pub mod test_util {
    use super::ModuleBuilder;

    pub fn test_module_builder() -> ModuleBuilder {
        ModuleBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Inst, Linkage, Signature, Type};

    use super::test_util::*;

    #[test]
    fn build_single_block_function() {
        let mut mb = test_module_builder();
        let f = mb.declare_function(Signature::new("f", Linkage::Private, &[Type::I32], Type::I32));

        let mut builder = mb.func_builder(f);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);

        let arg = builder.args()[0];
        let one = builder.make_imm_value(1i32);
        let (_, sum) =
            builder.insert_inst_with_result(Inst::Add { lhs: arg, rhs: one }, Type::I32);
        builder.insert_inst(Inst::Return { arg: Some(sum) });

        let module = mb.build();
        let func = module.func(f);
        assert_eq!(func.layout.iter_block().count(), 1);
        assert_eq!(func.layout.iter_inst(b0).count(), 2);
        assert!(func.has_body());
    }

    #[test]
    fn declarations_have_no_body() {
        let mut mb = test_module_builder();
        let ext =
            mb.declare_function(Signature::new("ext", Linkage::External, &[], Type::Unit));
        let module = mb.build();

        assert!(!module.func(ext).has_body());
        assert!(!module.func(ext).sig.linkage().has_definition());
    }
}
