use bitflags::bitflags;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::{ComdatRef, Linkage, Type, Value};

use super::{DataFlowGraph, Layout, ValueId};

bitflags! {
    /// Per-function attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FuncAttrs: u8 {
        /// May read memory that is visible to its callers.
        const MEM_READ = 1 << 0;
        /// May write memory that is visible to its callers.
        const MEM_WRITE = 1 << 1;
        /// Must be inlined wherever it is called.
        const ALWAYS_INLINE = 1 << 2;
        /// Pulled into this module from another one by cross-module
        /// importing.
        const IMPORTED = 1 << 3;
    }
}

impl FuncAttrs {
    /// `true` if calls to the function cannot write observable state.
    pub fn is_readonly(self) -> bool {
        !self.contains(Self::MEM_WRITE)
    }
}

#[derive(Debug, Default)]
pub struct Function {
    /// Signature of the function.
    pub sig: Signature,
    pub arg_values: SmallVec<[ValueId; 8]>,

    pub dfg: DataFlowGraph,
    pub layout: Layout,
}

impl Function {
    pub fn new(sig: Signature) -> Self {
        let mut dfg = DataFlowGraph::new();
        let arg_values = sig
            .args()
            .iter()
            .enumerate()
            .map(|(idx, arg_ty)| dfg.make_value(Value::Arg { ty: *arg_ty, idx }))
            .collect();

        Self {
            sig,
            arg_values,
            dfg,
            layout: Layout::default(),
        }
    }

    /// A declaration has no body; a defined function with an emptied layout
    /// (a reaped body) also reports `false`.
    pub fn has_body(&self) -> bool {
        self.layout.entry_block().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    /// Name of the function.
    name: SmolStr,

    /// Linkage of the function.
    linkage: Linkage,

    /// COMDAT group the function belongs to, if any.
    comdat: Option<ComdatRef>,

    attrs: FuncAttrs,

    args: SmallVec<[Type; 8]>,
    ret_ty: Type,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, args: &[Type], ret_ty: Type) -> Self {
        Self {
            name: name.into(),
            linkage,
            comdat: None,
            // Unanalyzed functions may touch any memory; a behavior analysis
            // or the frontend narrows this down.
            attrs: FuncAttrs::MEM_READ | FuncAttrs::MEM_WRITE,
            args: args.into(),
            ret_ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn comdat(&self) -> Option<ComdatRef> {
        self.comdat
    }

    pub fn set_comdat(&mut self, comdat: ComdatRef) {
        self.comdat = Some(comdat);
    }

    pub fn attrs(&self) -> FuncAttrs {
        self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut FuncAttrs {
        &mut self.attrs
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn ret_ty(&self) -> Type {
        self.ret_ty
    }
}
