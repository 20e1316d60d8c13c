//! Type definitions and the per-module type store.

use cranelift_entity::{PrimaryMap, entity_impl};
use rustc_hash::FxHashMap;

/// An IR type. Compound types are interned in the module's [`TypeStore`], so
/// `Type` stays `Copy` and two structurally equal compound types compare
/// equal by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Type {
    #[default]
    Unit,
    I1,
    I8,
    I16,
    I32,
    I64,
    Compound(CompoundTypeRef),
}

impl Type {
    pub fn is_integral(self) -> bool {
        matches!(self, Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompoundTypeRef(u32);
entity_impl!(CompoundTypeRef);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompoundType {
    Array { elem: Type, len: usize },
    Ptr(Type),
}

#[derive(Debug, Default)]
pub struct TypeStore {
    compounds: PrimaryMap<CompoundTypeRef, CompoundType>,
    rev_types: FxHashMap<CompoundType, CompoundTypeRef>,
}

impl TypeStore {
    pub fn make_array(&mut self, elem: Type, len: usize) -> Type {
        Type::Compound(self.make_compound(CompoundType::Array { elem, len }))
    }

    pub fn make_ptr(&mut self, pointee: Type) -> Type {
        Type::Compound(self.make_compound(CompoundType::Ptr(pointee)))
    }

    /// Returns `(elem, len)` if the given type is an array type.
    pub fn array_def(&self, ty: Type) -> Option<(Type, usize)> {
        match ty {
            Type::Compound(cmpd_ref) => match self.compounds[cmpd_ref] {
                CompoundType::Array { elem, len } => Some((elem, len)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_array(&self, ty: Type) -> bool {
        self.array_def(ty).is_some()
    }

    pub fn resolve(&self, cmpd_ref: CompoundTypeRef) -> &CompoundType {
        &self.compounds[cmpd_ref]
    }

    fn make_compound(&mut self, compound: CompoundType) -> CompoundTypeRef {
        if let Some(&cmpd_ref) = self.rev_types.get(&compound) {
            return cmpd_ref;
        }

        let cmpd_ref = self.compounds.push(compound.clone());
        self.rev_types.insert(compound, cmpd_ref);
        cmpd_ref
    }
}

/// Target data layout, reduced to what the optimizer queries.
#[derive(Debug, Clone, Copy)]
pub struct DataLayout {
    /// Size and ABI alignment of a pointer, in bytes.
    pub pointer_size: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { pointer_size: 8 }
    }
}

impl DataLayout {
    /// ABI alignment of a type in bytes. An array aligns as its element; a
    /// pointer aligns as the target word.
    pub fn abi_alignment(&self, store: &TypeStore, ty: Type) -> u32 {
        match ty {
            Type::Unit | Type::I1 | Type::I8 => 1,
            Type::I16 => 2,
            Type::I32 => 4,
            Type::I64 => 8,
            Type::Compound(cmpd_ref) => match *store.resolve(cmpd_ref) {
                CompoundType::Array { elem, .. } => self.abi_alignment(store, elem),
                CompoundType::Ptr(..) => self.pointer_size,
            },
        }
    }
}
