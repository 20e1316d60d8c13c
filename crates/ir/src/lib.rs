pub mod builder;
pub mod dfg;
pub mod function;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod module;
pub mod types;
pub mod value;

pub use dfg::{Block, BlockId, DataFlowGraph};
pub use function::{FuncAttrs, Function, Signature};
pub use inst::{CallTarget, Inst, InstId, IntrinsicKind, SideEffect};
pub use layout::Layout;
pub use linkage::Linkage;
pub use module::{Comdat, ComdatRef, FuncRef, Module};
pub use types::{CompoundType, CompoundTypeRef, DataLayout, Type, TypeStore};
pub use value::{Immediate, Value, ValueId};
