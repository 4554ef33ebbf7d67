//! Resolved type and declaration interface for the TVM code generator.
//!
//! Upstream passes (parsing, name resolution, type checking) own and produce
//! these values; the backend consumes them read-only. Nothing here performs
//! resolution or checking: this crate is the boundary between the typed tree
//! and code generation.

pub mod def;
pub mod ty;

pub use def::{ContractDef, DeclId, FuncId, FunctionDef, FunctionKind, VarDecl, Visibility};
pub use ty::{EnumDef, FieldDef, FixedPointTy, IntTy, StructDef, Ty, ValueCategory};
