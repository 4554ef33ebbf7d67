//! Declarations and contract layout.

use crate::ty::Ty;
use index_vec::{IndexVec, define_index_type};

define_index_type! {
    /// Identity of a variable declaration (state variable, parameter, local).
    pub struct DeclId = u32;
}

define_index_type! {
    /// Identity of a function definition.
    pub struct FuncId = u32;
}

/// A variable declaration.
#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: String,
    pub ty: Ty,
    /// Compile-time constants take no storage slot.
    pub is_constant: bool,
    /// Static variables are placed in the persisted data cell at deploy time.
    pub is_static: bool,
}

/// What kind of entry point a function is; drives reserved naming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Regular,
    Constructor,
    Fallback,
    Receive,
    OnCodeUpgrade,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
}

/// A function definition as the backend sees it: signature and naming facts
/// only, the body is traversed by the external driver.
#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    /// Name of the contract that defines this function.
    pub contract_name: String,
    /// True if some derived contract overrides this function; such base
    /// functions are mangled with their contract's name when called by point.
    pub is_overridden_base: bool,
    /// True for free functions attached to a library contract.
    pub is_library: bool,
    pub params: Vec<VarDecl>,
    pub returns: Vec<Ty>,
}

impl FunctionDef {
    /// Net stack effect of calling this function: returns minus parameters.
    #[must_use]
    pub fn call_stack_delta(&self) -> i32 {
        self.returns.len() as i32 - self.params.len() as i32
    }
}

/// A contract after inheritance linearization.
#[derive(Clone, Debug, Default)]
pub struct ContractDef {
    pub name: String,
    /// State variables in declaration order across the linearized base chain,
    /// most-base first. Constants are included but take no slot.
    pub state_variables: IndexVec<DeclId, VarDecl>,
    /// All functions reachable from this contract.
    pub functions: IndexVec<FuncId, FunctionDef>,
}

impl ContractDef {
    /// The `stdlib` pseudo-contract keeps unmangled function names.
    #[must_use]
    pub fn is_stdlib(&self) -> bool {
        self.name == "stdlib"
    }

    /// State variables that occupy storage slots, in declaration order.
    pub fn non_constant_state_variables(&self) -> impl Iterator<Item = (DeclId, &VarDecl)> {
        self.state_variables.iter_enumerated().filter(|(_, v)| !v.is_constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_constant_state_variables_skip_constants() {
        let mut contract = ContractDef { name: "C".into(), ..Default::default() };
        contract.state_variables.push(VarDecl {
            name: "a".into(),
            ty: Ty::uint(256),
            is_constant: false,
            is_static: false,
        });
        contract.state_variables.push(VarDecl {
            name: "K".into(),
            ty: Ty::uint(8),
            is_constant: true,
            is_static: false,
        });
        contract.state_variables.push(VarDecl {
            name: "b".into(),
            ty: Ty::Bool,
            is_constant: false,
            is_static: false,
        });

        let names: Vec<_> =
            contract.non_constant_state_variables().map(|(_, v)| v.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
