use std::rc::Rc;

use crate::function::FunctionDecl;
use crate::native_functions::{NativeClassDef, NativeMethodDef};
use crate::types::TypeRef;

/// Scope distance marking a global binding, resolved from the globals
/// frame or the host directories rather than a local frame.
pub const GLOBAL_DISTANCE: isize = -1;

/// The resolver's verdict about which slot an identifier-use refers to.
/// Bindings are keyed externally by the address of the referring
/// expression node; one node gets at most one binding per resolution pass.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable {
        type_ref: TypeRef,
        distance: isize,
    },
    Function {
        declaration: Rc<FunctionDecl>,
        type_ref: TypeRef,
        distance: isize,
    },
    /// A host-provided callable under a global name.
    Native { method: Rc<NativeMethodDef> },
    /// A host class or super-global object (`Base64`, `ARGV`).
    NativeObject { class: Rc<NativeClassDef> },
    /// A user-declared class. Carries no callable surface in this core.
    Class { name: String },
}

impl Binding {
    /// Only variable and function bindings know a scope distance; the
    /// host-provided kinds are implicitly global.
    pub fn distance(&self) -> Option<isize> {
        match self {
            Binding::Variable { distance, .. } | Binding::Function { distance, .. } => {
                Some(*distance)
            }
            _ => None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.distance().is_some_and(|d| d >= 0)
    }
}
