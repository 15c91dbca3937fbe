//! Method identity by signature
//!
//! Two methods are "the same slot" when name, generic arity and parameter
//! list (types and passing modes) agree. The return type does not take part.

use crate::ty::{MethodDef, ParamMode, TypeRef};

/// Signature-based method identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    /// Method name
    pub name: String,
    /// Number of method-level generic parameters
    pub generic_arity: usize,
    /// Parameter types and modes, in order
    pub params: Vec<(TypeRef, ParamMode)>,
}

impl SignatureKey {
    /// Key of a registered method
    pub fn of(method: &MethodDef) -> Self {
        Self {
            name: method.name.clone(),
            generic_arity: method.generic_arity(),
            params: method
                .params
                .iter()
                .map(|p| (p.ty.clone(), p.mode))
                .collect(),
        }
    }
}
