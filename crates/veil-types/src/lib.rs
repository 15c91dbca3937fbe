//! Veil type model
//!
//! Metadata for classes, interfaces and primitives: handles, method
//! signatures, generic instantiation and the queries the proxy engine needs
//! (ancestors, interface closure, assignability, method lookup).

#![warn(rust_2018_idioms)]

pub mod builder;
pub mod catalog;
pub mod error;
pub mod name;
pub mod signature;
pub mod table;
pub mod ty;

pub use builder::{MethodDefinition, ParameterDefinition, TypeDefinition};
pub use catalog::Catalog;
pub use error::{TypeError, TypeResult};
pub use name::TypeName;
pub use signature::SignatureKey;
pub use table::{Builtins, TypeTable};
pub use ty::{
    MethodDef, MethodHandle, Overridability, ParamDef, ParamMode, PrimitiveType, TypeDef,
    TypeHandle, TypeKind, TypeRef, Visibility,
};
