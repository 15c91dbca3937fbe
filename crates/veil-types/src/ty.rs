//! Core metadata definitions for the Veil type model

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// Unique identifier for a type registered in a [`TypeTable`](crate::TypeTable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub(crate) u32);

impl TypeHandle {
    /// Position of this type in its table
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Identity hash of the type.
    ///
    /// Contracts combine these with XOR, so the value is spread over all 64
    /// bits instead of being the raw index.
    pub fn identity_hash(self) -> u64 {
        let mut hasher = FxHasher::default();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.0)
    }
}

/// Identifies one method slot: the declaring type plus its position in that
/// type's method list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    pub(crate) ty: TypeHandle,
    pub(crate) slot: u32,
}

impl MethodHandle {
    /// The type declaring this method
    pub fn declaring_type(self) -> TypeHandle {
        self.ty
    }

    /// Index within the declaring type's method list
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHandle({}:{})", self.ty.0, self.slot)
    }
}

/// Primitive (value) types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
}

impl PrimitiveType {
    /// Every primitive, in registration order
    pub const ALL: [PrimitiveType; 12] = [
        PrimitiveType::Bool,
        PrimitiveType::I8,
        PrimitiveType::I16,
        PrimitiveType::I32,
        PrimitiveType::I64,
        PrimitiveType::U8,
        PrimitiveType::U16,
        PrimitiveType::U32,
        PrimitiveType::U64,
        PrimitiveType::F32,
        PrimitiveType::F64,
        PrimitiveType::Char,
    ];

    /// Source-level name of the primitive
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Char => "char",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What kind of type a [`TypeDef`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Reference type with implementation
    Class,
    /// Reference type describing a set of methods
    Interface,
    /// Value type
    Primitive(PrimitiveType),
}

impl TypeKind {
    /// Classes and interfaces are reference types; primitives are not
    pub fn is_reference(self) -> bool {
        !matches!(self, TypeKind::Primitive(_))
    }
}

/// Reference to a type from inside a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// No value (method return only)
    Void,
    /// A concrete registered type
    Named(TypeHandle),
    /// Generic parameter of the declaring type, by position
    TypeParam(u16),
    /// Generic parameter of the method itself, by position
    MethodParam(u16),
    /// Generic type applied to arguments that are not all concrete yet
    Generic {
        /// The open generic definition
        definition: TypeHandle,
        /// Arguments in parameter order
        args: Vec<TypeRef>,
    },
}

impl TypeRef {
    /// Check for the `Void` marker
    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// The concrete handle, if this reference is fully closed
    pub fn as_named(&self) -> Option<TypeHandle> {
        match self {
            TypeRef::Named(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Whether a declaring-type generic parameter appears anywhere inside
    pub fn mentions_type_param(&self) -> bool {
        match self {
            TypeRef::TypeParam(_) => true,
            TypeRef::Generic { args, .. } => args.iter().any(TypeRef::mentions_type_param),
            _ => false,
        }
    }

    /// Highest method generic parameter index used, if any
    pub fn max_method_param(&self) -> Option<u16> {
        match self {
            TypeRef::MethodParam(index) => Some(*index),
            TypeRef::Generic { args, .. } => {
                args.iter().filter_map(TypeRef::max_method_param).max()
            }
            _ => None,
        }
    }
}

impl From<TypeHandle> for TypeRef {
    fn from(handle: TypeHandle) -> Self {
        TypeRef::Named(handle)
    }
}

/// How an argument is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamMode {
    /// By value
    #[default]
    In,
    /// By reference; the callee may read and overwrite the caller's slot
    Ref,
    /// Output only; the callee overwrites the caller's slot
    Out,
}

impl ParamMode {
    /// `Ref` and `Out` both write back into the caller's storage
    pub fn is_by_ref(self) -> bool {
        matches!(self, ParamMode::Ref | ParamMode::Out)
    }
}

/// Whether a derived type may replace a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overridability {
    /// Has a body and may be overridden
    #[default]
    Virtual,
    /// Has no body and must be overridden
    Abstract,
    /// Final override; no further overriding allowed
    Sealed,
    /// Statically bound; never overridable
    #[serde(rename = "nonvirtual")]
    NonVirtual,
}

impl Overridability {
    /// `Virtual` and `Abstract` methods can receive a new implementation
    pub fn is_overridable(self) -> bool {
        matches!(self, Overridability::Virtual | Overridability::Abstract)
    }
}

/// Member visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// One method parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeRef,
    pub mode: ParamMode,
}

/// A method as registered on its declaring type
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub name: String,
    pub declaring: TypeHandle,
    pub visibility: Visibility,
    pub overridability: Overridability,
    pub is_static: bool,
    pub params: Vec<ParamDef>,
    pub return_type: TypeRef,
    /// Names of the method's own generic parameters
    pub generic_params: Vec<String>,
    /// For methods of a closed generic type: the method it was substituted from
    pub definition: Option<MethodHandle>,
}

impl MethodDef {
    /// Number of method-level generic parameters
    pub fn generic_arity(&self) -> usize {
        self.generic_params.len()
    }

    /// Whether the method declares its own generic parameters
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Public, non-static method
    pub fn is_public_instance(&self) -> bool {
        self.visibility == Visibility::Public && !self.is_static
    }
}

/// Full description of a registered type
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub handle: TypeHandle,
    pub name: String,
    pub namespace: Option<String>,
    pub kind: TypeKind,
    pub sealed: bool,
    pub is_abstract: bool,
    pub parent: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub methods: Vec<MethodDef>,
    /// Generic parameter names for open definitions
    pub generic_params: Vec<String>,
    /// For closed generic types: the open definition
    pub generic_definition: Option<TypeHandle>,
    /// For closed generic types: the concrete arguments
    pub type_arguments: Vec<TypeHandle>,
    /// Synthesized at runtime rather than declared
    pub generated: bool,
    /// Members have been filled in
    pub(crate) complete: bool,
}

impl TypeDef {
    pub(crate) fn skeleton(handle: TypeHandle, name: String, namespace: Option<String>, kind: TypeKind) -> Self {
        Self {
            handle,
            name,
            namespace,
            kind,
            sealed: false,
            is_abstract: false,
            parent: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            generic_params: Vec::new(),
            generic_definition: None,
            type_arguments: Vec::new(),
            generated: false,
            complete: false,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_class(&self) -> bool {
        self.kind == TypeKind::Class
    }

    /// An open generic definition (has parameters and no arguments)
    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty() && self.generic_definition.is_none()
    }

    /// Parent class handle, when it is closed
    pub fn parent_handle(&self) -> Option<TypeHandle> {
        self.parent.as_ref().and_then(TypeRef::as_named)
    }

    /// Handles of the directly implemented interfaces that are closed
    pub fn interface_handles(&self) -> impl Iterator<Item = TypeHandle> + '_ {
        self.interfaces.iter().filter_map(TypeRef::as_named)
    }

    /// Whether the members have been filled in
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Handle of the method at `slot`
    pub fn method_handle(&self, slot: usize) -> MethodHandle {
        MethodHandle {
            ty: self.handle,
            slot: slot as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_hash_is_stable() {
        let a = TypeHandle(7);
        assert_eq!(a.identity_hash(), TypeHandle(7).identity_hash());
        assert_ne!(a.identity_hash(), TypeHandle(8).identity_hash());
    }

    #[test]
    fn test_type_ref_open_checks() {
        let open = TypeRef::Generic {
            definition: TypeHandle(3),
            args: vec![TypeRef::TypeParam(0)],
        };
        assert!(open.mentions_type_param());
        assert_eq!(open.max_method_param(), None);

        let method_generic = TypeRef::Generic {
            definition: TypeHandle(3),
            args: vec![TypeRef::MethodParam(0), TypeRef::MethodParam(2)],
        };
        assert!(!method_generic.mentions_type_param());
        assert_eq!(method_generic.max_method_param(), Some(2));
    }

    #[test]
    fn test_overridability() {
        assert!(Overridability::Virtual.is_overridable());
        assert!(Overridability::Abstract.is_overridable());
        assert!(!Overridability::Sealed.is_overridable());
        assert!(!Overridability::NonVirtual.is_overridable());
    }

    #[test]
    fn test_param_mode_by_ref() {
        assert!(!ParamMode::In.is_by_ref());
        assert!(ParamMode::Ref.is_by_ref());
        assert!(ParamMode::Out.is_by_ref());
    }
}
