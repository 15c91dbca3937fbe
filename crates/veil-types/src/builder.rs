//! Builders for declaring types
//!
//! Definitions are plain data; [`TypeTable::define`](crate::TypeTable::define)
//! validates them and assigns handles.

use crate::ty::{Overridability, ParamMode, TypeKind, TypeRef, Visibility};

/// Parameter definition for method signatures
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeRef,
    /// Passing mode
    pub mode: ParamMode,
}

impl ParameterDefinition {
    /// Create a by-value parameter
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            mode: ParamMode::In,
        }
    }

    /// Pass by reference
    pub fn by_ref(mut self) -> Self {
        self.mode = ParamMode::Ref;
        self
    }

    /// Output-only parameter
    pub fn out(mut self) -> Self {
        self.mode = ParamMode::Out;
        self
    }
}

/// Definition for a method to be declared on a type
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Method name
    pub name: String,
    /// Visibility
    pub visibility: Visibility,
    /// Overriding rules
    pub overridability: Overridability,
    /// Whether this is a static method
    pub is_static: bool,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterDefinition>,
    /// Return type (`Void` by default)
    pub return_type: TypeRef,
    /// Method-level generic parameter names
    pub generic_params: Vec<String>,
}

impl MethodDefinition {
    /// Create a public virtual instance method returning nothing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            overridability: Overridability::Virtual,
            is_static: false,
            parameters: Vec::new(),
            return_type: TypeRef::Void,
            generic_params: Vec::new(),
        }
    }

    /// Add a by-value parameter
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.parameters.push(ParameterDefinition::new(name, ty));
        self
    }

    /// Add a by-reference parameter
    pub fn ref_param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.parameters.push(ParameterDefinition::new(name, ty).by_ref());
        self
    }

    /// Add an output parameter
    pub fn out_param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.parameters.push(ParameterDefinition::new(name, ty).out());
        self
    }

    /// Add a prepared parameter
    pub fn with_param(mut self, param: ParameterDefinition) -> Self {
        self.parameters.push(param);
        self
    }

    /// Set return type
    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.return_type = ty.into();
        self
    }

    /// Declare a method-level generic parameter
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.generic_params.push(name.into());
        self
    }

    /// Mark as abstract (no body)
    pub fn as_abstract(mut self) -> Self {
        self.overridability = Overridability::Abstract;
        self
    }

    /// Mark as a final override
    pub fn as_sealed(mut self) -> Self {
        self.overridability = Overridability::Sealed;
        self
    }

    /// Mark as statically bound
    pub fn non_virtual(mut self) -> Self {
        self.overridability = Overridability::NonVirtual;
        self
    }

    /// Mark as static method
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Set visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Complete definition for declaring a class or interface
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Simple name
    pub name: String,
    /// Dotted namespace, if any
    pub namespace: Option<String>,
    /// `Class` or `Interface`
    pub kind: TypeKind,
    /// Whether subclassing is forbidden
    pub sealed: bool,
    /// Whether instances can be created directly
    pub is_abstract: bool,
    /// Parent class
    pub parent: Option<TypeRef>,
    /// Directly implemented or extended interfaces
    pub interfaces: Vec<TypeRef>,
    /// Type-level generic parameter names
    pub generic_params: Vec<String>,
    /// Declared methods
    pub methods: Vec<MethodDefinition>,
}

impl TypeDefinition {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            kind,
            sealed: false,
            is_abstract: false,
            parent: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Start a class definition
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Start an interface definition
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Place the type in a namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Forbid subclassing
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Forbid direct instantiation
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Set the parent class
    pub fn extends(mut self, parent: impl Into<TypeRef>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add an implemented (or, for interfaces, extended) interface
    pub fn implements(mut self, interface: impl Into<TypeRef>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declare a type-level generic parameter
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.generic_params.push(name.into());
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDefinition) -> Self {
        self.methods.push(method);
        self
    }

    /// Dotted qualified name
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeHandle;

    #[test]
    fn test_method_definition() {
        let method = MethodDefinition::new("swap")
            .ref_param("a", TypeHandle(1))
            .out_param("b", TypeHandle(1))
            .returns(TypeHandle(2))
            .as_abstract();

        assert_eq!(method.name, "swap");
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(method.parameters[0].mode, ParamMode::Ref);
        assert_eq!(method.parameters[1].mode, ParamMode::Out);
        assert_eq!(method.return_type, TypeRef::Named(TypeHandle(2)));
        assert_eq!(method.overridability, Overridability::Abstract);
        assert!(!method.is_static);
    }

    #[test]
    fn test_type_definition() {
        let def = TypeDefinition::class("Repo")
            .in_namespace("app.data")
            .generic_param("T")
            .implements(TypeHandle(4))
            .method(MethodDefinition::new("get").returns(TypeRef::TypeParam(0)));

        assert_eq!(def.qualified_name(), "app.data.Repo");
        assert_eq!(def.kind, TypeKind::Class);
        assert_eq!(def.generic_params, vec!["T".to_string()]);
        assert_eq!(def.interfaces.len(), 1);
        assert_eq!(def.methods.len(), 1);
    }
}
