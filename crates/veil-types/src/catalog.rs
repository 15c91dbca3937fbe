//! JSON type catalogs
//!
//! A catalog describes classes and interfaces in text form so that tools can
//! load a type model without code. Type strings use the qualified name
//! grammar; inside a declaration, generic parameter names resolve to the
//! declaring type's or method's parameters, and `void` marks no return
//! value.
//!
//! ```json
//! { "types": [
//!   { "name": "ICalc", "namespace": "app", "kind": "interface",
//!     "methods": [ { "name": "add", "returns": "i32",
//!                    "params": [ { "name": "a", "type": "i32" },
//!                                { "name": "b", "type": "i32", "mode": "ref" } ] } ] }
//! ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::builder::{MethodDefinition, ParameterDefinition, TypeDefinition};
use crate::error::{TypeError, TypeResult};
use crate::name::TypeName;
use crate::table::TypeTable;
use crate::ty::{Overridability, ParamMode, TypeHandle, TypeKind, TypeRef, Visibility};

/// Root of a catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

/// Class or interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Class,
    Interface,
}

/// One type declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub kind: DeclKind,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub generic_params: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

/// One method declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub overridability: Overridability,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub generic_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default = "void_name")]
    pub returns: String,
}

/// One parameter declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub mode: ParamMode,
}

fn void_name() -> String {
    "void".to_string()
}

impl Catalog {
    /// Parse a JSON catalog
    pub fn parse(text: &str) -> TypeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Register every declared type.
    ///
    /// Types are declared first and completed second, so declarations may
    /// refer to each other in any order. Returns the handles in declaration
    /// order. A failure part way leaves the types registered so far in the
    /// table.
    pub fn load_into(&self, table: &mut TypeTable) -> TypeResult<Vec<TypeHandle>> {
        let mut handles = Vec::with_capacity(self.types.len());
        for decl in &self.types {
            let kind = match decl.kind {
                DeclKind::Class => TypeKind::Class,
                DeclKind::Interface => TypeKind::Interface,
            };
            handles.push(table.declare(
                decl.name.clone(),
                decl.namespace.clone(),
                kind,
                decl.generic_params.clone(),
            )?);
        }

        for (decl, handle) in self.types.iter().zip(&handles) {
            let definition = decl.to_definition(table)?;
            table.complete(*handle, definition)?;
        }
        Ok(handles)
    }
}

impl TypeDecl {
    fn to_definition(&self, table: &mut TypeTable) -> TypeResult<TypeDefinition> {
        let mut definition = match self.kind {
            DeclKind::Class => TypeDefinition::class(self.name.clone()),
            DeclKind::Interface => TypeDefinition::interface(self.name.clone()),
        };
        if let Some(ns) = &self.namespace {
            definition = definition.in_namespace(ns.clone());
        }
        definition.sealed = self.sealed;
        definition.is_abstract = self.is_abstract;
        definition.generic_params = self.generic_params.clone();

        let scope = Scope {
            namespace: self.namespace.as_deref(),
            type_params: &self.generic_params,
            method_params: &[],
        };
        if let Some(parent) = &self.extends {
            definition.parent = Some(scope.resolve(table, parent)?);
        }
        for iface in &self.implements {
            definition.interfaces.push(scope.resolve(table, iface)?);
        }

        for method in &self.methods {
            let scope = Scope {
                method_params: &method.generic_params,
                ..scope
            };
            let mut built = MethodDefinition::new(method.name.clone())
                .with_visibility(method.visibility)
                .returns(scope.resolve(table, &method.returns)?);
            built.overridability = method.overridability;
            built.is_static = method.is_static;
            built.generic_params = method.generic_params.clone();
            for param in &method.params {
                let mut p = ParameterDefinition::new(param.name.clone(), scope.resolve(table, &param.ty)?);
                p.mode = param.mode;
                built = built.with_param(p);
            }
            definition = definition.method(built);
        }
        Ok(definition)
    }
}

/// Names visible while resolving a type string
#[derive(Clone, Copy)]
struct Scope<'a> {
    namespace: Option<&'a str>,
    type_params: &'a [String],
    method_params: &'a [String],
}

impl Scope<'_> {
    fn resolve(&self, table: &mut TypeTable, text: &str) -> TypeResult<TypeRef> {
        let name = TypeName::parse(text)?;
        self.resolve_name(table, &name)
    }

    fn resolve_name(&self, table: &mut TypeTable, name: &TypeName) -> TypeResult<TypeRef> {
        if name.args.is_empty() {
            if name.path == "void" {
                return Ok(TypeRef::Void);
            }
            // Method parameters shadow type parameters
            if let Some(i) = self.method_params.iter().position(|p| *p == name.path) {
                return Ok(TypeRef::MethodParam(i as u16));
            }
            if let Some(i) = self.type_params.iter().position(|p| *p == name.path) {
                return Ok(TypeRef::TypeParam(i as u16));
            }
        }

        let handle = self.lookup(table, &name.path)?;
        if name.args.is_empty() {
            return Ok(TypeRef::Named(handle));
        }
        let mut args = Vec::with_capacity(name.args.len());
        for arg in &name.args {
            args.push(self.resolve_name(table, arg)?);
        }
        Ok(TypeRef::Generic {
            definition: handle,
            args,
        })
    }

    // Names relative to the declaring namespace win over global ones
    fn lookup(&self, table: &TypeTable, path: &str) -> TypeResult<TypeHandle> {
        if let Some(ns) = self.namespace {
            if let Some(handle) = table.lookup(&format!("{}.{}", ns, path)) {
                return Ok(handle);
            }
        }
        table.lookup(path).ok_or_else(|| TypeError::UndefinedType {
            name: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "types": [
            { "name": "Calculator", "namespace": "app", "kind": "class",
              "implements": ["ICalc"],
              "methods": [
                { "name": "add", "returns": "i32",
                  "params": [ { "name": "a", "type": "i32" }, { "name": "b", "type": "i32" } ] },
                { "name": "reset", "overridability": "nonvirtual" }
              ] },
            { "name": "ICalc", "namespace": "app", "kind": "interface",
              "methods": [ { "name": "add", "returns": "i32",
                  "params": [ { "name": "a", "type": "i32" }, { "name": "b", "type": "i32" } ] } ] },
            { "name": "IRepo", "namespace": "app", "kind": "interface", "generic_params": ["T"],
              "methods": [
                { "name": "get", "returns": "T", "params": [ { "name": "id", "type": "i32" } ] },
                { "name": "convert", "generic_params": ["U"], "returns": "U",
                  "params": [ { "name": "item", "type": "T" }, { "name": "slot", "type": "U", "mode": "out" } ] }
              ] },
            { "name": "CalcRepo", "namespace": "app", "kind": "interface",
              "implements": ["IRepo<Calculator>"] }
        ]
    }"#;

    #[test]
    fn test_load_with_forward_references() {
        let mut table = TypeTable::new();
        let catalog = Catalog::parse(CATALOG).unwrap();
        let handles = catalog.load_into(&mut table).unwrap();
        assert_eq!(handles.len(), 4);

        let calc = table.lookup("app.Calculator").unwrap();
        let icalc = table.lookup("app.ICalc").unwrap();
        assert!(table.is_assignable(calc, icalc));

        let def = table.type_def(calc).unwrap();
        assert_eq!(def.methods[0].return_type.as_named(), Some(table.builtins().primitive(crate::PrimitiveType::I32)));
        assert_eq!(def.methods[1].overridability, Overridability::NonVirtual);
        assert!(def.methods[1].return_type.is_void());
    }

    #[test]
    fn test_generic_parameters_resolve_in_scope() {
        let mut table = TypeTable::new();
        Catalog::parse(CATALOG).unwrap().load_into(&mut table).unwrap();

        let repo = table.lookup("app.IRepo").unwrap();
        let def = table.type_def(repo).unwrap();
        assert_eq!(def.methods[0].return_type, TypeRef::TypeParam(0));
        let convert = &def.methods[1];
        assert_eq!(convert.return_type, TypeRef::MethodParam(0));
        assert_eq!(convert.params[0].ty, TypeRef::TypeParam(0));
        assert_eq!(convert.params[1].mode, ParamMode::Out);

        let calc_repo = table.lookup("app.CalcRepo").unwrap();
        let closed = table.resolve_name("app.IRepo<app.Calculator>").unwrap();
        assert_eq!(table.interface_closure(calc_repo), vec![closed]);
    }

    #[test]
    fn test_unknown_type_is_reported() {
        let mut table = TypeTable::new();
        let catalog = Catalog::parse(
            r#"{ "types": [ { "name": "A", "kind": "class", "extends": "Missing" } ] }"#,
        )
        .unwrap();
        let err = catalog.load_into(&mut table).unwrap_err();
        assert_eq!(
            err,
            TypeError::UndefinedType {
                name: "Missing".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(Catalog::parse("{ types: "), Err(TypeError::Catalog(_))));
    }
}
