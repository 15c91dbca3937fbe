//! Type table
//!
//! Owns every [`TypeDef`] and hands out [`TypeHandle`]s. Types are declared
//! (name and kind) and then completed (members); the split lets catalogs
//! refer to types before their members are known. Closed generic types are
//! memoized per (definition, arguments) and are filled in as soon as their
//! definition is complete.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::builder::{MethodDefinition, TypeDefinition};
use crate::error::{TypeError, TypeResult};
use crate::name::TypeName;
use crate::signature::SignatureKey;
use crate::ty::{
    MethodDef, MethodHandle, Overridability, ParamDef, PrimitiveType, TypeDef, TypeHandle,
    TypeKind, TypeRef, Visibility,
};

/// Handles of the types every table starts with
#[derive(Debug, Clone)]
pub struct Builtins {
    /// Root of every class hierarchy
    pub object: TypeHandle,
    /// Built-in string type (sealed reference type)
    pub string: TypeHandle,
    /// Neutral parent used when a proxy implements an interface only
    pub proxy_base: TypeHandle,
    /// Marker interface for proxies that can be persisted
    pub persistable: TypeHandle,
    primitives: [TypeHandle; 12],
}

impl Builtins {
    /// Handle of a primitive type
    pub fn primitive(&self, primitive: PrimitiveType) -> TypeHandle {
        let index = PrimitiveType::ALL
            .iter()
            .position(|p| *p == primitive)
            .unwrap_or(0);
        self.primitives[index]
    }
}

/// Registry of all known types
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<TypeDef>,
    by_name: FxHashMap<String, TypeHandle>,
    instantiations: FxHashMap<(TypeHandle, Vec<TypeHandle>), TypeHandle>,
    builtins: Builtins,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Create a table holding the built-in types
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            by_name: FxHashMap::default(),
            instantiations: FxHashMap::default(),
            builtins: Builtins {
                object: TypeHandle(0),
                string: TypeHandle(1),
                proxy_base: TypeHandle(0),
                persistable: TypeHandle(0),
                primitives: [TypeHandle(0); 12],
            },
        };

        let object = table.push_builtin("object", TypeKind::Class);
        let string = table.push_builtin("string", TypeKind::Class);
        let mut primitives = [object; 12];
        for (i, primitive) in PrimitiveType::ALL.iter().enumerate() {
            primitives[i] = table.push_builtin(primitive.name(), TypeKind::Primitive(*primitive));
        }
        table.builtins.object = object;
        table.builtins.string = string;
        table.builtins.primitives = primitives;

        // string and the primitives have no members and cannot be extended
        for handle in std::iter::once(string).chain(primitives) {
            let def = &mut table.types[handle.index()];
            def.sealed = true;
            def.parent = Some(TypeRef::Named(object));
            def.complete = true;
        }

        let bool_ty = table.builtins.primitive(PrimitiveType::Bool);
        let i32_ty = table.builtins.primitive(PrimitiveType::I32);
        let object_methods = vec![
            MethodDef {
                name: "to_string".to_string(),
                declaring: object,
                visibility: Visibility::Public,
                overridability: Overridability::Virtual,
                is_static: false,
                params: Vec::new(),
                return_type: TypeRef::Named(string),
                generic_params: Vec::new(),
                definition: None,
            },
            MethodDef {
                name: "equals".to_string(),
                declaring: object,
                visibility: Visibility::Public,
                overridability: Overridability::Virtual,
                is_static: false,
                params: vec![ParamDef {
                    name: "other".to_string(),
                    ty: TypeRef::Named(object),
                    mode: Default::default(),
                }],
                return_type: TypeRef::Named(bool_ty),
                generic_params: Vec::new(),
                definition: None,
            },
            MethodDef {
                name: "hash_code".to_string(),
                declaring: object,
                visibility: Visibility::Public,
                overridability: Overridability::Virtual,
                is_static: false,
                params: Vec::new(),
                return_type: TypeRef::Named(i32_ty),
                generic_params: Vec::new(),
                definition: None,
            },
        ];
        {
            let def = &mut table.types[object.index()];
            def.methods = object_methods;
            def.complete = true;
        }

        // Built-in definitions are known to be valid
        table.builtins.proxy_base = table
            .define(TypeDefinition::class("ProxyBase").in_namespace("veil"))
            .unwrap_or(object);
        table.builtins.persistable = table
            .define(
                TypeDefinition::interface("Persistable")
                    .in_namespace("veil")
                    .method(MethodDefinition::new("get_object_data").returns(string)),
            )
            .unwrap_or(object);

        table
    }

    fn push_builtin(&mut self, name: &str, kind: TypeKind) -> TypeHandle {
        let handle = TypeHandle(self.types.len() as u32);
        self.types
            .push(TypeDef::skeleton(handle, name.to_string(), None, kind));
        self.by_name.insert(name.to_string(), handle);
        handle
    }

    /// Handles of the built-in types
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Number of registered types, closed generic types included
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the table is empty (never true once constructed)
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Get a type by handle
    pub fn get(&self, handle: TypeHandle) -> Option<&TypeDef> {
        self.types.get(handle.index())
    }

    /// Get a type by handle, failing for foreign handles
    pub fn type_def(&self, handle: TypeHandle) -> TypeResult<&TypeDef> {
        self.get(handle).ok_or_else(|| TypeError::UndefinedType {
            name: handle.to_string(),
        })
    }

    /// Get a method by handle
    pub fn method(&self, handle: MethodHandle) -> Option<&MethodDef> {
        self.get(handle.ty)?.methods.get(handle.slot())
    }

    /// Find a type by exact qualified name
    pub fn lookup(&self, qualified_name: &str) -> Option<TypeHandle> {
        self.by_name.get(qualified_name).copied()
    }

    /// Resolve a qualified name, instantiating generic types as needed
    pub fn resolve_name(&mut self, text: &str) -> TypeResult<TypeHandle> {
        let name = TypeName::parse(text)?;
        self.resolve_type_name(&name)
    }

    /// Resolve an already parsed name
    pub fn resolve_type_name(&mut self, name: &TypeName) -> TypeResult<TypeHandle> {
        let handle = self
            .lookup(&name.path)
            .ok_or_else(|| TypeError::UndefinedType {
                name: name.path.clone(),
            })?;
        if name.args.is_empty() {
            return Ok(handle);
        }

        let mut args = Vec::with_capacity(name.args.len());
        for arg in &name.args {
            args.push(self.resolve_type_name(arg)?);
        }
        self.instantiate(handle, &args)
    }

    /// Fully qualified identity string (`ns.Name<ns.Arg>`)
    pub fn qualified_name(&self, handle: TypeHandle) -> String {
        let Some(def) = self.get(handle) else {
            return handle.to_string();
        };
        let base = match &def.namespace {
            Some(ns) => format!("{}.{}", ns, def.name),
            None => def.name.clone(),
        };
        if def.type_arguments.is_empty() {
            return base;
        }
        let args: Vec<String> = def
            .type_arguments
            .iter()
            .map(|arg| self.qualified_name(*arg))
            .collect();
        format!("{}<{}>", base, args.join(", "))
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Reserve a handle for a type whose members come later
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        namespace: Option<String>,
        kind: TypeKind,
        generic_params: Vec<String>,
    ) -> TypeResult<TypeHandle> {
        let name = name.into();
        let qualified = match &namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name.clone(),
        };
        if self.by_name.contains_key(&qualified) {
            return Err(TypeError::DuplicateType { name: qualified });
        }
        if matches!(kind, TypeKind::Primitive(_)) {
            return Err(TypeError::InvalidTypeReference {
                context: qualified,
                reason: "primitive types are built in".to_string(),
            });
        }

        let handle = TypeHandle(self.types.len() as u32);
        let mut def = TypeDef::skeleton(handle, name, namespace, kind);
        def.generic_params = generic_params;
        self.types.push(def);
        self.by_name.insert(qualified, handle);
        Ok(handle)
    }

    /// Declare and complete in one step
    pub fn define(&mut self, definition: TypeDefinition) -> TypeResult<TypeHandle> {
        let handle = self.declare(
            definition.name.clone(),
            definition.namespace.clone(),
            definition.kind,
            definition.generic_params.clone(),
        )?;
        if let Err(err) = self.complete(handle, definition) {
            self.discard_last(handle);
            return Err(err);
        }
        Ok(handle)
    }

    /// Define a runtime-synthesized class. A numeric suffix is appended when
    /// the requested name is taken.
    pub fn define_generated(&mut self, definition: TypeDefinition) -> TypeResult<TypeHandle> {
        let mut candidate = definition;
        let base_name = candidate.name.clone();
        let mut counter = 1;
        while self.by_name.contains_key(&candidate.qualified_name()) {
            counter += 1;
            candidate.name = format!("{}${}", base_name, counter);
        }
        let handle = self.define(candidate)?;
        self.types[handle.index()].generated = true;
        Ok(handle)
    }

    // A failed define leaves no trace, unless something else was registered
    // in between (closed generic types created while resolving members).
    fn discard_last(&mut self, handle: TypeHandle) {
        if handle.index() + 1 == self.types.len() {
            let qualified = self.qualified_name(handle);
            self.by_name.remove(&qualified);
            self.types.pop();
        }
    }

    /// Fill in the members of a declared type
    pub fn complete(&mut self, handle: TypeHandle, definition: TypeDefinition) -> TypeResult<()> {
        let name = self.qualified_name(handle);
        let existing = self.type_def(handle)?;
        if existing.complete {
            return Err(TypeError::AlreadyComplete { name });
        }
        if existing.kind != definition.kind {
            return Err(TypeError::InvalidTypeReference {
                context: name,
                reason: "kind differs from declaration".to_string(),
            });
        }
        if existing.generic_params.len() != definition.generic_params.len() {
            return Err(TypeError::InvalidTypeArgCount {
                name,
                expected: existing.generic_params.len(),
                actual: definition.generic_params.len(),
            });
        }

        let type_arity = definition.generic_params.len();
        let is_interface = definition.kind == TypeKind::Interface;

        let parent = if is_interface {
            if definition.parent.is_some() {
                return Err(TypeError::InvalidTypeReference {
                    context: name,
                    reason: "interfaces cannot extend classes".to_string(),
                });
            }
            None
        } else {
            let requested = definition
                .parent
                .clone()
                .unwrap_or(TypeRef::Named(self.builtins.object));
            let parent = self.resolve_ref(&requested, type_arity, 0, &name)?;
            let parent_handle = match &parent {
                TypeRef::Named(h) => Some(*h),
                TypeRef::Generic { definition, .. } => Some(*definition),
                _ => {
                    return Err(TypeError::InvalidTypeReference {
                        context: name,
                        reason: "parent must be a class".to_string(),
                    })
                }
            };
            if let Some(parent_handle) = parent_handle {
                let parent_def = self.type_def(parent_handle)?;
                if !parent_def.is_class() {
                    return Err(TypeError::NotAClass {
                        name: self.qualified_name(parent_handle),
                    });
                }
                if parent_def.sealed {
                    return Err(TypeError::InvalidTypeReference {
                        context: name,
                        reason: format!(
                            "cannot extend sealed type {}",
                            self.qualified_name(parent_handle)
                        ),
                    });
                }
            }
            Some(parent)
        };

        let mut interfaces = Vec::with_capacity(definition.interfaces.len());
        for requested in &definition.interfaces {
            let iface = self.resolve_ref(requested, type_arity, 0, &name)?;
            let iface_handle = match &iface {
                TypeRef::Named(h) => *h,
                TypeRef::Generic { definition, .. } => *definition,
                _ => {
                    return Err(TypeError::InvalidTypeReference {
                        context: name,
                        reason: "interface list entries must be types".to_string(),
                    })
                }
            };
            if !self.type_def(iface_handle)?.is_interface() {
                return Err(TypeError::NotAnInterface {
                    name: self.qualified_name(iface_handle),
                });
            }
            if !interfaces.contains(&iface) {
                interfaces.push(iface);
            }
        }

        let mut methods = Vec::with_capacity(definition.methods.len());
        for method in &definition.methods {
            methods.push(self.build_method(handle, method, type_arity, is_interface, &name)?);
        }

        let def = &mut self.types[handle.index()];
        def.sealed = definition.sealed;
        def.is_abstract = definition.is_abstract || is_interface;
        def.parent = parent;
        def.interfaces = interfaces;
        def.methods = methods;
        def.generic_params = definition.generic_params;
        def.complete = true;

        let pending: Vec<TypeHandle> = self
            .instantiations
            .iter()
            .filter(|((generic, _), _)| *generic == handle)
            .map(|(_, closed)| *closed)
            .collect();
        for closed in pending {
            self.materialize(closed)?;
        }
        Ok(())
    }

    fn build_method(
        &mut self,
        declaring: TypeHandle,
        method: &MethodDefinition,
        type_arity: usize,
        is_interface: bool,
        type_name: &str,
    ) -> TypeResult<MethodDef> {
        let context = format!("{}.{}", type_name, method.name);
        let method_arity = method.generic_params.len();

        let mut params = Vec::with_capacity(method.parameters.len());
        for param in &method.parameters {
            if param.ty.is_void() {
                return Err(TypeError::InvalidTypeReference {
                    context,
                    reason: format!("parameter '{}' cannot be void", param.name),
                });
            }
            params.push(ParamDef {
                name: param.name.clone(),
                ty: self.resolve_ref(&param.ty, type_arity, method_arity, &context)?,
                mode: param.mode,
            });
        }
        let return_type = self.resolve_ref(&method.return_type, type_arity, method_arity, &context)?;

        let (visibility, overridability, is_static) = if is_interface {
            (Visibility::Public, Overridability::Abstract, false)
        } else {
            (method.visibility, method.overridability, method.is_static)
        };

        Ok(MethodDef {
            name: method.name.clone(),
            declaring,
            visibility,
            overridability,
            is_static,
            params,
            return_type,
            generic_params: method.generic_params.clone(),
            definition: None,
        })
    }

    /// Validate a reference in a declaration scope and close generic
    /// applications whose arguments are all concrete
    fn resolve_ref(
        &mut self,
        reference: &TypeRef,
        type_arity: usize,
        method_arity: usize,
        context: &str,
    ) -> TypeResult<TypeRef> {
        match reference {
            TypeRef::Void => Ok(TypeRef::Void),
            TypeRef::Named(handle) => {
                let def = self.type_def(*handle)?;
                if def.is_generic_definition() {
                    return Err(TypeError::InvalidTypeArgCount {
                        name: self.qualified_name(*handle),
                        expected: def.generic_params.len(),
                        actual: 0,
                    });
                }
                Ok(reference.clone())
            }
            TypeRef::TypeParam(index) if (*index as usize) < type_arity => Ok(reference.clone()),
            TypeRef::TypeParam(index) => Err(TypeError::InvalidTypeReference {
                context: context.to_string(),
                reason: format!("type parameter {} out of range", index),
            }),
            TypeRef::MethodParam(index) if (*index as usize) < method_arity => {
                Ok(reference.clone())
            }
            TypeRef::MethodParam(index) => Err(TypeError::InvalidTypeReference {
                context: context.to_string(),
                reason: format!("method type parameter {} out of range", index),
            }),
            TypeRef::Generic { definition, args } => {
                let expected = self.type_def(*definition)?.generic_params.len();
                if expected != args.len() {
                    return Err(TypeError::InvalidTypeArgCount {
                        name: self.qualified_name(*definition),
                        expected,
                        actual: args.len(),
                    });
                }
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    if arg.is_void() {
                        return Err(TypeError::InvalidTypeReference {
                            context: context.to_string(),
                            reason: "void is not a type argument".to_string(),
                        });
                    }
                    resolved.push(self.resolve_ref(arg, type_arity, method_arity, context)?);
                }
                self.close_generic(*definition, resolved)
            }
        }
    }

    fn close_generic(&mut self, definition: TypeHandle, args: Vec<TypeRef>) -> TypeResult<TypeRef> {
        let handles: Option<Vec<TypeHandle>> = args.iter().map(TypeRef::as_named).collect();
        match handles {
            Some(handles) => Ok(TypeRef::Named(self.instantiate(definition, &handles)?)),
            None => Ok(TypeRef::Generic { definition, args }),
        }
    }

    // ========================================================================
    // Generics
    // ========================================================================

    /// Close a generic definition over concrete arguments (memoized)
    pub fn instantiate(&mut self, definition: TypeHandle, args: &[TypeHandle]) -> TypeResult<TypeHandle> {
        let def = self.type_def(definition)?;
        if !def.is_generic_definition() || def.generic_params.len() != args.len() {
            return Err(TypeError::InvalidTypeArgCount {
                name: self.qualified_name(definition),
                expected: def.generic_params.len(),
                actual: args.len(),
            });
        }
        for arg in args {
            if self.type_def(*arg)?.is_generic_definition() {
                return Err(TypeError::InvalidTypeReference {
                    context: self.qualified_name(definition),
                    reason: format!("{} is an open generic type", self.qualified_name(*arg)),
                });
            }
        }

        let key = (definition, args.to_vec());
        if let Some(existing) = self.instantiations.get(&key) {
            return Ok(*existing);
        }

        let handle = TypeHandle(self.types.len() as u32);
        let mut closed = TypeDef::skeleton(handle, def.name.clone(), def.namespace.clone(), def.kind);
        closed.generic_definition = Some(definition);
        closed.type_arguments = args.to_vec();
        let definition_complete = def.complete;
        self.types.push(closed);
        self.instantiations.insert(key, handle);
        let qualified = self.qualified_name(handle);
        self.by_name.insert(qualified, handle);

        if definition_complete {
            self.materialize(handle)?;
        }
        Ok(handle)
    }

    fn materialize(&mut self, closed: TypeHandle) -> TypeResult<()> {
        let (definition, args) = {
            let def = self.type_def(closed)?;
            match def.generic_definition {
                Some(definition) => (definition, def.type_arguments.clone()),
                None => return Ok(()),
            }
        };
        let generic = self.type_def(definition)?.clone();

        let parent = match &generic.parent {
            Some(parent) => Some(self.substitute(parent, &args, None)?),
            None => None,
        };
        let mut interfaces = Vec::with_capacity(generic.interfaces.len());
        for iface in &generic.interfaces {
            interfaces.push(self.substitute(iface, &args, None)?);
        }
        let mut methods = Vec::with_capacity(generic.methods.len());
        for (slot, method) in generic.methods.iter().enumerate() {
            let mut params = Vec::with_capacity(method.params.len());
            for param in &method.params {
                params.push(ParamDef {
                    name: param.name.clone(),
                    ty: self.substitute(&param.ty, &args, None)?,
                    mode: param.mode,
                });
            }
            methods.push(MethodDef {
                declaring: closed,
                params,
                return_type: self.substitute(&method.return_type, &args, None)?,
                definition: Some(generic.method_handle(slot)),
                ..method.clone()
            });
        }

        let def = &mut self.types[closed.index()];
        def.sealed = generic.sealed;
        def.is_abstract = generic.is_abstract;
        def.parent = parent;
        def.interfaces = interfaces;
        def.methods = methods;
        def.complete = true;
        Ok(())
    }

    /// Replace generic parameters by concrete types.
    ///
    /// Declaring-type parameters come from `type_args`; method parameters
    /// from `method_args` when given, and are left in place otherwise.
    pub fn substitute(
        &mut self,
        reference: &TypeRef,
        type_args: &[TypeHandle],
        method_args: Option<&[TypeHandle]>,
    ) -> TypeResult<TypeRef> {
        match reference {
            TypeRef::Void | TypeRef::Named(_) => Ok(reference.clone()),
            TypeRef::TypeParam(index) => type_args
                .get(*index as usize)
                .map(|h| TypeRef::Named(*h))
                .ok_or_else(|| TypeError::InvalidTypeReference {
                    context: "substitution".to_string(),
                    reason: format!("type parameter {} has no argument", index),
                }),
            TypeRef::MethodParam(index) => match method_args {
                Some(args) => args
                    .get(*index as usize)
                    .map(|h| TypeRef::Named(*h))
                    .ok_or_else(|| TypeError::InvalidTypeReference {
                        context: "substitution".to_string(),
                        reason: format!("method type parameter {} has no argument", index),
                    }),
                None => Ok(reference.clone()),
            },
            TypeRef::Generic { definition, args } => {
                let mut substituted = Vec::with_capacity(args.len());
                for arg in args {
                    substituted.push(self.substitute(arg, type_args, method_args)?);
                }
                self.close_generic(*definition, substituted)
            }
        }
    }

    /// [`substitute`](Self::substitute) without creating types: constructed
    /// types resolve only through existing instantiations. `None` when one
    /// would have to be created or an argument is missing.
    pub fn try_substitute(
        &self,
        reference: &TypeRef,
        type_args: &[TypeHandle],
        method_args: Option<&[TypeHandle]>,
    ) -> Option<TypeRef> {
        match reference {
            TypeRef::Void | TypeRef::Named(_) => Some(reference.clone()),
            TypeRef::TypeParam(index) => type_args.get(*index as usize).map(|h| TypeRef::Named(*h)),
            TypeRef::MethodParam(index) => match method_args {
                Some(args) => args.get(*index as usize).map(|h| TypeRef::Named(*h)),
                None => Some(reference.clone()),
            },
            TypeRef::Generic { definition, args } => {
                let mut substituted = Vec::with_capacity(args.len());
                for arg in args {
                    substituted.push(self.try_substitute(arg, type_args, method_args)?);
                }
                let handles: Option<Vec<TypeHandle>> =
                    substituted.iter().map(TypeRef::as_named).collect();
                match handles {
                    Some(handles) => self
                        .instantiations
                        .get(&(*definition, handles))
                        .map(|h| TypeRef::Named(*h)),
                    None => Some(TypeRef::Generic {
                        definition: *definition,
                        args: substituted,
                    }),
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether values of this type are references (classes and interfaces)
    pub fn is_reference_type(&self, handle: TypeHandle) -> bool {
        self.get(handle).map(|d| d.kind.is_reference()).unwrap_or(false)
    }

    /// The type followed by its parent chain up to `object`
    pub fn ancestors(&self, handle: TypeHandle) -> Vec<TypeHandle> {
        let mut chain = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if chain.contains(&h) {
                break;
            }
            chain.push(h);
            current = self.get(h).and_then(TypeDef::parent_handle);
        }
        chain
    }

    /// Every interface a type implements or extends, transitively and
    /// without duplicates. An interface is not part of its own closure.
    pub fn interface_closure(&self, handle: TypeHandle) -> Vec<TypeHandle> {
        let mut out = Vec::new();
        for ty in self.ancestors(handle) {
            if let Some(def) = self.get(ty) {
                for iface in def.interface_handles() {
                    self.visit_interface(iface, &mut out);
                }
            }
        }
        out
    }

    fn visit_interface(&self, iface: TypeHandle, out: &mut Vec<TypeHandle>) {
        if out.contains(&iface) {
            return;
        }
        out.push(iface);
        if let Some(def) = self.get(iface) {
            for inherited in def.interface_handles() {
                self.visit_interface(inherited, out);
            }
        }
    }

    /// Whether a value of type `from` may be used where `to` is expected
    pub fn is_assignable(&self, from: TypeHandle, to: TypeHandle) -> bool {
        if from == to || to == self.builtins.object {
            return true;
        }
        match self.get(to) {
            Some(target) if target.is_interface() => self.interface_closure(from).contains(&to),
            Some(_) => self.ancestors(from).contains(&to),
            None => false,
        }
    }

    /// Public instance methods visible on a type, most-derived declaration
    /// first. For interfaces only the interface's own methods are listed.
    pub fn public_instance_methods(&self, handle: TypeHandle) -> Vec<MethodHandle> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for ty in self.ancestors(handle) {
            let Some(def) = self.get(ty) else { continue };
            for (slot, method) in def.methods.iter().enumerate() {
                if method.is_public_instance() && seen.insert(SignatureKey::of(method)) {
                    out.push(def.method_handle(slot));
                }
            }
        }
        out
    }

    /// First public instance method with this name on the type, then on its
    /// interfaces
    pub fn find_method(&self, handle: TypeHandle, name: &str) -> Option<MethodHandle> {
        let own = self
            .public_instance_methods(handle)
            .into_iter()
            .find(|m| self.method(*m).map(|d| d.name == name).unwrap_or(false));
        if own.is_some() {
            return own;
        }
        self.interface_closure(handle).into_iter().find_map(|iface| {
            self.public_instance_methods(iface)
                .into_iter()
                .find(|m| self.method(*m).map(|d| d.name == name).unwrap_or(false))
        })
    }

    /// Most-derived method with a body matching `key`, starting at `handle`
    pub fn find_implementation(&self, handle: TypeHandle, key: &SignatureKey) -> Option<MethodHandle> {
        for ty in self.ancestors(handle) {
            let Some(def) = self.get(ty) else { continue };
            for (slot, method) in def.methods.iter().enumerate() {
                if method.is_static || method.overridability == Overridability::Abstract {
                    continue;
                }
                if &SignatureKey::of(method) == key {
                    return Some(def.method_handle(slot));
                }
            }
        }
        None
    }

    /// Signature identity of a registered method
    pub fn signature_key(&self, handle: MethodHandle) -> Option<SignatureKey> {
        self.method(handle).map(SignatureKey::of)
    }

    /// Readable rendering of a type reference in the scope of `method`
    pub fn describe_ref(&self, reference: &TypeRef, method: Option<&MethodDef>) -> String {
        match reference {
            TypeRef::Void => "void".to_string(),
            TypeRef::Named(handle) => self.qualified_name(*handle),
            TypeRef::TypeParam(index) => method
                .and_then(|m| self.get(m.declaring))
                .and_then(|d| d.generic_params.get(*index as usize).cloned())
                .unwrap_or_else(|| format!("T{}", index)),
            TypeRef::MethodParam(index) => method
                .and_then(|m| m.generic_params.get(*index as usize).cloned())
                .unwrap_or_else(|| format!("M{}", index)),
            TypeRef::Generic { definition, args } => {
                let args: Vec<String> = args.iter().map(|a| self.describe_ref(a, method)).collect();
                format!("{}<{}>", self.qualified_name(*definition), args.join(", "))
            }
        }
    }

    /// Readable method signature, e.g. `app.Calc.add(i32 a, ref i32 b) -> i32`
    pub fn describe_method(&self, handle: MethodHandle) -> String {
        let Some(method) = self.method(handle) else {
            return handle.to_string();
        };
        let mut text = format!("{}.{}", self.qualified_name(method.declaring), method.name);
        if method.is_generic() {
            text.push('<');
            text.push_str(&method.generic_params.join(", "));
            text.push('>');
        }
        let params: Vec<String> = method
            .params
            .iter()
            .map(|p| {
                let prefix = match p.mode {
                    crate::ty::ParamMode::In => "",
                    crate::ty::ParamMode::Ref => "ref ",
                    crate::ty::ParamMode::Out => "out ",
                };
                format!("{}{} {}", prefix, self.describe_ref(&p.ty, Some(method)), p.name)
            })
            .collect();
        text.push('(');
        text.push_str(&params.join(", "));
        text.push(')');
        if !method.return_type.is_void() {
            text.push_str(" -> ");
            text.push_str(&self.describe_ref(&method.return_type, Some(method)));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::ParamMode;

    fn i32_ty(table: &TypeTable) -> TypeHandle {
        table.builtins().primitive(PrimitiveType::I32)
    }

    #[test]
    fn test_builtins() {
        let table = TypeTable::new();
        let b = table.builtins();
        assert_eq!(table.qualified_name(b.object), "object");
        assert_eq!(table.qualified_name(b.proxy_base), "veil.ProxyBase");
        assert_eq!(table.qualified_name(b.persistable), "veil.Persistable");
        assert!(table.type_def(b.string).unwrap().sealed);
        assert!(!table.is_reference_type(i32_ty(&table)));
        assert!(table.is_reference_type(b.string));
        assert_eq!(table.public_instance_methods(b.object).len(), 3);
    }

    #[test]
    fn test_define_and_lookup() {
        let mut table = TypeTable::new();
        let calc = table
            .define(
                TypeDefinition::class("Calculator")
                    .in_namespace("app")
                    .method(MethodDefinition::new("add").param("a", i32_ty(&table)).returns(i32_ty(&table))),
            )
            .unwrap();

        assert_eq!(table.lookup("app.Calculator"), Some(calc));
        assert_eq!(table.qualified_name(calc), "app.Calculator");
        let def = table.type_def(calc).unwrap();
        assert_eq!(def.parent_handle(), Some(table.builtins().object));
        assert_eq!(
            table.describe_method(def.method_handle(0)),
            "app.Calculator.add(i32 a) -> i32"
        );
    }

    #[test]
    fn test_duplicate_rejected_and_failed_define_leaves_no_trace() {
        let mut table = TypeTable::new();
        table.define(TypeDefinition::class("A")).unwrap();
        assert!(matches!(
            table.define(TypeDefinition::class("A")),
            Err(TypeError::DuplicateType { .. })
        ));

        let before = table.len();
        let bad = TypeDefinition::class("B").method(MethodDefinition::new("f").returns(TypeRef::MethodParam(0)));
        assert!(table.define(bad).is_err());
        assert_eq!(table.len(), before);
        assert!(table.lookup("B").is_none());
    }

    #[test]
    fn test_cannot_extend_sealed() {
        let mut table = TypeTable::new();
        let string = table.builtins().string;
        let err = table.define(TypeDefinition::class("MyString").extends(string)).unwrap_err();
        assert!(matches!(err, TypeError::InvalidTypeReference { .. }));
    }

    #[test]
    fn test_interface_members_are_abstract() {
        let mut table = TypeTable::new();
        let iface = table
            .define(TypeDefinition::interface("IRun").method(MethodDefinition::new("run").non_virtual()))
            .unwrap();
        let def = table.type_def(iface).unwrap();
        assert!(def.is_abstract);
        assert_eq!(def.methods[0].overridability, Overridability::Abstract);
    }

    #[test]
    fn test_interface_closure_and_assignability() {
        let mut table = TypeTable::new();
        let a = table.define(TypeDefinition::interface("IA")).unwrap();
        let b = table.define(TypeDefinition::interface("IB").implements(a)).unwrap();
        let c = table.define(TypeDefinition::interface("IC").implements(b).implements(a)).unwrap();
        let base = table.define(TypeDefinition::class("Base").implements(c)).unwrap();
        let derived = table.define(TypeDefinition::class("Derived").extends(base)).unwrap();

        assert_eq!(table.interface_closure(c), vec![b, a]);
        assert_eq!(table.interface_closure(derived), vec![c, b, a]);
        assert!(table.is_assignable(derived, a));
        assert!(table.is_assignable(derived, base));
        assert!(!table.is_assignable(base, derived));
        assert!(table.is_assignable(i32_ty(&table), table.builtins().object));
    }

    #[test]
    fn test_most_derived_method_wins() {
        let mut table = TypeTable::new();
        let i32_ty = i32_ty(&table);
        let base = table
            .define(TypeDefinition::class("Base").method(MethodDefinition::new("value").returns(i32_ty)))
            .unwrap();
        let derived = table
            .define(
                TypeDefinition::class("Derived")
                    .extends(base)
                    .method(MethodDefinition::new("value").returns(i32_ty).as_sealed()),
            )
            .unwrap();

        let methods = table.public_instance_methods(derived);
        let value = methods
            .iter()
            .find(|m| table.method(**m).unwrap().name == "value")
            .unwrap();
        assert_eq!(value.declaring_type(), derived);
        // value + object's three
        assert_eq!(methods.len(), 4);
    }

    #[test]
    fn test_instantiate_substitutes_members() {
        let mut table = TypeTable::new();
        let repo = table
            .define(
                TypeDefinition::interface("IRepo")
                    .generic_param("T")
                    .method(
                        MethodDefinition::new("find")
                            .param("id", i32_ty(&table))
                            .returns(TypeRef::TypeParam(0)),
                    )
                    .method(MethodDefinition::new("save").ref_param("item", TypeRef::TypeParam(0))),
            )
            .unwrap();
        let customer = table.define(TypeDefinition::class("Customer")).unwrap();

        let closed = table.instantiate(repo, &[customer]).unwrap();
        assert_eq!(table.instantiate(repo, &[customer]).unwrap(), closed);
        assert_eq!(table.qualified_name(closed), "IRepo<Customer>");
        assert_eq!(table.resolve_name("IRepo<Customer>").unwrap(), closed);

        let def = table.type_def(closed).unwrap();
        assert_eq!(def.methods[0].return_type, TypeRef::Named(customer));
        assert_eq!(def.methods[0].declaring, closed);
        assert_eq!(def.methods[0].definition, Some(table.type_def(repo).unwrap().method_handle(0)));
        assert_eq!(def.methods[1].params[0].mode, ParamMode::Ref);
    }

    #[test]
    fn test_try_substitute_reuses_instantiations() {
        let mut table = TypeTable::new();
        let boxed = table.define(TypeDefinition::class("Box").generic_param("T")).unwrap();
        let i32_ty = i32_ty(&table);
        let string = table.builtins().string;
        let wrapped = TypeRef::Generic {
            definition: boxed,
            args: vec![TypeRef::MethodParam(0)],
        };

        // Nothing to reuse yet
        assert_eq!(table.try_substitute(&wrapped, &[], Some(&[i32_ty][..])), None);
        assert_eq!(table.lookup("Box<i32>"), None);

        let closed = table.substitute(&wrapped, &[], Some(&[i32_ty][..])).unwrap();
        assert_eq!(table.try_substitute(&wrapped, &[], Some(&[i32_ty][..])), Some(closed));
        assert_eq!(table.try_substitute(&wrapped, &[], Some(&[string][..])), None);

        // Missing arguments and unbound method parameters
        assert_eq!(table.try_substitute(&wrapped, &[], Some(&[][..])), None);
        assert_eq!(table.try_substitute(&wrapped, &[], None), Some(wrapped.clone()));
        assert_eq!(
            table.try_substitute(&TypeRef::TypeParam(0), &[string], None),
            Some(TypeRef::Named(string))
        );
    }

    #[test]
    fn test_open_generic_requires_arguments() {
        let mut table = TypeTable::new();
        let boxed = table.define(TypeDefinition::class("Box").generic_param("T")).unwrap();
        let err = table
            .define(TypeDefinition::class("Holder").method(MethodDefinition::new("get").returns(boxed)))
            .unwrap_err();
        assert!(matches!(err, TypeError::InvalidTypeArgCount { .. }));
        assert!(table.instantiate(boxed, &[]).is_err());
    }

    #[test]
    fn test_instantiation_before_completion_is_filled_later() {
        let mut table = TypeTable::new();
        let node = table
            .declare("Node", None, TypeKind::Class, vec!["T".to_string()])
            .unwrap();
        let i32_ty = i32_ty(&table);
        let closed = table.instantiate(node, &[i32_ty]).unwrap();
        assert!(!table.type_def(closed).unwrap().is_complete());

        table
            .complete(
                node,
                TypeDefinition::class("Node").generic_param("T").method(
                    MethodDefinition::new("next").returns(TypeRef::Generic {
                        definition: node,
                        args: vec![TypeRef::TypeParam(0)],
                    }),
                ),
            )
            .unwrap();

        let def = table.type_def(closed).unwrap();
        assert!(def.is_complete());
        assert_eq!(def.methods[0].return_type, TypeRef::Named(closed));
    }

    #[test]
    fn test_define_generated_picks_free_name() {
        let mut table = TypeTable::new();
        let first = table.define_generated(TypeDefinition::class("CalcProxy")).unwrap();
        let second = table.define_generated(TypeDefinition::class("CalcProxy")).unwrap();
        assert_eq!(table.qualified_name(first), "CalcProxy");
        assert_eq!(table.qualified_name(second), "CalcProxy$2");
        assert!(table.type_def(second).unwrap().generated);
    }
}
