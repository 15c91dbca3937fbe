//! Runtime: type table, method bodies and dispatch
//!
//! Classes are declared with a [`ClassBuilder`] that pairs each method with a
//! Rust closure. Calls go through [`Runtime::invoke`], which dispatches on the
//! receiver's runtime type: proxies route to their forwarding methods, plain
//! objects to the most-derived body matching the method's signature.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use veil_types::{
    Catalog, MethodDefinition, MethodHandle, SignatureKey, TypeDefinition, TypeHandle, TypeTable,
};

use crate::error::{ProxyError, ProxyResult};
use crate::object::{object_id, FieldStore, Object, ObjectRef, PlainObject};
use crate::proxy::as_proxy;
use crate::value::{FromValue, Value};

/// Executable body of a declared method
pub type MethodBody = Arc<dyn Fn(&mut CallFrame<'_>) -> ProxyResult<Value> + Send + Sync>;

/// Everything a method body can see while it runs
pub struct CallFrame<'a> {
    runtime: &'a Runtime,
    this: &'a ObjectRef,
    method: MethodHandle,
    type_args: &'a [TypeHandle],
    args: &'a mut [Value],
}

impl<'a> CallFrame<'a> {
    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// Receiver of the call
    pub fn this(&self) -> &ObjectRef {
        self.this
    }

    /// The method being executed
    pub fn method(&self) -> MethodHandle {
        self.method
    }

    /// Concrete generic arguments of the method (empty when not generic)
    pub fn type_args(&self) -> &[TypeHandle] {
        self.type_args
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Argument at `index`, `Null` when out of range
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Argument at `index` converted to a Rust type
    pub fn arg_as<T: FromValue>(&self, index: usize) -> ProxyResult<T> {
        T::from_value(self.arg(index))
    }

    /// Overwrite an argument; by-reference parameters see the new value
    pub fn set_arg(&mut self, index: usize, value: Value) -> ProxyResult<()> {
        let len = self.args.len();
        match self.args.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ProxyError::ArgumentCount {
                method: self.method.to_string(),
                expected: len,
                actual: index + 1,
            }),
        }
    }
}

/// Declaration of a class together with its method bodies and field
/// initializers
pub struct ClassBuilder {
    definition: TypeDefinition,
    bodies: Vec<(usize, MethodBody)>,
    fields: Vec<(String, Value)>,
}

impl ClassBuilder {
    /// Start from a type definition; methods already in it have no body
    pub fn new(definition: TypeDefinition) -> Self {
        Self {
            definition,
            bodies: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a method with its body
    pub fn method<F>(mut self, method: MethodDefinition, body: F) -> Self
    where
        F: Fn(&mut CallFrame<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
    {
        let slot = self.definition.methods.len();
        self.definition = self.definition.method(method);
        self.bodies.push((slot, Arc::new(body)));
        self
    }

    /// Add a method without a body
    pub fn abstract_method(mut self, method: MethodDefinition) -> Self {
        self.definition = self.definition.method(method.as_abstract());
        self
    }

    /// Field set on every new instance (parents first)
    pub fn field(mut self, name: impl Into<String>, initial: Value) -> Self {
        self.fields.push((name.into(), initial));
        self
    }
}

struct RuntimeInner {
    types: RwLock<TypeTable>,
    bodies: RwLock<FxHashMap<MethodHandle, MethodBody>>,
    initializers: RwLock<FxHashMap<TypeHandle, Vec<(String, Value)>>>,
}

/// Shared runtime state; clones refer to the same runtime
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("types", &self.inner.types.read().len())
            .field("bodies", &self.inner.bodies.read().len())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the built-in types and `object`'s method bodies
    pub fn new() -> Self {
        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                types: RwLock::new(TypeTable::new()),
                bodies: RwLock::new(FxHashMap::default()),
                initializers: RwLock::new(FxHashMap::default()),
            }),
        };
        runtime.register_object_bodies();
        runtime
    }

    fn register_object_bodies(&self) {
        let (to_string, equals, hash_code) = {
            let types = self.types();
            let object = types.builtins().object;
            (
                types.find_method(object, "to_string"),
                types.find_method(object, "equals"),
                types.find_method(object, "hash_code"),
            )
        };

        if let Some(handle) = to_string {
            self.register_body(
                handle,
                Arc::new(|frame: &mut CallFrame<'_>| {
                    let name = frame.runtime().types().qualified_name(frame.this().type_handle());
                    Ok(Value::string(name))
                }),
            );
        }
        if let Some(handle) = equals {
            self.register_body(
                handle,
                Arc::new(|frame: &mut CallFrame<'_>| {
                    let same = match frame.arg(0) {
                        Value::Object(other) => object_id(&other) == object_id(frame.this()),
                        _ => false,
                    };
                    Ok(Value::Bool(same))
                }),
            );
        }
        if let Some(handle) = hash_code {
            self.register_body(
                handle,
                Arc::new(|frame: &mut CallFrame<'_>| {
                    let id = object_id(frame.this()) as u64;
                    Ok(Value::I32((id ^ (id >> 32)) as i32))
                }),
            );
        }
    }

    /// Shared access to the type table
    pub fn types(&self) -> RwLockReadGuard<'_, TypeTable> {
        self.inner.types.read()
    }

    /// Exclusive access to the type table
    pub fn types_mut(&self) -> RwLockWriteGuard<'_, TypeTable> {
        self.inner.types.write()
    }

    // ========================================================================
    // Declaration
    // ========================================================================

    /// Register a type that has no bodies (interfaces, abstract shapes)
    pub fn define(&self, definition: TypeDefinition) -> ProxyResult<TypeHandle> {
        Ok(self.types_mut().define(definition)?)
    }

    /// Register a class and its method bodies
    pub fn define_class(&self, builder: ClassBuilder) -> ProxyResult<TypeHandle> {
        let ClassBuilder {
            definition,
            bodies,
            fields,
        } = builder;

        let (handle, handles) = {
            let mut types = self.types_mut();
            let handle = types.define(definition)?;
            let def = types.type_def(handle)?;
            let handles: Vec<(MethodHandle, MethodBody)> = bodies
                .into_iter()
                .map(|(slot, body)| (def.method_handle(slot), body))
                .collect();
            (handle, handles)
        };

        {
            let mut table = self.inner.bodies.write();
            for (method, body) in handles {
                table.insert(method, body);
            }
        }
        if !fields.is_empty() {
            self.inner.initializers.write().insert(handle, fields);
        }
        tracing::debug!(target: "veil", ty = %self.types().qualified_name(handle), "defined class");
        Ok(handle)
    }

    /// Load a JSON catalog; bodies can be attached afterwards with
    /// [`register_body`](Self::register_body)
    pub fn load_catalog(&self, catalog: &Catalog) -> ProxyResult<Vec<TypeHandle>> {
        let mut types = self.types_mut();
        Ok(catalog.load_into(&mut types)?)
    }

    /// Attach or replace the body of a method
    pub fn register_body(&self, method: MethodHandle, body: MethodBody) {
        self.inner.bodies.write().insert(method, body);
    }

    /// Add field initializers for a type
    pub fn register_fields(&self, ty: TypeHandle, fields: Vec<(String, Value)>) {
        self.inner
            .initializers
            .write()
            .entry(ty)
            .or_default()
            .extend(fields);
    }

    /// Find a public instance method by name on a type or its interfaces
    pub fn method(&self, ty: TypeHandle, name: &str) -> ProxyResult<MethodHandle> {
        let types = self.types();
        types
            .find_method(ty, name)
            .ok_or_else(|| ProxyError::MissingMethod {
                ty: types.qualified_name(ty),
                name: name.to_string(),
            })
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Create an instance of a concrete class
    pub fn new_object(&self, ty: TypeHandle) -> ProxyResult<ObjectRef> {
        {
            let types = self.types();
            let def = types.type_def(ty)?;
            let reason = if !def.is_class() {
                Some("not a class")
            } else if def.is_abstract {
                Some("abstract class")
            } else if def.is_generic_definition() {
                Some("open generic type")
            } else if ty == types.builtins().string {
                Some("strings are values")
            } else if def.generated {
                Some("generated types are created by the proxy factory")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ProxyError::Instantiation {
                    name: types.qualified_name(ty),
                    reason: reason.to_string(),
                });
            }
        }

        let object = PlainObject::new(ty);
        self.initialize_fields(ty, object.fields());
        Ok(Arc::new(object))
    }

    /// Run field initializers of `ty` and its ancestors, root first
    pub(crate) fn initialize_fields(&self, ty: TypeHandle, store: &FieldStore) {
        let chain: Vec<TypeHandle> = {
            let types = self.types();
            types
                .ancestors(ty)
                .into_iter()
                .rev()
                .flat_map(|h| {
                    let definition = types.get(h).and_then(|d| d.generic_definition);
                    std::iter::once(h).chain(definition)
                })
                .collect()
        };

        let initializers = self.inner.initializers.read();
        for h in chain {
            if let Some(fields) = initializers.get(&h) {
                for (name, value) in fields {
                    store.set(name.clone(), value.clone());
                }
            }
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Call a method by name on an object
    pub fn call(&self, this: &ObjectRef, name: &str, args: &mut [Value]) -> ProxyResult<Value> {
        let method = self.method(this.type_handle(), name)?;
        self.invoke(this, method, &[], args)
    }

    /// Virtual call: dispatch on the receiver's runtime type
    pub fn invoke(
        &self,
        this: &ObjectRef,
        method: MethodHandle,
        type_args: &[TypeHandle],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        if let Some(proxy) = as_proxy(this) {
            return proxy.dispatch(method, type_args, args, None);
        }
        match self.resolve_body(this.type_handle(), method)? {
            Some((target, body)) => self.run_body(this, target, body, type_args, args),
            None => Err(self.missing(this.type_handle(), method)),
        }
    }

    /// Non-virtual call of the implementation inherited by the receiver's
    /// type, skipping the receiver's own override.
    ///
    /// Fails with `NotImplemented` when no ancestor has a body.
    pub fn invoke_base(
        &self,
        this: &ObjectRef,
        method: MethodHandle,
        type_args: &[TypeHandle],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        let parent = self
            .types()
            .type_def(this.type_handle())?
            .parent_handle();
        let resolved = match parent {
            Some(parent) => self.resolve_body(parent, method)?,
            None => None,
        };
        match resolved {
            Some((target, body)) => self.run_body(this, target, body, type_args, args),
            None => Err(ProxyError::NotImplemented {
                method: self.types().describe_method(method),
            }),
        }
    }

    /// Most-derived body for `method` starting at `start`.
    ///
    /// Bodies of methods on closed generic types live on the generic
    /// definition's method.
    fn resolve_body(
        &self,
        start: TypeHandle,
        method: MethodHandle,
    ) -> ProxyResult<Option<(MethodHandle, MethodBody)>> {
        let types = self.types();
        let key: SignatureKey = types
            .signature_key(method)
            .ok_or_else(|| ProxyError::MissingMethod {
                ty: types.qualified_name(start),
                name: method.to_string(),
            })?;
        let Some(target) = types.find_implementation(start, &key) else {
            return Ok(None);
        };

        let bodies = self.inner.bodies.read();
        let body = bodies.get(&target).cloned().or_else(|| {
            types
                .method(target)
                .and_then(|m| m.definition)
                .and_then(|definition| bodies.get(&definition).cloned())
        });
        Ok(body.map(|b| (target, b)))
    }

    fn run_body(
        &self,
        this: &ObjectRef,
        method: MethodHandle,
        body: MethodBody,
        type_args: &[TypeHandle],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        {
            let types = self.types();
            let def = types.method(method).ok_or_else(|| ProxyError::MissingMethod {
                ty: types.qualified_name(this.type_handle()),
                name: method.to_string(),
            })?;
            if def.params.len() != args.len() {
                return Err(ProxyError::ArgumentCount {
                    method: types.describe_method(method),
                    expected: def.params.len(),
                    actual: args.len(),
                });
            }
            if def.generic_arity() != type_args.len() {
                return Err(ProxyError::TypeArgumentCount {
                    method: types.describe_method(method),
                    expected: def.generic_arity(),
                    actual: type_args.len(),
                });
            }
        }

        let mut frame = CallFrame {
            runtime: self,
            this,
            method,
            type_args,
            args,
        };
        body(&mut frame)
    }

    fn missing(&self, ty: TypeHandle, method: MethodHandle) -> ProxyError {
        let types = self.types();
        ProxyError::MissingMethod {
            ty: types.qualified_name(ty),
            name: types
                .method(method)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| method.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_types::PrimitiveType;

    fn counter_class(rt: &Runtime) -> TypeHandle {
        let i32_ty = rt.types().builtins().primitive(PrimitiveType::I32);
        rt.define_class(
            ClassBuilder::new(TypeDefinition::class("Counter"))
                .field("count", Value::I32(10))
                .method(MethodDefinition::new("get").returns(i32_ty), |frame| {
                    Ok(frame.this().fields().get("count"))
                })
                .method(
                    MethodDefinition::new("bump").ref_param("by", i32_ty),
                    |frame| {
                        let by: i32 = frame.arg_as(0)?;
                        let now: i32 = i32::from_value(frame.this().fields().get("count"))? + by;
                        frame.this().fields().set("count", Value::I32(now));
                        frame.set_arg(0, Value::I32(now))?;
                        Ok(Value::Null)
                    },
                ),
        )
        .unwrap()
    }

    #[test]
    fn test_field_initializers_and_calls() {
        let rt = Runtime::new();
        let counter = counter_class(&rt);
        let obj = rt.new_object(counter).unwrap();

        assert_eq!(rt.call(&obj, "get", &mut []).unwrap(), Value::I32(10));
        let mut args = [Value::I32(5)];
        rt.call(&obj, "bump", &mut args).unwrap();
        assert_eq!(args[0], Value::I32(15));
        assert_eq!(rt.call(&obj, "get", &mut []).unwrap(), Value::I32(15));
    }

    #[test]
    fn test_override_and_base_call() {
        let rt = Runtime::new();
        let string = rt.types().builtins().string;
        let animal = rt
            .define_class(ClassBuilder::new(TypeDefinition::class("Animal")).method(
                MethodDefinition::new("speak").returns(string),
                |_| Ok(Value::string("...")),
            ))
            .unwrap();
        let dog = rt
            .define_class(ClassBuilder::new(TypeDefinition::class("Dog").extends(animal)).method(
                MethodDefinition::new("speak").returns(string),
                |_| Ok(Value::string("woof")),
            ))
            .unwrap();

        let speak = rt.method(animal, "speak").unwrap();
        let obj = rt.new_object(dog).unwrap();
        assert_eq!(rt.invoke(&obj, speak, &[], &mut []).unwrap(), Value::string("woof"));
        assert_eq!(rt.invoke_base(&obj, speak, &[], &mut []).unwrap(), Value::string("..."));
    }

    #[test]
    fn test_object_builtins() {
        let rt = Runtime::new();
        let counter = counter_class(&rt);
        let a = rt.new_object(counter).unwrap();
        let b = rt.new_object(counter).unwrap();

        assert_eq!(rt.call(&a, "to_string", &mut []).unwrap(), Value::string("Counter"));
        let mut same = [Value::Object(a.clone())];
        assert_eq!(rt.call(&a, "equals", &mut same).unwrap(), Value::Bool(true));
        let mut other = [Value::Object(b)];
        assert_eq!(rt.call(&a, "equals", &mut other).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_argument_count_checked() {
        let rt = Runtime::new();
        let counter = counter_class(&rt);
        let obj = rt.new_object(counter).unwrap();
        let err = rt.call(&obj, "bump", &mut []).unwrap_err();
        assert!(matches!(err, ProxyError::ArgumentCount { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn test_cannot_instantiate_interfaces_or_abstract() {
        let rt = Runtime::new();
        let iface = rt.define(TypeDefinition::interface("IThing")).unwrap();
        let shape = rt.define(TypeDefinition::class("Shape").as_abstract()).unwrap();
        assert!(matches!(rt.new_object(iface), Err(ProxyError::Instantiation { .. })));
        assert!(matches!(rt.new_object(shape), Err(ProxyError::Instantiation { .. })));
    }

    #[test]
    fn test_abstract_method_has_no_base_body() {
        let rt = Runtime::new();
        let shape = rt
            .define_class(
                ClassBuilder::new(TypeDefinition::class("Shape").as_abstract())
                    .abstract_method(MethodDefinition::new("draw")),
            )
            .unwrap();
        let square = rt
            .define_class(
                ClassBuilder::new(TypeDefinition::class("Square").extends(shape))
                    .method(MethodDefinition::new("draw"), |_| Ok(Value::Null)),
            )
            .unwrap();
        let obj = rt.new_object(square).unwrap();
        let draw = rt.method(shape, "draw").unwrap();
        assert!(rt.invoke(&obj, draw, &[], &mut []).is_ok());
        assert!(rt.invoke_base(&obj, draw, &[], &mut []).unwrap_err().is_not_implemented());
    }
}
