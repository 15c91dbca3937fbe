//! Generated proxy types and their instances
//!
//! A [`ProxyType`] is the generated implementation for one contract: a class
//! registered in the type table (parent = base type, or `veil.ProxyBase`)
//! plus one forwarding method per selected method. It never changes after
//! synthesis. [`ProxyInstance`]s hold the interceptor slot and dispatch
//! calls through their type.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use veil_types::{MethodHandle, SignatureKey, TypeDefinition, TypeHandle};

use crate::config::FactoryOptions;
use crate::error::{ProxyError, ProxyResult};
use crate::object::{FieldStore, Object, ObjectRef};
use crate::proxy::body::{ForwardingMethod, MethodBodyBuilder};
use crate::proxy::contract::Contract;
use crate::proxy::interceptor::Interceptor;
use crate::proxy::invocation::CallerContext;
use crate::proxy::selector::select;
use crate::runtime::Runtime;
use crate::value::Value;

/// Generated implementation of a contract
#[derive(Debug)]
pub struct ProxyType {
    handle: TypeHandle,
    contract: Contract,
    parent: TypeHandle,
    interfaces: Vec<TypeHandle>,
    methods: Vec<ForwardingMethod>,
    by_handle: FxHashMap<MethodHandle, usize>,
    by_key: FxHashMap<SignatureKey, usize>,
    marker_keys: FxHashSet<SignatureKey>,
    serializable: bool,
    capture_call_site: bool,
    runtime: Runtime,
}

impl ProxyType {
    /// Select, build every forwarding body, then register the type.
    ///
    /// Nothing is registered when any body fails to build.
    pub(crate) fn synthesize(
        runtime: &Runtime,
        contract: Contract,
        builder: &dyn MethodBodyBuilder,
        options: &FactoryOptions,
    ) -> ProxyResult<Self> {
        let (selection, methods, base_name, base_namespace) = {
            let types = runtime.types();
            let selection = select(&types, contract.base(), contract.interfaces())?;
            let mut methods = Vec::with_capacity(selection.methods.len());
            for method in &selection.methods {
                methods.push(builder.build(&types, method)?);
            }
            let base = types.type_def(contract.base())?;
            (selection, methods, base.name.clone(), base.namespace.clone())
        };

        let persistable = runtime.types().builtins().persistable;
        let serializable = options.serializable || selection.interfaces.contains(&persistable);

        let handle = {
            let mut definition =
                TypeDefinition::class(format!("{}{}", base_name, options.type_name_suffix))
                    .extends(selection.parent);
            if let Some(ns) = base_namespace {
                definition = definition.in_namespace(ns);
            }
            for iface in &selection.interfaces {
                definition = definition.implements(*iface);
            }
            if serializable && !selection.interfaces.contains(&persistable) {
                definition = definition.implements(persistable);
            }
            runtime.types_mut().define_generated(definition)?
        };

        let mut marker_keys: FxHashSet<SignatureKey> =
            selection.marker_methods.iter().map(|m| m.key.clone()).collect();
        if serializable {
            let types = runtime.types();
            for method in types.public_instance_methods(persistable) {
                if let Some(key) = types.signature_key(method) {
                    marker_keys.insert(key);
                }
            }
        }

        let mut by_handle = FxHashMap::default();
        let mut by_key = FxHashMap::default();
        for (i, method) in methods.iter().enumerate() {
            by_handle.insert(method.method.handle, i);
            by_key.entry(method.method.key.clone()).or_insert(i);
        }

        Ok(Self {
            handle,
            contract,
            parent: selection.parent,
            interfaces: selection.interfaces,
            methods,
            by_handle,
            by_key,
            marker_keys,
            serializable,
            capture_call_site: options.capture_call_site,
            runtime: runtime.clone(),
        })
    }

    /// Handle of the generated class
    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Structural parent: the base class or `veil.ProxyBase`
    pub fn parent(&self) -> TypeHandle {
        self.parent
    }

    /// Interface closure implemented by the generated class (the marker
    /// interface not included)
    pub fn interfaces(&self) -> &[TypeHandle] {
        &self.interfaces
    }

    /// Forwarding methods, in selection order
    pub fn methods(&self) -> &[ForwardingMethod] {
        &self.methods
    }

    /// Whether instances can be persisted
    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Qualified name of the generated class
    pub fn name(&self) -> String {
        self.runtime.types().qualified_name(self.handle)
    }

    /// First intercepted method with this name
    pub fn find_method(&self, name: &str) -> Option<MethodHandle> {
        self.methods
            .iter()
            .find(|m| m.method.def.name == name)
            .map(|m| m.method.handle)
    }

    /// Forwarding method for a call.
    ///
    /// Exact handles match first. Otherwise an overridable method matches
    /// by signature, so calls through a base or inherited-interface handle
    /// land on the same forwarding body. Statically bound methods never
    /// match.
    pub fn plan(&self, method: MethodHandle) -> Option<&ForwardingMethod> {
        if let Some(i) = self.by_handle.get(&method) {
            return self.methods.get(*i);
        }
        let types = self.runtime.types();
        let def = types.method(method)?;
        if !def.overridability.is_overridable() {
            return None;
        }
        let key = SignatureKey::of(def);
        self.by_key.get(&key).and_then(|i| self.methods.get(*i))
    }

    fn is_marker(&self, method: MethodHandle) -> bool {
        self.runtime
            .types()
            .signature_key(method)
            .map(|key| self.marker_keys.contains(&key))
            .unwrap_or(false)
    }

    /// Create an instance with no interceptor, running the base type's
    /// field initializers
    pub fn instantiate(self: &Arc<Self>) -> Arc<ProxyInstance> {
        let instance = Arc::new_cyclic(|this| ProxyInstance {
            proxy_type: self.clone(),
            interceptor: RwLock::new(None),
            fields: FieldStore::new(),
            this: this.clone(),
        });
        self.runtime.initialize_fields(self.handle, &instance.fields);
        instance
    }
}

/// Instance of a generated proxy type
pub struct ProxyInstance {
    proxy_type: Arc<ProxyType>,
    interceptor: RwLock<Option<Arc<dyn Interceptor>>>,
    fields: FieldStore,
    this: Weak<ProxyInstance>,
}

impl ProxyInstance {
    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.proxy_type
    }

    /// Currently attached interceptor
    pub fn interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        self.interceptor.read().clone()
    }

    /// Attach or replace the interceptor
    pub fn set_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        *self.interceptor.write() = Some(interceptor);
    }

    /// Detach the interceptor; intercepted calls fail until a new one is set
    pub fn clear_interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        self.interceptor.write().take()
    }

    /// This instance as a shared object reference
    pub fn as_object(&self) -> ProxyResult<ObjectRef> {
        match self.this.upgrade() {
            Some(this) => Ok(this),
            None => Err(ProxyError::runtime("proxy instance is being dropped")),
        }
    }

    /// Call a method
    #[track_caller]
    pub fn call(&self, method: MethodHandle, args: &mut [Value]) -> ProxyResult<Value> {
        self.call_generic(method, &[], args)
    }

    /// Call a generic method with concrete type arguments
    #[track_caller]
    pub fn call_generic(
        &self,
        method: MethodHandle,
        type_args: &[TypeHandle],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        let caller = if self.proxy_type.capture_call_site {
            Some(CallerContext::here())
        } else {
            None
        };
        self.dispatch(method, type_args, args, caller)
    }

    /// Call with an explicitly supplied caller context
    pub fn call_with(
        &self,
        method: MethodHandle,
        caller: CallerContext,
        type_args: &[TypeHandle],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        self.dispatch(method, type_args, args, Some(caller))
    }

    /// Call an intercepted method by name
    #[track_caller]
    pub fn call_named(&self, name: &str, args: &mut [Value]) -> ProxyResult<Value> {
        let method = self
            .proxy_type
            .find_method(name)
            .ok_or_else(|| ProxyError::MissingMethod {
                ty: self.proxy_type.name(),
                name: name.to_string(),
            })?;
        self.call(method, args)
    }

    /// Route a call: forwarding body, marker method, or the inherited body
    /// for methods that are not intercepted
    pub(crate) fn dispatch(
        &self,
        method: MethodHandle,
        type_args: &[TypeHandle],
        args: &mut [Value],
        caller: Option<CallerContext>,
    ) -> ProxyResult<Value> {
        if let Some(plan) = self.proxy_type.plan(method) {
            return plan.invoke(self, type_args, args, caller);
        }

        if self.proxy_type.is_marker(method) {
            if !args.is_empty() {
                return Err(ProxyError::ArgumentCount {
                    method: self.proxy_type.runtime().types().describe_method(method),
                    expected: 0,
                    actual: args.len(),
                });
            }
            let info = self.get_object_data()?;
            return Ok(Value::string(info.to_json()?));
        }

        let this = self.as_object()?;
        self.proxy_type
            .runtime
            .invoke_base(&this, method, type_args, args)
    }
}

impl Object for ProxyInstance {
    fn type_handle(&self) -> TypeHandle {
        self.proxy_type.handle
    }

    fn fields(&self) -> &FieldStore {
        &self.fields
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("type", &self.proxy_type.handle)
            .field("intercepted", &self.interceptor.read().is_some())
            .finish()
    }
}

/// Recognize a proxy behind an object reference
pub fn as_proxy(obj: &ObjectRef) -> Option<Arc<ProxyInstance>> {
    obj.clone().into_any().downcast::<ProxyInstance>().ok()
}
