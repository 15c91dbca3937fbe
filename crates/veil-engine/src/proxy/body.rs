//! Forwarding method bodies
//!
//! Each selected method is compiled once, at synthesis time, into a
//! [`ForwardingMethod`]: per-parameter store operations and a return
//! adapter. At call time the plan builds the invocation record, calls the
//! interceptor, writes by-reference arguments back and converts the result.

use std::sync::Arc;

use veil_types::{ParamMode, PrimitiveType, TypeHandle, TypeKind, TypeRef, TypeTable};

use crate::error::{ProxyError, ProxyResult};
use crate::proxy::implementor::ProxyInstance;
use crate::proxy::invocation::{CallerContext, InvocationRecord};
use crate::proxy::selector::SelectedMethod;
use crate::runtime::Runtime;
use crate::value::Value;

/// How a boxed value is stored into a slot of a given type
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Exact primitive; `Null` is rejected
    Primitive(PrimitiveType),
    /// Reference copy; accepts `Null` and assignable values
    Reference(TypeHandle),
    /// Type depends on the method's generic arguments
    Deferred(TypeRef),
}

impl StoreOp {
    /// Pick the operation for a parameter or return type.
    ///
    /// Fails for `void`, for declaring-type generic parameters (the
    /// declaring type must be closed) and for method generic parameters
    /// beyond the method's arity.
    pub fn for_type(table: &TypeTable, ty: &TypeRef, generic_arity: usize) -> Result<Self, String> {
        if ty.mentions_type_param() {
            return Err("declaring type generic parameter is not bound".to_string());
        }
        if let Some(index) = ty.max_method_param() {
            if index as usize >= generic_arity {
                return Err(format!("method type parameter {} out of range", index));
            }
        }
        match ty {
            TypeRef::Void => Err("void is not a storable type".to_string()),
            TypeRef::Named(handle) => match table.get(*handle).map(|d| d.kind) {
                Some(TypeKind::Primitive(p)) => Ok(StoreOp::Primitive(p)),
                Some(_) => Ok(StoreOp::Reference(*handle)),
                None => Err(format!("unknown type {}", handle)),
            },
            TypeRef::MethodParam(_) | TypeRef::Generic { .. } => Ok(StoreOp::Deferred(ty.clone())),
            TypeRef::TypeParam(_) => Err("declaring type generic parameter is not bound".to_string()),
        }
    }

    fn resolve(&self, runtime: &Runtime, type_args: &[TypeHandle]) -> ProxyResult<Option<TypeHandle>> {
        match self {
            StoreOp::Primitive(_) => Ok(None),
            StoreOp::Reference(handle) => Ok(Some(*handle)),
            StoreOp::Deferred(TypeRef::MethodParam(index)) => {
                Ok(type_args.get(*index as usize).copied())
            }
            StoreOp::Deferred(ty) => {
                // The write lock is only needed to create a new instantiation
                let existing = runtime.types().try_substitute(ty, &[], Some(type_args));
                let resolved = match existing {
                    Some(resolved) => resolved,
                    None => runtime.types_mut().substitute(ty, &[], Some(type_args))?,
                };
                Ok(resolved.as_named())
            }
        }
    }

    /// Whether `value` may be stored by this operation
    pub fn accepts(&self, runtime: &Runtime, type_args: &[TypeHandle], value: &Value) -> ProxyResult<bool> {
        if let StoreOp::Primitive(p) = self {
            return Ok(value.primitive() == Some(*p));
        }
        let Some(ty) = self.resolve(runtime, type_args)? else {
            return Ok(false);
        };
        let types = runtime.types();
        if ty == types.builtins().object {
            return Ok(true);
        }
        Ok(value.conforms_to(&types, ty))
    }

    /// Name of the slot type for diagnostics
    pub fn describe(&self, runtime: &Runtime, type_args: &[TypeHandle]) -> String {
        match self {
            StoreOp::Primitive(p) => p.name().to_string(),
            other => match other.resolve(runtime, type_args) {
                Ok(Some(ty)) => runtime.types().qualified_name(ty),
                _ => "unresolved generic type".to_string(),
            },
        }
    }
}

/// One parameter of a forwarding method
#[derive(Debug, Clone)]
pub struct ArgumentSlot {
    pub index: usize,
    pub name: String,
    pub mode: ParamMode,
    pub store: StoreOp,
}

/// What happens to the interceptor's result
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnAdapter {
    /// The method returns nothing; the result is dropped unexamined
    Discard,
    /// The result must fit the return type exactly
    Convert(StoreOp),
}

/// Compiled forwarding body of one selected method
#[derive(Debug, Clone)]
pub struct ForwardingMethod {
    pub method: Arc<SelectedMethod>,
    pub description: String,
    pub generic_arity: usize,
    pub slots: Vec<ArgumentSlot>,
    pub ret: ReturnAdapter,
}

impl ForwardingMethod {
    /// Service one call on `proxy`
    pub(crate) fn invoke(
        &self,
        proxy: &ProxyInstance,
        type_args: &[TypeHandle],
        args: &mut [Value],
        caller: Option<CallerContext>,
    ) -> ProxyResult<Value> {
        let Some(interceptor) = proxy.interceptor() else {
            return Err(ProxyError::NotImplemented {
                method: self.description.clone(),
            });
        };
        let runtime = proxy.proxy_type().runtime();

        if args.len() != self.slots.len() {
            return Err(ProxyError::ArgumentCount {
                method: self.description.clone(),
                expected: self.slots.len(),
                actual: args.len(),
            });
        }
        if type_args.len() != self.generic_arity {
            return Err(ProxyError::TypeArgumentCount {
                method: self.description.clone(),
                expected: self.generic_arity,
                actual: type_args.len(),
            });
        }
        for slot in &self.slots {
            // Output parameters carry whatever the caller's slot holds
            if slot.mode == ParamMode::Out {
                continue;
            }
            let value = &args[slot.index];
            if !slot.store.accepts(runtime, type_args, value)? {
                return Err(self.argument_mismatch(runtime, type_args, slot, value));
            }
        }

        let mut record = InvocationRecord::new(
            runtime.clone(),
            proxy.as_object()?,
            self.method.clone(),
            type_args.to_vec(),
            args.to_vec(),
            caller,
        );
        tracing::trace!(target: "veil", method = %self.description, "intercepting call");
        let result = interceptor.intercept(&mut record)?;

        // Check every by-reference slot before writing any of them back
        let mut written = record.into_arguments();
        written.resize(args.len(), Value::Null);
        for slot in self.slots.iter().filter(|s| s.mode.is_by_ref()) {
            let value = &written[slot.index];
            if !slot.store.accepts(runtime, type_args, value)? {
                return Err(self.argument_mismatch(runtime, type_args, slot, value));
            }
        }
        for slot in self.slots.iter().filter(|s| s.mode.is_by_ref()) {
            args[slot.index] = std::mem::take(&mut written[slot.index]);
        }

        match &self.ret {
            ReturnAdapter::Discard => Ok(Value::Null),
            ReturnAdapter::Convert(store) => {
                if store.accepts(runtime, type_args, &result)? {
                    Ok(result)
                } else {
                    Err(ProxyError::ResultMismatch {
                        method: self.description.clone(),
                        expected: store.describe(runtime, type_args),
                        actual: result.type_name(&runtime.types()),
                    })
                }
            }
        }
    }

    fn argument_mismatch(
        &self,
        runtime: &Runtime,
        type_args: &[TypeHandle],
        slot: &ArgumentSlot,
        value: &Value,
    ) -> ProxyError {
        ProxyError::ArgumentMismatch {
            method: self.description.clone(),
            index: slot.index,
            expected: slot.store.describe(runtime, type_args),
            actual: value.type_name(&runtime.types()),
        }
    }
}

/// Builds the forwarding body for a selected method
pub trait MethodBodyBuilder: Send + Sync {
    fn build(&self, table: &TypeTable, method: &SelectedMethod) -> ProxyResult<ForwardingMethod>;
}

/// Default builder: record, intercept, write back, convert
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardingBodyBuilder;

impl MethodBodyBuilder for ForwardingBodyBuilder {
    fn build(&self, table: &TypeTable, method: &SelectedMethod) -> ProxyResult<ForwardingMethod> {
        let description = table.describe_method(method.handle);
        let arity = method.def.generic_arity();
        let fail = |reason: String| ProxyError::Synthesis {
            method: description.clone(),
            reason,
        };

        let mut slots = Vec::with_capacity(method.def.params.len());
        for (index, param) in method.def.params.iter().enumerate() {
            let store = StoreOp::for_type(table, &param.ty, arity)
                .map_err(|reason| fail(format!("parameter '{}': {}", param.name, reason)))?;
            slots.push(ArgumentSlot {
                index,
                name: param.name.clone(),
                mode: param.mode,
                store,
            });
        }

        let ret = if method.def.return_type.is_void() {
            ReturnAdapter::Discard
        } else {
            let store = StoreOp::for_type(table, &method.def.return_type, arity)
                .map_err(|reason| fail(format!("return type: {}", reason)))?;
            ReturnAdapter::Convert(store)
        };

        Ok(ForwardingMethod {
            method: Arc::new(method.clone()),
            description,
            generic_arity: arity,
            slots,
            ret,
        })
    }
}
