//! Invocation records
//!
//! One record is built per intercepted call and handed to the interceptor
//! by mutable reference. Writes to its arguments flow back into by-reference
//! and output parameters once the interceptor returns.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use veil_types::{MethodDef, MethodHandle, TypeHandle};

use crate::error::{ProxyError, ProxyResult};
use crate::object::ObjectRef;
use crate::proxy::implementor::as_proxy;
use crate::proxy::selector::SelectedMethod;
use crate::runtime::Runtime;
use crate::value::{FromValue, Value};

/// Source position of the code that made a proxied call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl CallerContext {
    /// Position of the caller of the function this is called from, when
    /// that function is `#[track_caller]`
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Snapshot of one intercepted call
pub struct InvocationRecord {
    runtime: Runtime,
    target: ObjectRef,
    method: Arc<SelectedMethod>,
    type_arguments: Vec<TypeHandle>,
    arguments: Vec<Value>,
    caller: Option<CallerContext>,
}

impl InvocationRecord {
    pub(crate) fn new(
        runtime: Runtime,
        target: ObjectRef,
        method: Arc<SelectedMethod>,
        type_arguments: Vec<TypeHandle>,
        arguments: Vec<Value>,
        caller: Option<CallerContext>,
    ) -> Self {
        Self {
            runtime,
            target,
            method,
            type_arguments,
            arguments,
            caller,
        }
    }

    /// The proxy instance that received the call
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    /// Handle of the called method, on its closed declaring type
    pub fn target_method(&self) -> MethodHandle {
        self.method.handle
    }

    /// Declaration of the called method
    pub fn method(&self) -> &MethodDef {
        &self.method.def
    }

    pub fn method_name(&self) -> &str {
        &self.method.def.name
    }

    /// Concrete generic arguments of the call, empty for non-generic methods
    pub fn type_arguments(&self) -> &[TypeHandle] {
        &self.type_arguments
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Argument at `index`, `Null` when out of range
    pub fn argument(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or_default()
    }

    /// Argument at `index` converted to a Rust type
    pub fn argument_as<T: FromValue>(&self, index: usize) -> ProxyResult<T> {
        T::from_value(self.argument(index))
    }

    /// Replace an argument. For by-reference and output parameters the new
    /// value is copied back to the caller after interception.
    pub fn set_argument(&mut self, index: usize, value: impl Into<Value>) -> ProxyResult<()> {
        let expected = self.arguments.len();
        match self.arguments.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(ProxyError::ArgumentCount {
                method: self.method.def.name.clone(),
                expected,
                actual: index + 1,
            }),
        }
    }

    pub(crate) fn into_arguments(self) -> Vec<Value> {
        self.arguments
    }

    /// Where the call came from, when it was captured
    pub fn caller(&self) -> Option<CallerContext> {
        self.caller
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Run the call as it would have run without interception.
    ///
    /// On a proxy target this is the implementation inherited from the base
    /// type; methods that have none (abstract or interface-only) fail with
    /// `NotImplemented`. Argument writes made by that implementation land in
    /// this record.
    pub fn proceed(&mut self) -> ProxyResult<Value> {
        if as_proxy(&self.target).is_some() {
            self.runtime.invoke_base(
                &self.target,
                self.method.handle,
                &self.type_arguments,
                &mut self.arguments,
            )
        } else {
            self.runtime.invoke(
                &self.target,
                self.method.handle,
                &self.type_arguments,
                &mut self.arguments,
            )
        }
    }

    /// Run the call against another object
    pub fn proceed_on(&mut self, target: &ObjectRef) -> ProxyResult<Value> {
        self.runtime.invoke(
            target,
            self.method.handle,
            &self.type_arguments,
            &mut self.arguments,
        )
    }

    /// [`proceed`](Self::proceed) and convert the result
    pub fn proceed_as<T: FromValue>(&mut self) -> ProxyResult<T> {
        T::from_value(self.proceed()?)
    }
}

impl fmt::Debug for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationRecord")
            .field("method", &self.method.handle)
            .field("type_arguments", &self.type_arguments)
            .field("arguments", &self.arguments)
            .field("caller", &self.caller)
            .finish()
    }
}

impl fmt::Display for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self.runtime.types();
        writeln!(f, "{}", types.describe_method(self.method.handle))?;
        for (param, ty) in self.method.def.generic_params.iter().zip(&self.type_arguments) {
            writeln!(f, "  <{}> = {}", param, types.qualified_name(*ty))?;
        }
        for (i, param) in self.method.def.params.iter().enumerate() {
            match self.arguments.get(i) {
                None | Some(Value::Null) => writeln!(f, "  {} = (null)", param.name)?,
                Some(value) => writeln!(f, "  {} = {}", param.name, value)?,
            }
        }
        if let Some(caller) = &self.caller {
            writeln!(f, "  called from {}", caller)?;
        }
        Ok(())
    }
}
