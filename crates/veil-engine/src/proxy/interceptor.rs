//! Interceptor contract

use std::fmt;
use std::sync::Arc;

use crate::error::ProxyResult;
use crate::object::ObjectRef;
use crate::proxy::invocation::InvocationRecord;
use crate::proxy::persist::PersistedInterceptor;
use crate::value::Value;

/// Receives every intercepted call and decides its outcome
pub trait Interceptor: Send + Sync {
    /// Handle one call. The returned value becomes the call's result after
    /// conversion to the method's return type.
    fn intercept(&self, record: &mut InvocationRecord) -> ProxyResult<Value>;

    /// State to persist alongside a proxy; `None` when the interceptor
    /// cannot be persisted
    fn persist(&self) -> Option<PersistedInterceptor> {
        None
    }
}

/// Interceptor backed by a closure
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(&mut InvocationRecord) -> ProxyResult<Value> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut InvocationRecord) -> ProxyResult<Value> + Send + Sync,
{
    fn intercept(&self, record: &mut InvocationRecord) -> ProxyResult<Value> {
        (self.f)(record)
    }
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnInterceptor")
    }
}

/// Shorthand for a shared closure interceptor
pub fn interceptor_fn<F>(f: F) -> Arc<dyn Interceptor>
where
    F: Fn(&mut InvocationRecord) -> ProxyResult<Value> + Send + Sync + 'static,
{
    Arc::new(FnInterceptor::new(f))
}

/// Sends every call on to a fixed target object
#[derive(Debug, Clone)]
pub struct ForwardingInterceptor {
    target: ObjectRef,
}

impl ForwardingInterceptor {
    pub fn new(target: ObjectRef) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }
}

impl Interceptor for ForwardingInterceptor {
    fn intercept(&self, record: &mut InvocationRecord) -> ProxyResult<Value> {
        record.proceed_on(&self.target)
    }
}
