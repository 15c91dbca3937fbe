//! Dynamic proxies
//!
//! A proxy is an instance of a type generated for a [`Contract`] (a base
//! type plus a set of interfaces). Every selected method forwards to an
//! [`Interceptor`] through an [`InvocationRecord`].

pub mod body;
pub mod cache;
pub mod contract;
pub mod factory;
pub mod implementor;
pub mod interceptor;
pub mod invocation;
pub mod persist;
pub mod selector;

pub use body::{ForwardingBodyBuilder, ForwardingMethod, MethodBodyBuilder, ReturnAdapter, StoreOp};
pub use cache::{ProxyCache, TypeCache};
pub use contract::Contract;
pub use factory::ProxyFactory;
pub use implementor::{as_proxy, ProxyInstance, ProxyType};
pub use interceptor::{interceptor_fn, FnInterceptor, ForwardingInterceptor, Interceptor};
pub use invocation::{CallerContext, InvocationRecord};
pub use persist::{
    InterceptorRegistry, PersistedInterceptor, PersistedProxy, SerialValue, SerializationInfo,
};
pub use selector::{can_be_proxied, SelectedMethod, Selection};
