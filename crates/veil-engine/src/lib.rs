//! Veil engine
//!
//! Runtime objects with virtual dispatch over a [`veil_types::TypeTable`],
//! and the dynamic proxy core built on top of them: contracts, method
//! selection, forwarding bodies, the type cache, the proxy factory and
//! proxy persistence.
//!
//! # Example
//!
//! ```ignore
//! use veil_engine::{interceptor_fn, ProxyFactory, Runtime, Value};
//!
//! let runtime = Runtime::new();
//! let factory = ProxyFactory::new(runtime.clone());
//! let proxy = factory.create_instance(
//!     greeter,
//!     interceptor_fn(|record| Ok(Value::string(format!("hi {}", record.argument(0))))),
//!     &[],
//! )?;
//! let reply = proxy.call_named("greet", &mut [Value::string("bob")])?;
//! ```

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod object;
pub mod proxy;
pub mod runtime;
pub mod value;

pub use config::{ConfigError, FactoryOptions};
pub use error::{ProxyError, ProxyResult};
pub use object::{FieldStore, Object, ObjectRef};
pub use proxy::{
    as_proxy, can_be_proxied, interceptor_fn, CallerContext, Contract, Interceptor,
    InterceptorRegistry, InvocationRecord, PersistedInterceptor, ProxyFactory, ProxyInstance,
    ProxyType, SerialValue, SerializationInfo,
};
pub use runtime::{CallFrame, ClassBuilder, MethodBody, Runtime};
pub use value::{FromValue, IntoValue, Value};
