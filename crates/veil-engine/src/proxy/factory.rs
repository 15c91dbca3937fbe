//! Proxy factory
//!
//! Top-level entry point: validates a contract, returns the cached or newly
//! synthesized [`ProxyType`] for it, and creates instances with an
//! interceptor attached.

use std::fmt;
use std::sync::Arc;

use veil_types::TypeHandle;

use crate::config::FactoryOptions;
use crate::error::{ProxyError, ProxyResult};
use crate::proxy::body::{ForwardingBodyBuilder, MethodBodyBuilder};
use crate::proxy::cache::{ProxyCache, TypeCache};
use crate::proxy::contract::Contract;
use crate::proxy::implementor::{ProxyInstance, ProxyType};
use crate::proxy::interceptor::Interceptor;
use crate::proxy::persist::{InterceptorRegistry, PersistedProxy, SerializationInfo};
use crate::proxy::selector;
use crate::runtime::Runtime;

/// Creates proxy types and instances over one runtime
#[derive(Clone)]
pub struct ProxyFactory {
    runtime: Runtime,
    options: FactoryOptions,
    cache: Arc<dyn TypeCache>,
    builder: Arc<dyn MethodBodyBuilder>,
}

impl ProxyFactory {
    /// Factory with default options, a fresh cache and the default body
    /// builder
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            options: FactoryOptions::default(),
            cache: Arc::new(ProxyCache::new()),
            builder: Arc::new(ForwardingBodyBuilder),
        }
    }

    /// Options apply to types synthesized after this call; cached types
    /// keep the options they were built with
    pub fn with_options(mut self, options: FactoryOptions) -> Self {
        self.options = options;
        self
    }

    /// Share a cache between factories
    pub fn with_cache(mut self, cache: Arc<dyn TypeCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_method_builder(mut self, builder: Arc<dyn MethodBodyBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<dyn TypeCache> {
        &self.cache
    }

    /// Whether `ty` can be proxied with every public method intercepted
    pub fn can_be_proxied(&self, ty: TypeHandle) -> bool {
        selector::can_be_proxied(&self.runtime.types(), ty)
    }

    /// Generated implementation for `base` plus `interfaces`.
    ///
    /// Interface order and duplicates do not matter: equal contracts share
    /// one implementation. Ineligible contracts fail before any synthesis.
    pub fn create_implementation(
        &self,
        base: TypeHandle,
        interfaces: &[TypeHandle],
    ) -> ProxyResult<Arc<ProxyType>> {
        selector::check_contract(&self.runtime.types(), base, interfaces)?;

        let contract = Contract::new(base, interfaces);
        let mut build = || -> ProxyResult<Arc<ProxyType>> {
            let ty = ProxyType::synthesize(
                &self.runtime,
                contract.clone(),
                self.builder.as_ref(),
                &self.options,
            )?;
            tracing::debug!(
                target: "veil",
                proxy = %ty.name(),
                methods = ty.methods().len(),
                "synthesized proxy type"
            );
            Ok(Arc::new(ty))
        };
        self.cache.get_or_build(&contract, &mut build)
    }

    /// New proxy instance with `interceptor` attached
    pub fn create_instance(
        &self,
        base: TypeHandle,
        interceptor: Arc<dyn Interceptor>,
        interfaces: &[TypeHandle],
    ) -> ProxyResult<Arc<ProxyInstance>> {
        let instance = self.create_uninitialized(base, interfaces)?;
        instance.set_interceptor(interceptor);
        Ok(instance)
    }

    /// New proxy instance without an interceptor; intercepted calls fail
    /// with `NotImplemented` until one is attached
    pub fn create_uninitialized(
        &self,
        base: TypeHandle,
        interfaces: &[TypeHandle],
    ) -> ProxyResult<Arc<ProxyInstance>> {
        Ok(self.create_implementation(base, interfaces)?.instantiate())
    }

    /// Rebuild a persisted proxy.
    ///
    /// The contract is re-derived from the stored type names, so the
    /// implementation comes from the cache when one exists.
    pub fn reconstruct(
        &self,
        info: &SerializationInfo,
        registry: &InterceptorRegistry,
    ) -> ProxyResult<Arc<ProxyInstance>> {
        let result = self.reconstruct_inner(info, registry);
        if let Err(err) = &result {
            tracing::warn!(target: "veil", error = %err, "proxy reconstruction failed");
        }
        result
    }

    fn reconstruct_inner(
        &self,
        info: &SerializationInfo,
        registry: &InterceptorRegistry,
    ) -> ProxyResult<Arc<ProxyInstance>> {
        let persisted = PersistedProxy::decode(info)?;

        let (base, interfaces) = {
            let mut types = self.runtime.types_mut();
            let mut resolve = |name: &str| {
                types.resolve_name(name).map_err(|err| {
                    ProxyError::Reconstruction(format!("cannot resolve type '{}': {}", name, err))
                })
            };
            let base = resolve(&persisted.base_type)?;
            let mut interfaces = Vec::with_capacity(persisted.interfaces.len());
            for name in &persisted.interfaces {
                interfaces.push(resolve(name)?);
            }
            (base, interfaces)
        };

        let interceptor = registry.restore(&persisted.interceptor)?;
        let ty = self
            .create_implementation(base, &interfaces)
            .map_err(|err| ProxyError::Reconstruction(err.to_string()))?;
        let instance = ty.instantiate();
        instance.set_interceptor(interceptor);
        Ok(instance)
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
