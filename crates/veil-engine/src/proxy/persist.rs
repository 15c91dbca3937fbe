//! Persisting and reconstructing proxies
//!
//! A persisted proxy is an ordered key/value bag:
//!
//! | key                      | value                               |
//! |--------------------------|-------------------------------------|
//! | `__kind`                 | `"veil.proxy"`                      |
//! | `__interceptor`          | `{ "kind": ..., "state": ... }`     |
//! | `__baseType`             | qualified name of the base type     |
//! | `__baseInterfaceCount`   | number of interfaces                |
//! | `__baseInterface{i}`     | qualified name of interface `i`     |
//!
//! Interceptors persist themselves as a kind tag plus JSON state; an
//! [`InterceptorRegistry`] turns that back into a live interceptor.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProxyError, ProxyResult};
use crate::proxy::implementor::ProxyInstance;
use crate::proxy::interceptor::Interceptor;

/// Marker value identifying a persisted proxy
pub const PROXY_KIND: &str = "veil.proxy";

pub const KIND_KEY: &str = "__kind";
pub const INTERCEPTOR_KEY: &str = "__interceptor";
pub const BASE_TYPE_KEY: &str = "__baseType";
pub const INTERFACE_COUNT_KEY: &str = "__baseInterfaceCount";

/// Key of the `index`-th interface entry
pub fn interface_key(index: usize) -> String {
    format!("__baseInterface{}", index)
}

/// Persisted form of an interceptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedInterceptor {
    /// Registry key used to restore the interceptor
    pub kind: String,
    /// Interceptor-defined state
    #[serde(default)]
    pub state: serde_json::Value,
}

impl PersistedInterceptor {
    pub fn new(kind: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            state,
        }
    }
}

/// One value in a [`SerializationInfo`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerialValue {
    I32(i32),
    String(String),
    Interceptor(PersistedInterceptor),
}

/// Ordered key/value bag; serializes as a JSON object in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializationInfo {
    entries: Vec<(String, SerialValue)>,
}

impl SerializationInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; an existing key keeps its position and takes the new
    /// value
    pub fn add_value(&mut self, key: impl Into<String>, value: SerialValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SerialValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_string(&self, key: &str) -> ProxyResult<&str> {
        match self.get(key) {
            Some(SerialValue::String(s)) => Ok(s),
            Some(_) => Err(wrong_kind(key, "a string")),
            None => Err(missing(key)),
        }
    }

    pub fn get_i32(&self, key: &str) -> ProxyResult<i32> {
        match self.get(key) {
            Some(SerialValue::I32(v)) => Ok(*v),
            Some(_) => Err(wrong_kind(key, "an integer")),
            None => Err(missing(key)),
        }
    }

    pub fn get_interceptor(&self, key: &str) -> ProxyResult<&PersistedInterceptor> {
        match self.get(key) {
            Some(SerialValue::Interceptor(i)) => Ok(i),
            Some(_) => Err(wrong_kind(key, "an interceptor")),
            None => Err(missing(key)),
        }
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> ProxyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> ProxyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> ProxyResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn missing(key: &str) -> ProxyError {
    ProxyError::Reconstruction(format!("missing entry '{}'", key))
}

fn wrong_kind(key: &str, expected: &str) -> ProxyError {
    ProxyError::Reconstruction(format!("entry '{}' is not {}", key, expected))
}

impl Serialize for SerializationInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SerializationInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InfoVisitor;

        impl<'de> Visitor<'de> for InfoVisitor {
            type Value = SerializationInfo;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of serialization entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut info = SerializationInfo::new();
                while let Some((key, value)) = access.next_entry::<String, SerialValue>()? {
                    info.add_value(key, value);
                }
                Ok(info)
            }
        }

        deserializer.deserialize_map(InfoVisitor)
    }
}

/// Restores interceptors from their persisted form
pub type InterceptorFactory =
    Arc<dyn Fn(&serde_json::Value) -> ProxyResult<Arc<dyn Interceptor>> + Send + Sync>;

/// Kind tag to interceptor factory
#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    factories: FxHashMap<String, InterceptorFactory>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for an interceptor kind
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> ProxyResult<Arc<dyn Interceptor>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Rebuild a live interceptor
    pub fn restore(&self, persisted: &PersistedInterceptor) -> ProxyResult<Arc<dyn Interceptor>> {
        let factory = self.factories.get(&persisted.kind).ok_or_else(|| {
            ProxyError::Reconstruction(format!("unknown interceptor kind '{}'", persisted.kind))
        })?;
        factory(&persisted.state)
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("InterceptorRegistry").field("kinds", &kinds).finish()
    }
}

/// Decoded contents of a persisted proxy
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedProxy {
    pub base_type: String,
    pub interfaces: Vec<String>,
    pub interceptor: PersistedInterceptor,
}

impl PersistedProxy {
    /// Read and check every entry of the bag
    pub fn decode(info: &SerializationInfo) -> ProxyResult<Self> {
        let kind = info.get_string(KIND_KEY)?;
        if kind != PROXY_KIND {
            return Err(ProxyError::Reconstruction(format!(
                "'{}' is not a persisted proxy",
                kind
            )));
        }

        let base_type = info.get_string(BASE_TYPE_KEY)?.to_string();
        let count = info.get_i32(INTERFACE_COUNT_KEY)?;
        let count = usize::try_from(count).map_err(|_| {
            ProxyError::Reconstruction(format!("negative interface count {}", count))
        })?;
        // Every interface has its own entry, so the bag bounds the count
        if count > info.len() {
            return Err(ProxyError::Reconstruction(format!(
                "interface count {} exceeds the {} stored entries",
                count,
                info.len()
            )));
        }
        let mut interfaces = Vec::with_capacity(count);
        for i in 0..count {
            interfaces.push(info.get_string(&interface_key(i))?.to_string());
        }
        let interceptor = info.get_interceptor(INTERCEPTOR_KEY)?.clone();

        Ok(Self {
            base_type,
            interfaces,
            interceptor,
        })
    }

    /// Write the entries in their fixed order
    pub fn encode(&self) -> SerializationInfo {
        let mut info = SerializationInfo::new();
        info.add_value(KIND_KEY, SerialValue::String(PROXY_KIND.to_string()));
        info.add_value(INTERCEPTOR_KEY, SerialValue::Interceptor(self.interceptor.clone()));
        info.add_value(BASE_TYPE_KEY, SerialValue::String(self.base_type.clone()));
        info.add_value(INTERFACE_COUNT_KEY, SerialValue::I32(self.interfaces.len() as i32));
        for (i, iface) in self.interfaces.iter().enumerate() {
            info.add_value(interface_key(i), SerialValue::String(iface.clone()));
        }
        info
    }
}

impl ProxyInstance {
    /// Persisted representation of this proxy.
    ///
    /// Fails when the proxy type was built without serialization support,
    /// when no interceptor is attached, or when the interceptor cannot be
    /// persisted.
    pub fn get_object_data(&self) -> ProxyResult<SerializationInfo> {
        let proxy_type = self.proxy_type();
        if !proxy_type.is_serializable() {
            return Err(ProxyError::Serialization(format!(
                "{} was built without serialization support",
                proxy_type.name()
            )));
        }
        let interceptor = self
            .interceptor()
            .ok_or_else(|| ProxyError::Serialization("no interceptor attached".to_string()))?;
        let persisted = interceptor.persist().ok_or_else(|| {
            ProxyError::Serialization("the interceptor cannot be persisted".to_string())
        })?;

        let types = proxy_type.runtime().types();
        let contract = proxy_type.contract();
        let proxy = PersistedProxy {
            base_type: types.qualified_name(contract.base()),
            interfaces: contract
                .interfaces()
                .iter()
                .map(|iface| types.qualified_name(*iface))
                .collect(),
            interceptor: persisted,
        };
        Ok(proxy.encode())
    }
}
