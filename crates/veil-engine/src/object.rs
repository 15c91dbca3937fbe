//! Heap objects

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use veil_types::TypeHandle;

use crate::value::Value;

/// Shared reference to an object
pub type ObjectRef = Arc<dyn Object>;

/// Anything that can be the receiver of a method call
pub trait Object: Send + Sync + fmt::Debug + Any {
    /// Exact runtime type of the object
    fn type_handle(&self) -> TypeHandle;

    /// Instance fields
    fn fields(&self) -> &FieldStore;

    /// Upcast for downcasting to the concrete object kind
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Named instance fields
#[derive(Debug, Default)]
pub struct FieldStore {
    values: RwLock<FxHashMap<String, Value>>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field (`Null` when unset)
    pub fn get(&self, name: &str) -> Value {
        self.values.read().get(name).cloned().unwrap_or_default()
    }

    /// Write a field
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.values.write().insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

/// Instance of a declared class
#[derive(Debug)]
pub struct PlainObject {
    ty: TypeHandle,
    fields: FieldStore,
}

impl PlainObject {
    pub(crate) fn new(ty: TypeHandle) -> Self {
        Self {
            ty,
            fields: FieldStore::new(),
        }
    }
}

impl Object for PlainObject {
    fn type_handle(&self) -> TypeHandle {
        self.ty
    }

    fn fields(&self) -> &FieldStore {
        &self.fields
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Identity of an object, stable for its lifetime
pub fn object_id(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}
