//! Runtime values
//!
//! `Value` is the boxed form every argument and result takes while a call
//! crosses the proxy boundary. Conversions are exact: an `I32` never turns
//! into an `I64` and `Null` never becomes a primitive default.

use std::fmt;
use std::sync::Arc;

use veil_types::{PrimitiveType, TypeHandle, TypeTable};

use crate::error::{ProxyError, ProxyResult};
use crate::object::ObjectRef;

/// A boxed runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    /// Instance of the built-in `string` type
    Str(Arc<str>),
    /// Instance of a class
    Object(ObjectRef),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Check for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitive tag, for primitive values
    pub fn primitive(&self) -> Option<PrimitiveType> {
        Some(match self {
            Value::Bool(_) => PrimitiveType::Bool,
            Value::I8(_) => PrimitiveType::I8,
            Value::I16(_) => PrimitiveType::I16,
            Value::I32(_) => PrimitiveType::I32,
            Value::I64(_) => PrimitiveType::I64,
            Value::U8(_) => PrimitiveType::U8,
            Value::U16(_) => PrimitiveType::U16,
            Value::U32(_) => PrimitiveType::U32,
            Value::U64(_) => PrimitiveType::U64,
            Value::F32(_) => PrimitiveType::F32,
            Value::F64(_) => PrimitiveType::F64,
            Value::Char(_) => PrimitiveType::Char,
            _ => return None,
        })
    }

    /// Exact dynamic type; `None` for `Null`
    pub fn type_handle(&self, table: &TypeTable) -> Option<TypeHandle> {
        match self {
            Value::Null => None,
            Value::Str(_) => Some(table.builtins().string),
            Value::Object(obj) => Some(obj.type_handle()),
            other => other.primitive().map(|p| table.builtins().primitive(p)),
        }
    }

    /// Whether this value may be stored in a slot of type `ty`.
    ///
    /// Primitives match only their own type (or `object`, boxed). `Null`
    /// fits any reference type and no primitive.
    pub fn conforms_to(&self, table: &TypeTable, ty: TypeHandle) -> bool {
        match self.type_handle(table) {
            None => table.is_reference_type(ty),
            Some(actual) => table.is_assignable(actual, ty),
        }
    }

    /// Name of the dynamic type for diagnostics
    pub fn type_name(&self, table: &TypeTable) -> String {
        match self.type_handle(table) {
            None => "null".to_string(),
            Some(handle) => table.qualified_name(handle),
        }
    }

    /// Short kind name, without a type table
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            other => other.primitive().map(PrimitiveType::name).unwrap_or("value"),
        }
    }

    /// Borrow the string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Objects compare by identity
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Object(obj) => write!(f, "<object {}>", obj.type_handle()),
        }
    }
}

// ============================================================================
// Rust <-> Value conversions
// ============================================================================

/// Convert a Rust value into a boxed [`Value`]
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Extract a Rust value from a boxed [`Value`], exactly
pub trait FromValue: Sized {
    fn from_value(value: Value) -> ProxyResult<Self>;
}

macro_rules! primitive_conversions {
    ($($rust:ty => $variant:ident),* $(,)?) => {
        $(
            impl IntoValue for $rust {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl From<$rust> for Value {
                fn from(v: $rust) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $rust {
                fn from_value(value: Value) -> ProxyResult<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(ProxyError::Conversion {
                            expected: stringify!($rust),
                            actual: other.kind_name().to_string(),
                        }),
                    }
                }
            }
        )*
    };
}

primitive_conversions! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> ProxyResult<Self> {
        Ok(value)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(Arc::from(self))
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(ProxyError::Conversion {
                expected: "String",
                actual: other.kind_name().to_string(),
            }),
        }
    }
}

impl IntoValue for ObjectRef {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::Object(obj) => Ok(obj),
            other => Err(ProxyError::Conversion {
                expected: "object",
                actual: other.kind_name().to_string(),
            }),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_primitive_conversion() {
        assert_eq!(i32::from_value(Value::I32(7)).unwrap(), 7);
        assert!(matches!(
            i64::from_value(Value::I32(7)),
            Err(ProxyError::Conversion { expected: "i64", .. })
        ));
        assert!(i32::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value("hi".into_value()).unwrap(),
            Some("hi".to_string())
        );
        assert_eq!(None::<i32>.into_value(), Value::Null);
    }

    #[test]
    fn test_conformance_is_strict() {
        let table = TypeTable::new();
        let b = table.builtins();
        let i32_ty = b.primitive(PrimitiveType::I32);
        let i64_ty = b.primitive(PrimitiveType::I64);

        assert!(Value::I32(1).conforms_to(&table, i32_ty));
        assert!(!Value::I32(1).conforms_to(&table, i64_ty));
        assert!(Value::I32(1).conforms_to(&table, b.object));
        assert!(!Value::Null.conforms_to(&table, i32_ty));
        assert!(Value::Null.conforms_to(&table, b.string));
        assert!(Value::string("x").conforms_to(&table, b.string));
        assert!(!Value::string("x").conforms_to(&table, i32_ty));
    }

    #[test]
    fn test_type_names() {
        let table = TypeTable::new();
        assert_eq!(Value::Null.type_name(&table), "null");
        assert_eq!(Value::U8(1).type_name(&table), "u8");
        assert_eq!(Value::string("a").type_name(&table), "string");
    }
}
