//! Boxed argument and result representation
//!
//! Every call that crosses a standin is expressed as a method code plus a
//! slice of `Value`s. The same representation is used for the fields of a
//! [`Description`](crate::Description), so a value must be able to travel
//! through any codec the serialization collaborator provides.
//!
//! Non-copiable objects are never embedded: they appear as [`ObjectRef`]
//! handles that the receiving side resolves on its own.

use serde::{Deserialize, Serialize};

/// Handle to an object that is shipped by reference rather than by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Exact class name of the referenced object
    pub class: String,
    /// Identifier assigned by whoever owns the object
    pub id: u64,
}

impl ObjectRef {
    /// Create a new object handle
    pub fn new(class: impl Into<String>, id: u64) -> Self {
        Self {
            class: class.into(),
            id,
        }
    }
}

/// A boxed argument, return value or described field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value (void returns, null fields)
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered sequence of values
    List(Vec<Value>),
    /// Reference to a non-copiable object
    Ref(ObjectRef),
}

impl Value {
    /// Create a null value
    #[inline]
    pub const fn null() -> Self {
        Value::Null
    }

    /// Check if this is a null value
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as boolean if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 if this is an i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64, widening i32
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            Value::I32(i) => Some(i64::from(*i)),
            _ => None,
        }
    }

    /// Get as f64 if this is an f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get as byte slice if this holds bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Get list elements if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Get the object handle if this is a reference
    pub fn as_object_ref(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Short name of the variant, used in type mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Ref(_) => "ref",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Ref(r)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}
