//! Conversions between boxed values and Rust types.
//!
//! Method stubs unpack their arguments with [`arg`] and box their results
//! with [`IntoValue`]. A mismatch surfaces as a marshalling error rather than
//! a panic, since arguments may originate on another host.

use crate::error::{StandinError, StandinResult};
use crate::value::{ObjectRef, Value};

/// Convert from a boxed value to a Rust type.
pub trait FromValue: Sized {
    /// Convert, returning an error if the variant doesn't match
    fn from_value(value: &Value) -> StandinResult<Self>;
}

/// Convert from a Rust type to a boxed value.
pub trait IntoValue {
    /// Box the value
    fn into_value(self) -> Value;
}

impl<T: Into<Value>> IntoValue for T {
    fn into_value(self) -> Value {
        self.into()
    }
}

fn mismatch(expected: &str, value: &Value) -> StandinError {
    StandinError::TypeMismatch {
        expected: expected.to_string(),
        got: value.type_name().to_string(),
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value.as_i32().ok_or_else(|| mismatch("i32", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch("bytes", value))
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: &Value) -> StandinResult<Self> {
        value
            .as_object_ref()
            .cloned()
            .ok_or_else(|| mismatch("ref", value))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> StandinResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> StandinResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Unpack argument `index` of a call
pub fn arg<T: FromValue>(args: &[Value], index: usize) -> StandinResult<T> {
    let value = args.get(index).ok_or_else(|| {
        StandinError::ArgumentError(format!(
            "missing argument {} (call carried {})",
            index,
            args.len()
        ))
    })?;
    T::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_unpacks() {
        let args = vec![Value::I32(4), Value::from("north"), Value::Null];
        assert_eq!(arg::<i32>(&args, 0).unwrap(), 4);
        assert_eq!(arg::<i64>(&args, 0).unwrap(), 4);
        assert_eq!(arg::<String>(&args, 1).unwrap(), "north");
        assert_eq!(arg::<Option<i32>>(&args, 2).unwrap(), None);
    }

    #[test]
    fn test_arg_missing() {
        let err = arg::<i32>(&[], 0).unwrap_err();
        assert!(matches!(err, StandinError::ArgumentError(_)));
    }

    #[test]
    fn test_arg_mismatch() {
        let err = arg::<bool>(&[Value::F64(1.0)], 0).unwrap_err();
        match err {
            StandinError::TypeMismatch { expected, got } => {
                assert_eq!(expected, "bool");
                assert_eq!(got, "f64");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_into_value() {
        assert_eq!(7i64.into_value(), Value::I64(7));
        assert_eq!(().into_value(), Value::Null);
    }
}
