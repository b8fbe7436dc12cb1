//! Method codes and erased signatures
//!
//! A method code is the only thing that travels with a call to identify the
//! method being invoked. The low 32 bits select a bucket, the high 32 bits
//! select the method inside it; codes are expected to share low halves and
//! tables must cope with that.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 64-bit method identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MethodCode(u64);

impl MethodCode {
    /// Create a code from its raw bits
    #[inline]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Assemble a code from its two halves
    #[inline]
    pub const fn from_parts(high: u32, low: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Bucket selector
    #[inline]
    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    /// Selector within a bucket
    #[inline]
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for MethodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Argument or return type after erasure.
///
/// Generic parameters are erased to their bound, so `List<Point>` and
/// `List<String>` both erase to [`ErasedType::List`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErasedType {
    /// No value
    Void,
    /// Boolean
    Bool,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 64-bit float
    F64,
    /// String
    Str,
    /// Byte array
    Bytes,
    /// Any list
    List,
    /// Object of the named class
    Object(&'static str),
}

impl ErasedType {
    /// Canonical spelling used when hashing signatures.
    ///
    /// Objects are spelled `L<name>;` so no class name can collide with a
    /// primitive spelling.
    pub fn erasure(&self) -> Cow<'static, str> {
        let primitive = match self {
            ErasedType::Void => "V",
            ErasedType::Bool => "Z",
            ErasedType::I32 => "I",
            ErasedType::I64 => "J",
            ErasedType::F64 => "D",
            ErasedType::Str => "S",
            ErasedType::Bytes => "[B",
            ErasedType::List => "L",
            ErasedType::Object(name) => return Cow::Owned(format!("L{};", name)),
        };
        Cow::Borrowed(primitive)
    }
}

/// Erased argument and return types of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<ErasedType>,
    ret: ErasedType,
}

impl Signature {
    /// Create a signature
    pub fn new(params: impl IntoIterator<Item = ErasedType>, ret: ErasedType) -> Self {
        Self {
            params: params.into_iter().collect(),
            ret,
        }
    }

    /// Signature of a method taking no arguments
    pub fn nullary(ret: ErasedType) -> Self {
        Self::new([], ret)
    }

    /// Parameter types
    pub fn params(&self) -> &[ErasedType] {
        &self.params
    }

    /// Return type
    pub fn ret(&self) -> &ErasedType {
        &self.ret
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Canonical descriptor, e.g. `(I,S)J`
    pub fn descriptor(&self) -> String {
        let params: Vec<Cow<'static, str>> = self.params.iter().map(ErasedType::erasure).collect();
        format!("({}){}", params.join(","), self.ret.erasure())
    }
}
