//! Invocable targets
//!
//! A target is anything that can execute a method given only its code and a
//! boxed argument sequence: a local object, a proxy for a remote host, or an
//! object that has not been materialised yet. Transports implement this trait.

use crate::class::ReferentClass;
use crate::code::MethodCode;
use crate::error::InvokeResult;
use crate::value::Value;

/// Executes methods by code
pub trait InvocableTarget: Send + Sync {
    /// Exact class the target executes methods of
    fn declared_class(&self) -> &'static ReferentClass;

    /// Execute the method identified by `code`.
    ///
    /// The method's own failures come back as
    /// [`StandinError::Raised`](crate::StandinError::Raised) and must not be
    /// rewrapped by the caller.
    fn invoke(&self, code: MethodCode, args: &[Value]) -> InvokeResult;
}

impl std::fmt::Debug for dyn InvocableTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvocableTarget({})", self.declared_class().name())
    }
}
