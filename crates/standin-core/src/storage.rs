//! Storage strategies
//!
//! A [`StandinStorage`] says how a standin currently holds its data. It is
//! immutable and replaced as a unit; equality is identity, so two separately
//! created trivial storages are different values. Each storage value owns the
//! monitor that serialises compare-and-swap attempts which believe it is the
//! current one.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use standin_sdk::InvocableTarget;

/// The two storage modes
pub enum StorageKind {
    /// Data is certainly local; calls execute on the standin's own referent
    Trivial,
    /// Calls are routed to the target, which is kept alive by this storage
    Forwarding(Arc<dyn InvocableTarget>),
}

pub(crate) struct StorageCell {
    kind: StorageKind,
    monitor: Mutex<()>,
}

/// Immutable, identity-compared storage value
#[derive(Clone)]
pub struct StandinStorage(Arc<StorageCell>);

impl StandinStorage {
    fn from_kind(kind: StorageKind) -> Self {
        StandinStorage(Arc::new(StorageCell {
            kind,
            monitor: Mutex::new(()),
        }))
    }

    /// A fresh direct storage
    pub fn trivial() -> Self {
        Self::from_kind(StorageKind::Trivial)
    }

    /// A fresh storage forwarding to `target`
    pub fn forwarding(target: Arc<dyn InvocableTarget>) -> Self {
        Self::from_kind(StorageKind::Forwarding(target))
    }

    /// Storage mode
    pub fn kind(&self) -> &StorageKind {
        &self.0.kind
    }

    /// Check if calls execute locally
    pub fn is_trivial(&self) -> bool {
        matches!(self.0.kind, StorageKind::Trivial)
    }

    /// Check if calls are forwarded
    pub fn is_forwarding(&self) -> bool {
        matches!(self.0.kind, StorageKind::Forwarding(_))
    }

    /// Target calls are forwarded to, if any
    pub fn forwarding_target(&self) -> Option<&Arc<dyn InvocableTarget>> {
        match &self.0.kind {
            StorageKind::Forwarding(target) => Some(target),
            StorageKind::Trivial => None,
        }
    }

    /// Identity comparison
    pub fn same(&self, other: &StandinStorage) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Short label for logs
    pub fn mode(&self) -> &'static str {
        match self.0.kind {
            StorageKind::Trivial => "trivial",
            StorageKind::Forwarding(_) => "forwarding",
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.monitor.lock()
    }

    pub(crate) fn cell(&self) -> &Arc<StorageCell> {
        &self.0
    }

    pub(crate) fn into_cell(self) -> Arc<StorageCell> {
        self.0
    }

    pub(crate) fn from_cell(cell: Arc<StorageCell>) -> Self {
        StandinStorage(cell)
    }
}

impl PartialEq for StandinStorage {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for StandinStorage {}

impl fmt::Debug for StandinStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            StorageKind::Trivial => write!(f, "TrivialStorage({:p})", Arc::as_ptr(&self.0)),
            StorageKind::Forwarding(target) => write!(
                f,
                "ForwardingStorage({:p} -> {})",
                Arc::as_ptr(&self.0),
                target.declared_class().name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use standin_sdk::{InvokeResult, MethodCode, ReferentClass, Value};

    #[derive(Default)]
    struct Remote;

    static REMOTE: Lazy<ReferentClass> = Lazy::new(|| ReferentClass::new::<Remote>("Remote"));

    struct Echo;

    impl InvocableTarget for Echo {
        fn declared_class(&self) -> &'static ReferentClass {
            &REMOTE
        }

        fn invoke(&self, code: MethodCode, _args: &[Value]) -> InvokeResult {
            Ok(Value::I64(code.bits() as i64))
        }
    }

    #[test]
    fn test_trivial_storage() {
        let s = StandinStorage::trivial();
        assert!(s.is_trivial());
        assert!(!s.is_forwarding());
        assert!(s.forwarding_target().is_none());
        assert_eq!(s.mode(), "trivial");
    }

    #[test]
    fn test_forwarding_storage_keeps_target_alive() {
        let target: Arc<dyn InvocableTarget> = Arc::new(Echo);
        let weak = Arc::downgrade(&target);
        let s = StandinStorage::forwarding(target);

        assert!(s.is_forwarding());
        assert!(weak.upgrade().is_some());
        let echoed = s
            .forwarding_target()
            .unwrap()
            .invoke(MethodCode::new(9), &[])
            .unwrap();
        assert_eq!(echoed, Value::I64(9));

        drop(s);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_identity_equality() {
        let a = StandinStorage::trivial();
        let b = StandinStorage::trivial();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn test_debug_names_mode() {
        let s = StandinStorage::forwarding(Arc::new(Echo));
        assert!(format!("{:?}", s).starts_with("ForwardingStorage("));
        assert!(format!("{:?}", s).contains("Remote"));
    }
}
