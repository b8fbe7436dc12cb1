//! Standin whose referent data lives inside the standin itself

use std::sync::Arc;

use arc_swap::ArcSwap;
use standin_sdk::{
    Description, InvokeResult, MethodCode, ReferentClass, StandinError, StandinResult, Value,
};

use super::slot::StorageSlot;
use super::{check_reproduction, reproduce, route, Standin};
use crate::auth::Authorisation;
use crate::referent::{description_of, Referent};
use crate::storage::StandinStorage;

/// Composition of a storage slot and an always-present referent
///
/// The data can be forwarded away but never released; drop and undrop are
/// unsupported.
pub struct InlineStandin<R: Referent> {
    slot: StorageSlot,
    referent: ArcSwap<R>,
}

impl<R: Referent> std::fmt::Debug for InlineStandin<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineStandin")
            .field("class", &R::referent_class().name())
            .finish_non_exhaustive()
    }
}

impl<R: Referent> InlineStandin<R> {
    /// Wrap `referent` under trivial storage
    pub fn new(referent: R) -> Self {
        Self {
            slot: StorageSlot::new(StandinStorage::trivial()),
            referent: ArcSwap::from_pointee(referent),
        }
    }

    /// Build a standin from a description
    pub fn reproduce(description: &Description, auth: &Authorisation) -> StandinResult<Self> {
        check_reproduction::<R>(R::referent_class(), description)?;
        Ok(Self::new(reproduce::<R>(description, auth)?))
    }

    /// The local referent
    pub fn local_referent(&self, _auth: &Authorisation) -> Arc<R> {
        self.referent.load_full()
    }
}

impl<R: Referent> Standin for InlineStandin<R> {
    fn referent_class(&self) -> &'static ReferentClass {
        R::referent_class()
    }

    fn storage(&self) -> StandinStorage {
        self.slot.load()
    }

    fn set_storage(&self, storage: StandinStorage, _auth: &Authorisation) -> StandinResult<()> {
        self.slot.set(R::referent_class(), storage)
    }

    fn safe_set_storage(
        &self,
        storage: StandinStorage,
        believed_old: &StandinStorage,
        _auth: &Authorisation,
    ) -> StandinResult<()> {
        self.slot
            .compare_and_set(R::referent_class(), storage, believed_old)
    }

    fn invoke(&self, code: MethodCode, args: &[Value], _auth: &Authorisation) -> InvokeResult {
        let referent = self.referent.load_full();
        R::method_table().dispatch(&referent, code, args)
    }

    fn call(&self, code: MethodCode, args: &[Value]) -> InvokeResult {
        route::<R>(&self.slot.load(), code, args, || Ok(self.referent.load_full()))
    }

    fn describe(&self, _auth: &Authorisation) -> StandinResult<Description> {
        Ok(description_of(&*self.referent.load_full()))
    }

    fn replace_with_reproduction(
        &self,
        class: &'static ReferentClass,
        description: &Description,
        auth: &Authorisation,
    ) -> StandinResult<()> {
        check_reproduction::<R>(class, description)?;
        let reproduced = reproduce::<R>(description, auth)?;
        self.referent.store(Arc::new(reproduced));
        tracing::debug!(class = class.name(), "inline referent reproduced");
        Ok(())
    }

    fn drop_resources(&self, _auth: &Authorisation) -> StandinResult<()> {
        Err(StandinError::UnsupportedOperation(format!(
            "{} is held inline and cannot be dropped",
            R::referent_class().name()
        )))
    }

    fn undrop_resources(&self, _auth: &Authorisation) -> StandinResult<()> {
        Err(StandinError::UnsupportedOperation(format!(
            "{} is held inline and cannot be undropped",
            R::referent_class().name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::auth::Authority;
    use standin_sdk::JsonCodec;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_local_call() {
        let standin = InlineStandin::new(Point::new(5, 7));
        assert!(standin.storage().is_trivial());
        assert_eq!(standin.call_as::<i64>(get_x_code(), &[]).unwrap(), 5);

        standin.call(set_x_code(), &[Value::I64(11)]).unwrap();
        assert_eq!(standin.call_as::<i64>(get_x_code(), &[]).unwrap(), 11);
    }

    #[test]
    fn test_forwarded_call_skips_local() {
        let auth = Authority::new(Default::default()).mint();
        let standin = InlineStandin::new(Point::new(5, 7));
        standin
            .set_storage(StandinStorage::forwarding(Arc::new(Constant(99))), &auth)
            .unwrap();

        assert_eq!(standin.call_as::<i64>(get_x_code(), &[]).unwrap(), 99);
        // Direct invocation still reaches the local data
        assert_eq!(
            standin.invoke(get_x_code(), &[], &auth).unwrap(),
            Value::I64(5)
        );
        assert!(standin.methods_forwarded_to().is_some());
    }

    #[test]
    fn test_describe_and_reproduce() {
        let auth = Authority::new(Default::default()).mint();
        let original = InlineStandin::new(Point::new(3, 4));
        let description = original.describe(&auth).unwrap();
        assert_eq!(description.class(), "Point");

        let copy = InlineStandin::<Point>::reproduce(&description, &auth).unwrap();
        assert_eq!(copy.call_as::<i64>(get_x_code(), &[]).unwrap(), 3);
        assert_eq!(copy.local_referent(&auth).y.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_write_to_matches_size() {
        let auth = Authority::new(Default::default()).mint();
        let standin = InlineStandin::new(Point::new(1, 2));
        let mut sink = Vec::new();
        standin.write_to(&JsonCodec, &mut sink, &auth).unwrap();
        assert_eq!(standin.description_size(&JsonCodec, &auth).unwrap(), sink.len());
    }

    #[test]
    fn test_replace_with_reproduction() {
        let auth = Authority::new(Default::default()).mint();
        let standin = InlineStandin::new(Point::new(1, 2));
        let description = Description::new("Point").with("x", 40i64).with("y", 2i64);

        standin
            .replace_with_reproduction(Point::referent_class(), &description, &auth)
            .unwrap();
        assert_eq!(standin.call_as::<i64>(get_x_code(), &[]).unwrap(), 40);
    }

    #[test]
    fn test_replace_rejects_other_class() {
        let auth = Authority::new(Default::default()).mint();
        let standin = InlineStandin::new(Point::new(1, 2));
        let description = Description::new("Line").with("x", 0i64).with("y", 0i64);

        let err = standin
            .replace_with_reproduction(Point::referent_class(), &description, &auth)
            .unwrap_err();
        assert!(matches!(err, StandinError::TypeMismatch { .. }));
        assert_eq!(standin.call_as::<i64>(get_x_code(), &[]).unwrap(), 1);
    }

    #[test]
    fn test_reproduction_needs_instantiate() {
        let authority = Authority::new(Default::default());
        let bare = authority.mint_bare();
        let description = Description::new("Point").with("x", 1i64).with("y", 1i64);

        let err = InlineStandin::<Point>::reproduce(&description, &bare).unwrap_err();
        assert!(matches!(err, StandinError::MissingCapability(_)));
    }

    #[test]
    fn test_drop_is_unsupported() {
        let auth = Authority::new(Default::default()).mint();
        let standin = InlineStandin::new(Point::new(1, 2));
        assert!(matches!(
            standin.drop_resources(&auth),
            Err(StandinError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            standin.undrop_resources(&auth),
            Err(StandinError::UnsupportedOperation(_))
        ));
        assert!(!standin.is_dropped());
    }
}
