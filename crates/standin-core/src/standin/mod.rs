//! Standins
//!
//! A standin is the handle callers hold instead of a referent. Ordinary calls
//! go through [`Standin::call`], which executes locally under trivial storage
//! and forwards under forwarding storage. The privileged surface (storage
//! replacement, direct invocation, description, reproduction and the
//! drop/undrop pair) requires an [`Authorisation`].
//!
//! Two implementations are provided:
//!
//! - [`InlineStandin`]: the referent's data lives inside the standin
//! - [`IndirectStandin`]: the standin owns a separately held referent that
//!   can be released while the data lives elsewhere

mod indirect;
mod inline;
pub(crate) mod slot;

pub use indirect::IndirectStandin;
pub use inline::InlineStandin;

use std::sync::Arc;

use standin_sdk::{
    Description, DescriptionCodec, FromValue, InvocableTarget, InvokeResult, MethodCode,
    ReferentClass, StandinError, StandinResult, Value,
};

use crate::auth::Authorisation;
use crate::referent::Referent;
use crate::storage::{StandinStorage, StorageKind};

/// The standin contract
///
/// The trait is object safe; migration and transports work with
/// `&dyn Standin`.
pub trait Standin: Send + Sync {
    /// Class of the referent this standin stands in for
    fn referent_class(&self) -> &'static ReferentClass;

    /// Current storage (lock-free, possibly stale)
    fn storage(&self) -> StandinStorage;

    /// Replace the storage unconditionally
    fn set_storage(&self, storage: StandinStorage, auth: &Authorisation) -> StandinResult<()>;

    /// Replace the storage only if it is still `believed_old`
    ///
    /// Fails with [`StandinError::ConcurrentModification`] and leaves the
    /// storage untouched when another writer got there first.
    fn safe_set_storage(
        &self,
        storage: StandinStorage,
        believed_old: &StandinStorage,
        auth: &Authorisation,
    ) -> StandinResult<()>;

    /// Execute `code` on the local referent, ignoring the storage mode
    ///
    /// This is the entry point forwarding targets use, so it never forwards.
    fn invoke(&self, code: MethodCode, args: &[Value], auth: &Authorisation) -> InvokeResult;

    /// Ordinary intercepted call
    fn call(&self, code: MethodCode, args: &[Value]) -> InvokeResult;

    /// Target calls are currently forwarded to, if any
    fn methods_forwarded_to(&self) -> Option<Arc<dyn InvocableTarget>> {
        self.storage().forwarding_target().cloned()
    }

    /// Snapshot the local referent
    fn describe(&self, auth: &Authorisation) -> StandinResult<Description>;

    /// Serialise the local referent through `codec`
    fn write_to(
        &self,
        codec: &dyn DescriptionCodec,
        sink: &mut Vec<u8>,
        auth: &Authorisation,
    ) -> StandinResult<()> {
        let description = self.describe(auth)?;
        codec.describe_into(sink, &description)
    }

    /// Bytes `write_to` would emit
    fn description_size(
        &self,
        codec: &dyn DescriptionCodec,
        auth: &Authorisation,
    ) -> StandinResult<usize> {
        let description = self.describe(auth)?;
        codec.size_of(&description)
    }

    /// Overwrite the local referent's data with a reproduction of
    /// `description`, which must have been taken from a `class` instance
    fn replace_with_reproduction(
        &self,
        class: &'static ReferentClass,
        description: &Description,
        auth: &Authorisation,
    ) -> StandinResult<()>;

    /// Release the local referent
    fn drop_resources(&self, auth: &Authorisation) -> StandinResult<()>;

    /// Allocate a fresh, unpopulated local referent after a drop
    fn undrop_resources(&self, auth: &Authorisation) -> StandinResult<()>;

    /// Whether the local referent is currently released
    fn is_dropped(&self) -> bool {
        false
    }

    /// Ordinary call with the result converted to `T`
    fn call_as<T: FromValue>(&self, code: MethodCode, args: &[Value]) -> StandinResult<T>
    where
        Self: Sized,
    {
        T::from_value(&self.call(code, args)?)
    }
}

/// Route an ordinary call according to `storage`.
///
/// `local` is only consulted under trivial storage.
pub(crate) fn route<R: Referent>(
    storage: &StandinStorage,
    code: MethodCode,
    args: &[Value],
    local: impl FnOnce() -> StandinResult<Arc<R>>,
) -> InvokeResult {
    match storage.kind() {
        StorageKind::Forwarding(target) => {
            tracing::trace!(
                class = R::referent_class().name(),
                code = %code,
                "call forwarded"
            );
            target.invoke(code, args)
        }
        StorageKind::Trivial => {
            let referent = local()?;
            R::method_table().dispatch(&referent, code, args)
        }
    }
}

/// Reject reproductions of a different class
pub(crate) fn check_reproduction<R: Referent>(
    class: &'static ReferentClass,
    description: &Description,
) -> StandinResult<()> {
    let own = R::referent_class();
    if class != own {
        return Err(StandinError::TypeMismatch {
            expected: own.name().to_string(),
            got: class.name().to_string(),
        });
    }
    if description.class() != own.name() {
        return Err(StandinError::TypeMismatch {
            expected: own.name().to_string(),
            got: description.class().to_string(),
        });
    }
    Ok(())
}

/// A blank `R` populated from `description`
pub(crate) fn reproduce<R: Referent>(
    description: &Description,
    auth: &Authorisation,
) -> StandinResult<R> {
    let mut blank = auth.instantiate::<R>(R::referent_class())?;
    blank.replay(description)?;
    Ok(blank)
}
