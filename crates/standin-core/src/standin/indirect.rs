//! Standin that owns a separately held referent
//!
//! The referent can be released with [`Standin::drop_resources`] once its
//! data lives elsewhere, and a fresh blank one allocated again with
//! [`Standin::undrop_resources`] before the data is brought back. The two
//! calls strictly alternate.

use std::sync::Arc;

use parking_lot::RwLock;
use standin_sdk::{
    Description, InvokeResult, MethodCode, ReferentClass, StandinError, StandinResult, Value,
};

use super::slot::StorageSlot;
use super::{check_reproduction, reproduce, route, Standin};
use crate::auth::Authorisation;
use crate::referent::{description_of, Referent};
use crate::storage::StandinStorage;

enum Seat<R> {
    /// Created empty, waiting for a referent to be seized
    Unseated,
    /// Holding a referent; an undropped one stays unpopulated until a
    /// reproduction lands
    Present { referent: Arc<R>, populated: bool },
    /// Released
    Dropped,
}

impl<R> Seat<R> {
    fn label(&self) -> &'static str {
        match self {
            Seat::Unseated => "unseated",
            Seat::Present {
                populated: true, ..
            } => "populated",
            Seat::Present {
                populated: false, ..
            } => "unpopulated",
            Seat::Dropped => "dropped",
        }
    }
}

/// Composition of a storage slot and a releasable referent
pub struct IndirectStandin<R: Referent> {
    slot: StorageSlot,
    seat: RwLock<Seat<R>>,
}

impl<R: Referent> IndirectStandin<R> {
    fn with_seat(storage: StandinStorage, seat: Seat<R>) -> Self {
        Self {
            slot: StorageSlot::new(storage),
            seat: RwLock::new(seat),
        }
    }

    /// Wrap `referent` under trivial storage
    pub fn wrap(referent: R) -> Self {
        Self::wrap_shared(Arc::new(referent))
    }

    /// Wrap an already shared referent
    pub fn wrap_shared(referent: Arc<R>) -> Self {
        Self::with_seat(
            StandinStorage::trivial(),
            Seat::Present {
                referent,
                populated: true,
            },
        )
    }

    /// Build a standin from a description
    pub fn reproduce(description: &Description, auth: &Authorisation) -> StandinResult<Self> {
        check_reproduction::<R>(R::referent_class(), description)?;
        Ok(Self::wrap(reproduce::<R>(description, auth)?))
    }

    /// A standin that starts out dropped, forwarding through `storage`
    pub fn dropped(storage: StandinStorage, _auth: &Authorisation) -> StandinResult<Self> {
        let class = R::referent_class();
        let Some(target) = storage.forwarding_target() else {
            return Err(StandinError::IllegalState(format!(
                "a dropped {} standin needs forwarding storage",
                class.name()
            )));
        };
        let declared = target.declared_class();
        if declared != class {
            return Err(StandinError::TypeMismatch {
                expected: class.name().to_string(),
                got: declared.name().to_string(),
            });
        }
        if !class.is_migratable() {
            return Err(StandinError::UnsupportedOperation(format!(
                "{} is copiable and never leaves local storage",
                class.name()
            )));
        }
        Ok(Self::with_seat(storage, Seat::Dropped))
    }

    /// A standin with no referent yet; see [`IndirectStandin::seize_referent`]
    pub fn unseated() -> Self {
        Self::with_seat(StandinStorage::trivial(), Seat::Unseated)
    }

    /// Adopt `referent`. Only legal once, on an unseated standin.
    pub fn seize_referent(&self, referent: R, _auth: &Authorisation) -> StandinResult<()> {
        let mut seat = self.seat.write();
        match &*seat {
            Seat::Unseated => {
                *seat = Seat::Present {
                    referent: Arc::new(referent),
                    populated: true,
                };
                tracing::debug!(class = R::referent_class().name(), "referent seized");
                Ok(())
            }
            other => Err(StandinError::IllegalState(format!(
                "cannot seize a referent for a {} {} standin",
                other.label(),
                R::referent_class().name()
            ))),
        }
    }

    /// The local referent, when one is present and populated
    pub fn local_referent(&self, _auth: &Authorisation) -> Option<Arc<R>> {
        match &*self.seat.read() {
            Seat::Present {
                referent,
                populated: true,
            } => Some(Arc::clone(referent)),
            _ => None,
        }
    }

    fn local(&self) -> StandinResult<Arc<R>> {
        match &*self.seat.read() {
            Seat::Present {
                referent,
                populated: true,
            } => Ok(Arc::clone(referent)),
            other => Err(StandinError::IllegalState(format!(
                "{} standin has no usable referent ({})",
                R::referent_class().name(),
                other.label()
            ))),
        }
    }
}

impl<R: Referent> Standin for IndirectStandin<R> {
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
        let referent = self.local()?;
        R::method_table().dispatch(&referent, code, args)
    }

    fn call(&self, code: MethodCode, args: &[Value]) -> InvokeResult {
        route::<R>(&self.slot.load(), code, args, || self.local())
    }

    fn describe(&self, _auth: &Authorisation) -> StandinResult<Description> {
        let referent = self.local()?;
        Ok(description_of(&*referent))
    }

    fn replace_with_reproduction(
        &self,
        class: &'static ReferentClass,
        description: &Description,
        auth: &Authorisation,
    ) -> StandinResult<()> {
        check_reproduction::<R>(class, description)?;
        let mut seat = self.seat.write();
        match &mut *seat {
            Seat::Present {
                referent,
                populated,
            } => {
                // A freshly undropped referent is still exclusively ours
                if !*populated {
                    if let Some(fresh) = Arc::get_mut(referent) {
                        fresh.replay(description)?;
                        *populated = true;
                        tracing::debug!(class = class.name(), "undropped referent populated");
                        return Ok(());
                    }
                }

                *referent = Arc::new(reproduce::<R>(description, auth)?);
                *populated = true;
                tracing::debug!(class = class.name(), "indirect referent reproduced");
                Ok(())
            }
            other => Err(StandinError::IllegalState(format!(
                "cannot reproduce into a {} {} standin",
                other.label(),
                class.name()
            ))),
        }
    }

    fn drop_resources(&self, _auth: &Authorisation) -> StandinResult<()> {
        let mut seat = self.seat.write();
        match &*seat {
            Seat::Present { .. } => {
                *seat = Seat::Dropped;
                tracing::debug!(
                    class = R::referent_class().name(),
                    "local referent dropped"
                );
                Ok(())
            }
            other => Err(StandinError::IllegalState(format!(
                "cannot drop a {} {} standin",
                other.label(),
                R::referent_class().name()
            ))),
        }
    }

    fn undrop_resources(&self, auth: &Authorisation) -> StandinResult<()> {
        let mut seat = self.seat.write();
        if !matches!(*seat, Seat::Dropped) {
            return Err(StandinError::IllegalState(format!(
                "cannot undrop a {} {} standin",
                seat.label(),
                R::referent_class().name()
            )));
        }
        let blank = auth.instantiate::<R>(R::referent_class())?;
        *seat = Seat::Present {
            referent: Arc::new(blank),
            populated: false,
        };
        tracing::debug!(
            class = R::referent_class().name(),
            "local referent undropped"
        );
        Ok(())
    }

    fn is_dropped(&self) -> bool {
        matches!(*self.seat.read(), Seat::Dropped)
    }
}
