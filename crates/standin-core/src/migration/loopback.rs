//! In-process migration destination
//!
//! Hosts migrated referents in the same process. Useful for tests and for
//! moving data between standins without a transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use standin_sdk::{
    Description, InvocableTarget, InvokeResult, MethodCode, ReferentClass, StandinError,
    StandinResult, Value,
};

use super::{MigrationDestination, Reservation};
use crate::auth::Authorisation;
use crate::referent::{description_of, Referent};

/// A referent held by a [`LoopbackHost`]
///
/// Empty between reservation and install.
pub struct HostedReferent<R: Referent> {
    id: u64,
    referent: ArcSwapOption<R>,
}

impl<R: Referent> HostedReferent<R> {
    /// Reservation id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The materialised referent, if installed
    pub fn referent(&self) -> Option<Arc<R>> {
        self.referent.load_full()
    }

    fn materialised(&self) -> StandinResult<Arc<R>> {
        self.referent.load_full().ok_or_else(|| {
            StandinError::IllegalState(format!(
                "hosted {} #{} is not installed yet",
                R::referent_class().name(),
                self.id
            ))
        })
    }
}

impl<R: Referent> InvocableTarget for HostedReferent<R> {
    fn declared_class(&self) -> &'static ReferentClass {
        R::referent_class()
    }

    fn invoke(&self, code: MethodCode, args: &[Value]) -> InvokeResult {
        let referent = self.materialised()?;
        R::method_table().dispatch(&referent, code, args)
    }
}

/// Destination that keeps hosted referents in a concurrent map
pub struct LoopbackHost<R: Referent> {
    auth: Arc<Authorisation>,
    hosted: DashMap<u64, Arc<HostedReferent<R>>>,
    next_id: AtomicU64,
}

impl<R: Referent> LoopbackHost<R> {
    /// Create a host that materialises referents under `auth`
    pub fn new(auth: Arc<Authorisation>) -> Self {
        Self {
            auth,
            hosted: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Hosted slot for `id`
    pub fn hosted(&self, id: u64) -> Option<Arc<HostedReferent<R>>> {
        self.hosted.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live reservations
    pub fn len(&self) -> usize {
        self.hosted.len()
    }

    /// Check if nothing is hosted
    pub fn is_empty(&self) -> bool {
        self.hosted.is_empty()
    }

    fn slot(&self, id: u64) -> StandinResult<Arc<HostedReferent<R>>> {
        self.hosted(id).ok_or_else(|| {
            StandinError::IllegalState(format!(
                "no {} reservation #{}",
                R::referent_class().name(),
                id
            ))
        })
    }
}

impl<R: Referent> MigrationDestination for LoopbackHost<R> {
    fn reserve(&self, class: &'static ReferentClass) -> StandinResult<Reservation> {
        let hosted_class = R::referent_class();
        if class != hosted_class {
            return Err(StandinError::TypeMismatch {
                expected: hosted_class.name().to_string(),
                got: class.name().to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(HostedReferent {
            id,
            referent: ArcSwapOption::empty(),
        });
        self.hosted.insert(id, Arc::clone(&slot));
        tracing::debug!(class = class.name(), reservation = id, "slot reserved");

        Ok(Reservation { id, target: slot })
    }

    fn install(&self, id: u64, description: Description) -> StandinResult<()> {
        let slot = self.slot(id)?;
        let class = R::referent_class();
        if description.class() != class.name() {
            return Err(StandinError::TypeMismatch {
                expected: class.name().to_string(),
                got: description.class().to_string(),
            });
        }

        let mut referent = self.auth.instantiate::<R>(class)?;
        referent.replay(&description)?;
        slot.referent.store(Some(Arc::new(referent)));
        tracing::debug!(class = class.name(), reservation = id, "referent installed");
        Ok(())
    }

    fn retrieve(&self, id: u64) -> StandinResult<Description> {
        let referent = self.slot(id)?.materialised()?;
        Ok(description_of(&*referent))
    }

    fn release(&self, id: u64) {
        if self.hosted.remove(&id).is_some() {
            tracing::debug!(
                class = R::referent_class().name(),
                reservation = id,
                "slot released"
            );
        }
    }
}
