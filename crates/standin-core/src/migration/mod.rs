//! Migration protocol
//!
//! Moving a standin's data elsewhere and back is a fixed sequence over the
//! privileged standin surface:
//!
//! 1. describe the local referent and reserve a slot at the destination,
//!    which yields the target calls will be forwarded to
//! 2. compare-and-swap the standin's storage from the storage it was seen
//!    with to forwarding storage for that target
//! 3. install the description taken before the swap at the destination
//! 4. optionally drop the local referent
//!
//! Recall runs the sequence in reverse. Losing the compare-and-swap aborts
//! the migration and abandons the reservation. A failed install swaps the
//! storage back, since the local referent has not been dropped yet.

mod loopback;

pub use loopback::{HostedReferent, LoopbackHost};

use std::fmt;
use std::sync::Arc;

use standin_sdk::{
    Description, InvocableTarget, ReferentClass, StandinError, StandinResult,
};

use crate::auth::Authorisation;
use crate::config::MigrationConfig;
use crate::standin::Standin;
use crate::storage::StandinStorage;

/// A slot held at a destination for one referent
#[derive(Clone)]
pub struct Reservation {
    /// Destination-local identifier
    pub id: u64,
    /// Where forwarded calls go once the referent is installed
    pub target: Arc<dyn InvocableTarget>,
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("id", &self.id)
            .field("class", &self.target.declared_class().name())
            .finish()
    }
}

/// Somewhere referent data can be moved to
pub trait MigrationDestination: Send + Sync {
    /// Hold a slot for a `class` instance
    fn reserve(&self, class: &'static ReferentClass) -> StandinResult<Reservation>;

    /// Materialise the reserved referent from `description`
    fn install(&self, id: u64, description: Description) -> StandinResult<()>;

    /// Snapshot the hosted referent
    fn retrieve(&self, id: u64) -> StandinResult<Description>;

    /// Forget the slot. Unknown ids are ignored.
    fn release(&self, id: u64);
}

/// Outcome of [`Migrator::migrate_out`]
#[derive(Debug, Clone)]
pub struct MigrationReceipt {
    /// Reservation the data was installed into
    pub reservation: Reservation,
    /// Forwarding storage the standin was switched to
    pub storage: StandinStorage,
    /// Whether the local referent was dropped
    pub released_local: bool,
}

/// Drives migrations over the privileged standin surface
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    config: MigrationConfig,
}

impl Migrator {
    /// Create a migrator
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Move the standin's data to `destination` and start forwarding there
    pub fn migrate_out(
        &self,
        standin: &dyn Standin,
        destination: &dyn MigrationDestination,
        auth: &Authorisation,
    ) -> StandinResult<MigrationReceipt> {
        let class = standin.referent_class();
        if !class.is_migratable() {
            return Err(StandinError::UnsupportedOperation(format!(
                "{} is copiable and cannot migrate",
                class.name()
            )));
        }

        let believed = standin.storage();
        if believed.is_forwarding() {
            return Err(StandinError::IllegalState(format!(
                "{} standin already forwards; redirect it instead",
                class.name()
            )));
        }

        let description = standin.describe(auth)?;
        let reservation = destination.reserve(class)?;
        let forwarding = StandinStorage::forwarding(Arc::clone(&reservation.target));

        if let Err(e) = standin.safe_set_storage(forwarding.clone(), &believed, auth) {
            tracing::warn!(
                class = class.name(),
                reservation = reservation.id,
                error = %e,
                "migration abandoned"
            );
            destination.release(reservation.id);
            return Err(e);
        }

        if let Err(e) = destination.install(reservation.id, description) {
            // Local data is still intact; switch back to it
            tracing::warn!(
                class = class.name(),
                reservation = reservation.id,
                error = %e,
                "install failed, reverting to local storage"
            );
            if let Err(rollback) = standin.safe_set_storage(believed, &forwarding, auth) {
                // Another mover owns the storage now; leave it as they set it
                tracing::warn!(
                    class = class.name(),
                    reservation = reservation.id,
                    error = %rollback,
                    "rollback lost, storage left as last set"
                );
            }
            destination.release(reservation.id);
            return Err(e);
        }

        let released_local = self.config.release_local && self.release_local(standin, auth)?;

        tracing::info!(
            class = class.name(),
            reservation = reservation.id,
            released_local,
            "referent migrated out"
        );

        Ok(MigrationReceipt {
            reservation,
            storage: forwarding,
            released_local,
        })
    }

    fn release_local(&self, standin: &dyn Standin, auth: &Authorisation) -> StandinResult<bool> {
        match standin.drop_resources(auth) {
            Ok(()) => Ok(true),
            Err(StandinError::UnsupportedOperation(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Bring the data of a migrated standin back and resume local execution
    pub fn recall(
        &self,
        standin: &dyn Standin,
        destination: &dyn MigrationDestination,
        receipt: &MigrationReceipt,
        auth: &Authorisation,
    ) -> StandinResult<()> {
        let class = standin.referent_class();
        let believed = standin.storage();
        if !believed.same(&receipt.storage) {
            return Err(StandinError::ConcurrentModification {
                class: class.name().to_string(),
            });
        }

        let description = destination.retrieve(receipt.reservation.id)?;
        if standin.is_dropped() {
            standin.undrop_resources(auth)?;
        }
        standin.replace_with_reproduction(class, &description, auth)?;
        standin.safe_set_storage(StandinStorage::trivial(), &believed, auth)?;
        destination.release(receipt.reservation.id);

        tracing::info!(
            class = class.name(),
            reservation = receipt.reservation.id,
            "referent recalled"
        );
        Ok(())
    }

    /// Point a standin's forwarding at `target`, returning the new storage
    pub fn redirect(
        &self,
        standin: &dyn Standin,
        target: Arc<dyn InvocableTarget>,
        auth: &Authorisation,
    ) -> StandinResult<StandinStorage> {
        let class = standin.referent_class();
        let declared = target.declared_class();
        if declared != class {
            return Err(StandinError::TypeMismatch {
                expected: class.name().to_string(),
                got: declared.name().to_string(),
            });
        }

        let believed = standin.storage();
        let forwarding = StandinStorage::forwarding(target);
        standin.safe_set_storage(forwarding.clone(), &believed, auth)?;
        tracing::info!(class = class.name(), "forwarding redirected");
        Ok(forwarding)
    }
}
