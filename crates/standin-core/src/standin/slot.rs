//! The mutable storage slot shared by every standin implementation
//!
//! Reads are lock-free and may be stale. Writers lock the monitor of the
//! storage they believe is current, then swap; a compare-and-swap that finds
//! a different storage fails instead of overwriting it.

use std::sync::Arc;

use arc_swap::ArcSwap;
use standin_sdk::{ReferentClass, StandinError, StandinResult};

use crate::storage::{StandinStorage, StorageCell};

pub(crate) struct StorageSlot {
    current: ArcSwap<StorageCell>,
}

impl StorageSlot {
    pub(crate) fn new(initial: StandinStorage) -> Self {
        Self {
            current: ArcSwap::new(initial.into_cell()),
        }
    }

    #[inline]
    pub(crate) fn load(&self) -> StandinStorage {
        StandinStorage::from_cell(self.current.load_full())
    }

    fn check_migratable(class: &ReferentClass, storage: &StandinStorage) -> StandinResult<()> {
        if storage.is_forwarding() && !class.is_migratable() {
            return Err(StandinError::UnsupportedOperation(format!(
                "{} is copiable and never leaves local storage",
                class.name()
            )));
        }
        Ok(())
    }

    /// Unconditional replacement
    pub(crate) fn set(&self, class: &ReferentClass, storage: StandinStorage) -> StandinResult<()> {
        Self::check_migratable(class, &storage)?;
        let previous = self.load();
        let _monitor = previous.lock();
        tracing::debug!(
            class = class.name(),
            from = previous.mode(),
            to = storage.mode(),
            "storage replaced"
        );
        self.current.store(storage.into_cell());
        Ok(())
    }

    /// Replace only if the current storage is `believed_old`
    pub(crate) fn compare_and_set(
        &self,
        class: &ReferentClass,
        storage: StandinStorage,
        believed_old: &StandinStorage,
    ) -> StandinResult<()> {
        Self::check_migratable(class, &storage)?;
        let _monitor = believed_old.lock();
        let to = storage.mode();
        let previous = self
            .current
            .compare_and_swap(believed_old.cell(), storage.into_cell());

        if Arc::ptr_eq(&*previous, believed_old.cell()) {
            tracing::debug!(
                class = class.name(),
                from = believed_old.mode(),
                to,
                "storage swapped"
            );
            Ok(())
        } else {
            tracing::warn!(
                class = class.name(),
                believed = believed_old.mode(),
                "storage compare-and-swap lost"
            );
            Err(StandinError::ConcurrentModification {
                class: class.name().to_string(),
            })
        }
    }
}
