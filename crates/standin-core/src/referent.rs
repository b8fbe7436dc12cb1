//! Referent types
//!
//! A referent is the object a standin stands in for. Each referent type
//! supplies its class descriptor, its dispatch table and the pair of hooks
//! that turn an instance into a [`Description`] and back.

use standin_sdk::{Description, ReferentClass, StandinResult};

use crate::dispatch::MethodTable;

/// A type that can be held behind a standin
///
/// `describe` and `replay` must be inverse: replaying a description into a
/// blank instance yields an instance that describes the same way.
pub trait Referent: Send + Sync + Sized + 'static {
    /// Runtime descriptor for this type
    fn referent_class() -> &'static ReferentClass;

    /// Dispatch table, built once per type
    fn method_table() -> &'static MethodTable<Self>;

    /// Append this instance's fields to `out`
    fn describe(&self, out: &mut Description);

    /// Populate a blank instance from a description
    fn replay(&mut self, description: &Description) -> StandinResult<()>;
}

/// Snapshot of a referent under its own class name
pub fn description_of<R: Referent>(referent: &R) -> Description {
    let mut description = Description::new(R::referent_class().name());
    referent.describe(&mut description);
    description
}
