//! Runtime class descriptors for referent types

use std::any::{Any, TypeId};
use std::fmt;

/// Type-erased instance of a referent type
pub type ErasedInstance = Box<dyn Any + Send + Sync>;

type BlankFn = fn() -> ErasedInstance;
type DuplicateFn = fn(&(dyn Any + Send + Sync)) -> Option<ErasedInstance>;

fn blank_of<T: Default + Send + Sync + 'static>() -> ErasedInstance {
    Box::new(T::default())
}

fn duplicate_of<T: Clone + Send + Sync + 'static>(
    value: &(dyn Any + Send + Sync),
) -> Option<ErasedInstance> {
    value
        .downcast_ref::<T>()
        .map(|v| Box::new(v.clone()) as ErasedInstance)
}

/// Exact runtime type a standin stands in for.
///
/// A class is never a supertype: two classes are equal only if they describe
/// the same Rust type. Classes are normally created once per type and kept in
/// a static.
pub struct ReferentClass {
    name: &'static str,
    type_id: TypeId,
    migratable: bool,
    salt: u64,
    blank: BlankFn,
    duplicate: Option<DuplicateFn>,
}

impl ReferentClass {
    /// Describe `T` under `name`
    pub fn new<T: Default + Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            migratable: true,
            salt: name_salt(name),
            blank: blank_of::<T>,
            duplicate: None,
        }
    }

    /// Describe a deeply-copiable `T`. Copiable classes are shipped by value
    /// and never migrate.
    pub fn copiable<T: Default + Clone + Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            migratable: false,
            duplicate: Some(duplicate_of::<T>),
            ..Self::new::<T>(name)
        }
    }

    /// Override the per-type salt mixed into method codes
    pub fn with_salt(mut self, salt: u64) -> Self {
        self.salt = salt;
        self
    }

    /// Allow duplication of a migratable `T`
    pub fn with_duplication<T: Clone + Send + Sync + 'static>(mut self) -> Self {
        debug_assert_eq!(self.type_id, TypeId::of::<T>(), "duplicator for another type");
        self.duplicate = Some(duplicate_of::<T>);
        self
    }

    /// Class name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rust type identity
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Check whether this class describes `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Whether instances may leave the local process
    pub fn is_migratable(&self) -> bool {
        self.migratable
    }

    /// Whether the class can produce duplicates
    pub fn is_duplicable(&self) -> bool {
        self.duplicate.is_some()
    }

    /// Per-type salt
    pub fn salt(&self) -> u64 {
        self.salt
    }

    /// Allocate an unpopulated instance.
    ///
    /// Standins reach this through the instantiation capability only.
    #[doc(hidden)]
    pub fn raw_blank(&self) -> ErasedInstance {
        (self.blank)()
    }

    /// Duplicate an instance of this class.
    ///
    /// Standins reach this through the clone capability only.
    #[doc(hidden)]
    pub fn raw_duplicate(&self, value: &(dyn Any + Send + Sync)) -> Option<ErasedInstance> {
        self.duplicate.and_then(|dup| dup(value))
    }
}

impl PartialEq for ReferentClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ReferentClass {}

impl fmt::Debug for ReferentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferentClass")
            .field("name", &self.name)
            .field("migratable", &self.migratable)
            .field("salt", &format_args!("{:#x}", self.salt))
            .field("duplicable", &self.duplicate.is_some())
            .finish()
    }
}

impl fmt::Display for ReferentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// FNV-1a
fn name_salt(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, Debug, PartialEq)]
    struct Celsius(i32);

    #[derive(Default)]
    struct Ledger;

    #[test]
    fn test_class_identity() {
        let a = ReferentClass::new::<Ledger>("Ledger");
        let b = ReferentClass::new::<Ledger>("Ledger");
        let c = ReferentClass::new::<Celsius>("Celsius");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is::<Ledger>());
        assert!(!a.is::<Celsius>());
    }

    #[test]
    fn test_default_flags() {
        let class = ReferentClass::new::<Ledger>("Ledger");
        assert!(class.is_migratable());
        assert!(!class.is_duplicable());
        assert_eq!(class.to_string(), "Ledger");
    }

    #[test]
    fn test_copiable_is_not_migratable() {
        let class = ReferentClass::copiable::<Celsius>("Celsius");
        assert!(!class.is_migratable());
        assert!(class.is_duplicable());
    }

    #[test]
    fn test_salt_depends_on_name() {
        let a = ReferentClass::new::<Ledger>("Ledger");
        let b = ReferentClass::new::<Ledger>("Journal");
        assert_ne!(a.salt(), b.salt());
        assert_eq!(a.with_salt(7).salt(), 7);
    }

    #[test]
    fn test_blank_and_duplicate() {
        let class = ReferentClass::copiable::<Celsius>("Celsius");
        let blank = class.raw_blank();
        assert_eq!(blank.downcast_ref::<Celsius>(), Some(&Celsius(0)));

        let original = Celsius(21);
        let copy = class.raw_duplicate(&original).unwrap();
        assert_eq!(copy.downcast_ref::<Celsius>(), Some(&Celsius(21)));

        // Wrong type yields nothing
        assert!(class.raw_duplicate(&Ledger).is_none());
    }
}
