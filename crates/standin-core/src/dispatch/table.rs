//! Two-level method dispatch tables
//!
//! Built once per referent type. Eligible methods are keyed by their 64-bit
//! code; the low half selects a bucket (binary search over sorted buckets),
//! the high half selects the method inside the bucket. After the build, a
//! call never hashes or compares names.

use rustc_hash::FxHashMap;
use standin_sdk::{
    InvokeResult, MethodCode, ReferentClass, Signature, StandinError, StandinResult, Value,
};

use super::hash::{code_seed, method_code};

/// Compiled method body: receiver plus boxed arguments
pub type MethodFn<R> = fn(&R, &[Value]) -> InvokeResult;

/// Declared visibility of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Callable from anywhere
    Public,
    /// Callable from subtypes
    Protected,
    /// Callable from the declaring module
    Package,
    /// Callable from the declaring type only
    Private,
}

/// A method as declared on the referent type, before eligibility filtering
pub struct MethodDescriptor<R> {
    name: &'static str,
    signature: Signature,
    visibility: Visibility,
    is_static: bool,
    overridden_final: bool,
    finalizer: bool,
    pinned: Option<MethodCode>,
    handler: MethodFn<R>,
}

impl<R> MethodDescriptor<R> {
    /// Describe a public instance method
    pub fn new(name: &'static str, signature: Signature, handler: MethodFn<R>) -> Self {
        Self {
            name,
            signature,
            visibility: Visibility::Public,
            is_static: false,
            overridden_final: false,
            finalizer: false,
            pinned: None,
            handler,
        }
    }

    /// Set the declared visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as a static (receiver-less) method
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as final here but overridden in another type
    pub fn overridden_final(mut self) -> Self {
        self.overridden_final = true;
        self
    }

    /// Mark as the type's finalizer
    pub fn finalizer(mut self) -> Self {
        self.finalizer = true;
        self
    }

    /// Use `code` instead of the derived one
    pub fn pinned(mut self, code: MethodCode) -> Self {
        self.pinned = Some(code);
        self
    }

    /// Method name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the method may be called across the forwarding boundary.
    ///
    /// Finalization must never be forwarded.
    pub fn is_eligible(&self) -> bool {
        self.visibility != Visibility::Private
            && !self.is_static
            && !self.overridden_final
            && !self.finalizer
    }
}

/// An eligible method with its code
pub struct MethodEntry<R> {
    name: &'static str,
    signature: Signature,
    code: MethodCode,
    handler: MethodFn<R>,
}

impl<R> MethodEntry<R> {
    /// Method name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Erased signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Dispatch code
    pub fn code(&self) -> MethodCode {
        self.code
    }

    fn qualified(&self) -> String {
        format!("{}{}", self.name, self.signature.descriptor())
    }
}

impl<R> std::fmt::Debug for MethodEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("signature", &self.signature.descriptor())
            .field("code", &format_args!("{}", self.code))
            .finish()
    }
}

#[derive(Debug)]
struct Bucket {
    low: u32,
    /// (high half, entry index), sorted by high half
    slots: Vec<(u32, u32)>,
}

/// Dispatch table of one referent type
pub struct MethodTable<R> {
    class: &'static ReferentClass,
    salt: u64,
    entries: Vec<MethodEntry<R>>,
    buckets: Vec<Bucket>,
}

impl<R> MethodTable<R> {
    /// Start building the table of `class`
    pub fn builder(class: &'static ReferentClass) -> MethodTableBuilder<R> {
        MethodTableBuilder {
            class,
            salt: class.salt() ^ code_seed(),
            descriptors: Vec::new(),
        }
    }

    /// Class the table belongs to
    pub fn class(&self) -> &'static ReferentClass {
        self.class
    }

    /// Salt the codes were derived with
    pub fn salt(&self) -> u64 {
        self.salt
    }

    /// Find the method for `code`
    #[inline]
    pub fn lookup(&self, code: MethodCode) -> Option<&MethodEntry<R>> {
        let bucket = self
            .buckets
            .binary_search_by_key(&code.low(), |b| b.low)
            .ok()
            .map(|i| &self.buckets[i])?;
        let slot = bucket
            .slots
            .binary_search_by_key(&code.high(), |&(high, _)| high)
            .ok()?;
        Some(&self.entries[bucket.slots[slot].1 as usize])
    }

    /// Execute the method for `code` on `receiver`.
    ///
    /// An unknown code is always an error carrying the code. Failures raised
    /// by the method itself are returned as they are.
    pub fn dispatch(&self, receiver: &R, code: MethodCode, args: &[Value]) -> InvokeResult {
        let Some(entry) = self.lookup(code) else {
            tracing::warn!(
                class = self.class.name(),
                code = %code,
                "unknown method code"
            );
            return Err(StandinError::UnknownMethod {
                code,
                class: self.class.name().to_string(),
            });
        };

        if args.len() != entry.signature.arity() {
            return Err(StandinError::ArgumentError(format!(
                "{}.{} takes {} arguments, call carried {}",
                self.class.name(),
                entry.name,
                entry.signature.arity(),
                args.len()
            )));
        }

        (entry.handler)(receiver, args)
    }

    /// Code of the method with exactly this name and signature
    pub fn code_of(&self, name: &str, signature: &Signature) -> Option<MethodCode> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.signature == *signature)
            .map(|e| e.code)
    }

    /// Code of the first method called `name`
    pub fn code_named(&self, name: &str) -> Option<MethodCode> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.code)
    }

    /// All eligible methods in declaration order
    pub fn entries(&self) -> impl Iterator<Item = &MethodEntry<R>> {
        self.entries.iter()
    }

    /// All codes in the table
    pub fn codes(&self) -> impl Iterator<Item = MethodCode> + '_ {
        self.entries.iter().map(|e| e.code)
    }

    /// Number of eligible methods
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no method is eligible
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct low halves
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl<R> std::fmt::Debug for MethodTable<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("class", &self.class.name())
            .field("methods", &self.entries.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

/// Builder for [`MethodTable`]
pub struct MethodTableBuilder<R> {
    class: &'static ReferentClass,
    salt: u64,
    descriptors: Vec<MethodDescriptor<R>>,
}

impl<R> MethodTableBuilder<R> {
    /// Declare a method
    pub fn method(mut self, descriptor: MethodDescriptor<R>) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Declare several methods
    pub fn methods(mut self, descriptors: impl IntoIterator<Item = MethodDescriptor<R>>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Filter ineligible methods, derive codes and lay out the buckets
    pub fn build(self) -> StandinResult<MethodTable<R>> {
        let mut entries: Vec<MethodEntry<R>> = Vec::with_capacity(self.descriptors.len());
        let mut by_code: FxHashMap<u64, usize> = FxHashMap::default();
        let mut skipped = 0usize;

        for descriptor in self.descriptors {
            if !descriptor.is_eligible() {
                skipped += 1;
                continue;
            }
            let code = descriptor
                .pinned
                .unwrap_or_else(|| method_code(descriptor.name, &descriptor.signature, self.salt));
            let entry = MethodEntry {
                name: descriptor.name,
                signature: descriptor.signature,
                code,
                handler: descriptor.handler,
            };

            if let Some(&first) = by_code.get(&code.bits()) {
                return Err(StandinError::CodeCollision {
                    code,
                    first: entries[first].qualified(),
                    second: entry.qualified(),
                });
            }
            by_code.insert(code.bits(), entries.len());
            entries.push(entry);
        }

        let mut grouped: FxHashMap<u32, Vec<(u32, u32)>> = FxHashMap::default();
        for (index, entry) in entries.iter().enumerate() {
            grouped
                .entry(entry.code.low())
                .or_default()
                .push((entry.code.high(), index as u32));
        }

        let mut buckets: Vec<Bucket> = grouped
            .into_iter()
            .map(|(low, mut slots)| {
                slots.sort_unstable_by_key(|&(high, _)| high);
                Bucket { low, slots }
            })
            .collect();
        buckets.sort_unstable_by_key(|b| b.low);

        for bucket in buckets.iter().filter(|b| b.slots.len() > 1) {
            tracing::debug!(
                class = self.class.name(),
                low = format_args!("{:#010x}", bucket.low),
                shared = bucket.slots.len(),
                "method codes share a bucket"
            );
        }

        tracing::debug!(
            class = self.class.name(),
            methods = entries.len(),
            skipped,
            buckets = buckets.len(),
            "method table built"
        );

        Ok(MethodTable {
            class: self.class,
            salt: self.salt,
            entries,
            buckets,
        })
    }
}
