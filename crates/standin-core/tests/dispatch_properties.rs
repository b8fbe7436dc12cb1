//! Dispatch Table Properties
//!
//! Property tests over randomly chosen method sets:
//! - Every declared method is found by its own code
//! - Codes absent from the table are reported, never misrouted
//! - Rebuilding a table yields the same codes
//!
//! # Running Tests
//! ```bash
//! cargo test --test dispatch_properties
//! ```

mod common;

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use proptest::prelude::*;
use standin_core::{MethodDescriptor, MethodTable};
use standin_sdk::{
    ErasedType, InvokeResult, MethodCode, ReferentClass, Signature, StandinError, Value,
};

#[derive(Default)]
struct Sample;

static SAMPLE: Lazy<ReferentClass> = Lazy::new(|| ReferentClass::new::<Sample>("Sample"));

const NAMES: [&str; 16] = [
    "get", "set", "size", "clear", "push", "pop", "peek", "insert", "remove", "contains", "find",
    "merge", "split", "flush", "close", "reset",
];

fn echo_arity(_: &Sample, args: &[Value]) -> InvokeResult {
    Ok(Value::I64(args.len() as i64))
}

fn signature(arity: usize) -> Signature {
    Signature::new(std::iter::repeat(ErasedType::I64).take(arity), ErasedType::I64)
}

fn build(methods: &BTreeSet<(usize, usize)>) -> MethodTable<Sample> {
    MethodTable::builder(&SAMPLE)
        .methods(
            methods
                .iter()
                .map(|&(name, arity)| MethodDescriptor::new(NAMES[name], signature(arity), echo_arity)),
        )
        .build()
        .unwrap()
}

fn arb_methods() -> impl Strategy<Value = BTreeSet<(usize, usize)>> {
    prop::collection::btree_set((0..NAMES.len(), 0usize..4), 1..40)
}

proptest! {
    #[test]
    fn prop_every_method_found_by_code(methods in arb_methods()) {
        common::init_tracing();
        let table = build(&methods);
        prop_assert_eq!(table.len(), methods.len());

        for &(name, arity) in &methods {
            let sig = signature(arity);
            let code = table.code_of(NAMES[name], &sig).unwrap();
            let entry = table.lookup(code).unwrap();
            prop_assert_eq!(entry.name(), NAMES[name]);
            prop_assert_eq!(entry.signature(), &sig);

            let args = vec![Value::I64(0); arity];
            prop_assert_eq!(table.dispatch(&Sample, code, &args).unwrap(), Value::I64(arity as i64));
        }
    }

    #[test]
    fn prop_unknown_codes_are_reported(methods in arb_methods(), raw in any::<u64>()) {
        let table = build(&methods);
        let code = MethodCode::new(raw);
        prop_assume!(table.lookup(code).is_none());

        match table.dispatch(&Sample, code, &[]) {
            Err(StandinError::UnknownMethod { code: reported, class }) => {
                prop_assert_eq!(reported, code);
                prop_assert_eq!(class, "Sample");
            }
            other => prop_assert!(false, "expected UnknownMethod, got {:?}", other),
        }
    }

    #[test]
    fn prop_neighbouring_codes_do_not_alias(methods in arb_methods(), bit in 0u32..64) {
        let table = build(&methods);
        let known: BTreeSet<u64> = table.codes().map(|c| c.bits()).collect();

        for code in table.codes() {
            let flipped = code.bits() ^ (1u64 << bit);
            if !known.contains(&flipped) {
                prop_assert!(table.lookup(MethodCode::new(flipped)).is_none());
            }
        }
    }

    #[test]
    fn prop_rebuild_is_deterministic(methods in arb_methods()) {
        let first: Vec<MethodCode> = build(&methods).codes().collect();
        let second: Vec<MethodCode> = build(&methods).codes().collect();
        prop_assert_eq!(first, second);
    }
}
