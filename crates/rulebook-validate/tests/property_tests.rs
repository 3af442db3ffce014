//! Property tests for path addressing, wildcard expansion and the async
//! coordinator.

use proptest::prelude::*;
use rulebook_validate::normalize::normalize;
use rulebook_validate::path::{flatten, resolve};
use rulebook_validate::{
    AsyncCoordinator, CheckRef, CustomMessages, Phase, RuleRegistry, RuleSet, RuleSpec, Validator,
    Verdict,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,8}".prop_map(Value::String),
        prop::collection::vec(any::<i32>().prop_map(|n| json!(n)), 0..4).prop_map(Value::Array),
    ]
}

fn nested_object() -> impl Strategy<Value = Value> {
    let tree = leaf().prop_recursive(4, 32, 5, |inner| {
        prop::collection::btree_map("[a-z]{1,6}", inner, 0..5)
            .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>()))
    });
    prop::collection::btree_map("[a-z]{1,6}", tree, 0..6)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every flattened path resolves back to its leaf.
    #[test]
    fn prop_flatten_resolve_round_trip(input in nested_object()) {
        for (path, value) in flatten(&input) {
            prop_assert_eq!(resolve(&input, &path), Some(&value), "path {}", path);
        }
    }

    /// A wildcard over a sequence of length N yields N concrete attributes,
    /// each with its own bound parameter.
    #[test]
    fn prop_wildcard_expands_once_per_index(n in 0usize..24) {
        let items: Vec<Value> = (0..n).map(|i| json!({ "qty": i })).collect();
        let input = json!({ "items": items });
        let rules = RuleSet::new().rule("items.*.qty", "required|different:items.*.max");

        let out = normalize(&input, &rules, &RuleRegistry::with_builtin_rules(), &mut CustomMessages::new());

        prop_assert_eq!(out.rules.len(), n);
        for (i, (attribute, specs)) in out.rules.iter().enumerate() {
            prop_assert_eq!(attribute, &format!("items.{i}.qty"));
            prop_assert_eq!(&specs[1], &RuleSpec::new("different", format!("items.{i}.max")));
        }
    }

    /// Checking twice gives the same verdict and the same failures.
    #[test]
    fn prop_check_is_idempotent(input in nested_object()) {
        let rules: RuleSet = flatten(&input)
            .into_keys()
            .map(|path| (path, "required|string|min:3"))
            .collect();
        let mut validator = Validator::new(input, rules, ());

        let first = validator.check().unwrap();
        let records = validator.errors().records().to_vec();
        prop_assert_eq!(first, validator.check().unwrap());
        prop_assert_eq!(records.as_slice(), validator.errors().records());
    }

    /// The aggregate callback fires exactly once, after the last resolution
    /// and after dispatch completes, whichever is later.
    #[test]
    fn prop_coordinator_fires_exactly_once(
        order in (1usize..16).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
        complete_after in 0usize..16,
        failing in prop::collection::vec(any::<bool>(), 16),
    ) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let coordinator = AsyncCoordinator::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let tokens: Vec<_> = (0..order.len())
            .map(|i| coordinator.register(CheckRef::new(format!("f{i}"), "rule", "failed")).unwrap())
            .collect();
        let complete_after = complete_after.min(order.len());

        for (step, &index) in order.iter().enumerate() {
            if step == complete_after {
                coordinator.mark_dispatch_complete().unwrap();
            }
            prop_assert_eq!(fired.load(Ordering::SeqCst), 0);
            coordinator.resolve(tokens[index], Verdict::from(!failing[index])).unwrap();
        }
        if complete_after == order.len() {
            prop_assert_eq!(fired.load(Ordering::SeqCst), 0);
            coordinator.mark_dispatch_complete().unwrap();
        }

        prop_assert_eq!(fired.load(Ordering::SeqCst), 1);
        prop_assert_eq!(coordinator.phase(), Phase::Fired);
        prop_assert!(coordinator.resolve(tokens[order[0]], Verdict::Pass).is_err());
        prop_assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
