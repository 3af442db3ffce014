//! Validation benchmarks
//!
//! Measures rule normalization, wildcard expansion and sync/async runs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rulebook_validate::path::{expand_wildcards, flatten, resolve};
use rulebook_validate::{RuleRegistry, RuleSet, Validator, ValidatorConfig};
use serde_json::{json, Value};

fn order(lines: usize) -> Value {
    let items: Vec<Value> = (0..lines)
        .map(|i| json!({ "sku": format!("SKU{i}"), "qty": i % 7, "price": "12.50" }))
        .collect();
    json!({
        "customer": { "name": "Ada Lovelace", "email": "ada@example.com", "age": 36 },
        "items": items
    })
}

fn order_rules() -> Value {
    json!({
        "customer": {
            "name": "required|string|min:3",
            "email": "required|email",
            "age": "integer|between:18,120"
        },
        "items.*.sku": "required|alpha_num",
        "items.*.qty": "required|integer|min:1",
        "items.*.price": "numeric|min:0"
    })
}

/// Benchmark path flattening and resolution
fn bench_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("paths");
    let input = order(50);

    group.bench_function("flatten", |b| b.iter(|| flatten(black_box(&input))));

    group.bench_function("resolve_nested", |b| {
        b.iter(|| resolve(black_box(&input), black_box("items.42.qty")))
    });

    group.bench_function("resolve_brackets", |b| {
        b.iter(|| resolve(black_box(&input), black_box("items[42].qty")))
    });

    group.bench_function("expand_wildcards", |b| {
        b.iter(|| expand_wildcards(black_box(&input), black_box("items.*.qty")))
    });

    group.finish();
}

/// Benchmark validator construction (normalization) by input size
fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    let config = ValidatorConfig::default();

    for lines in [1usize, 10, 100] {
        let input = order(lines);
        let rules = RuleSet::from(order_rules());
        group.bench_with_input(BenchmarkId::from_parameter(lines), &input, |b, input| {
            b.iter(|| {
                Validator::with_config(input.clone(), rules.clone(), (), config.clone())
                    .rules()
                    .len()
            })
        });
    }

    group.finish();
}

/// Benchmark synchronous runs
fn bench_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("check");

    for lines in [1usize, 10, 100] {
        let mut validator = Validator::new(order(lines), order_rules(), ());
        group.bench_function(BenchmarkId::new("order", lines), |b| {
            b.iter(|| validator.check().unwrap())
        });
    }

    let mut stopping = Validator::new(order(100), order_rules(), ()).stop_on_error(true);
    group.bench_function("order_stop_on_error", |b| b.iter(|| stopping.check().unwrap()));

    group.finish();
}

/// Benchmark async runs through the coordinator
fn bench_async(c: &mut Criterion) {
    let mut group = c.benchmark_group("async");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut registry = RuleRegistry::with_builtin_rules();
    registry.register_async("in_stock", |ctx, done| {
        let qty = ctx.value().and_then(Value::as_u64).unwrap_or_default();
        tokio::spawn(async move {
            let _ = done.resolve(qty < 5);
        });
    });
    let config = ValidatorConfig::builder().registry(registry).build();

    let mut rules = RuleSet::from(order_rules());
    rules.insert("items.*.qty", "required|integer|in_stock");

    for lines in [10usize, 100] {
        let validator = Validator::with_config(order(lines), rules.clone(), (), config.clone());
        group.bench_function(BenchmarkId::new("validate_async", lines), |b| {
            b.iter(|| runtime.block_on(validator.validate_async()).unwrap().len())
        });
    }

    // Inline-only run: the coordinator fires during dispatch
    let validator = Validator::with_config(order(100), order_rules(), (), config);
    group.bench_function("check_async_inline", |b| {
        b.iter(|| validator.check_async(|| {}, |errors| drop(black_box(errors))).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_paths, bench_normalization, bench_check, bench_async);

criterion_main!(benches);
