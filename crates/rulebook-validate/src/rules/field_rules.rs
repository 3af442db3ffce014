//! Rules that depend on other attributes of the input.
//!
//! Parameters name attribute paths and are resolved against the whole input,
//! so wildcard-bound parameters (`items.*.kind` → `items.2.kind`) address the
//! sibling of the element under validation.

use super::{filled, text_of};
use crate::registry::{RuleContext, RuleRegistry};

pub(super) fn register(registry: &mut RuleRegistry) {
    registry
        .register_implicit("required_if", |ctx| required_when(ctx, other_matches(ctx)))
        .register_implicit("required_unless", |ctx| required_when(ctx, !other_matches(ctx)))
        .register_implicit("required_with", |ctx| {
            required_when(ctx, fields(ctx).any(|f| filled(ctx.resolve(&f))))
        })
        .register_implicit("required_with_all", |ctx| {
            required_when(ctx, fields(ctx).all(|f| filled(ctx.resolve(&f))))
        })
        .register_implicit("required_without", |ctx| {
            required_when(ctx, fields(ctx).any(|f| !filled(ctx.resolve(&f))))
        })
        .register_implicit("required_without_all", |ctx| {
            required_when(ctx, fields(ctx).all(|f| !filled(ctx.resolve(&f))))
        })
        .register("same", |ctx| other(ctx).is_some_and(|o| ctx.value() == Some(o)))
        .register("different", |ctx| other(ctx) != ctx.value())
        .register("confirmed", |ctx| {
            let confirmation = format!("{}_confirmation", ctx.attribute());
            ctx.resolve(&confirmation) == ctx.value()
        });
}

fn required_when(ctx: &RuleContext<'_>, condition: bool) -> bool {
    !condition || filled(ctx.value())
}

fn fields(ctx: &RuleContext<'_>) -> impl Iterator<Item = String> {
    ctx.parameters().into_iter().map(|f| f.trim().to_string())
}

/// The attribute named by the first parameter.
fn other<'a>(ctx: &RuleContext<'a>) -> Option<&'a serde_json::Value> {
    let path = ctx.parameters().into_iter().next()?;
    ctx.resolve(path.trim())
}

/// Whether the first-parameter attribute equals any of the remaining parameters.
fn other_matches(ctx: &RuleContext<'_>) -> bool {
    let parameters = ctx.parameters();
    let Some((path, values)) = parameters.split_first() else {
        return false;
    };
    match text_of(ctx.resolve(path.trim())) {
        Some(actual) => values.iter().any(|v| *v == actual),
        None => false,
    }
}
