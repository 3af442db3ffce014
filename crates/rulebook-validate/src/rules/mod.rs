//! Built-in rule catalog.
//!
//! Registered into [`RuleRegistry::with_builtin_rules`]. Rules split into
//! value checks (`sync_rules`), rules that look at other attributes
//! (`field_rules`) and date comparisons (`date_rules`).

mod date_rules;
mod field_rules;
mod sync_rules;

use crate::registry::{RuleContext, RuleRegistry};
use serde_json::Value;

pub use date_rules::parse_date;

/// Whether a value counts as filled for `required`.
///
/// Absent and `null` are empty, as are strings that are blank after trimming
/// and empty arrays. Everything else is filled.
pub fn filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Register every built-in rule.
pub fn register_builtin(registry: &mut RuleRegistry) {
    sync_rules::register(registry);
    field_rules::register(registry);
    date_rules::register(registry);
}

/// Text of a scalar value; `None` for containers and null.
fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The `index`-th parameter parsed as a number.
fn number_param(ctx: &RuleContext<'_>, index: usize) -> Option<f64> {
    ctx.parameters().get(index)?.trim().parse().ok()
}

/// Run one built-in sync rule against `attribute` of `input`.
#[cfg(test)]
pub(crate) fn run_rule(
    rule: &str,
    attribute: &str,
    parameter: Option<Value>,
    input: Value,
    numeric: bool,
) -> bool {
    use crate::registry::Predicate;
    use std::sync::Arc;

    let registry = RuleRegistry::with_builtin_rules();
    let input = Arc::new(input);
    let value = crate::path::resolve(input.as_ref(), attribute);
    let ctx = RuleContext::new(attribute, value, parameter.as_ref(), &input, numeric);
    match registry.get(rule).map(|d| d.predicate()) {
        Some(Predicate::Sync(handler)) => handler(&ctx),
        _ => panic!("no sync rule named {rule}"),
    }
}
