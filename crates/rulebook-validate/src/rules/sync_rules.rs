//! Value checks: type, format, size and membership rules.

use super::{filled, number_param, text_of};
use crate::registry::{RuleContext, RuleRegistry};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::sync::OnceLock;

// Pre-compiled regex patterns
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static ALPHA_REGEX: OnceLock<Regex> = OnceLock::new();
static ALPHA_DASH_REGEX: OnceLock<Regex> = OnceLock::new();
static ALPHA_NUM_REGEX: OnceLock<Regex> = OnceLock::new();
static HEX_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        // RFC 5322 simplified email regex
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
        ).unwrap()
    })
}

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").unwrap())
}

fn alpha_regex() -> &'static Regex {
    ALPHA_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z]+$").unwrap())
}

fn alpha_dash_regex() -> &'static Regex {
    ALPHA_DASH_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-]+$").unwrap())
}

fn alpha_num_regex() -> &'static Regex {
    ALPHA_NUM_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+$").unwrap())
}

fn hex_regex() -> &'static Regex {
    HEX_REGEX.get_or_init(|| Regex::new(r"^(?i)[0-9a-f]+$").unwrap())
}

pub(super) fn register(registry: &mut RuleRegistry) {
    registry
        .register_implicit("required", |ctx| filled(ctx.value()))
        .register_implicit("present", |ctx| ctx.value().is_some())
        .register_implicit("accepted", accepted)
        .register_implicit("sometimes", |_| true)
        .register("string", |ctx| matches!(ctx.value(), Some(Value::String(_))))
        .register("array", |ctx| matches!(ctx.value(), Some(Value::Array(_))))
        .register("boolean", boolean)
        .register("numeric", |ctx| ctx.value().is_some_and(is_numeric))
        .register("integer", |ctx| ctx.value().is_some_and(is_integer))
        .register("email", |ctx| matches_text(ctx, email_regex()))
        .register("url", |ctx| matches_text(ctx, url_regex()))
        .register("alpha", |ctx| matches_text(ctx, alpha_regex()))
        .register("alpha_dash", |ctx| matches_text(ctx, alpha_dash_regex()))
        .register("alpha_num", |ctx| matches_text(ctx, alpha_num_regex()))
        .register("hex", |ctx| matches_text(ctx, hex_regex()))
        .register("regex", regex_rule)
        .register("min", |ctx| compare_size(ctx, |size, n| size >= n))
        .register("max", |ctx| compare_size(ctx, |size, n| size <= n))
        .register("size", |ctx| compare_size(ctx, |size, n| size == n))
        .register("between", between)
        .register("digits", digits)
        .register("digits_between", digits_between)
        .register("in", |ctx| membership(ctx).unwrap_or(false))
        .register("not_in", |ctx| membership(ctx).map(|found| !found).unwrap_or(false));
}

fn accepted(ctx: &RuleContext<'_>) -> bool {
    match ctx.value() {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(text)) => matches!(text.as_str(), "on" | "yes" | "1" | "true"),
        _ => false,
    }
}

fn boolean(ctx: &RuleContext<'_>) -> bool {
    match ctx.value() {
        Some(Value::Bool(_)) => true,
        Some(Value::Number(n)) => matches!(n.as_i64(), Some(0 | 1)),
        Some(Value::String(text)) => matches!(text.as_str(), "true" | "false" | "0" | "1"),
        _ => false,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(text) => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        Value::String(text) => {
            let digits = text.strip_prefix('-').unwrap_or(text);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

fn matches_text(ctx: &RuleContext<'_>, pattern: &Regex) -> bool {
    match ctx.value() {
        Some(Value::String(text)) => pattern.is_match(text),
        Some(Value::Number(n)) => pattern.is_match(&n.to_string()),
        _ => false,
    }
}

/// Compile a `/pattern/flags` or bare pattern.
fn compile_pattern(raw: &str) -> Result<Regex, regex::Error> {
    let delimited = raw
        .strip_prefix('/')
        .and_then(|rest| rest.rfind('/').map(|end| (&rest[..end], &rest[end + 1..])));

    let (pattern, flags) = delimited.unwrap_or((raw, ""));
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .build()
}

fn regex_rule(ctx: &RuleContext<'_>) -> bool {
    let Some(raw) = ctx.parameter_text() else {
        return false;
    };
    match compile_pattern(&raw) {
        Ok(pattern) => matches_text(ctx, &pattern),
        Err(e) => {
            tracing::warn!(attribute = ctx.attribute(), pattern = %raw, error = %e, "invalid regex rule parameter");
            false
        }
    }
}

fn compare_size(ctx: &RuleContext<'_>, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (ctx.size(), number_param(ctx, 0)) {
        (Some(size), Some(bound)) => cmp(size, bound),
        _ => false,
    }
}

fn between(ctx: &RuleContext<'_>) -> bool {
    match (ctx.size(), number_param(ctx, 0), number_param(ctx, 1)) {
        (Some(size), Some(min), Some(max)) => size >= min && size <= max,
        _ => false,
    }
}

/// Digit count of a numeric value, `None` when it is not numeric.
fn digit_count(ctx: &RuleContext<'_>) -> Option<usize> {
    let value = ctx.value().filter(|v| is_numeric(v))?;
    text_of(Some(value)).map(|text| text.trim().chars().count())
}

fn digits(ctx: &RuleContext<'_>) -> bool {
    match (digit_count(ctx), number_param(ctx, 0)) {
        (Some(count), Some(expected)) => count as f64 == expected,
        _ => false,
    }
}

fn digits_between(ctx: &RuleContext<'_>) -> bool {
    match (digit_count(ctx), number_param(ctx, 0), number_param(ctx, 1)) {
        (Some(count), Some(min), Some(max)) => (count as f64) >= min && (count as f64) <= max,
        _ => false,
    }
}

/// Whether the value is one of the listed parameters.
///
/// Arrays must have every element listed. `None` when the value cannot be
/// compared.
fn membership(ctx: &RuleContext<'_>) -> Option<bool> {
    let allowed = ctx.parameters();
    let listed = |value: &Value| text_of(Some(value)).is_some_and(|text| allowed.contains(&text));
    match ctx.value()? {
        Value::Array(items) => Some(items.iter().all(listed)),
        value @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => Some(listed(value)),
        _ => None,
    }
}
