//! Date parsing and comparison rules.

use super::text_of;
use crate::registry::{RuleContext, RuleRegistry};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;

/// Parse an RFC 3339, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` date.
///
/// Offsets are normalized to UTC; bare dates are midnight.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub(super) fn register(registry: &mut RuleRegistry) {
    registry
        .register("date", |ctx| value_date(ctx).is_some())
        .register("after", |ctx| compare(ctx, |o| o == Ordering::Greater))
        .register("after_or_equal", |ctx| compare(ctx, |o| o != Ordering::Less))
        .register("before", |ctx| compare(ctx, |o| o == Ordering::Less))
        .register("before_or_equal", |ctx| compare(ctx, |o| o != Ordering::Greater));
}

fn value_date(ctx: &RuleContext<'_>) -> Option<NaiveDateTime> {
    match ctx.value()? {
        Value::String(text) => parse_date(text),
        _ => None,
    }
}

/// The date a parameter refers to: another attribute's value when the
/// parameter names one, the parameter itself otherwise.
fn reference_date(ctx: &RuleContext<'_>) -> Option<NaiveDateTime> {
    let parameter = ctx.parameter_text()?;
    let parameter = parameter.trim();
    match ctx.resolve(parameter) {
        Some(other) => parse_date(&text_of(Some(other))?),
        None => parse_date(parameter),
    }
}

fn compare(ctx: &RuleContext<'_>, accept: impl Fn(Ordering) -> bool) -> bool {
    match (value_date(ctx), reference_date(ctx)) {
        (Some(value), Some(reference)) => accept(value.cmp(&reference)),
        _ => false,
    }
}
