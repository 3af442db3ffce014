//! Rule specifications and the parsing front-end.
//!
//! Three input shapes are accepted and all produce the same canonical
//! [`RuleSpec`] sequence:
//!
//! - a pipe-delimited string: `"required|min:3"`
//! - a sequence of tokens and single-key maps: `["required", {"min": 3}]`
//! - a pre-built `Vec<RuleSpec>`
//!
//! Parsing is tolerant. A token that is not a known rule still becomes a
//! `RuleSpec`; it simply matches no registered predicate later.

use crate::path::{self, substitute_wildcards};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute path → ordered rule sequence, wildcards already expanded.
pub type CanonicalRuleMap = IndexMap<String, Vec<RuleSpec>>;

/// A single rule instance: a name and its unparsed parameter.
///
/// Parameter parsing belongs to the predicate; `value` carries the raw form,
/// e.g. `"3,10"` for `between`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule name used for registry lookup
    pub name: String,
    /// Raw parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl RuleSpec {
    /// Create a rule with a parameter.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            value: (!value.is_null()).then_some(value),
        }
    }

    /// Create a rule without a parameter.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Parse a `name` or `name:value` token, splitting on the first `:`.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token.split_once(':') {
            Some((name, value)) if !value.is_empty() => {
                Self::new(name.trim(), Value::String(value.to_string()))
            }
            Some((name, _)) => Self::named(name.trim()),
            None => Self::named(token),
        }
    }

    /// The parameter split into its comma-separated parts.
    pub fn parameters(&self) -> Vec<String> {
        parameters_of(self.value.as_ref())
    }

    /// Substitute bound wildcard indices into string parameters.
    pub(crate) fn bind(&mut self, binding: &[usize]) {
        if binding.is_empty() {
            return;
        }
        match &mut self.value {
            Some(Value::String(text)) => *text = substitute_wildcards(text, binding),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(text) = item {
                        *text = substitute_wildcards(text, binding);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Splits a raw parameter into its parts.
///
/// Strings split on `,`, sequences yield one part per item, other scalars
/// yield themselves.
pub(crate) fn parameters_of(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => text.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items.iter().map(scalar_text).collect(),
        Some(other) => vec![scalar_text(other)],
    }
}

/// Text form of a value: strings unquoted, everything else as JSON.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parse a pipe-delimited rule string. Empty tokens are dropped.
pub fn parse_rule_string(rules: &str) -> Vec<RuleSpec> {
    rules
        .split('|')
        .filter(|token| !token.trim().is_empty())
        .map(RuleSpec::parse)
        .collect()
}

/// Parse any JSON rule value into canonical rule specs.
pub fn parse_rule_value(rules: &Value) -> Vec<RuleSpec> {
    match rules {
        Value::Null => Vec::new(),
        Value::String(text) => parse_rule_string(text),
        Value::Array(items) => items.iter().flat_map(parse_rule_item).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| RuleSpec::new(name.clone(), value.clone()))
            .collect(),
        other => vec![RuleSpec::named(other.to_string())],
    }
}

fn parse_rule_item(item: &Value) -> Vec<RuleSpec> {
    match item {
        Value::String(token) if token.trim().is_empty() => Vec::new(),
        Value::String(token) => vec![RuleSpec::parse(token)],
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| RuleSpec::new(name.clone(), value.clone()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![RuleSpec::named(other.to_string())],
    }
}

/// Where the rules for one attribute pattern come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSource {
    /// Any JSON rule value: pipe string, token/map sequence, or map
    Value(Value),
    /// Pre-built specs
    Specs(Vec<RuleSpec>),
}

impl RuleSource {
    /// Canonical specs for this source.
    pub fn to_specs(&self) -> Vec<RuleSpec> {
        match self {
            RuleSource::Value(value) => parse_rule_value(value),
            RuleSource::Specs(specs) => specs.clone(),
        }
    }
}

impl From<&str> for RuleSource {
    fn from(rules: &str) -> Self {
        RuleSource::Value(Value::String(rules.to_string()))
    }
}

impl From<String> for RuleSource {
    fn from(rules: String) -> Self {
        RuleSource::Value(Value::String(rules))
    }
}

impl From<Vec<&str>> for RuleSource {
    fn from(tokens: Vec<&str>) -> Self {
        RuleSource::Value(Value::Array(
            tokens.into_iter().map(|t| Value::String(t.to_string())).collect(),
        ))
    }
}

impl From<Value> for RuleSource {
    fn from(rules: Value) -> Self {
        RuleSource::Value(rules)
    }
}

impl From<Vec<RuleSpec>> for RuleSource {
    fn from(specs: Vec<RuleSpec>) -> Self {
        RuleSource::Specs(specs)
    }
}

impl From<RuleSpec> for RuleSource {
    fn from(spec: RuleSpec) -> Self {
        RuleSource::Specs(vec![spec])
    }
}

/// The caller-supplied rule specification: attribute pattern → rule source.
///
/// ## Example
///
/// ```rust
/// use rulebook_validate::{RuleSet, RuleSpec};
///
/// let rules = RuleSet::new()
///     .rule("name", "required|min:3")
///     .rule("items.*.qty", vec![RuleSpec::new("min", 1)]);
/// assert_eq!(rules.len(), 2);
/// ```
///
/// A nested JSON object converts into a rule set by flattening it, so
/// `{"address": {"city": "required"}}` declares rules for `address.city`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: IndexMap<String, RuleSource>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules for an attribute pattern.
    pub fn rule(mut self, attribute: impl Into<String>, rules: impl Into<RuleSource>) -> Self {
        self.insert(attribute, rules);
        self
    }

    /// Add rules for an attribute pattern, replacing earlier ones.
    pub fn insert(&mut self, attribute: impl Into<String>, rules: impl Into<RuleSource>) {
        self.entries.insert(attribute.into(), rules.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleSource)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Value> for RuleSet {
    fn from(rules: Value) -> Self {
        let entries = path::flatten(&rules)
            .into_iter()
            .map(|(attribute, value)| (attribute, RuleSource::Value(value)))
            .collect();
        Self { entries }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for RuleSet
where
    K: Into<String>,
    V: Into<RuleSource>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for RuleSet
where
    K: Into<String>,
    V: Into<RuleSource>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for (attribute, rules) in iter {
            set.insert(attribute, rules);
        }
        set
    }
}
