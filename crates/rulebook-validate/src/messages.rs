//! Failure message rendering.
//!
//! A message is picked by precedence, first match wins:
//!
//! 1. custom message for the attribute and rule (`min.age` or `age.min`)
//! 2. custom message for the rule (`min`)
//! 3. catalog template for the attribute and rule
//! 4. catalog template for the rule
//! 5. message given when the rule was registered
//! 6. the catalog's `def` template
//!
//! and then interpolated: `:attribute` becomes the attribute's display name,
//! `:<rule>` the rule's parameters, plus a few rule-specific placeholders.

use crate::config::AttributeFormatter;
use crate::error::Result;
use crate::path::substitute_wildcards;
use crate::registry::ValueKind;
use crate::rule::RuleSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A catalog entry: one string, or one string per value kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Template {
    Text(String),
    ByKind(BTreeMap<String, String>),
}

impl Template {
    /// The template text for a value kind.
    ///
    /// Kind-keyed templates fall back to their `string` entry.
    pub fn for_kind(&self, kind: ValueKind) -> Option<&str> {
        match self {
            Template::Text(text) => Some(text),
            Template::ByKind(by_kind) => by_kind
                .get(kind.as_str())
                .or_else(|| by_kind.get(ValueKind::String.as_str()))
                .map(String::as_str),
        }
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Template::Text(text.to_string())
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Template::Text(text)
    }
}

/// A message catalog.
///
/// Deserializes from a flat JSON object of rule → template, with an optional
/// `attributes` object of display names:
///
/// ```json
/// {
///   "required": "Le champ :attribute est obligatoire.",
///   "min": { "numeric": ":attribute doit être au moins :min.", "string": "..." },
///   "def": "Le champ :attribute contient des erreurs.",
///   "attributes": { "email": "adresse e-mail" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lang {
    /// Attribute path → display name
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(flatten)]
    templates: IndexMap<String, Template>,
}

const ENGLISH: &[(&str, &str)] = &[
    ("accepted", "The :attribute must be accepted."),
    ("after", "The :attribute must be after :after."),
    ("after_or_equal", "The :attribute must be equal or after :after_or_equal."),
    ("alpha", "The :attribute field must contain only alphabetic characters."),
    ("alpha_dash", "The :attribute field may only contain alpha-numeric characters, as well as dashes and underscores."),
    ("alpha_num", "The :attribute field must be alphanumeric."),
    ("array", "The :attribute must be an array."),
    ("before", "The :attribute must be before :before."),
    ("before_or_equal", "The :attribute must be equal or before :before_or_equal."),
    ("boolean", "The :attribute field must be true or false."),
    ("confirmed", "The :attribute confirmation does not match."),
    ("date", "The :attribute is not a valid date format."),
    ("def", "The :attribute attribute has errors."),
    ("different", "The :attribute and :different must be different."),
    ("digits", "The :attribute must be :digits digits."),
    ("digits_between", "The :attribute field must be between :min and :max digits."),
    ("email", "The :attribute format is invalid."),
    ("hex", "The :attribute field should have hexadecimal format."),
    ("in", "The selected :attribute is invalid."),
    ("integer", "The :attribute must be an integer."),
    ("not_in", "The selected :attribute is invalid."),
    ("numeric", "The :attribute must be a number."),
    ("present", "The :attribute field must be present (but can be empty)."),
    ("regex", "The :attribute format is invalid."),
    ("required", "The :attribute field is required."),
    ("required_if", "The :attribute field is required when :other is :value."),
    ("required_unless", "The :attribute field is required when :other is not :value."),
    ("required_with", "The :attribute field is required when :field is not empty."),
    ("required_with_all", "The :attribute field is required when :fields are not empty."),
    ("required_without", "The :attribute field is required when :field is empty."),
    ("required_without_all", "The :attribute field is required when :fields are empty."),
    ("same", "The :attribute and :same fields must match."),
    ("string", "The :attribute must be a string."),
    ("url", "The :attribute format is invalid."),
];

// numeric, string, array
const ENGLISH_SIZED: &[(&str, [&str; 3])] = &[
    (
        "between",
        [
            "The :attribute field must be between :min and :max.",
            "The :attribute field must be between :min and :max characters.",
            "The :attribute must have between :min and :max items.",
        ],
    ),
    (
        "max",
        [
            "The :attribute may not be greater than :max.",
            "The :attribute may not be greater than :max characters.",
            "The :attribute may not have more than :max items.",
        ],
    ),
    (
        "min",
        [
            "The :attribute must be at least :min.",
            "The :attribute must be at least :min characters.",
            "The :attribute must have at least :min items.",
        ],
    ),
    (
        "size",
        [
            "The :attribute must be :size.",
            "The :attribute must be :size characters.",
            "The :attribute must contain :size items.",
        ],
    ),
];

const FALLBACK_TEMPLATE: &str = "The :attribute attribute has errors.";

impl Lang {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in English catalog.
    pub fn english() -> Self {
        let mut lang = Self::new();
        for (rule, text) in ENGLISH {
            lang.set(*rule, *text);
        }
        for (rule, [numeric, string, array]) in ENGLISH_SIZED {
            let by_kind = [
                (ValueKind::Numeric, numeric),
                (ValueKind::String, string),
                (ValueKind::Array, array),
            ]
            .into_iter()
            .map(|(kind, text)| (kind.as_str().to_string(), text.to_string()))
            .collect();
            lang.set(*rule, Template::ByKind(by_kind));
        }
        lang
    }

    /// Parse a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn template(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    /// Add or replace a template.
    pub fn set(&mut self, key: impl Into<String>, template: impl Into<Template>) -> &mut Self {
        self.templates.insert(key.into(), template.into());
        self
    }

    /// Add or replace an attribute display name.
    pub fn set_attribute(&mut self, attribute: impl Into<String>, name: impl Into<String>) -> &mut Self {
        self.attributes.insert(attribute.into(), name.into());
        self
    }

    /// Lay `other` over this catalog; its entries win.
    pub fn merge(&mut self, other: Lang) -> &mut Self {
        self.templates.extend(other.templates);
        self.attributes.extend(other.attributes);
        self
    }
}

/// Caller-supplied message overrides, keyed `rule`, `rule.attribute` or
/// `attribute.rule`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomMessages(IndexMap<String, String>);

impl CustomMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.insert(key.into(), message.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a concrete copy of every wildcard key for one binding.
    ///
    /// `items.*.qty.min` bound to `[2]` adds `items.2.qty.min`. Keys already
    /// present are left alone.
    pub fn bind_wildcards(&mut self, binding: &[usize]) {
        if binding.is_empty() {
            return;
        }
        let bound: Vec<(String, String)> = self
            .0
            .iter()
            .filter(|(key, _)| key.contains('*'))
            .map(|(key, message)| (substitute_wildcards(key, binding), message.clone()))
            .collect();
        for (key, message) in bound {
            self.0.entry(key).or_insert(message);
        }
    }
}

impl From<Value> for CustomMessages {
    /// Scalar entries of a JSON object become messages; anything else is ignored.
    fn from(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::new();
        };
        map.into_iter()
            .filter_map(|(key, message)| match message {
                Value::String(text) => Some((key, text)),
                _ => None,
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CustomMessages {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for CustomMessages {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl From<()> for CustomMessages {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

/// The default attribute formatter: `_` and `[` become spaces, `]` is dropped.
///
/// `first_name` → `first name`, `items[0]` → `items 0`.
pub fn default_attribute_formatter(attribute: &str) -> String {
    attribute
        .chars()
        .filter(|c| *c != ']')
        .map(|c| if c == '_' || c == '[' { ' ' } else { c })
        .collect()
}

/// Renders failure messages for one validation run.
pub struct MessageRenderer<'a> {
    lang: &'a Lang,
    custom: &'a CustomMessages,
    attribute_names: &'a IndexMap<String, String>,
    formatter: &'a AttributeFormatter,
}

impl<'a> MessageRenderer<'a> {
    pub fn new(
        lang: &'a Lang,
        custom: &'a CustomMessages,
        attribute_names: &'a IndexMap<String, String>,
        formatter: &'a AttributeFormatter,
    ) -> Self {
        Self {
            lang,
            custom,
            attribute_names,
            formatter,
        }
    }

    /// Display name of an attribute path.
    pub fn attribute_name(&self, attribute: &str) -> String {
        if let Some(name) = self.attribute_names.get(attribute) {
            return name.clone();
        }
        let name = self
            .lang
            .attributes
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(attribute);
        (self.formatter)(name)
    }

    /// Render the failure message for `spec` on `attribute`.
    pub fn render(
        &self,
        spec: &RuleSpec,
        attribute: &str,
        kind: ValueKind,
        registered: Option<&str>,
    ) -> String {
        let template = self.template(spec, attribute, kind, registered);
        interpolate(&template, &self.replacements(spec, attribute))
    }

    fn template(
        &self,
        spec: &RuleSpec,
        attribute: &str,
        kind: ValueKind,
        registered: Option<&str>,
    ) -> String {
        let rule = spec.name.as_str();
        let scoped = [format!("{rule}.{attribute}"), format!("{attribute}.{rule}")];

        let custom = scoped
            .iter()
            .find_map(|key| self.custom.get(key))
            .or_else(|| self.custom.get(rule));
        if let Some(message) = custom {
            return message.to_string();
        }

        let catalog = scoped
            .iter()
            .find_map(|key| self.lang.template(key))
            .or_else(|| self.lang.template(rule))
            .and_then(|template| template.for_kind(kind));

        catalog
            .or(registered)
            .or_else(|| self.lang.template("def").and_then(|t| t.for_kind(kind)))
            .unwrap_or(FALLBACK_TEMPLATE)
            .to_string()
    }

    fn replacements(&self, spec: &RuleSpec, attribute: &str) -> HashMap<&'static str, String> {
        let parameters = spec.parameters();
        let first = || parameters.first().map(String::as_str).unwrap_or_default();

        let mut replacements = HashMap::new();
        replacements.insert("attribute", self.attribute_name(attribute));

        let rule_value = match spec.name.as_str() {
            "same" | "different" | "after" | "after_or_equal" | "before" | "before_or_equal" => {
                self.attribute_name(first().trim())
            }
            _ => parameters.join(","),
        };
        if let Some(name) = static_rule_name(&spec.name) {
            replacements.insert(name, rule_value);
        }

        match spec.name.as_str() {
            "between" | "digits_between" => {
                replacements.insert("min", first().to_string());
                replacements.insert("max", parameters.get(1).cloned().unwrap_or_default());
            }
            "required_if" | "required_unless" => {
                replacements.insert("other", self.attribute_name(first().trim()));
                replacements.insert("value", parameters.get(1..).unwrap_or_default().join(","));
            }
            "required_with" | "required_without" => {
                replacements.insert("field", self.attribute_name(first().trim()));
            }
            "required_with_all" | "required_without_all" => {
                let names: Vec<_> = parameters
                    .iter()
                    .map(|p| self.attribute_name(p.trim()))
                    .collect();
                replacements.insert("fields", names.join(", "));
            }
            _ => {}
        }
        replacements
    }
}

/// Placeholder key for rules whose names are known up front.
fn static_rule_name(rule: &str) -> Option<&'static str> {
    const NAMES: &[&str] = &[
        "after", "after_or_equal", "before", "before_or_equal", "between", "different",
        "digits", "digits_between", "in", "max", "min", "not_in", "regex", "required_if",
        "required_unless", "required_with", "required_with_all", "required_without",
        "required_without_all", "same", "size",
    ];
    NAMES.iter().copied().find(|name| *name == rule)
}

/// Replace `:word` placeholders in one left-to-right pass.
///
/// Unknown placeholders are left as written; substituted text is never
/// rescanned.
fn interpolate(template: &str, replacements: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let word = &after[..len];
        match replacements.get(word) {
            Some(value) if !word.is_empty() => out.push_str(value),
            _ => {
                out.push(':');
                out.push_str(word);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}
