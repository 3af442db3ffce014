//! Rule normalization: caller rule set → canonical rule map.

use crate::messages::CustomMessages;
use crate::path::{self, WildcardBinding};
use crate::registry::RuleRegistry;
use crate::rule::{CanonicalRuleMap, RuleSet, RuleSpec};
use indexmap::IndexMap;
use serde_json::Value;

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRules {
    /// Concrete attribute path → rules, in declaration order
    pub rules: CanonicalRuleMap,
    /// Binding that produced each wildcard-expanded attribute
    pub bindings: IndexMap<String, WildcardBinding>,
    /// Whether any rule is registered as asynchronous
    pub has_async: bool,
}

/// Expand and parse `rules` against `input`.
///
/// Wildcard patterns expand to one entry per concrete index, with `*` in
/// string parameters and in wildcard keys of `messages` substituted by the
/// binding. Patterns whose wildcard prefix is not a sequence expand to nothing.
/// Empty rule sequences are dropped, and a later declaration of the same
/// concrete path replaces an earlier one.
pub fn normalize(
    input: &Value,
    rules: &RuleSet,
    registry: &RuleRegistry,
    messages: &mut CustomMessages,
) -> NormalizedRules {
    let mut out = NormalizedRules::default();

    for (pattern, source) in rules.iter() {
        let specs = source.to_specs();
        if specs.is_empty() {
            tracing::trace!(attribute = pattern, "no rules declared; attribute dropped");
            continue;
        }
        let is_async = specs.iter().any(|spec| registry.is_async(&spec.name));

        if !pattern.contains('*') {
            out.has_async |= is_async;
            out.bindings.shift_remove(pattern);
            out.rules.insert(pattern.to_string(), specs);
            continue;
        }

        let expanded = path::expand_wildcards(input, pattern);
        tracing::trace!(pattern, concrete = expanded.len(), "wildcard rule expanded");
        for (attribute, binding) in expanded {
            let bound: Vec<RuleSpec> = specs
                .iter()
                .cloned()
                .map(|mut spec| {
                    spec.bind(&binding);
                    spec
                })
                .collect();
            messages.bind_wildcards(&binding);
            out.has_async |= is_async;
            out.rules.insert(attribute.clone(), bound);
            out.bindings.insert(attribute, binding);
        }
    }

    out
}
