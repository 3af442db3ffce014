//! The evaluation engine and caller-facing [`Validator`].

use crate::config::{AttributeFormatter, StopOnError, ValidatorConfig};
use crate::coordinator::{AsyncCoordinator, CheckRef, RunOutcome, Verdict};
use crate::error::{Error, Result, ValidationErrors};
use crate::messages::{CustomMessages, MessageRenderer};
use crate::normalize::normalize;
use crate::path;
use crate::registry::{Done, Predicate, RuleContext, RuleDescriptor};
use crate::rule::{CanonicalRuleMap, RuleSet, RuleSpec};
use crate::rules::filled;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Whether to keep checking the current attribute.
enum Flow {
    Continue,
    Stop,
}

/// One rule about to run on one attribute.
struct Check<'a> {
    attribute: &'a str,
    spec: &'a RuleSpec,
    descriptor: &'a RuleDescriptor,
    context: RuleContext<'a>,
}

/// Validates one input against one rule set.
///
/// Rules are normalized once at construction; every run evaluates the same
/// canonical rule map against the same input.
///
/// ## Example
///
/// ```rust
/// use rulebook_validate::Validator;
/// use serde_json::json;
///
/// let mut validator = Validator::new(
///     json!({ "name": "", "age": 15 }),
///     json!({ "name": "required", "age": "min:18" }),
///     (),
/// );
///
/// assert!(validator.fails().unwrap());
/// assert_eq!(validator.errors().first("name"), Some("The name field is required."));
/// assert_eq!(validator.errors().first("age"), Some("The age must be at least 18."));
/// ```
pub struct Validator {
    input: Arc<Value>,
    rules: CanonicalRuleMap,
    has_async: bool,
    messages: CustomMessages,
    config: ValidatorConfig,
    attribute_names: IndexMap<String, String>,
    formatter: AttributeFormatter,
    stop_on_error: StopOnError,
    errors: ValidationErrors,
}

impl Validator {
    /// Create a validator using the process-wide default configuration.
    pub fn new(
        input: Value,
        rules: impl Into<RuleSet>,
        messages: impl Into<CustomMessages>,
    ) -> Self {
        Self::with_config(input, rules, messages, ValidatorConfig::current().clone())
    }

    /// Create a validator with an explicit configuration.
    pub fn with_config(
        input: Value,
        rules: impl Into<RuleSet>,
        messages: impl Into<CustomMessages>,
        config: ValidatorConfig,
    ) -> Self {
        let mut messages = messages.into();
        let normalized = normalize(&input, &rules.into(), config.registry(), &mut messages);
        Self {
            input: Arc::new(input),
            rules: normalized.rules,
            has_async: normalized.has_async,
            messages,
            attribute_names: IndexMap::new(),
            formatter: Arc::clone(config.attribute_formatter()),
            stop_on_error: config.stop_on_error().clone(),
            config,
            errors: ValidationErrors::new(),
        }
    }

    /// Set the short-circuit policy.
    pub fn stop_on_error(mut self, policy: impl Into<StopOnError>) -> Self {
        self.stop_on_error = policy.into();
        self
    }

    /// Set display names for attributes. Names are used verbatim.
    pub fn set_attribute_names<K, V>(mut self, names: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.attribute_names = names
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the formatter applied to attribute names without an explicit name.
    pub fn set_attribute_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Run all rules synchronously. Returns whether every rule passed.
    ///
    /// Failures from the previous run are discarded first.
    ///
    /// # Errors
    ///
    /// [`Error::AsyncRulesRequireCallback`] if any rule is asynchronous.
    pub fn check(&mut self) -> Result<bool> {
        if self.has_async {
            return Err(Error::AsyncRulesRequireCallback);
        }
        tracing::debug!(attributes = self.rules.len(), "validation run started");

        let renderer = self.renderer();
        let mut errors = ValidationErrors::new();
        self.walk(|check| {
            let Predicate::Sync(handler) = check.descriptor.predicate() else {
                return Err(Error::AsyncRulesRequireCallback);
            };
            let passed = handler(&check.context);
            tracing::trace!(attribute = check.attribute, rule = %check.spec.name, passed, "rule evaluated");
            if passed {
                return Ok(Flow::Continue);
            }

            errors.add(check.attribute, &check.spec.name, render(&renderer, &check));
            Ok(self.flow_after_failure(check.attribute))
        })?;

        self.errors = errors;
        let passed = self.errors.is_empty();
        tracing::debug!(passed, errors = self.errors.len(), "validation run finished");
        Ok(passed)
    }

    /// Alias for [`check`](Self::check).
    pub fn passes(&mut self) -> Result<bool> {
        self.check()
    }

    /// Negation of [`check`](Self::check).
    pub fn fails(&mut self) -> Result<bool> {
        self.check().map(|passed| !passed)
    }

    /// Run all rules, completing through callbacks.
    ///
    /// Exactly one of `passes` or `fails` is called, once every dispatched
    /// check has resolved. That may be before this returns, when nothing is
    /// deferred. `fails` receives the run's failures; [`errors`](Self::errors)
    /// is not updated by async runs and keeps the result of the last
    /// [`check`](Self::check).
    ///
    /// # Errors
    ///
    /// Coordinator protocol violations detected during dispatch.
    pub fn check_async<P, F>(&self, passes: P, fails: F) -> Result<()>
    where
        P: FnOnce() + Send + 'static,
        F: FnOnce(ValidationErrors) + Send + 'static,
    {
        self.dispatch(move |outcome| {
            if outcome.passed {
                passes();
            } else {
                fails(outcome.into_errors());
            }
        })
    }

    /// Run all rules and wait for every check to resolve.
    ///
    /// Returns the run's failures; empty when everything passed.
    ///
    /// # Errors
    ///
    /// [`Error::RunAbandoned`] when every pending check was dropped without
    /// resolving, plus coordinator protocol violations during dispatch.
    pub async fn validate_async(&self) -> Result<ValidationErrors> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move |outcome| {
            if tx.send(outcome.into_errors()).is_err() {
                tracing::debug!("validation result receiver dropped");
            }
        })?;
        rx.await.map_err(|_| Error::RunAbandoned)
    }

    /// Failures recorded by the last [`check`](Self::check).
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// The canonical rule map.
    pub fn rules(&self) -> &CanonicalRuleMap {
        &self.rules
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Whether any rule is asynchronous.
    pub fn has_async_rules(&self) -> bool {
        self.has_async
    }

    fn renderer(&self) -> MessageRenderer<'_> {
        MessageRenderer::new(
            self.config.lang(),
            &self.messages,
            &self.attribute_names,
            &self.formatter,
        )
    }

    fn flow_after_failure(&self, attribute: &str) -> Flow {
        if self.stop_on_error.applies_to(attribute) {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Dispatch every check through a fresh coordinator.
    fn dispatch<F>(&self, on_complete: F) -> Result<()>
    where
        F: FnOnce(RunOutcome) + Send + 'static,
    {
        tracing::debug!(attributes = self.rules.len(), has_async = self.has_async, "async validation run started");

        let coordinator = AsyncCoordinator::new(on_complete);
        let renderer = self.renderer();
        self.walk(|check| {
            let message = render(&renderer, &check);
            let token = coordinator.register(CheckRef::new(check.attribute, &check.spec.name, message))?;

            match check.descriptor.predicate() {
                Predicate::Sync(handler) => {
                    let passed = handler(&check.context);
                    tracing::trace!(attribute = check.attribute, rule = %check.spec.name, passed, "rule evaluated");
                    coordinator.resolve(token, Verdict::from(passed))?;
                    if !passed {
                        return Ok(self.flow_after_failure(check.attribute));
                    }
                }
                Predicate::Async(handler) => {
                    tracing::trace!(attribute = check.attribute, rule = %check.spec.name, %token, "async rule dispatched");
                    handler(&check.context, Done::new(coordinator.clone(), token));
                }
            }
            Ok(Flow::Continue)
        })?;

        coordinator.mark_dispatch_complete()?;
        Ok(())
    }

    /// Visit every check that should run, in declaration order.
    ///
    /// Attributes marked `sometimes` are skipped when absent from the input.
    /// Rules not registered are skipped. Non-implicit rules are skipped when
    /// the value is not an array and fails the registered `required`
    /// predicate. An async or missing `required` falls back to [`filled`].
    fn walk<'s, F>(&'s self, mut visit: F) -> Result<()>
    where
        F: FnMut(Check<'s>) -> Result<Flow>,
    {
        let registry = self.config.registry();
        let required = match registry.get("required").map(RuleDescriptor::predicate) {
            Some(Predicate::Sync(handler)) => Some(handler),
            _ => None,
        };

        for (attribute, specs) in &self.rules {
            if specs.iter().any(|spec| spec.name == "sometimes")
                && !path::contains(&self.input, attribute)
            {
                tracing::trace!(attribute = %attribute, "absent attribute marked sometimes skipped");
                continue;
            }

            let value = path::resolve(&self.input, attribute);
            let numeric = specs
                .iter()
                .any(|spec| spec.name == "numeric" || spec.name == "integer");

            let present = matches!(value, Some(Value::Array(_)))
                || match required {
                    Some(handler) => {
                        handler(&RuleContext::new(attribute, value, None, &self.input, numeric))
                    }
                    None => filled(value),
                };

            for spec in specs {
                let Some(descriptor) = registry.get(&spec.name) else {
                    tracing::debug!(attribute = %attribute, rule = %spec.name, "unknown rule skipped");
                    continue;
                };
                if !descriptor.is_implicit() && !present {
                    continue;
                }

                let check = Check {
                    attribute,
                    spec,
                    descriptor,
                    context: RuleContext::new(attribute, value, spec.value.as_ref(), &self.input, numeric),
                };
                if let Flow::Stop = visit(check)? {
                    break;
                }
            }
        }
        Ok(())
    }
}

fn render(renderer: &MessageRenderer<'_>, check: &Check<'_>) -> String {
    renderer.render(
        check.spec,
        check.attribute,
        check.context.value_kind(),
        check.descriptor.message(),
    )
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules)
            .field("has_async", &self.has_async)
            .field("stop_on_error", &self.stop_on_error)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RuleRegistry;
    use serde_json::json;

    fn config_with(registry: RuleRegistry) -> ValidatorConfig {
        ValidatorConfig::builder().registry(registry).build()
    }

    #[test]
    fn required_and_min_fail_in_declared_order() {
        let mut validator = Validator::new(
            json!({ "name": "", "age": 15 }),
            json!({ "name": "required", "age": "min:18" }),
            (),
        );
        assert!(!validator.check().unwrap());
        assert_eq!(validator.errors().field_names(), vec!["name", "age"]);
        assert_eq!(validator.errors().records()[0].code, "required");
        assert_eq!(validator.errors().records()[1].code, "min");
    }

    #[test]
    fn check_is_idempotent() {
        let mut validator = Validator::new(
            json!({ "email": "nope", "tags": [] }),
            RuleSet::new().rule("email", "email|min:10").rule("tags", "required|array"),
            (),
        );
        let first = validator.check().unwrap();
        let first_errors = validator.errors().clone();
        let second = validator.check().unwrap();
        assert_eq!(first, second);
        assert_eq!(&first_errors, validator.errors());
        assert_eq!(first_errors.len(), 3);
    }

    #[test]
    fn optional_empty_values_skip_non_implicit_rules() {
        let mut validator = Validator::new(
            json!({ "nickname": "", "bio": null }),
            RuleSet::new()
                .rule("nickname", "min:3|alpha")
                .rule("bio", "string")
                .rule("missing", "email"),
            (),
        );
        assert!(validator.passes().unwrap());
    }

    #[test]
    fn stop_on_error_limits_one_attribute() {
        let rules = RuleSet::new()
            .rule("code", "required|min:5")
            .rule("name", "min:3|alpha");
        let input = json!({ "name": "a1" });

        let mut all = Validator::new(input.clone(), rules.clone(), ());
        all.check().unwrap();
        assert_eq!(all.errors().get("code").len(), 1);
        assert_eq!(all.errors().get("name").len(), 2);

        let mut stopping = Validator::new(input.clone(), rules.clone(), ()).stop_on_error(true);
        stopping.check().unwrap();
        assert_eq!(stopping.errors().get("code").len(), 1);
        assert_eq!(stopping.errors().get("name").len(), 1);

        let mut listed = Validator::new(input, rules, ()).stop_on_error(["name"]);
        listed.check().unwrap();
        assert_eq!(listed.errors().get("name").len(), 1);
    }

    #[test]
    fn sometimes_skips_absent_attributes_only() {
        let rules = RuleSet::new().rule("profile.email", "sometimes|required|email");

        let mut absent = Validator::new(json!({ "profile": {} }), rules.clone(), ());
        assert!(absent.passes().unwrap());

        let mut blank = Validator::new(json!({ "profile": { "email": "" } }), rules, ());
        assert!(blank.fails().unwrap());
        assert_eq!(
            blank.errors().first("profile.email"),
            Some("The profile.email field is required.")
        );
    }

    #[test]
    fn unknown_rules_are_skipped() {
        let mut validator = Validator::new(json!({ "a": "x" }), RuleSet::new().rule("a", "frobnicate|string"), ());
        assert!(validator.passes().unwrap());
        assert_eq!(validator.rules()["a"].len(), 2);
    }

    #[test]
    fn custom_attribute_names_and_formatter() {
        let mut validator = Validator::new(json!({}), RuleSet::new().rule("first_name", "required").rule("last_name", "required"), ())
            .set_attribute_names([("first_name", "Given name")])
            .set_attribute_formatter(|name| name.replace('_', "-").to_uppercase());
        validator.check().unwrap();
        assert_eq!(validator.errors().first("first_name"), Some("The Given name field is required."));
        assert_eq!(validator.errors().first("last_name"), Some("The LAST-NAME field is required."));
    }

    #[test]
    fn registered_rule_with_message() {
        let mut registry = RuleRegistry::with_builtin_rules();
        registry
            .register("even", |ctx| ctx.value().and_then(Value::as_i64).is_some_and(|n| n % 2 == 0))
            .message("even", "The :attribute must be even.");

        let mut validator = Validator::with_config(
            json!({ "n": 3 }),
            RuleSet::new().rule("n", "integer|even"),
            (),
            config_with(registry),
        );
        assert!(validator.fails().unwrap());
        assert_eq!(validator.errors().get("n"), vec!["The n must be even."]);
    }

    #[test]
    fn sync_entry_points_reject_async_rule_sets() {
        let mut registry = RuleRegistry::with_builtin_rules();
        registry.register_async("remote", |_, done| {
            let _ = done.resolve(true);
        });
        let mut validator = Validator::with_config(
            json!({ "a": 1 }),
            RuleSet::new().rule("a", "remote"),
            (),
            config_with(registry),
        );
        assert!(validator.has_async_rules());
        assert!(matches!(validator.check(), Err(Error::AsyncRulesRequireCallback)));
        assert!(matches!(validator.fails(), Err(Error::AsyncRulesRequireCallback)));
    }

    #[test]
    fn check_async_resolves_inline_rules_immediately() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let validator = Validator::new(json!({ "age": 15 }), RuleSet::new().rule("age", "min:18"), ());
        let failed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failed);
        validator
            .check_async(
                || panic!("should not pass"),
                move |errors| {
                    assert_eq!(errors.first("age"), Some("The age must be at least 18."));
                    flag.store(true, Ordering::SeqCst);
                },
            )
            .unwrap();
        assert!(failed.load(Ordering::SeqCst));
    }

    #[test]
    fn wildcard_async_rules_over_empty_sequence_keep_check_usable() {
        let mut registry = RuleRegistry::with_builtin_rules();
        registry.register_async("unique", |_, done| {
            let _ = done.resolve(true);
        });
        let mut validator = Validator::with_config(
            json!({ "items": [], "name": "Ada" }),
            json!({ "name": "required", "items.*.email": "unique" }),
            (),
            config_with(registry),
        );
        assert!(!validator.has_async_rules());
        assert!(validator.passes().unwrap());
    }

    #[test]
    fn registered_required_decides_which_values_are_empty() {
        let mut registry = RuleRegistry::with_builtin_rules();
        registry.register_implicit("required", |ctx| {
            ctx.value()
                .and_then(Value::as_str)
                .is_some_and(|text| !text.is_empty() && text != "n/a")
        });
        let config = config_with(registry);

        let mut skipped =
            Validator::with_config(json!({ "nick": "n/a" }), json!({ "nick": "min:5" }), (), config.clone());
        assert!(skipped.passes().unwrap());

        let mut checked =
            Validator::with_config(json!({ "nick": "abc" }), json!({ "nick": "min:5" }), (), config);
        assert!(checked.fails().unwrap());
        assert_eq!(checked.errors().field_names(), vec!["nick"]);
    }

    #[test]
    fn async_runs_leave_sync_errors_untouched() {
        let fresh = Validator::new(json!({ "age": 15 }), RuleSet::new().rule("age", "min:18"), ());
        fresh.check_async(|| {}, |_| {}).unwrap();
        assert!(fresh.errors().is_empty());

        let mut checked = Validator::new(json!({ "age": 15 }), RuleSet::new().rule("age", "min:18"), ());
        assert!(checked.fails().unwrap());
        checked.check_async(|| {}, |_| {}).unwrap();
        assert_eq!(checked.errors().field_names(), vec!["age"]);
    }

    #[test]
    fn array_values_are_always_validatable() {
        let mut validator = Validator::new(json!({ "tags": [] }), RuleSet::new().rule("tags", "min:1"), ());
        assert!(validator.fails().unwrap());
        assert_eq!(validator.errors().first("tags"), Some("The tags must have at least 1 items."));
    }
}
