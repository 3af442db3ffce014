//! Rule registry: rule name → predicate descriptor.
//!
//! A registry is populated up front and shared immutably (behind an `Arc`) by
//! every validation run that uses it. Membership in the sync or async set is
//! decided by how a rule was registered, never by inspecting the handler.

use crate::coordinator::{AsyncCoordinator, Token, Verdict};
use crate::error::CoordinatorError;
use crate::path;
use crate::rule::{parameters_of, scalar_text};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a value is treated for size checks and typed message templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Numeric,
    String,
    Array,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Numeric => "numeric",
            ValueKind::String => "string",
            ValueKind::Array => "array",
        }
    }
}

/// Everything a predicate sees for one check.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    attribute: &'a str,
    value: Option<&'a Value>,
    parameter: Option<&'a Value>,
    input: &'a Arc<Value>,
    numeric: bool,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(
        attribute: &'a str,
        value: Option<&'a Value>,
        parameter: Option<&'a Value>,
        input: &'a Arc<Value>,
        numeric: bool,
    ) -> Self {
        Self {
            attribute,
            value,
            parameter,
            input,
            numeric,
        }
    }

    /// Attribute path under validation.
    pub fn attribute(&self) -> &'a str {
        self.attribute
    }

    /// Value at the attribute path; `None` when absent.
    pub fn value(&self) -> Option<&'a Value> {
        self.value
    }

    /// Raw, unparsed rule parameter.
    pub fn parameter(&self) -> Option<&'a Value> {
        self.parameter
    }

    /// Raw parameter as text, without splitting.
    pub fn parameter_text(&self) -> Option<String> {
        self.parameter.map(scalar_text)
    }

    /// Parameter split into comma-separated parts.
    pub fn parameters(&self) -> Vec<String> {
        parameters_of(self.parameter)
    }

    /// The whole input object.
    pub fn input(&self) -> &'a Value {
        self.input
    }

    /// Resolve another attribute path against the input.
    pub fn resolve(&self, path: &str) -> Option<&'a Value> {
        path::resolve(self.input, path)
    }

    /// Whether the attribute also carries `numeric` or `integer`.
    pub fn has_numeric_rule(&self) -> bool {
        self.numeric
    }

    pub fn value_kind(&self) -> ValueKind {
        match self.value {
            Some(Value::Array(_)) => ValueKind::Array,
            Some(Value::Number(_)) => ValueKind::Numeric,
            _ if self.numeric => ValueKind::Numeric,
            _ => ValueKind::String,
        }
    }

    /// Size used by `min`, `max`, `between` and `size`.
    ///
    /// Arrays measure their length, numbers their value, strings their parsed
    /// value when the attribute is numeric and their character count otherwise.
    pub fn size(&self) -> Option<f64> {
        match self.value? {
            Value::Array(items) => Some(items.len() as f64),
            Value::Number(n) => n.as_f64(),
            Value::String(text) if self.numeric => text.trim().parse().ok(),
            Value::String(text) => Some(text.chars().count() as f64),
            _ => None,
        }
    }

    /// Owned copy for handlers that complete later.
    pub fn to_input(&self) -> RuleInput {
        RuleInput {
            attribute: self.attribute.to_string(),
            value: self.value.cloned(),
            parameter: self.parameter.cloned(),
            input: Arc::clone(self.input),
            numeric: self.numeric,
        }
    }
}

/// Owned form of [`RuleContext`], for checks that outlive their dispatch.
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub attribute: String,
    pub value: Option<Value>,
    pub parameter: Option<Value>,
    pub input: Arc<Value>,
    pub numeric: bool,
}

impl RuleInput {
    /// Borrow as a [`RuleContext`] to reuse its helpers.
    pub fn context(&self) -> RuleContext<'_> {
        RuleContext::new(
            &self.attribute,
            self.value.as_ref(),
            self.parameter.as_ref(),
            &self.input,
            self.numeric,
        )
    }
}

/// Completion handle given to asynchronous predicates.
///
/// Consuming `resolve`/`reject` makes completing twice impossible through the
/// handle. A handle dropped without completing leaves its run pending forever.
pub struct Done {
    coordinator: AsyncCoordinator,
    token: Token,
    completed: bool,
}

impl Done {
    pub(crate) fn new(coordinator: AsyncCoordinator, token: Token) -> Self {
        Self {
            coordinator,
            token,
            completed: false,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Report the check outcome.
    pub fn resolve(mut self, passed: bool) -> Result<(), CoordinatorError> {
        self.completed = true;
        self.coordinator.resolve(self.token, Verdict::from(passed))
    }

    /// Report failure with a message that replaces the rendered one.
    pub fn reject(mut self, message: impl Into<String>) -> Result<(), CoordinatorError> {
        self.completed = true;
        self.coordinator
            .resolve(self.token, Verdict::FailWith(message.into()))
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if !self.completed {
            tracing::warn!(token = %self.token, "async check dropped without resolving");
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("token", &self.token)
            .field("completed", &self.completed)
            .finish()
    }
}

pub type SyncHandler = Arc<dyn Fn(&RuleContext<'_>) -> bool + Send + Sync>;
pub type AsyncHandler = Arc<dyn Fn(&RuleContext<'_>, Done) + Send + Sync>;

/// A predicate: returns its verdict directly, or completes through [`Done`].
#[derive(Clone)]
pub enum Predicate {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

/// Trait for async rules driven by a future.
///
/// Registered with [`RuleRegistry::register_async_rule`]; each check is
/// spawned on the ambient tokio runtime.
///
/// ## Example
///
/// ```rust,ignore
/// struct UniqueUsername { db: Arc<Db> }
///
/// #[async_trait]
/// impl AsyncRule for UniqueUsername {
///     async fn passes(&self, input: RuleInput) -> bool {
///         let name = input.value.as_ref().and_then(|v| v.as_str()).unwrap_or_default();
///         !self.db.username_exists(name).await
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncRule: Send + Sync {
    async fn passes(&self, input: RuleInput) -> bool;
}

/// Registration metadata for one rule.
#[derive(Clone)]
pub struct RuleDescriptor {
    implicit: bool,
    predicate: Predicate,
    message: Option<String>,
}

impl RuleDescriptor {
    pub fn new(predicate: Predicate, implicit: bool) -> Self {
        Self {
            implicit,
            predicate,
            message: None,
        }
    }

    /// Implicit rules run even when the value is absent or empty.
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn is_async(&self) -> bool {
        matches!(self.predicate, Predicate::Async(_))
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Message template supplied at registration.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("implicit", &self.implicit)
            .field("async", &self.is_async())
            .field("message", &self.message)
            .finish()
    }
}

/// Rule name → descriptor.
///
/// ## Example
///
/// ```rust
/// use rulebook_validate::RuleRegistry;
///
/// let mut registry = RuleRegistry::with_builtin_rules();
/// registry
///     .register("even", |ctx| ctx.value().and_then(|v| v.as_i64()).is_some_and(|n| n % 2 == 0))
///     .message("even", "The :attribute must be even.");
///
/// assert!(registry.contains("even"));
/// assert!(!registry.is_async("even"));
/// ```
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, RuleDescriptor>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in rule catalog.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        crate::rules::register_builtin(&mut registry);
        registry
    }

    /// Register a synchronous rule.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.insert(name, RuleDescriptor::new(Predicate::Sync(Arc::new(handler)), false))
    }

    /// Register a synchronous rule that runs even on absent or empty values.
    pub fn register_implicit<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.insert(name, RuleDescriptor::new(Predicate::Sync(Arc::new(handler)), true))
    }

    /// Register a callback-style asynchronous rule.
    ///
    /// The handler must complete its [`Done`] exactly once, now or later.
    pub fn register_async<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&RuleContext<'_>, Done) + Send + Sync + 'static,
    {
        self.insert(name, RuleDescriptor::new(Predicate::Async(Arc::new(handler)), false))
    }

    /// Register a future-driven asynchronous rule.
    ///
    /// Checks are spawned on the current tokio runtime. Without a runtime the
    /// check fails with an explanatory message.
    pub fn register_async_rule<R>(&mut self, name: impl Into<String>, rule: R) -> &mut Self
    where
        R: AsyncRule + 'static,
    {
        let rule = Arc::new(rule);
        self.register_async(name, move |ctx, done| {
            let input = ctx.to_input();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let rule = Arc::clone(&rule);
                    handle.spawn(async move {
                        let passed = rule.passes(input).await;
                        if let Err(e) = done.resolve(passed) {
                            tracing::warn!(error = %e, "async rule resolution rejected");
                        }
                    });
                }
                Err(_) => {
                    tracing::error!(attribute = %input.attribute, "async rule dispatched without a tokio runtime");
                    let message = format!("The {} could not be checked.", input.attribute);
                    if let Err(e) = done.reject(message) {
                        tracing::warn!(error = %e, "async rule resolution rejected");
                    }
                }
            }
        })
    }

    /// Attach a default message template to a registered rule.
    pub fn message(&mut self, name: &str, template: impl Into<String>) -> &mut Self {
        if let Some(descriptor) = self.rules.get_mut(name) {
            descriptor.message = Some(template.into());
        }
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: RuleDescriptor) -> &mut Self {
        self.rules.insert(name.into(), descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RuleDescriptor> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn is_async(&self, name: &str) -> bool {
        self.rules.get(name).is_some_and(RuleDescriptor::is_async)
    }

    pub fn is_implicit(&self, name: &str) -> bool {
        self.rules.get(name).is_some_and(RuleDescriptor::is_implicit)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("RuleRegistry").field("rules", &names).finish()
    }
}
