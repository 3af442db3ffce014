//! Validator configuration.
//!
//! A [`ValidatorConfig`] is immutable once built and cheap to clone. One
//! default may be installed for the whole process, once, at startup;
//! validators built with [`Validator::new`](crate::Validator::new) pick it up.

use crate::error::{Error, Result};
use crate::messages::{default_attribute_formatter, Lang};
use crate::registry::RuleRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Maps an attribute name to its display form.
pub type AttributeFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

static INSTALLED: OnceLock<ValidatorConfig> = OnceLock::new();
static BUILTIN: OnceLock<ValidatorConfig> = OnceLock::new();

/// Short-circuit policy: stop checking an attribute after its first failure.
///
/// Deserializes from `true`/`false` or a list of attribute paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopOnError {
    /// Applies to every attribute, or to none
    Flag(bool),
    /// Applies to the listed attributes only
    Attributes(Vec<String>),
}

impl StopOnError {
    pub fn applies_to(&self, attribute: &str) -> bool {
        match self {
            StopOnError::Flag(enabled) => *enabled,
            StopOnError::Attributes(attributes) => attributes.iter().any(|a| a == attribute),
        }
    }
}

impl Default for StopOnError {
    fn default() -> Self {
        StopOnError::Flag(false)
    }
}

impl From<bool> for StopOnError {
    fn from(enabled: bool) -> Self {
        StopOnError::Flag(enabled)
    }
}

impl From<Vec<String>> for StopOnError {
    fn from(attributes: Vec<String>) -> Self {
        StopOnError::Attributes(attributes)
    }
}

impl From<Vec<&str>> for StopOnError {
    fn from(attributes: Vec<&str>) -> Self {
        StopOnError::Attributes(attributes.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StopOnError {
    fn from(attributes: [&str; N]) -> Self {
        StopOnError::Attributes(attributes.into_iter().map(str::to_string).collect())
    }
}

/// Shared settings for validators.
///
/// ## Example
///
/// ```rust
/// use rulebook_validate::{Lang, RuleRegistry, ValidatorConfig};
///
/// let mut registry = RuleRegistry::with_builtin_rules();
/// registry.register("even", |ctx| ctx.value().and_then(|v| v.as_i64()).is_some_and(|n| n % 2 == 0));
///
/// let config = ValidatorConfig::builder()
///     .registry(registry)
///     .lang(Lang::english())
///     .stop_on_error(true)
///     .build();
///
/// assert!(config.registry().contains("even"));
/// ```
#[derive(Clone)]
pub struct ValidatorConfig {
    registry: Arc<RuleRegistry>,
    lang: Arc<Lang>,
    formatter: AttributeFormatter,
    stop_on_error: StopOnError,
}

impl ValidatorConfig {
    /// Create a builder starting from the built-in rules and English messages.
    pub fn builder() -> ValidatorConfigBuilder {
        ValidatorConfigBuilder::new()
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn lang(&self) -> &Arc<Lang> {
        &self.lang
    }

    pub fn attribute_formatter(&self) -> &AttributeFormatter {
        &self.formatter
    }

    pub fn stop_on_error(&self) -> &StopOnError {
        &self.stop_on_error
    }

    /// Install this configuration as the process-wide default.
    ///
    /// Succeeds once; later calls return [`Error::ConfigAlreadyInstalled`].
    pub fn install(self) -> Result<()> {
        INSTALLED
            .set(self)
            .map_err(|_| Error::ConfigAlreadyInstalled)?;
        tracing::debug!("default validator configuration installed");
        Ok(())
    }

    /// The installed default, or the built-in one when none was installed.
    pub fn current() -> &'static ValidatorConfig {
        INSTALLED
            .get()
            .unwrap_or_else(|| BUILTIN.get_or_init(ValidatorConfig::default))
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfigBuilder::new().build()
    }
}

impl fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("registry", &self.registry)
            .field("lang_attributes", &self.lang.attributes.len())
            .field("stop_on_error", &self.stop_on_error)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ValidatorConfig`].
#[derive(Default)]
pub struct ValidatorConfigBuilder {
    registry: Option<Arc<RuleRegistry>>,
    lang: Option<Arc<Lang>>,
    formatter: Option<AttributeFormatter>,
    stop_on_error: StopOnError,
}

impl ValidatorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule registry.
    pub fn registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Set the rule registry from an Arc.
    pub fn registry_arc(mut self, registry: Arc<RuleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the message catalog.
    pub fn lang(mut self, lang: Lang) -> Self {
        self.lang = Some(Arc::new(lang));
        self
    }

    /// Set the message catalog from an Arc.
    pub fn lang_arc(mut self, lang: Arc<Lang>) -> Self {
        self.lang = Some(lang);
        self
    }

    /// Set the default attribute formatter.
    pub fn attribute_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Set the default short-circuit policy.
    pub fn stop_on_error(mut self, policy: impl Into<StopOnError>) -> Self {
        self.stop_on_error = policy.into();
        self
    }

    pub fn build(self) -> ValidatorConfig {
        ValidatorConfig {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(RuleRegistry::with_builtin_rules())),
            lang: self.lang.unwrap_or_else(|| Arc::new(Lang::english())),
            formatter: self
                .formatter
                .unwrap_or_else(|| Arc::new(default_attribute_formatter)),
            stop_on_error: self.stop_on_error,
        }
    }
}
