//! Error types and the failure collector.

use crate::coordinator::Token;
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Errors raised to the caller of the engine.
///
/// Validation failures are not errors: they accumulate in [`ValidationErrors`].
#[derive(Debug, Error)]
pub enum Error {
    /// A synchronous entry point was used against a rule set that contains
    /// asynchronous rules.
    #[error("rule set contains asynchronous rules; use check_async or validate_async")]
    AsyncRulesRequireCallback,

    /// The async coordinator was driven out of protocol.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// Every completion handle of an async run was dropped before resolving.
    #[error("async validation run was abandoned before all checks resolved")]
    RunAbandoned,

    /// A process-wide default configuration was installed twice.
    #[error("a default validator configuration is already installed")]
    ConfigAlreadyInstalled,

    /// A message catalog could not be parsed.
    #[error("invalid message catalog: {0}")]
    InvalidLang(#[from] serde_json::Error),
}

/// Protocol violations reported by [`AsyncCoordinator`](crate::AsyncCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("unknown async check token {0}")]
    UnknownToken(Token),

    #[error("async check token {0} was already resolved")]
    AlreadyResolved(Token),

    #[error("cannot register async checks after dispatch is complete")]
    RegisterAfterDispatch,

    #[error("dispatch was already marked complete")]
    DispatchAlreadyComplete,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct FieldError {
    /// The attribute path that failed validation
    pub field: String,
    /// The rule name that produced the failure (e.g., "required", "min")
    pub code: String,
    /// Rendered, human-readable message
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Append-only collection of failures for one validation run.
///
/// Records keep the order in which they were produced. Serializes as a map of
/// attribute path to messages:
///
/// ```json
/// { "name": ["The name field is required."], "age": ["The age must be at least 18."] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    records: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.records.push(FieldError::new(field, code, message));
    }

    pub fn push(&mut self, error: FieldError) {
        self.records.push(error);
    }

    /// All messages recorded for `field`, in production order.
    pub fn get(&self, field: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// The first message recorded for `field`.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Check whether `field` has at least one failure.
    pub fn has(&self, field: &str) -> bool {
        self.records.iter().any(|e| e.field == field)
    }

    /// Messages grouped by attribute, attributes in order of first failure.
    pub fn all(&self) -> IndexMap<&str, Vec<&str>> {
        let mut grouped: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for error in &self.records {
            grouped
                .entry(error.field.as_str())
                .or_default()
                .push(error.message.as_str());
        }
        grouped
    }

    /// Records in production order.
    pub fn records(&self) -> &[FieldError] {
        &self.records
    }

    /// Total number of failures.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get all field names with errors, in order of first failure.
    pub fn field_names(&self) -> Vec<&str> {
        self.all().into_keys().collect()
    }

    /// Convert to Result - Ok if no errors, Err otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Extend<FieldError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.all())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {} error(s)", self.len())
    }
}

impl std::error::Error for ValidationErrors {}
