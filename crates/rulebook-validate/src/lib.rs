//! # Rulebook Validation
//!
//! Declarative validation of nested JSON input against per-attribute rule
//! strings, with wildcard paths over arrays and callback-style async rules.
//!
//! ## Example
//!
//! ```rust
//! use rulebook_validate::prelude::*;
//! use serde_json::json;
//!
//! let input = json!({
//!     "name": "Ada",
//!     "email": "not-an-email",
//!     "items": [{ "qty": 0 }, { "qty": 5 }]
//! });
//!
//! let mut validator = Validator::new(
//!     input,
//!     json!({
//!         "name": "required|min:3",
//!         "email": "required|email",
//!         "items.*.qty": "integer|min:1"
//!     }),
//!     [("email.email", "Please give a valid :attribute.")],
//! );
//!
//! assert!(validator.fails().unwrap());
//! assert_eq!(validator.errors().first("email"), Some("Please give a valid email."));
//! assert_eq!(validator.errors().first("items.0.qty"), Some("The items.0.qty must be at least 1."));
//! assert!(!validator.errors().has("items.1.qty"));
//! ```
//!
//! ## Rule Syntax
//!
//! - pipe-delimited strings: `"required|between:3,10"`
//! - sequences of tokens and single-key maps: `["required", {"min": 3}]`
//! - pre-built [`RuleSpec`] lists
//!
//! A `*` path segment expands over every index of the addressed array, and
//! `*` in rule parameters and custom message keys is bound to the same index.
//!
//! ## Async Rules
//!
//! Rules registered with [`RuleRegistry::register_async`] complete through a
//! [`Done`] handle. Rule sets containing them must be run with
//! [`Validator::check_async`] or [`Validator::validate_async`].
//!
//! ## Error Format
//!
//! [`ValidationErrors`] serializes as a map of attribute to messages:
//!
//! ```json
//! { "email": ["Please give a valid email."], "items.0.qty": ["The items.0.qty must be at least 1."] }
//! ```

pub mod config;
pub mod coordinator;
mod engine;
mod error;
pub mod messages;
pub mod normalize;
pub mod path;
pub mod registry;
pub mod rule;
pub mod rules;

pub use config::{AttributeFormatter, StopOnError, ValidatorConfig, ValidatorConfigBuilder};
pub use coordinator::{AsyncCoordinator, CheckRef, Phase, RunOutcome, Token, Verdict};
pub use engine::Validator;
pub use error::{CoordinatorError, Error, FieldError, Result, ValidationErrors};
pub use messages::{CustomMessages, Lang, Template};
pub use registry::{
    AsyncRule, Done, Predicate, RuleContext, RuleDescriptor, RuleInput, RuleRegistry, ValueKind,
};
pub use rule::{CanonicalRuleMap, RuleSet, RuleSource, RuleSpec};

/// Prelude module for validation
pub mod prelude {
    pub use crate::config::{StopOnError, ValidatorConfig};
    pub use crate::engine::Validator;
    pub use crate::error::{Error, FieldError, ValidationErrors};
    pub use crate::messages::{CustomMessages, Lang};
    pub use crate::registry::{AsyncRule, Done, RuleContext, RuleInput, RuleRegistry};
    pub use crate::rule::{RuleSet, RuleSpec};
}
