//! Process-wide default configuration.
//!
//! Kept in its own test binary: installing a default is a one-time, global
//! step.

use rulebook_validate::prelude::*;
use serde_json::json;

#[test]
fn installed_default_is_used_and_cannot_be_replaced() {
    let mut registry = RuleRegistry::with_builtin_rules();
    registry
        .register("even", |ctx| {
            ctx.value()
                .and_then(|v| v.as_i64())
                .is_some_and(|n| n % 2 == 0)
        })
        .message("even", "The :attribute must be even.");

    ValidatorConfig::builder()
        .registry(registry)
        .stop_on_error(true)
        .build()
        .install()
        .unwrap();

    let mut validator = Validator::new(
        json!({ "n": 3 }),
        json!({ "n": "even|min:10" }),
        (),
    );
    assert!(validator.fails().unwrap());
    assert_eq!(validator.errors().get("n"), vec!["The n must be even."]);

    let again = ValidatorConfig::default().install();
    assert!(matches!(again, Err(Error::ConfigAlreadyInstalled)));
    assert!(ValidatorConfig::current().registry().contains("even"));
}
