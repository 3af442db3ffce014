//! Counting barrier for asynchronous rule checks.
//!
//! One coordinator lives for one async validation run. Checks are registered
//! while the engine dispatches rules, resolved in any order (including from
//! inside their own invocation), and the completion callback fires exactly
//! once: after dispatch is marked complete and every registered check has
//! resolved, whichever happens last.
//!
//! # States
//!
//! - **Dispatching**: checks may be registered and resolved
//! - **DispatchComplete**: no more registrations; waiting for pending checks
//! - **Fired**: the completion callback has run; no further transitions
//!
//! The run state is dropped once the coordinator and every outstanding
//! [`Done`](crate::Done) handle are gone.

use crate::error::{CoordinatorError, FieldError, ValidationErrors};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifies one registered check. Issued monotonically per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The rule a token stands for, with the message recorded if it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRef {
    pub attribute: String,
    pub rule: String,
    pub message: String,
}

impl CheckRef {
    pub fn new(
        attribute: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Outcome reported for one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// Failed, replacing the rendered message
    FailWith(String),
}

impl From<bool> for Verdict {
    fn from(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Coordinator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatching,
    DispatchComplete,
    Fired,
}

/// What the completion callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// True iff no check failed
    pub passed: bool,
    /// Failed checks in resolution order
    pub failures: Vec<CheckRef>,
}

impl RunOutcome {
    /// Convert the failures into a failure collector.
    pub fn into_errors(self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.extend(
            self.failures
                .into_iter()
                .map(|check| FieldError::new(check.attribute, check.rule, check.message)),
        );
        errors
    }
}

type CompletionCallback = Box<dyn FnOnce(RunOutcome) + Send>;

struct RunState {
    pending: HashMap<Token, CheckRef>,
    next_token: u64,
    resolved: usize,
    phase: Phase,
    all_passed: bool,
    failures: Vec<CheckRef>,
    on_complete: Option<CompletionCallback>,
}

impl RunState {
    /// Moves to `Fired` and hands out the callback if the barrier is open.
    fn take_if_ready(&mut self) -> Option<(CompletionCallback, RunOutcome)> {
        if self.phase != Phase::DispatchComplete || !self.pending.is_empty() {
            return None;
        }
        self.phase = Phase::Fired;
        let callback = self.on_complete.take()?;
        let outcome = RunOutcome {
            passed: self.all_passed,
            failures: std::mem::take(&mut self.failures),
        };
        Some((callback, outcome))
    }
}

/// Counting barrier over a dynamically growing set of async checks.
///
/// Cloning shares the same run. Callbacks are always invoked with the internal
/// lock released, so a check may resolve from inside its own dispatch.
///
/// ## Example
///
/// ```rust
/// use rulebook_validate::{AsyncCoordinator, CheckRef, Verdict};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
/// let coordinator = AsyncCoordinator::new(move |outcome| {
///     assert!(!outcome.passed);
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// let token = coordinator.register(CheckRef::new("email", "unique", "taken")).unwrap();
/// coordinator.mark_dispatch_complete().unwrap();
/// assert_eq!(fired.load(Ordering::SeqCst), 0);
///
/// coordinator.resolve(token, Verdict::Fail).unwrap();
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct AsyncCoordinator {
    state: Arc<Mutex<RunState>>,
}

impl AsyncCoordinator {
    /// Create a coordinator for a fresh run.
    pub fn new<F>(on_complete: F) -> Self
    where
        F: FnOnce(RunOutcome) + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(RunState {
                pending: HashMap::new(),
                next_token: 0,
                resolved: 0,
                phase: Phase::Dispatching,
                all_passed: true,
                failures: Vec::new(),
                on_complete: Some(Box::new(on_complete)),
            })),
        }
    }

    /// Register a dispatched check and get its token.
    pub fn register(&self, check: CheckRef) -> Result<Token, CoordinatorError> {
        let mut state = self.state.lock();
        if state.phase != Phase::Dispatching {
            tracing::warn!(attribute = %check.attribute, rule = %check.rule, "async check registered after dispatch");
            return Err(CoordinatorError::RegisterAfterDispatch);
        }
        let token = Token(state.next_token);
        state.next_token += 1;
        tracing::trace!(%token, attribute = %check.attribute, rule = %check.rule, "async check registered");
        state.pending.insert(token, check);
        Ok(token)
    }

    /// Resolve a pending check.
    ///
    /// Resolving an unknown or already-resolved token is a protocol violation
    /// and leaves the run untouched.
    pub fn resolve(&self, token: Token, verdict: Verdict) -> Result<(), CoordinatorError> {
        let ready = {
            let mut state = self.state.lock();
            let Some(mut check) = state.pending.remove(&token) else {
                let err = if token.0 < state.next_token {
                    CoordinatorError::AlreadyResolved(token)
                } else {
                    CoordinatorError::UnknownToken(token)
                };
                tracing::warn!(%token, error = %err, "async coordinator protocol violation");
                return Err(err);
            };
            state.resolved += 1;
            tracing::trace!(%token, ?verdict, pending = state.pending.len(), "async check resolved");

            match verdict {
                Verdict::Pass => {}
                Verdict::Fail => {
                    state.all_passed = false;
                    state.failures.push(check);
                }
                Verdict::FailWith(message) => {
                    check.message = message;
                    state.all_passed = false;
                    state.failures.push(check);
                }
            }
            state.take_if_ready()
        };

        if let Some((callback, outcome)) = ready {
            tracing::debug!(passed = outcome.passed, failures = outcome.failures.len(), "async validation run complete");
            callback(outcome);
        }
        Ok(())
    }

    /// Mark dispatch finished. Fires immediately when nothing is pending.
    pub fn mark_dispatch_complete(&self) -> Result<(), CoordinatorError> {
        let ready = {
            let mut state = self.state.lock();
            if state.phase != Phase::Dispatching {
                tracing::warn!("async dispatch marked complete twice");
                return Err(CoordinatorError::DispatchAlreadyComplete);
            }
            state.phase = Phase::DispatchComplete;
            tracing::trace!(pending = state.pending.len(), "async dispatch complete");
            state.take_if_ready()
        };

        if let Some((callback, outcome)) = ready {
            tracing::debug!(passed = outcome.passed, failures = outcome.failures.len(), "async validation run complete");
            callback(outcome);
        }
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Number of registered checks not yet resolved.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of checks resolved so far.
    pub fn resolved(&self) -> usize {
        self.state.lock().resolved
    }
}

impl fmt::Debug for AsyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AsyncCoordinator")
            .field("phase", &state.phase)
            .field("pending", &state.pending.len())
            .field("resolved", &state.resolved)
            .field("all_passed", &state.all_passed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (AsyncCoordinator, Arc<AtomicUsize>, Arc<Mutex<Option<RunOutcome>>>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));
        let (f, s) = (Arc::clone(&fired), Arc::clone(&seen));
        let coordinator = AsyncCoordinator::new(move |outcome| {
            f.fetch_add(1, Ordering::SeqCst);
            *s.lock() = Some(outcome);
        });
        (coordinator, fired, seen)
    }

    fn check(attribute: &str) -> CheckRef {
        CheckRef::new(attribute, "rule", format!("{attribute} failed"))
    }

    #[test]
    fn fires_immediately_when_nothing_pending() {
        let (coordinator, fired, seen) = counting();
        coordinator.mark_dispatch_complete().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.phase(), Phase::Fired);
        assert!(seen.lock().as_ref().unwrap().passed);
    }

    #[test]
    fn waits_for_last_resolution_after_dispatch() {
        let (coordinator, fired, seen) = counting();
        let a = coordinator.register(check("a")).unwrap();
        let b = coordinator.register(check("b")).unwrap();
        coordinator.mark_dispatch_complete().unwrap();

        coordinator.resolve(b, Verdict::Fail).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.phase(), Phase::DispatchComplete);

        coordinator.resolve(a, Verdict::Pass).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let outcome = seen.lock().take().unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.failures, vec![check("b")]);
    }

    #[test]
    fn does_not_fire_before_dispatch_complete() {
        let (coordinator, fired, _) = counting();
        let a = coordinator.register(check("a")).unwrap();
        coordinator.resolve(a, Verdict::Pass).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.pending(), 0);
        assert_eq!(coordinator.resolved(), 1);

        coordinator.mark_dispatch_complete().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn double_resolve_is_reported() {
        let (coordinator, fired, _) = counting();
        let a = coordinator.register(check("a")).unwrap();
        let _b = coordinator.register(check("b")).unwrap();
        coordinator.resolve(a, Verdict::Pass).unwrap();

        assert_eq!(
            coordinator.resolve(a, Verdict::Pass),
            Err(CoordinatorError::AlreadyResolved(a))
        );
        assert_eq!(
            coordinator.resolve(Token::from_raw(99), Verdict::Pass),
            Err(CoordinatorError::UnknownToken(Token::from_raw(99)))
        );
        coordinator.mark_dispatch_complete().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.pending(), 1);
    }

    #[test]
    fn no_transitions_after_fired() {
        let (coordinator, fired, _) = counting();
        coordinator.mark_dispatch_complete().unwrap();

        assert_eq!(
            coordinator.mark_dispatch_complete(),
            Err(CoordinatorError::DispatchAlreadyComplete)
        );
        assert_eq!(
            coordinator.register(check("late")),
            Err(CoordinatorError::RegisterAfterDispatch)
        );
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_inside_callback_does_not_deadlock() {
        let inner = Arc::new(Mutex::new(None::<(AsyncCoordinator, Token)>));
        let handle = Arc::clone(&inner);
        let coordinator = AsyncCoordinator::new(move |outcome| {
            assert!(outcome.passed);
            // The lock is released: querying the run from the callback works.
            if let Some((c, _)) = handle.lock().as_ref() {
                assert_eq!(c.phase(), Phase::Fired);
            }
        });
        let token = coordinator.register(check("a")).unwrap();
        *inner.lock() = Some((coordinator.clone(), token));
        coordinator.mark_dispatch_complete().unwrap();
        coordinator.resolve(token, Verdict::Pass).unwrap();
    }

    #[test]
    fn fail_with_replaces_message() {
        let (coordinator, _, seen) = counting();
        let a = coordinator.register(check("a")).unwrap();
        coordinator
            .resolve(a, Verdict::FailWith("username is taken".into()))
            .unwrap();
        coordinator.mark_dispatch_complete().unwrap();

        let errors = seen.lock().take().unwrap().into_errors();
        assert_eq!(errors.first("a"), Some("username is taken"));
        assert_eq!(errors.records()[0].code, "rule");
    }
}
