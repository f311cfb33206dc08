//! # Combinators
//!
//! Build larger actions from smaller ones. Every combinator is itself an action,
//! so compositions nest freely.

use std::borrow::Cow;
use std::fmt;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Action, ActionContext, ActionError, BoxAction, BoxPredicate, ControlResult, Predicate};

/// Runs actions in order, stopping at the first non-`Continue` result
///
/// An empty sequence continues. The name only labels log lines.
pub struct Sequence<S> {
    name: Cow<'static, str>,
    steps: Vec<BoxAction<S>>,
}

impl<S: Send + 'static> Sequence<S> {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, action: impl Action<S> + 'static) -> Self {
        self.steps.push(action.boxed());
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<S> fmt::Debug for Sequence<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

#[async_trait]
impl<S: Send + 'static> Action<S> for Sequence<S> {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        for step in &self.steps {
            if ctx.is_cancelled() {
                warn!(
                    parent: ctx.span(),
                    pipeline = %self.name,
                    action = %step.name(),
                    "Pipeline cancelled before action"
                );
                return ControlResult::Fail(ActionError::Cancelled);
            }

            debug!(parent: ctx.span(), pipeline = %self.name, action = %step.name(), "Running action");
            let result = step.run(ctx, state).await;
            if !result.is_continue() {
                debug!(
                    parent: ctx.span(),
                    pipeline = %self.name,
                    action = %step.name(),
                    result = %result,
                    "Pipeline stopped"
                );
                return result;
            }
        }
        ControlResult::Continue
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

/// Runs `then` when the predicate holds, otherwise continues
pub struct If<S> {
    predicate: BoxPredicate<S>,
    then: BoxAction<S>,
}

impl<S: Send + 'static> If<S> {
    pub fn new(predicate: impl Predicate<S> + 'static, then: impl Action<S> + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            then: then.boxed(),
        }
    }
}

impl<S> fmt::Debug for If<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("If").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Send + 'static> Action<S> for If<S> {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        if self.predicate.test(ctx, state) {
            self.then.run(ctx, state).await
        } else {
            ControlResult::Continue
        }
    }
}

/// Runs exactly one of two branches, picked by one predicate evaluation
pub struct IfElse<S> {
    predicate: BoxPredicate<S>,
    then: BoxAction<S>,
    otherwise: BoxAction<S>,
}

impl<S: Send + 'static> IfElse<S> {
    pub fn new(
        predicate: impl Predicate<S> + 'static,
        then: impl Action<S> + 'static,
        otherwise: impl Action<S> + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            then: then.boxed(),
            otherwise: otherwise.boxed(),
        }
    }
}

impl<S> fmt::Debug for IfElse<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IfElse").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Send + 'static> Action<S> for IfElse<S> {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        if self.predicate.test(ctx, state) {
            self.then.run(ctx, state).await
        } else {
            self.otherwise.run(ctx, state).await
        }
    }
}

/// Runs the action of the first matching case, or the default
///
/// Cases are tested in declared order and at most one action runs. Without a
/// default and without a match the switch continues.
pub struct Switch<S> {
    cases: Vec<(BoxPredicate<S>, BoxAction<S>)>,
    default: Option<BoxAction<S>>,
}

impl<S: Send + 'static> Switch<S> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            default: None,
        }
    }

    pub fn case(mut self, predicate: impl Predicate<S> + 'static, action: impl Action<S> + 'static) -> Self {
        self.cases.push((Box::new(predicate), action.boxed()));
        self
    }

    /// Action run when no case matches
    pub fn otherwise(mut self, action: impl Action<S> + 'static) -> Self {
        self.default = Some(action.boxed());
        self
    }
}

impl<S: Send + 'static> Default for Switch<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Switch<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Switch")
            .field("cases", &self.cases.len())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

#[async_trait]
impl<S: Send + 'static> Action<S> for Switch<S> {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        let matched = self
            .cases
            .iter()
            .find(|(predicate, _)| predicate.test(ctx, state))
            .map(|(_, action)| action)
            .or(self.default.as_ref());

        match matched {
            Some(action) => action.run(ctx, state).await,
            None => ControlResult::Continue,
        }
    }
}
