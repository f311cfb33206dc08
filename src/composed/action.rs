//! # Actions and Predicates
//!
//! An action is one step of a reconciliation pipeline. It receives the invocation
//! context and the pipeline's typed state, and answers with a `ControlResult`.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, Span};

use super::ControlResult;
use crate::store::StoreError;

/// Per-invocation context passed to every action
///
/// Carries the caller's cancellation token and the span pipeline logs attach to.
/// Actions may annotate the context with a more specific span; the annotation
/// is seen by every action that runs after it.
#[derive(Debug, Clone)]
pub struct ActionContext {
    cancel: CancellationToken,
    span: Span,
}

impl ActionContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            span: Span::current(),
        }
    }

    /// Context that is never cancelled
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Replace the logging span for the rest of the invocation
    pub fn annotate(&mut self, span: Span) {
        self.span = span;
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a store call, aborting it when the invocation is cancelled
    pub async fn cancellable<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StoreError::Cancelled),
            res = fut => res,
        }
    }

    /// Log `err` at error level and return `result`
    pub fn log_error_and_return(
        &self,
        err: &dyn fmt::Display,
        message: &str,
        result: ControlResult,
    ) -> ControlResult {
        error!(parent: &self.span, error = %err, "{}", message);
        result
    }

    /// A failure retrying cannot fix: log it and stop without requeue
    pub fn logical_error(&self, err: &dyn fmt::Display, message: &str) -> ControlResult {
        self.log_error_and_return(err, message, ControlResult::StopAndForget)
    }
}

/// One step of a reconciliation pipeline
///
/// Actions must be safe to re-run against state left behind by a previous,
/// partially applied attempt.
#[async_trait]
pub trait Action<S: Send + 'static>: Send + Sync {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult;

    /// Name used in logs
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<Self>()))
    }

    fn boxed(self) -> BoxAction<S>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

pub type BoxAction<S> = Box<dyn Action<S>>;

#[async_trait]
impl<S: Send + 'static> Action<S> for BoxAction<S> {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        (**self).run(ctx, state).await
    }

    fn name(&self) -> Cow<'static, str> {
        (**self).name()
    }

    fn boxed(self) -> BoxAction<S>
    where
        Self: Sized + 'static,
    {
        self
    }
}

/// Side-effect free test over the context and state
pub trait Predicate<S>: Send + Sync {
    fn test(&self, ctx: &ActionContext, state: &S) -> bool;
}

impl<S, F> Predicate<S> for F
where
    F: Fn(&ActionContext, &S) -> bool + Send + Sync,
{
    fn test(&self, ctx: &ActionContext, state: &S) -> bool {
        self(ctx, state)
    }
}

pub type BoxPredicate<S> = Box<dyn Predicate<S>>;

/// Action built from a synchronous closure
pub struct FnAction<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> FnAction<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<S, F> Action<S> for FnAction<F>
where
    S: Send + 'static,
    F: Fn(&mut ActionContext, &mut S) -> ControlResult + Send + Sync,
{
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        (self.f)(ctx, state)
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

/// Does nothing and continues
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

#[async_trait]
impl<S: Send + 'static> Action<S> for Noop {
    async fn run(&self, _ctx: &mut ActionContext, _state: &mut S) -> ControlResult {
        ControlResult::Continue
    }
}

/// Ends the pipeline without requeue
#[derive(Debug, Clone, Copy, Default)]
pub struct StopAndForgetAction;

#[async_trait]
impl<S: Send + 'static> Action<S> for StopAndForgetAction {
    async fn run(&self, _ctx: &mut ActionContext, _state: &mut S) -> ControlResult {
        ControlResult::StopAndForget
    }
}

/// `a::b::Sequence<a::State>` -> `Sequence`
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
