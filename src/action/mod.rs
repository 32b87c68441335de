//! Composable, retryable units of asynchronous work.
//!
//! An [`Action`] wraps callback-style work that eventually reports an
//! `anyhow::Result<ActionValue>`. Actions compose synchronously:
//!
//! - [`Action::fallback_to`]: run `self`; if it fails, run the fallback at the next attempt
//! - [`Action::retry`]: chain `n` fallbacks of the same work (`n + 1` attempts in total)
//!
//! and execute asynchronously: the work may complete on any thread, and the combinator calls
//! the final completion exactly once with an attempt-annotated result. Success values are
//! tagged with the attempt at which they were produced ([`ActionValue::attempt_count`]);
//! failures carry the attempt of the last try ([`ActionError::attempt`]).
//!
//! There is no timeout and no cancellation: once started, a chain runs until it succeeds or
//! exhausts its fallbacks.
//!
//! # Usage Example
//!
//! ```ignore
//! use unloader::action::{Action, ActionValue};
//!
//! let fetch = Action::new(|done| {
//!     // start a request, then:
//!     done(Ok(ActionValue::new("payload")));
//! });
//!
//! fetch.retry(2).call(|result| match result {
//!     Ok(value) => println!("succeeded on attempt {:?}", value.attempt_count()),
//!     Err(error) => println!("gave up after attempt {}", error.attempt()),
//! });
//! ```

pub mod value;

pub use value::{ActionValue, Payload, Placeholder, UnwrapError};

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Attempt number of a freshly built action.
pub const DEFAULT_ATTEMPT: u32 = 0;

/// Final result handed to an action's completion.
pub type ActionResult = Result<ActionValue, ActionError>;

/// Callback given to an action's work; call it exactly once with the outcome.
pub type Completion = Box<dyn FnOnce(anyhow::Result<ActionValue>) + Send + 'static>;

type ResultCallback = Box<dyn FnOnce(ActionResult) + Send + 'static>;

/// Executes the work starting at the given attempt number.
type Runner = Arc<dyn Fn(u32, ResultCallback) + Send + Sync + 'static>;

/// Failure of an action, annotated with the attempt that produced it.
///
/// When a retry chain is exhausted this is the error of the *last* attempt.
#[derive(Error, Debug)]
#[error("attempt {attempt} failed: {error}")]
pub struct ActionError {
    attempt: u32,
    error: anyhow::Error,
}

impl ActionError {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }
}

/// A unit of asynchronous work with a result callback, composable with retries and fallbacks.
///
/// Cloning an action is cheap and keeps its [`id`](Self::id); every composition produces a new
/// action with a fresh id.
#[derive(Clone)]
pub struct Action {
    id: Uuid,
    current_attempt: u32,
    runner: Runner,
}

impl Action {
    /// Build an action from callback-style work.
    ///
    /// The work receives a [`Completion`] and must eventually call it once.
    pub fn new<F>(work: F) -> Self
    where
        F: Fn(Completion) + Send + Sync + 'static,
    {
        Self::with_attempt(DEFAULT_ATTEMPT, work)
    }

    /// Build an action whose first run counts as attempt `attempt`.
    pub fn with_attempt<F>(attempt: u32, work: F) -> Self
    where
        F: Fn(Completion) + Send + Sync + 'static,
    {
        let runner: Runner = Arc::new(move |attempt: u32, done: ResultCallback| {
            work(Box::new(move |outcome: anyhow::Result<ActionValue>| {
                let result = match outcome {
                    Ok(value) => Ok(value.annotate(attempt)),
                    Err(error) => Err(ActionError { attempt, error }),
                };
                done(result);
            }));
        });

        Self {
            id: Uuid::new_v4(),
            current_attempt: attempt,
            runner,
        }
    }

    /// Build an action from a side effect that always succeeds with a [`Placeholder`].
    pub fn from_fn<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(move |done| {
            effect();
            done(Ok(ActionValue::placeholder()));
        })
    }

    /// Build an action from an async closure; each attempt is spawned on the ambient tokio
    /// runtime.
    ///
    /// Outside a runtime every attempt fails immediately.
    pub fn from_async<F, Fut>(work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ActionValue>> + Send + 'static,
    {
        Self::new(move |done| match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let attempt = work();
                handle.spawn(async move {
                    done(attempt.await);
                });
            }
            Err(e) => done(Err(anyhow::anyhow!("no tokio runtime to run the action on: {}", e))),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Run `self`; on failure run `fallback` at the failed attempt's number plus one.
    ///
    /// Successes are returned as-is and never trigger the fallback.
    pub fn fallback_to(&self, fallback: &Action) -> Action {
        let primary = Arc::clone(&self.runner);
        let fallback = Arc::clone(&fallback.runner);

        let runner: Runner = Arc::new(move |attempt: u32, done: ResultCallback| {
            let fallback = Arc::clone(&fallback);
            primary(
                attempt,
                Box::new(move |result: ActionResult| match result {
                    Ok(value) => done(Ok(value)),
                    Err(failure) => {
                        let next = failure.attempt.saturating_add(1);
                        tracing::debug!(
                            "Attempt {} failed ({}), falling back to attempt {}",
                            failure.attempt,
                            failure.error,
                            next
                        );
                        fallback(next, done);
                    }
                }),
            );
        });

        Action {
            id: Uuid::new_v4(),
            current_attempt: self.current_attempt,
            runner,
        }
    }

    /// Retry this action up to `retries` more times after a failure.
    ///
    /// Behaves like the chain `self.fallback_to(&self.fallback_to(...))` with `retries`
    /// fallbacks: an always-failing action runs exactly `retries + 1` times, each retry one
    /// attempt after the failure before it. Attempts that complete synchronously are driven by
    /// a loop, so the chain length does not grow the stack.
    pub fn retry(&self, retries: u32) -> Action {
        let work = Arc::clone(&self.runner);

        let runner: Runner = Arc::new(move |attempt: u32, done: ResultCallback| {
            let retry = Arc::new(RetryLoop {
                work: Arc::clone(&work),
                done: Mutex::new(Some(done)),
            });
            retry.drive(attempt, retries);
        });

        Action {
            id: Uuid::new_v4(),
            current_attempt: self.current_attempt,
            runner,
        }
    }

    /// Start the action; `completion` receives the attempt-annotated result.
    pub fn call<F>(&self, completion: F)
    where
        F: FnOnce(ActionResult) + Send + 'static,
    {
        (self.runner)(self.current_attempt, Box::new(completion));
    }

    /// Start the action and wait for its result.
    pub async fn run(&self) -> ActionResult {
        let (tx, rx) = oneshot::channel();
        self.call(move |result| {
            // Receiver dropped means the caller stopped waiting
            let _ = tx.send(result);
        });

        rx.await.unwrap_or_else(|_| {
            Err(ActionError {
                attempt: self.current_attempt,
                error: anyhow::anyhow!("action finished without reporting a result"),
            })
        })
    }

    /// Start the action and ignore its result.
    pub fn fire(&self) {
        self.call(|_| {});
    }
}

/// Progress of one attempt inside a [`RetryLoop`].
enum Step {
    Running,
    Completed(ActionResult),
    /// The driving loop returned; the completion continues the loop itself.
    Detached,
}

/// Runs the same work until it succeeds or the retries run out.
struct RetryLoop {
    work: Runner,
    done: Mutex<Option<ResultCallback>>,
}

impl RetryLoop {
    fn drive(self: Arc<Self>, mut attempt: u32, mut remaining: u32) {
        loop {
            let step = Arc::new(Mutex::new(Step::Running));

            let sink = Arc::clone(&step);
            let retry = Arc::clone(&self);
            (self.work)(
                attempt,
                Box::new(move |result: ActionResult| {
                    let mut step = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Step::Running = *step {
                        *step = Step::Completed(result);
                        return;
                    }
                    drop(step);
                    if let Some((next, left)) = retry.settle(result, remaining) {
                        retry.drive(next, left);
                    }
                }),
            );

            let outcome = std::mem::replace(
                &mut *step.lock().unwrap_or_else(PoisonError::into_inner),
                Step::Detached,
            );
            let Step::Completed(result) = outcome else {
                return;
            };
            match self.settle(result, remaining) {
                Some((next, left)) => {
                    attempt = next;
                    remaining = left;
                }
                None => return,
            }
        }
    }

    /// Finish with `result`, or return the next attempt and the retries left after it.
    fn settle(&self, result: ActionResult, remaining: u32) -> Option<(u32, u32)> {
        match result {
            Err(failure) if remaining > 0 => {
                let next = failure.attempt.saturating_add(1);
                tracing::debug!(
                    "Attempt {} failed ({}), retrying as attempt {}",
                    failure.attempt,
                    failure.error,
                    next
                );
                Some((next, remaining - 1))
            }
            result => {
                let done = self
                    .done
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(done) = done {
                    done(result);
                }
                None
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("current_attempt", &self.current_attempt)
            .finish_non_exhaustive()
    }
}
