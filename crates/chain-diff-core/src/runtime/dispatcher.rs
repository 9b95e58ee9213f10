// crates/chain-diff-core/src/runtime/dispatcher.rs
// ============================================================================
// Module: Chain Diff Dispatcher
// Description: Bounded-concurrency dual invocation with outcome reduction.
// Purpose: Run one comparison request against both targets and reconcile it.
// Dependencies: serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! The dispatcher admits comparison requests through a counting gate sized to
//! the configured concurrency, invokes the named operation on the reference
//! and candidate targets in parallel, and reduces both results to a single
//! pass or fail outcome.
//! Invariants:
//! - At most `concurrency` requests run at once; the rest wait on the gate.
//! - Only the candidate's arguments are converted; the call context is shared.
//! - A request cancelled while queued never reaches either target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::sync::oneshot;

use crate::core::args::Arg;
use crate::core::args::ConverterSet;
use crate::equivalence::Divergence;
use crate::equivalence::checks::ResultCheck;
use crate::equivalence::divergence;
use crate::events::ComparisonEvent;
use crate::events::EventSink;
use crate::interfaces::CallContext;
use crate::interfaces::Target;
use crate::interfaces::TargetError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of requests admitted at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// One unit of comparison work.
///
/// # Invariants
/// - Consumed by a single submission; never reused.
#[derive(Clone)]
pub struct ComparisonRequest {
    /// Remote operation name.
    method: String,
    /// Positional arguments, as the reference expects them.
    args: Vec<Arg>,
    /// Optional equivalence override.
    check: Option<ResultCheck>,
    /// Whether both targets are expected to reject the call.
    expect_error: bool,
}

impl ComparisonRequest {
    /// Creates a request using structural equivalence.
    #[must_use]
    pub fn new(method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self { method: method.into(), args, check: None, expect_error: false }
    }

    /// Replaces structural equivalence with a custom check.
    #[must_use]
    pub fn with_check(mut self, check: ResultCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Marks the request as a negative test: both targets must error.
    #[must_use]
    pub const fn expect_error(mut self) -> Self {
        self.expect_error = true;
        self
    }

    /// Returns the operation name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the reference-side arguments.
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Returns true for negative-test requests.
    #[must_use]
    pub const fn expects_error(&self) -> bool {
        self.expect_error
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Which implementation a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Trusted reference implementation.
    Reference,
    /// Implementation under test.
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Candidate => f.write_str("candidate"),
        }
    }
}

/// Comparison failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Exactly one target errored.
    #[error("{side} failed: {error}")]
    SideFailed {
        /// Target that errored.
        side: Side,
        /// The error it returned.
        error: TargetError,
    },
    /// Both targets errored.
    #[error("both targets failed: reference: {reference}; candidate: {candidate}")]
    BothFailed {
        /// Reference error.
        reference: TargetError,
        /// Candidate error.
        candidate: TargetError,
    },
    /// Both targets accepted a call that should have been rejected.
    #[error("expected an error but both targets succeeded")]
    UnexpectedSuccess,
    /// Only one target rejected a call that both should have rejected.
    #[error("expected an error but {accepted} succeeded while the other side failed: {error}")]
    OneSideAccepted {
        /// Target that accepted the call.
        accepted: Side,
        /// Error returned by the other target.
        error: TargetError,
    },
    /// Structural equivalence failed.
    #[error("{0}")]
    Divergence(Divergence),
    /// A custom equivalence override failed.
    #[error("custom check failed: {0}")]
    CheckFailed(String),
    /// Arguments for the request could not be built.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Shutdown was signalled before the request was admitted.
    #[error("cancelled before admission")]
    Cancelled,
    /// The request exceeded its deadline.
    #[error("timed out after {0} ms")]
    TimedOut(u128),
    /// The dispatch task ended without delivering an outcome.
    #[error("dispatch task ended without an outcome")]
    Dropped,
}

/// Failed comparison outcome with its pass context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} at height {height}: {error}")]
pub struct ComparisonFailure {
    /// Operation name.
    pub operation: String,
    /// Checkpoint height.
    pub height: u64,
    /// Divergence or error description.
    pub error: DispatchError,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum requests running at once (minimum 1).
    pub concurrency: usize,
    /// Optional per-request deadline.
    pub request_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY, request_timeout: None }
    }
}

/// Shared dispatcher state.
struct DispatcherInner {
    /// Reference target.
    reference: Arc<dyn Target>,
    /// Candidate target.
    candidate: Arc<dyn Target>,
    /// Candidate argument converters.
    converters: ConverterSet,
    /// Admission gate.
    gate: Arc<Semaphore>,
    /// Gate size.
    concurrency: usize,
    /// Optional per-request deadline.
    request_timeout: Option<Duration>,
    /// Event sink.
    events: Arc<dyn EventSink>,
}

/// Bounded-concurrency comparison dispatcher.
///
/// Cloning shares the same gate and targets.
#[derive(Clone)]
pub struct Dispatcher {
    /// Shared state.
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a dispatcher over the two targets.
    #[must_use]
    pub fn new(
        reference: Arc<dyn Target>,
        candidate: Arc<dyn Target>,
        converters: ConverterSet,
        config: DispatcherConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            inner: Arc::new(DispatcherInner {
                reference,
                candidate,
                converters,
                gate: Arc::new(Semaphore::new(concurrency)),
                concurrency,
                request_timeout: config.request_timeout,
                events,
            }),
        }
    }

    /// Returns the admission gate size.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Returns the number of free admission slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.inner.gate.available_permits()
    }

    /// Returns the reference target.
    #[must_use]
    pub fn reference(&self) -> &Arc<dyn Target> {
        &self.inner.reference
    }

    /// Returns the candidate target.
    #[must_use]
    pub fn candidate(&self) -> &Arc<dyn Target> {
        &self.inner.candidate
    }

    /// Returns the event sink.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.inner.events
    }

    /// Submits a request and returns its single-use completion handle.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn submit(&self, ctx: &CallContext, request: ComparisonRequest) -> Submission {
        let (sender, receiver) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                () = ctx.shutdown.wait() => None,
                permit = Arc::clone(&inner.gate).acquire_owned() => permit.ok(),
            };
            let outcome = match permit {
                Some(permit) => {
                    let outcome = inner.run(&ctx, &request).await;
                    drop(permit);
                    outcome
                }
                None => Err(DispatchError::Cancelled),
            };
            let _ = sender.send(outcome);
        });
        Submission { receiver }
    }

    /// Submits a request and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the comparison fails.
    pub async fn compare(
        &self,
        ctx: &CallContext,
        request: ComparisonRequest,
    ) -> Result<(), DispatchError> {
        self.submit(ctx, request).outcome().await
    }
}

impl DispatcherInner {
    /// Runs an admitted request, applying the optional deadline.
    async fn run(
        &self,
        ctx: &CallContext,
        request: &ComparisonRequest,
    ) -> Result<(), DispatchError> {
        self.events.record(&ComparisonEvent::dispatch(request.method(), ctx.height, "start"));
        let outcome = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.invoke_both(ctx, request))
                .await
                .unwrap_or(Err(DispatchError::TimedOut(limit.as_millis()))),
            None => self.invoke_both(ctx, request).await,
        };
        self.events.record(&ComparisonEvent::dispatch(request.method(), ctx.height, "finish"));
        outcome
    }

    /// Invokes both targets concurrently and reconciles the results.
    async fn invoke_both(
        &self,
        ctx: &CallContext,
        request: &ComparisonRequest,
    ) -> Result<(), DispatchError> {
        let candidate_args = self.converters.normalize(request.args());
        let (reference, candidate) = tokio::join!(
            self.reference.invoke(ctx, request.method(), request.args()),
            self.candidate.invoke(ctx, request.method(), &candidate_args),
        );
        reconcile(request, reference, candidate)
    }
}

/// Single-use completion handle for a submitted request.
pub struct Submission {
    /// Outcome channel.
    receiver: oneshot::Receiver<Result<(), DispatchError>>,
}

impl Submission {
    /// Waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the comparison fails or the task ended early.
    pub async fn outcome(self) -> Result<(), DispatchError> {
        self.receiver.await.unwrap_or(Err(DispatchError::Dropped))
    }
}

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// Reduces both sides' results to a single outcome.
///
/// # Errors
///
/// Returns [`DispatchError`] describing the failure.
pub fn reconcile(
    request: &ComparisonRequest,
    reference: Result<Value, TargetError>,
    candidate: Result<Value, TargetError>,
) -> Result<(), DispatchError> {
    if request.expects_error() {
        return match (reference, candidate) {
            (Err(_), Err(_)) => Ok(()),
            (Ok(_), Ok(_)) => Err(DispatchError::UnexpectedSuccess),
            (Ok(_), Err(error)) => {
                Err(DispatchError::OneSideAccepted { accepted: Side::Reference, error })
            }
            (Err(error), Ok(_)) => {
                Err(DispatchError::OneSideAccepted { accepted: Side::Candidate, error })
            }
        };
    }
    match (reference, candidate) {
        (Err(reference), Err(candidate)) => Err(DispatchError::BothFailed { reference, candidate }),
        (Err(error), Ok(_)) => Err(DispatchError::SideFailed { side: Side::Reference, error }),
        (Ok(_), Err(error)) => Err(DispatchError::SideFailed { side: Side::Candidate, error }),
        (Ok(reference), Ok(candidate)) => match &request.check {
            Some(check) => check(&reference, &candidate).map_err(DispatchError::CheckFailed),
            None => divergence(&reference, &candidate).map_or(Ok(()), |found| {
                Err(DispatchError::Divergence(found))
            }),
        },
    }
}
