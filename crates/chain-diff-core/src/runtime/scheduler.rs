// crates/chain-diff-core/src/runtime/scheduler.rs
// ============================================================================
// Module: Chain Diff Scheduler
// Description: Head-driven comparison passes with debounced triggering.
// Purpose: Decide when and where to compare, and drive the full catalogue.
// Dependencies: thiserror, tokio
// ============================================================================

//! ## Overview
//! The scheduler subscribes to the reference implementation's head feed,
//! waits for the initial synchronization signal, runs a first pass at the
//! start height, and then runs one pass per trigger. Advance notifications
//! above `current + confidence` request a pass through a small bounded
//! trigger channel; when the channel is full, a pass is already queued and
//! the notification is dropped.
//! Invariants:
//! - At most one pass runs at a time; heights are compared in increasing order.
//! - Every registered operation runs concurrently within a pass, and each
//!   outcome is logged independently.
//! - Setup failures abandon only the current pass.
//! - An unresolved start height is retried before any later height.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::core::checkpoint::Checkpoint;
use crate::core::checkpoint::HeadChange;
use crate::core::checkpoint::HeadChangeKind;
use crate::core::fixtures::FixtureData;
use crate::events::ComparisonEvent;
use crate::events::EventSink;
use crate::interfaces::CallContext;
use crate::interfaces::CheckpointFeed;
use crate::interfaces::FeedError;
use crate::interfaces::FixtureBuilder;
use crate::interfaces::SetupError;
use crate::interfaces::ShutdownSignal;
use crate::interfaces::checkpoint_after_height;
use crate::runtime::dispatcher::ComparisonFailure;
use crate::runtime::dispatcher::DispatchError;
use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::registry::OperationRegistry;
use crate::runtime::registry::PassContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of checkpoints to lag behind the head.
pub const DEFAULT_CONFIDENCE: u64 = 5;
/// Default trigger channel capacity.
pub const DEFAULT_TRIGGER_CAPACITY: usize = 1;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Subscribing to the feed.
    Initializing,
    /// Waiting for the feed's initial synchronization signal.
    WaitingForEventFeedSync,
    /// Waiting for a trigger.
    Idle,
    /// Running a pass.
    ComparingCheckpoint,
    /// Finished.
    Stopped,
}

impl SchedulerState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::WaitingForEventFeedSync => "waiting_for_event_feed_sync",
            Self::Idle => "idle",
            Self::ComparingCheckpoint => "comparing_checkpoint",
            Self::Stopped => "stopped",
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Checkpoints to lag behind the head before comparing.
    pub confidence: u64,
    /// Explicit first height, clamped to the head.
    pub start_height: Option<u64>,
    /// Trigger channel capacity (minimum 1).
    pub trigger_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            start_height: None,
            trigger_capacity: DEFAULT_TRIGGER_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    /// Resolves the first pass height from the observed head height.
    #[must_use]
    pub fn start_height_for(&self, head: u64) -> u64 {
        self.start_height.map_or_else(|| head.saturating_sub(self.confidence), |h| h.min(head))
    }
}

/// Fatal scheduler failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The head feed subscription could not be established.
    #[error(transparent)]
    Subscribe(#[from] FeedError),
    /// The first batch was not exactly one `Current` change.
    #[error("malformed initial sync signal: {0}")]
    BadInitialSync(String),
    /// The feed closed before the initial sync signal.
    #[error("head feed closed before initial sync")]
    FeedClosedDuringSync,
    /// The feed closed while running.
    #[error("head feed closed")]
    FeedClosed,
}

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Checkpoint height.
    pub height: u64,
    /// Operations that passed.
    pub passed: usize,
    /// Operations that failed.
    pub failed: usize,
    /// Pass wall time.
    pub elapsed: Duration,
    /// Failed outcomes, sorted by operation name.
    pub failures: Vec<ComparisonFailure>,
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Head-driven comparison scheduler.
pub struct Scheduler {
    /// Dispatcher shared by every pass.
    dispatcher: Dispatcher,
    /// Operation catalogue.
    registry: Arc<OperationRegistry>,
    /// Reference head feed.
    feed: Arc<dyn CheckpointFeed>,
    /// Per-pass fixture builder.
    fixtures: Arc<dyn FixtureBuilder>,
    /// Scheduler settings.
    config: SchedulerConfig,
    /// Current lifecycle state.
    state: watch::Sender<SchedulerState>,
    /// Height of the checkpoint most recently resolved for a pass.
    current: watch::Sender<u64>,
}

impl Scheduler {
    /// Creates a scheduler; events go to the dispatcher's sink.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        registry: Arc<OperationRegistry>,
        feed: Arc<dyn CheckpointFeed>,
        fixtures: Arc<dyn FixtureBuilder>,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Initializing);
        let (current, _) = watch::channel(0);
        Self { dispatcher, registry, feed, fixtures, config, state, current }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Returns a receiver observing state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Returns the height of the most recently resolved checkpoint.
    #[must_use]
    pub fn current_height(&self) -> u64 {
        *self.current.borrow()
    }

    /// Returns the event sink.
    fn events(&self) -> &Arc<dyn EventSink> {
        self.dispatcher.events()
    }

    /// Records and publishes a state transition.
    fn transition(&self, state: SchedulerState) {
        self.state.send_replace(state);
        self.events().record(&ComparisonEvent::scheduler_state(state.as_str()));
    }

    /// Runs until shutdown or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] when the feed cannot be established, its
    /// initial signal is malformed, or it closes while running.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<(), SchedulerError> {
        let result = self.drive(&shutdown).await;
        if let Err(err) = &result {
            self.events().record(&ComparisonEvent::scheduler_failed(err.to_string()));
        }
        self.transition(SchedulerState::Stopped);
        result
    }

    /// Subscribes, synchronizes, and loops over triggers.
    async fn drive(&self, shutdown: &ShutdownSignal) -> Result<(), SchedulerError> {
        self.transition(SchedulerState::Initializing);
        let mut feed = self.feed.subscribe(shutdown.clone()).await?;

        self.transition(SchedulerState::WaitingForEventFeedSync);
        let first = tokio::select! {
            biased;
            () = shutdown.wait() => return Ok(()),
            batch = feed.recv() => batch.ok_or(SchedulerError::FeedClosedDuringSync)?,
        };
        let head = initial_sync(&first)?;

        let start = self.config.start_height_for(head.height);
        self.current.send_replace(start);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(self.config.trigger_capacity.max(1));
        let listener = tokio::spawn(listen(
            feed,
            trigger_tx,
            self.current.subscribe(),
            self.config.confidence,
            Arc::clone(self.events()),
        ));

        let mut pending_start = (!self.attempt_pass(start, shutdown).await).then_some(start);
        let outcome = loop {
            self.transition(SchedulerState::Idle);
            tokio::select! {
                biased;
                () = shutdown.wait() => break Ok(()),
                trigger = trigger_rx.recv() => {
                    if trigger.is_none() {
                        break if shutdown.is_shutdown() {
                            Ok(())
                        } else {
                            Err(SchedulerError::FeedClosed)
                        };
                    }
                    let next =
                        pending_start.unwrap_or_else(|| self.current_height().saturating_add(1));
                    if self.attempt_pass(next, shutdown).await {
                        pending_start = None;
                    }
                }
            }
        };
        listener.abort();
        outcome
    }

    /// Runs one pass and logs an abandoned pass instead of failing.
    ///
    /// Returns false when no checkpoint was resolved for `height`.
    async fn attempt_pass(&self, height: u64, shutdown: &ShutdownSignal) -> bool {
        self.transition(SchedulerState::ComparingCheckpoint);
        let checkpoint = match self.resolve(height, shutdown).await {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                self.events().record(&ComparisonEvent::pass_abandoned(height, err.to_string()));
                return false;
            }
        };
        if let Err(err) = self.run_resolved(checkpoint, shutdown).await {
            self.events().record(&ComparisonEvent::pass_abandoned(height, err.to_string()));
        }
        true
    }

    /// Resolves the checkpoint at or after `height` and runs every operation.
    ///
    /// The current height advances as soon as both targets agree on the
    /// checkpoint, before fixture data is built.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] when the targets disagree on the checkpoint, the
    /// checkpoint is empty, or fixture data cannot be built.
    pub async fn run_pass(
        &self,
        height: u64,
        shutdown: &ShutdownSignal,
    ) -> Result<PassReport, SetupError> {
        let checkpoint = self.resolve(height, shutdown).await?;
        self.run_resolved(checkpoint, shutdown).await
    }

    /// Advances the current height to `checkpoint`, then builds fixtures and
    /// runs every operation.
    async fn run_resolved(
        &self,
        checkpoint: Checkpoint,
        shutdown: &ShutdownSignal,
    ) -> Result<PassReport, SetupError> {
        self.current.send_replace(checkpoint.height);
        let ctx = CallContext::new(checkpoint.height, shutdown.clone());
        let fixtures = self.fixtures.build(&ctx, &checkpoint).await?;
        Ok(self.execute(checkpoint, fixtures, ctx).await)
    }

    /// Finds the checkpoint both targets agree on for `height`.
    async fn resolve(
        &self,
        height: u64,
        shutdown: &ShutdownSignal,
    ) -> Result<Checkpoint, SetupError> {
        let ctx = CallContext::new(height, shutdown.clone());
        let reference = self.dispatcher.reference();
        let candidate = self.dispatcher.candidate();
        let (left, right) = tokio::join!(
            checkpoint_after_height(reference.as_ref(), &ctx, height),
            checkpoint_after_height(candidate.as_ref(), &ctx, height),
        );
        let left = left
            .map_err(|error| SetupError::Target { label: reference.label().to_string(), error })?;
        let right = right
            .map_err(|error| SetupError::Target { label: candidate.label().to_string(), error })?;
        if !left.same_point(&right) {
            return Err(SetupError::CheckpointMismatch {
                height,
                reference: left.to_string(),
                candidate: right.to_string(),
            });
        }
        if left.key.is_empty() {
            return Err(SetupError::EmptyCheckpoint(left.height));
        }
        Ok(left)
    }

    /// Runs every registered operation concurrently and waits for all of them.
    async fn execute(
        &self,
        checkpoint: Checkpoint,
        fixtures: FixtureData,
        ctx: CallContext,
    ) -> PassReport {
        let started = Instant::now();
        let height = checkpoint.height;
        self.events().record(&ComparisonEvent::pass_started(&checkpoint, self.registry.len()));
        let dispatcher = self.dispatcher.clone();
        let pass = PassContext::new(Arc::new(checkpoint), Arc::new(fixtures), dispatcher, ctx);

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for (name, operation) in self.registry.all() {
            let operation = Arc::clone(operation);
            let pass = pass.clone();
            let handle = tasks.spawn(async move { operation.run(&pass).await });
            names.insert(handle.id(), name.clone());
        }

        let mut passed = 0;
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(err) => (err.id(), Err(DispatchError::Dropped)),
            };
            let operation = names.remove(&id).unwrap_or_default();
            match result {
                Ok(()) => {
                    passed += 1;
                    let event = ComparisonEvent::operation_result(height, &operation, None);
                    self.events().record(&event);
                }
                Err(error) => {
                    self.events().record(&ComparisonEvent::operation_result(
                        height,
                        &operation,
                        Some(error.to_string()),
                    ));
                    failures.push(ComparisonFailure { operation, height, error });
                }
            }
        }
        failures.sort_by(|a, b| a.operation.cmp(&b.operation));

        let elapsed = started.elapsed();
        let failed = failures.len();
        self.events().record(&ComparisonEvent::pass_completed(height, passed, failed, elapsed));
        PassReport { height, passed, failed, elapsed, failures }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the initial synchronization batch and returns the head.
fn initial_sync(batch: &[HeadChange]) -> Result<Checkpoint, SchedulerError> {
    match batch {
        [change] if change.kind == HeadChangeKind::Current => Ok(change.checkpoint.clone()),
        [change] => Err(SchedulerError::BadInitialSync(format!(
            "expected a current change, got {}",
            kind_label(change.kind)
        ))),
        _ => Err(SchedulerError::BadInitialSync(format!(
            "expected exactly one change, got {}",
            batch.len()
        ))),
    }
}

/// Returns a stable label for a head-change kind.
const fn kind_label(kind: HeadChangeKind) -> &'static str {
    match kind {
        HeadChangeKind::Current => "current",
        HeadChangeKind::Apply => "apply",
        HeadChangeKind::Revert => "revert",
    }
}

/// Turns advance notifications into collapsed pass triggers.
async fn listen(
    mut feed: mpsc::Receiver<Vec<HeadChange>>,
    trigger: mpsc::Sender<()>,
    current: watch::Receiver<u64>,
    confidence: u64,
    events: Arc<dyn EventSink>,
) {
    while let Some(batch) = feed.recv().await {
        let Some(apply) = batch.iter().find(|change| change.kind == HeadChangeKind::Apply) else {
            continue;
        };
        let height = apply.checkpoint.height;
        let threshold = current.borrow().saturating_add(confidence);
        if height <= threshold {
            continue;
        }
        match trigger.try_send(()) {
            Ok(()) => events.record(&ComparisonEvent::trigger_queued(height)),
            Err(TrySendError::Full(())) => {
                events.record(&ComparisonEvent::trigger_collapsed(height));
            }
            Err(TrySendError::Closed(())) => return,
        }
    }
}
