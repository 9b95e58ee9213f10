// crates/chain-diff-core/src/events.rs
// ============================================================================
// Module: Chain Diff Events
// Description: Structured progress events and JSON-lines sinks.
// Purpose: Emit one timestamped record per scheduler transition and outcome.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The scheduler and dispatcher report progress as [`ComparisonEvent`]
//! payloads routed through an [`EventSink`]. Sinks serialize events as JSON
//! lines; deployments pick stderr, an append-only file, or nothing.
//! Invariants:
//! - Sinks never fail the caller; write errors are dropped.
//! - Every event carries `event`, `level`, and `timestamp_ms`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::core::checkpoint::Checkpoint;

// ============================================================================
// SECTION: Levels
// ============================================================================

/// Event severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Per-request dispatch detail.
    Debug,
    /// Normal progress.
    #[default]
    Info,
    /// Recoverable problems (failed operations, abandoned passes).
    Warn,
    /// Fatal problems.
    Error,
}

impl EventLevel {
    /// Returns a stable label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event-specific payload fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventFields {
    /// Scheduler state transition.
    State {
        /// New state label.
        state: &'static str,
    },
    /// A pass began at a checkpoint.
    PassStarted {
        /// Checkpoint height.
        height: u64,
        /// Rendered checkpoint key.
        key: String,
        /// Number of operations scheduled.
        operations: usize,
    },
    /// One operation finished.
    OperationResult {
        /// Checkpoint height.
        height: u64,
        /// Operation name.
        operation: String,
        /// `pass` or `fail`.
        outcome: &'static str,
        /// Divergence description on failure.
        #[serde(skip_serializing_if = "Option::is_none")]
        divergence: Option<String>,
    },
    /// A pass finished.
    PassCompleted {
        /// Checkpoint height.
        height: u64,
        /// Operations that passed.
        passed: usize,
        /// Operations that failed.
        failed: usize,
        /// Pass wall time in milliseconds.
        elapsed_ms: u128,
    },
    /// A pass was abandoned during setup.
    PassAbandoned {
        /// Requested height.
        height: u64,
        /// Setup failure.
        reason: String,
    },
    /// Trigger bookkeeping for an advance notification.
    Trigger {
        /// Advanced head height.
        height: u64,
    },
    /// Per-request dispatch detail.
    Dispatch {
        /// Remote method name.
        method: String,
        /// Checkpoint height.
        height: u64,
        /// `start` or `finish`.
        phase: &'static str,
    },
    /// Fatal scheduler failure.
    Failure {
        /// Failure description.
        reason: String,
    },
}

/// Structured progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event severity.
    pub level: EventLevel,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event-specific fields.
    #[serde(flatten)]
    pub fields: EventFields,
}

impl ComparisonEvent {
    /// Creates an event with a consistent timestamp.
    #[must_use]
    pub fn new(event: &'static str, level: EventLevel, fields: EventFields) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self { event, level, timestamp_ms, fields }
    }

    /// Scheduler state transition.
    #[must_use]
    pub fn scheduler_state(state: &'static str) -> Self {
        Self::new("scheduler_state", EventLevel::Info, EventFields::State { state })
    }

    /// Pass start at a checkpoint.
    #[must_use]
    pub fn pass_started(checkpoint: &Checkpoint, operations: usize) -> Self {
        Self::new(
            "pass_started",
            EventLevel::Info,
            EventFields::PassStarted {
                height: checkpoint.height,
                key: checkpoint.key.to_string(),
                operations,
            },
        )
    }

    /// Per-operation outcome; `failure` carries the divergence text.
    #[must_use]
    pub fn operation_result(height: u64, operation: &str, failure: Option<String>) -> Self {
        let (level, outcome) =
            if failure.is_some() { (EventLevel::Warn, "fail") } else { (EventLevel::Info, "pass") };
        Self::new(
            "operation_result",
            level,
            EventFields::OperationResult {
                height,
                operation: operation.to_string(),
                outcome,
                divergence: failure,
            },
        )
    }

    /// Pass summary.
    #[must_use]
    pub fn pass_completed(height: u64, passed: usize, failed: usize, elapsed: Duration) -> Self {
        Self::new(
            "pass_completed",
            EventLevel::Info,
            EventFields::PassCompleted { height, passed, failed, elapsed_ms: elapsed.as_millis() },
        )
    }

    /// Pass abandoned during setup.
    #[must_use]
    pub fn pass_abandoned(height: u64, reason: String) -> Self {
        Self::new("pass_abandoned", EventLevel::Warn, EventFields::PassAbandoned { height, reason })
    }

    /// Advance notification queued a new pass.
    #[must_use]
    pub fn trigger_queued(height: u64) -> Self {
        Self::new("trigger_queued", EventLevel::Info, EventFields::Trigger { height })
    }

    /// Advance notification collapsed into an already queued pass.
    #[must_use]
    pub fn trigger_collapsed(height: u64) -> Self {
        Self::new("trigger_collapsed", EventLevel::Debug, EventFields::Trigger { height })
    }

    /// Dispatch start or finish for one request.
    #[must_use]
    pub fn dispatch(method: &str, height: u64, phase: &'static str) -> Self {
        Self::new(
            "dispatch",
            EventLevel::Debug,
            EventFields::Dispatch { method: method.to_string(), height, phase },
        )
    }

    /// Fatal scheduler failure.
    #[must_use]
    pub fn scheduler_failed(reason: String) -> Self {
        Self::new("scheduler_failed", EventLevel::Error, EventFields::Failure { reason })
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Event sink interface.
pub trait EventSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: &ComparisonEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, event: &ComparisonEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that logs JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, event: &ComparisonEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op sink.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: &ComparisonEvent) {}
}

/// Sink that drops events below a minimum level.
pub struct LevelFilterSink {
    /// Minimum level forwarded.
    min_level: EventLevel,
    /// Wrapped sink.
    inner: Arc<dyn EventSink>,
}

impl LevelFilterSink {
    /// Wraps a sink with a minimum level.
    #[must_use]
    pub fn new(min_level: EventLevel, inner: Arc<dyn EventSink>) -> Self {
        Self { min_level, inner }
    }
}

impl EventSink for LevelFilterSink {
    fn record(&self, event: &ComparisonEvent) {
        if event.level >= self.min_level {
            self.inner.record(event);
        }
    }
}
