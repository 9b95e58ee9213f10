// crates/chain-diff-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Mock targets, feeds, and sinks for runtime tests.
// Purpose: Drive the dispatcher and scheduler without a network.
// Dependencies: chain-diff-core, tokio
// ============================================================================

//! ## Overview
//! In-process collaborators: [`MockTarget`] answers calls from a handler
//! closure and records how many calls run at once, [`MockFeed`] hands out a
//! channel the test pushes head changes into, and [`RecordingSink`] keeps
//! every event for assertions.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chain_diff_core::Arg;
use chain_diff_core::CallContext;
use chain_diff_core::Checkpoint;
use chain_diff_core::CheckpointFeed;
use chain_diff_core::CheckpointKey;
use chain_diff_core::ComparisonEvent;
use chain_diff_core::EventSink;
use chain_diff_core::FeedError;
use chain_diff_core::HeadChange;
use chain_diff_core::ShutdownSignal;
use chain_diff_core::Target;
use chain_diff_core::TargetError;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Targets
// ============================================================================

/// Handler deciding a mock target's reply.
pub type Handler = Box<dyn Fn(&str, &[Arg]) -> Result<Value, TargetError> + Send + Sync>;

/// Mock target with concurrency instrumentation.
pub struct MockTarget {
    label: String,
    handler: Handler,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Vec<Arg>)>>,
}

impl MockTarget {
    pub fn new(
        label: &str,
        handler: impl Fn(&str, &[Arg]) -> Result<Value, TargetError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.to_string(),
            handler: Box::new(handler),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, Vec<Arg>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Target for MockTarget {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        _ctx: &CallContext,
        method: &str,
        args: &[Arg],
    ) -> Result<Value, TargetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((method.to_string(), args.to_vec()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.handler)(method, args)
    }
}

/// Tipset-shaped JSON for a checkpoint.
pub fn tipset_json(height: u64, cids: &[&str]) -> Value {
    let links: Vec<Value> = cids.iter().map(|cid| json!({ "/": cid })).collect();
    json!({ "Cids": links, "Blocks": [], "Height": height })
}

/// Target answering checkpoint lookups with `{height, key}` at the requested height.
pub fn chain_target(label: &str) -> MockTarget {
    MockTarget::new(label, |method, args| match (method, args.first()) {
        ("ChainGetTipSetAfterHeight", Some(Arg::Int(height))) => {
            Ok(tipset_json(u64::try_from(*height).unwrap(), &["bafyblock"]))
        }
        ("ChainHead", _) => Ok(tipset_json(100, &["bafyhead"])),
        _ => Ok(Value::Null),
    })
}

/// Checkpoint with a single-block key.
pub fn checkpoint(height: u64) -> Checkpoint {
    Checkpoint::new(height, CheckpointKey::new(["bafyblock"]))
}

// ============================================================================
// SECTION: Feed
// ============================================================================

/// Feed whose batches are pushed by the test.
pub struct MockFeed {
    receiver: Mutex<Option<mpsc::Receiver<Vec<HeadChange>>>>,
}

impl MockFeed {
    pub fn new() -> (Self, mpsc::Sender<Vec<HeadChange>>) {
        let (sender, receiver) = mpsc::channel(64);
        (Self { receiver: Mutex::new(Some(receiver)) }, sender)
    }
}

#[async_trait]
impl CheckpointFeed for MockFeed {
    async fn subscribe(
        &self,
        _shutdown: ShutdownSignal,
    ) -> Result<mpsc::Receiver<Vec<HeadChange>>, FeedError> {
        self.receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| FeedError::Subscribe("already subscribed".to_string()))
    }
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Sink keeping every recorded event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ComparisonEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ComparisonEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|event| event.event == name).count()
    }

    /// Polls until at least `expected` events named `name` were recorded.
    pub async fn wait_for(&self, name: &str, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.count(name) < expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {expected} {name} events"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &ComparisonEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
