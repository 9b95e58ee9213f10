// crates/chain-diff-rpc/src/feed.rs
// ============================================================================
// Module: Polling Head Feed
// Description: Head-change feed derived from periodic head queries.
// Purpose: Supply the scheduler with head changes from a plain RPC endpoint.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! [`PollingHeadFeed`] queries the head of a target on a fixed interval and
//! turns observed movement into head-change batches. The first batch is a
//! single `Current` entry. A higher head becomes `[Apply]`; a different head
//! at the same or a lower height becomes `[Revert(previous), Apply(new)]`.
//! Invariants:
//! - Only the initial head query can fail the subscription; later query
//!   failures are retried on the next tick.
//! - The polling task exits on shutdown or when the receiver is dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chain_diff_core::CallContext;
use chain_diff_core::Checkpoint;
use chain_diff_core::CheckpointFeed;
use chain_diff_core::FeedError;
use chain_diff_core::HeadChange;
use chain_diff_core::ShutdownSignal;
use chain_diff_core::Target;
use chain_diff_core::interfaces::chain_head;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Buffered head-change batches between the poller and its consumer.
const FEED_CAPACITY: usize = 16;

// ============================================================================
// SECTION: Feed
// ============================================================================

/// Head-change feed backed by periodic head queries.
pub struct PollingHeadFeed {
    /// Target whose head is followed.
    target: Arc<dyn Target>,
    /// Delay between head queries.
    interval: Duration,
}

impl PollingHeadFeed {
    /// Creates a feed that polls `target` every `interval`.
    #[must_use]
    pub fn new(target: Arc<dyn Target>, interval: Duration) -> Self {
        Self { target, interval }
    }

    /// Returns the polling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl CheckpointFeed for PollingHeadFeed {
    async fn subscribe(
        &self,
        shutdown: ShutdownSignal,
    ) -> Result<mpsc::Receiver<Vec<HeadChange>>, FeedError> {
        let ctx = CallContext::new(0, shutdown.clone());
        let initial = chain_head(self.target.as_ref(), &ctx)
            .await
            .map_err(|err| FeedError::Subscribe(format!("{}: {err}", self.target.label())))?;
        let (sender, receiver) = mpsc::channel(FEED_CAPACITY);
        sender
            .send(vec![HeadChange::current(initial.clone())])
            .await
            .map_err(|_| FeedError::Subscribe("feed receiver closed".to_string()))?;
        tokio::spawn(poll_heads(Arc::clone(&self.target), self.interval, initial, sender, ctx));
        Ok(receiver)
    }
}

// ============================================================================
// SECTION: Polling
// ============================================================================

/// Polls the head until shutdown or until the receiver goes away.
async fn poll_heads(
    target: Arc<dyn Target>,
    interval: Duration,
    mut last: Checkpoint,
    sender: mpsc::Sender<Vec<HeadChange>>,
    ctx: CallContext,
) {
    loop {
        tokio::select! {
            biased;
            () = ctx.shutdown.wait() => return,
            () = sender.closed() => return,
            () = tokio::time::sleep(interval) => {}
        }
        let Ok(head) = chain_head(target.as_ref(), &ctx).await else {
            continue;
        };
        let Some(batch) = head_changes(&last, &head) else {
            continue;
        };
        if sender.send(batch).await.is_err() {
            return;
        }
        last = head;
    }
}

/// Returns the batch describing movement from `last` to `head`, if any.
fn head_changes(last: &Checkpoint, head: &Checkpoint) -> Option<Vec<HeadChange>> {
    if last.same_point(head) {
        return None;
    }
    if head.height > last.height {
        return Some(vec![HeadChange::apply(head.clone())]);
    }
    Some(vec![HeadChange::revert(last.clone()), HeadChange::apply(head.clone())])
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chain_diff_core::Arg;
    use chain_diff_core::CheckpointKey;
    use chain_diff_core::HeadChangeKind;
    use chain_diff_core::ShutdownHandle;
    use chain_diff_core::TargetError;
    use serde_json::Value;
    use serde_json::json;

    use super::*;

    /// Target answering head queries from a script, repeating the last entry.
    struct ScriptedHeads {
        /// Remaining replies.
        replies: Mutex<VecDeque<Result<Value, TargetError>>>,
    }

    impl ScriptedHeads {
        fn new(replies: Vec<Result<Value, TargetError>>) -> Self {
            Self { replies: Mutex::new(replies.into()) }
        }
    }

    #[async_trait]
    impl Target for ScriptedHeads {
        fn label(&self) -> &str {
            "reference"
        }

        async fn invoke(
            &self,
            _ctx: &CallContext,
            _method: &str,
            _args: &[Arg],
        ) -> Result<Value, TargetError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                return replies.pop_front().unwrap();
            }
            replies.front().cloned().unwrap()
        }
    }

    fn head(height: u64, cid: &str) -> Result<Value, TargetError> {
        Ok(json!({ "Height": height, "Cids": [{ "/": cid }] }))
    }

    fn checkpoint(height: u64, cid: &str) -> Checkpoint {
        Checkpoint::new(height, CheckpointKey::new([cid]))
    }

    #[test]
    fn movement_maps_to_head_changes() {
        let last = checkpoint(10, "a");
        assert!(head_changes(&last, &checkpoint(10, "a")).is_none());

        let forward = head_changes(&last, &checkpoint(11, "b")).unwrap();
        assert_eq!(forward, vec![HeadChange::apply(checkpoint(11, "b"))]);

        let reorg = head_changes(&last, &checkpoint(10, "c")).unwrap();
        let kinds: Vec<_> = reorg.iter().map(|change| change.kind).collect();
        assert_eq!(kinds, vec![HeadChangeKind::Revert, HeadChangeKind::Apply]);
        assert_eq!(reorg[0].checkpoint, last);
    }

    #[tokio::test]
    async fn first_batch_is_current_then_applies_follow() {
        let target = Arc::new(ScriptedHeads::new(vec![
            head(100, "a"),
            Err(TargetError::Transport("connection reset".to_string())),
            head(100, "a"),
            head(101, "b"),
        ]));
        let feed = PollingHeadFeed::new(target, Duration::from_millis(5));
        let handle = ShutdownHandle::new();
        let mut receiver = feed.subscribe(handle.signal()).await.unwrap();

        let first = receiver.recv().await.unwrap();
        assert_eq!(first, vec![HeadChange::current(checkpoint(100, "a"))]);
        let second = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, vec![HeadChange::apply(checkpoint(101, "b"))]);

        handle.shutdown();
        let closed = tokio::time::timeout(Duration::from_secs(5), receiver.recv()).await.unwrap();
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn initial_head_failure_fails_the_subscription() {
        let target = Arc::new(ScriptedHeads::new(vec![Err(TargetError::Transport(
            "connection refused".to_string(),
        ))]));
        let feed = PollingHeadFeed::new(target, Duration::from_millis(5));
        let err = feed.subscribe(ShutdownSignal::never()).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
