// crates/chain-diff-core/src/interfaces/mod.rs
// ============================================================================
// Module: Chain Diff Interfaces
// Description: Collaborator contracts for targets, feeds, and fixture builders.
// Purpose: Keep the runtime independent of any transport or client library.
// Dependencies: async-trait, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! The runtime talks to the outside world only through these traits:
//! [`Target`] invokes named remote operations, [`CheckpointFeed`] yields
//! head-change batches from the reference implementation, and
//! [`FixtureBuilder`] derives per-pass sample inputs. A single
//! [`ShutdownHandle`] cancels everything attached to it.
//! Invariants:
//! - Implementations are shared read-only across dispatch tasks.
//! - The invocation context is passed identically to both targets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::watch;

use crate::core::args::Arg;
use crate::core::checkpoint::Checkpoint;
use crate::core::checkpoint::CheckpointKey;
use crate::core::checkpoint::HeadChange;
use crate::core::fixtures::FixtureData;

// ============================================================================
// SECTION: Shutdown
// ============================================================================

/// Root cancellation handle.
///
/// # Invariants
/// - Once signalled, the shutdown state never resets.
#[derive(Debug)]
pub struct ShutdownHandle {
    /// Broadcast side of the shutdown flag.
    sender: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Creates a new, unsignalled handle.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Returns a signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal { receiver: self.sender.subscribe() }
    }

    /// Signals shutdown to every attached observer.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of the root cancellation handle.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    /// Receiver for the shutdown flag.
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns a signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Returns true once shutdown has been signalled.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown is signalled.
    ///
    /// Stays pending forever when the handle was dropped without signalling.
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|flag| *flag).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// SECTION: Call Context
// ============================================================================

/// Invocation context passed unchanged to both targets.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Height of the checkpoint being compared.
    pub height: u64,
    /// Root cancellation signal.
    pub shutdown: ShutdownSignal,
}

impl CallContext {
    /// Creates a context for the given height.
    #[must_use]
    pub const fn new(height: u64, shutdown: ShutdownSignal) -> Self {
        Self { height, shutdown }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Remote call failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Transport failed before a reply was received.
    #[error("transport error: {0}")]
    Transport(String),
    /// The target replied with a protocol-level error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },
    /// The reply could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The call was cancelled before it was issued.
    #[error("call cancelled")]
    Cancelled,
}

/// Checkpoint feed failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The subscription could not be established.
    #[error("feed subscription failed: {0}")]
    Subscribe(String),
}

/// Per-pass setup failures; they abort only the current pass.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// The targets disagree on the checkpoint for a height.
    #[error("checkpoint mismatch at height {height}: reference {reference}, candidate {candidate}")]
    CheckpointMismatch {
        /// Requested height.
        height: u64,
        /// Reference checkpoint rendering.
        reference: String,
        /// Candidate checkpoint rendering.
        candidate: String,
    },
    /// The resolved checkpoint has an empty key.
    #[error("checkpoint at height {0} is empty")]
    EmptyCheckpoint(u64),
    /// Fixture data could not be derived.
    #[error("fixture data unavailable: {0}")]
    Fixture(String),
    /// A target call needed for setup failed.
    #[error("{label} lookup failed: {error}")]
    Target {
        /// Target label.
        label: String,
        /// Underlying failure.
        error: TargetError,
    },
}

// ============================================================================
// SECTION: Target
// ============================================================================

/// One protocol implementation, invokable by operation name.
#[async_trait]
pub trait Target: Send + Sync {
    /// Returns a short human-readable label (`reference`, `candidate`, ...).
    fn label(&self) -> &str;

    /// Invokes a named remote operation with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when the call fails or the reply is an error.
    async fn invoke(
        &self,
        ctx: &CallContext,
        method: &str,
        args: &[Arg],
    ) -> Result<Value, TargetError>;
}

/// Method returning the current head checkpoint.
pub const CHAIN_HEAD: &str = "ChainHead";
/// Method returning the first checkpoint at or after a height.
pub const CHAIN_GET_TIPSET_AFTER_HEIGHT: &str = "ChainGetTipSetAfterHeight";

/// Fetches the target's current head checkpoint.
///
/// # Errors
///
/// Returns [`TargetError`] when the call fails or the reply is not a checkpoint.
pub async fn chain_head(target: &dyn Target, ctx: &CallContext) -> Result<Checkpoint, TargetError> {
    let value = target.invoke(ctx, CHAIN_HEAD, &[]).await?;
    Checkpoint::from_tipset_json(&value)
        .ok_or_else(|| TargetError::Decode(format!("{CHAIN_HEAD} returned a non-checkpoint")))
}

/// Fetches the first checkpoint at or after `height` on the target.
///
/// # Errors
///
/// Returns [`TargetError`] when the call fails or the reply is not a checkpoint.
pub async fn checkpoint_after_height(
    target: &dyn Target,
    ctx: &CallContext,
    height: u64,
) -> Result<Checkpoint, TargetError> {
    let height_arg = i64::try_from(height)
        .map_err(|_| TargetError::Decode(format!("height {height} out of range")))?;
    let args = [Arg::Int(height_arg), Arg::Key(CheckpointKey::empty())];
    let value = target.invoke(ctx, CHAIN_GET_TIPSET_AFTER_HEIGHT, &args).await?;
    Checkpoint::from_tipset_json(&value).ok_or_else(|| {
        TargetError::Decode(format!("{CHAIN_GET_TIPSET_AFTER_HEIGHT} returned a non-checkpoint"))
    })
}

// ============================================================================
// SECTION: Checkpoint Feed
// ============================================================================

/// Live head-change notifications from the reference implementation.
///
/// The first batch on the returned channel must be the initial
/// synchronization signal: exactly one `Current` change.
#[async_trait]
pub trait CheckpointFeed: Send + Sync {
    /// Subscribes to head changes until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] when the subscription cannot be established.
    async fn subscribe(
        &self,
        shutdown: ShutdownSignal,
    ) -> Result<mpsc::Receiver<Vec<HeadChange>>, FeedError>;
}

// ============================================================================
// SECTION: Fixture Builder
// ============================================================================

/// Derives per-pass fixture data for a checkpoint.
#[async_trait]
pub trait FixtureBuilder: Send + Sync {
    /// Builds fixture data for the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] when the source data is missing or inconsistent.
    async fn build(
        &self,
        ctx: &CallContext,
        checkpoint: &Checkpoint,
    ) -> Result<FixtureData, SetupError>;
}

/// Fixture builder that yields no samples, only the default miner.
#[derive(Debug, Clone)]
pub struct EmptyFixtures {
    /// Default miner address.
    default_miner: String,
}

impl EmptyFixtures {
    /// Creates a builder with the given default miner.
    #[must_use]
    pub fn new(default_miner: impl Into<String>) -> Self {
        Self { default_miner: default_miner.into() }
    }
}

#[async_trait]
impl FixtureBuilder for EmptyFixtures {
    async fn build(
        &self,
        _ctx: &CallContext,
        checkpoint: &Checkpoint,
    ) -> Result<FixtureData, SetupError> {
        Ok(FixtureData::empty(checkpoint.height, self.default_miner.clone()))
    }
}
