// crates/chain-diff-core/src/lib.rs
// ============================================================================
// Module: Chain Diff Core
// Description: Differential comparison engine for two protocol implementations.
// Purpose: Detect semantic divergence between a reference and a candidate.
// Dependencies: async-trait, base64, serde, serde_jcs, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! Chain Diff drives a trusted reference implementation and a candidate
//! implementation of the same request/response protocol with identical
//! operations, and reports where their results diverge. The crate holds the
//! structural equivalence checker, the operation registry, the
//! bounded-concurrency dispatcher, and the head-driven scheduler. It carries
//! no network code; targets, feeds, and fixture builders are supplied through
//! [`interfaces`].
//! Invariants:
//! - Operation failures never escape their own comparison.
//! - Only feed subscription and synchronization failures are fatal.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod equivalence;
pub mod events;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::args::Arg;
pub use crate::core::args::ArgKind;
pub use crate::core::args::CallDescriptor;
pub use crate::core::args::ConverterSet;
pub use crate::core::args::MessageDescriptor;
pub use crate::core::args::MessageMatch;
pub use crate::core::checkpoint::Checkpoint;
pub use crate::core::checkpoint::CheckpointKey;
pub use crate::core::checkpoint::HeadChange;
pub use crate::core::checkpoint::HeadChangeKind;
pub use crate::core::fixtures::DEFAULT_MINER;
pub use crate::core::fixtures::EthHash;
pub use crate::core::fixtures::FixtureData;
pub use crate::core::fixtures::FixtureError;
pub use crate::core::fixtures::SampleMessage;
pub use crate::core::fixtures::SampleReceipt;
pub use equivalence::Divergence;
pub use equivalence::Opaque;
pub use equivalence::checks::ResultCheck;
pub use equivalence::divergence;
pub use equivalence::equivalent;
pub use equivalence::serialized_equal;
pub use events::ComparisonEvent;
pub use events::EventLevel;
pub use events::EventSink;
pub use events::FileEventSink;
pub use events::LevelFilterSink;
pub use events::NoopEventSink;
pub use events::StderrEventSink;
pub use interfaces::CallContext;
pub use interfaces::CheckpointFeed;
pub use interfaces::EmptyFixtures;
pub use interfaces::FeedError;
pub use interfaces::FixtureBuilder;
pub use interfaces::SetupError;
pub use interfaces::ShutdownHandle;
pub use interfaces::ShutdownSignal;
pub use interfaces::Target;
pub use interfaces::TargetError;
pub use runtime::dispatcher::ComparisonFailure;
pub use runtime::dispatcher::ComparisonRequest;
pub use runtime::dispatcher::DispatchError;
pub use runtime::dispatcher::Dispatcher;
pub use runtime::dispatcher::DispatcherConfig;
pub use runtime::dispatcher::Side;
pub use runtime::dispatcher::Submission;
pub use runtime::registry::MethodEntry;
pub use runtime::registry::MethodSource;
pub use runtime::registry::Operation;
pub use runtime::registry::OperationFuture;
pub use runtime::registry::OperationRegistry;
pub use runtime::registry::PassContext;
pub use runtime::registry::operation_fn;
pub use runtime::scheduler::PassReport;
pub use runtime::scheduler::Scheduler;
pub use runtime::scheduler::SchedulerConfig;
pub use runtime::scheduler::SchedulerError;
pub use runtime::scheduler::SchedulerState;
