// crates/chain-diff-rpc/src/lib.rs
// ============================================================================
// Module: Chain Diff RPC
// Description: JSON-RPC targets, head feeds, and fixture builders.
// Purpose: Connect the comparison engine to live protocol endpoints.
// Dependencies: async-trait, chain-diff-core, reqwest, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Network-facing implementations of the engine's seams: [`RpcTarget`] for
//! remote invocation, [`PollingHeadFeed`] for head changes, and
//! [`RpcFixtureBuilder`] for per-pass sample data.
//! Invariants:
//! - Remote failures surface as typed errors; nothing here panics on bad input.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod feed;
pub mod fixtures;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::RpcError;
pub use client::RpcTarget;
pub use client::RpcTargetConfig;
pub use feed::PollingHeadFeed;
pub use fixtures::RpcFixtureBuilder;
