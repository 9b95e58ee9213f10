// crates/chain-diff-core/src/runtime/mod.rs
// ============================================================================
// Module: Chain Diff Runtime
// Description: Registry, dispatcher, and scheduler.
// Purpose: Drive comparison passes against both targets.
// Dependencies: crate::runtime::{dispatcher, registry, scheduler}
// ============================================================================

//! ## Overview
//! The runtime composes the operation registry, the bounded dispatcher, and
//! the head-driven scheduler.

pub mod dispatcher;
pub mod registry;
pub mod scheduler;
