// crates/chain-diff-core/src/core/mod.rs
// ============================================================================
// Module: Chain Diff Core Types
// Description: Checkpoints, call arguments, and per-pass fixture data.
// Purpose: Group the data model shared by the runtime and collaborators.
// Dependencies: crate::core::{args, checkpoint, fixtures}
// ============================================================================

//! ## Overview
//! Pure data types with no I/O. Everything here is safe to share across
//! dispatch tasks.

pub mod args;
pub mod checkpoint;
pub mod fixtures;
