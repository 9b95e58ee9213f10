// crates/chain-diff-cli/src/lib.rs
// ============================================================================
// Module: Chain Diff CLI Library
// Description: Runtime wiring shared by the `chain-diff` binary and its tests.
// Purpose: Expose configuration overrides and scheduler construction.
// Dependencies: chain-diff-catalog, chain-diff-config, chain-diff-core, chain-diff-rpc
// ============================================================================

//! ## Overview
//! Library half of the CLI crate. The binary parses arguments and owns the
//! process lifecycle; [`wiring`] turns configuration into a scheduler.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use wiring::RunOverrides;
pub use wiring::WiringError;
pub use wiring::build_scheduler;
