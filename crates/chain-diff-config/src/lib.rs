// crates/chain-diff-config/src/lib.rs
// ============================================================================
// Module: Chain Diff Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for chain-diff.toml semantics.
// Dependencies: chain-diff-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `chain-diff-config` defines the configuration model for Chain Diff: the two
//! JSON-RPC targets, dispatcher and scheduler tuning, fixture defaults, and
//! the event log destination. Loading is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
