// crates/chain-diff-catalog/src/lib.rs
// ============================================================================
// Module: Chain Diff Catalog
// Description: Named comparison operations for chain, state, and eth reads.
// Purpose: Provide the default operation set run on every pass.
// Dependencies: chain-diff-core, serde_json
// ============================================================================

//! ## Overview
//! The catalog is a single comparison source, [`ChainComparisons`], whose
//! `compare_*` methods are registered by name through a method table. The
//! chain, state, and eth families live in their own modules.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
mod chain;
mod eth;
mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::ChainComparisons;
pub use catalog::OPERATION_PREFIX;
pub use catalog::catalog;
pub use catalog::masked_id_address;
pub use catalog::register_catalog;
