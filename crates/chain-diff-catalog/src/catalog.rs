// crates/chain-diff-catalog/src/catalog.rs
// ============================================================================
// Module: Comparison Catalog
// Description: Shared comparison source, method table, and argument helpers.
// Purpose: Assemble the named operations run on every pass.
// Dependencies: chain-diff-core
// ============================================================================

//! ## Overview
//! [`ChainComparisons`] owns the tunables shared by every comparison and
//! exposes one `compare_*` method per operation. The method table below is
//! the only place an operation is listed; [`register_catalog`] turns it into
//! registry entries named after the method (`compare_chain_head` becomes
//! `ChainHead`).
//! Invariants:
//! - Every operation issues its calls through the pass dispatcher.
//! - Operations without usable fixture data succeed without issuing calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use chain_diff_core::Arg;
use chain_diff_core::ComparisonRequest;
use chain_diff_core::DispatchError;
use chain_diff_core::MethodEntry;
use chain_diff_core::MethodSource;
use chain_diff_core::OperationRegistry;
use chain_diff_core::PassContext;
use chain_diff_core::method_table;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Method prefix marking comparison operations.
pub const OPERATION_PREFIX: &str = "compare_";

// ============================================================================
// SECTION: Source
// ============================================================================

/// Comparison operations for the chain, state, and eth method families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainComparisons {
    /// Distance below the checkpoint used for by-height lookups.
    pub(crate) height_lookback: u64,
    /// Distance above the by-height lookup that must be rejected.
    pub(crate) too_high_offset: u64,
    /// Depth of the path compared by `ChainGetPath`.
    pub(crate) path_depth: u64,
    /// Distance below the checkpoint used as the message listing floor.
    pub(crate) list_lookback: u64,
    /// Maximum sampled messages searched per pass.
    pub(crate) search_limit: usize,
    /// Confidence passed to message waits.
    pub(crate) wait_confidence: u64,
    /// Accepted lag between the two block numbers.
    pub(crate) block_number_tolerance: u64,
}

impl Default for ChainComparisons {
    fn default() -> Self {
        Self {
            height_lookback: 10,
            too_high_offset: 100,
            path_depth: 5,
            list_lookback: 20,
            search_limit: 5,
            wait_confidence: 5,
            block_number_tolerance: 1,
        }
    }
}

impl MethodSource for ChainComparisons {
    fn methods() -> Vec<MethodEntry<Self>> {
        method_table!(ChainComparisons {
            compare_chain_get_tip_set,
            compare_chain_get_tip_set_by_height,
            compare_chain_get_block,
            compare_chain_get_block_messages,
            compare_chain_get_message,
            compare_chain_get_messages_in_tipset,
            compare_chain_get_parent_messages,
            compare_chain_get_parent_receipts,
            compare_chain_get_genesis,
            compare_chain_get_path,
            compare_state_network_name,
            compare_state_network_version,
            compare_state_get_network_params,
            compare_state_account_key,
            compare_state_read_state,
            compare_state_verifier_status,
            compare_state_search_msg,
            compare_state_wait_msg,
            compare_state_call,
            compare_state_replay,
            compare_state_decode_params,
            compare_state_verified_registry_root_key,
            compare_state_list_messages,
            compare_state_get_beacon_entry,
            compare_eth_block_number,
            compare_eth_chain_id,
            compare_net_version,
            compare_net_listening,
            compare_eth_protocol_version,
            compare_eth_accounts,
            compare_eth_gas_price,
            compare_web3_client_version,
            compare_eth_get_block_transaction_count_by_number,
            compare_eth_get_block_by_number,
            compare_eth_get_balance,
            compare_eth_get_transaction_count,
            compare_eth_get_transaction_by_block_number_and_index,
            compare_eth_get_block_by_hash,
            compare_eth_get_block_transaction_count_by_hash,
            compare_eth_get_transaction_by_hash,
            compare_eth_get_transaction_receipt,
            compare_eth_get_transaction_hash_by_cid,
            compare_eth_get_message_cid_by_transaction_hash,
            compare_eth_call,
            compare_eth_get_code,
            compare_eth_get_storage_at,
            compare_eth_max_priority_fee_per_gas,
            compare_eth_address_to_filecoin_address,
        })
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers every catalog operation into `registry`.
///
/// Returns the number of operations registered.
pub fn register_catalog(
    registry: &mut OperationRegistry,
    source: &Arc<ChainComparisons>,
) -> usize {
    registry.register_methods(source, OPERATION_PREFIX)
}

/// Builds a registry holding the default catalog.
#[must_use]
pub fn catalog() -> OperationRegistry {
    OperationRegistry::build_from_methods(&Arc::new(ChainComparisons::default()), OPERATION_PREFIX)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes a height as a signed epoch argument.
pub(crate) fn epoch(height: u64) -> Result<Arg, DispatchError> {
    i64::try_from(height)
        .map(Arg::Int)
        .map_err(|_| DispatchError::InvalidArgument(format!("height {height} exceeds epoch range")))
}

/// Returns the checkpoint key of the pass as an argument.
pub(crate) fn pass_key(pass: &PassContext) -> Arg {
    Arg::Key(pass.checkpoint().key.clone())
}

/// Submits every request, then waits for all of them.
///
/// Returns the first failure in submission order.
pub(crate) async fn compare_all(
    pass: &PassContext,
    requests: Vec<ComparisonRequest>,
) -> Result<(), DispatchError> {
    let submissions: Vec<_> = requests
        .into_iter()
        .map(|request| pass.dispatcher().submit(pass.call_context(), request))
        .collect();
    let mut first_failure = None;
    for submission in submissions {
        if let Err(err) = submission.outcome().await {
            first_failure.get_or_insert(err);
        }
    }
    first_failure.map_or(Ok(()), Err)
}

/// Maps an ID-protocol address (`f0123`) to its masked eth address.
///
/// Returns `None` for any other address protocol.
#[must_use]
pub fn masked_id_address(address: &str) -> Option<String> {
    if !chain_diff_core::core::fixtures::is_id_address(address) {
        return None;
    }
    let id: u64 = address.get(2 ..)?.parse().ok()?;
    Some(format!("0xff{}{id:016x}", "00".repeat(11)))
}
