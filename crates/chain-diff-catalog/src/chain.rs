// crates/chain-diff-catalog/src/chain.rs
// ============================================================================
// Module: Chain Comparisons
// Description: Tipset, block, and message read operations.
// Purpose: Compare chain reads at the pass checkpoint.
// Dependencies: chain-diff-core, serde_json
// ============================================================================

//! ## Overview
//! Chain reads keyed by the pass checkpoint and its blocks. Per-block reads
//! are submitted together and awaited as a group.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chain_diff_core::Arg;
use chain_diff_core::CheckpointKey;
use chain_diff_core::ComparisonRequest;
use chain_diff_core::DispatchError;
use chain_diff_core::PassContext;
use chain_diff_core::Side;
use chain_diff_core::Target;
use chain_diff_core::equivalence::checks::checkpoint_equal;
use chain_diff_core::equivalence::checks::superset_of;
use chain_diff_core::interfaces::checkpoint_after_height;
use serde_json::Value;

use crate::catalog::ChainComparisons;
use crate::catalog::compare_all;
use crate::catalog::epoch;
use crate::catalog::pass_key;

// ============================================================================
// SECTION: Method Names
// ============================================================================

/// Tipset by key.
const CHAIN_GET_TIP_SET: &str = "ChainGetTipSet";
/// Tipset by height.
const CHAIN_GET_TIP_SET_BY_HEIGHT: &str = "ChainGetTipSetByHeight";
/// Block header by identifier.
const CHAIN_GET_BLOCK: &str = "ChainGetBlock";
/// Messages included in a block.
const CHAIN_GET_BLOCK_MESSAGES: &str = "ChainGetBlockMessages";
/// Message by identifier.
const CHAIN_GET_MESSAGE: &str = "ChainGetMessage";
/// Deduplicated messages of a tipset.
const CHAIN_GET_MESSAGES_IN_TIPSET: &str = "ChainGetMessagesInTipset";
/// Messages executed by a block's parent.
const CHAIN_GET_PARENT_MESSAGES: &str = "ChainGetParentMessages";
/// Receipts of a block's parent messages.
const CHAIN_GET_PARENT_RECEIPTS: &str = "ChainGetParentReceipts";
/// Genesis tipset.
const CHAIN_GET_GENESIS: &str = "ChainGetGenesis";
/// Head changes between two tipsets.
const CHAIN_GET_PATH: &str = "ChainGetPath";

// ============================================================================
// SECTION: Operations
// ============================================================================

impl ChainComparisons {
    /// Compares the checkpoint tipset.
    pub(crate) async fn compare_chain_get_tip_set(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(CHAIN_GET_TIP_SET, vec![pass_key(pass)])).await
    }

    /// Compares a lookback lookup, then requires both sides to reject a
    /// height above the checkpoint.
    pub(crate) async fn compare_chain_get_tip_set_by_height(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let height = pass.checkpoint().height.saturating_sub(self.height_lookback);
        pass.compare(ComparisonRequest::new(
            CHAIN_GET_TIP_SET_BY_HEIGHT,
            vec![epoch(height)?, pass_key(pass)],
        ))
        .await?;
        let too_high = height.saturating_add(self.too_high_offset);
        let above_checkpoint = vec![epoch(too_high)?, pass_key(pass)];
        let request =
            ComparisonRequest::new(CHAIN_GET_TIP_SET_BY_HEIGHT, above_checkpoint).expect_error();
        pass.compare(request).await
    }

    /// Compares every block header of the checkpoint.
    pub(crate) async fn compare_chain_get_block(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        compare_all(pass, per_block(pass, CHAIN_GET_BLOCK)).await
    }

    /// Every message the candidate lists must also be listed by the reference.
    pub(crate) async fn compare_chain_get_block_messages(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let requests = per_block(pass, CHAIN_GET_BLOCK_MESSAGES)
            .into_iter()
            .map(|request| request.with_check(superset_of("/Cids")))
            .collect();
        compare_all(pass, requests).await
    }

    /// Compares every message the reference lists for the checkpoint blocks.
    pub(crate) async fn compare_chain_get_message(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let reference = pass.dispatcher().reference().as_ref();
        let mut requests = Vec::new();
        for block in pass.checkpoint().key.cids() {
            let args = [Arg::Cid(block.clone())];
            let listing =
                Target::invoke(reference, pass.call_context(), CHAIN_GET_BLOCK_MESSAGES, &args)
                    .await
                    .map_err(|error| DispatchError::SideFailed { side: Side::Reference, error })?;
            for cid in message_cids(&listing) {
                requests.push(ComparisonRequest::new(CHAIN_GET_MESSAGE, vec![Arg::Cid(cid)]));
            }
        }
        compare_all(pass, requests).await
    }

    /// Compares the deduplicated tipset messages.
    pub(crate) async fn compare_chain_get_messages_in_tipset(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(CHAIN_GET_MESSAGES_IN_TIPSET, vec![pass_key(pass)]))
            .await
    }

    /// Compares parent messages per block.
    pub(crate) async fn compare_chain_get_parent_messages(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        compare_all(pass, per_block(pass, CHAIN_GET_PARENT_MESSAGES)).await
    }

    /// Compares parent receipts per block.
    pub(crate) async fn compare_chain_get_parent_receipts(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        compare_all(pass, per_block(pass, CHAIN_GET_PARENT_RECEIPTS)).await
    }

    /// Genesis tipsets match when their height and key match.
    pub(crate) async fn compare_chain_get_genesis(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let request =
            ComparisonRequest::new(CHAIN_GET_GENESIS, Vec::new()).with_check(checkpoint_equal());
        pass.compare(request).await
    }

    /// Compares the path from a recent ancestor (resolved on the reference)
    /// to the pass checkpoint.
    pub(crate) async fn compare_chain_get_path(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let from_height = pass.checkpoint().height.saturating_sub(self.path_depth);
        let from = checkpoint_after_height(
            pass.dispatcher().reference().as_ref(),
            pass.call_context(),
            from_height,
        )
        .await
        .map_err(|error| DispatchError::SideFailed { side: Side::Reference, error })?;
        let args = vec![Arg::Key(from.key), pass_key(pass)];
        pass.compare(ComparisonRequest::new(CHAIN_GET_PATH, args)).await
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds one request per checkpoint block.
fn per_block(pass: &PassContext, method: &str) -> Vec<ComparisonRequest> {
    pass.checkpoint()
        .key
        .cids()
        .iter()
        .map(|block| ComparisonRequest::new(method, vec![Arg::Cid(block.clone())]))
        .collect()
}

/// Reads the message identifiers of a block-messages reply.
fn message_cids(listing: &Value) -> Vec<String> {
    listing
        .get("Cids")
        .and_then(CheckpointKey::from_json)
        .map(|key| key.cids().to_vec())
        .unwrap_or_default()
}
