// crates/chain-diff-catalog/src/state.rs
// ============================================================================
// Module: State Comparisons
// Description: Network, actor, and message search read operations.
// Purpose: Compare state reads evaluated at the pass checkpoint.
// Dependencies: chain-diff-core
// ============================================================================

//! ## Overview
//! State reads take the checkpoint key as their evaluation point. Reads that
//! need an account use the fixture's sampled senders and skip the pass when
//! none were sampled. Message execution replies are compared by the serialized
//! text of their receipt, gas cost, and trace; timing fields are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chain_diff_core::Arg;
use chain_diff_core::CheckpointKey;
use chain_diff_core::ComparisonRequest;
use chain_diff_core::DispatchError;
use chain_diff_core::MessageMatch;
use chain_diff_core::PassContext;
use chain_diff_core::equivalence::checks::numeric_equal;
use chain_diff_core::equivalence::checks::serialized_fields;

use crate::catalog::ChainComparisons;
use crate::catalog::compare_all;
use crate::catalog::epoch;
use crate::catalog::pass_key;

// ============================================================================
// SECTION: Method Names
// ============================================================================

/// Network name.
const STATE_NETWORK_NAME: &str = "StateNetworkName";
/// Network version at a tipset.
const STATE_NETWORK_VERSION: &str = "StateNetworkVersion";
/// Static network parameters.
const STATE_GET_NETWORK_PARAMS: &str = "StateGetNetworkParams";
/// Key address of an account.
const STATE_ACCOUNT_KEY: &str = "StateAccountKey";
/// Decoded actor state.
const STATE_READ_STATE: &str = "StateReadState";
/// Verifier data cap.
const STATE_VERIFIER_STATUS: &str = "StateVerifierStatus";
/// Message inclusion lookup.
const STATE_SEARCH_MSG: &str = "StateSearchMsg";
/// Message inclusion wait.
const STATE_WAIT_MSG: &str = "StateWaitMsg";
/// Message execution against a tipset's state.
const STATE_CALL: &str = "StateCall";
/// Replay of an included message.
const STATE_REPLAY: &str = "StateReplay";
/// Parameter decoding for an actor method.
const STATE_DECODE_PARAMS: &str = "StateDecodeParams";
/// Verified registry root key.
const STATE_VERIFIED_REGISTRY_ROOT_KEY: &str = "StateVerifiedRegistryRootKey";
/// Messages matching a filter.
const STATE_LIST_MESSAGES: &str = "StateListMessages";
/// Beacon entry for an epoch.
const STATE_GET_BEACON_ENTRY: &str = "StateGetBeaconEntry";

/// Search lookback meaning "no limit".
const LOOKBACK_NO_LIMIT: i64 = -1;

/// Execution reply fields that must serialize identically.
const INVOCATION_FIELDS: &[&str] = &["MsgRct", "GasCost", "ExecutionTrace"];

// ============================================================================
// SECTION: Operations
// ============================================================================

impl ChainComparisons {
    /// Compares the network name.
    pub(crate) async fn compare_state_network_name(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(STATE_NETWORK_NAME, Vec::new())).await
    }

    /// Compares the network version at the checkpoint.
    pub(crate) async fn compare_state_network_version(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(STATE_NETWORK_VERSION, vec![pass_key(pass)])).await
    }

    /// Compares the static network parameters.
    pub(crate) async fn compare_state_get_network_params(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        pass.compare(ComparisonRequest::new(STATE_GET_NETWORK_PARAMS, Vec::new())).await
    }

    /// Resolves the first sampled sender to its key address.
    pub(crate) async fn compare_state_account_key(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(sender) = pass.fixtures().first_sender() else {
            return Ok(());
        };
        let args = vec![Arg::Address(sender.to_string()), pass_key(pass)];
        pass.compare(ComparisonRequest::new(STATE_ACCOUNT_KEY, args)).await
    }

    /// Reads the first sender's actor state, or the default miner's.
    pub(crate) async fn compare_state_read_state(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let fixtures = pass.fixtures();
        let actor = fixtures.first_sender().unwrap_or_else(|| fixtures.default_miner());
        let args = vec![Arg::Address(actor.to_string()), pass_key(pass)];
        pass.compare(ComparisonRequest::new(STATE_READ_STATE, args)).await
    }

    /// Data caps match by numeric value, however each side encodes them.
    pub(crate) async fn compare_state_verifier_status(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let miner = pass.fixtures().default_miner().to_string();
        let args = vec![Arg::Address(miner), pass_key(pass)];
        let request =
            ComparisonRequest::new(STATE_VERIFIER_STATUS, args).with_check(numeric_equal());
        pass.compare(request).await
    }

    /// Searches for the first sampled messages.
    pub(crate) async fn compare_state_search_msg(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let requests = pass
            .fixtures()
            .messages()
            .iter()
            .take(self.search_limit)
            .map(|message| {
                ComparisonRequest::new(
                    STATE_SEARCH_MSG,
                    vec![
                        pass_key(pass),
                        Arg::Cid(message.cid.clone()),
                        Arg::Int(LOOKBACK_NO_LIMIT),
                        Arg::Bool(true),
                    ],
                )
            })
            .collect();
        compare_all(pass, requests).await
    }

    /// Waits on the first sampled messages with the configured confidence.
    pub(crate) async fn compare_state_wait_msg(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let requests = pass
            .fixtures()
            .messages()
            .iter()
            .take(self.search_limit)
            .map(|message| {
                ComparisonRequest::new(
                    STATE_WAIT_MSG,
                    vec![
                        Arg::Cid(message.cid.clone()),
                        Arg::Uint(self.wait_confidence),
                        Arg::Int(LOOKBACK_NO_LIMIT),
                        Arg::Bool(true),
                    ],
                )
            })
            .collect();
        compare_all(pass, requests).await
    }

    /// Executes the first sampled message against the checkpoint state.
    pub(crate) async fn compare_state_call(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(message) = pass.fixtures().first_message() else {
            return Ok(());
        };
        let descriptor = message
            .to_descriptor()
            .map_err(|err| DispatchError::InvalidArgument(err.to_string()))?;
        let args = vec![Arg::Message(descriptor), pass_key(pass)];
        let request = ComparisonRequest::new(STATE_CALL, args)
            .with_check(serialized_fields(INVOCATION_FIELDS));
        pass.compare(request).await
    }

    /// Replays the first sampled message; the empty key lets nodes locate it.
    pub(crate) async fn compare_state_replay(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(message) = pass.fixtures().first_message() else {
            return Ok(());
        };
        let args = vec![Arg::Key(CheckpointKey::empty()), Arg::Cid(message.cid.clone())];
        let request = ComparisonRequest::new(STATE_REPLAY, args)
            .with_check(serialized_fields(INVOCATION_FIELDS));
        pass.compare(request).await
    }

    /// Decodes the parameters of the first sampled message that has any.
    pub(crate) async fn compare_state_decode_params(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let sampled = pass.fixtures().messages().iter().find(|message| {
            message.params.as_deref().is_some_and(|params| !params.is_empty())
        });
        let Some(message) = sampled else {
            return Ok(());
        };
        let descriptor = message
            .to_descriptor()
            .map_err(|err| DispatchError::InvalidArgument(err.to_string()))?;
        let args = vec![
            Arg::Address(descriptor.to),
            Arg::Uint(descriptor.method),
            Arg::Bytes(descriptor.params),
            Arg::Key(CheckpointKey::empty()),
        ];
        pass.compare(ComparisonRequest::new(STATE_DECODE_PARAMS, args)).await
    }

    /// Compares the verified registry root key at the checkpoint.
    pub(crate) async fn compare_state_verified_registry_root_key(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let args = vec![pass_key(pass)];
        pass.compare(ComparisonRequest::new(STATE_VERIFIED_REGISTRY_ROOT_KEY, args)).await
    }

    /// Lists messages sent by the first sampled sender since a recent floor.
    pub(crate) async fn compare_state_list_messages(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let Some(sender) = pass.fixtures().first_sender() else {
            return Ok(());
        };
        let filter = MessageMatch { from: Some(sender.to_string()), to: None };
        let floor = pass.checkpoint().height.saturating_sub(self.list_lookback);
        let args = vec![Arg::MessageMatch(filter), Arg::Key(CheckpointKey::empty()), epoch(floor)?];
        pass.compare(ComparisonRequest::new(STATE_LIST_MESSAGES, args)).await
    }

    /// Compares the beacon entry for the checkpoint height.
    pub(crate) async fn compare_state_get_beacon_entry(
        &self,
        pass: &PassContext,
    ) -> Result<(), DispatchError> {
        let height = epoch(pass.checkpoint().height)?;
        pass.compare(ComparisonRequest::new(STATE_GET_BEACON_ENTRY, vec![height])).await
    }
}
