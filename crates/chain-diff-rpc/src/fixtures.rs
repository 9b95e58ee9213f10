// crates/chain-diff-rpc/src/fixtures.rs
// ============================================================================
// Module: RPC Fixture Builder
// Description: Derives per-pass sample data from the reference target.
// Purpose: Give operations realistic addresses and messages at each checkpoint.
// Dependencies: async-trait, serde, serde_json
// ============================================================================

//! ## Overview
//! [`RpcFixtureBuilder`] reads the parent messages and parent receipts of the
//! checkpoint's first block from the reference target and hands them to
//! [`FixtureData::derive`]. A `null` list is treated as empty. The eth block
//! hash of the checkpoint is read from the reference's `EthGetBlockByNumber`
//! reply; a node that rejects the lookup or reports a null round leaves the
//! hash unknown.
//! Invariants:
//! - Only the reference target is consulted.
//! - Message and receipt counts must match or the pass is abandoned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use chain_diff_core::Arg;
use chain_diff_core::CallContext;
use chain_diff_core::Checkpoint;
use chain_diff_core::FixtureBuilder;
use chain_diff_core::FixtureData;
use chain_diff_core::SampleMessage;
use chain_diff_core::SampleReceipt;
use chain_diff_core::EthHash;
use chain_diff_core::SetupError;
use chain_diff_core::Target;
use chain_diff_core::TargetError;
use chain_diff_core::core::args::parse_hash;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Method listing the messages included by a block's parent checkpoint.
pub const CHAIN_GET_PARENT_MESSAGES: &str = "ChainGetParentMessages";
/// Method listing the receipts of a block's parent messages.
pub const CHAIN_GET_PARENT_RECEIPTS: &str = "ChainGetParentReceipts";
/// Eth block lookup used to learn the checkpoint's block hash.
pub const ETH_GET_BLOCK_BY_NUMBER: &str = "EthGetBlockByNumber";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Content identifier link (`{"/": "..."}`).
#[derive(Debug, Deserialize)]
struct CidLink {
    /// Encoded identifier.
    #[serde(rename = "/")]
    cid: String,
}

/// Entry of a parent-messages reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParentMessage {
    /// Message identifier.
    cid: CidLink,
    /// Message body.
    message: MessageBody,
}

/// Unsigned message body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MessageBody {
    /// Sender address.
    from: String,
    /// Recipient address.
    to: String,
    /// Sender nonce.
    nonce: u64,
    /// Actor method number.
    method: u64,
    /// Encoded parameters.
    #[serde(default)]
    params: Option<String>,
    /// Transferred value.
    #[serde(default)]
    value: String,
    /// Gas limit.
    #[serde(default)]
    gas_limit: i64,
    /// Fee cap.
    #[serde(default)]
    gas_fee_cap: String,
    /// Gas premium.
    #[serde(default)]
    gas_premium: String,
}

/// Subset of an eth block reply.
#[derive(Debug, Deserialize)]
struct EthBlock {
    /// `0x` block hash.
    hash: String,
}

/// Entry of a parent-receipts reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Receipt {
    /// Execution exit code.
    exit_code: i64,
    /// Root of emitted events.
    #[serde(default)]
    events_root: Option<CidLink>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Fixture builder backed by the reference target.
pub struct RpcFixtureBuilder {
    /// Reference target.
    target: Arc<dyn Target>,
    /// Default miner address recorded in every fixture.
    default_miner: String,
}

impl RpcFixtureBuilder {
    /// Creates a builder reading from `target`.
    #[must_use]
    pub fn new(target: Arc<dyn Target>, default_miner: impl Into<String>) -> Self {
        Self { target, default_miner: default_miner.into() }
    }

    /// Invokes a list-returning method and decodes its entries.
    async fn fetch_list<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: &str,
        block: &str,
    ) -> Result<Vec<T>, SetupError> {
        let value = self
            .target
            .invoke(ctx, method, &[Arg::Cid(block.to_string())])
            .await
            .map_err(|error| self.target_error(error))?;
        decode_list(method, value)
    }

    /// Looks up the eth block hash at `height`.
    async fn fetch_block_hash(
        &self,
        ctx: &CallContext,
        height: u64,
    ) -> Result<Option<EthHash>, SetupError> {
        let args = [Arg::Quantity(height), Arg::Bool(false)];
        let value = match self.target.invoke(ctx, ETH_GET_BLOCK_BY_NUMBER, &args).await {
            Ok(value) => value,
            Err(TargetError::Rpc { .. }) => return Ok(None),
            Err(error) => return Err(self.target_error(error)),
        };
        decode_block_hash(value)
    }

    /// Wraps a reference failure.
    fn target_error(&self, error: TargetError) -> SetupError {
        SetupError::Target { label: self.target.label().to_string(), error }
    }
}

#[async_trait]
impl FixtureBuilder for RpcFixtureBuilder {
    async fn build(
        &self,
        ctx: &CallContext,
        checkpoint: &Checkpoint,
    ) -> Result<FixtureData, SetupError> {
        let block =
            checkpoint.first_block().ok_or(SetupError::EmptyCheckpoint(checkpoint.height))?;
        let messages: Vec<ParentMessage> =
            self.fetch_list(ctx, CHAIN_GET_PARENT_MESSAGES, block).await?;
        let receipts: Vec<Receipt> = self.fetch_list(ctx, CHAIN_GET_PARENT_RECEIPTS, block).await?;
        let messages = messages.into_iter().map(SampleMessage::from).collect();
        let receipts: Vec<SampleReceipt> = receipts.into_iter().map(SampleReceipt::from).collect();
        let block_hash = self.fetch_block_hash(ctx, checkpoint.height).await?;
        let data =
            FixtureData::derive(checkpoint.height, self.default_miner.clone(), messages, &receipts)
                .map_err(|err| SetupError::Fixture(err.to_string()))?;
        Ok(data.with_block_hash(block_hash))
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

impl From<ParentMessage> for SampleMessage {
    fn from(entry: ParentMessage) -> Self {
        Self {
            cid: entry.cid.cid,
            from: entry.message.from,
            to: entry.message.to,
            nonce: entry.message.nonce,
            method: entry.message.method,
            params: entry.message.params,
            value: entry.message.value,
            gas_limit: entry.message.gas_limit,
            gas_fee_cap: entry.message.gas_fee_cap,
            gas_premium: entry.message.gas_premium,
        }
    }
}

impl From<Receipt> for SampleReceipt {
    fn from(receipt: Receipt) -> Self {
        Self {
            exit_code: receipt.exit_code,
            events_root: receipt.events_root.map(|link| link.cid),
        }
    }
}

/// Decodes a JSON list, treating `null` as empty.
fn decode_list<T: DeserializeOwned>(method: &str, value: Value) -> Result<Vec<T>, SetupError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value)
        .map_err(|err| SetupError::Fixture(format!("{method} reply malformed: {err}")))
}

/// Decodes the block hash of an eth block reply; `null` means a null round.
fn decode_block_hash(value: Value) -> Result<Option<EthHash>, SetupError> {
    if value.is_null() {
        return Ok(None);
    }
    let block: EthBlock = serde_json::from_value(value).map_err(|err| {
        SetupError::Fixture(format!("{ETH_GET_BLOCK_BY_NUMBER} reply malformed: {err}"))
    })?;
    parse_hash(&block.hash).map(Some).ok_or_else(|| {
        SetupError::Fixture(format!("{ETH_GET_BLOCK_BY_NUMBER} hash malformed: {}", block.hash))
    })
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn null_lists_decode_as_empty() {
        let receipts: Vec<Receipt> = decode_list(CHAIN_GET_PARENT_RECEIPTS, Value::Null).unwrap();
        assert!(receipts.is_empty());
    }

    #[test]
    fn lotus_message_shape_converts() {
        let entries: Vec<ParentMessage> = decode_list(
            CHAIN_GET_PARENT_MESSAGES,
            json!([{
                "Cid": { "/": "bafymsg" },
                "Message": {
                    "Version": 0,
                    "From": "t1sender",
                    "To": "t01234",
                    "Nonce": 7,
                    "Method": 2,
                    "Params": null,
                    "Value": "1000",
                    "GasLimit": 100
                }
            }]),
        )
        .unwrap();
        let message = SampleMessage::from(entries.into_iter().next().unwrap());
        assert_eq!(message.cid, "bafymsg");
        assert_eq!(message.to, "t01234");
        assert_eq!(message.nonce, 7);
        assert_eq!(message.params, None);
    }

    #[test]
    fn block_hashes_decode_from_eth_blocks() {
        let hash = format!("0x{}", "ab".repeat(32));
        let decoded = decode_block_hash(json!({ "hash": hash, "number": "0xc8" })).unwrap();
        assert_eq!(decoded, Some([0xab; 32]));
        assert_eq!(decode_block_hash(Value::Null).unwrap(), None);
        let err = decode_block_hash(json!({ "hash": "0x1234" })).unwrap_err();
        assert!(matches!(err, SetupError::Fixture(_)));
    }

    #[test]
    fn malformed_lists_are_fixture_errors() {
        let err = decode_list::<Receipt>(CHAIN_GET_PARENT_RECEIPTS, json!({ "ExitCode": 0 }))
            .unwrap_err();
        assert!(matches!(err, SetupError::Fixture(_)));
    }
}
