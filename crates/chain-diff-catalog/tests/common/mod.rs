// crates/chain-diff-catalog/tests/common/mod.rs
// ============================================================================
// Module: Common Catalog Test Fixtures
// Description: Scripted node targets and pass contexts for catalog tests.
// Purpose: Run catalog operations without a network.
// Dependencies: chain-diff-core, tokio
// ============================================================================

//! ## Overview
//! [`ScriptedNode`] answers calls from a handler closure and records every
//! call; [`node_reply`] is a plausible node that both sides can share.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chain_diff_core::Arg;
use chain_diff_core::CallContext;
use chain_diff_core::Checkpoint;
use chain_diff_core::CheckpointKey;
use chain_diff_core::ConverterSet;
use chain_diff_core::Dispatcher;
use chain_diff_core::DispatcherConfig;
use chain_diff_core::FixtureData;
use chain_diff_core::NoopEventSink;
use chain_diff_core::PassContext;
use chain_diff_core::SampleMessage;
use chain_diff_core::SampleReceipt;
use chain_diff_core::ShutdownSignal;
use chain_diff_core::Target;
use chain_diff_core::TargetError;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Height of the pass checkpoint.
pub const HEIGHT: u64 = 100;

/// CIDv1 (dag-cbor, blake2b-256) whose digest is the bytes `0x00..=0x1f`.
pub const COUNTING_CID: &str = "bafy2bzaceaaacaqdaqcqmbyibefawdanbyhraeiscmkbkfqxdamrugy4dupb6";

/// Eth block hash attached by [`hashed_fixtures`].
pub const BLOCK_HASH: [u8; 32] = [0xbb; 32];

/// Handler signature shared by scripted nodes.
type Handler = dyn Fn(&str, &[Arg]) -> Result<Value, TargetError> + Send + Sync;

// ============================================================================
// SECTION: Scripted Node
// ============================================================================

/// Target answering from a closure and recording every call.
pub struct ScriptedNode {
    /// Target label.
    label: String,
    /// Reply handler.
    handler: Box<Handler>,
    /// Calls seen so far.
    seen: Mutex<Vec<(String, Vec<Arg>)>>,
}

impl ScriptedNode {
    /// Creates a node with a custom handler.
    pub fn new<F>(label: &str, handler: F) -> Self
    where
        F: Fn(&str, &[Arg]) -> Result<Value, TargetError> + Send + Sync + 'static,
    {
        Self { label: label.to_string(), handler: Box::new(handler), seen: Mutex::new(Vec::new()) }
    }

    /// Creates a node answering with [`node_reply`].
    pub fn healthy(label: &str) -> Self {
        Self::new(label, node_reply)
    }

    /// Returns every call seen so far.
    pub fn seen(&self) -> Vec<(String, Vec<Arg>)> {
        self.seen.lock().unwrap().clone()
    }

    /// Returns the calls made to one method.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<Arg>> {
        self.seen()
            .into_iter()
            .filter(|(name, _)| name == method)
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl Target for ScriptedNode {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        _ctx: &CallContext,
        method: &str,
        args: &[Arg],
    ) -> Result<Value, TargetError> {
        self.seen.lock().unwrap().push((method.to_string(), args.to_vec()));
        (self.handler)(method, args)
    }
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Tipset-shaped reply.
pub fn tipset(height: u64, cids: &[&str]) -> Value {
    let links: Vec<Value> = cids.iter().map(|cid| json!({ "/": cid })).collect();
    json!({ "Cids": links, "Blocks": [], "Height": height })
}

/// Reply of a consistent node at [`HEIGHT`].
pub fn node_reply(method: &str, args: &[Arg]) -> Result<Value, TargetError> {
    match method {
        "ChainGetTipSetAfterHeight" => {
            let height = match args.first() {
                Some(Arg::Int(height)) => u64::try_from(*height).unwrap(),
                _ => HEIGHT,
            };
            Ok(tipset(height, &["bafyancestor"]))
        }
        "ChainGetTipSetByHeight" => match args.first() {
            Some(Arg::Int(height)) if u64::try_from(*height).unwrap() > HEIGHT => {
                Err(TargetError::Rpc {
                    code: 1,
                    message: "looking for tipset with height greater than start point".to_string(),
                })
            }
            _ => Ok(tipset(HEIGHT - 10, &["bafylookback"])),
        },
        "ChainGetGenesis" => Ok(tipset(0, &["bafygenesis"])),
        "ChainGetBlockMessages" => Ok(json!({
            "BlsMessages": [],
            "SecpkMessages": [],
            "Cids": [{ "/": "bafymsg1" }, { "/": "bafymsg2" }]
        })),
        "StateVerifierStatus" => Ok(json!("1000")),
        "EthBlockNumber" => Ok(json!("0x64")),
        "EthGasPrice" => Ok(json!("0x5f5e100")),
        _ => {
            let params: Vec<Value> = args.iter().map(Arg::to_param).collect();
            Ok(json!({ "method": method, "params": params }))
        }
    }
}

// ============================================================================
// SECTION: Pass Context
// ============================================================================

/// Checkpoint at [`HEIGHT`] with two blocks.
pub fn checkpoint() -> Checkpoint {
    Checkpoint::new(HEIGHT, CheckpointKey::new(["bafyblock1", "bafyblock2"]))
}

/// Fixture data with two sampled messages from ID-address senders.
pub fn sampled_fixtures() -> FixtureData {
    let message = |cid: &str, from: &str| SampleMessage {
        cid: cid.to_string(),
        from: from.to_string(),
        to: "t01002".to_string(),
        nonce: 1,
        value: "0".to_string(),
        ..SampleMessage::default()
    };
    FixtureData::derive(
        HEIGHT,
        "t01000",
        vec![message("bafymsg1", "t01500"), message("bafymsg2", "t1sender")],
        &[SampleReceipt::default(), SampleReceipt::default()],
    )
    .unwrap()
}

/// Fixture data with one parameterized message that has an eth hash, and a
/// known block hash.
pub fn hashed_fixtures() -> FixtureData {
    let message = SampleMessage {
        cid: COUNTING_CID.to_string(),
        from: "t01500".to_string(),
        to: "t01002".to_string(),
        nonce: 3,
        method: 2,
        params: Some("ggE=".to_string()),
        value: "10".to_string(),
        gas_limit: 1_000_000,
        gas_fee_cap: "100".to_string(),
        gas_premium: "1".to_string(),
    };
    FixtureData::derive(HEIGHT, "t01000", vec![message], &[SampleReceipt::default()])
        .unwrap()
        .with_block_hash(Some(BLOCK_HASH))
}

/// Eth hash of [`COUNTING_CID`].
pub fn counting_hash() -> [u8; 32] {
    std::array::from_fn(|index| u8::try_from(index).unwrap())
}

/// Builds a pass context over two nodes.
pub fn pass_context(
    reference: &Arc<ScriptedNode>,
    candidate: &Arc<ScriptedNode>,
    fixtures: FixtureData,
) -> PassContext {
    let dispatcher = Dispatcher::new(
        Arc::clone(reference) as Arc<dyn Target>,
        Arc::clone(candidate) as Arc<dyn Target>,
        ConverterSet::new(),
        DispatcherConfig::default(),
        Arc::new(NoopEventSink),
    );
    PassContext::new(
        Arc::new(checkpoint()),
        Arc::new(fixtures),
        dispatcher,
        CallContext::new(HEIGHT, ShutdownSignal::never()),
    )
}
