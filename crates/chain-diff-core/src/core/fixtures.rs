// crates/chain-diff-core/src/core/fixtures.rs
// ============================================================================
// Module: Chain Diff Fixture Data
// Description: Per-checkpoint sample inputs derived from checkpoint content.
// Purpose: Give comparison operations realistic arguments for each pass.
// Dependencies: base64, serde, thiserror
// ============================================================================

//! ## Overview
//! [`FixtureData`] is rebuilt at the start of every pass from the messages and
//! receipts included at the checkpoint. Operations read it through a shared
//! snapshot and never mutate it.
//! Invariants:
//! - Messages whose receipt carries a non-zero exit code are never sampled.
//! - Messages with an events root are ordered before other messages.
//! - Sender and ID address lists are de-duplicated in first-seen order.
//!
//! Eth hashes of messages are the 32-byte digest of the message CID; the
//! checkpoint's eth block hash is looked up by the fixture builder and
//! attached with [`FixtureData::with_block_hash`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::args::MessageDescriptor;
use crate::core::args::hex_quantity;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default miner address used when a checkpoint yields no ID addresses.
pub const DEFAULT_MINER: &str = "t01000";

// ============================================================================
// SECTION: Samples
// ============================================================================

/// Length of an eth block or transaction hash.
pub const ETH_HASH_LEN: usize = 32;

/// Eth-style 32-byte hash.
pub type EthHash = [u8; ETH_HASH_LEN];

/// Message sampled from a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMessage {
    /// Content identifier of the message.
    pub cid: String,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Sender nonce.
    pub nonce: u64,
    /// Actor method number.
    pub method: u64,
    /// Encoded method parameters, if any.
    #[serde(default)]
    pub params: Option<String>,
    /// Transferred value in atto units (decimal text).
    #[serde(default)]
    pub value: String,
    /// Gas limit.
    #[serde(default)]
    pub gas_limit: i64,
    /// Fee cap in atto units (decimal text).
    #[serde(default)]
    pub gas_fee_cap: String,
    /// Gas premium in atto units (decimal text).
    #[serde(default)]
    pub gas_premium: String,
}

impl SampleMessage {
    /// Returns the message as a call argument with decoded parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::InvalidParams`] when the parameters are not base64.
    pub fn to_descriptor(&self) -> Result<MessageDescriptor, FixtureError> {
        let params = match self.params.as_deref() {
            None | Some("") => Vec::new(),
            Some(encoded) => BASE64
                .decode(encoded)
                .map_err(|_| FixtureError::InvalidParams { cid: self.cid.clone() })?,
        };
        Ok(MessageDescriptor {
            version: 0,
            to: self.to.clone(),
            from: self.from.clone(),
            nonce: self.nonce,
            value: self.value.clone(),
            gas_limit: self.gas_limit,
            gas_fee_cap: self.gas_fee_cap.clone(),
            gas_premium: self.gas_premium.clone(),
            method: self.method,
            params,
        })
    }

    /// Returns the eth transaction hash of the message.
    #[must_use]
    pub fn eth_hash(&self) -> Option<EthHash> {
        eth_hash_from_cid(&self.cid)
    }
}

/// Receipt paired with a sampled message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReceipt {
    /// Execution exit code; zero means success.
    pub exit_code: i64,
    /// Root of the events emitted by the message, if any.
    #[serde(default)]
    pub events_root: Option<String>,
}

/// Fixture derivation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// Messages and receipts do not pair up.
    #[error("checkpoint {height} has {messages} messages but {receipts} receipts")]
    CountMismatch {
        /// Checkpoint height.
        height: u64,
        /// Message count.
        messages: usize,
        /// Receipt count.
        receipts: usize,
    },
    /// Message parameters are not valid base64.
    #[error("message {cid} carries undecodable params")]
    InvalidParams {
        /// Message identifier.
        cid: String,
    },
}

// ============================================================================
// SECTION: Fixture Data
// ============================================================================

/// Immutable per-pass sample inputs.
///
/// # Invariants
/// - Built once per pass and shared read-only with every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureData {
    /// Height of the checkpoint the data was derived from.
    height: u64,
    /// Default miner address.
    default_miner: String,
    /// Sampled messages, events-root messages first.
    messages: Vec<SampleMessage>,
    /// Distinct sender addresses.
    senders: Vec<String>,
    /// Distinct ID-protocol recipient addresses.
    ids: Vec<String>,
    /// Eth block hash of the checkpoint, when known.
    #[serde(default)]
    block_hash: Option<EthHash>,
}

impl FixtureData {
    /// Returns fixture data with no samples.
    #[must_use]
    pub fn empty(height: u64, default_miner: impl Into<String>) -> Self {
        Self {
            height,
            default_miner: default_miner.into(),
            messages: Vec::new(),
            senders: Vec::new(),
            ids: Vec::new(),
            block_hash: None,
        }
    }

    /// Attaches the checkpoint's eth block hash.
    #[must_use]
    pub const fn with_block_hash(mut self, block_hash: Option<EthHash>) -> Self {
        self.block_hash = block_hash;
        self
    }

    /// Derives fixture data from paired messages and receipts.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::CountMismatch`] when the lists differ in length.
    pub fn derive(
        height: u64,
        default_miner: impl Into<String>,
        messages: Vec<SampleMessage>,
        receipts: &[SampleReceipt],
    ) -> Result<Self, FixtureError> {
        if messages.len() != receipts.len() {
            return Err(FixtureError::CountMismatch {
                height,
                messages: messages.len(),
                receipts: receipts.len(),
            });
        }
        let mut data = Self::empty(height, default_miner);
        let mut with_events = Vec::new();
        let mut plain = Vec::new();
        for (message, receipt) in messages.into_iter().zip(receipts) {
            if receipt.exit_code != 0 {
                continue;
            }
            if is_id_address(&message.to) && !data.ids.contains(&message.to) {
                data.ids.push(message.to.clone());
            }
            if !data.senders.contains(&message.from) {
                data.senders.push(message.from.clone());
            }
            if receipt.events_root.is_some() {
                with_events.push(message);
            } else {
                plain.push(message);
            }
        }
        with_events.extend(plain);
        data.messages = with_events;
        Ok(data)
    }

    /// Returns the checkpoint height.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Returns the checkpoint height as an eth `0x` quantity.
    #[must_use]
    pub fn height_quantity(&self) -> String {
        hex_quantity(u128::from(self.height))
    }

    /// Returns all sampled messages.
    #[must_use]
    pub fn messages(&self) -> &[SampleMessage] {
        &self.messages
    }

    /// Returns the first sampled message.
    #[must_use]
    pub fn first_message(&self) -> Option<&SampleMessage> {
        self.messages.first()
    }

    /// Returns the checkpoint's eth block hash, when known.
    #[must_use]
    pub const fn block_hash(&self) -> Option<EthHash> {
        self.block_hash
    }

    /// Returns the eth transaction hash of the first sampled message.
    #[must_use]
    pub fn tx_hash(&self) -> Option<EthHash> {
        self.first_message().and_then(SampleMessage::eth_hash)
    }

    /// Returns all distinct senders.
    #[must_use]
    pub fn senders(&self) -> &[String] {
        &self.senders
    }

    /// Returns the first sender.
    #[must_use]
    pub fn first_sender(&self) -> Option<&str> {
        self.senders.first().map(String::as_str)
    }

    /// Returns the first ID address, falling back to the default miner.
    #[must_use]
    pub fn id_address(&self) -> &str {
        self.ids.first().map_or(self.default_miner.as_str(), String::as_str)
    }

    /// Returns the default miner address.
    #[must_use]
    pub fn default_miner(&self) -> &str {
        &self.default_miner
    }
}

/// Returns true for ID-protocol addresses (`f0…` / `t0…`).
#[must_use]
pub fn is_id_address(address: &str) -> bool {
    let bytes = address.as_bytes();
    bytes.len() > 2 && matches!(bytes[0], b'f' | b't') && bytes[1] == b'0'
}

/// Returns the eth hash of a base32 CIDv1: the trailing 32-byte digest.
#[must_use]
pub fn eth_hash_from_cid(cid: &str) -> Option<EthHash> {
    let bytes = decode_base32(cid.strip_prefix('b')?)?;
    let (version, rest) = read_varint(&bytes)?;
    if version != 1 {
        return None;
    }
    let (_codec, rest) = read_varint(rest)?;
    let (_hash_code, rest) = read_varint(rest)?;
    let (digest_len, digest) = read_varint(rest)?;
    if usize::try_from(digest_len).ok()? != digest.len() || digest.len() < ETH_HASH_LEN {
        return None;
    }
    digest.get(digest.len() - ETH_HASH_LEN ..)?.try_into().ok()
}

/// Decodes unpadded lowercase RFC 4648 base32.
fn decode_base32(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0_u32;
    for symbol in text.bytes() {
        let value = match symbol {
            b'a' ..= b'z' => symbol - b'a',
            b'2' ..= b'7' => symbol - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(u8::try_from((buffer >> bits) & 0xff).ok()?);
            buffer &= (1 << bits) - 1;
        }
    }
    Some(out)
}

/// Reads one unsigned LEB128 varint.
fn read_varint(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value = 0_u64;
    for (index, byte) in bytes.iter().enumerate().take(9) {
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            return Some((value, bytes.get(index + 1 ..)?));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    fn message(cid: &str, from: &str, to: &str) -> SampleMessage {
        SampleMessage {
            cid: cid.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            nonce: 0,
            method: 0,
            value: "0".to_string(),
            ..SampleMessage::default()
        }
    }

    fn receipt(exit_code: i64, events_root: Option<&str>) -> SampleReceipt {
        SampleReceipt {
            exit_code,
            events_root: events_root.map(ToString::to_string),
        }
    }

    #[test]
    fn derive_skips_failed_and_orders_event_messages_first() {
        let messages = vec![
            message("m1", "t1aaa", "t01001"),
            message("m2", "t1bbb", "t2ccc"),
            message("m3", "t1aaa", "t01002"),
        ];
        let receipts = vec![receipt(0, None), receipt(33, None), receipt(0, Some("root"))];
        let data = FixtureData::derive(7, DEFAULT_MINER, messages, &receipts).unwrap();
        let cids: Vec<&str> = data.messages().iter().map(|m| m.cid.as_str()).collect();
        assert_eq!(cids, vec!["m3", "m1"]);
        assert_eq!(data.senders(), ["t1aaa".to_string()]);
        assert_eq!(data.id_address(), "t01001");
        assert_eq!(data.height_quantity(), "0x7");
    }

    #[test]
    fn derive_rejects_count_mismatch() {
        let err = FixtureData::derive(1, DEFAULT_MINER, vec![message("m", "a", "b")], &[])
            .unwrap_err();
        assert!(matches!(err, FixtureError::CountMismatch { messages: 1, receipts: 0, .. }));
    }

    /// CIDv1 (dag-cbor, blake2b-256) whose digest is the bytes `0x00..=0x1f`.
    const COUNTING_CID: &str = "bafy2bzaceaaacaqdaqcqmbyibefawdanbyhraeiscmkbkfqxdamrugy4dupb6";

    #[test]
    fn eth_hash_is_the_cid_digest() {
        let hash = eth_hash_from_cid(COUNTING_CID).unwrap();
        let expected: Vec<u8> = (0 .. 32).collect();
        assert_eq!(hash.to_vec(), expected);
        assert!(eth_hash_from_cid("Qmnotbase32").is_none());
        assert!(eth_hash_from_cid("bafy2bzace").is_none());
        assert!(eth_hash_from_cid("b0000").is_none());
    }

    #[test]
    fn tx_hash_follows_the_first_message() {
        let messages = vec![message(COUNTING_CID, "t1aaa", "t01001"), message("m2", "t1b", "t2c")];
        let receipts = vec![receipt(0, None), receipt(0, None)];
        let data = FixtureData::derive(7, DEFAULT_MINER, messages, &receipts).unwrap();
        assert_eq!(data.tx_hash().map(|hash| hash[31]), Some(0x1f));
        assert_eq!(data.block_hash(), None);
        let data = data.with_block_hash(Some([7; 32]));
        assert_eq!(data.block_hash(), Some([7; 32]));
        assert_eq!(FixtureData::empty(1, DEFAULT_MINER).tx_hash(), None);
    }

    #[test]
    fn descriptors_decode_base64_params() {
        let mut sample = message("m1", "t1aaa", "t01001");
        sample.params = Some("ggE=".to_string());
        sample.gas_limit = 1_000;
        let descriptor = sample.to_descriptor().unwrap();
        assert_eq!(descriptor.params, vec![0x82, 0x01]);
        assert_eq!(descriptor.gas_limit, 1_000);
        assert_eq!(descriptor.to, "t01001");

        sample.params = Some("not base64!".to_string());
        let err = sample.to_descriptor().unwrap_err();
        assert_eq!(err, FixtureError::InvalidParams { cid: "m1".to_string() });
    }

    #[test]
    fn id_address_falls_back_to_default_miner() {
        let data = FixtureData::empty(1, DEFAULT_MINER);
        assert_eq!(data.id_address(), DEFAULT_MINER);
        assert!(data.first_sender().is_none());
    }
}
