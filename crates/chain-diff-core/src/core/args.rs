// crates/chain-diff-core/src/core/args.rs
// ============================================================================
// Module: Chain Diff Call Arguments
// Description: Typed positional arguments and per-target argument converters.
// Purpose: Express one logical call once and adapt it to each target's shape.
// Dependencies: base64, serde, serde_json
// ============================================================================

//! ## Overview
//! Operations describe remote calls with [`Arg`] values. The reference target
//! receives the arguments as written; the candidate receives them after a
//! [`ConverterSet`] pass that rewrites recognized domain-value kinds into the
//! candidate's expected representation.
//! Invariants:
//! - Unrecognized kinds pass through unchanged.
//! - Conversion never reorders or drops arguments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::checkpoint::CheckpointKey;

// ============================================================================
// SECTION: Composite Arguments
// ============================================================================

/// Composite call descriptor (an eth-style call object).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDescriptor {
    /// Sender address.
    pub from: Option<String>,
    /// Recipient address.
    pub to: Option<String>,
    /// Gas limit.
    pub gas: u64,
    /// Gas price in atto units.
    pub gas_price: u128,
    /// Transferred value in atto units.
    pub value: u128,
    /// Call data.
    pub data: Vec<u8>,
}

impl CallDescriptor {
    /// Encodes the descriptor with eth quantity conventions.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.encode_with(|value| Value::String(hex_quantity(value)))
    }

    /// Encodes the descriptor with a custom quantity encoding.
    #[must_use]
    pub fn encode_with(&self, quantity: impl Fn(u128) -> Value) -> Value {
        json!({
            "from": self.from,
            "to": self.to,
            "gas": quantity(u128::from(self.gas)),
            "gasPrice": quantity(self.gas_price),
            "value": quantity(self.value),
            "data": hex_bytes(&self.data),
        })
    }
}

/// Unsigned chain message, as passed to message execution calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// Message format version.
    pub version: u64,
    /// Recipient address.
    pub to: String,
    /// Sender address.
    pub from: String,
    /// Sender nonce.
    pub nonce: u64,
    /// Transferred value in atto units (decimal text).
    pub value: String,
    /// Gas limit.
    pub gas_limit: i64,
    /// Fee cap in atto units (decimal text).
    pub gas_fee_cap: String,
    /// Gas premium in atto units (decimal text).
    pub gas_premium: String,
    /// Actor method number.
    pub method: u64,
    /// Encoded method parameters.
    pub params: Vec<u8>,
}

impl MessageDescriptor {
    /// Encodes the message in the node's PascalCase wire shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let params =
            if self.params.is_empty() { Value::Null } else { json!(BASE64.encode(&self.params)) };
        json!({
            "Version": self.version,
            "To": self.to,
            "From": self.from,
            "Nonce": self.nonce,
            "Value": self.value,
            "GasLimit": self.gas_limit,
            "GasFeeCap": self.gas_fee_cap,
            "GasPremium": self.gas_premium,
            "Method": self.method,
            "Params": params,
        })
    }
}

/// Message filter used by message listing calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMatch {
    /// Sender filter.
    pub from: Option<String>,
    /// Recipient filter.
    pub to: Option<String>,
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Positional argument for a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Checkpoint key (encoded as `{"/": cid}` links).
    Key(CheckpointKey),
    /// Single content identifier (encoded as one `{"/": cid}` link).
    Cid(String),
    /// 32-byte hash (encoded as `0x` hex).
    Hash([u8; 32]),
    /// Account address.
    Address(String),
    /// Unsigned quantity (encoded as `0x` hex).
    Quantity(u64),
    /// Signed integer (encoded as a JSON number).
    Int(i64),
    /// Unsigned integer (encoded as a JSON number).
    Uint(u64),
    /// Boolean flag.
    Bool(bool),
    /// Free-form text.
    Text(String),
    /// Raw bytes (encoded as base64).
    Bytes(Vec<u8>),
    /// Composite call descriptor.
    Call(CallDescriptor),
    /// Unsigned chain message.
    Message(MessageDescriptor),
    /// Message filter.
    MessageMatch(MessageMatch),
    /// Already-encoded JSON value.
    Json(Value),
}

/// Kind tag for [`Arg`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArgKind {
    /// [`Arg::Key`].
    Key,
    /// [`Arg::Cid`].
    Cid,
    /// [`Arg::Hash`].
    Hash,
    /// [`Arg::Address`].
    Address,
    /// [`Arg::Quantity`].
    Quantity,
    /// [`Arg::Int`].
    Int,
    /// [`Arg::Uint`].
    Uint,
    /// [`Arg::Bool`].
    Bool,
    /// [`Arg::Text`].
    Text,
    /// [`Arg::Bytes`].
    Bytes,
    /// [`Arg::Call`].
    Call,
    /// [`Arg::Message`].
    Message,
    /// [`Arg::MessageMatch`].
    MessageMatch,
    /// [`Arg::Json`].
    Json,
}

impl Arg {
    /// Returns the kind tag of the argument.
    #[must_use]
    pub const fn kind(&self) -> ArgKind {
        match self {
            Self::Key(_) => ArgKind::Key,
            Self::Cid(_) => ArgKind::Cid,
            Self::Hash(_) => ArgKind::Hash,
            Self::Address(_) => ArgKind::Address,
            Self::Quantity(_) => ArgKind::Quantity,
            Self::Int(_) => ArgKind::Int,
            Self::Uint(_) => ArgKind::Uint,
            Self::Bool(_) => ArgKind::Bool,
            Self::Text(_) => ArgKind::Text,
            Self::Bytes(_) => ArgKind::Bytes,
            Self::Call(_) => ArgKind::Call,
            Self::Message(_) => ArgKind::Message,
            Self::MessageMatch(_) => ArgKind::MessageMatch,
            Self::Json(_) => ArgKind::Json,
        }
    }

    /// Returns the wire form of the argument.
    #[must_use]
    pub fn to_param(&self) -> Value {
        match self {
            Self::Key(key) => key.to_cid_links(),
            Self::Cid(cid) => json!({ "/": cid }),
            Self::Hash(hash) => Value::String(hex_bytes(hash)),
            Self::Address(address) | Self::Text(address) => Value::String(address.clone()),
            Self::Quantity(quantity) => Value::String(hex_quantity(u128::from(*quantity))),
            Self::Int(value) => json!(value),
            Self::Uint(value) => json!(value),
            Self::Bool(value) => Value::Bool(*value),
            Self::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
            Self::Call(call) => call.to_json(),
            Self::Message(message) => message.to_json(),
            Self::MessageMatch(filter) => json!({ "From": filter.from, "To": filter.to }),
            Self::Json(value) => value.clone(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_param())
    }
}

/// Encodes a full argument list into wire parameters.
#[must_use]
pub fn to_params(args: &[Arg]) -> Vec<Value> {
    args.iter().map(Arg::to_param).collect()
}

// ============================================================================
// SECTION: Converters
// ============================================================================

/// Converts one argument into a target-specific representation.
pub type ArgConverter = Arc<dyn Fn(&Arg) -> Arg + Send + Sync>;

/// Per-kind converter table applied to candidate arguments.
///
/// # Invariants
/// - At most one converter per [`ArgKind`]; later registrations replace earlier ones.
#[derive(Clone, Default)]
pub struct ConverterSet {
    /// Converters keyed by argument kind.
    converters: BTreeMap<ArgKind, ArgConverter>,
}

impl ConverterSet {
    /// Creates an empty converter set (all arguments pass through).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter for the given kind.
    #[must_use]
    pub fn with(
        mut self,
        kind: ArgKind,
        converter: impl Fn(&Arg) -> Arg + Send + Sync + 'static,
    ) -> Self {
        self.converters.insert(kind, Arc::new(converter));
        self
    }

    /// Registers converters for composite arguments that re-apply the set's
    /// address and quantity converters to their fields.
    ///
    /// Field converters are captured at call time, so register them first.
    #[must_use]
    pub fn with_composites(self) -> Self {
        let fields = FieldConverters {
            address: self.converters.get(&ArgKind::Address).cloned(),
            quantity: self.converters.get(&ArgKind::Quantity).cloned(),
        };
        let call = fields.clone();
        let filter = fields.clone();
        self.with(ArgKind::Call, move |arg| call.convert(arg))
            .with(ArgKind::MessageMatch, move |arg| filter.convert(arg))
            .with(ArgKind::Message, move |arg| fields.convert(arg))
    }

    /// Returns true when a converter is registered for the kind.
    #[must_use]
    pub fn handles(&self, kind: ArgKind) -> bool {
        self.converters.contains_key(&kind)
    }

    /// Converts recognized arguments and passes the rest through unchanged.
    #[must_use]
    pub fn normalize(&self, args: &[Arg]) -> Vec<Arg> {
        args.iter()
            .map(|arg| match self.converters.get(&arg.kind()) {
                Some(converter) => converter(arg),
                None => arg.clone(),
            })
            .collect()
    }
}

impl fmt::Debug for ConverterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.converters.keys()).finish()
    }
}

/// Field-level converters applied inside composite arguments.
#[derive(Clone, Default)]
struct FieldConverters {
    /// Converter for address fields.
    address: Option<ArgConverter>,
    /// Converter for quantity fields.
    quantity: Option<ArgConverter>,
}

impl FieldConverters {
    /// Converts one composite argument field by field.
    fn convert(&self, arg: &Arg) -> Arg {
        match arg {
            Arg::Call(call) => {
                let call = CallDescriptor {
                    from: call.from.as_deref().map(|address| self.address(address)),
                    to: call.to.as_deref().map(|address| self.address(address)),
                    ..call.clone()
                };
                if self.quantity.is_some() {
                    Arg::Json(call.encode_with(|value| self.quantity(value)))
                } else {
                    Arg::Call(call)
                }
            }
            Arg::MessageMatch(filter) => Arg::MessageMatch(MessageMatch {
                from: filter.from.as_deref().map(|address| self.address(address)),
                to: filter.to.as_deref().map(|address| self.address(address)),
            }),
            Arg::Message(message) => Arg::Message(MessageDescriptor {
                to: self.address(&message.to),
                from: self.address(&message.from),
                ..message.clone()
            }),
            other => other.clone(),
        }
    }

    /// Converts one address field.
    fn address(&self, address: &str) -> String {
        let Some(convert) = &self.address else {
            return address.to_string();
        };
        match convert(&Arg::Address(address.to_string())) {
            Arg::Address(converted) | Arg::Text(converted) => converted,
            _ => address.to_string(),
        }
    }

    /// Converts one quantity field; values above the 64-bit range keep hex.
    fn quantity(&self, value: u128) -> Value {
        match (&self.quantity, u64::try_from(value)) {
            (Some(convert), Ok(small)) => convert(&Arg::Quantity(small)).to_param(),
            _ => Value::String(hex_quantity(value)),
        }
    }
}

/// Rewrites hex quantities as plain unsigned integers.
#[must_use]
pub fn quantity_as_decimal(arg: &Arg) -> Arg {
    match arg {
        Arg::Quantity(value) => Arg::Uint(*value),
        other => other.clone(),
    }
}

/// Rewrites checkpoint keys and identifiers as bare strings.
#[must_use]
pub fn key_as_strings(arg: &Arg) -> Arg {
    match arg {
        Arg::Key(key) => Arg::Json(Value::Array(
            key.cids().iter().map(|cid| Value::String(cid.clone())).collect(),
        )),
        Arg::Cid(cid) => Arg::Text(cid.clone()),
        other => other.clone(),
    }
}

/// Lowercases addresses (eth checksummed spellings become canonical hex).
#[must_use]
pub fn address_as_lowercase(arg: &Arg) -> Arg {
    match arg {
        Arg::Address(address) => Arg::Address(address.to_ascii_lowercase()),
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Formats an unsigned quantity as minimal `0x` hex.
#[must_use]
pub fn hex_quantity(value: u128) -> String {
    format!("{value:#x}")
}

/// Formats bytes as `0x`-prefixed lowercase hex.
#[must_use]
pub fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parses a `0x`-prefixed 32-byte hex hash.
#[must_use]
pub fn parse_hash(text: &str) -> Option<[u8; 32]> {
    let hex = text.strip_prefix("0x")?;
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0_u8; 32];
    for (slot, pair) in out.iter_mut().zip(hex.as_bytes().chunks(2)) {
        *slot = u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()?;
    }
    Some(out)
}

/// Parses an unsigned quantity from `0x` hex or decimal text.
#[must_use]
pub fn parse_quantity(text: &str) -> Option<u64> {
    text.strip_prefix("0x").map_or_else(
        || text.parse().ok(),
        |hex| if hex.is_empty() { None } else { u64::from_str_radix(hex, 16).ok() },
    )
}
