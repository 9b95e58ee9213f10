// crates/chain-diff-core/src/core/checkpoint.rs
// ============================================================================
// Module: Chain Diff Checkpoints
// Description: Height-ordered checkpoints and head-change notifications.
// Purpose: Model the points in the ledger log that comparison passes run against.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Checkpoint`] identifies one point in the ordered ledger log by height
//! and a stable key (the ordered list of block content identifiers).
//! Checkpoints arrive from the reference implementation's event feed as
//! [`HeadChange`] batches.
//! Invariants:
//! - A checkpoint is immutable once observed.
//! - Keys compare by their ordered identifier list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Checkpoint Key
// ============================================================================

/// Ordered list of content identifiers naming a checkpoint.
///
/// # Invariants
/// - Identifier order is significant and preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointKey(Vec<String>);

impl CheckpointKey {
    /// Creates a key from an ordered list of content identifiers.
    #[must_use]
    pub fn new<I, S>(cids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(cids.into_iter().map(Into::into).collect())
    }

    /// Returns the empty key (used as "the current head" by most targets).
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns true when the key names no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the content identifiers in order.
    #[must_use]
    pub fn cids(&self) -> &[String] {
        &self.0
    }

    /// Encodes the key as an array of `{"/": cid}` links.
    #[must_use]
    pub fn to_cid_links(&self) -> Value {
        Value::Array(self.0.iter().map(|cid| json!({ "/": cid })).collect())
    }

    /// Parses a key from an array of `{"/": cid}` links or plain strings.
    ///
    /// Returns `None` when any entry has neither form.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let Value::Array(items) = value else {
            return None;
        };
        let mut cids = Vec::with_capacity(items.len());
        for item in items {
            cids.push(cid_from_json(item)?);
        }
        Some(Self(cids))
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(","))
    }
}

// ============================================================================
// SECTION: Checkpoint
// ============================================================================

/// Immutable point in the ledger log.
///
/// # Invariants
/// - `key` lists the checkpoint's blocks in canonical order.
/// - `parents` is empty only for genesis or when the source omitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Height in the ledger log.
    pub height: u64,
    /// Stable key of the checkpoint.
    pub key: CheckpointKey,
    /// Key of the parent checkpoint.
    #[serde(default)]
    pub parents: CheckpointKey,
}

impl Checkpoint {
    /// Creates a checkpoint without parent information.
    #[must_use]
    pub const fn new(height: u64, key: CheckpointKey) -> Self {
        Self {
            height,
            key,
            parents: CheckpointKey::empty(),
        }
    }

    /// Returns the same checkpoint with the provided parent key.
    #[must_use]
    pub fn with_parents(mut self, parents: CheckpointKey) -> Self {
        self.parents = parents;
        self
    }

    /// Returns true when two checkpoints name the same point in the log.
    #[must_use]
    pub fn same_point(&self, other: &Self) -> bool {
        self.height == other.height && self.key == other.key
    }

    /// Returns the first block identifier, if any.
    #[must_use]
    pub fn first_block(&self) -> Option<&str> {
        self.key.cids().first().map(String::as_str)
    }

    /// Parses a checkpoint from a tipset-shaped JSON object.
    ///
    /// Accepts `Height` plus either `Cids` (links or strings) or `Key`, and
    /// reads parents from `Parents` or from the first entry of `Blocks`.
    #[must_use]
    pub fn from_tipset_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let height = object.get("Height").and_then(height_from_json)?;
        let key = object
            .get("Cids")
            .or_else(|| object.get("Key"))
            .and_then(CheckpointKey::from_json)?;
        let parents = object
            .get("Parents")
            .or_else(|| {
                object
                    .get("Blocks")
                    .and_then(Value::as_array)
                    .and_then(|blocks| blocks.first())
                    .and_then(|block| block.get("Parents"))
            })
            .and_then(CheckpointKey::from_json)
            .unwrap_or_default();
        Some(Self {
            height,
            key,
            parents,
        })
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.height)
    }
}

// ============================================================================
// SECTION: Head Changes
// ============================================================================

/// Kind of head-change notification emitted by an event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadChangeKind {
    /// Initial synchronization: the feed is caught up to this head.
    Current,
    /// The checkpoint was applied to the chain.
    Apply,
    /// The checkpoint was reverted by a reorganization.
    Revert,
}

/// Single entry in a head-change batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadChange {
    /// Kind of change.
    pub kind: HeadChangeKind,
    /// Checkpoint the change refers to.
    pub checkpoint: Checkpoint,
}

impl HeadChange {
    /// Builds a `Current` change.
    #[must_use]
    pub const fn current(checkpoint: Checkpoint) -> Self {
        Self {
            kind: HeadChangeKind::Current,
            checkpoint,
        }
    }

    /// Builds an `Apply` change.
    #[must_use]
    pub const fn apply(checkpoint: Checkpoint) -> Self {
        Self {
            kind: HeadChangeKind::Apply,
            checkpoint,
        }
    }

    /// Builds a `Revert` change.
    #[must_use]
    pub const fn revert(checkpoint: Checkpoint) -> Self {
        Self {
            kind: HeadChangeKind::Revert,
            checkpoint,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a content identifier from a `{"/": cid}` link or a plain string.
fn cid_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(cid) => Some(cid.clone()),
        Value::Object(link) => link.get("/").and_then(Value::as_str).map(ToString::to_string),
        _ => None,
    }
}

/// Reads a height encoded as a JSON number or decimal string.
fn height_from_json(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}
