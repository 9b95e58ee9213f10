// crates/chain-diff-core/src/equivalence/mod.rs
// ============================================================================
// Module: Chain Diff Equivalence Checker
// Description: Structural equality over serializable values of any shape.
// Purpose: Decide whether reference and candidate results mean the same thing.
// Dependencies: serde, serde_json, serde_jcs
// ============================================================================

//! ## Overview
//! Both sides are lowered through [`serde::Serialize`] into a shared
//! [`serde_json::Value`] tree and then walked structurally. Records are matched
//! by field name, sequences element-wise, and mappings by key independent of
//! insertion order, so two differently declared types with the same fields
//! compare equal without a per-type comparator.
//! Invariants:
//! - The checker never errors; a value that fails to serialize is "not equal".
//! - Null equals only null.
//! - Numbers compare by numeric value across integer widths and floats.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checks;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde::Serializer;
use serde::ser::Error as _;
use serde_json::Number;
use serde_json::Value;

// ============================================================================
// SECTION: Divergence
// ============================================================================

/// First structural difference between two values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Path to the differing node (`$`, `$.height`, `$.Cids[0]`).
    pub path: String,
    /// Rendered reference-side node.
    pub reference: String,
    /// Rendered candidate-side node.
    pub candidate: String,
}

impl Divergence {
    /// Builds a divergence at the given path.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        reference: impl Into<String>,
        candidate: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            reference: reference.into(),
            candidate: candidate.into(),
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mismatch {} vs {}", self.path, self.reference, self.candidate)
    }
}

// ============================================================================
// SECTION: Opaque Values
// ============================================================================

/// Opts a value into canonical-serialization comparison.
///
/// The wrapped value serializes as its RFC 8785 canonical JSON text, so two
/// opaque values are equal exactly when their canonical forms are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque<T>(pub T);

impl<T: Serialize> Serialize for Opaque<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = serde_jcs::to_vec(&self.0).map_err(S::Error::custom)?;
        let text = String::from_utf8(bytes).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Lowers a value into the shared comparison tree.
///
/// # Errors
///
/// Returns the serializer error when the value cannot be represented.
pub fn lower<T: Serialize + ?Sized>(value: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

/// Returns true when both values are structurally equivalent.
#[must_use]
pub fn equivalent<A, B>(reference: &A, candidate: &B) -> bool
where
    A: Serialize + ?Sized,
    B: Serialize + ?Sized,
{
    match (lower(reference), lower(candidate)) {
        (Ok(left), Ok(right)) => values_equivalent(&left, &right),
        _ => false,
    }
}

/// Returns the first structural difference, if any.
#[must_use]
pub fn divergence<A, B>(reference: &A, candidate: &B) -> Option<Divergence>
where
    A: Serialize + ?Sized,
    B: Serialize + ?Sized,
{
    let left = match lower(reference) {
        Ok(value) => value,
        Err(err) => return Some(Divergence::new("$", format!("<unserializable: {err}>"), "?")),
    };
    let right = match lower(candidate) {
        Ok(value) => value,
        Err(err) => return Some(Divergence::new("$", "?", format!("<unserializable: {err}>"))),
    };
    first_difference("$", &left, &right)
}

/// Compares the serialized JSON text of both values byte-for-byte.
///
/// Each side keeps its own serializer's key order.
///
/// # Errors
///
/// Returns a [`Divergence`] at `$` carrying both texts when they differ.
pub fn serialized_equal<A, B>(reference: &A, candidate: &B) -> Result<(), Divergence>
where
    A: Serialize + ?Sized,
    B: Serialize + ?Sized,
{
    let left = serde_json::to_string(reference).map_err(|err| {
        Divergence::new("$", format!("<unserializable: {err}>"), "?")
    })?;
    let right = serde_json::to_string(candidate).map_err(|err| {
        Divergence::new("$", "?", format!("<unserializable: {err}>"))
    })?;
    if left == right { Ok(()) } else { Err(Divergence::new("$", left, right)) }
}

/// Structural equivalence over already-lowered trees.
#[must_use]
pub fn values_equivalent(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equivalent(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| values_equivalent(x, y)))
        }
        _ => false,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Numeric equality across integer widths and floats.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (as_i128(a), as_i128(b)) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => false,
    }
}

/// Returns an integer view of a JSON number.
fn as_i128(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

/// Walks both trees and reports the first differing node.
fn first_difference(path: &str, left: &Value, right: &Value) -> Option<Divergence> {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => a
            .iter()
            .zip(b)
            .enumerate()
            .find_map(|(index, (x, y))| first_difference(&format!("{path}[{index}]"), x, y)),
        (Value::Object(a), Value::Object(b)) => {
            for (key, x) in a {
                let child = format!("{path}.{key}");
                match b.get(key) {
                    Some(y) => {
                        if let Some(found) = first_difference(&child, x, y) {
                            return Some(found);
                        }
                    }
                    None => return Some(Divergence::new(child, x.to_string(), "<missing>")),
                }
            }
            b.iter().find(|(key, _)| !a.contains_key(*key)).map(|(key, y)| {
                Divergence::new(format!("{path}.{key}"), "<missing>", y.to_string())
            })
        }
        _ if values_equivalent(left, right) => None,
        _ => Some(Divergence::new(path, left.to_string(), right.to_string())),
    }
}
