// crates/chain-diff-core/src/equivalence/checks.rs
// ============================================================================
// Module: Chain Diff Result Checks
// Description: Ready-made equivalence overrides for loosely comparable results.
// Purpose: Compare lag-tolerant, set-valued, or non-deterministic results.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A [`ResultCheck`] replaces the structural equivalence check for a single
//! comparison request. Checks receive the decoded reference and candidate
//! results and return a rendered failure reason on mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use super::divergence;
use super::serialized_equal;
use super::values_equivalent;
use crate::core::args::parse_quantity;
use crate::core::checkpoint::Checkpoint;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Custom equivalence override: `(reference, candidate) -> Ok | Err(reason)`.
pub type ResultCheck = Arc<dyn Fn(&Value, &Value) -> Result<(), String> + Send + Sync>;

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Structural equivalence, as applied when no override is given.
#[must_use]
pub fn structural() -> ResultCheck {
    Arc::new(|reference, candidate| {
        divergence(reference, candidate).map_or(Ok(()), |found| Err(found.to_string()))
    })
}

/// Strict serialized-text equality.
#[must_use]
pub fn serialized() -> ResultCheck {
    Arc::new(|reference, candidate| {
        serialized_equal(reference, candidate).map_err(|found| found.to_string())
    })
}

/// Strict serialized-text equality over the named top-level fields only.
///
/// Absent fields compare as `null`; other fields are ignored.
#[must_use]
pub fn serialized_fields(fields: &'static [&'static str]) -> ResultCheck {
    Arc::new(move |reference, candidate| {
        for field in fields {
            let left = reference.get(*field).unwrap_or(&Value::Null);
            let right = candidate.get(*field).unwrap_or(&Value::Null);
            serialized_equal(left, right).map_err(|found| format!("{field}: {found}"))?;
        }
        Ok(())
    })
}

/// Accepts any pair of successful results.
#[must_use]
pub fn always_accept() -> ResultCheck {
    Arc::new(|_, _| Ok(()))
}

/// Accepts numeric results that differ by at most `max_delta`.
///
/// Numbers may be JSON numbers, decimal strings, or `0x` quantities.
#[must_use]
pub fn within_tolerance(max_delta: u64) -> ResultCheck {
    Arc::new(move |reference, candidate| {
        let (Some(left), Some(right)) = (unsigned(reference), unsigned(candidate)) else {
            return Err(format!("non-numeric results {reference} vs {candidate}"));
        };
        if left.abs_diff(right) <= max_delta {
            Ok(())
        } else {
            Err(format!("{left} vs {right} differ by more than {max_delta}"))
        }
    })
}

/// Accepts numeric results that are equal whether encoded as numbers or strings.
///
/// Two null results are equal.
#[must_use]
pub fn numeric_equal() -> ResultCheck {
    Arc::new(|reference, candidate| {
        let left = decimal_text(reference);
        let right = decimal_text(candidate);
        match (left, right) {
            (Some(a), Some(b)) if a == b => Ok(()),
            (None, None) if reference.is_null() && candidate.is_null() => Ok(()),
            _ => Err(format!("{reference} vs {candidate}")),
        }
    })
}

/// Requires the reference array at `pointer` to contain every candidate element.
///
/// The candidate may report fewer elements than the reference, never one the
/// reference lacks. `pointer` is a JSON pointer (`""` for the whole result).
#[must_use]
pub fn superset_of(pointer: &'static str) -> ResultCheck {
    Arc::new(move |reference, candidate| {
        let left = reference.pointer(pointer).and_then(Value::as_array);
        let right = candidate.pointer(pointer).and_then(Value::as_array);
        let (Some(left), Some(right)) = (left, right) else {
            return Err(format!("missing array at '{pointer}'"));
        };
        match right.iter().find(|item| !left.iter().any(|other| values_equivalent(item, other))) {
            Some(extra) => Err(format!("reference is missing {extra} at '{pointer}'")),
            None => Ok(()),
        }
    })
}

/// Compares tipset-shaped results by height and key only.
#[must_use]
pub fn checkpoint_equal() -> ResultCheck {
    Arc::new(|reference, candidate| {
        let left = Checkpoint::from_tipset_json(reference);
        let right = Checkpoint::from_tipset_json(candidate);
        match (left, right) {
            (Some(a), Some(b)) if a.same_point(&b) => Ok(()),
            (Some(a), Some(b)) => Err(format!("checkpoint mismatch {a} vs {b}")),
            _ => Err("result is not a checkpoint".to_string()),
        }
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an unsigned number from a JSON number, decimal text, or hex quantity.
fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => parse_quantity(text),
        _ => None,
    }
}

/// Renders a JSON number or numeric string as canonical decimal text.
fn decimal_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        _ => return None,
    };
    let (sign, digits) = text.strip_prefix('-').map_or(("", text.as_str()), |rest| ("-", rest));
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Some("0".to_string());
    }
    Some(format!("{sign}{trimmed}"))
}
