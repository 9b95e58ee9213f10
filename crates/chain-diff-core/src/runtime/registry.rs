// crates/chain-diff-core/src/runtime/registry.rs
// ============================================================================
// Module: Chain Diff Operation Registry
// Description: Named catalogue of comparison operations.
// Purpose: Map operation names to callables driven once per pass.
// Dependencies: crate::runtime::dispatcher
// ============================================================================

//! ## Overview
//! The registry maps operation names to [`Operation`] callables. Operations
//! are registered one at a time or assembled from a [`MethodSource`], an
//! explicit method table generated by [`method_table!`](crate::method_table)
//! in place of runtime introspection.
//! Invariants:
//! - Registration is last-write-wins on name collisions.
//! - The registry is immutable once shared with the scheduler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::checkpoint::Checkpoint;
use crate::core::fixtures::FixtureData;
use crate::interfaces::CallContext;
use crate::runtime::dispatcher::ComparisonRequest;
use crate::runtime::dispatcher::DispatchError;
use crate::runtime::dispatcher::Dispatcher;

// ============================================================================
// SECTION: Pass Context
// ============================================================================

/// Read-only view of one pass handed to every operation.
///
/// # Invariants
/// - The checkpoint and fixture snapshot never change during a pass.
#[derive(Clone)]
pub struct PassContext {
    /// Checkpoint being compared.
    checkpoint: Arc<Checkpoint>,
    /// Fixture snapshot for the checkpoint.
    fixtures: Arc<FixtureData>,
    /// Dispatcher shared by the pass.
    dispatcher: Dispatcher,
    /// Invocation context shared by both targets.
    call: CallContext,
}

impl PassContext {
    /// Creates a pass context.
    #[must_use]
    pub const fn new(
        checkpoint: Arc<Checkpoint>,
        fixtures: Arc<FixtureData>,
        dispatcher: Dispatcher,
        call: CallContext,
    ) -> Self {
        Self { checkpoint, fixtures, dispatcher, call }
    }

    /// Returns the checkpoint being compared.
    #[must_use]
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Returns the fixture snapshot.
    #[must_use]
    pub fn fixtures(&self) -> &FixtureData {
        &self.fixtures
    }

    /// Returns the shared invocation context.
    #[must_use]
    pub const fn call_context(&self) -> &CallContext {
        &self.call
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs one comparison through the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the comparison fails.
    pub async fn compare(&self, request: ComparisonRequest) -> Result<(), DispatchError> {
        self.dispatcher.compare(&self.call, request).await
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Boxed future returned by operations.
pub type OperationFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + 'a>>;

/// One named comparison operation.
pub trait Operation: Send + Sync {
    /// Runs the comparison against the pass.
    fn run<'a>(&'a self, pass: &'a PassContext) -> OperationFuture<'a>;
}

/// Operation backed by a closure over an owned pass context.
pub struct FnOperation<F> {
    /// Wrapped closure.
    func: F,
}

impl<F, Fut> Operation for FnOperation<F>
where
    F: Fn(PassContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    fn run<'a>(&'a self, pass: &'a PassContext) -> OperationFuture<'a> {
        Box::pin((self.func)(pass.clone()))
    }
}

/// Wraps a closure as a shareable operation.
#[must_use]
pub fn operation_fn<F, Fut>(func: F) -> Arc<dyn Operation>
where
    F: Fn(PassContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    Arc::new(FnOperation { func })
}

// ============================================================================
// SECTION: Method Tables
// ============================================================================

/// Method pointer stored in a method table.
pub type MethodCall<S> = for<'a> fn(&'a S, &'a PassContext) -> OperationFuture<'a>;

/// One method of a [`MethodSource`].
pub struct MethodEntry<S> {
    /// Method identifier as written in source (`compare_chain_head`).
    pub name: &'static str,
    /// Method pointer.
    pub call: MethodCall<S>,
}

/// Object exposing comparison methods through an explicit table.
pub trait MethodSource: Send + Sync + Sized + 'static {
    /// Returns every method the source exposes.
    fn methods() -> Vec<MethodEntry<Self>>;
}

/// Builds a `Vec<MethodEntry<Source>>` from async method identifiers.
///
/// Each method must have the signature
/// `async fn name(&self, pass: &PassContext) -> Result<(), DispatchError>`.
#[macro_export]
macro_rules! method_table {
    ($source:ty { $($method:ident),* $(,)? }) => {
        vec![$(
            $crate::runtime::registry::MethodEntry::<$source> {
                name: stringify!($method),
                call: {
                    /// Boxes the method future.
                    fn call<'a>(
                        source: &'a $source,
                        pass: &'a $crate::runtime::registry::PassContext,
                    ) -> $crate::runtime::registry::OperationFuture<'a> {
                        Box::pin(source.$method(pass))
                    }
                    call
                },
            }
        ),*]
    };
}

/// Operation bound to one method of a shared source.
struct MethodOperation<S> {
    /// Shared source object.
    source: Arc<S>,
    /// Method pointer.
    call: MethodCall<S>,
}

impl<S: Send + Sync> Operation for MethodOperation<S> {
    fn run<'a>(&'a self, pass: &'a PassContext) -> OperationFuture<'a> {
        (self.call)(&self.source, pass)
    }
}

/// Converts a method identifier remainder to an operation name.
///
/// `chain_get_tip_set` becomes `ChainGetTipSet`; already camel-cased input
/// keeps its casing after the first letter.
#[must_use]
pub fn operation_name(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Catalogue of named operations.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    /// Operations keyed by name.
    operations: BTreeMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a name to an operation, returning any operation it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        operation: Arc<dyn Operation>,
    ) -> Option<Arc<dyn Operation>> {
        self.operations.insert(name.into(), operation)
    }

    /// Registers every method whose identifier starts with `prefix`.
    ///
    /// Returns the number of methods registered. A source with no matching
    /// methods registers nothing.
    pub fn register_methods<S: MethodSource>(&mut self, source: &Arc<S>, prefix: &str) -> usize {
        let mut registered = 0;
        for entry in S::methods() {
            let Some(rest) = entry.name.strip_prefix(prefix) else {
                continue;
            };
            let name = operation_name(rest);
            if name.is_empty() {
                continue;
            }
            let operation = MethodOperation { source: Arc::clone(source), call: entry.call };
            self.register(name, Arc::new(operation));
            registered += 1;
        }
        registered
    }

    /// Builds a registry from a method source.
    #[must_use]
    pub fn build_from_methods<S: MethodSource>(source: &Arc<S>, prefix: &str) -> Self {
        let mut registry = Self::new();
        registry.register_methods(source, prefix);
        registry
    }

    /// Returns the full mapping.
    #[must_use]
    pub const fn all(&self) -> &BTreeMap<String, Arc<dyn Operation>> {
        &self.operations
    }

    /// Returns an operation by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.operations.get(name)
    }

    /// Returns the sorted operation names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true when no operations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
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

    #[test]
    fn operation_name_converts_snake_case() {
        assert_eq!(operation_name("chain_get_tip_set"), "ChainGetTipSet");
        assert_eq!(operation_name("web3_client_version"), "Web3ClientVersion");
        assert_eq!(operation_name("_eth_chain_id"), "EthChainId");
        assert_eq!(operation_name("ChainHead"), "ChainHead");
    }

    #[test]
    fn register_is_last_write_wins() {
        let mut registry = OperationRegistry::new();
        assert!(registry.register("ChainHead", operation_fn(|_| async { Ok(()) })).is_none());
        assert!(registry.register("ChainHead", operation_fn(|_| async { Ok(()) })).is_some());
        assert_eq!(registry.len(), 1);
    }
}
