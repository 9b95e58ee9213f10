// crates/chain-diff-cli/src/wiring.rs
// ============================================================================
// Module: Runtime Wiring
// Description: Builds targets, sinks, and the scheduler from configuration.
// Purpose: Keep the binary entry point free of construction details.
// Dependencies: chain-diff-catalog, chain-diff-config, chain-diff-core, chain-diff-rpc
// ============================================================================

//! ## Overview
//! Turns a validated [`ChainDiffConfig`] into a ready-to-run [`Scheduler`].
//! The reference target backs both the head feed and the fixture builder;
//! candidate argument conversion follows the candidate's configured
//! encodings.
//!
//! Invariants:
//! - Overrides are applied before validation, never after.
//! - The event sink always filters below the configured level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use chain_diff_catalog::catalog;
use chain_diff_config::AddressEncoding;
use chain_diff_config::ChainDiffConfig;
use chain_diff_config::KeyEncoding;
use chain_diff_config::LogConfig;
use chain_diff_config::LogOutput;
use chain_diff_config::QuantityEncoding;
use chain_diff_config::TargetConfig;
use chain_diff_core::ArgKind;
use chain_diff_core::ConverterSet;
use chain_diff_core::Dispatcher;
use chain_diff_core::EventLevel;
use chain_diff_core::EventSink;
use chain_diff_core::FileEventSink;
use chain_diff_core::LevelFilterSink;
use chain_diff_core::Scheduler;
use chain_diff_core::StderrEventSink;
use chain_diff_core::Target;
use chain_diff_core::core::args::address_as_lowercase;
use chain_diff_core::core::args::key_as_strings;
use chain_diff_core::core::args::quantity_as_decimal;
use chain_diff_rpc::PollingHeadFeed;
use chain_diff_rpc::RpcFixtureBuilder;
use chain_diff_rpc::RpcTarget;
use chain_diff_rpc::RpcTargetConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Command-line values that replace configuration fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Reference endpoint URL.
    pub reference_url: Option<String>,
    /// Reference bearer token.
    pub reference_token: Option<String>,
    /// Candidate endpoint URL.
    pub candidate_url: Option<String>,
    /// Candidate bearer token.
    pub candidate_token: Option<String>,
    /// First height to compare.
    pub start_height: Option<u64>,
    /// Dispatcher admission limit.
    pub concurrency: Option<usize>,
    /// Checkpoints to lag behind the head.
    pub confidence: Option<u64>,
    /// Minimum event level.
    pub log_level: Option<EventLevel>,
}

impl RunOverrides {
    /// Writes every present override into the configuration.
    pub fn apply(&self, config: &mut ChainDiffConfig) {
        if let Some(url) = &self.reference_url {
            config.reference.url.clone_from(url);
        }
        if let Some(token) = &self.reference_token {
            config.reference.token = Some(token.clone());
        }
        if let Some(url) = &self.candidate_url {
            config.candidate.url.clone_from(url);
        }
        if let Some(token) = &self.candidate_token {
            config.candidate.token = Some(token.clone());
        }
        if let Some(height) = self.start_height {
            config.scheduler.start_height = Some(height);
        }
        if let Some(concurrency) = self.concurrency {
            config.dispatch.concurrency = concurrency;
        }
        if let Some(confidence) = self.confidence {
            config.scheduler.confidence = confidence;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while assembling the runtime.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum WiringError {
    /// A target client could not be constructed.
    #[error("{section} target: {message}")]
    Target {
        /// Config section of the target.
        section: &'static str,
        /// Client construction failure.
        message: String,
    },
    /// The event log could not be opened.
    #[error("event log {path}: {message}")]
    EventLog {
        /// Configured log path.
        path: String,
        /// Open failure.
        message: String,
    },
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the candidate argument converters from its configured encodings.
///
/// Composite arguments carry the same address and quantity conversions as
/// their top-level counterparts.
#[must_use]
pub fn candidate_converters(config: &TargetConfig) -> ConverterSet {
    let mut converters = ConverterSet::new();
    if config.quantity_encoding == QuantityEncoding::Decimal {
        converters = converters.with(ArgKind::Quantity, quantity_as_decimal);
    }
    if config.key_encoding == KeyEncoding::Strings {
        converters =
            converters.with(ArgKind::Key, key_as_strings).with(ArgKind::Cid, key_as_strings);
    }
    if config.address_encoding == AddressEncoding::Lowercase {
        converters = converters.with(ArgKind::Address, address_as_lowercase);
    }
    converters.with_composites()
}

/// Builds the level-filtered event sink.
///
/// # Errors
///
/// Returns [`WiringError::EventLog`] when the log file cannot be opened.
pub fn build_sink(config: &LogConfig) -> Result<Arc<dyn EventSink>, WiringError> {
    let inner: Arc<dyn EventSink> = match (config.output, config.path.as_deref()) {
        (LogOutput::File, Some(path)) => {
            let sink = FileEventSink::new(Path::new(path)).map_err(|err| {
                WiringError::EventLog { path: path.to_string(), message: err.to_string() }
            })?;
            Arc::new(sink)
        }
        _ => Arc::new(StderrEventSink),
    };
    Ok(Arc::new(LevelFilterSink::new(config.level, inner)))
}

/// Builds a JSON-RPC target for one config section.
///
/// # Errors
///
/// Returns [`WiringError::Target`] when the HTTP client cannot be built.
pub fn build_target(
    section: &'static str,
    config: &TargetConfig,
) -> Result<Arc<RpcTarget>, WiringError> {
    let rpc = RpcTargetConfig::new(config.label_or(section), config.url.clone())
        .with_token(config.token.clone())
        .with_timeouts(config.connect_timeout(), config.request_timeout());
    let target = RpcTarget::new(rpc)
        .map_err(|err| WiringError::Target { section, message: err.to_string() })?;
    Ok(Arc::new(target))
}

/// Assembles the scheduler for a validated configuration.
///
/// # Errors
///
/// Returns [`WiringError`] when a target or the event log cannot be built.
pub fn build_scheduler(config: &ChainDiffConfig) -> Result<Scheduler, WiringError> {
    let events = build_sink(&config.log)?;
    let reference: Arc<dyn Target> = build_target("reference", &config.reference)?;
    let candidate: Arc<dyn Target> = build_target("candidate", &config.candidate)?;
    let dispatcher = Dispatcher::new(
        Arc::clone(&reference),
        candidate,
        candidate_converters(&config.candidate),
        config.dispatch.to_dispatcher_config(),
        events,
    );
    let feed = Arc::new(PollingHeadFeed::new(
        Arc::clone(&reference),
        config.scheduler.poll_interval(),
    ));
    let fixtures =
        Arc::new(RpcFixtureBuilder::new(reference, config.fixtures.default_miner.clone()));
    Ok(Scheduler::new(
        dispatcher,
        Arc::new(catalog()),
        feed,
        fixtures,
        config.scheduler.to_scheduler_config(),
    ))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use chain_diff_core::Arg;
    use chain_diff_core::CallDescriptor;
    use chain_diff_core::CheckpointKey;
    use chain_diff_core::MessageMatch;

    use super::*;

    fn config() -> ChainDiffConfig {
        ChainDiffConfig::from_toml(
            "[reference]\nurl = \"http://127.0.0.1:1234/rpc/v1\"\n\n\
             [candidate]\nurl = \"http://127.0.0.1:2345/rpc/v1\"\n",
        )
        .unwrap()
    }

    #[test]
    fn overrides_replace_only_present_fields() {
        let mut config = config();
        let overrides = RunOverrides {
            candidate_url: Some("http://10.0.0.2:2345/rpc/v1".to_string()),
            candidate_token: Some("secret".to_string()),
            concurrency: Some(12),
            log_level: Some(EventLevel::Debug),
            ..RunOverrides::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.reference.url, "http://127.0.0.1:1234/rpc/v1");
        assert_eq!(config.candidate.url, "http://10.0.0.2:2345/rpc/v1");
        assert_eq!(config.candidate.token.as_deref(), Some("secret"));
        assert_eq!(config.dispatch.concurrency, 12);
        assert_eq!(config.log.level, EventLevel::Debug);
        assert_eq!(config.scheduler.start_height, None);
    }

    #[test]
    fn overrides_are_subject_to_validation() {
        let mut config = config();
        RunOverrides { concurrency: Some(0), ..RunOverrides::default() }.apply(&mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn native_candidate_passes_arguments_through() {
        let converters = candidate_converters(&config().candidate);
        let args = vec![Arg::Quantity(16), Arg::Address("0xABC".to_string())];
        assert_eq!(converters.normalize(&args), args);
    }

    #[test]
    fn candidate_encodings_select_converters() {
        let mut candidate = config().candidate;
        candidate.quantity_encoding = QuantityEncoding::Decimal;
        candidate.key_encoding = KeyEncoding::Strings;
        candidate.address_encoding = AddressEncoding::Lowercase;
        let converters = candidate_converters(&candidate);
        let args = vec![
            Arg::Quantity(16),
            Arg::Cid("bafyone".to_string()),
            Arg::Address("0xABC".to_string()),
            Arg::Key(CheckpointKey::new(["bafyone"])),
        ];
        let converted = converters.normalize(&args);
        assert_eq!(converted[0], Arg::Uint(16));
        assert_eq!(converted[1], Arg::Text("bafyone".to_string()));
        assert_eq!(converted[2], Arg::Address("0xabc".to_string()));
        assert_eq!(converted[3], Arg::Json(serde_json::json!(["bafyone"])));
    }

    #[test]
    fn composite_fields_follow_candidate_encodings() {
        let mut candidate = config().candidate;
        candidate.quantity_encoding = QuantityEncoding::Decimal;
        candidate.address_encoding = AddressEncoding::Lowercase;
        let converters = candidate_converters(&candidate);
        let call = CallDescriptor {
            from: Some("0xFF000000000000000000000000000000000003E8".to_string()),
            to: Some("0xFF000000000000000000000000000000000003E8".to_string()),
            value: 10,
            ..CallDescriptor::default()
        };
        let filter = MessageMatch { from: Some("0xABC".to_string()), to: None };
        let converted = converters.normalize(&[Arg::Call(call), Arg::MessageMatch(filter)]);
        let encoded = converted[0].to_param();
        let masked = "0xff000000000000000000000000000000000003e8";
        assert_eq!(encoded["from"], serde_json::json!(masked));
        assert_eq!(encoded["value"], serde_json::json!(10));
        let expected = MessageMatch { from: Some("0xabc".to_string()), to: None };
        assert_eq!(converted[1], Arg::MessageMatch(expected));
    }

    #[test]
    fn targets_take_the_section_label_by_default() {
        let target = build_target("reference", &config().reference).unwrap();
        assert_eq!(target.label(), "reference");
    }

    #[test]
    fn file_sink_requires_a_writable_path() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogConfig {
            level: EventLevel::Info,
            output: LogOutput::File,
            path: Some(dir.path().join("missing").join("events.jsonl").display().to_string()),
        };
        let err = build_sink(&log).err().unwrap();
        assert!(matches!(err, WiringError::EventLog { .. }), "{err}");

        let log = LogConfig {
            path: Some(dir.path().join("events.jsonl").display().to_string()),
            ..log
        };
        assert!(build_sink(&log).is_ok());
    }
}
