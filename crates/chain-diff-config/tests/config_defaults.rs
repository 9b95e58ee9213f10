//! Config defaults and validation tests for chain-diff-config.
// crates/chain-diff-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults and Validation Tests
// Description: Validate default behavior and section invariants.
// Purpose: Ensure a minimal config is valid and limits are enforced.
// =============================================================================

use std::time::Duration;

use chain_diff_config::AddressEncoding;
use chain_diff_config::KeyEncoding;
use chain_diff_config::LogOutput;
use chain_diff_config::QuantityEncoding;
use chain_diff_core::EventLevel;

mod common;

use common::assert_invalid;
use common::config_from_toml;
use common::minimal_config;

type TestResult = Result<(), String>;

#[test]
fn minimal_config_validates_with_defaults() -> TestResult {
    let config = minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.dispatch.concurrency != 5 || config.dispatch.request_timeout_ms.is_some() {
        return Err("dispatch defaults changed".to_string());
    }
    if config.scheduler.confidence != 5
        || config.scheduler.start_height.is_some()
        || config.scheduler.trigger_capacity != 1
        || config.scheduler.poll_interval() != Duration::from_secs(2)
    {
        return Err("scheduler defaults changed".to_string());
    }
    if config.fixtures.default_miner != "t01000" {
        return Err("default miner changed".to_string());
    }
    if config.log.level != EventLevel::Info || config.log.output != LogOutput::Stderr {
        return Err("log defaults changed".to_string());
    }
    if config.reference.label_or("reference") != "reference" {
        return Err("label should fall back to the section name".to_string());
    }
    Ok(())
}

#[test]
fn empty_config_requires_target_urls() -> TestResult {
    let config = config_from_toml("").map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "reference.url must be set")
}

#[test]
fn non_http_urls_are_rejected() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.candidate.url = "ws://127.0.0.1:2345/rpc/v1".to_string();
    assert_invalid(config.validate(), "candidate.url must use http or https")?;
    config.candidate.url = "not a url".to_string();
    assert_invalid(config.validate(), "candidate.url is invalid")
}

#[test]
fn candidate_encodings_parse() -> TestResult {
    let config = config_from_toml(
        r#"
        [reference]
        url = "http://127.0.0.1:1234/rpc/v1"

        [candidate]
        url = "https://candidate.example/rpc/v1"
        token = "secret"
        label = "forest"
        quantity_encoding = "decimal"
        key_encoding = "strings"
        address_encoding = "lowercase"
        "#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.candidate.quantity_encoding != QuantityEncoding::Decimal
        || config.candidate.key_encoding != KeyEncoding::Strings
        || config.candidate.address_encoding != AddressEncoding::Lowercase
    {
        return Err("candidate encodings not parsed".to_string());
    }
    if config.candidate.label_or("candidate") != "forest" {
        return Err("candidate label not parsed".to_string());
    }
    Ok(())
}

#[test]
fn reference_must_keep_native_encodings() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.reference.quantity_encoding = QuantityEncoding::Decimal;
    assert_invalid(config.validate(), "native argument encodings")
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    let toml = format!("{}\n[dispatch]\nworkers = 4\n", common::MINIMAL_TOML);
    match config_from_toml(&toml) {
        Err(err) if err.to_string().contains("workers") => Ok(()),
        Err(err) => Err(format!("unexpected error {err}")),
        Ok(_) => Err("unknown field accepted".to_string()),
    }
}

#[test]
fn concurrency_limits_are_enforced() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.dispatch.concurrency = 0;
    assert_invalid(config.validate(), "dispatch.concurrency must be between 1 and 256")?;
    config.dispatch.concurrency = 256;
    config.validate().map_err(|err| err.to_string())?;
    config.dispatch.concurrency = 257;
    assert_invalid(config.validate(), "dispatch.concurrency")
}

#[test]
fn trigger_capacity_limits_are_enforced() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.scheduler.trigger_capacity = 0;
    assert_invalid(config.validate(), "scheduler.trigger_capacity")?;
    config.scheduler.trigger_capacity = 65;
    assert_invalid(config.validate(), "scheduler.trigger_capacity")
}

#[test]
fn timeouts_are_bounded() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.reference.connect_timeout_ms = 10;
    assert_invalid(config.validate(), "reference.connect_timeout_ms")?;
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.candidate.request_timeout_ms = 1_000_000;
    assert_invalid(config.validate(), "candidate.request_timeout_ms")?;
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.dispatch.request_timeout_ms = Some(0);
    assert_invalid(config.validate(), "dispatch.request_timeout_ms")
}

#[test]
fn default_miner_must_be_an_id_address() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.fixtures.default_miner = "t1abc".to_string();
    assert_invalid(config.validate(), "fixtures.default_miner")?;
    config.fixtures.default_miner = "f01234".to_string();
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn file_output_requires_a_path() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.log.output = LogOutput::File;
    assert_invalid(config.validate(), "log.path is required")?;
    config.log.path = Some("   ".to_string());
    assert_invalid(config.validate(), "log.path must be non-empty")?;
    config.log.path = Some("events.jsonl".to_string());
    config.validate().map_err(|err| err.to_string())?;
    config.log.output = LogOutput::Stderr;
    assert_invalid(config.validate(), "log.path requires output=file")
}

#[test]
fn log_level_parses_snake_case() -> TestResult {
    let toml = format!("{}\n[log]\nlevel = \"debug\"\n", common::MINIMAL_TOML);
    let config = config_from_toml(&toml).map_err(|err| err.to_string())?;
    if config.log.level != EventLevel::Debug {
        return Err("log level not parsed".to_string());
    }
    Ok(())
}

#[test]
fn sections_convert_to_runtime_settings() -> TestResult {
    let toml = format!(
        "{}\n[dispatch]\nconcurrency = 8\nrequest_timeout_ms = 1500\n\n\
         [scheduler]\nconfidence = 3\nstart_height = 42\ntrigger_capacity = 2\n",
        common::MINIMAL_TOML
    );
    let config = config_from_toml(&toml).map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let dispatcher = config.dispatch.to_dispatcher_config();
    if dispatcher.concurrency != 8
        || dispatcher.request_timeout != Some(Duration::from_millis(1500))
    {
        return Err("dispatcher settings not converted".to_string());
    }
    let scheduler = config.scheduler.to_scheduler_config();
    if scheduler.confidence != 3
        || scheduler.start_height != Some(42)
        || scheduler.trigger_capacity != 2
    {
        return Err("scheduler settings not converted".to_string());
    }
    Ok(())
}
