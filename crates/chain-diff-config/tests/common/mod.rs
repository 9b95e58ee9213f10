// crates/chain-diff-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for chain-diff-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use chain_diff_config::ChainDiffConfig;
use chain_diff_config::ConfigError;

/// Minimal valid TOML: both target URLs set, everything else defaulted.
pub const MINIMAL_TOML: &str = r#"
[reference]
url = "http://127.0.0.1:1234/rpc/v1"

[candidate]
url = "http://127.0.0.1:2345/rpc/v1"
"#;

/// Parses a TOML string into a `ChainDiffConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<ChainDiffConfig, ConfigError> {
    ChainDiffConfig::from_toml(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ChainDiffConfig, ConfigError> {
    config_from_toml(MINIMAL_TOML)
}

/// Asserts that a validation result is an error containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
