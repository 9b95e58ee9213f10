// crates/chain-diff-rpc/src/client.rs
// ============================================================================
// Module: JSON-RPC Target
// Description: JSON-RPC 2.0 over HTTP client implementing the target contract.
// Purpose: Invoke named operations on a remote protocol implementation.
// Dependencies: reqwest, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`RpcTarget`] posts one JSON-RPC 2.0 request per invocation, namespacing
//! the operation name (`ChainHead` becomes `Filecoin.ChainHead`). Replies are
//! read under a hard byte limit; protocol `error` objects become
//! [`TargetError::Rpc`].
//! Invariants:
//! - Request ids are unique per target for its lifetime.
//! - Bearer tokens are never included in error text or debug output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chain_diff_core::Arg;
use chain_diff_core::CallContext;
use chain_diff_core::Target;
use chain_diff_core::TargetError;
use chain_diff_core::core::args::to_params;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default method namespace.
pub const DEFAULT_NAMESPACE: &str = "Filecoin";
/// Maximum accepted response body size in bytes.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;
/// Maximum characters of a failed response echoed into errors.
const MAX_ERROR_PREVIEW: usize = 256;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Settings for one JSON-RPC target.
#[derive(Clone)]
pub struct RpcTargetConfig {
    /// Display label.
    pub label: String,
    /// Endpoint URL.
    pub url: String,
    /// Optional bearer token.
    pub token: Option<String>,
    /// Method namespace prefix.
    pub namespace: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl RpcTargetConfig {
    /// Creates settings with default namespace and timeouts.
    #[must_use]
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            token: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Sets both timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }
}

impl fmt::Debug for RpcTargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcTargetConfig")
            .field("label", &self.label)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Target construction failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The settings cannot be turned into request headers.
    #[error("invalid target config: {0}")]
    Config(String),
    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    /// Protocol version marker.
    jsonrpc: &'static str,
    /// Request identifier.
    id: u64,
    /// Namespaced method.
    method: &'a str,
    /// Positional parameters.
    params: Vec<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// Successful result.
    #[serde(default)]
    result: Option<Value>,
    /// Error object.
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    /// Error code.
    code: i64,
    /// Error message.
    #[serde(default)]
    message: String,
}

// ============================================================================
// SECTION: Target
// ============================================================================

/// JSON-RPC 2.0 over HTTP target.
pub struct RpcTarget {
    /// Display label.
    label: String,
    /// Endpoint URL.
    url: String,
    /// Method namespace prefix.
    namespace: String,
    /// Shared HTTP client.
    client: Client,
    /// Static request headers (content type, authorization).
    headers: HeaderMap,
    /// Next request id.
    next_id: AtomicU64,
}

impl RpcTarget {
    /// Builds a target from settings.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the token is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: RpcTargetConfig) -> Result<Self, RpcError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| RpcError::Client(err.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.token {
            let header = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RpcError::Config("invalid bearer token header".to_string()))?;
            headers.insert(AUTHORIZATION, header);
        }
        Ok(Self {
            label: config.label,
            url: config.url,
            namespace: config.namespace,
            client,
            headers,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the namespaced wire method for an operation name.
    #[must_use]
    pub fn wire_method(&self, method: &str) -> String {
        if self.namespace.is_empty() {
            method.to_string()
        } else {
            format!("{}.{method}", self.namespace)
        }
    }

    /// Posts one request and decodes the reply.
    async fn call(&self, method: &str, args: &[Arg]) -> Result<Value, TargetError> {
        let wire_method = self.wire_method(method);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: &wire_method,
            params: to_params(args),
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|err| TargetError::Decode(format!("request encoding failed: {err}")))?;
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(payload)
            .send()
            .await
            .map_err(|err| TargetError::Transport(err.to_string()))?;
        let status = response.status();
        let body = read_response_body_with_limit(response, MAX_RESPONSE_BYTES).await?;
        if !status.is_success() {
            let preview: String =
                String::from_utf8_lossy(&body).trim().chars().take(MAX_ERROR_PREVIEW).collect();
            return Err(TargetError::Transport(format!(
                "http status {}: {preview}",
                status.as_u16()
            )));
        }
        let reply: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|err| TargetError::Decode(format!("invalid json-rpc response: {err}")))?;
        if let Some(error) = reply.error {
            return Err(TargetError::Rpc { code: error.code, message: error.message });
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Target for RpcTarget {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        ctx: &CallContext,
        method: &str,
        args: &[Arg],
    ) -> Result<Value, TargetError> {
        if ctx.shutdown.is_shutdown() {
            return Err(TargetError::Cancelled);
        }
        self.call(method, args).await
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a response body while enforcing a hard byte limit.
async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TargetError> {
    let mut body = Vec::new();
    while let Some(chunk) =
        response.chunk().await.map_err(|err| TargetError::Transport(err.to_string()))?
    {
        let next_total = body.len().saturating_add(chunk.len());
        if next_total > limit {
            return Err(TargetError::Transport(format!(
                "response exceeds {limit} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
