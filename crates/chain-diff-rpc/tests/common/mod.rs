// crates/chain-diff-rpc/tests/common/mod.rs
// ============================================================================
// Module: Common RPC Test Fixtures
// Description: Local JSON-RPC server for client and fixture builder tests.
// Purpose: Exercise the HTTP path without external endpoints.
// Dependencies: tiny_http, serde_json
// ============================================================================

//! ## Overview
//! [`RpcServer`] binds an ephemeral local port, answers every request through
//! a handler closure, and records what it received.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Request observed by the server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Decoded JSON body (`Null` when the body was not JSON).
    pub body: Value,
    /// Authorization header value, if present.
    pub authorization: Option<String>,
}

/// Reply produced by a handler: status code and raw body.
pub type Reply = (u16, String);

/// Local JSON-RPC server running on a background thread.
pub struct RpcServer {
    /// Base URL of the server.
    url: String,
    /// Underlying server, kept for unblocking on drop.
    server: Arc<Server>,
    /// Requests received so far.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RpcServer {
    /// Starts a server answering each request with `handler`.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let url = format!("http://{}", server.server_addr().to_ip().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let worker = Arc::clone(&server);
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            while let Ok(mut request) = worker.recv() {
                let mut raw = String::new();
                let _ = request.as_reader().read_to_string(&mut raw);
                let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
                let authorization = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.as_str().to_string());
                let (status, reply) = handler(&body);
                recorded.lock().unwrap().push(RecordedRequest { body, authorization });
                let header =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response =
                    Response::from_string(reply).with_status_code(status).with_header(header);
                let _ = request.respond(response);
            }
        });
        Self { url, server, requests }
    }

    /// Returns the server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Returns the wire method of a request.
pub fn method_of(request: &Value) -> &str {
    request.get("method").and_then(Value::as_str).unwrap_or_default()
}

/// Builds a successful JSON-RPC reply echoing the request id.
pub fn result_reply(request: &Value, result: &Value) -> Reply {
    let body = json!({ "jsonrpc": "2.0", "id": request.get("id"), "result": result });
    (200, body.to_string())
}

/// Builds a JSON-RPC error reply echoing the request id.
pub fn error_reply(request: &Value, code: i64, message: &str) -> Reply {
    let body = json!({
        "jsonrpc": "2.0",
        "id": request.get("id"),
        "error": { "code": code, "message": message }
    });
    (200, body.to_string())
}
