// crates/chain-diff-rpc/tests/rpc_target.rs
// ============================================================================
// Module: RPC Target Tests
// Description: JSON-RPC request shape and reply classification.
// ============================================================================
//! ## Overview
//! Runs [`RpcTarget`] against a local server and checks the request envelope,
//! bearer authentication, and how replies map to results and errors.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use chain_diff_core::Arg;
use chain_diff_core::CallContext;
use chain_diff_core::CheckpointKey;
use chain_diff_core::ShutdownHandle;
use chain_diff_core::ShutdownSignal;
use chain_diff_core::Target;
use chain_diff_core::TargetError;
use chain_diff_rpc::RpcTarget;
use chain_diff_rpc::RpcTargetConfig;
use common::RpcServer;
use common::error_reply;
use common::method_of;
use common::result_reply;
use serde_json::Value;
use serde_json::json;

fn target(server: &RpcServer, token: Option<&str>) -> RpcTarget {
    let config = RpcTargetConfig::new("reference", server.url())
        .with_token(token.map(str::to_string));
    RpcTarget::new(config).unwrap()
}

fn context() -> CallContext {
    CallContext::new(10, ShutdownSignal::never())
}

#[tokio::test]
async fn requests_are_namespaced_and_authenticated() {
    let server = RpcServer::start(|request| result_reply(request, &json!({ "Height": 10 })));
    let target = target(&server, Some("secret-token"));

    let args = [Arg::Int(10), Arg::Key(CheckpointKey::new(["bafya"])), Arg::Cid("bafyb".into())];
    let result = target.invoke(&context(), "ChainGetTipSetAfterHeight", &args).await.unwrap();
    assert_eq!(result, json!({ "Height": 10 }));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(method_of(body), "Filecoin.ChainGetTipSetAfterHeight");
    assert_eq!(body["params"], json!([10, [{ "/": "bafya" }], { "/": "bafyb" }]));
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret-token"));
}

#[tokio::test]
async fn request_ids_are_unique() {
    let server = RpcServer::start(|request| result_reply(request, &json!(1)));
    let target = target(&server, None);
    for _ in 0 .. 3 {
        target.invoke(&context(), "ChainHead", &[]).await.unwrap();
    }
    let ids: Vec<_> = server.requests().iter().map(|request| request.body["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    assert!(server.requests()[0].authorization.is_none());
}

#[tokio::test]
async fn error_objects_become_rpc_errors() {
    let server = RpcServer::start(|request| error_reply(request, 1, "method not supported"));
    let err = target(&server, None).invoke(&context(), "ChainHead", &[]).await.unwrap_err();
    assert_eq!(err, TargetError::Rpc { code: 1, message: "method not supported".to_string() });
}

#[tokio::test]
async fn http_failures_are_transport_errors() {
    let server = RpcServer::start(|_| (503, "upstream unavailable".to_string()));
    let err = target(&server, None).invoke(&context(), "ChainHead", &[]).await.unwrap_err();
    match err {
        TargetError::Transport(message) => {
            assert!(message.contains("503"), "{message}");
            assert!(message.contains("upstream unavailable"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_replies_are_decode_errors() {
    let server = RpcServer::start(|_| (200, "not json".to_string()));
    let err = target(&server, None).invoke(&context(), "ChainHead", &[]).await.unwrap_err();
    assert!(matches!(err, TargetError::Decode(_)));
}

#[tokio::test]
async fn missing_results_read_as_null() {
    let server = RpcServer::start(|request| {
        (200, json!({ "jsonrpc": "2.0", "id": request["id"] }).to_string())
    });
    let result = target(&server, None).invoke(&context(), "ChainHead", &[]).await.unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn cancelled_calls_are_not_sent() {
    let server = RpcServer::start(|request| result_reply(request, &json!(1)));
    let handle = ShutdownHandle::new();
    handle.shutdown();
    let ctx = CallContext::new(10, handle.signal());

    let err = target(&server, None).invoke(&ctx, "ChainHead", &[]).await.unwrap_err();
    assert_eq!(err, TargetError::Cancelled);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn shutdown_lets_an_issued_call_finish() {
    let server = RpcServer::start(|request| {
        std::thread::sleep(std::time::Duration::from_millis(300));
        result_reply(request, &json!({ "Height": 42 }))
    });
    let target = target(&server, None);
    let handle = ShutdownHandle::new();
    let ctx = CallContext::new(10, handle.signal());

    let call = target.invoke(&ctx, "ChainHead", &[]);
    let trigger = async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.shutdown();
    };
    let (result, ()) = tokio::join!(call, trigger);
    assert_eq!(result.unwrap(), json!({ "Height": 42 }));
    assert_eq!(server.requests().len(), 1);

    let err = target.invoke(&ctx, "ChainHead", &[]).await.unwrap_err();
    assert_eq!(err, TargetError::Cancelled);
    assert_eq!(server.requests().len(), 1);
}
