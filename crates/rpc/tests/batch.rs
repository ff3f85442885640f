use async_trait::async_trait;
use kaon_client::transport::mock::MockTransport;
use kaon_client::{ClientOptions, KaonClient};
use rpc::{Analytics, HealthChecker, RpcConfig, RpcServer};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use transformer::{Agent, EthProxy, JsonRpcError, JsonRpcRequest, RequestContext, Transformer};

struct Echo;

#[async_trait]
impl EthProxy for Echo {
    fn method(&self) -> &str {
        "test_echo"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> Result<Value, JsonRpcError> {
        Ok(Value::Array(req.params()?.to_vec()))
    }
}

struct Broken;

#[async_trait]
impl EthProxy for Broken {
    fn method(&self) -> &str {
        "test_broken"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> Result<Value, JsonRpcError> {
        Err(JsonRpcError::callback("node unavailable"))
    }
}

fn server() -> (RpcServer, Arc<Analytics>) {
    let shutdown = CancellationToken::new();
    let client = KaonClient::new(Arc::new(MockTransport::new()), ClientOptions::default(), shutdown.clone());
    let agent = Agent::new(client.clone(), shutdown.clone());
    let proxies: Vec<Arc<dyn EthProxy>> = vec![Arc::new(Echo), Arc::new(Broken)];
    let transformer = Arc::new(Transformer::with_proxies(proxies).unwrap());
    let eth = Arc::new(Analytics::default());
    let health = Arc::new(HealthChecker::new(client, Arc::new(Analytics::default()), eth.clone(), 80));
    let server = RpcServer::new(RpcConfig::default(), transformer, agent, health, eth.clone(), shutdown);
    (server, eth)
}

async fn post(server: &RpcServer, body: &str) -> Value {
    server.process_payload(body.as_bytes(), &RequestContext::default()).await
}

#[tokio::test]
async fn test_batch_answers_every_request_in_order() {
    let (server, _) = server();
    let response = post(
        &server,
        r#"[
            {"jsonrpc": "2.0", "id": 1, "method": "test_echo", "params": ["a"]},
            {"jsonrpc": "2.0", "id": "two", "method": "test_broken", "params": []},
            {"jsonrpc": "2.0", "id": 3, "method": "test_missing", "params": []}
        ]"#,
    )
    .await;

    let responses = response.as_array().unwrap();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["id"], json!(1));
    assert_eq!(responses[0]["result"], json!(["a"]));
    assert_eq!(responses[1]["id"], json!("two"));
    assert_eq!(responses[1]["error"]["code"], json!(-32000));
    assert_eq!(responses[1]["error"]["message"], json!("node unavailable"));
    assert_eq!(responses[2]["error"]["code"], json!(-32601));
}

#[tokio::test]
async fn test_invalid_entry_does_not_sink_the_batch() {
    let (server, _) = server();
    let response = post(&server, r#"[42, {"jsonrpc": "2.0", "id": 7, "method": "test_echo", "params": []}]"#).await;

    let responses = response.as_array().unwrap();
    assert_eq!(responses[0]["error"]["code"], json!(-32600));
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[1]["result"], json!([]));
}

#[tokio::test]
async fn test_empty_batch_is_invalid() {
    let (server, _) = server();
    let response = post(&server, "[]").await;
    assert_eq!(response["error"]["code"], json!(-32600));
}

#[tokio::test]
async fn test_requests_feed_client_analytics() {
    let (server, eth) = server();
    post(&server, r#"{"jsonrpc": "2.0", "id": 1, "method": "test_echo", "params": []}"#).await;
    post(&server, r#"{"jsonrpc": "2.0", "id": 2, "method": "test_broken", "params": []}"#).await;

    assert_eq!(eth.len(), 2);
    assert_eq!(eth.success_rate(), 0.5);
}
