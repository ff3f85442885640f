// rpc/src/server.rs
use crate::analytics::Analytics;
use crate::health::HealthChecker;
use crate::websocket;
use crate::{RpcError, RpcResult};
use hyper::header::{HeaderValue, ORIGIN};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use transformer::{Agent, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestContext, Transformer};

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub listen_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    /// Serialize HTTP requests through one lock
    pub single_threaded: bool,
    /// Log every request and response body
    pub debug: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 23889)),
            cors_origins: vec!["*".to_string()],
            single_threaded: false,
            debug: false,
        }
    }
}

pub struct RpcServer {
    config: RpcConfig,
    transformer: Arc<Transformer>,
    agent: Arc<Agent>,
    health: Arc<HealthChecker>,
    eth_analytics: Arc<Analytics>,
    lock: Option<Mutex<()>>,
    shutdown: CancellationToken,
}

impl RpcServer {
    pub fn new(
        config: RpcConfig,
        transformer: Arc<Transformer>,
        agent: Arc<Agent>,
        health: Arc<HealthChecker>,
        eth_analytics: Arc<Analytics>,
        shutdown: CancellationToken,
    ) -> Self {
        let lock = config.single_threaded.then(|| Mutex::new(()));
        Self {
            config,
            transformer,
            agent,
            health,
            eth_analytics,
            lock,
            shutdown,
        }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Serve until the shutdown token fires
    pub async fn start(self: Arc<Self>) -> RpcResult<()> {
        tracing::info!("Starting RPC server on {}", self.config.listen_addr);
        if self.lock.is_some() {
            tracing::info!("Processing RPC requests single threaded");
        }

        let value = self.clone();
        let make_svc = make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
            let server = value.clone();
            let remote = conn.remote_addr();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req, remote).await }
                }))
            }
        });

        let server = Server::try_bind(&self.config.listen_addr)
            .map_err(|e| RpcError::Bind(self.config.listen_addr, e.to_string()))?
            .serve(make_svc);

        tracing::info!("RPC server listening on {}", self.config.listen_addr);

        let shutdown = self.shutdown.clone();
        server
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| RpcError::ServerError(e.to_string()))?;

        tracing::info!("RPC server stopped");
        Ok(())
    }

    async fn handle_request(self: Arc<Self>, mut req: Request<Body>, remote: SocketAddr) -> Result<Response<Body>, hyper::Error> {
        let origin = self.allowed_origin(req.headers().get(ORIGIN));

        if req.method() == Method::OPTIONS {
            return Ok(self.respond(origin, StatusCode::NO_CONTENT, Body::empty()));
        }

        if req.method() == Method::GET {
            match req.uri().path() {
                "/live" | "/ready" => return Ok(self.health_response(origin).await),
                _ => {}
            }

            if hyper_tungstenite::is_upgrade_request(&req) {
                return match hyper_tungstenite::upgrade(&mut req, None) {
                    Ok((response, socket)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            websocket::serve_connection(server, socket, remote).await;
                        });
                        Ok(response)
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, %remote, "WebSocket upgrade failed");
                        Ok(self.respond(origin, StatusCode::BAD_REQUEST, Body::from(e.to_string())))
                    }
                };
            }
        }

        if req.method() != Method::POST {
            return Ok(self.respond(origin, StatusCode::METHOD_NOT_ALLOWED, Body::from("Method not allowed")));
        }

        let body_bytes = hyper::body::to_bytes(req.into_body()).await?;

        let ctx = RequestContext::new(self.shutdown.child_token());
        let response = match &self.lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                self.process_payload(&body_bytes, &ctx).await
            }
            None => self.process_payload(&body_bytes, &ctx).await,
        };

        // JSON-RPC errors still travel as HTTP 200
        let json = serde_json::to_string(&response).unwrap_or_else(|_| "null".to_string());
        Ok(self.respond(origin, StatusCode::OK, Body::from(json)))
    }

    fn respond(&self, origin: Option<HeaderValue>, status: StatusCode, body: Body) -> Response<Body> {
        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        if let Some(origin) = origin {
            headers.insert("Access-Control-Allow-Origin", origin);
            headers.insert("Access-Control-Allow-Methods", HeaderValue::from_static("GET, POST, OPTIONS"));
            headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("Content-Type"));
        }
        response
    }

    /// `*` allows everyone; otherwise the request origin must be listed
    fn allowed_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        if self.config.cors_origins.iter().any(|o| o == "*") {
            return Some(HeaderValue::from_static("*"));
        }
        let origin = origin?;
        let listed = origin
            .to_str()
            .map(|o| self.config.cors_origins.iter().any(|allowed| allowed == o))
            .unwrap_or(false);
        listed.then(|| origin.clone())
    }

    async fn health_response(&self, origin: Option<HeaderValue>) -> Response<Body> {
        let report = self.health.report().await;
        let status = if report.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        self.respond(origin, status, Body::from(report.to_json().to_string()))
    }

    /// A single request or a batch, as raw bytes. Batches run one after
    /// the other and answer in input order.
    pub async fn process_payload(&self, body: &[u8], ctx: &RequestContext) -> Value {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable request body");
                self.eth_analytics.failure();
                return response_value(JsonRpcResponse::failure(
                    Some(Value::Null),
                    JsonRpcError::InvalidMessage(format!("Parse error: {}", e)),
                ));
            }
        };

        match payload {
            Value::Array(batch) if batch.is_empty() => {
                self.eth_analytics.failure();
                response_value(JsonRpcResponse::failure(
                    Some(Value::Null),
                    JsonRpcError::invalid_request("empty batch"),
                ))
            }
            Value::Array(batch) => {
                let mut responses = Vec::with_capacity(batch.len());
                for item in batch {
                    responses.push(response_value(self.process_value(item, ctx).await));
                }
                Value::Array(responses)
            }
            single => response_value(self.process_value(single, ctx).await),
        }
    }

    async fn process_value(&self, value: Value, ctx: &RequestContext) -> JsonRpcResponse {
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => self.dispatch(req, ctx).await,
            Err(e) => {
                self.eth_analytics.failure();
                JsonRpcResponse::failure(Some(Value::Null), JsonRpcError::invalid_request(e.to_string()))
            }
        }
    }

    pub async fn dispatch(&self, req: JsonRpcRequest, ctx: &RequestContext) -> JsonRpcResponse {
        if self.config.debug {
            tracing::debug!(request = %serde_json::to_string(&req).unwrap_or_default(), "=> ETH request");
        }

        let response = match self.transformer.transform(&req, ctx).await {
            Ok(result) => {
                self.eth_analytics.success();
                JsonRpcResponse::success(req.id.clone(), result)
            }
            Err(err) => {
                self.eth_analytics.failure();
                match &err {
                    JsonRpcError::MethodNotFound(_) | JsonRpcError::InvalidParams(_) => {
                        tracing::debug!(method = %req.method, error = %err, "Request rejected")
                    }
                    _ => tracing::warn!(method = %req.method, error = %err, "Request failed"),
                }
                JsonRpcResponse::failure(req.id.clone(), err)
            }
        };

        if self.config.debug {
            tracing::debug!(response = %serde_json::to_string(&response).unwrap_or_default(), "<= ETH response");
        }
        response
    }
}

fn response_value(response: JsonRpcResponse) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaon_client::transport::mock::MockTransport;
    use kaon_client::{Chain, ClientOptions, KaonClient, NetworkSetting};
    use serde_json::json;

    fn server(config: RpcConfig) -> (RpcServer, Arc<Analytics>) {
        let shutdown = CancellationToken::new();
        let options = ClientOptions {
            network: NetworkSetting::Fixed(Chain::RegTest),
            ..Default::default()
        };
        let client = KaonClient::new(Arc::new(MockTransport::new()), options, shutdown.clone());
        let agent = Agent::new(client.clone(), shutdown.clone());
        let transformer = transformer::default_transformer(&client, &agent).unwrap();
        let eth = Arc::new(Analytics::default());
        let health = Arc::new(HealthChecker::new(client, Arc::new(Analytics::default()), eth.clone(), 80));
        (RpcServer::new(config, transformer, agent, health, eth.clone(), shutdown), eth)
    }

    #[tokio::test]
    async fn test_single_request_echoes_id() {
        let (server, eth) = server(RpcConfig::default());
        let ctx = RequestContext::default();

        let response = server
            .process_payload(br#"{"jsonrpc":"2.0","id":7,"method":"eth_chainId","params":[]}"#, &ctx)
            .await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": 7, "result": "0x2ed4"}));
        assert_eq!(eth.success_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_batch_keeps_order() {
        let (server, _) = server(RpcConfig::default());
        let ctx = RequestContext::default();
        let body = json!([
            {"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"},
            {"jsonrpc": "2.0", "id": 2, "method": "eth_nothing"},
            {"jsonrpc": "2.0", "id": 3, "method": "net_version"}
        ]);

        let response = server.process_payload(body.to_string().as_bytes(), &ctx).await;
        let items = response.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["result"], json!("0x2ed4"));
        assert_eq!(items[1]["error"]["code"], json!(-32601));
        assert_eq!(items[1]["id"], json!(2));
        assert_eq!(items[2]["id"], json!(3));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let (server, eth) = server(RpcConfig::default());
        let response = server.process_payload(b"{not json", &RequestContext::default()).await;
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], Value::Null);
        assert!(eth.success_rate() < 1.0);
    }

    #[tokio::test]
    async fn test_request_without_id() {
        let (server, _) = server(RpcConfig::default());
        let response = server
            .process_payload(br#"{"jsonrpc":"2.0","method":"eth_protocolVersion"}"#, &RequestContext::default())
            .await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "result": "0x41"}));
    }

    #[tokio::test]
    async fn test_cors_origins() {
        let (open, _) = server(RpcConfig::default());
        assert_eq!(open.allowed_origin(None), Some(HeaderValue::from_static("*")));

        let config = RpcConfig {
            cors_origins: vec!["https://app.example".to_string()],
            ..Default::default()
        };
        let (strict, _) = server(config);
        let listed = HeaderValue::from_static("https://app.example");
        assert_eq!(strict.allowed_origin(Some(&listed)), Some(listed.clone()));
        assert_eq!(strict.allowed_origin(Some(&HeaderValue::from_static("https://evil.example"))), None);
        assert_eq!(strict.allowed_origin(None), None);
    }
}
