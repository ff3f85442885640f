// transformer/src/registry.rs

use crate::error::{JsonRpcError, TransformResult};
use crate::eth::JsonRpcRequest;
use crate::notifier::Notifier;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Translates one Ethereum method into native calls
#[async_trait]
pub trait EthProxy: Send + Sync {
    fn method(&self) -> &str;

    async fn request(&self, req: &JsonRpcRequest, ctx: &RequestContext) -> TransformResult<Value>;
}

/// Per-request state handed to every proxy
#[derive(Clone, Default)]
pub struct RequestContext {
    /// Present on WebSocket connections only
    pub notifier: Option<Arc<Notifier>>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { notifier: None, cancel }
    }

    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// Method-name keyed table of proxies
#[derive(Default)]
pub struct Transformer {
    proxies: HashMap<String, Arc<dyn EthProxy>>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `proxies`, failing on the first duplicate
    pub fn with_proxies(proxies: Vec<Arc<dyn EthProxy>>) -> Result<Self, String> {
        let mut transformer = Self::new();
        for proxy in proxies {
            transformer.register(proxy)?;
        }
        Ok(transformer)
    }

    pub fn register(&mut self, proxy: Arc<dyn EthProxy>) -> Result<(), String> {
        let method = proxy.method().to_string();
        if self.proxies.contains_key(&method) {
            return Err(format!("method already exist: {}", method));
        }
        self.proxies.insert(method, proxy);
        Ok(())
    }

    /// Dispatch on the exact method name
    pub async fn transform(&self, req: &JsonRpcRequest, ctx: &RequestContext) -> TransformResult<Value> {
        let proxy = self
            .proxies
            .get(&req.method)
            .ok_or_else(|| JsonRpcError::MethodNotFound(req.method.clone()))?;

        tracing::debug!(method = %req.method, "Dispatching request");
        proxy.request(req, ctx).await
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.proxies.contains_key(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.proxies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(&'static str, Value);

    #[async_trait]
    impl EthProxy for Fixed {
        fn method(&self) -> &str {
            self.0
        }

        async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
            Ok(self.1.clone())
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut t = Transformer::new();
        t.register(Arc::new(Fixed("eth_chainId", json!("0x1")))).unwrap();
        let err = t.register(Arc::new(Fixed("eth_chainId", json!("0x2")))).unwrap_err();
        assert_eq!(err, "method already exist: eth_chainId");
        assert_eq!(t.len(), 1);
    }

    #[tokio::test]
    async fn test_exact_method_match() {
        let t = Transformer::with_proxies(vec![Arc::new(Fixed("eth_chainId", json!("0x1")))]).unwrap();
        let ctx = RequestContext::default();

        let ok = t.transform(&JsonRpcRequest::new("eth_chainId", json!([])), &ctx).await;
        assert_eq!(ok.unwrap(), json!("0x1"));

        let err = t.transform(&JsonRpcRequest::new("eth_chainid", json!([])), &ctx).await.unwrap_err();
        assert_eq!(err.code(), -32601);
        let err = t.transform(&JsonRpcRequest::new("eth_chain", json!([])), &ctx).await.unwrap_err();
        assert_eq!(err, JsonRpcError::MethodNotFound("eth_chain".into()));
    }
}
