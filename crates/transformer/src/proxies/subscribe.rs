// transformer/src/proxies/subscribe.rs

use super::string_param;
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::JsonRpcRequest;
use crate::notifier::SubscriptionKind;
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use serde_json::Value;

/// `eth_subscribe`, WebSocket connections only
pub struct Subscribe;

#[async_trait]
impl EthProxy for Subscribe {
    fn method(&self) -> &str {
        "eth_subscribe"
    }

    async fn request(&self, req: &JsonRpcRequest, ctx: &RequestContext) -> TransformResult<Value> {
        let notifier = ctx
            .notifier
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_request("subscriptions require a websocket connection"))?;

        let kind = SubscriptionKind::from_params(req.params()?)?;
        tracing::debug!(kind = kind.name(), "New subscription");
        Ok(Value::String(notifier.subscribe(kind)))
    }
}

pub struct Unsubscribe;

#[async_trait]
impl EthProxy for Unsubscribe {
    fn method(&self) -> &str {
        "eth_unsubscribe"
    }

    async fn request(&self, req: &JsonRpcRequest, ctx: &RequestContext) -> TransformResult<Value> {
        let notifier = ctx
            .notifier
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_request("subscriptions require a websocket connection"))?;

        let id = string_param(req.params()?, 0)?;
        Ok(Value::Bool(notifier.unsubscribe(id)))
    }
}
