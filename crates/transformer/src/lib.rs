// transformer/src/lib.rs

//! Ethereum JSON-RPC on top of a Kaon node
//!
//! This crate provides:
//! - The method registry and the `EthProxy` trait
//! - One proxy per supported Ethereum method
//! - Address, amount, block tag and topic translation
//! - Stateful filters for `eth_newFilter` and friends
//! - Polling-based `eth_subscribe` notifications

pub mod error;
pub mod eth;
pub mod registry;
pub mod conversion;
pub mod filters;
pub mod notifier;
pub mod proxies;

pub use error::{JsonRpcError, TransformResult};
pub use eth::{JsonRpcRequest, JsonRpcResponse};
pub use filters::FilterSimulator;
pub use notifier::{Agent, Notifier, SubscriptionKind};
pub use registry::{EthProxy, RequestContext, Transformer};

use kaon_client::KaonClient;
use std::sync::Arc;

/// Registry with every proxy registered, attached to `agent` so
/// `newHeads` subscriptions can reuse the block proxies.
pub fn default_transformer(client: &KaonClient, agent: &Arc<Agent>) -> Result<Arc<Transformer>, String> {
    let filters = Arc::new(FilterSimulator::new());
    let transformer = Arc::new(Transformer::with_proxies(proxies::default_proxies(client, &filters))?);
    agent.set_transformer(&transformer);
    tracing::debug!(methods = transformer.len(), "Transformer ready");
    Ok(transformer)
}
