// rpc/src/lib.rs

//! HTTP and WebSocket front end of the gateway
//!
//! This crate provides:
//! - The JSON-RPC server, single requests and sequential batches
//! - WebSocket connections carrying subscription notifications
//! - `/live` and `/ready` health checks
//! - Rolling success-rate tracking for clients and the node

pub mod analytics;
pub mod health;
pub mod server;
pub mod websocket;

pub use analytics::{Analytics, RecordingTransport};
pub use health::{HealthChecker, HealthError, HealthReport};
pub use server::{RpcConfig, RpcServer};

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("couldn't bind {0}: {1}")]
    Bind(SocketAddr, String),
    #[error("Server error: {0}")]
    ServerError(String),
}

pub type RpcResult<T> = Result<T, RpcError>;
