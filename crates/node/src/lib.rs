// node/src/lib.rs

//! The `eth-rpc-gate` binary's library half
//!
//! This crate provides:
//! - `GateConfig`, the TOML file with environment overrides
//! - Accounts file loading
//! - `Gateway`, which wires the node client, proxies and server together

pub mod config;
pub mod runtime;

pub use config::{load_accounts, GateConfig};
pub use runtime::Gateway;
