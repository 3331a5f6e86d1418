//! Network query capability
//!
//! - **rpc_errors**: transient vs channel-fatal classification
//! - **client**: the `TransactionQuery` / `ChainReader` seams and a REST
//!   implementation against a fullnode

mod client;
mod rpc_errors;

pub use client::{ChainReader, RestNetworkClient, TransactionQuery};
pub use rpc_errors::RpcError;
