//! API node checking over the chain's HTTP RPC

pub mod checker;
pub mod client;

pub use checker::{check_api, ApiCheckSettings};
pub use client::{ChainClient, GetInfo, RpcError};
