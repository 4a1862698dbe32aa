//! Chain adapters implementing [`ChainQuery`](crate::traits::ChainQuery)
//! and [`TxSubmitter`](crate::traits::TxSubmitter).

pub mod local;
pub mod rpc;

pub use local::LocalLedger;
pub use rpc::{JsonRpcAdapter, RpcConfig};
