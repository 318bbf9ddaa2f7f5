//! chainweb3-rpc: request manager and subscription lifecycle for ChainWeb3.
//!
//! # Overview
//!
//! - [`RpcTransport`]: the async trait a provider implements
//! - [`RequestManager`]: id assignment, response validation, provider swaps
//! - [`RpcMethod`]: typed method descriptors (`eth_call`, `eth_getLogs`, ...)
//! - [`BatchRequest`]: several descriptors in one round trip
//! - [`Subscription`]: `eth_subscribe` streams with backfill and `once` mode
//! - [`MockTransport`]: scripted transport for tests

pub mod batch;
pub mod error;
pub mod manager;
pub mod method;
pub mod mock;
pub mod registry;
pub mod request;
pub mod subscription;
pub mod transport;
pub mod types;

pub use batch::{BatchHandle, BatchRequest};
pub use error::RpcError;
pub use manager::RequestManager;
pub use method::RpcMethod;
pub use mock::MockTransport;
pub use registry::{Dispatch, SubscriptionId, SubscriptionMessage, SubscriptionRegistry};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Notification, RpcId};
pub use subscription::{NewHeads, Subscription, SubscriptionModel, SubscriptionState};
pub use transport::{NotificationStream, RpcTransport};
pub use types::{
    Block, BlockHeader, BlockId, BlockNumber, Transaction, TransactionReceipt, TransactionRequest,
};
