//! The `RpcTransport` trait, implemented by every provider.
//!
//! Wire framing (HTTP, IPC, WebSocket) lives behind this trait. The request
//! manager only needs request/response exchange, an optional push channel
//! for `eth_subscription` notifications, and a way to tear the connection
//! down when the provider is replaced.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse, Notification};

/// Push channel of a transport.
///
/// An `Err` item means the connection was lost; every live subscription is
/// closed with that error.
pub type NotificationStream = mpsc::UnboundedReceiver<Result<Notification, RpcError>>;

/// The central async trait every RPC transport must implement.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError>;

    /// Send a batch of JSON-RPC requests.
    ///
    /// Responses may come back in any order. The default implementation
    /// sends them sequentially; override for true batching.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, RpcError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Hand over the notification channel. Returns `None` for transports that
    /// cannot push, and on every call after the first.
    fn take_notifications(&self) -> Option<NotificationStream> {
        None
    }

    /// Whether `eth_subscribe` is usable on this transport.
    fn supports_subscriptions(&self) -> bool {
        false
    }

    /// Drop the connection state. Called when the provider is replaced.
    async fn reset(&self) {}

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;
}
