//! Request-manager error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors raised while talking to a node through the request manager.
///
/// `Clone` so one failure can reach both a subscription's callback and its
/// error listeners.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    /// The response is malformed or answers a different request id.
    #[error("Invalid JSON RPC response: {reason}")]
    InvalidResponse { reason: String },

    /// No provider is set, or the provider dropped the connection.
    #[error("CONNECTION ERROR: {reason}")]
    InvalidConnection { reason: String },

    /// Error object returned by the node.
    #[error("Returned error: {}", .0.message)]
    Rpc(JsonRpcError),

    /// The provider cannot push `eth_subscription` notifications.
    #[error("The current provider doesn't support subscriptions: {provider}")]
    SubscriptionsNotSupported { provider: String },

    /// Parameters rejected before the request was sent.
    #[error("Invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    /// A result could not be converted to the expected type.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl RpcError {
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        Self::InvalidConnection {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the node itself rejected the request.
    pub fn is_node_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}
