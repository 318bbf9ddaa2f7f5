//! Request manager: one per provider connection.
//!
//! Assigns request ids, validates responses against the request they answer,
//! owns the subscription registry and pumps the transport's notification
//! channel into it. Replacing the provider unsubscribes everything on the
//! old one first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::future;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RpcError;
use crate::method::RpcMethod;
use crate::registry::{Dispatch, SubscriptionId, SubscriptionMessage, SubscriptionRegistry};
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::{NotificationStream, RpcTransport};

/// Shared handle; clones talk to the same provider and registry.
#[derive(Clone)]
pub struct RequestManager {
    inner: Arc<Inner>,
}

struct Inner {
    provider: RwLock<Option<Arc<dyn RpcTransport>>>,
    next_id: AtomicU64,
    registry: Arc<SubscriptionRegistry>,
    pump: Mutex<Pump>,
}

/// Notification channel taken from the provider, forwarded lazily on the
/// first subscription so the manager can be built outside a runtime.
#[derive(Default)]
struct Pump {
    stream: Option<NotificationStream>,
    task: Option<JoinHandle<()>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RequestManager {
    pub fn new(provider: Arc<dyn RpcTransport>) -> Self {
        let manager = Self::disconnected();
        manager.install(Some(provider));
        manager
    }

    /// A manager with no provider; every request fails with `InvalidConnection`.
    pub fn disconnected() -> Self {
        Self {
            inner: Arc::new(Inner {
                provider: RwLock::new(None),
                next_id: AtomicU64::new(1),
                registry: Arc::new(SubscriptionRegistry::new()),
                pump: Mutex::new(Pump::default()),
            }),
        }
    }

    pub fn provider(&self) -> Option<Arc<dyn RpcTransport>> {
        self.inner
            .provider
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn require_provider(&self) -> Result<Arc<dyn RpcTransport>, RpcError> {
        self.provider()
            .ok_or_else(|| RpcError::connection("provider not set or invalid"))
    }

    pub fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    pub fn supports_subscriptions(&self) -> bool {
        self.provider()
            .map(|p| p.supports_subscriptions())
            .unwrap_or(false)
    }

    /// Send `method(params)` and return the validated result.
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let req = JsonRpcRequest::new(self.next_id(), method, params);
        self.send_request(req).await
    }

    /// Send a prepared request and return the validated result.
    pub async fn send_request(&self, req: JsonRpcRequest) -> Result<Value, RpcError> {
        let provider = self.require_provider()?;
        tracing::debug!(method = %req.method, id = %req.id, "sending request");
        let id = req.id.clone();
        let resp = provider.send(req).await?;
        into_result(resp, &id)
    }

    /// Execute a method descriptor.
    pub async fn execute<M: RpcMethod>(&self, method: &M) -> Result<M::Output, RpcError> {
        let req = method.to_request(self.next_id())?;
        let result = self.send_request(req).await?;
        method.after_execution(result)
    }

    /// Send several requests at once. Responses are returned in whatever
    /// order the transport produced them.
    pub async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, RpcError> {
        let provider = self.require_provider()?;
        tracing::debug!(count = reqs.len(), "sending batch");
        provider.send_batch(reqs).await
    }

    /// `eth_subscribe(kind, ...params)`; registers the returned id.
    pub async fn add_subscription(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<SubscriptionMessage>), RpcError> {
        let provider = self.require_provider()?;
        if !provider.supports_subscriptions() {
            return Err(RpcError::SubscriptionsNotSupported {
                provider: provider.url().to_string(),
            });
        }
        self.start_pump();

        let mut wire = Vec::with_capacity(params.len() + 1);
        wire.push(Value::String(kind.to_string()));
        wire.extend(params);

        let id = match self.send("eth_subscribe", wire).await? {
            Value::String(id) => SubscriptionId(id),
            other => {
                return Err(RpcError::invalid_response(format!(
                    "eth_subscribe returned {other} instead of an id"
                )))
            }
        };
        let rx = self.inner.registry.register(id.clone(), kind);
        tracing::info!(subscription = %id, kind, "subscribed");
        Ok((id, rx))
    }

    /// `eth_unsubscribe(id)`. The local registration is dropped first, so a
    /// failed request still stops delivery.
    pub async fn remove_subscription(&self, id: &SubscriptionId) -> Result<bool, RpcError> {
        self.inner.registry.remove(id);
        let result = self
            .send("eth_unsubscribe", vec![Value::String(id.0.clone())])
            .await?;
        tracing::info!(subscription = %id, "unsubscribed");
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Unsubscribe everything on the current provider and reset it.
    pub async fn reset(&self) {
        let active = self.inner.registry.active();
        let unsubscribes = active.iter().map(|(id, _)| self.remove_subscription(id));
        for (result, (id, _)) in future::join_all(unsubscribes).await.into_iter().zip(&active) {
            if let Err(e) = result {
                tracing::warn!(subscription = %id, error = %e, "unsubscribe during reset failed");
            }
        }
        self.inner.registry.clear();
        self.stop_pump();

        if let Some(provider) = self.provider() {
            provider.reset().await;
        }
    }

    /// Replace the provider. Subscriptions on the old provider are
    /// unsubscribed and their streams closed.
    pub async fn set_provider(&self, provider: Option<Arc<dyn RpcTransport>>) {
        if self.provider().is_some() {
            self.reset().await;
        }
        self.install(provider);
    }

    fn install(&self, provider: Option<Arc<dyn RpcTransport>>) {
        let stream = provider.as_ref().and_then(|p| p.take_notifications());
        if let Some(p) = &provider {
            tracing::debug!(url = p.url(), push = stream.is_some(), "provider installed");
        }
        *self
            .inner
            .provider
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = provider;
        let mut pump = lock(&self.inner.pump);
        pump.stream = stream;
    }

    fn start_pump(&self) {
        let mut pump = lock(&self.inner.pump);
        if pump.task.is_some() {
            return;
        }
        let Some(stream) = pump.stream.take() else {
            return;
        };
        let registry = Arc::clone(&self.inner.registry);
        pump.task = Some(tokio::spawn(pump_notifications(stream, registry)));
    }

    fn stop_pump(&self) {
        let mut pump = lock(&self.inner.pump);
        pump.stream = None;
        if let Some(task) = pump.task.take() {
            task.abort();
        }
    }
}

fn into_result(resp: JsonRpcResponse, id: &crate::request::RpcId) -> Result<Value, RpcError> {
    resp.check(id).map_err(RpcError::invalid_response)?;
    resp.into_result().map_err(RpcError::Rpc)
}

/// Forward `eth_subscription` notifications into the registry until the
/// channel closes. A transport error or a closed channel fails every live
/// subscription.
async fn pump_notifications(mut stream: NotificationStream, registry: Arc<SubscriptionRegistry>) {
    while let Some(message) = stream.recv().await {
        match message {
            Ok(notification) if notification.is_subscription() => {
                let id = SubscriptionId(notification.params.subscription);
                match registry.dispatch(&id, notification.params.result) {
                    Dispatch::Delivered => {}
                    Dispatch::Parked => {
                        tracing::debug!(subscription = %id, "notification parked until subscribed")
                    }
                    Dispatch::Closed => {
                        tracing::debug!(subscription = %id, "subscription gone, entry removed")
                    }
                }
            }
            Ok(notification) => {
                tracing::debug!(method = %notification.method, "ignoring notification");
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport failed, closing subscriptions");
                registry.fail_all(e);
            }
        }
    }
    registry.fail_all(RpcError::connection("notification channel closed"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::GetBlockNumber;
    use crate::mock::MockTransport;
    use crate::request::{JsonRpcError, RpcId};
    use serde_json::json;

    #[tokio::test]
    async fn execute_formats_result() {
        let mock = Arc::new(MockTransport::new());
        mock.push_result("eth_blockNumber", json!("0x2a"));
        let manager = RequestManager::new(mock.clone());
        assert_eq!(manager.execute(&GetBlockNumber).await.unwrap(), 42);
        assert_eq!(mock.requests()[0].method, "eth_blockNumber");
    }

    #[tokio::test]
    async fn node_error_is_returned() {
        let mock = Arc::new(MockTransport::new());
        mock.push_error(
            "eth_call",
            JsonRpcError {
                code: -32000,
                message: "execution reverted".into(),
                data: None,
            },
        );
        let manager = RequestManager::new(mock);
        let err = manager.send("eth_call", vec![]).await.unwrap_err();
        assert!(err.is_node_error());
    }

    #[tokio::test]
    async fn mismatched_id_is_invalid_response() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(
            "eth_blockNumber",
            JsonRpcResponse::success(RpcId::Number(999), json!("0x1")),
        );
        let manager = RequestManager::new(mock);
        let err = manager.send("eth_blockNumber", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn no_provider_is_invalid_connection() {
        let manager = RequestManager::disconnected();
        let err = manager.send("eth_blockNumber", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidConnection { .. }));
    }

    #[tokio::test]
    async fn subscriptions_need_push_support() {
        let manager = RequestManager::new(Arc::new(MockTransport::without_subscriptions()));
        let err = manager.add_subscription("newHeads", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::SubscriptionsNotSupported { .. }));
    }

    #[tokio::test]
    async fn notifications_reach_the_registered_subscription() {
        let mock = Arc::new(MockTransport::new());
        let manager = RequestManager::new(mock.clone());
        let (id, mut rx) = manager.add_subscription("newHeads", vec![]).await.unwrap();

        mock.notify(&id.0, json!({"number": "0x5"}));
        match rx.recv().await {
            Some(SubscriptionMessage::Item(v)) => assert_eq!(v["number"], "0x5"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_unsubscribe_still_drops_the_registration() {
        let mock = Arc::new(MockTransport::new());
        mock.push_error(
            "eth_unsubscribe",
            JsonRpcError {
                code: -32000,
                message: "subscription not found".into(),
                data: None,
            },
        );
        let manager = RequestManager::new(mock.clone());
        let (id, mut rx) = manager.add_subscription("newHeads", vec![]).await.unwrap();

        assert!(manager.remove_subscription(&id).await.unwrap_err().is_node_error());
        assert!(!manager.registry().contains(&id));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn set_provider_unsubscribes_and_resets_old() {
        let old = Arc::new(MockTransport::new());
        let manager = RequestManager::new(old.clone());
        let (id, mut rx) = manager.add_subscription("newHeads", vec![]).await.unwrap();

        let new = Arc::new(MockTransport::new());
        manager.set_provider(Some(new.clone())).await;

        let unsubscribed = old.requests_for("eth_unsubscribe");
        assert_eq!(unsubscribed.len(), 1);
        assert_eq!(unsubscribed[0].params, vec![json!(id.0)]);
        assert_eq!(old.reset_count(), 1);
        assert!(manager.registry().is_empty());
        assert!(rx.recv().await.is_none());

        new.push_result("eth_blockNumber", json!("0x1"));
        manager.execute(&GetBlockNumber).await.unwrap();
        assert_eq!(new.requests_for("eth_blockNumber").len(), 1);
        assert!(old.requests_for("eth_blockNumber").is_empty());
    }

    #[tokio::test]
    async fn connection_loss_fails_subscriptions() {
        let mock = Arc::new(MockTransport::new());
        let manager = RequestManager::new(mock.clone());
        let (_, mut rx) = manager.add_subscription("logs", vec![json!({})]).await.unwrap();

        mock.disconnect("socket closed");
        assert!(matches!(
            rx.recv().await,
            Some(SubscriptionMessage::Error(RpcError::InvalidConnection { .. }))
        ));
    }
}
