//! Subscription lifecycle: `Pending → Active → Closed`.
//!
//! A `Subscription` owns one logical event stream. Starting it spawns a
//! driver task that
//!   1. checks the model's options,
//!   2. fetches and delivers historical items when the model asks for a
//!      backfill,
//!   3. sends `eth_subscribe` and records the node-assigned id,
//!   4. decodes and delivers each notification until it is closed.
//!
//! Items reach the optional callback and every `data` listener; failures
//! reach the callback and every `error` listener. A failure that ends the
//! stream is delivered once, after which all listeners are detached. Once a
//! subscription is `Closed` nothing more is delivered.
//!
//! In `once` mode the subscription closes itself as part of the first
//! successful delivery, so a second notification already in flight is
//! dropped, and the driver then unsubscribes on the node.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::watch;

use crate::error::RpcError;
use crate::manager::RequestManager;
use crate::registry::{SubscriptionId, SubscriptionMessage};
use crate::types::BlockHeader;

/// What a subscription subscribes to and how its items are decoded.
pub trait SubscriptionModel: Send + Sync + 'static {
    type Item: Send + Sync + 'static;
    type Error: From<RpcError> + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// First `eth_subscribe` parameter, e.g. `"logs"`.
    fn subscription_type(&self) -> &str;

    /// Remaining `eth_subscribe` parameters.
    fn params(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Request (method, params) whose array result is delivered before the
    /// live stream starts.
    fn backfill(&self) -> Option<(String, Vec<Value>)> {
        None
    }

    /// Reject invalid options before anything is sent.
    fn validate(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Turn a raw notification result into an item.
    fn on_item(&self, raw: Value) -> Result<Self::Item, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for the node to acknowledge `eth_subscribe`
    Pending,
    Active(SubscriptionId),
    Closed,
}

type DataListener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorListener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Callback<T, E> = Arc<dyn Fn(Result<&T, &E>) + Send + Sync>;

struct Listeners<T, E> {
    callback: Option<Callback<T, E>>,
    data: Vec<DataListener<T>>,
    error: Vec<ErrorListener<E>>,
}

impl<T, E> Default for Listeners<T, E> {
    fn default() -> Self {
        Self {
            callback: None,
            data: Vec::new(),
            error: Vec::new(),
        }
    }
}

impl<T, E> Listeners<T, E> {
    fn snapshot(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

struct Shared<M: SubscriptionModel> {
    model: M,
    manager: RequestManager,
    once: bool,
    started: AtomicBool,
    state: watch::Sender<SubscriptionState>,
    listeners: Mutex<Listeners<M::Item, M::Error>>,
}

/// Handle to one event stream. Clones share the stream.
pub struct Subscription<M: SubscriptionModel> {
    shared: Arc<Shared<M>>,
}

impl<M: SubscriptionModel> Clone for Subscription<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: SubscriptionModel> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("type", &self.shared.model.subscription_type())
            .field("state", &self.state())
            .field("once", &self.shared.once)
            .finish()
    }
}

impl<M: SubscriptionModel> Subscription<M> {
    /// A stream that stays open until unsubscribed. Call `subscribe` to start it.
    pub fn new(manager: RequestManager, model: M) -> Self {
        Self::build(manager, model, false)
    }

    /// A stream that closes itself after the first delivered item.
    pub fn once(manager: RequestManager, model: M) -> Self {
        Self::build(manager, model, true)
    }

    fn build(manager: RequestManager, model: M, once: bool) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Pending);
        Self {
            shared: Arc::new(Shared {
                model,
                manager,
                once,
                started: AtomicBool::new(false),
                state,
                listeners: Mutex::new(Listeners::default()),
            }),
        }
    }

    /// Set the callback that receives every item and error.
    pub fn with_callback<F>(self, callback: F) -> Self
    where
        F: Fn(Result<&M::Item, &M::Error>) + Send + Sync + 'static,
    {
        self.shared.listeners().callback = Some(Arc::new(callback));
        self
    }

    /// Add a `data` listener.
    pub fn on_data<F>(&self, listener: F) -> &Self
    where
        F: Fn(&M::Item) + Send + Sync + 'static,
    {
        self.shared.listeners().data.push(Arc::new(listener));
        self
    }

    /// Add an `error` listener.
    pub fn on_error<F>(&self, listener: F) -> &Self
    where
        F: Fn(&M::Error) + Send + Sync + 'static,
    {
        self.shared.listeners().error.push(Arc::new(listener));
        self
    }

    /// Start the driver task. Later calls are no-ops.
    pub fn subscribe(&self) -> &Self {
        if !self.shared.started.swap(true, Ordering::SeqCst) && !self.is_closed() {
            tokio::spawn(drive(Arc::clone(&self.shared)));
        }
        self
    }

    pub fn model(&self) -> &M {
        &self.shared.model
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state.borrow().clone()
    }

    /// Node-assigned id, once acknowledged.
    pub fn id(&self) -> Option<SubscriptionId> {
        match self.state() {
            SubscriptionState::Active(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Wait for the node's acknowledgement. `None` if the subscription
    /// closed first.
    pub async fn active(&self) -> Option<SubscriptionId> {
        let mut rx = self.shared.state.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                SubscriptionState::Active(id) => return Some(id),
                SubscriptionState::Closed => return None,
                SubscriptionState::Pending => {}
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Wait until the subscription is closed.
    pub async fn closed(&self) {
        let mut rx = self.shared.state.subscribe();
        // the sender lives as long as `self`
        let _ = rx.wait_for(|s| *s == SubscriptionState::Closed).await;
    }

    /// Stop delivery and send `eth_unsubscribe`.
    ///
    /// Delivery stops immediately. On an already closed subscription this
    /// succeeds without a request; on a pending one the driver unsubscribes
    /// as soon as the node acknowledges.
    pub async fn unsubscribe(&self) -> Result<bool, M::Error> {
        match self.shared.close() {
            SubscriptionState::Closed | SubscriptionState::Pending => Ok(true),
            SubscriptionState::Active(id) => self
                .shared
                .manager
                .remove_subscription(&id)
                .await
                .map_err(M::Error::from),
        }
    }
}

impl<M: SubscriptionModel> Shared<M> {
    fn listeners(&self) -> MutexGuard<'_, Listeners<M::Item, M::Error>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_closed(&self) -> bool {
        *self.state.borrow() == SubscriptionState::Closed
    }

    /// Mark closed and detach listeners; returns the previous state.
    fn close(&self) -> SubscriptionState {
        let mut listeners = self.listeners();
        *listeners = Listeners::default();
        self.state.send_replace(SubscriptionState::Closed)
    }

    /// Pending → Active. `false` if the subscription was closed meanwhile.
    fn activate(&self, id: SubscriptionId) -> bool {
        let _listeners = self.listeners();
        let mut activated = false;
        self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Pending {
                *state = SubscriptionState::Active(id);
                activated = true;
            }
            activated
        });
        activated
    }

    /// Deliver one item. Returns `false` if nothing was delivered because the
    /// subscription is closed. In `once` mode the subscription is closed
    /// before the item goes out.
    fn deliver(&self, item: &M::Item) -> bool {
        let targets = {
            let mut listeners = self.listeners();
            if self.is_closed() {
                return false;
            }
            if self.once {
                let taken = std::mem::take(&mut *listeners);
                self.state.send_replace(SubscriptionState::Closed);
                taken
            } else {
                listeners.snapshot()
            }
        };

        if let Some(callback) = &targets.callback {
            callback(Ok(item));
        }
        for listener in &targets.data {
            listener(item);
        }
        true
    }

    /// Deliver an error. With `terminal` set the subscription is closed and
    /// its listeners detached, so the error is seen exactly once.
    fn emit_error(&self, err: &M::Error, terminal: bool) {
        let targets = {
            let mut listeners = self.listeners();
            if self.is_closed() {
                return;
            }
            if terminal {
                let taken = std::mem::take(&mut *listeners);
                self.state.send_replace(SubscriptionState::Closed);
                taken
            } else {
                listeners.snapshot()
            }
        };

        if targets.callback.is_none() && targets.error.is_empty() {
            tracing::warn!(
                kind = self.model.subscription_type(),
                error = %err,
                "subscription error with no listener"
            );
        }
        if let Some(callback) = &targets.callback {
            callback(Err(err));
        }
        for listener in &targets.error {
            listener(err);
        }
    }

    fn fail(&self, err: M::Error) {
        self.emit_error(&err, true);
    }

    /// Decode and deliver one raw item; `true` once a `once` stream is done.
    fn handle(&self, raw: Value) -> bool {
        match self.model.on_item(raw) {
            Ok(item) => self.deliver(&item) && self.once,
            Err(e) => {
                self.emit_error(&e, false);
                false
            }
        }
    }
}

async fn drive<M: SubscriptionModel>(shared: Arc<Shared<M>>) {
    if let Err(e) = shared.model.validate() {
        shared.fail(e);
        return;
    }

    if let Some((method, params)) = shared.model.backfill() {
        match shared.manager.send(&method, params).await {
            Ok(Value::Array(items)) => {
                tracing::debug!(method = %method, count = items.len(), "delivering backfill");
                for raw in items {
                    if shared.is_closed() || shared.handle(raw) {
                        return;
                    }
                }
            }
            Ok(other) => shared.emit_error(
                &RpcError::invalid_response(format!("{method} returned {other}")).into(),
                false,
            ),
            Err(e) => shared.emit_error(&e.into(), false),
        }
    }

    if shared.is_closed() {
        return;
    }

    let kind = shared.model.subscription_type().to_string();
    let (id, mut rx) = match shared.manager.add_subscription(&kind, shared.model.params()).await {
        Ok(subscribed) => subscribed,
        Err(e) => {
            shared.fail(e.into());
            return;
        }
    };

    if !shared.activate(id.clone()) {
        // unsubscribed while pending
        if let Err(e) = shared.manager.remove_subscription(&id).await {
            tracing::warn!(subscription = %id, error = %e, "late unsubscribe failed");
        }
        return;
    }

    let mut state_rx = shared.state.subscribe();
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(SubscriptionMessage::Item(raw)) => {
                    if shared.handle(raw) {
                        if let Err(e) = shared.manager.remove_subscription(&id).await {
                            tracing::warn!(subscription = %id, error = %e, "unsubscribe after once failed");
                        }
                        return;
                    }
                }
                Some(SubscriptionMessage::Error(e)) => {
                    shared.fail(e.into());
                    return;
                }
                None => {
                    // provider replaced
                    shared.close();
                    return;
                }
            },
            changed = state_rx.changed() => {
                if changed.is_err() || shared.is_closed() {
                    return;
                }
            }
        }
    }
}

/// `newHeads`: one item per new block header.
#[derive(Debug, Clone, Default)]
pub struct NewHeads;

impl SubscriptionModel for NewHeads {
    type Item = BlockHeader;
    type Error = RpcError;

    fn subscription_type(&self) -> &str {
        "newHeads"
    }

    fn on_item(&self, raw: Value) -> Result<BlockHeader, RpcError> {
        serde_json::from_value(raw).map_err(RpcError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&BlockHeader) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &BlockHeader| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn pending_then_active() {
        let mock = Arc::new(MockTransport::new());
        let sub = Subscription::new(RequestManager::new(mock.clone()), NewHeads);
        assert_eq!(sub.state(), SubscriptionState::Pending);

        sub.subscribe();
        let id = sub.active().await.unwrap();
        assert_eq!(sub.id(), Some(id));
        assert_eq!(mock.requests_for("eth_subscribe")[0].params, vec![json!("newHeads")]);
    }

    #[tokio::test]
    async fn items_reach_callback_and_listeners() {
        let mock = Arc::new(MockTransport::new());
        let (via_callback, cb) = counter();
        let (via_listener, listener) = counter();
        let sub = Subscription::new(RequestManager::new(mock.clone()), NewHeads)
            .with_callback(move |r| {
                if let Ok(h) = r {
                    cb(h)
                }
            });
        sub.on_data(listener).subscribe();
        let id = sub.active().await.unwrap();

        mock.notify(&id.0, json!({"number": "0x1", "parentHash": "0x00"}));
        mock.notify(&id.0, json!({"number": "0x2", "parentHash": "0x01"}));
        settle().await;

        assert_eq!(via_callback.load(Ordering::SeqCst), 2);
        assert_eq!(via_listener.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsubscribe_twice_is_a_no_op() {
        let mock = Arc::new(MockTransport::new());
        let (seen, listener) = counter();
        let sub = Subscription::new(RequestManager::new(mock.clone()), NewHeads);
        sub.on_data(listener).subscribe();
        let id = sub.active().await.unwrap();

        assert!(sub.unsubscribe().await.unwrap());
        assert!(sub.unsubscribe().await.unwrap());
        assert_eq!(mock.requests_for("eth_unsubscribe").len(), 1);

        mock.notify(&id.0, json!({"number": "0x3"}));
        settle().await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(sub.is_closed());
    }

    #[tokio::test]
    async fn once_delivers_a_single_item() {
        let mock = Arc::new(MockTransport::new());
        let (seen, listener) = counter();
        let sub = Subscription::once(RequestManager::new(mock.clone()), NewHeads);
        sub.on_data(listener).subscribe();
        let id = sub.active().await.unwrap();

        mock.notify(&id.0, json!({"number": "0x1"}));
        mock.notify(&id.0, json!({"number": "0x2"}));
        sub.closed().await;
        settle().await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(mock.requests_for("eth_unsubscribe").len(), 1);
    }

    #[tokio::test]
    async fn subscribe_failure_is_delivered_once() {
        let mock = Arc::new(MockTransport::without_subscriptions());
        let errors = Arc::new(AtomicUsize::new(0));
        let e1 = Arc::clone(&errors);
        let e2 = Arc::clone(&errors);
        let sub = Subscription::new(RequestManager::new(mock), NewHeads).with_callback(move |r| {
            if r.is_err() {
                e1.fetch_add(1, Ordering::SeqCst);
            }
        });
        sub.on_error(move |e| {
            assert!(matches!(e, RpcError::SubscriptionsNotSupported { .. }));
            e2.fetch_add(1, Ordering::SeqCst);
        })
        .subscribe();

        assert_eq!(sub.active().await, None);
        assert_eq!(errors.load(Ordering::SeqCst), 2);
        // already closed: no request, no error
        assert!(sub.unsubscribe().await.unwrap());
    }

    #[tokio::test]
    async fn unsubscribe_while_pending_cleans_up_after_ack() {
        let mock = Arc::new(MockTransport::new());
        let sub = Subscription::new(RequestManager::new(mock.clone()), NewHeads);
        sub.subscribe();
        // the driver has not run yet on this single-threaded runtime
        assert!(sub.unsubscribe().await.unwrap());
        settle().await;

        assert!(sub.is_closed());
        let subscribed = mock.requests_for("eth_subscribe").len();
        assert_eq!(mock.requests_for("eth_unsubscribe").len(), subscribed);
    }
}
