//! Subscription lifecycle against the scripted transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainweb3_rpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, MockTransport, NotificationStream,
    RequestManager, RpcError, RpcTransport, Subscription, SubscriptionModel, SubscriptionState,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

/// `logs`-shaped model whose items are plain numbers.
struct Numbers {
    from_block: Option<u64>,
}

impl SubscriptionModel for Numbers {
    type Item = u64;
    type Error = RpcError;

    fn subscription_type(&self) -> &str {
        "logs"
    }

    fn params(&self) -> Vec<Value> {
        vec![json!({})]
    }

    fn backfill(&self) -> Option<(String, Vec<Value>)> {
        self.from_block
            .map(|n| ("eth_getLogs".to_string(), vec![json!({ "fromBlock": format!("0x{n:x}") })]))
    }

    fn on_item(&self, raw: Value) -> Result<u64, RpcError> {
        raw.as_u64()
            .ok_or_else(|| RpcError::invalid_response(format!("{raw} is not a number")))
    }
}

struct Recorder {
    items: Arc<Mutex<Vec<u64>>>,
    errors: Arc<Mutex<Vec<RpcError>>>,
}

fn watch(sub: &Subscription<Numbers>) -> Recorder {
    let items = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let (i, e) = (Arc::clone(&items), Arc::clone(&errors));
    sub.on_data(move |n| i.lock().unwrap().push(*n));
    sub.on_error(move |err| e.lock().unwrap().push(err.clone()));
    Recorder { items, errors }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ─── Backfill ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn backfill_is_delivered_before_live_items() {
    let mock = Arc::new(MockTransport::new());
    mock.push_result("eth_getLogs", json!([1, 2]));
    let sub = Subscription::new(
        RequestManager::new(mock.clone()),
        Numbers { from_block: Some(10) },
    );
    let seen = watch(&sub);
    sub.subscribe();

    let id = sub.active().await.expect("subscription should become active");
    mock.notify(&id.0, json!(3));
    settle().await;

    assert_eq!(*seen.items.lock().unwrap(), vec![1, 2, 3]);
    let methods: Vec<String> = mock.requests().into_iter().map(|r| r.method).collect();
    assert_eq!(methods, vec!["eth_getLogs", "eth_subscribe"]);
    assert_eq!(mock.requests()[0].params, vec![json!({"fromBlock": "0xa"})]);
}

#[tokio::test]
async fn backfill_failure_does_not_close_the_stream() {
    let mock = Arc::new(MockTransport::new());
    mock.push_error(
        "eth_getLogs",
        JsonRpcError {
            code: -32005,
            message: "query returned more than 10000 results".into(),
            data: None,
        },
    );
    let sub = Subscription::new(
        RequestManager::new(mock.clone()),
        Numbers { from_block: Some(0) },
    );
    let seen = watch(&sub);
    sub.subscribe();

    let id = sub.active().await.expect("still subscribes after backfill error");
    mock.notify(&id.0, json!(7));
    settle().await;

    assert_eq!(seen.errors.lock().unwrap().len(), 1);
    assert_eq!(*seen.items.lock().unwrap(), vec![7]);
}

// ─── Live delivery ───────────────────────────────────────────────────────────

#[tokio::test]
async fn bad_item_is_reported_without_closing() {
    let mock = Arc::new(MockTransport::new());
    let sub = Subscription::new(RequestManager::new(mock.clone()), Numbers { from_block: None });
    let seen = watch(&sub);
    sub.subscribe();
    let id = sub.active().await.unwrap();

    mock.notify(&id.0, json!("not a number"));
    mock.notify(&id.0, json!(4));
    settle().await;

    assert_eq!(seen.errors.lock().unwrap().len(), 1);
    assert_eq!(*seen.items.lock().unwrap(), vec![4]);
    assert!(!sub.is_closed());
}

#[tokio::test]
async fn connection_loss_is_delivered_once_and_closes() {
    let mock = Arc::new(MockTransport::new());
    let sub = Subscription::new(RequestManager::new(mock.clone()), Numbers { from_block: None });
    let seen = watch(&sub);
    sub.subscribe();
    let id = sub.active().await.unwrap();

    mock.disconnect("socket closed");
    sub.closed().await;
    mock.notify(&id.0, json!(5));
    settle().await;

    let errors = seen.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], RpcError::InvalidConnection { .. }));
    assert!(seen.items.lock().unwrap().is_empty());
}

// ─── Acknowledgement timing ──────────────────────────────────────────────────

/// Node that pushes `early` notifications for a new subscription and then
/// holds the `eth_subscribe` answer until `release` is notified.
struct SlowAckNode {
    node: Arc<MockTransport>,
    early: Vec<Value>,
    release: Notify,
}

impl SlowAckNode {
    fn new(early: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            node: Arc::new(MockTransport::new()),
            early,
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl RpcTransport for SlowAckNode {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let subscribing = req.method == "eth_subscribe";
        let resp = self.node.send(req).await?;
        if subscribing {
            if let Some(Value::String(id)) = &resp.result {
                for item in &self.early {
                    self.node.notify(id, item.clone());
                }
            }
            self.release.notified().await;
        }
        Ok(resp)
    }

    fn take_notifications(&self) -> Option<NotificationStream> {
        self.node.take_notifications()
    }

    fn supports_subscriptions(&self) -> bool {
        true
    }

    fn url(&self) -> &str {
        self.node.url()
    }
}

#[tokio::test]
async fn notifications_before_the_ack_are_delivered() {
    let node = SlowAckNode::new(vec![json!(7)]);
    let manager = RequestManager::new(node.clone());
    let sub = Subscription::new(manager.clone(), Numbers { from_block: None });
    let seen = watch(&sub);
    sub.subscribe();

    settle().await;
    assert_eq!(sub.state(), SubscriptionState::Pending);
    assert!(seen.items.lock().unwrap().is_empty());
    assert_eq!(manager.registry().parked(), 1);

    node.release.notify_one();
    let id = sub.active().await.expect("acknowledged");
    node.node.notify(&id.0, json!(8));
    settle().await;

    assert_eq!(*seen.items.lock().unwrap(), vec![7, 8]);
    assert_eq!(manager.registry().parked(), 0);
}

#[tokio::test]
async fn late_ack_after_unsubscribe_is_cleaned_up() {
    let node = SlowAckNode::new(vec![json!(1)]);
    let manager = RequestManager::new(node.clone());
    let sub = Subscription::new(manager.clone(), Numbers { from_block: None });
    let seen = watch(&sub);
    sub.subscribe();

    settle().await;
    assert!(sub.unsubscribe().await.unwrap());
    node.release.notify_one();
    settle().await;

    assert!(seen.items.lock().unwrap().is_empty());
    assert_eq!(node.node.requests_for("eth_unsubscribe").len(), 1);
    assert!(manager.registry().is_empty());
    assert_eq!(manager.registry().parked(), 0);
}

#[tokio::test]
async fn failed_unsubscribe_stops_delivery() {
    let mock = Arc::new(MockTransport::new());
    mock.push_failure("eth_unsubscribe", RpcError::connection("socket closed"));
    let manager = RequestManager::new(mock.clone());
    let sub = Subscription::new(manager.clone(), Numbers { from_block: None });
    let seen = watch(&sub);
    sub.subscribe();
    let id = sub.active().await.unwrap();

    assert!(sub.unsubscribe().await.is_err());
    assert!(!manager.registry().contains(&id));
    mock.notify(&id.0, json!(2));
    settle().await;

    assert!(sub.is_closed());
    assert!(seen.items.lock().unwrap().is_empty());
}

// ─── Provider changes ────────────────────────────────────────────────────────

#[tokio::test]
async fn replacing_the_provider_closes_streams() {
    let old = Arc::new(MockTransport::new());
    let manager = RequestManager::new(old.clone());
    let sub = Subscription::new(manager.clone(), Numbers { from_block: None });
    let seen = watch(&sub);
    sub.subscribe();
    sub.active().await.unwrap();

    manager.set_provider(Some(Arc::new(MockTransport::new()))).await;
    sub.closed().await;

    assert_eq!(old.requests_for("eth_unsubscribe").len(), 1);
    assert!(seen.errors.lock().unwrap().is_empty());
    // closed streams unsubscribe without a request
    assert!(sub.unsubscribe().await.unwrap());
    assert_eq!(old.requests_for("eth_unsubscribe").len(), 1);
}
