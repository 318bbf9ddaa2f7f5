//! Scripted in-memory transport for tests.
//!
//! Replies are queued per RPC method and consumed in order; when a method's
//! queue is empty its sticky default (if any) is used. `eth_subscribe` and
//! `eth_unsubscribe` answer on their own unless scripted. Every request is
//! recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::RpcError;
use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Notification};
use crate::transport::{NotificationStream, RpcTransport};

#[derive(Debug, Clone)]
enum Reply {
    Result(Value),
    Error(JsonRpcError),
    /// Returned verbatim, id included
    Response(JsonRpcResponse),
    Transport(RpcError),
}

type NotificationSender = mpsc::UnboundedSender<Result<Notification, RpcError>>;

pub struct MockTransport {
    url: String,
    subscriptions: bool,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    defaults: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<JsonRpcRequest>>,
    notify_tx: NotificationSender,
    notify_rx: Mutex<Option<NotificationStream>>,
    next_subscription: AtomicU64,
    resets: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A transport that supports `eth_subscribe`.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            url: "mock://node".into(),
            subscriptions: true,
            queued: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            notify_tx: tx,
            notify_rx: Mutex::new(Some(rx)),
            next_subscription: AtomicU64::new(1),
            resets: AtomicUsize::new(0),
        }
    }

    /// A request/response-only transport, like plain HTTP.
    pub fn without_subscriptions() -> Self {
        Self {
            url: "mock://http".into(),
            subscriptions: false,
            ..Self::new()
        }
    }

    fn push(&self, method: &str, reply: Reply) {
        lock(&self.queued)
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queue a successful result for the next `method` call.
    pub fn push_result(&self, method: &str, result: Value) {
        self.push(method, Reply::Result(result));
    }

    /// Queue a node error for the next `method` call.
    pub fn push_error(&self, method: &str, error: JsonRpcError) {
        self.push(method, Reply::Error(error));
    }

    /// Queue a response returned exactly as given.
    pub fn push_response(&self, method: &str, response: JsonRpcResponse) {
        self.push(method, Reply::Response(response));
    }

    /// Queue a transport failure for the next `method` call.
    pub fn push_failure(&self, method: &str, error: RpcError) {
        self.push(method, Reply::Transport(error));
    }

    /// Result used whenever `method` has nothing queued.
    pub fn set_default(&self, method: &str, result: Value) {
        lock(&self.defaults).insert(method.to_string(), Reply::Result(result));
    }

    /// Push an `eth_subscription` notification.
    pub fn notify(&self, subscription: &str, result: Value) {
        let _ = self
            .notify_tx
            .send(Ok(Notification::subscription(subscription, result)));
    }

    /// Simulate a dropped connection.
    pub fn disconnect(&self, reason: &str) {
        let _ = self.notify_tx.send(Err(RpcError::connection(reason)));
    }

    pub fn requests(&self) -> Vec<JsonRpcRequest> {
        lock(&self.requests).clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<JsonRpcRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn next_reply(&self, method: &str) -> Option<Reply> {
        if let Some(reply) = lock(&self.queued).get_mut(method).and_then(VecDeque::pop_front) {
            return Some(reply);
        }
        if let Some(reply) = lock(&self.defaults).get(method) {
            return Some(reply.clone());
        }
        match method {
            "eth_subscribe" if self.subscriptions => {
                let n = self.next_subscription.fetch_add(1, Ordering::SeqCst);
                Some(Reply::Result(json!(format!("0x{n:x}"))))
            }
            "eth_unsubscribe" => Some(Reply::Result(json!(true))),
            _ => None,
        }
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        lock(&self.requests).push(req.clone());
        match self.next_reply(&req.method) {
            Some(Reply::Result(v)) => Ok(JsonRpcResponse::success(req.id, v)),
            Some(Reply::Error(e)) => Ok(JsonRpcResponse::failure(req.id, e)),
            Some(Reply::Response(r)) => Ok(r),
            Some(Reply::Transport(e)) => Err(e),
            None => Ok(JsonRpcResponse::failure(
                req.id,
                JsonRpcError {
                    code: -32601,
                    message: format!("the method {} does not exist/is not available", req.method),
                    data: None,
                },
            )),
        }
    }

    /// Answers in reverse order so callers must correlate by id.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, RpcError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        responses.reverse();
        Ok(responses)
    }

    fn take_notifications(&self) -> Option<NotificationStream> {
        if !self.subscriptions {
            return None;
        }
        lock(&self.notify_rx).take()
    }

    fn supports_subscriptions(&self) -> bool {
        self.subscriptions
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn url(&self) -> &str {
        &self.url
    }
}
