//! Subscription registry owned by one `RequestManager`.
//!
//! Maps node-assigned subscription ids to the channel of the `Subscription`
//! that owns them. A node may push the first notification of a subscription
//! before its `eth_subscribe` answer arrives, so notifications for ids that
//! are not registered yet are parked and handed over on `register`. The
//! parking area holds at most `PARKED_CAPACITY` notifications; the oldest
//! is dropped first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::RpcError;

/// Notifications kept for ids that are not registered (yet).
pub const PARKED_CAPACITY: usize = 256;

/// A node-assigned subscription id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the registry forwards to a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionMessage {
    Item(Value),
    /// The connection failed; no further items will follow
    Error(RpcError),
}

struct SubscriptionEntry {
    /// The subscription type (e.g. `"newHeads"`, `"logs"`)
    kind: String,
    sender: mpsc::UnboundedSender<SubscriptionMessage>,
}

#[derive(Default)]
struct State {
    entries: HashMap<SubscriptionId, SubscriptionEntry>,
    parked: VecDeque<(SubscriptionId, Value)>,
}

/// Result of handing a notification to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Delivered,
    /// No subscription under this id yet; kept for `register`
    Parked,
    /// The owning subscription is gone; its entry was removed
    Closed,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    state: Mutex<State>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a subscription and return the receiving end of its channel.
    /// Notifications parked under `id` are queued on it first, in arrival order.
    pub fn register(
        &self,
        id: SubscriptionId,
        kind: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<SubscriptionMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        let parked = std::mem::take(&mut state.parked);
        let (early, rest): (VecDeque<_>, VecDeque<_>) =
            parked.into_iter().partition(|(parked_id, _)| *parked_id == id);
        state.parked = rest;
        if !early.is_empty() {
            tracing::debug!(subscription = %id, count = early.len(), "flushing early notifications");
        }
        for (_, result) in early {
            let _ = tx.send(SubscriptionMessage::Item(result));
        }
        state.entries.insert(
            id,
            SubscriptionEntry {
                kind: kind.into(),
                sender: tx,
            },
        );
        rx
    }

    /// Forward a notification to the subscription registered under `id`.
    pub fn dispatch(&self, id: &SubscriptionId, result: Value) -> Dispatch {
        let mut state = self.state();
        let Some(entry) = state.entries.get(id) else {
            if state.parked.len() >= PARKED_CAPACITY {
                if let Some((dropped, _)) = state.parked.pop_front() {
                    tracing::debug!(subscription = %dropped, "parked notification evicted");
                }
            }
            state.parked.push_back((id.clone(), result));
            return Dispatch::Parked;
        };
        if entry.sender.send(SubscriptionMessage::Item(result)).is_ok() {
            return Dispatch::Delivered;
        }
        state.entries.remove(id);
        Dispatch::Closed
    }

    /// Forget `id` and anything parked under it.
    pub fn remove(&self, id: &SubscriptionId) -> bool {
        let mut state = self.state();
        state.parked.retain(|(parked_id, _)| parked_id != id);
        state.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.state().entries.contains_key(id)
    }

    /// Number of notifications waiting for their subscription to register.
    pub fn parked(&self) -> usize {
        self.state().parked.len()
    }

    /// Deliver `err` to every subscription and forget them all.
    pub fn fail_all(&self, err: RpcError) {
        let mut state = self.state();
        state.parked.clear();
        for (_, entry) in state.entries.drain() {
            let _ = entry.sender.send(SubscriptionMessage::Error(err.clone()));
        }
    }

    /// Forget every subscription; their channels close without an error.
    pub fn clear(&self) {
        let mut state = self.state();
        state.parked.clear();
        state.entries.clear();
    }

    /// `(id, kind)` of every registered subscription.
    pub fn active(&self) -> Vec<(SubscriptionId, String)> {
        self.state()
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), e.kind.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
