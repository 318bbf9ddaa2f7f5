//! `PromiEvent`: a deferred result that also reports lifecycle events.
//!
//! `send` and `deploy` hand one back immediately. The `TransactionHash` and
//! `Receipt` events arrive as the transaction progresses; awaiting the
//! `PromiEvent` (or calling `result`) yields the final value. A failure is
//! emitted once as `TxEvent::Error` and returned once as the result, after
//! which the sending side is gone and nothing else is delivered.

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use chainweb3_rpc::{RpcError, TransactionReceipt};
use tokio::sync::{mpsc, oneshot};

use crate::error::ContractError;

#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    TransactionHash(String),
    Receipt(TransactionReceipt),
    Error(ContractError),
}

#[derive(Debug)]
pub struct PromiEvent<T> {
    events: mpsc::UnboundedReceiver<TxEvent>,
    result: oneshot::Receiver<Result<T, ContractError>>,
}

/// Producing side, owned by the task driving the transaction.
pub(crate) struct PromiEventSender<T> {
    events: mpsc::UnboundedSender<TxEvent>,
    result: oneshot::Sender<Result<T, ContractError>>,
}

impl<T> PromiEventSender<T> {
    pub(crate) fn emit(&self, event: TxEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn resolve(self, value: T) {
        let _ = self.result.send(Ok(value));
    }

    pub(crate) fn reject(self, err: ContractError) {
        tracing::debug!(error = %err, "transaction failed");
        let _ = self.events.send(TxEvent::Error(err.clone()));
        let _ = self.result.send(Err(err));
    }

    pub(crate) fn settle(self, result: Result<T, ContractError>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(e) => self.reject(e),
        }
    }
}

impl<T> PromiEvent<T> {
    pub(crate) fn channel() -> (PromiEventSender<T>, Self) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        (
            PromiEventSender {
                events: events_tx,
                result: result_tx,
            },
            Self {
                events: events_rx,
                result: result_rx,
            },
        )
    }

    /// Next lifecycle event; `None` once the transaction has settled and
    /// every event was read.
    pub async fn next_event(&mut self) -> Option<TxEvent> {
        self.events.recv().await
    }

    /// Wait for the final value, discarding unread events.
    pub async fn result(self) -> Result<T, ContractError> {
        self.result
            .await
            .map_err(|_| {
                ContractError::from(RpcError::connection("transaction task dropped before settling"))
            })
            .and_then(|r| r)
    }
}

impl<T: Send + 'static> IntoFuture for PromiEvent<T> {
    type Output = Result<T, ContractError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.result())
    }
}
