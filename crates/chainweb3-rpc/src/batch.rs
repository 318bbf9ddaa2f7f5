//! Batch requests: several method descriptors sent in one round trip.
//!
//! Each added method gets a `BatchHandle` that resolves with its own typed
//! result once the batch executes. Responses are matched to requests by id,
//! so the transport may answer in any order.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::RpcError;
use crate::manager::RequestManager;
use crate::method::RpcMethod;
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId};

type Handler = Box<dyn FnOnce(Result<Value, RpcError>) + Send>;

struct BatchItem {
    request: JsonRpcRequest,
    handler: Handler,
}

/// Resolves with one item's result after `BatchRequest::execute`.
pub struct BatchHandle<T> {
    rx: oneshot::Receiver<Result<T, RpcError>>,
}

impl<T> BatchHandle<T> {
    pub async fn result(self) -> Result<T, RpcError> {
        self.rx
            .await
            .map_err(|_| RpcError::connection("batch dropped before execution"))?
    }
}

pub struct BatchRequest {
    manager: RequestManager,
    items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn new(manager: RequestManager) -> Self {
        Self {
            manager,
            items: Vec::new(),
        }
    }

    /// Queue a method; its parameters are checked now.
    pub fn add<M>(&mut self, method: M) -> Result<BatchHandle<M::Output>, RpcError>
    where
        M: RpcMethod + 'static,
    {
        let request = method.to_request(self.manager.next_id())?;
        let (tx, rx) = oneshot::channel();
        let handler: Handler = Box::new(move |result| {
            let _ = tx.send(result.and_then(|v| method.after_execution(v)));
        });
        self.items.push(BatchItem { request, handler });
        Ok(BatchHandle { rx })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Send every queued request. A transport failure is reported to every
    /// handle and returned; node errors are reported per item.
    pub async fn execute(self) -> Result<(), RpcError> {
        if self.items.is_empty() {
            return Ok(());
        }
        let requests: Vec<JsonRpcRequest> = self.items.iter().map(|i| i.request.clone()).collect();

        let responses = match self.manager.send_batch(requests).await {
            Ok(r) => r,
            Err(e) => {
                for item in self.items {
                    (item.handler)(Err(e.clone()));
                }
                return Err(e);
            }
        };

        let mut by_id: HashMap<RpcId, JsonRpcResponse> =
            responses.into_iter().map(|r| (r.id.clone(), r)).collect();

        for item in self.items {
            let id = item.request.id;
            let result = match by_id.remove(&id) {
                Some(resp) => resp
                    .check(&id)
                    .map_err(RpcError::invalid_response)
                    .and_then(|_| resp.into_result().map_err(RpcError::Rpc)),
                None => Err(RpcError::invalid_response(format!(
                    "batch response has no entry for request {id}"
                ))),
            };
            (item.handler)(result);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{GetBlockNumber, GetCode, NetVersion};
    use crate::mock::MockTransport;
    use crate::types::BlockNumber;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn responses_are_correlated_by_id() {
        let mock = Arc::new(MockTransport::new());
        mock.push_result("eth_blockNumber", json!("0x10"));
        mock.push_result("net_version", json!("1"));
        mock.push_result("eth_getCode", json!("0x6080"));
        let manager = RequestManager::new(mock.clone());

        let mut batch = BatchRequest::new(manager);
        let height = batch.add(GetBlockNumber).unwrap();
        let net = batch.add(NetVersion).unwrap();
        let code = batch
            .add(GetCode {
                address: "0x01".into(),
                block: BlockNumber::Latest,
            })
            .unwrap();
        assert_eq!(batch.len(), 3);
        batch.execute().await.unwrap();

        // the mock answers in reverse order
        assert_eq!(height.result().await.unwrap(), 16);
        assert_eq!(net.result().await.unwrap(), "1");
        assert_eq!(code.result().await.unwrap(), "0x6080");
    }

    #[tokio::test]
    async fn errors_are_per_item() {
        let mock = Arc::new(MockTransport::new());
        mock.push_result("eth_blockNumber", json!("0x1"));
        let manager = RequestManager::new(mock);

        let mut batch = BatchRequest::new(manager);
        let height = batch.add(GetBlockNumber).unwrap();
        let net = batch.add(NetVersion).unwrap();
        batch.execute().await.unwrap();

        assert_eq!(height.result().await.unwrap(), 1);
        assert!(net.result().await.unwrap_err().is_node_error());
    }

    #[tokio::test]
    async fn transport_failure_reaches_every_handle() {
        let mock = Arc::new(MockTransport::new());
        mock.push_failure("eth_blockNumber", RpcError::connection("down"));
        let manager = RequestManager::new(mock);

        let mut batch = BatchRequest::new(manager);
        let a = batch.add(GetBlockNumber).unwrap();
        let b = batch.add(NetVersion).unwrap();
        assert!(batch.execute().await.is_err());
        assert!(a.result().await.is_err());
        assert!(b.result().await.is_err());
    }
}
