//! RPC method descriptors.
//!
//! Each descriptor knows its wire method name, how to build and check its
//! parameters (`before_execution`) and how to turn the raw result into a
//! typed value (`after_execution`). The request manager executes any
//! descriptor; batches collect them.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::RpcError;
use crate::request::JsonRpcRequest;
use crate::types::{
    is_block_hash, quantity, Block, BlockId, BlockNumber, Transaction, TransactionReceipt,
    TransactionRequest,
};

pub trait RpcMethod: Send + Sync {
    type Output: Send + 'static;

    fn rpc_method(&self) -> &str;

    fn parameters(&self) -> Vec<Value>;

    /// Check and format the parameters before they are sent.
    fn before_execution(&self, params: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        Ok(params)
    }

    /// Convert the raw result.
    fn after_execution(&self, result: Value) -> Result<Self::Output, RpcError>;

    /// Build the request with the given id.
    fn to_request(&self, id: u64) -> Result<JsonRpcRequest, RpcError> {
        let params = self.before_execution(self.parameters())?;
        Ok(JsonRpcRequest::new(id, self.rpc_method(), params))
    }
}

fn typed<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, RpcError> {
    serde_json::from_value(result).map_err(|e| RpcError::Deserialization(format!("{method}: {e}")))
}

fn to_quantity(method: &str, result: Value) -> Result<u64, RpcError> {
    match result {
        Value::String(s) => quantity::parse(&s).map_err(RpcError::invalid_response),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| RpcError::invalid_response(format!("{method}: {n} is not a quantity"))),
        other => Err(RpcError::invalid_response(format!(
            "{method}: expected a quantity, got {other}"
        ))),
    }
}

fn to_value<T: serde::Serialize>(method: &str, v: &T) -> Result<Value, RpcError> {
    serde_json::to_value(v).map_err(|e| RpcError::InvalidParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// `eth_blockNumber`
#[derive(Debug, Clone, Default)]
pub struct GetBlockNumber;

impl RpcMethod for GetBlockNumber {
    type Output = u64;

    fn rpc_method(&self) -> &str {
        "eth_blockNumber"
    }

    fn parameters(&self) -> Vec<Value> {
        Vec::new()
    }

    fn after_execution(&self, result: Value) -> Result<u64, RpcError> {
        to_quantity(self.rpc_method(), result)
    }
}

/// `eth_getBlockByNumber`, or `eth_getBlockByHash` when given a hash.
#[derive(Debug, Clone)]
pub struct GetBlock {
    pub block: BlockId,
    pub full_transactions: bool,
}

impl GetBlock {
    pub fn new(block: impl Into<BlockId>) -> Self {
        Self {
            block: block.into(),
            full_transactions: false,
        }
    }
}

impl RpcMethod for GetBlock {
    type Output = Option<Block>;

    fn rpc_method(&self) -> &str {
        match &self.block {
            BlockId::Hash(_) => "eth_getBlockByHash",
            BlockId::Number(_) => "eth_getBlockByNumber",
        }
    }

    fn parameters(&self) -> Vec<Value> {
        let block = match &self.block {
            BlockId::Hash(h) => json!(h),
            BlockId::Number(n) => json!(n),
        };
        vec![block, json!(self.full_transactions)]
    }

    fn before_execution(&self, params: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        if let BlockId::Hash(h) = &self.block {
            if !is_block_hash(h) {
                return Err(RpcError::InvalidParams {
                    method: self.rpc_method().to_string(),
                    reason: format!("'{h}' is not a 32-byte block hash"),
                });
            }
        }
        Ok(params)
    }

    fn after_execution(&self, result: Value) -> Result<Option<Block>, RpcError> {
        typed(self.rpc_method(), result)
    }
}

/// `eth_getTransactionByHash`
#[derive(Debug, Clone)]
pub struct GetTransaction(pub String);

impl RpcMethod for GetTransaction {
    type Output = Option<Transaction>;

    fn rpc_method(&self) -> &str {
        "eth_getTransactionByHash"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.0)]
    }

    fn after_execution(&self, result: Value) -> Result<Option<Transaction>, RpcError> {
        typed(self.rpc_method(), result)
    }
}

/// `eth_getTransactionReceipt`
#[derive(Debug, Clone)]
pub struct GetTransactionReceipt(pub String);

impl RpcMethod for GetTransactionReceipt {
    type Output = Option<TransactionReceipt>;

    fn rpc_method(&self) -> &str {
        "eth_getTransactionReceipt"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.0)]
    }

    fn after_execution(&self, result: Value) -> Result<Option<TransactionReceipt>, RpcError> {
        typed(self.rpc_method(), result)
    }
}

/// `eth_getTransactionCount`
#[derive(Debug, Clone)]
pub struct GetTransactionCount {
    pub address: String,
    pub block: BlockNumber,
}

impl RpcMethod for GetTransactionCount {
    type Output = u64;

    fn rpc_method(&self) -> &str {
        "eth_getTransactionCount"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.address), json!(self.block)]
    }

    fn after_execution(&self, result: Value) -> Result<u64, RpcError> {
        to_quantity(self.rpc_method(), result)
    }
}

/// `eth_getCode`
#[derive(Debug, Clone)]
pub struct GetCode {
    pub address: String,
    pub block: BlockNumber,
}

impl RpcMethod for GetCode {
    type Output = String;

    fn rpc_method(&self) -> &str {
        "eth_getCode"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.address), json!(self.block)]
    }

    fn after_execution(&self, result: Value) -> Result<String, RpcError> {
        typed(self.rpc_method(), result)
    }
}

/// `eth_call`
#[derive(Debug, Clone)]
pub struct Call {
    pub tx: TransactionRequest,
    pub block: BlockNumber,
}

impl RpcMethod for Call {
    type Output = String;

    fn rpc_method(&self) -> &str {
        "eth_call"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.tx), json!(self.block)]
    }

    fn before_execution(&self, _params: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        if self.tx.to.is_none() {
            return Err(RpcError::InvalidParams {
                method: self.rpc_method().into(),
                reason: "missing 'to' address".into(),
            });
        }
        Ok(vec![to_value(self.rpc_method(), &self.tx)?, json!(self.block)])
    }

    fn after_execution(&self, result: Value) -> Result<String, RpcError> {
        typed(self.rpc_method(), result)
    }
}

/// `eth_estimateGas`
#[derive(Debug, Clone)]
pub struct EstimateGas(pub TransactionRequest);

impl RpcMethod for EstimateGas {
    type Output = u64;

    fn rpc_method(&self) -> &str {
        "eth_estimateGas"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.0)]
    }

    fn after_execution(&self, result: Value) -> Result<u64, RpcError> {
        to_quantity(self.rpc_method(), result)
    }
}

/// `eth_sendTransaction`: the node signs with an unlocked `from` account.
#[derive(Debug, Clone)]
pub struct SendTransaction(pub TransactionRequest);

impl RpcMethod for SendTransaction {
    type Output = String;

    fn rpc_method(&self) -> &str {
        "eth_sendTransaction"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![json!(self.0)]
    }

    fn before_execution(&self, params: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        if self.0.from.is_none() {
            return Err(RpcError::InvalidParams {
                method: self.rpc_method().into(),
                reason: "missing 'from' address".into(),
            });
        }
        Ok(params)
    }

    fn after_execution(&self, result: Value) -> Result<String, RpcError> {
        typed(self.rpc_method(), result)
    }
}

/// `eth_getLogs` with a raw filter object.
#[derive(Debug, Clone)]
pub struct GetLogs(pub Value);

impl RpcMethod for GetLogs {
    type Output = Vec<Value>;

    fn rpc_method(&self) -> &str {
        "eth_getLogs"
    }

    fn parameters(&self) -> Vec<Value> {
        vec![self.0.clone()]
    }

    fn after_execution(&self, result: Value) -> Result<Vec<Value>, RpcError> {
        match result {
            Value::Array(logs) => Ok(logs),
            other => Err(RpcError::invalid_response(format!(
                "eth_getLogs: expected an array, got {other}"
            ))),
        }
    }
}

/// `net_version`
#[derive(Debug, Clone, Default)]
pub struct NetVersion;

impl RpcMethod for NetVersion {
    type Output = String;

    fn rpc_method(&self) -> &str {
        "net_version"
    }

    fn parameters(&self) -> Vec<Value> {
        Vec::new()
    }

    fn after_execution(&self, result: Value) -> Result<String, RpcError> {
        match result {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(RpcError::invalid_response(format!(
                "net_version: unexpected result {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_block_switches_on_hash() {
        let hash = format!("0x{}", "11".repeat(32));
        let by_hash = GetBlock::new(BlockId::Hash(hash.clone()));
        assert_eq!(by_hash.rpc_method(), "eth_getBlockByHash");
        assert_eq!(by_hash.parameters(), vec![json!(hash), json!(false)]);

        let by_number = GetBlock::new(16);
        assert_eq!(by_number.rpc_method(), "eth_getBlockByNumber");
        assert_eq!(by_number.parameters()[0], json!("0x10"));
    }

    #[test]
    fn malformed_hash_rejected_before_sending() {
        let bad = GetBlock::new(BlockId::Hash("0x1234".into()));
        assert!(matches!(bad.to_request(1), Err(RpcError::InvalidParams { .. })));
    }

    #[test]
    fn send_transaction_requires_from() {
        let tx = SendTransaction(TransactionRequest::default());
        assert!(tx.to_request(1).is_err());
    }

    #[test]
    fn block_number_result() {
        assert_eq!(GetBlockNumber.after_execution(json!("0x1b4")).unwrap(), 436);
        assert!(GetBlockNumber.after_execution(json!(null)).is_err());
    }

    #[test]
    fn missing_receipt_is_none() {
        let m = GetTransactionReceipt("0x01".into());
        assert_eq!(m.after_execution(Value::Null).unwrap(), None);
    }
}
