//! `TxObject`: one prepared method invocation.
//!
//! Built by the contract's method table with the contract's address and
//! default options at that moment. Executing it never changes the contract.

use std::fmt;
use std::sync::Arc;

use chainweb3_abi::{
    decode_method_return, encode_constructor, encode_method, AbiError, AbiItem, AbiValue,
};
use chainweb3_rpc::method::{Call, EstimateGas, RpcMethod, SendTransaction};
use chainweb3_rpc::{BlockNumber, RequestManager, RpcError, TransactionReceipt, TransactionRequest};
use serde_json::Value;

use crate::config::{ConfirmationConfig, ContractOptions, TxOptions};
use crate::confirm::{check_receipt, wait_for_receipt};
use crate::contract::Contract;
use crate::error::ContractError;
use crate::promi_event::{PromiEvent, PromiEventSender, TxEvent};

#[derive(Clone)]
pub struct TxObject {
    item: Arc<AbiItem>,
    args: Vec<AbiValue>,
    defaults: ContractOptions,
    manager: RequestManager,
    confirmation: ConfirmationConfig,
}

impl fmt::Debug for TxObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxObject")
            .field("method", &self.item.full_name)
            .field("args", &self.args)
            .field("to", &self.defaults.address)
            .finish()
    }
}

impl TxObject {
    /// Fails when `args` does not match the declared inputs.
    pub(crate) fn new(
        contract: &Contract,
        item: Arc<AbiItem>,
        args: Vec<AbiValue>,
    ) -> Result<Self, ContractError> {
        if args.len() != item.inputs.len() {
            return Err(AbiError::ArgumentCountMismatch {
                method: item.full_name.clone(),
                expected: item.inputs.len(),
                got: args.len(),
            }
            .into());
        }
        Ok(Self {
            item,
            args,
            defaults: contract.options.clone(),
            manager: contract.manager.clone(),
            confirmation: contract.confirmation,
        })
    }

    /// Override the bytecode used by a constructor invocation.
    pub(crate) fn with_data(mut self, data: Option<String>) -> Self {
        if data.is_some() {
            self.defaults.data = data;
        }
        self
    }

    pub fn item(&self) -> &AbiItem {
        &self.item
    }

    pub fn arguments(&self) -> &[AbiValue] {
        &self.args
    }

    /// Call data: selector and arguments for a function, bytecode and
    /// arguments for the constructor.
    pub fn encode_abi(&self) -> Result<String, ContractError> {
        if self.item.is_constructor() {
            let data = self
                .defaults
                .data
                .as_deref()
                .ok_or(ContractError::MissingContractData)?;
            return Ok(encode_constructor(Some(&self.item), data, &self.args)?);
        }
        Ok(encode_method(&self.item, &self.args)?)
    }

    fn to(&self) -> Result<Option<String>, ContractError> {
        if self.item.is_constructor() {
            return Ok(None);
        }
        self.defaults
            .address
            .clone()
            .map(Some)
            .ok_or(ContractError::NoAddressSet)
    }

    fn request(&self, options: &TxOptions) -> Result<(TransactionRequest, TxOptions), ContractError> {
        let options = options.resolve(&self.defaults)?;
        let to = self.to()?;
        let data = self.encode_abi()?;
        Ok((options.to_request(to, data), options))
    }

    /// `eth_call` descriptor for a batch.
    pub fn call_request(&self, options: TxOptions) -> Result<ContractCall, ContractError> {
        let (tx, _) = self.request(&options)?;
        if tx.to.is_none() {
            return Err(ContractError::NoAddressSet);
        }
        Ok(ContractCall {
            item: Arc::clone(&self.item),
            call: Call {
                tx,
                block: BlockNumber::Latest,
            },
        })
    }

    /// Execute with `eth_call` and decode the outputs.
    ///
    /// No outputs, or an empty result, gives `None`; one output is returned
    /// bare; several come back as a tuple.
    pub async fn call(&self, options: TxOptions) -> Result<Option<AbiValue>, ContractError> {
        let request = self.call_request(options)?;
        let output = self.manager.execute(&request.call).await?;
        Ok(decode_method_return(&self.item, &output)?)
    }

    pub async fn estimate_gas(&self, options: TxOptions) -> Result<u64, ContractError> {
        let (tx, _) = self.request(&options)?;
        Ok(self.manager.execute(&EstimateGas(tx)).await?)
    }

    /// Check everything `send` needs and build the transaction.
    pub(crate) fn transaction(&self, options: &TxOptions) -> Result<(TransactionRequest, Option<u64>), ContractError> {
        let (tx, resolved) = self.request(options)?;
        if tx.from.is_none() {
            return Err(ContractError::MissingFromAddress);
        }
        if !self.item.payable && resolved.value.is_some_and(|v| !v.is_zero()) {
            return Err(ContractError::NonPayable {
                method: self.item.full_name.clone(),
            });
        }
        Ok((tx, resolved.gas))
    }

    /// `eth_sendTransaction` descriptor for a batch; resolves to the hash.
    pub fn send_request(&self, options: TxOptions) -> Result<SendTransaction, ContractError> {
        let (tx, _) = self.transaction(&options)?;
        Ok(SendTransaction(tx))
    }

    /// Submit the transaction.
    ///
    /// Validation errors are returned right away. The `PromiEvent` then
    /// reports `TransactionHash`, waits for the receipt with no block limit
    /// and reports `Receipt`; failed receipts end in an error instead.
    pub fn send(&self, options: TxOptions) -> Result<PromiEvent<TransactionReceipt>, ContractError> {
        let (tx, gas) = self.transaction(&options)?;
        let (sender, promi) = PromiEvent::channel();
        let manager = self.manager.clone();
        let confirmation = self.confirmation;
        let method = self.item.full_name.clone();

        tokio::spawn(async move {
            let result = async {
                let hash = submit(&manager, tx, &sender).await?;
                let receipt = wait_for_receipt(&manager, &hash, None, &confirmation).await?;
                let receipt = check_receipt(receipt, gas)?;
                tracing::info!(method = %method, tx = %hash, "transaction confirmed");
                sender.emit(TxEvent::Receipt(receipt.clone()));
                Ok::<_, ContractError>(receipt)
            }
            .await;
            sender.settle(result);
        });
        Ok(promi)
    }
}

/// Send `tx` and report its hash.
pub(crate) async fn submit<T>(
    manager: &RequestManager,
    tx: TransactionRequest,
    sender: &PromiEventSender<T>,
) -> Result<String, ContractError> {
    let hash = manager.execute(&SendTransaction(tx)).await?;
    tracing::debug!(tx = %hash, "transaction submitted");
    sender.emit(TxEvent::TransactionHash(hash.clone()));
    Ok(hash)
}

/// `eth_call` whose result is decoded against the method's outputs.
#[derive(Debug, Clone)]
pub struct ContractCall {
    item: Arc<AbiItem>,
    call: Call,
}

impl RpcMethod for ContractCall {
    type Output = Option<AbiValue>;

    fn rpc_method(&self) -> &str {
        self.call.rpc_method()
    }

    fn parameters(&self) -> Vec<Value> {
        self.call.parameters()
    }

    fn before_execution(&self, params: Vec<Value>) -> Result<Vec<Value>, RpcError> {
        self.call.before_execution(params)
    }

    fn after_execution(&self, result: Value) -> Result<Option<AbiValue>, RpcError> {
        let output = self.call.after_execution(result)?;
        decode_method_return(&self.item, &output).map_err(|e| {
            RpcError::Deserialization(format!("{}: {e}", self.item.full_name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use chainweb3_rpc::{BatchRequest, MockTransport};
    use serde_json::json;

    const ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"supply","type":"uint256"}]},
        {"type":"function","name":"balanceOf","inputs":[{"name":"who","type":"address"}],"outputs":[{"type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
        {"type":"function","name":"getReserves","inputs":[],"outputs":[{"name":"reserve0","type":"uint112"},{"name":"reserve1","type":"uint112"}],"stateMutability":"view"}
    ]"#;
    const TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    const HOLDER: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";
    const SENDER: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

    fn setup(options: ContractOptions) -> (Arc<MockTransport>, Contract) {
        let mock = Arc::new(MockTransport::new());
        let contract = Contract::from_json(RequestManager::new(mock.clone()), ABI, options).unwrap();
        (mock, contract)
    }

    fn at_token() -> ContractOptions {
        ContractOptions {
            address: Some(TOKEN.into()),
            ..Default::default()
        }
    }

    fn word(n: u64) -> String {
        format!("{n:064x}")
    }

    #[tokio::test]
    async fn balance_of_call_round_trip() {
        let (mock, contract) = setup(at_token());
        mock.push_result("eth_call", json!(format!("0x{}", word(42))));

        let tx = contract.method("balanceOf", vec![AbiValue::Address(HOLDER.into())]).unwrap();
        let value = tx.call(TxOptions::new()).await.unwrap();
        assert_eq!(value, Some(AbiValue::Uint(42)));

        let sent = &mock.requests_for("eth_call")[0];
        let data = format!("0x70a08231{:0>64}", &HOLDER[2..]);
        assert_eq!(sent.params[0]["data"], json!(data));
        assert_eq!(sent.params[0]["to"], json!(TOKEN));
        assert_eq!(sent.params[1], json!("latest"));
    }

    #[tokio::test]
    async fn several_outputs_come_back_as_a_tuple() {
        let (mock, contract) = setup(at_token());
        mock.push_result("eth_call", json!(format!("0x{}{}", word(5), word(7))));

        let value = contract
            .method("getReserves", vec![])
            .unwrap()
            .call(TxOptions::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.field("reserve0"), Some(&AbiValue::Uint(5)));
        assert_eq!(value.field("reserve1"), Some(&AbiValue::Uint(7)));
    }

    #[tokio::test]
    async fn empty_call_result_is_none() {
        let (mock, contract) = setup(at_token());
        mock.push_result("eth_call", json!("0x"));
        let tx = contract.method("balanceOf", vec![AbiValue::Address(HOLDER.into())]).unwrap();
        assert_eq!(tx.call(TxOptions::new()).await.unwrap(), None);
    }

    #[test]
    fn synchronous_validation() {
        let (_, unbound) = setup(ContractOptions::default());
        let tx = unbound.method("balanceOf", vec![AbiValue::Address(HOLDER.into())]).unwrap();
        assert_eq!(tx.call_request(TxOptions::new()).unwrap_err(), ContractError::NoAddressSet);

        let (_, contract) = setup(at_token());
        assert_eq!(
            contract.method("balanceOf", vec![]).unwrap_err(),
            ContractError::Abi(AbiError::ArgumentCountMismatch {
                method: "balanceOf(address)".into(),
                expected: 1,
                got: 0,
            })
        );
        assert!(contract
            .method("0x70a08231", vec![AbiValue::Uint(1), AbiValue::Uint(2)])
            .is_err());

        let transfer = contract
            .method("transfer", vec![AbiValue::Address(HOLDER.into()), AbiValue::Uint(1)])
            .unwrap();
        assert_eq!(
            transfer.send_request(TxOptions::new()).unwrap_err(),
            ContractError::MissingFromAddress
        );
        assert!(matches!(
            transfer.send(TxOptions::new().from(SENDER).value(U256::from(1u64))),
            Err(ContractError::NonPayable { .. })
        ));
    }

    #[test]
    fn constructor_needs_bytecode() {
        let (_, contract) = setup(ContractOptions::default());
        let ctor = contract.method("constructor", vec![AbiValue::Uint(1)]).unwrap();
        assert_eq!(ctor.encode_abi().unwrap_err(), ContractError::MissingContractData);

        let with_code = ctor.with_data(Some("0x6080".into()));
        assert_eq!(with_code.encode_abi().unwrap(), format!("0x6080{}", word(1)));
    }

    #[tokio::test]
    async fn send_reports_hash_then_receipt() {
        let (mock, contract) = setup(ContractOptions {
            from: Some(SENDER.into()),
            ..at_token()
        });
        mock.push_result("eth_sendTransaction", json!("0xfeed"));
        mock.push_result(
            "eth_getTransactionReceipt",
            json!({"transactionHash": "0xfeed", "status": "0x1", "gasUsed": "0x5208"}),
        );

        let tx = contract
            .method("transfer", vec![AbiValue::Address(HOLDER.into()), AbiValue::Uint(1)])
            .unwrap();
        let mut promi = tx.send(TxOptions::new().gas(100_000)).unwrap();

        assert_eq!(promi.next_event().await, Some(TxEvent::TransactionHash("0xfeed".into())));
        assert!(matches!(promi.next_event().await, Some(TxEvent::Receipt(_))));
        let receipt = promi.await.unwrap();
        assert_eq!(receipt.gas_used, Some(21_000));

        let sent = &mock.requests_for("eth_sendTransaction")[0];
        assert_eq!(sent.params[0]["from"], json!(SENDER));
        assert_eq!(sent.params[0]["gas"], json!("0x186a0"));
    }

    #[tokio::test]
    async fn out_of_gas_is_an_error() {
        let (mock, contract) = setup(ContractOptions {
            from: Some(SENDER.into()),
            ..at_token()
        });
        mock.push_result("eth_sendTransaction", json!("0xfeed"));
        mock.push_result(
            "eth_getTransactionReceipt",
            json!({"transactionHash": "0xfeed", "status": "0x0", "gasUsed": "0x5208"}),
        );

        let tx = contract
            .method("transfer", vec![AbiValue::Address(HOLDER.into()), AbiValue::Uint(1)])
            .unwrap();
        let mut promi = tx.send(TxOptions::new().gas(21_000)).unwrap();
        assert!(matches!(promi.next_event().await, Some(TxEvent::TransactionHash(_))));
        assert!(matches!(
            promi.next_event().await,
            Some(TxEvent::Error(ContractError::TransactionRanOutOfGas { .. }))
        ));
        assert!(promi.await.is_err());
    }

    #[tokio::test]
    async fn calls_batch_together() {
        let (mock, contract) = setup(at_token());
        mock.push_result("eth_call", json!(format!("0x{}", word(1))));
        mock.push_result("eth_call", json!(format!("0x{}{}", word(2), word(3))));

        let mut batch = BatchRequest::new(contract.manager().clone());
        let balance = batch
            .add(
                contract
                    .method("balanceOf", vec![AbiValue::Address(HOLDER.into())])
                    .unwrap()
                    .call_request(TxOptions::new())
                    .unwrap(),
            )
            .unwrap();
        let reserves = batch
            .add(
                contract
                    .method("getReserves", vec![])
                    .unwrap()
                    .call_request(TxOptions::new())
                    .unwrap(),
            )
            .unwrap();
        batch.execute().await.unwrap();

        assert_eq!(balance.result().await.unwrap(), Some(AbiValue::Uint(1)));
        let reserves = reserves.result().await.unwrap().unwrap();
        assert_eq!(reserves.field("reserve1"), Some(&AbiValue::Uint(3)));
    }
}
