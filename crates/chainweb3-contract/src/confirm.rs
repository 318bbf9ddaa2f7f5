//! Waiting for transaction receipts.
//!
//! The receipt is fetched once right away and then once per new block.
//! Blocks come from a `newHeads` subscription when the transport can push
//! notifications, otherwise from polling `eth_blockNumber`. An optional
//! block limit turns a missing receipt into `DeploymentTimeout`.

use std::time::Duration;

use chainweb3_rpc::method::{GetBlockNumber, GetCode, GetTransactionReceipt};
use chainweb3_rpc::{
    BlockNumber, NewHeads, RequestManager, RpcError, Subscription, TransactionReceipt,
};
use tokio::sync::mpsc;

use crate::config::ConfirmationConfig;
use crate::error::ContractError;

pub(crate) async fn fetch_receipt(
    manager: &RequestManager,
    tx_hash: &str,
) -> Result<Option<TransactionReceipt>, ContractError> {
    Ok(manager
        .execute(&GetTransactionReceipt(tx_hash.to_string()))
        .await?)
}

/// Wait until `tx_hash` has a receipt. With `max_blocks` set, give up after
/// that many new blocks.
pub async fn wait_for_receipt(
    manager: &RequestManager,
    tx_hash: &str,
    max_blocks: Option<u64>,
    config: &ConfirmationConfig,
) -> Result<TransactionReceipt, ContractError> {
    if let Some(receipt) = fetch_receipt(manager, tx_hash).await? {
        return Ok(receipt);
    }
    if manager.supports_subscriptions() {
        watch_heads(manager, tx_hash, max_blocks).await
    } else {
        poll_blocks(manager, tx_hash, max_blocks, config).await
    }
}

async fn watch_heads(
    manager: &RequestManager,
    tx_hash: &str,
    max_blocks: Option<u64>,
) -> Result<TransactionReceipt, ContractError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<(), RpcError>>();
    let heads = Subscription::new(manager.clone(), NewHeads);
    let data_tx = tx.clone();
    heads.on_data(move |_| {
        let _ = data_tx.send(Ok(()));
    });
    heads.on_error(move |e| {
        let _ = tx.send(Err(e.clone()));
    });
    heads.subscribe();

    let mut blocks = 0u64;
    let outcome = loop {
        match rx.recv().await {
            Some(Ok(())) => {
                blocks += 1;
                match fetch_receipt(manager, tx_hash).await {
                    Ok(Some(receipt)) => break Ok(receipt),
                    Ok(None) => {}
                    Err(e) => break Err(e),
                }
                if let Some(max) = max_blocks.filter(|max| blocks >= *max) {
                    break Err(ContractError::DeploymentTimeout { blocks: max });
                }
                tracing::debug!(tx = tx_hash, blocks, "receipt not yet available");
            }
            Some(Err(e)) => break Err(e.into()),
            None => {
                break Err(RpcError::connection("newHeads subscription closed").into());
            }
        }
    };

    if let Err(e) = heads.unsubscribe().await {
        tracing::warn!(tx = tx_hash, error = %e, "failed to unsubscribe from newHeads");
    }
    outcome
}

async fn poll_blocks(
    manager: &RequestManager,
    tx_hash: &str,
    max_blocks: Option<u64>,
    config: &ConfirmationConfig,
) -> Result<TransactionReceipt, ContractError> {
    let interval = Duration::from_millis(config.poll_interval_ms);
    let mut last = manager.execute(&GetBlockNumber).await?;
    let mut blocks = 0u64;

    loop {
        tokio::time::sleep(interval).await;
        let height = manager.execute(&GetBlockNumber).await?;
        if height <= last {
            continue;
        }
        blocks += height - last;
        last = height;

        if let Some(receipt) = fetch_receipt(manager, tx_hash).await? {
            return Ok(receipt);
        }
        if let Some(max) = max_blocks.filter(|max| blocks >= *max) {
            return Err(ContractError::DeploymentTimeout { blocks: max });
        }
        tracing::debug!(tx = tx_hash, blocks, "receipt not yet available");
    }
}

/// Reject failed transactions.
///
/// A failed status with every provided unit of gas used is reported as
/// running out of gas; any other failed status as a revert. Receipts without
/// a status (pre-Byzantium) fail only when all gas was used.
pub fn check_receipt(
    receipt: TransactionReceipt,
    gas_provided: Option<u64>,
) -> Result<TransactionReceipt, ContractError> {
    let used_all = gas_provided.is_some() && receipt.gas_used == gas_provided;
    match receipt.status {
        Some(true) => Ok(receipt),
        None if !used_all => Ok(receipt),
        Some(false) if !used_all => Err(ContractError::TransactionReverted {
            receipt: Box::new(receipt),
        }),
        _ => Err(ContractError::TransactionRanOutOfGas {
            receipt: Box::new(receipt),
        }),
    }
}

/// Address of a freshly deployed contract, once its code is stored.
pub(crate) async fn deployed_address(
    manager: &RequestManager,
    receipt: &TransactionReceipt,
) -> Result<String, ContractError> {
    let address = receipt
        .contract_address
        .clone()
        .ok_or_else(|| ContractError::MissingContractAddress {
            transaction_hash: receipt.transaction_hash.clone(),
        })?;

    let code = manager
        .execute(&GetCode {
            address: address.clone(),
            block: BlockNumber::Latest,
        })
        .await?;
    if code.trim_start_matches("0x").is_empty() {
        return Err(ContractError::ContractCodeNotStored { address });
    }
    tracing::info!(address = %address, "contract deployed");
    Ok(address)
}
