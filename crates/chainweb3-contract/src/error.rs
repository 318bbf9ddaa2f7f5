//! Error types for contract bindings.

use chainweb3_abi::AbiError;
use chainweb3_rpc::{RpcError, TransactionReceipt};
use thiserror::Error;

/// Errors raised by a `Contract`, its `TxObject`s and event subscriptions.
///
/// `Clone` so one failure can reach both the `Error` event of a `PromiEvent`
/// and its awaited result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("Provided address \"{address}\" is invalid, the capitalization checksum test failed")]
    InvalidAddress { address: String },

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("The event \"{name}\" is a reserved event name, you can't use it")]
    ReservedEventName { name: String },

    #[error("Method \"{name}\" not found in the contract interface")]
    UnknownMethod { name: String },

    #[error("Event with name \"{name}\" not found")]
    UnknownEvent { name: String },

    #[error("Invalid subscription options: {reason}")]
    InvalidEventOptions { reason: String },

    #[error("This contract object doesn't have address set yet, please set an address first")]
    NoAddressSet,

    #[error("No \"from\" address specified in neither the given options, nor the default options")]
    MissingFromAddress,

    #[error("No \"data\" specified in neither the given options, nor the default options")]
    MissingContractData,

    #[error("Can not send value to non-payable contract method or constructor {method}")]
    NonPayable { method: String },

    #[error("Transaction ran out of gas. Please provide more gas")]
    TransactionRanOutOfGas { receipt: Box<TransactionReceipt> },

    #[error("Transaction has been reverted by the EVM")]
    TransactionReverted { receipt: Box<TransactionReceipt> },

    /// No receipt was found within the confirmation window.
    #[error("The contract could not be deployed within {blocks} blocks, please make sure your transaction was properly sent")]
    DeploymentTimeout { blocks: u64 },

    #[error("The transaction receipt of {transaction_hash} didn't contain a contract address")]
    MissingContractAddress { transaction_hash: String },

    #[error("The contract code couldn't be stored at {address}, please check your gas limit")]
    ContractCodeNotStored { address: String },
}

impl ContractError {
    /// The receipt attached to a failed transaction, if any.
    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        match self {
            Self::TransactionRanOutOfGas { receipt } | Self::TransactionReverted { receipt } => {
                Some(receipt)
            }
            _ => None,
        }
    }
}
