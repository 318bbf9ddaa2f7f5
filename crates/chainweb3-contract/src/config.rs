//! Contract defaults, per-call options and confirmation settings.

use alloy_primitives::U256;
use chainweb3_rpc::types::opt_quantity;
use chainweb3_rpc::TransactionRequest;
use serde::{Deserialize, Serialize};

use crate::address::check_address;
use crate::error::ContractError;

/// Defaults shared by every call and transaction of one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractOptions {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, alias = "gasLimit", with = "opt_quantity")]
    pub gas: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<U256>,
    /// Contract bytecode, used for deployment
    #[serde(default)]
    pub data: Option<String>,
}

impl ContractOptions {
    /// Check and lower-case the addresses.
    pub(crate) fn validated(mut self) -> Result<Self, ContractError> {
        if let Some(address) = &self.address {
            self.address = Some(check_address(address)?);
        }
        if let Some(from) = &self.from {
            self.from = Some(check_address(from)?);
        }
        Ok(self)
    }
}

/// Options of a single call or transaction. Unset fields fall back to the
/// contract's `ContractOptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOptions {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, alias = "gasLimit", with = "opt_quantity")]
    pub gas: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default, with = "opt_quantity")]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Explicit option first, then the contract default. A given `from` is
    /// validated and lower-cased.
    pub fn resolve(&self, defaults: &ContractOptions) -> Result<TxOptions, ContractError> {
        let from = match &self.from {
            Some(from) => Some(check_address(from)?),
            None => defaults.from.clone(),
        };
        Ok(TxOptions {
            from,
            gas: self.gas.or(defaults.gas),
            gas_price: self.gas_price.or(defaults.gas_price),
            value: self.value,
            nonce: self.nonce,
            data: self.data.clone().or_else(|| defaults.data.clone()),
        })
    }

    /// Wire request for these options. `data` is the encoded call.
    pub(crate) fn to_request(&self, to: Option<String>, data: String) -> TransactionRequest {
        TransactionRequest {
            from: self.from.clone(),
            to,
            gas: self.gas,
            gas_price: self.gas_price,
            value: self.value,
            data: Some(data),
            nonce: self.nonce,
        }
    }
}

/// How transaction receipts are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// New blocks to wait for a deployment receipt before giving up
    pub max_blocks: u64,
    /// Block polling interval when the transport cannot push `newHeads` (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_blocks: 50,
            poll_interval_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FROM: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

    #[test]
    fn explicit_options_win() {
        let defaults = ContractOptions {
            from: Some(FROM.into()),
            gas: Some(100_000),
            gas_price: Some(U256::from(1u64)),
            ..Default::default()
        };
        let opts = TxOptions::new().gas(21_000).resolve(&defaults).unwrap();
        assert_eq!(opts.from.as_deref(), Some(FROM));
        assert_eq!(opts.gas, Some(21_000));
        assert_eq!(opts.gas_price, Some(U256::from(1u64)));
    }

    #[test]
    fn from_is_checked_and_lowered() {
        let opts = TxOptions::new()
            .from("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")
            .resolve(&ContractOptions::default())
            .unwrap();
        assert_eq!(opts.from.as_deref(), Some(FROM));

        let bad = TxOptions::new().from("0x1234").resolve(&ContractOptions::default());
        assert!(matches!(bad, Err(ContractError::InvalidAddress { .. })));
    }

    #[test]
    fn gas_limit_alias() {
        let opts: ContractOptions = serde_json::from_value(json!({
            "from": FROM,
            "gasLimit": 300000,
            "gasPrice": "0x3b9aca00"
        }))
        .unwrap();
        assert_eq!(opts.gas, Some(300_000));
        assert_eq!(opts.gas_price, Some(U256::from(1_000_000_000u64)));
    }

    #[test]
    fn confirmation_defaults() {
        let cfg: ConfirmationConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(cfg.max_blocks, 50);
        assert_eq!(cfg.poll_interval_ms, 1000);
    }
}
