//! The contract binding.
//!
//! A `Contract` pairs a mapped ABI with an address, default options and a
//! request manager. Methods are resolved through a table built once per
//! ABI: every key the ABI model answers to (bare name, full name, selector
//! and `constructor`) maps to a factory that produces a fresh `TxObject`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chainweb3_abi::{AbiItem, AbiModel, AbiValue};
use chainweb3_rpc::RequestManager;

use crate::address::check_address;
use crate::config::{ConfirmationConfig, ContractOptions};
use crate::error::ContractError;
use crate::methods::TxObject;

/// Builds the `TxObject` for one method from the contract's current state.
/// Rejects an argument list that does not match the method's inputs.
pub type MethodFactory =
    Arc<dyn Fn(&Contract, Vec<AbiValue>) -> Result<TxObject, ContractError> + Send + Sync>;

type MethodTable = HashMap<String, MethodFactory>;

/// A deployed (or to-be-deployed) contract. Cheap to clone; clones share
/// the ABI and the request manager.
#[derive(Clone)]
pub struct Contract {
    pub(crate) model: Arc<AbiModel>,
    methods: Arc<MethodTable>,
    pub(crate) options: ContractOptions,
    pub(crate) manager: RequestManager,
    pub(crate) confirmation: ConfirmationConfig,
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.options.address)
            .field("options", &self.options)
            .field("methods", &self.model.methods().count())
            .field("events", &self.model.events().count())
            .finish()
    }
}

fn build_method_table(model: &AbiModel) -> MethodTable {
    model
        .method_keys()
        .filter_map(|key| {
            let item = Arc::clone(model.get_method(key)?);
            let factory: MethodFactory = Arc::new(move |contract: &Contract, args: Vec<AbiValue>| {
                TxObject::new(contract, Arc::clone(&item), args)
            });
            Some((key.to_string(), factory))
        })
        .collect()
}

impl Contract {
    /// Bind `model` to a request manager. Addresses in `options` are
    /// validated and lower-cased.
    pub fn new(
        manager: RequestManager,
        model: AbiModel,
        options: ContractOptions,
    ) -> Result<Self, ContractError> {
        let options = options.validated()?;
        let methods = Arc::new(build_method_table(&model));
        Ok(Self {
            model: Arc::new(model),
            methods,
            options,
            manager,
            confirmation: ConfirmationConfig::default(),
        })
    }

    /// Parse an ABI JSON array and bind it.
    pub fn from_json(
        manager: RequestManager,
        abi_json: &str,
        options: ContractOptions,
    ) -> Result<Self, ContractError> {
        Self::new(manager, AbiModel::from_json(abi_json)?, options)
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn address(&self) -> Option<&str> {
        self.options.address.as_deref()
    }

    pub fn set_address(&mut self, address: &str) -> Result<(), ContractError> {
        self.options.address = Some(check_address(address)?);
        Ok(())
    }

    pub fn options(&self) -> &ContractOptions {
        &self.options
    }

    /// Replace the default options (validated like `new`).
    pub fn set_options(&mut self, options: ContractOptions) -> Result<(), ContractError> {
        self.options = options.validated()?;
        Ok(())
    }

    pub fn abi(&self) -> &AbiModel {
        &self.model
    }

    /// Swap in a new interface. The method table is rebuilt; existing
    /// `TxObject`s and subscriptions keep the items they were built from.
    pub fn set_abi(&mut self, model: AbiModel) {
        self.methods = Arc::new(build_method_table(&model));
        self.model = Arc::new(model);
    }

    pub fn manager(&self) -> &RequestManager {
        &self.manager
    }

    pub fn confirmation(&self) -> &ConfirmationConfig {
        &self.confirmation
    }

    /// Every key `method` accepts.
    pub fn method_keys(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn has_method(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    fn resolve(&self, key: &str) -> Option<&MethodFactory> {
        self.methods.get(key).or_else(|| {
            // selectors in any case, with or without 0x
            let item: &Arc<AbiItem> = self.model.get_method(key)?;
            self.methods.get(&item.signature)
        })
    }

    /// Prepare a call of `key` (bare name, full name or selector) with `args`.
    /// Unknown keys and a wrong number of arguments fail here.
    pub fn method(&self, key: &str, args: Vec<AbiValue>) -> Result<TxObject, ContractError> {
        let factory = self.resolve(key).ok_or_else(|| ContractError::UnknownMethod {
            name: key.to_string(),
        })?;
        factory(self, args)
    }
}
