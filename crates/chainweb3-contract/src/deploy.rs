//! Contract deployment.

use chainweb3_abi::AbiValue;

use crate::address::check_address;
use crate::config::TxOptions;
use crate::confirm::{check_receipt, deployed_address, wait_for_receipt};
use crate::contract::Contract;
use crate::error::ContractError;
use crate::methods::{submit, TxObject};
use crate::promi_event::{PromiEvent, TxEvent};

/// A prepared deployment: the constructor invocation plus the contract
/// that receives the new address.
#[derive(Debug, Clone)]
pub struct Deployment {
    tx: TxObject,
    contract: Contract,
}

impl Contract {
    /// Prepare a deployment of `data` (the contract's bytecode when `None`)
    /// with constructor `args`. An ABI without a constructor deploys with no
    /// arguments.
    pub fn deploy(&self, data: Option<String>, args: Vec<AbiValue>) -> Result<Deployment, ContractError> {
        let constructor = self.model.constructor_or_default();
        Ok(Deployment {
            tx: TxObject::new(self, constructor, args)?.with_data(data),
            contract: self.clone(),
        })
    }
}

impl Deployment {
    pub fn tx(&self) -> &TxObject {
        &self.tx
    }

    /// Bytecode followed by the encoded constructor arguments.
    pub fn encode_abi(&self) -> Result<String, ContractError> {
        self.tx.encode_abi()
    }

    pub async fn estimate_gas(&self, options: TxOptions) -> Result<u64, ContractError> {
        self.tx.estimate_gas(options).await
    }

    /// Send the deployment.
    ///
    /// Resolves to a copy of the contract bound to the new address once the
    /// receipt is in and the code is stored. Gives up with
    /// `DeploymentTimeout` after the configured number of blocks.
    pub fn send(&self, options: TxOptions) -> Result<PromiEvent<Contract>, ContractError> {
        let (tx, gas) = self.tx.transaction(&options)?;
        let (sender, promi) = PromiEvent::channel();
        let mut contract = self.contract.clone();

        tokio::spawn(async move {
            let result = async {
                let manager = contract.manager.clone();
                let confirmation = contract.confirmation;
                let hash = submit(&manager, tx, &sender).await?;
                let receipt =
                    wait_for_receipt(&manager, &hash, Some(confirmation.max_blocks), &confirmation)
                        .await?;
                let receipt = check_receipt(receipt, gas)?;
                let address = deployed_address(&manager, &receipt).await?;
                sender.emit(TxEvent::Receipt(receipt));
                contract.options.address = Some(check_address(&address)?);
                Ok::<_, ContractError>(contract)
            }
            .await;
            sender.settle(result);
        });
        Ok(promi)
    }
}
