//! # chainweb3-contract
//!
//! ABI-driven contract bindings on top of `chainweb3-abi` and
//! `chainweb3-rpc`.
//!
//! ```text
//! Contract ──method(key, args)──▶ TxObject ──call / send / estimate_gas──▶ RequestManager
//!     │
//!     ├──events / all_events / once──▶ Subscription<LogSubscription>
//!     ├──get_past_events──▶ Vec<DecodedLog>
//!     └──deploy──▶ Deployment ──send──▶ PromiEvent<Contract>
//! ```
//!
//! Methods are looked up in a table built once per ABI, keyed by bare name,
//! full name and selector. Synchronous validation errors are returned right
//! away; transaction progress and failures arrive through a [`PromiEvent`].

pub mod address;
pub mod config;
pub mod confirm;
pub mod contract;
pub mod deploy;
pub mod error;
pub mod events;
pub mod methods;
pub mod promi_event;

pub use address::{check_address, to_checksum_address};
pub use config::{ConfirmationConfig, ContractOptions, TxOptions};
pub use confirm::{check_receipt, wait_for_receipt};
pub use contract::{Contract, MethodFactory};
pub use deploy::Deployment;
pub use error::ContractError;
pub use events::{EventOptions, LogFilter, LogSubscription, ALL_EVENTS};
pub use methods::{ContractCall, TxObject};
pub use promi_event::{PromiEvent, TxEvent};
