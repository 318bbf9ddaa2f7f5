//! Contract event streams and past-event queries.
//!
//! `events` subscribes to one event, `all_events` to every log of the
//! contract (decoded by matching `topics[0]`). Address and filter errors are
//! returned from `events` itself. Conflicting options (`filter` together with
//! `topics`, or `topics` on `allEvents`) reach the subscription's listeners
//! once, as the first and only error.

use std::fmt;
use std::sync::Arc;

use chainweb3_abi::{
    encode_event_filter, AbiItem, AbiValue, AllEventsLogDecoder, DecodedLog, EventLogDecoder,
    LogDecoder, RawLog, Topic,
};
use chainweb3_rpc::method::GetLogs;
use chainweb3_rpc::{BlockNumber, RpcError, Subscription, SubscriptionModel};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::contract::Contract;
use crate::error::ContractError;

/// Name that selects every event of the contract.
pub const ALL_EVENTS: &str = "allEvents";

/// Names reserved by the listener machinery.
const RESERVED_EVENT_NAMES: [&str; 2] = ["newListener", "removeListener"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    /// Indexed input values to match, by input name
    pub filter: IndexMap<String, AbiValue>,
    /// Raw topics, used instead of `filter`
    pub topics: Option<Vec<Topic>>,
    pub from_block: Option<BlockNumber>,
    pub to_block: Option<BlockNumber>,
    /// Overrides the contract address
    pub address: Option<String>,
}

impl EventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, name: impl Into<String>, value: AbiValue) -> Self {
        self.filter.insert(name.into(), value);
        self
    }

    pub fn topics(mut self, topics: Vec<Topic>) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn from_block(mut self, block: impl Into<BlockNumber>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockNumber>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// Node-side log filter.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFilter {
    pub address: String,
    pub topics: Vec<Topic>,
    pub from_block: Option<BlockNumber>,
    pub to_block: Option<BlockNumber>,
}

impl LogFilter {
    /// `eth_subscribe("logs", ...)` parameter.
    pub fn subscription_params(&self) -> Value {
        json!({ "address": self.address, "topics": self.topics })
    }

    /// `eth_getLogs` parameter.
    pub fn query(&self) -> Value {
        let mut query = Map::new();
        if let Some(from) = self.from_block {
            query.insert("fromBlock".into(), json!(from));
        }
        if let Some(to) = self.to_block {
            query.insert("toBlock".into(), json!(to));
        }
        query.insert("address".into(), json!(self.address));
        query.insert("topics".into(), json!(self.topics));
        Value::Object(query)
    }

    /// Backfill runs only from a concrete starting height.
    fn backfills(&self) -> bool {
        matches!(
            self.from_block,
            Some(BlockNumber::Number(_) | BlockNumber::Earliest)
        )
    }
}

/// `logs` subscription of one event, or of all events.
pub struct LogSubscription {
    event: String,
    filter: LogFilter,
    conflict: Option<ContractError>,
    decoder: Arc<dyn LogDecoder>,
}

impl fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSubscription")
            .field("event", &self.event)
            .field("filter", &self.filter)
            .field("conflict", &self.conflict)
            .finish()
    }
}

impl LogSubscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }
}

impl SubscriptionModel for LogSubscription {
    type Item = DecodedLog;
    type Error = ContractError;

    fn subscription_type(&self) -> &str {
        "logs"
    }

    fn params(&self) -> Vec<Value> {
        vec![self.filter.subscription_params()]
    }

    fn backfill(&self) -> Option<(String, Vec<Value>)> {
        self.filter
            .backfills()
            .then(|| ("eth_getLogs".into(), vec![self.filter.query()]))
    }

    fn validate(&self) -> Result<(), ContractError> {
        self.conflict.clone().map_or(Ok(()), Err)
    }

    fn on_item(&self, raw: Value) -> Result<DecodedLog, ContractError> {
        let log = parse_log(raw)?;
        Ok(self.decoder.decode(&log)?)
    }
}

fn parse_log(raw: Value) -> Result<RawLog, ContractError> {
    serde_json::from_value(raw)
        .map_err(|e| RpcError::invalid_response(format!("malformed log: {e}")).into())
}

enum Target {
    One(Arc<AbiItem>),
    All,
}

impl Contract {
    fn event_target(&self, name: &str) -> Result<Target, ContractError> {
        let reserved = |name: &str| ContractError::ReservedEventName { name: name.into() };
        if RESERVED_EVENT_NAMES.contains(&name) {
            return Err(reserved(name));
        }
        if name == ALL_EVENTS {
            return Ok(Target::All);
        }
        let item = self
            .model
            .get_event(name)
            .ok_or_else(|| ContractError::UnknownEvent { name: name.into() })?;
        // full names and topic hashes resolve to the same declared name
        if RESERVED_EVENT_NAMES.contains(&item.name.as_str()) {
            return Err(reserved(item.name.as_str()));
        }
        Ok(Target::One(Arc::clone(item)))
    }

    fn option_conflict(target: &Target, options: &EventOptions) -> Option<ContractError> {
        options.topics.as_ref()?;
        let reason = if !options.filter.is_empty() {
            "Only filter or topics are allowed and not both"
        } else if matches!(target, Target::All) {
            "topics are not allowed for allEvents"
        } else {
            return None;
        };
        Some(ContractError::InvalidEventOptions {
            reason: reason.into(),
        })
    }

    fn log_filter(&self, target: &Target, options: &EventOptions) -> Result<LogFilter, ContractError> {
        let address = match &options.address {
            Some(address) => crate::address::check_address(address)?,
            None => self
                .options
                .address
                .clone()
                .ok_or(ContractError::NoAddressSet)?,
        };
        let topics = match (&options.topics, target) {
            (Some(topics), _) => topics.clone(),
            (None, Target::One(item)) => encode_event_filter(item, &options.filter)?,
            (None, Target::All) => Vec::new(),
        };
        Ok(LogFilter {
            address,
            topics,
            from_block: options.from_block,
            to_block: options.to_block,
        })
    }

    fn decoder(&self, target: &Target) -> Arc<dyn LogDecoder> {
        match target {
            Target::One(item) => Arc::new(EventLogDecoder::new(Arc::clone(item))),
            Target::All => Arc::new(AllEventsLogDecoder::new(Arc::clone(&self.model))),
        }
    }

    fn log_subscription(&self, name: &str, options: &EventOptions) -> Result<LogSubscription, ContractError> {
        let target = self.event_target(name)?;
        let event = match &target {
            Target::One(item) => item.name.clone(),
            Target::All => ALL_EVENTS.to_string(),
        };
        Ok(LogSubscription {
            event,
            filter: self.log_filter(&target, options)?,
            conflict: Self::option_conflict(&target, options),
            decoder: self.decoder(&target),
        })
    }

    /// Subscribe to `name` (bare name, full name or signature) or to
    /// `allEvents`.
    ///
    /// Reserved and unknown names, a bad or missing address and filter
    /// values that do not encode are rejected here. Conflicting options are
    /// reported through the subscription. With a numeric `from_block`, past
    /// logs are delivered before live ones.
    pub fn events(
        &self,
        name: &str,
        options: EventOptions,
    ) -> Result<Subscription<LogSubscription>, ContractError> {
        let model = self.log_subscription(name, &options)?;
        tracing::debug!(event = %model.event, "subscribing to contract logs");
        Ok(Subscription::new(self.manager.clone(), model))
    }

    pub fn all_events(&self, options: EventOptions) -> Result<Subscription<LogSubscription>, ContractError> {
        self.events(ALL_EVENTS, options)
    }

    /// Like `events`, but closes after the first log. Past logs are not
    /// fetched.
    pub fn once(
        &self,
        name: &str,
        mut options: EventOptions,
    ) -> Result<Subscription<LogSubscription>, ContractError> {
        options.from_block = None;
        let model = self.log_subscription(name, &options)?;
        Ok(Subscription::once(self.manager.clone(), model))
    }

    /// Fetch and decode matching logs with `eth_getLogs`, in node order.
    pub async fn get_past_events(
        &self,
        name: &str,
        options: EventOptions,
    ) -> Result<Vec<DecodedLog>, ContractError> {
        let target = self.event_target(name)?;
        if let Some(conflict) = Self::option_conflict(&target, &options) {
            return Err(conflict);
        }
        let filter = self.log_filter(&target, &options)?;
        let decoder = self.decoder(&target);

        let raw = self.manager.execute(&GetLogs(filter.query())).await?;
        tracing::debug!(event = name, logs = raw.len(), "fetched past logs");
        raw.into_iter()
            .map(|log| -> Result<DecodedLog, ContractError> {
                Ok(decoder.decode(&parse_log(log)?)?)
            })
            .collect()
    }
}
