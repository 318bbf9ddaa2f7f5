//! ABI mapper: raw ABI entries → indexed `AbiModel`.
//!
//! Every function is reachable by its 4-byte selector and its full name
//! (`transfer(address,uint256)`). The bare name (`transfer`) points at the
//! first entry that declared it, so later overloads are only reachable
//! through their unambiguous keys. Events follow the same scheme with their
//! 32-byte topic hash.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_core::dyn_abi::DynSolType;
use serde_json::Value;

use crate::error::AbiError;
use crate::item::{canonical_types, AbiEntry, AbiItem, AbiItemKind, AbiParam};
use crate::signature::{event_signature, function_signature, normalize_signature_key};

/// Key the constructor is registered under in the method table.
pub const CONSTRUCTOR_KEY: &str = "constructor";

/// Indexed, immutable view of a contract interface.
#[derive(Debug, Clone, Default)]
pub struct AbiModel {
    /// Mapped items in declaration order
    items: Vec<Arc<AbiItem>>,
    methods: HashMap<String, Arc<AbiItem>>,
    events: HashMap<String, Arc<AbiItem>>,
    constructor: Option<Arc<AbiItem>>,
}

impl AbiModel {
    /// Parse a standard ABI JSON array and map it.
    pub fn from_json(abi_json: &str) -> Result<Self, AbiError> {
        let entries: Vec<AbiEntry> = serde_json::from_str(abi_json)?;
        AbiMapper::map(&entries)
    }

    /// Map an already-parsed JSON value (must be an array).
    pub fn from_value(abi: &Value) -> Result<Self, AbiError> {
        let entries: Vec<AbiEntry> = serde_json::from_value(abi.clone())?;
        AbiMapper::map(&entries)
    }

    /// Resolve a method by bare name, full name or selector (with or without `0x`).
    pub fn get_method(&self, key: &str) -> Option<&Arc<AbiItem>> {
        self.methods
            .get(key)
            .or_else(|| self.methods.get(&normalize_signature_key(key)))
    }

    pub fn has_method(&self, key: &str) -> bool {
        self.get_method(key).is_some()
    }

    /// Resolve an event by bare name, full name or topic hash.
    pub fn get_event(&self, key: &str) -> Option<&Arc<AbiItem>> {
        self.events
            .get(key)
            .or_else(|| self.events.get(&normalize_signature_key(key)))
    }

    pub fn has_event(&self, key: &str) -> bool {
        self.get_event(key).is_some()
    }

    /// Find the non-anonymous event whose signature equals `topic0`.
    pub fn event_by_topic(&self, topic0: &str) -> Option<&Arc<AbiItem>> {
        let key = normalize_signature_key(topic0);
        self.events
            .get(&key)
            .filter(|item| !item.anonymous && item.signature == key)
    }

    pub fn constructor(&self) -> Option<&Arc<AbiItem>> {
        self.constructor.as_ref()
    }

    /// The declared constructor, or an argument-less one.
    pub fn constructor_or_default(&self) -> Arc<AbiItem> {
        self.constructor
            .clone()
            .unwrap_or_else(|| Arc::new(AbiItem::default_constructor()))
    }

    /// All functions, in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<AbiItem>> {
        self.items.iter().filter(|i| i.is_function())
    }

    /// All events, in declaration order.
    pub fn events(&self) -> impl Iterator<Item = &Arc<AbiItem>> {
        self.items.iter().filter(|i| i.is_event())
    }

    /// Every mapped item, in declaration order.
    pub fn items(&self) -> &[Arc<AbiItem>] {
        &self.items
    }

    /// Every key the method table answers to.
    pub fn method_keys(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

/// Builds an `AbiModel` from raw ABI entries.
pub struct AbiMapper;

impl AbiMapper {
    pub fn map(entries: &[AbiEntry]) -> Result<AbiModel, AbiError> {
        let mut model = AbiModel::default();

        for (position, entry) in entries.iter().enumerate() {
            let kind = entry.kind.unwrap_or(AbiItemKind::Function);
            match kind {
                AbiItemKind::Function => {
                    let item = Arc::new(map_function(entry, position)?);
                    register(&mut model.methods, &item);
                    model.items.push(item);
                }
                AbiItemKind::Event => {
                    let item = Arc::new(map_event(entry, position)?);
                    register(&mut model.events, &item);
                    model.items.push(item);
                }
                AbiItemKind::Constructor => {
                    let item = Arc::new(map_constructor(entry)?);
                    model
                        .methods
                        .entry(CONSTRUCTOR_KEY.to_string())
                        .or_insert_with(|| Arc::clone(&item));
                    if model.constructor.is_none() {
                        model.constructor = Some(Arc::clone(&item));
                    }
                    model.items.push(item);
                }
                // not callable through the binding layer
                AbiItemKind::Fallback | AbiItemKind::Receive | AbiItemKind::Error => {}
            }
        }

        Ok(model)
    }
}

/// Bare name: first wins. Full name and signature: always registered.
fn register(table: &mut HashMap<String, Arc<AbiItem>>, item: &Arc<AbiItem>) {
    table
        .entry(item.name.clone())
        .or_insert_with(|| Arc::clone(item));
    table.insert(item.full_name.clone(), Arc::clone(item));
    table.insert(item.signature.clone(), Arc::clone(item));
}

fn required_name(entry: &AbiEntry, kind: AbiItemKind, position: usize) -> Result<String, AbiError> {
    match entry.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(AbiError::MalformedAbi {
            reason: format!("{kind} entry #{position} has no name"),
        }),
    }
}

fn required_inputs(
    entry: &AbiEntry,
    name: &str,
    kind: AbiItemKind,
) -> Result<Vec<AbiParam>, AbiError> {
    entry.inputs.clone().ok_or_else(|| AbiError::MalformedAbi {
        reason: format!("{kind} '{name}' has no inputs"),
    })
}

/// `(name, full_name)`. A name that already carries its parameter list is
/// taken as the full name.
fn names(name: String, inputs: &[AbiParam]) -> Result<(String, String), AbiError> {
    if let Some(open) = name.find('(') {
        let bare = name[..open].to_string();
        return Ok((bare, name));
    }
    let full = format!("{name}({})", canonical_types(inputs)?.join(","));
    Ok((name, full))
}

fn resolve_types(params: &[AbiParam]) -> Result<Vec<DynSolType>, AbiError> {
    params.iter().map(AbiParam::sol_type).collect()
}

fn map_function(entry: &AbiEntry, position: usize) -> Result<AbiItem, AbiError> {
    let name = required_name(entry, AbiItemKind::Function, position)?;
    let inputs = required_inputs(entry, &name, AbiItemKind::Function)?;
    let outputs = entry.outputs.clone().unwrap_or_default();
    let (name, full_name) = names(name, &inputs)?;

    Ok(AbiItem {
        kind: AbiItemKind::Function,
        signature: function_signature(&full_name),
        input_types: resolve_types(&inputs)?,
        output_types: resolve_types(&outputs)?,
        name,
        full_name,
        inputs,
        outputs,
        constant: entry.is_constant(),
        payable: entry.is_payable(),
        anonymous: false,
    })
}

fn map_event(entry: &AbiEntry, position: usize) -> Result<AbiItem, AbiError> {
    let name = required_name(entry, AbiItemKind::Event, position)?;
    let inputs = required_inputs(entry, &name, AbiItemKind::Event)?;
    let (name, full_name) = names(name, &inputs)?;

    Ok(AbiItem {
        kind: AbiItemKind::Event,
        signature: event_signature(&full_name),
        input_types: resolve_types(&inputs)?,
        output_types: Vec::new(),
        name,
        full_name,
        inputs,
        outputs: Vec::new(),
        constant: false,
        payable: false,
        anonymous: entry.anonymous.unwrap_or(false),
    })
}

fn map_constructor(entry: &AbiEntry) -> Result<AbiItem, AbiError> {
    let inputs = entry.inputs.clone().unwrap_or_default();
    let full_name = format!("{CONSTRUCTOR_KEY}({})", canonical_types(&inputs)?.join(","));

    Ok(AbiItem {
        kind: AbiItemKind::Constructor,
        name: String::new(),
        full_name,
        signature: CONSTRUCTOR_KEY.to_string(),
        input_types: resolve_types(&inputs)?,
        output_types: Vec::new(),
        inputs,
        outputs: Vec::new(),
        constant: false,
        payable: entry.is_payable(),
        anonymous: false,
    })
}
