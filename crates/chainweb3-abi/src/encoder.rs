//! Call, constructor and event-filter encoding.
//!
//! Converts `AbiValue` arguments into hex calldata against a mapped
//! `AbiItem`:
//!   function    → `signature ++ abi_encode_params(args)`
//!   constructor → `bytecode ++ abi_encode_params(args)`
//!   event       → topic list for `eth_subscribe("logs")` / `eth_getLogs`

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AbiError;
use crate::item::{AbiItem, AbiParam};
use crate::signature::keccak256;
use crate::value::{decode_hex, to_dyn_value, AbiValue};

/// One topic position of a log filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Topic {
    /// Match exactly this 32-byte value
    Single(String),
    /// Match any of these values
    OneOf(Vec<String>),
    /// Wildcard; serialized as `null`
    Any,
}

impl Topic {
    pub fn is_any(&self) -> bool {
        matches!(self, Topic::Any)
    }
}

/// ABI-encode `args` against the declared parameters, without any prefix.
pub fn encode_parameters(
    params: &[AbiParam],
    types: &[DynSolType],
    args: &[AbiValue],
) -> Result<Vec<u8>, AbiError> {
    let mut values = Vec::with_capacity(args.len());
    for (i, ((param, ty), arg)) in params.iter().zip(types).zip(args).enumerate() {
        let value = to_dyn_value(arg, ty).map_err(|reason| AbiError::InvalidValue {
            param: param.key(i),
            reason,
        })?;
        values.push(value);
    }
    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Encode by canonical type strings alone (`["uint256", "(address,bool)[]"]`).
pub fn encode_types(type_strings: &[&str], args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    if type_strings.len() != args.len() {
        return Err(AbiError::ArgumentCountMismatch {
            method: format!("({})", type_strings.join(",")),
            expected: type_strings.len(),
            got: args.len(),
        });
    }
    let params: Vec<AbiParam> = type_strings
        .iter()
        .map(|ty| AbiParam::new("", *ty))
        .collect();
    let types = params
        .iter()
        .map(AbiParam::sol_type)
        .collect::<Result<Vec<_>, _>>()?;
    encode_parameters(&params, &types, args)
}

fn check_count(item: &AbiItem, args: &[AbiValue]) -> Result<(), AbiError> {
    if item.inputs.len() != args.len() {
        return Err(AbiError::ArgumentCountMismatch {
            method: item.full_name.clone(),
            expected: item.inputs.len(),
            got: args.len(),
        });
    }
    Ok(())
}

/// `0x` + 4-byte selector + encoded arguments.
pub fn encode_method(item: &AbiItem, args: &[AbiValue]) -> Result<String, AbiError> {
    check_count(item, args)?;
    let encoded = encode_parameters(&item.inputs, &item.input_types, args)?;
    let selector = item.signature.strip_prefix("0x").unwrap_or(&item.signature);
    Ok(format!("0x{selector}{}", hex::encode(encoded)))
}

/// Deployment data: bytecode followed by the encoded constructor arguments.
///
/// A contract without a constructor entry takes no arguments.
pub fn encode_constructor(
    constructor: Option<&AbiItem>,
    bytecode: &str,
    args: &[AbiValue],
) -> Result<String, AbiError> {
    let code = bytecode.strip_prefix("0x").unwrap_or(bytecode);
    let encoded = match constructor {
        Some(item) => {
            check_count(item, args)?;
            encode_parameters(&item.inputs, &item.input_types, args)?
        }
        None if args.is_empty() => Vec::new(),
        None => {
            return Err(AbiError::ArgumentCountMismatch {
                method: "constructor()".into(),
                expected: 0,
                got: args.len(),
            })
        }
    };
    Ok(format!("0x{code}{}", hex::encode(encoded)))
}

/// Build the topic list for an event filter.
///
/// Slot 0 carries the event signature unless the event is anonymous. Each
/// indexed input then gets one slot in declaration order: `Any` when the
/// filter has no value (or `Null`) under the input's key, `OneOf` when the
/// value is an array, `Single` otherwise. Indexed array and tuple inputs
/// can therefore never be matched by value.
pub fn encode_event_filter(
    item: &AbiItem,
    filter: &IndexMap<String, AbiValue>,
) -> Result<Vec<Topic>, AbiError> {
    let mut topics = Vec::new();
    if !item.anonymous {
        topics.push(Topic::Single(item.signature.clone()));
    }

    for (position, (param, ty)) in item.inputs.iter().zip(&item.input_types).enumerate() {
        if !param.indexed {
            continue;
        }
        let topic = match filter.get(&param.key(position)) {
            None | Some(AbiValue::Null) => Topic::Any,
            Some(AbiValue::Array(options)) => Topic::OneOf(
                options
                    .iter()
                    .map(|v| encode_topic(param, ty, v))
                    .collect::<Result<_, _>>()?,
            ),
            Some(value) => Topic::Single(encode_topic(param, ty, value)?),
        };
        topics.push(topic);
    }

    Ok(topics)
}

/// Encode one indexed value as a 32-byte topic.
///
/// `string` and `bytes` are hashed the way the node hashes them. Arrays and
/// tuples cannot be used as filter values.
pub fn encode_topic(param: &AbiParam, ty: &DynSolType, value: &AbiValue) -> Result<String, AbiError> {
    let invalid = |reason: String| AbiError::InvalidValue {
        param: param.name.clone(),
        reason,
    };

    let word: [u8; 32] = match ty {
        DynSolType::String => match value {
            AbiValue::Str(s) => keccak256(s.as_bytes()),
            other => return Err(invalid(format!("expected a string, got {other}"))),
        },
        DynSolType::Bytes => match value {
            AbiValue::Bytes(b) => keccak256(b),
            AbiValue::Str(s) => keccak256(&decode_hex(s).map_err(invalid)?),
            other => return Err(invalid(format!("expected bytes, got {other}"))),
        },
        DynSolType::Array(_) | DynSolType::FixedArray(..) | DynSolType::Tuple(_) => {
            return Err(invalid(format!(
                "indexed {} values cannot be filtered on",
                ty.sol_type_name()
            )))
        }
        _ => {
            let encoded = to_dyn_value(value, ty).map_err(invalid)?.abi_encode();
            let mut word = [0u8; 32];
            if encoded.len() != 32 {
                return Err(invalid(format!("{} bytes do not fit a topic", encoded.len())));
            }
            word.copy_from_slice(&encoded);
            word
        }
    };

    Ok(format!("0x{}", hex::encode(word)))
}
