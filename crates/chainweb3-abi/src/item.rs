//! ABI entries: the raw JSON shape and the validated `AbiItem`.

use alloy_core::dyn_abi::DynSolType;
use serde::{Deserialize, Serialize};

use crate::error::AbiError;

/// Kind of an ABI entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiItemKind {
    Function,
    Event,
    Constructor,
    Fallback,
    Receive,
    Error,
}

impl std::fmt::Display for AbiItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbiItemKind::Function => "function",
            AbiItemKind::Event => "event",
            AbiItemKind::Constructor => "constructor",
            AbiItemKind::Fallback => "fallback",
            AbiItemKind::Receive => "receive",
            AbiItemKind::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One typed input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Events only: the value travels in a topic instead of `data`
    #[serde(default)]
    pub indexed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<AbiParam>>,
    #[serde(
        default,
        rename = "internalType",
        skip_serializing_if = "Option::is_none"
    )]
    pub internal_type: Option<String>,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            indexed: false,
            components: None,
            internal_type: None,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Canonical type string: tuples are expanded to `(t1,t2)` with any
    /// array suffix kept, e.g. `tuple[]` → `(uint256,address)[]`.
    pub fn canonical_type(&self) -> Result<String, AbiError> {
        match &self.components {
            Some(components) => {
                if !self.ty.starts_with("tuple") {
                    return Err(AbiError::MalformedAbi {
                        reason: format!(
                            "parameter '{}' has components but type '{}' is not a tuple",
                            self.name, self.ty
                        ),
                    });
                }
                let suffix = self.ty.find('[').map(|i| &self.ty[i..]).unwrap_or("");
                let inner = canonical_types(components)?;
                Ok(format!("({}){suffix}", inner.join(",")))
            }
            None => {
                if self.ty.starts_with("tuple") {
                    return Err(AbiError::MalformedAbi {
                        reason: format!("tuple parameter '{}' has no components", self.name),
                    });
                }
                Ok(self.ty.clone())
            }
        }
    }

    /// Resolve to alloy's dynamic type.
    pub fn sol_type(&self) -> Result<DynSolType, AbiError> {
        let canonical = self.canonical_type()?;
        DynSolType::parse(&canonical).map_err(|e| AbiError::MalformedAbi {
            reason: format!("unsupported type '{canonical}': {e}"),
        })
    }

    /// Key under which a decoded value is reported: the name, or the
    /// position when the parameter is unnamed.
    pub fn key(&self, position: usize) -> String {
        if self.name.is_empty() {
            position.to_string()
        } else {
            self.name.clone()
        }
    }

    /// Reference types are hashed when indexed; their topic cannot be
    /// decoded back to the original value.
    pub fn is_hashed_when_indexed(&self) -> bool {
        self.ty == "string" || self.ty == "bytes" || self.ty.ends_with(']') || self.ty.starts_with("tuple")
    }

    /// The element parameter of an array parameter (`uint8[2][]` → `uint8[2]`).
    pub(crate) fn array_element(&self) -> AbiParam {
        let ty = match self.ty.rfind('[') {
            Some(i) => self.ty[..i].to_string(),
            None => self.ty.clone(),
        };
        AbiParam {
            ty,
            ..self.clone()
        }
    }
}

/// Canonical type strings for an ordered parameter list.
pub fn canonical_types(params: &[AbiParam]) -> Result<Vec<String>, AbiError> {
    params.iter().map(AbiParam::canonical_type).collect()
}

/// The raw JSON shape of one ABI entry. Every field is optional here so
/// that missing fields surface as `MalformedAbi` rather than serde noise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AbiItemKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<AbiParam>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<AbiParam>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

impl AbiEntry {
    /// `view`/`pure` → constant, falling back to the legacy `constant` flag.
    pub fn is_constant(&self) -> bool {
        matches!(self.state_mutability.as_deref(), Some("view") | Some("pure"))
            || self.constant.unwrap_or(false)
    }

    /// `payable` → payable, falling back to the legacy `payable` flag.
    pub fn is_payable(&self) -> bool {
        self.state_mutability.as_deref() == Some("payable") || self.payable.unwrap_or(false)
    }
}

/// A validated ABI entry with its derived name and signature.
///
/// Built once by the mapper and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AbiItem {
    pub kind: AbiItemKind,
    /// Plain name; empty for the constructor
    pub name: String,
    /// `name(type1,type2,...)`
    pub full_name: String,
    /// 4-byte selector (functions), 32-byte topic (events) or `"constructor"`
    pub signature: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub constant: bool,
    pub payable: bool,
    pub anonymous: bool,
    pub(crate) input_types: Vec<DynSolType>,
    pub(crate) output_types: Vec<DynSolType>,
}

impl AbiItem {
    /// Implicit `constructor()` of a contract whose ABI declares none.
    pub fn default_constructor() -> Self {
        Self {
            kind: AbiItemKind::Constructor,
            name: String::new(),
            full_name: "constructor()".to_string(),
            signature: "constructor".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            constant: false,
            payable: false,
            anonymous: false,
            input_types: Vec::new(),
            output_types: Vec::new(),
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == AbiItemKind::Function
    }

    pub fn is_event(&self) -> bool {
        self.kind == AbiItemKind::Event
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == AbiItemKind::Constructor
    }

    pub fn input_types(&self) -> &[DynSolType] {
        &self.input_types
    }

    pub fn output_types(&self) -> &[DynSolType] {
        &self.output_types
    }

    /// Indexed event inputs, in declaration order.
    pub fn indexed_inputs(&self) -> impl Iterator<Item = &AbiParam> {
        self.inputs.iter().filter(|p| p.indexed)
    }

    /// Non-indexed event inputs, in declaration order.
    pub fn data_inputs(&self) -> impl Iterator<Item = &AbiParam> {
        self.inputs.iter().filter(|p| !p.indexed)
    }
}
