//! # chainweb3-abi
//!
//! Contract ABI handling for the ChainWeb3 client library.
//!
//! ## Implementation notes
//! - `AbiMapper` turns ABI JSON into an immutable `AbiModel` indexed by
//!   bare name, full name (`transfer(address,uint256)`) and signature hash
//! - Functions are identified by `keccak256(full_name)[..4]`, events by the
//!   full 32-byte hash, which nodes place in `topics[0]`
//! - Encoding and decoding go through `alloy-core`'s dynamic ABI types
//! - Decoded values keep ABI declaration order (`IndexMap`)

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod item;
pub mod mapper;
pub mod normalizer;
pub mod signature;
pub mod value;

pub use decoder::{
    decode_log, decode_method_return, decode_parameters, AllEventsLogDecoder, DecodedLog,
    EventLogDecoder, LogDecoder, RawLog, RawLogData,
};
pub use encoder::{encode_constructor, encode_event_filter, encode_method, encode_parameters, Topic};
pub use error::AbiError;
pub use item::{AbiEntry, AbiItem, AbiItemKind, AbiParam};
pub use mapper::{AbiMapper, AbiModel, CONSTRUCTOR_KEY};
pub use signature::{event_signature, function_signature, keccak256, sha3_hex};
pub use value::AbiValue;
