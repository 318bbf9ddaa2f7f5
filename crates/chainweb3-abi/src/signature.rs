//! Method and event signature derivation.
//!
//! The signature of a function is the first 4 bytes of the keccak256 hash of
//! its canonical name, e.g.:
//!   keccak256("transfer(address,uint256)")[..4] → 0xa9059cbb
//!
//! Events keep the full 32-byte hash, which is what nodes put in topics[0].

use tiny_keccak::{Hasher, Keccak};

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// keccak256 of a string, 0x-prefixed hex.
pub fn sha3_hex(s: &str) -> String {
    format!("0x{}", hex::encode(keccak256(s.as_bytes())))
}

/// 4-byte function selector of `"name(type1,type2,...)"`, 0x-prefixed.
pub fn function_signature(full_name: &str) -> String {
    let hash = keccak256(full_name.as_bytes());
    format!("0x{}", hex::encode(&hash[..4]))
}

/// 32-byte event topic of `"Name(type1,type2,...)"`, 0x-prefixed.
pub fn event_signature(full_name: &str) -> String {
    sha3_hex(full_name)
}

/// Normalize a lookup key that may be a bare hex signature.
///
/// `"a9059cbb"` and `"0xA9059CBB"` both become `"0xa9059cbb"`; anything
/// that is not a 4- or 32-byte hex string is returned unchanged.
pub fn normalize_signature_key(key: &str) -> String {
    let stripped = key.strip_prefix("0x").unwrap_or(key);
    let is_sig = (stripped.len() == 8 || stripped.len() == 64)
        && stripped.chars().all(|c| c.is_ascii_hexdigit());
    if is_sig {
        format!("0x{}", stripped.to_ascii_lowercase())
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_selector() {
        assert_eq!(function_signature("transfer(address,uint256)"), "0xa9059cbb");
    }

    #[test]
    fn balance_of_selector() {
        assert_eq!(function_signature("balanceOf(address)"), "0x70a08231");
    }

    #[test]
    fn erc20_transfer_topic() {
        assert_eq!(
            event_signature("Transfer(address,address,uint256)"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn uniswap_v3_swap_topic() {
        let sig = "Swap(address,address,int256,int256,uint160,uint128,int24)";
        assert_eq!(
            event_signature(sig),
            "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67"
        );
    }

    #[test]
    fn signature_keys_are_normalized() {
        assert_eq!(normalize_signature_key("A9059CBB"), "0xa9059cbb");
        assert_eq!(normalize_signature_key("0xa9059cbb"), "0xa9059cbb");
        assert_eq!(normalize_signature_key("transfer"), "transfer");
        assert_eq!(normalize_signature_key("deadbeef00"), "deadbeef00");
    }
}
