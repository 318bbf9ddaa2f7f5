//! Address validation.
//!
//! A 20-byte hex address is accepted when it is all lower case, all upper
//! case, or mixed case with a valid EIP-55 checksum. Accepted addresses are
//! stored lower-cased with a `0x` prefix.

use alloy_primitives::Address;

use crate::error::ContractError;

/// Validate `address` and return it lower-cased.
pub fn check_address(address: &str) -> Result<String, ContractError> {
    let invalid = || ContractError::InvalidAddress {
        address: address.to_string(),
    };
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let all_lower = !hex.chars().any(|c| c.is_ascii_uppercase());
    let all_upper = !hex.chars().any(|c| c.is_ascii_lowercase());
    if !all_lower && !all_upper {
        Address::parse_checksummed(format!("0x{hex}"), None).map_err(|_| invalid())?;
    }
    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

/// EIP-55 checksummed form of a valid address.
pub fn to_checksum_address(address: &str) -> Result<String, ContractError> {
    let lower = check_address(address)?;
    let parsed: Address = lower.parse().map_err(|_| ContractError::InvalidAddress {
        address: address.to_string(),
    })?;
    Ok(parsed.to_checksum(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    #[test]
    fn checksummed_is_accepted_and_lowered() {
        assert_eq!(
            check_address(USDT).unwrap(),
            "0xdac17f958d2ee523a2206206994597c13d831ec7"
        );
    }

    #[test]
    fn single_case_skips_checksum() {
        assert!(check_address("0xDAC17F958D2EE523A2206206994597C13D831EC7").is_ok());
        assert!(check_address("dac17f958d2ee523a2206206994597c13d831ec7").is_ok());
    }

    #[test]
    fn bad_checksum_rejected() {
        let broken = USDT.replace("dAC", "DaC");
        assert!(matches!(
            check_address(&broken),
            Err(ContractError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(check_address("0xabc").is_err());
        assert!(check_address(&format!("0x{}", "z".repeat(40))).is_err());
    }

    #[test]
    fn checksum_roundtrip() {
        let lower = USDT.to_lowercase();
        assert_eq!(to_checksum_address(&lower).unwrap(), USDT);
    }
}
