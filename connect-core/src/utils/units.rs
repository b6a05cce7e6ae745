//! Wei/ether and chain id conversions.

use crate::error::ConnectError;
use ethers::types::{U256, U64};

pub const WEI_PER_ETHER: f64 = 1e18;

/// Strip the `0x` prefix and reject anything that is not a bare run of
/// digits, so signs and empty quantities never reach the integer parsers.
fn split_radix(value: &str) -> Option<(&str, u32)> {
    let trimmed = value.trim();
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    Some((digits, radix))
}

/// Parse an integer wei amount, hex when `0x`-prefixed and decimal otherwise.
pub fn parse_wei(value: &str) -> Option<U256> {
    let (digits, radix) = split_radix(value)?;
    U256::from_str_radix(digits, radix).ok()
}

/// Convert a wei amount as returned by `eth_getBalance` to ether.
///
/// The exact integer is rounded to the nearest `f64` once, then divided.
pub fn parse_eth(value: &str) -> Result<f64, ConnectError> {
    parse_wei(value)
        .and_then(|wei| wei.to_string().parse::<f64>().ok())
        .map(|wei| wei / WEI_PER_ETHER)
        .ok_or_else(|| ConnectError::InvalidBalance {
            value: value.to_string(),
        })
}

/// Parse a chain id given as `0x`-prefixed hex or plain decimal.
pub fn parse_chain_id(value: &str) -> Result<u64, ConnectError> {
    split_radix(value)
        .and_then(|(digits, radix)| U64::from_str_radix(digits, radix).ok())
        .map(|id| id.as_u64())
        .ok_or_else(|| ConnectError::InvalidChainId {
            value: value.to_string(),
        })
}

/// Canonical hex form used on the wire (`137` -> `"0x89"`).
pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("{:#x}", chain_id)
}
