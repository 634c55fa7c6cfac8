//! 20-byte account addresses with EIP-55 checksummed text form

use crate::crypto::keccak256;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_SIZE: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_SIZE]);

    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidAddress(format!(
                "Address must be {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Address(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_SIZE]
    }

    /// Mixed-case hex form where each letter is uppercased when the matching
    /// nibble of keccak256(lowercase hex) is >= 8.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| LedgerError::InvalidAddress(format!("{} is missing the 0x prefix", s)))?;

        if digits.len() != ADDRESS_SIZE * 2 {
            return Err(LedgerError::InvalidAddress(format!(
                "{} must have {} hex digits, got {}",
                s,
                ADDRESS_SIZE * 2,
                digits.len()
            )));
        }

        let mut bytes = [0u8; ADDRESS_SIZE];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", s, e)))?;
        let address = Address(bytes);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *digits {
            return Err(LedgerError::InvalidAddress(format!("{} has a bad checksum", s)));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Anything an operation can resolve to an [`Address`]: typed addresses and
/// their text form. Resolution of text fails with `InvalidAddress`.
pub trait AddressLike {
    fn to_address(&self) -> Result<Address>;
}

impl AddressLike for Address {
    fn to_address(&self) -> Result<Address> {
        Ok(*self)
    }
}

impl AddressLike for str {
    fn to_address(&self) -> Result<Address> {
        self.parse()
    }
}

impl AddressLike for String {
    fn to_address(&self) -> Result<Address> {
        self.parse()
    }
}

impl<T: AddressLike + ?Sized> AddressLike for &T {
    fn to_address(&self) -> Result<Address> {
        (**self).to_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from EIP-55.
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_roundtrip() {
        for s in CHECKSUMMED {
            let addr: Address = s.parse().unwrap();
            assert_eq!(addr.to_string(), s);
        }
    }

    #[test]
    fn test_lowercase_and_uppercase_accepted() {
        let lower = CHECKSUMMED[0].to_lowercase();
        let upper = format!("0x{}", CHECKSUMMED[0][2..].to_uppercase());
        let a: Address = lower.parse().unwrap();
        let b: Address = upper.parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut broken = CHECKSUMMED[0].to_string();
        // flip the case of one letter
        broken.replace_range(3..4, "A");
        let result: Result<Address> = broken.parse();
        assert!(matches!(result, Err(LedgerError::InvalidAddress(msg)) if msg.contains("checksum")));
    }

    #[test]
    fn test_malformed_rejected() {
        for bad in ["", "0x", "5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed", "0x1234", "0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"] {
            assert!(
                matches!(bad.parse::<Address>(), Err(LedgerError::InvalidAddress(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_serde_uses_checksum_text() {
        let addr: Address = CHECKSUMMED[1].parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[1]));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_address_like() {
        let addr: Address = CHECKSUMMED[2].parse().unwrap();
        assert_eq!(CHECKSUMMED[2].to_address().unwrap(), addr);
        assert_eq!(addr.to_address().unwrap(), addr);
        assert_eq!((&addr).to_address().unwrap(), addr);
        assert!("nope".to_address().is_err());
    }
}
