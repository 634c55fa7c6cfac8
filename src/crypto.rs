//! Cryptographic primitives for devledger

use crate::address::Address;
use crate::error::{LedgerError, Result};
use bip32::{DerivationPath, XPrv};
use bip39::Mnemonic;
use once_cell::sync::Lazy;
use secp256k1::{constants::SECRET_KEY_SIZE, All, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub type Hash32 = [u8; 32];

pub fn keccak256(data: impl AsRef<[u8]>) -> Hash32 {
    Keccak256::digest(data.as_ref()).into()
}

/// 32-byte hash used for transaction and block identifiers, shown as 0x-hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct H256(pub Hash32);

impl H256 {
    pub const ZERO: H256 = H256([0u8; 32]);

    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }
}

impl From<Hash32> for H256 {
    fn from(bytes: Hash32) -> Self {
        H256(bytes)
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256(0x{})", hex::encode(self.0))
    }
}

impl FromStr for H256 {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid 32-byte hash {}: {}", s, e)))?;
        Ok(H256(bytes))
    }
}

impl Serialize for H256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                LedgerError::Crypto(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                LedgerError::Crypto(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Last 20 bytes of keccak256 over the uncompressed public key, without
    /// its 0x04 prefix byte.
    pub fn address(&self) -> Address {
        let uncompressed = self.public_key.serialize_uncompressed();
        let digest = keccak256(&uncompressed[1..]);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Address::new(bytes)
    }

    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.secret_key.secret_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// A pre-funded development account.
#[derive(Debug, Clone)]
pub struct DevAccount {
    pub index: u32,
    pub address: Address,
    pub keypair: KeyPair,
}

/// Derives `count` accounts at `<base_path>/<index>` from a BIP-39 mnemonic
/// with an empty passphrase.
pub fn derive_dev_accounts(mnemonic: &str, base_path: &str, count: u32) -> Result<Vec<DevAccount>> {
    let mnemonic = Mnemonic::parse_normalized(mnemonic)
        .map_err(|e| LedgerError::Crypto(format!("Invalid mnemonic: {}", e)))?;
    let seed = mnemonic.to_seed("");
    let base_path = base_path.trim_end_matches('/');

    (0..count)
        .map(|index| -> Result<DevAccount> {
            let path: DerivationPath = format!("{}/{}", base_path, index)
                .parse()
                .map_err(|e| LedgerError::Crypto(format!("Invalid derivation path {}: {}", base_path, e)))?;
            let xprv = XPrv::derive_from_path(seed, &path)
                .map_err(|e| LedgerError::Crypto(format!("Key derivation failed: {}", e)))?;
            let keypair = KeyPair::from_secret_bytes(&xprv.to_bytes())?;
            Ok(DevAccount {
                index,
                address: keypair.address(),
                keypair,
            })
        })
        .collect()
}

/// Address of a contract created by `deployer` with the given nonce:
/// keccak256(rlp([deployer, nonce]))[12..].
pub fn contract_address(deployer: &Address, nonce: u64) -> Address {
    let nonce_rlp = rlp_encode_u64(nonce);
    let payload_len = 1 + deployer.as_bytes().len() + nonce_rlp.len();

    let mut encoded = Vec::with_capacity(1 + payload_len);
    // every payload here is shorter than 56 bytes, so the short list form applies
    encoded.push(0xc0 + payload_len as u8);
    encoded.push(0x80 + deployer.as_bytes().len() as u8);
    encoded.extend_from_slice(deployer.as_bytes());
    encoded.extend_from_slice(&nonce_rlp);

    let digest = keccak256(&encoded);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

fn rlp_encode_u64(value: u64) -> Vec<u8> {
    match value {
        0 => vec![0x80],
        1..=0x7f => vec![value as u8],
        _ => {
            let be = value.to_be_bytes();
            let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
            let mut out = vec![0x80 + (be.len() - first) as u8];
            out.extend_from_slice(&be[first..]);
            out
        }
    }
}
