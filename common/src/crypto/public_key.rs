use crate::{
    crypto::{hash, Hash},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Error, Formatter};
use thiserror::Error;

// Compressed public key: one parity prefix byte followed by the 32-byte
// x coordinate
pub const PUBLIC_KEY_SIZE: usize = 33;

const PREFIX_EVEN: u8 = 0x02;
const PREFIX_ODD: u8 = 0x03;

#[derive(Debug, Error)]
pub enum PublicKeyError {
    #[error("Invalid public key length: {0}")]
    InvalidLength(usize),

    #[error("Invalid public key prefix: {0:#04x}")]
    InvalidPrefix(u8),
}

// A compressed public key as seen on the wire.
// Signature verification happens in the consensus layer, the execution core
// only ever validates the structure of a key and derives account identities
// from it.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PublicKeyError> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(PublicKeyError::InvalidLength(bytes.len()));
        }
        if bytes[0] != PREFIX_EVEN && bytes[0] != PREFIX_ODD {
            return Err(PublicKeyError::InvalidPrefix(bytes[0]));
        }
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(PublicKey(key))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    // Account identity under which balances and votes are stored
    pub fn to_account_hash(&self) -> Hash {
        hash(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Serializer for PublicKey {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes_ref(PUBLIC_KEY_SIZE)?;
        PublicKey::from_bytes(bytes).map_err(|_| ReaderError::InvalidValue)
    }

    fn size(&self) -> usize {
        PUBLIC_KEY_SIZE
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let hex = String::deserialize(deserializer)?;
        let decoded = hex::decode(hex).map_err(SerdeError::custom)?;
        PublicKey::from_bytes(&decoded).map_err(SerdeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_validation() {
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes[0] = PREFIX_EVEN;
        assert!(PublicKey::from_bytes(&bytes).is_ok());

        bytes[0] = 0x04;
        assert!(matches!(
            PublicKey::from_bytes(&bytes),
            Err(PublicKeyError::InvalidPrefix(0x04))
        ));

        assert!(matches!(
            PublicKey::from_bytes(&bytes[..32]),
            Err(PublicKeyError::InvalidLength(32))
        ));
    }

    #[test]
    fn test_account_hash_is_stable() {
        let mut bytes = [1u8; PUBLIC_KEY_SIZE];
        bytes[0] = PREFIX_ODD;
        let key = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(key.to_account_hash(), key.to_account_hash());
    }
}
