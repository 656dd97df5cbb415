mod attribute;

pub use attribute::Attribute;

use crate::{
    config::{MAX_SCRIPT_SIZE, MAX_TRANSACTION_ATTRIBUTES},
    crypto::{Hash, Hashable, PublicKey},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};

pub const TX_VERSION: u8 = 0;

// A transaction carries one script executed by the engine under the
// Application trigger. The declared gas limit is the full execution budget
// and is burned by the utility token's OnPersist hook whether or not the
// script halted.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Transaction {
    version: u8,
    // Replay protection, checked by the consensus layer
    nonce: u64,
    sender: PublicKey,
    gas_limit: u64,
    #[serde(with = "hex")]
    script: Vec<u8>,
    attributes: Vec<Attribute>,
}

impl Transaction {
    pub fn new(
        version: u8,
        nonce: u64,
        sender: PublicKey,
        gas_limit: u64,
        script: Vec<u8>,
        attributes: Vec<Attribute>,
    ) -> Self {
        Transaction {
            version,
            nonce,
            sender,
            gas_limit,
            script,
            attributes,
        }
    }

    #[inline]
    pub fn get_version(&self) -> u8 {
        self.version
    }

    #[inline]
    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    #[inline]
    pub fn get_sender(&self) -> &PublicKey {
        &self.sender
    }

    #[inline]
    pub fn get_gas_limit(&self) -> u64 {
        self.gas_limit
    }

    #[inline]
    pub fn get_script(&self) -> &[u8] {
        &self.script
    }

    #[inline]
    pub fn get_attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    // Identity of the entry script, compared against the native registry
    // before execution: a native contract is never a valid entry point
    pub fn script_hash(&self) -> Hash {
        crate::crypto::hash(&self.script)
    }
}

impl Serializer for Transaction {
    fn write(&self, writer: &mut Writer) {
        self.version.write(writer);
        self.nonce.write(writer);
        self.sender.write(writer);
        self.gas_limit.write(writer);
        self.script.write(writer);
        self.attributes.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Transaction, ReaderError> {
        let version = u8::read(reader)?;
        if version != TX_VERSION {
            return Err(ReaderError::InvalidValue);
        }
        let nonce = u64::read(reader)?;
        let sender = PublicKey::read(reader)?;
        let gas_limit = u64::read(reader)?;
        let script: Vec<u8> = Vec::read(reader)?;
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(ReaderError::InvalidSize);
        }
        let attributes: Vec<Attribute> = Vec::read(reader)?;
        if attributes.len() > MAX_TRANSACTION_ATTRIBUTES {
            return Err(ReaderError::InvalidSize);
        }
        Ok(Transaction {
            version,
            nonce,
            sender,
            gas_limit,
            script,
            attributes,
        })
    }

    fn size(&self) -> usize {
        self.version.size()
            + self.nonce.size()
            + self.sender.size()
            + self.gas_limit.size()
            + self.script.size()
            + self.attributes.size()
    }
}

impl Hashable for Transaction {}
