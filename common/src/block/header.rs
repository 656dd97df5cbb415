use crate::{
    block::BlockHeight,
    crypto::{Hash, Hashable, PublicKey},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BlockHeader {
    version: u8,
    height: BlockHeight,
    // Milliseconds since the UNIX epoch as agreed by consensus, never read
    // from the local clock during execution
    timestamp: u64,
    previous_hash: Hash,
    // Validator that proposed this block, receives the block subsidy and
    // the collected fees
    proposer: PublicKey,
}

impl BlockHeader {
    pub fn new(
        version: u8,
        height: BlockHeight,
        timestamp: u64,
        previous_hash: Hash,
        proposer: PublicKey,
    ) -> Self {
        BlockHeader {
            version,
            height,
            timestamp,
            previous_hash,
            proposer,
        }
    }

    #[inline]
    pub fn get_version(&self) -> u8 {
        self.version
    }

    #[inline]
    pub fn get_height(&self) -> BlockHeight {
        self.height
    }

    #[inline]
    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    #[inline]
    pub fn get_previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    #[inline]
    pub fn get_proposer(&self) -> &PublicKey {
        &self.proposer
    }
}

impl Serializer for BlockHeader {
    fn write(&self, writer: &mut Writer) {
        self.version.write(writer);
        self.height.write(writer);
        self.timestamp.write(writer);
        self.previous_hash.write(writer);
        self.proposer.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<BlockHeader, ReaderError> {
        let version = u8::read(reader)?;
        let height = BlockHeight::read(reader)?;
        let timestamp = u64::read(reader)?;
        let previous_hash = Hash::read(reader)?;
        let proposer = PublicKey::read(reader)?;
        Ok(BlockHeader {
            version,
            height,
            timestamp,
            previous_hash,
            proposer,
        })
    }

    fn size(&self) -> usize {
        self.version.size()
            + self.height.size()
            + self.timestamp.size()
            + self.previous_hash.size()
            + self.proposer.size()
    }
}

impl Hashable for BlockHeader {}
