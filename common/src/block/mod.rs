mod header;

pub use header::BlockHeader;

use crate::{
    crypto::{Hash, Hashable},
    serializer::{Reader, ReaderError, Serializer, Writer},
    transaction::Transaction,
};
use serde::{Deserialize, Serialize};

// Height of a block in the finalized chain, genesis is height zero
pub type BlockHeight = u64;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Block {
            header,
            transactions,
        }
    }

    #[inline]
    pub fn get_header(&self) -> &BlockHeader {
        &self.header
    }

    #[inline]
    pub fn get_height(&self) -> BlockHeight {
        self.header.get_height()
    }

    #[inline]
    pub fn get_transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    // A block is identified by its header hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

impl Serializer for Block {
    fn write(&self, writer: &mut Writer) {
        self.header.write(writer);
        self.transactions.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Block, ReaderError> {
        let header = BlockHeader::read(reader)?;
        let transactions = Vec::read(reader)?;
        Ok(Block {
            header,
            transactions,
        })
    }

    fn size(&self) -> usize {
        self.header.size() + self.transactions.size()
    }
}
