use meridian_common::{
    block::BlockHeight,
    crypto::Hash,
    serializer::ReaderError,
    vm::CodecError,
};
use thiserror::Error;

use crate::core::storage::StorageError;

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),

    #[error("Wire format error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Invalid block height {got}, expected {expected}")]
    InvalidHeight { expected: BlockHeight, got: BlockHeight },

    #[error("Invalid previous hash {got}, expected {expected}")]
    InvalidPreviousHash { expected: Hash, got: Hash },

    // A lifecycle hook failed outside transaction scope. This is a
    // protocol-level inconsistency: the block cannot be applied and the
    // node stops accepting blocks until an operator intervenes.
    #[error("Orchestration failure in {contract}::{hook}: {reason}")]
    OrchestrationFailure {
        contract: &'static str,
        hook: &'static str,
        reason: String,
    },

    #[error("Block acceptance is halted after an orchestration failure")]
    Halted,
}
