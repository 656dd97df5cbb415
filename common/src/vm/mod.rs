pub mod codec;
mod stack_item;

pub use codec::{decode, encode, CodecError};
pub use stack_item::{ItemError, MapKey, StackItem, StackItemType};
