mod hash;
mod public_key;

pub use hash::{hash, native_contract_hash, Hash, Hashable, HASH_SIZE};
pub use public_key::{PublicKey, PUBLIC_KEY_SIZE};
