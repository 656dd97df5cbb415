// Consensus-relevant constants shared by every node implementation.
// Any change here is a hard fork.

// Domain separation prefix for native contract script hashes.
// A native contract is addressed by blake3(NATIVE_HASH_DOMAIN || name),
// never by bytecode (natives have none).
pub const NATIVE_HASH_DOMAIN: &[u8] = b"meridian.native.";

// Maximum width of a VM integer in two's complement bytes.
// Arithmetic producing a wider result is a fault, not a wrap.
pub const MAX_INTEGER_SIZE: usize = 32;

// Maximum nesting depth of a stack item tree accepted by the state codec.
// Walked during both encode and decode so a malicious script cannot
// persist an unbounded structure.
pub const MAX_ITEM_DEPTH: usize = 10;

// Maximum canonical encoded size of a single persisted value
pub const MAX_VALUE_SIZE: usize = 65_535;

// Maximum size of a single transaction script
pub const MAX_SCRIPT_SIZE: usize = 65_535;

// Maximum number of attributes carried by a transaction.
// No attribute usages are defined yet, the field is a forward-compatible
// extension point.
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;

// Governance token (MRD) - fixed supply, zero decimals
pub const GOVERNANCE_DECIMALS: u8 = 0;
pub const GOVERNANCE_TOTAL_SUPPLY: u64 = 100_000_000;

// Utility token (FUEL) - 8 decimals, minted over time
pub const UTILITY_DECIMALS: u8 = 8;
pub const COIN_VALUE: u64 = 100_000_000;

// FUEL minted to the genesis account at chain initialization
pub const GENESIS_UTILITY_SUPPLY: u64 = 30_000_000 * COIN_VALUE;

// FUEL base units accrued per governance unit per block held.
// Used by the governance contract to settle holder rewards on every
// balance change.
pub const UTILITY_GENERATION_PER_BLOCK: u64 = 5;

// Fixed FUEL subsidy minted to the block proposer on top of collected fees
pub const BLOCK_SUBSIDY: u64 = 2 * COIN_VALUE;
