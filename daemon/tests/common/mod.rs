#![allow(dead_code)]

use meridian_common::{
    block::{Block, BlockHeader},
    contract::CallFlags,
    crypto::{Hash, PublicKey, PUBLIC_KEY_SIZE},
    transaction::{Transaction, TX_VERSION},
};
use meridian_daemon::core::{
    blockchain::Blockchain,
    native::{governance, utility},
    storage::MemoryProvider,
    vm::ScriptBuilder,
};
use num_bigint::BigInt;

pub const GENESIS_FILL: u8 = 0xAA;
pub const PROPOSER_FILL: u8 = 0xBB;

pub fn test_key(fill: u8) -> PublicKey {
    let mut bytes = [fill; PUBLIC_KEY_SIZE];
    bytes[0] = 0x02;
    PublicKey::from_bytes(&bytes).expect("valid test key")
}

pub fn genesis_key() -> PublicKey {
    test_key(GENESIS_FILL)
}

pub fn proposer_key() -> PublicKey {
    test_key(PROPOSER_FILL)
}

pub fn account(key: &PublicKey) -> Hash {
    key.to_account_hash()
}

pub fn new_chain() -> Blockchain<MemoryProvider> {
    Blockchain::new(MemoryProvider::new(), &genesis_key()).expect("genesis must succeed")
}

pub fn make_block(chain: &Blockchain<MemoryProvider>, transactions: Vec<Transaction>) -> Block {
    let header = BlockHeader::new(
        0,
        chain.height() + 1,
        1_700_000_000_000 + chain.height(),
        chain.last_hash().clone(),
        proposer_key(),
    );
    Block::new(header, transactions)
}

// Script invoking a governance-token transfer out of `sender`'s account
pub fn governance_transfer_script(sender: &PublicKey, to: &Hash, amount: i64) -> Vec<u8> {
    let from = account(sender);
    let mut builder = ScriptBuilder::new();
    builder.call_contract(
        &governance::GOVERNANCE,
        "transfer",
        |builder| {
            builder.push_data(from.as_bytes());
            builder.push_data(to.as_bytes());
            builder.push_int(amount);
            3
        },
        CallFlags::ALL,
    );
    builder.to_bytes()
}

pub fn balance_of_script(contract: &Hash, account: &Hash) -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder.call_contract(
        contract,
        "balanceOf",
        |builder| {
            builder.push_data(account.as_bytes());
            1
        },
        CallFlags::ALL,
    );
    builder.to_bytes()
}

pub fn transfer_tx(
    sender: &PublicKey,
    to: &Hash,
    amount: i64,
    gas_limit: u64,
    nonce: u64,
) -> Transaction {
    Transaction::new(
        TX_VERSION,
        nonce,
        sender.clone(),
        gas_limit,
        governance_transfer_script(sender, to, amount),
        Vec::new(),
    )
}

// Balances queried through the read-only invocation surface
pub fn governance_balance(chain: &Blockchain<MemoryProvider>, account: &Hash) -> BigInt {
    query_balance(chain, &governance::GOVERNANCE, account)
}

pub fn utility_balance(chain: &Blockchain<MemoryProvider>, account: &Hash) -> BigInt {
    query_balance(chain, &utility::UTILITY, account)
}

fn query_balance(chain: &Blockchain<MemoryProvider>, contract: &Hash, account: &Hash) -> BigInt {
    let result = chain
        .invoke_read_only(balance_of_script(contract, account), 10_000_000)
        .expect("read-only invocation must run");
    result.result_stack[0]
        .try_integer()
        .expect("balance must be an integer")
}
