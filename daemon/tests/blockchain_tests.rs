mod common;

use common::*;
use meridian_common::{
    account::GovernanceBalance,
    config::{BLOCK_SUBSIDY, GENESIS_UTILITY_SUPPLY, GOVERNANCE_TOTAL_SUPPLY, UTILITY_GENERATION_PER_BLOCK},
    contract::CallFlags,
    crypto::Hash,
    transaction::{Transaction, TX_VERSION},
};
use meridian_daemon::core::{
    blockchain::Blockchain,
    error::BlockchainError,
    native::governance,
    storage::{MemoryProvider, SledProvider, StorageProvider},
    vm::{ScriptBuilder, VmState},
};
use num_bigint::BigInt;

const TX_GAS: u64 = 1_000_000;

// Reward accrued by the genesis holder over one block
fn full_supply_reward(blocks: u64) -> BigInt {
    BigInt::from(GOVERNANCE_TOTAL_SUPPLY) * BigInt::from(blocks) * BigInt::from(UTILITY_GENERATION_PER_BLOCK)
}

// The persisted governance balance record of an account, straight from the
// provider bytes
fn stored_governance_record(
    chain: &Blockchain<MemoryProvider>,
    account: &Hash,
) -> Option<(Vec<u8>, GovernanceBalance)> {
    let entries = chain.storage().entries().expect("entries");
    for (key, value) in entries {
        if key.starts_with(governance::GOVERNANCE.as_bytes()) && key.ends_with(account.as_bytes())
        {
            let state = GovernanceBalance::from_bytes(&value).expect("decodable record");
            return Some((value, state));
        }
    }
    None
}

#[test]
fn test_genesis_state() {
    let chain = new_chain();
    assert_eq!(chain.height(), 0);
    assert_eq!(
        governance_balance(&chain, &account(&genesis_key())),
        BigInt::from(GOVERNANCE_TOTAL_SUPPLY)
    );
    assert_eq!(
        utility_balance(&chain, &account(&genesis_key())),
        BigInt::from(GENESIS_UTILITY_SUPPLY)
    );
}

#[test]
fn test_transfer_in_block() {
    let mut chain = new_chain();
    let recipient = account(&test_key(0xCC));

    let block = make_block(&chain, vec![transfer_tx(&genesis_key(), &recipient, 1000, TX_GAS, 1)]);
    let executions = chain.process_block(&block).expect("block must apply");

    assert_eq!(chain.height(), 1);
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].get_vm_state(), VmState::Halt);
    assert!(executions[0].get_result_stack()[0]
        .equals(&meridian_common::vm::StackItem::Boolean(true)));
    assert!(executions[0].get_gas_consumed() > 0);

    // governance balances moved
    assert_eq!(governance_balance(&chain, &recipient), BigInt::from(1000));
    assert_eq!(
        governance_balance(&chain, &account(&genesis_key())),
        BigInt::from(GOVERNANCE_TOTAL_SUPPLY - 1000)
    );

    // the sender paid its declared gas and collected one block of reward
    assert_eq!(
        utility_balance(&chain, &account(&genesis_key())),
        BigInt::from(GENESIS_UTILITY_SUPPLY) - BigInt::from(TX_GAS) + full_supply_reward(1)
    );

    // the proposer collected the fees plus the block subsidy
    assert_eq!(
        utility_balance(&chain, &account(&proposer_key())),
        BigInt::from(TX_GAS) + BigInt::from(BLOCK_SUBSIDY)
    );
}

// Two transactions fund the same previously unknown address. Whatever the
// order, the final balance is the arithmetic sum and the persisted record
// bytes are identical on independently seeded chains.
#[test]
fn test_transfer_order_independence() {
    let recipient = account(&test_key(0xCC));

    let tx_a = transfer_tx(&genesis_key(), &recipient, 10, TX_GAS, 1);
    let tx_b = transfer_tx(&genesis_key(), &recipient, 20, TX_GAS, 2);

    let mut chain_ab = new_chain();
    let block = make_block(&chain_ab, vec![tx_a.clone(), tx_b.clone()]);
    chain_ab.process_block(&block).expect("block must apply");

    let mut chain_ba = new_chain();
    let block = make_block(&chain_ba, vec![tx_b, tx_a]);
    chain_ba.process_block(&block).expect("block must apply");

    assert_eq!(governance_balance(&chain_ab, &recipient), BigInt::from(30));
    assert_eq!(governance_balance(&chain_ba, &recipient), BigInt::from(30));

    let (bytes_ab, state_ab) =
        stored_governance_record(&chain_ab, &recipient).expect("record must exist");
    let (bytes_ba, state_ba) =
        stored_governance_record(&chain_ba, &recipient).expect("record must exist");
    assert_eq!(state_ab, state_ba);
    assert_eq!(bytes_ab, bytes_ba);
}

// The same block against two identically-initialized chains produces
// identical storage contents and identical per-transaction states
#[test]
fn test_deterministic_block_application() {
    let recipient = account(&test_key(0xCC));
    let txs = vec![
        transfer_tx(&genesis_key(), &recipient, 5, TX_GAS, 1),
        transfer_tx(&genesis_key(), &recipient, 7, TX_GAS, 2),
    ];

    let mut chain_one = new_chain();
    let mut chain_two = new_chain();
    let block = make_block(&chain_one, txs);

    let exec_one = chain_one.process_block(&block).expect("block must apply");
    let exec_two = chain_two.process_block(&block).expect("block must apply");

    let states_one: Vec<_> = exec_one.iter().map(|e| e.get_vm_state()).collect();
    let states_two: Vec<_> = exec_two.iter().map(|e| e.get_vm_state()).collect();
    assert_eq!(states_one, states_two);

    assert_eq!(
        chain_one.storage().entries().expect("entries"),
        chain_two.storage().entries().expect("entries")
    );
}

// A transaction whose entry script hash equals a native contract's script
// hash faults, regardless of arguments
#[test]
fn test_native_entry_script_prohibited() {
    let mut chain = new_chain();
    // blake3 of these exact bytes IS the governance script hash
    let script = b"meridian.native.Governance".to_vec();
    let tx = Transaction::new(TX_VERSION, 1, test_key(0xDD), 0, script, Vec::new());

    let block = make_block(&chain, vec![tx]);
    let executions = chain.process_block(&block).expect("block still applies");

    assert_eq!(executions[0].get_vm_state(), VmState::Fault);
    assert!(executions[0]
        .get_diagnostic()
        .expect("diagnostic")
        .contains("entry script"));
}

// A transaction funded below a native method's price faults before any of
// that method's storage mutations become observable
#[test]
fn test_gas_monotonicity() {
    let mut chain = new_chain();
    let recipient = account(&test_key(0xCC));

    // far below the transfer price
    let tx = transfer_tx(&genesis_key(), &recipient, 1000, 1_000, 1);
    let block = make_block(&chain, vec![tx]);
    let executions = chain.process_block(&block).expect("block still applies");

    assert_eq!(executions[0].get_vm_state(), VmState::Fault);
    assert!(executions[0].get_result_stack().is_empty());

    // no partial effect of the faulted transfer
    assert_eq!(governance_balance(&chain, &recipient), BigInt::from(0));
    assert!(stored_governance_record(&chain, &recipient).is_none());
    assert_eq!(
        governance_balance(&chain, &account(&genesis_key())),
        BigInt::from(GOVERNANCE_TOTAL_SUPPLY)
    );

    // the declared gas is burned anyway
    assert_eq!(
        utility_balance(&chain, &account(&genesis_key())),
        BigInt::from(GENESIS_UTILITY_SUPPLY) - BigInt::from(1_000u32)
    );
}

// UtilityToken's PostPersist pays the proposer recorded by
// GovernanceToken's OnPersist: registration order makes the value visible
#[test]
fn test_hook_ordering_pays_proposer() {
    let mut chain = new_chain();
    let block = make_block(&chain, Vec::new());
    chain.process_block(&block).expect("empty block applies");

    assert_eq!(
        utility_balance(&chain, &account(&proposer_key())),
        BigInt::from(BLOCK_SUBSIDY)
    );

    let block = make_block(&chain, Vec::new());
    chain.process_block(&block).expect("empty block applies");
    assert_eq!(
        utility_balance(&chain, &account(&proposer_key())),
        BigInt::from(2 * BLOCK_SUBSIDY)
    );
}

// A lifecycle hook failure is fatal: the block does not apply and the
// chain accepts nothing afterwards
#[test]
fn test_orchestration_failure_halts_chain() {
    let mut chain = new_chain();
    // a sender with no utility balance cannot pay the fee burn in
    // OnPersist, which is a protocol-level inconsistency
    let tx = Transaction::new(TX_VERSION, 1, test_key(0xEE), 5_000, Vec::new(), Vec::new());
    let block = make_block(&chain, vec![tx]);

    let result = chain.process_block(&block);
    assert!(matches!(
        result,
        Err(BlockchainError::OrchestrationFailure { hook: "OnPersist", .. })
    ));
    assert!(chain.is_halted());
    assert_eq!(chain.height(), 0);

    let next = make_block(&chain, Vec::new());
    assert!(matches!(
        chain.process_block(&next),
        Err(BlockchainError::Halted)
    ));
}

#[test]
fn test_block_continuity_checks() {
    let mut chain = new_chain();

    let wrong_height = meridian_common::block::Block::new(
        meridian_common::block::BlockHeader::new(
            0,
            5,
            1,
            chain.last_hash().clone(),
            proposer_key(),
        ),
        Vec::new(),
    );
    assert!(matches!(
        chain.process_block(&wrong_height),
        Err(BlockchainError::InvalidHeight { expected: 1, got: 5 })
    ));

    let wrong_prev = meridian_common::block::Block::new(
        meridian_common::block::BlockHeader::new(0, 1, 1, Hash::max(), proposer_key()),
        Vec::new(),
    );
    assert!(matches!(
        chain.process_block(&wrong_prev),
        Err(BlockchainError::InvalidPreviousHash { .. })
    ));
}

#[test]
fn test_delegate_lifecycle_and_zero_balance_retention() {
    let mut chain = new_chain();
    let genesis = genesis_key();
    let genesis_account = account(&genesis);
    let sink = account(&test_key(0xCC));

    // block 1: the genesis holder registers itself as a delegate
    let mut builder = ScriptBuilder::new();
    builder.call_contract(
        &governance::GOVERNANCE,
        "registerDelegate",
        |b| {
            b.push_data(genesis.as_bytes());
            1
        },
        CallFlags::ALL,
    );
    let register = Transaction::new(TX_VERSION, 1, genesis.clone(), 2_000_000, builder.to_bytes(), Vec::new());
    let block = make_block(&chain, vec![register]);
    let executions = chain.process_block(&block).expect("block applies");
    assert!(executions[0].get_result_stack()[0]
        .equals(&meridian_common::vm::StackItem::Boolean(true)));

    // block 2: vote for the registered key
    let mut builder = ScriptBuilder::new();
    builder.call_contract(
        &governance::GOVERNANCE,
        "delegate",
        |b| {
            b.push_data(genesis_account.as_bytes());
            b.push_data(genesis.as_bytes());
            2
        },
        CallFlags::ALL,
    );
    let vote = Transaction::new(TX_VERSION, 2, genesis.clone(), TX_GAS, builder.to_bytes(), Vec::new());
    let block = make_block(&chain, vec![vote]);
    let executions = chain.process_block(&block).expect("block applies");
    assert!(executions[0].get_result_stack()[0]
        .equals(&meridian_common::vm::StackItem::Boolean(true)));

    // voting for an unregistered key is refused, not a fault
    let mut builder = ScriptBuilder::new();
    builder.call_contract(
        &governance::GOVERNANCE,
        "delegate",
        |b| {
            b.push_data(genesis_account.as_bytes());
            b.push_data(test_key(0x33).as_bytes());
            2
        },
        CallFlags::ALL,
    );
    let bad_vote = Transaction::new(TX_VERSION, 3, genesis.clone(), TX_GAS, builder.to_bytes(), Vec::new());
    let block = make_block(&chain, vec![bad_vote]);
    let executions = chain.process_block(&block).expect("block applies");
    assert_eq!(executions[0].get_vm_state(), VmState::Halt);
    assert!(executions[0].get_result_stack()[0]
        .equals(&meridian_common::vm::StackItem::Boolean(false)));

    // block 4: move the whole balance away, the record survives at zero
    // because the delegation is still active
    let drain = transfer_tx(&genesis, &sink, GOVERNANCE_TOTAL_SUPPLY as i64, TX_GAS, 4);
    let block = make_block(&chain, vec![drain]);
    chain.process_block(&block).expect("block applies");

    assert_eq!(governance_balance(&chain, &genesis_account), BigInt::from(0));
    let (_, record) =
        stored_governance_record(&chain, &genesis_account).expect("record retained");
    assert!(record.is_zero());
    assert_eq!(record.delegate, Some(genesis.clone()));

    assert_eq!(
        governance_balance(&chain, &sink),
        BigInt::from(GOVERNANCE_TOTAL_SUPPLY)
    );
}

#[test]
fn test_unclaimed_reward_query() {
    let mut chain = new_chain();
    for _ in 0..3 {
        let block = make_block(&chain, Vec::new());
        chain.process_block(&block).expect("empty block applies");
    }

    let mut builder = ScriptBuilder::new();
    builder.call_contract(
        &governance::GOVERNANCE,
        "unclaimedReward",
        |b| {
            b.push_data(account(&genesis_key()).as_bytes());
            b.push_int(3);
            2
        },
        CallFlags::ALL,
    );
    let result = chain
        .invoke_read_only(builder.to_bytes(), 10_000_000)
        .expect("read-only run");
    assert_eq!(result.vm_state, VmState::Halt);
    assert_eq!(
        result.result_stack[0].try_integer().expect("reward"),
        full_supply_reward(3)
    );
}

// Chain state survives a provider reopen through the meta records
#[test]
fn test_chain_resume_with_sled() {
    let dir = tempdir::TempDir::new("meridian-chain-test").expect("tempdir");
    let last_hash;
    {
        let provider = SledProvider::open(dir.path()).expect("open sled");
        let mut chain = Blockchain::new(provider, &genesis_key()).expect("genesis");
        let block = make_block_for_sled(&chain);
        chain.process_block(&block).expect("block applies");
        last_hash = chain.last_hash().clone();
    }

    let provider = SledProvider::open(dir.path()).expect("reopen sled");
    let chain = Blockchain::new(provider, &genesis_key()).expect("resume");
    assert_eq!(chain.height(), 1);
    assert_eq!(chain.last_hash(), &last_hash);
}

fn make_block_for_sled(chain: &Blockchain<SledProvider>) -> meridian_common::block::Block {
    meridian_common::block::Block::new(
        meridian_common::block::BlockHeader::new(
            0,
            chain.height() + 1,
            1_700_000_000_000,
            chain.last_hash().clone(),
            proposer_key(),
        ),
        Vec::new(),
    )
}
