use super::{account_arg, amount_arg, utility, NativeMethod};
use crate::{
    config::{
        PRICE_NATIVE_DELEGATE, PRICE_NATIVE_READ, PRICE_NATIVE_REGISTER_DELEGATE,
        PRICE_NATIVE_TRANSFER,
    },
    core::{
        interop::{InteropContext, TriggerKind},
        vm::VmError,
    },
};
use lazy_static::lazy_static;
use log::{debug, trace};
use meridian_common::{
    account::GovernanceBalance,
    block::BlockHeight,
    config::{GOVERNANCE_DECIMALS, GOVERNANCE_TOTAL_SUPPLY, UTILITY_GENERATION_PER_BLOCK},
    contract::{CallFlags, ParamType},
    crypto::{native_contract_hash, Hash, PublicKey},
    vm::{codec, StackItem},
};
use num_bigint::{BigInt, Sign};

// The governance token (MRD): fixed supply, indivisible units, carries the
// delegate vote of each holder. Holding it accrues utility tokens over
// time, settled on every balance change.

pub const CONTRACT_NAME: &str = "Governance";
pub const SYMBOL: &str = "MRD";

lazy_static! {
    pub static ref GOVERNANCE: Hash = native_contract_hash(CONTRACT_NAME);
}

const PREFIX_BALANCE: u8 = 0x01;
// Registered delegate public keys, a vote may only reference one of these
const PREFIX_DELEGATE_REGISTRY: u8 = 0x02;
// Block proposer recorded by OnPersist, read by the utility token's
// PostPersist pass
const PREFIX_PROPOSER: u8 = 0x03;

pub(super) fn methods() -> Vec<NativeMethod> {
    vec![
        NativeMethod {
            name: "symbol",
            parameters: &[],
            return_type: ParamType::ByteString,
            arity: 0,
            price: PRICE_NATIVE_READ,
            required_flags: CallFlags::NONE,
            active_from: 0,
            safe: true,
            handler: symbol,
        },
        NativeMethod {
            name: "decimals",
            parameters: &[],
            return_type: ParamType::Integer,
            arity: 0,
            price: PRICE_NATIVE_READ,
            required_flags: CallFlags::NONE,
            active_from: 0,
            safe: true,
            handler: decimals,
        },
        NativeMethod {
            name: "totalSupply",
            parameters: &[],
            return_type: ParamType::Integer,
            arity: 0,
            price: PRICE_NATIVE_READ,
            required_flags: CallFlags::NONE,
            active_from: 0,
            safe: true,
            handler: total_supply,
        },
        NativeMethod {
            name: "balanceOf",
            parameters: &[ParamType::Hash],
            return_type: ParamType::Integer,
            arity: 1,
            price: PRICE_NATIVE_READ,
            required_flags: CallFlags::READ_STATES,
            active_from: 0,
            safe: true,
            handler: balance_of,
        },
        NativeMethod {
            name: "transfer",
            parameters: &[ParamType::Hash, ParamType::Hash, ParamType::Integer],
            return_type: ParamType::Boolean,
            arity: 3,
            price: PRICE_NATIVE_TRANSFER,
            required_flags: CallFlags::STATES,
            active_from: 0,
            safe: false,
            handler: transfer,
        },
        NativeMethod {
            name: "registerDelegate",
            parameters: &[ParamType::PublicKey],
            return_type: ParamType::Boolean,
            arity: 1,
            price: PRICE_NATIVE_REGISTER_DELEGATE,
            required_flags: CallFlags::STATES,
            active_from: 0,
            safe: false,
            handler: register_delegate,
        },
        NativeMethod {
            name: "delegate",
            parameters: &[ParamType::Hash, ParamType::PublicKey],
            return_type: ParamType::Boolean,
            arity: 2,
            price: PRICE_NATIVE_DELEGATE,
            required_flags: CallFlags::STATES,
            active_from: 0,
            safe: false,
            handler: delegate,
        },
        NativeMethod {
            name: "unclaimedReward",
            parameters: &[ParamType::Hash, ParamType::Integer],
            return_type: ParamType::Integer,
            arity: 2,
            price: PRICE_NATIVE_READ,
            required_flags: CallFlags::READ_STATES,
            active_from: 0,
            safe: true,
            handler: unclaimed_reward,
        },
    ]
}

fn symbol(_ctx: &mut InteropContext, _args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    Ok(Some(StackItem::ByteString(SYMBOL.as_bytes().to_vec())))
}

fn decimals(
    _ctx: &mut InteropContext,
    _args: Vec<StackItem>,
) -> Result<Option<StackItem>, VmError> {
    Ok(Some(StackItem::from_i64(GOVERNANCE_DECIMALS as i64)))
}

fn total_supply(
    _ctx: &mut InteropContext,
    _args: Vec<StackItem>,
) -> Result<Option<StackItem>, VmError> {
    Ok(Some(StackItem::from_i64(GOVERNANCE_TOTAL_SUPPLY as i64)))
}

fn balance_of(ctx: &mut InteropContext, args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    let account = account_arg(&args[0])?;
    let state = read_state(ctx, &account)?;
    Ok(Some(StackItem::Integer(state.balance)))
}

// Token transfer with reward settlement.
//
// Reads and writes go through the live per-transaction storage layer, the
// handler never caches a balance across the nested utility-token mint:
// that keeps a reentrant invocation consistent with what is already
// written.
fn transfer(ctx: &mut InteropContext, args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    let from = account_arg(&args[0])?;
    let to = account_arg(&args[1])?;
    let amount = amount_arg(&args[2])?;

    // only the transaction sender can move funds out of its own account
    if ctx.sender_account() != Some(from.clone()) {
        return Ok(Some(StackItem::Boolean(false)));
    }

    let mut from_state = read_state(ctx, &from)?;
    if from_state.balance < amount {
        return Ok(Some(StackItem::Boolean(false)));
    }

    settle_reward(ctx, &from, &mut from_state)?;
    if from == to {
        write_state(ctx, &from, &from_state)?;
        return Ok(Some(StackItem::Boolean(true)));
    }

    let mut to_state = read_state(ctx, &to)?;
    settle_reward(ctx, &to, &mut to_state)?;

    from_state.balance -= &amount;
    to_state.balance += amount;
    write_state(ctx, &from, &from_state)?;
    write_state(ctx, &to, &to_state)?;

    trace!("governance transfer {} -> {}", from, to);
    Ok(Some(StackItem::Boolean(true)))
}

fn register_delegate(
    ctx: &mut InteropContext,
    args: Vec<StackItem>,
) -> Result<Option<StackItem>, VmError> {
    let key = PublicKey::from_bytes(&args[0].try_bytes()?)
        .map_err(|err| VmError::InvalidArgument(err.to_string()))?;

    // a candidate registers itself, nobody else can
    if ctx.sender_account() != Some(key.to_account_hash()) {
        return Ok(Some(StackItem::Boolean(false)));
    }

    let marker = codec::encode(&StackItem::Boolean(true))?;
    ctx.storage_put(&GOVERNANCE, PREFIX_DELEGATE_REGISTRY, key.as_bytes(), marker);
    debug!("registered delegate {}", key);
    Ok(Some(StackItem::Boolean(true)))
}

fn delegate(ctx: &mut InteropContext, args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    let account = account_arg(&args[0])?;
    if ctx.sender_account() != Some(account.clone()) {
        return Ok(Some(StackItem::Boolean(false)));
    }

    let delegate = match &args[1] {
        StackItem::Null => None,
        item => Some(
            PublicKey::from_bytes(&item.try_bytes()?)
                .map_err(|err| VmError::InvalidArgument(err.to_string()))?,
        ),
    };

    // a vote must reference a previously registered delegate key
    if let Some(key) = &delegate {
        if !is_registered_delegate(ctx, key)? {
            return Ok(Some(StackItem::Boolean(false)));
        }
    }

    let mut state = read_state(ctx, &account)?;
    state.delegate = delegate;
    write_state(ctx, &account, &state)?;
    Ok(Some(StackItem::Boolean(true)))
}

fn unclaimed_reward(
    ctx: &mut InteropContext,
    args: Vec<StackItem>,
) -> Result<Option<StackItem>, VmError> {
    let account = account_arg(&args[0])?;
    let end = args[1].try_integer()?;
    let end = BlockHeight::try_from(end)
        .map_err(|_| VmError::InvalidArgument("invalid end height".to_string()))?;

    let state = read_state(ctx, &account)?;
    let reward = accrued_reward(&state.balance, state.balance_height, end);
    Ok(Some(StackItem::Integer(reward)))
}

// OnPersist: record the proposer of the finalized block. The utility
// token's PostPersist pass depends on this value being committed first,
// which the registration order of the two contracts guarantees.
pub(super) fn on_persist(ctx: &mut InteropContext) -> Result<(), VmError> {
    if ctx.trigger != TriggerKind::OnPersist {
        return Err(VmError::PermissionDenied(
            "OnPersist hook invoked under the wrong trigger".to_string(),
        ));
    }
    let block = ctx
        .block
        .ok_or_else(|| VmError::InvalidArgument("OnPersist outside a block".to_string()))?;

    let proposer = block.get_header().get_proposer().to_account_hash();
    let value = codec::encode(&StackItem::ByteString(proposer.as_bytes().to_vec()))?;
    ctx.storage_put(&GOVERNANCE, PREFIX_PROPOSER, &[], value);
    Ok(())
}

// Proposer committed by the last OnPersist pass, if any
pub(super) fn recorded_proposer(ctx: &InteropContext) -> Result<Option<Hash>, VmError> {
    match ctx.storage_get(&GOVERNANCE, PREFIX_PROPOSER, &[])? {
        None => Ok(None),
        Some(bytes) => {
            let account = account_arg(&codec::decode(&bytes)?)?;
            Ok(Some(account))
        }
    }
}

// One-time genesis initialization: the full fixed supply goes to the
// genesis holder
pub(crate) fn initialize(
    ctx: &mut InteropContext,
    genesis_holder: &PublicKey,
) -> Result<(), VmError> {
    let state = GovernanceBalance {
        balance: BigInt::from(GOVERNANCE_TOTAL_SUPPLY),
        balance_height: 0,
        delegate: None,
    };
    write_state(ctx, &genesis_holder.to_account_hash(), &state)
}

fn is_registered_delegate(ctx: &InteropContext, key: &PublicKey) -> Result<bool, VmError> {
    Ok(ctx
        .storage_get(&GOVERNANCE, PREFIX_DELEGATE_REGISTRY, key.as_bytes())?
        .is_some())
}

fn read_state(ctx: &InteropContext, account: &Hash) -> Result<GovernanceBalance, VmError> {
    let bytes = ctx
        .storage_get(&GOVERNANCE, PREFIX_BALANCE, account.as_bytes())?
        .unwrap_or_default();
    Ok(GovernanceBalance::from_bytes(&bytes)?)
}

// A zero-balance record is pruned to bound storage growth, unless it still
// carries holder state the caller's policy retains (an active delegation)
fn write_state(
    ctx: &mut InteropContext,
    account: &Hash,
    state: &GovernanceBalance,
) -> Result<(), VmError> {
    if state.is_zero() && !state.retains_state() {
        ctx.storage_delete(&GOVERNANCE, PREFIX_BALANCE, account.as_bytes());
    } else {
        let bytes = state.to_bytes()?;
        ctx.storage_put(&GOVERNANCE, PREFIX_BALANCE, account.as_bytes(), bytes);
    }
    Ok(())
}

// FUEL accrued by holding `balance` governance units from height `from`
// to height `to`
fn accrued_reward(balance: &BigInt, from: BlockHeight, to: BlockHeight) -> BigInt {
    if to <= from || balance.sign() != Sign::Plus {
        return BigInt::from(0);
    }
    balance * BigInt::from(to - from) * BigInt::from(UTILITY_GENERATION_PER_BLOCK)
}

// Settle the accrued reward by minting utility tokens, then reset the
// accrual basis to the current height. Must run before any balance change.
fn settle_reward(
    ctx: &mut InteropContext,
    account: &Hash,
    state: &mut GovernanceBalance,
) -> Result<(), VmError> {
    let reward = accrued_reward(&state.balance, state.balance_height, ctx.height);
    if reward.sign() == Sign::Plus {
        utility::mint(ctx, account, &reward)?;
    }
    state.balance_height = ctx.height;
    Ok(())
}
