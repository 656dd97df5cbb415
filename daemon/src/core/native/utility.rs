use super::{
    account_arg, amount_arg, governance, read_integer_state, write_integer_state, NativeMethod,
};
use crate::{
    config::{PRICE_NATIVE_READ, PRICE_NATIVE_TRANSFER},
    core::{
        interop::{InteropContext, TriggerKind},
        vm::VmError,
    },
};
use lazy_static::lazy_static;
use log::trace;
use meridian_common::{
    account::TokenBalance,
    config::{BLOCK_SUBSIDY, UTILITY_DECIMALS},
    contract::{CallFlags, ParamType},
    crypto::{native_contract_hash, Hash},
    vm::StackItem,
};
use num_bigint::{BigInt, Sign};

// The utility token (FUEL): pays for execution. Minted as block subsidy
// and holder reward, burned as transaction fees.

pub const CONTRACT_NAME: &str = "Utility";
pub const SYMBOL: &str = "FUEL";

lazy_static! {
    pub static ref UTILITY: Hash = native_contract_hash(CONTRACT_NAME);
}

const PREFIX_BALANCE: u8 = 0x01;
const PREFIX_SUPPLY: u8 = 0x02;
// Fees collected by OnPersist for the current block, consumed by
// PostPersist
const PREFIX_BLOCK_FEES: u8 = 0x03;

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
            required_flags: CallFlags::READ_STATES,
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
    ]
}

fn symbol(_ctx: &mut InteropContext, _args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    Ok(Some(StackItem::ByteString(SYMBOL.as_bytes().to_vec())))
}

fn decimals(
    _ctx: &mut InteropContext,
    _args: Vec<StackItem>,
) -> Result<Option<StackItem>, VmError> {
    Ok(Some(StackItem::from_i64(UTILITY_DECIMALS as i64)))
}

fn total_supply(
    ctx: &mut InteropContext,
    _args: Vec<StackItem>,
) -> Result<Option<StackItem>, VmError> {
    let supply = read_integer_state(ctx, &UTILITY, PREFIX_SUPPLY, &[])?;
    Ok(Some(StackItem::Integer(supply)))
}

fn balance_of(ctx: &mut InteropContext, args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    let account = account_arg(&args[0])?;
    let state = read_state(ctx, &account)?;
    Ok(Some(StackItem::Integer(state.balance)))
}

fn transfer(ctx: &mut InteropContext, args: Vec<StackItem>) -> Result<Option<StackItem>, VmError> {
    let from = account_arg(&args[0])?;
    let to = account_arg(&args[1])?;
    let amount = amount_arg(&args[2])?;

    if ctx.sender_account() != Some(from.clone()) {
        return Ok(Some(StackItem::Boolean(false)));
    }

    let mut from_state = read_state(ctx, &from)?;
    if from_state.balance < amount {
        return Ok(Some(StackItem::Boolean(false)));
    }
    if from == to {
        return Ok(Some(StackItem::Boolean(true)));
    }

    let mut to_state = read_state(ctx, &to)?;
    from_state.balance -= &amount;
    to_state.balance += amount;
    write_state(ctx, &from, &from_state)?;
    write_state(ctx, &to, &to_state)?;

    trace!("utility transfer {} -> {}", from, to);
    Ok(Some(StackItem::Boolean(true)))
}

// Create tokens on an account. Internal to the native layer: reachable
// from the governance reward settlement and the per-block subsidy, never
// from a script.
pub(crate) fn mint(ctx: &mut InteropContext, account: &Hash, amount: &BigInt) -> Result<(), VmError> {
    if amount.sign() != Sign::Plus {
        return Ok(());
    }
    let mut state = read_state(ctx, account)?;
    state.balance += amount;
    write_state(ctx, account, &state)?;

    let supply = read_integer_state(ctx, &UTILITY, PREFIX_SUPPLY, &[])? + amount;
    write_integer_state(ctx, &UTILITY, PREFIX_SUPPLY, &[], &supply)
}

// Destroy tokens on an account, the fee sink. A shortfall here is a
// protocol-level inconsistency surfaced to the orchestrator, never
// silently clamped.
pub(super) fn burn(ctx: &mut InteropContext, account: &Hash, amount: &BigInt) -> Result<(), VmError> {
    if amount.sign() != Sign::Plus {
        return Ok(());
    }
    let mut state = read_state(ctx, account)?;
    if state.balance < *amount {
        return Err(VmError::InsufficientBalance {
            need: amount.clone(),
            have: state.balance,
        });
    }
    state.balance -= amount;
    write_state(ctx, account, &state)?;

    let supply = read_integer_state(ctx, &UTILITY, PREFIX_SUPPLY, &[])? - amount;
    write_integer_state(ctx, &UTILITY, PREFIX_SUPPLY, &[], &supply)
}

// OnPersist: burn the declared gas of every transaction in the block from
// its sender and accumulate the block's fee total. Runs for faulted
// transactions too, gas is consumed either way.
pub(super) fn on_persist(ctx: &mut InteropContext) -> Result<(), VmError> {
    if ctx.trigger != TriggerKind::OnPersist {
        return Err(VmError::PermissionDenied(
            "OnPersist hook invoked under the wrong trigger".to_string(),
        ));
    }
    let block = ctx
        .block
        .ok_or_else(|| VmError::InvalidArgument("OnPersist outside a block".to_string()))?;

    let mut fees = BigInt::from(0);
    for tx in block.get_transactions() {
        let fee = BigInt::from(tx.get_gas_limit());
        let sender = tx.get_sender().to_account_hash();
        burn(ctx, &sender, &fee)?;
        fees += fee;
    }
    write_integer_state(ctx, &UTILITY, PREFIX_BLOCK_FEES, &[], &fees)
}

// PostPersist: pay the proposer recorded by the governance contract's
// OnPersist pass. By the time this runs, OnPersist has completed for every
// registered contract, so the read observes the committed value.
pub(super) fn post_persist(ctx: &mut InteropContext) -> Result<(), VmError> {
    if ctx.trigger != TriggerKind::PostPersist {
        return Err(VmError::PermissionDenied(
            "PostPersist hook invoked under the wrong trigger".to_string(),
        ));
    }

    let proposer = governance::recorded_proposer(ctx)?.ok_or_else(|| {
        VmError::InvalidArgument("no proposer recorded for the current block".to_string())
    })?;

    let fees = read_integer_state(ctx, &UTILITY, PREFIX_BLOCK_FEES, &[])?;
    let payout = fees + BigInt::from(BLOCK_SUBSIDY);
    mint(ctx, &proposer, &payout)?;
    ctx.storage_delete(&UTILITY, PREFIX_BLOCK_FEES, &[]);
    Ok(())
}

// One-time genesis initialization of the starting supply
pub(crate) fn initialize(
    ctx: &mut InteropContext,
    genesis_holder: &meridian_common::crypto::PublicKey,
) -> Result<(), VmError> {
    mint(
        ctx,
        &genesis_holder.to_account_hash(),
        &BigInt::from(meridian_common::config::GENESIS_UTILITY_SUPPLY),
    )
}

fn read_state(ctx: &InteropContext, account: &Hash) -> Result<TokenBalance, VmError> {
    let bytes = ctx
        .storage_get(&UTILITY, PREFIX_BALANCE, account.as_bytes())?
        .unwrap_or_default();
    Ok(TokenBalance::from_bytes(&bytes)?)
}

// Zero balances are removed from storage to bound growth
fn write_state(ctx: &mut InteropContext, account: &Hash, state: &TokenBalance) -> Result<(), VmError> {
    if state.is_zero() {
        ctx.storage_delete(&UTILITY, PREFIX_BALANCE, account.as_bytes());
    } else {
        let bytes = state.to_bytes()?;
        ctx.storage_put(&UTILITY, PREFIX_BALANCE, account.as_bytes(), bytes);
    }
    Ok(())
}
