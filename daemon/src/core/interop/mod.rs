use crate::core::{
    native,
    storage::{storage_key, Overlay},
    vm::{ExecutionEngine, VmError},
};
use lazy_static::lazy_static;
use log::trace;
use meridian_common::{
    block::{Block, BlockHeight},
    contract::CallFlags,
    crypto::{hash, Hash, HASH_SIZE},
    transaction::Transaction,
    vm::StackItem,
};
use strum::Display;

// Execution context kind, controls which operations are permitted.
// Application and Verification bound transaction scripts, OnPersist and
// PostPersist bound the per-block lifecycle hooks.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Application,
    Verification,
    OnPersist,
    PostPersist,
}

impl TriggerKind {
    // A read-only trigger rejects every state-mutating native method
    pub fn is_read_only(&self) -> bool {
        matches!(self, TriggerKind::Verification)
    }
}

// Identifier of a syscall: the first four bytes of the blake3 hash of its
// well-known name
pub fn syscall_id(name: &str) -> u32 {
    let digest = hash(name.as_bytes());
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

lazy_static! {
    // The single syscall through which a running script invokes another
    // contract, native or deployed
    pub static ref SYSCALL_CONTRACT_CALL: u32 = syscall_id("System.Contract.Call");

    // Namespace under which deployed contract bytecode is stored.
    // Deployment management itself is out of scope here, the engine only
    // resolves call targets against this namespace.
    pub static ref CODE_REGISTRY: Hash = meridian_common::crypto::native_contract_hash("CodeRegistry");
}

pub const PREFIX_CODE: u8 = 0x01;

// Execution-scoped bundle binding the storage view, the trigger kind, the
// containing transaction/block and the gas counter. Owned exclusively by
// one script or one lifecycle hook, never shared across executions.
pub struct InteropContext<'a, 'p> {
    pub trigger: TriggerKind,
    pub block: Option<&'a Block>,
    pub transaction: Option<&'a Transaction>,
    pub height: BlockHeight,
    storage: &'a mut Overlay<'p>,
    gas_limit: u64,
    gas_consumed: u64,
}

impl<'a, 'p> InteropContext<'a, 'p> {
    pub fn new(
        trigger: TriggerKind,
        block: Option<&'a Block>,
        transaction: Option<&'a Transaction>,
        height: BlockHeight,
        storage: &'a mut Overlay<'p>,
        gas_limit: u64,
    ) -> Self {
        InteropContext {
            trigger,
            block,
            transaction,
            height,
            storage,
            gas_limit,
            gas_consumed: 0,
        }
    }

    // Charge gas before the work happens. Running out forces an immediate
    // fault, before any effect of the operation being paid for.
    pub fn use_gas(&mut self, amount: u64) -> Result<(), VmError> {
        let available = self.gas_limit - self.gas_consumed;
        if amount > available {
            return Err(VmError::OutOfGas {
                needed: amount,
                available,
            });
        }
        self.gas_consumed += amount;
        Ok(())
    }

    pub fn gas_consumed(&self) -> u64 {
        self.gas_consumed
    }

    pub fn gas_left(&self) -> u64 {
        self.gas_limit - self.gas_consumed
    }

    // Account identity of the transaction sender, the only identity the
    // token contracts accept as an authorization source
    pub fn sender_account(&self) -> Option<Hash> {
        self.transaction
            .map(|tx| tx.get_sender().to_account_hash())
    }

    pub fn storage_get(
        &self,
        contract: &Hash,
        prefix: u8,
        suffix: &[u8],
    ) -> Result<Option<Vec<u8>>, VmError> {
        Ok(self.storage.get(&storage_key(contract, prefix, suffix))?)
    }

    pub fn storage_put(&mut self, contract: &Hash, prefix: u8, suffix: &[u8], value: Vec<u8>) {
        self.storage.put(storage_key(contract, prefix, suffix), value);
    }

    pub fn storage_delete(&mut self, contract: &Hash, prefix: u8, suffix: &[u8]) {
        self.storage.delete(storage_key(contract, prefix, suffix));
    }
}

// Entry point for the Syscall opcode
pub fn invoke_syscall(
    engine: &mut ExecutionEngine,
    ctx: &mut InteropContext,
    id: u32,
) -> Result<(), VmError> {
    if id == *SYSCALL_CONTRACT_CALL {
        contract_call(engine, ctx)
    } else {
        Err(VmError::UnknownSyscall(id))
    }
}

// The contract-call syscall. Pops (target script hash, method name,
// argument array, scope flags), resolves the target and either dispatches
// into a native handler or pushes a new frame over the deployed bytecode.
fn contract_call(engine: &mut ExecutionEngine, ctx: &mut InteropContext) -> Result<(), VmError> {
    let flags = engine.pop()?.try_integer()?;
    let flags =
        u8::try_from(flags).map_err(|_| VmError::InvalidArgument("invalid call flags".into()))?;
    if flags & !CallFlags::ALL != 0 {
        return Err(VmError::InvalidArgument("unknown call flag bits".into()));
    }

    let args_item = engine.pop()?;
    let args = args_item.try_container()?.borrow().clone();
    // structs lose aliasing when they cross a trust boundary
    let mut call_args = Vec::with_capacity(args.len());
    for arg in args {
        call_args.push(arg.deep_clone()?);
    }

    let method_bytes = engine.pop()?.try_bytes()?;
    let method = String::from_utf8(method_bytes)
        .map_err(|_| VmError::InvalidArgument("method name is not valid UTF-8".into()))?;

    let target_bytes = engine.pop()?.try_bytes()?;
    if target_bytes.len() != HASH_SIZE {
        return Err(VmError::InvalidArgument("invalid target script hash".into()));
    }
    let mut target = [0u8; HASH_SIZE];
    target.copy_from_slice(&target_bytes);
    let target = Hash::new(target);

    let caller_flags = engine
        .current_frame()
        .map(|frame| frame.call_flags())
        .unwrap_or(CallFlags::NONE);
    if !CallFlags::contains(caller_flags, CallFlags::ALLOW_CALL) {
        return Err(VmError::PermissionDenied(
            "caller scope does not permit contract calls".into(),
        ));
    }
    // a callee never gains a right its caller did not hold
    let effective_flags = flags & caller_flags;

    trace!(
        "contract call {}::{} with {} args, flags {:#04x}",
        target,
        method,
        call_args.len(),
        effective_flags
    );

    if native::registry().contains(&target) {
        let result = native::dispatch(ctx, &target, &method, call_args, effective_flags)?;
        if let Some(item) = result {
            engine.push(item)?;
        }
        return Ok(());
    }

    // deployed target: push a frame over its own bytecode, the callee
    // finds (args array, method name) on the stack
    match ctx.storage_get(&CODE_REGISTRY, PREFIX_CODE, target.as_bytes())? {
        Some(bytecode) => {
            engine.push(StackItem::array(call_args))?;
            engine.push(StackItem::ByteString(method.into_bytes()))?;
            engine.load_script(bytecode, effective_flags)
        }
        None => Err(VmError::UnknownContract(target)),
    }
}
