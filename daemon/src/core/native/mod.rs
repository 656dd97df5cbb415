pub mod governance;
pub mod utility;

use crate::core::{
    interop::InteropContext,
    vm::VmError,
};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::trace;
use meridian_common::{
    block::BlockHeight,
    contract::{CallFlags, ContractManifest, MethodSignature, ParamType},
    crypto::{native_contract_hash, Hash},
    vm::{codec, StackItem},
};
use num_bigint::BigInt;

// Handler of a native method. Stateless by design: all contract state
// lives behind the storage accessor of the interop context, so reentrant
// invocations observe every write of their callers.
pub type MethodHandler =
    fn(&mut InteropContext, Vec<StackItem>) -> Result<Option<StackItem>, VmError>;

// Method descriptor: resolution is by (name, arity) exact match among the
// methods active at the current height, there is no other overloading.
pub struct NativeMethod {
    pub name: &'static str,
    pub parameters: &'static [ParamType],
    pub return_type: ParamType,
    pub arity: usize,
    pub price: u64,
    pub required_flags: u8,
    pub active_from: BlockHeight,
    pub safe: bool,
    pub handler: MethodHandler,
}

// Closed set of native contract kinds. New natives are added here at
// compile time, the registry is never extended at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Governance,
    Utility,
}

// A built-in contract executing as node code. Identified by a
// deterministic script hash derived from its well-known name, constructed
// once at startup and immutable afterwards.
pub struct NativeContract {
    kind: NativeKind,
    name: &'static str,
    hash: Hash,
    methods: Vec<NativeMethod>,
    manifest: ContractManifest,
}

impl NativeContract {
    fn new(kind: NativeKind, name: &'static str, methods: Vec<NativeMethod>) -> Self {
        let manifest = ContractManifest::new(
            name.to_string(),
            methods
                .iter()
                .map(|method| MethodSignature {
                    name: method.name.to_string(),
                    parameters: method.parameters.to_vec(),
                    return_type: method.return_type,
                    safe: method.safe,
                })
                .collect(),
        );
        NativeContract {
            kind,
            name,
            hash: native_contract_hash(name),
            methods,
            manifest,
        }
    }

    pub fn kind(&self) -> NativeKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn manifest(&self) -> &ContractManifest {
        &self.manifest
    }

    pub fn resolve_method(
        &self,
        name: &str,
        arity: usize,
        height: BlockHeight,
    ) -> Option<&NativeMethod> {
        self.methods
            .iter()
            .find(|method| {
                method.name == name && method.arity == arity && method.active_from <= height
            })
    }

    // Block-lifecycle hooks, invoked by the orchestrator outside any
    // transaction script. Not part of the dispatchable method table.
    pub fn on_persist(&self, ctx: &mut InteropContext) -> Result<(), VmError> {
        match self.kind {
            NativeKind::Governance => governance::on_persist(ctx),
            NativeKind::Utility => utility::on_persist(ctx),
        }
    }

    pub fn post_persist(&self, ctx: &mut InteropContext) -> Result<(), VmError> {
        match self.kind {
            NativeKind::Governance => Ok(()),
            NativeKind::Utility => utility::post_persist(ctx),
        }
    }
}

// Process-wide registry of native contracts, keyed by script hash.
// Iteration order is registration order, which is consensus-relevant for
// the per-block lifecycle passes. Read-only after startup, safe to share
// with concurrent verification-only executions.
pub struct NativeRegistry {
    contracts: IndexMap<Hash, NativeContract>,
}

impl NativeRegistry {
    fn build() -> Self {
        let mut contracts = IndexMap::new();
        for contract in [
            NativeContract::new(
                NativeKind::Governance,
                governance::CONTRACT_NAME,
                governance::methods(),
            ),
            NativeContract::new(
                NativeKind::Utility,
                utility::CONTRACT_NAME,
                utility::methods(),
            ),
        ] {
            contracts.insert(contract.hash.clone(), contract);
        }
        NativeRegistry { contracts }
    }

    pub fn get(&self, hash: &Hash) -> Option<&NativeContract> {
        self.contracts.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.contracts.contains_key(hash)
    }

    // Contracts in registration order
    pub fn iter(&self) -> impl Iterator<Item = &NativeContract> {
        self.contracts.values()
    }
}

lazy_static! {
    static ref REGISTRY: NativeRegistry = NativeRegistry::build();
}

pub fn registry() -> &'static NativeRegistry {
    &REGISTRY
}

// Dispatch a call into a native contract.
//
// The transition chain for one dispatch is
// Resolved -> PermissionChecked -> Priced -> Executing -> Succeeded | Faulted
// and no partial transition is observable outside this function: gas is
// charged before the handler runs, and a handler error propagates as a
// fault without leaving a half-applied method behind (the per-transaction
// storage layer is discarded by the engine's caller on fault).
//
// Reachable only through the contract-call syscall: a native contract is
// never the entry script of a transaction, the blockchain rejects such
// transactions before execution.
pub fn dispatch(
    ctx: &mut InteropContext,
    target: &Hash,
    method: &str,
    args: Vec<StackItem>,
    scope: u8,
) -> Result<Option<StackItem>, VmError> {
    // Resolved
    let contract = REGISTRY
        .get(target)
        .ok_or_else(|| VmError::UnknownContract(target.clone()))?;
    let descriptor = contract
        .resolve_method(method, args.len(), ctx.height)
        .ok_or_else(|| VmError::UnknownMethod {
            contract: contract.name.to_string(),
            method: method.to_string(),
            arity: args.len(),
        })?;

    // PermissionChecked: the trigger and the caller scope must both cover
    // the method's required flags
    if descriptor.required_flags & CallFlags::WRITE_STATES != 0 && ctx.trigger.is_read_only() {
        return Err(VmError::PermissionDenied(format!(
            "{}::{} mutates state, not permitted under the {} trigger",
            contract.name, descriptor.name, ctx.trigger
        )));
    }
    if !CallFlags::contains(scope, descriptor.required_flags) {
        return Err(VmError::PermissionDenied(format!(
            "{}::{} requires flags {:#04x}, caller scope is {:#04x}",
            contract.name, descriptor.name, descriptor.required_flags, scope
        )));
    }

    // Priced: the full fixed price is charged before execution
    ctx.use_gas(descriptor.price)?;

    // Executing
    trace!("dispatching {}::{}", contract.name, descriptor.name);
    (descriptor.handler)(ctx, args)
}

// Shared helpers for handler argument decoding and small integer state
// records

pub(super) fn account_arg(item: &StackItem) -> Result<Hash, VmError> {
    let bytes = item.try_bytes()?;
    if bytes.len() != meridian_common::crypto::HASH_SIZE {
        return Err(VmError::InvalidArgument(
            "account must be a 32-byte hash".to_string(),
        ));
    }
    let mut hash = [0u8; meridian_common::crypto::HASH_SIZE];
    hash.copy_from_slice(&bytes);
    Ok(Hash::new(hash))
}

pub(super) fn amount_arg(item: &StackItem) -> Result<BigInt, VmError> {
    let amount = item.try_integer()?;
    if amount < BigInt::from(0) {
        return Err(VmError::InvalidArgument(
            "amount must not be negative".to_string(),
        ));
    }
    Ok(amount)
}

// A single integer persisted under a key, e.g. a supply counter.
// Empty bytes read back as zero, the "not yet created" convention.
pub(super) fn read_integer_state(
    ctx: &InteropContext,
    contract: &Hash,
    prefix: u8,
    suffix: &[u8],
) -> Result<BigInt, VmError> {
    match ctx.storage_get(contract, prefix, suffix)? {
        None => Ok(BigInt::from(0)),
        Some(bytes) if bytes.is_empty() => Ok(BigInt::from(0)),
        Some(bytes) => {
            let item = codec::decode(&bytes)?;
            Ok(item.try_integer()?)
        }
    }
}

pub(super) fn write_integer_state(
    ctx: &mut InteropContext,
    contract: &Hash,
    prefix: u8,
    suffix: &[u8],
    value: &BigInt,
) -> Result<(), VmError> {
    let bytes = codec::encode(&StackItem::Integer(value.clone()))?;
    ctx.storage_put(contract, prefix, suffix, bytes);
    Ok(())
}
