use crate::{
    config::HOOK_GAS_BUDGET,
    core::{
        error::BlockchainError,
        interop::{InteropContext, TriggerKind},
        native,
        state::{InvocationResult, TransactionExecution},
        storage::{meta_key, EntryState, Overlay, StorageProvider},
        vm::{ExecutionEngine, VmError, VmState},
    },
};
use log::{debug, error, info, warn};
use meridian_common::{
    block::{Block, BlockHeight},
    contract::CallFlags,
    crypto::{Hash, Hashable, PublicKey},
    serializer::Serializer,
    transaction::Transaction,
};
use std::collections::BTreeMap;

const META_HEIGHT: &[u8] = b"height";
const META_LAST_HASH: &[u8] = b"last_hash";

// The execution core of the node: applies finalized blocks in the exact
// order consensus delivers them and is the sole authority on whether a
// transaction had any state effect.
//
// Per block: every transaction executes sequentially under the Application
// trigger against its own copy-on-write layer, then one OnPersist pass and
// one PostPersist pass run over the native contracts in registration
// order. Durable flush happens once, at the block boundary.
pub struct Blockchain<P: StorageProvider> {
    provider: P,
    height: BlockHeight,
    last_hash: Hash,
    // set after an orchestration failure, no further block is accepted
    // until an operator intervenes
    halted: bool,
}

impl<P: StorageProvider> Blockchain<P> {
    // Open the chain, initializing genesis state on first start
    pub fn new(provider: P, genesis_holder: &PublicKey) -> Result<Self, BlockchainError> {
        let mut chain = Blockchain {
            provider,
            height: 0,
            last_hash: Hash::zero(),
            halted: false,
        };
        match chain.provider.get(&meta_key(META_HEIGHT))? {
            Some(bytes) => {
                chain.height = u64::from_bytes(&bytes)?;
                let hash_bytes = chain
                    .provider
                    .get(&meta_key(META_LAST_HASH))?
                    .ok_or(meridian_common::serializer::ReaderError::InvalidValue)?;
                chain.last_hash = Hash::from_bytes(&hash_bytes)?;
                info!("chain resumed at height {}", chain.height);
            }
            None => chain.run_genesis(genesis_holder)?,
        }
        Ok(chain)
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn last_hash(&self) -> &Hash {
        &self.last_hash
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn storage(&self) -> &P {
        &self.provider
    }

    fn run_genesis(&mut self, genesis_holder: &PublicKey) -> Result<(), BlockchainError> {
        info!("initializing genesis state");
        let mut overlay = Overlay::new(&self.provider);
        {
            let mut ctx = InteropContext::new(
                TriggerKind::OnPersist,
                None,
                None,
                0,
                &mut overlay,
                HOOK_GAS_BUDGET,
            );
            native::governance::initialize(&mut ctx, genesis_holder)
                .map_err(|err| orchestration_failure("Governance", "initialize", err))?;
            native::utility::initialize(&mut ctx, genesis_holder)
                .map_err(|err| orchestration_failure("Utility", "initialize", err))?;
        }
        self.apply_changes(overlay.into_changes())?;
        self.write_meta()?;
        self.provider.flush()?;
        Ok(())
    }

    // Apply one finalized block. Returns the per-transaction execution
    // records, a faulted transaction never rejects the block itself.
    pub fn process_block(
        &mut self,
        block: &Block,
    ) -> Result<Vec<TransactionExecution>, BlockchainError> {
        if self.halted {
            return Err(BlockchainError::Halted);
        }

        let header = block.get_header();
        if header.get_height() != self.height + 1 {
            return Err(BlockchainError::InvalidHeight {
                expected: self.height + 1,
                got: header.get_height(),
            });
        }
        if header.get_previous_hash() != &self.last_hash {
            return Err(BlockchainError::InvalidPreviousHash {
                expected: self.last_hash.clone(),
                got: header.get_previous_hash().clone(),
            });
        }

        let block_hash = block.hash();
        debug!(
            "processing block {} at height {} with {} transactions",
            block_hash,
            header.get_height(),
            block.get_transactions().len()
        );

        let mut overlay = Overlay::new(&self.provider);
        let mut executions = Vec::with_capacity(block.get_transactions().len());
        for tx in block.get_transactions() {
            executions.push(execute_transaction(&mut overlay, block, tx)?);
        }

        // OnPersist pass over every native contract in registration order,
        // then PostPersist in the same order once the first pass has fully
        // completed: a contract's PostPersist may depend on another
        // contract's OnPersist side effects.
        for trigger in [TriggerKind::OnPersist, TriggerKind::PostPersist] {
            if let Err(err) = run_hook_pass(&mut overlay, block, trigger) {
                self.halted = true;
                return Err(err);
            }
        }

        self.apply_changes(overlay.into_changes())?;
        self.height = header.get_height();
        self.last_hash = block_hash;
        self.write_meta()?;
        self.provider.flush()?;

        Ok(executions)
    }

    // Read-only invocation of an arbitrary script under the Application
    // trigger against an ephemeral layer. Consumed by the RPC surface,
    // nothing is ever committed.
    pub fn invoke_read_only(
        &self,
        script: Vec<u8>,
        gas_limit: u64,
    ) -> Result<InvocationResult, BlockchainError> {
        self.run_ephemeral(script, gas_limit, TriggerKind::Application, CallFlags::ALL)
    }

    // Verification-only execution as used by mempool pre-validation.
    // State-mutating native methods are rejected by dispatch under this
    // trigger, and the layer is discarded regardless.
    pub fn verify_script(
        &self,
        script: Vec<u8>,
        gas_limit: u64,
    ) -> Result<InvocationResult, BlockchainError> {
        self.run_ephemeral(
            script,
            gas_limit,
            TriggerKind::Verification,
            CallFlags::READ_STATES | CallFlags::ALLOW_CALL,
        )
    }

    fn run_ephemeral(
        &self,
        script: Vec<u8>,
        gas_limit: u64,
        trigger: TriggerKind,
        call_flags: u8,
    ) -> Result<InvocationResult, BlockchainError> {
        let mut overlay = Overlay::new(&self.provider);
        let mut engine = ExecutionEngine::new();
        let mut ctx = InteropContext::new(trigger, None, None, self.height, &mut overlay, gas_limit);

        let vm_state = match engine.load_script(script, call_flags) {
            Ok(()) => engine.execute(&mut ctx),
            Err(err) => {
                warn!("failed to load script: {}", err);
                VmState::Fault
            }
        };
        let gas_consumed = ctx.gas_consumed();
        drop(ctx);

        Ok(InvocationResult {
            vm_state,
            gas_consumed,
            result_stack: engine.result_stack(),
            diagnostic: engine.fault_reason().map(str::to_string),
        })
    }

    fn apply_changes(
        &mut self,
        changes: BTreeMap<Vec<u8>, EntryState<Vec<u8>>>,
    ) -> Result<(), BlockchainError> {
        for (key, state) in changes {
            match state {
                EntryState::Stored(value) => self.provider.put(key, value)?,
                EntryState::Deleted => self.provider.delete(&key)?,
                EntryState::Absent => {}
            }
        }
        Ok(())
    }

    fn write_meta(&mut self) -> Result<(), BlockchainError> {
        self.provider
            .put(meta_key(META_HEIGHT), self.height.to_bytes())?;
        self.provider
            .put(meta_key(META_LAST_HASH), self.last_hash.as_bytes().to_vec())?;
        Ok(())
    }
}

// Execute one transaction script inside its own storage layer.
// Halt commits the layer, anything else discards it: the transaction's
// effect on state is all or nothing, only the gas consumption survives a
// fault.
fn execute_transaction(
    overlay: &mut Overlay,
    block: &Block,
    tx: &Transaction,
) -> Result<TransactionExecution, BlockchainError> {
    let tx_hash = tx.hash();

    // a native contract is never a valid entry script, regardless of the
    // arguments it would be called with
    if native::registry().contains(&tx.script_hash()) {
        let err = VmError::PermissionDenied(
            "a native contract cannot be the entry script of a transaction".to_string(),
        );
        debug!("transaction {} rejected: {}", tx_hash, err);
        return Ok(TransactionExecution::faulted(tx_hash, 0, err.to_string()));
    }

    overlay.begin()?;
    let mut engine = ExecutionEngine::new();
    let mut ctx = InteropContext::new(
        TriggerKind::Application,
        Some(block),
        Some(tx),
        block.get_header().get_height(),
        overlay,
        tx.get_gas_limit(),
    );

    let vm_state = match engine.load_script(tx.get_script().to_vec(), CallFlags::ALL) {
        Ok(()) => engine.execute(&mut ctx),
        Err(err) => {
            warn!("failed to load script of {}: {}", tx_hash, err);
            VmState::Fault
        }
    };
    let gas_consumed = ctx.gas_consumed();
    drop(ctx);

    match vm_state {
        VmState::Halt => {
            overlay.commit()?;
            Ok(TransactionExecution::halted(
                tx_hash,
                gas_consumed,
                engine.result_stack(),
            ))
        }
        _ => {
            overlay.discard()?;
            let diagnostic = engine
                .fault_reason()
                .unwrap_or("script did not reach a terminal state")
                .to_string();
            debug!("transaction {} faulted: {}", tx_hash, diagnostic);
            Ok(TransactionExecution::faulted(
                tx_hash,
                gas_consumed,
                diagnostic,
            ))
        }
    }
}

// One lifecycle-hook pass over the registry in registration order.
// A failure here is fatal to block application: it signals a
// protocol-level inconsistency, not a per-transaction condition.
fn run_hook_pass(
    overlay: &mut Overlay,
    block: &Block,
    trigger: TriggerKind,
) -> Result<(), BlockchainError> {
    for contract in native::registry().iter() {
        let mut ctx = InteropContext::new(
            trigger,
            Some(block),
            None,
            block.get_header().get_height(),
            overlay,
            HOOK_GAS_BUDGET,
        );
        let (hook, result) = match trigger {
            TriggerKind::PostPersist => ("PostPersist", contract.post_persist(&mut ctx)),
            _ => ("OnPersist", contract.on_persist(&mut ctx)),
        };
        if let Err(err) = result {
            error!(
                "{} hook of {} failed, halting block acceptance: {}",
                hook,
                contract.name(),
                err
            );
            return Err(orchestration_failure(contract.name(), hook, err));
        }
    }
    Ok(())
}

fn orchestration_failure(
    contract: &'static str,
    hook: &'static str,
    err: VmError,
) -> BlockchainError {
    BlockchainError::OrchestrationFailure {
        contract,
        hook,
        reason: err.to_string(),
    }
}
