use crate::core::vm::VmState;
use meridian_common::{crypto::Hash, vm::StackItem};

// Per-transaction execution record surfaced to the RPC/application-log
// consumers. A faulted transaction stays in its block: the record carries
// the terminal state and the diagnostic, never a Rust-level error.
#[derive(Debug)]
pub struct TransactionExecution {
    tx_hash: Hash,
    vm_state: VmState,
    gas_consumed: u64,
    result_stack: Vec<StackItem>,
    diagnostic: Option<String>,
}

impl TransactionExecution {
    pub fn halted(tx_hash: Hash, gas_consumed: u64, result_stack: Vec<StackItem>) -> Self {
        TransactionExecution {
            tx_hash,
            vm_state: VmState::Halt,
            gas_consumed,
            result_stack,
            diagnostic: None,
        }
    }

    pub fn faulted(tx_hash: Hash, gas_consumed: u64, diagnostic: String) -> Self {
        TransactionExecution {
            tx_hash,
            vm_state: VmState::Fault,
            gas_consumed,
            result_stack: Vec::new(),
            diagnostic: Some(diagnostic),
        }
    }

    #[inline]
    pub fn get_tx_hash(&self) -> &Hash {
        &self.tx_hash
    }

    #[inline]
    pub fn get_vm_state(&self) -> VmState {
        self.vm_state
    }

    #[inline]
    pub fn get_gas_consumed(&self) -> u64 {
        self.gas_consumed
    }

    // Top of stack first
    #[inline]
    pub fn get_result_stack(&self) -> &[StackItem] {
        &self.result_stack
    }

    #[inline]
    pub fn get_diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }
}

// Result of a read-only invocation against an ephemeral storage layer
#[derive(Debug)]
pub struct InvocationResult {
    pub vm_state: VmState,
    pub gas_consumed: u64,
    pub result_stack: Vec<StackItem>,
    pub diagnostic: Option<String>,
}
