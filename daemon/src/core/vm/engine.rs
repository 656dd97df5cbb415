use super::opcode::OpCode;
use crate::{
    config::{MAX_INVOCATION_DEPTH, MAX_LOCAL_SLOTS, MAX_STACK_SIZE},
    core::{interop, interop::InteropContext, storage::StorageError},
};
use log::debug;
use meridian_common::{
    crypto::{hash, Hash},
    vm::{CodecError, ItemError, MapKey, StackItem},
};
use num_bigint::BigInt;
use std::rc::Rc;
use strum::Display;
use thiserror::Error;

// Terminal state of a script execution.
// Break means the engine has not finished yet: `execute` loops until the
// state leaves Break, a single `step` may be observed in it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Halt,
    Fault,
    Break,
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Stack size exceeds the maximum of {MAX_STACK_SIZE}")]
    StackOverflow,

    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Script ends in the middle of an instruction")]
    TruncatedScript,

    #[error("Jump target {0} out of bounds")]
    InvalidJump(isize),

    #[error("Invalid local slot {0}")]
    InvalidSlot(usize),

    #[error("Invocation depth exceeds the maximum of {MAX_INVOCATION_DEPTH}")]
    CallDepthExceeded,

    #[error("Out of gas: needed {needed}, {available} available")]
    OutOfGas { needed: u64, available: u64 },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Uncaught exception: {0}")]
    UncaughtException(String),

    #[error("Unknown syscall: {0:#010x}")]
    UnknownSyscall(u32),

    #[error("Unknown contract: {0}")]
    UnknownContract(Hash),

    #[error("Unknown method {contract}::{method} with {arity} arguments")]
    UnknownMethod {
        contract: String,
        method: String,
        arity: usize,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: BigInt, have: BigInt },

    #[error("Container size exceeds the maximum of {MAX_STACK_SIZE}")]
    ContainerTooLarge,

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// One entry of the call-frame stack. The script hash is the calling
// contract identity used by permission checks, locals are reserved by
// InitSlot.
pub struct CallFrame {
    script: Rc<Vec<u8>>,
    script_hash: Hash,
    call_flags: u8,
    ip: usize,
    locals: Vec<StackItem>,
}

impl CallFrame {
    fn new(script: Vec<u8>, call_flags: u8) -> Self {
        let script_hash = hash(&script);
        CallFrame {
            script: Rc::new(script),
            script_hash,
            call_flags,
            ip: 0,
            locals: Vec::new(),
        }
    }

    pub fn script_hash(&self) -> &Hash {
        &self.script_hash
    }

    pub fn call_flags(&self) -> u8 {
        self.call_flags
    }
}

// Stack-based bytecode interpreter.
//
// Owns the operand stack and the call-frame stack, all other execution
// state (storage view, trigger, gas counter) lives in the InteropContext
// passed to every step. Every error raised during a step collapses into
// the Fault state with a diagnostic, callers never see it as a Rust error.
pub struct ExecutionEngine {
    stack: Vec<StackItem>,
    frames: Vec<CallFrame>,
    state: VmState,
    fault_reason: Option<String>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        ExecutionEngine {
            stack: Vec::new(),
            frames: Vec::new(),
            state: VmState::Break,
            fault_reason: None,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn fault_reason(&self) -> Option<&str> {
        self.fault_reason.as_deref()
    }

    // Operand stack left behind by a halted script, top of stack first
    pub fn result_stack(&mut self) -> Vec<StackItem> {
        let mut stack = std::mem::take(&mut self.stack);
        stack.reverse();
        stack
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    // Load a script as a new call frame
    pub fn load_script(&mut self, script: Vec<u8>, call_flags: u8) -> Result<(), VmError> {
        if self.frames.len() >= MAX_INVOCATION_DEPTH {
            return Err(VmError::CallDepthExceeded);
        }
        self.frames.push(CallFrame::new(script, call_flags));
        Ok(())
    }

    pub fn push(&mut self, item: StackItem) -> Result<(), VmError> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<StackItem, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_integer(&mut self) -> Result<BigInt, VmError> {
        Ok(self.pop()?.try_integer()?)
    }

    // Run the loaded scripts to a terminal state
    pub fn execute(&mut self, ctx: &mut InteropContext) -> VmState {
        while self.state == VmState::Break {
            if let Err(err) = self.step(ctx) {
                debug!("script faulted: {}", err);
                self.fault_reason = Some(err.to_string());
                // a faulted execution leaves zero stack results
                self.stack.clear();
                self.frames.clear();
                self.state = VmState::Fault;
            }
        }
        self.state
    }

    // Execute a single instruction. Gas is charged up front, preemption
    // happens only through the gas counter and the fixed depth/size
    // budgets, never through wall-clock time.
    pub fn step(&mut self, ctx: &mut InteropContext) -> Result<(), VmError> {
        let (script, op_pos) = match self.frames.last() {
            Some(frame) => (frame.script.clone(), frame.ip),
            None => {
                self.state = VmState::Halt;
                return Ok(());
            }
        };

        if op_pos >= script.len() {
            // running off the end of a script is an implicit return
            self.do_ret();
            return Ok(());
        }

        let byte = script[op_pos];
        let op = OpCode::from_repr(byte).ok_or(VmError::InvalidOpcode(byte))?;
        ctx.use_gas(op.price())?;

        let mut next_ip = op_pos + 1 + op.operand_size();
        if next_ip > script.len() {
            return Err(VmError::TruncatedScript);
        }
        let operand = script[op_pos + 1..next_ip].to_vec();

        let mut data = Vec::new();
        if op == OpCode::PushData1 {
            let len = operand[0] as usize;
            if next_ip + len > script.len() {
                return Err(VmError::TruncatedScript);
            }
            data = script[next_ip..next_ip + len].to_vec();
            next_ip += len;
        }

        if let Some(frame) = self.frames.last_mut() {
            frame.ip = next_ip;
        }

        match op {
            OpCode::PushInt8 => self.push(StackItem::from_i64(operand[0] as i8 as i64))?,
            OpCode::PushInt64 => {
                let bytes: [u8; 8] = operand
                    .as_slice()
                    .try_into()
                    .map_err(|_| VmError::TruncatedScript)?;
                self.push(StackItem::from_i64(i64::from_le_bytes(bytes)))?;
            }
            OpCode::PushTrue => self.push(StackItem::Boolean(true))?,
            OpCode::PushFalse => self.push(StackItem::Boolean(false))?,
            OpCode::PushNull => self.push(StackItem::Null)?,
            OpCode::PushData1 => self.push(StackItem::ByteString(data))?,

            OpCode::Nop => {}
            OpCode::Jmp => self.do_jump(op_pos, operand[0] as i8, &script)?,
            OpCode::JmpIf => {
                if self.pop()?.to_bool() {
                    self.do_jump(op_pos, operand[0] as i8, &script)?;
                }
            }
            OpCode::JmpIfNot => {
                if !self.pop()?.to_bool() {
                    self.do_jump(op_pos, operand[0] as i8, &script)?;
                }
            }
            OpCode::Throw => {
                let item = self.pop()?;
                let message = match &item {
                    StackItem::ByteString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                    other => format!("{:?}", other),
                };
                return Err(VmError::UncaughtException(message));
            }
            OpCode::Ret => self.do_ret(),
            OpCode::Syscall => {
                let bytes: [u8; 4] = operand
                    .as_slice()
                    .try_into()
                    .map_err(|_| VmError::TruncatedScript)?;
                let id = u32::from_le_bytes(bytes);
                interop::invoke_syscall(self, ctx, id)?;
            }

            OpCode::Drop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let top = self.stack.last().ok_or(VmError::StackUnderflow)?.clone();
                self.push(top)?;
            }
            OpCode::Over => {
                if self.stack.len() < 2 {
                    return Err(VmError::StackUnderflow);
                }
                let item = self.stack[self.stack.len() - 2].clone();
                self.push(item)?;
            }
            OpCode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2);
            }

            OpCode::InitSlot => {
                let count = operand[0] as usize;
                if count > MAX_LOCAL_SLOTS {
                    return Err(VmError::InvalidSlot(count));
                }
                let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                if !frame.locals.is_empty() {
                    return Err(VmError::InvalidSlot(count));
                }
                frame.locals = vec![StackItem::Null; count];
            }
            OpCode::LdLoc => {
                let index = operand[0] as usize;
                let frame = self.frames.last().ok_or(VmError::StackUnderflow)?;
                let value = frame
                    .locals
                    .get(index)
                    .cloned()
                    .ok_or(VmError::InvalidSlot(index))?;
                self.push(value)?;
            }
            OpCode::StLoc => {
                let index = operand[0] as usize;
                let value = self.pop()?;
                let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                let slot = frame
                    .locals
                    .get_mut(index)
                    .ok_or(VmError::InvalidSlot(index))?;
                *slot = value;
            }

            OpCode::Neg => {
                let value = self.pop_integer()?;
                self.push(StackItem::integer(-value)?)?;
            }
            OpCode::Add => self.do_binary_op(|a, b| a + b)?,
            OpCode::Sub => self.do_binary_op(|a, b| a - b)?,
            OpCode::Mul => self.do_binary_op(|a, b| a * b)?,
            OpCode::Div => {
                let (a, b) = self.pop_operands()?;
                if b == BigInt::from(0) {
                    return Err(VmError::DivisionByZero);
                }
                self.push(StackItem::integer(a / b)?)?;
            }
            OpCode::Mod => {
                let (a, b) = self.pop_operands()?;
                if b == BigInt::from(0) {
                    return Err(VmError::DivisionByZero);
                }
                self.push(StackItem::integer(a % b)?)?;
            }
            OpCode::Not => {
                let value = self.pop()?.to_bool();
                self.push(StackItem::Boolean(!value))?;
            }
            OpCode::NumEqual => {
                let (a, b) = self.pop_operands()?;
                self.push(StackItem::Boolean(a == b))?;
            }
            OpCode::Lt => {
                let (a, b) = self.pop_operands()?;
                self.push(StackItem::Boolean(a < b))?;
            }
            OpCode::Gt => {
                let (a, b) = self.pop_operands()?;
                self.push(StackItem::Boolean(a > b))?;
            }

            OpCode::Pack => {
                let count = self.pop_integer()?;
                let count =
                    usize::try_from(count).map_err(|_| VmError::ContainerTooLarge)?;
                if count > MAX_STACK_SIZE {
                    return Err(VmError::ContainerTooLarge);
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                // keep push order: the earliest pushed item becomes element zero
                items.reverse();
                self.push(StackItem::array(items))?;
            }
            OpCode::Unpack => {
                let container = self.pop()?.try_container()?;
                let items = container.borrow().clone();
                let count = items.len();
                // inverse of Pack: element zero ends up deepest
                for item in items {
                    self.push(item)?;
                }
                self.push(StackItem::from_i64(count as i64))?;
            }
            OpCode::NewArray0 => self.push(StackItem::array(Vec::new()))?,
            OpCode::NewStruct0 => self.push(StackItem::structure(Vec::new()))?,
            OpCode::NewMap => self.push(StackItem::map())?,
            OpCode::Size => {
                let item = self.pop()?;
                let size = match &item {
                    StackItem::ByteString(bytes) => bytes.len(),
                    StackItem::Array(items) | StackItem::Struct(items) => items.borrow().len(),
                    StackItem::Map(entries) => entries.borrow().len(),
                    other => {
                        return Err(VmError::Item(ItemError::WrongType {
                            expected: "collection",
                            found: other.item_type(),
                        }))
                    }
                };
                self.push(StackItem::from_i64(size as i64))?;
            }
            OpCode::PickItem => {
                let key = self.pop()?;
                let collection = self.pop()?;
                let value = match &collection {
                    StackItem::Array(items) | StackItem::Struct(items) => {
                        let index = to_index(&key)?;
                        let items = items.borrow();
                        items
                            .get(index)
                            .cloned()
                            .ok_or(ItemError::IndexOutOfRange {
                                index,
                                size: items.len(),
                            })?
                    }
                    StackItem::Map(entries) => {
                        let key = MapKey::from_item(key)?;
                        entries
                            .borrow()
                            .get(&key)
                            .cloned()
                            .ok_or(ItemError::KeyNotFound)?
                    }
                    other => {
                        return Err(VmError::Item(ItemError::WrongType {
                            expected: "collection",
                            found: other.item_type(),
                        }))
                    }
                };
                self.push(value)?;
            }
            OpCode::SetItem => {
                let value = self.pop()?;
                // struct values keep value semantics when stored
                let value = match &value {
                    StackItem::Struct(_) => value.deep_clone()?,
                    _ => value,
                };
                let key = self.pop()?;
                let collection = self.pop()?;
                match &collection {
                    StackItem::Array(items) | StackItem::Struct(items) => {
                        let index = to_index(&key)?;
                        let mut items = items.borrow_mut();
                        let size = items.len();
                        let slot = items
                            .get_mut(index)
                            .ok_or(ItemError::IndexOutOfRange { index, size })?;
                        *slot = value;
                    }
                    StackItem::Map(entries) => {
                        let key = MapKey::from_item(key)?;
                        let mut entries = entries.borrow_mut();
                        if entries.len() >= MAX_STACK_SIZE && !entries.contains_key(&key) {
                            return Err(VmError::ContainerTooLarge);
                        }
                        entries.insert(key, value);
                    }
                    other => {
                        return Err(VmError::Item(ItemError::WrongType {
                            expected: "collection",
                            found: other.item_type(),
                        }))
                    }
                }
            }
            OpCode::Append => {
                let value = self.pop()?;
                let value = match &value {
                    StackItem::Struct(_) => value.deep_clone()?,
                    _ => value,
                };
                let container = self.pop()?.try_container()?;
                let mut items = container.borrow_mut();
                if items.len() >= MAX_STACK_SIZE {
                    return Err(VmError::ContainerTooLarge);
                }
                items.push(value);
            }
        }

        Ok(())
    }

    fn do_ret(&mut self) {
        self.frames.pop();
        if self.frames.is_empty() {
            self.state = VmState::Halt;
        }
    }

    fn do_jump(&mut self, op_pos: usize, offset: i8, script: &[u8]) -> Result<(), VmError> {
        let target = op_pos as isize + offset as isize;
        if target < 0 || target > script.len() as isize {
            return Err(VmError::InvalidJump(target));
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = target as usize;
        }
        Ok(())
    }

    fn pop_operands(&mut self) -> Result<(BigInt, BigInt), VmError> {
        let b = self.pop_integer()?;
        let a = self.pop_integer()?;
        Ok((a, b))
    }

    fn do_binary_op<F: FnOnce(BigInt, BigInt) -> BigInt>(&mut self, f: F) -> Result<(), VmError> {
        let (a, b) = self.pop_operands()?;
        self.push(StackItem::integer(f(a, b))?)
    }
}

fn to_index(key: &StackItem) -> Result<usize, VmError> {
    let index = key.try_integer()?;
    usize::try_from(index).map_err(|_| {
        VmError::InvalidArgument("negative or oversized collection index".to_string())
    })
}
