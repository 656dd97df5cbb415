use super::opcode::OpCode;
use crate::core::interop::SYSCALL_CONTRACT_CALL;
use meridian_common::crypto::Hash;

// Assembles bytecode the engine accepts. Host-side convenience for tests,
// RPC read-only invocations and genesis scripts, never part of consensus
// itself.
#[derive(Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, op: OpCode) -> &mut Self {
        self.script.push(op as u8);
        self
    }

    pub fn emit_with(&mut self, op: OpCode, operand: &[u8]) -> &mut Self {
        self.script.push(op as u8);
        self.script.extend_from_slice(operand);
        self
    }

    pub fn push_int(&mut self, value: i64) -> &mut Self {
        if let Ok(small) = i8::try_from(value) {
            self.emit_with(OpCode::PushInt8, &[small as u8])
        } else {
            self.emit_with(OpCode::PushInt64, &value.to_le_bytes())
        }
    }

    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PushTrue } else { OpCode::PushFalse })
    }

    pub fn push_null(&mut self) -> &mut Self {
        self.emit(OpCode::PushNull)
    }

    pub fn push_data(&mut self, data: &[u8]) -> &mut Self {
        assert!(data.len() <= u8::MAX as usize, "push_data payload too long");
        self.script.push(OpCode::PushData1 as u8);
        self.script.push(data.len() as u8);
        self.script.extend_from_slice(data);
        self
    }

    pub fn syscall(&mut self, id: u32) -> &mut Self {
        self.emit_with(OpCode::Syscall, &id.to_le_bytes())
    }

    // Emit a full contract call. The closure pushes the arguments in
    // declared order and returns how many it pushed, the callee sees them
    // in that same order.
    pub fn call_contract<F>(&mut self, target: &Hash, method: &str, args: F, flags: u8) -> &mut Self
    where
        F: FnOnce(&mut ScriptBuilder) -> usize,
    {
        self.push_data(target.as_bytes());
        self.push_data(method.as_bytes());
        let count = args(self);
        self.push_int(count as i64);
        self.emit(OpCode::Pack);
        self.push_int(flags as i64);
        self.syscall(*SYSCALL_CONTRACT_CALL)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(OpCode::Ret)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.script.clone()
    }
}
