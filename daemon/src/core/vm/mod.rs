mod engine;
mod opcode;
mod script;

pub use engine::{CallFrame, ExecutionEngine, VmError, VmState};
pub use opcode::OpCode;
pub use script::ScriptBuilder;
