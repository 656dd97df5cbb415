use crate::config::{
    PRICE_ARITHMETIC, PRICE_CHEAP, PRICE_CONTAINER, PRICE_DIVISION, PRICE_PUSH, PRICE_PUSH_DATA,
    PRICE_SLOT_INIT, PRICE_SYSCALL, PRICE_THROW,
};
use strum::{Display, FromRepr};

// Instruction set of the execution engine.
//
// The engine makes no assumption about how a script was produced beyond
// opcode validity: any byte that does not map to a variant below faults the
// script.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum OpCode {
    // Constants. PushData1 carries a one-byte length followed by that many
    // bytes, the integer pushes carry a little-endian two's complement
    // operand.
    PushInt8 = 0x00,
    PushInt64 = 0x01,
    PushTrue = 0x08,
    PushFalse = 0x09,
    PushNull = 0x0B,
    PushData1 = 0x0C,

    // Flow control. Jump offsets are signed one-byte displacements relative
    // to the position of the jump opcode itself.
    Nop = 0x21,
    Jmp = 0x22,
    JmpIf = 0x24,
    JmpIfNot = 0x26,
    Throw = 0x3A,
    Ret = 0x40,
    Syscall = 0x41,

    // Stack manipulation
    Drop = 0x45,
    Dup = 0x4A,
    Over = 0x4B,
    Swap = 0x50,

    // Local variable slots
    InitSlot = 0x56,
    LdLoc = 0x6C,
    StLoc = 0x70,

    // Arithmetic and comparisons over bounded big integers
    Neg = 0x9B,
    Add = 0x9E,
    Sub = 0x9F,
    Mul = 0xA0,
    Div = 0xA1,
    Mod = 0xA2,
    Not = 0xAA,
    NumEqual = 0xB3,
    Lt = 0xB5,
    Gt = 0xB7,

    // Compound types
    Pack = 0xC0,
    Unpack = 0xC1,
    NewArray0 = 0xC2,
    NewStruct0 = 0xC5,
    NewMap = 0xC8,
    Size = 0xCA,
    PickItem = 0xCE,
    Append = 0xCF,
    SetItem = 0xD0,
}

impl OpCode {
    // Size of the fixed operand following the opcode byte.
    // PushData1 additionally consumes the number of bytes its length
    // operand announces.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::PushInt8 => 1,
            OpCode::PushInt64 => 8,
            OpCode::PushData1 => 1,
            OpCode::Jmp | OpCode::JmpIf | OpCode::JmpIfNot => 1,
            OpCode::Syscall => 4,
            OpCode::InitSlot => 1,
            OpCode::LdLoc | OpCode::StLoc => 1,
            _ => 0,
        }
    }

    // Gas charged before the instruction executes
    pub fn price(&self) -> u64 {
        match self {
            OpCode::PushInt8
            | OpCode::PushInt64
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::PushNull => PRICE_PUSH,
            OpCode::PushData1 => PRICE_PUSH_DATA,

            OpCode::Nop
            | OpCode::Jmp
            | OpCode::JmpIf
            | OpCode::JmpIfNot
            | OpCode::Ret
            | OpCode::Drop
            | OpCode::Dup
            | OpCode::Over
            | OpCode::Swap
            | OpCode::LdLoc
            | OpCode::StLoc => PRICE_CHEAP,

            OpCode::Throw => PRICE_THROW,
            OpCode::Syscall => PRICE_SYSCALL,
            OpCode::InitSlot => PRICE_SLOT_INIT,

            OpCode::Neg
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Not
            | OpCode::NumEqual
            | OpCode::Lt
            | OpCode::Gt => PRICE_ARITHMETIC,
            OpCode::Div | OpCode::Mod => PRICE_DIVISION,

            OpCode::Pack
            | OpCode::Unpack
            | OpCode::NewArray0
            | OpCode::NewStruct0
            | OpCode::NewMap
            | OpCode::Size
            | OpCode::PickItem
            | OpCode::Append
            | OpCode::SetItem => PRICE_CONTAINER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_decoding() {
        assert_eq!(OpCode::from_repr(0x40), Some(OpCode::Ret));
        assert_eq!(OpCode::from_repr(0xFE), None);
    }
}
