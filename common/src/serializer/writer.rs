use crate::crypto::Hash;

// Append-only byte sink, the counterpart of Reader
#[derive(Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { bytes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(value as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_hash(&mut self, hash: &Hash) {
        self.bytes.extend_from_slice(hash.as_bytes());
    }

    // Shortest-form compact unsigned integer, see Reader::read_varuint
    pub fn write_varuint(&mut self, value: u64) {
        match value {
            v if v < 0xFD => self.write_u8(v as u8),
            v if v <= u16::MAX as u64 => {
                self.write_u8(0xFD);
                self.write_u16(v as u16);
            }
            v if v <= u32::MAX as u64 => {
                self.write_u8(0xFE);
                self.write_u32(v as u32);
            }
            v => {
                self.write_u8(0xFF);
                self.write_u64(v);
            }
        }
    }

    pub const fn varuint_size(value: u64) -> usize {
        match value {
            v if v < 0xFD => 1,
            v if v <= u16::MAX as u64 => 3,
            v if v <= u32::MAX as u64 => 5,
            _ => 9,
        }
    }

    pub fn total_write(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes(self) -> Vec<u8> {
        self.bytes
    }
}
