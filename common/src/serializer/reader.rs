use thiserror::Error;

use crate::crypto::{Hash, HASH_SIZE};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Not enough bytes available")]
    InvalidSize,

    #[error("Invalid value encountered")]
    InvalidValue,

    #[error("Varuint is not in canonical form")]
    NonCanonicalVarUint,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

// Cursor over a borrowed byte slice.
// Every read is bounds-checked, a short buffer is an error and never a panic.
pub struct Reader<'a> {
    bytes: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, total: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], ReaderError> {
        if count > self.bytes.len() {
            return Err(ReaderError::InvalidSize);
        }
        let (head, rest) = self.bytes.split_at(count);
        self.bytes = rest;
        self.total += count;
        Ok(head)
    }

    pub fn read_bool(&mut self) -> Result<bool, ReaderError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes(
            bytes.try_into().map_err(|_| ReaderError::InvalidSize)?,
        ))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(
            bytes.try_into().map_err(|_| ReaderError::InvalidSize)?,
        ))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(
            bytes.try_into().map_err(|_| ReaderError::InvalidSize)?,
        ))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, ReaderError> {
        Ok(self.take(count)?.to_vec())
    }

    pub fn read_bytes_ref(&mut self, count: usize) -> Result<&'a [u8], ReaderError> {
        self.take(count)
    }

    pub fn read_bytes_32(&mut self) -> Result<[u8; 32], ReaderError> {
        let bytes = self.take(32)?;
        bytes.try_into().map_err(|_| ReaderError::InvalidSize)
    }

    pub fn read_hash(&mut self) -> Result<Hash, ReaderError> {
        debug_assert_eq!(HASH_SIZE, 32);
        Ok(Hash::new(self.read_bytes_32()?))
    }

    // Compact unsigned integer: 1 byte below 0xFD, otherwise a marker byte
    // followed by a little-endian u16/u32/u64. The shortest form is the only
    // accepted one, two nodes must agree on the exact byte stream.
    pub fn read_varuint(&mut self) -> Result<u64, ReaderError> {
        let prefix = self.read_u8()?;
        let value = match prefix {
            0xFF => self.read_u64()?,
            0xFE => self.read_u32()? as u64,
            0xFD => self.read_u16()? as u64,
            n => return Ok(n as u64),
        };

        let minimal = match value {
            v if v < 0xFD => 1,
            v if v <= u16::MAX as u64 => 0xFD,
            v if v <= u32::MAX as u64 => 0xFE,
            _ => 0xFF,
        };
        if prefix != minimal {
            return Err(ReaderError::NonCanonicalVarUint);
        }
        Ok(value)
    }

    // Remaining unread bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    // Bytes consumed so far
    pub fn total_read(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let bytes = [1u8, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.size(), 0);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_varuint_canonical() {
        // 0xFD-prefixed encoding of a value that fits a single byte
        let mut reader = Reader::new(&[0xFD, 0x05, 0x00]);
        assert!(matches!(
            reader.read_varuint(),
            Err(ReaderError::NonCanonicalVarUint)
        ));

        let mut reader = Reader::new(&[0xFD, 0x00, 0x01]);
        assert_eq!(reader.read_varuint().unwrap(), 256);
    }

    #[test]
    fn test_truncated_input() {
        let mut reader = Reader::new(&[0xFF, 0x01]);
        assert!(matches!(reader.read_varuint(), Err(ReaderError::InvalidSize)));
    }
}
