use super::stack_item::{integer_width, ItemError, MapKey, StackItem, StackItemType};
use crate::{
    config::{MAX_INTEGER_SIZE, MAX_ITEM_DEPTH, MAX_VALUE_SIZE},
    serializer::{Reader, ReaderError, Writer},
};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::{cell::RefCell, rc::Rc};
use thiserror::Error;

// Canonical binary form of a stack item tree: one tag byte per item,
// followed by a length-prefixed payload, containers recursing the same
// scheme. This is the exact byte layout persisted under every storage key,
// so two nodes must agree on it bit for bit.
//
// A decode failure is always surfaced to the caller. Substituting a default
// value here would silently fork the chain.

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown item tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("Truncated or malformed input: {0}")]
    Truncated(#[from] ReaderError),

    #[error("Item nesting exceeds the maximum depth of {MAX_ITEM_DEPTH}")]
    DepthExceeded,

    #[error("{0} cannot be persisted")]
    UnserializableType(StackItemType),

    #[error("Integer payload is not in canonical form")]
    NonCanonicalInteger,

    #[error("Encoded value of {0} bytes exceeds the maximum of {MAX_VALUE_SIZE}")]
    ValueTooLarge(usize),

    #[error("Duplicate map key")]
    DuplicateMapKey,

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error("Expected a struct of {expected} fields, found {found}")]
    WrongFieldCount { expected: usize, found: usize },

    #[error("Unexpected {found} in field {field}")]
    UnexpectedField {
        field: &'static str,
        found: StackItemType,
    },

    #[error("Stored bytes are not a valid public key")]
    InvalidPublicKey,

    #[error("Stored balance is negative")]
    NegativeBalance,

    #[error("Stored integer does not fit the target field")]
    IntegerRange,
}

pub fn encode(item: &StackItem) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new();
    write_item(item, &mut writer, 0)?;
    if writer.total_write() > MAX_VALUE_SIZE {
        return Err(CodecError::ValueTooLarge(writer.total_write()));
    }
    Ok(writer.bytes())
}

pub fn decode(bytes: &[u8]) -> Result<StackItem, CodecError> {
    if bytes.len() > MAX_VALUE_SIZE {
        return Err(CodecError::ValueTooLarge(bytes.len()));
    }
    let mut reader = Reader::new(bytes);
    let item = read_item(&mut reader, 0)?;
    if reader.size() != 0 {
        return Err(CodecError::Truncated(ReaderError::TrailingBytes(
            reader.size(),
        )));
    }
    Ok(item)
}

// Self-delimiting form so domain structures can embed items in a larger
// wire stream
pub fn write_item(item: &StackItem, writer: &mut Writer, depth: usize) -> Result<(), CodecError> {
    if depth > MAX_ITEM_DEPTH {
        return Err(CodecError::DepthExceeded);
    }

    writer.write_u8(item.item_type() as u8);
    match item {
        StackItem::Null => {}
        StackItem::Boolean(b) => writer.write_bool(*b),
        StackItem::Integer(i) => write_integer(i, writer),
        StackItem::ByteString(bytes) => {
            writer.write_varuint(bytes.len() as u64);
            writer.write_bytes(bytes);
        }
        StackItem::Array(items) | StackItem::Struct(items) => {
            let items = items.borrow();
            writer.write_varuint(items.len() as u64);
            for item in items.iter() {
                write_item(item, writer, depth + 1)?;
            }
        }
        StackItem::Map(entries) => {
            let entries = entries.borrow();
            writer.write_varuint(entries.len() as u64);
            for (key, value) in entries.iter() {
                write_item(&key.to_item(), writer, depth + 1)?;
                write_item(value, writer, depth + 1)?;
            }
        }
        StackItem::InteropHandle(_) => {
            return Err(CodecError::UnserializableType(StackItemType::InteropHandle))
        }
    }
    Ok(())
}

pub fn read_item(reader: &mut Reader, depth: usize) -> Result<StackItem, CodecError> {
    if depth > MAX_ITEM_DEPTH {
        return Err(CodecError::DepthExceeded);
    }

    let tag = reader.read_u8()?;
    let item_type = StackItemType::from_repr(tag).ok_or(CodecError::UnknownTag(tag))?;
    match item_type {
        StackItemType::Null => Ok(StackItem::Null),
        StackItemType::Boolean => Ok(StackItem::Boolean(reader.read_bool()?)),
        StackItemType::Integer => read_integer(reader),
        StackItemType::ByteString => {
            let len = read_count(reader)?;
            Ok(StackItem::ByteString(reader.read_bytes(len)?))
        }
        StackItemType::Array | StackItemType::Struct => {
            let count = read_count(reader)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_item(reader, depth + 1)?);
            }
            Ok(match item_type {
                StackItemType::Array => StackItem::array(items),
                _ => StackItem::structure(items),
            })
        }
        StackItemType::Map => {
            let count = read_count(reader)?;
            let mut entries = IndexMap::with_capacity(count);
            for _ in 0..count {
                let key = MapKey::from_item(read_item(reader, depth + 1)?)?;
                let value = read_item(reader, depth + 1)?;
                if entries.insert(key, value).is_some() {
                    return Err(CodecError::DuplicateMapKey);
                }
            }
            Ok(StackItem::Map(Rc::new(RefCell::new(entries))))
        }
        StackItemType::InteropHandle => {
            Err(CodecError::UnserializableType(StackItemType::InteropHandle))
        }
    }
}

// Length or element count, bounded by the remaining input so a forged
// prefix cannot trigger a huge allocation
fn read_count(reader: &mut Reader) -> Result<usize, CodecError> {
    let count = reader.read_varuint()?;
    if count > reader.size() as u64 {
        return Err(CodecError::Truncated(ReaderError::InvalidSize));
    }
    Ok(count as usize)
}

// Minimal little-endian two's complement, zero is the empty payload
fn write_integer(value: &BigInt, writer: &mut Writer) {
    if integer_width(value) == 0 {
        writer.write_varuint(0);
        return;
    }
    let bytes = value.to_signed_bytes_le();
    writer.write_varuint(bytes.len() as u64);
    writer.write_bytes(&bytes);
}

fn read_integer(reader: &mut Reader) -> Result<StackItem, CodecError> {
    let len = read_count(reader)?;
    if len > MAX_INTEGER_SIZE {
        return Err(CodecError::Item(ItemError::IntegerOverflow));
    }
    if len == 0 {
        return Ok(StackItem::Integer(BigInt::from(0)));
    }
    let bytes = reader.read_bytes(len)?;
    let value = BigInt::from_signed_bytes_le(&bytes);
    // the only accepted encoding is the one we would produce
    if value.to_signed_bytes_le() != bytes || integer_width(&value) == 0 {
        return Err(CodecError::NonCanonicalInteger);
    }
    Ok(StackItem::Integer(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(item: &StackItem) -> StackItem {
        decode(&encode(item).unwrap()).unwrap()
    }

    #[test]
    fn test_primitive_roundtrip() {
        for item in [
            StackItem::Null,
            StackItem::Boolean(true),
            StackItem::Boolean(false),
            StackItem::from_i64(0),
            StackItem::from_i64(-1),
            StackItem::from_i64(i64::MAX),
            StackItem::ByteString(vec![]),
            StackItem::ByteString(vec![0xFF; 300]),
        ] {
            assert!(roundtrip(&item).deep_equals(&item).unwrap());
        }
    }

    #[test]
    fn test_container_roundtrip() {
        let map = StackItem::map();
        if let StackItem::Map(entries) = &map {
            entries.borrow_mut().insert(
                MapKey::Integer(BigInt::from(3)),
                StackItem::ByteString(vec![1, 2, 3]),
            );
            entries
                .borrow_mut()
                .insert(MapKey::Boolean(false), StackItem::Null);
        }
        let item = StackItem::structure(vec![
            StackItem::from_i64(42),
            StackItem::array(vec![StackItem::Null, StackItem::Boolean(true)]),
            map,
        ]);
        assert!(roundtrip(&item).deep_equals(&item).unwrap());
    }

    #[test]
    fn test_zero_integer_is_empty_payload() {
        let bytes = encode(&StackItem::from_i64(0)).unwrap();
        assert_eq!(bytes, vec![StackItemType::Integer as u8, 0]);
    }

    #[test]
    fn test_non_canonical_integer_rejected() {
        // 1 encoded with a redundant sign byte
        let bytes = vec![StackItemType::Integer as u8, 2, 0x01, 0x00];
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::NonCanonicalInteger)
        ));

        // zero encoded as a single 0x00 byte instead of the empty payload
        let bytes = vec![StackItemType::Integer as u8, 1, 0x00];
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::NonCanonicalInteger)
        ));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(decode(&[0x77]), Err(CodecError::UnknownTag(0x77))));
    }

    #[test]
    fn test_truncated_input() {
        let mut bytes = encode(&StackItem::ByteString(vec![1, 2, 3, 4])).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(decode(&bytes), Err(CodecError::Truncated(_))));

        // empty input is not a valid item either
        assert!(matches!(decode(&[]), Err(CodecError::Truncated(_))));
    }

    #[test]
    fn test_interop_handle_rejected() {
        assert!(matches!(
            encode(&StackItem::InteropHandle(1)),
            Err(CodecError::UnserializableType(StackItemType::InteropHandle))
        ));
    }

    #[test]
    fn test_depth_cap() {
        let mut item = StackItem::array(vec![]);
        for _ in 0..(MAX_ITEM_DEPTH + 1) {
            item = StackItem::array(vec![item]);
        }
        assert!(matches!(encode(&item), Err(CodecError::DepthExceeded)));
    }

    #[test]
    fn test_duplicate_map_key_rejected() {
        let key = encode(&StackItem::from_i64(1)).unwrap();
        let value = encode(&StackItem::Null).unwrap();
        let mut bytes = vec![StackItemType::Map as u8, 2];
        for _ in 0..2 {
            bytes.extend_from_slice(&key);
            bytes.extend_from_slice(&value);
        }
        assert!(matches!(decode(&bytes), Err(CodecError::DuplicateMapKey)));
    }

    // Bounded random trees to exercise the round-trip law beyond the
    // hand-written cases
    fn arb_item(depth: u32) -> BoxedStrategy<StackItem> {
        let leaf = prop_oneof![
            Just(StackItem::Null),
            any::<bool>().prop_map(StackItem::Boolean),
            any::<i64>().prop_map(StackItem::from_i64),
            proptest::collection::vec(any::<u8>(), 0..64).prop_map(StackItem::ByteString),
        ];
        leaf.prop_recursive(depth, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(StackItem::array),
                proptest::collection::vec(inner, 0..4).prop_map(StackItem::structure),
            ]
        })
        .boxed()
    }

    proptest! {
        #[test]
        fn prop_roundtrip(item in arb_item(4)) {
            let decoded = roundtrip(&item);
            prop_assert!(decoded.deep_equals(&item).unwrap());
            // encoding is canonical: re-encoding the decoded tree is byte-identical
            prop_assert_eq!(encode(&decoded).unwrap(), encode(&item).unwrap());
        }
    }
}
