use crate::config::{MAX_INTEGER_SIZE, MAX_ITEM_DEPTH};
use indexmap::IndexMap;
use num_bigint::{BigInt, Sign};
use std::{cell::RefCell, rc::Rc};
use strum::{Display, FromRepr};
use thiserror::Error;

// Tag byte of a stack item in the canonical state encoding.
// InteropHandle has a tag for diagnostics but is rejected by the codec.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum StackItemType {
    Null = 0x00,
    Boolean = 0x01,
    Integer = 0x02,
    ByteString = 0x03,
    Array = 0x10,
    Struct = 0x11,
    Map = 0x12,
    InteropHandle = 0x21,
}

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: StackItemType,
    },

    #[error("Integer exceeds the maximum width of {MAX_INTEGER_SIZE} bytes")]
    IntegerOverflow,

    #[error("Item nesting exceeds the maximum depth of {MAX_ITEM_DEPTH}")]
    DepthExceeded,

    #[error("{0} is not a valid map key type")]
    InvalidMapKey(StackItemType),

    #[error("Index {index} out of range for collection of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Map key not found")]
    KeyNotFound,
}

// The universal runtime value of the execution engine.
//
// Primitive variants (Null, Boolean, Integer, ByteString) have value
// semantics. Array, Struct and Map share their contents by reference:
// pushing one on the stack twice aliases the same storage, and `equals`
// compares identity, not content. Struct additionally supports an explicit
// deep clone used when values cross a contract-call boundary.
#[derive(Debug, Clone)]
pub enum StackItem {
    Null,
    Boolean(bool),
    Integer(BigInt),
    ByteString(Vec<u8>),
    Array(Rc<RefCell<Vec<StackItem>>>),
    Struct(Rc<RefCell<Vec<StackItem>>>),
    Map(Rc<RefCell<IndexMap<MapKey, StackItem>>>),
    InteropHandle(u64),
}

// Keys of a Map item, restricted to the primitive variants so that
// equality and hashing stay well defined
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Boolean(bool),
    Integer(BigInt),
    ByteString(Vec<u8>),
}

impl MapKey {
    pub fn from_item(item: StackItem) -> Result<Self, ItemError> {
        match item {
            StackItem::Boolean(b) => Ok(MapKey::Boolean(b)),
            StackItem::Integer(i) => Ok(MapKey::Integer(i)),
            StackItem::ByteString(b) => Ok(MapKey::ByteString(b)),
            other => Err(ItemError::InvalidMapKey(other.item_type())),
        }
    }

    pub fn to_item(&self) -> StackItem {
        match self {
            MapKey::Boolean(b) => StackItem::Boolean(*b),
            MapKey::Integer(i) => StackItem::Integer(i.clone()),
            MapKey::ByteString(b) => StackItem::ByteString(b.clone()),
        }
    }
}

// Width of a big integer in canonical two's complement bytes, zero encodes
// to nothing
pub(crate) fn integer_width(value: &BigInt) -> usize {
    if value.sign() == Sign::NoSign {
        0
    } else {
        value.to_signed_bytes_le().len()
    }
}

impl StackItem {
    // Integer constructor enforcing the fixed maximum width
    pub fn integer(value: BigInt) -> Result<Self, ItemError> {
        if integer_width(&value) > MAX_INTEGER_SIZE {
            return Err(ItemError::IntegerOverflow);
        }
        Ok(StackItem::Integer(value))
    }

    pub fn from_i64(value: i64) -> Self {
        StackItem::Integer(BigInt::from(value))
    }

    pub fn array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    pub fn structure(fields: Vec<StackItem>) -> Self {
        StackItem::Struct(Rc::new(RefCell::new(fields)))
    }

    pub fn map() -> Self {
        StackItem::Map(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Null,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::InteropHandle(_) => StackItemType::InteropHandle,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    // Truthiness used by conditional jumps: Null is false, numbers by
    // non-zero, byte strings by any non-zero byte, containers are true
    pub fn to_bool(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => i.sign() != Sign::NoSign,
            StackItem::ByteString(bytes) => bytes.iter().any(|b| *b != 0),
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) => true,
            StackItem::InteropHandle(_) => true,
        }
    }

    pub fn try_integer(&self) -> Result<BigInt, ItemError> {
        match self {
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::Boolean(b) => Ok(BigInt::from(*b as u8)),
            other => Err(ItemError::WrongType {
                expected: "Integer",
                found: other.item_type(),
            }),
        }
    }

    pub fn try_bytes(&self) -> Result<Vec<u8>, ItemError> {
        match self {
            StackItem::ByteString(bytes) => Ok(bytes.clone()),
            other => Err(ItemError::WrongType {
                expected: "ByteString",
                found: other.item_type(),
            }),
        }
    }

    // Shared contents of an Array or Struct
    pub fn try_container(&self) -> Result<Rc<RefCell<Vec<StackItem>>>, ItemError> {
        match self {
            StackItem::Array(inner) | StackItem::Struct(inner) => Ok(inner.clone()),
            other => Err(ItemError::WrongType {
                expected: "Array or Struct",
                found: other.item_type(),
            }),
        }
    }

    pub fn try_map(&self) -> Result<Rc<RefCell<IndexMap<MapKey, StackItem>>>, ItemError> {
        match self {
            StackItem::Map(inner) => Ok(inner.clone()),
            other => Err(ItemError::WrongType {
                expected: "Map",
                found: other.item_type(),
            }),
        }
    }

    // Equality as observed by scripts: primitives by value, containers by
    // identity. Use `deep_equals` for a structural comparison.
    pub fn equals(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Null, StackItem::Null) => true,
            (StackItem::Boolean(a), StackItem::Boolean(b)) => a == b,
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (StackItem::ByteString(a), StackItem::ByteString(b)) => a == b,
            (StackItem::Array(a), StackItem::Array(b)) => Rc::ptr_eq(a, b),
            (StackItem::Struct(a), StackItem::Struct(b)) => Rc::ptr_eq(a, b),
            (StackItem::Map(a), StackItem::Map(b)) => Rc::ptr_eq(a, b),
            (StackItem::InteropHandle(a), StackItem::InteropHandle(b)) => a == b,
            _ => false,
        }
    }

    // Structural comparison, bounded by the same depth cap as the codec
    pub fn deep_equals(&self, other: &StackItem) -> Result<bool, ItemError> {
        self.deep_equals_at(other, 0)
    }

    fn deep_equals_at(&self, other: &StackItem, depth: usize) -> Result<bool, ItemError> {
        if depth > MAX_ITEM_DEPTH {
            return Err(ItemError::DepthExceeded);
        }
        match (self, other) {
            (StackItem::Array(a), StackItem::Array(b))
            | (StackItem::Struct(a), StackItem::Struct(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (left, right) in a.iter().zip(b.iter()) {
                    if !left.deep_equals_at(right, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (StackItem::Map(a), StackItem::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    if ka != kb || !va.deep_equals_at(vb, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(self.equals(other)),
        }
    }

    // Explicit clone with value semantics, used when a Struct crosses a
    // contract-call boundary so the callee cannot alias-mutate the caller's
    // value. Nested structs are cloned recursively, reference types (Array,
    // Map) stay shared.
    pub fn deep_clone(&self) -> Result<StackItem, ItemError> {
        self.deep_clone_at(0)
    }

    fn deep_clone_at(&self, depth: usize) -> Result<StackItem, ItemError> {
        if depth > MAX_ITEM_DEPTH {
            return Err(ItemError::DepthExceeded);
        }
        match self {
            StackItem::Struct(fields) => {
                let fields = fields.borrow();
                let mut cloned = Vec::with_capacity(fields.len());
                for field in fields.iter() {
                    cloned.push(field.deep_clone_at(depth + 1)?);
                }
                Ok(StackItem::structure(cloned))
            }
            other => Ok(other.clone()),
        }
    }
}
