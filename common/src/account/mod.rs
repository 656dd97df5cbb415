use crate::{
    crypto::PublicKey,
    vm::{codec, CodecError, StackItem},
};
use num_bigint::{BigInt, Sign};

use crate::block::BlockHeight;

// Persisted holder state of a token account.
//
// The canonical byte form is defined transitively: the structure converts
// to a Struct stack item in declared field order, the item tree then
// serializes through the state codec. Decoding the empty byte string yields
// the zero state, that is how "not yet created" reads come back without a
// special case at every call site.

// Utility token (FUEL) holder state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBalance {
    pub balance: BigInt,
}

impl TokenBalance {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.balance.sign() == Sign::NoSign
    }

    pub fn to_stack_item(&self) -> StackItem {
        StackItem::structure(vec![StackItem::Integer(self.balance.clone())])
    }

    pub fn from_stack_item(item: &StackItem) -> Result<Self, CodecError> {
        let fields = struct_fields(item, 1)?;
        Ok(TokenBalance {
            balance: read_balance(&fields[0])?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(&self.to_stack_item())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Ok(Self::zero());
        }
        Self::from_stack_item(&codec::decode(bytes)?)
    }
}

// Governance token (MRD) holder state.
// On top of the balance it tracks the height of the last balance change,
// the accrual basis for utility token rewards, and the optional delegate
// this holder votes for. Absence of a delegate is structural (Null on the
// wire), never a sentinel key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernanceBalance {
    pub balance: BigInt,
    pub balance_height: BlockHeight,
    pub delegate: Option<PublicKey>,
}

impl GovernanceBalance {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.balance.sign() == Sign::NoSign
    }

    // Whether the record must survive a transient zero balance.
    // A bare zero record is pruned from storage to bound growth, but an
    // active delegation is holder state the caller may not discard.
    pub fn retains_state(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn to_stack_item(&self) -> StackItem {
        let delegate = match &self.delegate {
            Some(key) => StackItem::ByteString(key.as_bytes().to_vec()),
            None => StackItem::Null,
        };
        StackItem::structure(vec![
            StackItem::Integer(self.balance.clone()),
            StackItem::Integer(BigInt::from(self.balance_height)),
            delegate,
        ])
    }

    pub fn from_stack_item(item: &StackItem) -> Result<Self, CodecError> {
        let fields = struct_fields(item, 3)?;

        let balance = read_balance(&fields[0])?;
        let balance_height = match &fields[1] {
            StackItem::Integer(height) => {
                u64::try_from(height.clone()).map_err(|_| CodecError::IntegerRange)?
            }
            other => {
                return Err(CodecError::UnexpectedField {
                    field: "balance_height",
                    found: other.item_type(),
                })
            }
        };
        let delegate = match &fields[2] {
            StackItem::Null => None,
            StackItem::ByteString(bytes) => {
                Some(PublicKey::from_bytes(bytes).map_err(|_| CodecError::InvalidPublicKey)?)
            }
            other => {
                return Err(CodecError::UnexpectedField {
                    field: "delegate",
                    found: other.item_type(),
                })
            }
        };

        Ok(GovernanceBalance {
            balance,
            balance_height,
            delegate,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(&self.to_stack_item())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Ok(Self::zero());
        }
        Self::from_stack_item(&codec::decode(bytes)?)
    }
}

fn struct_fields(item: &StackItem, expected: usize) -> Result<Vec<StackItem>, CodecError> {
    let fields = match item {
        StackItem::Struct(fields) => fields.borrow().clone(),
        other => {
            return Err(CodecError::UnexpectedField {
                field: "root",
                found: other.item_type(),
            })
        }
    };
    if fields.len() != expected {
        return Err(CodecError::WrongFieldCount {
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn read_balance(field: &StackItem) -> Result<BigInt, CodecError> {
    match field {
        StackItem::Integer(balance) => {
            if balance.sign() == Sign::Minus {
                return Err(CodecError::NegativeBalance);
            }
            Ok(balance.clone())
        }
        other => Err(CodecError::UnexpectedField {
            field: "balance",
            found: other.item_type(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PUBLIC_KEY_SIZE;

    fn test_key(fill: u8) -> PublicKey {
        let mut bytes = [fill; PUBLIC_KEY_SIZE];
        bytes[0] = 0x02;
        PublicKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_token_balance_roundtrip() {
        let state = TokenBalance {
            balance: BigInt::from(123_456_789u64),
        };
        let decoded = TokenBalance::from_bytes(&state.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_empty_bytes_is_zero_state() {
        assert_eq!(TokenBalance::from_bytes(&[]).unwrap(), TokenBalance::zero());
        let zero = GovernanceBalance::from_bytes(&[]).unwrap();
        assert_eq!(zero, GovernanceBalance::zero());
        assert!(zero.delegate.is_none());
    }

    #[test]
    fn test_governance_balance_roundtrip() {
        for delegate in [None, Some(test_key(9))] {
            let state = GovernanceBalance {
                balance: BigInt::from(42u8),
                balance_height: 1000,
                delegate,
            };
            let decoded = GovernanceBalance::from_bytes(&state.to_bytes().unwrap()).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn test_order_independent_encoding() {
        // two histories arriving at the same state must persist the same bytes
        let a = GovernanceBalance {
            balance: BigInt::from(30u8),
            balance_height: 7,
            delegate: None,
        };
        let b = GovernanceBalance {
            balance: BigInt::from(10u8) + BigInt::from(20u8),
            balance_height: 7,
            delegate: None,
        };
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_negative_balance_rejected() {
        let item = StackItem::structure(vec![StackItem::from_i64(-5)]);
        let bytes = codec::encode(&item).unwrap();
        assert!(matches!(
            TokenBalance::from_bytes(&bytes),
            Err(CodecError::NegativeBalance)
        ));
    }

    #[test]
    fn test_invalid_delegate_key_rejected() {
        let item = StackItem::structure(vec![
            StackItem::from_i64(1),
            StackItem::from_i64(0),
            // delegate bytes with a bad prefix
            StackItem::ByteString(vec![0x09; PUBLIC_KEY_SIZE]),
        ]);
        let bytes = codec::encode(&item).unwrap();
        assert!(matches!(
            GovernanceBalance::from_bytes(&bytes),
            Err(CodecError::InvalidPublicKey)
        ));
    }

    #[test]
    fn test_truncated_state_rejected() {
        let state = GovernanceBalance {
            balance: BigInt::from(1u8),
            balance_height: 2,
            delegate: Some(test_key(1)),
        };
        let mut bytes = state.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(GovernanceBalance::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_wrong_field_count_rejected() {
        let item = StackItem::structure(vec![StackItem::from_i64(1), StackItem::from_i64(2)]);
        let bytes = codec::encode(&item).unwrap();
        assert!(matches!(
            GovernanceBalance::from_bytes(&bytes),
            Err(CodecError::WrongFieldCount {
                expected: 3,
                found: 2
            })
        ));
    }
}
