//! Binary key format (v1).
//!
//! Every key starts with a one-byte record tag. Numeric ids follow as
//! fixed-width big-endian integers; variable-length parts (addresses,
//! external ids) are prefixed with a one-byte length. Byte order of keys is
//! therefore: record type, then market, then id/address. Iteration and
//! genesis export depend on this order, so changing any layout here is a
//! state-breaking change.
//!
//! | tag    | layout                                   | value            |
//! |--------|------------------------------------------|------------------|
//! | `0x00` | params                                   | json             |
//! | `0x01` | market id                                | market json      |
//! | `0x02` | order id                                 | type byte + json |
//! | `0x03` | market id, order id                      | type byte        |
//! | `0x04` | len, owner, order id                     | type byte        |
//! | `0x05` | last market id                           | u32 be           |
//! | `0x06` | last order id                            | u64 be           |
//! | `0x07` | market id, len, external id, order id    | empty            |
//! | `0x08` | len, market address, market id           | empty            |
//! | `'a'`  | len, account, market id                  | empty            |
//! | `'c'`  | market id, len, account                  | coins json       |
//! | `'p'`  | len, source, len, external id            | payment json     |
//! | `'t'`  | len, target, len, source, len, ext id    | empty            |

use settlex_types::{Address, ExchangeError, MarketId, OrderId, Result};

pub const TAG_PARAMS: u8 = 0x00;
pub const TAG_MARKET: u8 = 0x01;
pub const TAG_ORDER: u8 = 0x02;
pub const TAG_MARKET_TO_ORDER: u8 = 0x03;
pub const TAG_OWNER_TO_ORDER: u8 = 0x04;
pub const TAG_LAST_MARKET_ID: u8 = 0x05;
pub const TAG_LAST_ORDER_ID: u8 = 0x06;
pub const TAG_MARKET_EXTERNAL_ID_TO_ORDER: u8 = 0x07;
pub const TAG_ADDRESS_TO_MARKET: u8 = 0x08;
pub const TAG_ACCOUNT_TO_COMMITMENT: u8 = b'a';
pub const TAG_COMMITMENT: u8 = b'c';
pub const TAG_PAYMENT: u8 = b'p';
pub const TAG_TARGET_TO_PAYMENT: u8 = b't';

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

fn push_len_prefixed(key: &mut Vec<u8>, part: &[u8]) -> Result<()> {
    let len = u8::try_from(part.len()).map_err(|_| ExchangeError::InvalidKey {
        reason: format!("key part length {} exceeds 255", part.len()),
    })?;
    key.push(len);
    key.extend_from_slice(part);
    Ok(())
}

/// Split a length-prefixed part off the front of `bytes`.
fn take_len_prefixed(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    let Some((&len, rest)) = bytes.split_first() else {
        return Err(ExchangeError::InvalidKey {
            reason: "missing length byte".into(),
        });
    };
    let len = usize::from(len);
    if rest.len() < len {
        return Err(ExchangeError::InvalidKey {
            reason: format!("length byte {len} exceeds remaining {} bytes", rest.len()),
        });
    }
    Ok(rest.split_at(len))
}

fn take_tag(key: &[u8], tag: u8) -> Result<&[u8]> {
    match key.split_first() {
        Some((&t, rest)) if t == tag => Ok(rest),
        Some((&t, _)) => Err(ExchangeError::InvalidKey {
            reason: format!("expected tag {tag:#04x}, found {t:#04x}"),
        }),
        None => Err(ExchangeError::InvalidKey {
            reason: "empty key".into(),
        }),
    }
}

fn take_market_id(bytes: &[u8]) -> Result<(MarketId, &[u8])> {
    let Some((head, rest)) = bytes.split_first_chunk::<4>() else {
        return Err(ExchangeError::InvalidKey {
            reason: format!("need 4 bytes for a market id, have {}", bytes.len()),
        });
    };
    Ok((MarketId(u32::from_be_bytes(*head)), rest))
}

fn take_order_id(bytes: &[u8]) -> Result<(OrderId, &[u8])> {
    let Some((head, rest)) = bytes.split_first_chunk::<8>() else {
        return Err(ExchangeError::InvalidKey {
            reason: format!("need 8 bytes for an order id, have {}", bytes.len()),
        });
    };
    Ok((OrderId(u64::from_be_bytes(*head)), rest))
}

fn expect_end(rest: &[u8]) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ExchangeError::InvalidKey {
            reason: format!("{} unexpected trailing bytes", rest.len()),
        })
    }
}

fn address_from(bytes: &[u8]) -> Result<Address> {
    Address::new(bytes.to_vec()).map_err(|e| ExchangeError::InvalidKey {
        reason: e.to_string(),
    })
}

fn string_from(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExchangeError::InvalidKey {
        reason: format!("external id is not utf-8: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Params and counters
// ---------------------------------------------------------------------------

#[must_use]
pub fn params_key() -> Vec<u8> {
    vec![TAG_PARAMS]
}

#[must_use]
pub fn last_market_id_key() -> Vec<u8> {
    vec![TAG_LAST_MARKET_ID]
}

#[must_use]
pub fn last_order_id_key() -> Vec<u8> {
    vec![TAG_LAST_ORDER_ID]
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

#[must_use]
pub fn market_prefix() -> Vec<u8> {
    vec![TAG_MARKET]
}

#[must_use]
pub fn market_key(market_id: MarketId) -> Vec<u8> {
    let mut key = market_prefix();
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

pub fn parse_market_key(key: &[u8]) -> Result<MarketId> {
    let rest = take_tag(key, TAG_MARKET)?;
    let (market_id, rest) = take_market_id(rest)?;
    expect_end(rest)?;
    Ok(market_id)
}

/// Custody address index. Each market address is unique, so the prefix
/// holds at most one entry.
pub fn address_to_market_prefix(address: &Address) -> Result<Vec<u8>> {
    let mut key = vec![TAG_ADDRESS_TO_MARKET];
    push_len_prefixed(&mut key, address.as_bytes())?;
    Ok(key)
}

pub fn address_to_market_key(address: &Address, market_id: MarketId) -> Result<Vec<u8>> {
    let mut key = address_to_market_prefix(address)?;
    key.extend_from_slice(&market_id.to_be_bytes());
    Ok(key)
}

pub fn parse_address_to_market_key(key: &[u8]) -> Result<(Address, MarketId)> {
    let rest = take_tag(key, TAG_ADDRESS_TO_MARKET)?;
    let (address, rest) = take_len_prefixed(rest)?;
    let (market_id, rest) = take_market_id(rest)?;
    expect_end(rest)?;
    Ok((address_from(address)?, market_id))
}

// ---------------------------------------------------------------------------
// Orders and their indexes
// ---------------------------------------------------------------------------

#[must_use]
pub fn order_prefix() -> Vec<u8> {
    vec![TAG_ORDER]
}

#[must_use]
pub fn order_key(order_id: OrderId) -> Vec<u8> {
    let mut key = order_prefix();
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

pub fn parse_order_key(key: &[u8]) -> Result<OrderId> {
    let rest = take_tag(key, TAG_ORDER)?;
    let (order_id, rest) = take_order_id(rest)?;
    expect_end(rest)?;
    Ok(order_id)
}

#[must_use]
pub fn market_to_order_prefix(market_id: MarketId) -> Vec<u8> {
    let mut key = vec![TAG_MARKET_TO_ORDER];
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

#[must_use]
pub fn market_to_order_key(market_id: MarketId, order_id: OrderId) -> Vec<u8> {
    let mut key = market_to_order_prefix(market_id);
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

pub fn parse_market_to_order_key(key: &[u8]) -> Result<(MarketId, OrderId)> {
    let rest = take_tag(key, TAG_MARKET_TO_ORDER)?;
    let (market_id, rest) = take_market_id(rest)?;
    let (order_id, rest) = take_order_id(rest)?;
    expect_end(rest)?;
    Ok((market_id, order_id))
}

pub fn owner_to_order_prefix(owner: &Address) -> Result<Vec<u8>> {
    let mut key = vec![TAG_OWNER_TO_ORDER];
    push_len_prefixed(&mut key, owner.as_bytes())?;
    Ok(key)
}

pub fn owner_to_order_key(owner: &Address, order_id: OrderId) -> Result<Vec<u8>> {
    let mut key = owner_to_order_prefix(owner)?;
    key.extend_from_slice(&order_id.to_be_bytes());
    Ok(key)
}

pub fn parse_owner_to_order_key(key: &[u8]) -> Result<(Address, OrderId)> {
    let rest = take_tag(key, TAG_OWNER_TO_ORDER)?;
    let (owner, rest) = take_len_prefixed(rest)?;
    let (order_id, rest) = take_order_id(rest)?;
    expect_end(rest)?;
    Ok((address_from(owner)?, order_id))
}

pub fn external_id_to_order_prefix(market_id: MarketId, external_id: &str) -> Result<Vec<u8>> {
    let mut key = vec![TAG_MARKET_EXTERNAL_ID_TO_ORDER];
    key.extend_from_slice(&market_id.to_be_bytes());
    push_len_prefixed(&mut key, external_id.as_bytes())?;
    Ok(key)
}

pub fn external_id_to_order_key(
    market_id: MarketId,
    external_id: &str,
    order_id: OrderId,
) -> Result<Vec<u8>> {
    let mut key = external_id_to_order_prefix(market_id, external_id)?;
    key.extend_from_slice(&order_id.to_be_bytes());
    Ok(key)
}

pub fn parse_external_id_to_order_key(key: &[u8]) -> Result<(MarketId, String, OrderId)> {
    let rest = take_tag(key, TAG_MARKET_EXTERNAL_ID_TO_ORDER)?;
    let (market_id, rest) = take_market_id(rest)?;
    let (external_id, rest) = take_len_prefixed(rest)?;
    let (order_id, rest) = take_order_id(rest)?;
    expect_end(rest)?;
    Ok((market_id, string_from(external_id)?, order_id))
}

// ---------------------------------------------------------------------------
// Commitments
// ---------------------------------------------------------------------------

#[must_use]
pub fn commitment_prefix() -> Vec<u8> {
    vec![TAG_COMMITMENT]
}

#[must_use]
pub fn commitment_market_prefix(market_id: MarketId) -> Vec<u8> {
    let mut key = commitment_prefix();
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

pub fn commitment_key(market_id: MarketId, account: &Address) -> Result<Vec<u8>> {
    let mut key = commitment_market_prefix(market_id);
    push_len_prefixed(&mut key, account.as_bytes())?;
    Ok(key)
}

pub fn parse_commitment_key(key: &[u8]) -> Result<(MarketId, Address)> {
    let rest = take_tag(key, TAG_COMMITMENT)?;
    let (market_id, rest) = take_market_id(rest)?;
    let (account, rest) = take_len_prefixed(rest)?;
    expect_end(rest)?;
    Ok((market_id, address_from(account)?))
}

pub fn account_to_commitment_prefix(account: &Address) -> Result<Vec<u8>> {
    let mut key = vec![TAG_ACCOUNT_TO_COMMITMENT];
    push_len_prefixed(&mut key, account.as_bytes())?;
    Ok(key)
}

pub fn account_to_commitment_key(account: &Address, market_id: MarketId) -> Result<Vec<u8>> {
    let mut key = account_to_commitment_prefix(account)?;
    key.extend_from_slice(&market_id.to_be_bytes());
    Ok(key)
}

pub fn parse_account_to_commitment_key(key: &[u8]) -> Result<(Address, MarketId)> {
    let rest = take_tag(key, TAG_ACCOUNT_TO_COMMITMENT)?;
    let (account, rest) = take_len_prefixed(rest)?;
    let (market_id, rest) = take_market_id(rest)?;
    expect_end(rest)?;
    Ok((address_from(account)?, market_id))
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[must_use]
pub fn payment_prefix() -> Vec<u8> {
    vec![TAG_PAYMENT]
}

pub fn payment_source_prefix(source: &Address) -> Result<Vec<u8>> {
    let mut key = payment_prefix();
    push_len_prefixed(&mut key, source.as_bytes())?;
    Ok(key)
}

pub fn payment_key(source: &Address, external_id: &str) -> Result<Vec<u8>> {
    let mut key = payment_source_prefix(source)?;
    push_len_prefixed(&mut key, external_id.as_bytes())?;
    Ok(key)
}

pub fn parse_payment_key(key: &[u8]) -> Result<(Address, String)> {
    let rest = take_tag(key, TAG_PAYMENT)?;
    let (source, rest) = take_len_prefixed(rest)?;
    let (external_id, rest) = take_len_prefixed(rest)?;
    expect_end(rest)?;
    Ok((address_from(source)?, string_from(external_id)?))
}

pub fn target_to_payment_prefix(target: &Address) -> Result<Vec<u8>> {
    let mut key = vec![TAG_TARGET_TO_PAYMENT];
    push_len_prefixed(&mut key, target.as_bytes())?;
    Ok(key)
}

pub fn target_to_payment_key(
    target: &Address,
    source: &Address,
    external_id: &str,
) -> Result<Vec<u8>> {
    let mut key = target_to_payment_prefix(target)?;
    push_len_prefixed(&mut key, source.as_bytes())?;
    push_len_prefixed(&mut key, external_id.as_bytes())?;
    Ok(key)
}

/// Returns `(target, source, external_id)`.
pub fn parse_target_to_payment_key(key: &[u8]) -> Result<(Address, Address, String)> {
    let rest = take_tag(key, TAG_TARGET_TO_PAYMENT)?;
    let (target, rest) = take_len_prefixed(rest)?;
    let (source, rest) = take_len_prefixed(rest)?;
    let (external_id, rest) = take_len_prefixed(rest)?;
    expect_end(rest)?;
    Ok((
        address_from(target)?,
        address_from(source)?,
        string_from(external_id)?,
    ))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn addr(bytes: &[u8]) -> Address {
        Address::new(bytes.to_vec()).unwrap()
    }

    #[test]
    fn market_key_layout() {
        assert_eq!(market_key(MarketId(258)), vec![0x01, 0, 0, 1, 2]);
        assert_eq!(parse_market_key(&market_key(MarketId(258))).unwrap(), MarketId(258));
    }

    #[test]
    fn order_key_layout() {
        assert_eq!(order_key(OrderId(1)), vec![0x02, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn owner_index_layout() {
        let key = owner_to_order_key(&addr(&[0xaa, 0xbb]), OrderId(5)).unwrap();
        assert_eq!(key, vec![0x04, 2, 0xaa, 0xbb, 0, 0, 0, 0, 0, 0, 0, 5]);
        let (owner, id) = parse_owner_to_order_key(&key).unwrap();
        assert_eq!(owner, addr(&[0xaa, 0xbb]));
        assert_eq!(id, OrderId(5));
    }

    #[test]
    fn external_id_index_decodes() {
        let key = external_id_to_order_key(MarketId(3), "abc", OrderId(9)).unwrap();
        assert_eq!(
            parse_external_id_to_order_key(&key).unwrap(),
            (MarketId(3), "abc".to_string(), OrderId(9))
        );
        assert!(key.starts_with(&external_id_to_order_prefix(MarketId(3), "abc").unwrap()));
    }

    #[test]
    fn commitment_key_layout() {
        let key = commitment_key(MarketId(1), &addr(&[7])).unwrap();
        assert_eq!(key, vec![b'c', 0, 0, 0, 1, 1, 7]);
        assert_eq!(parse_commitment_key(&key).unwrap(), (MarketId(1), addr(&[7])));
    }

    #[test]
    fn account_commitment_index_orders_by_market() {
        let account = addr(&[7, 7]);
        let k1 = account_to_commitment_key(&account, MarketId(2)).unwrap();
        let k2 = account_to_commitment_key(&account, MarketId(10)).unwrap();
        assert_eq!(k1, vec![b'a', 2, 7, 7, 0, 0, 0, 2]);
        assert!(k1 < k2);
        assert!(k2.starts_with(&account_to_commitment_prefix(&account).unwrap()));
        assert_eq!(
            parse_account_to_commitment_key(&k2).unwrap(),
            (account, MarketId(10))
        );
        assert!(parse_account_to_commitment_key(&[b'a', 1, 7, 0, 0, 1]).is_err());
    }

    #[test]
    fn address_market_index_decodes() {
        let key = address_to_market_key(&addr(&[0xcc]), MarketId(258)).unwrap();
        assert_eq!(key, vec![0x08, 1, 0xcc, 0, 0, 1, 2]);
        assert_eq!(
            parse_address_to_market_key(&key).unwrap(),
            (addr(&[0xcc]), MarketId(258))
        );
        assert!(!key.starts_with(&address_to_market_prefix(&addr(&[0xcc, 0])).unwrap()));
    }

    #[test]
    fn payment_keys_decode() {
        let source = addr(&[1, 2, 3]);
        let target = addr(&[9]);
        let key = payment_key(&source, "order-42").unwrap();
        assert_eq!(key[0], b'p');
        assert_eq!(
            parse_payment_key(&key).unwrap(),
            (source.clone(), "order-42".to_string())
        );
        let key = target_to_payment_key(&target, &source, "order-42").unwrap();
        assert_eq!(
            parse_target_to_payment_key(&key).unwrap(),
            (target, source, "order-42".to_string())
        );
    }

    #[test]
    fn empty_external_id_is_allowed() {
        let key = payment_key(&addr(&[1]), "").unwrap();
        assert_eq!(key, vec![b'p', 1, 1, 0]);
    }

    #[test]
    fn oversize_part_rejected() {
        let long = "x".repeat(256);
        assert!(matches!(
            payment_key(&addr(&[1]), &long).unwrap_err(),
            ExchangeError::InvalidKey { .. }
        ));
    }

    #[test]
    fn malformed_keys_rejected() {
        assert!(parse_market_key(&[]).is_err());
        assert!(parse_market_key(&[0x02, 0, 0, 0, 1]).is_err());
        assert!(parse_market_key(&[0x01, 0, 0, 1]).is_err());
        assert!(parse_market_key(&[0x01, 0, 0, 0, 1, 0]).is_err());
        assert!(parse_commitment_key(&[b'c', 0, 0, 0, 1, 5, 1]).is_err());
    }

    #[test]
    fn record_types_group_before_ids() {
        let mut keys = vec![
            commitment_key(MarketId(1), &addr(&[1])).unwrap(),
            order_key(OrderId(1)),
            market_key(MarketId(u32::MAX)),
            params_key(),
            market_to_order_key(MarketId(1), OrderId(1)),
        ];
        keys.sort();
        assert_eq!(keys[0], params_key());
        assert_eq!(keys[1], market_key(MarketId(u32::MAX)));
        assert_eq!(keys[2], order_key(OrderId(1)));
        assert_eq!(keys[4][0], b'c');
    }

    proptest! {
        #[test]
        fn order_key_order_matches_id_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(a.cmp(&b), order_key(OrderId(a)).cmp(&order_key(OrderId(b))));
        }

        #[test]
        fn market_index_groups_by_market_then_order(
            m1 in any::<u32>(), o1 in any::<u64>(),
            m2 in any::<u32>(), o2 in any::<u64>(),
        ) {
            let k1 = market_to_order_key(MarketId(m1), OrderId(o1));
            let k2 = market_to_order_key(MarketId(m2), OrderId(o2));
            prop_assert_eq!((m1, o1).cmp(&(m2, o2)), k1.cmp(&k2));
        }

        #[test]
        fn commitment_key_decodes(m in any::<u32>(), bytes in proptest::collection::vec(any::<u8>(), 1..=255)) {
            let account = Address::new(bytes).unwrap();
            let key = commitment_key(MarketId(m), &account).unwrap();
            prop_assert_eq!(parse_commitment_key(&key).unwrap(), (MarketId(m), account));
        }
    }
}
