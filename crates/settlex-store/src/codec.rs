//! Value encoding.
//!
//! Records are JSON. Order values carry a leading type byte so a reader can
//! tell an ask from a bid without parsing the body.

use serde::Serialize;
use serde::de::DeserializeOwned;
use settlex_types::{AskOrder, BidOrder, ExchangeError, Order, OrderId, OrderKind, OrderSide, Result};

pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// `type byte || json(side payload)`. The order id lives in the key.
pub fn encode_order(order: &Order) -> Result<Vec<u8>> {
    let mut value = vec![order.side().type_byte()];
    match &order.kind {
        OrderKind::Ask(ask) => serde_json::to_writer(&mut value, ask)?,
        OrderKind::Bid(bid) => serde_json::to_writer(&mut value, bid)?,
    }
    Ok(value)
}

pub fn decode_order(order_id: OrderId, bytes: &[u8]) -> Result<Order> {
    let Some((&type_byte, body)) = bytes.split_first() else {
        return Err(ExchangeError::Serialization(format!(
            "order {order_id} value is empty"
        )));
    };
    match OrderSide::from_type_byte(type_byte) {
        Some(OrderSide::Ask) => Ok(Order::ask(order_id, decode_json::<AskOrder>(body)?)),
        Some(OrderSide::Bid) => Ok(Order::bid(order_id, decode_json::<BidOrder>(body)?)),
        None => Err(ExchangeError::Serialization(format!(
            "order {order_id} has unknown type byte {type_byte:#04x}"
        ))),
    }
}

/// Decode an index value: a single order type byte.
pub fn decode_side(bytes: &[u8]) -> Result<OrderSide> {
    match bytes {
        [b] => OrderSide::from_type_byte(*b).ok_or_else(|| {
            ExchangeError::Serialization(format!("unknown order type byte {b:#04x}"))
        }),
        _ => Err(ExchangeError::Serialization(format!(
            "order index value has {} bytes, expected 1",
            bytes.len()
        ))),
    }
}

#[must_use]
pub fn encode_u32(v: u32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn decode_u32(bytes: &[u8]) -> Result<u32> {
    let arr: [u8; 4] = bytes.try_into().map_err(|_| {
        ExchangeError::Serialization(format!("expected 4 bytes, found {}", bytes.len()))
    })?;
    Ok(u32::from_be_bytes(arr))
}

#[must_use]
pub fn encode_u64(v: u64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        ExchangeError::Serialization(format!("expected 8 bytes, found {}", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(arr))
}
