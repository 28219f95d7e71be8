//! Conversion between native [`Item`]s and the store's attribute-value wire
//! format.
//!
//! Encoding runs in one of two modes:
//!
//! - **schema-directed**: each top-level attribute must be declared on the
//!   table and its runtime shape must match the declared [`TypeTag`] exactly;
//! - **schema-free**: the wire tag is taken from the value's own shape.
//!
//! Values nested inside a `List` or `Map` are always encoded by their own
//! shape. Nesting is bounded by [`MAX_DEPTH`] in both directions.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::{Item, Number, TableSchema, Value};

/// A wire-format item as exchanged with the store.
pub type WireItem = HashMap<String, AttributeValue>;

/// Deepest nesting of lists and maps accepted in either direction.
pub const MAX_DEPTH: usize = 32;

/// Decodes a wire item into native values.
pub fn decode(wire: WireItem) -> Result<Item> {
    decode_map(wire, 1)
}

/// Decodes a single wire value.
pub fn decode_value(value: AttributeValue) -> Result<Value> {
    decode_at("", value, 1)
}

/// Encodes an item, schema-directed when `schema` is given and schema-free
/// otherwise.
pub fn encode_item(item: &Item, schema: Option<&TableSchema>) -> Result<WireItem> {
    item.iter()
        .map(|(name, value)| {
            if let Some(schema) = schema {
                schema.check_type(name, value)?;
            }
            Ok((name.clone(), encode_at(name, value, 1)?))
        })
        .collect()
}

/// Schema-free encode of a whole item.
pub fn encode(item: &Item) -> Result<WireItem> {
    encode_item(item, None)
}

/// Schema-directed encode of a whole item against `schema`.
pub fn encode_with_schema(item: &Item, schema: &TableSchema) -> Result<WireItem> {
    encode_item(item, Some(schema))
}

/// Schema-free encode of a single value.
pub fn encode_value(value: &Value) -> Result<AttributeValue> {
    encode_at("", value, 1)
}

fn decode_map(wire: WireItem, depth: usize) -> Result<Item> {
    let mut item = Item::new();
    for (name, value) in wire {
        let decoded = decode_at(&name, value, depth)?;
        item.insert(name, decoded);
    }
    Ok(item)
}

fn decode_at(name: &str, value: AttributeValue, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(Error::decode(format!(
            "attribute '{name}' nests deeper than {MAX_DEPTH} levels"
        )));
    }

    Ok(match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(decode_number(name, &n)?),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(true) => Value::Null,
        AttributeValue::Null(false) => {
            return Err(Error::decode(format!(
                "attribute '{name}': NULL must be true"
            )))
        }
        AttributeValue::Ss(values) => Value::StringSet(values),
        AttributeValue::Ns(values) => Value::NumberSet(
            values
                .iter()
                .map(|n| decode_number(name, n))
                .collect::<Result<_>>()?,
        ),
        AttributeValue::Bs(values) => {
            Value::BinarySet(values.into_iter().map(Blob::into_inner).collect())
        }
        AttributeValue::B(blob) => Value::Binary(blob.into_inner()),
        AttributeValue::L(values) => Value::List(
            values
                .into_iter()
                .map(|v| decode_at(name, v, depth + 1))
                .collect::<Result<_>>()?,
        ),
        AttributeValue::M(map) => Value::Map(decode_map(map, depth + 1)?),
        _ => {
            return Err(Error::decode(format!(
                "attribute '{name}': unrecognized attribute value tag"
            )))
        }
    })
}

fn decode_number(name: &str, raw: &str) -> Result<Number> {
    Number::parse(raw).ok_or_else(|| {
        Error::decode(format!("attribute '{name}': '{raw}' is not a number"))
    })
}

fn encode_at(name: &str, value: &Value, depth: usize) -> Result<AttributeValue> {
    if depth > MAX_DEPTH {
        return Err(Error::validation(format!(
            "attribute '{name}' nests deeper than {MAX_DEPTH} levels"
        )));
    }

    Ok(match value {
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Number(n) => AttributeValue::N(encode_number(name, *n)?),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Null => AttributeValue::Null(true),
        Value::StringSet(values) => {
            non_empty_set(name, values)?;
            AttributeValue::Ss(values.clone())
        }
        Value::NumberSet(values) => {
            non_empty_set(name, values)?;
            AttributeValue::Ns(
                values
                    .iter()
                    .map(|n| encode_number(name, *n))
                    .collect::<Result<_>>()?,
            )
        }
        Value::BinarySet(values) => {
            non_empty_set(name, values)?;
            AttributeValue::Bs(values.iter().cloned().map(Blob::new).collect())
        }
        Value::Binary(bytes) => AttributeValue::B(Blob::new(bytes.clone())),
        Value::List(values) => AttributeValue::L(
            values
                .iter()
                .map(|v| encode_at(name, v, depth + 1))
                .collect::<Result<_>>()?,
        ),
        Value::Map(item) => AttributeValue::M(
            item.iter()
                .map(|(k, v)| Ok((k.clone(), encode_at(name, v, depth + 1)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

fn encode_number(name: &str, n: Number) -> Result<String> {
    if !n.is_finite() {
        return Err(Error::UnsupportedType {
            attribute: name.to_string(),
            reason: format!("{n} is not a finite number"),
        });
    }
    Ok(n.to_string())
}

fn non_empty_set<T>(name: &str, values: &[T]) -> Result<()> {
    if values.is_empty() {
        return Err(Error::UnsupportedType {
            attribute: name.to_string(),
            reason: "sets must not be empty".to_string(),
        });
    }
    Ok(())
}
