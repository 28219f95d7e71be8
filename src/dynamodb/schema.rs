use serde::{Deserialize, Serialize};

use crate::dynamodb::Value;

/// The declared type of an attribute in a table schema.
///
/// DynamoDB itself is schemaless apart from key attributes, but this layer
/// enforces a declared type per attribute so that application code cannot
/// write a string where the rest of the system expects a number.
///
/// # Data Types
///
/// - Scalar Types: String, Number, Binary, Bool, Null
/// - Document Types: List, Map
/// - Set Types: StringSet, NumberSet, BinarySet
///
/// Each tag corresponds to exactly one wire tag (`S`, `N`, `B`, `BOOL`,
/// `NULL`, `L`, `M`, `SS`, `NS`, `BS`).
///
/// # Example
///
/// ```
/// use dynamo_data_layer::dynamodb::{TypeTag, Value};
///
/// assert_eq!(TypeTag::of(&Value::from("abc")), TypeTag::String);
/// assert_eq!(TypeTag::Number.wire_tag(), "N");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    String,
    Number,
    Bool,
    Null,
    StringSet,
    NumberSet,
    BinarySet,
    List,
    Map,
    Binary,
}

impl TypeTag {
    /// Returns the tag matching the runtime shape of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => TypeTag::String,
            Value::Number(_) => TypeTag::Number,
            Value::Bool(_) => TypeTag::Bool,
            Value::Null => TypeTag::Null,
            Value::StringSet(_) => TypeTag::StringSet,
            Value::NumberSet(_) => TypeTag::NumberSet,
            Value::BinarySet(_) => TypeTag::BinarySet,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Map,
            Value::Binary(_) => TypeTag::Binary,
        }
    }

    /// The store's attribute-value tag for this type.
    pub fn wire_tag(self) -> &'static str {
        match self {
            TypeTag::String => "S",
            TypeTag::Number => "N",
            TypeTag::Bool => "BOOL",
            TypeTag::Null => "NULL",
            TypeTag::StringSet => "SS",
            TypeTag::NumberSet => "NS",
            TypeTag::BinarySet => "BS",
            TypeTag::List => "L",
            TypeTag::Map => "M",
            TypeTag::Binary => "B",
        }
    }

    /// Key attributes may only be scalar strings, numbers, or binaries.
    pub fn is_key_type(self) -> bool {
        matches!(self, TypeTag::String | TypeTag::Number | TypeTag::Binary)
    }
}
