use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::{Item, TypeTag, Value};

/// Static configuration of one logical table.
///
/// Application code addresses tables by their logical name; the physical name
/// is what the store knows the table as (typically suffixed per environment by
/// whatever provisioned it).
///
/// # Table Structure
///
/// - **Primary Key**: a hash (partition) key and an optional range (sort) key.
///   When `range_key_attr` is absent the table has a simple key.
/// - **Attribute types**: every attribute an item may carry, key attributes
///   included, with its declared [`TypeTag`].
/// - **Indexes**: secondary indexes keyed by index name, each with its own
///   hash key and optional range key.
///
/// # Example
///
/// ```
/// use dynamo_data_layer::dynamodb::{IndexSchema, TableSchema, TypeTag};
///
/// let table = TableSchema::new("Posts", "posts-prod", "userId", Some("date"))
///     .with_attribute("userId", TypeTag::String)
///     .with_attribute("date", TypeTag::Number)
///     .with_attribute("title", TypeTag::String)
///     .with_index("byTitle", IndexSchema::new("title", None));
///
/// assert_eq!(table.physical_name(), "posts-prod");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    logical_name: String,
    physical_name: String,
    hash_key_attr: String,
    #[serde(default)]
    range_key_attr: Option<String>,
    #[serde(default)]
    attribute_types: HashMap<String, TypeTag>,
    #[serde(default)]
    indexes: HashMap<String, IndexSchema>,
}

/// Alternate hash/range pairing over the same table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    hash_key_attr: String,
    #[serde(default)]
    range_key_attr: Option<String>,
}

impl IndexSchema {
    pub fn new(hash_key_attr: impl Into<String>, range_key_attr: Option<&str>) -> Self {
        Self {
            hash_key_attr: hash_key_attr.into(),
            range_key_attr: range_key_attr.map(str::to_string),
        }
    }

    pub fn hash_key_attr(&self) -> &str {
        &self.hash_key_attr
    }

    pub fn range_key_attr(&self) -> Option<&str> {
        self.range_key_attr.as_deref()
    }
}

impl TableSchema {
    /// Creates a table with no declared attributes and no indexes.
    pub fn new(
        logical_name: impl Into<String>,
        physical_name: impl Into<String>,
        hash_key_attr: impl Into<String>,
        range_key_attr: Option<&str>,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            physical_name: physical_name.into(),
            hash_key_attr: hash_key_attr.into(),
            range_key_attr: range_key_attr.map(str::to_string),
            attribute_types: HashMap::new(),
            indexes: HashMap::new(),
        }
    }

    /// Declares an attribute type and returns the modified schema.
    pub fn with_attribute(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.attribute_types.insert(name.into(), tag);
        self
    }

    /// Adds a secondary index and returns the modified schema.
    pub fn with_index(mut self, name: impl Into<String>, index: IndexSchema) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    pub fn hash_key_attr(&self) -> &str {
        &self.hash_key_attr
    }

    pub fn range_key_attr(&self) -> Option<&str> {
        self.range_key_attr.as_deref()
    }

    pub fn attribute_types(&self) -> &HashMap<String, TypeTag> {
        &self.attribute_types
    }

    pub fn indexes(&self) -> &HashMap<String, IndexSchema> {
        &self.indexes
    }

    /// Resolves the hash/range attribute names for the table itself or for
    /// one of its indexes.
    pub fn key_attributes(&self, index_name: Option<&str>) -> Result<(&str, Option<&str>)> {
        match index_name {
            None => Ok((self.hash_key_attr(), self.range_key_attr())),
            Some(name) => {
                let index = self.indexes.get(name).ok_or_else(|| {
                    Error::schema(format!(
                        "index '{name}' not defined on table '{}'",
                        self.logical_name
                    ))
                })?;
                Ok((index.hash_key_attr(), index.range_key_attr()))
            }
        }
    }

    /// Returns the declared type of `attribute`.
    pub fn declared_type(&self, attribute: &str) -> Result<TypeTag> {
        self.attribute_types.get(attribute).copied().ok_or_else(|| {
            Error::schema(format!(
                "attribute '{attribute}' not declared on table '{}'",
                self.logical_name
            ))
        })
    }

    /// Fails unless `value` has exactly the declared shape of `attribute`.
    pub fn check_type(&self, attribute: &str, value: &Value) -> Result<()> {
        let expected = self.declared_type(attribute)?;
        let actual = TypeTag::of(value);
        if expected != actual {
            return Err(Error::TypeMismatch {
                table: self.logical_name.clone(),
                attribute: attribute.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Fails unless `item` carries the hash key and, when defined, the range
    /// key. Other attributes are allowed.
    pub fn require_key_attributes(&self, item: &Item) -> Result<()> {
        let mut required = vec![self.hash_key_attr()];
        required.extend(self.range_key_attr());
        for attr in required {
            if !item.contains(attr) {
                return Err(Error::validation(format!(
                    "missing key attribute '{attr}' for table '{}'",
                    self.logical_name
                )));
            }
        }
        Ok(())
    }

    /// Fails unless `key` is a complete primary key with no extra attributes.
    pub fn validate_key(&self, key: &Item) -> Result<()> {
        self.require_key_attributes(key)?;
        if let Some(extra) = key.names().find(|name| !self.is_key_attribute(name)) {
            return Err(Error::validation(format!(
                "attribute '{extra}' is not part of the key of table '{}'",
                self.logical_name
            )));
        }
        Ok(())
    }

    /// Whether `attribute` is the table's hash or range key.
    pub fn is_key_attribute(&self, attribute: &str) -> bool {
        attribute == self.hash_key_attr || self.range_key_attr() == Some(attribute)
    }

    /// Checks internal consistency: every key attribute of the table and its
    /// indexes is declared with a scalar key type.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut keys = vec![("table", self.hash_key_attr())];
        keys.extend(self.range_key_attr().map(|r| ("table", r)));
        for (name, index) in &self.indexes {
            keys.push((name.as_str(), index.hash_key_attr()));
            keys.extend(index.range_key_attr().map(|r| (name.as_str(), r)));
        }

        for (owner, attr) in keys {
            let tag = self.declared_type(attr).map_err(|_| {
                Error::schema(format!(
                    "key attribute '{attr}' of {owner} on '{}' has no declared type",
                    self.logical_name
                ))
            })?;
            if !tag.is_key_type() {
                return Err(Error::schema(format!(
                    "key attribute '{attr}' on '{}' is declared {tag:?}; keys must be String, Number, or Binary",
                    self.logical_name
                )));
            }
        }
        Ok(())
    }
}
