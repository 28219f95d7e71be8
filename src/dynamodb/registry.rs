use std::collections::HashMap;
use std::path::Path;

use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::TableSchema;

/// Every table the data layer knows about, by logical name.
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// between concurrent requests without locking.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
    physical_to_logical: HashMap<String, String>,
}

impl SchemaRegistry {
    /// Builds the registry, validating every table.
    ///
    /// Logical names and physical names must each be unique, and every key
    /// attribute of a table or index must be declared with a key type.
    pub fn new(tables: impl IntoIterator<Item = TableSchema>) -> Result<Self> {
        let mut registry = Self::default();
        for table in tables {
            table.validate()?;
            if registry.tables.contains_key(table.logical_name()) {
                return Err(Error::schema(format!(
                    "table '{}' is declared twice",
                    table.logical_name()
                )));
            }
            if let Some(other) = registry.physical_to_logical.get(table.physical_name()) {
                return Err(Error::schema(format!(
                    "tables '{other}' and '{}' share physical name '{}'",
                    table.logical_name(),
                    table.physical_name()
                )));
            }
            registry.physical_to_logical.insert(
                table.physical_name().to_string(),
                table.logical_name().to_string(),
            );
            registry
                .tables
                .insert(table.logical_name().to_string(), table);
        }
        Ok(registry)
    }

    /// Builds the registry from a JSON array of table schemas.
    pub fn from_json(json: &str) -> Result<Self> {
        let tables: Vec<TableSchema> = serde_json::from_str(json)
            .map_err(|e| Error::schema(format!("invalid schema configuration: {e}")))?;
        Self::new(tables)
    }

    /// Reads and builds the registry from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::schema(format!("cannot read schema file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Looks up a table by logical name.
    pub fn table(&self, logical_name: &str) -> Result<&TableSchema> {
        self.tables
            .get(logical_name)
            .ok_or_else(|| Error::schema(format!("unknown table '{logical_name}'")))
    }

    pub fn physical_to_logical(&self) -> &HashMap<String, String> {
        &self.physical_to_logical
    }

    /// Logical table names, sorted.
    pub fn logical_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamodb::TypeTag;

    fn users(physical: &str) -> TableSchema {
        TableSchema::new("Users", physical, "id", None).with_attribute("id", TypeTag::String)
    }

    #[test]
    fn test_lookup_by_logical_name() {
        let registry = SchemaRegistry::new([users("users-prod")]).unwrap();
        assert_eq!(registry.table("Users").unwrap().physical_name(), "users-prod");
        assert_eq!(registry.physical_to_logical()["users-prod"], "Users");
        assert!(matches!(registry.table("Orders"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        let dup = SchemaRegistry::new([users("a"), users("b")]);
        assert!(matches!(dup, Err(Error::Schema(_))));

        let orders = TableSchema::new("Orders", "a", "id", None).with_attribute("id", TypeTag::String);
        let shared = SchemaRegistry::new([users("a"), orders]);
        assert!(matches!(shared, Err(Error::Schema(_))));
    }

    #[test]
    fn test_from_json() {
        let registry = SchemaRegistry::from_json(
            r#"[
                {
                    "logical_name": "Posts",
                    "physical_name": "posts-dev",
                    "hash_key_attr": "userId",
                    "range_key_attr": "date",
                    "attribute_types": { "userId": "String", "date": "Number", "title": "String" },
                    "indexes": { "byTitle": { "hash_key_attr": "title" } }
                },
                {
                    "logical_name": "Users",
                    "physical_name": "users-dev",
                    "hash_key_attr": "id",
                    "attribute_types": { "id": "String" }
                }
            ]"#,
        )
        .unwrap();

        assert_eq!(registry.logical_names(), vec!["Posts", "Users"]);
        let posts = registry.table("Posts").unwrap();
        assert_eq!(posts.key_attributes(Some("byTitle")).unwrap(), ("title", None));
    }

    #[test]
    fn test_invalid_json_is_schema_error() {
        assert!(matches!(
            SchemaRegistry::from_json("{ not json"),
            Err(Error::Schema(_))
        ));
    }
}
