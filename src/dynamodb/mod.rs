//! # DynamoDB Module
//!
//! A schema-driven data-access layer over Amazon DynamoDB (or any store with
//! the same API).
//!
//! ## Components
//!
//! - `DynamoDb`: The client facade. Every operation takes a logical table
//!   name and a `retryable` flag.
//! - `SchemaRegistry` / `TableSchema`: Logical to physical table names, key
//!   attributes, declared attribute types and secondary indexes.
//! - `Item` / `Value`: Native items, independent of the wire format.
//! - `codec`: Conversion between native items and `AttributeValue` maps.
//! - `expression`: Key-condition, projection, and update expression builders.
//! - `batch`: Multi-table batch requests and write chunking.
//! - `store`: The `Store` trait the facade calls through, implemented for the
//!   AWS SDK client.
//!
//! ## Usage
//!
//! The AWS SDK client reads its configuration from the environment:
//!
//! - `AWS_ACCESS_KEY_ID`: Your AWS access key ID.
//! - `AWS_SECRET_ACCESS_KEY`: Your AWS secret access key.
//! - `AWS_REGION`: The AWS region where your DynamoDB tables are located.
//!
//! Optionally, you can also set:
//! - `AWS_SESSION_TOKEN`: If you're using temporary credentials.
//! - `AWS_ENDPOINT_URL`: For using a custom endpoint (e.g., for local development).
//!
//! ## Example
//!
//! ```no_run
//! use dynamo_data_layer::dynamodb::{
//!     DeleteParams, DynamoDb, GetParams, Item, SchemaRegistry, TableSchema, TypeTag,
//!     UpdateParams,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load AWS configuration from environment variables
//!     let config = aws_config::load_from_env().await;
//!
//!     // Declare the tables the application uses
//!     let registry = SchemaRegistry::new([TableSchema::new("Users", "users-prod", "user_id", None)
//!         .with_attribute("user_id", TypeTag::String)
//!         .with_attribute("email", TypeTag::String)
//!         .with_attribute("logins", TypeTag::Number)])?;
//!
//!     let ddb = DynamoDb::from_sdk_config(&config, registry);
//!
//!     let item = Item::new()
//!         .set_string("user_id", "123")
//!         .set_string("email", "user@example.com")
//!         .set_number("logins", 0);
//!     ddb.put("Users", item, true).await?;
//!
//!     let key = Item::new().set_string("user_id", "123");
//!     let found = ddb.get("Users", GetParams::new(key.clone()), true).await?;
//!     assert!(found.is_some());
//!
//!     let updated = ddb
//!         .update(
//!             "Users",
//!             UpdateParams::new(key.clone(), Item::new().set_number("logins", 1)),
//!             true,
//!         )
//!         .await?;
//!     assert_eq!(updated.get_number("logins").and_then(|n| n.as_i64()), Some(1));
//!
//!     ddb.delete("Users", DeleteParams::new(key), true).await?;
//!     Ok(())
//! }
//! ```

pub mod batch;
mod client;
pub mod codec;
pub mod error;
pub mod expression;
mod item;
mod params;
mod registry;
mod schema;
pub mod store;
mod table;

pub use batch::{BatchGetOutput, BatchGetRequest, BatchWriteOutput, BatchWriteRequest, TableKeys, TableWrites};
pub use client::DynamoDb;
pub use error::{Error, Result, StoreError};
pub use expression::RangeCondition;
pub use item::{Item, Number, Value};
pub use params::{DeleteParams, GetParams, QueryParams, RequestExtras, ScanParams, UpdateParams};
pub use registry::SchemaRegistry;
pub use schema::TypeTag;
pub use store::Store;
pub use table::{IndexSchema, TableSchema};
