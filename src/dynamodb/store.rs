//! The boundary between the data layer and the store itself.
//!
//! Requests and responses here carry physical table names and wire values,
//! shaped like the store's own `PutItem`, `GetItem`, `Query`, `Scan`,
//! `UpdateItem`, `DeleteItem`, `BatchGetItem`, and `BatchWriteItem`
//! parameters. Nothing above [`DynamoDb`](crate::dynamodb::DynamoDb) sees
//! these types.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{KeysAndAttributes, ReturnValue, WriteRequest};
use aws_sdk_dynamodb::Client;

use crate::dynamodb::codec::WireItem;
use crate::dynamodb::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: WireItem,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: WireItem,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub consistent_read: Option<bool>,
}

/// Shared shape of `Query` and `Scan` requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    /// Only set for queries.
    pub key_condition_expression: Option<String>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<WireItem>,
    pub consistent_read: Option<bool>,
    pub limit: Option<i32>,
    pub exclusive_start_key: Option<WireItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: WireItem,
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: WireItem,
    pub return_values: ReturnValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: WireItem,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<WireItem>,
    pub return_values: ReturnValue,
}

/// One page of a query or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<WireItem>,
    pub last_evaluated_key: Option<WireItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResponse {
    pub responses: HashMap<String, Vec<WireItem>>,
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

/// Operations the data layer needs from a store.
///
/// Implemented for the AWS SDK [`Client`]; anything else that speaks the same
/// request shapes (a local emulator, a recording fake) can stand in for it.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put_item(&self, request: PutItemRequest) -> StoreResult<()>;

    /// Returns `None` when the store holds no item under the key.
    async fn get_item(&self, request: GetItemRequest) -> StoreResult<Option<WireItem>>;

    async fn query(&self, request: ReadRequest) -> StoreResult<Page>;

    async fn scan(&self, request: ReadRequest) -> StoreResult<Page>;

    /// Returns the attributes selected by `return_values`, if any.
    async fn update_item(&self, request: UpdateItemRequest) -> StoreResult<Option<WireItem>>;

    /// Returns the attributes selected by `return_values`, if any.
    async fn delete_item(&self, request: DeleteItemRequest) -> StoreResult<Option<WireItem>>;

    async fn batch_get_item(
        &self,
        request_items: HashMap<String, KeysAndAttributes>,
    ) -> StoreResult<BatchGetResponse>;

    /// Returns the unprocessed write requests per table.
    async fn batch_write_item(
        &self,
        request_items: HashMap<String, Vec<WriteRequest>>,
    ) -> StoreResult<HashMap<String, Vec<WriteRequest>>>;
}

fn store_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    StoreError::new(code, DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl Store for Client {
    async fn put_item(&self, request: PutItemRequest) -> StoreResult<()> {
        self.put_item()
            .table_name(request.table_name)
            .set_item(Some(request.item))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get_item(&self, request: GetItemRequest) -> StoreResult<Option<WireItem>> {
        let response = self
            .get_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .set_projection_expression(request.projection_expression)
            .set_expression_attribute_names(request.expression_attribute_names)
            .set_consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(store_error)?;
        Ok(response.item)
    }

    async fn query(&self, request: ReadRequest) -> StoreResult<Page> {
        let response = self
            .query()
            .table_name(request.table_name)
            .set_index_name(request.index_name)
            .set_key_condition_expression(request.key_condition_expression)
            .set_filter_expression(request.filter_expression)
            .set_projection_expression(request.projection_expression)
            .set_expression_attribute_names(request.expression_attribute_names)
            .set_expression_attribute_values(request.expression_attribute_values)
            .set_consistent_read(request.consistent_read)
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await
            .map_err(store_error)?;

        Ok(Page {
            items: response.items.unwrap_or_default(),
            last_evaluated_key: response.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn scan(&self, request: ReadRequest) -> StoreResult<Page> {
        let response = self
            .scan()
            .table_name(request.table_name)
            .set_index_name(request.index_name)
            .set_filter_expression(request.filter_expression)
            .set_projection_expression(request.projection_expression)
            .set_expression_attribute_names(request.expression_attribute_names)
            .set_expression_attribute_values(request.expression_attribute_values)
            .set_consistent_read(request.consistent_read)
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await
            .map_err(store_error)?;

        Ok(Page {
            items: response.items.unwrap_or_default(),
            last_evaluated_key: response.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn update_item(&self, request: UpdateItemRequest) -> StoreResult<Option<WireItem>> {
        let response = self
            .update_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .update_expression(request.update_expression)
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(Some(request.expression_attribute_names))
            .set_expression_attribute_values(Some(request.expression_attribute_values))
            .return_values(request.return_values)
            .send()
            .await
            .map_err(store_error)?;
        Ok(response.attributes)
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> StoreResult<Option<WireItem>> {
        let response = self
            .delete_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(request.expression_attribute_names)
            .set_expression_attribute_values(request.expression_attribute_values)
            .return_values(request.return_values)
            .send()
            .await
            .map_err(store_error)?;
        Ok(response.attributes)
    }

    async fn batch_get_item(
        &self,
        request_items: HashMap<String, KeysAndAttributes>,
    ) -> StoreResult<BatchGetResponse> {
        let response = self
            .batch_get_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(store_error)?;

        Ok(BatchGetResponse {
            responses: response.responses.unwrap_or_default(),
            unprocessed_keys: response.unprocessed_keys.unwrap_or_default(),
        })
    }

    async fn batch_write_item(
        &self,
        request_items: HashMap<String, Vec<WriteRequest>>,
    ) -> StoreResult<HashMap<String, Vec<WriteRequest>>> {
        let response = self
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(store_error)?;
        Ok(response.unprocessed_items.unwrap_or_default())
    }
}
