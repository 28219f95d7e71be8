use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use aws_sdk_dynamodb::types::{KeysAndAttributes, ReturnValue};
use aws_sdk_dynamodb::Client;
use tracing::{debug, info, instrument, warn};

use crate::dynamodb::batch::{
    self, BatchGetOutput, BatchGetRequest, BatchWriteOutput, BatchWriteRequest, MAX_BATCH_WRITE,
};
use crate::dynamodb::codec::{self, WireItem};
use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::expression::{self, Placeholders, RangeCondition};
use crate::dynamodb::params::{DeleteParams, GetParams, QueryParams, ScanParams, UpdateParams};
use crate::dynamodb::store::{
    DeleteItemRequest, GetItemRequest, PutItemRequest, ReadRequest, Store, StoreResult,
    UpdateItemRequest,
};
use crate::dynamodb::{Item, SchemaRegistry, TableSchema, Value};
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Schema-aware data access over a DynamoDB-compatible store.
///
/// Callers address tables by logical name and pass native [`Item`]s and
/// [`Value`]s. For each operation the client:
///
/// 1. resolves the table in the [`SchemaRegistry`],
/// 2. validates keys and encodes values against the table's declared types,
/// 3. builds the key-condition, projection, and update expressions,
/// 4. issues the call, wrapped in [`retry_with_backoff`] when `retryable`,
/// 5. decodes whatever comes back.
///
/// Every validation happens before the store is called, so validation, schema
/// and type errors never cost a round trip and are never retried.
///
/// # Operations
/// - **put**: write one item
/// - **get**: read one item by key; a missing item is `Ok(None)`
/// - **query**: read items by partition key and optional range condition,
///   on the table or a secondary index
/// - **scan**: read every item matching a caller-written filter
/// - **update**: `SET` attributes on one item
/// - **delete**: remove one item
/// - **batch_get** / **batch_write**: multi-table batches
///
/// # Example
///
/// ```no_run
/// use dynamo_data_layer::dynamodb::{
///     DynamoDb, Item, QueryParams, RangeCondition, SchemaRegistry, TableSchema, TypeTag,
/// };
///
/// # async fn example() -> dynamo_data_layer::dynamodb::Result<()> {
/// let config = aws_config::load_from_env().await;
/// let registry = SchemaRegistry::new([TableSchema::new("Posts", "posts-prod", "userId", Some("date"))
///     .with_attribute("userId", TypeTag::String)
///     .with_attribute("date", TypeTag::Number)
///     .with_attribute("title", TypeTag::String)])?;
/// let ddb = DynamoDb::from_sdk_config(&config, registry);
///
/// let post = Item::new()
///     .set_string("userId", "u1")
///     .set_number("date", 20240101)
///     .set_string("title", "Hello");
/// ddb.put("Posts", post, true).await?;
///
/// let posts = ddb
///     .query("Posts", QueryParams::new("u1").range(RangeCondition::new("ge", 20240101)), true)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DynamoDb<S = Client> {
    store: S,
    registry: Arc<SchemaRegistry>,
    retry_policy: RetryPolicy,
}

impl DynamoDb<Client> {
    /// Creates a client backed by the AWS SDK.
    pub fn from_sdk_config(
        sdk_config: &aws_config::SdkConfig,
        registry: impl Into<Arc<SchemaRegistry>>,
    ) -> Self {
        Self::new(Client::new(sdk_config), registry)
    }
}

#[derive(Debug, Clone, Copy)]
enum ReadKind {
    Query,
    Scan,
}

impl<S: Store> DynamoDb<S> {
    /// Creates a client over an existing store handle.
    pub fn new(store: S, registry: impl Into<Arc<SchemaRegistry>>) -> Self {
        Self {
            store,
            registry: registry.into(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy used by `retryable` calls.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    async fn call<T, F, Fut>(&self, retryable: bool, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        if retryable {
            retry_with_backoff(&self.retry_policy, || {
                let attempt = operation();
                async move { attempt.await.map_err(Error::Store) }
            })
            .await
        } else {
            operation().await.map_err(Error::Store)
        }
    }

    // --- Item Operations ---

    /// Writes one item, replacing any item with the same key.
    #[instrument(skip(self, item))]
    pub async fn put(&self, table: &str, item: Item, retryable: bool) -> Result<()> {
        let schema = self.registry.table(table)?;
        schema.require_key_attributes(&item)?;
        let request = PutItemRequest {
            table_name: schema.physical_name().to_string(),
            item: codec::encode_with_schema(&item, schema)?,
        };

        let store = &self.store;
        self.call(retryable, move || store.put_item(request.clone()))
            .await?;

        info!("Item added to '{table}'");
        Ok(())
    }

    /// Reads one item by its complete key. A missing item is `Ok(None)`.
    #[instrument(skip(self, params))]
    pub async fn get(&self, table: &str, params: GetParams, retryable: bool) -> Result<Option<Item>> {
        let schema = self.registry.table(table)?;
        schema.validate_key(&params.key)?;
        let key = codec::encode_with_schema(&params.key, schema)?;

        let (projection_expression, names) = match params.projection.as_deref() {
            Some(fields) => {
                let projection = expression::build_projection(fields)?;
                (Some(projection.expression), Some(projection.names))
            }
            None => (None, None),
        };

        let request = GetItemRequest {
            table_name: schema.physical_name().to_string(),
            key,
            projection_expression,
            expression_attribute_names: names,
            consistent_read: params.consistent_read,
        };

        let store = &self.store;
        let found = self
            .call(retryable, move || store.get_item(request.clone()))
            .await?;

        match found {
            Some(wire) => {
                info!("Item found in '{table}'");
                codec::decode(wire).map(Some)
            }
            None => {
                info!("No item in '{table}' for key");
                Ok(None)
            }
        }
    }

    /// Sets the attributes in `updates` on one item and returns the
    /// attributes selected by `ReturnValues` (`ALL_NEW` unless overridden).
    ///
    /// Key attributes cannot be updated, and an empty `updates` is rejected.
    /// So are read options in `extra` (projection, filter, consistent read,
    /// limit).
    #[instrument(skip(self, params))]
    pub async fn update(&self, table: &str, params: UpdateParams, retryable: bool) -> Result<Item> {
        let schema = self.registry.table(table)?;
        params.extra.reject_read_options("update")?;
        schema.validate_key(&params.key)?;
        if let Some(attr) = params.updates.names().find(|name| schema.is_key_attribute(name)) {
            return Err(Error::validation(format!(
                "key attribute '{attr}' of '{table}' cannot be updated"
            )));
        }
        for (name, value) in &params.updates {
            schema.check_type(name, value)?;
        }

        let key = codec::encode_with_schema(&params.key, schema)?;
        let update = expression::build_update(&params.updates)?;
        debug!(expression = %update.expression, "Built update expression");

        let extra = params.extra;
        let mut placeholders = Placeholders::from(update.names);
        let mut values = update.values;
        apply_caller_placeholders(&mut placeholders, &mut values, &extra.names, &extra.values)?;

        let request = UpdateItemRequest {
            table_name: schema.physical_name().to_string(),
            key,
            update_expression: update.expression,
            condition_expression: extra.condition_expression,
            expression_attribute_names: placeholders.into_map(),
            expression_attribute_values: values,
            return_values: extra.return_values.unwrap_or(ReturnValue::AllNew),
        };

        let store = &self.store;
        let attributes = self
            .call(retryable, move || store.update_item(request.clone()))
            .await?;

        info!("Item updated in '{table}'");
        Ok(attributes.map(codec::decode).transpose()?.unwrap_or_default())
    }

    /// Deletes one item. Returns the old attributes if `ReturnValues` asks
    /// for them, otherwise an empty item. Read options in `extra` are rejected.
    #[instrument(skip(self, params))]
    pub async fn delete(&self, table: &str, params: DeleteParams, retryable: bool) -> Result<Item> {
        let schema = self.registry.table(table)?;
        params.extra.reject_read_options("delete")?;
        schema.validate_key(&params.key)?;
        let key = codec::encode_with_schema(&params.key, schema)?;

        let extra = params.extra;
        let mut placeholders = Placeholders::new();
        let mut values = WireItem::new();
        apply_caller_placeholders(&mut placeholders, &mut values, &extra.names, &extra.values)?;

        let request = DeleteItemRequest {
            table_name: schema.physical_name().to_string(),
            key,
            condition_expression: extra.condition_expression,
            expression_attribute_names: non_empty(placeholders.into_map()),
            expression_attribute_values: non_empty(values),
            return_values: extra.return_values.unwrap_or(ReturnValue::None),
        };

        let store = &self.store;
        let attributes = self
            .call(retryable, move || store.delete_item(request.clone()))
            .await?;

        info!("Item deleted from '{table}'");
        Ok(attributes.map(codec::decode).transpose()?.unwrap_or_default())
    }

    // --- Query and Scan Operations ---

    /// Queries a table or one of its indexes by partition key, with an
    /// optional range condition. Items come back in the store's order
    /// (ascending by range key); every page is read. A condition expression
    /// or `ReturnValues` in `extra` is rejected.
    #[instrument(skip(self, params))]
    pub async fn query(&self, table: &str, params: QueryParams, retryable: bool) -> Result<Vec<Item>> {
        let schema = self.registry.table(table)?;
        params.extra.reject_write_options("query")?;
        let (hash_attr, range_attr) = schema.key_attributes(params.index_name.as_deref())?;

        let condition = expression::build_key_condition(
            hash_attr,
            &params.hash_value,
            range_attr,
            params.range_condition.as_ref(),
        )?;
        schema.check_type(hash_attr, &params.hash_value)?;
        if let (Some(range_attr), Some(range)) = (range_attr, &params.range_condition) {
            check_range_types(schema, range_attr, range)?;
        }
        debug!(expression = %condition.expression, "Built key condition");

        let extra = params.extra;
        let mut placeholders = Placeholders::from(condition.names);
        let mut values = condition.values;
        apply_caller_placeholders(&mut placeholders, &mut values, &extra.names, &extra.values)?;
        let projection = extra
            .projection
            .as_deref()
            .map(|fields| expression::build_projection_with(fields, &mut placeholders))
            .transpose()?;

        let request = ReadRequest {
            table_name: schema.physical_name().to_string(),
            index_name: params.index_name,
            key_condition_expression: Some(condition.expression),
            filter_expression: extra.filter_expression,
            projection_expression: projection,
            expression_attribute_names: non_empty(placeholders.into_map()),
            expression_attribute_values: non_empty(values),
            consistent_read: extra.consistent_read,
            limit: extra.limit,
            exclusive_start_key: None,
        };

        let items = self.read_all(request, ReadKind::Query, retryable).await?;
        info!("Queried {} items from '{table}'", items.len());
        Ok(items)
    }

    /// Scans a table, optionally through a caller-written filter. Item order
    /// is unspecified; every page is read.
    #[instrument(skip(self, params))]
    pub async fn scan(&self, table: &str, params: ScanParams, retryable: bool) -> Result<Vec<Item>> {
        let schema = self.registry.table(table)?;
        params.extra.reject_write_options("scan")?;
        if let Some(index) = params.index_name.as_deref() {
            schema.key_attributes(Some(index))?;
        }

        let extra = params.extra;
        let mut placeholders = Placeholders::new();
        let mut values = WireItem::new();
        apply_caller_placeholders(&mut placeholders, &mut values, &params.names, &params.values)?;
        apply_caller_placeholders(&mut placeholders, &mut values, &extra.names, &extra.values)?;
        let projection = extra
            .projection
            .as_deref()
            .map(|fields| expression::build_projection_with(fields, &mut placeholders))
            .transpose()?;

        let filter_expression = match (params.filter_expression, extra.filter_expression) {
            (Some(a), Some(b)) => Some(format!("({a}) AND ({b})")),
            (a, b) => a.or(b),
        };

        let request = ReadRequest {
            table_name: schema.physical_name().to_string(),
            index_name: params.index_name,
            key_condition_expression: None,
            filter_expression,
            projection_expression: projection,
            expression_attribute_names: non_empty(placeholders.into_map()),
            expression_attribute_values: non_empty(values),
            consistent_read: extra.consistent_read,
            limit: extra.limit,
            exclusive_start_key: None,
        };

        let items = self.read_all(request, ReadKind::Scan, retryable).await?;
        info!("Scanned {} items from '{table}'", items.len());
        Ok(items)
    }

    async fn read_all(&self, request: ReadRequest, kind: ReadKind, retryable: bool) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let page_request = ReadRequest {
                exclusive_start_key: start_key.take(),
                ..request.clone()
            };
            let store = &self.store;
            let page = self
                .call(retryable, move || match kind {
                    ReadKind::Query => store.query(page_request.clone()),
                    ReadKind::Scan => store.scan(page_request.clone()),
                })
                .await?;

            for wire in page.items {
                items.push(codec::decode(wire)?);
            }

            match page.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    // --- Batch Operations ---

    /// Reads keys from several tables in one call. Results and unprocessed
    /// keys are keyed by logical table name.
    ///
    /// No chunking is done: the caller keeps the request within the store's
    /// per-call limit.
    #[instrument(skip(self, request))]
    pub async fn batch_get(&self, request: BatchGetRequest, retryable: bool) -> Result<BatchGetOutput> {
        if request.tables.is_empty() {
            return Err(Error::validation("batch get names no tables"));
        }

        let mut output = BatchGetOutput::default();
        let mut request_items = HashMap::new();
        for (logical, table_keys) in request.tables {
            let schema = self.registry.table(&logical)?;
            if table_keys.keys.is_empty() {
                return Err(Error::validation(format!(
                    "batch get for '{logical}' lists no keys"
                )));
            }

            let keys = table_keys
                .keys
                .iter()
                .map(|key| {
                    schema.validate_key(key)?;
                    codec::encode_with_schema(key, schema)
                })
                .collect::<Result<Vec<_>>>()?;

            let mut keys_and_attributes = KeysAndAttributes::builder()
                .set_keys(Some(keys))
                .set_consistent_read(table_keys.consistent_read);
            if let Some(fields) = table_keys.projection.as_deref() {
                let projection = expression::build_projection(fields)?;
                keys_and_attributes = keys_and_attributes
                    .projection_expression(projection.expression)
                    .set_expression_attribute_names(Some(projection.names));
            }

            request_items.insert(
                schema.physical_name().to_string(),
                keys_and_attributes.build()?,
            );
            output.items.insert(logical, Vec::new());
        }

        let store = &self.store;
        let response = self
            .call(retryable, move || store.batch_get_item(request_items.clone()))
            .await?;

        let physical_to_logical = self.registry.physical_to_logical();
        for (logical, items) in batch::demultiplex(response.responses, physical_to_logical)? {
            let decoded = items
                .into_iter()
                .map(codec::decode)
                .collect::<Result<Vec<_>>>()?;
            output.items.entry(logical).or_default().extend(decoded);
        }
        for (logical, unprocessed) in
            batch::demultiplex(response.unprocessed_keys, physical_to_logical)?
        {
            let decoded = unprocessed
                .keys
                .into_iter()
                .map(codec::decode)
                .collect::<Result<Vec<_>>>()?;
            output.unprocessed_keys.insert(logical, decoded);
        }

        if !output.unprocessed_keys.is_empty() {
            warn!("Batch get left keys unprocessed in {} tables", output.unprocessed_keys.len());
        }
        info!("Batch get returned items from {} tables", output.items.len());
        Ok(output)
    }

    /// Writes puts and deletes to several tables in one call.
    ///
    /// The request must hold at most [`MAX_BATCH_WRITE`] writes in total;
    /// larger requests are rejected rather than split. Use
    /// [`batch::partition_writes`] to split them beforehand.
    #[instrument(skip(self, request))]
    pub async fn batch_write(&self, request: BatchWriteRequest, retryable: bool) -> Result<BatchWriteOutput> {
        if request.tables.is_empty() {
            return Err(Error::validation("batch write names no tables"));
        }
        let total = request.len();
        if total > MAX_BATCH_WRITE {
            return Err(Error::validation(format!(
                "batch write holds {total} requests but at most {MAX_BATCH_WRITE} fit in one call; split it with partition_writes"
            )));
        }

        let mut request_items = HashMap::new();
        for (logical, writes) in request.tables {
            let schema = self.registry.table(&logical)?;
            if writes.is_empty() {
                return Err(Error::validation(format!(
                    "batch write for '{logical}' has no puts or deletes"
                )));
            }

            let mut requests = Vec::with_capacity(writes.len());
            for item in &writes.put {
                schema.require_key_attributes(item)?;
                requests.push(batch::put_request(codec::encode_with_schema(item, schema)?)?);
            }
            for key in &writes.delete {
                schema.validate_key(key)?;
                requests.push(batch::delete_request(codec::encode_with_schema(key, schema)?)?);
            }
            request_items.insert(schema.physical_name().to_string(), requests);
        }

        let store = &self.store;
        let unprocessed = self
            .call(retryable, move || store.batch_write_item(request_items.clone()))
            .await?;

        let mut output = BatchWriteOutput::default();
        for (logical, requests) in batch::demultiplex(unprocessed, self.registry.physical_to_logical())? {
            output
                .unprocessed
                .insert(logical, batch::decode_unprocessed(requests)?);
        }

        if output.is_complete() {
            info!("Batch write of {total} requests completed");
        } else {
            warn!("Batch write of {total} requests left some unprocessed");
        }
        Ok(output)
    }
}

fn apply_caller_placeholders(
    placeholders: &mut Placeholders,
    values: &mut WireItem,
    names: &HashMap<String, String>,
    caller_values: &Item,
) -> Result<()> {
    placeholders.merge(names)?;
    expression::merge_values(values, codec::encode(caller_values)?)
}

fn check_range_types(schema: &TableSchema, range_attr: &str, range: &RangeCondition) -> Result<()> {
    match &range.value {
        Value::List(bounds) if range.operation.eq_ignore_ascii_case("between") => bounds
            .iter()
            .try_for_each(|bound| schema.check_type(range_attr, bound)),
        value => schema.check_type(range_attr, value),
    }
}

fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}
